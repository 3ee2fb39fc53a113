/// Dev tool: clean and segment a text file the way captures are processed
///
/// Usage: cargo run --bin segment_text -- input.txt [--mode sentence|paragraph|full] [--lang zh-CN]

use anyhow::{Context, Result};

use reading_workflow::core::config::DEFAULT_SOURCE_LANGUAGE;
use reading_workflow::services::segmentation::{clean, text_len, Segmenter, SplitRules};
use reading_workflow::{LanguageTag, ProcessingMode};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input.txt> [--mode sentence|paragraph|full] [--lang zh-CN]", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let mut mode = ProcessingMode::default();
    let mut language = LanguageTag::new(DEFAULT_SOURCE_LANGUAGE);

    let mut i = 2;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--mode" | "-m", Some(value)) => {
                mode = value.parse().map_err(anyhow::Error::msg)?;
                i += 2;
            }
            ("--lang" | "-l", Some(value)) => {
                language = LanguageTag::new(value.as_str());
                i += 2;
            }
            _ => i += 1,
        }
    }

    let raw = std::fs::read_to_string(input_path)
        .with_context(|| format!("Failed to read {}", input_path))?;

    let cleaned = clean(&raw);
    let segmenter = Segmenter::new(SplitRules::new(&language));
    let units = segmenter.segment(&cleaned, mode, &language);

    println!("Input: {} ({} chars, {} after cleaning)", input_path, raw.chars().count(), cleaned.chars().count());
    println!(
        "Mode: {:?}, language: {}, rule: {:?}",
        mode,
        language,
        segmenter.rules().pattern_for(&language).family()
    );
    println!("{}", "-".repeat(60));

    for (idx, unit) in units.iter().enumerate() {
        println!("[{:>3}] ({:>4}) {}", idx, text_len(unit), unit.replace('\n', "⏎"));
    }

    println!("{}", "-".repeat(60));
    println!("{} units", units.len());

    Ok(())
}
