// Translation orchestrator: size-bounded chunking around the translation backend

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::core::config::PipelineConfig;
use crate::core::errors::{ChunkContext, TranslationResult};
use crate::core::types::{LanguageTag, ProcessedText, ProcessingMode, TextUnit, TranslationOutcome};
use crate::services::segmentation::{text_len, SplitRules, PARAGRAPH_DELIMITER};
use crate::services::translation::{TranslatedBatch, TranslationCache, Translator};
use crate::utils::Metrics;

/// Translation and pinyin for one piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Rendered {
    translation: String,
    pinyin: String,
}

/// Splits long text into paragraph and sentence chunks below the threshold,
/// translates them one at a time in order, and reassembles the result with
/// the original paragraph structure.
pub struct TranslationOrchestrator {
    translator: Arc<dyn Translator>,
    rules: SplitRules,
    chunk_threshold: usize,
    cache: Option<TranslationCache>,
    metrics: Option<Metrics>,
}

impl TranslationOrchestrator {
    pub fn new(translator: Arc<dyn Translator>, config: &PipelineConfig) -> Self {
        Self {
            translator,
            rules: SplitRules::new(&config.languages.source),
            chunk_threshold: config.chunk_threshold.max(1),
            cache: None,
            metrics: None,
        }
    }

    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn chunk_threshold(&self) -> usize {
        self.chunk_threshold
    }

    /// Fail-soft translation: any backend failure is logged and reported as
    /// [`TranslationOutcome::Degraded`].
    pub async fn translate(&self, text: &str, source: &LanguageTag, target: &LanguageTag) -> TranslationOutcome {
        if text.is_empty() {
            return TranslationOutcome::Empty;
        }

        match self.try_translate(text, source, target).await {
            Ok(translated) if translated.is_empty() => TranslationOutcome::Empty,
            Ok(translated) => TranslationOutcome::Translated(translated),
            Err(e) => {
                error!("Translation failed ({} -> {}): {}", source, target, e);
                TranslationOutcome::Degraded { reason: e.to_string() }
            }
        }
    }

    /// Translate text of any length. The first failing chunk aborts the
    /// whole operation.
    #[instrument(skip(self, text), fields(len = text_len(text), source = %source, target = %target))]
    pub async fn try_translate(&self, text: &str, source: &LanguageTag, target: &LanguageTag) -> TranslationResult<String> {
        Ok(self.render(text, source, target).await?.translation)
    }

    /// New `ProcessedText` with every unit translated and pinyin filled in.
    ///
    /// The input is left untouched; on failure nothing partial is returned.
    #[instrument(skip(self, processed), fields(units = processed.units.len(), mode = ?processed.mode))]
    pub async fn translate_units(&self, processed: &ProcessedText) -> TranslationResult<ProcessedText> {
        let source = &processed.source_language;
        let target = &processed.target_language;
        let start = Instant::now();

        let mut units: Vec<TextUnit> = Vec::with_capacity(processed.units.len());
        for (index, unit) in processed.units.iter().enumerate() {
            if unit.original_text.trim().is_empty() {
                units.push(unit.clone());
                continue;
            }

            let rendered = self
                .render(&unit.original_text, source, target)
                .await
                .with_chunk_context(index)?;
            units.push(unit.with_translation(rendered.translation, rendered.pinyin));
        }

        let full_translated_text = match processed.mode {
            ProcessingMode::Paragraph | ProcessingMode::Full => units
                .iter()
                .map(|u| u.translated_text.as_str())
                .collect::<Vec<_>>()
                .join(PARAGRAPH_DELIMITER),
            ProcessingMode::Sentence => {
                self.try_translate(&processed.full_original_text, source, target)
                    .await?
            }
        };

        info!("Translated {} units in {:?}", units.len(), start.elapsed());

        Ok(ProcessedText {
            mode: processed.mode,
            display_mode: processed.display_mode,
            full_original_text: processed.full_original_text.clone(),
            full_translated_text,
            units,
            source_language: source.clone(),
            target_language: target.clone(),
        })
    }

    async fn render(&self, text: &str, source: &LanguageTag, target: &LanguageTag) -> TranslationResult<Rendered> {
        if text.is_empty() {
            return Ok(Rendered::default());
        }

        if text_len(text) <= self.chunk_threshold {
            let batch = self.call(text, source, target).await?;
            if let Some(ref m) = self.metrics {
                m.record_direct_translation();
            }
            return Ok(arrange_by_paragraph(text, &batch));
        }

        self.render_chunked(text, source, target).await
    }

    /// Long-text path: paragraphs, then sentences for oversized paragraphs
    async fn render_chunked(&self, text: &str, source: &LanguageTag, target: &LanguageTag) -> TranslationResult<Rendered> {
        let rule = self.rules.pattern_for(source);
        let paragraphs: Vec<&str> = text.split(PARAGRAPH_DELIMITER).collect();
        let mut translations = Vec::with_capacity(paragraphs.len());
        let mut pinyins = Vec::with_capacity(paragraphs.len());
        let mut chunk_index = 0;

        debug!(
            "Chunking {} code units into {} paragraphs (threshold {})",
            text_len(text),
            paragraphs.len(),
            self.chunk_threshold
        );

        for paragraph in paragraphs {
            if paragraph.trim().is_empty() {
                translations.push(String::new());
                pinyins.push(String::new());
                continue;
            }

            if text_len(paragraph) <= self.chunk_threshold {
                let batch = self
                    .call(paragraph, source, target)
                    .await
                    .with_chunk_context(chunk_index)?;
                chunk_index += 1;

                translations.push(single_paragraph(&batch.joined("\n")));
                pinyins.push(single_paragraph(&batch.joined_pinyin()));
                continue;
            }

            let mut sentence_translations = Vec::new();
            let mut sentence_pinyins = Vec::new();

            for sentence in rule.split(paragraph) {
                for piece in bounded_pieces(sentence, self.chunk_threshold) {
                    let batch = self
                        .call(piece, source, target)
                        .await
                        .with_chunk_context(chunk_index)?;
                    chunk_index += 1;

                    let translation = single_paragraph(&batch.joined(" "));
                    if !translation.is_empty() {
                        sentence_translations.push(translation);
                    }
                    let pinyin = single_paragraph(&batch.joined_pinyin());
                    if !pinyin.is_empty() {
                        sentence_pinyins.push(pinyin);
                    }
                }
            }

            translations.push(sentence_translations.join(" "));
            pinyins.push(sentence_pinyins.join(" "));
        }

        if let Some(ref m) = self.metrics {
            m.record_chunked_translation(chunk_index);
        }
        info!("Long text translated in {} chunks", chunk_index);

        Ok(Rendered {
            translation: translations.join(PARAGRAPH_DELIMITER),
            pinyin: join_pinyin_paragraphs(&pinyins),
        })
    }

    /// One backend call, served from the cache when possible
    async fn call(&self, text: &str, source: &LanguageTag, target: &LanguageTag) -> TranslationResult<TranslatedBatch> {
        let key = self
            .cache
            .as_ref()
            .map(|_| TranslationCache::generate_key(text, source, target));

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), key.as_deref()) {
            if let Some(hit) = cache.get(key) {
                return Ok(hit);
            }
        }

        let batch = self.translator.translate(text, source, target).await?;

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), key) {
            cache.put(key, &batch);
        }

        Ok(batch)
    }
}

/// Regroup a sentence-split response under the paragraphs of `text`.
///
/// Each sentence goes to the paragraph its `original` is found in, searching
/// forward from the previous match. A sentence that can't be located stays
/// with the one before it. Responses whose originals span a paragraph break
/// already carry the layout and are joined as returned.
fn arrange_by_paragraph(text: &str, batch: &TranslatedBatch) -> Rendered {
    let starts: Vec<usize> = std::iter::once(0)
        .chain(
            text.match_indices(PARAGRAPH_DELIMITER)
                .map(|(i, _)| i + PARAGRAPH_DELIMITER.len()),
        )
        .collect();

    let spans_paragraphs = batch
        .sentences
        .iter()
        .any(|s| s.original.trim().contains(PARAGRAPH_DELIMITER));

    if starts.len() == 1 || spans_paragraphs {
        return Rendered {
            translation: batch.joined("\n"),
            pinyin: batch.joined_pinyin(),
        };
    }

    let mut translations: Vec<Vec<String>> = vec![Vec::new(); starts.len()];
    let mut pinyins: Vec<Vec<String>> = vec![Vec::new(); starts.len()];
    let mut cursor = 0;
    let mut paragraph = 0;

    for sentence in &batch.sentences {
        let original = sentence.original.trim();
        if !original.is_empty() {
            if let Some(offset) = text[cursor..].find(original) {
                let position = cursor + offset;
                paragraph = starts.partition_point(|&start| start <= position) - 1;
                cursor = position + original.len();
            }
        }

        let translation = single_paragraph(&sentence.translation);
        if !translation.is_empty() {
            translations[paragraph].push(translation);
        }
        if let Some(pinyin) = sentence.pinyin.as_deref().map(single_paragraph) {
            if !pinyin.is_empty() {
                pinyins[paragraph].push(pinyin);
            }
        }
    }

    let pinyins: Vec<String> = pinyins.iter().map(|p| p.join(" ")).collect();

    Rendered {
        translation: translations
            .iter()
            .map(|t| t.join("\n"))
            .collect::<Vec<_>>()
            .join(PARAGRAPH_DELIMITER),
        pinyin: join_pinyin_paragraphs(&pinyins),
    }
}

/// Paragraph-aligned pinyin, or `""` when no paragraph has any
fn join_pinyin_paragraphs(pinyins: &[String]) -> String {
    if pinyins.iter().all(|p| p.is_empty()) {
        String::new()
    } else {
        pinyins.join(PARAGRAPH_DELIMITER)
    }
}

/// Collapse blank lines so a fragment can't add paragraph breaks of its own
fn single_paragraph(fragment: &str) -> String {
    fragment
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a sentence on char boundaries into pieces of at most `limit`
/// UTF-16 code units. Sentences already within the limit pass through.
fn bounded_pieces(sentence: &str, limit: usize) -> Vec<&str> {
    if text_len(sentence) <= limit {
        return vec![sentence];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut units = 0;

    for (offset, c) in sentence.char_indices() {
        let width = c.len_utf16();
        if units + width > limit && offset > start {
            pieces.push(&sentence[start..offset]);
            start = offset;
            units = 0;
        }
        units += width;
    }
    pieces.push(&sentence[start..]);

    pieces
}
