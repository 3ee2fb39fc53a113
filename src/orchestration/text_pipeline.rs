// Image-to-ProcessedText pipeline: OCR, cleanup, segmentation
//
// Translation is not part of this path; callers show the original text
// immediately and translate through TranslationOrchestrator separately.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::config::{LanguageDefaults, PipelineConfig};
use crate::core::errors::PipelineResult;
use crate::core::types::{ImageData, ProcessOptions, ProcessOutcome, ProcessedText, TextUnit};
use crate::services::ocr::OcrEngine;
use crate::services::preferences::PreferencesSource;
use crate::services::segmentation::{clean, Segmenter, SplitRules};
use crate::services::usage::UsageCounter;
use crate::utils::Metrics;

pub struct TextPipeline {
    ocr: Arc<dyn OcrEngine>,
    preferences: Arc<dyn PreferencesSource>,
    usage: Arc<dyn UsageCounter>,
    segmenter: Segmenter,
    languages: LanguageDefaults,
    metrics: Option<Metrics>,
}

impl TextPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        preferences: Arc<dyn PreferencesSource>,
        usage: Arc<dyn UsageCounter>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            ocr,
            preferences,
            usage,
            segmenter: Segmenter::new(SplitRules::new(&config.languages.source)),
            languages: config.languages.clone(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Extract and segment the text of one image.
    ///
    /// Never fails: collaborator errors come back as
    /// [`ProcessOutcome::Degraded`] wrapping an empty result.
    #[instrument(skip(self, image), fields(file = %image.filename, mode = ?options.mode))]
    pub async fn process(&self, image: &ImageData, options: ProcessOptions) -> ProcessOutcome {
        let start = Instant::now();

        let outcome = match self.try_process(image, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Capture processing failed, returning empty result: {}", e);
                ProcessOutcome::Degraded {
                    result: self.empty_result(options),
                    reason: e.to_string(),
                }
            }
        };

        if let Some(ref m) = self.metrics {
            m.record_capture(outcome.status());
        }
        info!(
            "Capture {} -> {} ({} units) in {:?}",
            image.filename,
            outcome.status(),
            outcome.processed_text().units.len(),
            start.elapsed()
        );

        outcome
    }

    /// Same as [`process`](Self::process) but propagates collaborator errors
    pub async fn try_process(&self, image: &ImageData, options: ProcessOptions) -> PipelineResult<ProcessOutcome> {
        let (source, target) = self.preferences.preferences().await?.resolve(&self.languages);

        let raw = self.ocr.extract_text(image, &source).await?;

        if options.count_usage {
            self.usage.increment(1, options.allow_over_limit).await?;
        }

        let cleaned = clean(&raw);
        if cleaned.is_empty() {
            debug!("No text found ({} raw chars)", raw.chars().count());
            return Ok(ProcessOutcome::NoText(self.empty_result(options)));
        }

        let units: Vec<TextUnit> = self
            .segmenter
            .segment(&cleaned, options.mode, &source)
            .into_iter()
            .map(|segment| TextUnit::untranslated(segment, source.clone(), target.clone()))
            .collect();

        debug!("Segmented {} chars into {} units", cleaned.chars().count(), units.len());

        Ok(ProcessOutcome::Processed(ProcessedText {
            mode: options.mode,
            display_mode: options.display_mode,
            full_original_text: cleaned,
            full_translated_text: String::new(),
            units,
            source_language: source,
            target_language: target,
        }))
    }

    fn empty_result(&self, options: ProcessOptions) -> ProcessedText {
        ProcessedText {
            display_mode: options.display_mode,
            ..ProcessedText::empty(options.mode, self.languages.source.clone(), self.languages.target.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{OcrError, OcrResult};
    use crate::core::types::{LanguageTag, ProcessingMode};
    use crate::services::preferences::{Preferences, StaticPreferences};
    use crate::services::usage::LocalUsageCounter;
    use async_trait::async_trait;

    struct FixedOcr(String);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn extract_text(&self, _image: &ImageData, _language: &LanguageTag) -> OcrResult<String> {
            Ok(self.0.clone())
        }
    }

    /// Records the language each extraction was asked for
    #[derive(Default)]
    struct RecordingOcr {
        languages: parking_lot::Mutex<Vec<LanguageTag>>,
    }

    #[async_trait]
    impl OcrEngine for RecordingOcr {
        async fn extract_text(&self, _image: &ImageData, language: &LanguageTag) -> OcrResult<String> {
            self.languages.lock().push(language.clone());
            Ok("こんにちは。".to_string())
        }
    }

    struct BrokenOcr;

    #[async_trait]
    impl OcrEngine for BrokenOcr {
        async fn extract_text(&self, _image: &ImageData, _language: &LanguageTag) -> OcrResult<String> {
            Err(OcrError::ServiceError {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    fn image() -> ImageData {
        ImageData {
            filename: "page.png".to_string(),
            image_bytes: Arc::new(vec![0u8; 8]),
            width: 1,
            height: 1,
        }
    }

    fn pipeline(ocr: Arc<dyn OcrEngine>, usage: Arc<LocalUsageCounter>, prefs: Preferences) -> TextPipeline {
        TextPipeline::new(ocr, Arc::new(StaticPreferences(prefs)), usage, &PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_sentence_mode_segments_cleaned_text() {
        let usage = Arc::new(LocalUsageCounter::new(None));
        let ocr = Arc::new(FixedOcr("你好 。我是学生！\n\n12\n\n再见。".to_string()));
        let pipeline = pipeline(ocr, usage.clone(), Preferences::default());

        let outcome = pipeline
            .process(&image(), ProcessOptions::with_mode(ProcessingMode::Sentence))
            .await;

        let ProcessOutcome::Processed(text) = outcome else {
            panic!("expected processed outcome, got {:?}", outcome);
        };
        let originals: Vec<&str> = text.units.iter().map(|u| u.original_text.as_str()).collect();
        assert_eq!(originals, vec!["你好。", "我是学生！", "再见。"]);
        assert_eq!(text.full_original_text, "你好。我是学生！\n\n再见。");
        assert!(text.units.iter().all(|u| u.translated_text.is_empty() && u.pinyin.is_empty()));
        assert_eq!(text.source_language.as_str(), "zh-CN");
        assert_eq!(usage.used(), 1);
    }

    #[tokio::test]
    async fn test_preferences_choose_languages_and_rules() {
        let usage = Arc::new(LocalUsageCounter::new(None));
        let ocr = Arc::new(FixedOcr("Hello.\n\nWorld.".to_string()));
        let prefs = Preferences {
            source_language: Some("en".into()),
            target_language: None,
        };
        let pipeline = pipeline(ocr, usage, prefs);

        let text = pipeline
            .process(&image(), ProcessOptions::with_mode(ProcessingMode::Sentence))
            .await
            .into_processed_text();

        let originals: Vec<&str> = text.units.iter().map(|u| u.original_text.as_str()).collect();
        assert_eq!(originals, vec!["Hello.", "World."]);
        assert_eq!(text.source_language.as_str(), "en");
        assert_eq!(text.target_language.as_str(), "ko");
        assert_eq!(text.units[0].target_language.as_str(), "ko");
    }

    #[tokio::test]
    async fn test_ocr_uses_preferred_source_language() {
        let ocr = Arc::new(RecordingOcr::default());
        let prefs = Preferences {
            source_language: Some("ja".into()),
            target_language: None,
        };
        let pipeline = pipeline(ocr.clone(), Arc::new(LocalUsageCounter::new(None)), prefs);

        let text = pipeline.process(&image(), ProcessOptions::default()).await.into_processed_text();
        assert_eq!(text.source_language.as_str(), "ja");

        let fallback = pipeline_with_defaults(ocr.clone());
        fallback.process(&image(), ProcessOptions::default()).await;

        let languages: Vec<String> = ocr.languages.lock().iter().map(|l| l.to_string()).collect();
        assert_eq!(languages, vec!["ja", "zh-CN"]);
    }

    fn pipeline_with_defaults(ocr: Arc<dyn OcrEngine>) -> TextPipeline {
        pipeline(ocr, Arc::new(LocalUsageCounter::new(None)), Preferences::default())
    }

    #[tokio::test]
    async fn test_paragraph_and_full_modes() {
        let usage = Arc::new(LocalUsageCounter::new(None));
        let ocr: Arc<dyn OcrEngine> = Arc::new(FixedOcr("一。二。\n\n三。".to_string()));
        let pipeline = pipeline(ocr, usage, Preferences::default());

        let paragraphs = pipeline
            .process(&image(), ProcessOptions::with_mode(ProcessingMode::Paragraph))
            .await
            .into_processed_text();
        assert_eq!(paragraphs.units.len(), 2);
        assert_eq!(paragraphs.mode, ProcessingMode::Paragraph);

        let full = pipeline
            .process(&image(), ProcessOptions::with_mode(ProcessingMode::Full))
            .await
            .into_processed_text();
        assert_eq!(full.units.len(), 1);
        assert_eq!(full.units[0].original_text, "一。二。\n\n三。");
    }

    #[tokio::test]
    async fn test_ocr_failure_degrades_to_empty_result() {
        let usage = Arc::new(LocalUsageCounter::new(None));
        let pipeline = pipeline(Arc::new(BrokenOcr), usage.clone(), Preferences::default());

        let outcome = pipeline.process(&image(), ProcessOptions::default()).await;

        assert!(outcome.is_degraded());
        let text = outcome.processed_text();
        assert!(text.full_original_text.is_empty());
        assert!(text.units.is_empty());
        assert_eq!(text.source_language.as_str(), "zh-CN");
        assert_eq!(usage.used(), 0);
    }

    #[tokio::test]
    async fn test_blank_capture_is_no_text() {
        let usage = Arc::new(LocalUsageCounter::new(None));
        let pipeline = pipeline(Arc::new(FixedOcr(" \n 3 \n".to_string())), usage.clone(), Preferences::default());

        let outcome = pipeline.process(&image(), ProcessOptions::default()).await;

        assert_eq!(outcome.status(), "no_text");
        assert!(outcome.processed_text().is_empty());
        assert_eq!(usage.used(), 1);
    }

    #[tokio::test]
    async fn test_usage_limit_and_suppression() {
        let usage = Arc::new(LocalUsageCounter::new(Some(1)));
        let pipeline = pipeline(Arc::new(FixedOcr("你好。".to_string())), usage.clone(), Preferences::default());

        assert_eq!(pipeline.process(&image(), ProcessOptions::default()).await.status(), "processed");
        assert!(pipeline.process(&image(), ProcessOptions::default()).await.is_degraded());

        let uncounted = ProcessOptions {
            count_usage: false,
            ..ProcessOptions::default()
        };
        assert_eq!(pipeline.process(&image(), uncounted).await.status(), "processed");

        let over_limit = ProcessOptions {
            allow_over_limit: true,
            ..ProcessOptions::default()
        };
        assert_eq!(pipeline.process(&image(), over_limit).await.status(), "processed");
        assert_eq!(usage.used(), 2);
    }

    #[tokio::test]
    async fn test_metrics_record_outcomes() {
        let metrics = Metrics::new();
        let usage = Arc::new(LocalUsageCounter::new(None));
        let pipeline = pipeline(Arc::new(BrokenOcr), usage, Preferences::default()).with_metrics(metrics.clone());

        pipeline.process(&image(), ProcessOptions::default()).await;

        assert_eq!(metrics.snapshot().captures_degraded, 1);
    }
}
