use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::TranslationConfig;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::LanguageTag;
use crate::middleware::circuit_breaker::CircuitBreaker;
use crate::services::translation::{TranslatedBatch, Translator};
use crate::utils::Metrics;

/// Gemini-backed sentence translator with circuit breaker, retries and metrics
pub struct LlmTranslator {
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Metrics>,
}

impl LlmTranslator {
    pub fn new(
        config: &TranslationConfig,
        circuit_breaker: Option<CircuitBreaker>,
        metrics: Option<Metrics>,
    ) -> TranslationResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(TranslationError::NotConfigured)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            http_client,
            circuit_breaker: circuit_breaker.unwrap_or_default(),
            metrics,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent?key={}", self.endpoint, self.model, self.api_key)
    }

    /// Send HTTP request with retries and jitter
    async fn send_with_retries(&self, body: &serde_json::Value) -> TranslationResult<String> {
        let url = self.url();
        let mut attempt = 0;

        loop {
            let failure = match self
                .http_client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text().await?);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let message = response.text().await.unwrap_or_default();
                    TranslationError::ApiStatus { status, message }
                }
                Err(e) => TranslationError::ApiRequestFailed(e),
            };

            if attempt >= self.max_retries {
                return Err(failure);
            }

            let delay = retry_delay(&failure, attempt);
            debug!(
                "Translation request failed: {}. Retrying in {:?} ({}/{})",
                failure,
                delay,
                attempt + 1,
                self.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    #[instrument(skip(self, text), fields(chars = text.chars().count(), source = %source, target = %target))]
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> TranslationResult<TranslatedBatch> {
        if !self.circuit_breaker.allow_request() {
            warn!("Circuit breaker is open, failing fast");
            if let Some(ref m) = self.metrics {
                m.record_circuit_breaker_trip();
            }
            return Err(TranslationError::CircuitOpen);
        }

        let start = Instant::now();
        let body = build_request_body(text, source, target);
        let result = self.send_with_retries(&body).await;
        let duration = start.elapsed();

        let parsed = result.and_then(|response_text| parse_response(&response_text));

        match parsed {
            Ok((batch, (input_tokens, output_tokens))) => {
                self.circuit_breaker.record_success();
                if let Some(ref m) = self.metrics {
                    m.record_api_call(true, duration, input_tokens, output_tokens);
                }
                debug!("Translated into {} sentences in {:?}", batch.sentences.len(), duration);
                Ok(batch)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                if let Some(ref m) = self.metrics {
                    m.record_api_call(false, duration, 0, 0);
                }
                Err(e)
            }
        }
    }
}

/// 10s for rate limiting/overload, exponential backoff with jitter otherwise
fn retry_delay(error: &TranslationError, attempt: u32) -> Duration {
    match error {
        TranslationError::ApiStatus { status: 429 | 503, .. } => Duration::from_secs(10),
        _ => {
            let base_delay = 2_u64.pow(attempt.min(6));
            let jitter = rand::random::<u64>() % 1000;
            Duration::from_millis(base_delay * 1000 + jitter)
        }
    }
}

fn wants_pinyin(source: &LanguageTag) -> bool {
    matches!(source.primary().as_str(), "zh" | "yue" | "lzh" | "wuu")
}

/// Request body asking for sentence-aligned JSON output
pub(crate) fn build_request_body(
    text: &str,
    source: &LanguageTag,
    target: &LanguageTag,
) -> serde_json::Value {
    let pinyin_instruction = if wants_pinyin(source) {
        "Also give the Hanyu Pinyin (with tone marks) of each original sentence in 'pinyin'."
    } else {
        "Leave 'pinyin' as an empty string."
    };

    let prompt = format!(
        "Split the following {source} text into sentences, keeping their order, \
         and translate each sentence into {target}. \
         Return JSON where 'sentences' is an array of objects with \
         'original' (the source sentence), 'translation' (the translation) and 'pinyin'. \
         {pinyin_instruction} Only translate; do not add commentary.\n\n{text}"
    );

    json!({
        "contents": [{
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "temperature": 0.2,
            "response_mime_type": "application/json",
            "response_schema": {
                "type": "object",
                "properties": {
                    "sentences": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "original": { "type": "string" },
                                "translation": { "type": "string" },
                                "pinyin": { "type": "string" }
                            },
                            "required": ["original", "translation"]
                        }
                    }
                },
                "required": ["sentences"]
            },
            "thinkingConfig": { "thinking_budget": 0 }
        }
    })
}

/// Parse a generateContent response into a batch and its token usage
pub(crate) fn parse_response(response_text: &str) -> TranslationResult<(TranslatedBatch, (u64, u64))> {
    let response: serde_json::Value = serde_json::from_str(response_text)
        .map_err(|e| TranslationError::InvalidResponse(format!("response is not JSON: {}", e)))?;

    let usage = extract_token_usage(&response);

    let payload = response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| TranslationError::InvalidResponse("missing text in API response".to_string()))?;

    let mut batch: TranslatedBatch = serde_json::from_str(payload)
        .map_err(|e| TranslationError::InvalidResponse(format!("unexpected translation payload: {}", e)))?;

    for sentence in &mut batch.sentences {
        if sentence.pinyin.as_deref().is_some_and(|p| p.trim().is_empty()) {
            sentence.pinyin = None;
        }
    }

    Ok((batch, usage))
}

/// Extract token usage from Gemini API response
///
/// Returns (input_tokens, output_tokens) if available, otherwise (0, 0)
fn extract_token_usage(response: &serde_json::Value) -> (u64, u64) {
    let usage_metadata = &response["usageMetadata"];
    let input_tokens = usage_metadata["promptTokenCount"].as_u64().unwrap_or(0);
    let output_tokens = usage_metadata["candidatesTokenCount"].as_u64().unwrap_or(0);

    (input_tokens, output_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gemini_response(payload: &str) -> String {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": payload }] } }],
            "usageMetadata": { "promptTokenCount": 42, "candidatesTokenCount": 17 }
        })
        .to_string()
    }

    #[test]
    fn test_parse_response() {
        let payload = r#"{"sentences":[
            {"original":"你好。","translation":"안녕하세요.","pinyin":"nǐ hǎo."},
            {"original":"谢谢。","translation":"감사합니다.","pinyin":" "}
        ]}"#;

        let (batch, usage) = parse_response(&gemini_response(payload)).unwrap();

        assert_eq!(usage, (42, 17));
        assert_eq!(batch.sentences.len(), 2);
        assert_eq!(batch.sentences[0].pinyin.as_deref(), Some("nǐ hǎo."));
        assert!(batch.sentences[1].pinyin.is_none());
    }

    #[test]
    fn test_parse_response_rejects_missing_candidates() {
        let err = parse_response(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidResponse(_)));

        let err = parse_response("not json").unwrap_err();
        assert!(matches!(err, TranslationError::InvalidResponse(_)));
    }

    #[test]
    fn test_request_body_mentions_languages() {
        let body = build_request_body("你好。", &"zh-CN".into(), &"ko".into());
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();

        assert!(prompt.contains("zh-CN"));
        assert!(prompt.contains("into ko"));
        assert!(prompt.contains("Pinyin"));
        assert!(prompt.ends_with("你好。"));
        assert_eq!(body["generationConfig"]["response_mime_type"], "application/json");

        let body = build_request_body("Hello.", &"en".into(), &"ko".into());
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("empty string"));
    }

    #[test]
    fn test_retry_delay() {
        let throttled = TranslationError::ApiStatus { status: 429, message: String::new() };
        assert_eq!(retry_delay(&throttled, 0), Duration::from_secs(10));

        let server_error = TranslationError::ApiStatus { status: 500, message: String::new() };
        let delay = retry_delay(&server_error, 1);
        assert!(delay >= Duration::from_millis(2000) && delay < Duration::from_millis(3000));
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = TranslationConfig {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://example.invalid/models".to_string(),
            max_retries: 0,
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            LlmTranslator::new(&config, None, None),
            Err(TranslationError::NotConfigured)
        ));
    }
}
