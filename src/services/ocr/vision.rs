// Google Cloud Vision document text detection

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::core::config::OcrConfig;
use crate::core::errors::{OcrError, OcrResult};
use crate::core::types::{ImageData, LanguageTag};
use crate::services::ocr::OcrEngine;
use crate::utils::Metrics;

/// Cloud Vision `images:annotate` client
pub struct VisionOcrClient {
    api_key: String,
    endpoint: String,
    http_client: reqwest::Client,
    metrics: Option<Metrics>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<StatusMessage>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct StatusMessage {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl VisionOcrClient {
    pub fn new(config: &OcrConfig, metrics: Option<Metrics>) -> OcrResult<Self> {
        let api_key = config.api_key.clone().ok_or(OcrError::NotConfigured)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_key,
            endpoint: config.endpoint.clone(),
            http_client,
            metrics,
        })
    }

    fn request_body(image: &ImageData, language: &LanguageTag) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": general_purpose::STANDARD.encode(image.image_bytes.as_slice()) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "imageContext": { "languageHints": language_hints(language) }
            }]
        })
    }

    async fn annotate(&self, image: &ImageData, language: &LanguageTag) -> OcrResult<String> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(image, language))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OcrError::ServiceError {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_annotate_response(&body)
    }
}

#[async_trait]
impl OcrEngine for VisionOcrClient {
    #[instrument(skip(self, image), fields(file = %image.filename, bytes = image.image_bytes.len(), language = %language))]
    async fn extract_text(&self, image: &ImageData, language: &LanguageTag) -> OcrResult<String> {
        let start = Instant::now();
        let result = self.annotate(image, language).await;

        if let Some(ref m) = self.metrics {
            m.record_ocr_call(result.is_ok(), start.elapsed());
        }

        if let Ok(ref text) = result {
            debug!("Extracted {} chars in {:?}", text.chars().count(), start.elapsed());
        }
        result
    }
}

/// Vision hints for the capture language; Chinese captures also allow Korean
/// and English glosses printed alongside.
fn language_hints(source: &LanguageTag) -> Vec<String> {
    let mut hints = vec![source.as_str().to_string()];
    if source.primary() == "zh" {
        hints.push("ko".to_string());
        hints.push("en".to_string());
    }
    hints
}

fn parse_annotate_response(body: &str) -> OcrResult<String> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(String::new());
    };

    if let Some(error) = first.error {
        return Err(OcrError::ServiceError {
            status: error.code,
            message: error.message,
        });
    }

    Ok(first.full_text_annotation.map(|a| a.text).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text() {
        let body = r#"{"responses":[{"fullTextAnnotation":{"text":"你好\n世界\n"}}]}"#;
        assert_eq!(parse_annotate_response(body).unwrap(), "你好\n世界\n");
    }

    #[test]
    fn test_parse_no_text() {
        assert_eq!(parse_annotate_response(r#"{"responses":[{}]}"#).unwrap(), "");
        assert_eq!(parse_annotate_response(r#"{}"#).unwrap(), "");
    }

    #[test]
    fn test_parse_error_payload() {
        let body = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        let err = parse_annotate_response(body).unwrap_err();
        assert!(matches!(err, OcrError::ServiceError { status: 3, .. }));
    }

    #[test]
    fn test_language_hints() {
        assert_eq!(language_hints(&"zh-CN".into()), vec!["zh-CN", "ko", "en"]);
        assert_eq!(language_hints(&"ja".into()), vec!["ja"]);
    }

    #[test]
    fn test_request_body_uses_call_language() {
        let image = ImageData {
            filename: "page.png".to_string(),
            image_bytes: std::sync::Arc::new(vec![1, 2, 3]),
            width: 1,
            height: 1,
        };

        let body = VisionOcrClient::request_body(&image, &"ja".into());
        assert_eq!(body["requests"][0]["imageContext"]["languageHints"], json!(["ja"]));
        assert_eq!(body["requests"][0]["image"]["content"], "AQID");
    }

    #[test]
    fn test_new_requires_key() {
        let config = OcrConfig {
            api_key: None,
            endpoint: "https://example.invalid".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            VisionOcrClient::new(&config, None),
            Err(OcrError::NotConfigured)
        ));
    }
}
