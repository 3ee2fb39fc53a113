// Main entry point for the reading workflow server

use reading_workflow::{
    core::{
        errors::{OcrError, OcrResult, TranslationError, TranslationResult},
        Config, LanguageDefaults,
    },
    orchestration::{TextPipeline, TranslationOrchestrator},
    services::{
        JsonFilePreferences, LlmTranslator, LocalUsageCounter, OcrEngine, PreferencesSource,
        StaticPreferences, TranslatedBatch, TranslationCache, Translator, VisionOcrClient,
    },
    utils::Metrics,
    ImageData, LanguageTag, ProcessOptions, ProcessOutcome, ProcessedText, ProcessingMode,
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    pipeline: Arc<TextPipeline>,
    orchestrator: Arc<TranslationOrchestrator>,
    preferences: Arc<dyn PreferencesSource>,
    usage: Arc<LocalUsageCounter>,
    languages: LanguageDefaults,
    cache: Option<TranslationCache>,
    metrics: Metrics,
}

/// Stand-in when VISION_API_KEY is unset; every capture degrades
struct UnconfiguredOcr;

#[async_trait]
impl OcrEngine for UnconfiguredOcr {
    async fn extract_text(&self, _image: &ImageData, _language: &LanguageTag) -> OcrResult<String> {
        Err(OcrError::NotConfigured)
    }
}

/// Stand-in when TRANSLATION_API_KEY is unset; every translation degrades
struct UnconfiguredTranslator;

#[async_trait]
impl Translator for UnconfiguredTranslator {
    async fn translate(&self, _text: &str, _source: &LanguageTag, _target: &LanguageTag) -> TranslationResult<TranslatedBatch> {
        Err(TranslationError::NotConfigured)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "reading_workflow={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== READING WORKFLOW ===");
    info!(
        "Config: source={} target={} chunk_threshold={} cache={}",
        config.languages().source,
        config.languages().target,
        config.chunk_threshold(),
        if config.cache.enabled { "ON" } else { "OFF" }
    );

    let metrics = Metrics::new();

    let ocr: Arc<dyn OcrEngine> =
        match VisionOcrClient::new(&config.ocr, Some(metrics.clone())) {
            Ok(client) => Arc::new(client),
            Err(OcrError::NotConfigured) => {
                warn!("VISION_API_KEY not set, captures will return empty results");
                Arc::new(UnconfiguredOcr)
            }
            Err(e) => return Err(e.into()),
        };

    let translator: Arc<dyn Translator> =
        match LlmTranslator::new(&config.translation, None, Some(metrics.clone())) {
            Ok(client) => Arc::new(client),
            Err(TranslationError::NotConfigured) => {
                warn!("TRANSLATION_API_KEY not set, translations will be empty");
                Arc::new(UnconfiguredTranslator)
            }
            Err(e) => return Err(e.into()),
        };

    let preferences: Arc<dyn PreferencesSource> = match config.usage.preferences_file {
        Some(ref path) => {
            info!("Reading preferences from {}", path);
            Arc::new(JsonFilePreferences::new(path))
        }
        None => Arc::new(StaticPreferences::default()),
    };

    let usage = Arc::new(LocalUsageCounter::new(config.usage.ocr_limit));

    let pipeline = TextPipeline::new(ocr, preferences.clone(), usage.clone(), &config.pipeline)
        .with_metrics(metrics.clone());

    let mut orchestrator =
        TranslationOrchestrator::new(translator, &config.pipeline).with_metrics(metrics.clone());

    let cache = if config.cache.enabled {
        info!("Initializing translation cache in {}", config.cache.cache_dir);
        let cache = TranslationCache::persistent(
            &config.cache.cache_dir,
            config.cache.max_entries,
            config.cache.save_interval,
            Some(metrics.clone()),
        )
        .await?;
        orchestrator = orchestrator.with_cache(cache.clone());
        Some(cache)
    } else {
        None
    };

    let state = AppState {
        pipeline: Arc::new(pipeline),
        orchestrator: Arc::new(orchestrator),
        preferences,
        usage,
        languages: config.languages().clone(),
        cache: cache.clone(),
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/process", post(process_capture))
        .route("/translate", post(translate_text))
        .with_state(state)
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /          - Root endpoint");
    info!("  GET  /health    - Health check");
    info!("  GET  /metrics   - Prometheus metrics");
    info!("  GET  /stats     - Detailed statistics");
    info!("  POST /process   - OCR and segment a capture (multipart/form-data)");
    info!("  POST /translate - Translate text (JSON)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(cache) = cache {
        if let Err(e) = cache.save().await {
            error!("Failed to save translation cache on shutdown: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

async fn root() -> &'static str {
    "Reading Workflow - capture, segment, translate"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "captures_used": state.usage.used(),
        "capture_limit": state.usage.limit(),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.metrics.record_endpoint_request("/stats");
    let snapshot = state.metrics.snapshot();
    let mut value = serde_json::to_value(snapshot).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })?;

    value["captures_used"] = serde_json::json!(state.usage.used());
    value["cached_translations"] = serde_json::json!(state.cache.as_ref().map_or(0, |c| c.len()));

    Ok(Json(value))
}

#[derive(Serialize)]
struct ProcessResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation_status: Option<&'static str>,
    #[serde(flatten)]
    result: ProcessedText,
}

fn parse_flag(name: &str, value: &str) -> Result<bool, (StatusCode, String)> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("Invalid value for {}: {}", name, other),
        )),
    }
}

/// Process one capture
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": the captured image (PNG/JPEG/WebP)
/// - Fields "mode", "display_mode" (JSON string value), "count_usage",
///   "allow_over_limit", "translate" (all optional)
///
/// # Response:
/// - ProcessedText JSON plus `status`; `translation_status` when translated
async fn process_capture(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, (StatusCode, String)> {
    let start_time = std::time::Instant::now();
    state.metrics.record_endpoint_request("/process");

    let mut image = None;
    let mut options = ProcessOptions::default();
    let mut translate = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("capture.png").to_string();

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;

                image = Some(
                    ImageData::decode(filename, data.to_vec())
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
                );
            }
            "mode" | "display_mode" | "count_usage" | "allow_over_limit" | "translate" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Field read error: {}", e)))?;

                match name.as_str() {
                    "mode" => {
                        options.mode = value
                            .parse::<ProcessingMode>()
                            .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
                    }
                    "display_mode" => {
                        options.display_mode = serde_json::from_value(serde_json::Value::String(value.trim().to_string()))
                            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid display_mode: {}", e)))?;
                    }
                    "count_usage" => options.count_usage = parse_flag(&name, &value)?,
                    "allow_over_limit" => options.allow_over_limit = parse_flag(&name, &value)?,
                    _ => translate = parse_flag(&name, &value)?,
                }
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| (StatusCode::BAD_REQUEST, "No image provided".to_string()))?;

    info!(
        "Processing {} ({}x{}) in {:?} mode",
        image.filename, image.width, image.height, options.mode
    );

    let outcome = state.pipeline.process(&image, options).await;
    let status = outcome.status();
    let reason = match outcome {
        ProcessOutcome::Degraded { ref reason, .. } => Some(reason.clone()),
        _ => None,
    };
    let mut result = outcome.into_processed_text();
    let mut translation_status = None;

    if translate && !result.units.is_empty() {
        match state.orchestrator.translate_units(&result).await {
            Ok(translated) => {
                result = translated;
                translation_status = Some("translated");
            }
            Err(e) => {
                warn!("Translation of {} failed, returning original text: {}", image.filename, e);
                translation_status = Some("degraded");
            }
        }
    }

    info!(
        "Request completed in {:.2}s: {} ({} units)",
        start_time.elapsed().as_secs_f64(),
        status,
        result.units.len()
    );

    Ok(Json(ProcessResponse {
        status,
        reason,
        translation_status,
        result,
    }))
}

#[derive(Deserialize)]
struct TranslateRequest {
    text: String,
    source_language: Option<LanguageTag>,
    target_language: Option<LanguageTag>,
}

#[derive(Serialize)]
struct TranslateResponse {
    translated_text: String,
    status: &'static str,
}

/// Translate free text with chunking
async fn translate_text(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Json<TranslateResponse> {
    state.metrics.record_endpoint_request("/translate");

    let stored = state.preferences.preferences().await.unwrap_or_else(|e| {
        warn!("Preferences unavailable, using defaults: {}", e);
        Default::default()
    });
    let (default_source, default_target) = stored.resolve(&state.languages);

    let non_empty = |tag: Option<LanguageTag>| tag.filter(|t| !t.as_str().trim().is_empty());
    let source = non_empty(request.source_language).unwrap_or(default_source);
    let target = non_empty(request.target_language).unwrap_or(default_target);

    let outcome = state.orchestrator.translate(&request.text, &source, &target).await;

    Json(TranslateResponse {
        translated_text: outcome.text().to_string(),
        status: outcome.status(),
    })
}
