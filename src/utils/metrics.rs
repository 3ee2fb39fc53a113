use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide counters for captures, collaborator calls and the cache.
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Translation backend
    api_calls_total: AtomicUsize,
    api_calls_success: AtomicUsize,
    api_calls_failed: AtomicUsize,
    api_tokens_input: AtomicU64,
    api_tokens_output: AtomicU64,
    api_latency_ms: RwLock<Vec<u64>>,
    circuit_breaker_trips: AtomicUsize,

    // OCR backend
    ocr_calls_success: AtomicUsize,
    ocr_calls_failed: AtomicUsize,
    ocr_latency_ms: RwLock<Vec<u64>>,

    // Chunking
    direct_translations: AtomicUsize,
    chunked_translations: AtomicUsize,
    chunks_translated: AtomicUsize,

    // Cache
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_size: AtomicUsize,

    // Capture outcomes keyed by status ("processed", "no_text", "degraded")
    capture_outcomes: DashMap<String, AtomicUsize>,
    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                api_calls_total: AtomicUsize::new(0),
                api_calls_success: AtomicUsize::new(0),
                api_calls_failed: AtomicUsize::new(0),
                api_tokens_input: AtomicU64::new(0),
                api_tokens_output: AtomicU64::new(0),
                api_latency_ms: RwLock::new(Vec::new()),
                circuit_breaker_trips: AtomicUsize::new(0),
                ocr_calls_success: AtomicUsize::new(0),
                ocr_calls_failed: AtomicUsize::new(0),
                ocr_latency_ms: RwLock::new(Vec::new()),
                direct_translations: AtomicUsize::new(0),
                chunked_translations: AtomicUsize::new(0),
                chunks_translated: AtomicUsize::new(0),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_size: AtomicUsize::new(0),
                capture_outcomes: DashMap::new(),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_api_call(&self, success: bool, duration: Duration, input_tokens: u64, output_tokens: u64) {
        self.inner.api_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.api_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.api_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.api_tokens_input.fetch_add(input_tokens, Ordering::Relaxed);
        self.inner.api_tokens_output.fetch_add(output_tokens, Ordering::Relaxed);
        self.inner.api_latency_ms.write().push(duration.as_millis() as u64);
    }

    pub fn record_circuit_breaker_trip(&self) {
        self.inner.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ocr_call(&self, success: bool, duration: Duration) {
        if success {
            self.inner.ocr_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.ocr_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.ocr_latency_ms.write().push(duration.as_millis() as u64);
    }

    pub fn record_direct_translation(&self) {
        self.inner.direct_translations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunked_translation(&self, chunks: usize) {
        self.inner.chunked_translations.fetch_add(1, Ordering::Relaxed);
        self.inner.chunks_translated.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.inner.cache_size.store(size, Ordering::Relaxed);
    }

    pub fn record_capture(&self, status: &str) {
        self.inner
            .capture_outcomes
            .entry(status.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn capture_count(&self, status: &str) -> usize {
        self.inner
            .capture_outcomes
            .get(status)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let api_latency = self.inner.api_latency_ms.read();
        let api_latency_avg_ms = avg(&api_latency);
        let api_latency_p50_ms = percentile(&api_latency, 0.5);
        let api_latency_p95_ms = percentile(&api_latency, 0.95);
        drop(api_latency);

        let ocr_latency_avg_ms = avg(&self.inner.ocr_latency_ms.read());

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        let mut endpoint_requests: Vec<(String, usize)> = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        endpoint_requests.sort();

        MetricsSnapshot {
            api_calls_total: self.inner.api_calls_total.load(Ordering::Relaxed),
            api_calls_success: self.inner.api_calls_success.load(Ordering::Relaxed),
            api_calls_failed: self.inner.api_calls_failed.load(Ordering::Relaxed),
            api_tokens_input: self.inner.api_tokens_input.load(Ordering::Relaxed),
            api_tokens_output: self.inner.api_tokens_output.load(Ordering::Relaxed),
            api_latency_avg_ms,
            api_latency_p50_ms,
            api_latency_p95_ms,
            circuit_breaker_trips: self.inner.circuit_breaker_trips.load(Ordering::Relaxed),
            ocr_calls_success: self.inner.ocr_calls_success.load(Ordering::Relaxed),
            ocr_calls_failed: self.inner.ocr_calls_failed.load(Ordering::Relaxed),
            ocr_latency_avg_ms,
            direct_translations: self.inner.direct_translations.load(Ordering::Relaxed),
            chunked_translations: self.inner.chunked_translations.load(Ordering::Relaxed),
            chunks_translated: self.inner.chunks_translated.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            cache_size: self.inner.cache_size.load(Ordering::Relaxed),
            captures_processed: self.capture_count("processed"),
            captures_without_text: self.capture_count("no_text"),
            captures_degraded: self.capture_count("degraded"),
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        let mut metric = |name: &str, kind: &str, help: &str, samples: &[(&str, String)]| {
            out.push_str(&format!("# HELP {} {}\n# TYPE {} {}\n", name, help, name, kind));
            for (labels, value) in samples {
                out.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
            }
            out.push('\n');
        };

        metric("api_calls_total", "counter", "Translation API calls", &[
            ("status=\"success\"", s.api_calls_success.to_string()),
            ("status=\"failed\"", s.api_calls_failed.to_string()),
        ]);
        metric("api_tokens_total", "counter", "Tokens exchanged with the translation API", &[
            ("direction=\"input\"", s.api_tokens_input.to_string()),
            ("direction=\"output\"", s.api_tokens_output.to_string()),
        ]);
        metric("api_latency_avg_ms", "gauge", "Average translation API latency", &[
            ("", s.api_latency_avg_ms.to_string()),
        ]);
        metric("ocr_calls_total", "counter", "OCR API calls", &[
            ("status=\"success\"", s.ocr_calls_success.to_string()),
            ("status=\"failed\"", s.ocr_calls_failed.to_string()),
        ]);
        metric("translations_total", "counter", "Orchestrated translations by path", &[
            ("path=\"direct\"", s.direct_translations.to_string()),
            ("path=\"chunked\"", s.chunked_translations.to_string()),
        ]);
        metric("chunks_translated_total", "counter", "Chunks sent on the long-text path", &[
            ("", s.chunks_translated.to_string()),
        ]);
        metric("cache_hit_rate", "gauge", "Translation cache hit rate (0.0 to 1.0)", &[
            ("", s.cache_hit_rate.to_string()),
        ]);
        metric("cache_size", "gauge", "Translation cache entries", &[("", s.cache_size.to_string())]);
        metric("captures_total", "counter", "Image captures by outcome", &[
            ("outcome=\"processed\"", s.captures_processed.to_string()),
            ("outcome=\"no_text\"", s.captures_without_text.to_string()),
            ("outcome=\"degraded\"", s.captures_degraded.to_string()),
        ]);
        metric("circuit_breaker_trips_total", "counter", "Requests rejected by the open circuit", &[
            ("", s.circuit_breaker_trips.to_string()),
        ]);
        metric("uptime_seconds", "counter", "Application uptime in seconds", &[
            ("", s.uptime_seconds.to_string()),
        ]);

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub api_calls_total: usize,
    pub api_calls_success: usize,
    pub api_calls_failed: usize,
    pub api_tokens_input: u64,
    pub api_tokens_output: u64,
    pub api_latency_avg_ms: u64,
    pub api_latency_p50_ms: u64,
    pub api_latency_p95_ms: u64,
    pub circuit_breaker_trips: usize,
    pub ocr_calls_success: usize,
    pub ocr_calls_failed: usize,
    pub ocr_latency_avg_ms: u64,
    pub direct_translations: usize,
    pub chunked_translations: usize,
    pub chunks_translated: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub captures_processed: usize,
    pub captures_without_text: usize,
    pub captures_degraded: usize,
    pub endpoint_requests: Vec<(String, usize)>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
