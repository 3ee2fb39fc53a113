use crate::core::errors::ConfigError;
use crate::core::types::LanguageTag;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Size bound for a single translation request, in UTF-16 code units
pub const DEFAULT_CHUNK_THRESHOLD: usize = 5000;
pub const DEFAULT_SOURCE_LANGUAGE: &str = "zh-CN";
pub const DEFAULT_TARGET_LANGUAGE: &str = "ko";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Fallback languages used when preferences leave a field unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDefaults {
    /// Source language; also selects the fallback split rule. Default `zh-CN`.
    pub source: LanguageTag,
    /// Target language. Default `ko`.
    pub target: LanguageTag,
}

impl Default for LanguageDefaults {
    fn default() -> Self {
        Self {
            source: LanguageTag::new(DEFAULT_SOURCE_LANGUAGE),
            target: LanguageTag::new(DEFAULT_TARGET_LANGUAGE),
        }
    }
}

/// Settings the text pipeline and translation orchestrator consume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub languages: LanguageDefaults,
    /// Texts longer than this are chunked by paragraph, then by sentence.
    /// Default 5000.
    pub chunk_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            languages: LanguageDefaults::default(),
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }
}

/// Translation backend configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub max_retries: u32,
    pub timeout: Duration,
}

/// OCR backend configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
}

/// Translation cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub cache_dir: String,
    pub max_entries: usize,
    pub save_interval: Duration,
}

/// Usage limits and local preference storage
#[derive(Debug, Clone)]
pub struct UsageConfig {
    pub ocr_limit: Option<u64>,
    pub preferences_file: Option<String>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub translation: TranslationConfig,
    pub ocr: OcrConfig,
    pub cache: CacheConfig,
    pub usage: UsageConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let log_level = get("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: parse_or(&get, "SERVER_PORT", 1430)?,
                host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                log_level,
            },
            pipeline: PipelineConfig {
                languages: LanguageDefaults {
                    source: get("DEFAULT_SOURCE_LANGUAGE")
                        .map(LanguageTag::from)
                        .unwrap_or_else(|| LanguageTag::new(DEFAULT_SOURCE_LANGUAGE)),
                    target: get("DEFAULT_TARGET_LANGUAGE")
                        .map(LanguageTag::from)
                        .unwrap_or_else(|| LanguageTag::new(DEFAULT_TARGET_LANGUAGE)),
                },
                chunk_threshold: parse_or(&get, "CHUNK_THRESHOLD", DEFAULT_CHUNK_THRESHOLD)?,
            },
            translation: TranslationConfig {
                api_key: get("TRANSLATION_API_KEY"),
                model: get("TRANSLATION_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
                endpoint: get("TRANSLATION_ENDPOINT").unwrap_or_else(|| {
                    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
                }),
                max_retries: parse_or(&get, "MAX_RETRIES", 3)?,
                timeout: Duration::from_secs(parse_or(&get, "API_TIMEOUT_SECONDS", 60)?),
            },
            ocr: OcrConfig {
                api_key: get("VISION_API_KEY"),
                endpoint: get("VISION_ENDPOINT").unwrap_or_else(|| {
                    "https://vision.googleapis.com/v1/images:annotate".to_string()
                }),
                timeout: Duration::from_secs(parse_or(&get, "OCR_TIMEOUT_SECONDS", 30)?),
            },
            cache: CacheConfig {
                enabled: parse_or(&get, "CACHE_ENABLED", true)?,
                cache_dir: get("CACHE_DIR").unwrap_or_else(|| ".cache".to_string()),
                max_entries: parse_or(&get, "CACHE_MAX_ENTRIES", 10_000)?,
                save_interval: Duration::from_secs(parse_or(&get, "CACHE_SAVE_INTERVAL_SECONDS", 30)?),
            },
            usage: UsageConfig {
                ocr_limit: get("OCR_DAILY_LIMIT")
                    .map(|s| {
                        s.parse()
                            .map_err(|_| ConfigError::EnvVarError(format!("OCR_DAILY_LIMIT={}", s)))
                    })
                    .transpose()?,
                preferences_file: get("PREFERENCES_FILE"),
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.pipeline.chunk_threshold) {
            return Err(ConfigError::InvalidChunkThreshold(self.pipeline.chunk_threshold));
        }

        if self.pipeline.languages.source.as_str().is_empty() {
            return Err(ConfigError::EmptyLanguage { field: "DEFAULT_SOURCE_LANGUAGE" });
        }
        if self.pipeline.languages.target.as_str().is_empty() {
            return Err(ConfigError::EmptyLanguage { field: "DEFAULT_TARGET_LANGUAGE" });
        }

        if self.translation.timeout.is_zero() {
            return Err(ConfigError::InvalidTranslationConfig(
                "API_TIMEOUT_SECONDS must be > 0".to_string(),
            ));
        }

        if self.cache.enabled {
            if self.cache.max_entries == 0 {
                return Err(ConfigError::InvalidCacheConfig(
                    "CACHE_MAX_ENTRIES must be > 0 when the cache is enabled".to_string(),
                ));
            }

            let cache_path = Path::new(&self.cache.cache_dir);
            if let Some(parent) = cache_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ConfigError::InvalidCacheConfig(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn chunk_threshold(&self) -> usize {
        self.pipeline.chunk_threshold
    }

    pub fn languages(&self) -> &LanguageDefaults {
        &self.pipeline.languages
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::EnvVarError(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.chunk_threshold(), 5000);
        assert_eq!(config.languages().source.as_str(), "zh-CN");
        assert_eq!(config.languages().target.as_str(), "ko");
        assert_eq!(config.server_port(), 1430);
        assert_eq!(config.log_level(), Level::INFO);
        assert!(config.translation.api_key.is_none());
        assert!(config.usage.ocr_limit.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DEFAULT_SOURCE_LANGUAGE", "ja"),
            ("CHUNK_THRESHOLD", "1200"),
            ("LOG_LEVEL", "debug"),
            ("OCR_DAILY_LIMIT", "20"),
            ("TRANSLATION_API_KEY", "  "),
        ])
        .unwrap();

        assert_eq!(config.languages().source.as_str(), "ja");
        assert_eq!(config.chunk_threshold(), 1200);
        assert_eq!(config.log_level(), Level::DEBUG);
        assert_eq!(config.usage.ocr_limit, Some(20));
        assert!(config.translation.api_key.is_none());
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let err = config_from(&[("CHUNK_THRESHOLD", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarError(_)));
    }

    #[test]
    fn test_validate_threshold() {
        let config = config_from(&[("CHUNK_THRESHOLD", "0")]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChunkThreshold(0))
        ));
    }
}
