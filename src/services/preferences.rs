// Reader language preferences

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::core::config::LanguageDefaults;
use crate::core::errors::{PreferencesError, PreferencesResult};
use crate::core::types::LanguageTag;

/// Stored preferences; unset fields fall back to [`LanguageDefaults`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<LanguageTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<LanguageTag>,
}

impl Preferences {
    /// (source, target) with defaults applied. Empty tags count as unset.
    pub fn resolve(&self, defaults: &LanguageDefaults) -> (LanguageTag, LanguageTag) {
        let pick = |value: &Option<LanguageTag>, fallback: &LanguageTag| {
            value
                .as_ref()
                .filter(|tag| !tag.as_str().trim().is_empty())
                .cloned()
                .unwrap_or_else(|| fallback.clone())
        };

        (
            pick(&self.source_language, &defaults.source),
            pick(&self.target_language, &defaults.target),
        )
    }
}

#[async_trait]
pub trait PreferencesSource: Send + Sync {
    async fn preferences(&self) -> PreferencesResult<Preferences>;
}

/// Fixed preferences, for servers and tests
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences(pub Preferences);

#[async_trait]
impl PreferencesSource for StaticPreferences {
    async fn preferences(&self) -> PreferencesResult<Preferences> {
        Ok(self.0.clone())
    }
}

/// Preferences stored as a JSON file. A missing file means "all defaults".
#[derive(Debug, Clone)]
pub struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn store(&self, preferences: &Preferences) -> PreferencesResult<()> {
        let json = serde_json::to_string_pretty(preferences)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| self.write_error(source))?;
            }
        }

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: std::io::Error) -> PreferencesError {
        PreferencesError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl PreferencesSource for JsonFilePreferences {
    async fn preferences(&self) -> PreferencesResult<Preferences> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No preferences file at {}, using defaults", self.path.display());
                return Ok(Preferences::default());
            }
            Err(source) => {
                return Err(PreferencesError::ReadFailed {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_applies_defaults() {
        let defaults = LanguageDefaults::default();

        let (source, target) = Preferences::default().resolve(&defaults);
        assert_eq!(source.as_str(), "zh-CN");
        assert_eq!(target.as_str(), "ko");

        let prefs = Preferences {
            source_language: Some("ja".into()),
            target_language: Some(" ".into()),
        };
        let (source, target) = prefs.resolve(&defaults);
        assert_eq!(source.as_str(), "ja");
        assert_eq!(target.as_str(), "ko");
    }

    #[tokio::test]
    async fn test_json_file_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("reading_workflow_prefs_{}", std::process::id()))
            .join("prefs.json");
        let source = JsonFilePreferences::new(&path);

        assert_eq!(source.preferences().await.unwrap(), Preferences::default());

        let prefs = Preferences {
            source_language: Some("zh-TW".into()),
            target_language: None,
        };
        source.store(&prefs).await.unwrap();
        assert_eq!(source.preferences().await.unwrap(), prefs);

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let path = std::env::temp_dir().join(format!("reading_workflow_bad_prefs_{}.json", std::process::id()));
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = JsonFilePreferences::new(&path).preferences().await.unwrap_err();
        assert!(matches!(err, PreferencesError::Malformed(_)));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
