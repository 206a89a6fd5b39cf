//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::invoice::rules::Taxonomy;

/// Public registry endpoint; the CNPJ is appended as a path segment.
pub const DEFAULT_LOOKUP_URL: &str = "https://brasilapi.com.br/api/cnpj/v1";

/// Main configuration for an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfeConfig {
    /// Field and item extraction.
    pub extraction: ExtractionConfig,

    /// Registry lookups.
    pub lookup: LookupConfig,

    /// Document loading.
    pub source: SourceConfig,
}

/// Field and item extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Material category set.
    pub taxonomy: Taxonomy,

    /// Rebuild items line by line when no structured strategy finds any.
    pub manual_fallback: bool,

    /// Drop items whose description repeats an earlier one. Only honored
    /// under the reduced taxonomy.
    pub deduplicate_items: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            taxonomy: Taxonomy::Reduced,
            manual_fallback: true,
            deduplicate_items: true,
        }
    }
}

impl ExtractionConfig {
    /// Whether items are deduplicated by description for this run.
    pub fn deduplicates_items(&self) -> bool {
        self.deduplicate_items && self.taxonomy == Taxonomy::Reduced
    }
}

/// Registry lookup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Query the registry at all.
    pub enabled: bool,

    /// Registry base URL.
    pub base_url: String,

    /// Pause before every network call, in milliseconds.
    pub min_delay_ms: u64,

    /// Upper bound for the delay after rate limiting.
    pub max_delay_ms: u64,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// On HTTP 429 double the delay and try once more.
    pub retry_on_rate_limit: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_LOOKUP_URL.to_string(),
            min_delay_ms: 300,
            max_delay_ms: 5000,
            timeout_secs: 20,
            retry_on_rate_limit: true,
        }
    }
}

/// Document loading configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Below this many characters the primary PDF backend's text is
    /// discarded and the fallback backend is tried.
    pub min_text_length: usize,

    /// Suffix of the optional table sidecar next to each document.
    pub tables_suffix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            tables_suffix: ".tables.json".to_string(),
        }
    }
}

impl NfeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = NfeConfig::default();
        assert_eq!(config.extraction.taxonomy, Taxonomy::Reduced);
        assert_eq!(config.lookup.min_delay_ms, 300);
        assert_eq!(config.lookup.timeout_secs, 20);
        assert_eq!(config.lookup.base_url, DEFAULT_LOOKUP_URL);
        assert!(config.extraction.deduplicates_items());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: NfeConfig =
            serde_json::from_str(r#"{"extraction": {"taxonomy": "full"}, "lookup": {"enabled": false}}"#)
                .unwrap();
        assert_eq!(config.extraction.taxonomy, Taxonomy::Full);
        assert!(config.extraction.manual_fallback);
        assert!(!config.lookup.enabled);
        assert_eq!(config.lookup.max_delay_ms, 5000);
        assert!(!config.extraction.deduplicates_items());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NfeConfig::default();
        config.lookup.min_delay_ms = 1000;
        config.source.min_text_length = 10;
        config.save(&path).unwrap();

        assert_eq!(NfeConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = NfeConfig::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
