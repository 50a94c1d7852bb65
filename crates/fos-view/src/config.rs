//! View Configuration

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use fos_tmpl::TmplOptions;
use fos_vdom::DEFAULT_MAX_COMMIT_PASSES;

/// View configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render and attach module roots that have no real node yet
    pub force_attach: bool,

    /// Upper bound on nested frames flushed by one commit
    pub max_commit_passes: usize,

    /// Render `undefined`/`null` interpolations as empty text
    pub empty_for_undefined: bool,

    /// Default `tracing` filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            force_attach: true,
            max_commit_passes: DEFAULT_MAX_COMMIT_PASSES,
            empty_for_undefined: true,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(source: &str) -> anyhow::Result<Self> {
        serde_json::from_str(source).context("invalid view configuration")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&source).with_context(|| format!("in {}", path.display()))
    }

    /// Binder-facing subset
    pub fn tmpl_options(&self) -> TmplOptions {
        TmplOptions {
            force_attach: self.force_attach,
            empty_for_undefined: self.empty_for_undefined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.force_attach);
        assert!(config.empty_for_undefined);
        assert_eq!(config.max_commit_passes, 16);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.tmpl_options(), TmplOptions::default());
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(r#"{ "force_attach": false, "log_filter": "fos_vdom=trace" }"#).unwrap();
        assert!(!config.force_attach);
        assert_eq!(config.log_filter, "fos_vdom=trace");
        assert_eq!(config.max_commit_passes, 16);
        assert!(!config.tmpl_options().force_attach);
    }

    #[test]
    fn test_invalid_json() {
        let err = Config::from_json(r#"{ "max_commit_passes": "many" }"#).unwrap_err();
        assert!(err.to_string().contains("invalid view configuration"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_json_file("/nonexistent/fos-view.json").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
