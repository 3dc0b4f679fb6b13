//! CLI configuration file
//!
//! ```toml
//! [engine]
//! poll_interval_ms = 1000
//!
//! [engine.defaults]
//! max_retries = 2
//!
//! [executor]
//! base_url = "http://localhost:11434/v1"
//! model = "llama3"
//! ```

use anyhow::{Context, Result};
use autopipe_core::EngineConfig;
use autopipe_http::HttpExecutorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub(crate) engine: EngineConfig,
    pub(crate) executor: HttpExecutorConfig,
}

impl CliConfig {
    /// Load from `path`, or defaults when no path is given
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("invalid config {}", path.display()))
    }

    pub(crate) fn parse(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.engine.validate()?;
        Ok(config)
    }

    pub(crate) fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn missing_path_means_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn nested_tables_are_read() {
        let config = CliConfig::parse(
            r#"
            [engine]
            poll_interval_ms = 250

            [engine.defaults]
            max_retries = 1

            [executor]
            model = "llama3"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.poll_interval_ms, 250);
        assert_eq!(config.engine.defaults.max_retries, 1);
        assert_eq!(config.executor.model, "llama3");
        assert_eq!(config.executor.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn engine_validation_applies() {
        let err = CliConfig::parse("[engine.completion]\nmax_tokens = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_tokens"));

        let err = CliConfig::parse("[engine]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn file_roundtrip() {
        let config = CliConfig::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", config.to_toml().unwrap()).unwrap();

        assert_eq!(CliConfig::load(Some(file.path())).unwrap(), config);
    }
}
