use crate::novel::metadata::{MetadataSchema, SchemaError};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid WORKBENCH_BACKEND '{0}', expected 'remote' or 'local'")]
    InvalidBackend(String),

    #[error("invalid {key}='{value}': {reason}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid WORKBENCH_METADATA_SCHEMA: {0}")]
    Schema(#[from] SchemaError),
}

/// Where documents, characters and generation come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    /// Everything goes through the novel server.
    #[default]
    Remote,
    /// Documents and characters in process; models straight from Ollama.
    Local,
}

impl FromStr for BackendMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendMode,
    /// Base URL of the novel server (remote mode)
    pub server_url: String,
    /// Base URL of the Ollama API (local mode)
    pub ollama_url: String,
    /// Directory local exports are written to
    pub export_dir: PathBuf,
    /// Model preselected when the model list contains it
    pub default_model: Option<String>,
    pub metadata_schema: MetadataSchema,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env_str = |key: &str, default: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            backend: env_str("WORKBENCH_BACKEND", "remote").parse()?,
            server_url: base_url(
                "WORKBENCH_SERVER_URL",
                env_str("WORKBENCH_SERVER_URL", "http://127.0.0.1:5000"),
            )?,
            ollama_url: base_url(
                "OLLAMA_BASE_URL",
                env_str("OLLAMA_BASE_URL", "http://localhost:11434"),
            )?,
            export_dir: PathBuf::from(env_str("WORKBENCH_EXPORT_DIR", "exports")),
            default_model: lookup("WORKBENCH_DEFAULT_MODEL")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            metadata_schema: env_str("WORKBENCH_METADATA_SCHEMA", "prompt-library").parse()?,
        })
    }
}

/// Checks the URL parses and drops any trailing slash so paths can be joined.
fn base_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    match reqwest::Url::parse(&value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            Ok(value.trim_end_matches('/').to_string())
        }
        Ok(url) => Err(ConfigError::InvalidUrl {
            key,
            reason: format!("unsupported scheme '{}'", url.scheme()),
            value,
        }),
        Err(err) => Err(ConfigError::InvalidUrl {
            key,
            reason: err.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_point_at_a_local_novel_server() {
        let config = config(&[]).expect("defaults should be valid");
        assert_eq!(config.backend, BackendMode::Remote);
        assert_eq!(config.server_url, "http://127.0.0.1:5000");
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.export_dir, PathBuf::from("exports"));
        assert_eq!(config.default_model, None);
        assert_eq!(config.metadata_schema, MetadataSchema::prompt_library_revision());
    }

    #[test]
    fn overrides_are_trimmed_and_normalized() {
        let config = config(&[
            ("WORKBENCH_BACKEND", " Local "),
            ("OLLAMA_BASE_URL", "http://gpu-box:11434/"),
            ("WORKBENCH_DEFAULT_MODEL", " llama3 "),
            ("WORKBENCH_METADATA_SCHEMA", "glossary"),
        ])
        .expect("overrides should be valid");
        assert_eq!(config.backend, BackendMode::Local);
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.default_model.as_deref(), Some("llama3"));
        assert_eq!(config.metadata_schema, MetadataSchema::glossary_revision());
    }

    #[test]
    fn blank_default_model_means_none() {
        let config = config(&[("WORKBENCH_DEFAULT_MODEL", "  ")]).expect("config should load");
        assert_eq!(config.default_model, None);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert_eq!(
            config(&[("WORKBENCH_BACKEND", "cloud")]).map(|_| ()),
            Err(ConfigError::InvalidBackend("cloud".to_string()))
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = config(&[("WORKBENCH_SERVER_URL", "ftp://example.com")])
            .map(|_| ())
            .expect_err("ftp should be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                key: "WORKBENCH_SERVER_URL",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_schema() {
        let err = config(&[("WORKBENCH_METADATA_SCHEMA", "characters")])
            .map(|_| ())
            .expect_err("entry without a label should be rejected");
        assert!(matches!(err, ConfigError::Schema(_)));
    }
}
