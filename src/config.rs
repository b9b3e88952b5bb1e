use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::SeqidError;
use crate::store::default_cache_root;

pub const CONFIG_FILE: &str = "useqid.json";
pub const DEFAULT_MAPPING_URL: &str = "https://www.uniprot.org/uploadlists/";
pub const DEFAULT_METADATA_URL: &str = "https://www.uniprot.org/batch/";
/// Largest id list the service accepts in one request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub mapping_url: Option<String>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub max_polls: Option<usize>,
    #[serde(default)]
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub mapping_url: String,
    pub metadata_url: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub max_polls: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mapping_url: DEFAULT_MAPPING_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            timeout_secs: 60,
            max_retries: 3,
            max_polls: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub transport: TransportConfig,
    pub batch_size: usize,
    pub cache_dir: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `useqid.json` in the current directory when present.
    /// Without either, every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SeqidError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SeqidError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SeqidError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SeqidError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let defaults = TransportConfig::default();

        let batch_size = config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(SeqidError::ConfigValue(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let mapping_url = validate_url(config.mapping_url, defaults.mapping_url)?;
        let metadata_url = validate_url(config.metadata_url, defaults.metadata_url)?;

        let cache_dir = match config.cache_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_cache_root()?,
        };

        Ok(ResolvedConfig {
            schema_version,
            transport: TransportConfig {
                mapping_url,
                metadata_url,
                timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
                max_retries: config.max_retries.unwrap_or(defaults.max_retries),
                max_polls: config.max_polls.unwrap_or(defaults.max_polls),
            },
            batch_size,
            cache_dir,
        })
    }
}

fn validate_url(value: Option<String>, default: String) -> Result<String, SeqidError> {
    let url = value.unwrap_or(default);
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(SeqidError::ConfigValue(format!("not an http(s) url: {url}")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = Config {
            cache_dir: Some("/tmp/useqid-cache".to_string()),
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(resolved.transport, TransportConfig::default());
        assert_eq!(resolved.cache_dir, Utf8PathBuf::from("/tmp/useqid-cache"));
    }
}
