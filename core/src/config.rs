use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{DocumentStore, FileDocumentStore, MemoryDocumentStore, DEFAULT_COLLECTION};

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DIR_NAME: &str = ".docket";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Memory,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Defaults to `~/.docket`.
    pub data_dir: Option<PathBuf>,
    pub collection: String,
    /// Pick up changes other processes make to the data files.
    pub watch: bool,
    pub backend: Backend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            collection: DEFAULT_COLLECTION.to_string(),
            watch: true,
            backend: Backend::File,
        }
    }
}

pub fn default_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home_dir.join(DEFAULT_DIR_NAME))
}

impl Config {
    /// Reads `path`, or `~/.docket/config.toml` when none is given.
    /// An explicit path must exist; the default one may be absent.
    #[tracing::instrument]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_dir()?.join(CONFIG_FILE_NAME), false),
        };

        if !path.exists() {
            if required {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        if config.collection.trim().is_empty() {
            return Err(anyhow!("collection name must not be empty"));
        }
        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_dir(),
        }
    }

    pub fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
        match self.backend {
            Backend::Memory => {
                warn!("memory backend selected; tasks will not outlive this process");
                Ok(Arc::new(MemoryDocumentStore::new()))
            }
            Backend::File => {
                let dir = self.data_dir()?;
                let store = FileDocumentStore::open(&dir)
                    .with_context(|| format!("failed to open data directory {}", dir.display()))?;
                if self.watch {
                    if let Err(e) = store.watch() {
                        warn!(error = %e, "continuing without external change detection");
                    }
                }
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = Config::parse("watch = false\n").unwrap();
        assert!(!config.watch);
        assert_eq!(config.collection, "tasks");
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
data_dir = "/tmp/docket"
collection = "chores"
backend = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/docket")));
        assert_eq!(config.collection, "chores");
        assert_eq!(config.backend, Backend::Memory);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Config::parse("collection = \"  \"").is_err());
        assert!(Config::parse("backend = \"cloud\"").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "collection = \"work\"\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().collection, "work");
    }
}
