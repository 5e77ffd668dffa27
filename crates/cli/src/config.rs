use anyhow::{anyhow, Context, Result};
use docrag_indexer::{PipelineConfig, RebuildPolicy};
use docrag_search::DEFAULT_TOP_K;
use docrag_text_chunker::{SplitterConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use docrag_vector_store::{EmbeddingConfig, StoreLayout, DEFAULT_STORE_DIR};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "docrag.toml";
pub const STORE_DIR_ENV: &str = "DOCRAG_STORE_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub store_dir: PathBuf,
    pub chunk_size: usize,
    pub overlap: usize,
    pub default_top_k: usize,
    pub rebuild_policy: RebuildPolicy,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address for `docrag serve`
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            default_top_k: DEFAULT_TOP_K,
            rebuild_policy: RebuildPolicy::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl AppConfig {
    /// Read `path`, or `./docrag.toml` when no path is given and it exists.
    /// Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config =
            Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| anyhow!("{err}"))
    }

    /// `DOCRAG_STORE_DIR` plus the embedding variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = env::var_os(STORE_DIR_ENV) {
            self.store_dir = PathBuf::from(dir);
        }
        self.embedding
            .apply_env()
            .context("Invalid embedding environment")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.splitter_config()
            .validate()
            .context("Invalid chunking settings")?;
        if self.default_top_k == 0 {
            return Err(anyhow!("default_top_k must be a positive integer"));
        }
        if self.embedding.dimension == 0 {
            return Err(anyhow!("embedding.dimension must be a positive integer"));
        }
        Ok(())
    }

    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.store_dir)
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig::new(self.chunk_size, self.overlap)
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            splitter: self.splitter_config(),
            rebuild_policy: self.rebuild_policy,
        }
    }
}
