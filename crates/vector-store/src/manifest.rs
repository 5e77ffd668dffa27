use crate::error::{Result, VectorStoreError};
use crate::paths::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const STORE_MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Identity of the embedding space a store was built in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub schema_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
}

impl StoreManifest {
    #[must_use]
    pub fn new(embedding_model: impl Into<String>, dimension: usize, chunk_count: usize) -> Self {
        Self {
            schema_version: STORE_MANIFEST_SCHEMA_VERSION,
            embedding_model: embedding_model.into(),
            dimension,
            chunk_count,
        }
    }

    /// `None` when no manifest has been written yet
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let manifest: Self = serde_json::from_slice(&bytes)
            .map_err(|err| VectorStoreError::corrupt(path, err.to_string()))?;
        if manifest.schema_version != STORE_MANIFEST_SCHEMA_VERSION {
            return Err(VectorStoreError::corrupt(
                path,
                format!(
                    "unsupported schema_version {} (expected {STORE_MANIFEST_SCHEMA_VERSION})",
                    manifest.schema_version
                ),
            ));
        }
        Ok(Some(manifest))
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path.as_ref(), &bytes).await
    }
}
