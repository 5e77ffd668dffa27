use crate::error::Result;
use std::path::{Path, PathBuf};

/// Store directory used when nothing else is configured
pub const DEFAULT_STORE_DIR: &str = "embeddings";

pub const CHUNKS_FILE_NAME: &str = "chunks.json";
pub const INDEX_FILE_NAME: &str = "index.bin";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const LOCK_FILE_NAME: &str = "ingest.lock";

/// On-disk layout of one knowledge base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    dir: PathBuf,
}

impl StoreLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn chunks_path(&self) -> PathBuf {
        self.dir.join(CHUNKS_FILE_NAME)
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_DIR)
    }
}

/// Write via a sibling temp file and rename, so readers never see a torn file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_joins_artifact_names() {
        let layout = StoreLayout::new("/tmp/kb");
        assert_eq!(layout.chunks_path(), PathBuf::from("/tmp/kb/chunks.json"));
        assert_eq!(layout.index_path(), PathBuf::from("/tmp/kb/index.bin"));
        assert_eq!(layout.manifest_path(), PathBuf::from("/tmp/kb/manifest.json"));
        assert_eq!(StoreLayout::default().dir(), Path::new("embeddings"));
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("chunks.json");
        write_atomic(&path, b"[]").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"[]");
        assert!(!tmp.path().join("nested").join("chunks.json.tmp").exists());
    }
}
