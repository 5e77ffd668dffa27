use crate::error::{Result, VectorStoreError};
use fs2::FileExt;
use std::path::PathBuf;
use std::time::Instant;

/// Exclusive advisory lock on the store directory, held for one write
pub(crate) struct StoreWriteLock {
    file: std::fs::File,
}

impl Drop for StoreWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) async fn acquire_store_write_lock(path: PathBuf) -> Result<StoreWriteLock> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || -> Result<StoreWriteLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                VectorStoreError::Other(format!("open store lock {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            VectorStoreError::Other(format!("acquire store lock {}: {err}", path.display()))
        })?;
        let waited = start.elapsed().as_millis();
        if waited > 100 {
            log::debug!("Waited {waited}ms for store lock {}", path.display());
        }

        Ok(StoreWriteLock { file })
    })
    .await
    .map_err(|err| VectorStoreError::Other(format!("join store lock task: {err}")))?
}
