use crate::error::{Result, VectorStoreError};
use crate::paths::write_atomic;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

/// Append-only, positionally addressed collection of chunk texts.
///
/// A chunk's identity is its position: two chunks with identical text are
/// still distinct entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<String>,
}

impl ChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append chunks, returning the positions they were assigned
    pub fn append<I>(&mut self, chunks: I) -> Range<usize>
    where
        I: IntoIterator<Item = String>,
    {
        let start = self.chunks.len();
        self.chunks.extend(chunks);
        start..self.chunks.len()
    }

    pub fn get(&self, position: usize) -> Result<&str> {
        self.chunks
            .get(position)
            .map(String::as_str)
            .ok_or(VectorStoreError::OutOfRange {
                position,
                len: self.chunks.len(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(String::as_str)
    }

    /// Texts from `position` to the end
    #[must_use]
    pub fn tail(&self, position: usize) -> &[String] {
        self.chunks.get(position..).unwrap_or_default()
    }

    /// Load from a JSON array of strings. A missing file is an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No chunk file at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(err) => return Err(err.into()),
        };
        let chunks: Vec<String> = serde_json::from_slice(&bytes).map_err(|err| {
            VectorStoreError::corrupt(path, format!("expected a JSON array of strings: {err}"))
        })?;
        log::info!("Loaded {} chunks from {}", chunks.len(), path.display());
        Ok(Self { chunks })
    }

    /// Persist the full collection, indented with four spaces
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_json()?;
        write_atomic(path.as_ref(), &bytes).await
    }

    fn to_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.chunks.serialize(&mut serializer)?;
        Ok(out)
    }
}

impl FromIterator<String> for ChunkStore {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            chunks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn append_assigns_consecutive_positions() {
        let mut store = ChunkStore::new();
        assert_eq!(store.append(texts(&["a", "b"])), 0..2);
        assert_eq!(store.append(texts(&["c"])), 2..3);
        assert_eq!(store.append(Vec::new()), 3..3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn append_never_changes_existing_positions() {
        let mut store: ChunkStore = texts(&["first", "second"]).into_iter().collect();
        let before: Vec<String> = store.iter().map(ToString::to_string).collect();
        store.append(texts(&["third", "first"]));
        for (position, text) in before.iter().enumerate() {
            assert_eq!(store.get(position).unwrap(), text);
        }
        // Duplicate text is a distinct entry
        assert_eq!(store.get(3).unwrap(), "first");
    }

    #[test]
    fn get_past_end_is_out_of_range() {
        let store: ChunkStore = texts(&["only"]).into_iter().collect();
        let err = store.get(1).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::OutOfRange {
                position: 1,
                len: 1
            }
        ));
    }

    #[test]
    fn tail_returns_suffix() {
        let store: ChunkStore = texts(&["a", "b", "c"]).into_iter().collect();
        assert_eq!(store.tail(1), &texts(&["b", "c"])[..]);
        assert!(store.tail(3).is_empty());
        assert!(store.tail(7).is_empty());
    }

    #[tokio::test]
    async fn save_and_load_preserve_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks.json");

        let store: ChunkStore = texts(&["Alpha beta.", "Gamma \"delta\"", "ünïcode"])
            .into_iter()
            .collect();
        store.save(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.starts_with("[\n    \"Alpha beta.\""));

        let loaded = ChunkStore::load(&path).await.unwrap();
        assert_eq!(loaded, store);
    }

    #[tokio::test]
    async fn missing_file_loads_empty_and_garbage_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let missing = ChunkStore::load(tmp.path().join("absent.json")).await.unwrap();
        assert!(missing.is_empty());

        let path = tmp.path().join("chunks.json");
        tokio::fs::write(&path, b"{\"not\": \"a list\"}").await.unwrap();
        let err = ChunkStore::load(&path).await.unwrap_err();
        assert!(err.is_storage_failure());
    }
}
