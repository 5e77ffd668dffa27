use crate::error::{Result, VectorStoreError};
use crate::paths::write_atomic;
use crate::types::SearchHit;
use std::path::Path;

const INDEX_MAGIC: &[u8; 4] = b"DRVI";
const INDEX_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Exact (brute-force) L2 index holding one vector per chunk, aligned by position.
///
/// Vectors are stored row-major in a single flat buffer; the first vector added
/// fixes the dimension for the lifetime of the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Empty index whose dimension is fixed by the first vector added
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty index with a known dimension
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
        }
    }

    /// Append vectors in order. Nothing is added unless every vector matches
    /// the index dimension.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dimension = self.dimension.unwrap_or(first.len());
        if dimension == 0 {
            return Err(VectorStoreError::InvalidArgument(
                "vectors must have at least one dimension".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        self.dimension = Some(dimension);
        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// The `min(k, len)` nearest positions by squared Euclidean distance,
    /// ascending, ties broken by lower position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(VectorStoreError::InvalidArgument(
                "k must be a positive integer".to_string(),
            ));
        }
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if self.data.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(position, vector)| SearchHit {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        let by_distance = |a: &SearchHit, b: &SearchHit| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.position.cmp(&b.position))
        };
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance);
            hits.truncate(k);
        }
        hits.sort_by(by_distance);
        Ok(hits)
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        let start = position.checked_mul(dimension)?;
        self.data.get(start..start + dimension)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.dimension {
            Some(dimension) if dimension > 0 => self.data.len() / dimension,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Drop every vector at or past `len`
    pub fn truncate(&mut self, len: usize) {
        if let Some(dimension) = self.dimension {
            self.data.truncate(len.saturating_mul(dimension));
        }
    }

    /// Load from the binary index file. A missing file is an empty index.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No index file at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(err) => return Err(err.into()),
        };
        let index =
            decode_index(&bytes).map_err(|reason| VectorStoreError::corrupt(path, reason))?;
        log::info!(
            "Loaded {} vectors ({}d) from {}",
            index.len(),
            index.dimension.unwrap_or(0),
            path.display()
        );
        Ok(index)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_atomic(path.as_ref(), &encode_index(self)).await
    }
}

/// Squared Euclidean distance
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn encode_index(index: &VectorIndex) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + index.data.len() * 4);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    let dim = index.dimension.unwrap_or(0) as u32;
    out.extend_from_slice(&dim.to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for v in &index.data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode_index(bytes: &[u8]) -> std::result::Result<VectorIndex, String> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != INDEX_MAGIC {
        return Err("missing index header".to_string());
    }
    let version = read_u32(&bytes[4..8]);
    if version != INDEX_FORMAT_VERSION {
        return Err(format!(
            "unsupported index format version {version} (expected {INDEX_FORMAT_VERSION})"
        ));
    }
    let dim = read_u32(&bytes[8..12]) as usize;
    let count = usize::try_from(u64::from_le_bytes(
        bytes[12..20].try_into().map_err(|_| "bad count field")?,
    ))
    .map_err(|_| "vector count does not fit in memory".to_string())?;

    let expected_len = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| "index size overflows".to_string())?;
    if bytes.len() != expected_len {
        return Err(format!(
            "expected {expected_len} bytes for {count} vectors of {dim} dimensions, found {}",
            bytes.len()
        ));
    }

    let data: Vec<f32> = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .collect();
    let dimension = if dim == 0 { None } else { Some(dim) };
    Ok(VectorIndex { dimension, data })
}

fn read_u32(raw: &[u8]) -> u32 {
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}
