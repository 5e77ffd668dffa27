use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array1, Array2, ArrayD, Axis, Ix2, Ix3};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

pub const EMBEDDING_MODE_ENV: &str = "DOCRAG_EMBEDDING_MODE";
pub const EMBEDDING_MODEL_ENV: &str = "DOCRAG_EMBEDDING_MODEL";
pub const MODEL_DIR_ENV: &str = "DOCRAG_MODEL_DIR";

pub const DEFAULT_MODEL_ID: &str = "all-minilm-l6-v2";
pub const DEFAULT_DIMENSION: usize = 384;
pub const STUB_MODEL_ID: &str = "stub";

/// Text → fixed-length vector capability shared by ingestion and retrieval.
///
/// Queries and chunks must go through the same embedder for distances to be
/// meaningful.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in the store manifest
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(vec![text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    #[default]
    Onnx,
    Stub,
}

impl FromStr for EmbeddingMode {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::EmbeddingError(format!(
                "Unsupported embedding mode '{other}' (expected 'onnx' or 'stub')"
            ))),
        }
    }
}

impl fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Onnx => "onnx",
            Self::Stub => "stub",
        })
    }
}

/// Which embedder to build and where its assets live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,

    /// Model id; assets are read from `<model_dir>/<model>/`
    pub model: String,

    /// Defaults to `./models`
    pub model_dir: Option<PathBuf>,

    pub dimension: usize,

    /// Token budget per text; longer inputs are truncated
    pub max_length: usize,

    /// Texts per forward pass
    pub max_batch: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::default(),
            model: DEFAULT_MODEL_ID.to_string(),
            model_dir: None,
            dimension: DEFAULT_DIMENSION,
            max_length: 256,
            max_batch: 32,
        }
    }
}

impl EmbeddingConfig {
    /// Deterministic hashing embedder, for tests and offline use
    #[must_use]
    pub fn stub() -> Self {
        Self {
            mode: EmbeddingMode::Stub,
            ..Self::default()
        }
    }

    /// Overlay `DOCRAG_EMBEDDING_MODE`, `DOCRAG_EMBEDDING_MODEL` and `DOCRAG_MODEL_DIR`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = env::var(EMBEDDING_MODE_ENV) {
            self.mode = raw.parse()?;
        }
        if let Ok(model) = env::var(EMBEDDING_MODEL_ENV) {
            self.model = model.trim().to_ascii_lowercase();
        }
        if let Ok(dir) = env::var(MODEL_DIR_ENV) {
            self.model_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    #[must_use]
    pub fn resolved_model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("models"))
    }
}

/// Build the embedder described by `config`
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.mode {
        EmbeddingMode::Stub => Ok(Arc::new(StubEmbedder::new(config.dimension))),
        EmbeddingMode::Onnx => Ok(Arc::new(OnnxEmbedder::load(config)?)),
    }
}

/// Feature-hashing bag-of-words embedder.
///
/// Every lowercase alphanumeric token is hashed into one signed bucket and the
/// result is L2-normalised, so texts sharing words land close together.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vec;
        }
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let token = token.to_lowercase();
            let mut state = fnv1a_64(token.as_bytes());
            let bits = splitmix64(&mut state);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (bits % self.dimension as u64) as usize;
            let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }
        normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
        STUB_MODEL_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

/// Sentence-transformer style embedder running an ONNX export on ONNX Runtime.
///
/// Expects `model.onnx` and `tokenizer.json` under `<model_dir>/<model>/`.
pub struct OnnxEmbedder {
    backend: Arc<OnnxBackend>,
    model_id: String,
}

struct OnnxBackend {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_batch: usize,
    dimension: usize,
}

impl OnnxEmbedder {
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let dir = config.resolved_model_dir().join(&config.model);
        let backend = OnnxBackend::new(&dir, config)?;
        Ok(Self {
            backend: Arc::new(backend),
            model_id: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.backend.dimension
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let backend = self.backend.clone();
        spawn_blocking(move || backend.embed_blocking(&texts))
            .await
            .map_err(|e| VectorStoreError::EmbeddingError(format!("Join error: {e}")))?
    }
}

impl OnnxBackend {
    fn new(dir: &Path, config: &EmbeddingConfig) -> Result<Self> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let model_path = dir.join("model.onnx");
        let tokenizer_path = dir.join("tokenizer.json");
        if !model_path.exists() || !tokenizer_path.exists() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Model files for '{}' are missing. Expected ONNX at {} and tokenizer at {} (set {MODEL_DIR_ENV} or use {EMBEDDING_MODE_ENV}=stub).",
                config.model,
                model_path.display(),
                tokenizer_path.display(),
            )));
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Tokenizer truncation failed: {e}"))
            })?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1);
        let session = Session::builder()
            .map_err(to_embedding_error)?
            .with_intra_threads(threads)
            .map_err(to_embedding_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(to_embedding_error)?
            .commit_from_file(&model_path)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to load ONNX model: {e}"))
            })?;

        log::info!(
            "Loaded ONNX model '{}' (dim {}, max_length {}, batch {})",
            config.model,
            config.dimension,
            config.max_length,
            config.max_batch
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_batch: config.max_batch.max(1),
            dimension: config.dimension,
        })
    }

    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch) {
            let encodings = self
                .tokenizer
                .encode_batch(batch.to_vec(), true)
                .map_err(|e| {
                    VectorStoreError::EmbeddingError(format!("Tokenization failed: {e}"))
                })?;
            if encodings.is_empty() {
                continue;
            }

            let seq_len = encodings.iter().map(Encoding::len).max().unwrap_or(0);
            let ids = token_matrix(&encodings, seq_len, Encoding::get_ids);
            let mask = token_matrix(&encodings, seq_len, Encoding::get_attention_mask);
            let type_ids = token_matrix(&encodings, seq_len, Encoding::get_type_ids);

            let mut available: HashMap<String, DynTensor> = HashMap::new();
            available.insert("input_ids".to_string(), to_tensor(ids)?);
            available.insert("attention_mask".to_string(), to_tensor(mask.clone())?);
            available.insert("token_type_ids".to_string(), to_tensor(type_ids)?);

            let output = {
                let mut session = self.session.lock().map_err(|_| {
                    VectorStoreError::EmbeddingError("Failed to lock ONNX session".into())
                })?;

                let mut feed: HashMap<String, DynTensor> = HashMap::new();
                for input in &session.inputs {
                    let tensor = available.remove(&input.name).ok_or_else(|| {
                        VectorStoreError::EmbeddingError(format!(
                            "Unsupported ONNX input '{}'",
                            input.name
                        ))
                    })?;
                    feed.insert(input.name.clone(), tensor);
                }

                let outputs = session.run(SessionInputs::from(feed)).map_err(|e| {
                    VectorStoreError::EmbeddingError(format!("ONNX forward failed: {e}"))
                })?;
                if outputs.len() == 0 {
                    return Err(VectorStoreError::EmbeddingError(
                        "ONNX returned no outputs".to_string(),
                    ));
                }
                let array = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| {
                        VectorStoreError::EmbeddingError(format!(
                            "Failed to decode ONNX output: {e}"
                        ))
                    })?
                    .to_owned();
                drop(outputs);
                array
            };

            out.extend(pool_output(output, &mask, self.dimension)?);
        }
        Ok(out)
    }
}

fn to_embedding_error(error: impl fmt::Display) -> VectorStoreError {
    VectorStoreError::EmbeddingError(format!("{error}"))
}

fn to_tensor(matrix: Array2<i64>) -> Result<DynTensor> {
    Ok(Tensor::from_array(matrix.into_dyn())
        .map_err(to_embedding_error)?
        .upcast())
}

/// `[batch, seq_len]` matrix of one per-token field, zero padded
fn token_matrix(
    encodings: &[Encoding],
    seq_len: usize,
    field: fn(&Encoding) -> &[u32],
) -> Array2<i64> {
    Array2::from_shape_fn((encodings.len(), seq_len), |(row, col)| {
        field(&encodings[row])
            .get(col)
            .map_or(0, |value| i64::from(*value))
    })
}

/// Turn model output into one unit vector per input text. Token-level output
/// (`[batch, seq, hidden]`) is mean-pooled over unmasked tokens; sentence-level
/// output (`[batch, hidden]`) is used as is.
fn pool_output(
    output: ArrayD<f32>,
    mask: &Array2<i64>,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let bad_shape =
        |e: ndarray::ShapeError| VectorStoreError::EmbeddingError(format!("Bad output shape: {e}"));
    let rows: Vec<Vec<f32>> = match output.ndim() {
        2 => output
            .into_dimensionality::<Ix2>()
            .map_err(bad_shape)?
            .outer_iter()
            .map(|row| row.to_vec())
            .collect(),
        3 => {
            let hidden = output.into_dimensionality::<Ix3>().map_err(bad_shape)?;
            hidden
                .outer_iter()
                .zip(mask.outer_iter())
                .map(|(sample, sample_mask)| {
                    let mut sum = Array1::<f32>::zeros(sample.len_of(Axis(1)));
                    let mut count = 0.0f32;
                    for (token, flag) in sample.outer_iter().zip(sample_mask.iter()) {
                        if *flag != 0 {
                            sum += &token;
                            count += 1.0;
                        }
                    }
                    if count > 0.0 {
                        sum /= count;
                    }
                    sum.to_vec()
                })
                .collect()
        }
        _ => {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Unexpected ONNX output dims: {:?}",
                output.shape()
            )));
        }
    };

    rows.into_iter()
        .map(|mut row| {
            if row.len() != dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
            normalize(&mut row);
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::squared_l2;
    use ndarray::{array, Array3};

    #[tokio::test]
    async fn stub_is_deterministic_and_normalized() {
        let embedder = StubEmbedder::new(64);
        let a = embedder.embed("Alpha beta.").await.unwrap();
        let b = embedder.embed("Alpha beta.").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn stub_places_shared_words_closer() {
        let embedder = StubEmbedder::new(256);
        let query = embedder.embed("alpha").await.unwrap();
        let related = embedder.embed("Alpha beta.").await.unwrap();
        let unrelated = embedder.embed("Gamma delta.").await.unwrap();
        assert!(squared_l2(&query, &related) < squared_l2(&query, &unrelated));
    }

    #[tokio::test]
    async fn stub_batch_matches_single_embeds() {
        let embedder = StubEmbedder::new(32);
        let batch = embedder
            .embed_batch(vec!["one".to_string(), "two words".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], embedder.embed("two words").await.unwrap());
        assert!(embedder.embed_batch(Vec::new()).await.unwrap().is_empty());
    }

    #[test]
    fn stub_of_text_without_words_is_zero() {
        let embedder = StubEmbedder::new(8);
        assert_eq!(embedder.embed_sync("  ...  "), vec![0.0; 8]);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("STUB".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Stub);
        assert_eq!(" onnx ".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Onnx);
        assert!("gpu".parse::<EmbeddingMode>().is_err());
    }

    #[test]
    fn create_stub_embedder_reports_identity() {
        let embedder = create_embedder(&EmbeddingConfig::stub()).unwrap();
        assert_eq!(embedder.model_id(), STUB_MODEL_ID);
        assert_eq!(embedder.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn onnx_without_assets_is_an_embedding_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            model_dir: Some(tmp.path().to_path_buf()),
            ..EmbeddingConfig::default()
        };
        let err = create_embedder(&config).err().unwrap();
        assert!(matches!(err, VectorStoreError::EmbeddingError(_)));
    }

    #[test]
    fn pooling_averages_unmasked_tokens() {
        let hidden: Array3<f32> = array![[[3.0, 0.0], [1.0, 0.0], [100.0, 100.0]]];
        let mask = array![[1i64, 1, 0]];
        let pooled = pool_output(hidden.into_dyn(), &mask, 2).unwrap();
        assert_eq!(pooled, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn pooling_rejects_wrong_width() {
        let sentence = array![[1.0f32, 2.0, 3.0]];
        let mask = array![[1i64]];
        let err = pool_output(sentence.into_dyn(), &mask, 2).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }
}
