use anyhow::{Context, Result};
use log::{debug, info};
use ndarray::s;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tract_onnx::prelude::*;

use crate::error::RagError;

const MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
const MODEL_FILE: &str = "onnx/model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Vector dimensionality of the encoder. Constant for the lifetime of an
/// index; mixing vectors from different models in one index is forbidden.
pub const EMBEDDING_DIM: usize = 384;
/// Model maximum sequence length; longer inputs are truncated.
const MAX_SEQ_LEN: usize = 256;
/// Minimum mean-pooling denominator, so an all-zero mask cannot divide by zero.
const MIN_POOL_DENOMINATOR: f32 = 1e-9;
/// Texts encoded per inference pass.
const BATCH_SIZE: usize = 16;

/// Turns text into fixed-dimension vectors. The trait is the seam for
/// swapping the ONNX encoder with a deterministic stub in tests.
pub trait Embedder {
    /// One vector per input string, same order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

/// Configuration for the local encoder
pub struct EncoderConfig {
    /// Directory where model artifacts are cached between runs
    pub cache_dir: PathBuf,
}

impl EncoderConfig {
    /// Create a configuration from environment variables, with a
    /// per-user cache directory as the default.
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("EMBEDDING_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(base)
                    .join(".cache")
                    .join("study-rag")
                    .join("models")
            });
        EncoderConfig { cache_dir }
    }
}

type OnnxModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Local sentence encoder: all-MiniLM-L6-v2 ONNX graph run by tract, with
/// attention-mask mean pooling over the token axis. Deterministic: the
/// same input always yields the same vector for a fixed model.
pub struct TextEncoder {
    model: OnnxModel,
    tokenizer: Tokenizer,
}

impl TextEncoder {
    /// Load the encoder, fetching model artifacts into the cache on first
    /// use. Any fetch or parse failure is a [`RagError::ModelLoad`]:
    /// fatal for the session, since nothing can be indexed or queried
    /// without the encoder.
    pub fn load(config: &EncoderConfig) -> Result<Self> {
        let (onnx_path, tokenizer_path) = ensure_cached(&config.cache_dir)
            .map_err(|e| RagError::ModelLoad(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RagError::ModelLoad(format!("tokenizer: {}", e)))?;

        let model = tract_onnx::onnx()
            .model_for_path(&onnx_path)
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| RagError::ModelLoad(format!("onnx graph: {}", e)))?;

        info!("Loaded embedding model {}", MODEL_REPO);
        Ok(TextEncoder { model, tokenizer })
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Tokenize with special tokens, truncated to the model maximum.
        // An empty string still yields [CLS] [SEP], so the mask is never
        // all zeros in practice; the clamped denominator guards the rest.
        let mut token_ids: Vec<Vec<i64>> = Vec::with_capacity(texts.len());
        let mut masks: Vec<Vec<i64>> = Vec::with_capacity(texts.len());
        for text in texts {
            let encoding = self
                .tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))?;
            let ids: Vec<i64> = encoding
                .get_ids()
                .iter()
                .take(MAX_SEQ_LEN)
                .map(|&id| id as i64)
                .collect();
            masks.push(vec![1; ids.len()]);
            token_ids.push(ids);
        }

        let batch = texts.len();
        let seq_len = token_ids.iter().map(Vec::len).max().unwrap_or(1).max(1);

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        for (i, ids) in token_ids.iter().enumerate() {
            for (j, &id) in ids.iter().enumerate() {
                input_ids[i * seq_len + j] = id;
                attention_mask[i * seq_len + j] = 1;
            }
        }
        let token_type_ids = vec![0i64; batch * seq_len];

        let input_ids_t: Tensor = ndarray::Array2::from_shape_vec((batch, seq_len), input_ids)
            .context("input ids shape")?
            .into();
        let attention_mask_t: Tensor =
            ndarray::Array2::from_shape_vec((batch, seq_len), attention_mask)
                .context("attention mask shape")?
                .into();
        let token_type_ids_t: Tensor =
            ndarray::Array2::from_shape_vec((batch, seq_len), token_type_ids)
                .context("token type ids shape")?
                .into();

        let outputs = self
            .model
            .run(tvec!(
                input_ids_t.into(),
                attention_mask_t.into(),
                token_type_ids_t.into()
            ))
            .context("encoder inference failed")?;

        let hidden = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("encoder produced no output tensor"))?
            .to_array_view::<f32>()
            .context("encoder output tensor type")?;

        if hidden.ndim() != 3 {
            anyhow::bail!("unexpected encoder output shape: {:?}", hidden.shape());
        }
        let hidden = hidden
            .into_dimensionality::<ndarray::Ix3>()
            .context("encoder output dimensionality")?;

        Ok(mean_pool(&hidden, &masks))
    }
}

impl Embedder for TextEncoder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!("Encoding batch of {} texts", batch.len());
            all.extend(self.encode_batch(batch)?);
        }
        Ok(all)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Attention-mask-weighted mean pooling over the token axis: sum the
/// hidden states of masked-in tokens, divide by their count (clamped to a
/// minimum so a degenerate mask yields a near-zero vector, not NaN). No
/// normalization is applied; the cosine scorer handles magnitudes.
fn mean_pool(hidden: &ndarray::ArrayView3<f32>, masks: &[Vec<i64>]) -> Vec<Vec<f32>> {
    let dim = hidden.shape()[2];
    let seq_len = hidden.shape()[1];

    masks
        .iter()
        .enumerate()
        .map(|(i, mask)| {
            let mut sum = vec![0f32; dim];
            let mut count = 0f32;
            for (j, &m) in mask.iter().take(seq_len).enumerate() {
                if m == 0 {
                    continue;
                }
                for (k, &v) in hidden.slice(s![i, j, ..]).iter().enumerate() {
                    sum[k] += v;
                }
                count += 1.0;
            }
            let denom = count.max(MIN_POOL_DENOMINATOR);
            for x in &mut sum {
                *x /= denom;
            }
            sum
        })
        .collect()
}

/// Ensure model and tokenizer are in the cache; return their paths.
fn ensure_cached(cache_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let model_dir = cache_dir.join("all-minilm-l6-v2");
    let onnx_path = model_dir.join("model.onnx");
    let tokenizer_path = model_dir.join(TOKENIZER_FILE);
    download_to_cache(MODEL_FILE, &onnx_path)?;
    download_to_cache(TOKENIZER_FILE, &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path))
}

fn download_to_cache(repo_path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        MODEL_REPO, repo_path
    );
    info!("Downloading {} to {}", url, cache_path.display());

    let response = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Download {}", url))?;
    let bytes = response.bytes().context("Read model artifact body")?;

    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Create cache dir {}", parent.display()))?;
    }
    std::fs::write(cache_path, &bytes)
        .with_context(|| format!("Write cache file {}", cache_path.display()))?;
    Ok(())
}

/// Deterministic embedders for tests: no model download, no inference.
#[cfg(test)]
pub mod test_support {
    use super::Embedder;
    use anyhow::Result;

    /// Embeds text as keyword-occurrence counts, one dimension per
    /// keyword. Texts sharing keywords land close under cosine
    /// similarity, which is all retrieval tests need.
    pub struct KeywordEmbedder {
        keywords: Vec<String>,
    }

    impl KeywordEmbedder {
        pub fn new(keywords: &[&str]) -> Self {
            KeywordEmbedder {
                keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            }
        }
    }

    impl Embedder for KeywordEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    self.keywords
                        .iter()
                        .map(|k| lower.matches(k.as_str()).count() as f32)
                        .collect()
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.keywords.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_mean_pool_averages_masked_tokens() {
        // One text, three token positions, two dims; only first two masked in.
        let hidden =
            Array3::from_shape_vec((1, 3, 2), vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0]).unwrap();
        let masks = vec![vec![1i64, 1, 0]];

        let pooled = mean_pool(&hidden.view(), &masks);
        assert_eq!(pooled.len(), 1);
        assert_eq!(pooled[0], vec![2.0, 3.0]);
    }

    #[test]
    fn test_mean_pool_handles_empty_mask() {
        let hidden = Array3::from_shape_vec((1, 2, 2), vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let masks = vec![vec![0i64, 0]];

        let pooled = mean_pool(&hidden.view(), &masks);
        // Clamped denominator: near-zero vector, never NaN.
        assert!(pooled[0].iter().all(|v| v.is_finite()));
        assert!(pooled[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_mean_pool_is_per_text() {
        let hidden = Array3::from_shape_vec(
            (2, 2, 2),
            vec![1.0, 1.0, 3.0, 3.0, 10.0, 10.0, 20.0, 20.0],
        )
        .unwrap();
        let masks = vec![vec![1i64, 1], vec![1i64, 1]];

        let pooled = mean_pool(&hidden.view(), &masks);
        assert_eq!(pooled[0], vec![2.0, 2.0]);
        assert_eq!(pooled[1], vec![15.0, 15.0]);
    }

    #[test]
    fn test_encoder_config_default_cache_dir() {
        std::env::remove_var("EMBEDDING_CACHE_DIR");
        let config = EncoderConfig::from_env();
        assert!(config.cache_dir.ends_with("study-rag/models"));
    }
}
