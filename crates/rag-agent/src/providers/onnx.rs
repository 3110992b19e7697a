//! Local sentence-transformers embeddings on ONNX Runtime
//!
//! The ONNX export and tokenizer of a `sentence-transformers/*` model are
//! downloaded from the Hugging Face hub once and cached per model.
//! Embeddings are mean-pooled over the attention mask and L2-normalized.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::config::EmbeddingsConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;

const HUB_URL: &str = "https://huggingface.co/sentence-transformers";

/// ONNX-based text embedder
pub struct OnnxEmbedder {
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// HuggingFace tokenizer
    tokenizer: Tokenizer,
    /// Model identifier without the hub namespace
    model: String,
    /// Maximum sequence length
    max_length: usize,
    /// Batch size
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Create a new ONNX embedder, downloading the model on first use
    pub async fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let model = config
            .model
            .trim_start_matches("sentence-transformers/")
            .to_string();
        tracing::info!("Initializing ONNX embedder with model: {}", model);

        let model_dir = config.cache_dir.join(&model);
        tokio::fs::create_dir_all(&model_dir).await.map_err(|e| {
            Error::Config(format!(
                "Failed to create cache directory {}: {}",
                model_dir.display(),
                e
            ))
        })?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            download(&format!("{}/{}/resolve/main/onnx/model.onnx", HUB_URL, model), &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download(&format!("{}/{}/resolve/main/tokenizer.json", HUB_URL, model), &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::embedding(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::embedding(format!("Failed to load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;

        tracing::info!("ONNX embedder initialized successfully");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model,
            max_length: config.max_length.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.embed_batch_internal(batch)?);
        }
        Ok(all_embeddings)
    }

    fn embed_batch_internal(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let shape = vec![batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
            .map_err(|e| Error::embedding(format!("Input tensor creation failed: {}", e)))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Attention mask tensor creation failed: {}", e)))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
            .map_err(|e| Error::embedding(format!("Token type tensor creation failed: {}", e)))?;

        let inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
            ("token_type_ids", token_type_ids_tensor.into_dyn()),
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims
            .get(2)
            .copied()
            .ok_or_else(|| Error::embedding(format!("Unexpected output shape {:?}", dims)))?;

        if hidden_size == 0 || dims.first() != Some(&batch_size) || dims.get(1) != Some(&max_len) {
            return Err(Error::embedding(format!(
                "Unexpected output shape {:?} for batch {}x{}",
                dims, batch_size, max_len
            )));
        }

        Ok((0..batch_size)
            .map(|i| {
                let mask = &attention_mask[i * max_len..(i + 1) * max_len];
                let hidden = &tensor_data[i * max_len * hidden_size..(i + 1) * max_len * hidden_size];
                mean_pool(hidden, mask, hidden_size)
            })
            .collect())
    }
}

/// Mask-weighted mean over token vectors, then L2 normalization
fn mean_pool(hidden: &[f32], mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (token, &m) in hidden.chunks(hidden_size).zip(mask) {
        if m > 0 {
            let weight = m as f32;
            for (acc, value) in sum.iter_mut().zip(token) {
                *acc += value * weight;
            }
            count += weight;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }

    let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut sum {
            *val /= norm;
        }
    }

    sum
}

/// Download a hub file into the cache
async fn download(url: &str, path: &Path) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::embedding(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::embedding(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::embedding(format!("Failed to read response body: {}", e)))?;

    // An interrupted download leaves only the .part file behind
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_texts(&refs)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        // two real tokens and one padding token, hidden size 2
        let hidden = [1.0, 0.0, 3.0, 0.0, 100.0, 100.0];
        let mask = [1, 1, 0];

        let pooled = mean_pool(&hidden, &mask, 2);
        assert_eq!(pooled, vec![1.0, 0.0]);
    }

    #[test]
    fn test_mean_pool_is_normalized() {
        let hidden = [3.0, 4.0];
        let pooled = mean_pool(&hidden, &[1], 2);

        let norm: f32 = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((pooled[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_all_masked() {
        let pooled = mean_pool(&[1.0, 2.0], &[0], 2);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }
}
