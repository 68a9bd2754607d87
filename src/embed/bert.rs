//! Sentence embeddings from a local BERT-family checkpoint.
//!
//! Expects a directory laid out like a sentence-transformers export:
//! `config.json`, `tokenizer.json` and `model.safetensors`. Texts are
//! encoded as one padded batch; token vectors are mean-pooled under the
//! attention mask and L2-normalised.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use candle_core::{D, DType, Device, Module, Tensor};
use candle_nn::{Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};

use super::EmbeddingProvider;

#[derive(Debug, Clone, Deserialize)]
struct BertConfig {
    vocab_size: usize,
    hidden_size: usize,
    num_hidden_layers: usize,
    num_attention_heads: usize,
    intermediate_size: usize,
    max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps: f64,
    #[serde(default)]
    pad_token_id: u32,
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl BertConfig {
    fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}

struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    norm: LayerNorm,
    num_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    fn load(vb: VarBuilder, cfg: &BertConfig) -> Result<Self> {
        let h = cfg.hidden_size;
        let inner = vb.pp("self");
        let out = vb.pp("output");
        Ok(Self {
            query: candle_nn::linear(h, h, inner.pp("query"))?,
            key: candle_nn::linear(h, h, inner.pp("key"))?,
            value: candle_nn::linear(h, h, inner.pp("value"))?,
            output: candle_nn::linear(h, h, out.pp("dense"))?,
            norm: candle_nn::layer_norm(h, cfg.layer_norm_eps, out.pp("LayerNorm"))?,
            num_heads: cfg.num_attention_heads,
            head_dim: cfg.head_dim(),
        })
    }

    fn split_heads(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = x.dims3()?;
        Ok(x.reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    /// `mask_bias` is `(batch, 1, 1, seq)`: 0 for real tokens, a large
    /// negative value for padding.
    fn forward(&self, x: &Tensor, mask_bias: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden) = x.dims3()?;

        let q = self.split_heads(&self.query.forward(x)?)?;
        let k = self.split_heads(&self.key.forward(x)?)?;
        let v = self.split_heads(&self.value.forward(x)?)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = q.matmul(&k.t()?.contiguous()?)?.affine(scale, 0.0)?;
        let scores = scores.broadcast_add(mask_bias)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, hidden))?;

        let projected = self.output.forward(&context)?;
        Ok(self.norm.forward(&(x + projected)?)?)
    }
}

struct EncoderLayer {
    attention: SelfAttention,
    intermediate: Linear,
    output: Linear,
    norm: LayerNorm,
}

impl EncoderLayer {
    fn load(vb: VarBuilder, cfg: &BertConfig) -> Result<Self> {
        Ok(Self {
            attention: SelfAttention::load(vb.pp("attention"), cfg)?,
            intermediate: candle_nn::linear(
                cfg.hidden_size,
                cfg.intermediate_size,
                vb.pp("intermediate").pp("dense"),
            )?,
            output: candle_nn::linear(
                cfg.intermediate_size,
                cfg.hidden_size,
                vb.pp("output").pp("dense"),
            )?,
            norm: candle_nn::layer_norm(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("output").pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, x: &Tensor, mask_bias: &Tensor) -> Result<Tensor> {
        let x = self.attention.forward(x, mask_bias)?;
        let h = self.intermediate.forward(&x)?.gelu_erf()?;
        let h = self.output.forward(&h)?;
        Ok(self.norm.forward(&(x + h)?)?)
    }
}

struct BertEncoder {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    embedding_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
}

impl BertEncoder {
    fn load(vb: VarBuilder, cfg: &BertConfig) -> Result<Self> {
        // Some exports wrap the encoder in a `bert.` prefix.
        let vb = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
            vb.pp("bert")
        } else {
            vb
        };

        let emb = vb.pp("embeddings");
        let h = cfg.hidden_size;
        let word_embeddings = candle_nn::embedding(cfg.vocab_size, h, emb.pp("word_embeddings"))?;
        let position_embeddings =
            candle_nn::embedding(cfg.max_position_embeddings, h, emb.pp("position_embeddings"))?;
        let token_type_embeddings =
            candle_nn::embedding(cfg.type_vocab_size, h, emb.pp("token_type_embeddings"))?;
        let embedding_norm = candle_nn::layer_norm(h, cfg.layer_norm_eps, emb.pp("LayerNorm"))?;

        let layers = (0..cfg.num_hidden_layers)
            .map(|i| EncoderLayer::load(vb.pp("encoder").pp("layer").pp(i.to_string()), cfg))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            word_embeddings,
            position_embeddings,
            token_type_embeddings,
            embedding_norm,
            layers,
        })
    }

    /// `ids` and `mask` are `(batch, seq)`; returns `(batch, seq, hidden)`.
    fn forward(&self, ids: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (_, seq_len) = ids.dims2()?;
        let device = ids.device();

        let positions = Tensor::arange(0u32, seq_len as u32, device)?;
        let token_type = self.token_type_embeddings.embeddings().get(0)?;

        let hidden = self
            .word_embeddings
            .forward(ids)?
            .broadcast_add(&self.position_embeddings.forward(&positions)?)?
            .broadcast_add(&token_type)?;
        let mut hidden = self.embedding_norm.forward(&hidden)?;

        let mask_bias = ((mask.ones_like()? - mask)? * -10_000.0)?
            .unsqueeze(1)?
            .unsqueeze(1)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden, &mask_bias)?;
        }
        Ok(hidden)
    }
}

pub struct BertEmbeddingProvider {
    encoder: BertEncoder,
    tokenizer: Tokenizer,
    device: Device,
    pad_id: u32,
}

impl BertEmbeddingProvider {
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("model directory not found: {}", dir.display());
        }
        let config_path = dir.join("config.json");
        let tokenizer_path = dir.join("tokenizer.json");
        let weights_path = dir.join("model.safetensors");
        for path in [&config_path, &tokenizer_path, &weights_path] {
            if !path.is_file() {
                bail!("missing model file: {}", path.display());
            }
        }

        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        let cfg: BertConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse {}", config_path.display()))?;
        if cfg.num_attention_heads == 0 || cfg.hidden_size % cfg.num_attention_heads != 0 {
            bail!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                cfg.hidden_size,
                cfg.num_attention_heads
            );
        }

        let device = Device::Cpu;
        // SAFETY: the weights file is opened read-only and not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)? };
        let encoder = BertEncoder::load(vb, &cfg)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("load tokenizer {}: {e}", tokenizer_path.display()))?;
        limit_length(&mut tokenizer, cfg.max_position_embeddings)?;

        Ok(Self {
            encoder,
            tokenizer,
            device,
            pad_id: cfg.pad_token_id,
        })
    }

    /// Token ids and attention mask for `texts`, right-padded to the longest.
    fn encode(&self, texts: &[&str]) -> Result<(Tensor, Tensor)> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenize: {e}"))?;

        let rows: Vec<&[u32]> = encodings.iter().map(|enc| enc.get_ids()).collect();
        let seq_len = rows.iter().map(|r| r.len()).max().unwrap_or(0).max(1);

        let mut ids = Vec::with_capacity(rows.len() * seq_len);
        let mut mask = Vec::with_capacity(rows.len() * seq_len);
        for row in &rows {
            ids.extend_from_slice(row);
            ids.extend(std::iter::repeat_n(self.pad_id, seq_len - row.len()));
            mask.extend(std::iter::repeat_n(1.0f32, row.len()));
            mask.extend(std::iter::repeat_n(0.0f32, seq_len - row.len()));
        }

        let shape = (rows.len(), seq_len);
        Ok((
            Tensor::from_vec(ids, shape, &self.device)?,
            Tensor::from_vec(mask, shape, &self.device)?,
        ))
    }
}

/// Cap encodings at `max_len` tokens. Truncation runs inside the tokenizer
/// so the `[CLS]`/`[SEP]` tokens added by its post-processor are kept.
fn limit_length(tokenizer: &mut Tokenizer, max_len: usize) -> Result<()> {
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..TruncationParams::default()
        }))
        .map_err(|e| anyhow!("configure truncation: {e}"))?;
    Ok(())
}

impl EmbeddingProvider for BertEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| anyhow!("encoder returned no vector"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (ids, mask) = self.encode(texts)?;
        let hidden = self.encoder.forward(&ids, &mask)?;

        let weights = mask.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
        let counts = (mask.sum_keepdim(1)? + 1e-9)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = (pooled.sqr()?.sum_keepdim(1)?.sqrt()? + 1e-12)?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_optional_fields() {
        let cfg: BertConfig = serde_json::from_str(
            r#"{
                "vocab_size": 250037,
                "hidden_size": 384,
                "num_hidden_layers": 12,
                "num_attention_heads": 12,
                "intermediate_size": 1536,
                "max_position_embeddings": 512
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.type_vocab_size, 2);
        assert_eq!(cfg.pad_token_id, 0);
        assert_eq!(cfg.head_dim(), 32);
        assert!((cfg.layer_norm_eps - 1e-12).abs() < f64::EPSILON);
    }

    fn word_level_tokenizer() -> Tokenizer {
        r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": {
                "type": "BertProcessing",
                "sep": ["[SEP]", 3],
                "cls": ["[CLS]", 2]
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3, "a": 4 },
                "unk_token": "[UNK]"
            }
        }"#
        .parse()
        .unwrap()
    }

    #[test]
    fn long_input_keeps_closing_separator() {
        let mut tokenizer = word_level_tokenizer();
        limit_length(&mut tokenizer, 6).unwrap();

        let enc = tokenizer.encode("a a a a a a a a a a", true).unwrap();
        assert_eq!(enc.get_ids(), &[2, 4, 4, 4, 4, 3]);

        let short = tokenizer.encode("a a", true).unwrap();
        assert_eq!(short.get_ids(), &[2, 4, 4, 3]);
    }

    #[test]
    fn missing_directory_fails_to_load() {
        let err = BertEmbeddingProvider::load(Path::new("/nonexistent/semeval-model"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("model directory not found"));
    }

    #[test]
    fn incomplete_directory_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        let err = BertEmbeddingProvider::load(dir.path()).err().unwrap();
        assert!(err.to_string().contains("missing model file"));
    }

    #[test]
    fn embeds_with_local_model_when_present() {
        let Some(dir) = std::env::var_os("SEMEVAL_TEST_MODEL_DIR") else {
            eprintln!("Skipping: SEMEVAL_TEST_MODEL_DIR not set");
            return;
        };
        let provider = BertEmbeddingProvider::load(Path::new(&dir)).unwrap();
        let v = provider
            .embed_batch(&["How do I reset my password?", "What is the weather in Tokyo?"])
            .unwrap();
        assert_eq!(v.len(), 2);
        let norm: f32 = v[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "L2 norm should be ~1.0, got {norm}");
    }
}
