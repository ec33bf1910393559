//! ONNX Runtime sentence embeddings for fragment scoring.
//!
//! Expects a sentence-transformers export (all-MiniLM-L6-v2 by default): a
//! directory with `model.onnx` and `tokenizer.json`. Vectors are mean-pooled
//! over real tokens and scaled to unit length.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Fragments are short; anything past this is cut by the tokenizer.
const MAX_TOKENS: usize = 256;
const FALLBACK_DIM: usize = 384;

struct ModelFiles {
    model: PathBuf,
    tokenizer: PathBuf,
}

impl ModelFiles {
    fn locate(dir: &Path) -> anyhow::Result<Self> {
        let files = Self {
            model: dir.join("model.onnx"),
            tokenizer: dir.join("tokenizer.json"),
        };
        anyhow::ensure!(files.model.exists(), "model.onnx not found in {dir:?}");
        anyhow::ensure!(files.tokenizer.exists(), "tokenizer.json not found in {dir:?}");
        Ok(files)
    }
}

/// Padded `[rows, seq_len]` model inputs.
struct Encoded {
    rows: usize,
    seq_len: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
    type_ids: Vec<i64>,
}

pub struct Embedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

impl Embedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let files = ModelFiles::locate(model_dir)?;

        let session = Session::builder()?
            .commit_from_file(&files.model)
            .with_context(|| format!("loading {}", files.model.display()))?;
        let dim = declared_dim(session.outputs()[0].dtype()).unwrap_or(FALLBACK_DIM);

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!(dim, model = %files.model.display(), "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("model returned no embedding"))
    }

    /// One unit-length vector per input, in input order.
    pub fn embed_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let encoded = self.encode(texts)?;
        let shape = [encoded.rows as i64, encoded.seq_len as i64];

        let ids = Tensor::from_array((shape, encoded.ids.into_boxed_slice()))?;
        let mask = Tensor::from_array((shape, encoded.mask.clone().into_boxed_slice()))?;
        let type_ids = Tensor::from_array((shape, encoded.type_ids.into_boxed_slice()))?;
        let outputs = self.session.run(ort::inputs![
            "input_ids" => ids,
            "attention_mask" => mask,
            "token_type_ids" => type_ids,
        ])?;

        let (out_shape, hidden) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = out_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == encoded.rows && dims[2] as usize == self.dim,
            "unexpected output shape {dims:?} for {} rows of dim {}",
            encoded.rows,
            self.dim
        );
        let out_len = dims[1] as usize;
        let stride = out_len * self.dim;

        let vectors = hidden
            .chunks_exact(stride)
            .zip(encoded.mask.chunks_exact(encoded.seq_len))
            .map(|(tokens, mask)| mean_pool(tokens, mask, self.dim))
            .collect::<Vec<_>>();
        debug!(rows = encoded.rows, seq_len = encoded.seq_len, "embedded batch");
        Ok(vectors)
    }

    fn encode(&self, texts: &[&str]) -> anyhow::Result<Encoded> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let rows = encodings.len();
        let seq_len = encodings.iter().map(|e| e.len()).max().unwrap_or(0);

        let mut encoded = Encoded {
            rows,
            seq_len,
            ids: vec![0; rows * seq_len],
            mask: vec![0; rows * seq_len],
            type_ids: vec![0; rows * seq_len],
        };
        for (row, enc) in encodings.iter().enumerate() {
            let at = row * seq_len;
            let fill = |dst: &mut [i64], src: &[u32]| {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = i64::from(s);
                }
            };
            fill(&mut encoded.ids[at..at + seq_len], enc.get_ids());
            fill(&mut encoded.mask[at..at + seq_len], enc.get_attention_mask());
            fill(&mut encoded.type_ids[at..at + seq_len], enc.get_type_ids());
        }
        Ok(encoded)
    }
}

/// Attention-masked mean over token vectors, scaled to unit length.
fn mean_pool(tokens: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut count = 0.0f32;
    for (token, &weight) in tokens.chunks_exact(dim).zip(mask) {
        if weight > 0 {
            let weight = weight as f32;
            for (p, v) in pooled.iter_mut().zip(token) {
                *p += v * weight;
            }
            count += weight;
        }
    }
    if count > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= count);
    }
    let norm = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= norm);
    }
    pooled
}

fn declared_dim(output: &ValueType) -> Option<usize> {
    match output {
        ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| usize::try_from(d).ok())
            .filter(|&d| d > 0),
        _ => None,
    }
}
