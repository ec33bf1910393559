//! Model adapters: ONNX sentence embeddings for scoring and an Ollama client
//! for generation.

pub mod similarity;
pub use similarity::cosine;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::Embedder;
#[cfg(feature = "onnx")]
pub use similarity::EmbeddingSimilarity;

#[cfg(feature = "http")]
mod ollama;
#[cfg(feature = "http")]
pub use ollama::{OllamaClient, OllamaError, build_prompt};
