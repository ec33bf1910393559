//! Embedding-backed semantic similarity.

/// Cosine similarity of two vectors; `0.0` when either has zero length or
/// the dimensions differ.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(feature = "onnx")]
pub use onnx::EmbeddingSimilarity;

#[cfg(feature = "onnx")]
mod onnx {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use anchorfit_core::{ScoringError, Similarity};
    use tracing::debug;

    use super::cosine;
    use crate::embedder::Embedder;

    /// Upper bound on cached anchor embeddings per process.
    const MAX_CACHED_ANCHORS: usize = 4096;

    /// Anchor embeddings memoized for the life of the process. Once
    /// `capacity` entries are held the map is emptied before the next insert.
    struct AnchorCache {
        capacity: usize,
        entries: Mutex<HashMap<String, Vec<f32>>>,
    }

    impl AnchorCache {
        fn new(capacity: usize) -> Self {
            Self {
                capacity: capacity.max(1),
                entries: Mutex::new(HashMap::new()),
            }
        }

        fn get(&self, anchor: &str) -> Option<Vec<f32>> {
            self.entries.lock().ok()?.get(anchor).cloned()
        }

        fn insert(&self, anchor: &str, vector: Vec<f32>) {
            let Ok(mut entries) = self.entries.lock() else {
                return;
            };
            if entries.len() >= self.capacity && !entries.contains_key(anchor) {
                debug!(evicted = entries.len(), "anchor cache full, clearing");
                entries.clear();
            }
            entries.insert(anchor.to_string(), vector);
        }

        #[cfg(test)]
        fn len(&self) -> usize {
            self.entries.lock().map(|e| e.len()).unwrap_or(0)
        }
    }

    /// Cosine similarity between sentence embeddings.
    ///
    /// The session is not reentrant, so calls from parallel workers take
    /// turns on the model. Anchor embeddings are cached per process (up to
    /// 4096 anchors) because every attempt of a refinement scores against
    /// the same anchor.
    pub struct EmbeddingSimilarity {
        embedder: Mutex<Embedder>,
        anchors: AnchorCache,
    }

    impl EmbeddingSimilarity {
        pub fn new(embedder: Embedder) -> Self {
            Self {
                embedder: Mutex::new(embedder),
                anchors: AnchorCache::new(MAX_CACHED_ANCHORS),
            }
        }

        pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
            Ok(Self::new(Embedder::load(model_dir)?))
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, ScoringError> {
            let mut embedder = self
                .embedder
                .lock()
                .map_err(|_| ScoringError::Model("embedding model lock poisoned".into()))?;
            embedder
                .embed(text)
                .map_err(|e| ScoringError::Model(e.to_string()))
        }

        fn anchor_embedding(&self, anchor: &str) -> Result<Vec<f32>, ScoringError> {
            if let Some(v) = self.anchors.get(anchor) {
                return Ok(v);
            }
            let v = self.embed(anchor)?;
            self.anchors.insert(anchor, v.clone());
            Ok(v)
        }
    }

    impl Similarity for EmbeddingSimilarity {
        fn similarity(&self, a: &str, b: &str) -> Result<f64, ScoringError> {
            let anchor = self.anchor_embedding(a)?;
            let text = self.embed(b)?;
            Ok(cosine(&anchor, &text))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn anchor_cache_hits_and_stays_bounded() {
            let cache = AnchorCache::new(2);
            cache.insert("ad setup", vec![1.0]);
            cache.insert("ad creation", vec![2.0]);
            assert_eq!(cache.get("ad setup"), Some(vec![1.0]));

            cache.insert("ad setup", vec![3.0]);
            assert_eq!(cache.len(), 2);

            cache.insert("ad submission", vec![4.0]);
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.get("ad creation"), None);
            assert_eq!(cache.get("ad submission"), Some(vec![4.0]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors() {
        let v = [0.3, -0.2, 0.9];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_and_opposite() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!((cosine(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn scale_invariant() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
