//! Semantic re-ranking: the embedding-provider abstraction and brute-force
//! ANN index behind `sliceBuild`'s optional cosine re-ranking step. Grounded
//! on the teacher's `semantic::simple::SimpleSemanticSearch` (fastembed-backed
//! cosine search over doc comments) and `vector::clustering::cosine_similarity`
//! — generalized from a doc-comment-only index tied to one in-process cache
//! to a pluggable provider/index pair so a real ANN backend (HNSW) could slot
//! in behind the same seam a slice request sees without the caller changing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::config::SemanticConfig;
use crate::error::SliceError;
use crate::model::SymbolId;

pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, SliceError>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Deterministic, content-derived pseudo-embedding — hashes overlapping
/// byte-trigrams of the (lowercased) text into `dimension` buckets, then
/// L2-normalizes. Not semantically meaningful, but stable and free of any
/// model download, so it's both the test fixture and the runtime default
/// (`semantic.provider = "mock"`).
pub struct MockProvider {
    dimension: usize,
}

impl MockProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EmbeddingProvider for MockProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, SliceError> {
        Ok(hash_embedding(text, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut buckets = vec![0f32; dimension];
    let lower = text.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    if bytes.is_empty() {
        return buckets;
    }
    let window_len = bytes.len().min(3);
    for window in bytes.windows(window_len) {
        let mut hasher = DefaultHasher::new();
        window.hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % buckets.len();
        buckets[bucket] += 1.0;
    }
    normalize(&mut buckets);
    buckets
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Local embedding model via `fastembed`, mirroring the teacher's
/// `SimpleSemanticSearch::with_model` — probes the model once at
/// construction to learn its output dimension.
pub struct LocalProvider {
    model: Mutex<fastembed::TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl LocalProvider {
    pub fn try_new(model_name: &str) -> Result<Self, SliceError> {
        let mut model = fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| SliceError::Internal(format!("failed to initialize local embedding model: {e}")))?;
        let probe = model
            .embed(vec!["probe".to_string()], None)
            .map_err(|e| SliceError::Internal(format!("failed to probe embedding dimension: {e}")))?;
        let dimension = probe.into_iter().next().map(|v| v.len()).unwrap_or(0);
        Ok(Self {
            model: Mutex::new(model),
            dimension,
            model_name: model_name.to_string(),
        })
    }
}

impl EmbeddingProvider for LocalProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, SliceError> {
        let mut model = self.model.lock().expect("embedding model mutex poisoned");
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| SliceError::Internal(format!("embedding generation failed: {e}")))?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SliceError::Internal("embedding model returned no vectors".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Builds the configured provider. `provider = "api"` has no remote client
/// wired in this crate, so it falls back to [`MockProvider`] and logs once —
/// the same "native engine unavailable -> fall back, log once" pattern spec
/// §7 applies to the indexer's native fast-path.
pub fn build_provider(config: &SemanticConfig) -> Box<dyn EmbeddingProvider> {
    match config.provider.as_str() {
        "local" => match LocalProvider::try_new(&config.model) {
            Ok(provider) => Box::new(provider),
            Err(err) => {
                tracing::warn!(error = %err, "local embedding provider unavailable, falling back to mock");
                Box::new(MockProvider::default())
            }
        },
        "api" => {
            tracing::warn!("api embedding provider not implemented in this build, falling back to mock");
            Box::new(MockProvider::default())
        }
        _ => Box::new(MockProvider::default()),
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// `search(query, k)` over a fixed candidate set. Spec §4.7: "via ANN index
/// (HNSW) if available, else exact search over the candidate set" — this
/// crate ships only the exact path; the trait is the seam a real HNSW
/// implementation would sit behind.
pub trait AnnIndex: Send + Sync {
    fn search(&self, query: &[f32], k: usize) -> Vec<(SymbolId, f32)>;
}

pub struct BruteForceIndex {
    vectors: Vec<(SymbolId, Vec<f32>)>,
}

impl BruteForceIndex {
    pub fn new(vectors: Vec<(SymbolId, Vec<f32>)>) -> Self {
        Self { vectors }
    }
}

impl AnnIndex for BruteForceIndex {
    fn search(&self, query: &[f32], k: usize) -> Vec<(SymbolId, f32)> {
        let mut scored: Vec<(SymbolId, f32)> = self.vectors.iter().map(|(id, vector)| (id.clone(), cosine_similarity(query, vector))).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_is_deterministic() {
        let provider = MockProvider::default();
        let a = provider.embed("parse JSON from a string").unwrap();
        let b = provider.embed("parse JSON from a string").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), provider.dimension());
    }

    #[test]
    fn cosine_similarity_matches_known_values() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn brute_force_ranks_closest_vector_first() {
        let index = BruteForceIndex::new(vec![("near".to_string(), vec![1.0, 0.0]), ("far".to_string(), vec![0.0, 1.0])]);
        let results = index.search(&[0.9, 0.1], 2);
        assert_eq!(results[0].0, "near");
        assert_eq!(results[1].0, "far");
    }

    #[test]
    fn build_provider_falls_back_to_mock_for_api() {
        let config = SemanticConfig {
            enabled: true,
            provider: "api".to_string(),
            model: "whatever".to_string(),
        };
        let provider = build_provider(&config);
        assert_eq!(provider.model_name(), "mock");
    }
}
