//! Deterministic hash-bucket embedder.

use async_trait::async_trait;

use libris_core::{EmbedError, EmbeddingService};

/// Local embedding service producing deterministic unit vectors.
///
/// Each lowercase whitespace token is hashed into a bucket of the vector,
/// which is then L2-normalized. Texts sharing tokens get correlated vectors,
/// so ranking behaves plausibly without a provider round-trip. Used by the
/// test suites and offline development; not a semantic model.
pub struct HashEmbedder {
    dimension: usize,
    model: String,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: format!("hash-v1-{dimension}"),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let bucket = (fnv1a(token.to_lowercase().as_bytes()) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

/// FNV-1a, 64-bit. Stable across processes, unlike the std hasher.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingService for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    #[tokio::test]
    async fn vectors_are_deterministic_and_unit_length() {
        let embedder = HashEmbedder::new(128);
        let a = embedder
            .embed_documents(&["hello world".to_string()])
            .await
            .unwrap();
        let b = embedder
            .embed_documents(&["hello world".to_string()])
            .await
            .unwrap();
        assert_eq!(a, b);

        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_tokens_correlate() {
        let embedder = HashEmbedder::new(256);
        let vectors = embedder
            .embed_documents(&[
                "hello world".to_string(),
                "hello there".to_string(),
                "completely unrelated phrase".to_string(),
            ])
            .await
            .unwrap();

        let overlap = cosine(&vectors[0], &vectors[1]);
        let unrelated = cosine(&vectors[0], &vectors[2]);
        assert!(overlap > 0.4);
        assert!(overlap > unrelated);
    }

    #[tokio::test]
    async fn query_of_contained_word_scores_high() {
        let embedder = HashEmbedder::new(256);
        let doc = embedder
            .embed_documents(&["hello world".to_string()])
            .await
            .unwrap();
        let query = embedder.embed_query("hello").await.unwrap();
        let score = cosine(&query, &doc[0]);
        assert!(score >= 0.5, "score was {score}");
    }

    #[tokio::test]
    async fn case_is_folded() {
        let embedder = HashEmbedder::new(64);
        let vectors = embedder
            .embed_documents(&["Hello".to_string(), "hello".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn empty_text_is_a_zero_vector() {
        let embedder = HashEmbedder::new(32);
        let vectors = embedder.embed_documents(&["".to_string()]).await.unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let embedder = HashEmbedder::new(64);
        let texts: Vec<String> = (0..20).map(|i| format!("token{i}")).collect();
        let vectors = embedder.embed_documents(&texts).await.unwrap();
        for (i, text) in texts.iter().enumerate() {
            let single = embedder.embed_documents(&[text.clone()]).await.unwrap();
            assert_eq!(vectors[i], single[0], "order broken at {i}");
        }
    }
}
