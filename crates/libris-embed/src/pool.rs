//! Concurrency limiting for provider calls.

use std::sync::Arc;

use tokio::sync::Semaphore;

use libris_core::{EmbedError, EmbeddingService};

/// Wraps an [`EmbeddingService`] with a semaphore bounding concurrent calls.
///
/// The ingest workers and the search path share one pool, so the number of
/// in-flight provider requests stays bounded regardless of how many
/// pipelines run at once.
pub struct EmbeddingPool {
    service: Arc<dyn EmbeddingService>,
    semaphore: Semaphore,
    max_concurrent: usize,
}

impl EmbeddingPool {
    #[must_use]
    pub fn new(service: Arc<dyn EmbeddingService>, max_concurrent: usize) -> Self {
        Self {
            service,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
        }
    }

    /// Model identifier of the wrapped service.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    /// Vector dimension of the wrapped service.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.service.dimension()
    }

    /// Maximum concurrent provider calls.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Currently available call slots.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Embed a batch of document chunks under a permit.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let _permit = self.semaphore.acquire().await.map_err(|e| EmbedError::Provider {
            status: None,
            message: format!("embedding pool closed: {e}"),
        })?;
        self.service.embed_documents(texts).await
    }

    /// Embed a search query under a permit.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let _permit = self.semaphore.acquire().await.map_err(|e| EmbedError::Provider {
            status: None,
            message: format!("embedding pool closed: {e}"),
        })?;
        self.service.embed_query(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;

    #[tokio::test]
    async fn pool_reports_service_properties() {
        let pool = EmbeddingPool::new(Arc::new(HashEmbedder::new(64)), 4);
        assert_eq!(pool.dimension(), 64);
        assert_eq!(pool.model_name(), "hash-v1-64");
        assert_eq!(pool.max_concurrent(), 4);
        assert_eq!(pool.available_permits(), 4);
    }

    #[tokio::test]
    async fn permits_are_returned_after_calls() {
        let pool = Arc::new(EmbeddingPool::new(Arc::new(HashEmbedder::new(16)), 2));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    pool.embed_documents(&[format!("text {i}")]).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(pool.available_permits(), 2);
    }

    #[tokio::test]
    async fn empty_batch_passes_through() {
        let pool = EmbeddingPool::new(Arc::new(HashEmbedder::new(16)), 1);
        let vectors = pool.embed_documents(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
