//! Library search engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use libris_core::{
    DocumentId, EmbeddingSet, LibraryPaths, SearchAlgorithm, SearchError, SearchHit,
    SearchResponse, UserId,
};
use libris_embed::EmbeddingPool;
use libris_store::load_library;

use crate::cosine::cosine_similarity;
use crate::hybrid::{bm25_scores, fuse, min_max_normalize};

const MAX_LIMIT: usize = 100;

/// One scoreable chunk with its provenance.
struct Candidate {
    document_id: DocumentId,
    chunk_index: usize,
    source_filename: String,
    text: String,
    embedding: Vec<f32>,
}

/// Ranks a user's persisted chunks against a query.
pub struct SearchEngine {
    paths: LibraryPaths,
    embedder: Arc<EmbeddingPool>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(paths: LibraryPaths, embedder: Arc<EmbeddingPool>) -> Self {
        Self { paths, embedder }
    }

    /// Execute a search. See the crate docs for algorithm details.
    pub async fn search(
        &self,
        user: &str,
        query: &str,
        algorithm: SearchAlgorithm,
        limit: usize,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();

        if limit == 0 || limit > MAX_LIMIT {
            return Err(SearchError::InvalidLimit(limit));
        }
        if query.trim().is_empty() {
            return Err(SearchError::EmbeddingFailed("query text is empty".to_string()));
        }
        let user = UserId::parse(user)
            .map_err(|_| SearchError::EmptyLibrary(user.to_string()))?;

        let sets = load_library(&self.paths.processed_vectors(&user)).await?;
        if sets.is_empty() {
            return Err(SearchError::EmptyLibrary(user.to_string()));
        }
        let documents_searched = sets.len();

        let (candidates, model_used, model_restricted) = collect_candidates(&sets);
        if candidates.is_empty() {
            return Err(SearchError::EmptyLibrary(user.to_string()));
        }
        let chunks_searched = candidates.len();

        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| SearchError::EmbeddingFailed(e.to_string()))?;

        if let Some(dim) = candidates.first().map(|c| c.embedding.len()) {
            if query_vector.len() != dim {
                return Err(SearchError::EmbeddingFailed(format!(
                    "query dimension {} does not match library dimension {dim}",
                    query_vector.len()
                )));
            }
        }

        let scores = match algorithm {
            SearchAlgorithm::Cosine => candidates
                .iter()
                .map(|c| cosine_similarity(&query_vector, &c.embedding))
                .collect::<Vec<f32>>(),
            SearchAlgorithm::Hybrid => {
                let mut semantic: Vec<f32> = candidates
                    .iter()
                    .map(|c| cosine_similarity(&query_vector, &c.embedding))
                    .collect();
                let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
                let mut lexical = bm25_scores(query, &texts);
                min_max_normalize(&mut semantic);
                min_max_normalize(&mut lexical);
                semantic
                    .iter()
                    .zip(&lexical)
                    .map(|(s, l)| fuse(*s, *l))
                    .collect()
            }
        };

        let hits = rank(candidates, scores, limit);
        let execution_time = started.elapsed();

        info!(
            user = %user,
            algorithm = %algorithm,
            documents = documents_searched,
            chunks = chunks_searched,
            hits = hits.len(),
            elapsed_ms = execution_time.as_millis() as u64,
            "search served"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            algorithm,
            hits,
            documents_searched,
            chunks_searched,
            model_used: Some(model_used),
            model_restricted,
            execution_time,
        })
    }
}

/// Flatten sets into scoreable candidates, restricting mixed-model libraries
/// to their dominant model (ties to the lexicographically smaller name).
fn collect_candidates(sets: &[EmbeddingSet]) -> (Vec<Candidate>, String, bool) {
    let mut model_counts: HashMap<&str, usize> = HashMap::new();
    for set in sets {
        for chunk in &set.chunks {
            if !chunk.embedding.is_empty() {
                *model_counts.entry(chunk.embedding_model.as_str()).or_default() += 1;
            }
        }
    }

    let dominant = model_counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(model, _)| (*model).to_string())
        .unwrap_or_default();
    let model_restricted = model_counts.len() > 1;

    if model_restricted {
        debug!(
            models = model_counts.len(),
            dominant = %dominant,
            "library holds mixed embedding models, restricting"
        );
    }

    let mut candidates = Vec::new();
    for set in sets {
        for (fallback_index, chunk) in set.chunks.iter().enumerate() {
            if chunk.embedding.is_empty() || chunk.embedding_model != dominant {
                continue;
            }
            candidates.push(Candidate {
                document_id: set.document_id,
                chunk_index: chunk.sequence_index().unwrap_or(fallback_index),
                source_filename: set.metadata.original_filename.clone(),
                text: chunk.text.clone(),
                embedding: chunk.embedding.clone(),
            });
        }
    }

    (candidates, dominant, model_restricted)
}

/// Order by score descending, ties by (document id, chunk index), truncate to
/// the limit, and attach 1-based ranks.
fn rank(candidates: Vec<Candidate>, scores: Vec<f32>, limit: usize) -> Vec<SearchHit> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| candidates[a].document_id.cmp(&candidates[b].document_id))
            .then_with(|| candidates[a].chunk_index.cmp(&candidates[b].chunk_index))
    });

    order
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(rank, index)| {
            let candidate = &candidates[index];
            SearchHit {
                rank: rank + 1,
                score: scores[index],
                text: candidate.text.clone(),
                chunk_index: candidate.chunk_index,
                document_id: candidate.document_id,
                source_filename: candidate.source_filename.clone(),
            }
        })
        .collect()
}
