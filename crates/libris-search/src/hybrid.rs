//! BM25 lexical scoring and score fusion for hybrid search.

/// Term-frequency saturation.
pub const K1: f32 = 1.5;
/// Document-length normalization strength.
pub const B: f32 = 0.75;
/// Weight of the cosine component in the fused score.
pub const COSINE_WEIGHT: f32 = 0.7;

/// BM25 scores of every chunk against the query.
///
/// Query terms are whitespace-split and lowercase-folded; chunk tokens get
/// the same folding plus punctuation trimming so `"love,"` still matches
/// `love`. Document frequency is computed over chunks, length normalization
/// against the mean chunk token count. The idf uses the `ln(1 + …)`
/// smoothing, keeping scores non-negative for tiny collections.
#[must_use]
pub fn bm25_scores(query: &str, chunks: &[&str]) -> Vec<f32> {
    let terms = tokenize(query);
    if terms.is_empty() || chunks.is_empty() {
        return vec![0.0; chunks.len()];
    }

    let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(c)).collect();
    let total_docs = tokenized.len() as f32;
    let avg_len = tokenized.iter().map(Vec::len).sum::<usize>() as f32 / total_docs;

    let mut scores = Vec::with_capacity(tokenized.len());
    for tokens in &tokenized {
        let len_norm = if avg_len > 0.0 {
            1.0 - B + B * (tokens.len() as f32 / avg_len)
        } else {
            1.0
        };

        let mut score = 0.0;
        for term in &terms {
            let tf = tokens.iter().filter(|t| *t == term).count() as f32;
            if tf == 0.0 {
                continue;
            }
            let df = tokenized
                .iter()
                .filter(|doc| doc.iter().any(|t| t == term))
                .count() as f32;
            let idf = (1.0 + (total_docs - df + 0.5) / (df + 0.5)).ln();
            score += idf * (tf * (K1 + 1.0)) / (tf + K1 * len_norm);
        }
        scores.push(score);
    }

    scores
}

/// Min–max normalize scores into [0, 1] over the candidate set. A degenerate
/// set (all scores equal) normalizes to all zeros.
pub fn min_max_normalize(scores: &mut [f32]) {
    let Some(min) = scores.iter().copied().reduce(f32::min) else {
        return;
    };
    let Some(max) = scores.iter().copied().reduce(f32::max) else {
        return;
    };

    if max > min {
        for score in scores.iter_mut() {
            *score = (*score - min) / (max - min);
        }
    } else {
        scores.fill(0.0);
    }
}

/// Fuse normalized cosine and lexical scores.
#[must_use]
pub fn fuse(cosine: f32, lexical: f32) -> f32 {
    COSINE_WEIGHT * cosine + (1.0 - COSINE_WEIGHT) * lexical
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}
