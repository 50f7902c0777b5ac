//! Maximal marginal relevance selection
//!
//! Each step picks the candidate maximizing
//! `λ × sim(query, doc) - (1 - λ) × max(sim(doc, selected))`, so that
//! `λ = 1.0` is plain relevance order and `λ = 0.0` is pure diversity.

/// Cosine similarity of two vectors
///
/// Returns 0.0 when the lengths differ or either vector has zero magnitude.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Select up to `k` candidate indices by maximal marginal relevance
///
/// The first pick is always the candidate most similar to the query. Ties
/// go to the earlier candidate, so candidates should arrive in relevance
/// order.
#[inline]
pub fn maximal_marginal_relevance<V>(
    query: &[f32],
    candidates: &[V],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize>
where
    V: AsRef<[f32]>,
{
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let k = k.min(candidates.len());
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate.as_ref()))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best_position = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (position, &index) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&chosen| {
                    cosine_similarity(candidates[index].as_ref(), candidates[chosen].as_ref())
                })
                .fold(f32::NEG_INFINITY, f32::max);

            let score = if selected.is_empty() {
                relevance[index]
            } else {
                lambda_mult.mul_add(relevance[index], -(1.0 - lambda_mult) * redundancy)
            };

            if score > best_score {
                best_score = score;
                best_position = position;
            }
        }

        selected.push(remaining.remove(best_position));
    }

    selected
}
