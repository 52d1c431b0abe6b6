use crate::models::{IndexedVector, SearchHit, SearchScope};

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }
    let (dot, norm_left, norm_right) = left.iter().zip(right.iter()).fold(
        (0.0_f32, 0.0_f32, 0.0_f32),
        |(dot, norm_left, norm_right), (left, right)| {
            (
                dot + left * right,
                norm_left + left * left,
                norm_right + right * right,
            )
        },
    );
    if norm_left <= f32::EPSILON || norm_right <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_left.sqrt() * norm_right.sqrt())
}

/// Scores `records` of `model` against `query_vector`, drops anything under
/// `min_similarity` or outside `scope`, and keeps the best `limit` in
/// descending order. Equal scores keep iteration order.
pub fn rank_by_similarity<'a>(
    records: impl IntoIterator<Item = &'a IndexedVector>,
    query_vector: &[f32],
    model: &str,
    min_similarity: f32,
    limit: usize,
    scope: Option<&SearchScope>,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = records
        .into_iter()
        .filter(|record| record.model == model)
        .filter(|record| scope.map_or(true, |scope| scope.contains(&record.path)))
        .filter_map(|record| {
            let similarity = cosine_similarity(query_vector, &record.embedding);
            (similarity >= min_similarity).then(|| SearchHit {
                record: record.without_embedding(),
                similarity,
            })
        })
        .collect();

    hits.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
    hits.truncate(limit);
    hits
}
