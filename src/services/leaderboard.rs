// src/services/leaderboard.rs

use crate::{
    config::{LEADERBOARD_DEFAULT_LIMIT, LEADERBOARD_MAX_LIMIT},
    error::ExamError,
    models::leaderboard::{LeaderboardEntry, SubmittedResult},
    store::Store,
};

/// Orders submitted attempts and assigns 1-based ranks.
///
/// Highest total first; ties go to whoever finished earlier, then to the
/// lower attempt id, so the order never depends on storage order.
pub fn rank(mut rows: Vec<SubmittedResult>, limit: usize) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.total_marks
            .total_cmp(&a.total_marks)
            .then_with(|| {
                (a.finished_at.is_none(), a.finished_at).cmp(&(b.finished_at.is_none(), b.finished_at))
            })
            .then_with(|| a.attempt_id.cmp(&b.attempt_id))
    });

    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i + 1,
            display_name: row.display_name,
            total_marks: row.total_marks,
            finished_at: row.finished_at,
        })
        .collect()
}

/// Clamps a requested size into `1..=LEADERBOARD_MAX_LIMIT`.
pub fn effective_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(LEADERBOARD_DEFAULT_LIMIT)
        .clamp(1, LEADERBOARD_MAX_LIMIT)
}

/// Leaderboard of a test. Only submitted attempts appear.
pub async fn leaderboard(
    store: &dyn Store,
    test_id: i64,
    limit: Option<usize>,
) -> Result<Vec<LeaderboardEntry>, ExamError> {
    if store.get_test(test_id).await?.is_none() {
        return Err(ExamError::TestNotFound);
    }
    let rows = store.submitted_results(test_id).await?;
    Ok(rank(rows, effective_limit(limit)))
}
