// src/models/leaderboard.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A submitted attempt joined with its owner's display name.
#[derive(Debug, Clone, FromRow)]
pub struct SubmittedResult {
    pub attempt_id: i64,
    pub display_name: String,
    pub total_marks: f64,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Aggregated struct for displaying the leaderboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub display_name: String,
    pub total_marks: f64,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Query parameters for the leaderboard.
#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// Number of entries to return (default: 10, max: 100).
    pub limit: Option<usize>,
}
