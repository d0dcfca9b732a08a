// src/models/test.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'tests' table: metadata of one timed mock test.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Length of the test in minutes.
    pub duration_minutes: i64,

    pub published: bool,
    pub start_time: DateTime<Utc>,

    /// Always `start_time + duration_minutes`; see [`end_time_for`].
    pub end_time: DateTime<Utc>,

    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Test {
    /// Moves the schedule, keeping `end_time` derived from start and duration.
    pub fn reschedule(&mut self, start_time: DateTime<Utc>, duration_minutes: i64) {
        self.start_time = start_time;
        self.duration_minutes = duration_minutes;
        self.end_time = end_time_for(start_time, duration_minutes);
    }
}

/// End of the test window. The only place an end time is ever computed.
pub fn end_time_for(start_time: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
    start_time + Duration::minutes(duration_minutes)
}

/// Insert shape for a test row. The end time is derived by the store.
#[derive(Debug, Clone)]
pub struct NewTest {
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub published: bool,
    pub start_time: DateTime<Utc>,
    pub created_by: Option<i64>,
}

/// DTO for creating a test.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    /// Minutes, at most one day.
    #[validate(range(min = 1, max = 1440))]
    pub duration: i64,
    #[serde(default)]
    pub published: bool,
    pub start_time: DateTime<Utc>,
}

/// DTO for updating a test. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTestRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub duration: Option<i64>,
    pub published: Option<bool>,
    pub start_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn end_time_follows_start_and_duration() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            end_time_for(start, 90),
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn reschedule_recomputes_end_time() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let mut test = Test {
            id: 1,
            title: "Algebra".into(),
            description: None,
            duration_minutes: 30,
            published: true,
            start_time: start,
            end_time: end_time_for(start, 30),
            created_by: None,
            created_at: start,
        };

        let later = start + Duration::hours(2);
        test.reschedule(later, 45);
        assert_eq!(test.end_time, later + Duration::minutes(45));
    }
}
