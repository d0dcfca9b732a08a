// src/services/availability.rs

//! Availability gate: decides whether a test may be listed, viewed or
//! attempted at a given instant. The decision itself is a pure function of
//! the test record, the clock and the [`WindowPolicy`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    config::WindowPolicy,
    error::ExamError,
    models::{question::PublicQuestion, test::Test},
    store::Store,
};

/// Why a test is closed to candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    Unpublished,
    NotStarted { at: DateTime<Utc> },
    Ended { at: DateTime<Utc> },
}

impl From<DenyReason> for ExamError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unpublished => ExamError::Unpublished,
            DenyReason::NotStarted { at } => ExamError::NotStarted { starts_at: at },
            DenyReason::Ended { at } => ExamError::Ended { ended_at: at },
        }
    }
}

/// Allow/deny decision returned by [`check_availability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub allowed: bool,
    #[serde(flatten)]
    pub denied: Option<DenyReason>,
}

/// Gate decision. Both window bounds are inclusive.
pub fn evaluate(test: &Test, now: DateTime<Utc>, policy: WindowPolicy) -> Result<(), DenyReason> {
    if !test.published {
        return Err(DenyReason::Unpublished);
    }
    if policy == WindowPolicy::AlwaysOpen {
        return Ok(());
    }
    if now < test.start_time {
        return Err(DenyReason::NotStarted { at: test.start_time });
    }
    if now > test.end_time {
        return Err(DenyReason::Ended { at: test.end_time });
    }
    Ok(())
}

/// A published test as handed to a candidate, answer key stripped.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptableTest {
    pub test: Test,
    pub questions: Vec<PublicQuestion>,
}

/// CheckAvailability. Only a missing test is an error; every other outcome
/// is a decision.
pub async fn check_availability(
    store: &dyn Store,
    test_id: i64,
    now: DateTime<Utc>,
    policy: WindowPolicy,
) -> Result<Availability, ExamError> {
    let test = store
        .get_test(test_id)
        .await?
        .ok_or(ExamError::TestNotFound)?;

    let denied = evaluate(&test, now, policy).err();
    Ok(Availability {
        allowed: denied.is_none(),
        denied,
    })
}

/// Loads a test that the gate currently allows, failing with the typed reason
/// otherwise.
pub async fn open_test(
    store: &dyn Store,
    test_id: i64,
    now: DateTime<Utc>,
    policy: WindowPolicy,
) -> Result<Test, ExamError> {
    let test = store
        .get_test(test_id)
        .await?
        .ok_or(ExamError::TestNotFound)?;
    evaluate(&test, now, policy)?;
    Ok(test)
}

/// GetAttemptableTest: test metadata with redacted questions in display order.
pub async fn attemptable_test(
    store: &dyn Store,
    test_id: i64,
    now: DateTime<Utc>,
    policy: WindowPolicy,
) -> Result<AttemptableTest, ExamError> {
    let test = open_test(store, test_id, now, policy).await?;
    let questions = store
        .questions_for_test(test.id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(AttemptableTest { test, questions })
}

/// Public listing: published tests the gate currently allows.
pub async fn list_open_tests(
    store: &dyn Store,
    now: DateTime<Utc>,
    policy: WindowPolicy,
) -> Result<Vec<Test>, ExamError> {
    let tests = store.list_published_tests().await?;
    Ok(tests
        .into_iter()
        .filter(|t| evaluate(t, now, policy).is_ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::end_time_for;
    use chrono::{Duration, TimeZone};

    fn scheduled(published: bool) -> Test {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        Test {
            id: 1,
            title: "Chemistry".into(),
            description: None,
            duration_minutes: 30,
            published,
            start_time: start,
            end_time: end_time_for(start, 30),
            created_by: None,
            created_at: start,
        }
    }

    #[test]
    fn strict_window_boundaries_are_inclusive() {
        let test = scheduled(true);
        let start = test.start_time;
        let end = start + Duration::minutes(30);

        assert_eq!(
            evaluate(&test, start - Duration::seconds(1), WindowPolicy::Strict),
            Err(DenyReason::NotStarted { at: start })
        );
        assert_eq!(evaluate(&test, start, WindowPolicy::Strict), Ok(()));
        assert_eq!(evaluate(&test, end, WindowPolicy::Strict), Ok(()));
        assert_eq!(
            evaluate(&test, end + Duration::seconds(1), WindowPolicy::Strict),
            Err(DenyReason::Ended { at: end })
        );
    }

    #[test]
    fn always_open_ignores_the_window() {
        let test = scheduled(true);
        let way_before = test.start_time - Duration::days(30);
        let way_after = test.end_time + Duration::days(30);

        assert_eq!(evaluate(&test, way_before, WindowPolicy::AlwaysOpen), Ok(()));
        assert_eq!(evaluate(&test, way_after, WindowPolicy::AlwaysOpen), Ok(()));
    }

    #[test]
    fn unpublished_is_denied_under_every_policy() {
        let test = scheduled(false);
        for policy in [WindowPolicy::Strict, WindowPolicy::AlwaysOpen] {
            assert_eq!(
                evaluate(&test, test.start_time, policy),
                Err(DenyReason::Unpublished)
            );
        }
    }

    #[test]
    fn decision_serializes_with_reason_and_instant() {
        let test = scheduled(true);
        let denied = evaluate(&test, test.start_time - Duration::minutes(5), WindowPolicy::Strict).err();
        let json = serde_json::to_value(Availability {
            allowed: false,
            denied,
        })
        .unwrap();

        assert_eq!(json["allowed"], false);
        assert_eq!(json["reason"], "NOT_STARTED");
        assert!(json["at"].is_string());
    }
}
