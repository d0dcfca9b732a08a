// src/services/attempt.rs

//! Attempt engine: owns the `in_progress -> submitted` lifecycle of a user's
//! run through a test.
//!
//! All state lives in the store; the engine holds nothing between calls.
//! Answer grading happens at save time and is a snapshot. Totals are only
//! computed at submission, from the persisted answers, so editing an answer
//! never double counts.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::{
    config::{ExamPolicy, LateSubmission, SUBMIT_MAX_RETRIES},
    error::ExamError,
    models::attempt::{Attempt, Finalize, SavedAnswer, ScoreSummary},
    services::{availability, scoring},
    store::{DynStore, FinalizeOutcome, StartOutcome, StoreError},
};

/// Outcome of StartAttempt.
#[derive(Debug, Clone)]
pub struct StartedAttempt {
    pub attempt: Attempt,
    /// `true` when an existing in-progress attempt was returned.
    pub resumed: bool,
}

#[derive(Clone)]
pub struct AttemptEngine {
    store: DynStore,
    policy: ExamPolicy,
}

impl AttemptEngine {
    pub fn new(store: DynStore, policy: ExamPolicy) -> Self {
        Self { store, policy }
    }

    /// StartAttempt. Idempotent while an attempt is in progress.
    pub async fn start_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        now: DateTime<Utc>,
    ) -> Result<StartedAttempt, ExamError> {
        availability::open_test(self.store.as_ref(), test_id, now, self.policy.window).await?;

        match self
            .store
            .start_attempt(user_id, test_id, now, self.policy.allow_retakes)
            .await?
        {
            StartOutcome::Resumed(attempt) => {
                debug!(attempt_id = attempt.id, user_id, test_id, "resuming attempt");
                Ok(StartedAttempt {
                    attempt,
                    resumed: true,
                })
            }
            StartOutcome::Created(attempt) => {
                info!(attempt_id = attempt.id, user_id, test_id, "attempt started");
                Ok(StartedAttempt {
                    attempt,
                    resumed: false,
                })
            }
            StartOutcome::AlreadyTaken => Err(ExamError::RetakeNotAllowed),
        }
    }

    /// SaveAnswer. Grades against the current question and upserts the answer.
    pub async fn save_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_option_id: Option<String>,
    ) -> Result<SavedAnswer, ExamError> {
        let attempt = self.get_attempt(attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(ExamError::AlreadySubmitted);
        }

        let question = self
            .store
            .get_question(question_id)
            .await?
            .filter(|q| q.test_id == attempt.test_id)
            .ok_or(ExamError::QuestionNotFound)?;

        let answer = scoring::grade(&question, selected_option_id);
        let correct = answer.correct;

        // The store re-checks the status under its own lock, so a submit that
        // landed since the read above still wins.
        self.store
            .upsert_answer(attempt_id, answer)
            .await
            .map_err(attempt_write_error)?;

        debug!(attempt_id, question_id, correct, "answer saved");
        Ok(SavedAnswer { correct })
    }

    /// SubmitAttempt. Scores the persisted answers and freezes the attempt.
    ///
    /// The summary is computed from one revision of the answers and the
    /// transition only succeeds if no answer was written since; otherwise the
    /// whole cycle is repeated.
    pub async fn submit_attempt(
        &self,
        attempt_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ScoreSummary, ExamError> {
        for _ in 0..SUBMIT_MAX_RETRIES {
            let attempt = self.get_attempt(attempt_id).await?;
            if !attempt.is_in_progress() {
                return Err(ExamError::AlreadySubmitted);
            }

            let late = self.check_deadline(&attempt, now).await?;

            let ids: Vec<i64> = attempt.answers.iter().map(|a| a.question_id).collect();
            let questions: HashMap<_, _> = self
                .store
                .questions_by_ids(&ids)
                .await?
                .into_iter()
                .map(|q| (q.id, q))
                .collect();

            let summary = scoring::summarize(attempt.id, &attempt.answers, &questions, late);
            if !summary.skipped_question_ids.is_empty() {
                warn!(
                    attempt_id,
                    skipped = ?summary.skipped_question_ids,
                    "answers reference deleted questions; excluded from score"
                );
            }

            let finalize = Finalize {
                revision: attempt.revision,
                total_marks: summary.total_marks,
                finished_at: now,
                late,
            };
            match self
                .store
                .finalize_attempt(attempt_id, finalize)
                .await
                .map_err(attempt_write_error)?
            {
                FinalizeOutcome::Submitted(_) => {
                    info!(
                        attempt_id,
                        total_marks = summary.total_marks,
                        percentage = summary.percentage,
                        late,
                        "attempt submitted"
                    );
                    return Ok(summary);
                }
                FinalizeOutcome::AlreadySubmitted => return Err(ExamError::AlreadySubmitted),
                FinalizeOutcome::Stale => {
                    debug!(attempt_id, "answers changed during submission, rescoring");
                }
            }
        }

        Err(ExamError::SubmitContention)
    }

    pub async fn get_attempt(&self, attempt_id: i64) -> Result<Attempt, ExamError> {
        self.store
            .get_attempt(attempt_id)
            .await?
            .ok_or(ExamError::AttemptNotFound)
    }

    /// Loads an attempt owned by `user_id`. Someone else's attempt is
    /// reported as missing.
    pub async fn attempt_for_user(
        &self,
        attempt_id: i64,
        user_id: i64,
    ) -> Result<Attempt, ExamError> {
        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.user_id != user_id {
            return Err(ExamError::AttemptNotFound);
        }
        Ok(attempt)
    }

    /// Server-side duration check. Returns whether the submission is late.
    async fn check_deadline(&self, attempt: &Attempt, now: DateTime<Utc>) -> Result<bool, ExamError> {
        if self.policy.late_submission == LateSubmission::Accept {
            return Ok(false);
        }

        let Some(test) = self.store.get_test(attempt.test_id).await? else {
            warn!(attempt_id = attempt.id, "test of attempt is gone; skipping deadline check");
            return Ok(false);
        };

        let deadline = Duration::try_minutes(test.duration_minutes)
            .zip(Duration::try_seconds(self.policy.submit_grace_seconds))
            .and_then(|(duration, grace)| duration.checked_add(&grace))
            .and_then(|allowed| attempt.started_at.checked_add_signed(allowed));
        // Past the representable calendar, nothing can arrive late.
        let Some(deadline) = deadline else {
            warn!(attempt_id = attempt.id, "deadline out of range; treating submission as on time");
            return Ok(false);
        };
        if now <= deadline {
            return Ok(false);
        }

        match self.policy.late_submission {
            LateSubmission::Reject => Err(ExamError::DeadlineExceeded { deadline }),
            LateSubmission::Flag | LateSubmission::Accept => Ok(true),
        }
    }
}

fn attempt_write_error(err: StoreError) -> ExamError {
    match err {
        StoreError::NotFound => ExamError::AttemptNotFound,
        StoreError::Conflict(_) => ExamError::AlreadySubmitted,
        other => ExamError::Store(other),
    }
}
