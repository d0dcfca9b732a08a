// src/store/mod.rs

//! Persistence boundary of the service.
//!
//! The exam core only talks to [`Store`]. Every method is atomic from the
//! caller's point of view; the attempt primitives additionally carry the
//! concurrency guarantees the engine relies on:
//!
//! * [`Store::start_attempt`] never leaves two in-progress attempts for one
//!   `(user, test)` pair, however many callers race.
//! * [`Store::upsert_answer`] checks `in_progress` at write time and bumps the
//!   attempt revision.
//! * [`Store::finalize_attempt`] flips the status only if the attempt is still
//!   in progress at the revision the summary was computed from.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    attempt::{Answer, Attempt, Finalize},
    leaderboard::SubmittedResult,
    question::{NewQuestion, Question},
    test::{NewTest, Test},
    user::{NewUser, User, UserStatus},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn Store>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness or state precondition failed at write time.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped back into the domain.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Result of an atomic find-or-create of an attempt.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// An in-progress attempt already existed and is returned unchanged.
    Resumed(Attempt),
    /// A fresh in-progress attempt was created.
    Created(Attempt),
    /// Retakes are disabled and a submitted attempt exists.
    AlreadyTaken,
}

/// Result of a conditional finalisation.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    Submitted(Attempt),
    /// The attempt was already submitted by someone else.
    AlreadySubmitted,
    /// Answers changed after the summary was computed.
    Stale,
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_users_by_status(&self, status: UserStatus) -> Result<Vec<User>, StoreError>;
    async fn set_user_status(
        &self,
        id: i64,
        status: UserStatus,
    ) -> Result<Option<User>, StoreError>;

    // tests
    async fn create_test(&self, test: NewTest) -> Result<Test, StoreError>;
    async fn get_test(&self, id: i64) -> Result<Option<Test>, StoreError>;
    async fn update_test(&self, test: &Test) -> Result<(), StoreError>;
    /// Deletes the test and all of its questions. Attempts are kept.
    async fn delete_test(&self, id: i64) -> Result<bool, StoreError>;
    async fn list_published_tests(&self) -> Result<Vec<Test>, StoreError>;

    // questions
    async fn insert_questions(
        &self,
        test_id: i64,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<Question>, StoreError>;
    async fn get_question(&self, id: i64) -> Result<Option<Question>, StoreError>;
    /// Ordered by display order, then id.
    async fn questions_for_test(&self, test_id: i64) -> Result<Vec<Question>, StoreError>;
    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, StoreError>;
    async fn update_question(&self, question: &Question) -> Result<(), StoreError>;
    async fn delete_question(&self, id: i64) -> Result<bool, StoreError>;

    // attempts
    async fn start_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        now: DateTime<Utc>,
        allow_retakes: bool,
    ) -> Result<StartOutcome, StoreError>;
    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError>;
    /// `NotFound` if the attempt is missing, `Conflict` if it is not in progress.
    async fn upsert_answer(&self, attempt_id: i64, answer: Answer) -> Result<(), StoreError>;
    async fn finalize_attempt(
        &self,
        attempt_id: i64,
        finalize: Finalize,
    ) -> Result<FinalizeOutcome, StoreError>;
    /// Newest first.
    async fn attempts_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StoreError>;
    async fn test_has_attempts(&self, test_id: i64) -> Result<bool, StoreError>;
    /// Submitted attempts of a test in storage order, unranked.
    async fn submitted_results(&self, test_id: i64) -> Result<Vec<SubmittedResult>, StoreError>;
}
