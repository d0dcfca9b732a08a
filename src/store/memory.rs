// src/store/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{FinalizeOutcome, StartOutcome, Store, StoreError};
use crate::models::{
    attempt::{Answer, Attempt, AttemptStatus, Finalize},
    leaderboard::SubmittedResult,
    question::{NewQuestion, Question},
    test::{NewTest, Test, end_time_for},
    user::{NewUser, User, UserStatus},
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    tests: BTreeMap<i64, Test>,
    questions: BTreeMap<i64, Question>,
    attempts: BTreeMap<i64, Attempt>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. One mutex guards every table, so each method is a
/// single critical section; used by tests and single-node development.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock().await;
        let email = user.email.to_lowercase();
        if t.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!(
                "Email '{}' already registered",
                email
            )));
        }
        let id = t.allocate_id();
        let user = User {
            id,
            name: user.name,
            email,
            password: user.password,
            role: user.role,
            status: user.status,
            created_at: Utc::now(),
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_lowercase();
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users_by_status(&self, status: UserStatus) -> Result<Vec<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t
            .users
            .values()
            .filter(|u| u.status == status)
            .cloned()
            .collect())
    }

    async fn set_user_status(
        &self,
        id: i64,
        status: UserStatus,
    ) -> Result<Option<User>, StoreError> {
        let mut t = self.tables.lock().await;
        Ok(t.users.get_mut(&id).map(|u| {
            u.status = status;
            u.clone()
        }))
    }

    async fn create_test(&self, test: NewTest) -> Result<Test, StoreError> {
        let mut t = self.tables.lock().await;
        let id = t.allocate_id();
        let test = Test {
            id,
            end_time: end_time_for(test.start_time, test.duration_minutes),
            title: test.title,
            description: test.description,
            duration_minutes: test.duration_minutes,
            published: test.published,
            start_time: test.start_time,
            created_by: test.created_by,
            created_at: Utc::now(),
        };
        t.tests.insert(id, test.clone());
        Ok(test)
    }

    async fn get_test(&self, id: i64) -> Result<Option<Test>, StoreError> {
        Ok(self.tables.lock().await.tests.get(&id).cloned())
    }

    async fn update_test(&self, test: &Test) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let slot = t.tests.get_mut(&test.id).ok_or(StoreError::NotFound)?;
        *slot = test.clone();
        slot.end_time = end_time_for(test.start_time, test.duration_minutes);
        Ok(())
    }

    async fn delete_test(&self, id: i64) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        if t.tests.remove(&id).is_none() {
            return Ok(false);
        }
        t.questions.retain(|_, q| q.test_id != id);
        Ok(true)
    }

    async fn list_published_tests(&self) -> Result<Vec<Test>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.tests.values().filter(|t| t.published).cloned().collect())
    }

    async fn insert_questions(
        &self,
        test_id: i64,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<Question>, StoreError> {
        let mut t = self.tables.lock().await;
        if !t.tests.contains_key(&test_id) {
            return Err(StoreError::NotFound);
        }
        let mut inserted = Vec::with_capacity(questions.len());
        for q in questions {
            let id = t.allocate_id();
            let question = Question {
                id,
                test_id,
                text: q.text,
                question_type: q.question_type,
                options: q.options,
                marks: q.marks,
                negative_marks: q.negative_marks,
                display_order: q.display_order,
            };
            t.questions.insert(id, question.clone());
            inserted.push(question);
        }
        Ok(inserted)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        Ok(self.tables.lock().await.questions.get(&id).cloned())
    }

    async fn questions_for_test(&self, test_id: i64) -> Result<Vec<Question>, StoreError> {
        let t = self.tables.lock().await;
        let mut questions: Vec<Question> = t
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.display_order, q.id));
        Ok(questions)
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, StoreError> {
        let t = self.tables.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| t.questions.get(id).cloned())
            .collect())
    }

    async fn update_question(&self, question: &Question) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let slot = t
            .questions
            .get_mut(&question.id)
            .ok_or(StoreError::NotFound)?;
        *slot = question.clone();
        Ok(())
    }

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.questions.remove(&id).is_some())
    }

    async fn start_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        now: DateTime<Utc>,
        allow_retakes: bool,
    ) -> Result<StartOutcome, StoreError> {
        let mut t = self.tables.lock().await;
        let mut submitted = false;
        for attempt in t
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.test_id == test_id)
        {
            match attempt.status {
                AttemptStatus::InProgress => return Ok(StartOutcome::Resumed(attempt.clone())),
                AttemptStatus::Submitted => submitted = true,
            }
        }
        if submitted && !allow_retakes {
            return Ok(StartOutcome::AlreadyTaken);
        }

        let id = t.allocate_id();
        let attempt = Attempt {
            id,
            user_id,
            test_id,
            answers: Vec::new(),
            total_marks: 0.0,
            status: AttemptStatus::InProgress,
            started_at: now,
            finished_at: None,
            late: false,
            revision: 0,
        };
        t.attempts.insert(id, attempt.clone());
        Ok(StartOutcome::Created(attempt))
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        Ok(self.tables.lock().await.attempts.get(&id).cloned())
    }

    async fn upsert_answer(&self, attempt_id: i64, answer: Answer) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let attempt = t
            .attempts
            .get_mut(&attempt_id)
            .ok_or(StoreError::NotFound)?;
        if !attempt.is_in_progress() {
            return Err(StoreError::Conflict("attempt already submitted".to_string()));
        }
        attempt.upsert_answer(answer);
        Ok(())
    }

    async fn finalize_attempt(
        &self,
        attempt_id: i64,
        finalize: Finalize,
    ) -> Result<FinalizeOutcome, StoreError> {
        let mut t = self.tables.lock().await;
        let attempt = t
            .attempts
            .get_mut(&attempt_id)
            .ok_or(StoreError::NotFound)?;
        if !attempt.is_in_progress() {
            return Ok(FinalizeOutcome::AlreadySubmitted);
        }
        if attempt.revision != finalize.revision {
            return Ok(FinalizeOutcome::Stale);
        }
        attempt.status = AttemptStatus::Submitted;
        attempt.total_marks = finalize.total_marks;
        attempt.finished_at = Some(finalize.finished_at);
        attempt.late = finalize.late;
        Ok(FinalizeOutcome::Submitted(attempt.clone()))
    }

    async fn attempts_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t
            .attempts
            .values()
            .rev()
            .filter(|a| a.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn test_has_attempts(&self, test_id: i64) -> Result<bool, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.attempts.values().any(|a| a.test_id == test_id))
    }

    async fn submitted_results(&self, test_id: i64) -> Result<Vec<SubmittedResult>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t
            .attempts
            .values()
            .filter(|a| a.test_id == test_id && a.status == AttemptStatus::Submitted)
            .map(|a| SubmittedResult {
                attempt_id: a.id,
                display_name: t
                    .users
                    .get(&a.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                total_marks: a.total_marks,
                finished_at: a.finished_at,
            })
            .collect())
    }
}
