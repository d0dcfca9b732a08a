// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, types::Json};

use super::{FinalizeOutcome, StartOutcome, Store, StoreError};
use crate::models::{
    attempt::{Answer, Attempt, AttemptStatus, Finalize},
    leaderboard::SubmittedResult,
    question::{AnswerOption, NewQuestion, Question, QuestionType},
    test::{NewTest, Test, end_time_for},
    user::{NewUser, Role, User, UserStatus},
};

const USER_COLUMNS: &str = "id, name, email, password, role, status, created_at";
const TEST_COLUMNS: &str =
    "id, title, description, duration_minutes, published, start_time, end_time, created_by, created_at";
const QUESTION_COLUMNS: &str =
    "id, test_id, text, question_type, options, marks, negative_marks, display_order";
const ATTEMPT_COLUMNS: &str =
    "id, user_id, test_id, total_marks, status, started_at, finished_at, late, revision";

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password: String,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            role: Role::parse(&row.role)
                .ok_or_else(|| StoreError::Corrupt(format!("user role {:?}", row.role)))?,
            status: UserStatus::parse(&row.status)
                .ok_or_else(|| StoreError::Corrupt(format!("user status {:?}", row.status)))?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    test_id: i64,
    text: String,
    question_type: String,
    options: Json<Vec<AnswerOption>>,
    marks: f64,
    negative_marks: f64,
    display_order: i32,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            test_id: row.test_id,
            text: row.text,
            question_type: QuestionType::parse(&row.question_type).ok_or_else(|| {
                StoreError::Corrupt(format!("question type {:?}", row.question_type))
            })?,
            options: row.options.0,
            marks: row.marks,
            negative_marks: row.negative_marks,
            display_order: row.display_order,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    user_id: i64,
    test_id: i64,
    total_marks: f64,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    late: bool,
    revision: i64,
}

impl AttemptRow {
    fn into_attempt(self, answers: Vec<Answer>) -> Result<Attempt, StoreError> {
        Ok(Attempt {
            id: self.id,
            user_id: self.user_id,
            test_id: self.test_id,
            answers,
            total_marks: self.total_marks,
            status: AttemptStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("attempt status {:?}", self.status)))?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            late: self.late,
            revision: self.revision,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    attempt_id: i64,
    question_id: i64,
    selected_option_id: Option<String>,
    correct: bool,
    marks_awarded: f64,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            question_id: row.question_id,
            selected_option_id: row.selected_option_id,
            correct: row.correct,
            marks_awarded: row.marks_awarded,
        }
    }
}

async fn load_answers<'e, E: PgExecutor<'e>>(
    executor: E,
    attempt_id: i64,
) -> Result<Vec<Answer>, StoreError> {
    let rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT attempt_id, question_id, selected_option_id, correct, marks_awarded
        FROM attempt_answers
        WHERE attempt_id = $1
        ORDER BY position
        "#,
    )
    .bind(attempt_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Answer::from).collect())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let email = user.email.to_lowercase();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, password, role, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&email)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("Email '{}' already registered", email))
            } else {
                StoreError::from(e)
            }
        })?;

        row.try_into()
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_users_by_status(&self, status: UserStatus) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE status = $1 ORDER BY id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn set_user_status(
        &self,
        id: i64,
        status: UserStatus,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET status = $1 WHERE id = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn create_test(&self, test: NewTest) -> Result<Test, StoreError> {
        let end_time = end_time_for(test.start_time, test.duration_minutes);
        let created = sqlx::query_as::<_, Test>(&format!(
            "INSERT INTO tests (title, description, duration_minutes, published, start_time, end_time, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {TEST_COLUMNS}"
        ))
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.duration_minutes)
        .bind(test.published)
        .bind(test.start_time)
        .bind(end_time)
        .bind(test.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_test(&self, id: i64) -> Result<Option<Test>, StoreError> {
        let test =
            sqlx::query_as::<_, Test>(&format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(test)
    }

    async fn update_test(&self, test: &Test) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tests
            SET title = $1, description = $2, duration_minutes = $3, published = $4,
                start_time = $5, end_time = $6
            WHERE id = $7
            "#,
        )
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.duration_minutes)
        .bind(test.published)
        .bind(test.start_time)
        .bind(end_time_for(test.start_time, test.duration_minutes))
        .bind(test.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_test(&self, id: i64) -> Result<bool, StoreError> {
        // questions go with the test via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_published_tests(&self) -> Result<Vec<Test>, StoreError> {
        let tests = sqlx::query_as::<_, Test>(&format!(
            "SELECT {TEST_COLUMNS} FROM tests WHERE published = TRUE ORDER BY start_time, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(tests)
    }

    async fn insert_questions(
        &self,
        test_id: i64,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<Question>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tests WHERE id = $1)")
            .bind(test_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(StoreError::NotFound);
        }

        let mut inserted = Vec::with_capacity(questions.len());
        for q in questions {
            let row = sqlx::query_as::<_, QuestionRow>(&format!(
                "INSERT INTO questions (test_id, text, question_type, options, marks, negative_marks, display_order) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {QUESTION_COLUMNS}"
            ))
            .bind(test_id)
            .bind(&q.text)
            .bind(q.question_type.as_str())
            .bind(Json(&q.options))
            .bind(q.marks)
            .bind(q.negative_marks)
            .bind(q.display_order)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(Question::try_from(row)?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Question::try_from)
        .transpose()
    }

    async fn questions_for_test(&self, test_id: i64) -> Result<Vec<Question>, StoreError> {
        sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE test_id = $1 ORDER BY display_order, id"
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect()
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect()
    }

    async fn update_question(&self, question: &Question) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET text = $1, question_type = $2, options = $3, marks = $4,
                negative_marks = $5, display_order = $6
            WHERE id = $7
            "#,
        )
        .bind(&question.text)
        .bind(question.question_type.as_str())
        .bind(Json(&question.options))
        .bind(question.marks)
        .bind(question.negative_marks)
        .bind(question.display_order)
        .bind(question.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn start_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        now: DateTime<Utc>,
        allow_retakes: bool,
    ) -> Result<StartOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialises starts per user; the partial unique index backs this up.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts \
             WHERE user_id = $1 AND test_id = $2 AND status = 'in_progress'"
        ))
        .bind(user_id)
        .bind(test_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let answers = load_answers(&mut *tx, row.id).await?;
            tx.commit().await?;
            return Ok(StartOutcome::Resumed(row.into_attempt(answers)?));
        }

        if !allow_retakes {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM attempts \
                 WHERE user_id = $1 AND test_id = $2 AND status = 'submitted')",
            )
            .bind(user_id)
            .bind(test_id)
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                tx.commit().await?;
                return Ok(StartOutcome::AlreadyTaken);
            }
        }

        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "INSERT INTO attempts (user_id, test_id, status, started_at) \
             VALUES ($1, $2, 'in_progress', $3) RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(test_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("attempt already in progress".to_string())
            } else {
                StoreError::from(e)
            }
        })?;

        tx.commit().await?;
        Ok(StartOutcome::Created(row.into_attempt(Vec::new())?))
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let answers = load_answers(&self.pool, row.id).await?;
                Ok(Some(row.into_attempt(answers)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_answer(&self, attempt_id: i64, answer: Answer) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM attempts WHERE id = $1 FOR UPDATE")
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?;

        match status.as_deref() {
            None => return Err(StoreError::NotFound),
            Some("in_progress") => {}
            Some(_) => return Err(StoreError::Conflict("attempt already submitted".to_string())),
        }

        sqlx::query(
            r#"
            INSERT INTO attempt_answers
                (attempt_id, question_id, position, selected_option_id, correct, marks_awarded)
            VALUES (
                $1, $2,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM attempt_answers WHERE attempt_id = $1),
                $3, $4, $5
            )
            ON CONFLICT (attempt_id, question_id) DO UPDATE
            SET selected_option_id = EXCLUDED.selected_option_id,
                correct = EXCLUDED.correct,
                marks_awarded = EXCLUDED.marks_awarded
            "#,
        )
        .bind(attempt_id)
        .bind(answer.question_id)
        .bind(&answer.selected_option_id)
        .bind(answer.correct)
        .bind(answer.marks_awarded)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE attempts SET revision = revision + 1 WHERE id = $1")
            .bind(attempt_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn finalize_attempt(
        &self,
        attempt_id: i64,
        finalize: Finalize,
    ) -> Result<FinalizeOutcome, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "UPDATE attempts SET status = 'submitted', total_marks = $2, finished_at = $3, late = $4 \
             WHERE id = $1 AND status = 'in_progress' AND revision = $5 \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(attempt_id)
        .bind(finalize.total_marks)
        .bind(finalize.finished_at)
        .bind(finalize.late)
        .bind(finalize.revision)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let answers = load_answers(&self.pool, row.id).await?;
            return Ok(FinalizeOutcome::Submitted(row.into_attempt(answers)?));
        }

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM attempts WHERE id = $1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;

        match status.as_deref() {
            None => Err(StoreError::NotFound),
            Some("submitted") => Ok(FinalizeOutcome::AlreadySubmitted),
            Some(_) => Ok(FinalizeOutcome::Stale),
        }
    }

    async fn attempts_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StoreError> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE test_id = $1 ORDER BY id DESC"
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let answer_rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT attempt_id, question_id, selected_option_id, correct, marks_awarded
            FROM attempt_answers
            WHERE attempt_id = ANY($1)
            ORDER BY attempt_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_attempt: HashMap<i64, Vec<Answer>> = HashMap::new();
        for row in answer_rows {
            by_attempt.entry(row.attempt_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let answers = by_attempt.remove(&row.id).unwrap_or_default();
                row.into_attempt(answers)
            })
            .collect()
    }

    async fn test_has_attempts(&self, test_id: i64) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM attempts WHERE test_id = $1)")
                .bind(test_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn submitted_results(&self, test_id: i64) -> Result<Vec<SubmittedResult>, StoreError> {
        let rows = sqlx::query_as::<_, SubmittedResult>(
            r#"
            SELECT
                a.id AS attempt_id,
                COALESCE(u.name, 'Unknown') AS display_name,
                a.total_marks,
                a.finished_at
            FROM attempts a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.test_id = $1 AND a.status = 'submitted'
            ORDER BY a.id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
