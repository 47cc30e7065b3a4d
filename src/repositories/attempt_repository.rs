// src/repositories/attempt_repository.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::{AppError, AppResult},
    models::attempt::{Attempt, AttemptStatus, AttemptUpdate, QuestionResult},
};

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn create_attempt(&self, attempt: &Attempt) -> AppResult<()>;
    async fn get_attempt(&self, id: &str) -> AppResult<Option<Attempt>>;

    /// Applies `update` only if the attempt is currently in `expected`.
    /// Returns whether the update won; `false` means another writer got there first.
    async fn update_attempt_state(
        &self,
        id: &str,
        expected: AttemptStatus,
        update: &AttemptUpdate,
    ) -> AppResult<bool>;

    async fn create_question_results(
        &self,
        attempt_id: &str,
        results: &[QuestionResult],
    ) -> AppResult<()>;

    /// Completes an in-progress attempt and stores its results.
    /// Returns `false` without writing results if the attempt was no longer in progress.
    async fn complete_attempt(
        &self,
        id: &str,
        update: &AttemptUpdate,
        results: &[QuestionResult],
    ) -> AppResult<bool> {
        if !self
            .update_attempt_state(id, AttemptStatus::InProgress, update)
            .await?
        {
            return Ok(false);
        }
        self.create_question_results(id, results).await?;
        Ok(true)
    }

    /// All completed attempts of a user, newest first.
    async fn list_completed_attempts(&self, user_id: &str) -> AppResult<Vec<Attempt>>;

    /// Results of one attempt in quiz order.
    async fn list_question_results(&self, attempt_id: &str) -> AppResult<Vec<QuestionResult>>;
}

const ATTEMPT_COLUMNS: &str = "SELECT id, quiz_id, user_id, started_at, expires_at, status, \
     completed_at, time_taken_seconds, score, points_earned, points_possible, passed \
     FROM quiz_attempts";

#[derive(Debug, FromRow)]
struct AttemptRow {
    id: String,
    quiz_id: String,
    user_id: String,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    time_taken_seconds: Option<i64>,
    score: Option<f64>,
    points_earned: Option<f64>,
    points_possible: Option<f64>,
    passed: Option<bool>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Attempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            started_at: row.started_at,
            expires_at: row.expires_at,
            status: row.status.parse()?,
            completed_at: row.completed_at,
            time_taken_seconds: row.time_taken_seconds,
            score: row.score,
            points_earned: row.points_earned,
            points_possible: row.points_possible,
            passed: row.passed,
        })
    }
}

#[derive(Debug, FromRow)]
struct QuestionResultRow {
    question_id: String,
    question_text: String,
    is_correct: bool,
    points_earned: f64,
    points_possible: f64,
    selected_option_ids: Json<Vec<String>>,
    correct_option_ids: Json<Vec<String>>,
    explanation: Option<String>,
}

impl From<QuestionResultRow> for QuestionResult {
    fn from(row: QuestionResultRow) -> Self {
        QuestionResult {
            question_id: row.question_id,
            question_text: row.question_text,
            is_correct: row.is_correct,
            points_earned: row.points_earned,
            points_possible: row.points_possible,
            selected_option_ids: row.selected_option_ids.0,
            correct_option_ids: row.correct_option_ids.0,
            explanation: row.explanation,
        }
    }
}

pub struct PgAttemptRepository {
    pool: PgPool,
}

impl PgAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Conditional transition keyed on the current status.
async fn apply_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    expected: AttemptStatus,
    update: &AttemptUpdate,
) -> AppResult<bool> {
    let result = match update {
        AttemptUpdate::Completed(c) => {
            sqlx::query(
                "UPDATE quiz_attempts SET status = $3, completed_at = $4, time_taken_seconds = $5, \
                 score = $6, points_earned = $7, points_possible = $8, passed = $9 \
                 WHERE id = $1 AND status = $2",
            )
            .bind(id)
            .bind(expected.as_str())
            .bind(update.status().as_str())
            .bind(c.completed_at)
            .bind(c.time_taken_seconds)
            .bind(c.score)
            .bind(c.points_earned)
            .bind(c.points_possible)
            .bind(c.passed)
            .execute(executor)
            .await?
        }
        AttemptUpdate::Expired => {
            sqlx::query("UPDATE quiz_attempts SET status = $3 WHERE id = $1 AND status = $2")
                .bind(id)
                .bind(expected.as_str())
                .bind(update.status().as_str())
                .execute(executor)
                .await?
        }
    };
    Ok(result.rows_affected() == 1)
}

fn results_insert(attempt_id: &str, results: &[QuestionResult]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO question_results (attempt_id, question_id, position, question_text, \
         is_correct, points_earned, points_possible, selected_option_ids, correct_option_ids, \
         explanation) ",
    );
    builder.push_values(results.iter().enumerate(), |mut row, (position, result)| {
        row.push_bind(attempt_id.to_string())
            .push_bind(result.question_id.clone())
            .push_bind(position as i32)
            .push_bind(result.question_text.clone())
            .push_bind(result.is_correct)
            .push_bind(result.points_earned)
            .push_bind(result.points_possible)
            .push_bind(Json(result.selected_option_ids.clone()))
            .push_bind(Json(result.correct_option_ids.clone()))
            .push_bind(result.explanation.clone());
    });
    builder
}

#[async_trait]
impl AttemptRepository for PgAttemptRepository {
    async fn create_attempt(&self, attempt: &Attempt) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO quiz_attempts (id, quiz_id, user_id, started_at, expires_at, status) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&attempt.id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.user_id)
        .bind(attempt.started_at)
        .bind(attempt.expires_at)
        .bind(attempt.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_attempt(&self, id: &str) -> AppResult<Option<Attempt>> {
        sqlx::query_as::<_, AttemptRow>(&format!("{ATTEMPT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Attempt::try_from)
            .transpose()
    }

    async fn update_attempt_state(
        &self,
        id: &str,
        expected: AttemptStatus,
        update: &AttemptUpdate,
    ) -> AppResult<bool> {
        apply_update(&self.pool, id, expected, update).await
    }

    async fn create_question_results(
        &self,
        attempt_id: &str,
        results: &[QuestionResult],
    ) -> AppResult<()> {
        if results.is_empty() {
            return Ok(());
        }
        let mut insert = results_insert(attempt_id, results);
        insert.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn complete_attempt(
        &self,
        id: &str,
        update: &AttemptUpdate,
        results: &[QuestionResult],
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        if !apply_update(&mut *tx, id, AttemptStatus::InProgress, update).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        if !results.is_empty() {
            let mut insert = results_insert(id, results);
            insert.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_completed_attempts(&self, user_id: &str) -> AppResult<Vec<Attempt>> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "{ATTEMPT_COLUMNS} WHERE user_id = $1 AND status = 'completed' ORDER BY completed_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Attempt::try_from)
        .collect()
    }

    async fn list_question_results(&self, attempt_id: &str) -> AppResult<Vec<QuestionResult>> {
        let rows = sqlx::query_as::<_, QuestionResultRow>(
            "SELECT question_id, question_text, is_correct, points_earned, points_possible, \
             selected_option_ids, correct_option_ids, explanation \
             FROM question_results WHERE attempt_id = $1 ORDER BY position",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(QuestionResult::from).collect())
    }
}
