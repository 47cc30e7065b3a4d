// src/repositories/quiz_repository.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::AppResult,
    models::quiz::{AnswerOption, Question, Quiz, QuizListParams, QuizSummary},
};

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Full quiz with questions and options in display order.
    async fn get_quiz(&self, id: &str) -> AppResult<Option<Quiz>>;
    /// One page of summaries plus the total number of matches.
    async fn list_quizzes(&self, params: &QuizListParams) -> AppResult<(Vec<QuizSummary>, i64)>;
    /// Persists the quiz, its tags, questions and options atomically.
    async fn create_quiz(&self, quiz: &Quiz) -> AppResult<()>;
    /// Writes header fields and replaces the tag set. Questions are left as they are.
    async fn update_quiz(&self, quiz: &Quiz) -> AppResult<()>;
    /// Returns false when nothing was deleted.
    async fn delete_quiz(&self, id: &str) -> AppResult<bool>;
    async fn count_quizzes_by_creator(&self, user_id: &str) -> AppResult<i64>;
}

const QUIZ_COLUMNS: &str = "SELECT q.id, q.title, q.description, q.subject, q.year_level, \
     q.time_limit_minutes, q.pass_score, q.randomize_questions, q.randomize_options, q.status, \
     q.created_by, q.created_at, q.updated_at, \
     COALESCE((SELECT array_agg(t.tag ORDER BY t.position) FROM quiz_tags t WHERE t.quiz_id = q.id), \
     ARRAY[]::TEXT[]) AS tags";

#[derive(Debug, FromRow)]
struct QuizRow {
    id: String,
    title: String,
    description: Option<String>,
    subject: String,
    year_level: Option<i32>,
    time_limit_minutes: Option<i32>,
    pass_score: Option<f64>,
    randomize_questions: bool,
    randomize_options: bool,
    status: String,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    tags: Vec<String>,
}

impl QuizRow {
    fn into_quiz(self, questions: Vec<Question>) -> AppResult<Quiz> {
        Ok(Quiz {
            id: self.id,
            title: self.title,
            description: self.description,
            subject: self.subject,
            year_level: self.year_level,
            time_limit: self.time_limit_minutes,
            pass_score: self.pass_score,
            randomize_questions: self.randomize_questions,
            randomize_options: self.randomize_options,
            tags: self.tags,
            status: self.status.parse()?,
            questions,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct QuizSummaryRow {
    #[sqlx(flatten)]
    quiz: QuizRow,
    question_count: i64,
}

impl TryFrom<QuizSummaryRow> for QuizSummary {
    type Error = crate::error::AppError;

    fn try_from(row: QuizSummaryRow) -> Result<Self, Self::Error> {
        let quiz = row.quiz;
        Ok(QuizSummary {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            subject: quiz.subject,
            year_level: quiz.year_level,
            time_limit: quiz.time_limit_minutes,
            pass_score: quiz.pass_score,
            randomize_questions: quiz.randomize_questions,
            randomize_options: quiz.randomize_options,
            tags: quiz.tags,
            status: quiz.status.parse()?,
            question_count: row.question_count,
            created_by: quiz.created_by,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: String,
    text: String,
    explanation: Option<String>,
    #[sqlx(rename = "type")]
    question_type: String,
    tags: Json<Vec<String>>,
    difficulty: Option<i16>,
    order_index: i32,
}

#[derive(Debug, FromRow)]
struct OptionRow {
    id: String,
    question_id: String,
    text: String,
    is_correct: bool,
    explanation: Option<String>,
    order_index: i32,
}

pub struct PgQuizRepository {
    pool: PgPool,
}

impl PgQuizRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the WHERE clause shared by the page query and the count query.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &QuizListParams) {
    builder.push(" WHERE TRUE");

    if let Some(subject) = &params.subject {
        builder.push(" AND q.subject = ").push_bind(subject.clone());
    }
    if let Some(year_level) = params.year_level {
        builder.push(" AND q.year_level = ").push_bind(year_level);
    }
    if let Some(status) = params.status {
        builder.push(" AND q.status = ").push_bind(status.as_str());
    }
    if let Some(created_by) = &params.created_by {
        builder.push(" AND q.created_by = ").push_bind(created_by.clone());
    }
    let tags = params.normalized_tags();
    if !tags.is_empty() {
        let wanted = tags.len() as i64;
        builder
            .push(" AND (SELECT COUNT(*) FROM quiz_tags t WHERE t.quiz_id = q.id AND t.tag = ANY(")
            .push_bind(tags)
            .push(")) = ")
            .push_bind(wanted);
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (q.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR q.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

async fn replace_tags(conn: &mut PgConnection, quiz_id: &str, tags: &[String]) -> AppResult<()> {
    sqlx::query("DELETE FROM quiz_tags WHERE quiz_id = $1")
        .bind(quiz_id)
        .execute(&mut *conn)
        .await?;

    for (position, tag) in tags.iter().enumerate() {
        sqlx::query("INSERT INTO quiz_tags (quiz_id, tag, position) VALUES ($1, $2, $3)")
            .bind(quiz_id)
            .bind(tag)
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl QuizRepository for PgQuizRepository {
    async fn get_quiz(&self, id: &str) -> AppResult<Option<Quiz>> {
        let row = sqlx::query_as::<_, QuizRow>(&format!("{QUIZ_COLUMNS} FROM quizzes q WHERE q.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, text, explanation, type, tags, difficulty, order_index \
             FROM questions WHERE quiz_id = $1 ORDER BY order_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query_as::<_, OptionRow>(
            "SELECT o.id, o.question_id, o.text, o.is_correct, o.explanation, o.order_index \
             FROM answer_options o JOIN questions qs ON qs.id = o.question_id \
             WHERE qs.quiz_id = $1 ORDER BY o.question_id, o.order_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut options_by_question: HashMap<String, Vec<AnswerOption>> = HashMap::new();
        for option in option_rows {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(AnswerOption {
                    id: option.id,
                    text: option.text,
                    is_correct: option.is_correct,
                    explanation: option.explanation,
                    order_index: option.order_index,
                });
        }

        let questions = question_rows
            .into_iter()
            .map(|q| -> AppResult<Question> {
                Ok(Question {
                    options: options_by_question.remove(&q.id).unwrap_or_default(),
                    question_type: q.question_type.parse()?,
                    id: q.id,
                    text: q.text,
                    explanation: q.explanation,
                    tags: q.tags.0,
                    difficulty: q.difficulty,
                    order_index: q.order_index,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        row.into_quiz(questions).map(Some)
    }

    async fn list_quizzes(&self, params: &QuizListParams) -> AppResult<(Vec<QuizSummary>, i64)> {
        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM quizzes q");
        push_filters(&mut count_query, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_query: QueryBuilder<Postgres> = QueryBuilder::new(QUIZ_COLUMNS);
        page_query.push(
            ", (SELECT COUNT(*) FROM questions qs WHERE qs.quiz_id = q.id) AS question_count \
             FROM quizzes q",
        );
        push_filters(&mut page_query, params);
        page_query
            .push(" ORDER BY q.created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let summaries = page_query
            .build_query_as::<QuizSummaryRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(QuizSummary::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((summaries, total))
    }

    async fn create_quiz(&self, quiz: &Quiz) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quizzes (id, title, description, subject, year_level, time_limit_minutes, \
             pass_score, randomize_questions, randomize_options, status, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.subject)
        .bind(quiz.year_level)
        .bind(quiz.time_limit)
        .bind(quiz.pass_score)
        .bind(quiz.randomize_questions)
        .bind(quiz.randomize_options)
        .bind(quiz.status.as_str())
        .bind(&quiz.created_by)
        .bind(quiz.created_at)
        .execute(&mut *tx)
        .await?;

        replace_tags(&mut tx, &quiz.id, &quiz.tags).await?;

        for question in &quiz.questions {
            sqlx::query(
                "INSERT INTO questions (id, quiz_id, text, explanation, type, tags, difficulty, order_index) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(&question.id)
            .bind(&quiz.id)
            .bind(&question.text)
            .bind(&question.explanation)
            .bind(question.question_type.as_str())
            .bind(Json(question.tags.clone()))
            .bind(question.difficulty)
            .bind(question.order_index)
            .execute(&mut *tx)
            .await?;

            for option in &question.options {
                sqlx::query(
                    "INSERT INTO answer_options (id, question_id, text, is_correct, explanation, order_index) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&option.id)
                .bind(&question.id)
                .bind(&option.text)
                .bind(option.is_correct)
                .bind(&option.explanation)
                .bind(option.order_index)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE quizzes SET title = $2, description = $3, subject = $4, year_level = $5, \
             time_limit_minutes = $6, pass_score = $7, randomize_questions = $8, \
             randomize_options = $9, status = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(&quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.subject)
        .bind(quiz.year_level)
        .bind(quiz.time_limit)
        .bind(quiz.pass_score)
        .bind(quiz.randomize_questions)
        .bind(quiz.randomize_options)
        .bind(quiz.status.as_str())
        .bind(quiz.updated_at)
        .execute(&mut *tx)
        .await?;

        replace_tags(&mut tx, &quiz.id, &quiz.tags).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_quiz(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_quizzes_by_creator(&self, user_id: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quizzes WHERE created_by = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
