// src/models/attempt.rs

use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::quiz::PublicQuiz,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl FromStr for AttemptStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            "expired" => Ok(AttemptStatus::Expired),
            other => Err(AppError::RepositoryError(format!(
                "unknown attempt status '{other}'"
            ))),
        }
    }
}

/// One user's timed run through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    /// Percentage, 0 to 100.
    pub score: Option<f64>,
    pub points_earned: Option<f64>,
    pub points_possible: Option<f64>,
    pub passed: Option<bool>,
}

impl Attempt {
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    /// Moves the attempt into a terminal state. Terminal attempts never change again.
    pub fn transition(&mut self, update: &AttemptUpdate) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Attempt {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        match update {
            AttemptUpdate::Completed(c) => {
                self.completed_at = Some(c.completed_at);
                self.time_taken_seconds = Some(c.time_taken_seconds);
                self.score = Some(c.score);
                self.points_earned = Some(c.points_earned);
                self.points_possible = Some(c.points_possible);
                self.passed = c.passed;
            }
            AttemptUpdate::Expired => {}
        }
        self.status = update.status();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    pub time_taken_seconds: i64,
    pub score: f64,
    pub points_earned: f64,
    pub points_possible: f64,
    pub passed: Option<bool>,
}

/// Fields written when an attempt leaves `in_progress`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptUpdate {
    Completed(Completion),
    Expired,
}

impl AttemptUpdate {
    pub fn status(&self) -> AttemptStatus {
        match self {
            AttemptUpdate::Completed(_) => AttemptStatus::Completed,
            AttemptUpdate::Expired => AttemptStatus::Expired,
        }
    }
}

/// Graded outcome of one question within one attempt. Written once at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionResult {
    pub question_id: String,
    /// Question text at grading time.
    pub question_text: String,
    pub is_correct: bool,
    pub points_earned: f64,
    pub points_possible: f64,
    pub selected_option_ids: Vec<String>,
    pub correct_option_ids: Vec<String>,
    pub explanation: Option<String>,
}

/// A submitted answer: one option id, or a set of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multi(BTreeSet<String>),
}

impl Answer {
    pub fn selected(&self) -> BTreeSet<&str> {
        match self {
            Answer::Single(id) => BTreeSet::from([id.as_str()]),
            Answer::Multi(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StartAttemptRequest {
    #[validate(length(min = 1))]
    pub quiz_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubmitAttemptRequest {
    /// Question id to a single option id or an array of option ids.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub answers: HashMap<String, Answer>,
    #[validate(range(min = 1, message = "Time taken must be positive."))]
    pub time_taken_seconds: i64,
}

/// Returned when an attempt starts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptView {
    pub attempt_id: String,
    pub quiz_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub quiz: PublicQuiz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizResultDetail {
    pub attempt_id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub user_id: String,
    pub score: f64,
    pub points_earned: f64,
    pub points_possible: f64,
    pub passed: Option<bool>,
    pub time_taken_seconds: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_questions: usize,
    pub correct_questions: usize,
    pub question_results: Vec<QuestionResult>,
}

impl QuizResultDetail {
    /// Assembles the detail view of a completed attempt.
    pub fn from_completed(
        attempt: &Attempt,
        quiz_title: &str,
        question_results: Vec<QuestionResult>,
    ) -> AppResult<Self> {
        let not_completed =
            || AppError::InvalidState(format!("Attempt {} has not been completed", attempt.id));

        if attempt.status != AttemptStatus::Completed {
            return Err(not_completed());
        }

        Ok(Self {
            attempt_id: attempt.id.clone(),
            quiz_id: attempt.quiz_id.clone(),
            quiz_title: quiz_title.to_string(),
            user_id: attempt.user_id.clone(),
            score: attempt.score.ok_or_else(not_completed)?,
            points_earned: attempt.points_earned.ok_or_else(not_completed)?,
            points_possible: attempt.points_possible.ok_or_else(not_completed)?,
            passed: attempt.passed,
            time_taken_seconds: attempt.time_taken_seconds.unwrap_or_default(),
            started_at: attempt.started_at,
            completed_at: attempt.completed_at.ok_or_else(not_completed)?,
            total_questions: question_results.len(),
            correct_questions: question_results.iter().filter(|r| r.is_correct).count(),
            question_results,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> Attempt {
        let now = Utc::now();
        Attempt {
            id: "a1".into(),
            quiz_id: "q1".into(),
            user_id: "u1".into(),
            started_at: now,
            expires_at: None,
            status: AttemptStatus::InProgress,
            completed_at: None,
            time_taken_seconds: None,
            score: None,
            points_earned: None,
            points_possible: None,
            passed: None,
        }
    }

    #[test]
    fn answers_deserialize_as_single_or_multi() {
        let answers: HashMap<String, Answer> =
            serde_json::from_str(r#"{"q1": "o1", "q2": ["o2", "o3", "o2"]}"#).unwrap();

        assert_eq!(answers["q1"], Answer::Single("o1".into()));
        assert_eq!(answers["q2"].selected(), BTreeSet::from(["o2", "o3"]));
    }

    #[test]
    fn terminal_attempt_rejects_further_transitions() {
        let mut attempt = attempt();
        attempt.transition(&AttemptUpdate::Expired).unwrap();
        assert_eq!(attempt.status, AttemptStatus::Expired);

        let err = attempt.transition(&AttemptUpdate::Expired).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(attempt.score.is_none());
    }

    #[test]
    fn result_detail_requires_completed_attempt() {
        let attempt = attempt();
        let err = QuizResultDetail::from_completed(&attempt, "Quiz", vec![]).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }
}
