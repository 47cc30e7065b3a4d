// src/engine/lifecycle.rs

//! Attempt state machine: `in_progress` -> `completed` | `expired`.
//!
//! These functions decide transitions; persisting them atomically is the repository's job
//! (see [`AttemptRepository::update_attempt_state`](crate::repositories::attempt_repository::AttemptRepository::update_attempt_state)).

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    engine::scoring::ScoreSheet,
    error::{AppError, AppResult},
    models::{
        attempt::{Attempt, AttemptStatus, AttemptUpdate, Completion},
        quiz::Quiz,
    },
};

/// What a submission should do once its preconditions hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    Grade,
    /// Deadline passed: mark the attempt expired and reject the submission.
    Expire,
}

/// Opens a new attempt. `expires_at` is set only when the quiz has a time limit.
pub fn begin_attempt(quiz: &Quiz, user_id: &str, now: DateTime<Utc>) -> Attempt {
    Attempt {
        id: Uuid::new_v4().to_string(),
        quiz_id: quiz.id.clone(),
        user_id: user_id.to_string(),
        started_at: now,
        expires_at: quiz
            .time_limit
            .map(|minutes| now + Duration::minutes(i64::from(minutes))),
        status: AttemptStatus::InProgress,
        completed_at: None,
        time_taken_seconds: None,
        score: None,
        points_earned: None,
        points_possible: None,
        passed: None,
    }
}

/// Unpublished quizzes can only be attempted by their creator.
pub fn authorize_start(quiz: &Quiz, user_id: &str) -> AppResult<()> {
    if quiz.is_published() || quiz.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Quiz {} is not published",
            quiz.id
        )))
    }
}

/// Checks ownership and state, then the deadline.
pub fn check_submission(
    attempt: &Attempt,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<SubmitDecision> {
    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "Only the user who started this attempt can submit it".to_string(),
        ));
    }

    match attempt.status {
        AttemptStatus::InProgress => {}
        AttemptStatus::Completed => {
            return Err(AppError::InvalidState(
                "This quiz attempt has already been completed".to_string(),
            ));
        }
        AttemptStatus::Expired => {
            return Err(AppError::InvalidState(
                "This quiz attempt has expired and can no longer be submitted".to_string(),
            ));
        }
    }

    if attempt.is_past_deadline(now) {
        Ok(SubmitDecision::Expire)
    } else {
        Ok(SubmitDecision::Grade)
    }
}

/// The attempt owner and the quiz creator may read results.
pub fn authorize_view(attempt: &Attempt, quiz_creator: &str, user_id: &str) -> AppResult<()> {
    if attempt.user_id == user_id || quiz_creator == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have access to this attempt".to_string(),
        ))
    }
}

pub fn completion(
    sheet: &ScoreSheet,
    pass_score: Option<f64>,
    time_taken_seconds: i64,
    now: DateTime<Utc>,
) -> AttemptUpdate {
    AttemptUpdate::Completed(Completion {
        completed_at: now,
        time_taken_seconds,
        score: sheet.percentage(),
        points_earned: sheet.points_earned,
        points_possible: sheet.points_possible,
        passed: sheet.passed(pass_score),
    })
}
