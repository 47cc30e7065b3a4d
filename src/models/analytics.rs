// src/models/analytics.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::attempt::QuizResultDetail;

/// Completed attempts (most recent first) plus summary statistics over those attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserQuizHistory {
    pub attempts: Vec<QuizResultDetail>,
    pub total_attempts: usize,
    pub average_score: f64,
    pub best_score: f64,
    pub total_time_spent_seconds: i64,
}

/// Correctness accounting for one subject or tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroupPerformance {
    pub name: String,
    /// Percentage of answered questions that were correct.
    pub score: f64,
    pub questions_answered: u32,
    pub questions_correct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TypePerformance {
    pub score: f64,
    pub questions_answered: u32,
    pub questions_correct: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserStrengthWeakness {
    pub strong_subjects: Vec<GroupPerformance>,
    /// Worst first.
    pub weak_subjects: Vec<GroupPerformance>,
    pub strong_tags: Vec<GroupPerformance>,
    pub weak_tags: Vec<GroupPerformance>,
    /// Keyed by question type name.
    pub performance_by_question_type: BTreeMap<String, TypePerformance>,
}

/// Derived per-user statistics, recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserStats {
    pub user_id: String,
    pub quizzes_created: i64,
    pub quizzes_completed: usize,
    pub quizzes_passed: usize,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub average_score: f64,
    /// Seconds.
    pub total_time_spent: i64,
    pub strongest_subject: Option<String>,
    pub weakest_subject: Option<String>,
    pub last_updated: DateTime<Utc>,
}
