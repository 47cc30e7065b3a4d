// src/services/attempt_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;

use crate::{
    engine::{
        analytics::{self, AnsweredQuestion},
        lifecycle::{self, SubmitDecision},
        randomize::randomize_for_attempt,
        scoring,
    },
    error::{AppError, AppResult},
    models::{
        analytics::{UserQuizHistory, UserStrengthWeakness},
        attempt::{Answer, Attempt, AttemptStatus, AttemptUpdate, AttemptView, QuizResultDetail},
        quiz::Quiz,
    },
    repositories::{AttemptRepository, QuizRepository},
};

/// Orchestrates attempts: loads from the repositories, runs the engine, persists the outcome.
pub struct AttemptService {
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    pub fn new(quizzes: Arc<dyn QuizRepository>, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { quizzes, attempts }
    }

    pub async fn start_attempt(&self, quiz_id: &str, user_id: &str) -> AppResult<AttemptView> {
        let mut quiz = self.find_quiz(quiz_id).await?;
        lifecycle::authorize_start(&quiz, user_id)?;

        let attempt = lifecycle::begin_attempt(&quiz, user_id, Utc::now());
        self.attempts.create_attempt(&attempt).await?;

        {
            let mut rng = rand::thread_rng();
            randomize_for_attempt(&mut quiz, &mut rng);
        }

        tracing::info!(
            attempt_id = %attempt.id,
            quiz_id,
            user_id,
            expires_at = ?attempt.expires_at,
            "Attempt started"
        );

        Ok(AttemptView {
            attempt_id: attempt.id,
            quiz_id: attempt.quiz_id,
            started_at: attempt.started_at,
            expires_at: attempt.expires_at,
            quiz: quiz.into(),
        })
    }

    pub async fn submit_attempt(
        &self,
        attempt_id: &str,
        user_id: &str,
        answers: &HashMap<String, Answer>,
        time_taken_seconds: i64,
    ) -> AppResult<QuizResultDetail> {
        let mut attempt = self.find_attempt(attempt_id).await?;
        let now = Utc::now();

        let decision = match lifecycle::check_submission(&attempt, user_id, now) {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(attempt_id, user_id, error = %err, "Submission rejected");
                return Err(err);
            }
        };
        if decision == SubmitDecision::Expire {
            return Err(self.expire(&attempt).await);
        }

        let quiz = self.find_quiz(&attempt.quiz_id).await?;
        let sheet = scoring::score_quiz(&quiz, answers);
        let update = lifecycle::completion(&sheet, quiz.pass_score, time_taken_seconds, now);

        if !self
            .attempts
            .complete_attempt(attempt_id, &update, &sheet.results)
            .await?
        {
            tracing::warn!(attempt_id, user_id, "Lost completion race");
            return Err(AppError::InvalidState(
                "This quiz attempt has already been completed".to_string(),
            ));
        }

        attempt.transition(&update)?;
        tracing::info!(
            attempt_id,
            user_id,
            score = sheet.percentage(),
            passed = ?attempt.passed,
            "Attempt completed"
        );

        QuizResultDetail::from_completed(&attempt, &quiz.title, sheet.results)
    }

    /// Readable by the attempt owner and the quiz creator, once the attempt is completed.
    pub async fn get_result(&self, attempt_id: &str, user_id: &str) -> AppResult<QuizResultDetail> {
        let attempt = self.find_attempt(attempt_id).await?;
        let quiz = self.find_quiz(&attempt.quiz_id).await?;
        lifecycle::authorize_view(&attempt, &quiz.created_by, user_id)?;

        let results = self.attempts.list_question_results(attempt_id).await?;
        QuizResultDetail::from_completed(&attempt, &quiz.title, results)
    }

    /// The newest `limit` completed attempts, with summary statistics over those same attempts.
    pub async fn get_history(&self, user_id: &str, limit: usize) -> AppResult<UserQuizHistory> {
        let mut completed = self.attempts.list_completed_attempts(user_id).await?;
        analytics::sort_most_recent_first(&mut completed);
        completed.truncate(limit);
        let summary = analytics::history_summary(&completed);

        let mut titles: HashMap<String, String> = HashMap::new();
        let mut details = Vec::with_capacity(completed.len());

        for attempt in &completed {
            if !titles.contains_key(&attempt.quiz_id) {
                let Some(quiz) = self.quizzes.get_quiz(&attempt.quiz_id).await? else {
                    tracing::warn!(attempt_id = %attempt.id, quiz_id = %attempt.quiz_id, "Skipping attempt of missing quiz");
                    continue;
                };
                titles.insert(quiz.id, quiz.title);
            }
            let title = titles.get(&attempt.quiz_id).cloned().unwrap_or_default();
            let results = self.attempts.list_question_results(&attempt.id).await?;
            details.push(QuizResultDetail::from_completed(attempt, &title, results)?);
        }

        Ok(UserQuizHistory {
            attempts: details,
            total_attempts: summary.total_attempts,
            average_score: summary.average_score,
            best_score: summary.best_score,
            total_time_spent_seconds: summary.total_time_spent_seconds,
        })
    }

    pub async fn get_strengths_weaknesses(&self, user_id: &str) -> AppResult<UserStrengthWeakness> {
        let (_, answered) = self.answered_questions(user_id).await?;
        Ok(analytics::strengths_and_weaknesses(&answered))
    }

    /// Completed attempts of a user plus every graded question, annotated with its
    /// quiz subject, question tags and question type. Results whose question no longer
    /// exists in the quiz are skipped.
    pub async fn answered_questions(
        &self,
        user_id: &str,
    ) -> AppResult<(Vec<Attempt>, Vec<AnsweredQuestion>)> {
        let completed = self.attempts.list_completed_attempts(user_id).await?;
        let mut quizzes: HashMap<String, Option<Quiz>> = HashMap::new();
        let mut answered = Vec::new();

        for attempt in &completed {
            if !quizzes.contains_key(&attempt.quiz_id) {
                let quiz = self.quizzes.get_quiz(&attempt.quiz_id).await?;
                quizzes.insert(attempt.quiz_id.clone(), quiz);
            }
            let Some(Some(quiz)) = quizzes.get(&attempt.quiz_id) else {
                continue;
            };

            for result in self.attempts.list_question_results(&attempt.id).await? {
                if let Some(question) = quiz.question(&result.question_id) {
                    answered.push(AnsweredQuestion {
                        subject: quiz.subject.clone(),
                        tags: question.tags.clone(),
                        question_type: question.question_type,
                        is_correct: result.is_correct,
                    });
                }
            }
        }

        Ok((completed, answered))
    }

    /// Marks the attempt expired and returns the error to surface. If the attempt left
    /// `in_progress` in the meantime, the caller sees `InvalidState` instead.
    async fn expire(&self, attempt: &Attempt) -> AppError {
        match self
            .attempts
            .update_attempt_state(&attempt.id, AttemptStatus::InProgress, &AttemptUpdate::Expired)
            .await
        {
            Ok(true) => {
                tracing::info!(attempt_id = %attempt.id, user_id = %attempt.user_id, "Attempt expired");
                AppError::Expired("The time limit for this attempt has passed".to_string())
            }
            Ok(false) => AppError::InvalidState(
                "This quiz attempt has already been completed".to_string(),
            ),
            Err(err) => err,
        }
    }

    async fn find_quiz(&self, id: &str) -> AppResult<Quiz> {
        self.quizzes
            .get_quiz(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {id} not found")))
    }

    async fn find_attempt(&self, id: &str) -> AppResult<Attempt> {
        self.attempts
            .get_attempt(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {id} not found")))
    }
}
