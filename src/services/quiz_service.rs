// src/services/quiz_service.rs

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::quiz::{
        CreateQuizRequest, PaginatedResponse, Quiz, QuizListParams, QuizStatus, QuizSummary,
        QuizView, UpdateQuizRequest,
    },
    repositories::QuizRepository,
};

pub struct QuizService {
    quizzes: Arc<dyn QuizRepository>,
}

impl QuizService {
    pub fn new(quizzes: Arc<dyn QuizRepository>) -> Self {
        Self { quizzes }
    }

    /// Other users' quizzes are listed only once published.
    pub async fn list_quizzes(
        &self,
        mut params: QuizListParams,
        user_id: &str,
    ) -> AppResult<PaginatedResponse<QuizSummary>> {
        params.validate()?;
        if params.created_by.as_deref() != Some(user_id) {
            params.status = Some(QuizStatus::Published);
        }

        let (items, total) = self.quizzes.list_quizzes(&params).await?;
        Ok(PaginatedResponse::new(items, total, params.page(), params.limit()))
    }

    pub async fn create_quiz(&self, request: CreateQuizRequest, user_id: &str) -> AppResult<Quiz> {
        request.check()?;

        let quiz = request.into_quiz(user_id, Utc::now());
        self.quizzes.create_quiz(&quiz).await?;

        tracing::info!(
            quiz_id = %quiz.id,
            user_id,
            questions = quiz.questions.len(),
            "Quiz created"
        );
        Ok(quiz)
    }

    /// Unpublished quizzes are only visible to their creator. Other users get the quiz
    /// without its answer key.
    pub async fn get_quiz(&self, id: &str, user_id: &str) -> AppResult<QuizView> {
        let quiz = self.find(id).await?;
        if !quiz.is_published() && !quiz.is_owned_by(user_id) {
            return Err(AppError::Forbidden(
                "This quiz is not published".to_string(),
            ));
        }
        Ok(QuizView::for_user(quiz, user_id))
    }

    pub async fn update_quiz(
        &self,
        id: &str,
        request: UpdateQuizRequest,
        user_id: &str,
    ) -> AppResult<Quiz> {
        request.validate()?;

        let mut quiz = self.find(id).await?;
        Self::ensure_owner(&quiz, user_id, "update")?;

        quiz.apply_update(request, Utc::now());
        self.quizzes.update_quiz(&quiz).await?;

        tracing::info!(quiz_id = %quiz.id, user_id, status = quiz.status.as_str(), "Quiz updated");
        Ok(quiz)
    }

    pub async fn delete_quiz(&self, id: &str, user_id: &str) -> AppResult<()> {
        let quiz = self.find(id).await?;
        Self::ensure_owner(&quiz, user_id, "delete")?;

        if !self.quizzes.delete_quiz(id).await? {
            return Err(AppError::NotFound(format!("Quiz {id} not found")));
        }

        tracing::info!(quiz_id = id, user_id, "Quiz deleted");
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Quiz> {
        self.quizzes
            .get_quiz(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {id} not found")))
    }

    fn ensure_owner(quiz: &Quiz, user_id: &str, action: &str) -> AppResult<()> {
        if quiz.is_owned_by(user_id) {
            Ok(())
        } else {
            tracing::warn!(quiz_id = %quiz.id, user_id, action, "Rejected change by non-owner");
            Err(AppError::Forbidden(format!(
                "Only the quiz creator can {action} this quiz"
            )))
        }
    }
}
