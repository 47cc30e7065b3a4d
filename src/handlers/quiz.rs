// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, query_with_list},
    models::quiz::{
        CreateQuizRequest, PaginatedResponse, Quiz, QuizListParams, QuizSummary, QuizView,
        UpdateQuizRequest,
    },
    services::QuizService,
};

/// Lists quizzes, newest first. Only published quizzes are listed unless the caller
/// filters on their own `created_by`.
#[utoipa::path(
    get,
    path = "/api/quizzes",
    tag = "quizzes",
    params(
        QuizListParams,
        ("tag" = Option<Vec<String>>, Query, description = "Repeatable; quizzes must carry every tag")
    ),
    responses((status = 200, description = "One page of quizzes", body = PaginatedResponse<QuizSummary>)),
    security(("bearer_auth" = []))
)]
pub async fn list_quizzes(
    State(quizzes): State<Arc<QuizService>>,
    Extension(user): Extension<AuthUser>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let (mut params, tags) = query_with_list::<QuizListParams>(query.as_deref(), "tag")?;
    params.tags = tags;
    let page = quizzes.list_quizzes(params, &user.id).await?;
    Ok(Json(page))
}

/// Creates a quiz with its questions and options.
#[utoipa::path(
    post,
    path = "/api/quizzes",
    tag = "quizzes",
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created", body = Quiz),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_quiz(
    State(quizzes): State<Arc<QuizService>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes.create_quiz(payload, &user.id).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Returns the quiz. Only its creator gets the answer key and explanations.
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}",
    tag = "quizzes",
    params(("id" = String, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Full quiz for the creator, public view for others", body = QuizView),
        (status = 403, description = "Unpublished quiz of another user"),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_quiz(
    State(quizzes): State<Arc<QuizService>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes.get_quiz(&id, &user.id).await?;
    Ok(Json(quiz))
}

#[utoipa::path(
    put,
    path = "/api/quizzes/{id}",
    tag = "quizzes",
    params(("id" = String, Path, description = "Quiz id")),
    request_body = UpdateQuizRequest,
    responses(
        (status = 200, description = "Updated quiz", body = Quiz),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_quiz(
    State(quizzes): State<Arc<QuizService>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes.update_quiz(&id, payload, &user.id).await?;
    Ok(Json(quiz))
}

#[utoipa::path(
    delete,
    path = "/api/quizzes/{id}",
    tag = "quizzes",
    params(("id" = String, Path, description = "Quiz id")),
    responses(
        (status = 204, description = "Quiz deleted"),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_quiz(
    State(quizzes): State<Arc<QuizService>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    quizzes.delete_quiz(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
