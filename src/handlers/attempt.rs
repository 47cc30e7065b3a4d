// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    auth::AuthUser,
    config::DEFAULT_HISTORY_LIMIT,
    error::AppError,
    extract::{AppJson, AppQuery},
    models::{
        analytics::{UserQuizHistory, UserStrengthWeakness},
        attempt::{
            AttemptView, HistoryParams, QuizResultDetail, StartAttemptRequest, SubmitAttemptRequest,
        },
    },
    services::AttemptService,
};

/// Starts an attempt and returns the quiz without its answer key.
/// Question and option order is shuffled when the quiz asks for it.
#[utoipa::path(
    post,
    path = "/api/attempts/start",
    tag = "attempts",
    request_body = StartAttemptRequest,
    responses(
        (status = 201, description = "Attempt started", body = AttemptView),
        (status = 403, description = "Quiz not published"),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn start_attempt(
    State(attempts): State<Arc<AttemptService>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let view = attempts.start_attempt(&payload.quiz_id, &user.id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Grades and completes an attempt.
#[utoipa::path(
    post,
    path = "/api/attempts/{id}/submit",
    tag = "attempts",
    params(("id" = String, Path, description = "Attempt id")),
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "Graded result", body = QuizResultDetail),
        (status = 400, description = "Time limit exceeded or invalid payload"),
        (status = 403, description = "Not the attempt owner"),
        (status = 404, description = "Attempt not found"),
        (status = 409, description = "Attempt already completed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_attempt(
    State(attempts): State<Arc<AttemptService>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let result = attempts
        .submit_attempt(&id, &user.id, &payload.answers, payload.time_taken_seconds)
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/attempts/{id}/result",
    tag = "attempts",
    params(("id" = String, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Graded result", body = QuizResultDetail),
        (status = 403, description = "Neither attempt owner nor quiz creator"),
        (status = 404, description = "Attempt not found"),
        (status = 409, description = "Attempt not completed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_result(
    State(attempts): State<Arc<AttemptService>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = attempts.get_result(&id, &user.id).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/attempts/history",
    tag = "attempts",
    params(HistoryParams),
    responses((status = 200, description = "Completed attempts and summary", body = UserQuizHistory)),
    security(("bearer_auth" = []))
)]
pub async fn get_history(
    State(attempts): State<Arc<AttemptService>>,
    Extension(user): Extension<AuthUser>,
    AppQuery(params): AppQuery<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT) as usize;
    let history = attempts.get_history(&user.id, limit).await?;
    Ok(Json(history))
}

#[utoipa::path(
    get,
    path = "/api/attempts/analytics",
    tag = "attempts",
    responses((status = 200, description = "Strengths and weaknesses", body = UserStrengthWeakness)),
    security(("bearer_auth" = []))
)]
pub async fn get_analytics(
    State(attempts): State<Arc<AttemptService>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let analysis = attempts.get_strengths_weaknesses(&user.id).await?;
    Ok(Json(analysis))
}
