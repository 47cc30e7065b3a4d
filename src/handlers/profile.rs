// src/handlers/profile.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde_json::{Map, Value};

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, AppQuery},
    models::{
        analytics::UserStats,
        quiz::PaginatedResponse,
        user::{
            ClientInfo, LogActivityParams, PublicProfile, SearchUsersParams,
            UpdatePreferencesRequest, UpdateProfileRequest, User, UserDashboard, UserPreferences,
            UserRole,
        },
    },
    services::UserService,
};

/// Get current user's profile.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses((status = 200, description = "Own profile", body = User)),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.get_profile(&user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.update_profile(&user.id, payload).await?))
}

/// Statistics recomputed from the caller's completed attempts.
#[utoipa::path(
    get,
    path = "/api/users/me/stats",
    tag = "users",
    responses((status = 200, description = "Derived statistics", body = UserStats)),
    security(("bearer_auth" = []))
)]
pub async fn get_my_stats(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.get_stats(&user.id).await?))
}

/// Public profile of any user.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(users): State<Arc<UserService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = users.get_profile(&id).await?;
    Ok(Json(PublicProfile::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/users/me/preferences",
    tag = "users",
    responses((status = 200, description = "Own preferences, defaults on first read", body = UserPreferences)),
    security(("bearer_auth" = []))
)]
pub async fn get_my_preferences(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.get_preferences(&user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/me/preferences",
    tag = "users",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Updated preferences", body = UserPreferences),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_my_preferences(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.update_preferences(&user.id, payload).await?))
}

/// Profile, stats, recent activity, recent results and preferences.
#[utoipa::path(
    get,
    path = "/api/users/me/dashboard",
    tag = "users",
    responses((status = 200, description = "Dashboard", body = UserDashboard)),
    security(("bearer_auth" = []))
)]
pub async fn get_my_dashboard(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.get_dashboard(&user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/search",
    tag = "users",
    params(SearchUsersParams),
    responses(
        (status = 200, description = "One page of users", body = PaginatedResponse<User>),
        (status = 400, description = "Invalid paging")
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_users(
    State(users): State<Arc<UserService>>,
    AppQuery(params): AppQuery<SearchUsersParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(users.search_users(params).await?))
}

/// Administrators only.
#[utoipa::path(
    put,
    path = "/api/users/{id}/role/{role}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User id"),
        ("role" = UserRole, Path, description = "Role to add")
    ),
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_role(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
    Path((id, role)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let role: UserRole = role.parse()?;
    Ok(Json(users.change_role(&user.id, &id, role, true).await?))
}

/// Administrators only. Removing the last role leaves the user a student.
#[utoipa::path(
    delete,
    path = "/api/users/{id}/role/{role}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User id"),
        ("role" = UserRole, Path, description = "Role to remove")
    ),
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_role(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
    Path((id, role)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let role: UserRole = role.parse()?;
    Ok(Json(users.change_role(&user.id, &id, role, false).await?))
}

/// Records an activity of the caller. The optional body is a JSON object of details.
#[utoipa::path(
    post,
    path = "/api/users/activity",
    tag = "users",
    params(LogActivityParams),
    request_body(content = Option<Object>, content_type = "application/json", description = "Optional JSON object of activity details"),
    responses(
        (status = 204, description = "Activity recorded"),
        (status = 400, description = "Unknown activity type or malformed details")
    ),
    security(("bearer_auth" = []))
)]
pub async fn log_activity(
    State(users): State<Arc<UserService>>,
    Extension(user): Extension<AuthUser>,
    AppQuery(params): AppQuery<LogActivityParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let details = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let details: Map<String, Value> = serde_json::from_slice(&body).map_err(|e| {
            AppError::ValidationError(format!("Activity details must be a JSON object: {e}"))
        })?;
        Some(details)
    };

    users
        .log_activity(&user.id, params.activity_type, details, client_info(&headers))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`, plus the user agent.
fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip_address = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .map(str::to_string);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        ip_address,
        user_agent,
    }
}
