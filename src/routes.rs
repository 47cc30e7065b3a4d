// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::auth_middleware,
    docs::ApiDoc,
    handlers::{attempt, auth, health, profile, quiz},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Public: auth, health, API docs.
/// * Protected (bearer token or `access_token` cookie): quizzes, attempts, users.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        );

    let attempt_routes = Router::new()
        .route("/start", post(attempt::start_attempt))
        .route("/history", get(attempt::get_history))
        .route("/analytics", get(attempt::get_analytics))
        .route("/{id}/submit", post(attempt::submit_attempt))
        .route("/{id}/result", get(attempt::get_result));

    let user_routes = Router::new()
        .route("/me", get(profile::get_me).put(profile::update_me))
        .route("/me/stats", get(profile::get_my_stats))
        .route(
            "/me/preferences",
            get(profile::get_my_preferences).put(profile::update_my_preferences),
        )
        .route("/me/dashboard", get(profile::get_my_dashboard))
        .route("/search", get(profile::search_users))
        .route("/activity", post(profile::log_activity))
        .route("/{id}", get(profile::get_user))
        .route(
            "/{id}/role/{role}",
            put(profile::add_role).delete(profile::remove_role),
        );

    let protected = Router::new()
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/users", user_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .merge(protected)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
