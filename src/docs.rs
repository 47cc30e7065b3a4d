// src/docs.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::handlers::{attempt, auth, health, profile, quiz};

#[derive(OpenApi)]
#[openapi(
    info(title = "Quiz Backend API", description = "Quizzes, timed attempts, scoring and analytics"),
    paths(
        auth::register,
        auth::login,
        quiz::list_quizzes,
        quiz::create_quiz,
        quiz::get_quiz,
        quiz::update_quiz,
        quiz::delete_quiz,
        attempt::start_attempt,
        attempt::submit_attempt,
        attempt::get_result,
        attempt::get_history,
        attempt::get_analytics,
        profile::get_me,
        profile::update_me,
        profile::get_my_stats,
        profile::get_user,
        profile::get_my_preferences,
        profile::update_my_preferences,
        profile::get_my_dashboard,
        profile::search_users,
        profile::add_role,
        profile::remove_role,
        profile::log_activity,
        health::health_check,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "quizzes", description = "Quiz management"),
        (name = "attempts", description = "Taking quizzes and reviewing results"),
        (name = "users", description = "Profiles, preferences, statistics and roles"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
