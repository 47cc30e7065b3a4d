// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    auth::{IdentityProvider, JwtIdentityProvider},
    config::Config,
    repositories::{
        AttemptRepository, PgAttemptRepository, PgQuizRepository, PgUserRepository,
        QuizRepository, UserRepository,
    },
    services::{AttemptService, QuizService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Absent when the state is built over non-Postgres repositories.
    pub pool: Option<PgPool>,
    pub identity: Arc<dyn IdentityProvider>,
    pub quiz_service: Arc<QuizService>,
    pub attempt_service: Arc<AttemptService>,
    pub user_service: Arc<UserService>,
}

impl AppState {
    /// Wires the Postgres repositories and the JWT identity provider.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let identity = Arc::new(JwtIdentityProvider::new(config.jwt_secret.clone()));
        let mut state = Self::with_repositories(
            config,
            identity,
            Arc::new(PgQuizRepository::new(pool.clone())),
            Arc::new(PgAttemptRepository::new(pool.clone())),
            Arc::new(PgUserRepository::new(pool.clone())),
        );
        state.pool = Some(pool);
        state
    }

    /// Builds the services over the given collaborators.
    pub fn with_repositories(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let attempt_service = Arc::new(AttemptService::new(quizzes.clone(), attempts));
        let user_service = Arc::new(UserService::new(
            users,
            quizzes.clone(),
            attempt_service.clone(),
        ));

        Self {
            config,
            pool: None,
            identity,
            quiz_service: Arc::new(QuizService::new(quizzes)),
            attempt_service,
            user_service,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<QuizService> {
    fn from_ref(state: &AppState) -> Self {
        state.quiz_service.clone()
    }
}

impl FromRef<AppState> for Arc<AttemptService> {
    fn from_ref(state: &AppState) -> Self {
        state.attempt_service.clone()
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(state: &AppState) -> Self {
        state.user_service.clone()
    }
}
