#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use quiz_backend::{
    auth::JwtIdentityProvider,
    config::Config,
    create_router,
    error::{AppError, AppResult},
    models::{
        attempt::{Attempt, AttemptStatus, AttemptUpdate, QuestionResult},
        quiz::{CreateQuizRequest, Quiz, QuizListParams, QuizSummary},
        user::{SearchUsersParams, User, UserActivity, UserPreferences, UserRole},
    },
    repositories::{AttemptRepository, QuizRepository, UserRepository},
    state::AppState,
};

pub const TEST_JWT_SECRET: &str = "test-secret-for-integration-tests";

#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn get_quiz(&self, id: &str) -> AppResult<Option<Quiz>> {
        Ok(self.quizzes.read().await.get(id).cloned())
    }

    async fn list_quizzes(&self, params: &QuizListParams) -> AppResult<(Vec<QuizSummary>, i64)> {
        let quizzes = self.quizzes.read().await;
        let search = params.search.as_deref().map(str::to_lowercase);
        let tags = params.normalized_tags();

        let mut items: Vec<&Quiz> = quizzes
            .values()
            .filter(|q| params.status.is_none_or(|s| q.status == s))
            .filter(|q| params.subject.as_deref().is_none_or(|s| q.subject == s))
            .filter(|q| params.year_level.is_none_or(|y| q.year_level == Some(y)))
            .filter(|q| params.created_by.as_deref().is_none_or(|c| q.created_by == c))
            .filter(|q| tags.iter().all(|t| q.tags.contains(t)))
            .filter(|q| {
                search.as_deref().is_none_or(|s| {
                    q.title.to_lowercase().contains(s)
                        || q.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(s))
                })
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = items.len() as i64;
        let page = items
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .map(QuizSummary::from)
            .collect();

        Ok((page, total))
    }

    async fn create_quiz(&self, quiz: &Quiz) -> AppResult<()> {
        self.quizzes
            .write()
            .await
            .insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> AppResult<()> {
        let mut quizzes = self.quizzes.write().await;
        match quizzes.get_mut(&quiz.id) {
            Some(existing) => {
                *existing = quiz.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Quiz {} not found", quiz.id))),
        }
    }

    async fn delete_quiz(&self, id: &str) -> AppResult<bool> {
        Ok(self.quizzes.write().await.remove(id).is_some())
    }

    async fn count_quizzes_by_creator(&self, user_id: &str) -> AppResult<i64> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.values().filter(|q| q.created_by == user_id).count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryAttemptRepository {
    attempts: RwLock<HashMap<String, Attempt>>,
    results: RwLock<HashMap<String, Vec<QuestionResult>>>,
}

impl InMemoryAttemptRepository {
    /// Moves the deadline of a stored attempt, e.g. into the past.
    pub async fn set_deadline(&self, id: &str, deadline: DateTime<Utc>) {
        if let Some(attempt) = self.attempts.write().await.get_mut(id) {
            attempt.expires_at = Some(deadline);
        }
    }

    pub async fn stored(&self, id: &str) -> Option<Attempt> {
        self.attempts.read().await.get(id).cloned()
    }
}

#[async_trait]
impl AttemptRepository for InMemoryAttemptRepository {
    async fn create_attempt(&self, attempt: &Attempt) -> AppResult<()> {
        self.attempts
            .write()
            .await
            .insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, id: &str) -> AppResult<Option<Attempt>> {
        Ok(self.attempts.read().await.get(id).cloned())
    }

    async fn update_attempt_state(
        &self,
        id: &str,
        expected: AttemptStatus,
        update: &AttemptUpdate,
    ) -> AppResult<bool> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(id) {
            Some(attempt) if attempt.status == expected => {
                attempt.transition(update)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_question_results(
        &self,
        attempt_id: &str,
        results: &[QuestionResult],
    ) -> AppResult<()> {
        self.results
            .write()
            .await
            .insert(attempt_id.to_string(), results.to_vec());
        Ok(())
    }

    async fn list_completed_attempts(&self, user_id: &str) -> AppResult<Vec<Attempt>> {
        let attempts = self.attempts.read().await;
        let mut completed: Vec<Attempt> = attempts
            .values()
            .filter(|a| a.user_id == user_id && a.status == AttemptStatus::Completed)
            .cloned()
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(completed)
    }

    async fn list_question_results(&self, attempt_id: &str) -> AppResult<Vec<QuestionResult>> {
        Ok(self
            .results
            .read()
            .await
            .get(attempt_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Lets a rival writer move the attempt out of `in_progress` right after each read,
/// so the caller always acts on a stale snapshot.
pub struct RivalAttemptRepository {
    pub inner: InMemoryAttemptRepository,
    rival: AttemptUpdate,
}

impl RivalAttemptRepository {
    pub fn new(rival: AttemptUpdate) -> Self {
        Self {
            inner: InMemoryAttemptRepository::default(),
            rival,
        }
    }
}

#[async_trait]
impl AttemptRepository for RivalAttemptRepository {
    async fn create_attempt(&self, attempt: &Attempt) -> AppResult<()> {
        self.inner.create_attempt(attempt).await
    }

    async fn get_attempt(&self, id: &str) -> AppResult<Option<Attempt>> {
        let snapshot = self.inner.get_attempt(id).await?;
        self.inner
            .update_attempt_state(id, AttemptStatus::InProgress, &self.rival)
            .await?;
        Ok(snapshot)
    }

    async fn update_attempt_state(
        &self,
        id: &str,
        expected: AttemptStatus,
        update: &AttemptUpdate,
    ) -> AppResult<bool> {
        self.inner.update_attempt_state(id, expected, update).await
    }

    async fn create_question_results(
        &self,
        attempt_id: &str,
        results: &[QuestionResult],
    ) -> AppResult<()> {
        self.inner.create_question_results(attempt_id, results).await
    }

    async fn list_completed_attempts(&self, user_id: &str) -> AppResult<Vec<Attempt>> {
        self.inner.list_completed_attempts(user_id).await
    }

    async fn list_question_results(&self, attempt_id: &str) -> AppResult<Vec<QuestionResult>> {
        self.inner.list_question_results(attempt_id).await
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
    preferences: RwLock<HashMap<String, UserPreferences>>,
    activities: RwLock<Vec<UserActivity>>,
}

impl InMemoryUserRepository {
    /// Every logged activity of one user, oldest first.
    pub async fn activities_of(&self, user_id: &str) -> Vec<UserActivity> {
        let activities = self.activities.read().await;
        activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }
}

fn contains_ignore_case(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(&needle.to_lowercase()))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: &User) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn update_profile(&self, user: &User) -> AppResult<()> {
        self.users
            .write()
            .await
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn search_users(&self, params: &SearchUsersParams) -> AppResult<(Vec<User>, i64)> {
        let users = self.users.read().await;
        let mut matches: Vec<&User> = users
            .values()
            .filter(|u| {
                params.query.as_deref().is_none_or(|q| {
                    contains_ignore_case(u.display_name.as_deref(), q)
                        || contains_ignore_case(Some(u.email.as_str()), q)
                        || contains_ignore_case(u.specialization.as_deref(), q)
                        || contains_ignore_case(u.institution.as_deref(), q)
                })
            })
            .filter(|u| params.role.is_none_or(|r| u.has_role(r)))
            .filter(|u| {
                params
                    .institution
                    .as_deref()
                    .is_none_or(|i| contains_ignore_case(u.institution.as_deref(), i))
            })
            .filter(|u| {
                params
                    .specialization
                    .as_deref()
                    .is_none_or(|s| contains_ignore_case(u.specialization.as_deref(), s))
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_roles(
        &self,
        user_id: &str,
        roles: &[UserRole],
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(user) = self.users.write().await.get_mut(user_id) {
            user.roles = roles.to_vec();
            user.updated_at = Some(updated_at);
        }
        Ok(())
    }

    async fn get_preferences(&self, user_id: &str) -> AppResult<Option<UserPreferences>> {
        Ok(self.preferences.read().await.get(user_id).cloned())
    }

    async fn save_preferences(&self, preferences: &UserPreferences) -> AppResult<()> {
        self.preferences
            .write()
            .await
            .insert(preferences.user_id.clone(), preferences.clone());
        Ok(())
    }

    async fn log_activity(&self, activity: &UserActivity) -> AppResult<()> {
        self.activities.write().await.push(activity.clone());
        if let Some(user) = self.users.write().await.get_mut(&activity.user_id) {
            user.last_active_at = Some(activity.timestamp);
        }
        Ok(())
    }

    async fn recent_activities(&self, user_id: &str, limit: i64) -> AppResult<Vec<UserActivity>> {
        let mut recent = self.activities_of(user_id).await;
        recent.reverse();
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expiration: 3600,
        rust_log: "info".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        db_max_connections: 1,
        log_dir: "logs".to_string(),
    }
}

/// Application state over in-memory repositories, with handles to poke at them.
pub struct TestContext {
    pub state: AppState,
    pub quizzes: Arc<InMemoryQuizRepository>,
    pub attempts: Arc<InMemoryAttemptRepository>,
    pub users: Arc<InMemoryUserRepository>,
}

pub fn test_context() -> TestContext {
    let quizzes = Arc::new(InMemoryQuizRepository::default());
    let attempts = Arc::new(InMemoryAttemptRepository::default());
    let users = Arc::new(InMemoryUserRepository::default());

    let state = AppState::with_repositories(
        test_config(),
        Arc::new(JwtIdentityProvider::new(TEST_JWT_SECRET)),
        quizzes.clone(),
        attempts.clone(),
        users.clone(),
    );

    TestContext {
        state,
        quizzes,
        attempts,
        users,
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub attempts: Arc<InMemoryAttemptRepository>,
    pub users: Arc<InMemoryUserRepository>,
}

/// Serves the full router on a random local port.
pub async fn spawn_app() -> TestApp {
    let context = test_context();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let app = create_router(context.state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        attempts: context.attempts,
        users: context.users,
    }
}

impl TestApp {
    /// Grants `roles` directly in storage, bypassing the administrator check.
    pub async fn grant_roles(&self, user_id: &str, roles: &[UserRole]) {
        self.users
            .update_roles(user_id, roles, Utc::now())
            .await
            .unwrap();
    }

    /// Registers `email` and returns `(user_id, token)`.
    pub async fn register_and_login(&self, email: &str) -> (String, String) {
        let password = "password123";

        let user: Value = self
            .client
            .post(format!("{}/api/auth/register", self.address))
            .json(&json!({ "email": email, "password": password, "display_name": "Tester" }))
            .send()
            .await
            .expect("Failed to execute request.")
            .json()
            .await
            .unwrap();

        let login: Value = self
            .client
            .post(format!("{}/api/auth/login", self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
            .json()
            .await
            .unwrap();

        (
            user["id"].as_str().unwrap().to_string(),
            login["token"].as_str().unwrap().to_string(),
        )
    }
}

/// Two questions: a single choice one ("4" correct) and a multiple choice one
/// ("2" and "3" correct out of "2", "3", "4").
pub fn sample_quiz_json(status: &str) -> Value {
    json!({
        "title": "Arithmetic Basics",
        "description": "Small sums and primes",
        "subject": "Mathematics",
        "year_level": 3,
        "time_limit": 10,
        "pass_score": 60.0,
        "tags": ["Arithmetic", "primes"],
        "status": status,
        "questions": [
            {
                "text": "What is 2 + 2?",
                "type": "single_choice",
                "tags": ["arithmetic"],
                "explanation": "Two plus two is four.",
                "options": [
                    { "text": "3", "is_correct": false },
                    { "text": "4", "is_correct": true },
                    { "text": "5", "is_correct": false }
                ]
            },
            {
                "text": "Which numbers are prime?",
                "type": "multiple_choice",
                "tags": ["primes"],
                "options": [
                    { "text": "2", "is_correct": true },
                    { "text": "3", "is_correct": true },
                    { "text": "4", "is_correct": false }
                ]
            }
        ]
    })
}

pub fn sample_quiz_request(status: &str) -> CreateQuizRequest {
    serde_json::from_value(sample_quiz_json(status)).unwrap()
}

/// Id of the option with text `text` in question `question_index`.
pub fn option_id(quiz: &Quiz, question_index: usize, text: &str) -> String {
    quiz.questions[question_index]
        .options
        .iter()
        .find(|o| o.text == text)
        .map(|o| o.id.clone())
        .unwrap()
}
