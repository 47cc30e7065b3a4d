// src/models/user.rs

use std::{str::FromStr, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::{
    error::AppError,
    models::{analytics::UserStats, attempt::QuizResultDetail},
};

static THEME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(light|dark|system)$").expect("theme pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Teacher,
    Administrator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Administrator => "administrator",
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            "administrator" => Ok(UserRole::Administrator),
            other => Err(AppError::ValidationError(format!("Unknown role '{other}'"))),
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,

    /// Unique login e-mail.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub institution: Option<String>,
    pub specialization: Option<String>,
    pub year_of_study: Option<i32>,
    pub website: Option<String>,

    /// Never empty; a user without any other role is a student.
    pub roles: Vec<UserRole>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}

/// Profile as visible to other users.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub institution: Option<String>,
    pub specialization: Option<String>,
    pub roles: Vec<UserRole>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            bio: user.bio,
            institution: user.institution,
            specialization: user.specialization,
            roles: user.roles,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid e-mail address is required."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 200))]
    pub institution: Option<String>,
    #[validate(length(max = 100))]
    pub specialization: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub year_of_study: Option<i32>,
    #[validate(custom(function = validate_website))]
    pub website: Option<String>,
}

fn validate_website(website: &str) -> Result<(), ValidationError> {
    match url::Url::parse(website) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}

/// Represents the 'user_preferences' table. A row is created with the defaults on first read.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct UserPreferences {
    pub user_id: String,
    /// 'light', 'dark' or 'system'.
    pub theme: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub study_reminders: bool,
    pub show_score_immediately: bool,
    pub show_explanations_with_results: bool,
    /// Minutes.
    pub default_quiz_time_limit: Option<i32>,
    pub default_subject_filter: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    pub fn defaults(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            theme: "system".to_string(),
            email_notifications: true,
            push_notifications: true,
            study_reminders: true,
            show_score_immediately: true,
            show_explanations_with_results: true,
            default_quiz_time_limit: None,
            default_subject_filter: None,
            updated_at: now,
        }
    }

    /// Applies the fields present in `update`.
    pub fn apply(&mut self, update: UpdatePreferencesRequest, now: DateTime<Utc>) {
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(v) = update.email_notifications {
            self.email_notifications = v;
        }
        if let Some(v) = update.push_notifications {
            self.push_notifications = v;
        }
        if let Some(v) = update.study_reminders {
            self.study_reminders = v;
        }
        if let Some(v) = update.show_score_immediately {
            self.show_score_immediately = v;
        }
        if let Some(v) = update.show_explanations_with_results {
            self.show_explanations_with_results = v;
        }
        if let Some(limit) = update.default_quiz_time_limit {
            self.default_quiz_time_limit = Some(limit);
        }
        if let Some(subject) = update.default_subject_filter {
            self.default_subject_filter = Some(subject);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePreferencesRequest {
    #[validate(regex(path = *THEME_PATTERN, message = "Theme must be light, dark or system."))]
    pub theme: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub study_reminders: Option<bool>,
    pub show_score_immediately: Option<bool>,
    pub show_explanations_with_results: Option<bool>,
    #[validate(range(min = 1, max = 600))]
    pub default_quiz_time_limit: Option<i32>,
    #[validate(length(min = 1, max = 100))]
    pub default_subject_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Login,
    QuizStart,
    QuizComplete,
    ProfileUpdate,
    ContentCreate,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Login => "login",
            ActivityType::QuizStart => "quiz_start",
            ActivityType::QuizComplete => "quiz_complete",
            ActivityType::ProfileUpdate => "profile_update",
            ActivityType::ContentCreate => "content_create",
        }
    }
}

impl FromStr for ActivityType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(ActivityType::Login),
            "quiz_start" => Ok(ActivityType::QuizStart),
            "quiz_complete" => Ok(ActivityType::QuizComplete),
            "profile_update" => Ok(ActivityType::ProfileUpdate),
            "content_create" => Ok(ActivityType::ContentCreate),
            other => Err(AppError::RepositoryError(format!(
                "unknown activity type '{other}'"
            ))),
        }
    }
}

/// One entry of the 'user_activities' log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserActivity {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[schema(value_type = Option<Object>)]
    pub details: Option<Map<String, Value>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Where a logged request came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogActivityParams {
    pub activity_type: ActivityType,
}

/// Own profile with everything the dashboard shows.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserDashboard {
    #[serde(flatten)]
    pub profile: User,
    pub stats: UserStats,
    /// Newest first.
    pub recent_activity: Vec<UserActivity>,
    pub recent_results: Vec<QuizResultDetail>,
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchUsersParams {
    /// Case-insensitive match on name, e-mail, specialization or institution.
    pub query: Option<String>,
    pub role: Option<UserRole>,
    pub institution: Option<String>,
    pub specialization: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl SearchUsersParams {
    pub const DEFAULT_LIMIT: i64 = 10;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}
