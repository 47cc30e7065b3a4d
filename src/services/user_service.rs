// src/services/user_service.rs

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::analytics,
    error::{AppError, AppResult},
    models::{
        analytics::UserStats,
        quiz::PaginatedResponse,
        user::{
            ActivityType, ClientInfo, CreateUserRequest, LoginRequest, SearchUsersParams,
            UpdatePreferencesRequest, UpdateProfileRequest, User, UserActivity, UserDashboard,
            UserPreferences, UserRole,
        },
    },
    repositories::{QuizRepository, UserRepository},
    services::attempt_service::AttemptService,
    utils::{
        hash::{hash_password, verify_password},
        html::clean_html,
    },
};

pub const DEFAULT_ROLE: UserRole = UserRole::Student;
pub const DASHBOARD_ACTIVITY_LIMIT: i64 = 10;
pub const DASHBOARD_RESULTS_LIMIT: usize = 5;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<AttemptService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<AttemptService>,
    ) -> Self {
        Self {
            users,
            quizzes,
            attempts,
        }
    }

    pub async fn register(&self, request: CreateUserRequest) -> AppResult<User> {
        request.validate()?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: request.email.trim().to_lowercase(),
            password_hash: hash_password(&request.password)?,
            display_name: request.display_name.as_deref().map(clean_html),
            bio: None,
            institution: None,
            specialization: None,
            year_of_study: None,
            website: None,
            roles: vec![DEFAULT_ROLE],
            created_at: Utc::now(),
            updated_at: None,
            last_active_at: None,
        };
        self.users.create_user(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Checks credentials. Unknown e-mail and wrong password fail the same way.
    pub async fn authenticate(&self, request: LoginRequest) -> AppResult<User> {
        request.validate()?;

        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
        let user = self
            .users
            .find_by_email(&request.email.trim().to_lowercase())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Failed login");
            return Err(invalid());
        }

        self.log_activity(&user.id, ActivityType::Login, None, ClientInfo::default())
            .await;
        Ok(user)
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> AppResult<User> {
        request.validate()?;
        let mut user = self.get_profile(user_id).await?;

        if let Some(display_name) = request.display_name {
            user.display_name = Some(clean_html(&display_name));
        }
        if let Some(bio) = request.bio {
            user.bio = Some(clean_html(&bio));
        }
        if let Some(institution) = request.institution {
            user.institution = Some(clean_html(&institution));
        }
        if let Some(specialization) = request.specialization {
            user.specialization = Some(clean_html(&specialization));
        }
        if let Some(year) = request.year_of_study {
            user.year_of_study = Some(year);
        }
        if let Some(website) = request.website {
            user.website = Some(website);
        }
        user.updated_at = Some(Utc::now());

        self.users.update_profile(&user).await?;
        Ok(user)
    }

    /// Recomputed on every call from completed attempts and their results.
    pub async fn get_stats(&self, user_id: &str) -> AppResult<UserStats> {
        let quizzes_created = self.quizzes.count_quizzes_by_creator(user_id).await?;
        let (attempts, answered) = self.attempts.answered_questions(user_id).await?;

        Ok(analytics::user_stats(
            user_id,
            quizzes_created,
            &attempts,
            &answered,
            Utc::now(),
        ))
    }

    /// Stored preferences, created with the defaults on first read.
    pub async fn get_preferences(&self, user_id: &str) -> AppResult<UserPreferences> {
        if let Some(preferences) = self.users.get_preferences(user_id).await? {
            return Ok(preferences);
        }

        let preferences = UserPreferences::defaults(user_id, Utc::now());
        self.users.save_preferences(&preferences).await?;
        tracing::debug!(user_id, "Default preferences created");
        Ok(preferences)
    }

    pub async fn update_preferences(
        &self,
        user_id: &str,
        request: UpdatePreferencesRequest,
    ) -> AppResult<UserPreferences> {
        request.validate()?;

        let mut preferences = self.get_preferences(user_id).await?;
        let request = UpdatePreferencesRequest {
            default_subject_filter: request.default_subject_filter.as_deref().map(clean_html),
            ..request
        };
        preferences.apply(request, Utc::now());
        self.users.save_preferences(&preferences).await?;
        Ok(preferences)
    }

    /// Profile, stats, the latest activity and results, and preferences in one response.
    pub async fn get_dashboard(&self, user_id: &str) -> AppResult<UserDashboard> {
        let profile = self.get_profile(user_id).await?;
        let stats = self.get_stats(user_id).await?;
        let recent_activity = self
            .users
            .recent_activities(user_id, DASHBOARD_ACTIVITY_LIMIT)
            .await?;
        let recent_results = self
            .attempts
            .get_history(user_id, DASHBOARD_RESULTS_LIMIT)
            .await?
            .attempts;
        let preferences = self.get_preferences(user_id).await?;

        Ok(UserDashboard {
            profile,
            stats,
            recent_activity,
            recent_results,
            preferences,
        })
    }

    pub async fn search_users(
        &self,
        params: SearchUsersParams,
    ) -> AppResult<PaginatedResponse<User>> {
        params.validate()?;
        let (users, total) = self.users.search_users(&params).await?;
        Ok(PaginatedResponse::new(users, total, params.page(), params.limit()))
    }

    /// Adds or removes one role of `target_id`. Only administrators may do this. A user left
    /// without roles becomes a student.
    pub async fn change_role(
        &self,
        actor_id: &str,
        target_id: &str,
        role: UserRole,
        add: bool,
    ) -> AppResult<User> {
        let actor = self.get_profile(actor_id).await?;
        if !actor.has_role(UserRole::Administrator) {
            tracing::warn!(actor_id, target_id, role = role.as_str(), "Role change refused");
            return Err(AppError::Forbidden(
                "Only administrators can change roles".to_string(),
            ));
        }

        let mut user = self.get_profile(target_id).await?;
        let mut roles: BTreeSet<UserRole> = user.roles.iter().copied().collect();
        if add {
            roles.insert(role);
        } else {
            roles.remove(&role);
        }
        if roles.is_empty() {
            roles.insert(DEFAULT_ROLE);
        }

        let now = Utc::now();
        user.roles = roles.into_iter().collect();
        user.updated_at = Some(now);
        self.users.update_roles(&user.id, &user.roles, now).await?;

        let action = if add { "added" } else { "removed" };
        tracing::info!(actor_id, target_id, role = role.as_str(), action, "Role changed");
        let mut details = Map::new();
        details.insert(
            "message".to_string(),
            Value::String(format!("Role {} {action}", role.as_str())),
        );
        self.log_activity(
            target_id,
            ActivityType::ProfileUpdate,
            Some(details),
            ClientInfo::default(),
        )
        .await;

        Ok(user)
    }

    /// Records an activity and moves `last_active_at`. A failed write is logged and
    /// otherwise ignored so it never fails the request it accompanies.
    pub async fn log_activity(
        &self,
        user_id: &str,
        activity_type: ActivityType,
        details: Option<Map<String, Value>>,
        client: ClientInfo,
    ) {
        let activity = UserActivity {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            activity_type,
            details,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            timestamp: Utc::now(),
        };

        if let Err(err) = self.users.log_activity(&activity).await {
            tracing::warn!(
                user_id,
                activity = activity_type.as_str(),
                error = %err,
                "Failed to log activity"
            );
        }
    }
}
