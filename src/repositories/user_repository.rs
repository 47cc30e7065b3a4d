// src/repositories/user_repository.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::{AppError, AppResult},
    models::user::{SearchUsersParams, User, UserActivity, UserPreferences, UserRole},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the e-mail is already registered.
    async fn create_user(&self, user: &User) -> AppResult<()>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>>;
    /// Writes the profile fields and `updated_at`.
    async fn update_profile(&self, user: &User) -> AppResult<()>;
    /// One page of users, newest first, plus the total number of matches.
    async fn search_users(&self, params: &SearchUsersParams) -> AppResult<(Vec<User>, i64)>;
    async fn update_roles(
        &self,
        user_id: &str,
        roles: &[UserRole],
        updated_at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn get_preferences(&self, user_id: &str) -> AppResult<Option<UserPreferences>>;
    /// Inserts or replaces the user's preferences.
    async fn save_preferences(&self, preferences: &UserPreferences) -> AppResult<()>;
    /// Appends to the activity log and moves the user's `last_active_at`.
    async fn log_activity(&self, activity: &UserActivity) -> AppResult<()>;
    /// Newest first.
    async fn recent_activities(&self, user_id: &str, limit: i64) -> AppResult<Vec<UserActivity>>;
}

const USER_COLUMNS: &str = "SELECT id, email, password_hash, display_name, bio, institution, \
     specialization, year_of_study, website, roles, created_at, updated_at, last_active_at FROM users";

const PREFERENCE_COLUMNS: &str = "SELECT user_id, theme, email_notifications, push_notifications, \
     study_reminders, show_score_immediately, show_explanations_with_results, \
     default_quiz_time_limit, default_subject_filter, updated_at FROM user_preferences";

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    bio: Option<String>,
    institution: Option<String>,
    specialization: Option<String>,
    year_of_study: Option<i32>,
    website: Option<String>,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    last_active_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|role| role.parse())
            .collect::<AppResult<Vec<UserRole>>>()?;

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            bio: row.bio,
            institution: row.institution,
            specialization: row.specialization,
            year_of_study: row.year_of_study,
            website: row.website,
            roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_active_at: row.last_active_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: String,
    user_id: String,
    #[sqlx(rename = "type")]
    activity_type: String,
    details: Option<Json<Map<String, Value>>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for UserActivity {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(UserActivity {
            id: row.id,
            user_id: row.user_id,
            activity_type: row.activity_type.parse()?,
            details: row.details.map(|d| d.0),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            timestamp: row.timestamp,
        })
    }
}

fn role_names(roles: &[UserRole]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

/// Appends the WHERE clause shared by the page query and the count query.
fn push_search_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &SearchUsersParams) {
    builder.push(" WHERE TRUE");

    if let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{query}%");
        builder.push(" AND (");
        let mut columns = builder.separated(" OR ");
        for column in ["display_name", "email", "specialization", "institution"] {
            columns
                .push(format!("{column} ILIKE "))
                .push_bind_unseparated(pattern.clone());
        }
        builder.push(")");
    }
    if let Some(role) = params.role {
        builder
            .push(" AND ")
            .push_bind(role.as_str())
            .push(" = ANY(roles)");
    }
    if let Some(institution) = &params.institution {
        builder
            .push(" AND institution ILIKE ")
            .push_bind(format!("%{}%", institution.trim()));
    }
    if let Some(specialization) = &params.specialization {
        builder
            .push(" AND specialization ILIKE ")
            .push_bind(format!("%{}%", specialization.trim()));
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_user(&self, column: &str, value: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_COLUMNS} WHERE {column} = $1"))
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, roles, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(role_names(&user.roles))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("E-mail is already registered".to_string())
            }
            other => other.into(),
        })?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.fetch_one_user("email", email).await
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        self.fetch_one_user("id", id).await
    }

    async fn update_profile(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET display_name = $2, bio = $3, institution = $4, specialization = $5, \
             year_of_study = $6, website = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.institution)
        .bind(&user.specialization)
        .bind(user.year_of_study)
        .bind(&user.website)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_users(&self, params: &SearchUsersParams) -> AppResult<(Vec<User>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_search_filters(&mut count, params);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Postgres>::new(USER_COLUMNS);
        push_search_filters(&mut page, params);
        page.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let rows: Vec<UserRow> = page.build_query_as().fetch_all(&self.pool).await?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((users, total))
    }

    async fn update_roles(
        &self,
        user_id: &str,
        roles: &[UserRole],
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE users SET roles = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(role_names(roles))
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_preferences(&self, user_id: &str) -> AppResult<Option<UserPreferences>> {
        let preferences = sqlx::query_as::<_, UserPreferences>(&format!(
            "{PREFERENCE_COLUMNS} WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(preferences)
    }

    async fn save_preferences(&self, p: &UserPreferences) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, theme, email_notifications, push_notifications, \
             study_reminders, show_score_immediately, show_explanations_with_results, \
             default_quiz_time_limit, default_subject_filter, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (user_id) DO UPDATE SET theme = EXCLUDED.theme, \
             email_notifications = EXCLUDED.email_notifications, \
             push_notifications = EXCLUDED.push_notifications, \
             study_reminders = EXCLUDED.study_reminders, \
             show_score_immediately = EXCLUDED.show_score_immediately, \
             show_explanations_with_results = EXCLUDED.show_explanations_with_results, \
             default_quiz_time_limit = EXCLUDED.default_quiz_time_limit, \
             default_subject_filter = EXCLUDED.default_subject_filter, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(&p.user_id)
        .bind(&p.theme)
        .bind(p.email_notifications)
        .bind(p.push_notifications)
        .bind(p.study_reminders)
        .bind(p.show_score_immediately)
        .bind(p.show_explanations_with_results)
        .bind(p.default_quiz_time_limit)
        .bind(&p.default_subject_filter)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_activity(&self, activity: &UserActivity) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO user_activities (id, user_id, type, details, ip_address, user_agent, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&activity.id)
        .bind(&activity.user_id)
        .bind(activity.activity_type.as_str())
        .bind(activity.details.clone().map(Json))
        .bind(&activity.ip_address)
        .bind(&activity.user_agent)
        .bind(activity.timestamp)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET last_active_at = $2 WHERE id = $1")
            .bind(&activity.user_id)
            .bind(activity.timestamp)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn recent_activities(&self, user_id: &str, limit: i64) -> AppResult<Vec<UserActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, user_id, type, details, ip_address, user_agent, timestamp \
             FROM user_activities WHERE user_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserActivity::try_from).collect()
    }
}
