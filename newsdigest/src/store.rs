//! SQLite-backed user and preference storage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::models::PreferenceSet;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored preferences are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Preferences as exposed by the API, including bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPreferences {
    pub user_id: String,
    pub categories: Vec<String>,
    pub custom_rss_feeds: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Read/write access to per-user preferences.
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<PreferenceSet>, StoreError>;
    async fn upsert(&self, user_id: &str, preferences: &PreferenceSet) -> Result<(), StoreError>;
}

#[derive(Debug, sqlx::FromRow)]
struct PreferenceRow {
    user_id: String,
    categories_json: String,
    custom_feeds_json: String,
    updated_at: DateTime<Utc>,
}

impl PreferenceRow {
    fn preferences(&self) -> Result<PreferenceSet, StoreError> {
        Ok(PreferenceSet {
            categories: serde_json::from_str(&self.categories_json)?,
            custom_feeds: serde_json::from_str(&self.custom_feeds_json)?,
        })
    }

    fn into_stored(self) -> Result<StoredPreferences, StoreError> {
        let prefs = self.preferences()?;
        Ok(StoredPreferences {
            user_id: self.user_id,
            categories: prefs.categories,
            custom_rss_feeds: prefs.custom_feeds,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_PREFERENCES: &str =
    "SELECT user_id, categories_json, custom_feeds_json, updated_at FROM preferences WHERE user_id = ?";

const UPSERT_PREFERENCES: &str = r#"
    INSERT INTO preferences (user_id, categories_json, custom_feeds_json, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(user_id) DO UPDATE SET
        categories_json = excluded.categories_json,
        custom_feeds_json = excluded.custom_feeds_json,
        updated_at = excluded.updated_at
"#;

/// Users and preferences in one SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user. The email must not be registered yet.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(StoreError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // lost a race with a concurrent signup for the same email
            sqlx::Error::Database(db) if db.message().contains("UNIQUE") => StoreError::EmailTaken,
            _ => StoreError::Database(e),
        })?;

        info!(user_id = %user.id, "store: user created");
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Stored preferences, creating an empty set first if the user has none.
    pub async fn get_or_create_preferences(&self, user_id: &str) -> Result<StoredPreferences, StoreError> {
        if let Some(row) = self.preference_row(user_id).await? {
            return row.into_stored();
        }
        self.upsert(user_id, &PreferenceSet::default()).await?;
        self.preference_row(user_id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?
            .into_stored()
    }

    /// Replace the category selection, keeping custom feeds.
    pub async fn set_categories(&self, user_id: &str, categories: Vec<String>) -> Result<PreferenceSet, StoreError> {
        self.modify(user_id, move |prefs| prefs.set_categories(categories)).await
    }

    pub async fn add_custom_feed(&self, user_id: &str, url: &str) -> Result<PreferenceSet, StoreError> {
        let url = url.to_string();
        self.modify(user_id, move |prefs| {
            prefs.add_custom_feed(url);
        })
        .await
    }

    pub async fn remove_custom_feed(&self, user_id: &str, url: &str) -> Result<PreferenceSet, StoreError> {
        let url = url.to_string();
        self.modify(user_id, move |prefs| {
            prefs.remove_custom_feed(&url);
        })
        .await
    }

    async fn preference_row(&self, user_id: &str) -> Result<Option<PreferenceRow>, StoreError> {
        let row = sqlx::query_as::<_, PreferenceRow>(SELECT_PREFERENCES)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Read-modify-write of one user's preferences inside a transaction.
    async fn modify<F>(&self, user_id: &str, change: F) -> Result<PreferenceSet, StoreError>
    where
        F: FnOnce(&mut PreferenceSet) + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PreferenceRow>(SELECT_PREFERENCES)
            .bind(user_id)
            .fetch_optional(&mut tx)
            .await?;
        let mut prefs = match row {
            Some(row) => row.preferences()?,
            None => PreferenceSet::default(),
        };

        change(&mut prefs);

        sqlx::query(UPSERT_PREFERENCES)
            .bind(user_id)
            .bind(serde_json::to_string(&prefs.categories)?)
            .bind(serde_json::to_string(&prefs.custom_feeds)?)
            .bind(Utc::now())
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        Ok(prefs)
    }
}

#[async_trait::async_trait]
impl PreferenceStore for SqliteStore {
    async fn get(&self, user_id: &str) -> Result<Option<PreferenceSet>, StoreError> {
        self.preference_row(user_id)
            .await?
            .map(|row| row.preferences())
            .transpose()
    }

    async fn upsert(&self, user_id: &str, preferences: &PreferenceSet) -> Result<(), StoreError> {
        sqlx::query(UPSERT_PREFERENCES)
            .bind(user_id)
            .bind(serde_json::to_string(&preferences.categories)?)
            .bind(serde_json::to_string(&preferences.custom_feeds)?)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
