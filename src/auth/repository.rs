//! User credential storage

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Database error types
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Email already exists")]
    EmailExists,
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed") {
                    DbError::EmailExists
                } else {
                    DbError::Query(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Connection(err.to_string())
            }
            _ => DbError::Query(err.to_string()),
        }
    }
}

/// A stored credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Repository trait for user operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; `EmailExists` when the email is taken
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, DbError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
}

/// SQLite-backed repository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Connect to `url` (e.g. `sqlite://users.db`), creating the file and the
    /// `users` table when missing.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbError::Connection(e.to_string()))?
            .create_if_missing(true);

        // Every in-memory connection is its own database
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let repo = Self { pool };
        repo.migrate().await?;
        info!(url = %url, "User database ready");
        Ok(repo)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, DbError> {
        let result = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, email, password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, email, password_hash)| User {
            id,
            email,
            password_hash,
        }))
    }
}

/// In-memory repository implementation for development/testing
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, DbError> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.email == email) {
            return Err(DbError::EmailExists);
        }
        let user = User {
            id: users.len() as i64 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        Ok(self.users.lock().iter().find(|u| u.email == email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_create_and_find() {
        let repo = SqliteUserRepository::connect("sqlite::memory:").await.unwrap();
        let user = repo.create("a@example.com", "hash").await.unwrap();
        assert_eq!(user.id, 1);

        let found = repo.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found, user);
        assert!(repo.find_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_duplicate_email() {
        let repo = SqliteUserRepository::connect("sqlite::memory:").await.unwrap();
        repo.create("a@example.com", "hash").await.unwrap();
        let err = repo.create("a@example.com", "other").await.unwrap_err();
        assert!(matches!(err, DbError::EmailExists));
    }

    #[tokio::test]
    async fn test_in_memory_duplicate_email() {
        let repo = InMemoryUserRepository::new();
        repo.create("a@example.com", "hash").await.unwrap();
        assert!(matches!(
            repo.create("a@example.com", "hash").await,
            Err(DbError::EmailExists)
        ));
    }
}
