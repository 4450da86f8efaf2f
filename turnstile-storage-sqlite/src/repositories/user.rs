use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use turnstile_core::{
    Error, User, UserId,
    error::{AuthError, StorageError},
    repositories::UserRepository,
    user::NewUser,
};

use super::from_millis;

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteUser {
    id: String,
    username: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteUser> for User {
    type Error = Error;

    fn try_from(row: SqliteUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::new(&row.id),
            username: row.username,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser, password_hash: &str) -> Result<User, Error> {
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query_as::<_, SqliteUser>(
            r#"
            INSERT INTO users (id, username, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING id, username, created_at, updated_at
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Auth(AuthError::UserAlreadyExists)
            }
            e => {
                tracing::error!(error = %e, "Failed to create user");
                Error::Storage(StorageError::Database("Failed to create user".to_string()))
            }
        })?;

        row.try_into()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>(
            "SELECT id, username, created_at, updated_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to find user");
            StorageError::Database("Failed to find user".to_string())
        })?;

        row.map(User::try_from).transpose()
    }

    async fn get_password_hash(&self, username: &str) -> Result<Option<String>, Error> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE username = ?1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to get password hash");
                    StorageError::Database("Failed to get password hash".to_string())
                })?;

        Ok(hash)
    }

    async fn set_password_hash(&self, username: &str, hash: &str) -> Result<(), Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE username = ?3",
        )
        .bind(hash)
        .bind(Utc::now().timestamp_millis())
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to set password hash");
            StorageError::Database("Failed to set password hash".to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete user");
                StorageError::Database("Failed to delete user".to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{self, SqliteMigrationManager};
    use turnstile_migration::MigrationManager;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let manager = SqliteMigrationManager::new(pool.clone());
        manager.initialize().await.expect("Failed to initialize migrations");
        manager
            .up(&migrations::all())
            .await
            .expect("Failed to run migrations");

        pool
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = SqliteUserRepository::new(setup_test_db().await);

        let created = repo
            .create(NewUser::new("alice").unwrap(), "$argon2id$hash")
            .await
            .unwrap();
        assert_eq!(created.username, "alice");

        let found = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.created_at, created.created_at);

        assert!(repo.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let repo = SqliteUserRepository::new(setup_test_db().await);

        repo.create(NewUser::new("alice").unwrap(), "hash")
            .await
            .unwrap();
        let result = repo.create(NewUser::new("alice").unwrap(), "hash").await;

        assert!(matches!(result, Err(Error::Auth(AuthError::UserAlreadyExists))));
    }

    #[tokio::test]
    async fn test_password_hash_updates() {
        let repo = SqliteUserRepository::new(setup_test_db().await);

        repo.create(NewUser::new("alice").unwrap(), "first")
            .await
            .unwrap();
        repo.set_password_hash("alice", "second").await.unwrap();

        assert_eq!(
            repo.get_password_hash("alice").await.unwrap().as_deref(),
            Some("second")
        );
        assert!(repo.get_password_hash("bob").await.unwrap().is_none());
        assert!(matches!(
            repo.set_password_hash("bob", "x").await,
            Err(Error::Storage(StorageError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = SqliteUserRepository::new(setup_test_db().await);

        repo.create(NewUser::new("alice").unwrap(), "hash")
            .await
            .unwrap();
        repo.delete("alice").await.unwrap();

        assert!(repo.find_by_username("alice").await.unwrap().is_none());
        assert!(repo.delete("alice").await.is_err());
    }
}
