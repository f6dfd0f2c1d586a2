//! Credential store: registered users and their password hashes.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{info, Instrument};

use crate::{
    error::{is_unique_violation, Error, Result},
    model::{User, UserId},
    password::Hasher,
};

#[derive(Clone, Debug)]
pub struct CredentialStore {
    pool: SqlitePool,
    hasher: Hasher,
}

impl CredentialStore {
    #[must_use]
    pub fn new(pool: SqlitePool, hasher: Hasher) -> Self {
        Self { pool, hasher }
    }

    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Register a new user and return its id.
    ///
    /// # Errors
    /// `Validation` for an empty username or password, `Conflict` if the
    /// username is already registered, `Database`/`Password` on infrastructure
    /// failures.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserId> {
        if username.is_empty() {
            return Err(Error::Validation("username required"));
        }
        if password.is_empty() {
            return Err(Error::Validation("password required"));
        }

        let password_hash = self.hasher.derive(password)?;

        let mut tx = self.pool.begin().await?;

        let query = "INSERT INTO users (username, password) VALUES (?, ?) RETURNING id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(&password_hash)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let id = match row {
            Ok(row) => UserId(row.try_get("id")?),
            Err(err) if is_unique_violation(&err) => {
                let _ = tx.rollback().await;
                return Err(Error::Conflict("username taken"));
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;

        info!(user_id = %id, "registered user");

        Ok(id)
    }

    /// # Errors
    /// Returns `Database` if the query fails.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = "SELECT id, username, password FROM users WHERE username = ?";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// # Errors
    /// Returns `Database` if the query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let query = "SELECT id, username, password FROM users WHERE id = ?";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        password_hash: row.try_get("password")?,
    })
}
