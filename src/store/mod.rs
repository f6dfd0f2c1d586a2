//! SQLite-backed persistence for users and posts.
//!
//! Every mutating operation runs in its own transaction and commits before
//! returning. All values are passed as bound parameters.

pub mod posts;
pub mod users;

pub use posts::{OwnershipCheck, PostRepository};
pub use users::CredentialStore;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));
const RESET_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/reset.sql"));

pub const MEMORY_DSN: &str = "sqlite::memory:";

/// Open a connection pool for `dsn`, creating the database file if missing.
///
/// `sqlite::memory:` is routed to [`in_memory`] so all requests share one
/// database.
///
/// # Errors
/// Returns an error if the DSN is invalid or the database cannot be opened.
pub async fn connect(dsn: &str) -> Result<SqlitePool> {
    if dsn == MEMORY_DSN {
        return in_memory().await;
    }

    let options = SqliteConnectOptions::from_str(dsn)
        .with_context(|| format!("Invalid database DSN: {dsn}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}

/// Single-connection in-memory database. The connection is never recycled,
/// otherwise its contents would vanish with it.
///
/// # Errors
/// Returns an error if SQLite cannot open the in-memory database.
pub async fn in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(MEMORY_DSN)
        .context("Invalid in-memory DSN")?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")
}

/// Create missing tables. Safe to run on every start.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    apply(pool, SCHEMA_SQL).await?;
    info!("Database schema is up to date");
    Ok(())
}

/// Drop all tables and recreate them empty.
///
/// # Errors
/// Returns an error if any statement fails.
pub async fn reset(pool: &SqlitePool) -> Result<()> {
    apply(pool, RESET_SQL).await?;
    apply(pool, SCHEMA_SQL).await?;
    info!("Initialized the database");
    Ok(())
}

async fn apply(pool: &SqlitePool, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.context("begin schema transaction")?;
    for (index, statement) in split_sql_statements(sql).iter().enumerate() {
        debug!("applying schema statement {}", index + 1);
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }
    tx.commit().await.context("commit schema transaction")?;
    Ok(())
}

/// Splits a schema file into statements. Comment-only lines are dropped and
/// statements are assumed to end with `;` at the end of a line.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Current time as stored in `posts.created`.
pub(crate) fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
