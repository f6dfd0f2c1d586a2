//! Post repository: CRUD over posts, scoped to the owning user.
//!
//! Ownership is checked in exactly one place, [`PostRepository::get_or_fail`]
//! (and its transactional twin used by update/delete). Mutations always run
//! the check with [`OwnershipCheck::Owner`]; read-only views may pass
//! [`OwnershipCheck::Skip`].

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqliteExecutor, SqlitePool, Transaction};
use tracing::{info, Instrument};

use super::now_micros;
use crate::{
    error::{Error, Result},
    model::{Post, PostId, UserId},
};

const SELECT_POST: &str = r"
    SELECT p.id, p.title, p.body, p.created, p.author_id, u.username
    FROM posts p JOIN users u ON p.author_id = u.id
    WHERE p.id = ?
";

/// Whether `get_or_fail` must verify the requester owns the post.
///
/// Enforcing ownership needs an authenticated requester, so the requester id
/// lives inside the `Owner` variant instead of being a separate argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipCheck {
    Owner(UserId),
    Skip,
}

#[derive(Clone, Debug)]
pub struct PostRepository {
    pool: SqlitePool,
}

impl PostRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All posts, newest first.
    ///
    /// # Errors
    /// Returns `Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Post>> {
        let query = r"
            SELECT p.id, p.title, p.body, p.created, p.author_id, u.username
            FROM posts p JOIN users u ON p.author_id = u.id
            ORDER BY p.created DESC, p.id DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        rows.iter().map(post_from_row).collect()
    }

    /// # Errors
    /// `Validation` if `title` is empty, `Database` on store failures.
    pub async fn create(&self, owner_id: UserId, title: &str, body: &str) -> Result<PostId> {
        if title.is_empty() {
            return Err(Error::Validation("title required"));
        }

        let mut tx = self.pool.begin().await?;

        let query = r"
            INSERT INTO posts (author_id, created, title, body)
            VALUES (?, ?, ?, ?)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(owner_id.0)
            .bind(now_micros())
            .bind(title)
            .bind(body)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await?;
        let id = PostId(row.try_get("id")?);

        tx.commit().await?;

        info!(post_id = %id, author_id = %owner_id, "created post");

        Ok(id)
    }

    /// # Errors
    /// Returns `Database` if the query fails.
    pub async fn get(&self, id: PostId) -> Result<Option<Post>> {
        fetch_post(&self.pool, id).await
    }

    /// Fetch a post, failing with `NotFound` if it does not exist and with
    /// `Forbidden` if `check` names a requester other than the author.
    ///
    /// # Errors
    /// `NotFound`, `Forbidden`, or `Database`.
    pub async fn get_or_fail(&self, id: PostId, check: OwnershipCheck) -> Result<Post> {
        let post = fetch_post(&self.pool, id).await?;
        authorize(id, post, check)
    }

    /// Overwrite title and body of a post owned by `requester_id`.
    ///
    /// # Errors
    /// `NotFound`/`Forbidden` from the ownership check, then `Validation` if
    /// `title` is empty, `Database` on store failures.
    pub async fn update(
        &self,
        id: PostId,
        requester_id: UserId,
        title: &str,
        body: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        get_or_fail_in(&mut tx, id, OwnershipCheck::Owner(requester_id)).await?;

        if title.is_empty() {
            return Err(Error::Validation("title required"));
        }

        let query = "UPDATE posts SET title = ?, body = ? WHERE id = ?";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(title)
            .bind(body)
            .bind(id.0)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        tx.commit().await?;

        info!(post_id = %id, "updated post");

        Ok(())
    }

    /// Permanently remove a post owned by `requester_id`.
    ///
    /// # Errors
    /// `NotFound`/`Forbidden` from the ownership check, `Database` on store
    /// failures.
    pub async fn delete(&self, id: PostId, requester_id: UserId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        get_or_fail_in(&mut tx, id, OwnershipCheck::Owner(requester_id)).await?;

        let query = "DELETE FROM posts WHERE id = ?";
        let span = tracing::info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id.0)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        tx.commit().await?;

        info!(post_id = %id, "deleted post");

        Ok(())
    }
}

async fn get_or_fail_in(
    tx: &mut Transaction<'_, Sqlite>,
    id: PostId,
    check: OwnershipCheck,
) -> Result<Post> {
    let post = fetch_post(&mut **tx, id).await?;
    authorize(id, post, check)
}

fn authorize(id: PostId, post: Option<Post>, check: OwnershipCheck) -> Result<Post> {
    let Some(post) = post else {
        return Err(Error::NotFound(id));
    };
    match check {
        OwnershipCheck::Owner(requester_id) if post.author_id != requester_id => {
            Err(Error::Forbidden(id))
        }
        _ => Ok(post),
    }
}

async fn fetch_post<'e, E>(executor: E, id: PostId) -> Result<Option<Post>>
where
    E: SqliteExecutor<'e>,
{
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = SELECT_POST
    );
    let row = sqlx::query(SELECT_POST)
        .bind(id.0)
        .fetch_optional(executor)
        .instrument(span)
        .await?;

    row.as_ref().map(post_from_row).transpose()
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let created: i64 = row.try_get("created")?;
    let created = DateTime::<Utc>::from_timestamp_micros(created).ok_or_else(|| {
        Error::Database(sqlx::Error::Decode(
            format!("invalid created timestamp: {created}").into(),
        ))
    })?;

    Ok(Post {
        id: PostId(row.try_get("id")?),
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        created,
        author_id: UserId(row.try_get("author_id")?),
        username: row.try_get("username")?,
    })
}
