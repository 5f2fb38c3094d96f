//! Credential store: the persisted set of user records.
//!
//! All writes go through here so the email uniqueness constraint is enforced
//! in exactly one place: the `NOCASE` unique index in SQLite. The friendly
//! pre-checks in the handlers only improve error messages; the index is what
//! makes concurrent duplicate registrations safe.

use thiserror::Error;

use crate::db::{DbPool, Role, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Last-line field constraints. The form layer validates first with
/// friendlier messages; the store refuses bad records no matter who calls.
fn validate_record(name: &str, email: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.chars().count() > 60 {
        return Err(StoreError::Validation(
            "Name must be 1-60 characters.".to_string(),
        ));
    }
    if email.is_empty() || email.chars().count() > 120 {
        return Err(StoreError::Validation(
            "Email must be 1-120 characters.".to_string(),
        ));
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err)
        if db_err.message().contains("UNIQUE constraint failed"))
}

/// Insert a new user. The caller supplies an already-hashed password and
/// normalized (trimmed, lower-cased) fields.
pub async fn create_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, StoreError> {
    validate_record(name, email)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateEmail),
        Err(e) => return Err(e.into()),
    }

    Ok(User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Case-insensitive email lookup (the column is NOCASE).
pub async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Total number of users. Only used for the first-user bootstrap decision.
pub async fn count_users(pool: &DbPool) -> Result<i64, StoreError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// All users, newest first.
pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, StoreError> {
    let users = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// Update name, email, and role of one user. The new email may not belong to
/// a different user; keeping one's own email is fine.
pub async fn update_user(
    pool: &DbPool,
    id: &str,
    name: &str,
    email: &str,
    role: Role,
) -> Result<User, StoreError> {
    validate_record(name, email)?;

    if let Some(owner) = find_by_email(pool, email).await? {
        if owner.id != id {
            return Err(StoreError::DuplicateEmail);
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE users SET name = ?, email = ?, role = ?, updated_at = ? WHERE id = ?",
    )
    .bind(name)
    .bind(email)
    .bind(role)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Err(StoreError::NotFound),
        Ok(_) => find_by_id(pool, id).await?.ok_or(StoreError::NotFound),
        // The pre-check can lose a race with a concurrent write; the index
        // still holds the invariant.
        Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateEmail),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_user(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    let done = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if done.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
