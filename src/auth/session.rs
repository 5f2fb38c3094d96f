//! Server-side session lifecycle.
//!
//! A session binds an opaque random token to `{user_id, role}`. Only the
//! SHA-256 hash of the token is stored, so a leaked database copy does not
//! contain usable tokens. The role column is a cache of the user's role at
//! establishment time; `set_role` is the single re-sync point.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

use crate::db::{DbPool, Role};

/// Identity resolved from a session token.
#[derive(Debug, Clone, FromRow)]
pub struct SessionIdentity {
    pub user_id: String,
    pub role: Role,
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session bound to `{user_id, role}` and return the raw token.
///
/// Callers issuing a login or registration must destroy whatever token the
/// browser was already carrying before calling this, so every successful
/// authentication gets a fresh token.
pub async fn establish(
    pool: &DbPool,
    user_id: &str,
    role: Role,
    ttl_days: i64,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);

    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(ttl_days)).to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, role, expires_at, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(&token_hash)
    .bind(role)
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a token to its bound identity. `None` for unknown or expired
/// tokens.
pub async fn resolve(pool: &DbPool, token: &str) -> Result<Option<SessionIdentity>, sqlx::Error> {
    let token_hash = hash_token(token);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query_as("SELECT user_id, role FROM sessions WHERE token_hash = ? AND expires_at > ?")
        .bind(&token_hash)
        .bind(&now)
        .fetch_optional(pool)
        .await
}

/// Update the cached role without changing identity. Used when a manager
/// edits their own record, so the change takes effect without a re-login.
pub async fn set_role(pool: &DbPool, token: &str, role: Role) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET role = ? WHERE token_hash = ?")
        .bind(role)
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Destroy a session. Idempotent; destroying an unknown token is a no-op.
pub async fn destroy(pool: &DbPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}
