//! Authentication and authorization gate.
//!
//! Every role decision in the application goes through `require_session` /
//! `require_manager`; handlers never inspect the session table or compare
//! roles themselves. Both gates re-resolve the token on every request; the
//! only state that survives across requests is the session row's cached role.

pub mod password;
pub mod session;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::db::Role;
use crate::AppState;
pub use session::SessionIdentity;

/// Session token cookie name
pub const SESSION_COOKIE: &str = "rosterd_session";

/// Pull the raw session token out of the cookie jar.
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Generic failure response. Logs the detail server-side, tells the client
/// nothing beyond that something went wrong.
pub fn server_error<E: std::fmt::Display>(err: E) -> Response {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Server error.").into_response()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden: managers only").into_response()
}

/// Pass iff the request carries a token that resolves. An anonymous visitor
/// is sent to the login page; that is navigation, not an error.
pub async fn require_session(
    state: &AppState,
    jar: &CookieJar,
) -> Result<SessionIdentity, Response> {
    let Some(token) = session_token(jar) else {
        return Err(Redirect::to("/login").into_response());
    };
    match session::resolve(&state.db, &token).await {
        Ok(Some(ident)) => Ok(ident),
        Ok(None) => Err(Redirect::to("/login").into_response()),
        Err(e) => Err(server_error(e)),
    }
}

/// Pass iff the session's cached role is manager. Everyone else, including
/// anonymous visitors, gets an explicit 403 rather than a redirect.
pub async fn require_manager(
    state: &AppState,
    jar: &CookieJar,
) -> Result<SessionIdentity, Response> {
    let Some(token) = session_token(jar) else {
        return Err(forbidden());
    };
    match session::resolve(&state.db, &token).await {
        Ok(Some(ident)) if ident.role == Role::Manager => Ok(ident),
        Ok(_) => Err(forbidden()),
        Err(e) => Err(server_error(e)),
    }
}

/// Read-only view of the signed-in user, computed once per request and
/// passed explicitly into templates.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    /// Display-level check for templates (show or hide the manager links).
    /// Access control itself always goes through `require_manager`.
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

/// Load the user record behind a resolved session. `None` means the session
/// outlived its user (deleted by a manager); callers should destroy the
/// session and start over at the login page.
pub async fn current_user(
    state: &AppState,
    ident: &SessionIdentity,
) -> Result<Option<CurrentUser>, crate::store::StoreError> {
    let user = crate::store::find_by_id(&state.db, &ident.user_id).await?;
    Ok(user.map(|u| CurrentUser {
        id: u.id,
        name: u.name,
        email: u.email,
        role: u.role,
    }))
}
