// Server-rendered HTML surface: registration, login, profile, and the
// manager's user administration pages. Askama templates + form posts;
// successful mutations redirect, input failures re-render the form.

mod templates;
mod validation;

use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{self, server_error};
use crate::config::SessionConfig;
use crate::db::Role;
use crate::store::{self, StoreError};
use crate::AppState;

pub use templates::*;

/// Identical for unknown email and wrong password, so login failures do not
/// reveal which emails have accounts.
const INVALID_LOGIN: &str = "Invalid login.";

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/", get(home))
        .route("/register", get(register_page))
        .route("/register", post(register_submit))
        .route("/login", get(login_page))
        .route("/login", post(login_submit))
        .route("/logout", get(logout))
        // Authenticated routes
        .route("/profile", get(profile))
        // Manager routes
        .route("/manager/users", get(users_list))
        .route("/manager/users/:id/edit", get(user_edit_form))
        .route("/manager/users/:id/update", post(user_update))
        .route("/manager/users/:id/delete", post(user_delete))
}

// Helper to render templates; render failures become a generic 500
fn render_template<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => server_error(e),
    }
}

fn session_cookie(token: String, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((auth::SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((auth::SESSION_COOKIE, "")).path("/").build()
}

/// Issue a fresh session for a just-authenticated user. Any token the
/// browser was already carrying is destroyed first, so identities are never
/// rebound onto a live token.
async fn start_session(
    state: &AppState,
    jar: CookieJar,
    user_id: &str,
    role: Role,
) -> Response {
    if let Some(old) = auth::session_token(&jar) {
        if let Err(e) = auth::session::destroy(&state.db, &old).await {
            return server_error(e);
        }
    }

    let ttl = state.config.session.ttl_days;
    let token = match auth::session::establish(&state.db, user_id, role, ttl).await {
        Ok(t) => t,
        Err(e) => return server_error(e),
    };

    let jar = jar.add(session_cookie(token, &state.config.session));
    (jar, Redirect::to("/profile")).into_response()
}

/// Drop a session whose user record no longer exists and send the browser
/// back to the login page.
async fn clear_stale_session(state: &AppState, jar: CookieJar) -> Response {
    if let Some(token) = auth::session_token(&jar) {
        if let Err(e) = auth::session::destroy(&state.db, &token).await {
            tracing::warn!(error = %e, "failed to destroy stale session");
        }
    }
    let jar = jar.remove(removal_cookie());
    (jar, Redirect::to("/login")).into_response()
}

// Home: straight to the profile when signed in, otherwise to login
async fn home(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match auth::require_session(&state, &jar).await {
        Ok(_) => Redirect::to("/profile").into_response(),
        Err(resp) => resp,
    }
}

/* -----------------------------
  Register / Login / Logout
------------------------------ */

async fn register_page() -> Response {
    render_template(RegisterTemplate {
        error: None,
        name: String::new(),
        email: String::new(),
    })
}

#[derive(Deserialize)]
struct RegisterForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn register_error(name: &str, email: &str, message: &str) -> Response {
    render_template(RegisterTemplate {
        error: Some(message.to_string()),
        name: name.to_string(),
        email: email.to_string(),
    })
}

async fn register_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    let name = form.name.trim().to_string();
    let email = form.email.trim().to_lowercase();
    let password = form.password;

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return register_error(&name, &email, "All fields are required.");
    }
    if let Err(msg) = validation::validate_name(&name) {
        return register_error(&name, &email, &msg);
    }
    if let Err(msg) = validation::validate_email(&email) {
        return register_error(&name, &email, &msg);
    }
    if let Err(msg) = validation::validate_password(&password) {
        return register_error(&name, &email, &msg);
    }

    match store::find_by_email(&state.db, &email).await {
        Ok(Some(_)) => return register_error(&name, &email, "That email is already registered."),
        Ok(None) => {}
        Err(e) => return server_error(e),
    }

    let password_hash = match auth::password::hash_password(&password) {
        Ok(h) => h,
        Err(e) => return server_error(e),
    };

    // First user becomes manager. The count-then-insert pair is racy under
    // concurrent first registrations; the unique email index keeps the
    // worst case at two managers, never duplicate accounts.
    let count = match store::count_users(&state.db).await {
        Ok(c) => c,
        Err(e) => return server_error(e),
    };
    let role = if count == 0 { Role::Manager } else { Role::User };

    let user = match store::create_user(&state.db, &name, &email, &password_hash, role).await {
        Ok(u) => u,
        Err(StoreError::DuplicateEmail) => {
            return register_error(&name, &email, "That email is already registered.")
        }
        Err(StoreError::Validation(msg)) => return register_error(&name, &email, &msg),
        Err(e) => return server_error(e),
    };

    if user.role == Role::Manager {
        info!(user_id = %user.id, "first registered user granted the manager role");
    }
    info!(user_id = %user.id, "user registered");

    start_session(&state, jar, &user.id, user.role).await
}

async fn login_page() -> Response {
    render_template(LoginTemplate {
        error: None,
        email: String::new(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn login_error(email: &str, message: &str) -> Response {
    render_template(LoginTemplate {
        error: Some(message.to_string()),
        email: email.to_string(),
    })
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim().to_lowercase();
    let password = form.password;

    if email.is_empty() || password.is_empty() {
        return login_error(&email, "Email and password are required.");
    }

    let user = match store::find_by_email(&state.db, &email).await {
        Ok(u) => u,
        Err(e) => return server_error(e),
    };

    let Some(user) = user else {
        return login_error(&email, INVALID_LOGIN);
    };
    if !auth::password::verify_password(&password, &user.password_hash) {
        return login_error(&email, INVALID_LOGIN);
    }

    info!(user_id = %user.id, "user logged in");
    start_session(&state, jar, &user.id, user.role).await
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(token) = auth::session_token(&jar) {
        if let Err(e) = auth::session::destroy(&state.db, &token).await {
            return server_error(e);
        }
    }
    let jar = jar.remove(removal_cookie());
    (jar, Redirect::to("/login")).into_response()
}

/* -----------------------------
  Profile
------------------------------ */

async fn profile(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let ident = match auth::require_session(&state, &jar).await {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    match auth::current_user(&state, &ident).await {
        Ok(Some(current_user)) => render_template(ProfileTemplate { current_user }),
        Ok(None) => clear_stale_session(&state, jar).await,
        Err(e) => server_error(e),
    }
}

/* -----------------------------
  Manager: user administration
------------------------------ */

async fn users_list(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let ident = match auth::require_manager(&state, &jar).await {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let current_user = match auth::current_user(&state, &ident).await {
        Ok(Some(cu)) => cu,
        Ok(None) => return clear_stale_session(&state, jar).await,
        Err(e) => return server_error(e),
    };

    let users = match store::list_users(&state.db).await {
        Ok(users) => users.into_iter().map(Into::into).collect(),
        Err(e) => return server_error(e),
    };

    render_template(UsersTemplate {
        users,
        current_user,
    })
}

async fn user_edit_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = auth::require_manager(&state, &jar).await {
        return resp;
    }

    match store::find_by_id(&state.db, &id).await {
        Ok(Some(user)) => render_template(UserEditTemplate {
            user: user.into(),
            error: None,
        }),
        // Stale link; back to the table
        Ok(None) => Redirect::to("/manager/users").into_response(),
        Err(e) => server_error(e),
    }
}

#[derive(Deserialize)]
struct UpdateUserForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: String,
}

/// Re-render the edit form against the stored record with an error message.
async fn edit_error(state: &AppState, id: &str, message: &str) -> Response {
    match store::find_by_id(&state.db, id).await {
        Ok(Some(user)) => render_template(UserEditTemplate {
            user: user.into(),
            error: Some(message.to_string()),
        }),
        Ok(None) => Redirect::to("/manager/users").into_response(),
        Err(e) => server_error(e),
    }
}

async fn user_update(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<UpdateUserForm>,
) -> Response {
    let ident = match auth::require_manager(&state, &jar).await {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let name = form.name.trim().to_string();
    let email = form.email.trim().to_lowercase();

    let Some(role) = Role::parse(form.role.trim()) else {
        return edit_error(&state, &id, "Please enter valid values.").await;
    };
    if let Err(msg) = validation::validate_name(&name) {
        return edit_error(&state, &id, &msg).await;
    }
    if let Err(msg) = validation::validate_email(&email) {
        return edit_error(&state, &id, &msg).await;
    }

    match store::update_user(&state.db, &id, &name, &email, role).await {
        Ok(_) => {
            // A manager editing their own record sees the role change now,
            // not on the next login
            if ident.user_id == id {
                if let Some(token) = auth::session_token(&jar) {
                    if let Err(e) = auth::session::set_role(&state.db, &token, role).await {
                        return server_error(e);
                    }
                }
            }
            info!(user_id = %id, "user updated");
            Redirect::to("/manager/users").into_response()
        }
        Err(StoreError::DuplicateEmail) => {
            edit_error(&state, &id, "That email is already in use.").await
        }
        Err(StoreError::Validation(msg)) => edit_error(&state, &id, &msg).await,
        Err(StoreError::NotFound) => Redirect::to("/manager/users").into_response(),
        Err(e) => server_error(e),
    }
}

async fn user_delete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let ident = match auth::require_manager(&state, &jar).await {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    if ident.user_id == id {
        return (
            StatusCode::BAD_REQUEST,
            "You can't delete your own account while logged in.",
        )
            .into_response();
    }

    match store::delete_user(&state.db, &id).await {
        Ok(()) => {
            info!(user_id = %id, "user deleted");
            Redirect::to("/manager/users").into_response()
        }
        Err(StoreError::NotFound) => Redirect::to("/manager/users").into_response(),
        Err(e) => server_error(e),
    }
}
