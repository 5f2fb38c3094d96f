// Askama template definitions

use askama::Template;

use crate::auth::CurrentUser;
use crate::db::UserView;

// Login page
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
}

// Registration page
#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub name: String,
    pub email: String,
}

// Profile page for the signed-in user
#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub current_user: CurrentUser,
}

// Manager user table
#[derive(Template)]
#[template(path = "users.html")]
pub struct UsersTemplate {
    pub users: Vec<UserView>,
    pub current_user: CurrentUser,
}

// Manager edit form for one user
#[derive(Template)]
#[template(path = "user_edit.html")]
pub struct UserEditTemplate {
    pub user: UserView,
    pub error: Option<String>,
}
