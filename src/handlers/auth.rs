use askama::Template;
use axum::{
    Form,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Response},
};
use model::entities::user::UserLevel;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::auth::password::verify_password;
use crate::auth::session::{removal_cookie, session_cookie};
use crate::auth::{MaybeActor, SessionContext};
use crate::error::AppResult;
use crate::forms::{optional_email, blank_to_none, validation_message};
use crate::schemas::AppState;
use crate::services::accounts::{self, AccountError, NewAccount};
use crate::services::participants::ParticipantInput;
use crate::views::{Nav, redirect, render};

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub error: Option<String>,
}

fn login_page(username: String, error: Option<&str>) -> AppResult<Html<String>> {
    render(&LoginTemplate {
        nav: Nav::anonymous(),
        username,
        error: error.map(str::to_string),
    })
}

fn landing_for(level: UserLevel) -> &'static str {
    match level {
        UserLevel::Manager => "/admin/dashboard",
        UserLevel::User => "/",
    }
}

/// Response that stores a new session and redirects to the user's landing page.
async fn start_session(state: &AppState, user: &model::entities::user::Model) -> Response {
    let session_id = state.sessions.create(user).await;
    let mut response = redirect(landing_for(user.level));
    match session_cookie(&state.cookie_key, &session_id).parse() {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!("Session cookie is not a valid header value: {}", e),
    }
    response
}

pub async fn login_form(MaybeActor(actor): MaybeActor) -> AppResult<Response> {
    if let Some(actor) = actor {
        return Ok(redirect(landing_for(actor.role.level())));
    }
    Ok(login_page(String::new(), None)?.into_response())
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    trace!("Entering login handler");
    let username = form.username.trim().to_string();
    if username.is_empty() || form.password.is_empty() {
        return Ok(login_page(username, Some("Username and password are required."))?.into_response());
    }

    match accounts::find_by_username(&state.db, &username).await {
        Ok(Some(user)) if verify_password(&form.password, &user.password_hash) => {
            info!(user_id = user.id, "Login succeeded");
            Ok(start_session(&state, &user).await)
        }
        Ok(_) => {
            warn!("Login failed");
            Ok(login_page(username, Some("Invalid username or password."))?.into_response())
        }
        Err(e) => {
            error!("Login lookup failed: {}", e);
            Ok(login_page(
                username,
                Some("An error occurred while logging in. Please try again."),
            )?
            .into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>, session: Option<SessionContext>) -> Response {
    if let Some(session) = session {
        state.sessions.remove(&session.session_id).await;
        info!(username = %session.actor.username, "Logged out");
    }
    let mut response = redirect("/");
    if let Ok(value) = removal_cookie().parse() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters."))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(custom(function = "optional_email"))]
    pub email: String,
    #[serde(default)]
    pub account_type: String,
}

impl SignupForm {
    pub fn is_parent(&self) -> bool {
        self.account_type == "parent"
    }
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub form: SignupForm,
    pub error: Option<String>,
}

pub async fn signup_form(MaybeActor(actor): MaybeActor) -> AppResult<Html<String>> {
    render(&SignupTemplate {
        nav: Nav::for_actor(actor.as_ref()),
        form: SignupForm {
            account_type: "student".to_string(),
            ..Default::default()
        },
        error: None,
    })
}

/// Create a user account (and a participant for students), then log in.
#[instrument(skip_all, fields(username = %form.username, account_type = %form.account_type))]
pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> AppResult<Response> {
    trace!("Entering signup handler");
    let rerender = |form: SignupForm, error: String| -> AppResult<Response> {
        Ok(render(&SignupTemplate {
            nav: Nav::anonymous(),
            form,
            error: Some(error),
        })?
        .into_response())
    };

    if let Err(errors) = form.validate() {
        debug!("Signup form invalid");
        return rerender(form, validation_message(&errors));
    }
    let email = blank_to_none(&form.email);
    if !form.is_parent() && email.is_none() {
        return rerender(form, "Students need an email address.".to_string());
    }

    let profile = (!form.is_parent()).then(|| ParticipantInput {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: email.clone(),
        ..Default::default()
    });
    let account = NewAccount {
        username: form.username.clone(),
        password: form.password.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        level: UserLevel::User,
        is_parent: form.is_parent(),
        profile,
    };

    match accounts::create_account(&state.db, account).await {
        Ok(user) => {
            info!(user_id = user.id, "Signed up");
            Ok(start_session(&state, &user).await)
        }
        Err(AccountError::App(e)) => Err(e),
        Err(conflict) => {
            debug!("Signup conflict: {}", conflict);
            rerender(form, conflict.to_string())
        }
    }
}
