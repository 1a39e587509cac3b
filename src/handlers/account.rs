use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use model::entities::user;
use sea_orm::EntityTrait;
use serde::Deserialize;
use tracing::{debug, info, instrument, trace};
use validator::Validate;

use crate::auth::CurrentActor;
use crate::error::{AppError, AppResult};
use crate::forms::{optional_password, validation_message};
use crate::schemas::AppState;
use crate::services::accounts::{self, AccountChanges, AccountError};
use crate::views::{Nav, redirect, render};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AccountForm {
    #[serde(default)]
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters."))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    #[validate(must_match(other = "new_password", message = "Passwords do not match."))]
    pub confirm_password: String,
}

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub nav: Nav,
    pub form: AccountForm,
    pub error: Option<String>,
    pub saved: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub saved: Option<String>,
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn account_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<AccountQuery>,
) -> AppResult<Html<String>> {
    let current = user::Entity::find_by_id(actor.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Account"))?;

    render(&AccountTemplate {
        nav: Nav::from(&actor),
        form: AccountForm {
            username: current.username,
            first_name: current.first_name,
            last_name: current.last_name,
            ..Default::default()
        },
        error: None,
        saved: query.saved.is_some(),
    })
}

/// Self-service profile edit. A rename carries the user's participants along
/// and the live session picks up the new values.
#[instrument(skip_all, fields(username = %actor.username))]
pub async fn update_account(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Form(form): Form<AccountForm>,
) -> AppResult<Response> {
    trace!("Entering update_account handler");
    let nav = Nav::from(&actor);
    let rerender = |form: AccountForm, error: String| -> AppResult<Response> {
        Ok(render(&AccountTemplate {
            nav: nav.clone(),
            form,
            error: Some(error),
            saved: false,
        })?
        .into_response())
    };

    if let Err(errors) = form.validate() {
        return rerender(form, validation_message(&errors));
    }
    let password = optional_password(&form.new_password);
    if password.as_ref().is_some_and(|p| p.chars().count() < 8) {
        return rerender(form, "Password must be at least 8 characters.".to_string());
    }

    let changes = AccountChanges {
        username: Some(form.username.clone()),
        first_name: Some(form.first_name.clone()),
        last_name: Some(form.last_name.clone()),
        password,
        ..Default::default()
    };
    match accounts::update_account(&state.db, actor.user_id, changes).await {
        Ok(updated) => {
            state.sessions.refresh_user(&updated).await;
            info!(new_username = %updated.username, "Account updated");
            Ok(redirect("/account?saved=1"))
        }
        Err(AccountError::App(e)) => Err(e),
        Err(conflict) => {
            debug!("Account update conflict: {}", conflict);
            rerender(form, conflict.to_string())
        }
    }
}
