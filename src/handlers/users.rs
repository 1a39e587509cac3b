use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_valid::Valid;
use model::entities::user::{self, UserLevel};
use policy::{Actor, Role};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::auth::ManagerActor;
use crate::error::{AppError, AppResult};
use crate::forms::{checkbox, optional_password, validation_message};
use crate::schemas::{AppState, ListQuery};
use crate::services::accounts::{self, AccountChanges, AccountError, NewAccount};
use crate::views::{Nav, Pager, redirect, render};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserForm {
    #[serde(default)]
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters."))]
    pub username: String,
    /// Required when adding; blank keeps the current password when editing.
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub is_parent: String,
}

impl UserForm {
    fn from_model(u: &user::Model) -> Self {
        Self {
            username: u.username.clone(),
            password: String::new(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            level: u.level.code().to_string(),
            is_parent: if u.is_parent { "on".to_string() } else { String::new() },
        }
    }

    fn level(&self) -> Result<UserLevel, String> {
        UserLevel::from_code(self.level.trim()).ok_or_else(|| "Choose a user level.".to_string())
    }

    fn password(&self, required: bool) -> Result<Option<String>, String> {
        match optional_password(&self.password) {
            None if required => Err("Password is required.".to_string()),
            Some(p) if p.chars().count() < 8 => {
                Err("Password must be at least 8 characters.".to_string())
            }
            password => Ok(password),
        }
    }

    fn to_new_account(&self) -> Result<NewAccount, String> {
        self.validate().map_err(|e| validation_message(&e))?;
        let level = self.level()?;
        let password = self.password(true)?.unwrap_or_default();
        Ok(NewAccount {
            username: self.username.trim().to_string(),
            password,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            level,
            is_parent: checkbox(&self.is_parent),
            profile: None,
        })
    }

    fn to_changes(&self) -> Result<AccountChanges, String> {
        self.validate().map_err(|e| validation_message(&e))?;
        Ok(AccountChanges {
            username: Some(self.username.clone()),
            first_name: Some(self.first_name.clone()),
            last_name: Some(self.last_name.clone()),
            password: self.password(false)?,
            level: Some(self.level()?),
            is_parent: Some(checkbox(&self.is_parent)),
        })
    }

    pub fn is_manager(&self) -> bool {
        self.level.trim().eq_ignore_ascii_case("M")
    }

    pub fn parent_checked(&self) -> bool {
        checkbox(&self.is_parent)
    }
}

pub struct UserRow {
    pub username: String,
    pub name: String,
    pub role: String,
    pub is_parent: bool,
    pub created: String,
    pub is_self: bool,
}

impl UserRow {
    fn new(u: user::Model, actor: &Actor) -> Self {
        Self {
            is_self: u.id == actor.user_id,
            name: format!("{} {}", u.first_name, u.last_name),
            role: Role::from(u.level).label().to_string(),
            is_parent: u.is_parent,
            created: u.created_at.format("%Y-%m-%d").to_string(),
            username: u.username,
        }
    }
}

#[derive(Template)]
#[template(path = "users/list.html")]
pub struct UserListTemplate {
    pub nav: Nav,
    pub rows: Vec<UserRow>,
    pub pager: Pager,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "users/form.html")]
pub struct UserFormTemplate {
    pub nav: Nav,
    pub heading: String,
    pub action: String,
    pub form: UserForm,
    pub editing: bool,
    pub error: Option<String>,
}

fn form_page(
    actor: &Actor,
    editing: Option<&str>,
    form: UserForm,
    error: Option<String>,
) -> AppResult<Response> {
    let (heading, action) = match editing {
        Some(username) => (
            format!("Edit user {username}"),
            format!("/admin/users/edit/{username}"),
        ),
        None => ("Add user".to_string(), "/admin/users/add".to_string()),
    };
    Ok(render(&UserFormTemplate {
        nav: Nav::from(actor),
        heading,
        action,
        form,
        editing: editing.is_some(),
        error,
    })?
    .into_response())
}

async fn list_page(
    state: &AppState,
    actor: &Actor,
    query: &ListQuery,
    notice: Option<String>,
) -> AppResult<Html<String>> {
    let (rows, pages, error) = match accounts::list(&state.db, query).await {
        Ok((rows, pages)) => {
            debug!("Retrieved {} users", rows.len());
            (rows, pages, notice)
        }
        Err(e) => {
            error!("Failed to list users: {}", e);
            (Vec::new(), 0, Some("Users could not be loaded right now.".to_string()))
        }
    };

    render(&UserListTemplate {
        nav: Nav::from(actor),
        rows: rows.into_iter().map(|u| UserRow::new(u, actor)).collect(),
        pager: Pager::new("/admin/users", query, pages),
        error,
    })
}

async fn load(state: &AppState, username: &str) -> AppResult<user::Model> {
    accounts::find_by_username(&state.db, username)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Valid(Query(query)): Valid<Query<ListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_users handler");
    list_page(&state, &actor, &query, None).await
}

pub async fn add_user_form(ManagerActor(actor): ManagerActor) -> AppResult<Response> {
    let form = UserForm {
        level: UserLevel::User.code().to_string(),
        ..Default::default()
    };
    form_page(&actor, None, form, None)
}

#[instrument(skip_all, fields(new_username = %form.username))]
pub async fn add_user(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Form(form): Form<UserForm>,
) -> AppResult<Response> {
    trace!("Entering add_user handler");
    let account = match form.to_new_account() {
        Ok(account) => account,
        Err(message) => return form_page(&actor, None, form, Some(message)),
    };

    match accounts::create_account(&state.db, account).await {
        Ok(created) => {
            info!(user_id = created.id, "User added by manager");
            Ok(redirect("/admin/users"))
        }
        Err(AccountError::App(e)) => Err(e),
        Err(conflict) => {
            debug!("User add conflict: {}", conflict);
            form_page(&actor, None, form, Some(conflict.to_string()))
        }
    }
}

pub async fn edit_user_form(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let existing = load(&state, &username).await?;
    form_page(&actor, Some(&existing.username), UserForm::from_model(&existing), None)
}

/// Update a user. Renames relink participants and live sessions are
/// refreshed so the change applies to the next request.
#[instrument(skip_all, fields(username = %username))]
pub async fn edit_user(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(username): Path<String>,
    Form(form): Form<UserForm>,
) -> AppResult<Response> {
    trace!("Entering edit_user handler");
    let existing = load(&state, &username).await?;
    let changes = match form.to_changes() {
        Ok(changes) => changes,
        Err(message) => return form_page(&actor, Some(&existing.username), form, Some(message)),
    };

    match accounts::update_account(&state.db, existing.id, changes).await {
        Ok(updated) => {
            state.sessions.refresh_user(&updated).await;
            info!(new_username = %updated.username, "User updated by manager");
            Ok(redirect("/admin/users"))
        }
        Err(AccountError::App(e)) => Err(e),
        Err(conflict) => {
            debug!("User edit conflict: {}", conflict);
            form_page(&actor, Some(&existing.username), form, Some(conflict.to_string()))
        }
    }
}

#[instrument(skip_all, fields(username = %username))]
pub async fn delete_user(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let existing = load(&state, &username).await?;
    if existing.id == actor.user_id {
        warn!("Manager tried to delete their own account");
        let notice = Some("You cannot delete your own account.".to_string());
        return Ok(list_page(&state, &actor, &ListQuery::default(), notice)
            .await?
            .into_response());
    }

    accounts::delete_account(&state.db, &existing).await?;
    state.sessions.remove_user(existing.id).await;
    info!("User deleted");
    Ok(redirect("/admin/users"))
}
