use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_valid::Valid;
use migration::EMAIL_LOWER_INDEX;
use model::entities::participant;
use policy::{Actor, can_add_participant, can_manage, ensure_can_manage};
use sea_orm::EntityTrait;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::auth::CurrentActor;
use crate::error::{AppError, AppResult};
use crate::forms::{blank_to_none, optional_email, parse_optional_date, validation_message};
use crate::schemas::{AppState, ListQuery};
use crate::services::participants::{self, ParticipantInput};
use crate::services::violates_unique;
use crate::views::{Nav, Pager, redirect, render};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ParticipantForm {
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
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub school_or_employer: String,
    #[serde(default)]
    pub field_of_interest: String,
    /// Linked account; only managers may set it
    #[serde(default)]
    pub username: String,
}

impl ParticipantForm {
    fn from_model(p: &participant::Model) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            email: text(&p.email),
            phone: text(&p.phone),
            date_of_birth: p
                .date_of_birth
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            city: text(&p.city),
            state: text(&p.state),
            zip: text(&p.zip),
            school_or_employer: text(&p.school_or_employer),
            field_of_interest: text(&p.field_of_interest),
            username: text(&p.username),
        }
    }

    /// Validate and convert into the profile fields.
    fn to_input(&self) -> Result<ParticipantInput, String> {
        self.validate().map_err(|e| validation_message(&e))?;
        Ok(ParticipantInput {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: blank_to_none(&self.email),
            phone: blank_to_none(&self.phone),
            date_of_birth: parse_optional_date("Date of birth", &self.date_of_birth)?,
            city: blank_to_none(&self.city),
            state: blank_to_none(&self.state),
            zip: blank_to_none(&self.zip),
            school_or_employer: blank_to_none(&self.school_or_employer),
            field_of_interest: blank_to_none(&self.field_of_interest),
        })
    }
}

pub struct ParticipantRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub school_or_employer: String,
    pub field_of_interest: String,
    pub username: String,
    pub can_manage: bool,
}

impl ParticipantRow {
    fn new(p: participant::Model, actor: &Actor) -> Self {
        let can_manage = can_manage(actor, &p);
        let location = [p.city.as_deref(), p.state.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: p.id,
            name: p.full_name(),
            email: p.email.unwrap_or_default(),
            phone: p.phone.unwrap_or_default(),
            location,
            school_or_employer: p.school_or_employer.unwrap_or_default(),
            field_of_interest: p.field_of_interest.unwrap_or_default(),
            username: p.username.unwrap_or_default(),
            can_manage,
        }
    }
}

#[derive(Template)]
#[template(path = "participants/list.html")]
pub struct ParticipantListTemplate {
    pub nav: Nav,
    pub rows: Vec<ParticipantRow>,
    pub pager: Pager,
    pub q: String,
    pub can_add: bool,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "participants/form.html")]
pub struct ParticipantFormTemplate {
    pub nav: Nav,
    pub heading: String,
    pub action: String,
    pub form: ParticipantForm,
    pub show_username: bool,
    pub error: Option<String>,
}

fn form_page(
    actor: &Actor,
    heading: &str,
    action: String,
    form: ParticipantForm,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(render(&ParticipantFormTemplate {
        nav: Nav::from(actor),
        heading: heading.to_string(),
        action,
        form,
        show_username: actor.is_manager(),
        error,
    })?
    .into_response())
}

async fn load(state: &AppState, id: i32) -> AppResult<participant::Model> {
    participant::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Participant"))
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn list_participants(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Valid(Query(query)): Valid<Query<ListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_participants handler");
    let (rows, pages, error) = match participants::list(&state.db, &query).await {
        Ok((rows, pages)) => {
            debug!("Retrieved {} participants", rows.len());
            (rows, pages, None)
        }
        Err(e) => {
            error!("Failed to list participants: {}", e);
            (Vec::new(), 0, Some("Participants could not be loaded right now.".to_string()))
        }
    };

    render(&ParticipantListTemplate {
        nav: Nav::from(&actor),
        rows: rows.into_iter().map(|p| ParticipantRow::new(p, &actor)).collect(),
        pager: Pager::new("/participants", &query, pages),
        q: query.search().unwrap_or_default().to_string(),
        can_add: can_add_participant(&actor),
        error,
    })
}

pub async fn add_participant_form(CurrentActor(actor): CurrentActor) -> AppResult<Response> {
    if !can_add_participant(&actor) {
        return Ok(redirect("/"));
    }
    form_page(
        &actor,
        "Add participant",
        "/participants/add".to_string(),
        ParticipantForm::default(),
        None,
    )
}

fn email_taken(email: &str) -> String {
    format!("A participant with the email '{email}' already exists.")
}

/// Create a participant. Non-managers always link it to themselves.
#[instrument(skip_all, fields(username = %actor.username))]
pub async fn add_participant(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Form(form): Form<ParticipantForm>,
) -> AppResult<Response> {
    trace!("Entering add_participant handler");
    if !can_add_participant(&actor) {
        warn!("User may not add another participant");
        return Ok(redirect("/"));
    }
    let action = "/participants/add".to_string();
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return form_page(&actor, "Add participant", action, form, Some(message)),
    };
    let email = input.email.clone();
    if let Some(email) = &email {
        if participants::email_taken(&state.db, email, None).await? {
            return form_page(&actor, "Add participant", action, form, Some(email_taken(email)));
        }
    }

    let link = if actor.is_manager() {
        blank_to_none(&form.username)
    } else {
        Some(actor.username.clone())
    };
    let created = match participants::create(&state.db, input, link).await {
        Ok(created) => created,
        Err(e) if violates_unique(&e, EMAIL_LOWER_INDEX) => {
            warn!("Email conflict caught by the database");
            let message = email_taken(email.as_deref().unwrap_or_default());
            return form_page(&actor, "Add participant", action, form, Some(message));
        }
        Err(e) => return Err(e.into()),
    };
    info!(participant_id = created.id, "Participant added");
    Ok(redirect("/participants"))
}

#[instrument(skip_all, fields(username = %actor.username, participant_id = id))]
pub async fn edit_participant_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let existing = load(&state, id).await?;
    ensure_can_manage(&actor, &existing)?;
    form_page(
        &actor,
        "Edit participant",
        format!("/participants/edit/{id}"),
        ParticipantForm::from_model(&existing),
        None,
    )
}

#[instrument(skip_all, fields(username = %actor.username, participant_id = id))]
pub async fn edit_participant(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
    Form(form): Form<ParticipantForm>,
) -> AppResult<Response> {
    trace!("Entering edit_participant handler");
    let existing = load(&state, id).await?;
    ensure_can_manage(&actor, &existing)?;

    let action = format!("/participants/edit/{id}");
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return form_page(&actor, "Edit participant", action, form, Some(message)),
    };
    let email = input.email.clone();
    if let Some(email) = &email {
        if participants::email_taken(&state.db, email, Some(id)).await? {
            return form_page(&actor, "Edit participant", action, form, Some(email_taken(email)));
        }
    }

    let link = actor.is_manager().then(|| blank_to_none(&form.username));
    match participants::update(&state.db, existing, input, link).await {
        Ok(_) => {}
        Err(e) if violates_unique(&e, EMAIL_LOWER_INDEX) => {
            warn!("Email conflict caught by the database");
            let message = email_taken(email.as_deref().unwrap_or_default());
            return form_page(&actor, "Edit participant", action, form, Some(message));
        }
        Err(e) => return Err(e.into()),
    }
    info!("Participant updated");
    Ok(redirect("/participants"))
}

#[instrument(skip_all, fields(username = %actor.username, participant_id = id))]
pub async fn delete_participant(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let existing = load(&state, id).await?;
    ensure_can_manage(&actor, &existing)?;

    let result = participant::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        warn!("Participant already gone");
        return Err(AppError::not_found("Participant"));
    }
    info!("Participant deleted with its registrations, surveys, donations and milestones");
    Ok(redirect("/participants"))
}
