use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_valid::Valid;
use chrono::Utc;
use model::entities::{donation, participant};
use policy::Actor;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::auth::{ManagerActor, MaybeActor};
use crate::error::{AppError, AppResult};
use crate::forms::{blank_to_none, optional_email, parse_amount, parse_date, parse_i32, validation_message};
use crate::schemas::{AppState, ListQuery};
use crate::services::donations::{self, PublicDonation};
use crate::services::participants;
use crate::views::{Nav, Pager, SelectOption, redirect, render};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DonateForm {
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
    pub amount: String,
    #[serde(default)]
    pub note: String,
}

impl DonateForm {
    /// Validate the public form. A blank email is only allowed when the
    /// donor can fall back to a linked participant.
    fn to_intake(&self, has_linked: bool) -> Result<PublicDonation, String> {
        self.validate().map_err(|e| validation_message(&e))?;
        let email = blank_to_none(&self.email);
        if email.is_none() && !has_linked {
            return Err("Email is required.".to_string());
        }
        Ok(PublicDonation {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email,
            amount: parse_amount(&self.amount)?,
            note: blank_to_none(&self.note),
        })
    }
}

#[derive(Template)]
#[template(path = "donations/donate.html")]
pub struct DonateTemplate {
    pub nav: Nav,
    pub form: DonateForm,
    pub email_optional: bool,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "donations/thanks.html")]
pub struct ThanksTemplate {
    pub nav: Nav,
    pub first_name: String,
    pub amount: String,
}

fn donate_page(actor: Option<&Actor>, form: DonateForm, error: Option<String>) -> AppResult<Response> {
    Ok(render(&DonateTemplate {
        nav: Nav::for_actor(actor),
        email_optional: actor.and_then(Actor::primary_participant).is_some(),
        form,
        error,
    })?
    .into_response())
}

pub async fn donate_form(MaybeActor(actor): MaybeActor) -> AppResult<Response> {
    let form = DonateForm {
        first_name: actor.as_ref().map(|a| a.first_name.clone()).unwrap_or_default(),
        ..Default::default()
    };
    donate_page(actor.as_ref(), form, None)
}

#[instrument(skip_all)]
pub async fn donate(
    State(state): State<AppState>,
    MaybeActor(actor): MaybeActor,
    Form(form): Form<DonateForm>,
) -> AppResult<Response> {
    trace!("Entering donate handler");
    let linked = actor.as_ref().and_then(Actor::primary_participant);
    let intake = match form.to_intake(linked.is_some()) {
        Ok(intake) => intake,
        Err(message) => {
            debug!("Donation form invalid: {}", message);
            return donate_page(actor.as_ref(), form, Some(message));
        }
    };

    let receipt =
        donations::record_public_donation(&state.db, intake, linked, Utc::now().date_naive())
            .await?;
    info!(
        donation_id = receipt.donation.id,
        created_participant = receipt.created_participant,
        "Public donation received"
    );

    Ok(render(&ThanksTemplate {
        nav: Nav::for_actor(actor.as_ref()),
        first_name: form.first_name.trim().to_string(),
        amount: format!("{:.2}", receipt.donation.amount),
    })?
    .into_response())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminDonationForm {
    #[serde(default)]
    pub participant_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub donation_date: String,
    #[serde(default)]
    pub note: String,
}

impl AdminDonationForm {
    fn from_model(d: &donation::Model) -> Self {
        Self {
            participant_id: d.participant_id.to_string(),
            amount: format!("{:.2}", d.amount),
            donation_date: d.donation_date.format("%Y-%m-%d").to_string(),
            note: d.note.clone().unwrap_or_default(),
        }
    }

    fn apply(&self, model: &mut donation::ActiveModel) -> Result<(), String> {
        model.participant_id = Set(parse_i32("Participant", &self.participant_id)
            .map_err(|_| "Choose a participant.".to_string())?);
        model.amount = Set(parse_amount(&self.amount)?);
        model.donation_date = Set(parse_date("Donation date", &self.donation_date)?);
        model.note = Set(blank_to_none(&self.note));
        Ok(())
    }
}

pub struct DonationRow {
    pub id: i32,
    pub donor: String,
    pub email: String,
    pub amount: String,
    pub date: String,
    pub note: String,
}

impl DonationRow {
    fn new((d, p): (donation::Model, Option<participant::Model>)) -> Self {
        Self {
            id: d.id,
            donor: p.as_ref().map(|p| p.full_name()).unwrap_or_default(),
            email: p.and_then(|p| p.email).unwrap_or_default(),
            amount: format!("{:.2}", d.amount),
            date: d.donation_date.format("%Y-%m-%d").to_string(),
            note: d.note.unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "donations/list.html")]
pub struct DonationListTemplate {
    pub nav: Nav,
    pub rows: Vec<DonationRow>,
    pub total: String,
    pub pager: Pager,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "donations/form.html")]
pub struct DonationFormTemplate {
    pub nav: Nav,
    pub heading: String,
    pub action: String,
    pub form: AdminDonationForm,
    pub participants: Vec<SelectOption>,
    pub error: Option<String>,
}

async fn form_page(
    state: &AppState,
    actor: &Actor,
    heading: &str,
    action: String,
    form: AdminDonationForm,
    error: Option<String>,
) -> AppResult<Response> {
    let people = participants::all(&state.db).await?;
    let participants = SelectOption::list(
        people.iter().map(|p| (p.id, p.full_name())),
        &form.participant_id,
    );
    Ok(render(&DonationFormTemplate {
        nav: Nav::from(actor),
        heading: heading.to_string(),
        action,
        form,
        participants,
        error,
    })?
    .into_response())
}

#[instrument(skip_all)]
pub async fn list_donations(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Valid(Query(query)): Valid<Query<ListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_donations handler");
    let loaded = async {
        let (rows, pages) = donations::list(&state.db, &query).await?;
        let total = donations::total(&state.db).await?;
        Ok::<_, sea_orm::DbErr>((rows, pages, total))
    }
    .await;

    let (rows, pages, total, error) = match loaded {
        Ok((rows, pages, total)) => {
            debug!("Retrieved {} donations", rows.len());
            (rows, pages, total, None)
        }
        Err(e) => {
            error!("Failed to list donations: {}", e);
            (
                Vec::new(),
                0,
                Decimal::ZERO,
                Some("Donations could not be loaded right now.".to_string()),
            )
        }
    };

    render(&DonationListTemplate {
        nav: Nav::from(&actor),
        rows: rows.into_iter().map(DonationRow::new).collect(),
        total: format!("{total:.2}"),
        pager: Pager::new("/admin/donations", &query, pages),
        error,
    })
}

pub async fn add_donation_form(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
) -> AppResult<Response> {
    let form = AdminDonationForm {
        donation_date: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        ..Default::default()
    };
    form_page(&state, &actor, "Add donation", "/admin/donations/add".to_string(), form, None).await
}

#[instrument(skip_all)]
pub async fn add_donation(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Form(form): Form<AdminDonationForm>,
) -> AppResult<Response> {
    trace!("Entering add_donation handler");
    let action = "/admin/donations/add".to_string();
    let mut model = donation::ActiveModel {
        ..Default::default()
    };
    if let Err(message) = form.apply(&mut model) {
        return form_page(&state, &actor, "Add donation", action, form, Some(message)).await;
    }
    if !donor_exists(&state, &form).await? {
        let message = "Choose a participant.".to_string();
        return form_page(&state, &actor, "Add donation", action, form, Some(message)).await;
    }
    let created = model.insert(&state.db).await?;
    info!(donation_id = created.id, "Donation added");
    Ok(redirect("/admin/donations"))
}

async fn donor_exists(state: &AppState, form: &AdminDonationForm) -> AppResult<bool> {
    let Ok(id) = parse_i32("Participant", &form.participant_id) else {
        return Ok(false);
    };
    Ok(participant::Entity::find_by_id(id).one(&state.db).await?.is_some())
}

async fn load(state: &AppState, id: i32) -> AppResult<donation::Model> {
    donation::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Donation"))
}

pub async fn edit_donation_form(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let existing = load(&state, id).await?;
    form_page(
        &state,
        &actor,
        "Edit donation",
        format!("/admin/donations/edit/{id}"),
        AdminDonationForm::from_model(&existing),
        None,
    )
    .await
}

#[instrument(skip_all, fields(donation_id = id))]
pub async fn edit_donation(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(id): Path<i32>,
    Form(form): Form<AdminDonationForm>,
) -> AppResult<Response> {
    trace!("Entering edit_donation handler");
    let existing = load(&state, id).await?;
    let mut model: donation::ActiveModel = existing.into();
    let action = format!("/admin/donations/edit/{id}");
    if let Err(message) = form.apply(&mut model) {
        return form_page(&state, &actor, "Edit donation", action, form, Some(message)).await;
    }
    if !donor_exists(&state, &form).await? {
        let message = "Choose a participant.".to_string();
        return form_page(&state, &actor, "Edit donation", action, form, Some(message)).await;
    }
    model.update(&state.db).await?;
    info!("Donation updated");
    Ok(redirect("/admin/donations"))
}

#[instrument(skip_all, fields(donation_id = id))]
pub async fn delete_donation(
    State(state): State<AppState>,
    ManagerActor(_actor): ManagerActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let result = donation::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        warn!("Donation not found");
        return Err(AppError::not_found("Donation"));
    }
    info!("Donation deleted");
    Ok(redirect("/admin/donations"))
}
