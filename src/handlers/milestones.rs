use std::collections::HashMap;

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_valid::Valid;
use model::entities::{milestone, participant};
use policy::{Actor, can_manage, ensure_can_manage};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::auth::CurrentActor;
use crate::error::{AppError, AppResult};
use crate::forms::{blank_to_none, parse_date, validation_message};
use crate::schemas::{AppState, ListQuery};
use crate::services::participants;
use crate::views::{Nav, Pager, redirect, render};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MilestoneForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Title is required."))]
    pub title: String,
    #[serde(default)]
    pub milestone_date: String,
    #[serde(default)]
    pub notes: String,
}

impl MilestoneForm {
    fn from_model(m: &milestone::Model) -> Self {
        Self {
            title: m.title.clone(),
            milestone_date: m.milestone_date.format("%Y-%m-%d").to_string(),
            notes: m.notes.clone().unwrap_or_default(),
        }
    }

    fn apply(&self, model: &mut milestone::ActiveModel) -> Result<(), String> {
        self.validate().map_err(|e| validation_message(&e))?;
        model.title = Set(self.title.trim().to_string());
        model.milestone_date = Set(parse_date("Milestone date", &self.milestone_date)?);
        model.notes = Set(blank_to_none(&self.notes));
        Ok(())
    }
}

pub struct MilestoneSummaryRow {
    pub participant_id: i32,
    pub name: String,
    pub count: i64,
    pub can_manage: bool,
}

pub struct MilestoneRow {
    pub id: i32,
    pub title: String,
    pub date: String,
    pub notes: String,
}

#[derive(Template)]
#[template(path = "milestones/list.html")]
pub struct MilestoneListTemplate {
    pub nav: Nav,
    pub rows: Vec<MilestoneSummaryRow>,
    pub pager: Pager,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "milestones/view.html")]
pub struct MilestoneViewTemplate {
    pub nav: Nav,
    pub participant_id: i32,
    pub participant_name: String,
    pub milestones: Vec<MilestoneRow>,
    pub can_manage: bool,
}

#[derive(Template)]
#[template(path = "milestones/form.html")]
pub struct MilestoneFormTemplate {
    pub nav: Nav,
    pub heading: String,
    pub action: String,
    pub back: String,
    pub form: MilestoneForm,
    pub error: Option<String>,
}

/// Milestone count per participant id.
async fn counts(db: &DatabaseConnection) -> Result<HashMap<i32, i64>, DbErr> {
    let rows: Vec<(i32, i64)> = milestone::Entity::find()
        .select_only()
        .column(milestone::Column::ParticipantId)
        .column_as(milestone::Column::Id.count(), "count")
        .group_by(milestone::Column::ParticipantId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn load_participant(state: &AppState, id: i32) -> AppResult<participant::Model> {
    participant::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Participant"))
}

/// A milestone together with its owner, after the ownership check.
async fn load_owned(
    state: &AppState,
    actor: &Actor,
    id: i32,
) -> AppResult<(milestone::Model, participant::Model)> {
    let milestone = milestone::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Milestone"))?;
    let participant = load_participant(state, milestone.participant_id).await?;
    ensure_can_manage(actor, &participant)?;
    Ok((milestone, participant))
}

fn form_page(
    actor: &Actor,
    heading: String,
    action: String,
    participant_id: i32,
    form: MilestoneForm,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(render(&MilestoneFormTemplate {
        nav: Nav::from(actor),
        heading,
        action,
        back: format!("/milestones/view/{participant_id}"),
        form,
        error,
    })?
    .into_response())
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn list_milestones(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Valid(Query(query)): Valid<Query<ListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_milestones handler");
    let loaded = async {
        let (people, pages) = participants::list(&state.db, &query).await?;
        let counts = counts(&state.db).await?;
        Ok::<_, DbErr>((people, pages, counts))
    }
    .await;

    let (rows, pages, error) = match loaded {
        Ok((people, pages, counts)) => {
            debug!("Retrieved milestone counts for {} participants", people.len());
            let rows = people
                .into_iter()
                .map(|p| MilestoneSummaryRow {
                    participant_id: p.id,
                    count: counts.get(&p.id).copied().unwrap_or(0),
                    can_manage: can_manage(&actor, &p),
                    name: p.full_name(),
                })
                .collect();
            (rows, pages, None)
        }
        Err(e) => {
            error!("Failed to list milestones: {}", e);
            (Vec::new(), 0, Some("Milestones could not be loaded right now.".to_string()))
        }
    };

    render(&MilestoneListTemplate {
        nav: Nav::from(&actor),
        rows,
        pager: Pager::new("/milestones", &query, pages),
        error,
    })
}

#[instrument(skip_all, fields(participant_id = id))]
pub async fn view_milestones(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Html<String>> {
    let participant = load_participant(&state, id).await?;
    let milestones = milestone::Entity::find()
        .filter(milestone::Column::ParticipantId.eq(id))
        .order_by_desc(milestone::Column::MilestoneDate)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} milestones", milestones.len());

    render(&MilestoneViewTemplate {
        nav: Nav::from(&actor),
        participant_id: id,
        participant_name: participant.full_name(),
        can_manage: can_manage(&actor, &participant),
        milestones: milestones
            .into_iter()
            .map(|m| MilestoneRow {
                id: m.id,
                title: m.title,
                date: m.milestone_date.format("%Y-%m-%d").to_string(),
                notes: m.notes.unwrap_or_default(),
            })
            .collect(),
    })
}

pub async fn add_milestone_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(participant_id): Path<i32>,
) -> AppResult<Response> {
    let participant = load_participant(&state, participant_id).await?;
    ensure_can_manage(&actor, &participant)?;
    form_page(
        &actor,
        format!("Add milestone for {}", participant.full_name()),
        format!("/milestones/add/{participant_id}"),
        participant_id,
        MilestoneForm::default(),
        None,
    )
}

#[instrument(skip_all, fields(username = %actor.username, participant_id = participant_id))]
pub async fn add_milestone(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(participant_id): Path<i32>,
    Form(form): Form<MilestoneForm>,
) -> AppResult<Response> {
    trace!("Entering add_milestone handler");
    let participant = load_participant(&state, participant_id).await?;
    ensure_can_manage(&actor, &participant)?;

    let mut model = milestone::ActiveModel {
        participant_id: Set(participant_id),
        ..Default::default()
    };
    if let Err(message) = form.apply(&mut model) {
        return form_page(
            &actor,
            format!("Add milestone for {}", participant.full_name()),
            format!("/milestones/add/{participant_id}"),
            participant_id,
            form,
            Some(message),
        );
    }
    let created = model.insert(&state.db).await?;
    info!(milestone_id = created.id, "Milestone added");
    Ok(redirect(&format!("/milestones/view/{participant_id}")))
}

pub async fn edit_milestone_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let (milestone, participant) = load_owned(&state, &actor, id).await?;
    form_page(
        &actor,
        format!("Edit milestone for {}", participant.full_name()),
        format!("/milestones/edit/{id}"),
        participant.id,
        MilestoneForm::from_model(&milestone),
        None,
    )
}

#[instrument(skip_all, fields(username = %actor.username, milestone_id = id))]
pub async fn edit_milestone(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
    Form(form): Form<MilestoneForm>,
) -> AppResult<Response> {
    trace!("Entering edit_milestone handler");
    let (milestone, participant) = load_owned(&state, &actor, id).await?;

    let mut model: milestone::ActiveModel = milestone.into();
    if let Err(message) = form.apply(&mut model) {
        return form_page(
            &actor,
            format!("Edit milestone for {}", participant.full_name()),
            format!("/milestones/edit/{id}"),
            participant.id,
            form,
            Some(message),
        );
    }
    model.update(&state.db).await?;
    info!("Milestone updated");
    Ok(redirect(&format!("/milestones/view/{}", participant.id)))
}

#[instrument(skip_all, fields(username = %actor.username, milestone_id = id))]
pub async fn delete_milestone(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let (_, participant) = load_owned(&state, &actor, id).await?;
    let result = milestone::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        warn!("Milestone already gone");
    }
    info!("Milestone deleted");
    Ok(redirect(&format!("/milestones/view/{}", participant.id)))
}
