use std::collections::{BTreeMap, HashMap};

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use model::entities::{event, event_schedule, participant, registration};
use policy::{Actor, ensure_can_manage};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::auth::{CurrentActor, ManagerActor};
use crate::error::{AppError, AppResult};
use crate::forms::{
    blank_to_none, datetime_display, pair_ids, pair_value, parse_datetime,
    parse_optional_i32, validation_message,
};
use crate::schemas::{AppState, ListQuery};
use crate::services::{participants, registrations};
use crate::views::{Nav, Pager, redirect, render};

pub struct Choice {
    pub id: i32,
    pub name: String,
}

impl From<&participant::Model> for Choice {
    fn from(p: &participant::Model) -> Self {
        Choice {
            id: p.id,
            name: p.full_name(),
        }
    }
}

pub struct ChildChoice {
    pub id: i32,
    pub name: String,
    pub registered: bool,
}

pub struct ScheduleView {
    pub id: i32,
    pub location: String,
    pub starts: String,
    pub ends: String,
    pub capacity: String,
    pub registered_count: usize,
    pub children: Vec<ChildChoice>,
    pub attendees: Vec<Choice>,
}

pub struct EventView {
    pub id: i32,
    pub name: String,
    pub event_type: String,
    pub description: String,
    pub schedules: Vec<ScheduleView>,
}

#[derive(Template)]
#[template(path = "events/list.html")]
pub struct EventListTemplate {
    pub nav: Nav,
    pub events: Vec<EventView>,
    pub pager: Pager,
    pub all_participants: Vec<Choice>,
    pub has_children: bool,
    pub error: Option<String>,
}

/// Event fields plus, when adding, an optional first schedule.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EventForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Event name is required."))]
    pub name: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_capacity: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub capacity: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleForm {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub capacity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleInput {
    pub location: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub capacity: Option<i32>,
}

impl ScheduleForm {
    pub fn is_blank(&self) -> bool {
        [&self.location, &self.start_time, &self.end_time, &self.capacity]
            .iter()
            .all(|v| v.trim().is_empty())
    }

    pub fn parse(&self) -> Result<ScheduleInput, String> {
        let location = blank_to_none(&self.location).ok_or("Location is required.")?;
        let start_time = parse_datetime("Start time", &self.start_time)?;
        let end_time = parse_datetime("End time", &self.end_time)?;
        if end_time <= start_time {
            return Err("End time must be after the start time.".to_string());
        }
        let capacity = parse_optional_i32("Capacity", &self.capacity)?;
        if capacity.is_some_and(|c| c < 1) {
            return Err("Capacity must be at least 1.".to_string());
        }
        Ok(ScheduleInput {
            location,
            start_time,
            end_time,
            capacity,
        })
    }
}

impl EventForm {
    fn schedule(&self) -> ScheduleForm {
        ScheduleForm {
            location: self.location.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            capacity: self.capacity.clone(),
        }
    }

    fn default_capacity(&self) -> Result<Option<i32>, String> {
        let capacity = parse_optional_i32("Default capacity", &self.default_capacity)?;
        if capacity.is_some_and(|c| c < 1) {
            return Err("Default capacity must be at least 1.".to_string());
        }
        Ok(capacity)
    }

    fn apply(&self, model: &mut event::ActiveModel) -> Result<(), String> {
        self.validate().map_err(|e| validation_message(&e))?;
        model.name = Set(self.name.trim().to_string());
        model.event_type = Set(blank_to_none(&self.event_type));
        model.description = Set(blank_to_none(&self.description));
        model.default_capacity = Set(self.default_capacity()?);
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "events/form.html")]
pub struct EventFormTemplate {
    pub nav: Nav,
    pub heading: String,
    pub action: String,
    pub form: EventForm,
    pub editing: Option<i32>,
    pub schedules: Vec<ScheduleView>,
    pub schedule_form: ScheduleForm,
    pub error: Option<String>,
}

/// Build the list view: every schedule of the page's events with counts and
/// the actor's own participants marked.
async fn event_views(
    db: &DatabaseConnection,
    events: Vec<event::Model>,
    actor: &Actor,
    children: &[participant::Model],
) -> Result<Vec<EventView>, DbErr> {
    let event_ids: Vec<i32> = events.iter().map(|e| e.id).collect();
    let schedules = event_schedule::Entity::find()
        .filter(event_schedule::Column::EventId.is_in(event_ids))
        .order_by_asc(event_schedule::Column::StartTime)
        .all(db)
        .await?;
    let schedule_ids: Vec<i32> = schedules.iter().map(|s| s.id).collect();
    let rows = registration::Entity::find()
        .filter(registration::Column::EventScheduleId.is_in(schedule_ids))
        .all(db)
        .await?;

    let mut by_schedule: HashMap<i32, Vec<i32>> = HashMap::new();
    for row in rows {
        by_schedule
            .entry(row.event_schedule_id)
            .or_default()
            .push(row.participant_id);
    }

    let names: BTreeMap<i32, String> = if actor.is_manager() {
        let attendee_ids: Vec<i32> = by_schedule.values().flatten().copied().collect();
        participants::by_ids(db, &attendee_ids)
            .await?
            .iter()
            .map(|p| (p.id, p.full_name()))
            .collect()
    } else {
        BTreeMap::new()
    };

    let mut by_event: HashMap<i32, Vec<ScheduleView>> = HashMap::new();
    for schedule in schedules {
        let registered = by_schedule.remove(&schedule.id).unwrap_or_default();
        let event_capacity = events
            .iter()
            .find(|e| e.id == schedule.event_id)
            .and_then(|e| e.default_capacity);
        let view = schedule_view(&schedule, event_capacity, &registered, children, &names);
        by_event.entry(schedule.event_id).or_default().push(view);
    }

    Ok(events
        .into_iter()
        .map(|e| EventView {
            schedules: by_event.remove(&e.id).unwrap_or_default(),
            id: e.id,
            name: e.name,
            event_type: e.event_type.unwrap_or_default(),
            description: e.description.unwrap_or_default(),
        })
        .collect())
}

fn schedule_view(
    schedule: &event_schedule::Model,
    event_capacity: Option<i32>,
    registered: &[i32],
    children: &[participant::Model],
    names: &BTreeMap<i32, String>,
) -> ScheduleView {
    ScheduleView {
        id: schedule.id,
        location: schedule.location.clone(),
        starts: datetime_display(&schedule.start_time),
        ends: datetime_display(&schedule.end_time),
        capacity: schedule
            .capacity
            .or(event_capacity)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Open".to_string()),
        registered_count: registered.len(),
        children: children
            .iter()
            .map(|c| ChildChoice {
                id: c.id,
                name: c.full_name(),
                registered: registered.contains(&c.id),
            })
            .collect(),
        attendees: registered
            .iter()
            .filter_map(|id| {
                names.get(id).map(|name| Choice {
                    id: *id,
                    name: name.clone(),
                })
            })
            .collect(),
    }
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn list_events(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Valid(Query(query)): Valid<Query<ListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_events handler");
    let loaded = async {
        let paginator = event::Entity::find()
            .order_by_asc(event::Column::Name)
            .paginate(&state.db, query.limit());
        let pages = paginator.num_pages().await?;
        let events = paginator.fetch_page(query.page() - 1).await?;
        let children = participants::by_ids(&state.db, &actor.linked_participant_ids).await?;
        let views = event_views(&state.db, events, &actor, &children).await?;
        let everyone: Vec<Choice> = if actor.is_manager() {
            participants::all(&state.db).await?.iter().map(Choice::from).collect()
        } else {
            Vec::new()
        };
        Ok::<_, DbErr>((views, pages, everyone))
    }
    .await;

    let (events, pages, all_participants, error) = match loaded {
        Ok((views, pages, everyone)) => {
            debug!("Retrieved {} events", views.len());
            (views, pages, everyone, None)
        }
        Err(e) => {
            error!("Failed to list events: {}", e);
            (Vec::new(), 0, Vec::new(), Some("Events could not be loaded right now.".to_string()))
        }
    };

    render(&EventListTemplate {
        nav: Nav::from(&actor),
        events,
        pager: Pager::new("/events", &query, pages),
        all_participants,
        has_children: actor.is_parent && !actor.linked_participant_ids.is_empty(),
        error,
    })
}

fn event_form_page(template: EventFormTemplate) -> AppResult<Response> {
    Ok(render(&template)?.into_response())
}

pub async fn add_event_form(ManagerActor(actor): ManagerActor) -> AppResult<Response> {
    event_form_page(EventFormTemplate {
        nav: Nav::from(&actor),
        heading: "Add event".to_string(),
        action: "/events/add".to_string(),
        form: EventForm::default(),
        editing: None,
        schedules: Vec::new(),
        schedule_form: ScheduleForm::default(),
        error: None,
    })
}

/// Create an event and, if the schedule fields were filled in, its first
/// scheduled session.
#[instrument(skip_all, fields(username = %actor.username, name = %form.name))]
pub async fn add_event(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Form(form): Form<EventForm>,
) -> AppResult<Response> {
    trace!("Entering add_event handler");
    let mut model = event::ActiveModel {
        ..Default::default()
    };
    let schedule = form.schedule();
    let parsed = form.apply(&mut model).and_then(|_| {
        if schedule.is_blank() {
            Ok(None)
        } else {
            schedule.parse().map(Some)
        }
    });
    let schedule = match parsed {
        Ok(schedule) => schedule,
        Err(message) => {
            return event_form_page(EventFormTemplate {
                nav: Nav::from(&actor),
                heading: "Add event".to_string(),
                action: "/events/add".to_string(),
                form,
                editing: None,
                schedules: Vec::new(),
                schedule_form: ScheduleForm::default(),
                error: Some(message),
            });
        }
    };

    let created = model.insert(&state.db).await?;
    if let Some(schedule) = schedule {
        insert_schedule(&state.db, created.id, schedule).await?;
    }
    info!(event_id = created.id, "Event created");
    Ok(redirect("/events"))
}

async fn insert_schedule(
    db: &DatabaseConnection,
    event_id: i32,
    input: ScheduleInput,
) -> Result<event_schedule::Model, DbErr> {
    event_schedule::ActiveModel {
        event_id: Set(event_id),
        location: Set(input.location),
        start_time: Set(input.start_time),
        end_time: Set(input.end_time),
        capacity: Set(input.capacity),
        ..Default::default()
    }
    .insert(db)
    .await
}

async fn load_event(state: &AppState, id: i32) -> AppResult<event::Model> {
    event::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Event"))
}

async fn edit_page(
    state: &AppState,
    actor: &Actor,
    existing: &event::Model,
    form: EventForm,
    schedule_form: ScheduleForm,
    error: Option<String>,
) -> AppResult<Response> {
    let schedules = event_schedule::Entity::find()
        .filter(event_schedule::Column::EventId.eq(existing.id))
        .order_by_asc(event_schedule::Column::StartTime)
        .all(&state.db)
        .await?;
    let counts = registration_counts(&state.db, &schedules).await?;
    let schedules = schedules
        .iter()
        .map(|s| {
            let registered = counts.get(&s.id).cloned().unwrap_or_default();
            schedule_view(s, existing.default_capacity, &registered, &[], &BTreeMap::new())
        })
        .collect();

    event_form_page(EventFormTemplate {
        nav: Nav::from(actor),
        heading: format!("Edit {}", existing.name),
        action: format!("/events/edit/{}", existing.id),
        form,
        editing: Some(existing.id),
        schedules,
        schedule_form,
        error,
    })
}

async fn registration_counts(
    db: &DatabaseConnection,
    schedules: &[event_schedule::Model],
) -> Result<HashMap<i32, Vec<i32>>, DbErr> {
    let ids: Vec<i32> = schedules.iter().map(|s| s.id).collect();
    let mut map: HashMap<i32, Vec<i32>> = HashMap::new();
    for row in registration::Entity::find()
        .filter(registration::Column::EventScheduleId.is_in(ids))
        .all(db)
        .await?
    {
        map.entry(row.event_schedule_id).or_default().push(row.participant_id);
    }
    Ok(map)
}

fn form_from_model(e: &event::Model) -> EventForm {
    EventForm {
        name: e.name.clone(),
        event_type: e.event_type.clone().unwrap_or_default(),
        description: e.description.clone().unwrap_or_default(),
        default_capacity: e.default_capacity.map(|c| c.to_string()).unwrap_or_default(),
        ..Default::default()
    }
}

#[instrument(skip_all, fields(event_id = id))]
pub async fn edit_event_form(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let existing = load_event(&state, id).await?;
    let form = form_from_model(&existing);
    edit_page(&state, &actor, &existing, form, ScheduleForm::default(), None).await
}

#[instrument(skip_all, fields(event_id = id))]
pub async fn edit_event(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(id): Path<i32>,
    Form(form): Form<EventForm>,
) -> AppResult<Response> {
    trace!("Entering edit_event handler");
    let existing = load_event(&state, id).await?;
    let mut model: event::ActiveModel = existing.clone().into();
    if let Err(message) = form.apply(&mut model) {
        return edit_page(&state, &actor, &existing, form, ScheduleForm::default(), Some(message)).await;
    }
    model.update(&state.db).await?;
    info!("Event updated");
    Ok(redirect("/events"))
}

#[instrument(skip_all, fields(event_id = id))]
pub async fn delete_event(
    State(state): State<AppState>,
    ManagerActor(_actor): ManagerActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let result = event::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        warn!("Event {} not found for deletion", id);
        return Err(AppError::not_found("Event"));
    }
    info!("Event deleted with its schedules");
    Ok(redirect("/events"))
}

#[instrument(skip_all, fields(event_id = id))]
pub async fn add_schedule(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
    Path(id): Path<i32>,
    Form(schedule_form): Form<ScheduleForm>,
) -> AppResult<Response> {
    let existing = load_event(&state, id).await?;
    match schedule_form.parse() {
        Ok(input) => {
            let created = insert_schedule(&state.db, id, input).await?;
            info!(schedule_id = created.id, "Schedule added");
            Ok(redirect(&format!("/events/edit/{id}")))
        }
        Err(message) => {
            let form = form_from_model(&existing);
            edit_page(&state, &actor, &existing, form, schedule_form, Some(message)).await
        }
    }
}

#[instrument(skip_all, fields(schedule_id = id))]
pub async fn delete_schedule(
    State(state): State<AppState>,
    ManagerActor(_actor): ManagerActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let schedule = event_schedule::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Schedule"))?;
    event_schedule::Entity::delete_by_id(id).exec(&state.db).await?;
    info!("Schedule deleted");
    Ok(redirect(&format!("/events/edit/{}", schedule.event_id)))
}

async fn schedule_from_pairs(
    state: &AppState,
    pairs: &[(String, String)],
) -> AppResult<event_schedule::Model> {
    let id = pair_value(pairs, "event_schedule_id")
        .and_then(|v| v.trim().parse::<i32>().ok())
        .ok_or_else(|| AppError::not_found("Schedule"))?;
    event_schedule::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Schedule"))
}

async fn participant_from_pairs(
    state: &AppState,
    pairs: &[(String, String)],
    fallback: Option<i32>,
) -> AppResult<Option<participant::Model>> {
    let id = pair_value(pairs, "participant_id")
        .and_then(|v| v.trim().parse::<i32>().ok())
        .or(fallback);
    match id {
        Some(id) => participant::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .map(Some)
            .ok_or_else(|| AppError::not_found("Participant")),
        None => Ok(None),
    }
}

/// Register for a schedule.
///
/// Managers register any participant by id. Parents submit the full set of
/// children that should attend and the difference is applied. Other users
/// register their own participant.
#[instrument(skip_all, fields(username = %actor.username))]
pub async fn register(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    trace!("Entering register handler");
    let schedule = schedule_from_pairs(&state, &pairs).await?;

    if actor.is_parent && !actor.is_manager() {
        let requested = pair_ids(&pairs, "participant_ids");
        let plan = registrations::sync_children(
            &state.db,
            &actor.linked_participant_ids,
            &requested,
            schedule.id,
        )
        .await?;
        debug!(?plan, "Parent registration sync");
        return Ok(redirect("/events"));
    }

    let fallback = if actor.is_manager() {
        None
    } else {
        actor.primary_participant()
    };
    let Some(participant) = participant_from_pairs(&state, &pairs, fallback).await? else {
        debug!("No participant to register");
        return Ok(redirect("/participants/add"));
    };
    ensure_can_manage(&actor, &participant)?;
    registrations::register(&state.db, participant.id, schedule.id).await?;
    info!(participant_id = participant.id, schedule_id = schedule.id, "Registered");
    Ok(redirect("/events"))
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn unregister(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    trace!("Entering unregister handler");
    let schedule = schedule_from_pairs(&state, &pairs).await?;
    let fallback = if actor.is_manager() {
        None
    } else {
        actor.primary_participant()
    };
    let Some(participant) = participant_from_pairs(&state, &pairs, fallback).await? else {
        return Ok(redirect("/events"));
    };
    ensure_can_manage(&actor, &participant)?;
    registrations::unregister(&state.db, participant.id, schedule.id).await?;
    info!(participant_id = participant.id, schedule_id = schedule.id, "Unregistered");
    Ok(redirect("/events"))
}
