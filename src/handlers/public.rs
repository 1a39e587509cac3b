use askama::Template;
use axum::{extract::State, http::StatusCode, response::Html};
use chrono::Utc;
use model::entities::{event, event_schedule};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::{error, instrument, trace};

use crate::auth::MaybeActor;
use crate::error::AppResult;
use crate::forms::datetime_display;
use crate::schemas::AppState;
use crate::views::{Nav, render};

pub const TEAPOT_BODY: &str = "418: I'm a little Teapot (Short and stout)";

pub struct UpcomingView {
    pub event_name: String,
    pub location: String,
    pub when: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub nav: Nav,
    pub upcoming: Vec<UpcomingView>,
}

/// Landing page with the next few scheduled sessions.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, MaybeActor(actor): MaybeActor) -> AppResult<Html<String>> {
    trace!("Entering index handler");
    let now = Utc::now().naive_utc();
    let upcoming = match event_schedule::Entity::find()
        .find_also_related(event::Entity)
        .filter(event_schedule::Column::StartTime.gt(now))
        .order_by_asc(event_schedule::Column::StartTime)
        .limit(5)
        .all(&state.db)
        .await
    {
        Ok(rows) => rows
            .into_iter()
            .map(|(schedule, event)| UpcomingView {
                event_name: event.map(|e| e.name).unwrap_or_default(),
                location: schedule.location,
                when: datetime_display(&schedule.start_time),
            })
            .collect(),
        Err(e) => {
            error!("Failed to load upcoming schedules: {}", e);
            Vec::new()
        }
    };

    render(&IndexTemplate {
        nav: Nav::for_actor(actor.as_ref()),
        upcoming,
    })
}

pub async fn teapot() -> (StatusCode, &'static str) {
    (StatusCode::IM_A_TEAPOT, TEAPOT_BODY)
}
