use askama::Template;
use axum::{extract::State, response::Html};
use chrono::Utc;
use tracing::{debug, instrument};

use crate::auth::ManagerActor;
use crate::error::AppResult;
use crate::schemas::AppState;
use crate::services::dashboard::{self, DashboardStats};
use crate::views::{Nav, render};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub nav: Nav,
    pub participant_count: u64,
    pub upcoming_schedule_count: u64,
    pub survey_count: u64,
    pub donation_total: String,
    pub promoters: u64,
    pub passives: u64,
    pub detractors: u64,
    pub nps_score: i64,
}

impl DashboardTemplate {
    fn new(nav: Nav, stats: DashboardStats) -> Self {
        Self {
            nav,
            participant_count: stats.participant_count,
            upcoming_schedule_count: stats.upcoming_schedule_count,
            survey_count: stats.survey_count,
            donation_total: format!("{:.2}", stats.donation_total),
            promoters: stats.nps.promoters,
            passives: stats.nps.passives,
            detractors: stats.nps.detractors,
            nps_score: stats.nps.score,
        }
    }
}

/// Manager overview. Never fails on a broken aggregate; see `dashboard::load`.
#[instrument(skip_all, fields(username = %actor.username))]
pub async fn dashboard(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
) -> AppResult<Html<String>> {
    let stats = dashboard::load(&state.db, Utc::now().naive_utc()).await;
    debug!(?stats, "Dashboard figures loaded");
    render(&DashboardTemplate::new(Nav::from(&actor), stats))
}
