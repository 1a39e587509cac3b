use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_valid::Valid;
use chrono::Utc;
use model::entities::{event_schedule, participant, survey};
use policy::{Actor, can_manage, classify_nps, ensure_can_manage, validate_score};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::auth::{CurrentActor, ManagerActor};
use crate::error::{AppError, AppResult};
use crate::forms::{blank_to_none, datetime_display, parse_i32};
use crate::schemas::{AppState, ListQuery};
use crate::services::participants;
use crate::services::surveys::{self, EventSurveyStats, NpsSummary, SurveyRecord};
use crate::views::{Nav, Pager, SelectOption, page_of, redirect, render};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurveyForm {
    #[serde(default)]
    pub participant_id: String,
    #[serde(default)]
    pub event_schedule_id: String,
    #[serde(default)]
    pub satisfaction_score: String,
    #[serde(default)]
    pub usefulness_score: String,
    #[serde(default)]
    pub instructor_score: String,
    #[serde(default)]
    pub recommendation_score: String,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyScores {
    pub satisfaction: i32,
    pub usefulness: i32,
    pub instructor: i32,
    pub recommendation: i32,
    pub comments: Option<String>,
}

fn score(label: &str, value: &str) -> Result<i32, String> {
    let parsed = parse_i32(label, value)?;
    validate_score(parsed).map_err(|_| format!("{label} must be between 0 and 10."))
}

impl SurveyForm {
    pub fn scores(&self) -> Result<SurveyScores, String> {
        Ok(SurveyScores {
            satisfaction: score("Satisfaction score", &self.satisfaction_score)?,
            usefulness: score("Usefulness score", &self.usefulness_score)?,
            instructor: score("Instructor score", &self.instructor_score)?,
            recommendation: score("Recommendation score", &self.recommendation_score)?,
            comments: blank_to_none(&self.comments),
        })
    }

    fn from_model(s: &survey::Model) -> Self {
        Self {
            participant_id: s.participant_id.to_string(),
            event_schedule_id: s.event_schedule_id.to_string(),
            satisfaction_score: s.satisfaction_score.to_string(),
            usefulness_score: s.usefulness_score.to_string(),
            instructor_score: s.instructor_score.to_string(),
            recommendation_score: s.recommendation_score.to_string(),
            comments: s.comments.clone().unwrap_or_default(),
        }
    }
}

impl SurveyScores {
    fn apply(self, model: &mut survey::ActiveModel) {
        model.satisfaction_score = Set(self.satisfaction);
        model.usefulness_score = Set(self.usefulness);
        model.instructor_score = Set(self.instructor);
        model.recommendation_score = Set(self.recommendation);
        model.nps_bucket = Set(classify_nps(self.recommendation));
        model.comments = Set(self.comments);
    }
}

pub struct SurveyRow {
    pub id: i32,
    pub participant: String,
    pub event: String,
    pub when: String,
    pub satisfaction: i32,
    pub usefulness: i32,
    pub instructor: i32,
    pub recommendation: i32,
    pub bucket: String,
    pub comments: String,
    pub can_manage: bool,
}

impl SurveyRow {
    fn new(record: SurveyRecord, actor: &Actor) -> Self {
        let can_manage = record
            .participant
            .as_ref()
            .is_some_and(|p| can_manage(actor, p));
        Self {
            id: record.survey.id,
            participant: record
                .participant
                .as_ref()
                .map(|p| p.full_name())
                .unwrap_or_default(),
            event: record.event_name,
            when: record
                .schedule
                .as_ref()
                .map(|s| datetime_display(&s.start_time))
                .unwrap_or_default(),
            satisfaction: record.survey.satisfaction_score,
            usefulness: record.survey.usefulness_score,
            instructor: record.survey.instructor_score,
            recommendation: record.survey.recommendation_score,
            bucket: record.survey.nps_bucket.label().to_string(),
            comments: record.survey.comments.unwrap_or_default(),
            can_manage,
        }
    }
}

#[derive(Template)]
#[template(path = "surveys/list.html")]
pub struct SurveyListTemplate {
    pub nav: Nav,
    pub rows: Vec<SurveyRow>,
    pub pager: Pager,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "surveys/form.html")]
pub struct SurveyFormTemplate {
    pub nav: Nav,
    pub heading: String,
    pub action: String,
    pub form: SurveyForm,
    pub editing: bool,
    pub participants: Vec<SelectOption>,
    pub schedules: Vec<SelectOption>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "surveys/data.html")]
pub struct SurveyDataTemplate {
    pub nav: Nav,
    pub overall: NpsSummary,
    pub events: Vec<EventSurveyStats>,
    pub error: Option<String>,
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn list_surveys(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Valid(Query(query)): Valid<Query<ListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_surveys handler");
    let scope = (!actor.is_manager()).then_some(actor.linked_participant_ids.as_slice());
    let (records, pages, error) = match surveys::records(&state.db, scope).await {
        Ok(records) => {
            let (page, pages) = page_of(records, &query);
            (page, pages, None)
        }
        Err(e) => {
            error!("Failed to load surveys: {}", e);
            (Vec::new(), 0, Some("Surveys could not be loaded right now.".to_string()))
        }
    };

    render(&SurveyListTemplate {
        nav: Nav::from(&actor),
        rows: records.into_iter().map(|r| SurveyRow::new(r, &actor)).collect(),
        pager: Pager::new("/survey", &query, pages),
        error,
    })
}

/// Render the submit form with participant and schedule choices.
async fn submit_page(
    state: &AppState,
    actor: &Actor,
    form: SurveyForm,
    error: Option<String>,
) -> AppResult<Response> {
    let choices = if actor.is_manager() {
        participants::all(&state.db).await?
    } else {
        participants::by_ids(&state.db, &actor.linked_participant_ids).await?
    };
    let schedules = event_schedule::Entity::find()
        .order_by_desc(event_schedule::Column::StartTime)
        .all(&state.db)
        .await?;
    let event_names = surveys::event_names(&state.db).await?;

    let participants = SelectOption::list(
        choices.iter().map(|p| (p.id, p.full_name())),
        &form.participant_id,
    );
    let schedules = SelectOption::list(
        schedules.iter().map(|s| {
            let name = event_names.get(&s.event_id).cloned().unwrap_or_default();
            (s.id, format!("{name} ({})", datetime_display(&s.start_time)))
        }),
        &form.event_schedule_id,
    );

    Ok(render(&SurveyFormTemplate {
        nav: Nav::from(actor),
        heading: "Submit a survey".to_string(),
        action: "/survey/submit".to_string(),
        form,
        editing: false,
        participants,
        schedules,
        error,
    })?
    .into_response())
}

pub async fn submit_survey_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> AppResult<Response> {
    let form = SurveyForm {
        participant_id: actor
            .primary_participant()
            .map(|id| id.to_string())
            .unwrap_or_default(),
        ..Default::default()
    };
    submit_page(&state, &actor, form, None).await
}

#[instrument(skip_all, fields(username = %actor.username))]
pub async fn submit_survey(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Form(form): Form<SurveyForm>,
) -> AppResult<Response> {
    trace!("Entering submit_survey handler");
    let participant_id = match parse_i32("Participant", &form.participant_id) {
        Ok(id) => id,
        Err(_) => return submit_page(&state, &actor, form, Some("Choose a participant.".to_string())).await,
    };
    let schedule_id = match parse_i32("Event", &form.event_schedule_id) {
        Ok(id) => id,
        Err(_) => return submit_page(&state, &actor, form, Some("Choose an event session.".to_string())).await,
    };
    let scores = match form.scores() {
        Ok(scores) => scores,
        Err(message) => {
            debug!("Survey scores invalid: {}", message);
            return submit_page(&state, &actor, form, Some(message)).await;
        }
    };

    let participant = participant::Entity::find_by_id(participant_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Participant"))?;
    ensure_can_manage(&actor, &participant)?;
    event_schedule::Entity::find_by_id(schedule_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Event session"))?;

    let mut model = survey::ActiveModel {
        participant_id: Set(participant_id),
        event_schedule_id: Set(schedule_id),
        submitted_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    scores.apply(&mut model);
    let created = model.insert(&state.db).await?;
    info!(survey_id = created.id, bucket = created.nps_bucket.label(), "Survey submitted");
    Ok(redirect("/survey"))
}

/// Load a survey and the participant it belongs to, enforcing ownership.
async fn load_owned(
    state: &AppState,
    actor: &Actor,
    id: i32,
) -> AppResult<(survey::Model, participant::Model)> {
    let (survey, participant) = survey::Entity::find_by_id(id)
        .find_also_related(participant::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Survey"))?;
    let participant = participant.ok_or_else(|| AppError::not_found("Participant"))?;
    ensure_can_manage(actor, &participant)?;
    Ok((survey, participant))
}

fn edit_page(
    actor: &Actor,
    id: i32,
    participant: &participant::Model,
    form: SurveyForm,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(render(&SurveyFormTemplate {
        nav: Nav::from(actor),
        heading: format!("Edit survey for {}", participant.full_name()),
        action: format!("/survey/edit/{id}"),
        form,
        editing: true,
        participants: Vec::new(),
        schedules: Vec::new(),
        error,
    })?
    .into_response())
}

#[instrument(skip_all, fields(survey_id = id))]
pub async fn edit_survey_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    let (survey, participant) = load_owned(&state, &actor, id).await?;
    edit_page(&actor, id, &participant, SurveyForm::from_model(&survey), None)
}

/// Update scores; the NPS bucket is recomputed from the new recommendation.
#[instrument(skip_all, fields(survey_id = id))]
pub async fn edit_survey(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
    Form(form): Form<SurveyForm>,
) -> AppResult<Response> {
    trace!("Entering edit_survey handler");
    let (survey, participant) = load_owned(&state, &actor, id).await?;
    let scores = match form.scores() {
        Ok(scores) => scores,
        Err(message) => return edit_page(&actor, id, &participant, form, Some(message)),
    };

    let mut model: survey::ActiveModel = survey.into();
    scores.apply(&mut model);
    let updated = model.update(&state.db).await?;
    info!(bucket = updated.nps_bucket.label(), "Survey updated");
    Ok(redirect("/survey"))
}

#[instrument(skip_all, fields(survey_id = id))]
pub async fn delete_survey(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    load_owned(&state, &actor, id).await?;
    let result = survey::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        warn!("Survey already gone");
    }
    info!("Survey deleted");
    Ok(redirect("/survey"))
}

/// Aggregated survey results for managers.
#[instrument(skip_all)]
pub async fn survey_data(
    State(state): State<AppState>,
    ManagerActor(actor): ManagerActor,
) -> AppResult<Html<String>> {
    let (overall, events, error) = match surveys::records(&state.db, None).await {
        Ok(records) => (
            NpsSummary::from_buckets(records.iter().map(|r| &r.survey.nps_bucket)),
            surveys::event_stats(&records),
            None,
        ),
        Err(e) => {
            error!("Failed to load survey data: {}", e);
            (
                NpsSummary::default(),
                Vec::new(),
                Some("Survey data could not be loaded right now.".to_string()),
            )
        }
    };

    render(&SurveyDataTemplate {
        nav: Nav::from(&actor),
        overall,
        events,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::entities::survey::NpsBucket;

    fn form(recommendation: &str) -> SurveyForm {
        SurveyForm {
            participant_id: "1".to_string(),
            event_schedule_id: "1".to_string(),
            satisfaction_score: "4".to_string(),
            usefulness_score: "5".to_string(),
            instructor_score: "3".to_string(),
            recommendation_score: recommendation.to_string(),
            comments: " ".to_string(),
        }
    }

    #[test]
    fn test_scores_parse_and_bucket() {
        let scores = form("4").scores().unwrap();
        assert_eq!(scores.recommendation, 4);
        assert_eq!(scores.comments, None);
        assert_eq!(classify_nps(scores.recommendation), NpsBucket::Passive);
    }

    #[test]
    fn test_scores_out_of_range() {
        assert_eq!(
            form("11").scores().unwrap_err(),
            "Recommendation score must be between 0 and 10."
        );
        assert_eq!(
            form("ten").scores().unwrap_err(),
            "Recommendation score must be a whole number."
        );
    }
}
