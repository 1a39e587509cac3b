use std::collections::{BTreeMap, BTreeSet};

use model::entities::survey::{self, NpsBucket};
use model::entities::{event, event_schedule, participant};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Counts per NPS bucket and the resulting net promoter score
/// (% promoters minus % detractors, rounded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NpsSummary {
    pub promoters: u64,
    pub passives: u64,
    pub detractors: u64,
    pub score: i64,
}

impl NpsSummary {
    pub fn from_buckets<'a>(buckets: impl IntoIterator<Item = &'a NpsBucket>) -> Self {
        let mut summary = NpsSummary::default();
        for bucket in buckets {
            match bucket {
                NpsBucket::Promoter => summary.promoters += 1,
                NpsBucket::Passive => summary.passives += 1,
                NpsBucket::Detractor => summary.detractors += 1,
            }
        }
        let total = summary.total();
        if total > 0 {
            let net = summary.promoters as f64 - summary.detractors as f64;
            summary.score = (net * 100.0 / total as f64).round() as i64;
        }
        summary
    }

    pub fn total(&self) -> u64 {
        self.promoters + self.passives + self.detractors
    }
}

/// Average scores of the surveys submitted for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSurveyStats {
    pub event_name: String,
    pub responses: u64,
    pub satisfaction: f64,
    pub usefulness: f64,
    pub instructor: f64,
    pub recommendation: f64,
    pub nps: NpsSummary,
}

/// A survey with the names needed to display it.
#[derive(Debug, Clone)]
pub struct SurveyRecord {
    pub survey: survey::Model,
    pub participant: Option<participant::Model>,
    pub schedule: Option<event_schedule::Model>,
    pub event_name: String,
}

/// Surveys newest first, limited to `participant_ids` when given.
pub async fn records(
    db: &DatabaseConnection,
    participant_ids: Option<&[i32]>,
) -> Result<Vec<SurveyRecord>, DbErr> {
    let mut select = survey::Entity::find().order_by_desc(survey::Column::SubmittedAt);
    if let Some(ids) = participant_ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        select = select.filter(survey::Column::ParticipantId.is_in(ids.iter().copied()));
    }
    let surveys = select.all(db).await?;

    let participant_ids = distinct_ids(&surveys, |s| s.participant_id);
    let schedule_ids = distinct_ids(&surveys, |s| s.event_schedule_id);

    let participants: BTreeMap<i32, participant::Model> = participant::Entity::find()
        .filter(participant::Column::Id.is_in(participant_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let schedules: BTreeMap<i32, event_schedule::Model> = event_schedule::Entity::find()
        .filter(event_schedule::Column::Id.is_in(schedule_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let event_names = event_names(db).await?;

    Ok(surveys
        .into_iter()
        .map(|survey| {
            let schedule = schedules.get(&survey.event_schedule_id).cloned();
            let event_name = schedule
                .as_ref()
                .and_then(|s| event_names.get(&s.event_id).cloned())
                .unwrap_or_default();
            SurveyRecord {
                participant: participants.get(&survey.participant_id).cloned(),
                schedule,
                event_name,
                survey,
            }
        })
        .collect())
}

/// Each referenced id once, so `IN (..)` lists grow with the number of
/// participants or schedules rather than with the number of surveys.
fn distinct_ids(surveys: &[survey::Model], id: fn(&survey::Model) -> i32) -> BTreeSet<i32> {
    surveys.iter().map(id).collect()
}

pub async fn event_names(db: &DatabaseConnection) -> Result<BTreeMap<i32, String>, DbErr> {
    let rows: Vec<(i32, String)> = event::Entity::find()
        .select_only()
        .column(event::Column::Id)
        .column(event::Column::Name)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Per-event averages, ordered by event name.
pub fn event_stats(records: &[SurveyRecord]) -> Vec<EventSurveyStats> {
    let mut grouped: BTreeMap<&str, Vec<&survey::Model>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.event_name.as_str())
            .or_default()
            .push(&record.survey);
    }

    grouped
        .into_iter()
        .map(|(event_name, surveys)| {
            let n = surveys.len() as f64;
            let avg = |f: fn(&survey::Model) -> i32| {
                let sum: i32 = surveys.iter().map(|s| f(s)).sum();
                (sum as f64 / n * 10.0).round() / 10.0
            };
            EventSurveyStats {
                event_name: event_name.to_string(),
                responses: surveys.len() as u64,
                satisfaction: avg(|s| s.satisfaction_score),
                usefulness: avg(|s| s.usefulness_score),
                instructor: avg(|s| s.instructor_score),
                recommendation: avg(|s| s.recommendation_score),
                nps: NpsSummary::from_buckets(surveys.iter().map(|s| &s.nps_bucket)),
            }
        })
        .collect()
}
