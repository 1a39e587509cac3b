use chrono::NaiveDateTime;
use model::entities::prelude::*;
use model::entities::{event_schedule, survey};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use tracing::{instrument, warn};

use crate::services::donations;
use crate::services::surveys::NpsSummary;

/// Manager dashboard figures. Recomputed on every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub participant_count: u64,
    pub upcoming_schedule_count: u64,
    pub survey_count: u64,
    pub donation_total: Decimal,
    pub nps: NpsSummary,
}

/// Run each aggregate on its own; a failing query contributes zero.
#[instrument(skip(db))]
pub async fn load(db: &DatabaseConnection, now: NaiveDateTime) -> DashboardStats {
    let participant_count = Participant::find().count(db).await.unwrap_or_else(|e| {
        warn!("Participant count failed: {}", e);
        0
    });

    let upcoming_schedule_count = EventSchedule::find()
        .filter(event_schedule::Column::StartTime.gt(now))
        .count(db)
        .await
        .unwrap_or_else(|e| {
            warn!("Upcoming schedule count failed: {}", e);
            0
        });

    let survey_count = Survey::find().count(db).await.unwrap_or_else(|e| {
        warn!("Survey count failed: {}", e);
        0
    });

    let donation_total = donations::total(db).await.unwrap_or_else(|e| {
        warn!("Donation total failed: {}", e);
        Decimal::ZERO
    });

    let nps = match Survey::find()
        .select_only()
        .column(survey::Column::NpsBucket)
        .into_tuple::<survey::NpsBucket>()
        .all(db)
        .await
    {
        Ok(buckets) => NpsSummary::from_buckets(buckets.iter()),
        Err(e) => {
            warn!("NPS distribution failed: {}", e);
            NpsSummary::default()
        }
    };

    DashboardStats {
        participant_count,
        upcoming_schedule_count,
        survey_count,
        donation_total,
        nps,
    }
}
