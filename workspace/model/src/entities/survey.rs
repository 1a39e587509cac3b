use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Net-promoter classification derived from `recommendation_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum NpsBucket {
    #[sea_orm(string_value = "Promoter")]
    Promoter,
    #[sea_orm(string_value = "Passive")]
    Passive,
    #[sea_orm(string_value = "Detractor")]
    Detractor,
}

impl NpsBucket {
    pub fn label(&self) -> &'static str {
        match self {
            NpsBucket::Promoter => "Promoter",
            NpsBucket::Passive => "Passive",
            NpsBucket::Detractor => "Detractor",
        }
    }
}

/// A post-event survey response.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "surveys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub participant_id: i32,
    pub event_schedule_id: i32,
    pub satisfaction_score: i32,
    pub usefulness_score: i32,
    pub instructor_score: i32,
    pub recommendation_score: i32,
    pub nps_bucket: NpsBucket,
    pub comments: Option<String>,
    pub submitted_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::participant::Entity",
        from = "Column::ParticipantId",
        to = "super::participant::Column::Id",
        on_delete = "Cascade"
    )]
    Participant,
    #[sea_orm(
        belongs_to = "super::event_schedule::Entity",
        from = "Column::EventScheduleId",
        to = "super::event_schedule::Column::Id",
        on_delete = "Cascade"
    )]
    EventSchedule,
}

impl Related<super::participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participant.def()
    }
}

impl Related<super::event_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventSchedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
