use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Links a participant to a scheduled event occurrence.
/// `(participant_id, event_schedule_id)` carries a unique index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "registrations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub participant_id: i32,
    pub event_schedule_id: i32,
    pub registered_at: NaiveDateTime,
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
