use sea_orm::entity::prelude::*;

/// An event definition. Concrete occurrences live in `event_schedules`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Free-form category, e.g. "Workshop" or "Summit".
    pub event_type: Option<String>,
    pub description: Option<String>,
    pub default_capacity: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_schedule::Entity")]
    EventSchedule,
}

impl Related<super::event_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventSchedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
