pub use sea_orm_migration::prelude::*;

pub mod entity_iden;
mod m20250101_000001_create_people;
mod m20250101_000002_create_events;
mod m20250101_000003_create_participant_records;
mod m20250201_000001_add_case_insensitive_unique_indexes;

pub use m20250201_000001_add_case_insensitive_unique_indexes::{
    EMAIL_LOWER_INDEX, USERNAME_LOWER_INDEX,
};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_people::Migration),
            Box::new(m20250101_000002_create_events::Migration),
            Box::new(m20250101_000003_create_participant_records::Migration),
            Box::new(m20250201_000001_add_case_insensitive_unique_indexes::Migration),
        ]
    }
}
