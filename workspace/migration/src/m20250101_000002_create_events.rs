use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create events table
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(pk_auto(Events::Id))
                    .col(string(Events::Name))
                    .col(string_null(Events::EventType))
                    .col(text_null(Events::Description))
                    .col(integer_null(Events::DefaultCapacity))
                    .to_owned(),
            )
            .await?;

        // Create event_schedules table
        manager
            .create_table(
                Table::create()
                    .table(EventSchedules::Table)
                    .if_not_exists()
                    .col(pk_auto(EventSchedules::Id))
                    .col(integer(EventSchedules::EventId))
                    .col(string(EventSchedules::Location))
                    .col(date_time(EventSchedules::StartTime))
                    .col(date_time(EventSchedules::EndTime))
                    .col(integer_null(EventSchedules::Capacity))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_schedules_event")
                            .from(EventSchedules::Table, EventSchedules::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create registrations table
        manager
            .create_table(
                Table::create()
                    .table(Registrations::Table)
                    .if_not_exists()
                    .col(pk_auto(Registrations::Id))
                    .col(integer(Registrations::ParticipantId))
                    .col(integer(Registrations::EventScheduleId))
                    .col(date_time(Registrations::RegisteredAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_registrations_participant")
                            .from(Registrations::Table, Registrations::ParticipantId)
                            .to(Participants::Table, Participants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_registrations_event_schedule")
                            .from(Registrations::Table, Registrations::EventScheduleId)
                            .to(EventSchedules::Table, EventSchedules::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One registration per participant and schedule
        manager
            .create_index(
                Index::create()
                    .name("idx_registrations_participant_schedule")
                    .table(Registrations::Table)
                    .col(Registrations::ParticipantId)
                    .col(Registrations::EventScheduleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Registrations::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EventSchedules::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Participants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Name,
    EventType,
    Description,
    DefaultCapacity,
}

#[derive(DeriveIden)]
enum EventSchedules {
    Table,
    Id,
    EventId,
    Location,
    StartTime,
    EndTime,
    Capacity,
}

#[derive(DeriveIden)]
enum Registrations {
    Table,
    Id,
    ParticipantId,
    EventScheduleId,
    RegisteredAt,
}
