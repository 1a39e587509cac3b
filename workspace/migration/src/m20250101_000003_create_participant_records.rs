use crate::entity_iden::{ColumnIden, EntityIden, TableIden};
use model::entities::prelude::*;
use model::entities::{donation, event_schedule, milestone, participant, survey};
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Cascading foreign key from `table.column` to `participants.id`.
fn participant_fk(name: &str, table: TableIden, column: ColumnIden) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to(
            Participant::table(),
            Participant::column(participant::Column::Id),
        )
        .on_delete(ForeignKeyAction::Cascade)
        .on_update(ForeignKeyAction::Cascade)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create surveys table
        manager
            .create_table(
                Table::create()
                    .table(Survey::table())
                    .if_not_exists()
                    .col(pk_auto(Survey::column(survey::Column::Id)))
                    .col(integer(Survey::column(survey::Column::ParticipantId)))
                    .col(integer(Survey::column(survey::Column::EventScheduleId)))
                    .col(integer(Survey::column(survey::Column::SatisfactionScore)))
                    .col(integer(Survey::column(survey::Column::UsefulnessScore)))
                    .col(integer(Survey::column(survey::Column::InstructorScore)))
                    .col(integer(Survey::column(survey::Column::RecommendationScore)))
                    .col(string(Survey::column(survey::Column::NpsBucket)).string_len(16))
                    .col(text_null(Survey::column(survey::Column::Comments)))
                    .col(date_time(Survey::column(survey::Column::SubmittedAt)))
                    .foreign_key(&mut participant_fk(
                        "fk_surveys_participant",
                        Survey::table(),
                        Survey::column(survey::Column::ParticipantId),
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_surveys_event_schedule")
                            .from(
                                Survey::table(),
                                Survey::column(survey::Column::EventScheduleId),
                            )
                            .to(
                                EventSchedule::table(),
                                EventSchedule::column(event_schedule::Column::Id),
                            )
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create donations table
        manager
            .create_table(
                Table::create()
                    .table(Donation::table())
                    .if_not_exists()
                    .col(pk_auto(Donation::column(donation::Column::Id)))
                    .col(integer(Donation::column(donation::Column::ParticipantId)))
                    .col(
                        decimal(Donation::column(donation::Column::Amount)).decimal_len(16, 4),
                    )
                    .col(date(Donation::column(donation::Column::DonationDate)))
                    .col(string_null(Donation::column(donation::Column::Note)))
                    .foreign_key(&mut participant_fk(
                        "fk_donations_participant",
                        Donation::table(),
                        Donation::column(donation::Column::ParticipantId),
                    ))
                    .to_owned(),
            )
            .await?;

        // Create milestones table
        manager
            .create_table(
                Table::create()
                    .table(Milestone::table())
                    .if_not_exists()
                    .col(pk_auto(Milestone::column(milestone::Column::Id)))
                    .col(integer(Milestone::column(milestone::Column::ParticipantId)))
                    .col(string(Milestone::column(milestone::Column::Title)))
                    .col(date(Milestone::column(milestone::Column::MilestoneDate)))
                    .col(text_null(Milestone::column(milestone::Column::Notes)))
                    .foreign_key(&mut participant_fk(
                        "fk_milestones_participant",
                        Milestone::table(),
                        Milestone::column(milestone::Column::ParticipantId),
                    ))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Milestone::table()).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Donation::table()).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Survey::table()).to_owned())
            .await?;

        Ok(())
    }
}
