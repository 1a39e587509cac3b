use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .col(string(Users::PasswordHash))
                    .col(string(Users::FirstName))
                    .col(string(Users::LastName))
                    .col(string(Users::Level).string_len(1))
                    .col(boolean(Users::IsParent).default(false))
                    .col(date_time(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Create participants table. `username` is a soft link to users.username
        // and becomes NULL when the account is removed.
        manager
            .create_table(
                Table::create()
                    .table(Participants::Table)
                    .if_not_exists()
                    .col(pk_auto(Participants::Id))
                    .col(string(Participants::FirstName))
                    .col(string(Participants::LastName))
                    .col(string_null(Participants::Email))
                    .col(string_null(Participants::Phone))
                    .col(date_null(Participants::DateOfBirth))
                    .col(string_null(Participants::City))
                    .col(string_null(Participants::State))
                    .col(string_null(Participants::Zip))
                    .col(string_null(Participants::SchoolOrEmployer))
                    .col(string_null(Participants::FieldOfInterest))
                    .col(string_null(Participants::Username))
                    .col(date_time(Participants::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_participants_username")
                    .table(Participants::Table)
                    .col(Participants::Username)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Participants::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    PasswordHash,
    FirstName,
    LastName,
    Level,
    IsParent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Participants {
    Table,
    Id,
    FirstName,
    LastName,
    Email,
    Phone,
    DateOfBirth,
    City,
    State,
    Zip,
    SchoolOrEmployer,
    FieldOfInterest,
    Username,
    CreatedAt,
}
