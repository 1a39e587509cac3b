use sea_orm_migration::prelude::*;

/// Unique index on `lower(users.username)`.
pub const USERNAME_LOWER_INDEX: &str = "idx_users_username_lower";
/// Unique index on `lower(participants.email)`. NULL emails never collide.
pub const EMAIL_LOWER_INDEX: &str = "idx_participants_email_lower";

#[derive(DeriveMigrationName)]
pub struct Migration;

// Expression indexes are written as SQL: the same statement works on SQLite
// and Postgres.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {USERNAME_LOWER_INDEX} ON users (lower(username))"
        ))
        .await?;
        db.execute_unprepared(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {EMAIL_LOWER_INDEX} ON participants (lower(email))"
        ))
        .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(&format!("DROP INDEX IF EXISTS {EMAIL_LOWER_INDEX}"))
            .await?;
        db.execute_unprepared(&format!("DROP INDEX IF EXISTS {USERNAME_LOWER_INDEX}"))
            .await?;
        Ok(())
    }
}
