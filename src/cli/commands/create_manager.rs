use anyhow::{Result, bail};
use model::entities::user::UserLevel;
use sea_orm::Database;
use tracing::{error, info};

use crate::services::accounts::{self, AccountError, NewAccount};

/// Bootstrap a manager account so the first login needs no seeded data.
pub async fn create_manager(
    database_url: &str,
    username: String,
    password: String,
    first_name: String,
    last_name: String,
) -> Result<()> {
    if password.chars().count() < 8 {
        bail!("Password must be at least 8 characters.");
    }
    let db = Database::connect(database_url).await?;

    let account = NewAccount {
        username,
        password,
        first_name,
        last_name,
        level: UserLevel::Manager,
        is_parent: false,
        profile: None,
    };
    match accounts::create_account(&db, account).await {
        Ok(created) => {
            info!(user_id = created.id, username = %created.username, "Manager account created");
            Ok(())
        }
        Err(AccountError::App(e)) => {
            error!("Failed to create manager: {}", e);
            Err(e.into())
        }
        Err(conflict) => bail!("{conflict}"),
    }
}
