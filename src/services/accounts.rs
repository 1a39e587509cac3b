use chrono::Utc;
use migration::{EMAIL_LOWER_INDEX, USERNAME_LOWER_INDEX};
use model::entities::{participant, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::schemas::ListQuery;
use crate::services::{lower_eq, violates_unique};
use crate::services::participants::{self, ParticipantInput};

/// Why an account change was refused. Conflicts are shown to the user inline;
/// everything else is an ordinary [`AppError`].
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("The username '{0}' is already taken.")]
    UsernameTaken(String),

    #[error("A participant with the email '{0}' already exists.")]
    EmailTaken(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl From<DbErr> for AccountError {
    fn from(e: DbErr) -> Self {
        AccountError::App(AppError::Database(e))
    }
}

impl AccountError {
    /// Map a failed write to the conflict it reports. A concurrent request can
    /// pass the read-side check, so the database indexes have the last word.
    fn from_write(e: DbErr, username: &str, email: Option<&str>) -> Self {
        if violates_unique(&e, USERNAME_LOWER_INDEX) {
            warn!("Username conflict caught by the database");
            return AccountError::UsernameTaken(username.to_string());
        }
        if violates_unique(&e, EMAIL_LOWER_INDEX) {
            warn!("Email conflict caught by the database");
            return AccountError::EmailTaken(email.unwrap_or_default().to_string());
        }
        e.into()
    }
}

/// A new login account, optionally with the participant profile it owns.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub level: user::UserLevel,
    pub is_parent: bool,
    pub profile: Option<ParticipantInput>,
}

/// Changes to an existing account. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub level: Option<user::UserLevel>,
    pub is_parent: Option<bool>,
}

pub async fn find_by_username<C: ConnectionTrait>(
    conn: &C,
    username: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(lower_eq(user::Column::Username, username))
        .one(conn)
        .await
}

async fn username_taken<C: ConnectionTrait>(
    conn: &C,
    username: &str,
    except_id: Option<i32>,
) -> Result<bool, DbErr> {
    let mut select = user::Entity::find().filter(lower_eq(user::Column::Username, username));
    if let Some(id) = except_id {
        select = select.filter(user::Column::Id.ne(id));
    }
    Ok(select.count(conn).await? > 0)
}

/// Create the user and, when a profile is given, its linked participant in
/// one transaction.
#[instrument(skip(db, account), fields(username = %account.username, is_parent = account.is_parent))]
pub async fn create_account(
    db: &DatabaseConnection,
    account: NewAccount,
) -> Result<user::Model, AccountError> {
    let username = account.username.trim().to_string();
    let password_hash = hash_password(&account.password)?;

    let txn = db.begin().await?;

    if username_taken(&txn, &username, None).await? {
        debug!("Username already exists");
        return Err(AccountError::UsernameTaken(username));
    }
    let email = account.profile.as_ref().and_then(|p| p.email.clone());
    if let Some(email) = email.as_deref() {
        if participants::email_taken(&txn, email, None).await? {
            debug!("Participant email already exists");
            return Err(AccountError::EmailTaken(email.to_string()));
        }
    }

    let created = user::ActiveModel {
        username: Set(username.clone()),
        password_hash: Set(password_hash),
        first_name: Set(account.first_name.trim().to_string()),
        last_name: Set(account.last_name.trim().to_string()),
        level: Set(account.level),
        is_parent: Set(account.is_parent),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| AccountError::from_write(e, &username, None))?;

    if let Some(profile) = account.profile {
        participants::create(&txn, profile, Some(username.clone()))
            .await
            .map_err(|e| AccountError::from_write(e, &username, email.as_deref()))?;
    }

    txn.commit().await?;
    info!(user_id = created.id, "Account created");
    Ok(created)
}

/// Apply `changes` to a user. A rename rewrites every participant linked to
/// the old username inside the same transaction.
#[instrument(skip(db, changes), fields(user_id = user_id))]
pub async fn update_account(
    db: &DatabaseConnection,
    user_id: i32,
    changes: AccountChanges,
) -> Result<user::Model, AccountError> {
    let password_hash = match changes.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let txn = db.begin().await?;

    let existing = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let old_username = existing.username.clone();
    let mut target_username = old_username.clone();
    let mut model: user::ActiveModel = existing.into();

    if let Some(new_username) = changes.username.map(|u| u.trim().to_string()) {
        if new_username != old_username {
            if username_taken(&txn, &new_username, Some(user_id)).await? {
                return Err(AccountError::UsernameTaken(new_username));
            }
            let relinked = participant::Entity::update_many()
                .col_expr(participant::Column::Username, Expr::value(new_username.clone()))
                .filter(participant::Column::Username.eq(old_username.as_str()))
                .exec(&txn)
                .await?;
            info!(
                from = %old_username,
                to = %new_username,
                participants = relinked.rows_affected,
                "Renaming account"
            );
            model.username = Set(new_username.clone());
            target_username = new_username;
        }
    }
    if let Some(first_name) = changes.first_name {
        model.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = changes.last_name {
        model.last_name = Set(last_name.trim().to_string());
    }
    if let Some(hash) = password_hash {
        model.password_hash = Set(hash);
    }
    if let Some(level) = changes.level {
        model.level = Set(level);
    }
    if let Some(is_parent) = changes.is_parent {
        model.is_parent = Set(is_parent);
    }

    let updated = model
        .update(&txn)
        .await
        .map_err(|e| AccountError::from_write(e, &target_username, None))?;
    txn.commit().await?;
    Ok(updated)
}

/// Delete a user after unlinking its participants.
#[instrument(skip(db, user), fields(user_id = user.id, username = %user.username))]
pub async fn delete_account(db: &DatabaseConnection, user: &user::Model) -> Result<(), AppError> {
    let txn = db.begin().await?;

    let unlinked = participant::Entity::update_many()
        .col_expr(participant::Column::Username, Expr::value(Option::<String>::None))
        .filter(participant::Column::Username.eq(user.username.as_str()))
        .exec(&txn)
        .await?;

    let deleted = user::Entity::delete_by_id(user.id).exec(&txn).await?;
    if deleted.rows_affected == 0 {
        warn!("User vanished before it could be deleted");
        return Err(AppError::not_found("User"));
    }

    txn.commit().await?;
    info!(participants = unlinked.rows_affected, "Account deleted");
    Ok(())
}

pub async fn list(
    db: &DatabaseConnection,
    query: &ListQuery,
) -> Result<(Vec<user::Model>, u64), DbErr> {
    let paginator = user::Entity::find()
        .order_by_asc(user::Column::Username)
        .paginate(db, query.limit());
    let pages = paginator.num_pages().await?;
    let rows = paginator.fetch_page(query.page() - 1).await?;
    Ok((rows, pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::setup_test_db;

    fn account(username: &str, profile_email: Option<&str>) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password: "password123".to_string(),
            first_name: "Robin".to_string(),
            last_name: "Hart".to_string(),
            level: user::UserLevel::User,
            is_parent: false,
            profile: profile_email.map(|email| ParticipantInput {
                first_name: "Robin".to_string(),
                last_name: "Hart".to_string(),
                email: Some(email.to_string()),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_username_is_unique_ignoring_case() {
        let db = setup_test_db().await;
        create_account(&db, account("bob", None)).await.unwrap();

        let err = create_account(&db, account("Bob", None)).await.unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken(name) if name == "Bob"));
    }

    #[tokio::test]
    async fn test_database_index_rejects_username_race() {
        let db = setup_test_db().await;
        create_account(&db, account("bob", None)).await.unwrap();

        // An insert that skipped the read-side check, as a concurrent signup would
        let err = user::ActiveModel {
            username: Set("BOB".to_string()),
            password_hash: Set("x".to_string()),
            first_name: Set("Bob".to_string()),
            last_name: Set("Racer".to_string()),
            level: Set(user::UserLevel::User),
            is_parent: Set(false),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();
        assert!(violates_unique(&err, USERNAME_LOWER_INDEX));
        assert!(matches!(
            AccountError::from_write(err, "BOB", None),
            AccountError::UsernameTaken(name) if name == "BOB"
        ));
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_database_index_rejects_email_race() {
        let db = setup_test_db().await;
        let profile = |email: Option<&str>| ParticipantInput {
            first_name: "Dana".to_string(),
            last_name: "Ruiz".to_string(),
            email: email.map(str::to_string),
            ..Default::default()
        };
        participants::create(&db, profile(Some("dana@example.com")), None)
            .await
            .unwrap();

        let err = participants::create(&db, profile(Some("DANA@example.com")), None)
            .await
            .unwrap_err();
        assert!(violates_unique(&err, EMAIL_LOWER_INDEX));
        assert!(matches!(
            AccountError::from_write(err, "dana", Some("DANA@example.com")),
            AccountError::EmailTaken(email) if email == "DANA@example.com"
        ));

        // Participants without an email never collide
        participants::create(&db, profile(None), None).await.unwrap();
        participants::create(&db, profile(None), None).await.unwrap();
        assert_eq!(participant::Entity::find().count(&db).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_student_account_gets_linked_participant() {
        let db = setup_test_db().await;
        create_account(&db, account("robin", Some("robin@example.com")))
            .await
            .unwrap();

        let linked = participant::Entity::find()
            .filter(participant::Column::Username.eq("robin"))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(linked.len(), 1);

        // Email conflicts roll back the whole signup
        let err = create_account(&db, account("robin2", Some("ROBIN@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken(_)));
        assert!(find_by_username(&db, "robin2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_relinks_participants() {
        let db = setup_test_db().await;
        let created = create_account(&db, account("robin", Some("robin@example.com")))
            .await
            .unwrap();

        let changes = AccountChanges {
            username: Some("robin_h".to_string()),
            ..Default::default()
        };
        let updated = update_account(&db, created.id, changes).await.unwrap();
        assert_eq!(updated.username, "robin_h");

        let old = participant::Entity::find()
            .filter(participant::Column::Username.eq("robin"))
            .count(&db)
            .await
            .unwrap();
        let new = participant::Entity::find()
            .filter(participant::Column::Username.eq("robin_h"))
            .count(&db)
            .await
            .unwrap();
        assert_eq!((old, new), (0, 1));
    }

    #[tokio::test]
    async fn test_delete_unlinks_participants() {
        let db = setup_test_db().await;
        let created = create_account(&db, account("robin", Some("robin@example.com")))
            .await
            .unwrap();

        delete_account(&db, &created).await.unwrap();

        let orphans = participant::Entity::find().all(&db).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].username, None);
        assert!(find_by_username(&db, "robin").await.unwrap().is_none());
    }
}
