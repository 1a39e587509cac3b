use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Access level stored on each account.
/// The single-letter codes are what the `level` column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(1))")]
pub enum UserLevel {
    #[sea_orm(string_value = "M")]
    Manager,
    #[sea_orm(string_value = "U")]
    User,
}

impl UserLevel {
    /// Single-letter code as stored in the database.
    pub fn code(&self) -> &'static str {
        match self {
            UserLevel::Manager => "M",
            UserLevel::User => "U",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" | "m" => Some(UserLevel::Manager),
            "U" | "u" => Some(UserLevel::User),
            _ => None,
        }
    }
}

/// A login account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Login name. Uniqueness is enforced case-insensitively by the application.
    #[sea_orm(unique)]
    pub username: String,
    /// Argon2 PHC string, never the plaintext password.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub level: UserLevel,
    /// Parents may own several participant records (their children).
    #[sea_orm(default_value = "false")]
    pub is_parent: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
