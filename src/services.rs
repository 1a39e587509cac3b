//! Database work that spans more than one statement or is shared between
//! handlers. Multi-step writes run inside a transaction here so handlers
//! never have to.

pub mod accounts;
pub mod dashboard;
pub mod donations;
pub mod participants;
pub mod registrations;
pub mod surveys;

use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{ColumnTrait, DbErr, SqlErr};

/// `lower(column) = lower(value)`
pub fn lower_eq<C: ColumnTrait>(column: C, value: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).eq(value.trim().to_lowercase())
}

/// True when `err` is a unique-constraint violation of the index `index`.
/// Both SQLite and Postgres name the index in the message.
pub fn violates_unique(err: &DbErr, index: &str) -> bool {
    matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(message)) if message.contains(index)
    )
}
