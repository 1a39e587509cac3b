//! Business rules of the outreach program that do not touch the database:
//! who may act on which participant, how a parent's registration selection is
//! reconciled against existing rows, and how survey scores are bucketed.

pub mod access;
pub mod actor;
pub mod error;
pub mod nps;
pub mod registration_sync;

pub use access::{can_add_participant, can_manage, ensure_can_manage};
pub use actor::{Actor, Role};
pub use error::{PolicyError, Result};
pub use nps::{classify_nps, validate_score};
pub use registration_sync::{SyncPlan, plan_registration_sync};
