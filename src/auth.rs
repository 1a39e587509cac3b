//! Login sessions, password hashing and the request-scoped [`policy::Actor`].

pub mod extractors;
pub mod password;
pub mod session;

pub use extractors::{CurrentActor, ManagerActor, MaybeActor, SessionContext, load_actor};
