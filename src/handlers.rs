pub mod account;
pub mod auth;
pub mod dashboard;
pub mod donations;
pub mod events;
pub mod health;
pub mod milestones;
pub mod participants;
pub mod public;
pub mod surveys;
pub mod users;
