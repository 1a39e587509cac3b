pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod router;
pub mod schemas;
pub mod services;
pub mod views;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;
