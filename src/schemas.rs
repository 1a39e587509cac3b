use std::sync::Arc;

use cookie::Key;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::auth::session::SessionStore;
use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Live login sessions
    pub sessions: SessionStore,
    /// Key signing the session cookie
    pub cookie_key: Key,
    /// Configuration the server was started with
    pub config: Arc<AppConfig>,
}

/// `?page=&limit=` accepted by every list page.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u64>,
    /// Free-text filter, used by the participant list
    pub q: Option<String>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: u64 = 50;

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

