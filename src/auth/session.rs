use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, CookieJar, Key, SameSite};
use model::entities::user::{self, UserLevel};
use sha2::{Digest, Sha512};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

/// Server-side session state. The browser only ever sees the session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub first_name: String,
    pub level: UserLevel,
    pub is_parent: bool,
    pub expires_at: DateTime<Utc>,
}

/// In-memory session store shared by every request.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Open a session for `user` and return its id. Abandoned sessions that
    /// have expired are dropped first.
    pub async fn create(&self, user: &user::Model) -> String {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let data = SessionData {
            user_id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            level: user.level,
            is_parent: user.is_parent,
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, data| data.expires_at > now);
        if sessions.len() < before {
            trace!(purged = before - sessions.len(), "Purged expired sessions");
        }
        sessions.insert(id.clone(), data);
        debug!(user_id = user.id, "Session created");
        id
    }

    /// Look up a live session. Expired entries are removed on the way.
    pub async fn get(&self, id: &str) -> Option<SessionData> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(data) if data.expires_at > now => return Some(data.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        trace!("Purging expired session");
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, data| data.expires_at > now);
        None
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Copy the current account fields into every session of that user.
    pub async fn refresh_user(&self, user: &user::Model) {
        let mut sessions = self.sessions.write().await;
        for data in sessions.values_mut().filter(|d| d.user_id == user.id) {
            data.username = user.username.clone();
            data.first_name = user.first_name.clone();
            data.level = user.level;
            data.is_parent = user.is_parent;
        }
    }

    /// Drop every session belonging to `user_id`.
    pub async fn remove_user(&self, user_id: i32) {
        self.sessions
            .write()
            .await
            .retain(|_, data| data.user_id != user_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Stretch any secret into the 64 bytes a signing key needs.
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

fn base_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Signed `Set-Cookie` value carrying the session id.
pub fn session_cookie(key: &Key, session_id: &str) -> String {
    let mut jar = CookieJar::new();
    jar.signed_mut(key).add(base_cookie(session_id.to_string()));
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.to_string())
        .unwrap_or_default()
}

/// `Set-Cookie` value that removes the session cookie.
pub fn removal_cookie() -> String {
    let mut cookie = base_cookie(String::new());
    cookie.make_removal();
    cookie.to_string()
}

/// Extract and verify the session id from request cookies. Unsigned or
/// tampered values yield `None`.
pub fn read_session_id(headers: &HeaderMap, key: &Key) -> Option<String> {
    let mut jar = CookieJar::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for cookie in Cookie::split_parse(raw.to_string()).flatten() {
            jar.add_original(cookie);
        }
    }
    jar.signed(key)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}
