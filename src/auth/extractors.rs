use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use model::entities::participant;
use policy::{Actor, Role};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect};
use std::convert::Infallible;
use tracing::{debug, error, trace};

use crate::auth::session::{SessionData, read_session_id};
use crate::error::AppError;
use crate::schemas::AppState;
use crate::views::redirect;

/// Session id plus the actor built for the current request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub actor: Actor,
}

/// Ids of participants whose `username` column points at `username`.
pub async fn linked_participant_ids(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Vec<i32>, DbErr> {
    participant::Entity::find()
        .select_only()
        .column(participant::Column::Id)
        .filter(participant::Column::Username.eq(username))
        .into_tuple::<i32>()
        .all(db)
        .await
}

fn actor_from_session(session: SessionData, linked_participant_ids: Vec<i32>) -> Actor {
    Actor {
        user_id: session.user_id,
        username: session.username,
        first_name: session.first_name,
        role: Role::from(session.level),
        is_parent: session.is_parent,
        linked_participant_ids,
    }
}

/// Resolve the session cookie and attach a [`SessionContext`] to the request.
///
/// Requests without a valid session pass through untouched; the extractors
/// below decide what an anonymous request may see.
pub async fn load_actor(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(session_id) = read_session_id(request.headers(), &state.cookie_key) else {
        trace!("No signed session cookie on request");
        return next.run(request).await;
    };

    let Some(session) = state.sessions.get(&session_id).await else {
        debug!("Session cookie refers to an unknown or expired session");
        return next.run(request).await;
    };

    match linked_participant_ids(&state.db, &session.username).await {
        Ok(ids) => {
            let actor = actor_from_session(session, ids);
            trace!(username = %actor.username, "Actor resolved");
            request
                .extensions_mut()
                .insert(SessionContext { session_id, actor });
            next.run(request).await
        }
        Err(e) => {
            error!("Failed to load linked participants: {}", e);
            AppError::from(e).into_response()
        }
    }
}

/// Any visitor; carries the actor when someone is logged in.
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

/// A logged-in user. Anonymous requests are sent to `/login`.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

/// A logged-in manager. Everybody else is sent to `/`.
#[derive(Debug, Clone)]
pub struct ManagerActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| redirect("/login"))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeActor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeActor(
            parts
                .extensions
                .get::<SessionContext>()
                .map(|context| context.actor.clone()),
        ))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<SessionContext>() {
            Some(context) => Ok(CurrentActor(context.actor.clone())),
            None => {
                debug!(path = %parts.uri.path(), "Anonymous request to protected page");
                Err(redirect("/login"))
            }
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ManagerActor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<SessionContext>() {
            Some(context) if context.actor.is_manager() => Ok(ManagerActor(context.actor.clone())),
            _ => {
                debug!(path = %parts.uri.path(), "Non-manager request to manager page");
                Err(redirect("/"))
            }
        }
    }
}
