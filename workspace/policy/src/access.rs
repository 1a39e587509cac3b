use model::entities::participant;
use tracing::debug;

use crate::actor::Actor;
use crate::error::{PolicyError, Result};

/// Single ownership gate for every participant-scoped mutation.
///
/// Managers may act on anyone. Everybody else may act only on participants
/// whose `username` column equals their own username, compared exactly.
pub fn can_manage(actor: &Actor, participant: &participant::Model) -> bool {
    actor.is_manager() || participant.username.as_deref() == Some(actor.username.as_str())
}

/// [`can_manage`] as a `Result`, for call sites that propagate with `?`.
pub fn ensure_can_manage(actor: &Actor, participant: &participant::Model) -> Result<()> {
    if can_manage(actor, participant) {
        Ok(())
    } else {
        debug!(
            username = %actor.username,
            participant_id = participant.id,
            "Ownership check failed"
        );
        Err(PolicyError::NotPermitted {
            username: actor.username.clone(),
            participant_id: participant.id,
        })
    }
}

/// Managers and parents may always add participants; other users may add
/// exactly one, their own profile.
pub fn can_add_participant(actor: &Actor) -> bool {
    actor.is_manager() || actor.is_parent || actor.linked_participant_ids.is_empty()
}
