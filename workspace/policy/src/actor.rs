use model::entities::user::UserLevel;

use crate::error::{PolicyError, Result};

/// Role of an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Manager,
    User,
}

impl Role {
    /// Parses the single-letter level code stored on `users.level`.
    pub fn from_code(code: &str) -> Result<Self> {
        UserLevel::from_code(code)
            .map(Role::from)
            .ok_or_else(|| PolicyError::UnknownLevel(code.to_string()))
    }

    pub fn level(&self) -> UserLevel {
        match self {
            Role::Manager => UserLevel::Manager,
            Role::User => UserLevel::User,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Manager => "Manager",
            Role::User => "User",
        }
    }
}

impl From<UserLevel> for Role {
    fn from(level: UserLevel) -> Self {
        match level {
            UserLevel::Manager => Role::Manager,
            UserLevel::User => Role::User,
        }
    }
}

/// The identity a request acts as.
///
/// Built once per request from the session and the participants currently
/// linked to `username`; handlers read it instead of the raw session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub username: String,
    pub first_name: String,
    pub role: Role,
    pub is_parent: bool,
    pub linked_participant_ids: Vec<i32>,
}

impl Actor {
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    /// True when the actor owns `participant_id` through the username link.
    pub fn is_linked_to(&self, participant_id: i32) -> bool {
        self.linked_participant_ids.contains(&participant_id)
    }

    /// First linked participant, used as the default for single-participant users.
    pub fn primary_participant(&self) -> Option<i32> {
        self.linked_participant_ids.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_code() {
        assert_eq!(Role::from_code("M"), Ok(Role::Manager));
        assert_eq!(Role::from_code("U"), Ok(Role::User));
        assert_eq!(
            Role::from_code("Z"),
            Err(PolicyError::UnknownLevel("Z".to_string()))
        );
    }

    #[test]
    fn test_primary_participant() {
        let actor = Actor {
            user_id: 1,
            username: "kim".to_string(),
            first_name: "Kim".to_string(),
            role: Role::User,
            is_parent: true,
            linked_participant_ids: vec![7, 3],
        };
        assert_eq!(actor.primary_participant(), Some(7));
        assert!(actor.is_linked_to(3));
        assert!(!actor.is_linked_to(4));
        assert!(!actor.is_manager());
    }
}
