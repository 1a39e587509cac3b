use std::collections::BTreeSet;

use tracing::{debug, instrument};

/// Rows to insert and delete so that a parent's children registered for one
/// schedule match the submitted selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_add: Vec<i32>,
    pub to_remove: Vec<i32>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diffs the requested selection against current registrations.
///
/// Only ids in `children` are considered, so a forged form cannot touch
/// someone else's participant. Output ids are sorted and deduplicated.
#[instrument(level = "debug")]
pub fn plan_registration_sync(children: &[i32], requested: &[i32], current: &[i32]) -> SyncPlan {
    let children: BTreeSet<i32> = children.iter().copied().collect();
    let requested: BTreeSet<i32> = requested
        .iter()
        .copied()
        .filter(|id| children.contains(id))
        .collect();
    let current: BTreeSet<i32> = current
        .iter()
        .copied()
        .filter(|id| children.contains(id))
        .collect();

    let plan = SyncPlan {
        to_add: requested.difference(&current).copied().collect(),
        to_remove: current.difference(&requested).copied().collect(),
    };
    debug!(?plan, "Planned registration sync");
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_and_removes() {
        let plan = plan_registration_sync(&[1, 2, 3], &[1, 3], &[2, 3]);
        assert_eq!(plan.to_add, vec![1]);
        assert_eq!(plan.to_remove, vec![2]);
    }

    #[test]
    fn test_ignores_foreign_ids() {
        let plan = plan_registration_sync(&[1, 2], &[1, 99], &[50]);
        assert_eq!(plan.to_add, vec![1]);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn test_resubmitting_current_selection_is_noop() {
        let plan = plan_registration_sync(&[1, 2], &[2, 1, 2], &[1, 2]);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_empty_selection_removes_everything() {
        let plan = plan_registration_sync(&[4, 5], &[], &[4, 5]);
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_remove, vec![4, 5]);
    }
}
