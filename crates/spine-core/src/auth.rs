//! Authorization mapper (spec.md §4.3): stateless predicates over an
//! authenticated role and a job record, plus token-set resolution.

use std::collections::HashSet;

use crate::domain::{Job, Role, Target};

/// `canAccess(role, job)`.
pub fn can_access(role: Role, job: &Job) -> bool {
    match role {
        Role::Head => true,
        Role::LeftClaw => matches!(job.target, Target::LeftClaw | Target::Any),
        Role::RightClaw => matches!(job.target, Target::RightClaw | Target::Any),
    }
}

/// `isOwnerOrHead(role, job)`.
pub fn is_owner_or_head(role: Role, job: &Job) -> bool {
    match role {
        Role::Head => true,
        other => job.claimed_by.as_deref() == Some(other.canonical_name()),
    }
}

/// Resolves `Authorization: Bearer <token>` tokens to roles against the
/// configured, coalesced token sets. Read-only after startup (spec.md §5).
#[derive(Debug, Clone)]
pub struct TokenRoles {
    head: HashSet<String>,
    left_claw: HashSet<String>,
    right_claw: HashSet<String>,
}

impl TokenRoles {
    pub fn new(
        head: HashSet<String>,
        left_claw: HashSet<String>,
        right_claw: HashSet<String>,
    ) -> Self {
        Self {
            head,
            left_claw,
            right_claw,
        }
    }

    pub fn resolve(&self, token: &str) -> Option<Role> {
        if self.head.contains(token) {
            Some(Role::Head)
        } else if self.left_claw.contains(token) {
            Some(Role::LeftClaw)
        } else if self.right_claw.contains(token) {
            Some(Role::RightClaw)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{now_millis, Status};
    use serde_json::Map;

    fn job(target: Target, claimed_by: Option<&str>) -> Job {
        Job {
            id: "job1".into(),
            target,
            status: Status::Running,
            created_at: now_millis(),
            updated_at: now_millis(),
            created_by: "head".into(),
            claimed_by: claimed_by.map(|s| s.to_string()),
            lease_until: None,
            attempts: 1,
            max_attempts: 3,
            spec: "do stuff".into(),
            meta: Map::new(),
            comments: Vec::new(),
            progress: None,
            result: None,
            error: None,
            release_reason: None,
        }
    }

    #[test]
    fn head_can_access_any_target() {
        assert!(can_access(Role::Head, &job(Target::LeftClaw, None)));
        assert!(can_access(Role::Head, &job(Target::RightClaw, None)));
        assert!(can_access(Role::Head, &job(Target::Any, None)));
    }

    #[test]
    fn claws_are_scoped_by_target() {
        assert!(can_access(Role::LeftClaw, &job(Target::LeftClaw, None)));
        assert!(can_access(Role::LeftClaw, &job(Target::Any, None)));
        assert!(!can_access(Role::LeftClaw, &job(Target::RightClaw, None)));

        assert!(can_access(Role::RightClaw, &job(Target::RightClaw, None)));
        assert!(!can_access(Role::RightClaw, &job(Target::LeftClaw, None)));
    }

    #[test]
    fn ownership_requires_matching_claimant() {
        let j = job(Target::Any, Some("left-claw"));
        assert!(is_owner_or_head(Role::Head, &j));
        assert!(is_owner_or_head(Role::LeftClaw, &j));
        assert!(!is_owner_or_head(Role::RightClaw, &j));
    }

    #[test]
    fn token_resolution_is_disjoint() {
        let roles = TokenRoles::new(
            ["h1".to_string(), "h2".to_string()].into_iter().collect(),
            ["l1".to_string()].into_iter().collect(),
            ["r1".to_string()].into_iter().collect(),
        );
        assert_eq!(roles.resolve("h1"), Some(Role::Head));
        assert_eq!(roles.resolve("h2"), Some(Role::Head));
        assert_eq!(roles.resolve("l1"), Some(Role::LeftClaw));
        assert_eq!(roles.resolve("r1"), Some(Role::RightClaw));
        assert_eq!(roles.resolve("nope"), None);
    }
}
