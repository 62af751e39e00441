// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inbound push-event payload (spec.md §6).
//!
//! Only the fields the core pipeline consumes are modelled; everything else
//! in the real webhook body is ignored by `serde` (no `deny_unknown_fields`).

use serde::{Deserialize, Serialize};

/// The subset of a forge "push" webhook payload octorunner consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// 40-hex commit id the ref now points at, or [`crate::ZERO_COMMIT`]
    /// for a branch delete / no-op merge.
    pub after: String,
    /// Repository the push targeted.
    pub repository: Repository,
}

/// Repository metadata embedded in a [`PushEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository name without owner.
    pub name: String,
    /// `"<owner>/<repo>"`.
    pub full_name: String,
    /// Whether the repository is private (affects archive download auth).
    pub private: bool,
    /// Owner metadata.
    pub owner: RepositoryOwner,
}

/// Owner metadata embedded in a [`Repository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    /// Login/name of the owning user or organization.
    pub name: String,
}

impl PushEvent {
    /// `true` when `after` is the all-zero sentinel commit id (spec.md §4.10).
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.after == crate::ZERO_COMMIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(after: &str) -> PushEvent {
        PushEvent {
            after: after.to_string(),
            repository: Repository {
                name: "proj".into(),
                full_name: "alice/proj".into(),
                private: false,
                owner: RepositoryOwner {
                    name: "alice".into(),
                },
            },
        }
    }

    #[test]
    fn detects_sentinel_commit() {
        assert!(sample(crate::ZERO_COMMIT).is_sentinel());
        assert!(!sample("abc123").is_sentinel());
    }

    #[test]
    fn deserialize_ignores_unknown_fields() {
        let json = r#"{
            "after": "abc123",
            "ref": "refs/heads/main",
            "repository": {
                "name": "proj",
                "full_name": "alice/proj",
                "private": false,
                "owner": { "name": "alice", "id": 42 }
            }
        }"#;
        let event: PushEvent = serde_json::from_str(json).expect("deserialize");
        assert_eq!(event.after, "abc123");
        assert_eq!(event.repository.full_name, "alice/proj");
    }
}
