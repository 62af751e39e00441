// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error taxonomy (spec.md §7).
//!
//! Individual crates define their own `thiserror` error enums for rich
//! `Display`/`source()` chains; each implements `fn kind(&self) -> ErrorKind`
//! so the orchestrator — the single decision point for error → commit-status
//! mapping (spec.md §7 "propagation policy") — can classify any error it
//! receives without matching on crate-specific variants.

use std::fmt;

/// Machine-classifiable error family, one variant per row of spec.md §7's
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Webhook signature header absent when a secret was configured.
    SignatureMissing,
    /// Webhook signature present but did not match.
    SignatureMismatch,
    /// `X-<forge>-Event` was not `push`.
    UnsupportedEvent,
    /// Request body did not deserialize into the expected payload shape.
    PayloadInvalid,
    /// No token/secret could be resolved where one was required.
    CredentialsMissing,
    /// Archive download or extraction failed at the filesystem/network level.
    SnapshotIo,
    /// Archive had no directory entry and no usable common prefix.
    SnapshotStructure,
    /// Neither `.octorunner.yaml` nor `.octorunner.yml` was present.
    ConfigMissing,
    /// Pipeline file present but empty or unparseable.
    ConfigInvalid,
    /// Image pull failed or its progress stream could not be drained.
    ImagePull,
    /// Container creation failed.
    ContainerCreate,
    /// Container start failed.
    ContainerStart,
    /// Container inspect (post-wait) failed.
    ContainerInspect,
    /// Container removal failed (does not overwrite an earlier error).
    ContainerRemove,
    /// Copying the workspace tree into the container failed.
    Copy,
    /// Log drain encountered an error; never poisons the pipeline exit code.
    LogDrain,
    /// A persistence-layer operation failed.
    Persistence,
    /// Posting a commit status failed; logged, never fatal.
    StatusPost,
}

impl ErrorKind {
    /// Whether this error means "no status can be posted" (spec.md §7's
    /// `CredentialsMissing` and `SignatureMissing`/`SignatureMismatch` rows).
    #[must_use]
    pub fn blocks_status_post(self) -> bool {
        matches!(
            self,
            ErrorKind::CredentialsMissing
                | ErrorKind::SignatureMissing
                | ErrorKind::SignatureMismatch
        )
    }

    /// Whether this error is non-fatal to the running pipeline (spec.md §7:
    /// log drain and status-post errors never abort an in-flight run).
    #[must_use]
    pub fn is_non_fatal(self) -> bool {
        matches!(self, ErrorKind::LogDrain | ErrorKind::StatusPost)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::SignatureMissing => "signature_missing",
            ErrorKind::SignatureMismatch => "signature_mismatch",
            ErrorKind::UnsupportedEvent => "unsupported_event",
            ErrorKind::PayloadInvalid => "payload_invalid",
            ErrorKind::CredentialsMissing => "credentials_missing",
            ErrorKind::SnapshotIo => "snapshot_io",
            ErrorKind::SnapshotStructure => "snapshot_structure",
            ErrorKind::ConfigMissing => "config_missing",
            ErrorKind::ConfigInvalid => "config_invalid",
            ErrorKind::ImagePull => "image_pull",
            ErrorKind::ContainerCreate => "container_create",
            ErrorKind::ContainerStart => "container_start",
            ErrorKind::ContainerInspect => "container_inspect",
            ErrorKind::ContainerRemove => "container_remove",
            ErrorKind::Copy => "copy",
            ErrorKind::LogDrain => "log_drain",
            ErrorKind::Persistence => "persistence",
            ErrorKind::StatusPost => "status_post",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_status_post_only_for_credential_and_signature_errors() {
        assert!(ErrorKind::CredentialsMissing.blocks_status_post());
        assert!(ErrorKind::SignatureMissing.blocks_status_post());
        assert!(ErrorKind::SignatureMismatch.blocks_status_post());
        assert!(!ErrorKind::SnapshotIo.blocks_status_post());
        assert!(!ErrorKind::ContainerCreate.blocks_status_post());
    }

    #[test]
    fn non_fatal_kinds() {
        assert!(ErrorKind::LogDrain.is_non_fatal());
        assert!(ErrorKind::StatusPost.is_non_fatal());
        assert!(!ErrorKind::ConfigMissing.is_non_fatal());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ErrorKind::SnapshotStructure.to_string(), "snapshot_structure");
    }
}
