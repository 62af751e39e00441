// SPDX-License-Identifier: MIT OR Apache-2.0
//! Container lifecycle (spec.md §4.6 C6) and log streaming (spec.md §4.7 C7).
//!
//! The container Wait and the Log Drain run as sibling `tokio::spawn` tasks
//! rather than a shared polled flag, the same split
//! `abp_host::SidecarClient::run` uses for its stdout-reader task alongside
//! the caller awaiting the run's receipt.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod container;
mod logs;
mod naming;

pub use container::{ContainerExecutor, ExecutionOutcome};
pub use logs::{drain_logs, extract_timestamp};
pub use naming::container_name;

/// Errors raised by container lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Listing or pulling the image failed.
    #[error("image pull failed: {0}")]
    ImagePull(String),
    /// Container creation failed.
    #[error("container create failed: {0}")]
    ContainerCreate(String),
    /// Uploading the workspace tarball into the container failed.
    #[error("workspace copy failed: {0}")]
    Copy(String),
    /// Starting the container failed.
    #[error("container start failed: {0}")]
    ContainerStart(String),
    /// Waiting for or inspecting the terminated container failed.
    #[error("container inspect failed: {0}")]
    ContainerInspect(String),
    /// Removing the container failed; never overwrites an earlier error.
    #[error("container remove failed: {0}")]
    ContainerRemove(String),
    /// The event scope was cancelled mid-execution.
    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Classify this error per spec.md §7.
    #[must_use]
    pub fn kind(&self) -> octorunner_core::ErrorKind {
        use octorunner_core::ErrorKind;
        match self {
            ExecutorError::ImagePull(_) => ErrorKind::ImagePull,
            ExecutorError::ContainerCreate(_) => ErrorKind::ContainerCreate,
            ExecutorError::Copy(_) => ErrorKind::Copy,
            ExecutorError::ContainerStart(_) => ErrorKind::ContainerStart,
            ExecutorError::ContainerInspect(_) => ErrorKind::ContainerInspect,
            ExecutorError::ContainerRemove(_) => ErrorKind::ContainerRemove,
            ExecutorError::Cancelled => ErrorKind::ContainerInspect,
        }
    }
}
