// SPDX-License-Identifier: MIT OR Apache-2.0
//! A job-scoped handle for the log drain (spec.md §3 C7) to append output
//! lines without carrying `job_id` through every call site.

use crate::{Store, StoreError};
use chrono::{DateTime, Utc};

/// Bound to one job; every [`OutputWriter::write_line`] call appends to it.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    store: Store,
    job_id: i64,
}

impl OutputWriter {
    pub(crate) fn new(store: Store, job_id: i64) -> Self {
        Self { store, job_id }
    }

    /// Append one line of output.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying append fails. Callers
    /// (the log drain) treat this as non-fatal to the running pipeline
    /// (spec.md §7 `LogDrain`/`ErrorKind::is_non_fatal`).
    pub async fn write_line(&self, data: &str, timestamp: DateTime<Utc>) -> Result<i64, StoreError> {
        self.store.append_output(self.job_id, data, timestamp).await
    }

    /// The job this writer is bound to.
    #[must_use]
    pub fn job_id(&self) -> i64 {
        self.job_id
    }
}
