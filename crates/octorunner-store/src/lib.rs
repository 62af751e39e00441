// SPDX-License-Identifier: MIT OR Apache-2.0
//! Embedded relational persistence layer (spec.md §3 C3).
//!
//! Backs the `Project -> Job -> OutputLine` data model with a single SQLite
//! file opened through `rusqlite`. `rusqlite::Connection` is `!Sync`, so
//! every call goes through a shared `Mutex` and `spawn_blocking`, the same
//! shape `abp_runtime::store::ReceiptStore` uses to keep a blocking I/O
//! backend off the async executor.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod schema;
mod writer;

pub use writer::OutputWriter;

use chrono::{DateTime, Utc};
use octorunner_core::{Job, JobStatus, OutputLine, Project};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Errors raised by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying SQLite connection failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A write referenced a project or job that does not exist.
    #[error("referenced {entity} {id} does not exist")]
    DanglingReference {
        /// `"project"` or `"job"`.
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },
    /// The blocking task running the query panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// All store errors classify as [`octorunner_core::ErrorKind::Persistence`].
    #[must_use]
    pub fn kind(&self) -> octorunner_core::ErrorKind {
        octorunner_core::ErrorKind::Persistence
    }
}

/// Handle to the embedded database. Cheap to clone; clones share one
/// connection guarded by a mutex.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if absent) the database at `path` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::info!(path = %path.display(), "opened octorunner database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database. Used by tests and anywhere durability
    /// across restarts is not required.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Find the project `(name, owner)`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] on a database error or
    /// [`StoreError::Join`] if the blocking task fails.
    pub async fn find_or_create_project(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<Project, StoreError> {
        let conn = Arc::clone(&self.conn);
        let name = name.to_string();
        let owner = owner.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("store mutex poisoned");
            find_or_create_project_sync(&mut conn, &name, &owner)
        })
        .await?
    }

    /// Allocate the next iteration of `(project_id, commit_id, job_name)`
    /// and insert a `running` job row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DanglingReference`] if `project_id` does not
    /// exist, or [`StoreError::Sqlite`]/[`StoreError::Join`] otherwise.
    pub async fn create_job(
        &self,
        project_id: i64,
        commit_id: &str,
        job_name: &str,
    ) -> Result<Job, StoreError> {
        let conn = Arc::clone(&self.conn);
        let commit_id = commit_id.to_string();
        let job_name = job_name.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("store mutex poisoned");
            create_job_sync(&mut conn, project_id, &commit_id, &job_name)
        })
        .await?
    }

    /// Transition a job to a terminal status, recording `extra` text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DanglingReference`] if `job_id` does not exist,
    /// or [`StoreError::Sqlite`]/[`StoreError::Join`] otherwise.
    pub async fn update_job_status(
        &self,
        job_id: i64,
        status: JobStatus,
        extra: &str,
    ) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        let extra = extra.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("store mutex poisoned");
            update_job_status_sync(&mut conn, job_id, status, &extra)
        })
        .await?
    }

    /// Append one output line for `job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DanglingReference`] if `job_id` does not exist,
    /// or [`StoreError::Sqlite`]/[`StoreError::Join`] otherwise.
    pub async fn append_output(
        &self,
        job_id: i64,
        data: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let conn = Arc::clone(&self.conn);
        let data = data.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("store mutex poisoned");
            append_output_sync(&mut conn, job_id, &data, timestamp)
        })
        .await?
    }

    /// Build a writer bound to one job, for handing to the log drain so it
    /// doesn't need to thread `job_id` through every call.
    #[must_use]
    pub fn make_output_writer(&self, job_id: i64) -> OutputWriter {
        OutputWriter::new(self.clone(), job_id)
    }

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`]/[`StoreError::Join`] on failure.
    pub async fn get_job(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("store mutex poisoned");
            get_job_sync(&conn, job_id)
        })
        .await?
    }

    /// List all jobs for a project, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`]/[`StoreError::Join`] on failure.
    pub async fn list_jobs_for_project(&self, project_id: i64) -> Result<Vec<Job>, StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("store mutex poisoned");
            list_jobs_for_project_sync(&conn, project_id)
        })
        .await?
    }

    /// List output lines for a job, in ingest (`id`) order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`]/[`StoreError::Join`] on failure.
    pub async fn list_output_for_job(&self, job_id: i64) -> Result<Vec<OutputLine>, StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("store mutex poisoned");
            list_output_for_job_sync(&conn, job_id)
        })
        .await?
    }
}

fn find_or_create_project_sync(
    conn: &mut Connection,
    name: &str,
    owner: &str,
) -> Result<Project, StoreError> {
    let tx = conn.transaction()?;

    let existing = tx
        .query_row(
            "SELECT id, name, owner FROM projects WHERE name = ?1 AND owner = ?2",
            params![name, owner],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    owner: row.get(2)?,
                })
            },
        )
        .optional()?;

    let project = if let Some(project) = existing {
        project
    } else {
        tx.execute(
            "INSERT INTO projects (name, owner) VALUES (?1, ?2)",
            params![name, owner],
        )?;
        Project {
            id: tx.last_insert_rowid(),
            name: name.to_string(),
            owner: owner.to_string(),
        }
    };

    tx.commit()?;
    Ok(project)
}

fn create_job_sync(
    conn: &mut Connection,
    project_id: i64,
    commit_id: &str,
    job_name: &str,
) -> Result<Job, StoreError> {
    let tx = conn.transaction()?;

    let project_exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
        params![project_id],
        |row| row.get(0),
    )?;
    if !project_exists {
        return Err(StoreError::DanglingReference {
            entity: "project",
            id: project_id,
        });
    }

    let next_iteration: i64 = tx.query_row(
        "SELECT COALESCE(MAX(iteration), 0) + 1 FROM jobs
         WHERE project_id = ?1 AND commit_id = ?2 AND job_name = ?3",
        params![project_id, commit_id, job_name],
        |row| row.get(0),
    )?;

    let created_at = Utc::now();
    tx.execute(
        "INSERT INTO jobs (project_id, commit_id, job_name, iteration, status, extra, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            project_id,
            commit_id,
            job_name,
            next_iteration,
            JobStatus::Running.to_string_key(),
            "",
            created_at.to_rfc3339(),
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(Job {
        id,
        project_id,
        commit_id: commit_id.to_string(),
        job_name: job_name.to_string(),
        iteration: next_iteration,
        status: JobStatus::Running,
        extra: String::new(),
        created_at,
    })
}

fn update_job_status_sync(
    conn: &mut Connection,
    job_id: i64,
    status: JobStatus,
    extra: &str,
) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE jobs SET status = ?1, extra = ?2 WHERE id = ?3",
        params![status.to_string_key(), extra, job_id],
    )?;
    if updated == 0 {
        return Err(StoreError::DanglingReference {
            entity: "job",
            id: job_id,
        });
    }
    tx.commit()?;
    Ok(())
}

fn append_output_sync(
    conn: &mut Connection,
    job_id: i64,
    data: &str,
    timestamp: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let tx = conn.transaction()?;

    let job_exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1)",
        params![job_id],
        |row| row.get(0),
    )?;
    if !job_exists {
        return Err(StoreError::DanglingReference {
            entity: "job",
            id: job_id,
        });
    }

    tx.execute(
        "INSERT INTO output (job_id, data, timestamp) VALUES (?1, ?2, ?3)",
        params![job_id, data, timestamp.to_rfc3339()],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

fn get_job_sync(conn: &Connection, job_id: i64) -> Result<Option<Job>, StoreError> {
    conn.query_row(
        "SELECT id, project_id, commit_id, job_name, iteration, status, extra, created_at
         FROM jobs WHERE id = ?1",
        params![job_id],
        row_to_job,
    )
    .optional()
    .map_err(StoreError::from)
}

fn list_jobs_for_project_sync(conn: &Connection, project_id: i64) -> Result<Vec<Job>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, commit_id, job_name, iteration, status, extra, created_at
         FROM jobs WHERE project_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let jobs = stmt
        .query_map(params![project_id], row_to_job)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(jobs)
}

fn list_output_for_job_sync(conn: &Connection, job_id: i64) -> Result<Vec<OutputLine>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, job_id, data, timestamp FROM output WHERE job_id = ?1 ORDER BY id ASC",
    )?;
    let lines = stmt
        .query_map(params![job_id], |row| {
            let timestamp: String = row.get(3)?;
            Ok(OutputLine {
                id: row.get(0)?,
                job_id: row.get(1)?,
                data: row.get(2)?,
                timestamp: parse_rfc3339(&timestamp),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(Job {
        id: row.get(0)?,
        project_id: row.get(1)?,
        commit_id: row.get(2)?,
        job_name: row.get(3)?,
        iteration: row.get(4)?,
        status: status_from_key(&status),
        extra: row.get(6)?,
        created_at: parse_rfc3339(&created_at),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

trait JobStatusKey {
    fn to_string_key(self) -> &'static str;
}

impl JobStatusKey for JobStatus {
    fn to_string_key(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

fn status_from_key(key: &str) -> JobStatus {
    match key {
        "done" => JobStatus::Done,
        "error" => JobStatus::Error,
        _ => JobStatus::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn project_is_created_once_and_reused() {
        let store = Store::open_in_memory().expect("open");
        let first = store
            .find_or_create_project("proj", "alice")
            .await
            .expect("create");
        let second = store
            .find_or_create_project("proj", "alice")
            .await
            .expect("find");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn job_iteration_increments_per_triple() {
        let store = Store::open_in_memory().expect("open");
        let project = store
            .find_or_create_project("proj", "alice")
            .await
            .expect("create");
        let first = store
            .create_job(project.id, "abc123", "default")
            .await
            .expect("job 1");
        let second = store
            .create_job(project.id, "abc123", "default")
            .await
            .expect("job 2");
        assert_eq!(first.iteration, 1);
        assert_eq!(second.iteration, 2);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn create_job_fails_for_unknown_project() {
        let store = Store::open_in_memory().expect("open");
        let err = store
            .create_job(999, "abc123", "default")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingReference { entity: "project", id: 999 }));
    }

    #[tokio::test]
    async fn update_status_and_append_output_round_trip() {
        let store = Store::open_in_memory().expect("open");
        let project = store
            .find_or_create_project("proj", "alice")
            .await
            .expect("create");
        let job = store
            .create_job(project.id, "abc123", "default")
            .await
            .expect("job");

        store
            .append_output(job.id, "line one", Utc::now())
            .await
            .expect("append");
        store
            .append_output(job.id, "line two", Utc::now())
            .await
            .expect("append");
        store
            .update_job_status(job.id, JobStatus::Done, "")
            .await
            .expect("update");

        let reloaded = store.get_job(job.id).await.expect("get").expect("present");
        assert_eq!(reloaded.status, JobStatus::Done);

        let lines = store.list_output_for_job(job.id).await.expect("list");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].data, "line one");
        assert_eq!(lines[1].data, "line two");
    }

    #[tokio::test]
    async fn append_output_fails_for_unknown_job() {
        let store = Store::open_in_memory().expect("open");
        let err = store
            .append_output(999, "data", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingReference { entity: "job", id: 999 }));
    }

    proptest! {
        /// Monotonicity (spec.md §8): for an arbitrary sequence of job
        /// names created against one project/commit, each name's own
        /// iteration counter strictly increases by one per call and never
        /// collides with another name's counter.
        #[test]
        fn iteration_is_monotonic_for_arbitrary_job_name_sequences(
            job_names in proptest::collection::vec("[a-z]{1,6}", 1..12)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("rt");
            let observed: Vec<(String, i64)> = rt.block_on(async {
                let store = Store::open_in_memory().expect("open");
                let project = store
                    .find_or_create_project("proj", "alice")
                    .await
                    .expect("create");
                let mut observed = Vec::with_capacity(job_names.len());
                for name in &job_names {
                    let job = store
                        .create_job(project.id, "abc123", name)
                        .await
                        .expect("job");
                    observed.push((name.clone(), job.iteration));
                }
                observed
            });

            let mut expected: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
            for (name, iteration) in observed {
                let counter = expected.entry(name).or_insert(0);
                *counter += 1;
                prop_assert_eq!(iteration, *counter);
            }
        }
    }
}
