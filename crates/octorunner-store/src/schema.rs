// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema creation (spec.md §3's `Projects`/`Jobs`/`Output` tables, ported
//! from the reference `CREATE TABLE`/`CREATE UNIQUE INDEX` statements to
//! SQLite column types and foreign keys).

use rusqlite::Connection;

pub(crate) fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS projects (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL,
            owner TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS projects_name_owner
            ON projects (name, owner);

        CREATE TABLE IF NOT EXISTS jobs (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL REFERENCES projects (id),
            commit_id  TEXT NOT NULL,
            job_name   TEXT NOT NULL,
            iteration  INTEGER NOT NULL,
            status     TEXT NOT NULL,
            extra      TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS jobs_project_commit_job_iteration
            ON jobs (project_id, commit_id, job_name, iteration);

        CREATE TABLE IF NOT EXISTS output (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id    INTEGER NOT NULL REFERENCES jobs (id),
            data      TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS output_job_id ON output (job_id);
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        initialize(&conn).expect("first");
        initialize(&conn).expect("second");
    }
}
