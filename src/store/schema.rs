// src/store/schema.rs

//! Table creation for the entity store.

use rusqlite::Connection;

use crate::errors::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    output_path TEXT NOT NULL,
    external_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS samples (
    id         INTEGER PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    created    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sample_relationships (
    id          INTEGER PRIMARY KEY,
    from_sample INTEGER NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
    to_sample   INTEGER NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
    kind        TEXT NOT NULL,
    UNIQUE (from_sample, to_sample, kind)
);

CREATE TABLE IF NOT EXISTS apps (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    external_id TEXT NOT NULL,
    contract    TEXT NOT NULL,
    defaults    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS app_inputs (
    id          INTEGER PRIMARY KEY,
    app_id      INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    is_list     INTEGER NOT NULL,
    description TEXT,
    UNIQUE (app_id, name)
);

CREATE TABLE IF NOT EXISTS app_outputs (
    id          INTEGER PRIMARY KEY,
    app_id      INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    result_name TEXT NOT NULL,
    kind        TEXT NOT NULL,
    path_glob   TEXT NOT NULL,
    UNIQUE (app_id, name)
);

CREATE TABLE IF NOT EXISTS app_qc_delivery (
    id                INTEGER PRIMARY KEY,
    app_id            INTEGER NOT NULL UNIQUE REFERENCES apps(id) ON DELETE CASCADE,
    result_name       TEXT,
    metrics_extension TEXT NOT NULL,
    thresholds        TEXT NOT NULL,
    deliverables      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    id           INTEGER PRIMARY KEY,
    app_id       INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
    project_id   INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    execution_id TEXT,
    status       TEXT NOT NULL,
    details      TEXT NOT NULL DEFAULT '',
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS jobs_status ON jobs(status);

CREATE TABLE IF NOT EXISTS dependency_edges (
    id              INTEGER PRIMARY KEY,
    job_id          INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    parameter       TEXT NOT NULL,
    sample_id       INTEGER REFERENCES samples(id),
    upstream_job_id INTEGER REFERENCES jobs(id),
    output_name     TEXT,
    UNIQUE (job_id, parameter),
    CHECK ((sample_id IS NULL) <> (upstream_job_id IS NULL))
);
"#;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
