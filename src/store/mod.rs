// src/store/mod.rs

//! The entity store: durable record of projects, samples, apps, jobs and the
//! dependency edges between them, backed by SQLite.
//!
//! All mutation goes through the operations on [`Store`]; agents never hold
//! shared-mutable entities. Status writes are conditional, so two
//! overlapping runs of the same agent cannot both claim a transition.
//!
//! - [`model`] holds the entity structs and row mapping.
//! - [`schema`] creates the tables.
//! - [`create`] / [`read`] / [`update`] split the operations the way they
//!   are used: provisioning, agent queries, agent writes.

pub mod create;
pub mod model;
pub mod read;
pub mod schema;
pub mod update;

use std::path::Path;

use rusqlite::Connection;

use crate::errors::Result;

pub use model::{
    App, AppInput, AppOutput, DependencyEdge, EdgeTarget, Job, JobConstraints, Project,
    QcDelivery, Sample, SampleRelationship,
};

#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<()> {
        schema::create_tables(&self.conn)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// RFC3339 timestamp for `created` / `last_updated` columns.
pub(crate) fn now_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Whether a rusqlite error is a UNIQUE/CHECK constraint violation, used to
/// translate conflicts into `AlreadyExists` / idempotent returns.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
