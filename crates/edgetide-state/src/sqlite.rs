//! `SQLite`-backed implementation of [`StateBackend`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use edgetide_types::{PipelineId, PipelineState, PipelineStatus, SourceOffset};
use rusqlite::{Connection, OptionalExtension};

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// Idempotent DDL for state tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS pipeline_state (
    pipeline TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    time_stamp TEXT NOT NULL,
    attributes TEXT NOT NULL DEFAULT '{}',
    worker_infos TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS source_offsets (
    pipeline TEXT PRIMARY KEY,
    source_offset TEXT,
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteStateBackend::open`] for file-backed persistence
/// or [`SqliteStateBackend::in_memory`] for tests.
pub struct SqliteStateBackend {
    conn: Mutex<Connection>,
}

impl SqliteStateBackend {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created, or
    /// [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` backend (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl StateBackend for SqliteStateBackend {
    fn load_pipeline_state(&self, pipeline: &PipelineId) -> error::Result<Option<PipelineState>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT status, message, time_stamp, attributes, worker_infos \
                 FROM pipeline_state WHERE pipeline = ?1",
                [pipeline.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, message, time_stamp, attributes, worker_infos)) = row else {
            return Ok(None);
        };
        let status = PipelineStatus::parse(&status)
            .ok_or_else(|| StateError::Corrupt(format!("unknown pipeline status '{status}'")))?;
        let time_stamp = DateTime::parse_from_rfc3339(&time_stamp)
            .map_err(|e| StateError::Corrupt(format!("bad time_stamp '{time_stamp}': {e}")))?
            .with_timezone(&Utc);
        Ok(Some(PipelineState {
            pipeline_id: pipeline.clone(),
            status,
            message,
            time_stamp,
            attributes: serde_json::from_str(&attributes)?,
            worker_infos: serde_json::from_str(&worker_infos)?,
        }))
    }

    fn save_pipeline_state(&self, state: &PipelineState) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO pipeline_state (pipeline, status, message, time_stamp, attributes, worker_infos) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(pipeline) DO UPDATE SET \
                 status = excluded.status, \
                 message = excluded.message, \
                 time_stamp = excluded.time_stamp, \
                 attributes = excluded.attributes, \
                 worker_infos = excluded.worker_infos",
            rusqlite::params![
                state.pipeline_id.as_str(),
                state.status.as_str(),
                state.message,
                state.time_stamp.to_rfc3339(),
                serde_json::to_string(&state.attributes)?,
                serde_json::to_string(&state.worker_infos)?,
            ],
        )?;
        Ok(())
    }

    fn get_offset(&self, pipeline: &PipelineId) -> error::Result<Option<SourceOffset>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT source_offset, version FROM source_offsets WHERE pipeline = ?1",
                [pipeline.as_str()],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, u32>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(offset, version)| SourceOffset { offset, version }))
    }

    fn set_offset(&self, pipeline: &PipelineId, offset: &SourceOffset) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO source_offsets (pipeline, source_offset, version, updated_at) \
             VALUES (?1, ?2, ?3, datetime('now')) \
             ON CONFLICT(pipeline) DO UPDATE SET \
                 source_offset = excluded.source_offset, \
                 version = excluded.version, \
                 updated_at = excluded.updated_at",
            rusqlite::params![pipeline.as_str(), offset.offset, offset.version],
        )?;
        Ok(())
    }
}
