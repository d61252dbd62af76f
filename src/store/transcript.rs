//! Transcript persistence.
//!
//! SQLite-backed store for recordings and their ordered utterance rows.
//! Per recording, `position` is 1-based and contiguous, and every
//! multi-row mutation runs inside one transaction, so readers never
//! observe a gap or a duplicate position.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{FileStatus, Recording, Segment, Utterance};

/// Errors from the transcript store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Recording not found: {0}")]
    RecordingNotFound(Uuid),

    #[error("No utterance at position {position} for recording {recording_id}")]
    RowNotFound { recording_id: Uuid, position: i64 },

    #[error("Invalid status transition: {from:?} → {to:?}")]
    InvalidTransition { from: FileStatus, to: FileStatus },

    #[error("Refusing to complete ingestion with an empty utterance batch")]
    EmptyBatch,

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS recordings (
    id            TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    storage_key   TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'READY',
    duration_secs INTEGER,
    created_at    TEXT NOT NULL,
    edited        INTEGER NOT NULL DEFAULT 0,
    edited_at     TEXT
);

CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings (status);

CREATE TABLE IF NOT EXISTS utterances (
    id           TEXT PRIMARY KEY,
    recording_id TEXT NOT NULL REFERENCES recordings (id),
    position     INTEGER NOT NULL,
    start_ms     INTEGER NOT NULL,
    end_ms       INTEGER NOT NULL,
    text         TEXT NOT NULL,
    text_edited  TEXT NOT NULL,
    confidence   REAL NOT NULL,
    speaker      TEXT NOT NULL,
    act_id       INTEGER,
    followup_id  INTEGER,
    created_at   TEXT NOT NULL,
    UNIQUE (recording_id, position)
);
"#;

/// SQLite store for recordings and ordered utterances
pub struct TranscriptStore {
    conn: Mutex<Connection>,
}

impl TranscriptStore {
    /// Open (and create if needed) the store at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // journal_mode returns its new value as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("transcript store mutex poisoned")
    }

    /// Register a new READY recording (the seam for the upload path)
    pub fn insert_recording(
        &self,
        owner_id: &str,
        storage_key: &str,
    ) -> Result<Recording, StoreError> {
        let recording = Recording::new(owner_id, storage_key);

        self.conn().execute(
            "INSERT INTO recordings (id, owner_id, storage_key, status, created_at, edited)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                recording.id.to_string(),
                recording.owner_id,
                recording.storage_key,
                recording.status.as_str(),
                recording.created_at.to_rfc3339(),
            ],
        )?;

        Ok(recording)
    }

    /// Fetch one recording by id
    pub fn get_recording(&self, id: Uuid) -> Result<Recording, StoreError> {
        self.conn()
            .query_row(
                "SELECT id, owner_id, storage_key, status, duration_secs, created_at, edited, edited_at
                 FROM recordings WHERE id = ?1",
                params![id.to_string()],
                recording_from_row,
            )
            .optional()?
            .ok_or(StoreError::RecordingNotFound(id))
    }

    /// All recordings currently in `status`, oldest first.
    ///
    /// This is the scheduler's pickup query: COMPLETED and errored
    /// recordings are excluded by the status filter and never reappear.
    pub fn list_by_status(&self, status: FileStatus) -> Result<Vec<Recording>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, storage_key, status, duration_secs, created_at, edited, edited_at
             FROM recordings WHERE status = ?1 ORDER BY created_at ASC",
        )?;

        let rows = stmt
            .query_map(params![status.as_str()], recording_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Count recordings per status
    pub fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM recordings GROUP BY status")?;

        let mut counts = StatusCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            match status.parse::<FileStatus>() {
                Ok(FileStatus::Ready) => counts.ready = count,
                Ok(FileStatus::ConvertError) => counts.convert_error = count,
                Ok(FileStatus::SttError) => counts.stt_error = count,
                Ok(FileStatus::Completed) => counts.completed = count,
                Err(_) => counts.unknown += count,
            }
        }

        Ok(counts)
    }

    /// Record the transcoded blob's new key and duration
    pub fn update_media(
        &self,
        id: Uuid,
        storage_key: &str,
        duration_secs: u32,
    ) -> Result<(), StoreError> {
        let affected = self.conn().execute(
            "UPDATE recordings SET storage_key = ?1, duration_secs = ?2 WHERE id = ?3",
            params![storage_key, duration_secs, id.to_string()],
        )?;

        if affected == 0 {
            return Err(StoreError::RecordingNotFound(id));
        }
        Ok(())
    }

    /// Move a recording to `to`, enforcing the state machine.
    ///
    /// Only transitions out of READY are accepted; everything else is an
    /// `InvalidTransition`. Operator recovery goes through
    /// [`reset_status`](Self::reset_status) instead.
    pub fn set_status(&self, id: Uuid, to: FileStatus) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let from = status_of(&tx, id)?;
        if !from.can_transition(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        tx.execute(
            "UPDATE recordings SET status = ?1 WHERE id = ?2",
            params![to.as_str(), id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Force a recording's status without transition checking.
    ///
    /// The status field stays externally writable so an operator can move
    /// a recording out of an error state after fixing the cause.
    pub fn reset_status(&self, id: Uuid, to: FileStatus) -> Result<(), StoreError> {
        let affected = self.conn().execute(
            "UPDATE recordings SET status = ?1 WHERE id = ?2",
            params![to.as_str(), id.to_string()],
        )?;

        if affected == 0 {
            return Err(StoreError::RecordingNotFound(id));
        }
        Ok(())
    }

    /// Persist a full utterance batch and mark the recording COMPLETED.
    ///
    /// One transaction covers the batch insert and the status flip, so a
    /// failure at any point leaves the recording READY with zero rows
    /// visible; a partial batch can never be observed.
    pub fn complete_ingestion(
        &self,
        recording_id: Uuid,
        segments: &[Segment],
    ) -> Result<usize, StoreError> {
        if segments.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let from = status_of(&tx, recording_id)?;
        if !from.can_transition(FileStatus::Completed) {
            return Err(StoreError::InvalidTransition {
                from,
                to: FileStatus::Completed,
            });
        }

        let created_at = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO utterances
                   (id, recording_id, position, start_ms, end_ms, text, text_edited,
                    confidence, speaker, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for (index, segment) in segments.iter().enumerate() {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    recording_id.to_string(),
                    (index + 1) as i64,
                    segment.start_ms,
                    segment.end_ms,
                    segment.text,
                    segment.text_edited,
                    segment.confidence,
                    segment.speaker,
                    created_at,
                ])?;
            }
        }

        tx.execute(
            "UPDATE recordings SET status = ?1 WHERE id = ?2",
            params![FileStatus::Completed.as_str(), recording_id.to_string()],
        )?;

        tx.commit()?;
        Ok(segments.len())
    }

    /// A recording's transcript in position order
    pub fn utterances(&self, recording_id: Uuid) -> Result<Vec<Utterance>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, recording_id, position, start_ms, end_ms, text, text_edited,
                    confidence, speaker, act_id, followup_id, created_at
             FROM utterances WHERE recording_id = ?1 ORDER BY position ASC",
        )?;

        let rows = stmt
            .query_map(params![recording_id.to_string()], utterance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Duplicate the row at `position` into `position + 1`, shifting every
    /// later row up by one.
    ///
    /// Runs as one transaction: the shift and the copy commit together or
    /// not at all, so positions stay contiguous for every reader. Returns
    /// the newly created row.
    pub fn insert_at(&self, recording_id: Uuid, position: i64) -> Result<Utterance, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let source =
            utterance_at(&tx, recording_id, position)?.ok_or(StoreError::RowNotFound {
                recording_id,
                position,
            })?;

        // two-pass shift through negative positions; the unique
        // (recording_id, position) index must hold after every statement
        tx.execute(
            "UPDATE utterances SET position = -(position + 1)
             WHERE recording_id = ?1 AND position > ?2",
            params![recording_id.to_string(), position],
        )?;
        tx.execute(
            "UPDATE utterances SET position = -position
             WHERE recording_id = ?1 AND position < 0",
            params![recording_id.to_string()],
        )?;

        let copy = Utterance {
            id: Uuid::new_v4(),
            position: position + 1,
            ..source
        };

        tx.execute(
            "INSERT INTO utterances
               (id, recording_id, position, start_ms, end_ms, text, text_edited,
                confidence, speaker, act_id, followup_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                copy.id.to_string(),
                copy.recording_id.to_string(),
                copy.position,
                copy.start_ms,
                copy.end_ms,
                copy.text,
                copy.text_edited,
                copy.confidence,
                copy.speaker,
                copy.act_id,
                copy.followup_id,
                copy.created_at.to_rfc3339(),
            ],
        )?;

        mark_edited(&tx, recording_id)?;
        tx.commit()?;
        Ok(copy)
    }

    /// Delete the row at `position`, shifting every later row down by one.
    ///
    /// The delete runs before the shift so the decremented rows never
    /// collide with the row being removed. One transaction covers both.
    pub fn delete_at(&self, recording_id: Uuid, position: i64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let affected = tx.execute(
            "DELETE FROM utterances WHERE recording_id = ?1 AND position = ?2",
            params![recording_id.to_string(), position],
        )?;
        if affected == 0 {
            return Err(StoreError::RowNotFound {
                recording_id,
                position,
            });
        }

        tx.execute(
            "UPDATE utterances SET position = -(position - 1)
             WHERE recording_id = ?1 AND position > ?2",
            params![recording_id.to_string(), position],
        )?;
        tx.execute(
            "UPDATE utterances SET position = -position
             WHERE recording_id = ?1 AND position < 0",
            params![recording_id.to_string()],
        )?;

        mark_edited(&tx, recording_id)?;
        tx.commit()?;
        Ok(())
    }
}

/// Recording counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub ready: i64,
    pub convert_error: i64,
    pub stt_error: i64,
    pub completed: i64,
    pub unknown: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.ready + self.convert_error + self.stt_error + self.completed + self.unknown
    }
}

fn status_of(tx: &Transaction<'_>, id: Uuid) -> Result<FileStatus, StoreError> {
    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM recordings WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    let status = status.ok_or(StoreError::RecordingNotFound(id))?;
    parse_status(status, 0).map_err(StoreError::from)
}

fn utterance_at(
    tx: &Transaction<'_>,
    recording_id: Uuid,
    position: i64,
) -> Result<Option<Utterance>, StoreError> {
    let row = tx
        .query_row(
            "SELECT id, recording_id, position, start_ms, end_ms, text, text_edited,
                    confidence, speaker, act_id, followup_id, created_at
             FROM utterances WHERE recording_id = ?1 AND position = ?2",
            params![recording_id.to_string(), position],
            utterance_from_row,
        )
        .optional()?;

    Ok(row)
}

fn mark_edited(tx: &Transaction<'_>, recording_id: Uuid) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE recordings SET edited = 1, edited_at = ?1 WHERE id = ?2",
        params![Utc::now().to_rfc3339(), recording_id.to_string()],
    )?;
    Ok(())
}

fn recording_from_row(row: &Row<'_>) -> rusqlite::Result<Recording> {
    Ok(Recording {
        id: parse_uuid(row.get(0)?, 0)?,
        owner_id: row.get(1)?,
        storage_key: row.get(2)?,
        status: parse_status(row.get(3)?, 3)?,
        duration_secs: row.get(4)?,
        created_at: parse_timestamp(row.get(5)?, 5)?,
        edited: row.get(6)?,
        edited_at: row
            .get::<_, Option<String>>(7)?
            .map(|value| parse_timestamp(value, 7))
            .transpose()?,
    })
}

fn utterance_from_row(row: &Row<'_>) -> rusqlite::Result<Utterance> {
    Ok(Utterance {
        id: parse_uuid(row.get(0)?, 0)?,
        recording_id: parse_uuid(row.get(1)?, 1)?,
        position: row.get(2)?,
        start_ms: row.get(3)?,
        end_ms: row.get(4)?,
        text: row.get(5)?,
        text_edited: row.get(6)?,
        confidence: row.get(7)?,
        speaker: row.get(8)?,
        act_id: row.get(9)?,
        followup_id: row.get(10)?,
        created_at: parse_timestamp(row.get(11)?, 11)?,
    })
}

fn parse_uuid(value: String, column: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_timestamp(value: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_status(value: String, column: usize) -> rusqlite::Result<FileStatus> {
    value
        .parse::<FileStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
