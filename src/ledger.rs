use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::identity::EventIdentity;
use crate::utils;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("cannot create ledger directory for {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot open ledger at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("ledger query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// A delivered `(event, subscriber)` pair. Written once, never updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub event_hash: String,
    pub subscriber: String,
    pub sent_at: NaiveDateTime,
}

/// Durable record of what each subscriber has already received.
///
/// Holds only the database path: every operation opens its own short-lived
/// connection, so overlapping manual runs never share a handle. Entries are
/// kept forever; old events simply stop being produced.
#[derive(Clone, Debug)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        utils::ensure_parent(&path).map_err(|source| LedgerError::Directory {
            path: path.clone(),
            source,
        })?;

        let ledger = Self { path };
        ledger.connect()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS sent_events(
                event_hash TEXT NOT NULL,
                subscriber TEXT NOT NULL,
                sent_at    TEXT NOT NULL,
                PRIMARY KEY (event_hash, subscriber)
            );",
        )?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, LedgerError> {
        let conn = Connection::open(&self.path).map_err(|source| LedgerError::Open {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    pub fn has_been_sent(
        &self,
        identity: &EventIdentity,
        subscriber: &str,
    ) -> Result<bool, LedgerError> {
        let found = self
            .connect()?
            .query_row(
                "SELECT 1 FROM sent_events WHERE event_hash = ?1 AND subscriber = ?2",
                params![identity.as_str(), subscriber],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Idempotent: recording a pair that is already present keeps the
    /// original `sent_at` and returns `false`.
    pub fn record_sent(
        &self,
        identity: &EventIdentity,
        subscriber: &str,
    ) -> Result<bool, LedgerError> {
        let inserted = self.connect()?.execute(
            "INSERT OR IGNORE INTO sent_events (event_hash, subscriber, sent_at)
             VALUES (?1, ?2, ?3)",
            params![identity.as_str(), subscriber, Local::now().naive_local()],
        )?;
        Ok(inserted > 0)
    }

    pub fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT event_hash, subscriber, sent_at FROM sent_events
             ORDER BY sent_at, subscriber, event_hash",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LedgerEntry {
                event_hash: row.get(0)?,
                subscriber: row.get(1)?,
                sent_at: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize, LedgerError> {
        let count: i64 =
            self.connect()?
                .query_row("SELECT COUNT(*) FROM sent_events", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }
}
