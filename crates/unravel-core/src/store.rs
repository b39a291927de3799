//! SQLite-backed snapshot store.
//!
//! Two independently purgeable tables, roster snapshots and post-tree
//! snapshots, each holding JSON documents in insertion order. The store is
//! a sliding two-slot window per table: steady state is one retained
//! snapshot, a poll makes it two, a diff decision collapses it back to one.
//!
//! Runtime defaults follow the usual conservative choices:
//! - `journal_mode = WAL` so a reader can inspect the file mid-run
//! - `busy_timeout = 5s` to reduce transient lock failures

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::{path::Path, time::Duration};
use tracing::warn;

use crate::model::{PostTreeSnapshot, RosterSnapshot};

/// Busy timeout for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ROSTER_TABLE: &str = "roster_snapshots";
const POST_TABLE: &str = "post_snapshots";

const SCHEMA: &str = "\
    CREATE TABLE IF NOT EXISTS roster_snapshots (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        captured_at TEXT NOT NULL,\
        body TEXT NOT NULL\
    );\
    CREATE TABLE IF NOT EXISTS post_snapshots (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        captured_at TEXT NOT NULL,\
        body TEXT NOT NULL\
    );";

/// The two-slot window state of one snapshot table.
#[derive(Debug, Clone, PartialEq)]
pub enum Window<T> {
    /// Nothing stored yet.
    Empty,
    /// One snapshot: keep collecting, compare against the next poll.
    Seeded(T),
    /// Two snapshots, oldest then newest: ready to diff.
    Ready { prev: T, curr: T },
    /// More than two accumulated; recover by purge-and-reseed.
    Overfull(Vec<T>),
}

impl<T> Window<T> {
    fn from_records(mut records: Vec<T>) -> Self {
        match records.len() {
            0 => Self::Empty,
            1 => {
                let only = records.remove(0);
                Self::Seeded(only)
            }
            2 => {
                let curr = records.remove(1);
                let prev = records.remove(0);
                Self::Ready { prev, curr }
            }
            _ => Self::Overfull(records),
        }
    }
}

/// Document store for the two snapshot tables.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) the store at `path`, apply pragmas, and bootstrap
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if opening or configuring the database fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open snapshot store {}", path.display()))?;
        Self::bootstrap(conn)
    }

    /// In-memory store, used by tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if sqlite cannot create the in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory().context("open in-memory snapshot store")?)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        let _journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("set journal_mode")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .context("set busy_timeout")?;
        conn.execute_batch(SCHEMA).context("bootstrap schema")?;
        Ok(Self { conn })
    }

    fn insert_doc<T: Serialize>(&self, table: &str, snapshot: &T) -> Result<()> {
        let body = serde_json::to_string(snapshot).context("serialize snapshot")?;
        self.conn
            .execute(
                &format!("INSERT INTO {table} (captured_at, body) VALUES (?1, ?2)"),
                (Utc::now().to_rfc3339(), body),
            )
            .with_context(|| format!("insert into {table}"))?;
        Ok(())
    }

    fn all_docs<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT body FROM {table} ORDER BY id"))
            .with_context(|| format!("prepare select from {table}"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .with_context(|| format!("select from {table}"))?;

        let mut snapshots = Vec::new();
        for body in rows {
            let body = body.context("read snapshot row")?;
            snapshots.push(serde_json::from_str(&body).context("deserialize snapshot")?);
        }
        Ok(snapshots)
    }

    fn purge_table(&self, table: &str) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM {table}"), [])
            .with_context(|| format!("purge {table}"))?;
        Ok(())
    }

    /// Append a roster snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or sqlite failure.
    pub fn insert_roster(&self, snapshot: &RosterSnapshot) -> Result<()> {
        self.insert_doc(ROSTER_TABLE, snapshot)
    }

    /// All stored roster snapshots, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite or deserialization failure.
    pub fn rosters(&self) -> Result<Vec<RosterSnapshot>> {
        self.all_docs(ROSTER_TABLE)
    }

    /// Delete every roster snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite failure.
    pub fn purge_rosters(&self) -> Result<()> {
        self.purge_table(ROSTER_TABLE)
    }

    /// Append a post-tree snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or sqlite failure.
    pub fn insert_posts(&self, snapshot: &PostTreeSnapshot) -> Result<()> {
        self.insert_doc(POST_TABLE, snapshot)
    }

    /// All stored post-tree snapshots, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite or deserialization failure.
    pub fn post_trees(&self) -> Result<Vec<PostTreeSnapshot>> {
        self.all_docs(POST_TABLE)
    }

    /// Delete every post-tree snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite failure.
    pub fn purge_posts(&self) -> Result<()> {
        self.purge_table(POST_TABLE)
    }

    /// Classify the roster table into its window state, recovering the
    /// overfull case in place.
    ///
    /// More than two roster snapshots means a previous cycle died between
    /// insert and collapse. Recovery purges BOTH tables (a stale post tree
    /// is as misleading as a stale roster) and reseeds only the newest
    /// roster, so the returned window is never [`Window::Overfull`].
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite or (de)serialization failure.
    pub fn settle_rosters(&self) -> Result<Window<RosterSnapshot>> {
        match Window::from_records(self.rosters()?) {
            Window::Overfull(mut records) => {
                warn!(
                    count = records.len(),
                    "more than two roster snapshots; purging both tables and reseeding"
                );
                self.purge_rosters()?;
                self.purge_posts()?;
                let newest = records.pop().context("overfull window has records")?;
                self.insert_roster(&newest)?;
                Ok(Window::Seeded(newest))
            }
            window => Ok(window),
        }
    }

    /// Collapse the roster window to a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite or serialization failure.
    pub fn reseed_rosters(&self, newest: &RosterSnapshot) -> Result<()> {
        self.purge_rosters()?;
        self.insert_roster(newest)
    }

    /// Collapse the post window to a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on sqlite or serialization failure.
    pub fn reseed_posts(&self, newest: &PostTreeSnapshot) -> Result<()> {
        self.purge_posts()?;
        self.insert_posts(newest)
    }
}
