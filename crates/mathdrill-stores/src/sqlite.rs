//! SQLite-backed attempt history.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC, so text
//! comparison in SQL orders them chronologically.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Params};
use uuid::Uuid;

use mathdrill_core::model::{Attempt, Tier};
use mathdrill_core::traits::{HistoryFilter, HistoryStore};
use mathdrill_core::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attempts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    question_id TEXT NOT NULL,
    expression TEXT NOT NULL,
    submitted_answer REAL NOT NULL,
    correct_answer REAL NOT NULL,
    correct INTEGER NOT NULL,
    tier TEXT NOT NULL,
    time_spent_secs REAL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_user ON attempts(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_attempts_created ON attempts(created_at);
";

const COLUMNS: &str = "id, user_id, question_id, expression, submitted_answer, correct_answer, \
                       correct, tier, time_spent_secs, created_at";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(format!("sqlite: {e}"))
}

/// Columns as stored, before validation.
struct AttemptRow {
    id: String,
    user_id: String,
    question_id: String,
    expression: String,
    submitted_answer: f64,
    correct_answer: f64,
    correct: bool,
    tier: String,
    time_spent_secs: Option<f64>,
    created_at: String,
}

impl AttemptRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            question_id: row.get(2)?,
            expression: row.get(3)?,
            submitted_answer: row.get(4)?,
            correct_answer: row.get(5)?,
            correct: row.get(6)?,
            tier: row.get(7)?,
            time_spent_secs: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_attempt(self) -> Result<Attempt, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Corrupt(format!("attempt id {}: {e}", self.id)))?;
        let tier: Tier = self
            .tier
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("attempt {id}: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Corrupt(format!("attempt {id} timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(Attempt {
            id,
            user_id: self.user_id,
            question_id: self.question_id,
            expression: self.expression,
            submitted_answer: self.submitted_answer,
            correct_answer: self.correct_answer,
            correct: self.correct,
            tier,
            time_spent_secs: self.time_spent_secs,
            created_at,
        })
    }
}

/// Attempt history persisted to a SQLite database file.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(db_error)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory().map_err(db_error)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// A blocking task cannot be cancelled: if the caller stops waiting,
    /// for instance under a store timeout, `f` still runs once the
    /// connection is free, so a write reported as timed out may commit.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("sqlite worker failed: {e}")))?
    }
}

fn collect_attempts<P: Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> Result<Vec<Attempt>, StoreError> {
    let rows = stmt
        .query_map(params, AttemptRow::from_row)
        .map_err(db_error)?;
    let mut attempts = Vec::new();
    for row in rows {
        attempts.push(row.map_err(db_error)?.into_attempt()?);
    }
    Ok(attempts)
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let attempt = attempt.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO attempts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    attempt.id.to_string(),
                    attempt.user_id,
                    attempt.question_id,
                    attempt.expression,
                    attempt.submitted_answer,
                    attempt.correct_answer,
                    attempt.correct,
                    attempt.tier.as_str(),
                    attempt.time_spent_secs,
                    timestamp(attempt.created_at),
                ],
            )
            .map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn scan(&self) -> Result<Vec<Attempt>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM attempts ORDER BY created_at ASC, seq ASC"
                ))
                .map_err(db_error)?;
            collect_attempts(&mut stmt, [])
        })
        .await
    }

    async fn for_user(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<Attempt>, StoreError> {
        let user_id = user_id.to_string();
        let tier = filter.tier.map(|t| t.as_str().to_string());
        let since = filter.since.map(timestamp);
        let until = filter.until.map(timestamp);

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM attempts
                     WHERE user_id = ?1
                       AND (?2 IS NULL OR tier = ?2)
                       AND (?3 IS NULL OR created_at >= ?3)
                       AND (?4 IS NULL OR created_at < ?4)
                     ORDER BY created_at DESC, seq DESC"
                ))
                .map_err(db_error)?;
            collect_attempts(&mut stmt, params![user_id, tier, since, until])
        })
        .await
    }

    async fn distinct_questions(
        &self,
        user_id: &str,
        tier: Option<Tier>,
    ) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        let tier = tier.map(|t| t.as_str().to_string());

        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(DISTINCT question_id) FROM attempts
                     WHERE user_id = ?1 AND (?2 IS NULL OR tier = ?2)",
                    params![user_id, tier],
                    |row| row.get(0),
                )
                .map_err(db_error)?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
