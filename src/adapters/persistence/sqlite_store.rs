//! SQLite-backed query surface via libsql. Implements ExerciseStore.
//!
//! One database file (data/exercises.db) with two tables: `exercises` and
//! `daily_progress`. No foreign key between them; `exercise_id` is a logical reference.
//! Enum columns hold their stored names. Timestamps are Unix epoch milliseconds.

use crate::domain::{
    DailyProgress, DayBoundary, DomainError, Exercise, ExerciseFilter, UNASSIGNED_ID,
};
use crate::ports::{ExerciseStore, StoreChange};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, Rows, Value, params};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Bumped on any schema change. A mismatch drops and recreates every table.
pub const SCHEMA_VERSION: i64 = 1;

const DB_FILE_NAME: &str = "exercises.db";

/// Buffered change notifications per subscriber before it lags (and re-queries).
const CHANGE_CHANNEL_CAPACITY: usize = 64;

const EXERCISES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS exercises (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    instructions TEXT NOT NULL DEFAULT '',
    video_file_name TEXT NOT NULL,
    thumbnail_file_name TEXT,
    category TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL,
    repetitions INTEGER NOT NULL,
    sets INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    last_completed_at INTEGER,
    completion_count INTEGER NOT NULL DEFAULT 0,
    favorite INTEGER NOT NULL DEFAULT 0,
    equipment_needed TEXT,
    precautions TEXT,
    order_index INTEGER NOT NULL DEFAULT 0
)"#;
const EXERCISES_ORDER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_exercises_order ON exercises (order_index, id)";

/// Append-only completion log.
const PROGRESS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exercise_id INTEGER NOT NULL,
    completed_at INTEGER NOT NULL,
    sets_completed INTEGER NOT NULL,
    repetitions_completed INTEGER NOT NULL,
    notes TEXT
)"#;
const PROGRESS_EXERCISE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_progress_exercise ON daily_progress (exercise_id, completed_at DESC)";
const PROGRESS_DATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_progress_date ON daily_progress (completed_at)";

const EXERCISE_COLUMNS: &str = "id, title, description, instructions, video_file_name, \
     thumbnail_file_name, category, difficulty, duration_seconds, repetitions, sets, completed, \
     last_completed_at, completion_count, favorite, equipment_needed, precautions, order_index";

const PROGRESS_COLUMNS: &str =
    "id, exercise_id, completed_at, sets_completed, repetitions_completed, notes";

const UPSERT_EXERCISE: &str = r#"
INSERT OR REPLACE INTO exercises (
    id, title, description, instructions, video_file_name, thumbnail_file_name, category,
    difficulty, duration_seconds, repetitions, sets, completed, last_completed_at,
    completion_count, favorite, equipment_needed, precautions, order_index
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
"#;

const STREAK_DAYS_LOCAL: &str = "SELECT COUNT(DISTINCT DATE(completed_at / 1000, 'unixepoch', 'localtime')) \
     FROM daily_progress WHERE completed_at >= ?1";
const STREAK_DAYS_UTC: &str = "SELECT COUNT(DISTINCT DATE(completed_at / 1000, 'unixepoch')) \
     FROM daily_progress WHERE completed_at >= ?1";

fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Storage(e.to_string())
}

/// SQLite store. One database file (exercises.db) in the given base directory.
/// Construct once at startup and share via Arc; there is no global instance.
pub struct SqliteStore {
    db: Database,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Connect to (or create) the database and bring the schema to `SCHEMA_VERSION`.
    ///
    /// Sets WAL mode so readers (change feeds) do not block the writer.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join(DB_FILE_NAME);
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA journal_mode returns a row; consume it via query (execute rejects rows).
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Storage(format!("WAL pragma failed: {}", e)))?;
        while wal_rows.next().await.map_err(repo_err)?.is_some() {}

        Self::migrate(&conn).await?;

        info!(
            path = %db_path.display(),
            schema_version = SCHEMA_VERSION,
            "SQLite store connected"
        );

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { db, changes })
    }

    /// Destructive migration: any stored version other than ours wipes both tables.
    async fn migrate(conn: &Connection) -> Result<(), DomainError> {
        let stored = Self::user_version(conn).await?;
        if stored != 0 && stored != SCHEMA_VERSION {
            warn!(
                stored,
                expected = SCHEMA_VERSION,
                "schema version mismatch; dropping all data"
            );
            conn.execute("DROP TABLE IF EXISTS exercises", ())
                .await
                .map_err(repo_err)?;
            conn.execute("DROP TABLE IF EXISTS daily_progress", ())
                .await
                .map_err(repo_err)?;
        }
        for ddl in [
            EXERCISES_TABLE,
            EXERCISES_ORDER_INDEX,
            PROGRESS_TABLE,
            PROGRESS_EXERCISE_INDEX,
            PROGRESS_DATE_INDEX,
        ] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }
        conn.execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), ())
            .await
            .map_err(repo_err)?;
        Ok(())
    }

    async fn user_version(conn: &Connection) -> Result<i64, DomainError> {
        let mut rows = conn
            .query("PRAGMA user_version", ())
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => row.get::<i64>(0).map_err(repo_err),
            None => Ok(0),
        }
    }

    fn connection(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(repo_err)
    }

    fn notify(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    async fn upsert(conn: &Connection, e: &Exercise) -> Result<i64, DomainError> {
        let id = (e.id != UNASSIGNED_ID).then_some(e.id);
        conn.execute(
            UPSERT_EXERCISE,
            params![
                id,
                e.title.as_str(),
                e.description.as_str(),
                e.instructions.as_str(),
                e.video_file_name.as_str(),
                e.thumbnail_file_name.clone(),
                e.category.as_str(),
                e.difficulty.as_str(),
                i64::from(e.duration_seconds),
                i64::from(e.repetitions),
                i64::from(e.sets),
                i64::from(e.completed),
                e.last_completed_at.map(|t| t.timestamp_millis()),
                i64::from(e.completion_count),
                i64::from(e.favorite),
                e.equipment_needed.clone(),
                e.precautions.clone(),
                i64::from(e.order_index)
            ],
        )
        .await
        .map_err(repo_err)?;
        Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
    }

    async fn collect_exercises(mut rows: Rows) -> Result<Vec<Exercise>, DomainError> {
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(row_to_exercise(&row)?);
        }
        Ok(out)
    }

    async fn collect_progress(mut rows: Rows) -> Result<Vec<DailyProgress>, DomainError> {
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(row_to_progress(&row)?);
        }
        Ok(out)
    }

    async fn scalar_count(&self, sql: &str) -> Result<u64, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn.query(sql, ()).await.map_err(repo_err)?;
        let count = match rows.next().await.map_err(repo_err)? {
            Some(row) => row.get::<i64>(0).map_err(repo_err)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl ExerciseStore for SqliteStore {
    async fn list_exercises(&self, filter: ExerciseFilter) -> Result<Vec<Exercise>, DomainError> {
        let conn = self.connection()?;
        let order = "ORDER BY order_index ASC, id ASC";
        let rows = match filter {
            ExerciseFilter::All => {
                conn.query(&format!("SELECT {EXERCISE_COLUMNS} FROM exercises {order}"), ())
                    .await
            }
            ExerciseFilter::Category(category) => {
                conn.query(
                    &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE category = ?1 {order}"),
                    params![category.as_str()],
                )
                .await
            }
            ExerciseFilter::Completed => {
                conn.query(
                    &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE completed = 1 {order}"),
                    (),
                )
                .await
            }
            ExerciseFilter::Favorite => {
                conn.query(
                    &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE favorite = 1 {order}"),
                    (),
                )
                .await
            }
        }
        .map_err(repo_err)?;
        Self::collect_exercises(rows).await
    }

    async fn get_exercise(&self, id: i64) -> Result<Option<Exercise>, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(row_to_exercise(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_exercise(&self, exercise: &Exercise) -> Result<i64, DomainError> {
        let conn = self.connection()?;
        let id = Self::upsert(&conn, exercise).await?;
        debug!(id, title = %exercise.title, "exercise upserted");
        self.notify(StoreChange::Exercises);
        Ok(id)
    }

    async fn insert_exercises(&self, exercises: &[Exercise]) -> Result<Vec<i64>, DomainError> {
        if exercises.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        let mut ids = Vec::with_capacity(exercises.len());
        for e in exercises {
            // Dropping the transaction on error rolls the whole batch back.
            ids.push(Self::upsert(&tx, e).await?);
        }
        tx.commit().await.map_err(repo_err)?;
        info!(count = ids.len(), "exercises upserted");
        self.notify(StoreChange::Exercises);
        Ok(ids)
    }

    async fn update_exercise(&self, e: &Exercise) -> Result<(), DomainError> {
        let conn = self.connection()?;
        let changed = conn
            .execute(
                r#"
                UPDATE exercises SET
                    title = ?2, description = ?3, instructions = ?4, video_file_name = ?5,
                    thumbnail_file_name = ?6, category = ?7, difficulty = ?8,
                    duration_seconds = ?9, repetitions = ?10, sets = ?11, completed = ?12,
                    last_completed_at = ?13, completion_count = ?14, favorite = ?15,
                    equipment_needed = ?16, precautions = ?17, order_index = ?18
                WHERE id = ?1
                "#,
                params![
                    e.id,
                    e.title.as_str(),
                    e.description.as_str(),
                    e.instructions.as_str(),
                    e.video_file_name.as_str(),
                    e.thumbnail_file_name.clone(),
                    e.category.as_str(),
                    e.difficulty.as_str(),
                    i64::from(e.duration_seconds),
                    i64::from(e.repetitions),
                    i64::from(e.sets),
                    i64::from(e.completed),
                    e.last_completed_at.map(|t| t.timestamp_millis()),
                    i64::from(e.completion_count),
                    i64::from(e.favorite),
                    e.equipment_needed.clone(),
                    e.precautions.clone(),
                    i64::from(e.order_index)
                ],
            )
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Err(DomainError::ExerciseNotFound(e.id));
        }
        self.notify(StoreChange::Exercises);
        Ok(())
    }

    async fn delete_exercise(&self, exercise: &Exercise) -> Result<bool, DomainError> {
        let conn = self.connection()?;
        let removed = conn
            .execute("DELETE FROM exercises WHERE id = ?1", params![exercise.id])
            .await
            .map_err(repo_err)?;
        if removed > 0 {
            info!(id = exercise.id, "exercise deleted");
            self.notify(StoreChange::Exercises);
        }
        Ok(removed > 0)
    }

    async fn reset_all_completions(&self) -> Result<u64, DomainError> {
        let conn = self.connection()?;
        let touched = conn
            .execute("UPDATE exercises SET completed = 0", ())
            .await
            .map_err(repo_err)?;
        self.notify(StoreChange::Exercises);
        Ok(touched)
    }

    async fn count_exercises(&self) -> Result<u64, DomainError> {
        self.scalar_count("SELECT COUNT(*) FROM exercises").await
    }

    async fn count_completed(&self) -> Result<u64, DomainError> {
        self.scalar_count("SELECT COUNT(*) FROM exercises WHERE completed = 1")
            .await
    }

    async fn insert_progress(&self, progress: &DailyProgress) -> Result<i64, DomainError> {
        let conn = self.connection()?;
        let id = (progress.id != UNASSIGNED_ID).then_some(progress.id);
        conn.execute(
            r#"
            INSERT INTO daily_progress (id, exercise_id, completed_at, sets_completed, repetitions_completed, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                progress.exercise_id,
                progress.completed_at.timestamp_millis(),
                i64::from(progress.sets_completed),
                i64::from(progress.repetitions_completed),
                progress.notes.clone()
            ],
        )
        .await
        .map_err(repo_err)?;
        let id = id.unwrap_or_else(|| conn.last_insert_rowid());
        debug!(id, exercise_id = progress.exercise_id, "progress appended");
        self.notify(StoreChange::Progress);
        Ok(id)
    }

    async fn list_progress_for_exercise(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<DailyProgress>, DomainError> {
        let conn = self.connection()?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {PROGRESS_COLUMNS} FROM daily_progress WHERE exercise_id = ?1 \
                     ORDER BY completed_at DESC, id DESC"
                ),
                params![exercise_id],
            )
            .await
            .map_err(repo_err)?;
        Self::collect_progress(rows).await
    }

    async fn list_progress_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyProgress>, DomainError> {
        let conn = self.connection()?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {PROGRESS_COLUMNS} FROM daily_progress \
                     WHERE completed_at >= ?1 AND completed_at <= ?2 \
                     ORDER BY completed_at ASC, id ASC"
                ),
                params![start.timestamp_millis(), end.timestamp_millis()],
            )
            .await
            .map_err(repo_err)?;
        Self::collect_progress(rows).await
    }

    async fn delete_progress_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let conn = self.connection()?;
        let removed = conn
            .execute(
                "DELETE FROM daily_progress WHERE completed_at < ?1",
                params![cutoff.timestamp_millis()],
            )
            .await
            .map_err(repo_err)?;
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "old progress purged");
            self.notify(StoreChange::Progress);
        }
        Ok(removed)
    }

    async fn streak_days(
        &self,
        since: DateTime<Utc>,
        boundary: DayBoundary,
    ) -> Result<u32, DomainError> {
        let sql = match boundary {
            DayBoundary::Local => STREAK_DAYS_LOCAL,
            DayBoundary::Utc => STREAK_DAYS_UTC,
        };
        let conn = self.connection()?;
        let mut rows = conn
            .query(sql, params![since.timestamp_millis()])
            .await
            .map_err(repo_err)?;
        let days = match rows.next().await.map_err(repo_err)? {
            Some(row) => row.get::<i64>(0).map_err(repo_err)?,
            None => 0,
        };
        u32::try_from(days).map_err(repo_err)
    }

    async fn average_completion_rate(&self) -> Result<f64, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT COALESCE(AVG(completion_count), 0.0) FROM exercises",
                (),
            )
            .await
            .map_err(repo_err)?;
        let Some(row) = rows.next().await.map_err(repo_err)? else {
            return Ok(0.0);
        };
        match row.get_value(0).map_err(repo_err)? {
            Value::Real(avg) => Ok(avg),
            Value::Integer(avg) => Ok(avg as f64),
            _ => Ok(0.0),
        }
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

fn row_to_exercise(row: &Row) -> Result<Exercise, DomainError> {
    Ok(Exercise {
        id: row.get::<i64>(0).map_err(repo_err)?,
        title: row.get::<String>(1).map_err(repo_err)?,
        description: row.get::<String>(2).map_err(repo_err)?,
        instructions: row.get::<String>(3).map_err(repo_err)?,
        video_file_name: row.get::<String>(4).map_err(repo_err)?,
        thumbnail_file_name: opt_text(row, 5)?,
        category: row.get::<String>(6).map_err(repo_err)?.parse()?,
        difficulty: row.get::<String>(7).map_err(repo_err)?.parse()?,
        duration_seconds: column_u32(row, 8, "duration_seconds")?,
        repetitions: column_u32(row, 9, "repetitions")?,
        sets: column_u32(row, 10, "sets")?,
        completed: row.get::<i64>(11).map_err(repo_err)? != 0,
        last_completed_at: opt_integer(row, 12)?.map(millis_to_utc).transpose()?,
        completion_count: column_u32(row, 13, "completion_count")?,
        favorite: row.get::<i64>(14).map_err(repo_err)? != 0,
        equipment_needed: opt_text(row, 15)?,
        precautions: opt_text(row, 16)?,
        order_index: i32::try_from(row.get::<i64>(17).map_err(repo_err)?)
            .map_err(|_| DomainError::InvalidData("order_index out of range".into()))?,
    })
}

fn row_to_progress(row: &Row) -> Result<DailyProgress, DomainError> {
    Ok(DailyProgress {
        id: row.get::<i64>(0).map_err(repo_err)?,
        exercise_id: row.get::<i64>(1).map_err(repo_err)?,
        completed_at: millis_to_utc(row.get::<i64>(2).map_err(repo_err)?)?,
        sets_completed: column_u32(row, 3, "sets_completed")?,
        repetitions_completed: column_u32(row, 4, "repetitions_completed")?,
        notes: opt_text(row, 5)?,
    })
}

fn column_u32(row: &Row, idx: i32, name: &str) -> Result<u32, DomainError> {
    let v = row.get::<i64>(idx).map_err(repo_err)?;
    u32::try_from(v).map_err(|_| DomainError::InvalidData(format!("{name} out of range: {v}")))
}

fn opt_text(row: &Row, idx: i32) -> Result<Option<String>, DomainError> {
    match row.get_value(idx).map_err(repo_err)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(DomainError::InvalidData(format!(
            "column {idx}: expected text, got {other:?}"
        ))),
    }
}

fn opt_integer(row: &Row, idx: i32) -> Result<Option<i64>, DomainError> {
    match row.get_value(idx).map_err(repo_err)? {
        Value::Null => Ok(None),
        Value::Integer(v) => Ok(Some(v)),
        other => Err(DomainError::InvalidData(format!(
            "column {idx}: expected integer, got {other:?}"
        ))),
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, DomainError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| DomainError::InvalidData(format!("timestamp out of range: {ms}")))
}
