use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use ermon_common::{Error, Result, WaitTimes};
use rusqlite::{Connection, params};
use tracing::info;

use crate::migrations::{
    self, MigrationError, MigrationRecord, MigrationReport, Migrator, TrackingStore,
};

/// Append-only history of scraped wait times.
pub struct WaitTimeStore {
    conn: Mutex<Connection>,
    lock_file: Option<PathBuf>,
}

impl WaitTimeStore {
    /// Open the database at `db_path` and bring its schema up to date.
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::open_with_report(db_path).map(|(store, _)| store)
    }

    /// Like [`open`](Self::open), also returning what the migration run did.
    pub fn open_with_report(db_path: &Path) -> Result<(Self, MigrationReport)> {
        info!("opening wait time store at {}", db_path.display());
        let mut conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let lock_file = Some(lock_path_for(db_path));
        let report = run_migrations(&mut conn, lock_file.as_deref())?;

        let store = Self {
            conn: Mutex::new(conn),
            lock_file,
        };
        Ok((store, report))
    }

    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        run_migrations(&mut conn, None)?;

        Ok(Self {
            conn: Mutex::new(conn),
            lock_file: None,
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("wait time store lock poisoned".into()))
    }

    /// Re-run the bundled migrations. Everything already applied is skipped.
    pub fn migrate(&self) -> Result<MigrationReport> {
        let mut conn = self.connection()?;
        run_migrations(&mut conn, self.lock_file.as_deref())
    }

    pub fn applied_migrations(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.connection()?;
        TrackingStore::applied(&conn)
            .map_err(|e| MigrationError::ReadRecordsFailed(e).into())
    }

    /// Append one observation and return its row id.
    pub fn insert(&self, wait: &WaitTimes) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO wait_times (
                location, patients_in_waiting_room,
                most_urgent_count, most_urgent_time,
                urgent_count, urgent_time,
                less_than_urgent_count, less_than_urgent_time,
                patients_being_treated, total_patients,
                patients_waiting_transfer, observed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                wait.location,
                wait.patients_in_waiting_room,
                wait.most_urgent_count,
                wait.most_urgent_time,
                wait.urgent_count,
                wait.urgent_time,
                wait.less_than_urgent_count,
                wait.less_than_urgent_time,
                wait.patients_being_treated,
                wait.total_patients,
                wait.patients_waiting_transfer,
                wait.observed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ],
        )
        .map_err(|e| Error::Database(format!("failed to insert wait times: {e}")))?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent observation for `location`, if any.
    pub fn latest(&self, location: &str) -> Result<Option<WaitTimes>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT location, patients_in_waiting_room,
                        most_urgent_count, most_urgent_time,
                        urgent_count, urgent_time,
                        less_than_urgent_count, less_than_urgent_time,
                        patients_being_treated, total_patients,
                        patients_waiting_transfer, observed_at
                 FROM wait_times
                 WHERE location = ?1
                 ORDER BY observed_at DESC, id DESC
                 LIMIT 1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let mut rows = stmt
            .query_map(params![location], |row| {
                Ok(WaitTimes {
                    location: row.get(0)?,
                    patients_in_waiting_room: row.get(1)?,
                    most_urgent_count: row.get(2)?,
                    most_urgent_time: row.get(3)?,
                    urgent_count: row.get(4)?,
                    urgent_time: row.get(5)?,
                    less_than_urgent_count: row.get(6)?,
                    less_than_urgent_time: row.get(7)?,
                    patients_being_treated: row.get(8)?,
                    total_patients: row.get(9)?,
                    patients_waiting_transfer: row.get(10)?,
                    observed_at: parse_datetime(&row.get::<_, String>(11)?),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query wait times: {e}")))?;

        rows.next()
            .transpose()
            .map_err(|e| Error::Database(format!("failed to read wait time row: {e}")))
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM wait_times", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count wait times: {e}")))?;
        Ok(count as usize)
    }
}

fn run_migrations(conn: &mut Connection, lock_file: Option<&Path>) -> Result<MigrationReport> {
    let mut migrator = Migrator::new(migrations::bundled());
    if let Some(path) = lock_file {
        migrator = migrator.with_lock_file(path);
    }
    Ok(migrator.run(conn)?)
}

/// `waittimes.db` locks `waittimes.db.migrate-lock` while migrating.
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = OsString::from(db_path.as_os_str());
    name.push(".migrate-lock");
    PathBuf::from(name)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
