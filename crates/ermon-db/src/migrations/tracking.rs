use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, params};

pub const TRACKING_TABLE: &str = "_migrations";

/// A row of the tracking table: one migration that has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub ran_at: DateTime<Utc>,
}

/// Queries against the `_migrations` table.
///
/// Writes take the caller's transaction and never commit; the executor
/// decides when a migration and its record become durable together.
pub struct TrackingStore;

impl TrackingStore {
    /// Create the tracking table if it is absent. Safe to repeat.
    pub fn ensure_exists(tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE CHECK (length(name) <= 100),
                ran_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );",
        )
    }

    pub fn has_run(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )
    }

    pub fn record(tx: &Transaction<'_>, name: &str) -> rusqlite::Result<()> {
        tx.execute("INSERT INTO _migrations (name) VALUES (?1)", params![name])?;
        Ok(())
    }

    /// All applied migrations, oldest first.
    pub fn applied(conn: &Connection) -> rusqlite::Result<Vec<MigrationRecord>> {
        let mut stmt = conn.prepare("SELECT id, name, ran_at FROM _migrations ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(MigrationRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                ran_at: parse_datetime(row.get::<_, String>(2)?),
            })
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // Rows written by hand with datetime('now') are "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or(DateTime::UNIX_EPOCH)
        })
}
