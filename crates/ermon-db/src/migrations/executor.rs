use std::path::PathBuf;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{error, info, warn};

use super::MigrationUnit;
use super::error::MigrationError;
use super::lock;
use super::source::{self, MigrationSource};
use super::tracking::TrackingStore;

/// What a successful run did, in the order it did it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Applies pending migrations one at a time, each in its own transaction.
///
/// A migration's statements and its tracking row commit together, so after
/// any failure the database holds exactly the migrations before the one that
/// failed. Re-running resumes from there.
pub struct Migrator<S> {
    source: S,
    lock_file: Option<PathBuf>,
}

impl<S: MigrationSource> Migrator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            lock_file: None,
        }
    }

    /// Hold an exclusive lock on `path` for the whole run so that
    /// concurrent processes migrating the same database take turns.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    pub fn run(&self, conn: &mut Connection) -> Result<MigrationReport, MigrationError> {
        let mut run_lock = self.lock_file.as_deref().map(lock::open).transpose()?;
        let _guard = match (run_lock.as_mut(), self.lock_file.as_ref()) {
            (Some(run_lock), Some(path)) => {
                info!(path = %path.display(), "waiting for migration lock");
                Some(
                    run_lock
                        .write()
                        .map_err(|source| MigrationError::LockFailed {
                            path: path.clone(),
                            source,
                        })?,
                )
            }
            _ => None,
        };

        info!("running migrations");
        init_tracking(conn)?;

        let mut units = self.source.list().inspect_err(|e| {
            error!(error = %e, "error reading migrations");
        })?;
        // Applied in name order whatever order the source listed them in.
        source::sort_by_name(&mut units);
        source::warn_on_mixed_prefix_widths(&units);
        if let Some(name) = source::first_duplicate(&units) {
            error!(name, "migration name listed more than once");
            return Err(MigrationError::DuplicateName(name.to_string()));
        }

        let mut report = MigrationReport::default();
        for unit in units {
            let already_ran = TrackingStore::has_run(conn, &unit.name).map_err(|source| {
                error!(name = %unit.name, error = %source, "error checking if migration has been run");
                MigrationError::CheckFailed {
                    name: unit.name.clone(),
                    source,
                }
            })?;

            if already_ran {
                info!(name = %unit.name, "skipping migration");
                report.skipped.push(unit.name);
                continue;
            }

            apply(conn, &unit)?;
            report.applied.push(unit.name);
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "migrations complete"
        );
        Ok(report)
    }
}

fn init_tracking(conn: &mut Connection) -> Result<(), MigrationError> {
    let tx = conn.transaction().map_err(|e| {
        error!(error = %e, "error beginning transaction");
        MigrationError::TrackingInitFailed(e)
    })?;

    TrackingStore::ensure_exists(&tx).map_err(|e| {
        error!(error = %e, "error creating migrations table");
        MigrationError::TrackingInitFailed(e)
    })?;

    tx.commit().map_err(|e| {
        error!(error = %e, "error committing migrations table");
        MigrationError::TrackingInitFailed(e)
    })
}

/// Run one migration and record it inside a single transaction.
fn apply(conn: &mut Connection, unit: &MigrationUnit) -> Result<(), MigrationError> {
    let name = unit.name.as_str();

    // IMMEDIATE takes the write lock up front rather than on the first write.
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| {
            error!(name, error = %source, "error beginning migration transaction");
            MigrationError::ApplyFailed {
                name: name.to_string(),
                source,
            }
        })?;

    info!(name, "running migration");

    if let Err(source) = tx.execute_batch(&unit.body) {
        error!(name, error = %source, "error running migration");
        rollback(tx, name);
        return Err(MigrationError::ApplyFailed {
            name: name.to_string(),
            source,
        });
    }

    // A COMMIT or END in the body leaves the rest of it, and the record,
    // in autocommit. Refuse to record a unit that ended its own transaction.
    if tx.is_autocommit() {
        error!(name, "migration ended its own transaction");
        return Err(MigrationError::ApplyFailed {
            name: name.to_string(),
            source: rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some("migration must not contain BEGIN, COMMIT or END".to_string()),
            ),
        });
    }

    if let Err(source) = TrackingStore::record(&tx, name) {
        error!(name, error = %source, "error recording migration");
        rollback(tx, name);
        return Err(MigrationError::RecordFailed {
            name: name.to_string(),
            source,
        });
    }

    // A failed COMMIT leaves the transaction open; dropping it rolls back.
    tx.commit().map_err(|source| {
        error!(name, error = %source, "error committing migration");
        MigrationError::CommitFailed {
            name: name.to_string(),
            source,
        }
    })
}

fn rollback(tx: Transaction<'_>, name: &str) {
    if let Err(e) = tx.rollback() {
        warn!(name, error = %e, "rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{MigrationRecord, StaticSource};

    fn unit(name: &str, body: &str) -> MigrationUnit {
        MigrationUnit::new(name, body)
    }

    fn abc() -> StaticSource {
        StaticSource::new([
            unit("001_a", "CREATE TABLE a (id INTEGER PRIMARY KEY);"),
            unit("002_b", "CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id));
                           INSERT INTO a (id) VALUES (1);"),
            unit("003_c", "CREATE TABLE c (id INTEGER PRIMARY KEY);"),
        ])
    }

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn recorded(conn: &Connection) -> Vec<String> {
        TrackingStore::applied(conn)
            .unwrap()
            .into_iter()
            .map(|r: MigrationRecord| r.name)
            .collect()
    }

    /// Lists units in reverse, like an unordered directory listing would.
    struct ReversedSource(Vec<MigrationUnit>);

    impl MigrationSource for ReversedSource {
        fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError> {
            let mut units = self.0.clone();
            units.sort_by(|a, b| b.name.cmp(&a.name));
            Ok(units)
        }

        fn read(&self, name: &str) -> Result<String, MigrationError> {
            self.0
                .iter()
                .find(|u| u.name == name)
                .map(|u| u.body.clone())
                .ok_or_else(|| MigrationError::UnitNotFound(name.to_string()))
        }
    }

    struct BrokenSource;

    impl MigrationSource for BrokenSource {
        fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError> {
            Err(MigrationError::SourceUnavailable("bundle missing".into()))
        }

        fn read(&self, name: &str) -> Result<String, MigrationError> {
            Err(MigrationError::UnitNotFound(name.to_string()))
        }
    }

    #[test]
    fn applies_all_in_order_then_skips_on_rerun() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migrator = Migrator::new(abc());

        let first = migrator.run(&mut conn).unwrap();
        assert_eq!(first.applied, vec!["001_a", "002_b", "003_c"]);
        assert!(first.skipped.is_empty());

        let second = migrator.run(&mut conn).unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped, vec!["001_a", "002_b", "003_c"]);

        assert_eq!(recorded(&conn), vec!["001_a", "002_b", "003_c"]);
    }

    #[test]
    fn order_does_not_depend_on_source_listing() {
        let mut conn = Connection::open_in_memory().unwrap();
        let source = ReversedSource(abc().list().unwrap());

        // 002_b references a table created by 001_a, so any other order fails.
        let report = Migrator::new(source).run(&mut conn).unwrap();
        assert_eq!(report.applied, vec!["001_a", "002_b", "003_c"]);
        assert_eq!(recorded(&conn), vec!["001_a", "002_b", "003_c"]);
    }

    #[test]
    fn failing_unit_is_rolled_back_and_stops_the_run() {
        let mut conn = Connection::open_in_memory().unwrap();
        let source = StaticSource::new([
            unit("001_a", "CREATE TABLE a (id INTEGER PRIMARY KEY);"),
            unit("002_b", "CREATE TABLE b (id INTEGER); INSERT INTO missing VALUES (1);"),
            unit("003_c", "CREATE TABLE c (id INTEGER);"),
        ]);

        let err = Migrator::new(source).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::ApplyFailed { ref name, .. } if name == "002_b"));

        assert_eq!(recorded(&conn), vec!["001_a"]);
        assert!(table_exists(&conn, "a"));
        assert!(!table_exists(&conn, "b"), "partial effects of 002_b must be undone");
        assert!(!table_exists(&conn, "c"), "003_c must never be attempted");
    }

    #[test]
    fn record_failure_undoes_the_units_statements() {
        let mut conn = Connection::open_in_memory().unwrap();
        // The body claims its own tracking row, so recording it collides.
        let source = StaticSource::new([unit(
            "001_a",
            "CREATE TABLE a (id INTEGER); INSERT INTO _migrations (name) VALUES ('001_a');",
        )]);

        let err = Migrator::new(source).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::RecordFailed { ref name, .. } if name == "001_a"));
        assert!(recorded(&conn).is_empty());
        assert!(!table_exists(&conn, "a"));
    }

    #[test]
    fn resumes_after_interruption() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Crash after 001_a committed, before 002_b started.
        let partial = StaticSource::new([unit("001_a", "CREATE TABLE a (id INTEGER PRIMARY KEY);")]);
        Migrator::new(partial).run(&mut conn).unwrap();

        let report = Migrator::new(abc()).run(&mut conn).unwrap();
        assert_eq!(report.skipped, vec!["001_a"]);
        assert_eq!(report.applied, vec!["002_b", "003_c"]);
    }

    #[test]
    fn bootstrap_twice_on_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        let empty = StaticSource::default();

        assert_eq!(
            Migrator::new(&empty).run(&mut conn).unwrap(),
            MigrationReport::default()
        );
        assert_eq!(
            Migrator::new(&empty).run(&mut conn).unwrap(),
            MigrationReport::default()
        );
        assert!(table_exists(&conn, "_migrations"));
    }

    #[test]
    fn empty_body_is_recorded_as_applied() {
        let mut conn = Connection::open_in_memory().unwrap();
        let source = StaticSource::new([unit("001_noop", ""), unit("002_comment", "-- nothing\n")]);

        let report = Migrator::new(source).run(&mut conn).unwrap();
        assert_eq!(report.applied, vec!["001_noop", "002_comment"]);
        assert_eq!(recorded(&conn), vec!["001_noop", "002_comment"]);
    }

    #[test]
    fn source_failure_aborts_after_tracking_init() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = Migrator::new(BrokenSource).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::SourceUnavailable(_)));
        assert!(recorded(&conn).is_empty());
    }

    #[test]
    fn duplicate_name_aborts_before_anything_is_applied() {
        let mut conn = Connection::open_in_memory().unwrap();
        let source = StaticSource::new([
            unit("000_first", "CREATE TABLE first (id INTEGER);"),
            unit("001_a", "CREATE TABLE a (id INTEGER);"),
            unit("001_a", "CREATE TABLE z (id INTEGER);"),
        ]);

        let err = Migrator::new(source).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateName(ref name) if name == "001_a"));
        assert_eq!(err.unit_name(), Some("001_a"));
        assert!(recorded(&conn).is_empty());
        assert!(!table_exists(&conn, "first"));
        assert!(!table_exists(&conn, "a"));
        assert!(!table_exists(&conn, "z"));
    }

    #[test]
    fn duplicate_name_aborts_even_when_already_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        Migrator::new(abc()).run(&mut conn).unwrap();

        let source = StaticSource::new([
            unit("001_a", "CREATE TABLE a (id INTEGER PRIMARY KEY);"),
            unit("001_a", "CREATE TABLE z (id INTEGER);"),
        ]);
        let err = Migrator::new(source).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateName(_)));
        assert!(!table_exists(&conn, "z"));
    }

    #[test]
    fn body_that_commits_is_not_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        let source = StaticSource::new([
            unit("001_a", "CREATE TABLE a (id INTEGER); COMMIT; CREATE TABLE b (x);"),
            unit("002_b", "CREATE TABLE c (id INTEGER);"),
        ]);

        let err = Migrator::new(source).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::ApplyFailed { ref name, .. } if name == "001_a"));
        assert!(err.to_string().contains("must not contain BEGIN, COMMIT or END"));
        assert!(recorded(&conn).is_empty());
        assert!(!table_exists(&conn, "c"));
        assert!(conn.is_autocommit());
    }

    #[test]
    fn body_that_ends_is_not_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        let source = StaticSource::new([unit("001_a", "CREATE TABLE a (id INTEGER); END;")]);

        let err = Migrator::new(source).run(&mut conn).unwrap_err();
        assert!(matches!(err, MigrationError::ApplyFailed { .. }));
        assert!(recorded(&conn).is_empty());

        // Fixed body applies on the next run.
        let fixed = StaticSource::new([unit("001_a", "CREATE TABLE IF NOT EXISTS a (id INTEGER);")]);
        let report = Migrator::new(fixed).run(&mut conn).unwrap();
        assert_eq!(report.applied, vec!["001_a"]);
    }

    #[test]
    fn lock_file_is_created_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("migrate.lock");
        let mut conn = Connection::open(dir.path().join("test.db")).unwrap();

        let migrator = Migrator::new(abc()).with_lock_file(&lock_path);
        migrator.run(&mut conn).unwrap();
        assert!(lock_path.exists());

        // Released at the end of the run, so a second run can take it.
        let report = migrator.run(&mut conn).unwrap();
        assert_eq!(report.applied.len(), 0);
    }

    #[test]
    fn unwritable_lock_path_fails_before_touching_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open_in_memory().unwrap();

        let err = Migrator::new(abc())
            .with_lock_file(dir.path().join("no-such-dir").join("migrate.lock"))
            .run(&mut conn)
            .unwrap_err();
        assert!(matches!(err, MigrationError::LockFailed { .. }));
        assert!(!table_exists(&conn, "_migrations"));
    }
}
