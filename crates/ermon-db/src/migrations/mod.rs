//! Embedded schema migrations.
//!
//! A migration is a named `.sql` file. Files are applied once each, in
//! lexical order of their names, and tracked in the `_migrations` table.
//!
//! Names must sort in the order they should run. Use zero-padded numeric
//! prefixes (`001_create_wait_times.sql`, `002_...`): with unpadded prefixes
//! `10_x.sql` sorts before `2_y.sql`. Mixed prefix widths are reported with a
//! warning when a run starts.
//!
//! Each file runs inside its own transaction together with its tracking row,
//! so a file must not contain `BEGIN`/`COMMIT` statements of its own. A file
//! that ends the transaction early fails and is not recorded. A source that
//! lists the same name twice fails the run before anything is applied.

mod error;
mod executor;
mod lock;
mod source;
mod tracking;

use include_dir::{Dir, include_dir};
use rusqlite::Connection;

pub use error::MigrationError;
pub use executor::{MigrationReport, Migrator};
pub use source::{DirectorySource, EmbeddedSource, MigrationSource, StaticSource};
pub use tracking::{MigrationRecord, TRACKING_TABLE, TrackingStore};

/// The migrations shipped with this crate.
static BUNDLED: Dir = include_dir!("migrations");

/// A single schema change: a stable name and the statements to run verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub name: String,
    pub body: String,
}

impl MigrationUnit {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// Source for the migrations compiled into this binary.
pub fn bundled() -> EmbeddedSource {
    EmbeddedSource::new(&BUNDLED)
}

/// Apply every pending migration from `source` to `conn`.
pub fn migrate<S>(conn: &mut Connection, source: S) -> Result<MigrationReport, MigrationError>
where
    S: MigrationSource,
{
    Migrator::new(source).run(conn)
}
