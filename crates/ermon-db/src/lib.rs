pub mod migrations;
pub mod wait_time_store;

pub use migrations::{
    MigrationError, MigrationRecord, MigrationReport, MigrationSource, MigrationUnit, Migrator,
    migrate,
};
pub use wait_time_store::WaitTimeStore;
