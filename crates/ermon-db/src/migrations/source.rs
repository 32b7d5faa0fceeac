use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use include_dir::Dir;
use tracing::{debug, warn};

use super::MigrationUnit;
use super::error::MigrationError;

const MIGRATION_EXTENSION: &str = "sql";

/// An ordered, read-only collection of migrations.
///
/// `list` must return the same units in the same order on every call
/// within a run.
pub trait MigrationSource {
    fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError>;

    fn read(&self, name: &str) -> Result<String, MigrationError>;
}

impl<S: MigrationSource + ?Sized> MigrationSource for &S {
    fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError> {
        (**self).list()
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        (**self).read(name)
    }
}

/// Migrations baked into the binary with `include_dir!`.
pub struct EmbeddedSource {
    dir: &'static Dir<'static>,
}

impl EmbeddedSource {
    pub fn new(dir: &'static Dir<'static>) -> Self {
        Self { dir }
    }
}

impl MigrationSource for EmbeddedSource {
    fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError> {
        let mut units = Vec::new();
        for file in self.dir.files() {
            let path = file.path();
            if !is_migration_file(path) {
                continue;
            }
            let name = file_name(path)?;
            let body = file.contents_utf8().ok_or_else(|| {
                MigrationError::SourceUnavailable(format!("{name} is not valid UTF-8"))
            })?;
            units.push(MigrationUnit::new(name, body));
        }

        sort_by_name(&mut units);
        debug!("found {} embedded migrations", units.len());
        Ok(units)
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        let file = self
            .dir
            .files()
            .iter()
            .find(|f| is_migration_file(f.path()) && f.path().file_name() == Some(OsStr::new(name)))
            .ok_or_else(|| MigrationError::UnitNotFound(name.to_string()))?;

        file.contents_utf8()
            .map(str::to_string)
            .ok_or_else(|| MigrationError::SourceUnavailable(format!("{name} is not valid UTF-8")))
    }
}

/// Migrations read from a directory on disk at run time.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MigrationSource for DirectorySource {
    fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            MigrationError::SourceUnavailable(format!(
                "failed to read {}: {e}",
                self.root.display()
            ))
        })?;

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                MigrationError::SourceUnavailable(format!(
                    "failed to read entry in {}: {e}",
                    self.root.display()
                ))
            })?;
            let path = entry.path();
            if !path.is_file() || !is_migration_file(&path) {
                continue;
            }
            let name = file_name(&path)?;
            let body = std::fs::read_to_string(&path).map_err(|e| {
                MigrationError::SourceUnavailable(format!("failed to read {name}: {e}"))
            })?;
            units.push(MigrationUnit::new(name, body));
        }

        sort_by_name(&mut units);
        Ok(units)
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        // Names are bare file names; anything with a separator can't be one of ours.
        if name.contains(['/', '\\']) || !is_migration_file(Path::new(name)) {
            return Err(MigrationError::UnitNotFound(name.to_string()));
        }

        let path = self.root.join(name);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MigrationError::UnitNotFound(name.to_string()),
            _ => MigrationError::SourceUnavailable(format!("failed to read {name}: {e}")),
        })
    }
}

/// A fixed, in-memory set of migrations.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    units: Vec<MigrationUnit>,
}

impl StaticSource {
    pub fn new(units: impl IntoIterator<Item = MigrationUnit>) -> Self {
        let mut units: Vec<_> = units.into_iter().collect();
        sort_by_name(&mut units);
        Self { units }
    }
}

impl MigrationSource for StaticSource {
    fn list(&self) -> Result<Vec<MigrationUnit>, MigrationError> {
        Ok(self.units.clone())
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        self.units
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.body.clone())
            .ok_or_else(|| MigrationError::UnitNotFound(name.to_string()))
    }
}

pub(crate) fn sort_by_name(units: &mut [MigrationUnit]) {
    units.sort_by(|a, b| a.name.cmp(&b.name));
}

/// First name that appears twice in an already sorted list.
pub(crate) fn first_duplicate(units: &[MigrationUnit]) -> Option<&str> {
    units
        .windows(2)
        .find(|pair| pair[0].name == pair[1].name)
        .map(|pair| pair[0].name.as_str())
}

/// Warn when numeric name prefixes have different widths, since lexical
/// order then diverges from numeric order. Returns whether it warned.
pub(crate) fn warn_on_mixed_prefix_widths(units: &[MigrationUnit]) -> bool {
    let widths: BTreeSet<usize> = units
        .iter()
        .map(|u| u.name.chars().take_while(char::is_ascii_digit).count())
        .filter(|&w| w > 0)
        .collect();

    if widths.len() > 1 {
        warn!(
            ?widths,
            "migration names use numeric prefixes of different widths; \
             they run in lexical order, so zero-pad the prefixes"
        );
        return true;
    }
    false
}

fn is_migration_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MIGRATION_EXTENSION)
}

fn file_name(path: &Path) -> Result<String, MigrationError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            MigrationError::SourceUnavailable(format!(
                "migration file name is not valid UTF-8: {}",
                path.display()
            ))
        })
}
