use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ermon_config::AppConfig;
use ermon_db::{MigrationReport, WaitTimeStore};
use ermon_scraper::{WorkflowClient, format_local};
use tracing::{error, info};

/// Fetch each location and append what comes back. One location failing
/// does not stop the others; the command fails only if every one did.
pub async fn fetch(config: &AppConfig, locations: Vec<String>) -> Result<()> {
    let locations = if locations.is_empty() {
        config.scraper.locations.clone()
    } else {
        locations
    };

    let store = open_store(&config.database.path)?;
    let client = WorkflowClient::new(
        &config.scraper.endpoint,
        Duration::from_secs(config.scraper.timeout_secs),
    )?;

    let mut failures = 0;
    for location in &locations {
        let result = match client.fetch(location).await {
            Ok(wait) => store.insert(&wait),
            Err(e) => Err(e),
        };
        match result {
            Ok(id) => info!(location = %location, id, "recorded wait times"),
            Err(e) => {
                error!(location = %location, "{e}");
                failures += 1;
            }
        }
    }

    if !locations.is_empty() && failures == locations.len() {
        bail!("failed to record wait times for every location");
    }
    Ok(())
}

pub fn migrate(config: &AppConfig) -> Result<MigrationReport> {
    let db_path = &config.database.path;
    create_parent_dir(db_path)?;
    // Opening the store applies any pending migrations.
    let (_, report) = WaitTimeStore::open_with_report(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    for name in &report.applied {
        println!("  applied {name}");
    }
    println!(
        "{} applied, {} already up to date in {}",
        report.applied.len(),
        report.skipped.len(),
        db_path.display()
    );
    Ok(report)
}

pub fn status(config: &AppConfig) -> Result<()> {
    let store = open_store(&config.database.path)?;

    println!("Migrations");
    for record in store.applied_migrations()? {
        println!("  {:<45} {}", record.name, record.ran_at.to_rfc3339());
    }

    println!();
    println!("Latest readings");
    for location in &config.scraper.locations {
        match store.latest(location)? {
            Some(wait) => println!(
                "  {location:<5} {}  waiting {:>3}  treated {:>3}  total {:>3}",
                format_local(wait.observed_at),
                wait.patients_in_waiting_room,
                wait.patients_being_treated,
                wait.total_patients,
            ),
            None => println!("  {location:<5} no readings yet"),
        }
    }
    println!();
    println!("{} readings stored", store.count()?);
    Ok(())
}

fn open_store(db_path: &Path) -> Result<WaitTimeStore> {
    create_parent_dir(db_path)?;
    WaitTimeStore::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))
}

fn create_parent_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
