use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schemaform::config::SchemaConfig;
use schemaform::uploads::{DiskUploadStore, UploadStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemaform-admin")]
#[command(about = "Maintenance tasks for schemaform deployments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove uploads that were never claimed by a record
    CleanUploads {
        /// Upload directory; defaults to SCHEMAFORM_UPLOAD_DIR or the stock location
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Age in hours after which an upload is stale
        #[arg(long)]
        max_age_hours: Option<u64>,
        /// Delete files; without this only report what would be removed
        #[arg(long)]
        force: bool,
    },
    /// Show where an upload key resolves to
    InspectUpload {
        key: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = SchemaConfig::from_env().context("invalid SCHEMAFORM_* environment")?;

    match cli.command {
        Command::CleanUploads {
            dir,
            max_age_hours,
            force,
        } => clean_uploads(config, dir, max_age_hours, force).await,
        Command::InspectUpload { key, dir } => inspect_upload(config, dir, &key).await,
    }
}

fn upload_store(config: SchemaConfig, dir: Option<PathBuf>) -> DiskUploadStore {
    match dir {
        Some(dir) => DiskUploadStore::new(dir, config.upload_max_size),
        None => DiskUploadStore::from_config(&config),
    }
}

async fn clean_uploads(
    config: SchemaConfig,
    dir: Option<PathBuf>,
    max_age_hours: Option<u64>,
    force: bool,
) -> Result<()> {
    let max_age = max_age_hours
        .map(|hours| Duration::from_secs(hours * 3600))
        .unwrap_or(config.upload_stale_after);
    let store = upload_store(config, dir);

    tracing::info!(root = %store.root().display(), ?max_age, dry_run = !force, "cleaning stale uploads");
    let report = store
        .clean_stale(max_age, !force)
        .await
        .with_context(|| format!("failed to clean {}", store.root().display()))?;

    let verb = if report.dry_run { "Would remove" } else { "Removed" };
    for path in &report.removed {
        println!("{verb} {}", path.display());
    }
    println!(
        "{verb} {} upload(s), {} byte(s); {} kept",
        report.removed.len(),
        report.bytes_freed,
        report.kept
    );
    Ok(())
}

async fn inspect_upload(config: SchemaConfig, dir: Option<PathBuf>, key: &str) -> Result<()> {
    let store = upload_store(config, dir);
    let upload = store
        .resolve(key)
        .await
        .with_context(|| format!("cannot resolve upload {key}"))?;
    println!("{}", serde_json::to_string_pretty(&upload)?);
    Ok(())
}
