//! pkgstore
//!
//! Runs a single content operation against the configured repositories and
//! prints the result as JSON on stdout.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};
use pkgstore_core::{Component, ComponentId};
use pkgstore_db::{close_pool, create_pool, SqlitePool};
use pkgstore_service::{ContentFacet, Payload, RepositoryRegistry, RepositoryRegistryBuilder};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info};

use pkgstore_cli::config::AppConfig;
use pkgstore_cli::metrics::{self, MetricsTimer};
use pkgstore_cli::telemetry::{self, TelemetryConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "PKGSTORE_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "PKGSTORE_ENV", default_value = "development")]
    environment: String,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a file at a repository path
    Put {
        repository: String,
        path: String,
        file: PathBuf,

        /// Content type to record instead of guessing from the path
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Fetch a stored file, printing its descriptor
    Get {
        repository: String,
        path: String,

        /// Write the bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether a path holds an asset
    Exists { repository: String, path: String },

    /// Delete assets by path
    Delete {
        repository: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Delete components and all of their assets
    Purge {
        repository: String,
        #[arg(required = true)]
        ids: Vec<ComponentId>,
    },

    /// List snapshot components eligible for removal
    Snapshots(SnapshotArgs),

    /// Remove the published Maven index
    UnpublishIndex { repository: String },

    /// Show configured repositories with their usage
    Repositories,

    /// Print Prometheus metrics for the store
    Metrics,
}

#[derive(ClapArgs, Debug)]
#[command(group(ArgGroup::new("rule").required(true).args(["min_retained", "grace_days"])))]
struct SnapshotArgs {
    repository: String,

    /// Keep this many of the newest snapshots per version line
    #[arg(long)]
    min_retained: Option<u32>,

    /// Days a snapshot line survives after its release
    #[arg(long)]
    grace_days: Option<i64>,

    /// Purge the candidates instead of only listing them
    #[arg(long)]
    purge: bool,
}

#[derive(Serialize)]
struct ComponentSummary {
    id: ComponentId,
    coordinates: String,
    created_at: chrono::DateTime<Utc>,
}

impl From<&Component> for ComponentSummary {
    fn from(component: &Component) -> Self {
        Self {
            id: component.id,
            coordinates: component.to_string(),
            created_at: component.created_at,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = AppConfig::load(&args.config_dir, &args.environment)
        .with_context(|| format!("Failed to load configuration from {}", args.config_dir.display()))?;

    if let Some(database_url) = args.database_url {
        config.database.url = database_url;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    telemetry::init_with_config(TelemetryConfig::from(&config.logging));
    metrics::init_metrics();

    debug!(
        environment = %args.environment,
        database = %config.database.url,
        repositories = config.repositories.len(),
        "Configuration loaded"
    );

    let (pool, registry) = open(&config).await?;
    let result = run(&registry, args.command).await;
    close_pool(pool).await;
    result
}

/// Connect to the database and blob store and open every repository
async fn open(config: &AppConfig) -> Result<(SqlitePool, RepositoryRegistry)> {
    if let Some(dir) = config.database.data_dir() {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }

    let pool_config = config
        .database
        .pool_config(config.logging.level.eq_ignore_ascii_case("trace"));
    let pool = create_pool(&pool_config)
        .await
        .context("Failed to create database pool")?;

    let blob_store = pkgstore_blob::from_config(&config.blob_store)
        .await
        .context("Failed to open blob store")?;

    let registry = RepositoryRegistryBuilder::new()
        .pool(pool.clone())
        .blob_store(blob_store)
        .repositories(config.repositories.iter().cloned())
        .build()
        .await
        .context("Failed to open repositories")?;

    info!(
        blob_store = %config.blob_store.name(),
        repositories = registry.names().count(),
        "Content store opened"
    );

    Ok((pool, registry))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Command {
    /// Repository and operation name for commands that target one repository
    fn target(&self) -> Option<(&str, &'static str)> {
        let target = match self {
            Command::Put { repository, .. } => (repository.as_str(), "put"),
            Command::Get { repository, .. } => (repository.as_str(), "get"),
            Command::Exists { repository, .. } => (repository.as_str(), "exists"),
            Command::Delete { repository, .. } => (repository.as_str(), "delete"),
            Command::Purge { repository, .. } => (repository.as_str(), "purge"),
            Command::Snapshots(args) => (args.repository.as_str(), "snapshots"),
            Command::UnpublishIndex { repository } => (repository.as_str(), "unpublish_index"),
            Command::Repositories | Command::Metrics => return None,
        };
        Some(target)
    }
}

/// Run one command, recording its outcome
async fn run(registry: &RepositoryRegistry, command: Command) -> Result<()> {
    let Some((repository, operation)) = command.target() else {
        return report(registry, command).await;
    };
    let repository = repository.to_string();

    let timer = MetricsTimer::operation(operation);
    let facet = registry.require(&repository)?;
    let result = execute(facet, command).await;
    timer.stop();

    metrics::record_operation(&repository, operation, result.is_ok());
    result
}

async fn execute(facet: &ContentFacet, command: Command) -> Result<()> {
    match command {
        Command::Put {
            path,
            file,
            content_type,
            ..
        } => {
            let mut payload = Payload::from_file(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            if let Some(content_type) = content_type {
                payload = payload.with_content_type(content_type);
            }
            let descriptor = facet.put(&path, payload).await?;
            print_json(&descriptor)
        }

        Command::Get { path, output, .. } => {
            let content = facet
                .get(&path)
                .await?
                .ok_or_else(|| anyhow!("{} not found in {}", path, facet.name()))?;
            if let Some(output) = output {
                tokio::fs::write(&output, &content.bytes)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?;
            }
            print_json(&content.descriptor)
        }

        Command::Exists { path, .. } => {
            let exists = facet.exists(&path).await?;
            print_json(&json!({ "path": path, "exists": exists }))
        }

        Command::Delete { paths, .. } => match paths.as_slice() {
            [path] => {
                let deleted = facet.delete(path).await?;
                print_json(&json!({ "path": path, "deleted": deleted }))
            }
            _ => {
                let deleted = facet.delete_paths(&paths).await?;
                print_json(&json!({ "requested": paths.len(), "deleted": deleted }))
            }
        },

        Command::Purge { ids, .. } => {
            let purged = facet.purge_components(&ids).await?;
            print_json(&json!({ "requested": ids.len(), "purged": purged }))
        }

        Command::Snapshots(args) => snapshots(facet, args).await,

        Command::UnpublishIndex { .. } => {
            let maven = facet
                .as_maven()
                .ok_or_else(|| anyhow!("{} is not a maven2 repository", facet.name()))?;
            let deleted = maven.unpublish_index().await?;
            print_json(&json!({ "deleted": deleted }))
        }

        Command::Repositories | Command::Metrics => {
            bail!("{:?} does not target a repository", command)
        }
    }
}

async fn snapshots(facet: &ContentFacet, args: SnapshotArgs) -> Result<()> {
    let candidates = match (args.min_retained, args.grace_days) {
        (Some(minimum), _) => facet.find_snapshot_candidates(minimum).await?,
        (None, Some(days)) => {
            facet
                .find_snapshots_after_release(Duration::days(days), Utc::now())
                .await?
        }
        (None, None) => bail!("either --min-retained or --grace-days is required"),
    };

    let summaries: Vec<ComponentSummary> = candidates.iter().map(ComponentSummary::from).collect();
    if !args.purge {
        return print_json(&summaries);
    }

    let ids: Vec<ComponentId> = candidates.iter().map(|c| c.id).collect();
    let purged = facet.purge_components(&ids).await?;
    info!(repository = %facet.name(), purged, "Snapshot components purged");
    print_json(&json!({ "candidates": summaries, "purged": purged }))
}

/// Commands that look at the whole store
async fn report(registry: &RepositoryRegistry, command: Command) -> Result<()> {
    match command {
        Command::Repositories => {
            let usage = registry.usage().await?;
            let repositories: Vec<_> = registry
                .facets()
                .map(|facet| {
                    let config = facet.config();
                    json!({
                        "name": config.name,
                        "format": config.format.to_string(),
                        "type": config.repo_type,
                        "write_policy": config.write_policy.to_string(),
                        "components": usage.get(&config.name).map(|u| u.components),
                        "assets": usage.get(&config.name).map(|u| u.assets),
                    })
                })
                .collect();
            print_json(&repositories)
        }
        Command::Metrics => {
            metrics::update_from(registry).await?;
            let rendered = metrics::render_metrics().map_err(|e| anyhow!(e))?;
            print!("{}", rendered);
            Ok(())
        }
        other => bail!("{:?} targets a single repository", other),
    }
}
