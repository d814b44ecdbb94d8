use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use metagroove::config::Config;
use metagroove::extract::{Extractor, Source};
use metagroove::filter::PartialFilterConfig;
use metagroove::node::FeedNode;
use metagroove::pipeline::{Controller, ControllerOptions, ItemOutcome, SnapshotHost};
use metagroove::resolve::YearResolver;
use metagroove::service::Service;
use metagroove::settings::{GlobalSettings, SettingsStore};
use metagroove::storage::{Database, DatabaseError, DATA_API_KEY};

/// Get the config directory path (~/.config/metagroove/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("metagroove"))
}

#[derive(Parser, Debug)]
#[command(
    name = "metagroove",
    about = "Filter media feeds by year, duration, keywords and tags"
)]
struct Args {
    /// Config file (default: ~/.config/metagroove/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one processing pass over a serialized page tree
    Scan {
        /// JSON page tree
        snapshot: PathBuf,
        #[arg(long, value_parser = parse_source)]
        source: Source,
        /// Context whose configuration applies
        #[arg(long, default_value_t = 0)]
        context: i64,
        /// Print the full outcome list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-context filter configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Resolve the publish year of an item id
    Resolve { item_id: String },
    /// Year cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Data API credential
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
    /// Show or toggle per-source switches and display options
    Sources {
        #[arg(long, value_parser = parse_source)]
        enable: Vec<Source>,
        #[arg(long, value_parser = parse_source)]
        disable: Vec<Source>,
        #[arg(long)]
        show_verified_year: Option<bool>,
    },
    /// Answer JSON requests on stdin, one per line
    Serve,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Get { context: i64 },
    /// Store a (partial) JSON configuration, filled from defaults
    Set { context: i64, json: String },
    Delete { context: i64 },
    Inherit { child: i64, parent: i64 },
    List,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    Stats,
    Clear,
    /// Remove expired entries
    Prune,
}

#[derive(Subcommand, Debug)]
enum CredentialAction {
    Set { value: String },
    Show {
        #[arg(long)]
        reveal: bool,
    },
    Clear,
}

fn parse_source(s: &str) -> Result<Source, String> {
    s.parse()
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}{}", "*".repeat(secret.chars().count().saturating_sub(4).min(12)))
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database is locked by another metagroove process.");
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to set config directory permissions to 0700");
        }
    }
    Ok(())
}

fn print_outcome(outcome: &ItemOutcome) {
    let Some(record) = &outcome.record else {
        println!("{:>6}  skipped            (no title)", outcome.handle);
        return;
    };
    let status = if outcome.hidden() { "hidden" } else { "shown" };
    let rule = outcome
        .decision
        .as_ref()
        .and_then(|d| d.hidden_by)
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());
    let year = record
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "????".to_string());
    let duration = record
        .duration_seconds
        .map(|d| format!("{}:{:02}", d / 60, d % 60))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>6}  {:<6} {:<9} {} {:>7}  {} / {}",
        outcome.handle, status, rule, year, duration, record.title, record.author
    );
}

async fn scan(
    config: &Config,
    service: &Service,
    snapshot: &Path,
    source: Source,
    context: i64,
    json: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(snapshot)
        .with_context(|| format!("Failed to read snapshot '{}'", snapshot.display()))?;
    let root: FeedNode =
        serde_json::from_str(&content).context("Snapshot is not a valid page tree")?;

    let filter = service.settings().get(context).await;
    let global = GlobalSettings::load(service.resolver().database()).await;
    let options = ControllerOptions {
        rescan_interval: config.rescan_interval(),
        scroll: config.scroll,
        show_verified_year: global.show_verified_year,
        source_enabled: global.source_enabled(source),
    };
    if !options.source_enabled {
        eprintln!("Source '{source}' is disabled; enable it with `metagroove sources --enable {source}`.");
    }

    let extractor = Extractor::new(source, Utc::now().date_naive());
    let mut controller = Controller::new(
        SnapshotHost::new(root),
        extractor,
        Arc::new(service.resolver().clone()),
        filter,
        options,
    );

    // No live host: close the channel so the pass ends once work drains.
    let (events_tx, events_rx) = mpsc::channel(1);
    drop(events_tx);

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = controller.run(events_rx, shutdown).await;
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for outcome in report.outcomes.values() {
        print_outcome(outcome);
    }
    println!(
        "{} items, {} hidden, {} skipped",
        report.outcomes.len(),
        report.hidden_count(),
        report.abstained_count()
    );
    Ok(())
}

async fn serve(service: &Service) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = service.handle_json(&line).await;
        reply.push('\n');
        stdout.write_all(reply.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;

    let db_path = match args.database.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            ensure_private_dir(&config_dir)?;
            config_dir.join("metagroove.db")
        }
    };
    let db = open_database(&db_path).await?;

    let resolver = YearResolver::from_config(db.clone(), &config)
        .context("Invalid remote endpoint configuration")?;
    let service = Service::new(SettingsStore::new(db.clone()), resolver);

    match args.command {
        Command::Scan {
            snapshot,
            source,
            context,
            json,
        } => scan(&config, &service, &snapshot, source, context, json).await?,

        Command::Config { action } => match action {
            ConfigAction::Get { context } => {
                let config = service.settings().get(context).await;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Set { context, json } => {
                let partial: PartialFilterConfig =
                    serde_json::from_str(&json).context("Configuration is not valid JSON")?;
                let stored = service.settings().set_partial(context, &partial).await?;
                println!("{}", serde_json::to_string_pretty(&stored)?);
            }
            ConfigAction::Delete { context } => {
                service.context_removed(context).await;
                println!("Deleted settings for context {context}");
            }
            ConfigAction::Inherit { child, parent } => {
                let config = service.settings().inherit(child, parent).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::List => {
                for context in service.settings().contexts().await? {
                    println!("{context}");
                }
            }
        },

        Command::Resolve { item_id } => {
            let resolution = service.resolver().resolve(&item_id).await;
            match resolution.year {
                Some(year) if resolution.was_cached => println!("{year} (cached)"),
                Some(year) => println!("{year}"),
                None => println!("unknown"),
            }
        }

        Command::Cache { action } => match action {
            CacheAction::Stats => {
                let stats = db.year_cache_stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            CacheAction::Clear => {
                let removed = db.clear_year_cache().await?;
                println!("Removed {removed} entries");
            }
            CacheAction::Prune => {
                let now = Utc::now().timestamp_millis();
                let removed = db
                    .evict_expired_years(now, service.resolver().ttl_ms())
                    .await?;
                println!("Removed {removed} expired entries");
            }
        },

        Command::Credential { action } => match action {
            CredentialAction::Set { value } => {
                db.set_credential(DATA_API_KEY, &SecretString::from(value))
                    .await?;
                println!("Credential stored");
            }
            CredentialAction::Show { reveal } => {
                let stored = db.get_credential(DATA_API_KEY).await?;
                let (key, origin) = match stored {
                    Some(key) => (Some(key), "stored"),
                    None => (config.data_api_key(), "config"),
                };
                match key {
                    Some(key) if reveal => println!("{} ({origin})", key.expose_secret()),
                    Some(key) => println!("{} ({origin})", mask(key.expose_secret())),
                    None => println!("No credential configured"),
                }
            }
            CredentialAction::Clear => {
                let existed = db.delete_credential(DATA_API_KEY).await?;
                println!(
                    "{}",
                    if existed {
                        "Credential removed"
                    } else {
                        "No stored credential"
                    }
                );
            }
        },

        Command::Sources {
            enable,
            disable,
            show_verified_year,
        } => {
            for source in enable {
                GlobalSettings::set_source_enabled(&db, source, true).await?;
            }
            for source in disable {
                GlobalSettings::set_source_enabled(&db, source, false).await?;
            }
            if let Some(on) = show_verified_year {
                GlobalSettings::set_show_verified_year(&db, on).await?;
            }
            let global = GlobalSettings::load(&db).await;
            for source in Source::ALL {
                let state = if global.source_enabled(source) {
                    "enabled"
                } else {
                    "disabled"
                };
                println!("{:<14} {state}", source.as_str());
            }
            println!("show_verified_year {}", global.show_verified_year);
        }

        Command::Serve => serve(&service).await?,
    }

    Ok(())
}
