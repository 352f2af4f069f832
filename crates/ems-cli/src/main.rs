//! EMS - command-line driver for the local-first employee data cache.
//!
//! Reads are answered from the local snapshot; writes go through the
//! optimistic sync cache and are confirmed against the remote data store.

mod format;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ems_core::{
    ApiClient, AppData, Config, EntityKind, FileStore, LoadMode, LocalCache, Session, SyncCache,
    SyncStatus,
};

use format::{format_timestamp, record_line};

type Cache = SyncCache<ApiClient, Arc<FileStore>>;

// ============================================================================
// Arguments
// ============================================================================

/// EMS local-first employee data cache
#[derive(Parser)]
#[command(name = "ems")]
#[command(about = "Local-first cache for the EMS employee data store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Commands {
    /// Show sync status and record counts
    Status,

    /// Reload the snapshot from the data store
    Refresh,

    /// List records of a kind
    List {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
    },

    /// Print one record as JSON
    Show {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        id: u64,
    },

    /// Create or update a record
    Upsert {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        /// Record as a JSON object, e.g. '{"Bank_Name": "SBI"}'
        #[arg(value_parser = parse_record)]
        record: Value,
    },

    /// Delete a record
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        id: u64,
    },

    /// Select or unselect a post for a user
    TogglePost { user_id: u64, post_id: u64 },

    /// Sign in
    Login { username: Option<String> },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Refresh in the background until Ctrl-C
    Watch,
}

/// One of user, department, office, bank, branch, post, payscale, employee
fn parse_kind(arg: &str) -> Result<EntityKind, String> {
    EntityKind::parse(arg).ok_or_else(|| {
        let kinds: Vec<String> = EntityKind::ALL.iter().map(|k| k.to_string().to_lowercase()).collect();
        format!("unknown kind '{}' (expected one of: {})", arg, kinds.join(", "))
    })
}

fn parse_record(arg: &str) -> Result<Value, String> {
    match serde_json::from_str(arg) {
        Ok(record @ Value::Object(_)) => Ok(record),
        Ok(_) => Err("record must be a JSON object".to_string()),
        Err(e) => Err(format!("record is not valid JSON: {}", e)),
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr and to a daily file under `log_dir`. The returned guard
/// flushes the file writer and must be held until exit.
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, "ems.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn connect(config: &Config, store: &Arc<FileStore>) -> Result<Arc<Cache>> {
    let endpoint = config.endpoint.as_deref().with_context(|| {
        format!(
            "No data store endpoint configured. Set {} or add \"endpoint\" to the config file",
            ems_core::config::ENDPOINT_ENV
        )
    })?;
    let settings = config.sync_settings();
    let client = ApiClient::new(endpoint)?.with_timeouts(settings.read_timeout, settings.write_timeout);
    Ok(Arc::new(SyncCache::new(client, Arc::clone(store), settings)))
}

/// Snapshot from the local cache only, for commands that work offline.
fn cached_snapshot(store: &Arc<FileStore>) -> AppData {
    match LocalCache::new(Arc::clone(store)).load_snapshot() {
        Ok(Some(cached)) => cached.data,
        Ok(None) => AppData::default(),
        Err(e) => {
            warn!(error = %e, "Cached snapshot unreadable");
            AppData::default()
        }
    }
}

fn collection(data: &AppData, kind: EntityKind) -> Result<Vec<Value>> {
    let mut value = serde_json::to_value(data)?;
    Ok(match value.get_mut(kind.collection_key()).map(Value::take) {
        Some(Value::Array(records)) => records,
        _ => Vec::new(),
    })
}

fn require_login(session: &Session<Arc<FileStore>>) -> Result<()> {
    match session.current() {
        Some(user) => {
            info!(user_id = user.user_id, "Acting as signed-in user");
            Ok(())
        }
        None => bail!("Not signed in. Run `ems login` first"),
    }
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("{} [{}]: ", label, default),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    Ok(match (line.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => line,
    })
}

fn print_status(view_status: &SyncStatus, cache: &Cache) {
    println!("Status:      {}", view_status);
    println!("Last synced: {}", format_timestamp(cache.last_synced_at()));
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_result = Config::load();
    let mut config = config_result.as_ref().cloned().unwrap_or_default();
    let cache_dir = config.cache_dir()?;
    let _log_guard = init_tracing(&cache_dir.join("logs"));
    if let Err(e) = &config_result {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(?cache_dir, "EMS starting");

    let store = Arc::new(FileStore::new(cache_dir)?);
    let mut session = Session::new(Arc::clone(&store));
    if let Err(e) = session.load() {
        warn!(error = %e, "Failed to restore session");
    }

    match cli.command {
        Commands::Status => {
            let data = cached_snapshot(&store);
            let age = LocalCache::new(Arc::clone(&store)).snapshot_age();
            println!("Cached snapshot: {}", age.as_deref().unwrap_or("none"));
            for (kind, count) in data.counts() {
                println!("  {:<12}{:>6}", kind.to_string(), count);
            }
            println!("  {:<12}{:>6}", "Selections", data.user_post_selections.len());
            match session.current() {
                Some(user) => println!("Signed in as {} ({})", user.name, user.user_type),
                None => println!("Not signed in"),
            }
        }
        Commands::Refresh => {
            let cache = connect(&config, &store)?;
            let result = cache.load(LoadMode::Foreground).await;
            print_status(&cache.status(), &cache);
            let data = result?;
            if let Err(e) = session.refresh_identity(&data.users) {
                warn!(error = %e, "Failed to refresh signed-in user");
            }
            for (kind, count) in data.counts() {
                println!("  {:<12}{:>6}", kind.to_string(), count);
            }
        }
        Commands::List { kind } => {
            let records = collection(&cached_snapshot(&store), kind)?;
            if records.is_empty() {
                println!("No {} records cached", kind);
            }
            for record in &records {
                println!("{}", record_line(kind, record));
            }
        }
        Commands::Show { kind, id } => {
            let records = collection(&cached_snapshot(&store), kind)?;
            let record = records
                .iter()
                .find(|r| r.get(kind.id_field()).and_then(Value::as_u64) == Some(id))
                .with_context(|| format!("{} #{} not found in local cache", kind, id))?;
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        Commands::Upsert { kind, record } => {
            require_login(&session)?;
            let cache = connect(&config, &store)?;
            let saved = cache.upsert_json(kind, record).await?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
        Commands::Delete { kind, id } => {
            require_login(&session)?;
            let cache = connect(&config, &store)?;
            cache.delete_json(kind, id).await?;
            println!("Deleted {} #{}", kind, id);
        }
        Commands::TogglePost { user_id, post_id } => {
            require_login(&session)?;
            let cache = connect(&config, &store)?;
            let posts = cache.toggle_user_post_selection(user_id, post_id).await?;
            let posts: Vec<String> = posts.iter().map(u64::to_string).collect();
            println!("User #{} posts: [{}]", user_id, posts.join(", "));
        }
        Commands::Login { username } => {
            let cache = connect(&config, &store)?;
            // Prefer fresh credentials but fall back to the cached user list offline
            if let Err(e) = cache.load(LoadMode::Foreground).await {
                eprintln!("Warning: using cached users ({})", e);
            }
            let username = match username {
                Some(name) => name,
                None => prompt("Username", config.last_username.as_deref())?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let user = session.login(&cache.users(), &username, &password)?;
            println!("Signed in as {} ({})", user.name, user.user_type);

            config.last_username = Some(username);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
        Commands::Logout => {
            session.logout()?;
            println!("Signed out");
        }
        Commands::Whoami => match session.current() {
            Some(user) => println!("{} (#{}, {})", user.name, user.user_id, user.user_type),
            None => println!("Not signed in"),
        },
        Commands::Watch => {
            let cache = connect(&config, &store)?;
            let mut changes = cache.subscribe();
            let refresh = cache.start().await;
            print_status(&cache.status(), &cache);

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            let mut last_status = cache.status();
            loop {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = changes.borrow_and_update().status.clone();
                        if status != last_status {
                            print_status(&status, &cache);
                            last_status = status;
                        }
                    }
                }
            }
            refresh.abort();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(line: &str) -> Result<Commands, clap::Error> {
        Cli::try_parse_from(std::iter::once("ems").chain(line.split_whitespace())).map(|cli| cli.command)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("list offices").unwrap(), Commands::List { kind: EntityKind::Office });
        assert_eq!(
            parse("delete branch 42").unwrap(),
            Commands::Delete { kind: EntityKind::Branch, id: 42 }
        );
        assert_eq!(
            parse("toggle-post 7 3").unwrap(),
            Commands::TogglePost { user_id: 7, post_id: 3 }
        );
        assert_eq!(parse("login").unwrap(), Commands::Login { username: None });
        assert_eq!(parse("whoami").unwrap(), Commands::Whoami);
    }

    #[test]
    fn test_parse_upsert_record() {
        let cli = Cli::try_parse_from(["ems", "upsert", "bank", r#"{"Bank_Name": "SBI"}"#]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Upsert { kind: EntityKind::Bank, record: json!({"Bank_Name": "SBI"}) }
        );

        assert!(Cli::try_parse_from(["ems", "upsert", "bank", "[1]"]).is_err());
        assert!(Cli::try_parse_from(["ems", "upsert", "bank", "{oops"]).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("list vehicles").is_err());
        assert!(parse("show bank").is_err());
        assert!(parse("show bank abc").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("branch"), Ok(EntityKind::Branch));
        let err = parse_kind("vehicle").unwrap_err();
        assert!(err.contains("unknown kind 'vehicle'"));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_collection_values() {
        let mut data = AppData::default();
        data.posts.push(ems_core::models::Post {
            post_id: 3,
            name: "Clerk".to_string(),
            ..Default::default()
        });
        let posts = collection(&data, EntityKind::Post).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["Post_ID"], json!(3));
        assert!(collection(&data, EntityKind::Bank).unwrap().is_empty());
    }
}
