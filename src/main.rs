mod cache;
mod churches;
mod config;
mod logging;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::Report, Result};
use std::path::PathBuf;

use churches::{CachedChurchClient, ChurchError};

#[derive(Parser, Debug)]
#[command(name = "churchdir")]
#[command(about = "Church directory client with proxy fallback and offline cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/churchdir/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Use the local development server
  #[arg(long, conflicts_with = "server")]
  local: bool,

  /// Override the server base URL
  #[arg(long)]
  server: Option<String>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch every church
  List,
  /// Fetch a single church by id
  Get { id: String },
  /// Check whether the server is reachable
  Ping,
  /// List the server's tables
  Tables,
  /// Show what the local cache holds, without touching the network
  Cache,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override server selection if specified on command line
  let config = match (args.server, args.local) {
    (Some(url), _) => config::Config {
      server: config::ServerConfig {
        render_url: url,
        use_local: false,
        ..config.server
      },
      ..config
    },
    (None, true) => config::Config {
      server: config::ServerConfig {
        use_local: true,
        ..config.server
      },
      ..config
    },
    (None, false) => config,
  };

  let client = CachedChurchClient::from_config(&config)?;

  match args.command {
    Command::List => {
      let result = client.fetch_all().await.map_err(exhausted)?;
      eprintln!("{} churches from {}", result.data.len(), result.source);
      if let Some(cached_at) = result.cached_at {
        eprintln!("last synced {}", cached_at.to_rfc3339());
      }
      println!("{}", serde_json::to_string_pretty(&result.data)?);
    }
    Command::Get { id } => {
      let result = client.fetch_one(&id).await.map_err(exhausted)?;
      eprintln!("church {} from {}", id, result.source);
      println!("{}", serde_json::to_string_pretty(&result.data)?);
    }
    Command::Ping => {
      let status = client.check_server_status().await;
      println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Command::Tables => {
      for table in client.list_tables().await.map_err(exhausted)? {
        println!("{}", table);
      }
    }
    Command::Cache => {
      let data = client.cache().get_all();
      println!("{} churches cached", data.len());
      match client.cache().last_sync() {
        Some(at) => println!("last synced {}", at.to_rfc3339()),
        None => println!("never synced"),
      }
    }
  }

  Ok(())
}

/// Log every failed attempt before surfacing the generic error.
fn exhausted(err: ChurchError) -> Report {
  let ChurchError::Exhausted { attempts } = &err;
  for attempt in attempts {
    tracing::debug!(route = %attempt.route, error = %attempt.error, "failed attempt");
  }
  err.into()
}
