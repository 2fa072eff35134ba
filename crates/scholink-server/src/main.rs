//! scholink-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus
//! `SCHOLINK_*` environment variables, opens the SQLite graph store and
//! search index, starts the event workers and the janitor, and serves the
//! HTTP API.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```
//! cargo run -p scholink-server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use scholink_api::{AppState, AuthConfig};
use scholink_core::processor::EventProcessor;
use scholink_server::{Settings, janitor, open_backends, router, worker};
use tokio::{net::TcpListener, sync::mpsc};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Scholink link broker server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = Settings::load(&cli.config)?;
  if settings.auth_password_hash.is_empty() {
    tracing::warn!("auth_password_hash is not set; POST /event will reject every request");
  }

  let (graph, index) = open_backends(&settings).await?;
  let (queue, jobs) = mpsc::channel(settings.queue_capacity.max(1));

  // Workers and janitor.
  let processor = EventProcessor::new(graph.clone(), index.clone(), settings.processor_settings());
  let workers = worker::spawn(processor, jobs, queue.clone(), settings.worker_settings());
  tokio::spawn(janitor::run(
    graph.clone(),
    queue.clone(),
    settings.janitor_interval(),
    settings.processing_stale_after(),
  ));

  // Events accepted before a restart but never processed.
  {
    let graph = graph.clone();
    let queue = queue.clone();
    tokio::spawn(async move {
      match janitor::enqueue_new(graph.as_ref(), &queue).await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "re-enqueued new events"),
        Err(e) => tracing::warn!(error = %e, "could not re-enqueue new events"),
      }
    });
  }

  let state = AppState {
    graph,
    index,
    queue,
    auth: Arc::new(AuthConfig {
      username:      settings.auth_username.clone(),
      password_hash: settings.auth_password_hash.clone(),
    }),
    settings: settings.api_settings(),
  };
  let app = router(state);
  let address = format!("{}:{}", settings.host, settings.port);

  tracing::info!(workers = workers.len(), "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
