//! `scholink`: operator commands for the link broker.
//!
//! Works directly against the configured SQLite graph store and search
//! index; events are processed in the foreground without retries.
//!
//! # Usage
//!
//! ```
//! scholink events load ./dumps/ --kind relationship_created
//! scholink events rerun --errors
//! scholink search reindex --rollover --split
//! scholink monitor report --json
//! ```

mod broker;
mod events;
mod harvester;
mod metadata;
mod monitor;
mod search;

use std::path::PathBuf;

use anyhow::{Result, bail};
use broker::Broker;
use clap::{Args, Parser, Subcommand};
use scholink_core::{event::EventKind, graph::GraphStore};
use scholink_server::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scholink", author, version, about = "Scholink link broker operator commands")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load and reprocess ingestion events.
  #[command(subcommand)]
  Events(EventsCommand),
  /// Maintain the search index.
  #[command(subcommand)]
  Search(SearchCommand),
  /// Load object metadata.
  #[command(subcommand)]
  Metadata(MetadataCommand),
  /// Show what a harvest would fetch.
  #[command(subcommand)]
  Harvester(HarvesterCommand),
  #[command(subcommand)]
  Monitor(MonitorCommand),
}

#[derive(Subcommand, Debug)]
enum EventsCommand {
  /// Store and process every JSON file in a directory (or a single file).
  Load {
    path: PathBuf,
    #[arg(long, default_value = "relationship_created")]
    kind: EventKind,
  },
  /// Process stored events again.
  Rerun(RerunArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RerunArgs {
  #[arg(long, num_args = 1..)]
  id:         Vec<Uuid>,
  #[arg(long)]
  all:        bool,
  #[arg(long)]
  errors:     bool,
  #[arg(long)]
  processing: bool,
}

impl RerunArgs {
  fn selection(self) -> events::Selection {
    if self.all {
      events::Selection::All
    } else if self.errors {
      events::Selection::Errors
    } else if self.processing {
      events::Selection::Processing
    } else {
      events::Selection::Ids(self.id)
    }
  }
}

#[derive(Subcommand, Debug)]
enum SearchCommand {
  /// Project every group into a fresh index.
  Reindex {
    /// Move the read alias to the new index when done.
    #[arg(long)]
    rollover: bool,
    /// Write in batches of version groups.
    #[arg(long)]
    split:    bool,
  },
  /// Point the read alias at the write index.
  Rollover {
    #[arg(long, value_name = "N")]
    keep_old_indices: Option<usize>,
  },
}

#[derive(Subcommand, Debug)]
enum MetadataCommand {
  Load { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum HarvesterCommand {
  /// Normalise the given identifiers.
  Metadata {
    #[arg(required = true)]
    ids:    Vec<String>,
    #[arg(long, default_value = "doi")]
    scheme: String,
  },
  /// List the identifiers touched by the given events.
  Events {
    #[arg(required = true)]
    ids: Vec<Uuid>,
  },
}

#[derive(Subcommand, Debug)]
enum MonitorCommand {
  /// Event, error and graph counts.
  Report {
    #[arg(long)]
    json: bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let broker = Broker::open(settings).await?;
  run(&broker, cli.command).await
}

async fn run(broker: &Broker, command: Command) -> Result<()> {
  match command {
    Command::Events(EventsCommand::Load { path, kind }) => {
      let summary = events::load(broker, &path, kind).await?;
      println!(
        "processed {} events ({} failed, {} already loaded)",
        summary.processed, summary.failed, summary.duplicates
      );
      if summary.failed > 0 {
        bail!("{} events failed; see `scholink events rerun --errors`", summary.failed);
      }
    }
    Command::Events(EventsCommand::Rerun(args)) => {
      let summary = events::rerun(broker, args.selection()).await?;
      println!("processed {} events ({} failed)", summary.processed, summary.failed);
    }
    Command::Search(SearchCommand::Reindex { rollover, split }) => {
      let done = search::reindex(broker, rollover, split).await?;
      println!("indexed {} documents into {}", done.projection.written, done.index);
      if let Some(rollover) = done.rollover {
        print_rollover(&rollover);
      }
    }
    Command::Search(SearchCommand::Rollover { keep_old_indices }) => {
      print_rollover(&search::rollover(broker, keep_old_indices).await?);
    }
    Command::Metadata(MetadataCommand::Load { path }) => {
      let summary = metadata::load(broker, &path).await?;
      println!("updated {} objects, reindexed {} documents", summary.objects, summary.documents);
    }
    Command::Harvester(HarvesterCommand::Metadata { ids, scheme }) => {
      for key in harvester::metadata(&ids, &scheme)? {
        println!("{key}");
      }
    }
    Command::Harvester(HarvesterCommand::Events { ids }) => {
      for (event_id, identifiers) in harvester::events(broker, &ids).await? {
        for identifier in identifiers {
          println!("{event_id}\t{}:{}", identifier.scheme, identifier.value);
        }
      }
    }
    Command::Monitor(MonitorCommand::Report { json }) => {
      let report = broker.graph.status_report().await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        print!("{}", monitor::render(&report));
      }
    }
  }
  Ok(())
}

fn print_rollover(rollover: &scholink_core::index::Rollover) {
  println!("read alias -> {}", rollover.read_index);
  for name in &rollover.deleted {
    println!("deleted {name}");
  }
}
