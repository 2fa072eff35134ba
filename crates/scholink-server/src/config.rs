//! Process-wide settings, read from an optional TOML file overlaid by
//! `SCHOLINK_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use scholink_api::ApiSettings;
use scholink_core::{group::GroupType, processor::ProcessorSettings};
use serde::Deserialize;

use crate::worker::WorkerSettings;

/// Runtime configuration shared by the server and the operator CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub host:                           String,
  pub port:                           u16,
  pub database_path:                  PathBuf,
  pub index_path:                     PathBuf,
  pub auth_username:                  String,
  /// Argon2 PHC string; see `scholink-server --hash-password`.
  pub auth_password_hash:             String,
  pub event_max_items:                usize,
  pub search_indexing_enabled:        bool,
  pub harvest_after_event_process:    bool,
  pub retry_max:                      u32,
  pub retry_delay_seconds:            u64,
  pub rollover_keep:                  usize,
  pub query_default_grouping:         GroupType,
  pub workers:                        usize,
  pub event_timeout_seconds:          u64,
  pub janitor_interval_seconds:       u64,
  pub processing_stale_after_seconds: u64,
  pub queue_capacity:                 usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      host:                           "127.0.0.1".into(),
      port:                           5000,
      database_path:                  PathBuf::from("scholink.db"),
      index_path:                     PathBuf::from("scholink-index.db"),
      auth_username:                  String::new(),
      auth_password_hash:             String::new(),
      event_max_items:                200,
      search_indexing_enabled:        true,
      harvest_after_event_process:    false,
      retry_max:                      1,
      retry_delay_seconds:            600,
      rollover_keep:                  1,
      query_default_grouping:         GroupType::Identity,
      workers:                        4,
      event_timeout_seconds:          300,
      janitor_interval_seconds:       600,
      processing_stale_after_seconds: 86_400,
      queue_capacity:                 1024,
    }
  }
}

impl Settings {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::build(Config::builder().add_source(File::from(path).required(false)))
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    let mut settings: Settings = builder
      .add_source(Environment::with_prefix("SCHOLINK").try_parsing(true))
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise Settings")?;
    settings.database_path = expand_tilde(&settings.database_path);
    settings.index_path = expand_tilde(&settings.index_path);
    Ok(settings)
  }

  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      event_max_items:  self.event_max_items,
      default_grouping: self.query_default_grouping,
    }
  }

  pub fn processor_settings(&self) -> ProcessorSettings {
    ProcessorSettings { indexing_enabled: self.search_indexing_enabled }
  }

  pub fn worker_settings(&self) -> WorkerSettings {
    WorkerSettings {
      workers:       self.workers.max(1),
      event_timeout: Duration::from_secs(self.event_timeout_seconds),
      retry_max:     self.retry_max,
      retry_delay:   Duration::from_secs(self.retry_delay_seconds),
      harvest:       self.harvest_after_event_process,
    }
  }

  pub fn janitor_interval(&self) -> Duration { Duration::from_secs(self.janitor_interval_seconds) }

  pub fn processing_stale_after(&self) -> Duration {
    Duration::from_secs(self.processing_stale_after_seconds)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
