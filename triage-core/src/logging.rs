use crate::config::LoggingConfig;
use crate::runtime;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "url-triage.log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
  /// Daily rolling file only; used by the bulk scanner whose stdout is a report.
  File,
  FileAndStderr,
}

pub fn init(log_dir: &Path, cfg: &LoggingConfig, sink: Sink) -> anyhow::Result<()> {
  fs::create_dir_all(log_dir)?;
  let removed = prune_for_run(log_dir, cfg.retention_days, SystemTime::now());

  let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
  let _ = FILE_GUARD.set(guard);

  let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));
  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(file_writer)
    .with_target(true);

  let stderr_layer = (sink == Sink::FileAndStderr).then(|| {
    tracing_subscriber::fmt::layer()
      .with_ansi(false)
      .with_writer(std::io::stderr)
      .with_target(false)
  });

  tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()?;

  if removed > 0 {
    tracing::debug!(removed, "expired log files removed");
  }
  Ok(())
}

/// Log output itself is the one write a dry run keeps; pruning old files is not.
fn prune_for_run(log_dir: &Path, retention_days: u64, now: SystemTime) -> usize {
  if runtime::is_dry_run() {
    return 0;
  }
  cleanup_old_logs(log_dir, retention_days, now)
}

/// Returns how many files were deleted. `retention_days = 0` keeps everything.
fn cleanup_old_logs(log_dir: &Path, retention_days: u64, now: SystemTime) -> usize {
  if retention_days == 0 {
    return 0;
  }

  let cutoff = now
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let Ok(entries) = fs::read_dir(log_dir) else {
    return 0;
  };

  entries
    .flatten()
    .filter(|e| is_triage_log_file(&e.path()))
    .filter(|e| {
      e.metadata()
        .and_then(|m| m.modified())
        .map(|modified| modified < cutoff)
        .unwrap_or(false)
    })
    .filter(|e| fs::remove_file(e.path()).is_ok())
    .count()
}

fn is_triage_log_file(path: &Path) -> bool {
  let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
    return false;
  };

  name == LOG_FILE_NAME
    || name
      .strip_prefix(LOG_FILE_NAME)
      .is_some_and(|rest| rest.starts_with('.'))
}
