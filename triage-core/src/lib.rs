pub mod blender;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod features;
pub mod logging;
pub mod paths;
pub mod pattern_store;
pub mod pipeline;
pub mod rules_engine;
pub mod runtime;
pub mod scan_store;
pub mod types;

pub use blender::blend;
pub use features::extract_features;
pub use pipeline::ScanPipeline;
pub use rules_engine::score_threat;

/// Loads config (read-only under `--dry-run`), starts logging, and runs one
/// console command.
pub fn run_console(args: &[String]) -> anyhow::Result<()> {
  let dry_run = runtime::configure_from_args(args);
  let base = paths::base_dir()?;
  let config_path = paths::config_path(&base);
  let cfg = if dry_run {
    config::load_or_default_readonly(&config_path)?
  } else {
    config::load_or_create_default(&config_path)?
  };

  logging::init(&paths::logs_dir(&base), &cfg.logging, logging::Sink::FileAndStderr)?;
  tracing::debug!(base = %base.display(), dry_run, "url-triage starting");

  console::run_console_command(&cfg, &base, args)
}
