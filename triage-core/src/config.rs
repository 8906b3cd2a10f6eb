use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub logging: LoggingConfig,
  pub store: StoreConfig,
  pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  File,
  Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
  Exact,
  Substring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
  #[serde(default = "default_backend")]
  pub backend: StoreBackend,

  #[serde(default = "default_match_strategy")]
  pub match_strategy: MatchStrategy,

  #[serde(default = "default_true")]
  pub record_scans: bool,
}

fn default_backend() -> StoreBackend {
  StoreBackend::File
}

fn default_match_strategy() -> MatchStrategy {
  MatchStrategy::Exact
}

fn default_true() -> bool {
  true
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      backend: default_backend(),
      match_strategy: default_match_strategy(),
      record_scans: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  Text,
  Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
  #[serde(default = "default_output_format")]
  pub format: OutputFormat,
}

fn default_output_format() -> OutputFormat {
  OutputFormat::Text
}

impl Default for OutputConfig {
  fn default() -> Self {
    Self {
      format: default_output_format(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub store: Option<StoreConfig>,

  #[serde(default)]
  pub output: Option<OutputConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(s) = self.store {
      cfg.store = s;
    }
    if let Some(o) = self.output {
      cfg.output = o;
    }

    if let Some(reason) = validate_logging_config(&cfg.logging) {
      tracing::warn!(
        reason = %reason,
        "logging config invalid; falling back to level \"info\""
      );
      cfg.logging.level = default_log_level();
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.logging.is_none() || self.store.is_none() || self.output.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    } else {
      eprintln!(
        "url-triage: config missing at {}; using defaults in read-only mode (--dry-run).",
        path.display()
      );
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let upgrade = file.needs_upgrade();
      let cfg = file.normalize();
      if allow_writes && upgrade {
        let backup = parent.join(format!("config.toml.bak-{}", now_unix_s()));
        let _ = fs::copy(path, &backup);
        let _ = write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?);
        eprintln!(
          "url-triage: upgraded config defaults written to {} (backup: {})",
          path.display(),
          backup.display()
        );
      } else if !allow_writes && upgrade {
        eprintln!(
          "url-triage: config at {} needs upgrade; proceeding without writing in --dry-run mode.",
          path.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("config.toml.bad-{}", now_unix_s()));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "url-triage: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "url-triage: invalid config at {}; using defaults in read-only mode (--dry-run): {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    logging: Some(cfg.logging.clone()),
    store: Some(cfg.store.clone()),
    output: Some(cfg.output.clone()),
  }
}

/// Write-then-rename so readers never see a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  fs::create_dir_all(parent)?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

fn validate_logging_config(cfg: &LoggingConfig) -> Option<String> {
  if cfg.level.trim().is_empty() {
    return Some("level must not be empty".to_string());
  }
  if tracing_subscriber::EnvFilter::try_new(&cfg.level).is_err() {
    return Some(format!("unparseable level directive: {}", cfg.level));
  }
  None
}

fn now_unix_s() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
