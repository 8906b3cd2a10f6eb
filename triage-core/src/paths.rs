use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "URL_TRIAGE_HOME";

pub fn base_dir() -> anyhow::Result<PathBuf> {
  if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
    return Ok(PathBuf::from(dir));
  }
  if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
    return Ok(PathBuf::from(xdg).join("url-triage"));
  }
  if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
    return Ok(PathBuf::from(home).join(".local").join("share").join("url-triage"));
  }
  if let Some(program_data) = std::env::var_os("ProgramData").filter(|v| !v.is_empty()) {
    return Ok(PathBuf::from(program_data).join("url-triage"));
  }
  anyhow::bail!("cannot determine data directory; set {HOME_ENV}")
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

pub fn patterns_dir(base: &Path) -> PathBuf {
  base.join("patterns")
}

pub fn scans_dir(base: &Path) -> PathBuf {
  base.join("scans")
}
