use super::{normalize_domain, pick_match, PatternStore};
use crate::config::{write_atomic, MatchStrategy};
use crate::runtime;
use crate::types::{now_unix_ms, DomainPattern, UrlFeatures};
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// One TOML file per domain. File names are the SHA-256 of the normalized domain
/// so arbitrary user input never becomes a path component.
pub struct FileStore {
  dir: PathBuf,
  strategy: MatchStrategy,
}

impl FileStore {
  pub fn new(dir: PathBuf, strategy: MatchStrategy) -> Self {
    Self { dir, strategy }
  }

  fn path_for(&self, domain: &str) -> PathBuf {
    let digest = Sha256::digest(normalize_domain(domain).as_bytes());
    self.dir.join(format!("{digest:x}.toml"))
  }

  fn read_one(path: &Path) -> anyhow::Result<Option<DomainPattern>> {
    if !path.exists() {
      return Ok(None);
    }
    let raw = fs::read_to_string(path)
      .with_context(|| format!("read pattern file {}", path.display()))?;
    let pattern = toml::from_str(&raw)
      .with_context(|| format!("parse pattern file {}", path.display()))?;
    Ok(Some(pattern))
  }

  fn read_all(&self) -> anyhow::Result<Vec<DomainPattern>> {
    if !self.dir.exists() {
      return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let entries = fs::read_dir(&self.dir)
      .with_context(|| format!("list pattern directory {}", self.dir.display()))?;
    for e in entries.flatten() {
      let path = e.path();
      if path.extension().and_then(|s| s.to_str()) != Some("toml") {
        continue;
      }
      match Self::read_one(&path) {
        Ok(Some(p)) => out.push(p),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = ?e, "skipping unreadable pattern file"),
      }
    }
    Ok(out)
  }
}

impl PatternStore for FileStore {
  fn lookup(&self, domain: &str) -> anyhow::Result<Option<DomainPattern>> {
    match self.strategy {
      MatchStrategy::Exact => {
        if normalize_domain(domain).is_empty() {
          return Ok(None);
        }
        Self::read_one(&self.path_for(domain))
      }
      MatchStrategy::Substring => Ok(pick_match(self.strategy, domain, self.read_all()?)),
    }
  }

  fn upsert(
    &self,
    domain: &str,
    features: &UrlFeatures,
    blended_probability: f64,
  ) -> anyhow::Result<DomainPattern> {
    let key = normalize_domain(domain);
    let path = self.path_for(&key);
    let now = now_unix_ms();

    let pattern = match Self::read_one(&path)? {
      Some(mut existing) => {
        existing.observe(features, blended_probability, now);
        existing
      }
      None => DomainPattern::first(&key, features, blended_probability, now),
    };

    if runtime::is_dry_run() {
      tracing::warn!(
        domain = %pattern.domain,
        detection_count = pattern.detection_count,
        "DRY-RUN: would store domain pattern"
      );
      return Ok(pattern);
    }

    let raw = toml::to_string_pretty(&pattern)?;
    write_atomic(&path, &raw)?;
    Ok(pattern)
  }

  fn list_recent(&self, limit: usize) -> anyhow::Result<Vec<DomainPattern>> {
    let mut out = self.read_all()?;
    out.sort_by(|a, b| b.last_detected_unix_ms.cmp(&a.last_detected_unix_ms));
    out.truncate(limit);
    Ok(out)
  }
}
