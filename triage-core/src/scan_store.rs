use crate::config::write_atomic;
use crate::runtime;
use crate::types::ScanRecord;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// Append-only history of scan results, one TOML file per scan.
pub struct ScanStore {
  dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanSummary {
  pub scan_id: String,
  pub domain: String,
  pub threat_score: u32,
  pub is_phishing: bool,
  pub scanned_at_unix_ms: u64,
}

impl ScanStore {
  pub fn new(dir: PathBuf) -> Self {
    Self { dir }
  }

  pub fn store(&self, record: &ScanRecord) -> anyhow::Result<PathBuf> {
    let file_path = self.dir.join(format!("{}.toml", record.scan_id));

    if runtime::is_dry_run() {
      tracing::warn!(
        scan_id = %record.scan_id,
        threat_score = record.threat_score,
        "DRY-RUN: would store scan record"
      );
      return Ok(file_path);
    }

    let raw = toml::to_string_pretty(record)?;
    write_atomic(&file_path, &raw)?;
    Ok(file_path)
  }

  pub fn list_recent(&self, limit: usize) -> anyhow::Result<Vec<ScanSummary>> {
    if !self.dir.exists() {
      return Ok(Vec::new());
    }

    let mut out: Vec<ScanSummary> = fs::read_dir(&self.dir)
      .with_context(|| format!("list scan directory {}", self.dir.display()))?
      .flatten()
      .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("toml"))
      .filter_map(|e| read_record(&e.path()))
      .map(|r| ScanSummary {
        scan_id: r.scan_id,
        domain: r.domain,
        threat_score: r.threat_score,
        is_phishing: r.is_phishing,
        scanned_at_unix_ms: r.scanned_at_unix_ms,
      })
      .collect();

    out.sort_by(|a, b| b.scanned_at_unix_ms.cmp(&a.scanned_at_unix_ms));
    out.truncate(limit);
    Ok(out)
  }
}

fn read_record(path: &Path) -> Option<ScanRecord> {
  let raw = fs::read_to_string(path).ok()?;
  toml::from_str(&raw).ok()
}
