use super::{normalize_domain, pick_match, PatternStore};
use crate::config::MatchStrategy;
use crate::types::{now_unix_ms, DomainPattern, UrlFeatures};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store. Nothing survives a restart.
pub struct MemoryStore {
  strategy: MatchStrategy,
  rows: Mutex<HashMap<String, DomainPattern>>,
}

impl MemoryStore {
  pub fn new(strategy: MatchStrategy) -> Self {
    Self {
      strategy,
      rows: Mutex::new(HashMap::new()),
    }
  }

  fn rows(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, DomainPattern>>> {
    self
      .rows
      .lock()
      .map_err(|_| anyhow::anyhow!("pattern store mutex poisoned"))
  }
}

impl PatternStore for MemoryStore {
  fn lookup(&self, domain: &str) -> anyhow::Result<Option<DomainPattern>> {
    let rows = self.rows()?;
    Ok(pick_match(self.strategy, domain, rows.values().cloned()))
  }

  fn upsert(
    &self,
    domain: &str,
    features: &UrlFeatures,
    blended_probability: f64,
  ) -> anyhow::Result<DomainPattern> {
    let key = normalize_domain(domain);
    let now = now_unix_ms();
    let mut rows = self.rows()?;
    let row = rows
      .entry(key.clone())
      .and_modify(|p| p.observe(features, blended_probability, now))
      .or_insert_with(|| DomainPattern::first(&key, features, blended_probability, now));
    Ok(row.clone())
  }

  fn list_recent(&self, limit: usize) -> anyhow::Result<Vec<DomainPattern>> {
    let rows = self.rows()?;
    let mut out: Vec<DomainPattern> = rows.values().cloned().collect();
    out.sort_by(|a, b| b.last_detected_unix_ms.cmp(&a.last_detected_unix_ms));
    out.truncate(limit);
    Ok(out)
  }
}
