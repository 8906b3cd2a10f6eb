//! Per-domain rolling statistics that bias future scans of the same domain.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{MatchStrategy, StoreBackend, StoreConfig};
use crate::types::{DomainPattern, PatternType, UrlFeatures};
use std::path::Path;
use std::sync::Arc;

pub const PHISHING_PATTERN_THRESHOLD: f64 = 0.7;
pub const SUSPICIOUS_PATTERN_THRESHOLD: f64 = 0.4;

pub trait PatternStore: Send + Sync {
  /// At most one record for `domain`, matched according to the store's policy.
  fn lookup(&self, domain: &str) -> anyhow::Result<Option<DomainPattern>>;

  /// Create-or-update for one observation. Returns the record as stored.
  fn upsert(
    &self,
    domain: &str,
    features: &UrlFeatures,
    blended_probability: f64,
  ) -> anyhow::Result<DomainPattern>;

  /// Most recently detected first.
  fn list_recent(&self, limit: usize) -> anyhow::Result<Vec<DomainPattern>>;
}

pub fn open(cfg: &StoreConfig, base: &Path) -> Arc<dyn PatternStore> {
  match cfg.backend {
    StoreBackend::File => Arc::new(FileStore::new(
      crate::paths::patterns_dir(base),
      cfg.match_strategy,
    )),
    StoreBackend::Memory => Arc::new(MemoryStore::new(cfg.match_strategy)),
  }
}

pub fn pattern_type_for(probability: f64) -> PatternType {
  if probability > PHISHING_PATTERN_THRESHOLD {
    PatternType::Phishing
  } else if probability > SUSPICIOUS_PATTERN_THRESHOLD {
    PatternType::Suspicious
  } else {
    PatternType::Legitimate
  }
}

impl DomainPattern {
  pub fn first(domain: &str, features: &UrlFeatures, probability: f64, now_unix_ms: u64) -> Self {
    Self {
      domain: normalize_domain(domain),
      pattern_type: pattern_type_for(probability),
      confidence_score: probability,
      detection_count: 1,
      first_detected_unix_ms: now_unix_ms,
      last_detected_unix_ms: now_unix_ms,
      features: features.clone(),
    }
  }

  /// Running mean `(old + new) / 2`. Older observations keep outsized weight;
  /// stored scores depend on exactly this formula.
  pub fn observe(&mut self, features: &UrlFeatures, probability: f64, now_unix_ms: u64) {
    self.detection_count = self.detection_count.saturating_add(1);
    self.last_detected_unix_ms = now_unix_ms;
    self.confidence_score = (self.confidence_score + probability) / 2.0;
    self.pattern_type = pattern_type_for(probability);
    self.features = features.clone();
  }
}

pub fn normalize_domain(domain: &str) -> String {
  domain.trim().to_lowercase()
}

pub(crate) fn domain_matches(strategy: MatchStrategy, stored: &str, query: &str) -> bool {
  if query.is_empty() {
    return false;
  }
  match strategy {
    MatchStrategy::Exact => stored == query,
    MatchStrategy::Substring => stored.contains(query),
  }
}

/// Prefers an exact hit, then the most recently detected candidate.
pub(crate) fn pick_match<I>(strategy: MatchStrategy, query: &str, candidates: I) -> Option<DomainPattern>
where
  I: IntoIterator<Item = DomainPattern>,
{
  let query = normalize_domain(query);
  let mut best: Option<DomainPattern> = None;
  for p in candidates {
    if !domain_matches(strategy, &p.domain, &query) {
      continue;
    }
    if p.domain == query {
      return Some(p);
    }
    let newer = best
      .as_ref()
      .map(|b| p.last_detected_unix_ms > b.last_detected_unix_ms)
      .unwrap_or(true);
    if newer {
      best = Some(p);
    }
  }
  best
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pattern_type_thresholds_are_strict() {
    assert_eq!(pattern_type_for(0.71), PatternType::Phishing);
    assert_eq!(pattern_type_for(0.7), PatternType::Suspicious);
    assert_eq!(pattern_type_for(0.41), PatternType::Suspicious);
    assert_eq!(pattern_type_for(0.4), PatternType::Legitimate);
    assert_eq!(pattern_type_for(0.0), PatternType::Legitimate);
  }

  #[test]
  fn observe_keeps_running_mean() {
    let f = UrlFeatures::default();
    let mut p = DomainPattern::first("Example.COM ", &f, 0.3, 10);
    assert_eq!(p.domain, "example.com");
    assert_eq!(p.detection_count, 1);
    assert_eq!(p.confidence_score, 0.3);
    assert_eq!(p.pattern_type, PatternType::Legitimate);

    p.observe(&f, 0.4, 20);
    assert_eq!(p.detection_count, 2);
    assert!((p.confidence_score - 0.35).abs() < 1e-9);
    assert_eq!(p.first_detected_unix_ms, 10);
    assert_eq!(p.last_detected_unix_ms, 20);
  }

  #[test]
  fn substring_policy_prefers_exact_then_newest() {
    let f = UrlFeatures::default();
    let a = DomainPattern::first("login.example.com", &f, 0.9, 100);
    let b = DomainPattern::first("mail.example.com", &f, 0.1, 200);
    let c = DomainPattern::first("example.com", &f, 0.5, 50);

    let hit = pick_match(
      MatchStrategy::Substring,
      "EXAMPLE.com",
      vec![a.clone(), b.clone(), c.clone()],
    );
    assert_eq!(hit.map(|p| p.domain), Some("example.com".to_string()));

    let hit = pick_match(MatchStrategy::Substring, "example.com", vec![a.clone(), b.clone()]);
    assert_eq!(hit.map(|p| p.domain), Some("mail.example.com".to_string()));

    assert!(pick_match(MatchStrategy::Exact, "example.com", vec![a, b]).is_none());
    assert!(pick_match(MatchStrategy::Substring, "", vec![c]).is_none());
  }
}
