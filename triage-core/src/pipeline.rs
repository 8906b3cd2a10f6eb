use crate::blender::blend;
use crate::config::Config;
use crate::dispatcher::{DispatchStats, PatternUpdate, UpdateDispatcher};
use crate::features::{domain_of, extract_features};
use crate::pattern_store::{self, PatternStore};
use crate::rules_engine::{score_threat, ThreatScore};
use crate::scan_store::ScanStore;
use crate::types::{
  now_unix_ms, redact_url_for_log, DomainPattern, ScanOutcome, ThreatAssessment, UrlFeatures,
};
use std::path::Path;
use std::sync::Arc;

/// Extract, score, blend with history, then hand the pattern update to the
/// background dispatcher. `scan` itself cannot fail.
pub struct ScanPipeline {
  store: Arc<dyn PatternStore>,
  dispatcher: UpdateDispatcher,
  scans: Option<ScanStore>,
}

impl ScanPipeline {
  pub fn new(store: Arc<dyn PatternStore>, scans: Option<ScanStore>) -> anyhow::Result<Self> {
    let dispatcher = UpdateDispatcher::spawn(store.clone())?;
    Ok(Self {
      store,
      dispatcher,
      scans,
    })
  }

  pub fn from_config(cfg: &Config, base: &Path) -> anyhow::Result<Self> {
    let store = pattern_store::open(&cfg.store, base);
    let scans = cfg
      .store
      .record_scans
      .then(|| ScanStore::new(crate::paths::scans_dir(base)));
    Self::new(store, scans)
  }

  pub fn scan(&self, url: &str) -> ScanOutcome {
    let features = extract_features(url);
    let domain = domain_of(url);
    let raw = score_threat(&features);
    let assessment = self.assess(&domain, &features, raw);

    let outcome = ScanOutcome {
      scan_id: uuid::Uuid::new_v4().to_string(),
      url: url.to_string(),
      domain,
      features,
      assessment,
      scanned_at_unix_ms: now_unix_ms(),
    };

    tracing::info!(
      scan_id = %outcome.scan_id,
      url = %redact_url_for_log(url),
      threat_score = outcome.assessment.threat_score,
      threat_probability = outcome.assessment.threat_probability,
      is_phishing = outcome.assessment.is_phishing,
      "scan complete"
    );

    if let Some(scans) = &self.scans {
      if let Err(e) = scans.store(&outcome.to_record()) {
        tracing::error!(
          scan_id = %outcome.scan_id,
          error = ?e,
          "failed to store scan record (continuing)"
        );
      }
    }

    outcome
  }

  fn assess(&self, domain: &str, features: &UrlFeatures, raw: ThreatScore) -> ThreatAssessment {
    let historical = self.lookup_history(domain);
    let assessment = blend(raw, historical.as_ref());

    if !domain.is_empty() {
      self.dispatcher.submit(PatternUpdate {
        domain: domain.to_string(),
        features: features.clone(),
        blended_probability: assessment.threat_probability,
      });
    }
    assessment
  }

  /// An unreachable store reads as "no history".
  fn lookup_history(&self, domain: &str) -> Option<DomainPattern> {
    if domain.is_empty() {
      return None;
    }
    match self.store.lookup(domain) {
      Ok(found) => found,
      Err(e) => {
        tracing::warn!(
          domain = %domain,
          error = ?e,
          "domain pattern lookup failed; scoring without history"
        );
        None
      }
    }
  }

  /// Waits for queued pattern updates. Useful when the next scan must see them.
  pub fn flush(&self) {
    self.dispatcher.flush();
  }

  pub fn shutdown(self) -> DispatchStats {
    self.dispatcher.shutdown()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::MatchStrategy;
  use crate::pattern_store::MemoryStore;
  use crate::types::PatternType;

  struct OfflineStore;

  impl PatternStore for OfflineStore {
    fn lookup(&self, _domain: &str) -> anyhow::Result<Option<DomainPattern>> {
      anyhow::bail!("connection refused")
    }

    fn upsert(&self, _: &str, _: &UrlFeatures, _: f64) -> anyhow::Result<DomainPattern> {
      anyhow::bail!("connection refused")
    }

    fn list_recent(&self, _limit: usize) -> anyhow::Result<Vec<DomainPattern>> {
      anyhow::bail!("connection refused")
    }
  }

  fn raw(score: u32) -> ThreatScore {
    ThreatScore {
      score,
      categories: Vec::new(),
      hits: Vec::new(),
    }
  }

  #[test]
  fn repeat_domain_feeds_back_into_later_scores() {
    let store = Arc::new(MemoryStore::new(MatchStrategy::Exact));
    let pipeline = ScanPipeline::new(store.clone(), None).unwrap();
    let f = UrlFeatures::default();

    let first = pipeline.assess("example.com", &f, raw(30));
    assert!((first.threat_probability - 0.3).abs() < 1e-9);
    assert_eq!(first.confidence, 0.75);
    pipeline.flush();

    let stored = store.lookup("example.com").unwrap().unwrap();
    assert_eq!(stored.detection_count, 1);
    assert!((stored.confidence_score - 0.3).abs() < 1e-9);

    let second = pipeline.assess("example.com", &f, raw(50));
    assert!((second.threat_probability - 0.4).abs() < 1e-9);
    assert!((second.confidence - 0.90).abs() < 1e-9);
    assert!(!second.is_phishing);

    let stats = pipeline.shutdown();
    assert_eq!(stats.applied, 2);

    let stored = store.lookup("example.com").unwrap().unwrap();
    assert_eq!(stored.detection_count, 2);
    assert!((stored.confidence_score - 0.35).abs() < 1e-9);
    assert_eq!(stored.pattern_type, PatternType::Legitimate);
  }

  #[test]
  fn offline_store_does_not_affect_assessment() {
    let pipeline = ScanPipeline::new(Arc::new(OfflineStore), None).unwrap();
    let outcome = pipeline.scan("http://192.168.1.1/login-verify-account");
    assert!(outcome.assessment.threat_score >= 45);
    assert_eq!(outcome.assessment.confidence, 0.75);
    assert_eq!(
      outcome.assessment.threat_probability,
      f64::from(outcome.assessment.threat_score) / 100.0
    );
    assert_eq!(outcome.domain, "192.168.1.1");

    let stats = pipeline.shutdown();
    assert_eq!(stats.failed, 1);
  }

  #[test]
  fn known_phishing_domain_is_flagged_on_rescan() {
    let store = Arc::new(MemoryStore::new(MatchStrategy::Exact));
    store
      .upsert("secure-login.example.net", &UrlFeatures::default(), 0.95)
      .unwrap();
    let pipeline = ScanPipeline::new(store, None).unwrap();

    let outcome = pipeline.scan("https://secure-login.example.net/");
    assert!(outcome
      .assessment
      .predicted_categories
      .iter()
      .any(|c| c == "Known phishing pattern"));
    assert!(outcome.assessment.is_phishing);
  }

  #[test]
  fn clean_scan_is_recorded() {
    let _guard = crate::runtime::dry_run_guard(false);
    let tmp = tempfile::tempdir().unwrap();
    let scans = ScanStore::new(tmp.path().to_path_buf());
    let pipeline = ScanPipeline::new(Arc::new(MemoryStore::new(MatchStrategy::Exact)), Some(scans))
      .unwrap();

    let outcome = pipeline.scan("https://example.com");
    assert_eq!(outcome.assessment.threat_score, 0);
    assert!(outcome.assessment.predicted_categories.is_empty());
    assert!(!outcome.assessment.is_phishing);
    assert!(tmp.path().join(format!("{}.toml", outcome.scan_id)).exists());
    pipeline.shutdown();
  }

  #[test]
  fn empty_input_is_scored_without_store_traffic() {
    let pipeline = ScanPipeline::new(Arc::new(OfflineStore), None).unwrap();
    let outcome = pipeline.scan("");
    assert_eq!(outcome.assessment.threat_score, 0);
    assert_eq!(pipeline.shutdown().failed, 0);
  }
}
