//! Best-effort background writes into the pattern store.
//!
//! The scan path hands off a [`PatternUpdate`] and returns immediately. A failed
//! write is logged and dropped; it never reaches the caller that triggered it.

use crate::pattern_store::PatternStore;
use crate::types::UrlFeatures;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
pub struct PatternUpdate {
  pub domain: String,
  pub features: UrlFeatures,
  pub blended_probability: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
  pub applied: u64,
  pub failed: u64,
}

enum Job {
  Update(PatternUpdate),
  Flush(mpsc::Sender<()>),
}

pub struct UpdateDispatcher {
  tx: Option<mpsc::Sender<Job>>,
  worker: Option<thread::JoinHandle<DispatchStats>>,
}

impl UpdateDispatcher {
  pub fn spawn(store: Arc<dyn PatternStore>) -> anyhow::Result<Self> {
    let (tx, rx) = mpsc::channel::<Job>();
    let worker = thread::Builder::new()
      .name("pattern-updater".to_string())
      .spawn(move || run_worker(store.as_ref(), rx))?;

    Ok(Self {
      tx: Some(tx),
      worker: Some(worker),
    })
  }

  /// Never blocks and never fails the caller.
  pub fn submit(&self, update: PatternUpdate) {
    let Some(tx) = self.tx.as_ref() else {
      tracing::warn!(domain = %update.domain, "pattern updater already stopped; update dropped");
      return;
    };
    if let Err(mpsc::SendError(Job::Update(update))) = tx.send(Job::Update(update)) {
      tracing::error!(
        domain = %update.domain,
        "pattern updater unavailable; update dropped (continuing)"
      );
    }
  }

  /// Blocks until every update submitted before this call has been attempted.
  pub fn flush(&self) {
    let Some(tx) = self.tx.as_ref() else {
      return;
    };
    let (done_tx, done_rx) = mpsc::channel();
    if tx.send(Job::Flush(done_tx)).is_ok() {
      let _ = done_rx.recv();
    }
  }

  /// Closes the queue and waits for pending updates to be written.
  pub fn shutdown(mut self) -> DispatchStats {
    self.finish()
  }

  fn finish(&mut self) -> DispatchStats {
    drop(self.tx.take());
    match self.worker.take() {
      Some(handle) => handle.join().unwrap_or_else(|_| {
        tracing::error!("pattern updater thread panicked");
        DispatchStats::default()
      }),
      None => DispatchStats::default(),
    }
  }
}

impl Drop for UpdateDispatcher {
  fn drop(&mut self) {
    let _ = self.finish();
  }
}

fn run_worker(store: &dyn PatternStore, rx: mpsc::Receiver<Job>) -> DispatchStats {
  let mut stats = DispatchStats::default();
  for job in rx {
    let update = match job {
      Job::Update(update) => update,
      Job::Flush(done) => {
        let _ = done.send(());
        continue;
      }
    };
    match store.upsert(&update.domain, &update.features, update.blended_probability) {
      Ok(p) => {
        stats.applied += 1;
        tracing::debug!(
          domain = %p.domain,
          pattern_type = p.pattern_type.as_str(),
          confidence_score = p.confidence_score,
          detection_count = p.detection_count,
          "domain pattern updated"
        );
      }
      Err(e) => {
        stats.failed += 1;
        tracing::error!(
          domain = %update.domain,
          error = ?e,
          "failed to update domain pattern (continuing)"
        );
      }
    }
  }
  stats
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::MatchStrategy;
  use crate::pattern_store::MemoryStore;
  use crate::types::DomainPattern;

  struct BrokenStore;

  impl PatternStore for BrokenStore {
    fn lookup(&self, _domain: &str) -> anyhow::Result<Option<DomainPattern>> {
      anyhow::bail!("store offline")
    }

    fn upsert(&self, _: &str, _: &UrlFeatures, _: f64) -> anyhow::Result<DomainPattern> {
      anyhow::bail!("store offline")
    }

    fn list_recent(&self, _limit: usize) -> anyhow::Result<Vec<DomainPattern>> {
      anyhow::bail!("store offline")
    }
  }

  fn update(domain: &str, p: f64) -> PatternUpdate {
    PatternUpdate {
      domain: domain.to_string(),
      features: UrlFeatures::default(),
      blended_probability: p,
    }
  }

  #[test]
  fn shutdown_flushes_pending_updates() {
    let store = Arc::new(MemoryStore::new(MatchStrategy::Exact));
    let d = UpdateDispatcher::spawn(store.clone()).unwrap();
    d.submit(update("example.com", 0.3));
    d.submit(update("example.com", 0.4));
    d.submit(update("other.example", 0.9));

    let stats = d.shutdown();
    assert_eq!(stats, DispatchStats { applied: 3, failed: 0 });

    let p = store.lookup("example.com").unwrap().unwrap();
    assert_eq!(p.detection_count, 2);
    assert!((p.confidence_score - 0.35).abs() < 1e-9);
  }

  #[test]
  fn flush_makes_earlier_updates_visible() {
    let store = Arc::new(MemoryStore::new(MatchStrategy::Exact));
    let d = UpdateDispatcher::spawn(store.clone()).unwrap();
    d.submit(update("example.com", 0.3));
    d.flush();
    assert_eq!(store.lookup("example.com").unwrap().unwrap().detection_count, 1);
    d.flush();
    assert_eq!(d.shutdown().applied, 1);
  }

  #[test]
  fn failed_writes_are_counted_not_raised() {
    let d = UpdateDispatcher::spawn(Arc::new(BrokenStore)).unwrap();
    d.submit(update("example.com", 0.3));
    d.submit(update("example.org", 0.6));
    let stats = d.shutdown();
    assert_eq!(stats, DispatchStats { applied: 0, failed: 2 });
  }
}
