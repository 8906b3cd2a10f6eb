use std::sync::atomic::{AtomicBool, Ordering};

// Dry-run turns every persistence path into a logged no-op.
static DRY_RUN: AtomicBool = AtomicBool::new(false);

pub fn configure_from_args(args: &[String]) -> bool {
  let enabled = args.iter().any(|arg| arg == "--dry-run");
  set_dry_run(enabled);
  enabled
}

pub fn set_dry_run(enabled: bool) {
  DRY_RUN.store(enabled, Ordering::SeqCst);
}

pub fn is_dry_run() -> bool {
  DRY_RUN.load(Ordering::SeqCst)
}

/// Serializes tests that depend on the process-wide flag and restores it on drop.
#[cfg(test)]
pub(crate) struct DryRunGuard {
  _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
pub(crate) fn dry_run_guard(enabled: bool) -> DryRunGuard {
  static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
  let lock = LOCK.lock().unwrap_or_else(|e| e.into_inner());
  set_dry_run(enabled);
  DryRunGuard { _lock: lock }
}

#[cfg(test)]
impl Drop for DryRunGuard {
  fn drop(&mut self) {
    set_dry_run(false);
  }
}
