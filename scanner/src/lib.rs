use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use triage_core::features::domain_of;
use triage_core::{config, logging, paths, runtime, ScanPipeline};

const PROGRESS_EVERY: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  File(PathBuf),
  Stdin,
}

impl Source {
  pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
    if let Some(i) = args.iter().position(|a| a == "--file") {
      let path = args
        .get(i + 1)
        .ok_or_else(|| anyhow::anyhow!("expected a path after `--file`"))?;
      return Ok(Self::File(PathBuf::from(path)));
    }
    if args.iter().any(|a| a == "--stdin") {
      return Ok(Self::Stdin);
    }
    Err(anyhow::anyhow!("expected `--file <path>` or `--stdin`"))
  }
}

#[derive(Debug, Clone, Default)]
struct ScanConfig {
  excludes: Vec<String>,
  cancel_file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
  pub scanned: u64,
  pub flagged: u64,
  pub skipped: u64,
  pub canceled: bool,
}

pub fn run(source: Source) -> anyhow::Result<()> {
  let args: Vec<String> = std::env::args().collect();
  let dry_run = runtime::configure_from_args(&args);
  let scan_cfg = parse_scan_config(&args);

  let base = paths::base_dir()?;
  let config_path = paths::config_path(&base);
  let cfg = if dry_run {
    config::load_or_default_readonly(&config_path)?
  } else {
    config::load_or_create_default(&config_path)?
  };
  logging::init(&paths::logs_dir(&base), &cfg.logging, logging::Sink::File)?;

  let stop = Arc::new(AtomicBool::new(false));
  let ctrlc_stop = stop.clone();
  ctrlc::set_handler(move || {
    ctrlc_stop.store(true, Ordering::SeqCst);
  })?;

  println!("url-triage scanner starting: source={source:?}");
  tracing::info!(source = ?source, dry_run, "bulk scan started");

  let pipeline = ScanPipeline::from_config(&cfg, &base)?;
  let reader: Box<dyn BufRead> = match &source {
    Source::File(p) => Box::new(BufReader::new(fs::File::open(p)?)),
    Source::Stdin => Box::new(BufReader::new(io::stdin())),
  };

  let stdout = io::stdout();
  let summary = scan_lines(&pipeline, reader, &scan_cfg, &stop, &mut stdout.lock())?;

  // Flush pattern writes before reporting; the process exits right after.
  let stats = pipeline.shutdown();
  tracing::info!(
    scanned = summary.scanned,
    flagged = summary.flagged,
    pattern_updates = stats.applied,
    pattern_update_failures = stats.failed,
    "bulk scan finished"
  );

  if summary.canceled {
    println!("Scan canceled by user. scanned={}", summary.scanned);
    return Ok(());
  }
  println!(
    "Scan complete: scanned={} flagged={} skipped={}",
    summary.scanned, summary.flagged, summary.skipped
  );
  Ok(())
}

fn scan_lines<R: BufRead, W: Write>(
  pipeline: &ScanPipeline,
  reader: R,
  cfg: &ScanConfig,
  stop: &AtomicBool,
  out: &mut W,
) -> anyhow::Result<Summary> {
  let excludes: Vec<String> = cfg
    .excludes
    .iter()
    .map(|s| s.trim().to_ascii_lowercase())
    .filter(|s| !s.is_empty())
    .collect();

  let mut summary = Summary::default();
  let mut seen: HashSet<String> = HashSet::new();

  for line in reader.lines() {
    if stop.load(Ordering::SeqCst) || should_cancel(cfg) {
      summary.canceled = true;
      break;
    }

    let line = line?;
    let url = line.trim();
    if url.is_empty() || url.starts_with('#') {
      continue;
    }
    if !seen.insert(url.to_string()) || is_excluded(&excludes, url) {
      summary.skipped += 1;
      continue;
    }

    let outcome = pipeline.scan(url);
    // Later lines on the same domain must read this scan's pattern update.
    pipeline.flush();
    summary.scanned += 1;

    let a = &outcome.assessment;
    if a.is_phishing {
      summary.flagged += 1;
      writeln!(
        out,
        "FLAGGED score={} probability={:.3} domain={} categories={}",
        a.threat_score,
        a.threat_probability,
        outcome.domain,
        a.predicted_categories.join(",")
      )?;
    }

    if summary.scanned % PROGRESS_EVERY == 0 {
      writeln!(
        out,
        "PROGRESS scanned={} flagged={}",
        summary.scanned, summary.flagged
      )?;
    }
  }

  Ok(summary)
}

fn parse_scan_config(args: &[String]) -> ScanConfig {
  let mut cfg = ScanConfig::default();
  let mut i = 0;
  while i < args.len() {
    match args[i].as_str() {
      "--exclude" => {
        if let Some(v) = args.get(i + 1) {
          cfg.excludes.push(v.clone());
          i += 2;
          continue;
        }
      }
      "--cancel-file" => {
        if let Some(v) = args.get(i + 1) {
          cfg.cancel_file = Some(v.clone());
          i += 2;
          continue;
        }
      }
      _ => {}
    }
    i += 1;
  }
  cfg
}

fn should_cancel(cfg: &ScanConfig) -> bool {
  cfg
    .cancel_file
    .as_deref()
    .is_some_and(|p| Path::new(p).exists())
}

/// An exclude matches the domain itself and any of its subdomains.
fn is_excluded(excludes: &[String], url: &str) -> bool {
  let domain = domain_of(url);
  excludes
    .iter()
    .any(|ex| domain == *ex || domain.ends_with(&format!(".{ex}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;
  use triage_core::config::MatchStrategy;
  use triage_core::pattern_store::{FileStore, MemoryStore, PatternStore};

  fn pipeline() -> (Arc<MemoryStore>, ScanPipeline) {
    let store = Arc::new(MemoryStore::new(MatchStrategy::Exact));
    let p = ScanPipeline::new(store.clone(), None).unwrap();
    (store, p)
  }

  fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn source_selection() {
    assert_eq!(
      Source::from_args(&args(&["scanner", "--file", "urls.txt"])).unwrap(),
      Source::File(PathBuf::from("urls.txt"))
    );
    assert_eq!(Source::from_args(&args(&["scanner", "--stdin"])).unwrap(), Source::Stdin);
    assert!(Source::from_args(&args(&["scanner", "--file"])).is_err());
    assert!(Source::from_args(&args(&["scanner"])).is_err());
  }

  #[test]
  fn scans_flags_and_skips() {
    let (store, p) = pipeline();
    let input = "\
# comment
https://example.com

http://192.168.1.1/login-verify-account?session=12345&token=abc&x=1
https://example.com
https://cdn.internal.example/login
";
    let cfg = ScanConfig {
      excludes: vec!["INTERNAL.example".to_string()],
      cancel_file: None,
    };
    let stop = AtomicBool::new(false);
    let mut out = Vec::new();

    let summary = scan_lines(&p, Cursor::new(input), &cfg, &stop, &mut out).unwrap();
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.flagged, 1);
    assert!(!summary.canceled);

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("FLAGGED"));
    assert!(printed.contains("domain=192.168.1.1"));

    p.shutdown();
    assert!(store.lookup("example.com").unwrap().is_some());
    assert!(store.lookup("cdn.internal.example").unwrap().is_none());
  }

  #[test]
  fn consecutive_urls_on_one_domain_see_history() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(tmp.path().join("patterns"), MatchStrategy::Exact));
    let p = ScanPipeline::new(store.clone(), None).unwrap();

    let mut out = Vec::new();
    let summary = scan_lines(
      &p,
      Cursor::new("https://evil.example/a\nhttps://evil.example/login\n"),
      &ScanConfig::default(),
      &AtomicBool::new(false),
      &mut out,
    )
    .unwrap();
    assert_eq!(summary.scanned, 2);

    // First scan stores 0.0. The second (keyword, raw 0.2) blends with it to 0.1
    // and the running mean becomes 0.05; without history it would be 0.1.
    let stored = store.lookup("evil.example").unwrap().unwrap();
    assert_eq!(stored.detection_count, 2);
    assert!((stored.confidence_score - 0.05).abs() < 1e-9);

    let next = p.scan("https://evil.example/c");
    assert!((next.assessment.confidence - 0.90).abs() < 1e-9);
    p.shutdown();
  }

  #[test]
  fn stop_flag_cancels_before_next_url() {
    let (_store, p) = pipeline();
    let stop = AtomicBool::new(true);
    let mut out = Vec::new();
    let summary = scan_lines(
      &p,
      Cursor::new("https://example.com\n"),
      &ScanConfig::default(),
      &stop,
      &mut out,
    )
    .unwrap();
    assert!(summary.canceled);
    assert_eq!(summary.scanned, 0);
  }

  #[test]
  fn cancel_file_stops_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let cancel = tmp.path().join("cancel");
    fs::write(&cancel, "").unwrap();
    let cfg = ScanConfig {
      excludes: Vec::new(),
      cancel_file: Some(cancel.to_string_lossy().to_string()),
    };
    let (_store, p) = pipeline();
    let mut out = Vec::new();
    let summary = scan_lines(
      &p,
      Cursor::new("https://example.com\n"),
      &cfg,
      &AtomicBool::new(false),
      &mut out,
    )
    .unwrap();
    assert!(summary.canceled);
  }

  #[test]
  fn scan_config_parsing() {
    let cfg = parse_scan_config(&args(&[
      "scanner",
      "--file",
      "u.txt",
      "--exclude",
      "a.example",
      "--exclude",
      "b.example",
      "--cancel-file",
      "/tmp/stop",
    ]));
    assert_eq!(cfg.excludes, vec!["a.example", "b.example"]);
    assert_eq!(cfg.cancel_file.as_deref(), Some("/tmp/stop"));
  }

  #[test]
  fn excludes_cover_subdomains_only() {
    let ex = vec!["example.com".to_string()];
    assert!(is_excluded(&ex, "https://example.com/x"));
    assert!(is_excluded(&ex, "mail.example.com"));
    assert!(!is_excluded(&ex, "https://notexample.com"));
  }
}
