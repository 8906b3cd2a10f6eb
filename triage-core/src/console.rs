use crate::config::{Config, OutputFormat};
use crate::features::extract_features;
use crate::pattern_store::{self, normalize_domain};
use crate::pipeline::ScanPipeline;
use crate::rules_engine::rules::ACTIVE_RULE_IDS;
use crate::rules_engine::score_threat;
use crate::scan_store::ScanStore;
use crate::types::{DomainPattern, ScanOutcome};
use crate::{paths, runtime};
use std::path::Path;

pub fn run_console_command(cfg: &Config, base: &Path, args: &[String]) -> anyhow::Result<()> {
  let args = strip_global_flags(args);

  if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
    print_help();
    return Ok(());
  }

  if let Some(i) = args.iter().position(|a| a == "--scan") {
    return run_scan(cfg, base, &args[i + 1..]);
  }

  if let Some(i) = args.iter().position(|a| a == "--features") {
    return run_features(&args[i + 1..]);
  }

  if let Some(i) = args.iter().position(|a| a == "--patterns") {
    return run_patterns(cfg, base, &args[i + 1..]);
  }

  if let Some(i) = args.iter().position(|a| a == "--scans") {
    return run_scans(base, &args[i + 1..]);
  }

  eprintln!("Unknown command: {}", args.join(" "));
  print_help();
  Ok(())
}

fn run_scan(cfg: &Config, base: &Path, tail: &[String]) -> anyhow::Result<()> {
  let url = tail.first().map(|s| s.as_str()).unwrap_or("");
  if url.is_empty() || url.starts_with("--") {
    anyhow::bail!("expected: --scan <url> [--json]");
  }

  let json = tail.iter().any(|a| a == "--json") || cfg.output.format == OutputFormat::Json;

  let pipeline = ScanPipeline::from_config(cfg, base)?;
  let outcome = pipeline.scan(url);
  let stats = pipeline.shutdown();
  if stats.failed > 0 {
    tracing::warn!(failed = stats.failed, "domain pattern update did not persist");
  }

  if json {
    println!("{}", serde_json::to_string_pretty(&outcome.to_record())?);
  } else {
    print_outcome(&outcome);
  }
  if runtime::is_dry_run() {
    println!("DRY-RUN: nothing was persisted.");
  }
  Ok(())
}

fn run_features(tail: &[String]) -> anyhow::Result<()> {
  let url = tail.first().map(|s| s.as_str()).unwrap_or("");
  if url.is_empty() {
    anyhow::bail!("expected: --features <url>");
  }

  let f = extract_features(url);
  println!("length: {}", f.length);
  println!("dots: {}", f.dot_count);
  println!("hyphens: {}", f.hyphen_count);
  println!("digits: {}", f.digit_count);
  println!("special characters: {}", f.special_char_count);
  println!("ip address host: {}", f.has_ip_address_host);
  println!("suspicious keyword: {}", f.has_suspicious_keyword);
  println!("shannon entropy: {:.4}", f.shannon_entropy);
  println!("subdomains: {}", f.subdomain_count);
  println!("path depth: {}", f.path_depth);

  let score = score_threat(&f);
  println!("{}", evaluated_rules_line());
  for hit in &score.hits {
    println!("rule {} (+{}): {}", hit.rule_id, hit.points, hit.title);
  }
  println!("raw score: {}", score.score);
  Ok(())
}

fn run_patterns(cfg: &Config, base: &Path, tail: &[String]) -> anyhow::Result<()> {
  let store = pattern_store::open(&cfg.store, base);

  let sub = tail.first().map(|s| s.as_str()).unwrap_or("");
  match sub {
    "list" => {
      let limit = parse_limit(tail).unwrap_or(10);
      let items = store.list_recent(limit)?;
      if items.is_empty() {
        println!("No domain patterns recorded.");
        return Ok(());
      }

      println!("Last {}/{} domain patterns:", items.len(), limit);
      for p in items {
        println!(
          "- {} type={} confidence={:.3} detections={} last_detected_unix_ms={}",
          p.domain,
          p.pattern_type.as_str(),
          p.confidence_score,
          p.detection_count,
          p.last_detected_unix_ms
        );
      }
      Ok(())
    }
    "show" => {
      let domain = tail.get(1).map(|s| normalize_domain(s)).unwrap_or_default();
      if domain.is_empty() {
        anyhow::bail!("expected: --patterns show <domain>");
      }
      match store.lookup(&domain)? {
        Some(p) => print_pattern(&p),
        None => println!("No pattern recorded for {domain}."),
      }
      Ok(())
    }
    _ => {
      eprintln!("Unknown `--patterns` subcommand. Expected: list [--limit N]|show <domain>");
      print_help();
      Ok(())
    }
  }
}

fn run_scans(base: &Path, tail: &[String]) -> anyhow::Result<()> {
  let sub = tail.first().map(|s| s.as_str()).unwrap_or("");
  match sub {
    "list" => {
      let limit = parse_limit(tail).unwrap_or(10);
      let items = ScanStore::new(paths::scans_dir(base)).list_recent(limit)?;
      if items.is_empty() {
        println!("No scans recorded.");
        return Ok(());
      }

      println!("Last {}/{} scans:", items.len(), limit);
      for s in items {
        println!(
          "- {} domain={} score={} phishing={} scanned_at_unix_ms={}",
          s.scan_id, s.domain, s.threat_score, s.is_phishing, s.scanned_at_unix_ms
        );
      }
      Ok(())
    }
    _ => {
      eprintln!("Unknown `--scans` subcommand. Expected: list [--limit N]");
      print_help();
      Ok(())
    }
  }
}

fn print_outcome(outcome: &ScanOutcome) {
  let a = &outcome.assessment;
  println!("Scan: {}", outcome.scan_id);
  println!("Domain: {}", outcome.domain);
  println!(
    "Verdict: {}",
    if a.is_phishing { "PHISHING" } else { "not phishing" }
  );
  println!("Threat score: {}/100", a.threat_score);
  println!("Threat probability: {:.3}", a.threat_probability);
  println!("Confidence: {:.2}", a.confidence);
  if a.predicted_categories.is_empty() {
    println!("Categories: none");
  } else {
    println!("Categories: {}", a.predicted_categories.join(", "));
  }
}

fn print_pattern(p: &DomainPattern) {
  println!("Domain: {}", p.domain);
  println!("Pattern type: {}", p.pattern_type.as_str());
  println!("Confidence score: {:.3}", p.confidence_score);
  println!("Detections: {}", p.detection_count);
  println!("First detected (unix ms): {}", p.first_detected_unix_ms);
  println!("Last detected (unix ms): {}", p.last_detected_unix_ms);
  println!(
    "Last features: length={} entropy={:.3} subdomains={} ip_host={} keyword={}",
    p.features.length,
    p.features.shannon_entropy,
    p.features.subdomain_count,
    p.features.has_ip_address_host,
    p.features.has_suspicious_keyword
  );
}

fn evaluated_rules_line() -> String {
  format!("rules evaluated: {}", ACTIVE_RULE_IDS.join(", "))
}

fn parse_limit(args: &[String]) -> Option<usize> {
  args
    .iter()
    .position(|a| a == "--limit")
    .and_then(|i| args.get(i + 1))
    .and_then(|s| s.parse::<usize>().ok())
}

fn strip_global_flags(args: &[String]) -> Vec<String> {
  args
    .iter()
    .skip(1)
    .filter(|a| a.as_str() != "--dry-run")
    .cloned()
    .collect()
}

fn print_help() {
  println!("url-triage v{}", env!("CARGO_PKG_VERSION"));
  println!("Commands:");
  println!("  --dry-run (global; scores normally but persists nothing)");
  println!("  --scan <url> [--json]");
  println!("  --features <url>");
  println!("  --patterns list [--limit N]");
  println!("  --patterns show <domain>");
  println!("  --scans list [--limit N]");
  println!("  --version");
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn limit_parsing() {
    assert_eq!(parse_limit(&args(&["list", "--limit", "3"])), Some(3));
    assert_eq!(parse_limit(&args(&["list", "--limit"])), None);
    assert_eq!(parse_limit(&args(&["list", "--limit", "x"])), None);
  }

  #[test]
  fn features_output_lists_every_rule() {
    let line = evaluated_rules_line();
    assert!(line.starts_with("rules evaluated: L001, L002"));
    assert!(line.ends_with("L010"));
  }

  #[test]
  fn global_flags_and_program_name_are_stripped() {
    let stripped = strip_global_flags(&args(&["url-triage", "--dry-run", "--scan", "x"]));
    assert_eq!(stripped, vec!["--scan", "x"]);
  }
}
