use serde::{Deserialize, Serialize};

/// Lexical features of a raw URL string. Recomputed on every scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlFeatures {
  pub length: usize,
  pub dot_count: usize,
  pub hyphen_count: usize,
  pub digit_count: usize,
  pub special_char_count: usize,
  pub has_ip_address_host: bool,
  pub has_suspicious_keyword: bool,
  pub shannon_entropy: f64,
  pub subdomain_count: usize,
  pub path_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
  Phishing,
  Suspicious,
  Legitimate,
  Unknown,
}

impl PatternType {
  pub fn as_str(&self) -> &'static str {
    match self {
      PatternType::Phishing => "phishing",
      PatternType::Suspicious => "suspicious",
      PatternType::Legitimate => "legitimate",
      PatternType::Unknown => "unknown",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
  pub threat_score: u32,
  pub threat_probability: f64,
  pub predicted_categories: Vec<String>,
  pub confidence: f64,
  pub is_phishing: bool,
}

/// Rolling per-domain statistic. Created on the first scan of a domain and
/// updated in place on every later scan; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPattern {
  pub domain: String,
  pub pattern_type: PatternType,
  pub confidence_score: f64,
  pub detection_count: u64,
  pub first_detected_unix_ms: u64,
  pub last_detected_unix_ms: u64,
  pub features: UrlFeatures,
}

/// Result of one pass through the scan pipeline.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
  pub scan_id: String,
  pub url: String,
  pub domain: String,
  pub features: UrlFeatures,
  pub assessment: ThreatAssessment,
  pub scanned_at_unix_ms: u64,
}

impl ScanOutcome {
  pub fn to_record(&self) -> ScanRecord {
    let a = &self.assessment;
    ScanRecord {
      scan_id: self.scan_id.clone(),
      url: self.url.clone(),
      domain: self.domain.clone(),
      threat_score: a.threat_score,
      threat_probability: a.threat_probability,
      confidence: a.confidence,
      is_phishing: a.is_phishing,
      predicted_categories: a.predicted_categories.join("; "),
      scanned_at_unix_ms: self.scanned_at_unix_ms,
    }
  }
}

/// Flat key-value view of a scan, used for storage and `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
  pub scan_id: String,
  pub url: String,
  pub domain: String,
  pub threat_score: u32,
  pub threat_probability: f64,
  pub confidence: f64,
  pub is_phishing: bool,
  pub predicted_categories: String,
  pub scanned_at_unix_ms: u64,
}

pub fn redact_url_for_log(raw: &str) -> String {
  // Paths and query strings can carry tokens or personal data; keep scheme and host only.
  match url::Url::parse(raw.trim()) {
    Ok(u) => match u.host_str() {
      Some(host) => format!("{}://{}", u.scheme(), host),
      None => "<redacted>".to_string(),
    },
    Err(_) => raw
      .trim()
      .split('/')
      .next()
      .filter(|s| !s.is_empty())
      .map(|s| s.to_string())
      .unwrap_or_else(|| "<redacted>".to_string()),
  }
}

pub fn now_unix_ms() -> u64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn redaction_keeps_scheme_and_host_only() {
    assert_eq!(
      redact_url_for_log("https://login.example.com/reset?token=abc"),
      "https://login.example.com"
    );
    assert_eq!(redact_url_for_log("example.com/secret"), "example.com");
    assert_eq!(redact_url_for_log(""), "<redacted>");
  }

  #[test]
  fn record_joins_categories_in_order() {
    let outcome = ScanOutcome {
      scan_id: "id-1".to_string(),
      url: "http://10.0.0.1/login".to_string(),
      domain: "10.0.0.1".to_string(),
      features: UrlFeatures::default(),
      assessment: ThreatAssessment {
        threat_score: 45,
        threat_probability: 0.45,
        predicted_categories: vec!["IP-based URL".to_string(), "Suspicious keywords".to_string()],
        confidence: 0.75,
        is_phishing: false,
      },
      scanned_at_unix_ms: 1_700_000_000_000,
    };

    let rec = outcome.to_record();
    assert_eq!(rec.predicted_categories, "IP-based URL; Suspicious keywords");
    assert_eq!(rec.threat_score, 45);
    assert!(!rec.is_phishing);
  }
}
