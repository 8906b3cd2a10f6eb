use crate::rules_engine::ThreatScore;
use crate::types::{DomainPattern, PatternType, ThreatAssessment};

pub const BASE_CONFIDENCE: f64 = 0.75;
pub const HISTORY_CONFIDENCE_BOOST: f64 = 0.15;
pub const MAX_CONFIDENCE: f64 = 0.95;
/// Strictly greater-than: exactly 0.5 is not phishing.
pub const PHISHING_THRESHOLD: f64 = 0.5;

pub const KNOWN_PHISHING_CATEGORY: &str = "Known phishing pattern";

/// Blends a raw lexical probability with the stored confidence for the same
/// domain, when one exists.
pub fn blended_probability(raw_probability: f64, historical: Option<&DomainPattern>) -> f64 {
  match historical {
    Some(h) => (raw_probability + h.confidence_score) / 2.0,
    None => raw_probability,
  }
}

pub fn blend(score: ThreatScore, historical: Option<&DomainPattern>) -> ThreatAssessment {
  let threat_probability = blended_probability(score.probability(), historical);
  let mut predicted_categories = score.categories;

  let confidence = match historical {
    Some(h) => {
      if h.pattern_type == PatternType::Phishing {
        predicted_categories.push(KNOWN_PHISHING_CATEGORY.to_string());
      }
      (BASE_CONFIDENCE + HISTORY_CONFIDENCE_BOOST).min(MAX_CONFIDENCE)
    }
    None => BASE_CONFIDENCE,
  };

  ThreatAssessment {
    threat_score: score.score,
    threat_probability,
    predicted_categories,
    confidence,
    is_phishing: threat_probability > PHISHING_THRESHOLD,
  }
}
