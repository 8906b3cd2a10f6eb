use super::rules::{RuleMeta, MAX_SCORE, RULES};
use crate::types::UrlFeatures;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
  pub rule_id: &'static str,
  pub title: &'static str,
  pub points: u32,
}

/// Raw lexical score before any historical blending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatScore {
  pub score: u32,
  pub categories: Vec<String>,
  pub hits: Vec<RuleHit>,
}

impl ThreatScore {
  pub fn probability(&self) -> f64 {
    f64::from(self.score) / f64::from(MAX_SCORE)
  }
}

pub fn score_threat(features: &UrlFeatures) -> ThreatScore {
  evaluate(RULES, features)
}

fn evaluate(rules: &[RuleMeta], features: &UrlFeatures) -> ThreatScore {
  let mut total: u32 = 0;
  let mut categories = Vec::new();
  let mut hits = Vec::new();

  for rule in rules {
    if !(rule.matches)(features) {
      continue;
    }
    total = total.saturating_add(rule.points);
    if let Some(label) = rule.category {
      categories.push(label.to_string());
    }
    hits.push(RuleHit {
      rule_id: rule.id,
      title: rule.title,
      points: rule.points,
    });
  }

  ThreatScore {
    score: total.min(MAX_SCORE),
    categories,
    hits,
  }
}
