use crate::types::UrlFeatures;

// Point values and thresholds are empirical and must stay fixed: stored domain
// patterns were built from scores produced with exactly these numbers.

pub const MAX_SCORE: u32 = 100;

pub const ACTIVE_RULE_IDS: &[&str] = &[
  "L001", "L002", "L003", "L004", "L005", "L006", "L007", "L008", "L009", "L010",
];

#[derive(Debug, Clone, Copy)]
pub struct RuleMeta {
  pub id: &'static str,
  pub title: &'static str,
  pub points: u32,
  /// Emitted in the assessment's categories when the rule fires.
  pub category: Option<&'static str>,
  pub matches: fn(&UrlFeatures) -> bool,
}

pub const L001: RuleMeta = RuleMeta {
  id: "L001",
  title: "URL longer than 75 characters",
  points: 15,
  category: None,
  matches: |f| f.length > 75,
};
pub const L002: RuleMeta = RuleMeta {
  id: "L002",
  title: "URL longer than 100 characters",
  points: 10,
  category: Some("Abnormally long URL"),
  matches: |f| f.length > 100,
};
pub const L003: RuleMeta = RuleMeta {
  id: "L003",
  title: "More than 2 hyphens",
  points: 10,
  category: None,
  matches: |f| f.hyphen_count > 2,
};
pub const L004: RuleMeta = RuleMeta {
  id: "L004",
  title: "More than 8 digits",
  points: 10,
  category: None,
  matches: |f| f.digit_count > 8,
};
pub const L005: RuleMeta = RuleMeta {
  id: "L005",
  title: "More than 5 special characters",
  points: 15,
  category: None,
  matches: |f| f.special_char_count > 5,
};
pub const L006: RuleMeta = RuleMeta {
  id: "L006",
  title: "Host is a dotted-quad IPv4 address",
  points: 25,
  category: Some("IP-based URL"),
  matches: |f| f.has_ip_address_host,
};
pub const L007: RuleMeta = RuleMeta {
  id: "L007",
  title: "Contains a phishing keyword",
  points: 20,
  category: Some("Suspicious keywords"),
  matches: |f| f.has_suspicious_keyword,
};
pub const L008: RuleMeta = RuleMeta {
  id: "L008",
  title: "Character entropy above 4.5 bits",
  points: 15,
  category: Some("High entropy"),
  matches: |f| f.shannon_entropy > 4.5,
};
pub const L009: RuleMeta = RuleMeta {
  id: "L009",
  title: "More than 3 subdomains",
  points: 15,
  category: Some("Excessive subdomains"),
  matches: |f| f.subdomain_count > 3,
};
pub const L010: RuleMeta = RuleMeta {
  id: "L010",
  title: "Path deeper than 5 segments",
  points: 10,
  category: None,
  matches: |f| f.path_depth > 5,
};

/// Evaluation order. Category labels follow this order.
pub const RULES: &[RuleMeta] = &[L001, L002, L003, L004, L005, L006, L007, L008, L009, L010];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rule_table_matches_active_ids() {
    let ids: Vec<&str> = RULES.iter().map(|r| r.id).collect();
    assert_eq!(ids, ACTIVE_RULE_IDS);
  }

  #[test]
  fn all_rules_together_exceed_the_cap() {
    let total: u32 = RULES.iter().map(|r| r.points).sum();
    assert_eq!(total, 145);
    assert!(total > MAX_SCORE);
  }
}
