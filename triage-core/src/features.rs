//! Lexical feature extraction over raw, user-entered URL strings.
//!
//! Every function here is pure and infallible: input that does not parse as a URL
//! degrades the host-derived features instead of producing an error.

use crate::types::UrlFeatures;
use std::collections::HashMap;
use url::{Host, Url};

/// Matched as case-insensitive substrings anywhere in the raw input.
pub const SUSPICIOUS_KEYWORDS: &[&str] = &[
  "login", "signin", "verify", "account", "update", "secure", "banking", "confirm", "password",
  "suspend", "wallet", "webscr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct HostAndPath {
  host: Option<String>,
  path: String,
}

pub fn extract_features(url: &str) -> UrlFeatures {
  let parts = split_host_and_path(url);

  let mut dot_count = 0;
  let mut hyphen_count = 0;
  let mut digit_count = 0;
  let mut special_char_count = 0;
  let mut length = 0;
  for c in url.chars() {
    length += 1;
    match c {
      '.' => dot_count += 1,
      '-' => hyphen_count += 1,
      c if c.is_ascii_digit() => digit_count += 1,
      c if is_special_char(c) => special_char_count += 1,
      _ => {}
    }
  }

  let (has_ip_address_host, subdomain_count) = match parts.host.as_deref() {
    Some(host) => (is_dotted_quad(host), label_count(host).saturating_sub(2)),
    None => (false, 0),
  };

  UrlFeatures {
    length,
    dot_count,
    hyphen_count,
    digit_count,
    special_char_count,
    has_ip_address_host,
    has_suspicious_keyword: contains_suspicious_keyword(url),
    shannon_entropy: shannon_entropy(url),
    subdomain_count,
    path_depth: parts.path.split('/').count().saturating_sub(2),
  }
}

/// Key under which a URL's domain pattern is stored: the lowercased host, or the
/// lowercased trimmed input when no host can be derived.
pub fn domain_of(url: &str) -> String {
  match split_host_and_path(url).host {
    Some(host) => host,
    None => url.trim().to_lowercase(),
  }
}

/// Character-level Shannon entropy in bits. Empty input yields 0.
pub fn shannon_entropy(s: &str) -> f64 {
  let mut freq: HashMap<char, usize> = HashMap::new();
  let mut total = 0usize;
  for c in s.chars() {
    *freq.entry(c).or_default() += 1;
    total += 1;
  }
  if total == 0 {
    return 0.0;
  }

  let len = total as f64;
  let entropy: f64 = freq
    .values()
    .map(|&count| {
      let p = count as f64 / len;
      -p * p.log2()
    })
    .sum();
  // A single repeated character sums to -0.0.
  entropy.max(0.0)
}

pub fn contains_suspicious_keyword(url: &str) -> bool {
  let lower = url.to_lowercase();
  SUSPICIOUS_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn is_special_char(c: char) -> bool {
  !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '/' | ':')
}

fn is_dotted_quad(host: &str) -> bool {
  let octets: Vec<&str> = host.split('.').collect();
  octets.len() == 4
    && octets
      .iter()
      .all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()))
}

fn label_count(host: &str) -> usize {
  host.split('.').filter(|l| !l.is_empty()).count()
}

fn split_host_and_path(raw: &str) -> HostAndPath {
  let trimmed = raw.trim();
  let candidate = if leading_scheme_len(trimmed).is_some() {
    trimmed.to_string()
  } else {
    format!("https://{trimmed}")
  };

  match Url::parse(&candidate) {
    Ok(u) => {
      // The parser rewrites numeric hosts (`1.2.3` becomes `1.2.0.3`); features
      // and the domain key must see what was typed.
      let host = match u.host() {
        Some(Host::Ipv4(_)) => Some(typed_host(trimmed)),
        Some(_) => u.host_str().map(|h| h.to_ascii_lowercase()),
        None => None,
      };
      HostAndPath {
        host: host.filter(|h| !h.is_empty()),
        path: u.path().to_string(),
      }
    }
    Err(_) => fallback_host_and_path(trimmed),
  }
}

/// Byte length of a leading `scheme://`, if the input starts with one.
fn leading_scheme_len(s: &str) -> Option<usize> {
  let sep = s.find("://")?;
  let scheme = &s[..sep];
  let mut chars = scheme.chars();
  let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
  let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
  (first_ok && rest_ok).then_some(sep + 3)
}

fn strip_scheme(s: &str) -> &str {
  match leading_scheme_len(s) {
    Some(n) => &s[n..],
    None => s,
  }
}

/// Host text as written: after scheme and userinfo, before port, path, query or fragment.
fn typed_host(trimmed: &str) -> String {
  let authority = strip_scheme(trimmed)
    .split(['/', '\\', '?', '#'])
    .next()
    .unwrap_or_default();
  let host_port = authority.rsplit('@').next().unwrap_or_default();
  let host = host_port.split(':').next().unwrap_or_default();
  host.to_lowercase()
}

fn fallback_host_and_path(trimmed: &str) -> HostAndPath {
  let without_suffix = strip_scheme(trimmed)
    .split(['?', '#'])
    .next()
    .unwrap_or_default();

  let (host, path) = match without_suffix.find('/') {
    Some(i) => (&without_suffix[..i], &without_suffix[i..]),
    None => (without_suffix, ""),
  };

  HostAndPath {
    host: Some(host.trim().to_lowercase()).filter(|h| !h.is_empty()),
    path: path.to_string(),
  }
}
