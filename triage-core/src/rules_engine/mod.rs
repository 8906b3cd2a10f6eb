mod engine;
pub mod rules;

pub use engine::{score_threat, RuleHit, ThreatScore};
