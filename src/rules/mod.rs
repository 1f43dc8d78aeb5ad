// src/rules/mod.rs
//! Weighted-rule risk scoring: shared result types, the per-domain scorers,
//! and the aggregate total. Dictionaries are immutable data compiled in from
//! `config/*.toml` and always passed to scorers as explicit parameters, so
//! tests can inject overrides.

pub mod ad_policy;
pub mod bridge_page;
pub mod trademark;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::keywords::KeywordRules;
pub use ad_policy::AdPolicyRules;
pub use bridge_page::BridgePageRules;
pub use trademark::TrademarkRules;

/// One saturated category may contribute at most this much to a score.
pub const CATEGORY_CAP: u32 = 25;

/// A named group of trigger phrases sharing a common weight (1-10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCategory {
    pub name: String,
    pub weight: u32,
    pub phrases: Vec<String>,
}

/// Severity band, a pure function of the score via per-scorer thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Score thresholds for the medium/high/critical bands.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelBands {
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl RiskLevel {
    pub(crate) fn from_score(score: u32, bands: LevelBands) -> Self {
        if score >= bands.critical {
            RiskLevel::Critical
        } else if score >= bands.high {
            RiskLevel::High
        } else if score >= bands.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Evidence for one dictionary category that matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMatch {
    pub name: String,
    pub matched_words: Vec<String>,
    pub contribution: u32,
}

/// Outcome of one scoring call. Freshly constructed per call, never mutated
/// after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// Clamped to [0, 100].
    pub score: u32,
    pub level: RiskLevel,
    pub matched_categories: Vec<CategoryMatch>,
    /// URL-pattern or structural findings not tied to a word list.
    pub extra_signals: Vec<String>,
}

/// Weighted total over the three domain scores: ad policy carries the most
/// weight, trademark and bridge page split the rest evenly.
///
/// `total_risk_score(100, 0, 0) == 40`, `total_risk_score(50, 60, 70) == 59`.
pub fn total_risk_score(ad_policy: u32, trademark: u32, bridge_page: u32) -> u32 {
    let weighted =
        f64::from(ad_policy) * 0.4 + f64::from(trademark) * 0.3 + f64::from(bridge_page) * 0.3;
    weighted.round().min(100.0) as u32
}

pub(crate) fn clamp_score(raw: u32) -> u32 {
    raw.min(100)
}

/// The full set of rule dictionaries one research run needs.
#[derive(Debug, Clone)]
pub struct Dictionaries {
    pub trademark: TrademarkRules,
    pub ad_policy: AdPolicyRules,
    pub bridge_page: BridgePageRules,
    pub keywords: KeywordRules,
}

static BUILTIN: Lazy<Dictionaries> = Lazy::new(|| Dictionaries {
    trademark: TrademarkRules::builtin().clone(),
    ad_policy: AdPolicyRules::builtin().clone(),
    bridge_page: BridgePageRules::builtin().clone(),
    keywords: KeywordRules::builtin().clone(),
});

impl Dictionaries {
    /// The compiled-in dictionary set.
    pub fn builtin() -> &'static Dictionaries {
        &BUILTIN
    }
}
