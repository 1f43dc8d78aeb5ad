// src/rules/ad_policy.rs
//! Ad-policy risk: NG-word matching (outcome guarantees, income exaggeration,
//! health overclaims, financial fraud cues, urgency pressure, false authority,
//! legally sensitive terms) plus flat bonuses for risky URL shapes.

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{clamp_score, CategoryMatch, LevelBands, RiskCategory, RiskLevel, ScoreResult, CATEGORY_CAP};

const BANDS: LevelBands = LevelBands {
    medium: 20,
    high: 40,
    critical: 70,
};

/// A URL-shape signal with its flat risk bonus.
#[derive(Debug, Clone)]
pub struct UrlRule {
    pub regex: Regex,
    pub risk: u32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AdPolicyRules {
    pub categories: Vec<RiskCategory>,
    pub url_patterns: Vec<UrlRule>,
}

#[derive(Debug, Deserialize)]
struct RawRules {
    categories: Vec<RiskCategory>,
    #[serde(default)]
    url_patterns: Vec<RawUrlRule>,
}

#[derive(Debug, Deserialize)]
struct RawUrlRule {
    pattern: String,
    risk: u32,
    reason: String,
}

static BUILTIN: Lazy<AdPolicyRules> = Lazy::new(|| {
    AdPolicyRules::from_toml_str(include_str!("../../config/ad_policy.toml"))
        .expect("valid built-in ad-policy rules")
});

impl AdPolicyRules {
    pub fn builtin() -> &'static AdPolicyRules {
        &BUILTIN
    }

    /// Parse a dictionary and compile its URL patterns.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let raw: RawRules = toml::from_str(s).context("parse ad-policy rules")?;
        let url_patterns = raw
            .url_patterns
            .into_iter()
            .map(|r| {
                Ok(UrlRule {
                    regex: Regex::new(&r.pattern)
                        .with_context(|| format!("compile URL pattern {:?}", r.pattern))?,
                    risk: r.risk,
                    reason: r.reason,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            categories: raw.categories,
            url_patterns,
        })
    }

    /// Load an override dictionary; falls back to the built-in on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| Self::from_toml_str(&s).ok())
            .unwrap_or_else(|| Self::builtin().clone())
    }
}

/// Lowercase and drop whitespace plus common sentence punctuation, so phrase
/// matching survives line breaks and decorative punctuation in ad copy.
pub(crate) fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '！' | '!' | '？' | '?' | '。' | '、' | ',' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Score ad-policy risk for free text plus the page URL.
pub fn score(text: &str, url: &str, rules: &AdPolicyRules) -> ScoreResult {
    let normalized = normalize(text);

    let mut total: u32 = 0;
    let mut matched_categories: Vec<CategoryMatch> = Vec::new();

    for cat in &rules.categories {
        let matched_words: Vec<String> = cat
            .phrases
            .iter()
            .filter(|w| normalized.contains(&normalize(w)))
            .cloned()
            .collect();

        if !matched_words.is_empty() {
            let contribution = (matched_words.len() as u32 * cat.weight).min(CATEGORY_CAP);
            total += contribution;
            matched_categories.push(CategoryMatch {
                name: cat.name.clone(),
                matched_words,
                contribution,
            });
        }
    }

    let mut extra_signals: Vec<String> = Vec::new();
    for p in &rules.url_patterns {
        if p.regex.is_match(url) {
            total += p.risk;
            extra_signals.push(p.reason.clone());
        }
    }

    let score = clamp_score(total);
    ScoreResult {
        score,
        level: RiskLevel::from_score(score, BANDS),
        matched_categories,
        extra_signals,
    }
}
