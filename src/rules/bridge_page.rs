// src/rules/bridge_page.rs
//! Bridge/doorway-page risk: structural heuristics over extracted page
//! signals. Thin content, redirect scripts, affiliate-only link shapes,
//! CTA pressure, landing-page URL paths, and a locale-mismatch check all
//! accumulate penalties.
//!
//! A page with `fetch_error` set scores 0 with an explicit "not assessable"
//! signal: the caller must not read that zero as safe.

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{clamp_score, CategoryMatch, LevelBands, RiskLevel, ScoreResult};
use crate::scrape::{self, PageSignals};

const BANDS: LevelBands = LevelBands {
    medium: 15,
    high: 35,
    critical: 60,
};

// Fixed penalties per heuristic.
const PENALTY_VERY_THIN: u32 = 30;
const PENALTY_THIN: u32 = 15;
const PENALTY_REDIRECT: u32 = 25;
const PENALTY_IFRAME: u32 = 10;
const PENALTY_AFFILIATE_LINKS: u32 = 20;
const PENALTY_EXTERNAL_RATIO: u32 = 10;
const PENALTY_CTA_PRESSURE: u32 = 15;
const PENALTY_LP_PATH: u32 = 5;
const PENALTY_LOCALE_MISMATCH: u32 = 15;
const CTA_PATTERN_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct BridgePageRules {
    pub critical_word_count: usize,
    pub min_word_count: usize,
    pub suspicious_external_links: usize,
    pub max_external_ratio: f64,
    pub lp_path: Regex,
    pub foreign_tlds: Vec<String>,
    pub cta_patterns: Vec<Regex>,
}

#[derive(Debug, Deserialize)]
struct RawRules {
    critical_word_count: usize,
    min_word_count: usize,
    suspicious_external_links: usize,
    max_external_ratio: f64,
    lp_path_pattern: String,
    foreign_tlds: Vec<String>,
    cta_patterns: Vec<String>,
}

static BUILTIN: Lazy<BridgePageRules> = Lazy::new(|| {
    BridgePageRules::from_toml_str(include_str!("../../config/bridge_page.toml"))
        .expect("valid built-in bridge-page rules")
});

impl BridgePageRules {
    pub fn builtin() -> &'static BridgePageRules {
        &BUILTIN
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let raw: RawRules = toml::from_str(s).context("parse bridge-page rules")?;
        Ok(Self {
            critical_word_count: raw.critical_word_count,
            min_word_count: raw.min_word_count,
            suspicious_external_links: raw.suspicious_external_links,
            max_external_ratio: raw.max_external_ratio,
            lp_path: Regex::new(&raw.lp_path_pattern).context("compile LP path pattern")?,
            foreign_tlds: raw.foreign_tlds,
            cta_patterns: raw
                .cta_patterns
                .iter()
                .map(|p| Regex::new(p).with_context(|| format!("compile CTA pattern {p:?}")))
                .collect::<anyhow::Result<Vec<_>>>()?,
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

/// Score bridge/doorway risk for one extracted page.
pub fn score(signals: &PageSignals, rules: &BridgePageRules) -> ScoreResult {
    if let Some(err) = &signals.fetch_error {
        return ScoreResult {
            score: 0,
            level: RiskLevel::Low,
            matched_categories: Vec::new(),
            extra_signals: vec![format!("fetch failed ({err}); risk not assessable")],
        };
    }

    let mut total: u32 = 0;
    let mut extra_signals: Vec<String> = Vec::new();
    let mut matched_categories: Vec<CategoryMatch> = Vec::new();

    // 1. Content volume.
    if signals.word_count < rules.critical_word_count {
        total += PENALTY_VERY_THIN;
        extra_signals.push(format!("very thin content ({} words)", signals.word_count));
    } else if signals.word_count < rules.min_word_count {
        total += PENALTY_THIN;
        extra_signals.push(format!("thin content ({} words)", signals.word_count));
    }

    // 2. Structural flags.
    if signals.has_redirect_script {
        total += PENALTY_REDIRECT;
        extra_signals.push("JS redirect detected".into());
    }
    if signals.has_iframe {
        total += PENALTY_IFRAME;
        extra_signals.push("iframe embed detected".into());
    }

    // 3. Link shape.
    let total_links = signals.external_link_count + signals.internal_link_count;
    if total_links > 0 {
        let external_ratio = signals.external_link_count as f64 / total_links as f64;
        if signals.external_link_count > 0
            && signals.external_link_count <= rules.suspicious_external_links
            && signals.internal_link_count == 0
        {
            total += PENALTY_AFFILIATE_LINKS;
            extra_signals.push(format!(
                "only {} external link(s), zero internal (affiliate-style)",
                signals.external_link_count
            ));
        } else if external_ratio >= rules.max_external_ratio {
            total += PENALTY_EXTERNAL_RATIO;
            extra_signals.push(format!(
                "high external link ratio ({}%)",
                (external_ratio * 100.0).round() as u32
            ));
        }
    }

    // 4. CTA/urgency pressure: penalize once three distinct patterns match.
    let cta_hits: Vec<String> = rules
        .cta_patterns
        .iter()
        .filter(|re| re.is_match(&signals.body_text))
        .map(|re| re.as_str().to_string())
        .collect();
    if cta_hits.len() >= CTA_PATTERN_THRESHOLD {
        total += PENALTY_CTA_PRESSURE;
        extra_signals.push(format!("heavy CTA pressure ({} patterns)", cta_hits.len()));
        matched_categories.push(CategoryMatch {
            name: "cta-pressure".into(),
            matched_words: cta_hits,
            contribution: PENALTY_CTA_PRESSURE,
        });
    }

    // 5. Landing-page style URL path.
    if rules.lp_path.is_match(&signals.url) {
        total += PENALTY_LP_PATH;
        extra_signals.push("landing-page style URL path".into());
    }

    // 6. CJK content hosted on a low-trust foreign TLD.
    let has_cjk = signals.body_text.chars().any(scrape::is_cjk);
    if has_cjk && host_has_foreign_tld(&signals.url, &rules.foreign_tlds) {
        total += PENALTY_LOCALE_MISMATCH;
        extra_signals.push("CJK content on low-trust foreign TLD".into());
    }

    let score = clamp_score(total);
    ScoreResult {
        score,
        level: RiskLevel::from_score(score, BANDS),
        matched_categories,
        extra_signals,
    }
}

/// Parse raw markup and score it in one step, for callers that skipped the
/// fetch.
pub fn score_html(html: &str, url: &str, rules: &BridgePageRules) -> ScoreResult {
    score(&scrape::parse_html(html, url), rules)
}

fn host_has_foreign_tld(url: &str, tlds: &[String]) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) else {
        return false;
    };
    tlds.iter().any(|tld| host.ends_with(&format!(".{tld}")))
}
