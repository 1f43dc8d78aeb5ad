// src/rules/trademark.rs
//! Trademark risk: brand-term matching over page text and URL.
//!
//! URL hits are weighted double and raised as explicit warnings, since a
//! brand inside the domain or path is much harder to defend than a mention.
//! A disclosed official-site phrase anywhere in the text softens every text
//! contribution for that call.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{clamp_score, CategoryMatch, LevelBands, RiskCategory, RiskLevel, ScoreResult, CATEGORY_CAP};

const BANDS: LevelBands = LevelBands {
    medium: 15,
    high: 35,
    critical: 60,
};

/// Brand dictionary plus the context phrases that soften a match.
#[derive(Debug, Clone, Deserialize)]
pub struct TrademarkRules {
    #[serde(default)]
    pub allowed_contexts: Vec<String>,
    pub categories: Vec<RiskCategory>,
}

static BUILTIN: Lazy<TrademarkRules> = Lazy::new(|| {
    toml::from_str(include_str!("../../config/trademark.toml"))
        .expect("valid built-in trademark rules")
});

impl TrademarkRules {
    pub fn builtin() -> &'static TrademarkRules {
        &BUILTIN
    }

    /// Load an override dictionary; falls back to the built-in on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_else(|| Self::builtin().clone())
    }

    /// First brand term that is a case-insensitive substring of `text`.
    pub fn first_hit(&self, text: &str) -> Option<&str> {
        let lc = text.to_lowercase();
        self.categories
            .iter()
            .flat_map(|c| c.phrases.iter())
            .find(|p| lc.contains(&p.to_lowercase()))
            .map(String::as_str)
    }

    /// Every brand term appearing in `text`, deduplicated, in dictionary order.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let lc = text.to_lowercase();
        let mut found: Vec<String> = Vec::new();
        for cat in &self.categories {
            for phrase in &cat.phrases {
                if lc.contains(&phrase.to_lowercase()) && !found.contains(phrase) {
                    found.push(phrase.clone());
                }
            }
        }
        found
    }
}

/// Score trademark risk for free text plus the page URL.
pub fn score(text: &str, url: &str, rules: &TrademarkRules) -> ScoreResult {
    let text_lc = text.to_lowercase();
    let url_lc = url.to_lowercase();

    let softened = rules
        .allowed_contexts
        .iter()
        .any(|c| text_lc.contains(&c.to_lowercase()));

    let mut total: u32 = 0;
    let mut matched_categories: Vec<CategoryMatch> = Vec::new();
    let mut extra_signals: Vec<String> = Vec::new();

    for cat in &rules.categories {
        let mut matched_words: Vec<String> = Vec::new();
        let mut subtotal: u32 = 0;

        for phrase in &cat.phrases {
            let phrase_lc = phrase.to_lowercase();

            if text_lc.contains(&phrase_lc) {
                let contribution = if softened { cat.weight / 3 } else { cat.weight };
                subtotal += contribution;
                matched_words.push(phrase.clone());
            }

            // Brand inside the URL is the more dangerous shape.
            if url_lc.contains(&phrase_lc) {
                total += cat.weight * 2;
                extra_signals.push(format!(
                    "URL contains trademark \"{phrase}\" (high infringement risk)"
                ));
            }
        }

        if !matched_words.is_empty() {
            let contribution = subtotal.min(CATEGORY_CAP);
            total += contribution;
            matched_categories.push(CategoryMatch {
                name: cat.name.clone(),
                matched_words,
                contribution,
            });
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_scores_zero() {
        let r = score("手作りの革製品を紹介するブログです", "https://example.com", TrademarkRules::builtin());
        assert_eq!(r.score, 0);
        assert_eq!(r.level, RiskLevel::Low);
        assert!(r.matched_categories.is_empty());
    }

    #[test]
    fn brand_mention_scores_positive() {
        let r = score("Googleの検索結果を上げる方法", "https://example.com", TrademarkRules::builtin());
        assert!(r.score > 0);
        assert_eq!(r.matched_categories[0].matched_words, vec!["Google"]);
    }

    #[test]
    fn official_site_context_softens_the_score() {
        let rules = TrademarkRules::builtin();
        let bare = score("Googleで検索", "https://example.com", rules);
        let disclosed = score("Googleの公式サイトはこちら", "https://example.com", rules);
        assert!(disclosed.score > 0);
        assert!(disclosed.score < bare.score);
    }

    #[test]
    fn url_hit_is_doubled_and_warned() {
        let r = score("ニュースまとめ", "https://google-fan.example.com", TrademarkRules::builtin());
        assert_eq!(r.score, 20);
        assert_eq!(r.extra_signals.len(), 1);
        assert!(r.extra_signals[0].contains("Google"));
    }

    #[test]
    fn category_contribution_is_capped() {
        let rules = TrademarkRules {
            allowed_contexts: Vec::new(),
            categories: vec![RiskCategory {
                name: "test".into(),
                weight: 10,
                phrases: vec!["aaa".into(), "bbb".into(), "ccc".into(), "ddd".into()],
            }],
        };
        let r = score("aaa bbb ccc ddd", "", &rules);
        assert_eq!(r.score, CATEGORY_CAP);
        assert_eq!(r.matched_categories[0].matched_words.len(), 4);
    }

    #[test]
    fn first_hit_is_case_insensitive() {
        let rules = TrademarkRules::builtin();
        assert_eq!(rules.first_hit("best gucci bags"), Some("Gucci"));
        assert_eq!(rules.first_hit("ペアリング 通販"), None);
    }
}
