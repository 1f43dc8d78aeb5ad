// src/keywords.rs
//! Keyword-candidate primitives: research-item merging, tokenization,
//! candidate extraction with intent-first ordering, funnel categorization,
//! and the match-type / volume-risk classifiers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::scrape::PageSignals;

const MAX_TOKEN_LEN: usize = 40;
const MIN_TOKEN_LEN: usize = 2;
const MAX_PHRASE_LEN: usize = 60;
const TOP_TOKENS: usize = 40;
const MAX_CANDIDATES: usize = 20;

/// What kind of value a research item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Url,
    Number,
    Money,
    Note,
}

/// One free-text research input. Consumed transiently per scoring pass,
/// never persisted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchItem {
    pub label: String,
    pub value: String,
    pub kind: ItemKind,
    pub order: i32,
}

impl ResearchItem {
    pub fn text(label: impl Into<String>, value: impl Into<String>, order: i32) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            kind: ItemKind::Text,
            order,
        }
    }
}

/// Funnel stage a candidate keyword targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Funnel {
    Purchase,
    Compare,
    Info,
    Problem,
}

/// Recommended search-ads match type. Exact is never auto-suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Broad,
    Phrase,
    Exact,
}

/// Heuristic estimate of whether a keyword is too narrow for real traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeRisk {
    High,
    Medium,
    Low,
}

/// High-CPC vertical with its profit weight and offer suggestion.
#[derive(Debug, Clone, Deserialize)]
pub struct HighCpcCategory {
    pub token: String,
    pub weight: u32,
    pub offer: String,
    pub why: String,
}

/// Product-category detection rule for the template strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCategory {
    pub name: String,
    pub cues: Vec<String>,
    #[serde(default)]
    pub addons: Vec<String>,
}

/// Slot templates and product-category rules for the template strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRules {
    pub fallback_product: String,
    pub purchase: Vec<String>,
    pub compare: Vec<String>,
    pub info: Vec<String>,
    pub problem: Vec<String>,
    pub product_categories: Vec<ProductCategory>,
}

/// Funnel-intent vocabulary and profit heuristics.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRules {
    pub intent_boost: Vec<String>,
    pub intent_bonus: Vec<String>,
    pub info_cues: Vec<String>,
    pub trademark_cues: Vec<String>,
    pub bridge_cues: Vec<String>,
    pub purchase_cues: Vec<String>,
    pub compare_cues: Vec<String>,
    pub problem_cues: Vec<String>,
    pub high_cpc: Vec<HighCpcCategory>,
    pub template: TemplateRules,
}

static BUILTIN: Lazy<KeywordRules> = Lazy::new(|| {
    toml::from_str(include_str!("../config/keywords.toml"))
        .expect("valid built-in keyword rules")
});

impl KeywordRules {
    pub fn builtin() -> &'static KeywordRules {
        &BUILTIN
    }

    /// Load an override dictionary; falls back to the built-in on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_else(|| Self::builtin().clone())
    }
}

// CJK runs, Latin letters and digits; delimiters split everything else.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FFF}a-zA-Z0-9]+")
        .expect("token regex")
});
// Delimiters users actually type between literal keyword phrases.
static PHRASE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\n,、;・]").expect("phrase split regex"));

/// Normalize line endings, collapse runs of spaces/tabs, trim.
pub fn normalize_text(s: &str) -> String {
    let unified = s.replace("\r\n", "\n");
    let mut out = String::with_capacity(unified.len());
    let mut last_blank = false;
    for ch in unified.chars() {
        if ch == ' ' || ch == '\t' {
            if !last_blank {
                out.push(' ');
                last_blank = true;
            }
        } else {
            out.push(ch);
            last_blank = false;
        }
    }
    out.trim().to_string()
}

/// Merge item labels and values into one newline-joined text blob.
pub fn merge_items(items: &[ResearchItem]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for item in items {
        let label = normalize_text(&item.label);
        let value = normalize_text(&item.value);
        if !label.is_empty() {
            parts.push(label);
        }
        if !value.is_empty() {
            parts.push(value);
        }
    }
    parts.join("\n")
}

/// Adapt a parsed page to research items so page-based and item-based runs
/// share one pipeline.
pub fn items_from_page(page: &PageSignals) -> Vec<ResearchItem> {
    [
        ("title", &page.title),
        ("h1", &page.h1),
        ("description", &page.meta_description),
        ("body", &page.body_text),
    ]
    .iter()
    .enumerate()
    .filter(|(_, (_, v))| !v.trim().is_empty())
    .map(|(i, (label, value))| ResearchItem::text(*label, value.as_str(), i as i32))
    .collect()
}

/// Tokenize into CJK/Latin/digit runs of 2-40 chars.
pub fn extract_tokens(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|t| {
            let n = t.chars().count();
            (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&n)
        })
        .collect()
}

/// Raw candidate keywords: literal user-entered phrases first, then the most
/// frequent tokens, deduplicated case-insensitively in first-seen order, with
/// purchase-intent candidates sorted to the front. Capped at 20.
pub fn extract_candidates(
    items: &[ResearchItem],
    merged_text: &str,
    rules: &KeywordRules,
) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();
    for item in items {
        let value = normalize_text(&item.value);
        if value.is_empty() {
            continue;
        }
        for line in PHRASE_SPLIT_RE.split(&value) {
            let line = line.trim();
            let n = line.chars().count();
            if (MIN_TOKEN_LEN..=MAX_PHRASE_LEN).contains(&n) {
                raw.push(line.to_string());
            }
        }
    }

    let tokens = extract_tokens(merged_text);
    let mut freq: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for t in tokens {
        if !freq.contains_key(&t) {
            first_seen.push(t.clone());
        }
        *freq.entry(t).or_insert(0) += 1;
    }
    // Stable by descending count, first-seen order within ties.
    let mut freq_top: Vec<String> = first_seen;
    freq_top.sort_by_key(|t| std::cmp::Reverse(freq[t]));
    freq_top.truncate(TOP_TOKENS);

    let mut seen_lower: Vec<String> = Vec::new();
    let mut uniq: Vec<String> = Vec::new();
    for s in raw.into_iter().chain(freq_top) {
        let cleaned = normalize_text(&s);
        if cleaned.is_empty() {
            continue;
        }
        let key = cleaned.to_lowercase();
        if seen_lower.contains(&key) {
            continue;
        }
        seen_lower.push(key);
        uniq.push(cleaned);
    }

    // Intent-bearing candidates first; stable sort keeps relative order.
    uniq.sort_by_key(|kw| !rules.intent_boost.iter().any(|w| kw.contains(w.as_str())));
    uniq.truncate(MAX_CANDIDATES);
    uniq
}

/// Categorize a candidate into its funnel stage via cue-word membership.
pub fn funnel_for(keyword: &str, rules: &KeywordRules) -> Funnel {
    let contains_any = |cues: &[String]| cues.iter().any(|c| keyword.contains(c.as_str()));
    if contains_any(&rules.purchase_cues) {
        Funnel::Purchase
    } else if contains_any(&rules.compare_cues) {
        Funnel::Compare
    } else if contains_any(&rules.problem_cues) {
        Funnel::Problem
    } else {
        Funnel::Info
    }
}

/// Whitespace-separated segment count; CJK phrases without spaces count as
/// one segment.
pub(crate) fn segment_count(keyword: &str) -> usize {
    keyword.split_whitespace().count()
}

/// Single terms go broad; everything longer gets phrase match. Exact is
/// never auto-suggested.
pub fn match_type_for(keyword: &str) -> MatchType {
    if segment_count(keyword) <= 1 {
        MatchType::Broad
    } else {
        MatchType::Phrase
    }
}

/// One segment → high volume risk is on the advertiser (too broad is fine,
/// too narrow is not); two segments → high only with a short head term;
/// three or more → low expected volume.
pub fn volume_risk_for(keyword: &str) -> VolumeRisk {
    let segments: Vec<&str> = keyword.split_whitespace().collect();
    match segments.len() {
        0 | 1 => VolumeRisk::High,
        2 => {
            if segments[0].chars().count() <= 3 {
                VolumeRisk::High
            } else {
                VolumeRisk::Medium
            }
        }
        _ => VolumeRisk::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> &'static KeywordRules {
        KeywordRules::builtin()
    }

    #[test]
    fn tokens_keep_cjk_runs_and_drop_short_ones() {
        let tokens = extract_tokens("医療脱毛とは a bb ccc 2024");
        assert!(tokens.contains(&"医療脱毛とは".to_string()));
        assert!(tokens.contains(&"bb".to_string()));
        assert!(tokens.contains(&"2024".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
    }

    #[test]
    fn candidates_dedupe_case_insensitively() {
        let items = vec![ResearchItem::text("kw", "SEO対策, seo対策", 0)];
        let merged = merge_items(&items);
        let out = extract_candidates(&items, &merged, rules());
        let lower: Vec<String> = out.iter().map(|s| s.to_lowercase()).collect();
        let mut deduped = lower.clone();
        deduped.dedup();
        assert_eq!(lower.len(), deduped.len());
    }

    #[test]
    fn intent_candidates_sort_first() {
        let items = vec![ResearchItem::text(
            "memo",
            "ペットフード\n犬 おやつ 比較\nケージ",
            0,
        )];
        let merged = merge_items(&items);
        let out = extract_candidates(&items, &merged, rules());
        assert_eq!(out[0], "犬 おやつ 比較");
    }

    #[test]
    fn empty_items_produce_no_candidates() {
        let items = vec![ResearchItem::text("", "   ", 0)];
        let merged = merge_items(&items);
        assert!(extract_candidates(&items, &merged, rules()).is_empty());
    }

    #[test]
    fn funnel_categorization_prefers_purchase() {
        let r = rules();
        assert_eq!(funnel_for("ペアリング 購入", r), Funnel::Purchase);
        assert_eq!(funnel_for("ペアリング 比較", r), Funnel::Compare);
        assert_eq!(funnel_for("指輪 黒ずみ", r), Funnel::Problem);
        assert_eq!(funnel_for("指輪 とは", r), Funnel::Info);
    }

    #[test]
    fn match_type_never_exact() {
        assert_eq!(match_type_for("保険"), MatchType::Broad);
        assert_eq!(match_type_for("保険 相談"), MatchType::Phrase);
        assert_eq!(match_type_for("医療 保険 見直し 相談"), MatchType::Phrase);
    }

    #[test]
    fn volume_risk_by_segment_count() {
        assert_eq!(volume_risk_for("保険"), VolumeRisk::High);
        assert_eq!(volume_risk_for("車 保険"), VolumeRisk::High); // short head
        assert_eq!(volume_risk_for("自動車保険 見積"), VolumeRisk::Medium);
        assert_eq!(volume_risk_for("自動車 保険 一括 見積"), VolumeRisk::Low);
    }

    #[test]
    fn items_from_page_skips_empty_fields() {
        let page = PageSignals {
            title: "ペアリング専門店".into(),
            body_text: "ステンレス素材のペアリングを販売".into(),
            ..PageSignals::default()
        };
        let items = items_from_page(&page);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "title");
    }
}
