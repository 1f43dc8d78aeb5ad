// src/suggest.rs
//! Keyword suggestion on top of the research pipeline. Two strategies:
//! `Ranked` reuses the scored candidates from `research::run`, `Template`
//! expands funnel slot templates around a detected product term.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keywords::{self, Funnel, MatchType, ResearchItem, VolumeRisk};
use crate::research;
use crate::rules::Dictionaries;
use crate::scrape::PageSignals;

const MAIN_SEGMENT_LIMIT: usize = 2;
const TEMPLATE_PURCHASE_SLOTS: usize = 4;
const TEMPLATE_COMPARE_SLOTS: usize = 3;
const TEMPLATE_PROBLEM_SLOTS: usize = 4;
const TEMPLATE_INFO_SLOTS: usize = 3;
const TEMPLATE_ADDON_SLOTS: usize = 3;
const MAX_PRODUCT_LEN: usize = 10;

/// Which suggestion engine to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestStrategy {
    /// Slot-template expansion around a detected product term.
    Template,
    /// Opportunity-ranked candidates from the research pipeline.
    #[default]
    Ranked,
}

/// Input for a suggestion run.
pub enum SuggestSource<'a> {
    Items(&'a [ResearchItem]),
    Page(&'a PageSignals),
}

/// One suggested keyword with its score and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedKeyword {
    pub keyword: String,
    pub category: Funnel,
    pub score: u32,
    pub match_type: MatchType,
    pub volume_risk: VolumeRisk,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSuggestionResult {
    pub main_keywords: Vec<SuggestedKeyword>,
    pub long_tail_keywords: Vec<SuggestedKeyword>,
    pub negative_keywords: Vec<String>,
    pub summary: String,
}

/// Suggest keywords from items or a parsed page.
///
/// `product_override` forces the template strategy's product term instead of
/// detecting one from the text.
pub fn suggest_keywords(
    source: SuggestSource<'_>,
    dicts: &Dictionaries,
    strategy: SuggestStrategy,
    product_override: Option<&str>,
) -> KeywordSuggestionResult {
    let owned_items;
    let items: &[ResearchItem] = match source {
        SuggestSource::Items(items) => items,
        SuggestSource::Page(page) => {
            owned_items = keywords::items_from_page(page);
            &owned_items
        }
    };
    debug!(target: "suggest", ?strategy, items = items.len(), "suggestion run");
    match strategy {
        SuggestStrategy::Ranked => suggest_ranked(items, dicts),
        SuggestStrategy::Template => suggest_template(items, dicts, product_override),
    }
}

/// Group suggestions by funnel stage, score-descending within each group.
/// Every stage is present even when empty.
pub fn group_by_funnel(suggestions: &[SuggestedKeyword]) -> BTreeMap<Funnel, Vec<SuggestedKeyword>> {
    let mut groups: BTreeMap<Funnel, Vec<SuggestedKeyword>> = BTreeMap::new();
    for funnel in [Funnel::Purchase, Funnel::Compare, Funnel::Info, Funnel::Problem] {
        groups.insert(funnel, Vec::new());
    }
    for s in suggestions {
        groups.entry(s.category).or_default().push(s.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|s| std::cmp::Reverse(s.score));
    }
    groups
}

fn suggest_ranked(items: &[ResearchItem], dicts: &Dictionaries) -> KeywordSuggestionResult {
    let summary = research::run(items, dicts);

    let mut main_keywords: Vec<SuggestedKeyword> = Vec::new();
    let mut long_tail_keywords: Vec<SuggestedKeyword> = Vec::new();
    for c in &summary.candidates {
        let reason = if c.reasons.is_empty() {
            format!("opportunity {} from rule scoring", c.opportunity_score)
        } else {
            c.reasons.join("; ")
        };
        let suggested = SuggestedKeyword {
            keyword: c.keyword.clone(),
            category: c.category,
            score: c.opportunity_score,
            match_type: c.match_type,
            volume_risk: c.volume_risk,
            reason,
        };
        if keywords::segment_count(&c.keyword) <= MAIN_SEGMENT_LIMIT {
            main_keywords.push(suggested);
        } else {
            long_tail_keywords.push(suggested);
        }
    }

    let mut negative_keywords = summary.negative_keywords.clone();
    for brand in dicts.trademark.find_all(&summary.text) {
        if !negative_keywords
            .iter()
            .any(|n| n.to_lowercase() == brand.to_lowercase())
        {
            negative_keywords.push(brand);
        }
    }

    let text_summary = format!(
        "{} main / {} long-tail keywords ranked by opportunity; total risk {}",
        main_keywords.len(),
        long_tail_keywords.len(),
        summary.scores.total_risk_score,
    );
    KeywordSuggestionResult {
        main_keywords,
        long_tail_keywords,
        negative_keywords,
        summary: text_summary,
    }
}

fn suggest_template(
    items: &[ResearchItem],
    dicts: &Dictionaries,
    product_override: Option<&str>,
) -> KeywordSuggestionResult {
    let merged = keywords::merge_items(items);
    let rules = &dicts.keywords;
    let template = &rules.template;

    let detected: Vec<&str> = template
        .product_categories
        .iter()
        .filter(|cat| cat.cues.iter().any(|cue| merged.contains(cue.as_str())))
        .map(|cat| cat.name.as_str())
        .collect();

    let product = product_override
        .map(str::to_string)
        .unwrap_or_else(|| detect_product(&merged, &detected, dicts, &template.fallback_product));

    let mut seen_lower: Vec<String> = Vec::new();
    let mut push = |out: &mut Vec<SuggestedKeyword>,
                    keyword: String,
                    category: Funnel,
                    score: u32,
                    reason: &str| {
        let key = keyword.to_lowercase();
        if seen_lower.contains(&key) {
            return;
        }
        seen_lower.push(key);
        out.push(SuggestedKeyword {
            category,
            score,
            match_type: keywords::match_type_for(&keyword),
            volume_risk: keywords::volume_risk_for(&keyword),
            keyword,
            reason: reason.to_string(),
        });
    };

    let mut main_keywords: Vec<SuggestedKeyword> = Vec::new();
    for (i, slot) in template.purchase.iter().take(TEMPLATE_PURCHASE_SLOTS).enumerate() {
        let kw = slot.replace("{product}", &product);
        push(
            &mut main_keywords,
            kw,
            Funnel::Purchase,
            92u32.saturating_sub(2 * i as u32),
            "purchase-intent slot",
        );
    }
    for (i, slot) in template.compare.iter().take(TEMPLATE_COMPARE_SLOTS).enumerate() {
        let kw = slot.replace("{product}", &product);
        push(
            &mut main_keywords,
            kw,
            Funnel::Compare,
            78u32.saturating_sub(2 * i as u32),
            "comparison-stage slot",
        );
    }

    let mut long_tail_keywords: Vec<SuggestedKeyword> = Vec::new();
    for cat in &template.product_categories {
        if !detected.contains(&cat.name.as_str()) {
            continue;
        }
        for (i, addon) in cat.addons.iter().take(TEMPLATE_ADDON_SLOTS).enumerate() {
            let kw = format!("{product} {addon}");
            push(
                &mut long_tail_keywords,
                kw,
                Funnel::Purchase,
                70u32.saturating_sub(2 * i as u32),
                "detected product-category add-on",
            );
        }
    }
    for (i, slot) in template.problem.iter().take(TEMPLATE_PROBLEM_SLOTS).enumerate() {
        let kw = slot.replace("{product}", &product);
        push(
            &mut long_tail_keywords,
            kw,
            Funnel::Problem,
            60u32.saturating_sub(2 * i as u32),
            "problem-solving slot",
        );
    }
    for (i, slot) in template.info.iter().take(TEMPLATE_INFO_SLOTS).enumerate() {
        let kw = slot.replace("{product}", &product);
        push(
            &mut long_tail_keywords,
            kw,
            Funnel::Info,
            50u32.saturating_sub(2 * i as u32),
            "informational slot",
        );
    }

    let negative_keywords = dicts.trademark.find_all(&merged);
    let summary = format!(
        "template expansion around \"{product}\": {} main / {} long-tail keywords",
        main_keywords.len(),
        long_tail_keywords.len(),
    );
    KeywordSuggestionResult {
        main_keywords,
        long_tail_keywords,
        negative_keywords,
        summary,
    }
}

/// Product-term detection for the template strategy. Category pairs take
/// priority, then the first short non-brand token, then the fallback.
fn detect_product(
    merged: &str,
    detected: &[&str],
    dicts: &Dictionaries,
    fallback: &str,
) -> String {
    if detected.contains(&"ペア") && detected.contains(&"アクセサリー") {
        return "ペアアクセサリー".to_string();
    }
    if detected.contains(&"アクセサリー") {
        return "アクセサリー".to_string();
    }
    for token in keywords::extract_tokens(merged) {
        let n = token.chars().count();
        if n > MAX_PRODUCT_LEN {
            continue;
        }
        if dicts.trademark.first_hit(&token).is_some() {
            continue;
        }
        return token;
    }
    fallback.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dicts() -> &'static Dictionaries {
        Dictionaries::builtin()
    }

    #[test]
    fn ranked_splits_main_and_long_tail_by_segments() {
        let items = vec![ResearchItem::text(
            "kw",
            "自動車保険 見積\n自動車 保険 一括 見積 比較",
            0,
        )];
        let out = suggest_keywords(
            SuggestSource::Items(&items),
            dicts(),
            SuggestStrategy::Ranked,
            None,
        );
        assert!(out
            .main_keywords
            .iter()
            .all(|s| keywords::segment_count(&s.keyword) <= 2));
        assert!(out
            .long_tail_keywords
            .iter()
            .any(|s| keywords::segment_count(&s.keyword) > 2));
    }

    #[test]
    fn ranked_excludes_brands_into_negatives() {
        let items = vec![ResearchItem::text("kw", "Gucci 財布\n革 財布 手入れ", 0)];
        let out = suggest_keywords(
            SuggestSource::Items(&items),
            dicts(),
            SuggestStrategy::Ranked,
            None,
        );
        assert!(out
            .negative_keywords
            .iter()
            .any(|n| n.to_lowercase().contains("gucci")));
        let all = out.main_keywords.iter().chain(&out.long_tail_keywords);
        assert!(all
            .into_iter()
            .all(|s| !s.keyword.to_lowercase().contains("gucci")));
    }

    #[test]
    fn template_detects_pair_accessory_product() {
        let items = vec![ResearchItem::text(
            "memo",
            "カップルに人気のペアリングとアクセサリーを扱うお店",
            0,
        )];
        let out = suggest_keywords(
            SuggestSource::Items(&items),
            dicts(),
            SuggestStrategy::Template,
            None,
        );
        assert!(out
            .main_keywords
            .iter()
            .any(|s| s.keyword == "ペアアクセサリー 購入"));
        assert!(!out.long_tail_keywords.is_empty());
    }

    #[test]
    fn template_respects_product_override() {
        let items = vec![ResearchItem::text("memo", "特に内容なし", 0)];
        let out = suggest_keywords(
            SuggestSource::Items(&items),
            dicts(),
            SuggestStrategy::Template,
            Some("腕時計"),
        );
        assert!(out.main_keywords.iter().all(|s| s.keyword.starts_with("腕時計")));
    }

    #[test]
    fn template_dedupes_case_insensitively() {
        let items = vec![ResearchItem::text("memo", "ペアリング ギフト", 0)];
        let out = suggest_keywords(
            SuggestSource::Items(&items),
            dicts(),
            SuggestStrategy::Template,
            None,
        );
        let mut lower: Vec<String> = out
            .main_keywords
            .iter()
            .chain(&out.long_tail_keywords)
            .map(|s| s.keyword.to_lowercase())
            .collect();
        let before = lower.len();
        lower.sort();
        lower.dedup();
        assert_eq!(before, lower.len());
    }

    #[test]
    fn grouping_yields_all_four_funnels() {
        let items = vec![ResearchItem::text("memo", "ペアリング 比較", 0)];
        let out = suggest_keywords(
            SuggestSource::Items(&items),
            dicts(),
            SuggestStrategy::Template,
            None,
        );
        let all: Vec<SuggestedKeyword> = out
            .main_keywords
            .into_iter()
            .chain(out.long_tail_keywords)
            .collect();
        let groups = group_by_funnel(&all);
        assert_eq!(groups.len(), 4);
        for group in groups.values() {
            for pair in group.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
