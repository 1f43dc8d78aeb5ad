// src/research.rs
//! The rule-based research pipeline: merges research items, extracts and
//! scores keyword candidates, and aggregates page-level risk/profit scores
//! with full evidence for every rule hit.

use serde::{Deserialize, Serialize};

use crate::keywords::{
    self, Funnel, KeywordRules, MatchType, ResearchItem, VolumeRisk,
};
use crate::rules::{self, ad_policy, Dictionaries};

const MAX_SUMMARY_CANDIDATES: usize = 12;
const TOP_FOR_AGGREGATE: usize = 5;
const MAX_EVIDENCE: usize = 60;
const MAX_RECOMMENDATIONS: usize = 8;

const PROFIT_BASE: i32 = 8;
const INTENT_BONUS: i32 = 4;
const TRADEMARK_CUE_RISK: u32 = 20;

// Per-candidate risk blend; ad-policy weighted highest at page level is
// handled separately by `rules::total_risk_score`.
const RISK_W_TRADEMARK: f64 = 0.45;
const RISK_W_AD_POLICY: f64 = 0.35;
const RISK_W_BRIDGE: f64 = 0.20;
const OPPORTUNITY_RISK_FACTOR: f64 = 0.8;

/// One ranked keyword candidate with its component scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCandidate {
    pub keyword: String,
    pub category: Funnel,
    pub match_type: MatchType,
    pub volume_risk: VolumeRisk,
    pub profit_score: u32,
    pub trademark_risk: u32,
    pub ad_policy_risk: u32,
    pub bridge_page_risk: u32,
    pub opportunity_score: u32,
    pub reasons: Vec<String>,
}

/// One rule hit that contributed to some score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub kind: String,
    pub hit: String,
    pub weight: u32,
    pub note: String,
}

/// An offer suggestion keyed by a detected high-value vertical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub offer: String,
    pub why: String,
    pub confidence: u32,
}

/// Page-level aggregate scores, averaged over the top candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchScores {
    pub trademark_risk: u32,
    pub ad_policy_risk: u32,
    pub bridge_page_risk: u32,
    pub total_risk_score: u32,
    pub profit_score: u32,
    pub opportunity_score: u32,
}

/// Full output of one research run. All lists are bounded; rerunning the
/// same input yields the identical summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSummary {
    pub text: String,
    pub candidates: Vec<KeywordCandidate>,
    pub negative_keywords: Vec<String>,
    pub scores: ResearchScores,
    pub evidence: Vec<Evidence>,
    pub recommendations: Vec<Recommendation>,
}

impl ResearchSummary {
    fn empty() -> Self {
        Self {
            text: String::new(),
            candidates: Vec::new(),
            negative_keywords: Vec::new(),
            scores: ResearchScores::default(),
            evidence: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Run the full rule-based research pass over a set of items.
///
/// Empty or whitespace-only input yields an empty summary, never an error.
pub fn run(items: &[ResearchItem], dicts: &Dictionaries) -> ResearchSummary {
    let merged = keywords::merge_items(items);
    if merged.trim().is_empty() {
        return ResearchSummary::empty();
    }

    let mut evidence: Vec<Evidence> = Vec::new();
    let raw_candidates = keywords::extract_candidates(items, &merged, &dicts.keywords);

    // Page-level ad-policy and bridge-cue scores are shared by every
    // candidate: they describe the surrounding copy, not the keyword.
    let page_ad = ad_policy::score(&merged, "", &dicts.ad_policy);
    for cat in &page_ad.matched_categories {
        for word in &cat.matched_words {
            evidence.push(Evidence {
                kind: "adPolicy".into(),
                hit: word.clone(),
                weight: cat.contribution,
                note: format!("ad-policy category {}", cat.name),
            });
        }
    }
    let bridge_risk = bridge_cue_risk(&merged, &dicts.keywords, &mut evidence);

    let mut negative_keywords: Vec<String> = Vec::new();
    let mut candidates: Vec<KeywordCandidate> = Vec::new();

    for kw in raw_candidates {
        // Brand-bearing candidates are excluded outright, not scored.
        if let Some(brand) = dicts.trademark.first_hit(&kw) {
            evidence.push(Evidence {
                kind: "trademark".into(),
                hit: brand.to_string(),
                weight: 35,
                note: format!("brand term in candidate \"{kw}\"; excluded"),
            });
            negative_keywords.push(kw);
            continue;
        }

        let mut reasons: Vec<String> = Vec::new();

        let trademark_risk = trademark_cue_risk(&kw, &dicts.keywords, &mut evidence);
        if trademark_risk >= 40 {
            reasons.push("official/genuine phrasing smells like trademark bidding".into());
        }

        let kw_ad = ad_policy::score(&kw, "", &dicts.ad_policy).score;
        let ad_policy_risk = page_ad.score.max(kw_ad);
        if ad_policy_risk >= 40 {
            reasons.push("surrounding copy is likely to fail ad review".into());
        }

        if bridge_risk >= 35 {
            reasons.push("vocabulary leans toward thin affiliate content".into());
        }

        let profit_score = profit_score(&kw, &merged, &dicts.keywords, &mut evidence);
        if profit_score >= 60 {
            reasons.push("strong price/intent signals".into());
        }

        let risk_total = (f64::from(trademark_risk) * RISK_W_TRADEMARK
            + f64::from(ad_policy_risk) * RISK_W_AD_POLICY
            + f64::from(bridge_risk) * RISK_W_BRIDGE)
            .clamp(0.0, 100.0);
        let opportunity_score =
            (f64::from(profit_score) - risk_total * OPPORTUNITY_RISK_FACTOR).clamp(0.0, 100.0)
                as u32;

        candidates.push(KeywordCandidate {
            category: keywords::funnel_for(&kw, &dicts.keywords),
            match_type: keywords::match_type_for(&kw),
            volume_risk: keywords::volume_risk_for(&kw),
            keyword: kw,
            profit_score,
            trademark_risk,
            ad_policy_risk,
            bridge_page_risk: bridge_risk,
            opportunity_score,
            reasons,
        });
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.opportunity_score));

    let top: Vec<&KeywordCandidate> = candidates.iter().take(TOP_FOR_AGGREGATE).collect();
    let avg = |pick: fn(&KeywordCandidate) -> u32| -> u32 {
        if top.is_empty() {
            return 0;
        }
        let sum: u32 = top.iter().map(|c| pick(c)).sum();
        ((f64::from(sum)) / top.len() as f64).round().clamp(0.0, 100.0) as u32
    };

    let trademark_avg = avg(|c| c.trademark_risk);
    let ad_policy_avg = avg(|c| c.ad_policy_risk);
    let bridge_avg = avg(|c| c.bridge_page_risk);
    let scores = ResearchScores {
        trademark_risk: trademark_avg,
        ad_policy_risk: ad_policy_avg,
        bridge_page_risk: bridge_avg,
        total_risk_score: rules::total_risk_score(ad_policy_avg, trademark_avg, bridge_avg),
        profit_score: avg(|c| c.profit_score),
        opportunity_score: avg(|c| c.opportunity_score),
    };

    let recommendations = build_recommendations(&merged, &dicts.keywords);

    candidates.truncate(MAX_SUMMARY_CANDIDATES);
    ResearchSummary {
        text: merged,
        candidates,
        negative_keywords,
        scores,
        evidence: dedup_evidence(evidence),
        recommendations,
    }
}

/// Official/genuine cue phrasing inside the candidate itself.
fn trademark_cue_risk(keyword: &str, rules: &KeywordRules, evidence: &mut Vec<Evidence>) -> u32 {
    let mut risk: u32 = 0;
    for cue in &rules.trademark_cues {
        if keyword.contains(cue.as_str()) {
            risk += TRADEMARK_CUE_RISK;
            evidence.push(Evidence {
                kind: "trademark".into(),
                hit: cue.clone(),
                weight: TRADEMARK_CUE_RISK,
                note: "official/genuine cue in candidate".into(),
            });
        }
    }
    risk.min(100)
}

/// Density of doorway-page vocabulary across the merged text: cue hits per
/// 200 chars of copy, scaled and clamped.
fn bridge_cue_risk(merged: &str, rules: &KeywordRules, evidence: &mut Vec<Evidence>) -> u32 {
    let total_len = merged.chars().count().max(1);
    let mut hits: u32 = 0;
    for cue in &rules.bridge_cues {
        if merged.contains(cue.as_str()) {
            hits += 1;
            evidence.push(Evidence {
                kind: "bridge".into(),
                hit: cue.clone(),
                weight: 8,
                note: "doorway-page leaning vocabulary".into(),
            });
        }
    }
    let density = f64::from(hits) / (total_len as f64 / 200.0).max(1.0);
    (density * 12.0).clamp(0.0, 100.0) as u32
}

/// Profit heuristic: high-CPC verticals, purchase-intent bonuses, and
/// length/informational adjustments over a small base.
fn profit_score(
    keyword: &str,
    merged: &str,
    rules: &KeywordRules,
    evidence: &mut Vec<Evidence>,
) -> u32 {
    let mut score: i32 = PROFIT_BASE;

    for cat in &rules.high_cpc {
        if keyword.contains(cat.token.as_str()) || merged.contains(cat.token.as_str()) {
            score += cat.weight as i32;
            evidence.push(Evidence {
                kind: "profit".into(),
                hit: cat.token.clone(),
                weight: cat.weight,
                note: format!("high-CPC vertical: {}", cat.offer),
            });
        }
    }

    for cue in &rules.intent_bonus {
        if keyword.contains(cue.as_str()) {
            score += INTENT_BONUS;
        }
    }

    let len = keyword.chars().filter(|c| !c.is_whitespace()).count();
    if len <= 3 {
        score -= 18;
    } else if len <= 5 {
        score -= 10;
    } else if len >= 12 {
        score += 6;
    }

    if rules.info_cues.iter().any(|c| keyword.contains(c.as_str())) {
        score -= 10;
    }

    score.clamp(0, 100) as u32
}

fn build_recommendations(merged: &str, rules: &KeywordRules) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = Vec::new();
    for cat in &rules.high_cpc {
        if merged.contains(cat.token.as_str()) && !out.iter().any(|r| r.offer == cat.offer) {
            out.push(Recommendation {
                offer: cat.offer.clone(),
                why: cat.why.clone(),
                confidence: (60 + cat.weight).min(100),
            });
        }
    }
    out.truncate(MAX_RECOMMENDATIONS);
    out
}

/// The same rule can fire for many candidates; keep the first hit per
/// (kind, hit) pair and bound the list.
fn dedup_evidence(evidence: Vec<Evidence>) -> Vec<Evidence> {
    let mut seen: Vec<(String, String)> = Vec::new();
    let mut out: Vec<Evidence> = Vec::new();
    for e in evidence {
        let key = (e.kind.clone(), e.hit.clone());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(e);
        if out.len() >= MAX_EVIDENCE {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::ResearchItem;

    fn dicts() -> &'static Dictionaries {
        Dictionaries::builtin()
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        assert!(run(&[], dicts()).candidates.is_empty());
        let blank = vec![ResearchItem::text("", "   \n  ", 0)];
        let summary = run(&blank, dicts());
        assert!(summary.candidates.is_empty());
        assert!(summary.evidence.is_empty());
        assert_eq!(summary.scores.total_risk_score, 0);
    }

    #[test]
    fn brand_candidates_are_excluded_not_ranked() {
        let items = vec![ResearchItem::text(
            "kw",
            "Gucci バッグ\n自動車保険 見積",
            0,
        )];
        let summary = run(&items, dicts());
        assert!(summary.negative_keywords.contains(&"Gucci バッグ".to_string()));
        assert!(summary
            .candidates
            .iter()
            .all(|c| !c.keyword.to_lowercase().contains("gucci")));
    }

    #[test]
    fn high_cpc_vertical_drives_profit_and_recommendations() {
        let items = vec![ResearchItem::text("kw", "自動車保険 見積 比較", 0)];
        let summary = run(&items, dicts());
        assert!(summary.scores.profit_score > 0);
        assert!(summary
            .recommendations
            .iter()
            .any(|r| r.offer.contains("insurance")));
        assert!(summary
            .evidence
            .iter()
            .any(|e| e.kind == "profit" && e.hit == "保険"));
    }

    #[test]
    fn candidates_capped_and_sorted_by_opportunity() {
        let value = (0..30)
            .map(|i| format!("キーワード候補{i} 資料請求"))
            .collect::<Vec<_>>()
            .join("\n");
        let items = vec![ResearchItem::text("kw", value, 0)];
        let summary = run(&items, dicts());
        assert!(summary.candidates.len() <= 12);
        for pair in summary.candidates.windows(2) {
            assert!(pair[0].opportunity_score >= pair[1].opportunity_score);
        }
    }

    #[test]
    fn rerun_is_identical() {
        let items = vec![ResearchItem::text("kw", "債務整理 相談\n転職 エージェント 比較", 0)];
        let a = run(&items, dicts());
        let b = run(&items, dicts());
        assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
    }

    #[test]
    fn evidence_is_bounded_and_deduped() {
        let items = vec![ResearchItem::text(
            "kw",
            "保険 比較 おすすめ 口コミ 評判 ランキング 最安 クーポン 債務整理 転職 脱毛 不動産",
            0,
        )];
        let summary = run(&items, dicts());
        assert!(summary.evidence.len() <= 60);
        let mut keys: Vec<(String, String)> = summary
            .evidence
            .iter()
            .map(|e| (e.kind.clone(), e.hit.clone()))
            .collect();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }
}
