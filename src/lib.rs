// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod keywords;
pub mod normalize;
pub mod research;
pub mod rules;
pub mod scrape;
pub mod suggest;

// ---- Re-exports for stable public API ----
pub use crate::keywords::{Funnel, ItemKind, MatchType, ResearchItem, VolumeRisk};
pub use crate::normalize::{normalize_run_result, NormalizedRunResult};
pub use crate::research::{run as run_research, KeywordCandidate, ResearchSummary};
pub use crate::rules::{
    total_risk_score, Dictionaries, RiskLevel, ScoreResult,
};
pub use crate::scrape::{fetch_page, parse_html, PageSignals};
pub use crate::suggest::{
    group_by_funnel, suggest_keywords, KeywordSuggestionResult, SuggestSource, SuggestStrategy,
    SuggestedKeyword,
};
