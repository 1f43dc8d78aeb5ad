//! Demo that runs the full research pipeline against a URL (fetch + score +
//! suggest) or against free text piped on stdin, and prints the JSON result.
//!
//! Usage:
//!   research_demo https://example.com/
//!   echo "自動車保険 見積 比較" | research_demo -

use std::io::Read;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ppc_research_engine::rules::{ad_policy, bridge_page, trademark, Dictionaries};
use ppc_research_engine::{
    fetch_page, keywords, run_research, suggest_keywords, SuggestSource, SuggestStrategy,
};

const FETCH_TIMEOUT_MS: u64 = 10_000;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let arg = std::env::args()
        .nth(1)
        .context("usage: research_demo <url | ->")?;
    let dicts = Dictionaries::builtin();

    let output = if arg == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        let items = vec![keywords::ResearchItem::text("stdin", text, 0)];
        let summary = run_research(&items, dicts);
        let suggestions = suggest_keywords(
            SuggestSource::Items(&items),
            dicts,
            SuggestStrategy::Ranked,
            None,
        );
        serde_json::json!({ "research": summary, "suggestions": suggestions })
    } else {
        let page = fetch_page(&arg, FETCH_TIMEOUT_MS).await;
        let merged = format!("{}\n{}\n{}\n{}", page.title, page.h1, page.meta_description, page.body_text);
        let tm = trademark::score(&merged, &arg, &dicts.trademark);
        let ad = ad_policy::score(&merged, &arg, &dicts.ad_policy);
        let bridge = bridge_page::score(&page, &dicts.bridge_page);
        let total = ppc_research_engine::total_risk_score(ad.score, tm.score, bridge.score);
        let suggestions = suggest_keywords(
            SuggestSource::Page(&page),
            dicts,
            SuggestStrategy::Ranked,
            None,
        );
        serde_json::json!({
            "page": page,
            "trademark": tm,
            "adPolicy": ad,
            "bridgePage": bridge,
            "totalRiskScore": total,
            "suggestions": suggestions,
        })
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
