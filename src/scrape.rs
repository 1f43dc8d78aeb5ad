// src/scrape.rs
//! Tolerant page-signal extraction: a bounded fetch plus a set of targeted
//! regex passes over raw markup (deliberately no DOM tree, so malformed and
//! unterminated HTML degrades to empty fields instead of errors).

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 300;
const MAX_OG_IMAGE_LEN: usize = 500;
const MAX_BODY_LEN: usize = 5000;
const MAX_KEYWORDS: usize = 10;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; PPCResearchBot/1.0; +https://localhost)";

/// Structured signals extracted from one page. Immutable once built.
///
/// `fetch_error` being set means the page could not be assessed at all:
/// every other field is at its default and the zeros must not be read as
/// "safe". Callers surface the error distinctly from a genuine zero score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSignals {
    pub url: String,
    pub title: String,
    pub h1: String,
    pub meta_description: String,
    pub og_image: String,
    pub canonical: String,
    pub word_count: usize,
    pub internal_link_count: usize,
    pub external_link_count: usize,
    pub has_redirect_script: bool,
    pub has_iframe: bool,
    pub body_text: String,
    pub keywords: Vec<String>,
    pub fetch_error: Option<String>,
}

impl PageSignals {
    fn fetch_failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            fetch_error: Some(error.into()),
            ..Self::default()
        }
    }
}

static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").expect("scheme regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));
static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("h1 regex"));
static META_DESC_NAME_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']description["'][^>]+content=["']([^"']+)["'][^>]*>"#)
        .expect("meta description regex")
});
static META_DESC_CONTENT_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]+name=["']description["'][^>]*>"#)
        .expect("meta description (reversed) regex")
});
static OG_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']([^"']+)["'][^>]*>"#)
        .expect("og:image regex")
});
static CANONICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<link[^>]+rel=["']canonical["'][^>]+href=["']([^"']+)["'][^>]*>"#)
        .expect("canonical regex")
});
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<a[^>]+href=["']([^"']+)["']"#).expect("href regex"));
static IFRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<iframe").expect("iframe regex"));
static HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<head.*?</head>").expect("head regex"));
static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script.*?</script>").expect("script regex"));
static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style.*?</style>").expect("style regex"));
static NOSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<noscript.*?</noscript>").expect("noscript regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

static REDIRECT_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)window\.location\s*[=.]",
        r"(?i)location\.href\s*=",
        r"(?i)location\.replace\s*\(",
        r"(?i)document\.location\s*=",
        r#"(?i)<meta[^>]+http-equiv=["']refresh["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("redirect regex"))
    .collect()
});

static BRACKET_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[【】［］（）()〈〉<>「」『』|｜•·・]").expect("bracket noise regex")
});
static CJK_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FFF}]{2,10}")
        .expect("cjk run regex")
});
static LATIN_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z]{3,}").expect("latin word regex"));
static LATIN_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z]+").expect("latin token regex"));

/// Fetch a URL and extract its page signals.
///
/// Never errors: invalid scheme, non-HTML content, non-2xx status, transport
/// failure and timeout all fold into `PageSignals::fetch_error`. The request
/// is bounded by `timeout_ms` via a cancellable timer.
pub async fn fetch_page(url: &str, timeout_ms: u64) -> PageSignals {
    let u = url.trim();
    if u.is_empty() {
        return PageSignals::fetch_failed(u, "URL is empty");
    }
    if !SCHEME_RE.is_match(u) {
        return PageSignals::fetch_failed(u, "Invalid URL scheme");
    }

    match tokio::time::timeout(Duration::from_millis(timeout_ms), fetch_html(u)).await {
        Err(_) => {
            debug!(target: "scrape", url = %u, "fetch timed out");
            PageSignals::fetch_failed(u, "Timeout")
        }
        Ok(Err(error)) => {
            debug!(target: "scrape", url = %u, %error, "fetch failed");
            PageSignals::fetch_failed(u, error)
        }
        Ok(Ok(html)) => parse_html(&html, u),
    }
}

/// Inner fetch: returns the HTML body or a human-readable error string.
async fn fetch_html(url: &str) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| e.to_string())?;

    let resp = client
        .get(url)
        .header("Accept", "text/html,application/xhtml+xml")
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.contains("text/html") {
        return Err(format!("Not HTML: {content_type}"));
    }

    resp.text().await.map_err(|e| e.to_string())
}

/// Parse raw markup into page signals. No network, never panics; a missing
/// tag yields an empty field.
pub fn parse_html(html: &str, url: &str) -> PageSignals {
    let title = pick_first(&TITLE_RE, html, MAX_TITLE_LEN);
    let h1 = pick_first(&H1_RE, html, MAX_TITLE_LEN);
    let meta_description = pick_meta_description(html);
    let og_image = pick_first(&OG_IMAGE_RE, html, MAX_OG_IMAGE_LEN);
    let canonical = CANONICAL_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    let body_text = extract_body_text(html);
    let word_count = count_words(&body_text);
    let (internal_link_count, external_link_count) = count_links(html, url);
    let has_redirect_script = REDIRECT_RES.iter().any(|re| re.is_match(html));
    let has_iframe = IFRAME_RE.is_match(html);
    let keywords = extract_seed_keywords(&title, &h1, &meta_description);

    PageSignals {
        url: url.to_string(),
        title,
        h1,
        meta_description,
        og_image,
        canonical,
        word_count,
        internal_link_count,
        external_link_count,
        has_redirect_script,
        has_iframe,
        body_text: truncate_chars(&body_text, MAX_BODY_LEN),
        keywords,
        fetch_error: None,
    }
}

fn pick_first(re: &Regex, html: &str, max_len: usize) -> String {
    re.captures(html)
        .map(|c| truncate_chars(strip_tags(&c[1]).trim(), max_len).trim().to_string())
        .unwrap_or_default()
}

// `name=... content=...` in either attribute order; first form wins.
fn pick_meta_description(html: &str) -> String {
    let direct = pick_first(&META_DESC_NAME_FIRST_RE, html, MAX_DESCRIPTION_LEN);
    if !direct.is_empty() {
        return direct;
    }
    pick_first(&META_DESC_CONTENT_FIRST_RE, html, MAX_DESCRIPTION_LEN)
}

/// Strip script/style blocks and tags, decode entities, collapse whitespace.
fn strip_tags(fragment: &str) -> String {
    let no_script = SCRIPT_RE.replace_all(fragment, " ");
    let no_style = STYLE_RE.replace_all(&no_script, " ");
    let no_tags = TAG_RE.replace_all(&no_style, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    collapse_whitespace(&decoded)
}

fn extract_body_text(html: &str) -> String {
    let no_head = HEAD_RE.replace_all(html, " ");
    let no_noscript = NOSCRIPT_RE.replace_all(&no_head, " ");
    strip_tags(&no_noscript)
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// CJK pages count characters, Latin pages count word tokens; mixed pages
/// sum both.
pub(crate) fn count_words(text: &str) -> usize {
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let latin = LATIN_TOKEN_RE.find_iter(text).count();
    cjk + latin
}

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}')
}

/// Classify every `href` against the base host. Unresolvable links count as
/// internal (fail-safe: a relative path stays on the site).
fn count_links(html: &str, base_url: &str) -> (usize, usize) {
    let base = Url::parse(base_url).ok();
    let base_host = base
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or("")
        .to_string();

    let mut internal = 0;
    let mut external = 0;
    for cap in HREF_RE.captures_iter(html) {
        let href = &cap[1];
        let resolved = match &base {
            Some(b) => b.join(href).ok(),
            None => Url::parse(href).ok(),
        };
        match resolved.as_ref().and_then(|u| u.host_str()) {
            Some(host) if host == base_host => internal += 1,
            Some(_) => external += 1,
            None => internal += 1,
        }
    }
    (internal, external)
}

/// Seed keywords from title + h1 + description: CJK runs of 2-10 chars and
/// Latin words of 3+ chars, deduplicated, capped at 10.
fn extract_seed_keywords(title: &str, h1: &str, description: &str) -> Vec<String> {
    let combined = [title, h1, description]
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = collapse_whitespace(&BRACKET_NOISE_RE.replace_all(&combined, " "));
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut out: Vec<String> = Vec::new();
    for m in CJK_RUN_RE
        .find_iter(&cleaned)
        .chain(LATIN_WORD_RE.find_iter(&cleaned))
    {
        let word = m.as_str().to_string();
        if !out.contains(&word) {
            out.push(word);
        }
        if out.len() >= MAX_KEYWORDS {
            break;
        }
    }
    out
}
