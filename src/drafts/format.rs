//! Summary and post text formatting.

use std::sync::LazyLock;

use regex::Regex;

/// Hard cap on a draft summary.
pub const MAX_SUMMARY_LENGTH: usize = 260;

/// Platform limit for a single post.
pub const MAX_POST_LENGTH: usize = 280;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static REPEATED_BANG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[!?]{2,}").unwrap());
static REPEATED_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static MENTIONS_GME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgme\b|gamestop").unwrap());
static MENTIONS_COHEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ryan cohen").unwrap());

/// Hype words stripped from every summary.
static BANNED_WORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)revolutionary",
        r"(?i)game[- ]?changer",
        r"(?i)breakthrough",
        r"(?i)must[- ]see",
        r"(?i)groundbreaking",
        r"(?i)underscore",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Normalize whitespace, drop `@` markers and hype words.
fn clean_text(text: &str) -> String {
    let mut cleaned = collapse_whitespace(text).replace('@', "");
    for pattern in BANNED_WORDS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    collapse_whitespace(&cleaned)
}

fn ends_with_punctuation(text: &str) -> bool {
    text.ends_with(['.', '!', '?'])
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build `"<source> says <text> <url>"`, capped at [`MAX_SUMMARY_LENGTH`].
pub fn format_summary(source: &str, raw_text: &str, url: &str) -> String {
    let mut safe_source = clean_text(source);
    if safe_source.is_empty() {
        safe_source = "A source".to_string();
    }
    let cleaned = clean_text(raw_text);
    let cleaned = REPEATED_BANG.replace_all(&cleaned, ".");
    let safe_text = REPEATED_DOT.replace_all(&cleaned, ".").trim().to_string();

    let prefix = format!("{safe_source} says ");
    let suffix = format!(" {url}");
    let available = MAX_SUMMARY_LENGTH
        .saturating_sub(prefix.chars().count())
        .saturating_sub(suffix.chars().count());

    let mut body = safe_text;
    if body.chars().count() > available {
        let cut = truncate_chars(&body, available.saturating_sub(1)).trim_end();
        body = format!("{cut}.");
    }
    if !ends_with_punctuation(&body) {
        body.push('.');
    }

    let full = format!("{prefix}{body}{suffix}");
    truncate_chars(&full, MAX_SUMMARY_LENGTH).trim().to_string()
}

/// Fallback summary used when synthesis is unavailable.
pub fn fallback_summary(source: &str, text: &str, url: &str) -> String {
    let snippet = truncate_chars(text, 100);
    format!("{source} says {snippet}... {url}")
}

/// Final post text: strip mentions and add campaign hashtags when they fit.
pub fn build_tweet_text(summary: &str) -> String {
    let safe = summary.replace('@', "");

    let mut tags: Vec<&str> = Vec::new();
    if MENTIONS_GME.is_match(&safe) {
        tags.extend(["#GME", "#GameStop"]);
    }
    if MENTIONS_COHEN.is_match(&safe) {
        tags.push("#RyanCohen");
    }
    if tags.is_empty() {
        return safe;
    }

    let with_tags = format!("{safe} {}", tags.join(" "));
    if with_tags.chars().count() <= MAX_POST_LENGTH {
        with_tags
    } else {
        safe
    }
}
