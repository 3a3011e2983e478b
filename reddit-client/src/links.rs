//! Extraction of external links from post and comment text.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

const URL_PATTERN: &str = r#"https?://[^\s<>\[\]{}"'`|\\^]+"#;

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '*', '~'];

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("URL pattern is a valid regex"))
}

/// Finds every well-formed http(s) URL in `text`, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_regex()
        .find_iter(text)
        .filter_map(|m| normalize(m.as_str()))
        .collect()
}

/// Collapses URLs from several texts into one sorted, de-duplicated set.
pub fn collect_links<'a, I>(texts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().flat_map(extract_urls).collect()
}

/// Whether `url` points outside the forum itself.
pub fn is_external(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => !is_forum_host(host),
            None => false,
        },
        Err(_) => false,
    }
}

fn is_forum_host(host: &str) -> bool {
    let host = host.trim_start_matches("www.");
    host == "reddit.com"
        || host.ends_with(".reddit.com")
        || host == "redd.it"
        || host.ends_with(".redd.it")
}

fn normalize(candidate: &str) -> Option<String> {
    // Post bodies arrive HTML-escaped.
    let unescaped = candidate.replace("&amp;", "&");
    let trimmed = trim_url_end(&unescaped);
    let parsed = Url::parse(trimmed).ok()?;
    parsed.host_str()?;
    Some(trimmed.to_string())
}

/// Drops sentence punctuation and closing parens that have no opening
/// partner inside the URL, e.g. the `)` of a Markdown link.
fn trim_url_end(url: &str) -> &str {
    let mut end = url;
    loop {
        let before = end.len();
        end = end.trim_end_matches(TRAILING_PUNCTUATION);
        if end.ends_with(')') && end.matches(')').count() > end.matches('(').count() {
            end = &end[..end.len() - 1];
        }
        if end.len() == before {
            return end;
        }
    }
}
