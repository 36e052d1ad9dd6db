//! Search and clip-URL resolution against the myinstants site.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::SearchSettings;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// First hit of a search: the clip's name and the page that hosts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub name: String,
    pub page_url: String,
}

static ANCHOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").unwrap());

static HREF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\btitle\s*=\s*["']([^"']+)["']"#).unwrap());

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static SOURCE_SRC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<source\b[^>]*?\bsrc\s*=\s*["']([^"']*\.mp3[^"']*)["']"#).unwrap()
});

static HANDLER_ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:onclick|data-url)\s*=\s*"([^"]*\.mp3[^"]*)""#).unwrap()
});

static QUOTED_MP3_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]*\.mp3[^'"]*)['"]"#).unwrap());

static ABSOLUTE_MP3_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s"'<>]*\.mp3[^\s"'<>]*"#).unwrap());

static MEDIA_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["'](/media/sounds/[^"']*\.mp3[^"']*)["']"#).unwrap()
});

/// Links shorter than this are icons and navigation, not clip names.
const MIN_NAME_CHARS: usize = 3;

pub struct InstantsClient {
    client: reqwest::Client,
    base_url: Url,
    locale: String,
}

impl InstantsClient {
    pub fn new(client: reqwest::Client, settings: &SearchSettings) -> Result<Self, SearchError> {
        Ok(Self {
            client,
            base_url: Url::parse(&settings.base_url)?,
            locale: settings.locale.clone(),
        })
    }

    /// Search for `query` and return the first matching clip page.
    pub async fn search(&self, query: &str) -> Result<Option<SearchResult>, SearchError> {
        let mut url = self.base_url.join(&format!("/{}/search/", self.locale))?;
        url.query_pairs_mut().append_pair("name", query);

        info!("Searching for: {}", query);
        let html = self.fetch_page(url).await?;
        let result = extract_search_results(&html, &self.base_url, &self.locale)
            .into_iter()
            .next();

        match &result {
            Some(hit) => debug!("First result: \"{}\" ({})", hit.name, hit.page_url),
            None => debug!("No results for: {}", query),
        }
        Ok(result)
    }

    /// Find the clip's audio URL on its page.
    pub async fn resolve_audio_url(&self, page_url: &str) -> Result<Option<String>, SearchError> {
        let url = self.base_url.join(page_url)?;
        let html = self.fetch_page(url).await?;
        Ok(extract_audio_url(&html, &self.base_url))
    }

    async fn fetch_page(&self, url: Url) -> Result<String, SearchError> {
        debug!("Fetching page {}", url);
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Clip links in page order, de-duplicated by URL.
pub fn extract_search_results(html: &str, base_url: &Url, locale: &str) -> Vec<SearchResult> {
    let links: Vec<(String, String)> = ANCHOR_REGEX
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let href = HREF_REGEX.captures(attrs)?.get(1)?.as_str().to_string();
            let mut text = link_text(caps.get(2)?.as_str());
            if text.is_empty() {
                text = TITLE_REGEX
                    .captures(attrs)
                    .and_then(|title| title.get(1))
                    .map(|title| decode_entities(title.as_str().trim()))
                    .unwrap_or_default();
            }
            Some((href, text))
        })
        .collect();

    let prefix = format!("/{}/instant/", locale);
    let primary = collect_results(
        base_url,
        links.iter().filter(|(href, _)| href.starts_with(&prefix)),
    );
    if !primary.is_empty() {
        return primary;
    }

    collect_results(
        base_url,
        links.iter().filter(|(href, _)| href.contains("/instant/")),
    )
}

fn collect_results<'a>(
    base_url: &Url,
    links: impl Iterator<Item = &'a (String, String)>,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::new();
    for (href, text) in links {
        if text.chars().count() < MIN_NAME_CHARS {
            continue;
        }
        let Ok(page_url) = base_url.join(href) else {
            continue;
        };
        let page_url = page_url.to_string();
        if results.iter().any(|r| r.page_url == page_url) {
            continue;
        }
        results.push(SearchResult {
            name: text.clone(),
            page_url,
        });
    }
    results
}

/// Look for the clip's mp3 in the places the site has been seen to put it.
pub fn extract_audio_url(html: &str, base_url: &Url) -> Option<String> {
    let absolutize = |raw: &str| base_url.join(raw).ok().map(|url| url.to_string());

    if let Some(src) = SOURCE_SRC_REGEX.captures(html).and_then(|caps| caps.get(1)) {
        return absolutize(src.as_str());
    }

    for caps in HANDLER_ATTR_REGEX.captures_iter(html) {
        let Some(value) = caps.get(1).map(|value| value.as_str()) else {
            continue;
        };
        let found = QUOTED_MP3_REGEX
            .captures(value)
            .and_then(|inner| inner.get(1))
            .or_else(|| ABSOLUTE_MP3_REGEX.find(value));
        if let Some(found) = found {
            return absolutize(found.as_str());
        }
    }

    if let Some(found) = ABSOLUTE_MP3_REGEX.find(html) {
        return Some(found.as_str().to_string());
    }

    MEDIA_PATH_REGEX
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|path| absolutize(path.as_str()))
}

fn link_text(inner_html: &str) -> String {
    let text = TAG_REGEX.replace_all(inner_html, " ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    decode_entities(&collapsed)
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
