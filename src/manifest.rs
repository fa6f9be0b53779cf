//! Resource manifest extraction and content fetching
//!
//! A captured page links CSS, JavaScript, and image resources. The manifest
//! records them; for text assets (CSS/JS) the body is fetched so the differ
//! can produce content patches. Fetching is best-effort by contract: a
//! timed-out or failing fetch drops that entry with a warning and never
//! aborts the comparison.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// A text resource (CSS or JavaScript) with its fetched body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResource {
    pub url: String,
    pub content: String,
}

/// An image reference; bodies are never fetched for images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    pub url: String,
}

/// The linked resources discovered in one captured page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub css: Vec<TextResource>,
    pub javascript: Vec<TextResource>,
    pub images: Vec<ImageResource>,
}

/// Resource URLs discovered in a page, before any content is fetched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceUrls {
    pub css: Vec<String>,
    pub javascript: Vec<String>,
    pub images: Vec<String>,
}

/// Tuning for linked-resource fetching
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-resource fetch timeout
    pub timeout_ms: u64,
    /// How many fetches run concurrently
    pub batch_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            batch_size: 10,
        }
    }
}

/// Discover linked resource URLs in an HTML document.
///
/// Relative references are resolved against `base_url`; references that
/// cannot be resolved are kept verbatim rather than dropped.
pub fn extract_resources(html: &str, base_url: &str) -> ResourceUrls {
    let document = Html::parse_document(html);
    let css_sel = Selector::parse(r#"link[rel="stylesheet"]"#).unwrap();
    let js_sel = Selector::parse("script[src]").unwrap();
    let img_sel = Selector::parse("img[src]").unwrap();

    let base = Url::parse(base_url).ok();
    let resolve = |href: &str| -> String {
        match &base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    };

    let mut urls = ResourceUrls::default();
    for node in document.select(&css_sel) {
        if let Some(href) = node.value().attr("href") {
            urls.css.push(resolve(href));
        }
    }
    for node in document.select(&js_sel) {
        if let Some(src) = node.value().attr("src") {
            urls.javascript.push(resolve(src));
        }
    }
    for node in document.select(&img_sel) {
        if let Some(src) = node.value().attr("src") {
            urls.images.push(resolve(src));
        }
    }

    debug!(
        "discovered {} css, {} js, {} image resources",
        urls.css.len(),
        urls.javascript.len(),
        urls.images.len()
    );
    urls
}

impl ResourceManifest {
    /// Fetch CSS/JS bodies for a set of discovered URLs and build the
    /// manifest.
    ///
    /// Fetches run in bounded concurrent batches. Any fetch that fails,
    /// times out, or returns a non-success status drops its entry; the
    /// manifest otherwise preserves document order.
    pub async fn fetch_contents(
        client: &reqwest::Client,
        urls: ResourceUrls,
        opts: &FetchOptions,
    ) -> Self {
        let css = fetch_text_batch(client, urls.css, opts).await;
        let javascript = fetch_text_batch(client, urls.javascript, opts).await;
        let images = urls
            .images
            .into_iter()
            .map(|url| ImageResource { url })
            .collect();

        Self {
            css,
            javascript,
            images,
        }
    }
}

async fn fetch_text_batch(
    client: &reqwest::Client,
    urls: Vec<String>,
    opts: &FetchOptions,
) -> Vec<TextResource> {
    let timeout = Duration::from_millis(opts.timeout_ms);
    let fetched: Vec<Option<TextResource>> = stream::iter(urls)
        .map(|url| async move {
            match fetch_text(client, &url, timeout).await {
                Some(content) => Some(TextResource { url, content }),
                None => None,
            }
        })
        .buffered(opts.batch_size.max(1))
        .collect()
        .await;

    fetched.into_iter().flatten().collect()
}

async fn fetch_text(client: &reqwest::Client, url: &str, timeout: Duration) -> Option<String> {
    let request = async {
        let resp = client.get(url).send().await.ok()?;
        if !resp.status().is_success() {
            warn!("resource {} returned status {}", url, resp.status());
            return None;
        }
        resp.text().await.ok()
    };

    match tokio::time::timeout(timeout, request).await {
        Ok(Some(body)) => Some(body),
        Ok(None) => {
            warn!("failed to fetch resource {}", url);
            None
        }
        Err(_) => {
            warn!("resource {} timed out after {:?}", url, timeout);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Fixture</title>
  <link rel="stylesheet" href="/styles/main.css">
  <link rel="stylesheet" href="https://cdn.example.com/theme.css">
  <link rel="icon" href="/favicon.ico">
</head>
<body>
  <script src="app.js"></script>
  <script>inline();</script>
  <img src="/img/logo.png">
  <img src="https://cdn.example.com/img/hero.jpg">
</body>
</html>"#;

    #[test]
    fn extracts_and_resolves_linked_resources() {
        let urls = extract_resources(PAGE, "https://site.example.com/page/");
        assert_eq!(
            urls.css,
            vec![
                "https://site.example.com/styles/main.css",
                "https://cdn.example.com/theme.css"
            ]
        );
        assert_eq!(urls.javascript, vec!["https://site.example.com/page/app.js"]);
        assert_eq!(
            urls.images,
            vec![
                "https://site.example.com/img/logo.png",
                "https://cdn.example.com/img/hero.jpg"
            ]
        );
    }

    #[test]
    fn inline_scripts_and_non_stylesheet_links_are_ignored() {
        let urls = extract_resources(PAGE, "https://site.example.com/");
        assert!(!urls.css.iter().any(|u| u.contains("favicon")));
        assert_eq!(urls.javascript.len(), 1);
    }

    #[test]
    fn unresolvable_base_keeps_raw_references() {
        let urls = extract_resources(r#"<img src="pic.png">"#, "not a url");
        assert_eq!(urls.images, vec!["pic.png"]);
    }
}
