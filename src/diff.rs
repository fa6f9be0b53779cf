//! Resource diffing between two captured manifests
//!
//! CSS and JavaScript entries are matched by exact URL and reported only
//! when their fetched contents differ, as a unified-diff patch. Images are
//! matched by URL path alone so an asset that moved between CDNs is not
//! reported as a change; only genuinely added or removed paths show up.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use url::Url;

use crate::manifest::ResourceManifest;

/// A content change in a text resource present in both captures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePatch {
    pub url: String,
    /// Unified-diff text of the original vs upgraded contents
    pub diff: String,
}

/// Added/removed image paths between the two captures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// The structural diff of two resource manifests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub css: Vec<ResourcePatch>,
    pub javascript: Vec<ResourcePatch>,
    pub images: ImageDiff,
}

impl ResourceDiff {
    /// Whether the two manifests were indistinguishable
    pub fn is_empty(&self) -> bool {
        self.css.is_empty()
            && self.javascript.is_empty()
            && self.images.added.is_empty()
            && self.images.removed.is_empty()
    }
}

/// Produce a unified-diff patch of two texts, labeled Original/Upgraded
pub fn unified_patch(name: &str, original: &str, upgraded: &str) -> String {
    let diff = TextDiff::from_lines(original, upgraded);
    diff.unified_diff()
        .context_radius(3)
        .header(&format!("{} (Original)", name), &format!("{} (Upgraded)", name))
        .to_string()
}

/// Compare two resource manifests.
///
/// Pure and infallible: malformed URLs degrade to raw-string matching
/// rather than erroring. Text resources present in only one manifest are
/// not reported; only content changes of shared URLs are tracked.
pub fn diff_resources(original: &ResourceManifest, upgraded: &ResourceManifest) -> ResourceDiff {
    ResourceDiff {
        css: diff_text_resources(&original.css, &upgraded.css),
        javascript: diff_text_resources(&original.javascript, &upgraded.javascript),
        images: diff_images(original, upgraded),
    }
}

fn diff_text_resources(
    original: &[crate::manifest::TextResource],
    upgraded: &[crate::manifest::TextResource],
) -> Vec<ResourcePatch> {
    let upgraded_by_url: HashMap<&str, &str> = upgraded
        .iter()
        .map(|r| (r.url.as_str(), r.content.as_str()))
        .collect();

    original
        .iter()
        .filter_map(|orig| {
            let new_content = upgraded_by_url.get(orig.url.as_str())?;
            if orig.content == *new_content {
                return None;
            }
            Some(ResourcePatch {
                url: orig.url.clone(),
                diff: unified_patch(&orig.url, &orig.content, new_content),
            })
        })
        .collect()
}

/// Matching key for images: the URL path, independent of scheme and host.
/// Unparseable URLs fall back to the raw string.
fn image_path_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

fn diff_images(original: &ResourceManifest, upgraded: &ResourceManifest) -> ImageDiff {
    let original_paths: HashMap<String, &str> = original
        .images
        .iter()
        .map(|img| (image_path_key(&img.url), img.url.as_str()))
        .collect();
    let upgraded_paths: HashMap<String, &str> = upgraded
        .images
        .iter()
        .map(|img| (image_path_key(&img.url), img.url.as_str()))
        .collect();

    let mut diff = ImageDiff::default();
    for (path, url) in &upgraded_paths {
        if !original_paths.contains_key(path) {
            diff.added.push((*url).to_string());
        }
    }
    for (path, url) in &original_paths {
        if !upgraded_paths.contains_key(path) {
            diff.removed.push((*url).to_string());
        }
    }
    // HashMap iteration order is unspecified; keep reports stable
    diff.added.sort();
    diff.removed.sort();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ImageResource, TextResource};

    fn manifest(
        css: &[(&str, &str)],
        js: &[(&str, &str)],
        images: &[&str],
    ) -> ResourceManifest {
        ResourceManifest {
            css: css
                .iter()
                .map(|(u, c)| TextResource {
                    url: u.to_string(),
                    content: c.to_string(),
                })
                .collect(),
            javascript: js
                .iter()
                .map(|(u, c)| TextResource {
                    url: u.to_string(),
                    content: c.to_string(),
                })
                .collect(),
            images: images
                .iter()
                .map(|u| ImageResource { url: u.to_string() })
                .collect(),
        }
    }

    #[test]
    fn identical_manifests_diff_empty() {
        let m = manifest(
            &[("https://a.com/style.css", "body { color: red }")],
            &[("https://a.com/app.js", "run();")],
            &["https://a.com/img/logo.png"],
        );
        let diff = diff_resources(&m, &m.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn single_css_change_yields_one_patch() {
        let orig = manifest(
            &[("https://a.com/style.css", "body { color: red }")],
            &[("https://a.com/app.js", "run();")],
            &["https://a.com/img/logo.png"],
        );
        let upgr = manifest(
            &[("https://a.com/style.css", "body { color: blue }")],
            &[("https://a.com/app.js", "run();")],
            &["https://a.com/img/logo.png"],
        );

        let diff = diff_resources(&orig, &upgr);
        assert_eq!(diff.css.len(), 1);
        assert_eq!(diff.css[0].url, "https://a.com/style.css");
        assert!(diff.css[0].diff.contains("-body { color: red }"));
        assert!(diff.css[0].diff.contains("+body { color: blue }"));
        assert!(diff.javascript.is_empty());
        assert!(diff.images.added.is_empty() && diff.images.removed.is_empty());
    }

    #[test]
    fn text_resources_on_one_side_only_are_ignored() {
        let orig = manifest(&[("https://a.com/old.css", "x")], &[], &[]);
        let upgr = manifest(&[("https://a.com/new.css", "y")], &[], &[]);
        let diff = diff_resources(&orig, &upgr);
        assert!(diff.css.is_empty());
    }

    #[test]
    fn images_match_by_path_across_hosts() {
        let orig = manifest(&[], &[], &["https://a.com/img/logo.png"]);
        let upgr = manifest(&[], &[], &["https://b.com/img/logo.png"]);
        let diff = diff_resources(&orig, &upgr);
        assert!(diff.images.added.is_empty());
        assert!(diff.images.removed.is_empty());
    }

    #[test]
    fn added_and_removed_images_are_reported() {
        let orig = manifest(&[], &[], &["https://a.com/img/old.png", "https://a.com/img/kept.png"]);
        let upgr = manifest(&[], &[], &["https://a.com/img/kept.png", "https://a.com/img/new.png"]);
        let diff = diff_resources(&orig, &upgr);
        assert_eq!(diff.images.added, vec!["https://a.com/img/new.png"]);
        assert_eq!(diff.images.removed, vec!["https://a.com/img/old.png"]);
    }

    #[test]
    fn malformed_image_urls_fall_back_to_raw_matching() {
        let orig = manifest(&[], &[], &["not a url"]);
        let upgr = manifest(&[], &[], &["not a url"]);
        let diff = diff_resources(&orig, &upgr);
        assert!(diff.images.added.is_empty());
        assert!(diff.images.removed.is_empty());
    }

    #[test]
    fn unified_patch_labels_sides() {
        let patch = unified_patch("page", "a\nb\n", "a\nc\n");
        assert!(patch.contains("Original"));
        assert!(patch.contains("Upgraded"));
        assert!(patch.contains("-b"));
        assert!(patch.contains("+c"));
    }
}
