//! Comparison orchestration
//!
//! The orchestrator owns one comparison run end to end: it asks the
//! renderer collaborator for both captures, diffs the resource manifests
//! in-process, hands the two screenshot paths to the isolated worker, and
//! merges everything into the final report.
//!
//! Artifacts (the two screenshots, the diff bitmap, the HTML patch, the
//! resource-diff JSON) live in a per-run directory keyed by a generated run
//! id, so concurrent comparisons never clobber each other. Stale run
//! directories are swept best-effort before each run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::diff::{diff_resources, unified_patch, ResourceDiff};
use crate::manifest::ResourceManifest;
use crate::worker::run_comparison_worker;
use crate::{OrchestratorConfig, Result};

/// One rendered-page capture produced by the renderer collaborator.
///
/// The bitmap is handed off by file path, never as an in-memory buffer, so
/// the comparison worker can decode it in its own address space.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub screenshot_path: PathBuf,
    pub html: String,
    pub resources: ResourceManifest,
    pub source_url: String,
}

/// Contract for the page-rendering collaborator.
///
/// Given a URL, an implementation navigates to the page and returns the
/// screenshot file, the serialized HTML, and the discovered resource
/// manifest. Implementations fail with [`crate::Error::Render`] when
/// navigation cannot complete or the target returns a non-success status.
pub trait PageRenderer {
    fn capture(&self, url: &str) -> impl std::future::Future<Output = Result<PageCapture>> + Send;
}

/// Both raw HTML documents, included verbatim in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlPair {
    pub original: String,
    pub upgraded: String,
}

/// The final merged report for one comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    #[serde(rename = "misMatchPercentage")]
    pub mismatch_percentage: f64,
    #[serde(rename = "diffImageUrl")]
    pub diff_image_url: String,
    #[serde(rename = "originalImageUrl")]
    pub original_image_url: String,
    #[serde(rename = "upgradedImageUrl")]
    pub upgraded_image_url: String,
    pub resources: ResourceDiff,
    pub html: HtmlPair,
}

/// Compare two rendered pages and produce the merged report.
///
/// Capture failures and worker failures abort the run; the resource differ
/// never fails by contract. Artifact-write failures are fatal, stale-run
/// cleanup failures are logged and swallowed.
pub async fn compare_pages<R: PageRenderer>(
    renderer: &R,
    config: &OrchestratorConfig,
    original_url: &str,
    upgraded_url: &str,
) -> Result<ComparisonReport> {
    sweep_stale_runs(config);

    let run_id = next_run_id();
    let run_dir = config.artifact_root.join(&run_id);
    tokio::fs::create_dir_all(&run_dir).await?;
    debug!("comparison run {} -> {}", run_id, run_dir.display());

    // The two captures share no state; issue them concurrently
    let (original, upgraded) = tokio::try_join!(
        renderer.capture(original_url),
        renderer.capture(upgraded_url)
    )?;

    let original_png = run_dir.join("original.png");
    let upgraded_png = run_dir.join("upgraded.png");
    tokio::fs::copy(&original.screenshot_path, &original_png).await?;
    tokio::fs::copy(&upgraded.screenshot_path, &upgraded_png).await?;

    let resources = diff_resources(&original.resources, &upgraded.resources);

    let html_patch = unified_patch("page", &original.html, &upgraded.html);
    tokio::fs::write(run_dir.join("diff.html"), &html_patch).await?;
    let resources_json = serde_json::to_string_pretty(&resources)?;
    tokio::fs::write(run_dir.join("resource-diffs.json"), &resources_json).await?;

    let result = run_comparison_worker(
        config.worker_exe.as_deref(),
        &original_png,
        &upgraded_png,
        &config.compare,
        config.worker_timeout_ms,
    )
    .await?;

    let prefix = config.public_prefix.trim_end_matches('/');
    let public = |name: &str| format!("{}/{}/{}", prefix, run_id, name);

    Ok(ComparisonReport {
        mismatch_percentage: result.mismatch_percentage,
        diff_image_url: public("diff.png"),
        original_image_url: public("original.png"),
        upgraded_image_url: public("upgraded.png"),
        resources,
        html: HtmlPair {
            original: original.html,
            upgraded: upgraded.html,
        },
    })
}

/// Unique-enough run directory name: wall-clock millis plus a process-wide
/// sequence number
fn next_run_id() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    format!("{}-{}", millis, SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Delete run directories older than the retention window. Best-effort:
/// every failure here is logged and swallowed.
fn sweep_stale_runs(config: &OrchestratorConfig) {
    let entries = match std::fs::read_dir(&config.artifact_root) {
        Ok(entries) => entries,
        // Missing root is the common first-run case
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let age_secs = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok())
            .map(|d| d.as_secs());
        match age_secs {
            Some(age) if age >= config.retention_secs => {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!("failed to sweep stale run {}: {}", path.display(), e);
                } else {
                    debug!("swept stale run {}", path.display());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let a = next_run_id();
        let b = next_run_id();
        assert_ne!(a, b);
    }

    #[test]
    fn sweep_ignores_missing_root() {
        let config = OrchestratorConfig {
            artifact_root: PathBuf::from("/nonexistent/pagediff-sweep-test"),
            ..Default::default()
        };
        // Must not panic or error
        sweep_stale_runs(&config);
    }

    #[test]
    fn sweep_respects_retention_window() {
        let root = std::env::temp_dir().join("pagediff-sweep-retention");
        let _ = std::fs::remove_dir_all(&root);
        let run = root.join("123-0");
        std::fs::create_dir_all(&run).unwrap();

        // Fresh directory survives a one-hour retention
        let keep = OrchestratorConfig {
            artifact_root: root.clone(),
            retention_secs: 3600,
            ..Default::default()
        };
        sweep_stale_runs(&keep);
        assert!(run.exists());

        // Zero retention sweeps everything
        let purge = OrchestratorConfig {
            artifact_root: root.clone(),
            retention_secs: 0,
            ..Default::default()
        };
        sweep_stale_runs(&purge);
        assert!(!run.exists());
    }
}
