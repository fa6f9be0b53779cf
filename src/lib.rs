//! Pagediff comparison engine
//!
//! Compares two rendered versions of a web page ("original" and "upgraded")
//! and produces a pixel-level mismatch score plus structural diffs of the
//! linked CSS, JavaScript, and image resources.
//!
//! # Design
//!
//! - **Resource differ**: pure in-process diff of two resource manifests
//! - **Imaging pipeline**: dimension normalization + chunked perceptual
//!   pixel comparison, bounded-memory by construction
//! - **Isolated worker**: the imaging pipeline runs in a separate OS
//!   process so a pathological screenshot can only kill the worker, never
//!   the long-lived host
//! - **Orchestrator**: sequences capture, resource diffing, and the worker,
//!   and assembles the final report
//!
//! Page capture itself is a collaborator: anything implementing
//! [`PageRenderer`] (a headless browser wrapper, a fixture loader in tests)
//! can drive a comparison.
//!
//! # Example
//!
//! ```no_run
//! use pagediff::{compare_pages, OrchestratorConfig};
//! # async fn run(renderer: impl pagediff::PageRenderer) -> pagediff::Result<()> {
//! let config = OrchestratorConfig {
//!     artifact_root: "artifacts".into(),
//!     ..Default::default()
//! };
//!
//! let report = compare_pages(
//!     &renderer,
//!     &config,
//!     "https://old.example.com",
//!     "https://new.example.com",
//! )
//! .await?;
//! println!("mismatch: {:.2}%", report.mismatch_percentage);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod manifest;
pub use manifest::{FetchOptions, ResourceManifest};

pub mod diff;
pub use diff::{diff_resources, ResourceDiff};

pub mod imaging;
pub use imaging::{Bitmap, CompareOptions};

pub mod worker;
pub use worker::ComparisonResult;

pub mod orchestrator;
pub use orchestrator::{compare_pages, ComparisonReport, PageCapture, PageRenderer};

/// Configuration for the comparison orchestrator
///
/// The defaults match the behavior of the reference deployment: artifacts
/// under `artifacts/`, served at `/artifacts`, a two-minute worker budget,
/// and run directories retained for one hour.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory under which per-run artifact directories are created
    pub artifact_root: PathBuf,
    /// URL prefix under which `artifact_root` is served statically
    pub public_prefix: String,
    /// Maximum time to wait for the comparison worker before killing it
    pub worker_timeout_ms: u64,
    /// Age after which stale run directories are swept (best-effort)
    pub retention_secs: u64,
    /// Worker executable; defaults to the current executable re-invoked
    /// with `--worker`
    pub worker_exe: Option<PathBuf>,
    /// Pixel-comparison tuning forwarded to the worker
    pub compare: CompareOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("artifacts"),
            public_prefix: "/artifacts".to_string(),
            worker_timeout_ms: 120_000,
            retention_secs: 3600,
            worker_exe: None,
            compare: CompareOptions::default(),
        }
    }
}
