//! Isolated comparison worker
//!
//! Screenshot bitmaps decode to tens of megabytes of raw pixels, and an
//! out-of-memory condition during decode or compare must not take down the
//! long-lived host. The pixel stage therefore runs in a disposable child
//! process: the current executable re-invoked with `--worker` and the two
//! screenshot paths. The child writes exactly one line of JSON to stdout
//! and exits 0 on success; diagnostics go to stderr with a non-zero exit.
//! The parent enforces a bounded wait and kills the child on every exit
//! path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::imaging::{
    compare, ensure_within_size_cap, mismatch_percentage, normalize, Bitmap, CompareOptions,
};
use crate::{Error, Result};

/// The single JSON message a worker prints on success.
///
/// Field names are the wire protocol; the image fields hold the paths the
/// worker wrote, which the orchestrator rewrites into public URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "misMatchPercentage")]
    pub mismatch_percentage: f64,
    #[serde(rename = "diffImageUrl")]
    pub diff_image_url: String,
    #[serde(rename = "originalImageUrl")]
    pub original_image_url: String,
    #[serde(rename = "upgradedImageUrl")]
    pub upgraded_image_url: String,
}

/// Child-side entry point: decode, normalize, compare, write `diff.png`
/// next to the original screenshot.
///
/// File sizes are checked against the cap before any decode is attempted so
/// oversized uploads fail fast with a descriptive error.
pub fn worker_main(
    original: &Path,
    upgraded: &Path,
    opts: &CompareOptions,
) -> Result<ComparisonResult> {
    let original_size = ensure_within_size_cap(original, opts.max_file_size)?;
    let upgraded_size = ensure_within_size_cap(upgraded, opts.max_file_size)?;
    debug!(
        "screenshot sizes: original {} bytes, upgraded {} bytes",
        original_size, upgraded_size
    );

    let a = Bitmap::from_png_file(original)?;
    let b = Bitmap::from_png_file(upgraded)?;
    debug!(
        "decoded {}x{} and {}x{}",
        a.width, a.height, b.width, b.height
    );

    let (a, b) = normalize(&a, &b, opts.max_dimension);
    let (diff, mismatched) = compare(&a, &b, opts);

    let diff_path = original
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("diff.png");
    diff.write_png_file(&diff_path)?;

    Ok(ComparisonResult {
        mismatch_percentage: mismatch_percentage(mismatched, a.width, a.height),
        diff_image_url: diff_path.to_string_lossy().into_owned(),
        original_image_url: original.to_string_lossy().into_owned(),
        upgraded_image_url: upgraded.to_string_lossy().into_owned(),
    })
}

/// Parent-side: spawn the worker process over two screenshot paths and
/// await its single JSON result.
///
/// `worker_exe` defaults to the current executable. The wait is bounded by
/// `timeout_ms`; on expiry the child is killed and the stage fails. A
/// non-zero exit or unparseable stdout is a hard failure, not retried.
pub async fn run_comparison_worker(
    worker_exe: Option<&Path>,
    original: &Path,
    upgraded: &Path,
    opts: &CompareOptions,
    timeout_ms: u64,
) -> Result<ComparisonResult> {
    let exe: PathBuf = match worker_exe {
        Some(p) => p.to_path_buf(),
        None => std::env::current_exe()
            .map_err(|e| Error::Worker(format!("cannot locate worker executable: {}", e)))?,
    };

    let mut cmd = Command::new(&exe);
    cmd.arg("--worker")
        .arg(original)
        .arg(upgraded)
        .arg("--threshold")
        .arg(opts.threshold.to_string())
        .arg("--chunk-rows")
        .arg(opts.chunk_rows.to_string())
        .arg("--max-dimension")
        .arg(opts.max_dimension.to_string())
        .arg("--max-file-size")
        .arg(opts.max_file_size.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the wait future (timeout expiry, parent error) must kill
        // the child; no orphaned workers on any exit path.
        .kill_on_drop(true);
    if opts.aa_tolerance {
        cmd.arg("--aa-tolerance");
    }

    let child = cmd
        .spawn()
        .map_err(|e| Error::Worker(format!("failed to spawn {}: {}", exe.display(), e)))?;

    let output = match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        child.wait_with_output(),
    )
    .await
    {
        Ok(res) => res.map_err(|e| Error::Worker(format!("wait failed: {}", e)))?,
        Err(_) => {
            return Err(Error::Worker(format!(
                "timed out after {} ms and was killed",
                timeout_ms
            )))
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Worker(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::Worker("produced no output".to_string()))?;
    serde_json::from_str(line)
        .map_err(|e| Error::Worker(format!("unparseable output {:?}: {}", line, e)))
}
