//! Container duration probing through ffprobe

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use crate::config::ProbePolicy;
use crate::error::{MixError, Result};
use crate::request::MediaAsset;
use crate::utils::ffmpeg::{run_tool, stderr_excerpt};

/// How the narration duration was obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeStatus {
    /// ffprobe reported a usable duration
    Measured { seconds: f64 },
    /// ffprobe failed or printed garbage; the duration is assumed to be zero
    Degraded { reason: String },
}

impl ProbeStatus {
    /// Duration in seconds, zero when degraded
    pub fn seconds(&self) -> f64 {
        match self {
            ProbeStatus::Measured { seconds } => *seconds,
            ProbeStatus::Degraded { .. } => 0.0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ProbeStatus::Degraded { .. })
    }
}

/// ffprobe arguments that print only the container duration
fn probe_args(path: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "csv=p=0".into(),
        "-i".into(),
        path.into(),
    ]
}

/// Parse ffprobe output as a finite, non-negative number of seconds
pub fn parse_duration_output(output: &str) -> Option<f64> {
    let value = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let seconds = value.parse::<f64>().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(seconds)
    } else {
        None
    }
}

/// Probe the duration of a file
///
/// Never fails: every problem, including a missing ffprobe, becomes
/// `ProbeStatus::Degraded`.
pub async fn probe_duration(
    ffprobe: &Path,
    asset: &Path,
    timeout: Option<Duration>,
) -> ProbeStatus {
    let output = match run_tool(ffprobe, &probe_args(asset), timeout).await {
        Ok(output) => output,
        Err(e) => {
            return ProbeStatus::Degraded {
                reason: e.to_string(),
            }
        }
    };

    if !output.status.success() {
        return ProbeStatus::Degraded {
            reason: format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            ),
        };
    }

    match parse_duration_output(&output.stdout) {
        Some(seconds) => ProbeStatus::Measured { seconds },
        None => ProbeStatus::Degraded {
            reason: format!("unparseable ffprobe output {:?}", output.stdout.trim()),
        },
    }
}

/// Probe a request asset, applying the configured failure policy
///
/// Successful measurements are cached on the asset so a second call within
/// the same request does not spawn ffprobe again.
pub async fn probe_asset(
    ffprobe: &Path,
    asset: &MediaAsset,
    policy: ProbePolicy,
    timeout: Option<Duration>,
) -> Result<ProbeStatus> {
    if let Some(seconds) = asset.cached_duration() {
        return Ok(ProbeStatus::Measured { seconds });
    }

    let status = probe_duration(ffprobe, asset.path(), timeout).await;
    match &status {
        ProbeStatus::Measured { seconds } => {
            debug!("{} lasts {:.3} s", asset.path().display(), seconds);
            asset.cache_duration(*seconds);
        }
        ProbeStatus::Degraded { reason } => {
            if policy == ProbePolicy::Strict {
                return Err(MixError::ProbeFailed {
                    path: asset.path().display().to_string(),
                    reason: reason.clone(),
                });
            }
            warn!(
                "Duration probe degraded for {}, assuming zero length: {}",
                asset.path().display(),
                reason
            );
        }
    }
    Ok(status)
}
