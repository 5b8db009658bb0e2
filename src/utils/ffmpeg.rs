//! Helpers for running ffmpeg and ffprobe
//!
//! All subprocess work in the crate goes through [`run_tool`]: one spawn, wait
//! for exit, collect stdout/stderr. There is no streaming consumption of the
//! tool output.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use tokio::process::Command;

use crate::error::{MixError, Result};

/// Limit for the `-version` capability probe
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines of stderr kept in `ProcessFailed`
const STDERR_EXCERPT_LINES: usize = 20;
const STDERR_EXCERPT_MAX_CHARS: usize = 4000;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"version\s+n?(\d+)\.(\d+)(?:\.(\d+))?").expect("version regex is valid")
});

/// Captured result of a finished tool invocation
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Version information reported by `<tool> -version`
#[derive(Debug, Clone)]
pub struct ToolVersion {
    /// First line of the banner, e.g. `ffmpeg version 6.1.1 Copyright ...`
    pub banner: String,
    /// Parsed numeric version, absent for git builds and other odd banners
    pub version: Option<Version>,
}

/// Display name of a tool for logs and errors
pub fn tool_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Check that the tool starts and exits with status zero
///
/// Spawn errors (missing binary, no execute permission) and timeouts are
/// reported as `false`, never as an error.
pub async fn is_available(path: &Path) -> bool {
    let mut cmd = Command::new(path);
    cmd.arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!("{} could not be started: {}", path.display(), e);
            return false;
        }
    };

    match tokio::time::timeout(VERSION_CHECK_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("Waiting for {} failed: {}", path.display(), e);
            false
        }
        Err(_) => {
            warn!("{} -version did not finish in {:?}", path.display(), VERSION_CHECK_TIMEOUT);
            false
        }
    }
}

/// Query the tool version banner
pub async fn tool_version(path: &Path) -> Result<ToolVersion> {
    let output = run_tool(path, &[OsString::from("-version")], Some(VERSION_CHECK_TIMEOUT)).await?;
    if !output.status.success() {
        return Err(MixError::ProcessFailed {
            exit_code: output.status.code(),
            stderr_excerpt: stderr_excerpt(&output.stderr),
        });
    }

    let banner = output.stdout.lines().next().unwrap_or("").trim().to_string();
    Ok(ToolVersion {
        version: parse_version(&banner),
        banner,
    })
}

/// Extract `major.minor[.patch]` from a `-version` banner line
pub fn parse_version(banner: &str) -> Option<Version> {
    let caps = VERSION_RE.captures(banner)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(Version::new(part(1), part(2), part(3)))
}

/// Run a tool to completion and capture its output
///
/// When `timeout` expires the child is killed and `ProcessTimedOut` is
/// returned. A spawn failure because the binary is missing or not executable
/// maps to `ToolUnavailable`. Arguments are passed through as raw OS strings,
/// so paths that are not valid UTF-8 reach the tool unchanged.
pub async fn run_tool(
    path: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
) -> Result<ProcessOutput> {
    debug!(
        "Running {} {}",
        path.display(),
        args.iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let mut cmd = Command::new(path);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            MixError::ToolUnavailable {
                tool: tool_name(path),
                path: path.display().to_string(),
            }
        }
        _ => MixError::Io(e),
    })?;

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            // Dropping the wait future drops the child, kill_on_drop terminates it
            Err(_) => {
                warn!("{} exceeded {:?}, killed", tool_name(path), limit);
                return Err(MixError::ProcessTimedOut {
                    tool: tool_name(path),
                    seconds: limit.as_secs(),
                });
            }
        },
        None => child.wait_with_output().await?,
    };

    Ok(ProcessOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Tail of a stderr stream, never empty
pub fn stderr_excerpt(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "no output on stderr".to_string();
    }

    let start = lines.len().saturating_sub(STDERR_EXCERPT_LINES);
    let excerpt = lines[start..].join("\n");
    if excerpt.chars().count() <= STDERR_EXCERPT_MAX_CHARS {
        return excerpt;
    }
    let skip = excerpt.chars().count() - STDERR_EXCERPT_MAX_CHARS;
    excerpt.chars().skip(skip).collect()
}
