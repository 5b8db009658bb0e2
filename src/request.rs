//! Request types and the single validation boundary for mix parameters

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use path_clean::PathClean;

use crate::error::{MixError, Result};

/// Upper bound for intro delay and outro length (seconds)
pub const MAX_TIMING_SECS: f64 = 10.0;
/// Grid that intro delay and outro length are quantised to (seconds)
pub const TIMING_STEP_SECS: f64 = 0.5;
/// Background volume used when the caller supplies no usable value
pub const DEFAULT_BACKGROUND_VOLUME: f64 = 0.3;

/// Reference to an audio file the engine reads or produces
#[derive(Debug, Clone)]
pub struct MediaAsset {
    path: PathBuf,
    duration: OnceCell<f64>,
}

impl MediaAsset {
    /// Wrap a path, resolving it against the working directory
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Ok(Self {
            path: absolute.clean(),
            duration: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Fail with `FileNotFound` unless the asset is a regular file
    pub fn ensure_exists(&self, role: &str) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            Err(MixError::FileNotFound(format!(
                "{} asset {}",
                role,
                self.path.display()
            )))
        }
    }

    /// Duration measured earlier for this asset, if any
    pub fn cached_duration(&self) -> Option<f64> {
        self.duration.get().copied()
    }

    pub(crate) fn cache_duration(&self, seconds: f64) {
        let _ = self.duration.set(seconds);
    }
}

/// Clamp a caller-supplied volume into `[0, 1]`
///
/// Non-finite input falls back to [`DEFAULT_BACKGROUND_VOLUME`].
pub fn clamp_volume(raw: f64) -> f64 {
    if !raw.is_finite() {
        return DEFAULT_BACKGROUND_VOLUME;
    }
    raw.clamp(0.0, 1.0)
}

/// Round a caller-supplied timing to the 0.5 s grid and clamp it into `[0, 10]`
///
/// Non-finite input becomes zero.
pub fn quantize_timing(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let stepped = (raw / TIMING_STEP_SECS).round() * TIMING_STEP_SECS;
    stepped.clamp(0.0, MAX_TIMING_SECS)
}

fn check_volume(value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MixError::InvalidParameter {
            name: "background_volume",
            value,
            reason: "must be within [0, 1]".to_string(),
        })
    }
}

fn check_timing(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_TIMING_SECS).contains(&value) {
        return Err(MixError::InvalidParameter {
            name,
            value,
            reason: format!("must be within [0, {}] seconds", MAX_TIMING_SECS),
        });
    }
    let steps = value / TIMING_STEP_SECS;
    if (steps - steps.round()).abs() > 1e-9 {
        return Err(MixError::InvalidParameter {
            name,
            value,
            reason: format!("must be a multiple of {} seconds", TIMING_STEP_SECS),
        });
    }
    Ok(())
}

/// Validated input of one synthesis
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    narration: MediaAsset,
    background: MediaAsset,
    background_volume: f64,
    intro_delay: f64,
    outro_length: f64,
}

impl SynthesisRequest {
    /// Build a request, rejecting out-of-range or off-grid parameters
    ///
    /// Nothing is clamped here. Numeric checks run before the filesystem
    /// checks, so a bad parameter is reported even for missing files.
    pub fn new(
        narration: MediaAsset,
        background: MediaAsset,
        background_volume: f64,
        intro_delay: f64,
        outro_length: f64,
    ) -> Result<Self> {
        check_volume(background_volume)?;
        check_timing("intro_delay", intro_delay)?;
        check_timing("outro_length", outro_length)?;
        narration.ensure_exists("narration")?;
        background.ensure_exists("background")?;

        Ok(Self {
            narration,
            background,
            background_volume,
            intro_delay,
            outro_length,
        })
    }

    /// Clamp and quantise raw caller values, then build the request
    pub fn from_raw(
        narration: impl AsRef<Path>,
        background: impl AsRef<Path>,
        background_volume: f64,
        intro_delay: f64,
        outro_length: f64,
    ) -> Result<Self> {
        Self::new(
            MediaAsset::new(narration)?,
            MediaAsset::new(background)?,
            clamp_volume(background_volume),
            quantize_timing(intro_delay),
            quantize_timing(outro_length),
        )
    }

    pub fn narration(&self) -> &MediaAsset {
        &self.narration
    }

    pub fn background(&self) -> &MediaAsset {
        &self.background
    }

    pub fn background_volume(&self) -> f64 {
        self.background_volume
    }

    pub fn intro_delay(&self) -> f64 {
        self.intro_delay
    }

    pub fn outro_length(&self) -> f64 {
        self.outro_length
    }
}
