//! Mixer configuration
//!
//! Binary locations, codec settings and lifecycle limits are passed into the
//! engine explicitly instead of being read from process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MixError, Result};

/// Output encoding of the mixed track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum AudioCodec {
    /// MP3 through libmp3lame, VBR quality scale (0 = best, 9 = worst)
    Mp3 { quality: u8 },
    /// AAC in an M4A container at a constant bitrate
    Aac { bitrate_kbps: u32 },
}

impl Default for AudioCodec {
    fn default() -> Self {
        Self::Mp3 { quality: 2 }
    }
}

impl AudioCodec {
    /// ffmpeg encoder name
    pub fn encoder(&self) -> &'static str {
        match self {
            Self::Mp3 { .. } => "libmp3lame",
            Self::Aac { .. } => "aac",
        }
    }

    /// File extension of the produced asset
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 { .. } => "mp3",
            Self::Aac { .. } => "m4a",
        }
    }

    /// Encoder arguments placed between the stream mapping and the output path
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:a".to_string(), self.encoder().to_string()];
        match self {
            Self::Mp3 { quality } => {
                args.push("-q:a".to_string());
                args.push(quality.to_string());
            }
            Self::Aac { bitrate_kbps } => {
                args.push("-b:a".to_string());
                args.push(format!("{}k", bitrate_kbps));
            }
        }
        args
    }
}

/// What to do when the narration duration cannot be probed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbePolicy {
    /// Treat the narration as zero-length and carry on
    Degrade,
    /// Abort the request with `MixError::ProbeFailed`
    Strict,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self::Degrade
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path or name of the ffprobe binary
    pub ffprobe_path: PathBuf,
    /// Shared directory for engine-owned output files
    pub scratch_dir: PathBuf,
    /// File name prefix of produced assets
    pub output_prefix: String,
    /// Output encoding
    pub codec: AudioCodec,
    /// Transition applied by `amix` when one input ends early (seconds)
    pub dropout_transition_secs: f64,
    /// Age after which scratch files are swept (seconds)
    pub retention_secs: u64,
    /// Wall-clock limit for any single ffmpeg/ffprobe run, `None` disables it
    pub process_timeout_secs: Option<u64>,
    /// Behaviour on duration probe failure
    pub probe_policy: ProbePolicy,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            scratch_dir: std::env::temp_dir().join("bgm-mixer"),
            output_prefix: "synthesized".to_string(),
            codec: AudioCodec::default(),
            dropout_transition_secs: 2.0,
            retention_secs: 60 * 60,
            process_timeout_secs: Some(300),
            probe_policy: ProbePolicy::default(),
        }
    }
}

impl MixerConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MixerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err(MixError::Configuration("ffmpeg_path is empty".to_string()));
        }
        if self.ffprobe_path.as_os_str().is_empty() {
            return Err(MixError::Configuration("ffprobe_path is empty".to_string()));
        }
        if self.scratch_dir.as_os_str().is_empty() {
            return Err(MixError::Configuration("scratch_dir is empty".to_string()));
        }
        if self.output_prefix.is_empty()
            || self.output_prefix.contains(std::path::is_separator)
        {
            return Err(MixError::Configuration(format!(
                "output_prefix must be a non-empty file name fragment, got {:?}",
                self.output_prefix
            )));
        }
        if !self.dropout_transition_secs.is_finite() || self.dropout_transition_secs < 0.0 {
            return Err(MixError::Configuration(format!(
                "dropout_transition_secs must be a non-negative number, got {}",
                self.dropout_transition_secs
            )));
        }
        if self.retention_secs == 0 {
            return Err(MixError::Configuration(
                "retention_secs must be greater than zero".to_string(),
            ));
        }
        if self.process_timeout_secs == Some(0) {
            return Err(MixError::Configuration(
                "process_timeout_secs must be greater than zero when set".to_string(),
            ));
        }
        if let AudioCodec::Mp3 { quality } = self.codec {
            if quality > 9 {
                return Err(MixError::Configuration(format!(
                    "mp3 quality must be within 0..=9, got {}",
                    quality
                )));
            }
        }
        Ok(())
    }
}
