//! Narration + background music mixer
//!
//! Takes a narration track and a background track and produces one mixed
//! track: the background is looped under the narration, starts `intro_delay`
//! seconds earlier and keeps playing `outro_length` seconds after it. All audio
//! work is done by an external ffmpeg; this crate computes the timing, builds
//! the filter graph, runs the process and manages the scratch directory the
//! results land in.

pub mod config;
pub mod error;
pub mod media;
pub mod request;
pub mod utils;

use std::path::Path;

use log::info;

pub use crate::config::{AudioCodec, MixerConfig, ProbePolicy};
pub use crate::error::{MixError, Result};
pub use crate::media::filter::{FilterGraph, GraphParams};
pub use crate::media::probe::ProbeStatus;
pub use crate::media::synth::{SynthesisPlan, SynthesisResult, Synthesizer};
pub use crate::request::{MediaAsset, SynthesisRequest};
pub use crate::utils::temp::{ScratchAsset, ScratchDir, SweepReport};

/// Entry point for one request cycle: scratch hygiene, then the mix
#[derive(Debug, Clone)]
pub struct Mixer {
    synthesizer: Synthesizer,
}

impl Mixer {
    pub fn new(config: MixerConfig) -> Result<Self> {
        Ok(Self {
            synthesizer: Synthesizer::new(config)?,
        })
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Make sure the scratch directory exists and purge expired files
    pub fn prepare(&self) -> Result<SweepReport> {
        let scratch = self.synthesizer.scratch();
        scratch.ensure()?;
        Ok(scratch.sweep())
    }

    /// Run one request cycle
    pub async fn mix(&self, request: &SynthesisRequest) -> Result<SynthesisResult> {
        let report = self.prepare()?;
        if report.removed > 0 {
            info!("Removed {} expired scratch files before mixing", report.removed);
        }
        self.synthesizer.synthesize(request).await
    }
}

/// Mix with the default configuration, clamping raw parameters first
pub async fn mix_with_background(
    narration: impl AsRef<Path>,
    background: impl AsRef<Path>,
    background_volume: f64,
    intro_delay: f64,
    outro_length: f64,
) -> Result<SynthesisResult> {
    let request = SynthesisRequest::from_raw(
        narration,
        background,
        background_volume,
        intro_delay,
        outro_length,
    )?;
    Mixer::new(MixerConfig::default())?.mix(&request).await
}
