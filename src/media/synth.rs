//! Synthesis of the final mixed track
//!
//! One request runs strictly in order: tool check, narration probe, graph
//! build, output allocation, a single ffmpeg run. Nothing is retried here.

use std::ffi::OsString;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;

use crate::config::MixerConfig;
use crate::error::{MixError, Result};
use crate::media::filter::{self, FilterGraph, GraphParams};
use crate::media::probe::{self, ProbeStatus};
use crate::request::SynthesisRequest;
use crate::utils::ffmpeg::{self, stderr_excerpt};
use crate::utils::temp::{remove_quietly, ScratchAsset, ScratchDir};

/// Derived, immutable description of one synthesis
#[derive(Debug, Clone)]
pub struct SynthesisPlan {
    probe: ProbeStatus,
    params: GraphParams,
    graph: FilterGraph,
}

impl SynthesisPlan {
    /// Derive the plan from a request and the probed narration duration
    pub fn new(request: &SynthesisRequest, probe: ProbeStatus, dropout_transition: f64) -> Self {
        let total_duration =
            request.intro_delay() + probe.seconds() + request.outro_length();
        let params = GraphParams {
            background_volume: request.background_volume(),
            intro_delay: request.intro_delay(),
            outro_length: request.outro_length(),
            total_duration,
            dropout_transition,
        };
        let graph = filter::build(&params);
        Self {
            probe,
            params,
            graph,
        }
    }

    pub fn narration_duration(&self) -> f64 {
        self.probe.seconds()
    }

    pub fn total_duration(&self) -> f64 {
        self.params.total_duration
    }

    pub fn probe(&self) -> &ProbeStatus {
        &self.probe
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    /// Literal `-filter_complex` argument
    pub fn filter_complex(&self) -> String {
        self.graph.to_string()
    }
}

/// Successful synthesis
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub output: ScratchAsset,
    pub narration_duration: f64,
    pub total_duration: f64,
    pub probe: ProbeStatus,
    pub filter_complex: String,
    pub created_at: DateTime<Utc>,
}

/// Orchestrates probing, graph building and the ffmpeg run
#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: MixerConfig,
    scratch: ScratchDir,
}

impl Synthesizer {
    pub fn new(config: MixerConfig) -> Result<Self> {
        config.validate()?;
        let scratch = ScratchDir::new(config.scratch_dir.clone(), config.retention());
        Ok(Self { config, scratch })
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Whether the configured ffmpeg starts and exits cleanly
    pub async fn is_available(&self) -> bool {
        ffmpeg::is_available(&self.config.ffmpeg_path).await
    }

    /// Probe the narration and derive the plan, without running ffmpeg
    pub async fn plan(&self, request: &SynthesisRequest) -> Result<SynthesisPlan> {
        let probe = probe::probe_asset(
            &self.config.ffprobe_path,
            request.narration(),
            self.config.probe_policy,
            self.config.process_timeout(),
        )
        .await?;
        Ok(SynthesisPlan::new(
            request,
            probe,
            self.config.dropout_transition_secs,
        ))
    }

    /// Full ffmpeg argument list for a plan
    pub fn ffmpeg_args(
        &self,
        request: &SynthesisRequest,
        plan: &SynthesisPlan,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            request.narration().path().into(),
            "-i".into(),
            request.background().path().into(),
            "-filter_complex".into(),
            plan.filter_complex().into(),
            "-map".into(),
            plan.graph().output_label().into(),
        ];
        args.extend(self.config.codec.ffmpeg_args().into_iter().map(OsString::from));
        args.push(output.into());
        args
    }

    /// Mix the request into a new scratch asset
    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResult> {
        // Inputs may have vanished since the request was validated
        request.narration().ensure_exists("narration")?;
        request.background().ensure_exists("background")?;

        if !self.is_available().await {
            error!("ffmpeg is not available at {}", self.config.ffmpeg_path.display());
            return Err(MixError::ToolUnavailable {
                tool: ffmpeg::tool_name(&self.config.ffmpeg_path),
                path: self.config.ffmpeg_path.display().to_string(),
            });
        }

        let plan = self.plan(request).await?;
        info!(
            "Mixing {} over {} (volume {}, intro {} s, outro {} s, total {:.3} s)",
            request.narration().path().display(),
            request.background().path().display(),
            request.background_volume(),
            request.intro_delay(),
            request.outro_length(),
            plan.total_duration()
        );

        self.scratch.ensure()?;
        let output_path = self.scratch.allocate(
            &self.config.output_prefix,
            self.config.codec.extension(),
        );

        let args = self.ffmpeg_args(request, &plan, &output_path);

        let output = match ffmpeg::run_tool(
            &self.config.ffmpeg_path,
            &args,
            self.config.process_timeout(),
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                discard_partial(&output_path);
                return Err(e);
            }
        };

        if !output.status.success() {
            let stderr_excerpt = stderr_excerpt(&output.stderr);
            error!("ffmpeg failed with {}: {}", output.status, stderr_excerpt);
            discard_partial(&output_path);
            return Err(MixError::ProcessFailed {
                exit_code: output.status.code(),
                stderr_excerpt,
            });
        }

        if !output_path.is_file() {
            return Err(MixError::ProcessFailed {
                exit_code: output.status.code(),
                stderr_excerpt: format!(
                    "ffmpeg reported success but {} was not written",
                    output_path.display()
                ),
            });
        }

        info!("Mixed track written to {}", output_path.display());
        Ok(SynthesisResult {
            narration_duration: plan.narration_duration(),
            total_duration: plan.total_duration(),
            filter_complex: plan.filter_complex(),
            probe: plan.probe().clone(),
            output: ScratchAsset::new(output_path),
            created_at: Utc::now(),
        })
    }
}

fn discard_partial(path: &Path) {
    if let Err(e) = remove_quietly(path) {
        error!("Failed to remove partial output {}: {}", path.display(), e);
    }
}
