use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::error;
use serde_json::json;

use bgm_mixer::request::DEFAULT_BACKGROUND_VOLUME;
use bgm_mixer::utils::{ffmpeg, logger};
use bgm_mixer::{MixError, Mixer, MixerConfig, ProbePolicy, SynthesisRequest};

/// Exit status when ffmpeg/ffprobe is missing, fails or times out
const EXIT_TOOL_FAILURE: u8 = 2;

/// Mix narration over looped background music
#[derive(Parser, Debug)]
#[command(name = "bgm-mixer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: ConfigArgs,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// ffmpeg binary
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// ffprobe binary
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Scratch directory for mixed files
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,

    /// Kill ffmpeg/ffprobe after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Fail instead of assuming zero length when the narration cannot be probed
    #[arg(long, global = true)]
    strict_probe: bool,
}

impl ConfigArgs {
    fn load(&self) -> Result<MixerConfig> {
        let mut config = match &self.config {
            Some(path) => MixerConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MixerConfig::default(),
        };
        if let Some(path) = &self.ffmpeg {
            config.ffmpeg_path = path.clone();
        }
        if let Some(path) = &self.ffprobe {
            config.ffprobe_path = path.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            config.process_timeout_secs = Some(secs);
        }
        if self.strict_probe {
            config.probe_policy = ProbePolicy::Strict;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether ffmpeg and ffprobe can be run
    Check,
    /// Print the duration of an audio file
    Probe {
        file: PathBuf,
    },
    /// Remove expired files from the scratch directory
    Sweep,
    /// Mix a narration track over a background track
    Mix(MixArgs),
}

#[derive(Args, Debug)]
struct MixArgs {
    /// Narration audio file
    #[arg(long)]
    narration: PathBuf,

    /// Background audio file
    #[arg(long)]
    background: PathBuf,

    /// Background gain, clamped to [0, 1]
    #[arg(long, default_value_t = DEFAULT_BACKGROUND_VOLUME)]
    volume: f64,

    /// Seconds of background before the narration starts (0.5 s steps, max 10)
    #[arg(long, default_value_t = 0.0)]
    intro: f64,

    /// Seconds of background after the narration ends (0.5 s steps, max 10)
    #[arg(long, default_value_t = 0.0)]
    outro: f64,

    /// Move the result here instead of leaving it in the scratch directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 2 for tool failures, 1 for everything else
fn exit_status(err: &anyhow::Error) -> u8 {
    let tool_failure = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<MixError>())
        .any(MixError::is_tool_failure);
    if tool_failure {
        EXIT_TOOL_FAILURE
    } else {
        1
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.overrides.load()?;

    match cli.command {
        Commands::Check => {
            let mut all_ok = true;
            let mut report = serde_json::Map::new();
            for path in [&config.ffmpeg_path, &config.ffprobe_path] {
                let available = ffmpeg::is_available(path).await;
                all_ok &= available;
                let version = if available {
                    ffmpeg::tool_version(path).await.ok()
                } else {
                    None
                };
                report.insert(
                    ffmpeg::tool_name(path),
                    json!({
                        "path": path.display().to_string(),
                        "available": available,
                        "banner": version.as_ref().map(|v| v.banner.clone()),
                        "version": version.and_then(|v| v.version).map(|v| v.to_string()),
                    }),
                );
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Probe { file } => {
            let status = bgm_mixer::media::probe::probe_duration(
                &config.ffprobe_path,
                &file,
                config.process_timeout(),
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(if status.is_degraded() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::Sweep => {
            let mixer = Mixer::new(config)?;
            let report = mixer.prepare()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mix(args) => {
            let request = SynthesisRequest::from_raw(
                &args.narration,
                &args.background,
                args.volume,
                args.intro,
                args.outro,
            )?;
            let mixer = Mixer::new(config)?;
            let result = mixer.mix(&request).await?;

            let mut value = serde_json::to_value(&result)?;
            if let Some(dest) = &args.output {
                let path = result
                    .output
                    .persist_to(dest)
                    .with_context(|| format!("Failed to move result to {}", dest.display()))?;
                value["output"] = json!({ "path": path.display().to_string() });
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
