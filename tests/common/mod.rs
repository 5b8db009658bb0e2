//! Shared helpers for integration tests.
//!
//! `fake_tools` builds shell-script stand-ins for ffmpeg/ffprobe so the
//! orchestration can be tested without a real ffmpeg. `audio` writes and reads
//! WAV fixtures for the tests that do run the real tools.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bgm_mixer::MixerConfig;

/// Configuration pointing at the given tools and scratch directory
pub fn config_with(ffmpeg: &Path, ffprobe: &Path, scratch: &Path) -> MixerConfig {
    MixerConfig {
        ffmpeg_path: ffmpeg.to_path_buf(),
        ffprobe_path: ffprobe.to_path_buf(),
        scratch_dir: scratch.to_path_buf(),
        process_timeout_secs: Some(30),
        ..MixerConfig::default()
    }
}

/// Files in a directory, empty when it does not exist
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(unix)]
pub mod fake_tools {
    use std::ffi::OsString;
    use std::fs;
    use std::os::unix::ffi::OsStringExt;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// ffprobe that prints a fixed duration
    pub fn ffprobe_printing(output: &str) -> String {
        format!("echo \"{}\"\n", output)
    }

    /// ffprobe that prints a fixed duration only when its input file exists
    pub fn ffprobe_checking_input(output: &str) -> String {
        format!(
            "for arg in \"$@\"; do input=\"$arg\"; done\n\
             [ -f \"$input\" ] || {{ echo \"$input: No such file or directory\" >&2; exit 1; }}\n\
             echo \"{}\"\n",
            output
        )
    }

    /// ffprobe that fails
    pub const FFPROBE_FAILING: &str = "echo \"voice.mp3: Invalid data found\" >&2\nexit 1\n";

    /// ffmpeg that answers `-version`, records its arguments and writes the output file
    pub fn ffmpeg_succeeding(args_log: &Path) -> String {
        format!(
            "if [ \"$1\" = \"-version\" ]; then echo \"ffmpeg version 6.1.1 fake\"; exit 0; fi\n\
             for arg in \"$@\"; do out=\"$arg\"; done\n\
             printf '%s\\n' \"$@\" > \"{}\"\n\
             printf 'mixed' > \"$out\"\n",
            args_log.display()
        )
    }

    /// ffmpeg that writes a partial file, complains on stderr and exits 1
    pub const FFMPEG_FAILING: &str = "if [ \"$1\" = \"-version\" ]; then exit 0; fi\n\
         for arg in \"$@\"; do out=\"$arg\"; done\n\
         printf 'partial' > \"$out\"\n\
         echo \"[Parsed_amix_2 @ 0x1] Error while filtering: Invalid argument\" >&2\n\
         exit 1\n";

    /// ffmpeg that never finishes a mix
    pub const FFMPEG_HANGING: &str = "if [ \"$1\" = \"-version\" ]; then exit 0; fi\n\
         exec sleep 30\n";

    /// ffmpeg whose `-version` fails
    pub const FFMPEG_BROKEN: &str = "exit 127\n";

    /// Write an executable `/bin/sh` script
    pub fn write_script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Temporary directory with narration/background inputs and fake tools
    pub struct Workspace {
        pub dir: tempfile::TempDir,
        pub ffmpeg: PathBuf,
        pub ffprobe: PathBuf,
        pub args_log: PathBuf,
        pub narration: PathBuf,
        pub background: PathBuf,
        pub scratch: PathBuf,
    }

    impl Workspace {
        pub fn new(ffmpeg_body: Option<&str>, ffprobe_body: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = dir.path().join("ffmpeg");
            let ffprobe = dir.path().join("ffprobe");
            let args_log = dir.path().join("ffmpeg-args.log");

            let body = match ffmpeg_body {
                Some(body) => body.to_string(),
                None => ffmpeg_succeeding(&args_log),
            };
            write_script(&ffmpeg, &body);
            write_script(&ffprobe, ffprobe_body);

            let narration = dir.path().join("voice.mp3");
            let background = dir.path().join("bgm.mp3");
            fs::write(&narration, b"narration").unwrap();
            fs::write(&background, b"background").unwrap();

            let scratch = dir.path().join("scratch");
            Self {
                dir,
                ffmpeg,
                ffprobe,
                args_log,
                narration,
                background,
                scratch,
            }
        }

        pub fn config(&self) -> bgm_mixer::MixerConfig {
            super::config_with(&self.ffmpeg, &self.ffprobe, &self.scratch)
        }

        /// Arguments of the last fake ffmpeg run, one per line
        pub fn recorded_args(&self) -> Vec<String> {
            fs::read_to_string(&self.args_log)
                .map(|s| s.lines().map(str::to_string).collect())
                .unwrap_or_default()
        }

        /// Same as [`Workspace::recorded_args`], byte for byte
        pub fn recorded_raw_args(&self) -> Vec<OsString> {
            fs::read(&self.args_log)
                .map(|bytes| {
                    bytes
                        .split(|b| *b == b'\n')
                        .filter(|arg| !arg.is_empty())
                        .map(|arg| OsString::from_vec(arg.to_vec()))
                        .collect()
                })
                .unwrap_or_default()
        }
    }
}

pub mod audio {
    use std::path::Path;

    pub const SAMPLE_RATE: u32 = 44_100;

    /// Write a stereo 16-bit sine tone
    pub fn write_tone(path: &Path, freq: f32, seconds: f32, amplitude: f32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (seconds * SAMPLE_RATE as f32) as usize;
        for n in 0..frames {
            let t = n as f32 / SAMPLE_RATE as f32;
            let value = (t * freq * 2.0 * std::f32::consts::PI).sin() * amplitude;
            let sample = (value * i16::MAX as f32) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Read a WAV file as mono f32 samples (channels averaged)
    pub fn read_mono(path: &Path) -> (Vec<f32>, u32) {
        let mut reader = hound::WavReader::open(path).unwrap();
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let samples: Vec<f32> = reader
            .samples::<i16>()
            .map(|s| s.unwrap() as f32 / i16::MAX as f32)
            .collect();
        let mono = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        (mono, spec.sample_rate)
    }

    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        (samples.iter().map(|v| v * v).sum::<f32>() / samples.len() as f32).sqrt()
    }

    /// RMS of the window `[from, to)` in seconds
    pub fn window_rms(samples: &[f32], sample_rate: u32, from: f32, to: f32) -> f32 {
        let start = ((from * sample_rate as f32) as usize).min(samples.len());
        let end = ((to * sample_rate as f32) as usize).min(samples.len());
        rms(&samples[start..end])
    }

    /// Amplitude of the `freq` component in the window `[from, to)`
    ///
    /// Single-bin DFT. Exact for a sine with a whole number of periods in the
    /// window, near zero for other such sines.
    pub fn tone_amplitude(samples: &[f32], sample_rate: u32, freq: f32, from: f32, to: f32) -> f32 {
        let start = ((from * sample_rate as f32) as usize).min(samples.len());
        let end = ((to * sample_rate as f32) as usize).min(samples.len());
        let window = &samples[start..end];
        if window.is_empty() {
            return 0.0;
        }
        let step = 2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64;
        let (mut re, mut im) = (0.0f64, 0.0f64);
        for (n, sample) in window.iter().enumerate() {
            let phase = step * n as f64;
            re += *sample as f64 * phase.cos();
            im -= *sample as f64 * phase.sin();
        }
        (2.0 * (re * re + im * im).sqrt() / window.len() as f64) as f32
    }
}
