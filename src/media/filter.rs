//! Declarative ffmpeg filter graph for the narration/background mix
//!
//! Input 0 is the narration, input 1 the background. The graph is built as
//! data first and rendered to `-filter_complex` syntax through `Display`.

use std::fmt;

/// ffmpeg input index of the narration
pub const NARRATION_INPUT: usize = 0;
/// ffmpeg input index of the background
pub const BACKGROUND_INPUT: usize = 1;
/// Label of the final mixed stream, mapped with `-map [out]`
pub const OUTPUT_LABEL: &str = "out";

const BACKGROUND_LABEL: &str = "bgm";
const VOICE_LABEL: &str = "voice";

/// Render a number with at most six decimals and no trailing zeros
pub fn format_decimal(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// How `amix` decides the output length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixDuration {
    First,
    Longest,
    Shortest,
}

impl MixDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Longest => "longest",
            Self::Shortest => "shortest",
        }
    }
}

/// A single audio filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Repeat the input forever
    Loop,
    /// Linear gain
    Volume(f64),
    /// Cut the stream after `duration` seconds
    Trim { duration: f64 },
    /// Prepend silence on both channels
    Delay { millis: u64 },
    /// Pass through unchanged
    Copy,
    /// Mix several streams into one
    Mix {
        inputs: usize,
        duration: MixDuration,
        dropout_transition: f64,
    },
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Loop => write!(f, "aloop=loop=-1:size=2e+09"),
            Filter::Volume(gain) => write!(f, "volume={}", format_decimal(*gain)),
            Filter::Trim { duration } => write!(f, "atrim=duration={}", format_decimal(*duration)),
            Filter::Delay { millis } => write!(f, "adelay={}|{}", millis, millis),
            Filter::Copy => write!(f, "acopy"),
            Filter::Mix {
                inputs,
                duration,
                dropout_transition,
            } => write!(
                f,
                "amix=inputs={}:duration={}:dropout_transition={}",
                inputs,
                duration.as_str(),
                format_decimal(*dropout_transition)
            ),
        }
    }
}

/// Input or output pad of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pad {
    /// Audio stream of an ffmpeg input, `[N:a]`
    Input(usize),
    /// Named intermediate stream, `[name]`
    Label(String),
}

impl Pad {
    fn label(name: &str) -> Self {
        Pad::Label(name.to_string())
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Input(index) => write!(f, "[{}:a]", index),
            Pad::Label(name) => write!(f, "[{}]", name),
        }
    }
}

/// Linear sequence of filters between input pads and one output label
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub output: String,
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{}", pad)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", filter)?;
        }
        write!(f, "[{}]", self.output)
    }
}

/// Complete graph handed to `-filter_complex`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    /// Label to pass to `-map`
    pub fn output_label(&self) -> String {
        format!("[{}]", OUTPUT_LABEL)
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}

/// Parameters the graph depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphParams {
    pub background_volume: f64,
    pub intro_delay: f64,
    pub outro_length: f64,
    /// `intro_delay + narration + outro_length`
    pub total_duration: f64,
    /// `amix` dropout transition in seconds
    pub dropout_transition: f64,
}

impl GraphParams {
    /// No intro and no outro: the narration alone defines the length
    pub fn is_fast_path(&self) -> bool {
        self.intro_delay <= 0.0 && self.outro_length <= 0.0
    }
}

/// Build the mix graph
///
/// With intro or outro the background is looped, attenuated and trimmed to
/// the total length, the narration is delayed by the intro, and the mix is
/// trimmed once more to the total length. Without either, the narration is
/// mixed first so that `duration=first` ends the output with it.
pub fn build(params: &GraphParams) -> FilterGraph {
    let mix = Filter::Mix {
        inputs: 2,
        duration: MixDuration::First,
        dropout_transition: params.dropout_transition,
    };

    if params.is_fast_path() {
        return FilterGraph {
            chains: vec![
                FilterChain {
                    inputs: vec![Pad::Input(BACKGROUND_INPUT)],
                    filters: vec![Filter::Loop, Filter::Volume(params.background_volume)],
                    output: BACKGROUND_LABEL.to_string(),
                },
                FilterChain {
                    inputs: vec![Pad::Input(NARRATION_INPUT), Pad::label(BACKGROUND_LABEL)],
                    filters: vec![mix],
                    output: OUTPUT_LABEL.to_string(),
                },
            ],
        };
    }

    let trim = Filter::Trim {
        duration: params.total_duration,
    };

    let voice = if params.intro_delay > 0.0 {
        Filter::Delay {
            millis: (params.intro_delay * 1000.0).round() as u64,
        }
    } else {
        Filter::Copy
    };

    FilterGraph {
        chains: vec![
            FilterChain {
                inputs: vec![Pad::Input(BACKGROUND_INPUT)],
                filters: vec![
                    Filter::Loop,
                    Filter::Volume(params.background_volume),
                    trim.clone(),
                ],
                output: BACKGROUND_LABEL.to_string(),
            },
            FilterChain {
                inputs: vec![Pad::Input(NARRATION_INPUT)],
                filters: vec![voice],
                output: VOICE_LABEL.to_string(),
            },
            FilterChain {
                inputs: vec![Pad::label(BACKGROUND_LABEL), Pad::label(VOICE_LABEL)],
                filters: vec![mix, trim],
                output: OUTPUT_LABEL.to_string(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(volume: f64, intro: f64, narration: f64, outro: f64) -> GraphParams {
        GraphParams {
            background_volume: volume,
            intro_delay: intro,
            outro_length: outro,
            total_duration: intro + narration + outro,
            dropout_transition: 2.0,
        }
    }

    #[test]
    fn full_graph_with_intro_and_outro() {
        let graph = build(&params(0.3, 1.0, 4.0, 1.5));
        assert_eq!(
            graph.to_string(),
            "[1:a]aloop=loop=-1:size=2e+09,volume=0.3,atrim=duration=6.5[bgm];\
             [0:a]adelay=1000|1000[voice];\
             [bgm][voice]amix=inputs=2:duration=first:dropout_transition=2,atrim=duration=6.5[out]"
        );
    }

    #[test]
    fn outro_only_copies_narration() {
        let graph = build(&params(0.5, 0.0, 4.0, 2.0));
        assert_eq!(graph.chains.len(), 3);
        assert_eq!(graph.chains[1].to_string(), "[0:a]acopy[voice]");
        assert!(graph.to_string().ends_with("atrim=duration=6[out]"));
    }

    #[test]
    fn fast_path_has_two_chains_and_no_trim() {
        let graph = build(&params(0.5, 0.0, 4.0, 0.0));
        assert_eq!(
            graph.to_string(),
            "[1:a]aloop=loop=-1:size=2e+09,volume=0.5[bgm];\
             [0:a][bgm]amix=inputs=2:duration=first:dropout_transition=2[out]"
        );
        assert!(!graph.to_string().contains("adelay"));
        assert_eq!(graph.output_label(), "[out]");
    }

    #[test]
    fn delay_is_rounded_to_milliseconds() {
        let graph = build(&params(1.0, 2.5, 3.0, 0.0));
        assert_eq!(graph.chains[1].filters, vec![Filter::Delay { millis: 2500 }]);
    }

    #[test]
    fn probe_noise_does_not_leak_into_durations() {
        let graph = build(&params(0.25, 0.5, 4.123456789, 1.0));
        assert!(graph.to_string().contains("atrim=duration=5.623457[bgm]"));
    }

    #[test]
    fn format_decimal_trims_zeros() {
        assert_eq!(format_decimal(4.0), "4");
        assert_eq!(format_decimal(0.0), "0");
        assert_eq!(format_decimal(6.5), "6.5");
        assert_eq!(format_decimal(0.1 + 0.2), "0.3");
        assert_eq!(format_decimal(-0.0000001), "0");
    }
}
