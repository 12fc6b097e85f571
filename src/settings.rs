//! Resolved pipeline settings
//!
//! [`PipelineSettings`] is the immutable value object every component
//! reads from: file paths, the resolved channel layout, DRC and gain
//! values, the output target, and the plugin search path. It is built
//! and validated once, before any graph work begins.

use std::path::{Path, PathBuf};

use crate::error::{HomeAudioError, Result};
use crate::layout::ChannelLayout;

/// Linear gain bounds shared by all user gains
const GAIN_RANGE: (f64, f64) = (0.0, 10.0);

/// Content-normalization gain per profile name. The `cm-` entries are the
/// content-mastered variants applied to bitstream and container input.
pub const PROFILE_CONTENT_GAINS: [(&str, f64); 4] = [
    ("movie", 1.0),
    ("music", 1.0),
    ("cm-movie", 3.981),
    ("cm-music", 3.981),
];

/// How the input type is established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Uncompressed PCM, known from the file extension
    Pcm,
    /// Compressed bitstream, known from the file extension
    Bitstream,
    /// Unknown up front; the graph probes the content
    Probe,
}

impl InputKind {
    /// Classify an input path by extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("wav") => InputKind::Pcm,
            Some("ac3") | Some("ec3") => InputKind::Bitstream,
            _ => InputKind::Probe,
        }
    }
}

/// Where the rendered audio goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Encode to a WAV file
    File(PathBuf),
    /// Play back live on a device
    Playback(String),
}

/// Decoder dynamic range control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrcMode {
    Disable = 0,
    #[default]
    Enable = 1,
    Auto = 2,
}

/// Decoder dynamic range control settings
#[derive(Debug, Clone, PartialEq)]
pub struct DrcSettings {
    pub mode: DrcMode,
    pub cut: f64,
    pub boost: f64,
}

impl Default for DrcSettings {
    fn default() -> Self {
        Self {
            mode: DrcMode::Enable,
            cut: 1.0,
            boost: 1.0,
        }
    }
}

impl DrcSettings {
    /// Parse a DRC option string, e.g. `mode=enable:x=0.5:y=0.5`
    /// (`x` = cut scale factor, `y` = boost scale factor).
    pub fn parse(spec: &str) -> Result<Self> {
        let mut settings = DrcSettings::default();
        for option in spec.split(':') {
            let (key, value) = option.split_once('=').ok_or_else(|| {
                HomeAudioError::InvalidSettings {
                    reason: format!("malformed DRC option '{}'", option),
                }
            })?;
            match key {
                "mode" => {
                    settings.mode = match value {
                        "disable" => DrcMode::Disable,
                        "enable" => DrcMode::Enable,
                        "auto" => DrcMode::Auto,
                        other => {
                            return Err(HomeAudioError::InvalidSettings {
                                reason: format!("unknown DRC mode '{}'", other),
                            })
                        }
                    }
                }
                "x" => settings.cut = parse_scale(value, "DRC cut")?,
                "y" => settings.boost = parse_scale(value, "DRC boost")?,
                other => {
                    return Err(HomeAudioError::InvalidSettings {
                        reason: format!("unknown DRC option '{}'", other),
                    })
                }
            }
        }
        Ok(settings)
    }
}

fn parse_scale(value: &str, what: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| HomeAudioError::InvalidSettings {
            reason: format!("{} is not a number: '{}'", what, value),
        })
}

/// Renderer gain interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpMode {
    #[default]
    Offline,
    Runtime,
}

impl InterpMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "offline" => Ok(InterpMode::Offline),
            "runtime" => Ok(InterpMode::Runtime),
            other => Err(HomeAudioError::InvalidSettings {
                reason: format!(
                    "invalid interpolation mode '{}'; allowed: offline, runtime",
                    other
                ),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InterpMode::Offline => "offline",
            InterpMode::Runtime => "runtime",
        }
    }
}

/// Requested content profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentProfile {
    #[default]
    Off,
    Movie,
    Music,
}

impl ContentProfile {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "off" => Ok(ContentProfile::Off),
            "movie" => Ok(ContentProfile::Movie),
            "music" => Ok(ContentProfile::Music),
            other => Err(HomeAudioError::InvalidSettings {
                reason: format!("invalid profile '{}'; allowed: off, movie, music", other),
            }),
        }
    }

    /// Profile name used for the gain lookup. Bitstream and container
    /// content uses the content-mastered variant.
    pub fn gain_table_name(self, mastered_content: bool) -> Option<&'static str> {
        let base = match self {
            ContentProfile::Off => return None,
            ContentProfile::Movie => ("movie", "cm-movie"),
            ContentProfile::Music => ("music", "cm-music"),
        };
        Some(if mastered_content { base.1 } else { base.0 })
    }
}

/// Look up the content-normalization gain for a profile table name
pub fn profile_content_gain(name: &str) -> Option<f64> {
    PROFILE_CONTENT_GAINS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, g)| *g)
}

/// Parse a comma-separated active channel index list into a bitmask
pub fn parse_active_channels(list: &str) -> Result<u64> {
    let mut mask = 0u64;
    for item in list.split(',') {
        let index =
            item.trim()
                .parse::<u8>()
                .map_err(|_| HomeAudioError::InvalidSettings {
                    reason: format!(
                        "malformed active channels list: '{}' is not a channel index",
                        item
                    ),
                })?;
        if index >= 64 {
            return Err(HomeAudioError::InvalidSettings {
                reason: format!("active channel index {} out of range", index),
            });
        }
        mask |= 1u64 << index;
    }
    Ok(mask)
}

/// Validate a linear gain value against the shared range
pub fn validate_gain(value: f64, what: &str) -> Result<f64> {
    if value < GAIN_RANGE.0 || value > GAIN_RANGE.1 {
        return Err(HomeAudioError::InvalidSettings {
            reason: format!(
                "invalid {} value {}; gain must be in range [{} - {}]",
                what, value, GAIN_RANGE.0, GAIN_RANGE.1
            ),
        });
    }
    Ok(value)
}

/// Immutable, resolved configuration for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub input: PathBuf,
    pub output: OutputTarget,
    pub speaker_layout: Option<ChannelLayout>,
    pub drc: DrcSettings,
    pub virtualizer_enable: bool,
    pub content_gain: f64,
    pub internal_gain: f64,
    pub external_gain: f64,
    /// Volume step index; -1 disables step-based external gain
    pub external_gain_by_step: i64,
    pub interp_mode: InterpMode,
    pub upmix: bool,
    pub active_channels: Option<u64>,
    pub profile: ContentProfile,
    /// Path to the renderer's JSON configuration document, if any
    pub renderer_config: Option<PathBuf>,
    pub plugin_path: PathBuf,
    pub graph_dump: Option<PathBuf>,
}

impl PipelineSettings {
    /// Settings with defaults for everything but the input and output
    pub fn new(input: impl Into<PathBuf>, output: OutputTarget) -> Self {
        Self {
            input: input.into(),
            output,
            speaker_layout: None,
            drc: DrcSettings::default(),
            virtualizer_enable: false,
            content_gain: 1.0,
            internal_gain: 1.0,
            external_gain: 1.0,
            external_gain_by_step: -1,
            interp_mode: InterpMode::Offline,
            upmix: false,
            active_channels: None,
            profile: ContentProfile::Off,
            renderer_config: None,
            plugin_path: PathBuf::from("../lib/plugins"),
            graph_dump: None,
        }
    }

    /// How the input type is established for this run
    pub fn input_kind(&self) -> InputKind {
        InputKind::from_path(&self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("in.wav", InputKind::Pcm)]
    #[test_case("in.ac3", InputKind::Bitstream)]
    #[test_case("in.ec3", InputKind::Bitstream)]
    #[test_case("in.mp4", InputKind::Probe)]
    #[test_case("in", InputKind::Probe)]
    fn input_kind_from_extension(path: &str, expected: InputKind) {
        assert_eq!(InputKind::from_path(Path::new(path)), expected);
    }

    #[test]
    fn drc_parse_full_spec() {
        let drc = DrcSettings::parse("mode=auto:x=0.5:y=0.25").unwrap();
        assert_eq!(drc.mode, DrcMode::Auto);
        assert_eq!(drc.cut, 0.5);
        assert_eq!(drc.boost, 0.25);
    }

    #[test]
    fn drc_parse_partial_keeps_defaults() {
        let drc = DrcSettings::parse("mode=disable").unwrap();
        assert_eq!(drc.mode, DrcMode::Disable);
        assert_eq!(drc.cut, 1.0);
        assert_eq!(drc.boost, 1.0);
    }

    #[test_case("mode=loud"; "unknown mode")]
    #[test_case("z=1"; "unknown key")]
    #[test_case("x=abc"; "bad number")]
    #[test_case("mode"; "missing equals")]
    fn drc_parse_rejects(spec: &str) {
        let err = DrcSettings::parse(spec).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTINGS");
    }

    #[test]
    fn active_channels_bitmask() {
        assert_eq!(parse_active_channels("0,1,2").unwrap(), 0b111);
        assert_eq!(parse_active_channels("0, 5").unwrap(), 0b100001);
        assert!(parse_active_channels("0,x").is_err());
    }

    #[test]
    fn gain_range_enforced() {
        assert!(validate_gain(0.0, "content gain").is_ok());
        assert!(validate_gain(10.0, "content gain").is_ok());
        assert!(validate_gain(-0.1, "content gain").is_err());
        assert!(validate_gain(10.1, "content gain").is_err());
    }

    #[test]
    fn profile_gain_table_names() {
        assert_eq!(ContentProfile::Off.gain_table_name(true), None);
        assert_eq!(
            ContentProfile::Movie.gain_table_name(false),
            Some("movie")
        );
        assert_eq!(
            ContentProfile::Movie.gain_table_name(true),
            Some("cm-movie")
        );
        assert_eq!(profile_content_gain("cm-movie"), Some(3.981));
        assert_eq!(profile_content_gain("night"), None);
    }

    #[test]
    fn interp_mode_round_trip() {
        assert_eq!(InterpMode::parse("offline").unwrap(), InterpMode::Offline);
        assert_eq!(InterpMode::parse("runtime").unwrap().as_str(), "runtime");
        assert!(InterpMode::parse("later").is_err());
    }
}
