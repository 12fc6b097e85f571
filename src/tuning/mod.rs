//! Tuning configuration documents
//!
//! The renderer is calibrated with a JSON configuration document derived
//! from a legacy tuning-tool XML export. This module defines the document
//! structure and its defaults; [`convert`] performs the actual transform.
//!
//! Field order follows the serialized key order (alphabetical, matching
//! the historical converter output) so documents are reproducible.

pub mod convert;

pub use convert::{convert, list_endpoints};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sample rates every endpoint must carry a serialized config for
pub const REQUIRED_SAMPLE_RATES: [u32; 3] = [32000, 44100, 48000];

/// Default graphic-equalizer / IEQ center frequencies (Hz)
pub const BANDS_DEFAULT: [i64; 20] = [
    65, 136, 223, 332, 467, 634, 841, 1098, 1416, 1812, 2302, 2909, 3663, 4598, 5756, 7194, 8976,
    11186, 13927, 17326,
];

/// Default intelligent-equalizer gains (1/16 dB fixed point)
pub const IEQ_GAINS_DEFAULT: [i64; 20] = [
    117, 133, 188, 176, 141, 149, 175, 185, 185, 200, 236, 242, 228, 213, 182, 132, 110, 68, -27,
    -240,
];

/// A single profile parameter value as it appears in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Bool(bool),
    Int(i64),
    Array(Vec<i64>),
}

/// A full DSP parameter set for one content profile
pub type ProfileSettings = BTreeMap<String, ProfileValue>;

/// Global section of the configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(rename = "override-virtualizer-settings")]
    pub override_virtualizer_settings: bool,
    pub profile: String,
    #[serde(rename = "use-serialized-settings")]
    pub use_serialized_settings: bool,
    #[serde(rename = "virtualizer-enable")]
    pub virtualizer_enable: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            override_virtualizer_settings: false,
            profile: "off".to_string(),
            use_serialized_settings: true,
            virtualizer_enable: false,
        }
    }
}

/// Serialized blobs for one sample rate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializedEntry {
    #[serde(rename = "virt-disable")]
    pub virt_disable: String,
    #[serde(rename = "virt-enable")]
    pub virt_enable: String,
}

/// Serialized renderer state, keyed by sample rate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializedSettings {
    #[serde(rename = "sr-32000")]
    pub sr_32000: SerializedEntry,
    #[serde(rename = "sr-44100")]
    pub sr_44100: SerializedEntry,
    #[serde(rename = "sr-48000")]
    pub sr_48000: SerializedEntry,
}

impl SerializedSettings {
    /// Mutable slot for a sample rate, if it is one of the required three
    pub fn entry_mut(&mut self, sample_rate: u32) -> Option<&mut SerializedEntry> {
        match sample_rate {
            32000 => Some(&mut self.sr_32000),
            44100 => Some(&mut self.sr_44100),
            48000 => Some(&mut self.sr_48000),
            _ => None,
        }
    }
}

/// Speaker virtualizer overrides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VirtualizerSettings {
    #[serde(rename = "front-speaker-angle")]
    pub front_speaker_angle: i64,
    #[serde(rename = "height-filter-enable")]
    pub height_filter_enable: bool,
    #[serde(rename = "height-speaker-angle")]
    pub height_speaker_angle: i64,
    #[serde(rename = "rear-height-speaker-angle")]
    pub rear_height_speaker_angle: i64,
    #[serde(rename = "rear-surround-speaker-angle")]
    pub rear_surround_speaker_angle: i64,
    #[serde(rename = "surround-speaker-angle")]
    pub surround_speaker_angle: i64,
}

/// System gain section, filled from the selected profile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GainSettings {
    pub postgain: i64,
    pub pregain: i64,
    #[serde(rename = "system-gain")]
    pub system_gain: i64,
}

/// Structured renderer configuration derived from a tuning export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningDocument {
    #[serde(rename = "gain-settings")]
    pub gain_settings: GainSettings,
    pub global: GlobalSettings,
    pub profiles: BTreeMap<String, ProfileSettings>,
    #[serde(rename = "serialized-settings")]
    pub serialized_settings: SerializedSettings,
    #[serde(rename = "virtualizer-settings")]
    pub virtualizer_settings: VirtualizerSettings,
}

impl Default for TuningDocument {
    fn default() -> Self {
        Self {
            gain_settings: GainSettings::default(),
            global: GlobalSettings::default(),
            profiles: BTreeMap::new(),
            serialized_settings: SerializedSettings::default(),
            virtualizer_settings: VirtualizerSettings::default(),
        }
    }
}

impl TuningDocument {
    /// Serialize to the JSON form the renderer consumes
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Fresh default parameter set for one profile.
///
/// Every profile in a converted document starts from these values; the
/// XML overlay then replaces whatever the export mentions.
pub fn default_profile() -> ProfileSettings {
    let mut p = ProfileSettings::new();
    p.insert("bass-enhancer-enable".into(), ProfileValue::Bool(false));
    p.insert("bass-enhancer-boost".into(), ProfileValue::Int(0));
    p.insert(
        "bass-enhancer-cutoff-frequency".into(),
        ProfileValue::Int(200),
    );
    p.insert("bass-enhancer-width".into(), ProfileValue::Int(16));
    p.insert("calibration-boost".into(), ProfileValue::Int(0));
    p.insert("dialog-enhancer-enable".into(), ProfileValue::Bool(false));
    p.insert("dialog-enhancer-amount".into(), ProfileValue::Int(0));
    p.insert("dialog-enhancer-ducking".into(), ProfileValue::Int(0));
    p.insert("graphic-equalizer-enable".into(), ProfileValue::Int(0));
    p.insert(
        "graphic-equalizer-bands".into(),
        ProfileValue::Array(BANDS_DEFAULT.to_vec()),
    );
    p.insert(
        "graphic-equalizer-gains".into(),
        ProfileValue::Array(vec![0; 20]),
    );
    p.insert("ieq-enable".into(), ProfileValue::Bool(false));
    p.insert("ieq-amount".into(), ProfileValue::Int(0));
    p.insert(
        "ieq-bands".into(),
        ProfileValue::Array(BANDS_DEFAULT.to_vec()),
    );
    p.insert(
        "ieq-gains".into(),
        ProfileValue::Array(IEQ_GAINS_DEFAULT.to_vec()),
    );
    p.insert(
        "mi-dialog-enhancer-steering-enable".into(),
        ProfileValue::Bool(false),
    );
    p.insert(
        "mi-dv-leveler-steering-enable".into(),
        ProfileValue::Bool(false),
    );
    p.insert("mi-ieq-steering-enable".into(), ProfileValue::Bool(false));
    p.insert(
        "mi-surround-compressor-steering-enable".into(),
        ProfileValue::Bool(false),
    );
    p.insert("surround-boost".into(), ProfileValue::Int(0));
    p.insert(
        "surround-decoder-center-spreading-enable".into(),
        ProfileValue::Int(0),
    );
    p.insert("surround-decoder-enable".into(), ProfileValue::Bool(true));
    p.insert("volmax-boost".into(), ProfileValue::Int(0));
    p.insert("volume-leveler-enable".into(), ProfileValue::Bool(false));
    p.insert("volume-leveler-amount".into(), ProfileValue::Int(0));
    p.insert("volume-leveler-in-target".into(), ProfileValue::Int(-496));
    p.insert("volume-leveler-out-target".into(), ProfileValue::Int(-320));
    p
}
