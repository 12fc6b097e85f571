//! Error handling for home-audio
//!
//! Every failure in this crate is terminal for the current invocation:
//! configuration and validation problems are reported before any graph
//! work begins, capability problems abort before the graph starts, and
//! runtime problems trigger an orderly shutdown instead of a retry.

use thiserror::Error;

/// Result type alias for home-audio operations
pub type Result<T> = std::result::Result<T, HomeAudioError>;

/// Main error type for home-audio operations
#[derive(Error, Debug)]
pub enum HomeAudioError {
    // Settings / CLI-level errors
    #[error("Invalid settings: {reason}")]
    InvalidSettings { reason: String },

    // Speaker layout errors
    #[error("Invalid speaker layout: {reason}")]
    InvalidLayout { reason: String },

    // Tuning conversion errors
    #[error("Endpoint not found in tuning export: {name}")]
    MissingEndpoint { name: String },

    #[error("Tuning export contains {count} endpoints; an endpoint name must be specified")]
    AmbiguousEndpoint { count: usize },

    #[error("Missing serialized config for {sample_rate} Hz in endpoint '{endpoint}'")]
    MissingSampleRate { sample_rate: u32, endpoint: String },

    #[error("Unknown preset: {preset}")]
    UnknownPreset { preset: String },

    #[error("Profile '{profile}' not present in endpoint '{endpoint}'")]
    UnknownProfile { profile: String, endpoint: String },

    #[error("Malformed tuning export: {reason}")]
    MalformedTuning { reason: String },

    // Capability errors
    #[error("Required capability '{capability}' is not registered and could not be loaded from {search_path}")]
    PluginUnavailable {
        capability: String,
        search_path: String,
    },

    // Graph assembly / runtime errors
    #[error("Unsupported input format: {media_type}")]
    UnsupportedFormat { media_type: String },

    #[error("Playback is not supported on this platform: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("Malformed element notification: {reason}")]
    MalformedNotification { reason: String },

    #[error("Graph error from {source_name}: {message}")]
    Graph {
        source_name: String,
        message: String,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl HomeAudioError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            HomeAudioError::InvalidSettings { .. } => "INVALID_SETTINGS",
            HomeAudioError::InvalidLayout { .. } => "INVALID_LAYOUT",
            HomeAudioError::MissingEndpoint { .. } => "MISSING_ENDPOINT",
            HomeAudioError::AmbiguousEndpoint { .. } => "AMBIGUOUS_ENDPOINT",
            HomeAudioError::MissingSampleRate { .. } => "MISSING_SAMPLE_RATE",
            HomeAudioError::UnknownPreset { .. } => "UNKNOWN_PRESET",
            HomeAudioError::UnknownProfile { .. } => "UNKNOWN_PROFILE",
            HomeAudioError::MalformedTuning { .. } => "MALFORMED_TUNING",
            HomeAudioError::PluginUnavailable { .. } => "PLUGIN_UNAVAILABLE",
            HomeAudioError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            HomeAudioError::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM",
            HomeAudioError::MalformedNotification { .. } => "MALFORMED_NOTIFICATION",
            HomeAudioError::Graph { .. } => "GRAPH_ERROR",
            HomeAudioError::Io(_) => "IO_ERROR",
            HomeAudioError::Serialization(_) => "SERIALIZATION_ERROR",
            HomeAudioError::Xml(_) => "XML_ERROR",
        }
    }

    /// True for errors raised before any graph work begins
    pub fn is_pre_flight(&self) -> bool {
        !matches!(
            self,
            HomeAudioError::Graph { .. }
                | HomeAudioError::UnsupportedFormat { .. }
                | HomeAudioError::UnsupportedPlatform { .. }
        )
    }
}
