//! home-audio - Format-adaptive pipeline assembly for object audio
//!
//! This crate is the control layer in front of a set of opaque native
//! processing elements (decoder, renderer, virtualizer). It decides what
//! to build and how to configure it:
//!
//! - `layout` validates speaker specifications into channel layouts
//! - `mode` selects and corrects the decoder output mode
//! - `tuning` converts legacy tuning-tool exports to renderer configs
//! - `graph` models and assembles the processing graph
//! - `pipeline` runs an assembled graph to completion
//!
//! The decoding and rendering themselves happen inside the native
//! elements, reached through the declarative construction interface in
//! `graph` and the notification bus in `graph::bus`.

pub mod cli;
pub mod error;
pub mod graph;
pub mod layout;
pub mod mode;
pub mod pipeline;
pub mod settings;
pub mod tuning;

pub use error::{HomeAudioError, Result};
pub use layout::{ChannelLayout, SpeakerSpec};
pub use mode::DecoderMode;
pub use settings::PipelineSettings;
pub use tuning::TuningDocument;
