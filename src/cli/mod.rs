//! CLI Module
//!
//! Command-line interface for the home-audio processing frontend.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Home-audio frontend: decode, render, and calibrate object audio
#[derive(Parser, Debug)]
#[command(name = "home-audio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble and run a processing pipeline
    #[command(name = "run")]
    Run(Box<RunArgs>),

    /// Convert a tuning-tool XML export to a renderer JSON configuration
    #[command(name = "convert")]
    Convert {
        /// Input XML tuning export
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Endpoint name (required when the export has more than one)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Enable the speaker virtualizer in the global section
        #[arg(long)]
        virtualizer: bool,

        /// Profile whose gains go into the gain section
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List the endpoints present in a tuning-tool XML export
    #[command(name = "endpoints")]
    Endpoints {
        /// Input XML tuning export
        input: PathBuf,
    },
}

/// Arguments for the `run` subcommand
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input file (.wav, .ac3, .ec3, .mp4, or probed from content)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output WAV file name
    #[arg(short, long, conflicts_with = "playback")]
    pub output: Option<PathBuf>,

    /// Play back on a device instead of writing a file
    #[arg(short, long, value_name = "DEVICE_ID")]
    pub playback: Option<String>,

    /// Colon-separated speaker list, e.g. lr:c:lfe:lrs:lre
    #[arg(short, long)]
    pub speakers: Option<String>,

    /// DRC options, e.g. mode=enable:x=0.5:y=0.5
    #[arg(long)]
    pub drc: Option<String>,

    /// Enable the speaker virtualizer
    #[arg(long)]
    pub virtualizer: bool,

    /// Content profile
    #[arg(long = "profile", default_value = "off", conflicts_with = "content_gain")]
    pub profile: String,

    /// Linear gain bringing the input to system level [0.0 - 10.0]
    #[arg(long = "content-gain", default_value_t = 1.0)]
    pub content_gain: f64,

    /// Linear user gain applied internally [0.0 - 10.0]
    #[arg(long = "internal-gain", default_value_t = 1.0)]
    pub internal_gain: f64,

    /// Linear gain applied by downstream external processing [0.0 - 10.0]
    #[arg(long = "external-gain", default_value_t = 1.0, conflicts_with = "external_gain_by_step")]
    pub external_gain: f64,

    /// Volume-step index alternative to --external-gain
    #[arg(long = "external-gain-by-step")]
    pub external_gain_by_step: Option<i64>,

    /// Gain interpolation mode
    #[arg(long = "interp-mode", default_value = "offline")]
    pub interp_mode: String,

    /// Enable upmixing
    #[arg(short, long)]
    pub upmix: bool,

    /// Comma-separated list of active channel indices, e.g. 0,1,2
    #[arg(short, long = "active-channels")]
    pub active_channels: Option<String>,

    /// Renderer JSON configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Directory with the native processing plugins
    #[arg(long = "plugin-path", default_value = "../lib/plugins")]
    pub plugin_path: PathBuf,

    /// Write a DOT graph dump to this file after the run
    #[arg(long = "pipeline-graph")]
    pub pipeline_graph: Option<PathBuf>,
}
