//! CLI command implementations
//!
//! Validates command-line arguments into [`PipelineSettings`], then wires
//! the assembler, capability registry, and controller together. The
//! native execution context is the external collaborator here: it owns
//! the buses that feed notifications into the run loop.

use std::fs;
use std::path::Path;

use log::info;

use crate::cli::RunArgs;
use crate::error::{HomeAudioError, Result};
use crate::graph::assembler::GraphAssembler;
use crate::graph::bus::MessageBus;
use crate::graph::registry::{CapabilityProvider, FsRegistry};
use crate::layout::SpeakerSpec;
use crate::pipeline::PipelineController;
use crate::settings::{
    parse_active_channels, validate_gain, ContentProfile, DrcSettings, InterpMode, OutputTarget,
    PipelineSettings,
};
use crate::tuning;

/// Build validated pipeline settings from `run` arguments
pub fn settings_from_args(args: &RunArgs) -> Result<PipelineSettings> {
    if !args.input.is_file() {
        return Err(HomeAudioError::InvalidSettings {
            reason: format!("cannot open input file: {}", args.input.display()),
        });
    }
    if let Some(config) = &args.config {
        if !config.is_file() {
            return Err(HomeAudioError::InvalidSettings {
                reason: format!("cannot open configuration file: {}", config.display()),
            });
        }
    }

    let output = match (&args.output, &args.playback) {
        (_, Some(device)) => OutputTarget::Playback(device.clone()),
        (Some(path), None) => OutputTarget::File(path.clone()),
        (None, None) => OutputTarget::File("out.wav".into()),
    };

    let mut settings = PipelineSettings::new(&args.input, output);

    if let Some(speakers) = &args.speakers {
        settings.speaker_layout = Some(SpeakerSpec::parse(speakers)?.resolve()?);
    }
    if let Some(drc) = &args.drc {
        settings.drc = DrcSettings::parse(drc)?;
    }
    if let Some(channels) = &args.active_channels {
        settings.active_channels = Some(parse_active_channels(channels)?);
    }

    settings.virtualizer_enable = args.virtualizer;
    settings.profile = ContentProfile::parse(&args.profile)?;
    settings.content_gain = validate_gain(args.content_gain, "content gain")?;
    settings.internal_gain = validate_gain(args.internal_gain, "internal gain")?;
    settings.external_gain = validate_gain(args.external_gain, "external gain")?;
    settings.external_gain_by_step = args.external_gain_by_step.unwrap_or(-1);
    settings.interp_mode = InterpMode::parse(&args.interp_mode)?;
    settings.upmix = args.upmix;
    settings.renderer_config = args.config.clone();
    settings.plugin_path = args.plugin_path.clone();
    settings.graph_dump = args.pipeline_graph.clone();

    Ok(settings)
}

/// Assemble the pipeline and run it to completion.
///
/// `element_bus` carries the renderer's configuration notification,
/// polled once before start; `pipeline_bus` feeds the run loop.
pub fn run_pipeline(
    settings: PipelineSettings,
    provider: &mut dyn CapabilityProvider,
    element_bus: &mut dyn MessageBus,
    pipeline_bus: &mut dyn MessageBus,
) -> Result<()> {
    let mut assembler = GraphAssembler::new(settings);
    let mut graph = assembler.build(provider)?;

    // Runtime mode correction happens strictly before start
    assembler.apply_config_notification(&mut graph, element_bus)?;

    let mut controller = PipelineController::new(assembler, graph);
    let result = controller.run(pipeline_bus);
    controller.dump_if_requested();
    result
}

/// `run` command: validate arguments, then assemble and run
pub fn run(args: &RunArgs) -> Result<()> {
    let settings = settings_from_args(args)?;
    let mut provider = FsRegistry::new();

    // Notification buses are owned by the native execution context; a
    // closed bus ends the run immediately.
    let mut element_bus = crate::graph::bus::ScriptedBus::default();
    let mut pipeline_bus = crate::graph::bus::ScriptedBus::default();

    run_pipeline(
        settings,
        &mut provider,
        &mut element_bus,
        &mut pipeline_bus,
    )
}

/// `convert` command: tuning XML export to renderer JSON configuration
pub fn convert(
    input: &Path,
    output: &Path,
    endpoint: Option<&str>,
    virtualizer: bool,
    profile: Option<&str>,
) -> Result<()> {
    let xml = fs::read_to_string(input)?;
    let document = tuning::convert(&xml, endpoint, virtualizer, profile)?;
    fs::write(output, document.to_json()?)?;
    info!(
        "converted {} to {}",
        input.display(),
        output.display()
    );
    Ok(())
}

/// `endpoints` command: print the endpoint names in an export
pub fn list_endpoints(input: &Path) -> Result<()> {
    let xml = fs::read_to_string(input)?;
    for endpoint in tuning::list_endpoints(&xml)? {
        println!("{}", endpoint);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn run_args(input: PathBuf) -> RunArgs {
        RunArgs {
            input,
            output: None,
            playback: None,
            speakers: None,
            drc: None,
            virtualizer: false,
            profile: "off".to_string(),
            content_gain: 1.0,
            internal_gain: 1.0,
            external_gain: 1.0,
            external_gain_by_step: None,
            interp_mode: "offline".to_string(),
            upmix: false,
            active_channels: None,
            config: None,
            plugin_path: PathBuf::from("../lib/plugins"),
            pipeline_graph: None,
        }
    }

    fn temp_input(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"\x0b\x77").unwrap();
        (dir, path)
    }

    #[test]
    fn settings_default_to_file_output() {
        let (_dir, input) = temp_input("in.ec3");
        let settings = settings_from_args(&run_args(input)).unwrap();
        assert_eq!(settings.output, OutputTarget::File("out.wav".into()));
    }

    #[test]
    fn missing_input_is_invalid() {
        let err = settings_from_args(&run_args(PathBuf::from("/no/such/file.ec3"))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTINGS");
    }

    #[test]
    fn speaker_spec_is_resolved_into_settings() {
        let (_dir, input) = temp_input("in.ec3");
        let mut args = run_args(input);
        args.speakers = Some("lr:c:lfe:lrs".to_string());
        let settings = settings_from_args(&args).unwrap();
        let layout = settings.speaker_layout.unwrap();
        assert_eq!(layout.channels(), 6);
        assert_eq!(layout.lfe_count(), 1);
    }

    #[test]
    fn invalid_speaker_spec_propagates() {
        let (_dir, input) = temp_input("in.ec3");
        let mut args = run_args(input);
        args.speakers = Some("c".to_string());
        let err = settings_from_args(&args).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_LAYOUT");
    }

    #[test]
    fn out_of_range_gain_is_invalid() {
        let (_dir, input) = temp_input("in.ec3");
        let mut args = run_args(input);
        args.content_gain = 11.0;
        let err = settings_from_args(&args).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTINGS");
    }

    #[test]
    fn playback_target_wins_over_default_output() {
        let (_dir, input) = temp_input("in.ec3");
        let mut args = run_args(input);
        args.playback = Some("hdmi:0".to_string());
        let settings = settings_from_args(&args).unwrap();
        assert_eq!(
            settings.output,
            OutputTarget::Playback("hdmi:0".to_string())
        );
    }
}
