//! Integration Tests
//!
//! End-to-end tests for the home-audio assembly and control path, using
//! scripted buses and in-memory capability providers in place of the
//! native execution context.

use std::fs;

use pretty_assertions::assert_eq;

use home_audio::cli::commands::run_pipeline;
use home_audio::graph::assembler::{GraphAssembler, Platform};
use home_audio::graph::bus::{BusMessage, ElementMessage, MessageValue, ScriptedBus};
use home_audio::graph::registry::StaticProvider;
use home_audio::graph::{ElementKind, ProbeState, PropertyValue};
use home_audio::mode::DecoderMode;
use home_audio::settings::{OutputTarget, PipelineSettings};
use home_audio::{SpeakerSpec, TuningDocument};

fn file_settings(input: &str) -> PipelineSettings {
    PipelineSettings::new(input, OutputTarget::File("out.wav".into()))
}

// === Layout to graph ===

#[test]
fn test_artistic_mix_path_end_to_end() {
    // 5.1 speaker spec: six channels, one LFE, no heights
    let layout = SpeakerSpec::parse("lr:c:lfe:lrs")
        .unwrap()
        .resolve()
        .unwrap();
    assert_eq!(layout.channels(), 6);
    assert_eq!(layout.lfe_count(), 1);
    assert_eq!(layout.height_count(), 0);
    assert_eq!(layout.floor_channels(), 5);

    let mut settings = file_settings("in.ec3");
    settings.speaker_layout = Some(layout);

    let mut assembler = GraphAssembler::new(settings).with_platform(Platform::Linux);
    assert_eq!(assembler.decoder_mode(), DecoderMode::Core);

    let mut provider = StaticProvider::complete();
    let graph = assembler.build(&mut provider).unwrap();

    let dec = graph.find(ElementKind::DecodeBin).unwrap();
    assert_eq!(
        graph.node(dec).property("out-mode"),
        Some(&PropertyValue::Int(DecoderMode::Core.code()))
    );
}

// === Runtime mode correction ===

#[test]
fn test_serialized_config_corrects_raw_to_core() {
    // No speaker layout: initial decision is raw
    let settings = file_settings("in.ec3");
    let mut assembler = GraphAssembler::new(settings).with_platform(Platform::Linux);
    assert_eq!(assembler.decoder_mode(), DecoderMode::Raw);

    let mut provider = StaticProvider::complete();
    let mut graph = assembler.build(&mut provider).unwrap();

    // The renderer reports a 2.0 processing format after loading its
    // serialized configuration
    let mut element_bus = ScriptedBus::new([BusMessage::Element(
        ElementMessage::new("processing-info")
            .with_field("processing-format", MessageValue::UInt(0x3)),
    )]);
    assembler
        .apply_config_notification(&mut graph, &mut element_bus)
        .unwrap();

    assert_eq!(assembler.decoder_mode(), DecoderMode::Core);
    let dec = graph.find(ElementKind::DecodeBin).unwrap();
    assert_eq!(
        graph.node(dec).property("out-mode"),
        Some(&PropertyValue::Int(22))
    );
}

#[test]
fn test_empty_element_bus_keeps_initial_mode() {
    let settings = file_settings("in.ec3");
    let mut assembler = GraphAssembler::new(settings).with_platform(Platform::Linux);
    let mut provider = StaticProvider::complete();
    let mut graph = assembler.build(&mut provider).unwrap();

    let mut element_bus = ScriptedBus::default();
    assembler
        .apply_config_notification(&mut graph, &mut element_bus)
        .unwrap();
    assert_eq!(assembler.decoder_mode(), DecoderMode::Raw);
}

// === Incremental assembly through the controller ===

#[test]
fn test_container_input_extends_and_completes() {
    let settings = file_settings("movie.mp4");
    let mut provider = StaticProvider::complete();

    let mut assembler = GraphAssembler::new(settings).with_platform(Platform::Linux);
    let mut graph = assembler.build(&mut provider).unwrap();
    assert_eq!(graph.probe_state(), &ProbeState::Unresolved);

    let mut element_bus = ScriptedBus::default();
    assembler
        .apply_config_notification(&mut graph, &mut element_bus)
        .unwrap();

    let mut controller = home_audio::pipeline::PipelineController::new(assembler, graph);
    let mut pipeline_bus = ScriptedBus::new([
        BusMessage::TypeFound {
            media_type: "video/quicktime, variant=iso".to_string(),
        },
        // A second probe event must be a no-op
        BusMessage::TypeFound {
            media_type: "video/quicktime, variant=iso".to_string(),
        },
        BusMessage::Eos,
    ]);
    controller.run(&mut pipeline_bus).unwrap();

    let graph = controller.graph();
    let demuxers = graph
        .nodes()
        .iter()
        .filter(|n| n.kind() == ElementKind::Demuxer)
        .count();
    let renderers = graph
        .nodes()
        .iter()
        .filter(|n| n.kind() == ElementKind::Renderer)
        .count();
    assert_eq!(demuxers, 1);
    assert_eq!(renderers, 1);
    assert!(graph.find(ElementKind::FileSink).is_some());
}

#[test]
fn test_unsupported_probe_type_fails_run() {
    let settings = file_settings("input.bin");
    let mut provider = StaticProvider::complete();
    let mut element_bus = ScriptedBus::default();
    let mut pipeline_bus = ScriptedBus::new([BusMessage::TypeFound {
        media_type: "application/x-tar".to_string(),
    }]);

    let err = run_pipeline(
        settings,
        &mut provider,
        &mut element_bus,
        &mut pipeline_bus,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
}

#[test]
fn test_run_pipeline_eos_is_clean() {
    let settings = file_settings("in.ec3");
    let mut provider = StaticProvider::complete();
    let mut element_bus = ScriptedBus::default();
    let mut pipeline_bus = ScriptedBus::new([BusMessage::Eos]);

    run_pipeline(
        settings,
        &mut provider,
        &mut element_bus,
        &mut pipeline_bus,
    )
    .unwrap();
}

#[test]
fn test_missing_capabilities_abort_before_graph_work() {
    let settings = file_settings("in.ec3");
    let mut provider = StaticProvider::with_loadable(["renderer"]);
    let mut element_bus = ScriptedBus::default();
    let mut pipeline_bus = ScriptedBus::new([BusMessage::Eos]);

    let err = run_pipeline(
        settings,
        &mut provider,
        &mut element_bus,
        &mut pipeline_bus,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "PLUGIN_UNAVAILABLE");
}

// === Graph dump ===

#[test]
fn test_graph_dump_written_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("pipeline.dot");

    let mut settings = file_settings("in.ec3");
    settings.graph_dump = Some(dump.clone());

    let mut provider = StaticProvider::complete();
    let mut element_bus = ScriptedBus::default();
    let mut pipeline_bus = ScriptedBus::new([BusMessage::Eos]);
    run_pipeline(
        settings,
        &mut provider,
        &mut element_bus,
        &mut pipeline_bus,
    )
    .unwrap();

    let dot = fs::read_to_string(&dump).unwrap();
    assert!(dot.starts_with("digraph pipeline {"));
    assert!(dot.contains("file-src (filesrc)"));
    assert!(dot.contains("->"));
}

// === Tuning conversion through the CLI surface ===

const TUNING_EXPORT: &str = r#"<tuning-export>
    <endpoint type="soundbar">
        <serialized-configs>
            <serialized-config sample_rate="32000" virtualizer_enabled="0" base64="MzJk"/>
            <serialized-config sample_rate="32000" virtualizer_enabled="1" base64="MzJl"/>
            <serialized-config sample_rate="44100" virtualizer_enabled="0" base64="NDRk"/>
            <serialized-config sample_rate="44100" virtualizer_enabled="1" base64="NDRl"/>
            <serialized-config sample_rate="48000" virtualizer_enabled="0" base64="NDhk"/>
            <serialized-config sample_rate="48000" virtualizer_enabled="1" base64="NDhl"/>
        </serialized-configs>
        <profile type="movie">
            <tuning>
                <surround-boost value="96"/>
                <pregain value="-64"/>
            </tuning>
        </profile>
    </endpoint>
</tuning-export>"#;

#[test]
fn test_convert_command_writes_stable_document() {
    let dir = tempfile::tempdir().unwrap();
    let xml_path = dir.path().join("tuning.xml");
    let json_path = dir.path().join("config.json");
    fs::write(&xml_path, TUNING_EXPORT).unwrap();

    home_audio::cli::commands::convert(&xml_path, &json_path, None, true, Some("movie")).unwrap();

    let json = fs::read_to_string(&json_path).unwrap();
    let doc: TuningDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(doc.global.profile, "movie");
    assert!(doc.global.virtualizer_enable);
    assert_eq!(doc.gain_settings.pregain, -64);
    assert_eq!(doc.serialized_settings.sr_48000.virt_enable, "NDhl");

    // Re-serializing reproduces the written file byte for byte
    assert_eq!(doc.to_json().unwrap(), json);
}
