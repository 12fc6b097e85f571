//! Graph assembly
//!
//! Builds the processing graph from [`PipelineSettings`]. When the input
//! type is known from the file extension the whole chain is wired in one
//! pass. Otherwise only a source and a type probe are wired up front and
//! the rest of the chain is appended by the one-shot probe resolution,
//! which selects a decode-chain variant, the renderer, and the output
//! chain from the detected media type.

use std::path::Path;

use log::{debug, info};

use crate::error::{HomeAudioError, Result};
use crate::graph::bus::{BusMessage, MessageBus};
use crate::graph::registry::{ensure_capabilities, CapabilityProvider};
use crate::graph::{ElementKind, Graph, NodeId, ProbeState, PropertyValue};
use crate::mode::{self, DecoderMode};
use crate::settings::{
    profile_content_gain, InputKind, OutputTarget, PipelineSettings,
};

/// Media types identifying a compressed Dolby bitstream
const BITSTREAM_TYPES: [&str; 5] = [
    "audio/x-ac3",
    "audio/x-eac3",
    "audio/ac3",
    "audio/eac3",
    "audio/x-private1-ac3",
];

/// Host platform for live playback output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            other => Platform::Other(other.to_string()),
        }
    }

    fn name(&self) -> String {
        match self {
            Platform::Linux => "linux".to_string(),
            Platform::Windows => "windows".to_string(),
            Platform::MacOs => "macos".to_string(),
            Platform::Other(name) => name.clone(),
        }
    }
}

/// Decode-chain variant selected by the type probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectedType {
    /// Container format wrapping a compressed stream
    Container,
    /// Raw compressed bitstream
    Bitstream,
    /// Uncompressed PCM
    Pcm,
}

impl DetectedType {
    fn classify(media_type: &str) -> Option<Self> {
        if media_type.contains("video/quicktime") {
            Some(DetectedType::Container)
        } else if BITSTREAM_TYPES.contains(&media_type) {
            Some(DetectedType::Bitstream)
        } else if media_type == "audio/x-wav" {
            Some(DetectedType::Pcm)
        } else {
            None
        }
    }

    /// Content mastered for a calibrated system: bitstream or container
    fn is_mastered(self) -> bool {
        matches!(self, DetectedType::Container | DetectedType::Bitstream)
    }
}

/// Assembles and incrementally extends one processing graph
pub struct GraphAssembler {
    settings: PipelineSettings,
    platform: Platform,
    mode: DecoderMode,
    decoder: Option<NodeId>,
    started: bool,
}

impl GraphAssembler {
    pub fn new(settings: PipelineSettings) -> Self {
        let mode = mode::initial_mode(
            settings.speaker_layout.as_ref(),
            settings.virtualizer_enable,
        );
        Self {
            settings,
            platform: Platform::current(),
            mode,
            decoder: None,
            started: false,
        }
    }

    /// Override the playback platform (tests)
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Current decoder output mode decision
    pub fn decoder_mode(&self) -> DecoderMode {
        self.mode
    }

    /// Build the graph for the configured input.
    ///
    /// Verifies the required native capabilities first, loading them from
    /// the plugin search path if necessary.
    pub fn build(&mut self, provider: &mut dyn CapabilityProvider) -> Result<Graph> {
        ensure_capabilities(provider, &self.settings.plugin_path)?;

        match self.settings.input_kind() {
            InputKind::Pcm => self.build_eager(false),
            InputKind::Bitstream => self.build_eager(true),
            InputKind::Probe => self.build_lazy(),
        }
    }

    /// Full chain in one pass: the input type is already known.
    fn build_eager(&mut self, bitstream: bool) -> Result<Graph> {
        let mut graph = Graph::new();

        let src = self.add_source(&mut graph);
        let dec = graph.add(ElementKind::DecodeBin, "dec-bin");
        self.apply_decoder_properties(&mut graph, dec);
        self.decoder = Some(dec);

        let renderer = self.add_renderer(&mut graph, bitstream);
        graph.link(src, dec)?;
        graph.link(dec, renderer)?;

        let mut upstream = renderer;
        if let Some(layout) = &self.settings.speaker_layout {
            let caps = graph.add(ElementKind::CapsFilter, "caps-filter");
            graph.set_property(caps, "caps", PropertyValue::Str(layout.caps_string()));
            graph.link(renderer, caps)?;
            upstream = caps;
        }

        self.append_output_chain(&mut graph, upstream)?;

        // No probe in this graph; record the static resolution
        let media_type = if bitstream { "bitstream" } else { "pcm" };
        graph.set_probe_state(ProbeState::Resolved(media_type.to_string()));

        info!("assembled eager graph for {} input", media_type);
        Ok(graph)
    }

    /// Minimal prefix: the type probe appends the rest once it resolves.
    fn build_lazy(&mut self) -> Result<Graph> {
        let mut graph = Graph::new();
        let src = self.add_source(&mut graph);
        let probe = graph.add(ElementKind::TypeFind, "typefind");
        graph.link(src, probe)?;
        info!("assembled probe prefix; waiting for type resolution");
        Ok(graph)
    }

    /// Bounded, non-blocking check for a renderer configuration
    /// notification. When the serialized configuration reports a 2.0 or
    /// 5.1 processing format the decoder is switched to core mode. Must
    /// run before the graph is started; the mode is frozen afterwards.
    pub fn apply_config_notification(
        &mut self,
        graph: &mut Graph,
        element_bus: &mut dyn MessageBus,
    ) -> Result<()> {
        debug_assert!(!self.started, "mode correction after start");

        let msg = match element_bus.poll() {
            Some(BusMessage::Element(msg)) => msg,
            _ => return Ok(()),
        };

        if let Some(corrected) = mode::corrected_mode(&msg)? {
            info!(
                "serialized configuration forces decoder mode {:?}",
                corrected
            );
            self.mode = corrected;
            if let Some(dec) = self.decoder {
                graph.set_property(dec, "out-mode", PropertyValue::Int(corrected.code()));
            }
        }
        Ok(())
    }

    /// Mark the graph as started; the decoder mode is frozen from here.
    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    /// One-shot reaction to the probe's type resolution: append the
    /// matching decode chain, the renderer, and the output chain, link
    /// everything, and sync the new nodes most-downstream first.
    pub fn resolve_type(&mut self, graph: &mut Graph, media_type: &str) -> Result<()> {
        match graph.probe_state() {
            ProbeState::Unresolved => {}
            resolved => {
                debug!("ignoring duplicate type resolution ({:?})", resolved);
                return Ok(());
            }
        }

        let detected = match DetectedType::classify(media_type) {
            Some(detected) => detected,
            None => {
                graph.set_probe_state(ProbeState::Failed(media_type.to_string()));
                return Err(HomeAudioError::UnsupportedFormat {
                    media_type: media_type.to_string(),
                });
            }
        };

        let probe = graph
            .find(ElementKind::TypeFind)
            .ok_or_else(|| HomeAudioError::Graph {
                source_name: "assembler".to_string(),
                message: "type resolution on a graph without a probe".to_string(),
            })?;

        let mut appended: Vec<NodeId> = Vec::new();

        // Decode chain variant
        let chain_tail = match detected {
            DetectedType::Container => {
                let demux = graph.add(ElementKind::Demuxer, "demux");
                let parser = graph.add(ElementKind::BitstreamParser, "ac3-parser");
                let dec = graph.add(ElementKind::Decoder, "ac3-dec");
                self.apply_decoder_properties(graph, dec);
                self.decoder = Some(dec);
                graph.link(probe, demux)?;
                graph.link(demux, parser)?;
                graph.link(parser, dec)?;
                appended.extend([demux, parser, dec]);
                dec
            }
            DetectedType::Bitstream => {
                let parser = graph.add(ElementKind::BitstreamParser, "ac3-parser");
                let dec = graph.add(ElementKind::Decoder, "ac3-dec");
                self.apply_decoder_properties(graph, dec);
                self.decoder = Some(dec);
                graph.link(probe, parser)?;
                graph.link(parser, dec)?;
                appended.extend([parser, dec]);
                dec
            }
            DetectedType::Pcm => {
                let dec = graph.add(ElementKind::GenericDecode, "dec-bin");
                let convert = graph.add(ElementKind::AudioConvert, "convert");
                let resample = graph.add(ElementKind::Resampler, "resample");
                graph.link(probe, dec)?;
                graph.link(dec, convert)?;
                graph.link(convert, resample)?;
                appended.extend([dec, convert, resample]);
                resample
            }
        };

        // Renderer, with the per-content profile gain override
        let renderer = self.add_renderer(graph, detected.is_mastered());
        if let Some(name) = self.settings.profile.gain_table_name(detected.is_mastered()) {
            if let Some(gain) = profile_content_gain(name) {
                graph.set_property(
                    renderer,
                    "content-normalization-gain",
                    PropertyValue::Float(gain),
                );
            }
        }
        graph.link(chain_tail, renderer)?;
        appended.push(renderer);

        appended.extend(self.append_output_chain(graph, renderer)?);

        // Newly added nodes join the running graph most-downstream first
        for id in appended.iter().rev() {
            graph.sync_state(*id);
        }

        graph.set_probe_state(ProbeState::Resolved(media_type.to_string()));
        info!("type probe resolved to {}; graph extended", media_type);
        Ok(())
    }

    fn add_source(&self, graph: &mut Graph) -> NodeId {
        let src = graph.add(ElementKind::FileSource, "file-src");
        graph.set_property(
            src,
            "location",
            PropertyValue::Str(self.settings.input.display().to_string()),
        );
        src
    }

    fn apply_decoder_properties(&self, graph: &mut Graph, dec: NodeId) {
        graph.set_property(dec, "out-mode", PropertyValue::Int(self.mode.code()));
        graph.set_property(
            dec,
            "drc-mode",
            PropertyValue::Int(self.settings.drc.mode as i64),
        );
        graph.set_property(dec, "drc-cut", PropertyValue::Float(self.settings.drc.cut));
        graph.set_property(
            dec,
            "drc-boost",
            PropertyValue::Float(self.settings.drc.boost),
        );
    }

    fn add_renderer(&self, graph: &mut Graph, mastered_content: bool) -> NodeId {
        let settings = &self.settings;
        let renderer = graph.add(ElementKind::Renderer, "renderer");

        graph.set_property(renderer, "force-order", PropertyValue::Bool(mastered_content));
        graph.set_property(
            renderer,
            "content-normalization-gain",
            PropertyValue::Float(settings.content_gain),
        );
        graph.set_property(
            renderer,
            "internal-user-gain",
            PropertyValue::Float(settings.internal_gain),
        );
        if settings.external_gain_by_step >= 0 {
            graph.set_property(
                renderer,
                "external-user-gain-by-step",
                PropertyValue::Int(settings.external_gain_by_step),
            );
        } else {
            graph.set_property(
                renderer,
                "external-user-gain",
                PropertyValue::Float(settings.external_gain),
            );
        }
        graph.set_property(
            renderer,
            "interp-mode",
            PropertyValue::Str(settings.interp_mode.as_str().to_string()),
        );
        graph.set_property(renderer, "upmix", PropertyValue::Bool(settings.upmix));
        if let Some(mask) = settings.active_channels {
            graph.set_property(renderer, "active-channels-enable", PropertyValue::Bool(true));
            graph.set_property(renderer, "active-channels-mask", PropertyValue::UInt(mask));
        }
        if let Some(config) = &settings.renderer_config {
            graph.set_property(
                renderer,
                "json-config",
                PropertyValue::Str(config.display().to_string()),
            );
        }
        renderer
    }

    /// Append the encode/sink chain for the configured output target.
    /// Returns the new node ids in upstream-to-downstream order.
    fn append_output_chain(&self, graph: &mut Graph, upstream: NodeId) -> Result<Vec<NodeId>> {
        match &self.settings.output {
            OutputTarget::File(path) => {
                let enc = graph.add(ElementKind::WavEncoder, "wav-enc");
                let sink = graph.add(ElementKind::FileSink, "file-sink");
                graph.set_property(
                    sink,
                    "location",
                    PropertyValue::Str(path.display().to_string()),
                );
                graph.link(upstream, enc)?;
                graph.link(enc, sink)?;
                Ok(vec![enc, sink])
            }
            OutputTarget::Playback(device) => {
                let sink_kind = match &self.platform {
                    Platform::Linux => ElementKind::PulseSink,
                    Platform::Windows => ElementKind::WasapiSink,
                    Platform::MacOs => ElementKind::AutoAudioSink,
                    Platform::Other(_) => {
                        return Err(HomeAudioError::UnsupportedPlatform {
                            platform: self.platform.name(),
                        })
                    }
                };
                let convert = graph.add(ElementKind::AudioConvert, "convert-out");
                let sink = graph.add(sink_kind, "audio-sink");
                // The automatic sink picks its own device
                if sink_kind != ElementKind::AutoAudioSink {
                    graph.set_property(sink, "device", PropertyValue::Str(device.clone()));
                }
                graph.link(upstream, convert)?;
                graph.link(convert, sink)?;
                Ok(vec![convert, sink])
            }
        }
    }

    /// Write a DOT dump of the graph when the settings ask for one
    pub fn dump_if_requested(&self, graph: &Graph) {
        if let Some(path) = &self.settings.graph_dump {
            graph.dump_to_file(Path::new(path));
        }
    }
}
