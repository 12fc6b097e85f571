//! Pipeline lifecycle control
//!
//! The controller owns the assembled graph, drives it to the running
//! state, and consumes bus notifications until the stream ends or fails.
//! Only end-of-stream and processing errors terminate the run; the type
//! resolution event extends the graph in place, and element
//! notifications are displayed as stream info. `stop` is idempotent and
//! always leaves the graph inert, even after a partial construction
//! failure.

use log::{error, info, warn};

use crate::error::{HomeAudioError, Result};
use crate::graph::assembler::GraphAssembler;
use crate::graph::bus::{BusMessage, ElementMessage, MessageBus};
use crate::graph::{Graph, RunState};

/// Owns one graph and runs it to completion
pub struct PipelineController {
    assembler: GraphAssembler,
    graph: Graph,
    stopped: bool,
}

impl PipelineController {
    pub fn new(assembler: GraphAssembler, graph: Graph) -> Self {
        Self {
            assembler,
            graph,
            stopped: false,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Start the graph and block until it terminates.
    ///
    /// A clean end of stream returns `Ok`; a processing error or a failed
    /// type resolution stops the graph and propagates the error. A closed
    /// bus counts as an external stop request.
    pub fn run(&mut self, bus: &mut dyn MessageBus) -> Result<()> {
        self.stopped = false;
        self.graph.set_state(RunState::Playing);
        self.assembler.mark_started();
        info!("pipeline running");

        while let Some(msg) = bus.next() {
            match msg {
                BusMessage::Eos => {
                    info!("end of stream received, stopping pipeline");
                    self.stop();
                    return Ok(());
                }
                BusMessage::Error {
                    source_name,
                    message,
                } => {
                    error!("pipeline error from {}: {}", source_name, message);
                    self.stop();
                    return Err(HomeAudioError::Graph {
                        source_name,
                        message,
                    });
                }
                BusMessage::TypeFound { media_type } => {
                    if let Err(err) = self.assembler.resolve_type(&mut self.graph, &media_type) {
                        error!("unable to extend pipeline: {}", err);
                        self.stop();
                        return Err(err);
                    }
                }
                BusMessage::Element(msg) => log_stream_info(&msg),
            }
        }

        info!("bus closed, stopping pipeline");
        self.stop();
        Ok(())
    }

    /// Drive the graph to the inert state. Safe to call at any time,
    /// any number of times.
    pub fn stop(&mut self) {
        self.graph.set_state(RunState::Null);
        if !self.stopped {
            self.stopped = true;
            info!("pipeline stopped");
        }
    }

    /// Write a DOT dump of the current topology if the settings ask for
    /// one. Failure to write is logged, never fatal.
    pub fn dump_if_requested(&self) {
        self.assembler.dump_if_requested(&self.graph);
    }
}

/// Display the stream-info notification the decoder emits once the
/// stream is locked. Fields are optional; incomplete notifications are
/// shown as far as they go.
fn log_stream_info(msg: &ElementMessage) {
    if msg.name() != "stream-info" {
        warn!("ignoring element notification '{}'", msg.name());
        return;
    }
    let codec = match msg.get_str("audio-codec") {
        Some(codec) => codec,
        None => return,
    };
    if msg.get_bool("object-audio").unwrap_or(false) {
        info!("stream info: {} (object audio)", codec);
    } else {
        info!("stream info: {}", codec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::bus::{ElementMessage, MessageValue, ScriptedBus};
    use crate::graph::registry::StaticProvider;
    use crate::graph::ElementKind;
    use crate::settings::{OutputTarget, PipelineSettings};

    fn controller(input: &str) -> PipelineController {
        let settings =
            PipelineSettings::new(input, OutputTarget::File("out.wav".into()));
        let mut assembler = GraphAssembler::new(settings);
        let mut provider = StaticProvider::complete();
        let graph = assembler.build(&mut provider).unwrap();
        PipelineController::new(assembler, graph)
    }

    #[test]
    fn eos_stops_cleanly() {
        let mut ctl = controller("in.ec3");
        let mut bus = ScriptedBus::new([BusMessage::Eos]);
        ctl.run(&mut bus).unwrap();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn error_notification_stops_and_propagates() {
        let mut ctl = controller("in.ec3");
        let mut bus = ScriptedBus::new([BusMessage::Error {
            source_name: "ac3-dec".to_string(),
            message: "bad frame".to_string(),
        }]);
        let err = ctl.run(&mut bus).unwrap_err();
        assert_eq!(err.error_code(), "GRAPH_ERROR");
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn type_resolution_extends_running_graph() {
        let mut ctl = controller("in.mp4");
        let mut bus = ScriptedBus::new([
            BusMessage::TypeFound {
                media_type: "audio/x-ac3".to_string(),
            },
            BusMessage::Eos,
        ]);
        ctl.run(&mut bus).unwrap();
        assert!(ctl.graph().find(ElementKind::Decoder).is_some());
    }

    #[test]
    fn unsupported_type_terminates_without_panic() {
        let mut ctl = controller("in.mp4");
        let mut bus = ScriptedBus::new([BusMessage::TypeFound {
            media_type: "video/x-matroska".to_string(),
        }]);
        let err = ctl.run(&mut bus).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn stream_info_notification_does_not_terminate() {
        let mut ctl = controller("in.ec3");
        let info = ElementMessage::new("stream-info")
            .with_field("audio-codec", MessageValue::Str("E-AC-3 JOC".to_string()))
            .with_field("object-audio", MessageValue::Bool(true));
        let mut bus = ScriptedBus::new([BusMessage::Element(info), BusMessage::Eos]);
        ctl.run(&mut bus).unwrap();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn incomplete_stream_info_is_ignored() {
        let mut ctl = controller("in.ec3");
        let bare = ElementMessage::new("stream-info");
        let other = ElementMessage::new("buffering");
        let mut bus = ScriptedBus::new([
            BusMessage::Element(bare),
            BusMessage::Element(other),
            BusMessage::Eos,
        ]);
        ctl.run(&mut bus).unwrap();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn closed_bus_counts_as_stop() {
        let mut ctl = controller("in.ec3");
        let mut bus = ScriptedBus::default();
        ctl.run(&mut bus).unwrap();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut ctl = controller("in.ec3");
        ctl.stop();
        ctl.stop();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn rerun_leaves_graph_inert() {
        let mut ctl = controller("in.ec3");
        let mut bus = ScriptedBus::new([BusMessage::Eos]);
        ctl.run(&mut bus).unwrap();
        assert_eq!(ctl.graph().state(), RunState::Null);

        // A second run must come back down to Null again
        let mut bus = ScriptedBus::new([BusMessage::Eos]);
        ctl.run(&mut bus).unwrap();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }

    #[test]
    fn stop_after_rerun_is_effective() {
        let mut ctl = controller("in.ec3");
        ctl.stop();
        let mut bus = ScriptedBus::default();
        ctl.run(&mut bus).unwrap();
        ctl.stop();
        assert_eq!(ctl.graph().state(), RunState::Null);
    }
}
