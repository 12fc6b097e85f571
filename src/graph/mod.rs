//! Processing graph model
//!
//! The native layer exposes a declarative construction interface: make
//! named typed elements, set properties, link pairwise, sync run state.
//! This module models that surface as an arena of typed nodes with links
//! expressed as index pairs. The topology is acyclic and append-only
//! after the type probe resolves, so plain indices replace pointers and
//! no node is ever shared between graphs.

pub mod assembler;
pub mod bus;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use log::warn;

use crate::error::{HomeAudioError, Result};

/// Index of a node inside its graph
pub type NodeId = usize;

/// Element kinds the assembler knows how to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// File source
    FileSource,
    /// Content type probe
    TypeFind,
    /// Container demuxer
    Demuxer,
    /// Compressed bitstream parser
    BitstreamParser,
    /// Bitstream decoder
    Decoder,
    /// Combined parse/decode/render bin for object audio
    DecodeBin,
    /// Generic uncompressed decode
    GenericDecode,
    /// Sample format conversion
    AudioConvert,
    /// Sample rate conversion
    Resampler,
    /// Speaker renderer / post-processing element
    Renderer,
    /// Caps filter pinning the output layout
    CapsFilter,
    /// WAV encoder
    WavEncoder,
    /// File sink
    FileSink,
    /// Pulse audio sink (Linux playback)
    PulseSink,
    /// WASAPI sink (Windows playback)
    WasapiSink,
    /// Automatic sink (macOS playback)
    AutoAudioSink,
}

impl ElementKind {
    /// Factory name of the native element backing this kind
    pub fn factory_name(self) -> &'static str {
        match self {
            ElementKind::FileSource => "filesrc",
            ElementKind::TypeFind => "typefind",
            ElementKind::Demuxer => "qtdemux",
            ElementKind::BitstreamParser => "ac3parse",
            ElementKind::Decoder => "ac3dec",
            ElementKind::DecodeBin => "audiodecbin",
            ElementKind::GenericDecode => "decodebin",
            ElementKind::AudioConvert => "audioconvert",
            ElementKind::Resampler => "audioresample",
            ElementKind::Renderer => "renderer",
            ElementKind::CapsFilter => "capsfilter",
            ElementKind::WavEncoder => "wavenc",
            ElementKind::FileSink => "filesink",
            ElementKind::PulseSink => "pulsesink",
            ElementKind::WasapiSink => "wasapisink",
            ElementKind::AutoAudioSink => "autoaudiosink",
        }
    }
}

/// A property value on a graph node
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::UInt(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Run state of the graph or a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Inert, resources released
    #[default]
    Null,
    /// Ready to roll but not processing
    Paused,
    /// Processing
    Playing,
}

/// Outcome of the content type probe
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProbeState {
    /// No probe event seen yet
    #[default]
    Unresolved,
    /// Probe resolved and the downstream chain was appended
    Resolved(String),
    /// Probe resolved to an unsupported type; graph was terminated
    Failed(String),
}

/// One typed node in the graph arena
#[derive(Debug, Clone)]
pub struct Node {
    kind: ElementKind,
    name: String,
    props: BTreeMap<String, PropertyValue>,
    state: RunState,
}

impl Node {
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.props.get(key)
    }

    pub fn state(&self) -> RunState {
        self.state
    }
}

/// Directed acyclic chain of processing nodes
///
/// The graph exclusively owns its nodes. Links are only ever created
/// between nodes that already exist in the arena.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    links: Vec<(NodeId, NodeId)>,
    state: RunState,
    probe: ProbeState,
    sync_log: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node and add it to the arena
    pub fn add(&mut self, kind: ElementKind, name: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            name: name.into(),
            props: BTreeMap::new(),
            state: RunState::Null,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[(NodeId, NodeId)] {
        &self.links
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn probe_state(&self) -> &ProbeState {
        &self.probe
    }

    pub(crate) fn set_probe_state(&mut self, probe: ProbeState) {
        self.probe = probe;
    }

    /// Set a property on a node
    pub fn set_property(&mut self, id: NodeId, key: impl Into<String>, value: PropertyValue) {
        self.nodes[id].props.insert(key.into(), value);
    }

    /// Link `from` to `to`. Both nodes must already be in the arena.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if from >= self.nodes.len() || to >= self.nodes.len() {
            return Err(HomeAudioError::Graph {
                source_name: "graph".to_string(),
                message: format!("link {} -> {} references a missing node", from, to),
            });
        }
        self.links.push((from, to));
        Ok(())
    }

    /// Find the most recently added node of a kind
    pub fn find(&self, kind: ElementKind) -> Option<NodeId> {
        self.nodes.iter().rposition(|n| n.kind == kind)
    }

    /// Drive the whole graph to a run state
    pub fn set_state(&mut self, state: RunState) {
        self.state = state;
        for node in &mut self.nodes {
            node.state = state;
        }
    }

    /// Bring a late-added node up to the graph's current state.
    /// The order of calls is recorded; newly appended chains must sync
    /// most-downstream node first.
    pub fn sync_state(&mut self, id: NodeId) {
        self.nodes[id].state = self.state;
        self.sync_log.push(id);
    }

    /// Node ids in the order they were state-synced
    pub fn sync_order(&self) -> &[NodeId] {
        &self.sync_log
    }

    /// Serialize the topology to a DOT description
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        for (id, node) in self.nodes.iter().enumerate() {
            out.push_str(&format!(
                "  n{} [label=\"{} ({})\"];\n",
                id,
                node.name,
                node.kind.factory_name()
            ));
        }
        for (from, to) in &self.links {
            out.push_str(&format!("  n{} -> n{};\n", from, to));
        }
        out.push_str("}\n");
        out
    }

    /// Write the DOT description to a file. Failure is reported but not
    /// fatal to the run.
    pub fn dump_to_file(&self, path: &Path) {
        if let Err(err) = fs::write(path, self.to_dot()) {
            warn!("failed to write graph dump to {}: {}", path.display(), err);
        }
    }
}
