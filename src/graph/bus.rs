//! Notification bus
//!
//! The native layer executes the graph on its own context and delivers
//! notifications asynchronously. The core consumes them through the
//! [`MessageBus`] trait: a blocking-style `next` for the controller's run
//! loop and a non-blocking `poll` for the bounded configuration check.
//! Handlers stay on a single logical thread and must not block.

use std::collections::{BTreeMap, VecDeque};

/// A typed value inside an element notification structure
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
}

/// A structured notification emitted by a graph element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMessage {
    name: String,
    fields: BTreeMap<String, MessageValue>,
}

impl ElementMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: MessageValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.fields.get(key) {
            Some(MessageValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.fields.get(key) {
            Some(MessageValue::UInt(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(MessageValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Notifications recognized by the pipeline controller
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// Clean end of stream
    Eos,
    /// A processing error surfaced by the running graph
    Error { source_name: String, message: String },
    /// The type probe resolved the concrete media type
    TypeFound { media_type: String },
    /// An application-level notification from an element
    Element(ElementMessage),
}

/// Source of asynchronous graph notifications
pub trait MessageBus {
    /// Wait for the next notification; `None` means the bus is closed.
    fn next(&mut self) -> Option<BusMessage>;

    /// Take a single pending notification without waiting.
    fn poll(&mut self) -> Option<BusMessage>;
}

/// In-memory bus fed from a fixed script, for tests and dry runs
#[derive(Debug, Default)]
pub struct ScriptedBus {
    queue: VecDeque<BusMessage>,
}

impl ScriptedBus {
    pub fn new(messages: impl IntoIterator<Item = BusMessage>) -> Self {
        Self {
            queue: messages.into_iter().collect(),
        }
    }

    pub fn push(&mut self, msg: BusMessage) {
        self.queue.push_back(msg);
    }
}

impl MessageBus for ScriptedBus {
    fn next(&mut self) -> Option<BusMessage> {
        self.queue.pop_front()
    }

    fn poll(&mut self) -> Option<BusMessage> {
        self.queue.pop_front()
    }
}
