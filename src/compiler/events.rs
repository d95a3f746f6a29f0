//! Event logging for the analysis pipeline.
//!
//! Every rewrite a pass performs and every recoverable problem it runs into
//! is recorded as an [`Event`] in an [`EventLog`]. Diagnostic events are also
//! forwarded to the [`log`] facade when they are committed, so a host that
//! installs a logger sees them without inspecting the log.
//!
//! # Example
//!
//! ```rust,ignore
//! use decoflow::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::CopyPropagated)
//!     .at(0x401004)
//!     .message("eax -> 0x401010");
//!
//! log.info("unable to find successor block at 0x401020");
//!
//! println!("{}", log.summary());
//! ```

use std::{collections::HashMap, fmt};

use crate::{ir::Address, utils::NodeId};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A register definition with no reader was dropped.
    DefinitionRemoved,
    /// An instruction was removed.
    InstructionRemoved,
    /// An assignment was folded into its only reader.
    CopyPropagated,
    /// Pushed values were attached to a call as parameters.
    ParametersCollected,
    /// A push/pop pair was turned into an assignment.
    PushPopFolded,
    /// An architecture idiom was folded into a higher-level instruction.
    IdiomFolded,
    /// A placeholder instruction was pruned.
    NoOpPruned,

    /// A basic block was created.
    NodeCreated,
    /// A successor address did not match any node.
    EdgeUnresolved,
    /// Live-variable analysis reached its fixed point.
    LivenessConverged,
    /// A pipeline stage finished.
    StageCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed, the affected step was skipped).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::DefinitionRemoved => "definition removed",
            Self::InstructionRemoved => "instruction removed",
            Self::CopyPropagated => "copy propagated",
            Self::ParametersCollected => "parameters collected",
            Self::PushPopFolded => "push/pop folded",
            Self::IdiomFolded => "idiom folded",
            Self::NoOpPruned => "no-op pruned",
            // Analysis
            Self::NodeCreated => "node created",
            Self::EdgeUnresolved => "edge unresolved",
            Self::LivenessConverged => "liveness converged",
            Self::StageCompleted => "stage completed",
            // Diagnostic
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a rewrite of the IR.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::DefinitionRemoved
                | Self::InstructionRemoved
                | Self::CopyPropagated
                | Self::ParametersCollected
                | Self::PushPopFolded
                | Self::IdiomFolded
                | Self::NoOpPruned
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Address of the instruction involved, if any.
    pub address: Option<Address>,
    /// Node involved, if any.
    pub node: Option<NodeId>,
    /// Human-readable description.
    pub message: String,
    /// Pass or stage that produced the event.
    pub pass: Option<&'static str>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            address: None,
            node: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(pass) = self.pass {
            write!(f, " {pass}:")?;
        }
        if let Some(address) = self.address {
            write!(f, " {address:08x}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    address: Option<Address>,
    node: Option<NodeId>,
    message: Option<String>,
    pass: Option<&'static str>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            address: None,
            node: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the instruction address the event concerns.
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets the node the event concerns.
    pub fn node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a pass or stage.
    pub fn pass(mut self, name: &'static str) -> Self {
        self.pass = Some(name);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.push(Event {
            kind: self.kind,
            address: self.address.take(),
            node: self.node.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events from analysing one function.
///
/// Events can be appended through shared references (`&self`), so passes
/// that only read the IR can still report.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        for (_, event) in &self.events {
            new_log.events.push(event.clone());
        }
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    fn push(&self, event: Event) {
        match event.kind {
            EventKind::Error => log::error!("{event}"),
            EventKind::Warning | EventKind::EdgeUnresolved => log::warn!("{event}"),
            EventKind::Info => log::info!("{event}"),
            _ => log::trace!("{event}"),
        }
        self.events.push(event);
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.push(Event::new(EventKind::Info, message));
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.transformations().count()
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut counts: HashMap<EventKind, usize> = HashMap::new();
        for event in self.transformations() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        let mut parts: Vec<String> = counts
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}
