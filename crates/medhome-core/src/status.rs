//! Status channel: progress and result text fanned out to independent sinks.
//!
//! Publishing never fails and never feeds back into the workflow. The
//! display and the logger subscribe separately; neither knows about the other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{info, warn};

use crate::workflow::WorkflowState;

/// One status line tagged with the state that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub state: WorkflowState,
    pub message: String,
}

/// Receiver of status events.
pub trait StatusSink {
    fn emit(&mut self, event: &StatusEvent);
}

impl<S: StatusSink + ?Sized> StatusSink for Rc<RefCell<S>> {
    fn emit(&mut self, event: &StatusEvent) {
        self.borrow_mut().emit(event);
    }
}

/// Fan-out to every subscribed sink.
#[derive(Default)]
pub struct StatusChannel {
    sinks: Vec<Box<dyn StatusSink>>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Box<dyn StatusSink>) {
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: impl StatusSink + 'static) -> Self {
        self.subscribe(Box::new(sink));
        self
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn publish(&mut self, state: WorkflowState, message: impl Into<String>) {
        let event = StatusEvent {
            state,
            message: message.into(),
        };
        for sink in &mut self.sinks {
            sink.emit(&event);
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Forwards events to the `log` facade. Fault events log at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn emit(&mut self, event: &StatusEvent) {
        match event.state {
            WorkflowState::Fault | WorkflowState::RetryWait => {
                warn!("[{}] {}", event.state, event.message)
            }
            _ => info!("[{}] {}", event.state, event.message),
        }
    }
}

/// Text model of a small character display.
///
/// Keeps the most recent `rows` lines. Truncation only happens when a width
/// is configured.
#[derive(Debug, Clone)]
pub struct LineDisplay {
    rows: usize,
    width: Option<usize>,
    lines: VecDeque<String>,
}

impl LineDisplay {
    pub fn new(rows: usize, width: Option<usize>) -> Self {
        Self {
            rows: rows.max(1),
            width,
            lines: VecDeque::with_capacity(rows.max(1)),
        }
    }

    /// Visible lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl StatusSink for LineDisplay {
    fn emit(&mut self, event: &StatusEvent) {
        let line = match self.width {
            Some(w) => event.message.chars().take(w).collect(),
            None => event.message.clone(),
        };
        if self.lines.len() == self.rows {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

/// Keeps every event. Used for end-of-cycle summaries.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<StatusEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[StatusEvent] {
        &self.events
    }

    /// Messages emitted while in `state`.
    pub fn messages_in(&self, state: WorkflowState) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.state == state)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl StatusSink for EventLog {
    fn emit(&mut self, event: &StatusEvent) {
        self.events.push(event.clone());
    }
}
