use std::collections::HashSet;

use anyhow::Result;
use tracing::warn;

use crate::dom::{EventTarget, NodeId};

use super::Dft;

/// Events always handled, in firing order, ahead of configured extras.
const DEFAULT_EVENTS: &[&str] = &["load", "mousemove"];

/// Handled event names and the (node, event) pairs already fired.
#[derive(Debug, Clone)]
pub struct DispatchTracker {
    handled_events: Vec<String>,
    handled_on_events: Vec<String>,
    dispatched: HashSet<(NodeId, String)>,
}

impl DispatchTracker {
    pub fn new(extra_events: &[String]) -> Self {
        let handled_events: Vec<String> = DEFAULT_EVENTS
            .iter()
            .map(|event| event.to_string())
            .chain(extra_events.iter().cloned())
            .collect();
        let handled_on_events = handled_events
            .iter()
            .map(|event| format!("on{event}"))
            .collect();
        Self {
            handled_events,
            handled_on_events,
            dispatched: HashSet::new(),
        }
    }

    pub fn handled_events(&self) -> &[String] {
        &self.handled_events
    }

    pub fn handled_on_events(&self) -> &[String] {
        &self.handled_on_events
    }

    pub fn is_handled_event(&self, event_type: &str) -> bool {
        self.handled_events.iter().any(|event| event == event_type)
    }

    pub fn is_handled_on_event(&self, on_event: &str) -> bool {
        self.handled_on_events.iter().any(|event| event == on_event)
    }

    pub fn is_dispatched(&self, node: NodeId, event_type: &str) -> bool {
        self.dispatched.contains(&(node, event_type.to_string()))
    }

    /// Record a firing; false when the pair was already recorded.
    pub fn mark(&mut self, node: NodeId, event_type: &str) -> bool {
        self.dispatched.insert((node, event_type.to_string()))
    }
}

impl Dft<'_> {
    pub(super) fn handle_window_events(&mut self) {
        for on_event in self.tracker.handled_on_events().to_vec() {
            if let Err(err) = self.handle_window_event(&on_event) {
                warn!(target: "dft", pass = "window", event = %on_event, error = %err, "event not properly handled");
            }
        }
    }

    pub(super) fn handle_document_events(&mut self) {
        for on_event in self.tracker.handled_on_events().to_vec() {
            if let Err(err) = self.handle_document_event(&on_event) {
                warn!(target: "dft", pass = "document", event = %on_event, error = %err, "event not properly handled");
            }
        }
    }

    pub(super) fn handle_element_events(&mut self) {
        for event_type in self.tracker.handled_events().to_vec() {
            if let Err(err) = self.handle_element_event(&event_type) {
                warn!(target: "dft", pass = "element", event = %event_type, error = %err, "event not properly handled");
            }
        }
    }

    fn handle_window_event(&mut self, on_event: &str) -> Result<()> {
        let window = self.window;
        let Some(handler) = window
            .context()
            .property_handler(EventTarget::Window, on_event)?
        else {
            return Ok(());
        };
        let event_type = on_event.strip_prefix("on").unwrap_or(on_event);
        self.summary.events_dispatched += 1;
        window.call_handler(handler, EventTarget::Window, event_type)
    }

    fn handle_document_event(&mut self, on_event: &str) -> Result<()> {
        let window = self.window;
        let event_type = on_event.strip_prefix("on").unwrap_or(on_event);
        if let Some(handler) = window
            .context()
            .property_handler(EventTarget::Document, on_event)?
        {
            self.summary.events_dispatched += 1;
            window.call_handler(handler, EventTarget::Document, event_type)?;
        }

        let handlers = {
            let document = window.document();
            let document = document.borrow();
            document.listeners_for(document.root(), event_type)
        };
        for handler in handlers {
            self.summary.events_dispatched += 1;
            window.call_handler(handler, EventTarget::Document, event_type)?;
        }
        Ok(())
    }

    fn handle_element_event(&mut self, event_type: &str) -> Result<()> {
        let targets: Vec<NodeId> = self
            .listeners
            .iter()
            .filter(|listener| listener.event_type == event_type)
            .map(|listener| listener.node)
            .collect();
        for node in targets {
            match self.tag_name(node).as_deref() {
                None | Some("body") => continue,
                Some(_) => {}
            }
            if self.tracker.is_dispatched(node, event_type) {
                continue;
            }
            self.window.dispatch_event(node, event_type);
            self.tracker.mark(node, event_type);
            self.summary.events_dispatched += 1;
        }
        Ok(())
    }
}
