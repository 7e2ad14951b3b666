use serde::Serialize;

use super::tree::NodeId;

/// Opaque reference to a callable held by the script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HandlerId(pub u32);

/// An explicitly registered listener, as recorded by `addEventListener`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub event_type: String,
    pub handler: HandlerId,
    pub capture: bool,
}

impl Listener {
    pub fn new(event_type: &str, handler: HandlerId, capture: bool) -> Self {
        Self {
            event_type: event_type.to_string(),
            handler,
            capture,
        }
    }
}

pub const MOUSE_EVENT_TYPES: &[&str] = &[
    "click",
    "mousedown",
    "mouseup",
    "mouseover",
    "mousemove",
    "mouseout",
];

pub const HTML_EVENT_TYPES: &[&str] = &[
    "load", "unload", "abort", "error", "select", "change", "submit", "reset", "focus", "blur",
    "resize", "scroll",
];

/// Events that target the browser as a whole. A handler for one of these
/// declared on `<body>` belongs to the window.
pub const WINDOW_EVENTS: &[&str] = &[
    "afterprint",
    "beforeprint",
    "beforeunload",
    "blur",
    "error",
    "focus",
    "hashchange",
    "load",
    "message",
    "offline",
    "online",
    "pagehide",
    "pageshow",
    "popstate",
    "redo",
    "resize",
    "storage",
    "undo",
    "unload",
];

pub fn is_window_on_event(on_event: &str) -> bool {
    on_event
        .strip_prefix("on")
        .is_some_and(|name| WINDOW_EVENTS.contains(&name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "handle", rename_all = "lowercase")]
pub enum EventTarget {
    Window,
    Document,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventInterface {
    MouseEvent,
    HTMLEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum EventPhase {
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

/// Event object handed to a single handler invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventObject {
    #[serde(rename = "type")]
    pub event_type: String,
    pub interface: EventInterface,
    pub event_phase: u16,
    pub target: EventTarget,
    pub current_target: EventTarget,
}

impl EventObject {
    /// Build an at-target event, or `None` for event types that have no
    /// mouse or HTML event interface.
    pub fn at_target(event_type: &str, target: EventTarget) -> Option<Self> {
        let interface = if MOUSE_EVENT_TYPES.contains(&event_type) {
            EventInterface::MouseEvent
        } else if HTML_EVENT_TYPES.contains(&event_type) {
            EventInterface::HTMLEvent
        } else {
            return None;
        };
        Some(Self {
            event_type: event_type.to_string(),
            interface,
            event_phase: EventPhase::AtTarget as u16,
            target,
            current_target: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_window_events() {
        assert!(is_window_on_event("onload"));
        assert!(is_window_on_event("onbeforeunload"));
        assert!(!is_window_on_event("onclick"));
        assert!(!is_window_on_event("load"));
    }

    #[test]
    fn event_objects_only_for_known_interfaces() {
        let event = EventObject::at_target("click", EventTarget::Window).unwrap();
        assert_eq!(event.interface, EventInterface::MouseEvent);
        assert_eq!(event.event_phase, 2);
        assert!(EventObject::at_target("DOMContentLoaded", EventTarget::Document).is_none());
    }

    #[test]
    fn event_serializes_targets() {
        let event =
            EventObject::at_target("load", EventTarget::Node(NodeId::from_handle(4))).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "load");
        assert_eq!(json["eventPhase"], 2);
        assert_eq!(json["target"]["kind"], "node");
        assert_eq!(json["target"]["handle"], 4);
        let window = serde_json::to_value(EventTarget::Window).unwrap();
        assert_eq!(window["kind"], "window");
    }
}
