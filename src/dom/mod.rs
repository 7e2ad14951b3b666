mod event;
mod parse;
mod tree;

pub use event::{
    is_window_on_event, EventInterface, EventObject, EventPhase, EventTarget, HandlerId, Listener,
    HTML_EVENT_TYPES, MOUSE_EVENT_TYPES, WINDOW_EVENTS,
};
pub use tree::{Document, DomError, ElementData, Node, NodeId, NodeKind};
