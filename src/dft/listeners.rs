use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dom::{is_window_on_event, EventTarget, HandlerId, Listener, NodeId};
use crate::js::handler_source;

use super::Dft;

/// Where a handler comes from before it is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSource<'a> {
    /// Inline attribute text such as `onclick="go()"`.
    Source(&'a str),
    /// A function the script engine already holds.
    Compiled(HandlerId),
    /// Name of a global function.
    Global(&'a str),
}

/// A listener picked up for the element dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedListener {
    pub node: NodeId,
    pub event_type: String,
    pub handler: HandlerId,
    pub capture: bool,
}

impl Dft<'_> {
    /// Attach the element's inline `on*` attributes for the handled events.
    pub(super) fn set_event_handler_attributes(&mut self, node: NodeId) -> Result<()> {
        let attributes = self.window.document().borrow().attributes(node);
        let scripted = attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("language"))
            .map_or(true, |(_, language)| language.eq_ignore_ascii_case("javascript"));
        if !scripted {
            return Ok(());
        }
        for (name, value) in &attributes {
            let on_event = name.to_ascii_lowercase();
            if !self.tracker.is_handled_on_event(&on_event) {
                continue;
            }
            self.attach_event(node, &on_event, HandlerSource::Source(value))?;
        }
        Ok(())
    }

    /// Compile inline handler text. Compilation failures are logged and
    /// yield nothing to attach.
    pub(super) fn build_event_handler(&self, body: &str) -> Option<HandlerId> {
        let context = self.window.context();
        let compiled = context.compile_handler(&handler_source(body, context.is_legacy_ie()));
        context.collect_garbage();
        match compiled {
            Ok(handler) => handler,
            Err(err) => {
                warn!(target: "dft", error = %err, "inline handler does not compile");
                None
            }
        }
    }

    /// Resolve `source` and attach it for `on_event`. Window events declared
    /// on `<body>` go to the window; everything else becomes a capturing
    /// listener on the realized node. Unresolvable sources are ignored.
    pub fn attach_event(
        &mut self,
        node: NodeId,
        on_event: &str,
        source: HandlerSource<'_>,
    ) -> Result<()> {
        let compiled_here = matches!(source, HandlerSource::Source(_));
        let handler = match source {
            HandlerSource::Source(body) => self.build_event_handler(body),
            HandlerSource::Compiled(handler) => Some(handler),
            HandlerSource::Global(name) => {
                self.window.context().global_handler(name).ok().flatten()
            }
        };
        let Some(handler) = handler else {
            return Ok(());
        };

        let installed = self.install_handler(node, on_event, handler);
        // Window properties keep their handler alive; inline handlers that
        // never got installed are dropped.
        let release = match &installed {
            Ok(on_window) => *on_window,
            Err(_) => true,
        };
        if compiled_here && release {
            self.window.context().release_handler(handler)?;
        }
        installed?;
        self.summary.handlers_attached += 1;
        Ok(())
    }

    /// Install `handler`; true when it went to a window property.
    fn install_handler(
        &self,
        node: NodeId,
        on_event: &str,
        handler: HandlerId,
    ) -> Result<bool> {
        if self.tag_name(node).as_deref() == Some("body") && is_window_on_event(on_event) {
            debug!(target: "dft", event = on_event, "body handler installed on window");
            self.window
                .context()
                .set_property_handler(EventTarget::Window, on_event, handler)?;
            return Ok(true);
        }

        let event_type = on_event.strip_prefix("on").unwrap_or(on_event);
        let document = self.window.document();
        let mut document = document.borrow_mut();
        if !document.is_realized(node) {
            document.realize(node)?;
        }
        document.add_listener(node, Listener::new(event_type, handler, true), false)?;
        Ok(false)
    }

    /// Pick up handlers scripts assigned as properties and the listeners
    /// they registered, for realized elements only.
    pub(super) fn set_event_listeners(&mut self, node: NodeId) -> Result<()> {
        let realized = {
            let document = self.window.document();
            let document = document.borrow();
            document.element(node).is_some() && document.is_realized(node)
        };
        if !realized {
            return Ok(());
        }

        for on_event in self.tracker.handled_on_events().to_vec() {
            let handler = self
                .window
                .context()
                .property_handler(EventTarget::Node(node), &on_event)
                .ok()
                .flatten();
            if let Some(handler) = handler {
                self.attach_event(node, &on_event, HandlerSource::Compiled(handler))?;
            }
        }

        let recorded: Vec<RecordedListener> = self
            .window
            .document()
            .borrow()
            .listeners(node)
            .iter()
            .filter(|listener| self.tracker.is_handled_event(&listener.event_type))
            .map(|listener| RecordedListener {
                node,
                event_type: listener.event_type.clone(),
                handler: listener.handler,
                capture: listener.capture,
            })
            .collect();
        self.listeners.extend(recorded);
        Ok(())
    }
}
