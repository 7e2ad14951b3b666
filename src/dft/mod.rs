//! Document flow tracking.
//!
//! A [`Dft`] drives one window through the sequence of events a browser
//! produces while loading a page: scripts run in document order (including
//! the ones they inject), tag specific resources are fetched, inline and
//! scripted handlers are collected, and finally `load`-style events fire on
//! the window, the document and every element with a listener, each at most
//! once. Frames, meta refreshes and followed links open child windows that
//! get their own tracker.

mod dispatch;
mod handlers;
mod listeners;
mod navigation;
mod walker;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::browser::Window;
use crate::dom::NodeId;
use crate::net::{FetchResponse, RedirectType};

pub use dispatch::DispatchTracker;
pub use handlers::TagHandler;
pub use listeners::{HandlerSource, RecordedListener};

/// Meta refresh attempts per target URL, shared along a navigation chain.
pub type RefreshCounter = Rc<RefCell<HashMap<String, u32>>>;

/// What one tracker run did, with the runs of its child navigations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub url: String,
    pub depth: usize,
    pub scripts_evaluated: usize,
    pub handlers_attached: usize,
    pub listeners_registered: usize,
    pub events_dispatched: usize,
    pub resources_fetched: usize,
    pub children: Vec<RunSummary>,
}

impl RunSummary {
    /// Number of windows in this navigation tree, this one included.
    pub fn windows(&self) -> usize {
        1 + self.children.iter().map(RunSummary::windows).sum::<usize>()
    }
}

/// Outcome of a best-effort fetch.
enum Fetched {
    Response(FetchResponse),
    /// A scheme handler consumed the target.
    Handled,
    Unavailable,
}

pub struct Dft<'w> {
    window: &'w Window,
    anchors: Vec<NodeId>,
    meta: RefreshCounter,
    listeners: Vec<RecordedListener>,
    tracker: DispatchTracker,
    depth: usize,
    handled_once: HashSet<NodeId>,
    summary: RunSummary,
}

impl<'w> Dft<'w> {
    pub fn new(window: &'w Window) -> Self {
        Self::child(window, 0, RefreshCounter::default())
    }

    /// Tracker for a window opened by navigation from another tracker.
    pub fn child(window: &'w Window, depth: usize, meta: RefreshCounter) -> Self {
        let tracker = DispatchTracker::new(&window.session().options().events);
        debug!(
            target: "dft",
            events = %tracker.handled_events().join(","),
            "handling DOM events"
        );
        Self {
            window,
            anchors: Vec::new(),
            meta,
            listeners: Vec::new(),
            tracker,
            depth,
            handled_once: HashSet::new(),
            summary: RunSummary {
                url: window.url().to_string(),
                depth,
                ..RunSummary::default()
            },
        }
    }

    pub fn window(&self) -> &'w Window {
        self.window
    }

    pub fn listeners(&self) -> &[RecordedListener] {
        &self.listeners
    }

    pub fn anchors(&self) -> &[NodeId] {
        &self.anchors
    }

    pub fn run(mut self) -> Result<RunSummary> {
        info!(target: "dft", url = %self.window.url(), depth = self.depth, "analysis started");
        self.walk()?;
        self.handle_window_events();
        self.handle_document_events();
        self.handle_element_events();
        if self.window.session().options().follow_links {
            self.follow_links()?;
        }
        info!(
            target: "dft",
            url = %self.window.url(),
            scripts = self.summary.scripts_evaluated,
            events = self.summary.events_dispatched,
            "analysis finished"
        );
        Ok(self.summary)
    }

    /// Fetch on behalf of the page; `None` unless a response came back.
    fn fetch(
        &mut self,
        target: &str,
        headers: Vec<(String, String)>,
        redirect_type: RedirectType,
    ) -> Result<Option<FetchResponse>> {
        Ok(match self.fetch_target(target, headers, redirect_type)? {
            Fetched::Response(response) => Some(response),
            Fetched::Handled | Fetched::Unavailable => None,
        })
    }

    /// Scheme handlers short-circuit the network. Resource errors are
    /// logged and reported as [`Fetched::Unavailable`].
    fn fetch_target(
        &mut self,
        target: &str,
        headers: Vec<(String, String)>,
        redirect_type: RedirectType,
    ) -> Result<Fetched> {
        let window = self.window;
        if let Some(handler) = window.session().schemes().lookup(target) {
            handler.handle(window, target)?;
            return Ok(Fetched::Handled);
        }
        match window.navigator().fetch(target, headers, redirect_type) {
            Ok(response) => {
                self.summary.resources_fetched += 1;
                Ok(Fetched::Response(response))
            }
            Err(err) if err.is_resource_error() => {
                info!(
                    target: "dft",
                    url = target,
                    redirect_type = %redirect_type,
                    error = %err,
                    "resource unavailable"
                );
                Ok(Fetched::Unavailable)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Offer a response to the MIME handlers; true when one consumed it.
    fn consume_mime(&self, response: &FetchResponse) -> bool {
        response.content_type().is_some_and(|content_type| {
            self.window
                .session()
                .mime()
                .handle(content_type, &response.url, &response.body)
        })
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.window
            .document()
            .borrow()
            .tag_name(node)
            .map(str::to_ascii_lowercase)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.window
            .document()
            .borrow()
            .attribute(node, name)
            .map(str::to_string)
    }
}
