use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};
use url::Url;

use crate::dom::{Document, EventObject, EventTarget, HandlerId, NodeId};
use crate::js::{LocationParts, ScriptContext, ScriptGlobals};
use crate::net::RedirectType;

use super::navigator::Navigator;
use super::session::Session;

/// A browsing context: one document, its script context and its location.
pub struct Window {
    url: Url,
    document: Rc<RefCell<Document>>,
    context: ScriptContext,
    navigator: Navigator,
    session: Rc<Session>,
}

impl Window {
    pub fn new(session: Rc<Session>, url: Url, document: Document) -> Result<Self> {
        let document = Rc::new(RefCell::new(document));
        let personality = session.personality();
        let globals = ScriptGlobals {
            location: LocationParts::from_url(&url),
            user_agent: personality.user_agent.to_string(),
            app_name: personality.app_name().to_string(),
            app_version: personality.app_version.to_string(),
            platform: personality.platform.to_string(),
            java_enabled: session.java_user_agent().is_some(),
            legacy_ie: personality.is_legacy_ie(),
        };
        let context = ScriptContext::new(Rc::clone(&document), &globals)
            .context("failed to set up script context")?;
        let navigator = Navigator::new(Rc::clone(&session), url.clone());
        Ok(Self {
            url,
            document,
            context,
            navigator,
            session,
        })
    }

    /// Fetch `url` and load the response into a new window.
    pub fn open(session: Rc<Session>, url: Url) -> Result<Self> {
        let navigator = Navigator::new(Rc::clone(&session), url.clone());
        let response = navigator
            .fetch(url.as_str(), Vec::new(), RedirectType::Navigation)
            .with_context(|| format!("failed to load {url}"))?;
        if response.is_not_found() {
            anyhow::bail!("{url} answered 404");
        }
        let document = Document::parse(&response.text());
        Self::new(session, response.url, document)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.document)
    }

    pub fn context(&self) -> &ScriptContext {
        &self.context
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    /// Evaluate page script. Exceptions are logged; returns whether the
    /// script ran to completion.
    pub fn eval_script(&self, source: &str, tag: Option<NodeId>) -> bool {
        let filename = match tag {
            Some(node) => format!("{}#script-{}", self.url, node.index()),
            None => self.url.to_string(),
        };
        match self.context.eval_for(source, &filename, tag) {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "quickjs", script = %filename, error = %err, "script raised");
                false
            }
        }
    }

    /// Invoke `handler` on `receiver` with a freshly built event object.
    pub fn call_handler(
        &self,
        handler: HandlerId,
        receiver: EventTarget,
        event_type: &str,
    ) -> Result<()> {
        let event = EventObject::at_target(event_type, receiver);
        self.context.invoke(handler, receiver, event.as_ref())
    }

    /// Fire `event_type` at `node`, running every listener registered for
    /// it. Returns the number of listeners that ran without raising.
    pub fn dispatch_event(&self, node: NodeId, event_type: &str) -> usize {
        let handlers = self.document.borrow().listeners_for(node, event_type);
        debug!(
            target: "dft",
            node = node.index(),
            event = event_type,
            listeners = handlers.len(),
            "dispatch"
        );
        let mut completed = 0;
        for handler in handlers {
            match self.call_handler(handler, EventTarget::Node(node), event_type) {
                Ok(()) => completed += 1,
                Err(err) => warn!(
                    target: "dft",
                    node = node.index(),
                    event = event_type,
                    error = %err,
                    "listener raised"
                ),
            }
        }
        completed
    }

    pub fn to_html(&self) -> String {
        self.document.borrow().to_html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::dom::Listener;
    use crate::net::StaticFetcher;

    fn session() -> Rc<Session> {
        Rc::new(Session::new(Options::default(), Rc::new(StaticFetcher::new())).unwrap())
    }

    #[test]
    fn eval_script_logs_and_continues() {
        let window = Window::new(
            session(),
            Url::parse("http://h/").unwrap(),
            Document::parse("<body></body>"),
        )
        .unwrap();
        assert!(!window.eval_script("undefinedFunction()", None));
        assert!(window.eval_script("var ok = 1;", None));
    }

    #[test]
    fn dispatch_runs_each_listener() {
        let window = Window::new(
            session(),
            Url::parse("http://h/").unwrap(),
            Document::parse("<body><div id=d></div></body>"),
        )
        .unwrap();
        let div = window.document().borrow().find_by_id("d").unwrap();
        let good = window
            .context()
            .compile_handler("(function () { hits = (window.hits || 0) + 1; })")
            .unwrap()
            .unwrap();
        let bad = window
            .context()
            .compile_handler("(function () { throw new Error('x'); })")
            .unwrap()
            .unwrap();
        {
            let document = window.document();
            let mut doc = document.borrow_mut();
            doc.add_listener(div, Listener::new("click", good, true), false)
                .unwrap();
            doc.add_listener(div, Listener::new("click", bad, true), false)
                .unwrap();
        }
        assert_eq!(window.dispatch_event(div, "click"), 1);
        let hits: i32 = window.context().eval_with("hits", "read.js").unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn open_fetches_and_parses() {
        let fetcher = Rc::new(StaticFetcher::new());
        fetcher.route("http://h/page.html", "text/html", "<title>t</title><p id=p>x</p>");
        let session = Rc::new(Session::new(Options::default(), fetcher.clone()).unwrap());
        let window = Window::open(session, Url::parse("http://h/page.html").unwrap()).unwrap();
        assert!(window.document().borrow().find_by_id("p").is_some());
        assert!(Window::open(
            Rc::clone(window.session()),
            Url::parse("http://h/missing").unwrap()
        )
        .is_err());
    }
}
