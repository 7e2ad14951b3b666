use std::rc::Rc;

use anyhow::Result;
use tracing::{info, warn};
use url::Url;

use crate::browser::Window;
use crate::dom::Document;
use crate::js::fix;
use crate::net::{FetchResponse, RedirectType};

use super::Dft;

impl Dft<'_> {
    /// Load `response` into a new window at `url` and run a child tracker
    /// over it before returning.
    pub(super) fn spawn(&mut self, url: Url, response: &FetchResponse) -> Result<()> {
        let session = Rc::clone(self.window.session());
        let depth = self.depth + 1;
        let limit = session.options().max_navigation_depth;
        if depth > limit {
            warn!(target: "dft", url = %url, depth, limit, "navigation depth exceeded");
            return Ok(());
        }

        info!(target: "dft", url = %url, depth, "opening child window");
        let document = Document::parse(&response.text());
        let window = Window::new(session, url, document)?;
        match Dft::child(&window, depth, Rc::clone(&self.meta)).run() {
            Ok(summary) => self.summary.children.push(summary),
            Err(err) => warn!(target: "dft", url = %window.url(), error = %err, "child navigation failed"),
        }
        Ok(())
    }

    /// Follow every recorded anchor: `javascript:` links run in this
    /// window, the rest open child windows.
    pub(super) fn follow_links(&mut self) -> Result<()> {
        for anchor in std::mem::take(&mut self.anchors) {
            let Some(href) = self.attribute(anchor, "href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let is_script = href
                .get(.."javascript:".len())
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"));
            if is_script {
                self.window.eval_script(fix(href), None);
                continue;
            }

            let Some(response) = self.fetch(href, Vec::new(), RedirectType::Href)? else {
                continue;
            };
            if response.is_not_found() {
                continue;
            }
            let url = response.url.clone();
            self.spawn(url, &response)?;
        }
        Ok(())
    }
}
