use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, warn};

use crate::dom::{Document, NodeId};

use super::handlers::TagHandler;
use super::Dft;

/// Upper bound on consecutive re-scans after a single handler, for pages
/// whose scripts keep growing the tree.
const MAX_RESCAN_ROUNDS: usize = 64;

impl Dft<'_> {
    /// Handle every element in document order, re-scanning whenever a
    /// handler changed the node set, then collect listeners from the final
    /// tree.
    pub(super) fn walk(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        let mut baseline: HashSet<NodeId> = snapshot.iter().copied().collect();

        for node in snapshot {
            if !self.is_connected_element(node) {
                continue;
            }
            self.set_event_handler_attributes(node)?;
            if self.do_handle(node, true)? {
                self.rescan(&mut baseline)?;
            }
        }

        for node in self.snapshot() {
            self.set_event_listeners(node)?;
        }
        self.summary.listeners_registered = self.listeners.len();
        Ok(())
    }

    /// Run the tag handler for `node`. `skip` leaves `object` and `applet`
    /// to their `param` children. Returns whether a handler ran.
    pub(super) fn do_handle(&mut self, node: NodeId, skip: bool) -> Result<bool> {
        let Some(tag) = self.tag_name(node) else {
            return Ok(false);
        };
        if skip && matches!(tag.as_str(), "object" | "applet") {
            return Ok(false);
        }
        let Some(handler) = TagHandler::for_tag(&tag) else {
            return Ok(false);
        };
        self.handle_tag(handler, node)?;
        Ok(true)
    }

    fn rescan(&mut self, baseline: &mut HashSet<NodeId>) -> Result<()> {
        for _ in 0..MAX_RESCAN_ROUNDS {
            let current = self.snapshot();
            let fresh = Document::appeared(baseline, &current);
            baseline.extend(current);
            if fresh.is_empty() {
                return Ok(());
            }
            debug!(target: "dft", nodes = fresh.len(), "document mutated");
            for node in fresh {
                if !self.is_connected_element(node) {
                    continue;
                }
                self.set_event_handler_attributes(node)?;
                self.do_handle(node, false)?;
            }
        }
        warn!(
            target: "dft",
            rounds = MAX_RESCAN_ROUNDS,
            "document keeps mutating, giving up re-scan"
        );
        Ok(())
    }

    fn snapshot(&self) -> Vec<NodeId> {
        let document = self.window.document();
        let document = document.borrow();
        document.descendants(document.root())
    }

    fn is_connected_element(&self, node: NodeId) -> bool {
        let document = self.window.document();
        let document = document.borrow();
        document.element(node).is_some() && document.is_connected(node)
    }
}
