use std::collections::HashSet;

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use thiserror::Error;

use super::event::{HandlerId, Listener};

/// Stable index of a node inside a [`Document`] arena.
///
/// Ids are never reused: a node removed from the tree keeps its slot, so
/// snapshots taken before a mutation can still be compared against the
/// tree afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn from_handle(handle: u32) -> Self {
        Self(handle as usize)
    }

    pub fn handle(self) -> u32 {
        self.0 as u32
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(usize),
    #[error("node {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: usize, child: usize },
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: usize, child: usize },
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag_name: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    realized: bool,
    listeners: Vec<Listener>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            kind,
            realized: false,
            listeners: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut root = Node::new(NodeKind::Document);
        root.realized = true;
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id.0))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Lower-cased tag name, `None` for non-element nodes.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag_name.as_str())
    }

    pub fn node_type(&self, id: NodeId) -> Option<u8> {
        self.node(id).map(|node| match node.kind {
            NodeKind::Element(_) => 1,
            NodeKind::Text(_) => 3,
            NodeKind::Comment(_) => 8,
            NodeKind::Document => 9,
        })
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.element(id)
            .map(|element| element.attrs.clone())
            .unwrap_or_default()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self.element_mut(id).ok_or(DomError::UnknownNode(id.0))?;
        let name = name.to_ascii_lowercase();
        match element.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attrs.push((name, value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let element = self.element_mut(id).ok_or(DomError::UnknownNode(id.0))?;
        element.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    /// Pre-order snapshot of every node below `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn ancestor_with_tag(&self, id: NodeId, tags: &[&str]) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if let Some(tag) = self.tag_name(node) {
                if tags.contains(&tag) {
                    return Some(node);
                }
            }
            current = self.parent(node);
        }
        None
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|child| self.tag_name(*child).is_some())
    }

    pub fn body(&self) -> Option<NodeId> {
        self.elements_by_tag("body").into_iter().next()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.elements_by_tag("head").into_iter().next()
    }

    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.attribute(*node, "id") == Some(value))
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let wildcard = tag == "*";
        self.descendants(self.root)
            .into_iter()
            .filter(|node| match self.tag_name(*node) {
                Some(name) => wildcard || name.eq_ignore_ascii_case(tag),
                None => false,
            })
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        if let Some(NodeKind::Text(value)) = self.node(id).map(|node| &node.kind) {
            text.push_str(value);
        }
        for node in self.descendants(id) {
            if let Some(NodeKind::Text(value)) = self.node(node).map(|node| &node.kind) {
                text.push_str(value);
            }
        }
        text
    }

    /// Character data of a text or comment node.
    pub fn node_value(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Text(value) | NodeKind::Comment(value) => Some(value),
            _ => None,
        }
    }

    /// Replace every child of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        if let NodeKind::Text(text) | NodeKind::Comment(text) = &mut self.node_mut(id)?.kind {
            *text = value.to_string();
            return Ok(());
        }
        let existing: Vec<NodeId> = self.children(id).to_vec();
        for child in existing {
            self.remove_child(id, child)?;
        }
        if !value.is_empty() {
            let text = self.create_text(value);
            self.append_child(id, text)?;
        }
        Ok(())
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.create_element_with(tag_name, Vec::new())
    }

    pub fn create_element_with(&mut self, tag_name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs,
        }))
    }

    pub fn create_text(&mut self, value: &str) -> NodeId {
        self.push(NodeKind::Text(value.to_string()))
    }

    pub fn create_comment(&mut self, value: &str) -> NodeId {
        self.push(NodeKind::Comment(value.to_string()))
    }

    fn detach(&mut self, child: NodeId) -> Result<(), DomError> {
        if let Some(parent) = self.node_mut(child)?.parent.take() {
            self.node_mut(parent)?.children.retain(|node| *node != child);
        }
        Ok(())
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.node(parent).is_none() {
            return Err(DomError::UnknownNode(parent.0));
        }
        if self.node(child).is_none() {
            return Err(DomError::UnknownNode(child.0));
        }
        let mut current = Some(parent);
        while let Some(node) = current {
            if node == child {
                return Err(DomError::HierarchyRequest {
                    parent: parent.0,
                    child: child.0,
                });
            }
            current = self.parent(node);
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertion(parent, child)?;
        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        self.check_insertion(parent, child)?;
        if self.parent(reference) != Some(parent) {
            return Err(DomError::NotAChild {
                parent: parent.0,
                child: reference.0,
            });
        }
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let position = siblings
            .iter()
            .position(|node| *node == reference)
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Insert `child` right after `anchor` under the anchor's parent.
    pub fn insert_after(&mut self, anchor: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent = self.parent(anchor).ok_or(DomError::UnknownNode(anchor.0))?;
        let next = {
            let siblings = self.children(parent);
            siblings
                .iter()
                .position(|node| *node == anchor)
                .and_then(|index| siblings.get(index + 1).copied())
        };
        self.insert_before(parent, child, next)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild {
                parent: parent.0,
                child: child.0,
            });
        }
        self.detach(child)
    }

    pub fn is_realized(&self, id: NodeId) -> bool {
        self.node(id).map(|node| node.realized).unwrap_or(false)
    }

    /// Mark a node as having a live script-side object.
    pub fn realize(&mut self, id: NodeId) -> Result<(), DomError> {
        self.node_mut(id)?.realized = true;
        Ok(())
    }

    /// Register a listener; duplicates of the same (type, handler, capture)
    /// triple are ignored. `priority` listeners go to the front.
    pub fn add_listener(
        &mut self,
        id: NodeId,
        listener: Listener,
        priority: bool,
    ) -> Result<bool, DomError> {
        let node = self.node_mut(id)?;
        if node.listeners.contains(&listener) {
            return Ok(false);
        }
        if priority {
            node.listeners.insert(0, listener);
        } else {
            node.listeners.push(listener);
        }
        Ok(true)
    }

    pub fn remove_listener(
        &mut self,
        id: NodeId,
        event_type: &str,
        handler: HandlerId,
        capture: bool,
    ) -> Result<(), DomError> {
        self.node_mut(id)?.listeners.retain(|listener| {
            !(listener.event_type == event_type
                && listener.handler == handler
                && listener.capture == capture)
        });
        Ok(())
    }

    pub fn listeners(&self, id: NodeId) -> &[Listener] {
        self.node(id)
            .map(|node| node.listeners.as_slice())
            .unwrap_or(&[])
    }

    pub fn listeners_for(&self, id: NodeId, event_type: &str) -> Vec<HandlerId> {
        self.listeners(id)
            .iter()
            .filter(|listener| listener.event_type == event_type)
            .map(|listener| listener.handler)
            .collect()
    }

    /// Nodes present in `current` but not in `baseline`, in document order.
    pub fn appeared(baseline: &HashSet<NodeId>, current: &[NodeId]) -> Vec<NodeId> {
        current
            .iter()
            .copied()
            .filter(|node| !baseline.contains(node))
            .collect()
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_node(id, &mut out, false);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = matches!(self.tag_name(id), Some("script" | "style"));
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize_node(*child, &mut out, raw);
        }
        out
    }

    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    fn serialize_node(&self, id: NodeId, out: &mut String, raw_text: bool) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.serialize_node(*child, out, false);
                }
            }
            NodeKind::Text(value) => {
                if raw_text {
                    out.push_str(value);
                } else {
                    out.push_str(&encode_text(value));
                }
            }
            NodeKind::Comment(value) => {
                out.push_str("<!--");
                out.push_str(value);
                out.push_str("-->");
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&element.tag_name) {
                    return;
                }
                let raw = matches!(element.tag_name.as_str(), "script" | "style");
                for child in &node.children {
                    self.serialize_node(*child, out, raw);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        }
    }
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        let body = doc.create_element("BODY");
        let div = doc.create_element_with("div", vec![("id".into(), "x".into())]);
        doc.append_child(doc.root(), html).unwrap();
        doc.append_child(html, body).unwrap();
        doc.append_child(body, div).unwrap();
        (doc, html, body, div)
    }

    #[test]
    fn descendants_are_preorder() {
        let (mut doc, html, body, div) = sample();
        let text = doc.create_text("hi");
        doc.append_child(div, text).unwrap();
        let span = doc.create_element("span");
        doc.append_child(body, span).unwrap();
        assert_eq!(doc.descendants(doc.root()), vec![html, body, div, text, span]);
        assert_eq!(doc.tag_name(body), Some("body"));
        assert_eq!(doc.find_by_id("x"), Some(div));
    }

    #[test]
    fn insert_after_keeps_order() {
        let (mut doc, _, body, div) = sample();
        let first = doc.create_element("p");
        let second = doc.create_element("p");
        doc.insert_after(div, first).unwrap();
        doc.insert_after(first, second).unwrap();
        assert_eq!(doc.children(body), &[div, first, second]);
    }

    #[test]
    fn removed_nodes_keep_their_id() {
        let (mut doc, _, body, div) = sample();
        doc.remove_child(body, div).unwrap();
        assert!(!doc.is_connected(div));
        assert_eq!(doc.tag_name(div), Some("div"));
        assert_eq!(
            doc.remove_child(body, div),
            Err(DomError::NotAChild {
                parent: body.index(),
                child: div.index()
            })
        );
    }

    #[test]
    fn cannot_insert_ancestor_into_descendant() {
        let (mut doc, html, _, div) = sample();
        assert!(matches!(
            doc.append_child(div, html),
            Err(DomError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn listeners_are_deduplicated_and_prioritised() {
        let (mut doc, _, _, div) = sample();
        let plain = Listener::new("click", HandlerId(1), false);
        let urgent = Listener::new("click", HandlerId(2), true);
        assert!(doc.add_listener(div, plain.clone(), false).unwrap());
        assert!(!doc.add_listener(div, plain, false).unwrap());
        doc.add_listener(div, urgent, true).unwrap();
        assert_eq!(doc.listeners_for(div, "click"), vec![HandlerId(2), HandlerId(1)]);
        assert!(doc.listeners_for(div, "load").is_empty());
    }

    #[test]
    fn serializes_with_escaping() {
        let (mut doc, _, _, div) = sample();
        doc.set_attribute(div, "title", "a\"b").unwrap();
        let text = doc.create_text("1 < 2");
        doc.append_child(div, text).unwrap();
        assert_eq!(
            doc.outer_html(div),
            "<div id=\"x\" title=\"a&quot;b\">1 &lt; 2</div>"
        );
    }

    #[test]
    fn appeared_reports_new_nodes_in_order() {
        let (mut doc, _, body, _) = sample();
        let before: HashSet<NodeId> = doc.descendants(doc.root()).into_iter().collect();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(body, a).unwrap();
        doc.append_child(body, b).unwrap();
        let after = doc.descendants(doc.root());
        assert_eq!(Document::appeared(&before, &after), vec![a, b]);
    }
}
