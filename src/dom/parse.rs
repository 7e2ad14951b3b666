use kuchiki::traits::*;
use kuchiki::{parse_html, NodeData, NodeRef};

use super::tree::{Document, DomError, NodeId};

impl Document {
    /// Parse a complete HTML document.
    pub fn parse(html: &str) -> Self {
        let parsed = parse_html().one(html);
        let mut document = Document::new();
        let root = document.root();
        for child in parsed.children() {
            import_node(&mut document, Some(root), &child);
        }
        document
    }

    /// Parse `html` as body content and return the detached top-level nodes.
    pub fn parse_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let wrapped = format!("<body>{html}");
        let parsed = parse_html().one(wrapped.as_str());
        let Ok(body) = parsed.select_first("body") else {
            return Vec::new();
        };
        body.as_node()
            .children()
            .filter_map(|child| import_node(self, None, &child))
            .collect()
    }

    /// Insert parsed markup after `anchor` (or at the end of the body when
    /// there is no anchor) and return the last inserted top-level node.
    pub fn write_after(
        &mut self,
        anchor: Option<NodeId>,
        html: &str,
    ) -> Result<Option<NodeId>, DomError> {
        let nodes = self.parse_fragment(html);
        let mut cursor = anchor.filter(|node| self.parent(*node).is_some());
        let container = self
            .body()
            .or_else(|| self.document_element())
            .unwrap_or_else(|| self.root());
        for node in &nodes {
            match cursor {
                Some(previous) => self.insert_after(previous, *node)?,
                None => self.append_child(container, *node)?,
            }
            cursor = Some(*node);
        }
        Ok(nodes.last().copied())
    }

    /// Replace every child of `id` with the parsed markup.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> Result<(), DomError> {
        let existing: Vec<NodeId> = self.children(id).to_vec();
        for child in existing {
            self.remove_child(id, child)?;
        }
        for node in self.parse_fragment(html) {
            self.append_child(id, node)?;
        }
        Ok(())
    }
}

fn import_node(document: &mut Document, parent: Option<NodeId>, node: &NodeRef) -> Option<NodeId> {
    let id = match node.data() {
        NodeData::Element(element) => {
            let attrs = element
                .attributes
                .borrow()
                .map
                .iter()
                .map(|(name, attr)| (name.local.to_string(), attr.value.clone()))
                .collect();
            document.create_element_with(&element.name.local, attrs)
        }
        NodeData::Text(text) => document.create_text(&text.borrow()),
        NodeData::Comment(comment) => document.create_comment(&comment.borrow()),
        _ => return None,
    };
    if let Some(parent) = parent {
        document.append_child(parent, id).ok()?;
    }
    for child in node.children() {
        import_node(document, Some(id), &child);
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_into_arena() {
        let doc = Document::parse(
            "<html><head><script src=\"a.js\"></script></head><body><p ID=x>hi</p></body></html>",
        );
        let tags: Vec<&str> = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|node| doc.tag_name(node))
            .collect();
        assert_eq!(tags, vec!["html", "head", "script", "body", "p"]);
        let p = doc.find_by_id("x").unwrap();
        assert_eq!(doc.text_content(p), "hi");
        let script = doc.elements_by_tag("script")[0];
        assert_eq!(doc.attribute(script, "SRC"), Some("a.js"));
    }

    #[test]
    fn write_after_inserts_in_order() {
        let mut doc = Document::parse("<body><script>x</script><p>tail</p></body>");
        let script = doc.elements_by_tag("script")[0];
        let last = doc.write_after(Some(script), "<i>1</i><b>2</b>").unwrap();
        let body = doc.body().unwrap();
        let tags: Vec<&str> = doc
            .children(body)
            .iter()
            .filter_map(|node| doc.tag_name(*node))
            .collect();
        assert_eq!(tags, vec!["script", "i", "b", "p"]);
        assert_eq!(last.and_then(|node| doc.tag_name(node)), Some("b"));
    }

    #[test]
    fn write_without_anchor_appends_to_body() {
        let mut doc = Document::parse("<body><p>a</p></body>");
        doc.write_after(None, "<span>b</span>").unwrap();
        let body = doc.body().unwrap();
        let last = *doc.children(body).last().unwrap();
        assert_eq!(doc.tag_name(last), Some("span"));
    }

    #[test]
    fn fragment_scripts_stay_in_body() {
        let mut doc = Document::new();
        let nodes = doc.parse_fragment("<script>var a = 1;</script>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.tag_name(nodes[0]), Some("script"));
        assert_eq!(doc.text_content(nodes[0]), "var a = 1;");
    }

    #[test]
    fn inner_html_round_trip() {
        let mut doc = Document::parse("<body><div id=d><p>old</p></div></body>");
        let div = doc.find_by_id("d").unwrap();
        doc.set_inner_html(div, "<em>new</em>").unwrap();
        assert_eq!(doc.inner_html(div), "<em>new</em>");
    }
}
