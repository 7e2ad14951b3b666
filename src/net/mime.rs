use std::collections::HashMap;

use tracing::info;
use url::Url;

/// Consumer for fetched content that must not be parsed as HTML.
pub trait MimeHandler {
    /// Returns `true` when the content was consumed.
    fn handle(&self, url: &Url, content: &[u8]) -> bool;
}

/// Records the resource and consumes it.
struct ObservingHandler {
    kind: &'static str,
}

impl MimeHandler for ObservingHandler {
    fn handle(&self, url: &Url, content: &[u8]) -> bool {
        info!(
            target: "mime",
            kind = self.kind,
            url = %url,
            size = content.len(),
            "content handled"
        );
        true
    }
}

/// Content-type dispatch table.
pub struct MimeRegistry {
    handlers: HashMap<String, Box<dyn MimeHandler>>,
}

impl Default for MimeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (content_type, kind) in [
            ("application/pdf", "pdf"),
            ("application/x-pdf", "pdf"),
            ("application/x-shockwave-flash", "flash"),
            ("application/x-java-archive", "java archive"),
            ("application/java-archive", "java archive"),
        ] {
            registry.register(content_type, Box::new(ObservingHandler { kind }));
        }
        registry
    }
}

impl MimeRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, content_type: &str, handler: Box<dyn MimeHandler>) {
        self.handlers
            .insert(content_type.to_ascii_lowercase(), handler);
    }

    pub fn handler(&self, content_type: &str) -> Option<&dyn MimeHandler> {
        self.handlers
            .get(&essence(content_type))
            .map(|handler| handler.as_ref())
    }

    /// Offer `content` to the handler registered for `content_type`.
    pub fn handle(&self, content_type: &str, url: &Url, content: &[u8]) -> bool {
        self.handler(content_type)
            .is_some_and(|handler| handler.handle(url, content))
    }
}

/// `text/html; charset=utf-8` -> `text/html`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_essence() {
        let registry = MimeRegistry::default();
        let url = Url::parse("http://h/doc.pdf").unwrap();
        assert!(registry.handle("Application/PDF; name=doc.pdf", &url, b"%PDF-1.4"));
        assert!(!registry.handle("text/html; charset=utf-8", &url, b"<p>"));
        assert!(registry.handler("application/x-java-archive").is_some());
    }
}
