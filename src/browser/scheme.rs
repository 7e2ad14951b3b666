use std::collections::HashMap;

use anyhow::Result;
use tracing::warn;

use super::window::Window;

/// Handler for a URL scheme that is never fetched.
pub trait SchemeHandler {
    fn handle(&self, window: &Window, url: &str) -> Result<()>;
}

/// `hcp:` (Windows Help Center) URLs smuggle a script through the `svr=`
/// parameter. The script is run in the requesting window.
pub struct HcpHandler;

impl SchemeHandler for HcpHandler {
    fn handle(&self, window: &Window, url: &str) -> Result<()> {
        warn!(target: "dft", url, "Microsoft Internet Explorer HCP scheme detected");
        if let Some(script) = hcp_payload(url) {
            window.eval_script(script, None);
        }
        Ok(())
    }
}

/// Script text between `defer>` and `</script` in the `svr=` parameter.
pub fn hcp_payload(url: &str) -> Option<&str> {
    let (_, svr) = url.split_once("svr=")?;
    let (_, deferred) = svr.split_once("defer>")?;
    let script = deferred.split("</script").next()?;
    (!script.is_empty()).then_some(script)
}

pub struct SchemeRegistry {
    handlers: HashMap<String, Box<dyn SchemeHandler>>,
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register("hcp", Box::new(HcpHandler));
        registry
    }
}

impl SchemeRegistry {
    pub fn register(&mut self, scheme: &str, handler: Box<dyn SchemeHandler>) {
        self.handlers.insert(scheme.to_ascii_lowercase(), handler);
    }

    pub fn lookup(&self, url: &str) -> Option<&dyn SchemeHandler> {
        let (scheme, _) = url.trim_start().split_once(':')?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        self.handlers
            .get(&scheme.to_ascii_lowercase())
            .map(|handler| handler.as_ref())
    }
}
