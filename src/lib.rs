// Library exports for the CLI and tests

pub mod browser;
pub mod config;
pub mod dft;
pub mod dom;
pub mod js;
pub mod net;
pub mod personality;

use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context as _, Result};
use url::Url;

pub use browser::{Session, Window};
pub use config::{ConfigError, Options};
pub use dft::{Dft, RunSummary};
pub use dom::Document;
pub use net::{FetchError, Fetcher, HttpFetcher, StaticFetcher};
pub use personality::Personality;

/// Interpret `target` as a URL, or as a local file path when it does not
/// parse as one.
pub fn resolve_target(target: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(target) {
        // Single letter schemes are Windows drive letters.
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }
    let path = Path::new(target)
        .canonicalize()
        .with_context(|| format!("cannot open {target}"))?;
    Url::from_file_path(&path).map_err(|()| anyhow!("cannot turn {} into a URL", path.display()))
}

/// Load `target` and track its document flow.
pub fn analyze(session: Rc<Session>, target: &str) -> Result<RunSummary> {
    let url = resolve_target(target)?;
    let window = Window::open(session, url)?;
    Dft::new(&window).run()
}
