use std::rc::Rc;
use std::time::Duration;

use crate::config::{ConfigError, Options};
use crate::js::{Beautifier, BraceBeautifier};
use crate::net::{FetchError, Fetcher, HttpFetcher, MimeRegistry};
use crate::personality::Personality;

use super::scheme::SchemeRegistry;

/// Everything the browsing contexts of one analysis share.
pub struct Session {
    options: Options,
    personality: &'static Personality,
    fetcher: Rc<dyn Fetcher>,
    mime: MimeRegistry,
    beautifier: Box<dyn Beautifier>,
    schemes: SchemeRegistry,
}

impl Session {
    pub fn new(options: Options, fetcher: Rc<dyn Fetcher>) -> Result<Self, ConfigError> {
        let personality = options.personality()?;
        Ok(Self {
            options,
            personality,
            fetcher,
            mime: MimeRegistry::default(),
            beautifier: Box::new(BraceBeautifier::default()),
            schemes: SchemeRegistry::default(),
        })
    }

    /// Session backed by the network.
    pub fn http(options: Options) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(options.fetch_timeout_secs);
        let fetcher: Rc<dyn Fetcher> = Rc::new(HttpFetcher::new(timeout).map_err(
            |err: FetchError| anyhow::anyhow!("failed to set up fetcher: {err}"),
        )?);
        Ok(Self::new(options, fetcher)?)
    }

    pub fn with_mime_registry(mut self, mime: MimeRegistry) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_beautifier(mut self, beautifier: Box<dyn Beautifier>) -> Self {
        self.beautifier = beautifier;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn personality(&self) -> &'static Personality {
        self.personality
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn mime(&self) -> &MimeRegistry {
        &self.mime
    }

    pub fn beautifier(&self) -> &dyn Beautifier {
        self.beautifier.as_ref()
    }

    pub fn schemes(&self) -> &SchemeRegistry {
        &self.schemes
    }

    /// User agent the Java plugin would send, when the personality has one.
    pub fn java_user_agent(&self) -> Option<String> {
        self.personality.java_user_agent(&self.options.java_plugin)
    }
}
