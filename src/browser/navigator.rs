use std::rc::Rc;

use tracing::{debug, info};
use url::Url;

use crate::net::{FetchError, FetchRequest, FetchResponse, RedirectType};

use super::session::Session;

/// Fetch front end of one window: resolves page-supplied URLs against the
/// window location and adds the personality's identity headers.
pub struct Navigator {
    session: Rc<Session>,
    base: Url,
}

impl Navigator {
    pub fn new(session: Rc<Session>, base: Url) -> Self {
        Self { session, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn resolve(&self, target: &str) -> Result<Url, FetchError> {
        self.base
            .join(target.trim())
            .map_err(|source| FetchError::InvalidUrl {
                url: target.to_string(),
                source,
            })
    }

    pub fn fetch(
        &self,
        target: &str,
        headers: Vec<(String, String)>,
        redirect_type: RedirectType,
    ) -> Result<FetchResponse, FetchError> {
        let url = self.resolve(target)?;
        if url.scheme() == "file" && self.base.scheme() != "file" {
            return Err(FetchError::LocalFileDenied {
                url: url.to_string(),
                base: self.base.to_string(),
            });
        }
        let mut request = FetchRequest::new(url, redirect_type);
        for (name, value) in &headers {
            request.set_header(name, value);
        }
        if request.header("User-Agent").is_none() {
            request.set_header("User-Agent", self.session.personality().user_agent);
        }
        if matches!(self.base.scheme(), "http" | "https") && request.header("Referer").is_none() {
            request.set_header("Referer", self.base.as_str());
        }

        info!(
            target: "navigator",
            redirect_type = %redirect_type,
            url = %request.url,
            "fetch"
        );
        let response = self.session.fetcher().fetch(&request)?;
        debug!(
            target: "navigator",
            url = %response.url,
            status = response.status,
            content_type = response.content_type().unwrap_or_default(),
            "response"
        );
        Ok(response)
    }
}
