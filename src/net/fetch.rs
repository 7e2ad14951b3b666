use std::fmt;
use std::fs;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

/// Why a fetch was issued. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectType {
    Navigation,
    ScriptSrc,
    Embed,
    Params,
    Meta,
    Frame,
    IFrame,
    FontFace,
    Href,
}

impl RedirectType {
    pub fn as_str(self) -> &'static str {
        match self {
            RedirectType::Navigation => "navigation",
            RedirectType::ScriptSrc => "script src",
            RedirectType::Embed => "embed",
            RedirectType::Params => "params",
            RedirectType::Meta => "meta",
            RedirectType::Frame => "frame",
            RedirectType::IFrame => "iframe",
            RedirectType::FontFace => "font face",
            RedirectType::Href => "href",
        }
    }
}

impl fmt::Display for RedirectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub redirect_type: RedirectType,
}

impl FetchRequest {
    pub fn new(url: Url, redirect_type: RedirectType) -> Self {
        Self {
            url,
            headers: Vec::new(),
            redirect_type,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("local file `{url}` requested by non-local page `{base}`")]
    LocalFileDenied { url: String, base: String },
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    #[error("invalid header `{0}`")]
    InvalidHeader(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Errors caused by the page or the network rather than by this process.
    /// Call sites treat these as "skip this resource".
    pub fn is_resource_error(&self) -> bool {
        !matches!(self, FetchError::Client(_))
    }
}

/// Transport used by every browsing context of a session.
pub trait Fetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// `reqwest` backed fetcher that also understands `file://` URLs.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        match request.url.scheme() {
            "http" | "https" => {}
            "file" => return fetch_file_url(&request.url),
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }

        let response = self
            .client
            .get(request.url.clone())
            .headers(headers)
            .send()
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|err| FetchError::Network(err.to_string()))?
            .to_vec();

        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

fn fetch_file_url(url: &Url) -> Result<FetchResponse, FetchError> {
    let path = url.to_file_path().map_err(|_| {
        FetchError::File(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "invalid file URL",
        ))
    })?;

    if path.is_dir() {
        return Err(FetchError::File(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path is a directory",
        )));
    }

    let body = fs::read(&path)?;
    let content_type = match path.extension().and_then(|ext| ext.to_str()) {
        Some("html" | "htm") => Some("text/html"),
        Some("js") => Some("application/javascript"),
        Some("pdf") => Some("application/pdf"),
        Some("swf") => Some("application/x-shockwave-flash"),
        Some("jar") => Some("application/x-java-archive"),
        _ => None,
    };

    Ok(FetchResponse {
        url: url.clone(),
        status: 200,
        headers: content_type
            .map(|value| vec![("Content-Type".to_string(), value.to_string())])
            .unwrap_or_default(),
        body,
    })
}
