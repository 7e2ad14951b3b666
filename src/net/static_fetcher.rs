use std::cell::RefCell;
use std::collections::HashMap;

use url::Url;

use super::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// In-memory fetcher serving canned responses and recording every request.
///
/// Unknown URLs answer `404`. URLs registered with [`StaticFetcher::fail`]
/// produce a network error instead.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: RefCell<HashMap<String, Route>>,
    failing: RefCell<Vec<String>>,
    requests: RefCell<Vec<FetchRequest>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, content_type: &str, body: &str) -> &Self {
        self.insert(url, 200, Some(content_type), body.as_bytes())
    }

    pub fn route_status(&self, url: &str, status: u16, body: &str) -> &Self {
        self.insert(url, status, None, body.as_bytes())
    }

    pub fn fail(&self, url: &str) -> &Self {
        self.failing.borrow_mut().push(normalize(url));
        self
    }

    fn insert(&self, url: &str, status: u16, content_type: Option<&str>, body: &[u8]) -> &Self {
        self.routes.borrow_mut().insert(
            normalize(url),
            Route {
                status,
                content_type: content_type.map(str::to_string),
                body: body.to_vec(),
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.borrow().clone()
    }

    pub fn requests_for(&self, url: &str) -> Vec<FetchRequest> {
        let wanted = normalize(url);
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.url.as_str() == wanted)
            .cloned()
            .collect()
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(String::from)
        .unwrap_or_else(|_| url.to_string())
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests.borrow_mut().push(request.clone());
        let key = request.url.as_str().to_string();
        if self.failing.borrow().contains(&key) {
            return Err(FetchError::Network(format!("connection refused: {key}")));
        }
        let response = match self.routes.borrow().get(&key) {
            Some(route) => FetchResponse {
                url: request.url.clone(),
                status: route.status,
                headers: route
                    .content_type
                    .iter()
                    .map(|value| ("Content-Type".to_string(), value.clone()))
                    .collect(),
                body: route.body.clone(),
            },
            None => FetchResponse {
                url: request.url.clone(),
                status: 404,
                headers: Vec::new(),
                body: b"Not Found".to_vec(),
            },
        };
        Ok(response)
    }
}
