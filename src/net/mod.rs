mod fetch;
mod mime;
mod static_fetcher;

pub use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, HttpFetcher, RedirectType};
pub use mime::{MimeHandler, MimeRegistry};
pub use static_fetcher::StaticFetcher;
