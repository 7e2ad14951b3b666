#![allow(dead_code)]

use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use honeyclient::{Dft, Document, Options, RunSummary, Session, StaticFetcher, Window};
use url::Url;

pub const PAGE: &str = "http://h/index.html";

pub struct Harness {
    pub fetcher: Rc<StaticFetcher>,
    pub session: Rc<Session>,
}

impl Harness {
    pub fn new(options: Options) -> Self {
        let fetcher = Rc::new(StaticFetcher::new());
        let session = Rc::new(Session::new(options, fetcher.clone()).expect("session"));
        Self { fetcher, session }
    }

    pub fn with_events(events: &[&str]) -> Self {
        Self::new(Options {
            events: events.iter().map(|event| event.to_string()).collect(),
            ..Options::default()
        })
    }

    /// Window at [`PAGE`] holding `html`, without fetching it.
    pub fn window(&self, html: &str) -> Window {
        self.window_at(PAGE, html)
    }

    pub fn window_at(&self, url: &str, html: &str) -> Window {
        Window::new(
            Rc::clone(&self.session),
            Url::parse(url).expect("url"),
            Document::parse(html),
        )
        .expect("window")
    }

    pub fn run(&self, window: &Window) -> RunSummary {
        Dft::new(window).run().expect("dft run")
    }
}

pub fn global_string(window: &Window, expression: &str) -> String {
    window
        .context()
        .eval_with(&format!("String({expression})"), "global_string.js")
        .expect("global expression")
}

/// Run `f` with a subscriber that records formatted events, returning the
/// result and everything logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().expect("log buffer")).into_owned();
    (result, logs)
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
