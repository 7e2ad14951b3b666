mod common;

use common::{global_string, Harness};
use honeyclient::net::RedirectType;
use honeyclient::Options;

const SELF_REFRESH: &str =
    r#"<html><head><meta http-equiv="refresh" content="0; url=r.html"></head><body></body></html>"#;

fn meta_requests(harness: &Harness) -> usize {
    harness
        .fetcher
        .requests()
        .iter()
        .filter(|request| request.redirect_type == RedirectType::Meta)
        .count()
}

#[test]
fn meta_refresh_is_ignored_by_default() {
    let harness = Harness::new(Options::default());
    harness.fetcher.route("http://h/r.html", "text/html", SELF_REFRESH);
    let window = harness.window_at("http://h/r.html", SELF_REFRESH);
    let summary = harness.run(&window);
    assert_eq!(meta_requests(&harness), 0);
    assert!(summary.children.is_empty());
}

#[test]
fn self_refresh_stops_at_the_ceiling() {
    let harness = Harness::new(Options {
        follow_meta_refresh: true,
        ..Options::default()
    });
    harness.fetcher.route("http://h/r.html", "text/html", SELF_REFRESH);
    let window = harness.window_at("http://h/r.html", SELF_REFRESH);
    let summary = harness.run(&window);
    assert_eq!(meta_requests(&harness), 3);
    assert_eq!(summary.windows(), 4);
}

#[test]
fn refresh_to_missing_page_spawns_nothing() {
    let harness = Harness::new(Options {
        follow_meta_refresh: true,
        ..Options::default()
    });
    let window = harness.window(
        r#"<head><meta http-equiv="Refresh" content="3;URL='gone.html'"></head>"#,
    );
    let summary = harness.run(&window);
    assert_eq!(harness.fetcher.requests_for("http://h/gone.html").len(), 1);
    assert!(summary.children.is_empty());
}

#[test]
fn frames_open_child_windows() {
    let harness = Harness::new(Options {
        follow_frames: true,
        ..Options::default()
    });
    harness.fetcher.route(
        "http://h/inner.html",
        "text/html",
        "<body><script>inner = true;</script></body>",
    );
    harness
        .fetcher
        .route("http://h/doc.pdf", "application/pdf", "%PDF-1.4");
    let window = harness.window(
        r#"<body><iframe src="inner.html"></iframe><iframe src="doc.pdf"></iframe>
        <iframe src="missing.html"></iframe></body>"#,
    );
    let summary = harness.run(&window);

    assert_eq!(summary.children.len(), 1);
    let child = &summary.children[0];
    assert_eq!(child.url, "http://h/inner.html");
    assert_eq!(child.depth, 1);
    assert_eq!(child.scripts_evaluated, 1);

    let iframe_requests = harness
        .fetcher
        .requests()
        .iter()
        .filter(|request| request.redirect_type == RedirectType::IFrame)
        .count();
    assert_eq!(iframe_requests, 3);
}

#[test]
fn frames_are_ignored_by_default() {
    let harness = Harness::new(Options::default());
    let window = harness.window(r#"<body><iframe src="inner.html"></iframe></body>"#);
    harness.run(&window);
    assert!(harness.fetcher.requests().is_empty());
}

#[test]
fn navigation_depth_is_bounded() {
    let page = r#"<body><iframe src="loop.html"></iframe></body>"#;
    let harness = Harness::new(Options {
        follow_frames: true,
        max_navigation_depth: 2,
        ..Options::default()
    });
    harness.fetcher.route("http://h/loop.html", "text/html", page);
    let window = harness.window_at("http://h/loop.html", page);
    let summary = harness.run(&window);
    assert_eq!(summary.windows(), 3);
    assert_eq!(summary.children[0].children[0].depth, 2);
    assert!(summary.children[0].children[0].children.is_empty());
}

#[test]
fn links_are_followed_when_enabled() {
    let harness = Harness::new(Options {
        follow_links: true,
        ..Options::default()
    });
    harness
        .fetcher
        .route("http://h/next.html", "text/html", "<p>next</p>");
    let window = harness.window(
        r##"<body>
        <a href="next.html">next</a>
        <a href="JavaScript: return linked = true">run</a>
        <a href="gone.html">gone</a>
        <a href="#top">top</a>
        </body>"##,
    );
    let summary = harness.run(&window);

    assert_eq!(summary.children.len(), 1);
    assert_eq!(summary.children[0].url, "http://h/next.html");
    assert_eq!(global_string(&window, "linked"), "true");

    let requests = harness.fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|request| request.redirect_type == RedirectType::Href));
}

#[test]
fn hcp_urls_run_their_payload() {
    let harness = Harness::new(Options::default());
    let window = harness.window(
        r#"<body><script src="hcp://services/search?query=a&svr=<script defer>hcpRan = true;</script>"></script></body>"#,
    );
    let summary = harness.run(&window);
    assert!(harness.fetcher.requests().is_empty());
    assert_eq!(summary.scripts_evaluated, 0);
    assert_eq!(global_string(&window, "hcpRan"), "true");
}

#[test]
fn font_face_sources_are_fetched() {
    let harness = Harness::new(Options {
        inspect_font_faces: true,
        ..Options::default()
    });
    let window = harness.window(
        r#"<head><style>
            @font-face { font-family: x; src: url(f.eot), url("g.woff"); }
        </style></head>"#,
    );
    harness.run(&window);
    let fonts: Vec<String> = harness
        .fetcher
        .requests()
        .iter()
        .filter(|request| request.redirect_type == RedirectType::FontFace)
        .map(|request| request.url.to_string())
        .collect();
    assert_eq!(fonts, vec!["http://h/f.eot", "http://h/g.woff"]);
}

#[test]
fn font_face_failure_abandons_the_rule() {
    let harness = Harness::new(Options {
        inspect_font_faces: true,
        ..Options::default()
    });
    harness.fetcher.fail("http://h/f.eot");
    let window = harness.window(
        r#"<head><style>
            @font-face { src: url(f.eot), url(g.woff); }
            @font-face { src: url(h.ttf); }
        </style></head>"#,
    );
    harness.run(&window);
    assert!(harness.fetcher.requests_for("http://h/g.woff").is_empty());
    assert_eq!(harness.fetcher.requests_for("http://h/h.ttf").len(), 1);
}

#[test]
fn font_face_scheme_targets_do_not_abandon_the_rule() {
    let harness = Harness::new(Options {
        inspect_font_faces: true,
        ..Options::default()
    });
    let window = harness.window(
        r#"<head><style>
            @font-face { src: url("hcp://services/search?svr=<script defer>fontHcp = true;</script>"), url(g.woff); }
        </style></head>"#,
    );
    harness.run(&window);
    assert_eq!(global_string(&window, "fontHcp"), "true");
    assert_eq!(harness.fetcher.requests_for("http://h/g.woff").len(), 1);
}

#[test]
fn remote_pages_cannot_load_local_scripts_or_frames() {
    let harness = Harness::new(Options {
        follow_frames: true,
        ..Options::default()
    });
    harness
        .fetcher
        .route("file:///tmp/secret.js", "application/javascript", "leaked = true;")
        .route("file:///tmp/frame.html", "text/html", "<p>local</p>");
    let window = harness.window_at(
        "http://evil.example/",
        r#"<body><script src="file:///tmp/secret.js"></script>
        <iframe src="file:///tmp/frame.html"></iframe></body>"#,
    );
    let summary = harness.run(&window);
    assert_eq!(summary.scripts_evaluated, 0);
    assert!(summary.children.is_empty());
    assert_eq!(global_string(&window, "typeof leaked"), "undefined");
    assert!(harness.fetcher.requests().is_empty());
}
