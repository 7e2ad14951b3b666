mod common;

use common::{global_string, Harness};
use honeyclient::dft::HandlerSource;
use honeyclient::{Dft, Options};

#[test]
fn window_then_document_then_elements() {
    let harness = Harness::new(Options::default());
    let window = harness.window(
        r#"<html><head><script>
            var log = [];
            window.onload = function () { log.push('window'); };
            document.onload = function () { log.push('document'); };
        </script></head><body><div id="d">x</div>
        <script>
            document.getElementById('d').addEventListener('load', function () { log.push('element'); }, false);
            window.addEventListener('load', function () { log.push('root'); }, false);
        </script></body></html>"#,
    );
    let summary = harness.run(&window);
    assert_eq!(
        global_string(&window, "log.join(',')"),
        "window,document,root,element"
    );
    assert_eq!(summary.events_dispatched, 4);
}

#[test]
fn element_events_fire_once_per_node() {
    // `load` is listed twice; the element pass still fires it once per node.
    let harness = Harness::with_events(&["load", "click"]);
    let window = harness.window(
        r#"<body><div id="d" onclick="clicks = (window.clicks || 0) + 1">x</div>
        <script>
            var loads = 0;
            var d = document.getElementById('d');
            d.addEventListener('load', function () { loads += 1; }, false);
            d.addEventListener('load', function () { loads += 10; }, false);
        </script></body>"#,
    );
    let summary = harness.run(&window);
    assert_eq!(global_string(&window, "loads"), "11");
    assert_eq!(global_string(&window, "clicks"), "1");
    assert_eq!(summary.events_dispatched, 2);
}

#[test]
fn repeated_event_names_fire_window_handlers_again() {
    let harness = Harness::with_events(&["load"]);
    let window = harness.window(
        r#"<body><script>
            var windowLoads = 0;
            window.onload = function () { windowLoads += 1; };
        </script></body>"#,
    );
    let summary = harness.run(&window);
    assert_eq!(global_string(&window, "windowLoads"), "2");
    assert_eq!(summary.events_dispatched, 2);
}

#[test]
fn body_onload_belongs_to_the_window() {
    let harness = Harness::new(Options::default());
    let window = harness.window(
        r#"<body onload="bodyLoaded = (window.bodyLoaded || 0) + 1"><p>x</p></body>"#,
    );
    harness.run(&window);
    assert_eq!(global_string(&window, "bodyLoaded"), "1");

    let document = window.document();
    let document = document.borrow();
    let body = document.body().expect("body");
    assert!(document.listeners(body).is_empty());
    assert_eq!(global_string(&window, "typeof window.onload"), "function");
}

#[test]
fn legacy_ie_handlers_read_window_event() {
    let harness = Harness::new(Options::default());
    let window = harness.window(r#"<body onload="kind = event.type"></body>"#);
    harness.run(&window);
    assert_eq!(global_string(&window, "kind"), "load");
    assert_eq!(global_string(&window, "window.event.type"), "load");
}

#[test]
fn standard_handlers_receive_the_event() {
    let harness = Harness::new(Options {
        personality: "winxpfirefox12".into(),
        ..Options::default()
    });
    let window = harness.window(
        r#"<body onload="kind = event.type + ':' + event.eventPhase"></body>"#,
    );
    harness.run(&window);
    assert_eq!(global_string(&window, "kind"), "load:2");
    assert_eq!(global_string(&window, "typeof window.event"), "undefined");
}

#[test]
fn failing_handler_does_not_stop_later_events() {
    let harness = Harness::with_events(&["click"]);
    let window = harness.window(
        r#"<body>
        <script>window.onload = function () { throw new Error('broken'); };</script>
        <a id="a" onclick="clicked = true">go</a>
        </body>"#,
    );
    harness.run(&window);
    assert_eq!(global_string(&window, "clicked"), "true");
}

#[test]
fn unhandled_events_are_not_attached() {
    let harness = Harness::new(Options::default());
    let window = harness.window(r#"<body><div id="d" onclick="clicked = true">x</div></body>"#);
    let summary = harness.run(&window);
    assert_eq!(summary.handlers_attached, 0);
    assert_eq!(global_string(&window, "typeof clicked"), "undefined");
}

#[test]
fn non_javascript_language_skips_inline_handlers() {
    let harness = Harness::with_events(&["click"]);
    let window = harness.window(
        r#"<body><div language="vbscript" onclick="clicked = true">x</div></body>"#,
    );
    let summary = harness.run(&window);
    assert_eq!(summary.handlers_attached, 0);
}

#[test]
fn named_global_handlers_are_resolved() {
    let harness = Harness::new(Options::default());
    let window = harness.window(r#"<body><div id="d">x</div></body>"#);
    assert!(window.eval_script("function init() { inits = (window.inits || 0) + 1; }", None));
    let div = window
        .document()
        .borrow()
        .find_by_id("d")
        .expect("div");

    let mut dft = Dft::new(&window);
    dft.attach_event(div, "onload", HandlerSource::Global("init"))
        .expect("attach init");
    dft.attach_event(div, "onload", HandlerSource::Global("missing"))
        .expect("missing global is ignored");
    let summary = dft.run().expect("dft run");

    assert_eq!(global_string(&window, "inits"), "1");
    assert_eq!(summary.handlers_attached, 1);
    assert_eq!(summary.events_dispatched, 1);
}
