//! Inline event handler compilation.
//!
//! An HTML attribute such as `onclick="go()"` becomes a function whose bare
//! identifiers resolve against the element, then its form, then the
//! document. Legacy IE builds a function with no parameter that reads the
//! ambient `window.event`; everything else receives the event as `event`.

/// Closure source for an inline handler body.
pub fn handler_source(body: &str, legacy_ie: bool) -> String {
    if legacy_ie {
        format!(
            "(function() {{ with(document) {{ with(this.form || {{}}) {{ with(this) {{ event = window.event; {body}\n }} }} }} }})"
        )
    } else {
        format!(
            "(function(event) {{ with(document) {{ with(this.form || {{}}) {{ with(this) {{ {body}\n }} }} }} }})"
        )
    }
}

fn shift<'a>(script: &'a str, prefix: &str) -> &'a str {
    match script.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => script[prefix.len()..].trim_start(),
        _ => script,
    }
}

/// Strip a leading `javascript:` scheme and a leading `return`.
pub fn fix(script: &str) -> &str {
    shift(shift(script, "javascript:"), "return")
}

/// Argument names of a `for`/`event` script binding such as
/// `PlayStateChange(newState, oldState)`.
pub fn script_for_event_params(event: &str) -> Option<Vec<String>> {
    let (_, rest) = event.split_once('(')?;
    let inner = rest.split(')').next().unwrap_or_default();
    let params: Vec<String> = inner.split(',').map(|p| p.trim().to_string()).collect();
    if params.iter().all(|p| p.is_empty()) {
        return None;
    }
    Some(params)
}

/// Assignments simulating a media play state change: the last argument
/// receives the new state (0), the one before it the old state (3).
pub fn play_state_assignments(params: &[String]) -> Vec<String> {
    let mut assignments = Vec::new();
    let mut remaining = params.iter().rev().filter(|name| is_identifier(name));
    if let Some(new_state) = remaining.next() {
        assignments.push(format!("{new_state} = 0;"));
    }
    if let Some(old_state) = remaining.next() {
        assignments.push(format!("{old_state} = 3;"));
    }
    assignments
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_ie_reads_window_event() {
        let source = handler_source("x = 1", true);
        assert!(source.starts_with("(function() {"));
        assert!(source.contains("event = window.event; x = 1"));
        let modern = handler_source("x = 1", false);
        assert!(modern.starts_with("(function(event) {"));
        assert!(!modern.contains("window.event"));
        assert!(modern.contains("with(this.form || {})"));
    }

    #[test]
    fn fix_strips_prefixes() {
        assert_eq!(fix("javascript:return go()"), "go()");
        assert_eq!(fix("JavaScript: alert(1)"), "alert(1)");
        assert_eq!(fix("go()"), "go()");
    }

    #[test]
    fn play_state_binding() {
        let params = script_for_event_params("PlayStateChange(oldState, newState)").unwrap();
        assert_eq!(params, vec!["oldState", "newState"]);
        assert_eq!(
            play_state_assignments(&params),
            vec!["newState = 0;", "oldState = 3;"]
        );
        assert!(script_for_event_params("onload").is_none());
        assert!(script_for_event_params("go()").is_none());
    }
}
