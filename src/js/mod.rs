mod beautify;
mod environment;
mod handler;
mod runtime;

pub use beautify::{beautify_or_raw, BeautifyError, Beautifier, BraceBeautifier};
pub use environment::{LocationParts, ScriptContext, ScriptGlobals};
pub use handler::{fix, handler_source, play_state_assignments, script_for_event_params};
pub use runtime::QuickJsEngine;
