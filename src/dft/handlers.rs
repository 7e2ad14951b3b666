use std::collections::HashMap;

use anyhow::Result;
use cssparser::{ParseError, Parser, ParserInput, Token};
use tracing::{info, warn};

use crate::dom::NodeId;
use crate::js::{beautify_or_raw, play_state_assignments, script_for_event_params};
use crate::net::RedirectType;

use super::{Dft, Fetched};

const JAVA_ARCHIVE: &str = "application/x-java-archive";

/// Meta refresh attempts allowed per target URL.
const META_REFRESH_CEILING: u32 = 3;

/// Tag specific behavior, looked up by lower-cased tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagHandler {
    Script,
    NoScript,
    Embed,
    Object,
    Applet,
    Param,
    Meta,
    Frame,
    IFrame,
    Body,
    Style,
    Anchor,
}

impl TagHandler {
    pub fn for_tag(tag: &str) -> Option<Self> {
        let handler = match tag.to_ascii_lowercase().as_str() {
            "script" => Self::Script,
            "noscript" => Self::NoScript,
            "embed" => Self::Embed,
            "object" => Self::Object,
            "applet" => Self::Applet,
            "param" => Self::Param,
            "meta" => Self::Meta,
            "frame" => Self::Frame,
            "iframe" => Self::IFrame,
            "body" => Self::Body,
            "style" => Self::Style,
            "a" => Self::Anchor,
            _ => return None,
        };
        Some(handler)
    }
}

impl Dft<'_> {
    pub(super) fn handle_tag(&mut self, handler: TagHandler, node: NodeId) -> Result<()> {
        match handler {
            TagHandler::Script => self.handle_script(node),
            TagHandler::NoScript | TagHandler::Body => Ok(()),
            TagHandler::Embed => self.handle_embed(node),
            TagHandler::Object | TagHandler::Applet => self.handle_params(node),
            TagHandler::Param => {
                let container = self
                    .window
                    .document()
                    .borrow()
                    .ancestor_with_tag(node, &["object", "applet"]);
                match container {
                    Some(container) => self.handle_params(container),
                    None => Ok(()),
                }
            }
            TagHandler::Meta => self.handle_meta(node),
            TagHandler::Frame => self.handle_frame(node, RedirectType::Frame),
            TagHandler::IFrame => self.handle_frame(node, RedirectType::IFrame),
            TagHandler::Style => self.handle_style(node),
            TagHandler::Anchor => {
                if self.attribute(node, "href").is_some() {
                    self.anchors.push(node);
                }
                Ok(())
            }
        }
    }

    fn handle_script(&mut self, node: NodeId) -> Result<()> {
        let window = self.window;
        let language = script_language(
            self.attribute(node, "language").as_deref(),
            self.attribute(node, "type").as_deref(),
        );
        if language != "javascript" {
            warn!(target: "dft", language = %language, "unhandled script language");
            return Ok(());
        }

        if window.session().personality().is_ie() {
            self.handle_script_for_event(node);
        }

        let source = match self.attribute(node, "src") {
            Some(src) => {
                let Some(response) = self.fetch(&src, Vec::new(), RedirectType::ScriptSrc)? else {
                    return Ok(());
                };
                if response.is_not_found() {
                    return Ok(());
                }
                response.text()
            }
            None => window.document().borrow().text_content(node),
        };
        if source.trim().is_empty() {
            return Ok(());
        }

        info!(
            target: "dft",
            "{}",
            beautify_or_raw(window.session().beautifier(), &source)
        );
        window.eval_script(&source, Some(node));
        self.summary.scripts_evaluated += 1;
        Ok(())
    }

    /// `<script for=player event="PlayStateChange(a, b)">` bindings get the
    /// state arguments a media player would pass.
    fn handle_script_for_event(&self, node: NodeId) {
        let (Some(_), Some(event)) = (self.attribute(node, "for"), self.attribute(node, "event"))
        else {
            return;
        };
        if !event.to_ascii_lowercase().contains("playstatechange") {
            return;
        }
        let Some(params) = script_for_event_params(&event) else {
            return;
        };
        for assignment in play_state_assignments(&params) {
            self.window.eval_script(&assignment, None);
        }
    }

    fn handle_embed(&mut self, node: NodeId) -> Result<()> {
        if !self.handled_once.insert(node) {
            return Ok(());
        }
        let markup = self.window.document().borrow().outer_html(node);
        warn!(target: "dft", embed = %markup, "embed");

        let Some(src) = self.attribute(node, "src") else {
            return Ok(());
        };
        let mut headers = Vec::new();
        if let Some(content_type) = self.attribute(node, "type") {
            headers.push(("Content-Type".to_string(), content_type));
        }
        if let Some(response) = self.fetch(&src, headers, RedirectType::Embed)? {
            self.consume_mime(&response);
        }
        Ok(())
    }

    /// Collect the `param` children of an `object` or `applet` and fetch the
    /// resources they name.
    fn handle_params(&mut self, container: NodeId) -> Result<()> {
        if !self.handled_once.insert(container) {
            return Ok(());
        }
        let is_applet = self.tag_name(container).as_deref() == Some("applet");

        let mut params = HashMap::new();
        let mut embeds = Vec::new();
        {
            let document = self.window.document();
            let document = document.borrow();
            for child in document.descendants(container) {
                match document.tag_name(child) {
                    Some("param") => {
                        let name = document.attribute(child, "name");
                        let value = document.attribute(child, "value");
                        if let (Some(name), Some(value)) = (name, value) {
                            params.insert(name.to_ascii_lowercase(), value.to_string());
                        }
                    }
                    Some("embed") => embeds.push(child),
                    _ => {}
                }
            }
        }

        for embed in embeds {
            self.handle_embed(embed)?;
        }
        if params.is_empty() {
            return Ok(());
        }

        let mut headers = vec![("Connection".to_string(), "keep-alive".to_string())];
        let java_archive =
            is_applet || params.contains_key("code") || params.contains_key("archive");
        let content_type = match params.get("type") {
            Some(content_type) => Some(content_type.clone()),
            None if java_archive => Some(JAVA_ARCHIVE.to_string()),
            None => None,
        };
        if let Some(content_type) = content_type {
            if content_type.contains("java") {
                if let Some(user_agent) = self.window.session().java_user_agent() {
                    headers.push(("User-Agent".to_string(), user_agent));
                }
            }
            headers.push(("Content-Type".to_string(), content_type));
        }

        for key in ["filename", "movie"] {
            if let Some(target) = params.get(key) {
                if let Some(response) = self.fetch(target, headers.clone(), RedirectType::Params)? {
                    self.consume_mime(&response);
                }
            }
        }

        let Some(archive) = params.get("archive") else {
            return Ok(());
        };
        let archive = match params.get("codebase") {
            Some(codebase) => format!("{codebase}{archive}"),
            None => archive.clone(),
        };
        if let Some(response) = self.fetch(&archive, headers, RedirectType::Params)? {
            self.consume_mime(&response);
        }
        Ok(())
    }

    fn handle_meta(&mut self, node: NodeId) -> Result<()> {
        if !self.window.session().options().follow_meta_refresh {
            return Ok(());
        }
        let refresh = self
            .attribute(node, "http-equiv")
            .is_some_and(|value| value.eq_ignore_ascii_case("refresh"));
        if !refresh {
            return Ok(());
        }
        let Some(target) = self
            .attribute(node, "content")
            .and_then(|content| refresh_target(&content))
        else {
            return Ok(());
        };

        let key = self
            .window
            .navigator()
            .resolve(&target)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| target.clone());
        let attempts = self.meta.borrow().get(&key).copied().unwrap_or(0);
        if attempts >= META_REFRESH_CEILING {
            info!(target: "dft", url = %key, attempts, "meta refresh ceiling reached");
            return Ok(());
        }

        let Some(response) = self.fetch(&target, Vec::new(), RedirectType::Meta)? else {
            return Ok(());
        };
        if response.is_not_found() {
            return Ok(());
        }
        *self.meta.borrow_mut().entry(key).or_insert(0) += 1;

        let url = response.url.clone();
        self.spawn(url, &response)
    }

    fn handle_frame(&mut self, node: NodeId, redirect_type: RedirectType) -> Result<()> {
        if !self.window.session().options().follow_frames {
            return Ok(());
        }
        let markup = self.window.document().borrow().outer_html(node);
        warn!(target: "dft", frame = %markup, "{redirect_type}");

        let Some(src) = self.attribute(node, "src").filter(|src| !src.trim().is_empty()) else {
            return Ok(());
        };
        let Some(response) = self.fetch(&src, Vec::new(), redirect_type)? else {
            return Ok(());
        };
        if response.is_not_found() || self.consume_mime(&response) {
            return Ok(());
        }
        let url = response.url.clone();
        self.spawn(url, &response)
    }

    fn handle_style(&mut self, node: NodeId) -> Result<()> {
        if !self.window.session().options().inspect_font_faces {
            return Ok(());
        }
        let css = self.window.document().borrow().text_content(node);
        for sources in font_face_sources(&css) {
            for source in sources {
                let fetched = self.fetch_target(&source, Vec::new(), RedirectType::FontFace)?;
                if matches!(fetched, Fetched::Unavailable) {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Normalized script language: `javascript` for anything JavaScript-like,
/// otherwise the declared language or type, lower-cased.
fn script_language(language: Option<&str>, script_type: Option<&str>) -> String {
    if let Some(language) = language {
        let language = language.trim().to_ascii_lowercase();
        if language.contains("javascript") {
            return "javascript".to_string();
        }
        return language;
    }
    let Some(script_type) = script_type.map(|t| t.trim().to_ascii_lowercase()) else {
        return "javascript".to_string();
    };
    let essence = script_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "" | "text/javascript" | "application/javascript" | "application/x-javascript"
        | "text/ecmascript" | "application/ecmascript" | "text/jscript" => {
            "javascript".to_string()
        }
        "text/vbscript" | "text/vbs" => "vbscript".to_string(),
        other => other.to_string(),
    }
}

/// Target of a `refresh` directive such as `5; url='next.html'`.
fn refresh_target(content: &str) -> Option<String> {
    let target = content
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            let head = part.get(..4)?;
            head.eq_ignore_ascii_case("url=").then(|| &part[4..])
        })?
        .trim();
    let target = target
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(target);
    (!target.is_empty()).then(|| target.to_string())
}

/// `src` URLs of every `@font-face` rule, one list per rule.
fn font_face_sources(css: &str) -> Vec<Vec<String>> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut rules = Vec::new();
    scan_rules(&mut parser, &mut rules);
    rules
}

fn scan_rules<'i>(parser: &mut Parser<'i, '_>, rules: &mut Vec<Vec<String>>) {
    let mut font_face = false;
    while let Ok(token) = parser.next() {
        match token.clone() {
            Token::AtKeyword(name) => font_face = name.eq_ignore_ascii_case("font-face"),
            Token::Semicolon => font_face = false,
            Token::CurlyBracketBlock => {
                let in_font_face = font_face;
                font_face = false;
                let _ = parser.parse_nested_block(|block| -> Result<(), ParseError<'i, ()>> {
                    if in_font_face {
                        let mut sources = Vec::new();
                        scan_font_face(block, &mut sources);
                        rules.push(sources);
                    } else {
                        scan_rules(block, rules);
                    }
                    Ok(())
                });
            }
            _ => {}
        }
    }
}

fn scan_font_face<'i>(parser: &mut Parser<'i, '_>, sources: &mut Vec<String>) {
    let mut property = None;
    let mut in_src = false;
    while let Ok(token) = parser.next() {
        match token.clone() {
            Token::Ident(name) if !in_src => property = Some(name.to_ascii_lowercase()),
            Token::Colon => in_src = property.as_deref() == Some("src"),
            Token::Semicolon => {
                property = None;
                in_src = false;
            }
            Token::UnquotedUrl(url) if in_src => sources.push(url.to_string()),
            Token::Function(name) if in_src && name.eq_ignore_ascii_case("url") => {
                if let Ok(url) = parser.parse_nested_block(quoted_url) {
                    sources.push(url);
                }
            }
            _ => {}
        }
    }
}

fn quoted_url<'i>(parser: &mut Parser<'i, '_>) -> Result<String, ParseError<'i, ()>> {
    Ok(parser.expect_string()?.to_string())
}
