use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use anyhow::Result;
use rquickjs::function::IntoJsFunc;
use rquickjs::{Ctx, FromJs, Function, IntoJs, Object};
use serde::Serialize;
use serde_json::json;
use url::Url;

use super::runtime::QuickJsEngine;
use crate::dom::{Document, EventObject, EventTarget, HandlerId, Listener, NodeId};

/// Where `document.write` output goes while a script runs.
#[derive(Debug, Default)]
struct ScriptCursor {
    current_script: Option<NodeId>,
    write_anchor: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationParts {
    pub href: String,
    pub protocol: String,
    pub host: String,
    pub hostname: String,
    pub port: String,
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl LocationParts {
    pub fn from_url(url: &Url) -> Self {
        let hostname = url.host_str().unwrap_or_default().to_string();
        let port = url.port().map(|port| port.to_string()).unwrap_or_default();
        let host = if port.is_empty() {
            hostname.clone()
        } else {
            format!("{hostname}:{port}")
        };
        Self {
            href: url.as_str().to_string(),
            protocol: format!("{}:", url.scheme()),
            host,
            hostname,
            port,
            pathname: url.path().to_string(),
            search: url.query().map(|q| format!("?{q}")).unwrap_or_default(),
            hash: url.fragment().map(|f| format!("#{f}")).unwrap_or_default(),
        }
    }
}

/// Browser identity exposed to page scripts as `navigator` and `location`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptGlobals {
    pub location: LocationParts,
    pub user_agent: String,
    pub app_name: String,
    pub app_version: String,
    pub platform: String,
    pub java_enabled: bool,
    pub legacy_ie: bool,
}

/// Script evaluation context bound to one document.
///
/// Page scripts see a small DOM (`document`, `window`, element wrappers,
/// listeners, `document.write`) backed by the shared [`Document`] arena.
/// Functions handed back to Rust are kept in a handler table and referred
/// to by [`HandlerId`].
pub struct ScriptContext {
    engine: QuickJsEngine,
    document: Rc<RefCell<Document>>,
    cursor: Rc<RefCell<ScriptCursor>>,
    legacy_ie: bool,
}

impl ScriptContext {
    pub fn new(document: Rc<RefCell<Document>>, globals: &ScriptGlobals) -> Result<Self> {
        let engine = QuickJsEngine::new()?;
        let cursor = Rc::new(RefCell::new(ScriptCursor::default()));
        install_dom_bindings(&engine, Rc::clone(&document), Rc::clone(&cursor))?;
        engine.eval(DOM_BOOTSTRAP, "honey:bootstrap")?;
        let context = Self {
            engine,
            document,
            cursor,
            legacy_ie: globals.legacy_ie,
        };
        context.call_bridge::<()>("configure", serde_json::to_value(globals)?)?;
        Ok(context)
    }

    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.document)
    }

    pub fn is_legacy_ie(&self) -> bool {
        self.legacy_ie
    }

    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_for(source, filename, None)
    }

    /// Evaluate `source` as the body of the `tag` script element, so that
    /// `document.write` output lands right after it.
    pub fn eval_for(&self, source: &str, filename: &str, tag: Option<NodeId>) -> Result<()> {
        *self.cursor.borrow_mut() = ScriptCursor {
            current_script: tag,
            write_anchor: tag,
        };
        let result = self.engine.eval(source, filename);
        *self.cursor.borrow_mut() = ScriptCursor::default();
        result
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> FromJs<'js>,
    {
        self.engine.eval_with(source, filename)
    }

    /// Compile a function expression and add it to the handler table.
    pub fn compile_handler(&self, source: &str) -> Result<Option<HandlerId>> {
        let id: u32 = self
            .engine
            .eval_with(&format!("__honey.register({source})"), "honey:handler")?;
        Ok(handler_id(id))
    }

    pub fn collect_garbage(&self) {
        self.engine.collect_garbage();
    }

    /// Resolve a global function by name.
    pub fn global_handler(&self, name: &str) -> Result<Option<HandlerId>> {
        let id: u32 = self.call_bridge("registerGlobal", json!({ "name": name }))?;
        Ok(handler_id(id))
    }

    /// Read a function-valued property such as `onload` from a target.
    pub fn property_handler(&self, target: EventTarget, name: &str) -> Result<Option<HandlerId>> {
        let id: u32 = self.call_bridge(
            "registerProperty",
            json!({ "target": target, "name": name }),
        )?;
        Ok(handler_id(id))
    }

    pub fn set_property_handler(
        &self,
        target: EventTarget,
        name: &str,
        handler: HandlerId,
    ) -> Result<()> {
        self.call_bridge(
            "setProperty",
            json!({ "target": target, "name": name, "id": handler }),
        )
    }

    /// Drop a handler from the table so the engine can collect it once
    /// nothing else refers to it.
    pub fn release_handler(&self, handler: HandlerId) -> Result<()> {
        self.call_bridge("release", json!({ "id": handler }))
    }

    /// Call a handler with `this` bound to `receiver`. Legacy IE handlers get
    /// no argument and find the event in `window.event`.
    pub fn invoke(
        &self,
        handler: HandlerId,
        receiver: EventTarget,
        event: Option<&EventObject>,
    ) -> Result<()> {
        self.call_bridge(
            "invoke",
            json!({
                "id": handler,
                "receiver": receiver,
                "event": event,
            }),
        )
    }

    fn call_bridge<V>(&self, method: &str, argument: serde_json::Value) -> Result<V>
    where
        V: for<'js> FromJs<'js>,
    {
        let payload = argument.to_string();
        self.engine.with_context(|ctx| {
            let honey: Object = ctx.globals().get("__honey")?;
            let bridge: Function = honey.get(method)?;
            let value = ctx.json_parse(payload)?;
            bridge.call((value,))
        })
    }
}

fn handler_id(raw: u32) -> Option<HandlerId> {
    (raw != 0).then_some(HandlerId(raw))
}

fn dom_error<T>(ctx: &Ctx<'_>, err: impl Display) -> rquickjs::Result<T> {
    tracing::warn!(target: "quickjs", "DOM operation failed: {err}");
    let value = format!("DOM operation failed: {err}").into_js(ctx)?;
    Err(ctx.throw(value))
}

fn install<'js, F, P>(ctx: &Ctx<'js>, name: &str, func: F) -> rquickjs::Result<()>
where
    F: IntoJsFunc<'js, P> + 'js,
{
    let function = Function::new(ctx.clone(), func)?.with_name(name)?;
    ctx.globals().set(name, function)
}

fn node(handle: u32) -> NodeId {
    NodeId::from_handle(handle)
}

fn handles(ids: impl IntoIterator<Item = NodeId>) -> Vec<u32> {
    ids.into_iter().map(NodeId::handle).collect()
}

fn install_dom_bindings(
    engine: &QuickJsEngine,
    document: Rc<RefCell<Document>>,
    cursor: Rc<RefCell<ScriptCursor>>,
) -> Result<()> {
    engine.with_context(|ctx| {
        // Lookups
        {
            let doc = Rc::clone(&document);
            install(&ctx, "__honey_dom_root", move || -> rquickjs::Result<u32> {
                Ok(doc.borrow().root().handle())
            })?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_document_element",
                move || -> rquickjs::Result<Option<u32>> {
                    Ok(doc.borrow().document_element().map(NodeId::handle))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(&ctx, "__honey_dom_body", move || -> rquickjs::Result<Option<u32>> {
                Ok(doc.borrow().body().map(NodeId::handle))
            })?;
        }
        {
            let doc = Rc::clone(&document);
            install(&ctx, "__honey_dom_head", move || -> rquickjs::Result<Option<u32>> {
                Ok(doc.borrow().head().map(NodeId::handle))
            })?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_tag",
                move |handle: u32| -> rquickjs::Result<Option<String>> {
                    Ok(doc.borrow().tag_name(node(handle)).map(str::to_string))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_node_type",
                move |handle: u32| -> rquickjs::Result<Option<u32>> {
                    Ok(doc.borrow().node_type(node(handle)).map(u32::from))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_node_value",
                move |handle: u32| -> rquickjs::Result<Option<String>> {
                    Ok(doc.borrow().node_value(node(handle)).map(str::to_string))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_parent",
                move |handle: u32| -> rquickjs::Result<Option<u32>> {
                    Ok(doc.borrow().parent(node(handle)).map(NodeId::handle))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_children",
                move |handle: u32| -> rquickjs::Result<Vec<u32>> {
                    Ok(handles(doc.borrow().children(node(handle)).iter().copied()))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_by_id",
                move |id: String| -> rquickjs::Result<Option<u32>> {
                    Ok(doc.borrow().find_by_id(&id).map(NodeId::handle))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_by_tag",
                move |handle: u32, tag: String| -> rquickjs::Result<Vec<u32>> {
                    let doc = doc.borrow();
                    let wildcard = tag == "*";
                    Ok(handles(doc.descendants(node(handle)).into_iter().filter(
                        |id| match doc.tag_name(*id) {
                            Some(name) => wildcard || name.eq_ignore_ascii_case(&tag),
                            None => false,
                        },
                    )))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_ancestor",
                move |handle: u32, tag: String| -> rquickjs::Result<Option<u32>> {
                    let tag = tag.to_ascii_lowercase();
                    Ok(doc
                        .borrow()
                        .ancestor_with_tag(node(handle), &[tag.as_str()])
                        .map(NodeId::handle))
                },
            )?;
        }
        {
            let cursor = Rc::clone(&cursor);
            install(
                &ctx,
                "__honey_dom_current_script",
                move || -> rquickjs::Result<Option<u32>> {
                    Ok(cursor.borrow().current_script.map(NodeId::handle))
                },
            )?;
        }

        // Attributes and content
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_get_attribute",
                move |handle: u32, name: String| -> rquickjs::Result<Option<String>> {
                    Ok(doc
                        .borrow()
                        .attribute(node(handle), &name)
                        .map(str::to_string))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_attribute_names",
                move |handle: u32| -> rquickjs::Result<Vec<String>> {
                    Ok(doc
                        .borrow()
                        .attributes(node(handle))
                        .into_iter()
                        .map(|(name, _)| name)
                        .collect())
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_set_attribute",
                move |ctx: Ctx<'_>,
                      handle: u32,
                      name: String,
                      value: String|
                      -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().set_attribute(node(handle), &name, &value);
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_remove_attribute",
                move |ctx: Ctx<'_>, handle: u32, name: String| -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().remove_attribute(node(handle), &name);
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_text",
                move |handle: u32| -> rquickjs::Result<String> {
                    Ok(doc.borrow().text_content(node(handle)))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_set_text",
                move |ctx: Ctx<'_>, handle: u32, text: String| -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().set_text_content(node(handle), &text);
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_inner_html",
                move |handle: u32| -> rquickjs::Result<String> {
                    Ok(doc.borrow().inner_html(node(handle)))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_outer_html",
                move |handle: u32| -> rquickjs::Result<String> {
                    Ok(doc.borrow().outer_html(node(handle)))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_set_inner_html",
                move |ctx: Ctx<'_>, handle: u32, html: String| -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().set_inner_html(node(handle), &html);
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }

        // Tree mutation
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_create_element",
                move |tag: String| -> rquickjs::Result<u32> {
                    Ok(doc.borrow_mut().create_element(&tag).handle())
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_create_text",
                move |text: String| -> rquickjs::Result<u32> {
                    Ok(doc.borrow_mut().create_text(&text).handle())
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_append",
                move |ctx: Ctx<'_>, parent: u32, child: u32| -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().append_child(node(parent), node(child));
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_insert_before",
                move |ctx: Ctx<'_>,
                      parent: u32,
                      child: u32,
                      reference: Option<u32>|
                      -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().insert_before(
                        node(parent),
                        node(child),
                        reference.map(node),
                    );
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_remove",
                move |ctx: Ctx<'_>, parent: u32, child: u32| -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().remove_child(node(parent), node(child));
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            let cursor = Rc::clone(&cursor);
            install(
                &ctx,
                "__honey_dom_write",
                move |ctx: Ctx<'_>, html: String| -> rquickjs::Result<()> {
                    let anchor = cursor.borrow().write_anchor;
                    let result = doc.borrow_mut().write_after(anchor, &html);
                    match result {
                        Ok(Some(last)) => {
                            cursor.borrow_mut().write_anchor = Some(last);
                            Ok(())
                        }
                        Ok(None) => Ok(()),
                        Err(err) => dom_error(&ctx, err),
                    }
                },
            )?;
        }

        // Realization and listeners
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_realize",
                move |handle: u32| -> rquickjs::Result<()> {
                    // Unknown handles simply stay unrealized.
                    let _ = doc.borrow_mut().realize(node(handle));
                    Ok(())
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_listen",
                move |ctx: Ctx<'_>,
                      handle: u32,
                      event_type: String,
                      handler: u32,
                      capture: bool,
                      priority: bool|
                      -> rquickjs::Result<bool> {
                    let listener = Listener::new(&event_type, HandlerId(handler), capture);
                    let result = doc
                        .borrow_mut()
                        .add_listener(node(handle), listener, priority);
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_unlisten",
                move |ctx: Ctx<'_>,
                      handle: u32,
                      event_type: String,
                      handler: u32,
                      capture: bool|
                      -> rquickjs::Result<()> {
                    let result = doc.borrow_mut().remove_listener(
                        node(handle),
                        &event_type,
                        HandlerId(handler),
                        capture,
                    );
                    result.or_else(|err| dom_error(&ctx, err))
                },
            )?;
        }
        {
            let doc = Rc::clone(&document);
            install(
                &ctx,
                "__honey_dom_listeners",
                move |handle: u32, event_type: String| -> rquickjs::Result<Vec<u32>> {
                    Ok(doc
                        .borrow()
                        .listeners_for(node(handle), &event_type)
                        .into_iter()
                        .map(|handler| handler.0)
                        .collect())
                },
            )?;
        }

        Ok(())
    })
}

const DOM_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    global.window = global;
    global.self = global;
    global.top = global;
    global.parent = global;
    global.frames = [];

    const honey = {};
    Object.defineProperty(global, '__honey', { value: honey, enumerable: false });

    const NODE_CACHE = new Map();
    const HANDLERS = new Map();
    const HANDLER_IDS = new Map();
    let nextHandler = 1;
    let legacyIE = false;

    function register(fn) {
        if (typeof fn !== 'function') {
            return 0;
        }
        let id = HANDLER_IDS.get(fn);
        if (id === undefined) {
            id = nextHandler++;
            HANDLERS.set(id, fn);
            HANDLER_IDS.set(fn, id);
        }
        return id;
    }

    function callHandler(fn, receiver, evt) {
        if (legacyIE) {
            global.event = evt;
            return fn.call(receiver);
        }
        return fn.call(receiver, evt);
    }

    class Event {
        constructor(type) {
            this.type = type === undefined ? '' : String(type);
            this.target = null;
            this.currentTarget = null;
            this.srcElement = null;
            this.eventPhase = 0;
            this.bubbles = false;
            this.cancelable = false;
            this.defaultPrevented = false;
            this.returnValue = true;
            this.cancelBubble = false;
            this.timeStamp = Date.now();
        }
        initEvent(type, bubbles, cancelable) {
            this.type = String(type);
            this.bubbles = !!bubbles;
            this.cancelable = !!cancelable;
        }
        preventDefault() {
            this.defaultPrevented = true;
            this.returnValue = false;
        }
        stopPropagation() {
            this.cancelBubble = true;
        }
    }
    Event.CAPTURING_PHASE = 1;
    Event.AT_TARGET = 2;
    Event.BUBBLING_PHASE = 3;

    class MouseEvent extends Event {
        constructor(type) {
            super(type);
            this.screenX = 0;
            this.screenY = 0;
            this.clientX = 0;
            this.clientY = 0;
            this.button = 0;
            this.ctrlKey = false;
            this.shiftKey = false;
            this.altKey = false;
            this.metaKey = false;
            this.relatedTarget = null;
        }
        initMouseEvent(type, bubbles, cancelable) {
            this.initEvent(type, bubbles, cancelable);
        }
    }

    class HTMLEvent extends Event {}

    function createEvent(kind) {
        const name = String(kind);
        if (/^MouseEvents?$/i.test(name)) {
            return new MouseEvent('');
        }
        if (/^HTMLEvents?$/i.test(name)) {
            return new HTMLEvent('');
        }
        return new Event('');
    }

    function resolveTarget(target) {
        if (!target) {
            return null;
        }
        if (target.kind === 'window') {
            return global;
        }
        if (target.kind === 'document') {
            return documentObject;
        }
        return wrap(target.handle);
    }

    function makeEvent(init) {
        const Ctor = init.interface === 'MouseEvent' ? MouseEvent : HTMLEvent;
        const evt = new Ctor(init.type);
        evt.eventPhase = init.eventPhase;
        evt.target = resolveTarget(init.target);
        evt.currentTarget = resolveTarget(init.currentTarget);
        evt.srcElement = evt.target;
        return evt;
    }

    function wrap(handle) {
        if (handle === null || handle === undefined) {
            return null;
        }
        const cached = NODE_CACHE.get(handle);
        if (cached) {
            return cached;
        }
        let node;
        switch (__honey_dom_node_type(handle)) {
            case 1:
                node = new HTMLElement(handle);
                break;
            case 3:
                node = new Text(handle);
                break;
            case 8:
                node = new Comment(handle);
                break;
            default:
                return null;
        }
        NODE_CACHE.set(handle, node);
        __honey_dom_realize(handle);
        return node;
    }

    function handleOf(node) {
        if (!node || node.__handle === undefined) {
            throw new TypeError('argument is not a node');
        }
        return node.__handle;
    }

    function sibling(node, offset) {
        const parent = __honey_dom_parent(node.__handle);
        if (parent === null || parent === undefined) {
            return null;
        }
        const siblings = __honey_dom_children(parent);
        const index = siblings.indexOf(node.__handle);
        return index < 0 ? null : wrap(siblings[index + offset]);
    }

    class Node {
        constructor(handle) {
            Object.defineProperty(this, '__handle', { value: handle });
        }
        get nodeType() {
            return __honey_dom_node_type(this.__handle);
        }
        get parentNode() {
            return wrap(__honey_dom_parent(this.__handle));
        }
        get childNodes() {
            return __honey_dom_children(this.__handle).map(wrap);
        }
        get children() {
            return this.childNodes.filter((child) => child && child.nodeType === 1);
        }
        get firstChild() {
            const children = this.childNodes;
            return children.length ? children[0] : null;
        }
        get lastChild() {
            const children = this.childNodes;
            return children.length ? children[children.length - 1] : null;
        }
        get nextSibling() {
            return sibling(this, 1);
        }
        get previousSibling() {
            return sibling(this, -1);
        }
        get ownerDocument() {
            return documentObject;
        }
        get textContent() {
            return __honey_dom_text(this.__handle);
        }
        set textContent(value) {
            __honey_dom_set_text(this.__handle, String(value));
        }
        hasChildNodes() {
            return this.childNodes.length > 0;
        }
        appendChild(child) {
            __honey_dom_append(this.__handle, handleOf(child));
            return child;
        }
        removeChild(child) {
            __honey_dom_remove(this.__handle, handleOf(child));
            return child;
        }
        insertBefore(child, reference) {
            __honey_dom_insert_before(
                this.__handle,
                handleOf(child),
                reference ? handleOf(reference) : null,
            );
            return child;
        }
        replaceChild(child, old) {
            this.insertBefore(child, old);
            return this.removeChild(old);
        }
        addEventListener(type, listener, capture) {
            const id = register(listener);
            if (id) {
                __honey_dom_listen(this.__handle, String(type), id, !!capture, false);
            }
        }
        removeEventListener(type, listener, capture) {
            const id = HANDLER_IDS.get(listener);
            if (id !== undefined) {
                __honey_dom_unlisten(this.__handle, String(type), id, !!capture);
            }
        }
        attachEvent(type, listener) {
            let name = String(type);
            if (name.startsWith('on')) {
                name = name.slice(2);
            }
            const id = register(listener);
            if (id) {
                __honey_dom_listen(this.__handle, name, id, false, true);
            }
            return true;
        }
        detachEvent(type, listener) {
            const name = String(type);
            this.removeEventListener(name.startsWith('on') ? name.slice(2) : name, listener, false);
        }
        dispatchEvent(evt) {
            if (typeof evt === 'string') {
                const name = evt;
                evt = createEvent('Events');
                evt.initEvent(name, false, false);
            }
            evt.target = evt.target || this;
            evt.srcElement = evt.target;
            evt.currentTarget = this;
            evt.eventPhase = Event.AT_TARGET;
            for (const id of __honey_dom_listeners(this.__handle, evt.type)) {
                const fn = HANDLERS.get(id);
                if (!fn) {
                    continue;
                }
                try {
                    callHandler(fn, this, evt);
                } catch (err) {
                    __honey_log('listener for ' + evt.type + ' failed: ' + err);
                }
            }
            return !evt.defaultPrevented;
        }
        fireEvent(type, evt) {
            const name = String(type);
            const event = evt || createEvent('Events');
            event.initEvent(name.startsWith('on') ? name.slice(2) : name, false, false);
            return this.dispatchEvent(event);
        }
    }

    class CharacterData extends Node {
        get data() {
            const value = __honey_dom_node_value(this.__handle);
            return value === null || value === undefined ? '' : value;
        }
        set data(value) {
            __honey_dom_set_text(this.__handle, String(value));
        }
        get nodeValue() {
            return this.data;
        }
        get length() {
            return this.data.length;
        }
    }

    class Text extends CharacterData {
        get nodeName() {
            return '#text';
        }
    }

    class Comment extends CharacterData {
        get nodeName() {
            return '#comment';
        }
    }

    class Element extends Node {
        get tagName() {
            const tag = __honey_dom_tag(this.__handle);
            return tag ? tag.toUpperCase() : '';
        }
        get nodeName() {
            return this.tagName;
        }
        getAttribute(name) {
            const value = __honey_dom_get_attribute(this.__handle, String(name));
            return value === null || value === undefined ? null : value;
        }
        setAttribute(name, value) {
            __honey_dom_set_attribute(this.__handle, String(name), String(value));
        }
        removeAttribute(name) {
            __honey_dom_remove_attribute(this.__handle, String(name));
        }
        hasAttribute(name) {
            return this.getAttribute(name) !== null;
        }
        get attributes() {
            return __honey_dom_attribute_names(this.__handle).map((name) => ({
                name,
                nodeName: name,
                value: this.getAttribute(name),
                nodeValue: this.getAttribute(name),
            }));
        }
        get innerHTML() {
            return __honey_dom_inner_html(this.__handle);
        }
        set innerHTML(value) {
            __honey_dom_set_inner_html(this.__handle, String(value));
        }
        get outerHTML() {
            return __honey_dom_outer_html(this.__handle);
        }
        get innerText() {
            return this.textContent;
        }
        set innerText(value) {
            this.textContent = value;
        }
        get text() {
            return this.textContent;
        }
        set text(value) {
            this.textContent = value;
        }
        get form() {
            return wrap(__honey_dom_ancestor(this.__handle, 'form'));
        }
        get style() {
            if (!this.__style) {
                Object.defineProperty(this, '__style', { value: {} });
            }
            return this.__style;
        }
        getElementsByTagName(tag) {
            return __honey_dom_by_tag(this.__handle, String(tag)).map(wrap);
        }
        click() {
            this.dispatchEvent('click');
        }
        focus() {}
        blur() {}
    }

    const REFLECTED = [
        ['id', 'id'],
        ['name', 'name'],
        ['src', 'src'],
        ['href', 'href'],
        ['type', 'type'],
        ['value', 'value'],
        ['title', 'title'],
        ['language', 'language'],
        ['codebase', 'codebase'],
        ['code', 'code'],
        ['archive', 'archive'],
        ['data', 'data'],
        ['classid', 'classid'],
        ['width', 'width'],
        ['height', 'height'],
        ['alt', 'alt'],
        ['action', 'action'],
        ['method', 'method'],
        ['target', 'target'],
        ['content', 'content'],
        ['className', 'class'],
        ['htmlFor', 'for'],
        ['httpEquiv', 'http-equiv'],
    ];
    for (const [property, attribute] of REFLECTED) {
        Object.defineProperty(Element.prototype, property, {
            get() {
                const value = this.getAttribute(attribute);
                return value === null ? '' : value;
            },
            set(value) {
                this.setAttribute(attribute, value);
            },
            configurable: true,
        });
    }

    class HTMLElement extends Element {}

    class HTMLDocument extends Node {
        get nodeName() {
            return '#document';
        }
        get documentElement() {
            return wrap(__honey_dom_document_element());
        }
        get body() {
            return wrap(__honey_dom_body());
        }
        get head() {
            return wrap(__honey_dom_head());
        }
        get currentScript() {
            return wrap(__honey_dom_current_script());
        }
        get all() {
            return this.getElementsByTagName('*');
        }
        get scripts() {
            return this.getElementsByTagName('script');
        }
        get forms() {
            return this.getElementsByTagName('form');
        }
        get location() {
            return global.location;
        }
        set location(value) {
            global.location.href = value;
        }
        get URL() {
            return global.location.href;
        }
        get readyState() {
            return 'complete';
        }
        get cookie() {
            return this.__cookie || '';
        }
        set cookie(value) {
            const pair = String(value).split(';')[0];
            const jar = this.__cookie ? this.__cookie + '; ' : '';
            Object.defineProperty(this, '__cookie', {
                value: jar + pair,
                writable: true,
                configurable: true,
            });
        }
        open() {
            return this;
        }
        close() {}
        write(...parts) {
            __honey_dom_write(parts.map(String).join(''));
        }
        writeln(...parts) {
            __honey_dom_write(parts.map(String).join('') + '\n');
        }
        getElementById(id) {
            return wrap(__honey_dom_by_id(String(id)));
        }
        getElementsByTagName(tag) {
            return __honey_dom_by_tag(this.__handle, String(tag)).map(wrap);
        }
        getElementsByName(name) {
            const wanted = String(name);
            return this.all.filter((element) => element.getAttribute('name') === wanted);
        }
        createElement(tag) {
            return wrap(__honey_dom_create_element(String(tag)));
        }
        createTextNode(text) {
            return wrap(__honey_dom_create_text(String(text)));
        }
        createEvent(kind) {
            return createEvent(kind);
        }
    }

    const documentObject = new HTMLDocument(__honey_dom_root());
    NODE_CACHE.set(documentObject.__handle, documentObject);

    global.Node = Node;
    global.Element = Element;
    global.HTMLElement = HTMLElement;
    global.HTMLDocument = HTMLDocument;
    global.Text = Text;
    global.Comment = Comment;
    global.Event = Event;
    global.MouseEvent = MouseEvent;
    global.HTMLEvent = HTMLEvent;
    global.document = documentObject;

    // Window level listeners live on the document root.
    global.addEventListener = (type, listener, capture) =>
        documentObject.addEventListener(type, listener, capture);
    global.removeEventListener = (type, listener, capture) =>
        documentObject.removeEventListener(type, listener, capture);
    global.attachEvent = (type, listener) => documentObject.attachEvent(type, listener);
    global.detachEvent = (type, listener) => documentObject.detachEvent(type, listener);

    let nextTimer = 1;
    const cancelledTimers = new Set();
    function schedule(callback, args) {
        const id = nextTimer++;
        Promise.resolve().then(() => {
            if (cancelledTimers.has(id)) {
                return;
            }
            try {
                if (typeof callback === 'function') {
                    callback.apply(global, args);
                } else {
                    (0, eval)(String(callback));
                }
            } catch (err) {
                __honey_log('timer callback failed: ' + err);
            }
        });
        return id;
    }
    global.setTimeout = (callback, delay, ...args) => schedule(callback, args);
    global.setInterval = (callback, delay, ...args) => schedule(callback, args);
    global.clearTimeout = (id) => cancelledTimers.add(id);
    global.clearInterval = (id) => cancelledTimers.add(id);

    global.alert = (message) => __honey_log('alert: ' + String(message));
    global.confirm = (message) => {
        __honey_log('confirm: ' + String(message));
        return true;
    };
    global.prompt = (message, fallback) => {
        __honey_log('prompt: ' + String(message));
        return fallback === undefined ? '' : String(fallback);
    };
    global.open = (url) => {
        __honey_log('window.open: ' + String(url));
        return null;
    };

    honey.configure = (config) => {
        legacyIE = !!config.legacyIe;
        global.navigator = {
            userAgent: config.userAgent,
            appName: config.appName,
            appVersion: config.appVersion,
            appCodeName: 'Mozilla',
            platform: config.platform,
            product: 'Gecko',
            language: 'en-US',
            userLanguage: 'en-US',
            cookieEnabled: true,
            onLine: true,
            plugins: [],
            mimeTypes: [],
            javaEnabled: () => !!config.javaEnabled,
        };
        const parts = config.location;
        let href = parts.href;
        global.location = {
            protocol: parts.protocol,
            host: parts.host,
            hostname: parts.hostname,
            port: parts.port,
            pathname: parts.pathname,
            search: parts.search,
            hash: parts.hash,
            get href() {
                return href;
            },
            set href(value) {
                href = String(value);
                __honey_log('location: ' + href);
            },
            assign(value) {
                this.href = value;
            },
            replace(value) {
                this.href = value;
            },
            reload() {},
            toString() {
                return href;
            },
        };
    };

    honey.register = register;
    honey.registerGlobal = ({ name }) => register(global[name]);
    honey.registerProperty = ({ target, name }) => {
        const receiver = resolveTarget(target);
        return receiver ? register(receiver[name]) : 0;
    };
    honey.setProperty = ({ target, name, id }) => {
        const receiver = resolveTarget(target);
        const fn = HANDLERS.get(id);
        if (receiver && fn) {
            receiver[name] = fn;
        }
    };
    honey.release = ({ id }) => {
        const fn = HANDLERS.get(id);
        if (fn) {
            HANDLERS.delete(id);
            HANDLER_IDS.delete(fn);
        }
    };
    honey.invoke = ({ id, receiver, event }) => {
        const fn = HANDLERS.get(id);
        if (!fn) {
            throw new Error('unknown handler ' + id);
        }
        callHandler(fn, resolveTarget(receiver), event ? makeEvent(event) : null);
    };
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn context(html: &str, legacy_ie: bool) -> ScriptContext {
        let document = Rc::new(RefCell::new(Document::parse(html)));
        let url = Url::parse("http://example.com/index.html?q=1").unwrap();
        let globals = ScriptGlobals {
            location: LocationParts::from_url(&url),
            user_agent: "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1)".into(),
            app_name: "Microsoft Internet Explorer".into(),
            app_version: "4.0".into(),
            platform: "Win32".into(),
            java_enabled: true,
            legacy_ie,
        };
        ScriptContext::new(document, &globals).unwrap()
    }

    #[test]
    fn exposes_navigator_and_location() {
        let ctx = context("<body></body>", true);
        let ua: String = ctx.eval_with("navigator.userAgent", "t.js").unwrap();
        assert!(ua.contains("MSIE 6.0"));
        let search: String = ctx.eval_with("location.search", "t.js").unwrap();
        assert_eq!(search, "?q=1");
        let java: bool = ctx.eval_with("navigator.javaEnabled()", "t.js").unwrap();
        assert!(java);
    }

    #[test]
    fn document_write_follows_the_script() {
        let ctx = context("<body><script id=s></script><p>end</p></body>", false);
        let script = ctx.document().borrow().find_by_id("s").unwrap();
        ctx.eval_for(
            "document.write('<i>a</i>'); document.write('<b>b</b>');",
            "inline.js",
            Some(script),
        )
        .unwrap();
        let document = ctx.document();
        let doc = document.borrow();
        let body = doc.body().unwrap();
        let tags: Vec<&str> = doc
            .children(body)
            .iter()
            .filter_map(|id| doc.tag_name(*id))
            .collect();
        assert_eq!(tags, vec!["script", "i", "b", "p"]);
    }

    #[test]
    fn listeners_are_recorded_on_the_tree() {
        let ctx = context("<body><div id=d></div></body>", false);
        ctx.eval(
            "var d = document.getElementById('d');\
             var f = function () {};\
             d.addEventListener('click', f, false);\
             d.addEventListener('click', f, false);\
             window.addEventListener('load', function () {}, false);",
            "listen.js",
        )
        .unwrap();
        let document = ctx.document();
        let doc = document.borrow();
        let div = doc.find_by_id("d").unwrap();
        assert!(doc.is_realized(div));
        assert_eq!(doc.listeners_for(div, "click").len(), 1);
        assert_eq!(doc.listeners_for(doc.root(), "load").len(), 1);
    }

    #[test]
    fn compiled_handlers_resolve_scope_chain() {
        let ctx = context("<body><form><input id=i name=user value=v></form></body>", false);
        let input = ctx.document().borrow().find_by_id("i").unwrap();
        let handler = ctx
            .compile_handler(&crate::js::handler_source("seen = value + ':' + event.type", false))
            .unwrap()
            .unwrap();
        let event = EventObject::at_target("click", EventTarget::Node(input)).unwrap();
        ctx.invoke(handler, EventTarget::Node(input), Some(&event))
            .unwrap();
        let seen: String = ctx.eval_with("seen", "read.js").unwrap();
        assert_eq!(seen, "v:click");
    }

    #[test]
    fn legacy_handlers_read_window_event() {
        let ctx = context("<body></body>", true);
        let handler = ctx
            .compile_handler(&crate::js::handler_source("kind = event.type", true))
            .unwrap()
            .unwrap();
        let event = EventObject::at_target("load", EventTarget::Window).unwrap();
        ctx.invoke(handler, EventTarget::Window, Some(&event)).unwrap();
        let kind: String = ctx.eval_with("kind", "read.js").unwrap();
        assert_eq!(kind, "load");
    }

    #[test]
    fn property_handlers_round_trip() {
        let ctx = context("<body></body>", false);
        ctx.eval("window.onload = function () { loaded = true; };", "p.js")
            .unwrap();
        let handler = ctx
            .property_handler(EventTarget::Window, "onload")
            .unwrap()
            .unwrap();
        assert!(ctx
            .property_handler(EventTarget::Document, "onload")
            .unwrap()
            .is_none());
        ctx.set_property_handler(EventTarget::Document, "onclick", handler)
            .unwrap();
        let same: bool = ctx
            .eval_with("document.onclick === window.onload", "p.js")
            .unwrap();
        assert!(same);
        assert!(ctx.global_handler("missing").unwrap().is_none());
    }

    #[test]
    fn handler_exceptions_surface_as_errors() {
        let ctx = context("<body></body>", false);
        let handler = ctx
            .compile_handler("(function () { throw new Error('boom'); })")
            .unwrap()
            .unwrap();
        let err = ctx.invoke(handler, EventTarget::Window, None).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn released_handlers_leave_the_table() {
        let ctx = context("<body></body>", false);
        let handler = ctx
            .compile_handler("(function () { loads = (window.loads || 0) + 1; })")
            .unwrap()
            .unwrap();
        ctx.set_property_handler(EventTarget::Window, "onload", handler)
            .unwrap();
        ctx.release_handler(handler).unwrap();
        let err = ctx.invoke(handler, EventTarget::Window, None).unwrap_err();
        assert!(err.to_string().contains("unknown handler"));

        let handler = ctx
            .property_handler(EventTarget::Window, "onload")
            .unwrap()
            .unwrap();
        ctx.invoke(handler, EventTarget::Window, None).unwrap();
        let loads: i32 = ctx.eval_with("loads", "read.js").unwrap();
        assert_eq!(loads, 1);
    }
}
