//! Preview session.
//!
//! A [`PreviewSession`] owns everything one preview request needs: the file
//! store, the compiled bundle, module instances, component state, the
//! location and the rendered mount container. Per-session state lives in
//! [`SessionContext`], shared by `Rc` with the evaluator and every builtin,
//! so two sessions never observe each other.
//!
//! Booting awaits the runtime, then compiles every code file, then mounts.
//! From the first compile on, every failure is routed through one place
//! that swaps the mount container for the diagnostic overlay.

use crate::bootstrap::{await_runtime, is_component_entry, locate_entry, BootError, BuiltinRuntime};
use crate::builtins::globals::{self, element_handle, flush_timers, TimerQueue};
use crate::builtins::react::create_element;
use crate::builtins::router::root_route_context;
use crate::builtins::state::{QueryEntry, Store};
use crate::builtins::builtin_modules;
use crate::channel::{inspect_message, HostMessage, InboundMessage, Location};
use crate::evaluator::{EvalResult, Evaluator};
use crate::hooks::{flush_effects, HookStore};
use crate::loader;
use crate::overlay::{status_vnode, OverlayPanel};
use crate::render::{RenderState, Renderer};
use crate::scope::Scope;
use crate::transformer::compile_all;
use crate::value::{Function, FunctionKind, Value};
use crate::vdom::{VNode, VirtualDomDocument};
use glimpse_bundle::{collect_stylesheet, Bundle, Resolver, VirtualAssetRegistry};
use glimpse_common::{PreviewConfig, VirtualFileStore};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::{debug, error, info, instrument, warn};

const RANDOM_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Stage a recorded problem came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    Resolution,
    Compile,
    Evaluation,
    Render,
    Bootstrap,
}

/// A problem the session recovered from (or, for bootstrap, could not)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: Option<String>,
    pub message: String,
}

/// Per-session state shared by the evaluator, loader and builtins
pub struct SessionContext {
    pub config: PreviewConfig,
    pub store: VirtualFileStore,
    /// Empty until the session boots
    pub bundle: RefCell<Bundle>,
    /// Builtin module table; identity is stable for the session
    pub builtins: HashMap<String, Value>,
    pub globals: Rc<Scope>,
    pub module_scopes: RefCell<Vec<Rc<Scope>>>,
    /// Module instances by resolved path (`?specifier` for synthesised ones)
    pub loaded_modules: RefCell<HashMap<String, Value>>,
    pub fragment: Value,

    pub hooks: RefCell<HookStore>,
    pub render: RefCell<RenderState>,
    /// Default value of every context created so far, by id
    pub contexts: RefCell<Vec<Value>>,
    /// Element passed to `createRoot(..).render` by a script entry
    pub mount_request: RefCell<Option<Value>>,
    /// Set by state changes; the session re-renders until clear
    pub dirty: Cell<bool>,

    pub random_seed: Cell<u64>,
    pub timers: RefCell<TimerQueue>,
    /// `local:` and `session:` prefixed storage entries
    pub storage: RefCell<BTreeMap<String, String>>,
    pub stores: RefCell<Vec<Store>>,
    pub query_cache: RefCell<Vec<QueryEntry>>,
    pub location: RefCell<Location>,

    pub outbox: RefCell<Vec<HostMessage>>,
    pub diagnostics: RefCell<Vec<Diagnostic>>,
}

impl SessionContext {
    pub fn report(&self, kind: DiagnosticKind, path: Option<&str>, message: impl Into<String>) {
        self.diagnostics.borrow_mut().push(Diagnostic {
            kind,
            path: path.map(str::to_string),
            message: message.into(),
        });
    }

    /// Navigate the previewed page; posts a navigation message on change
    pub fn navigate(&self, to: &str, replace: bool) {
        let changed = self.location.borrow_mut().navigate(to, replace);
        if changed {
            self.location_changed();
        }
    }

    pub fn go_back(&self) {
        let changed = self.location.borrow_mut().back();
        if changed {
            self.location_changed();
        }
    }

    fn location_changed(&self) {
        let path = self.location.borrow().route();
        self.outbox.borrow_mut().push(HostMessage::Navigation { path });
        self.dirty.set(true);
    }

}

impl Drop for SessionContext {
    fn drop(&mut self) {
        // closures hold their defining scope, so module scopes form cycles
        for scope in self.module_scopes.get_mut().drain(..) {
            scope.clear();
        }
        self.globals.clear();
        self.loaded_modules.get_mut().clear();
        self.stores.get_mut().clear();
        self.query_cache.get_mut().clear();
    }
}

/// Lifecycle of the mount container
#[derive(Clone)]
enum Phase {
    Idle,
    Mounted(Value),
    Failed,
}

/// One live preview: compiled files, a mounted tree and its interactions
pub struct PreviewSession {
    ctx: Rc<SessionContext>,
    ev: Evaluator,
    phase: Phase,
    container: Vec<VNode>,
    stylesheet: String,
    failure: Option<BootError>,
    passes: usize,
    compiled: bool,
}

impl PreviewSession {
    /// Build a session over `store`; code files compile when it boots
    #[instrument(skip_all, fields(files = store.len()))]
    pub fn new(store: VirtualFileStore, config: PreviewConfig) -> Self {
        let assets = VirtualAssetRegistry::build(&store, config.base64_threshold);
        let stylesheet = collect_stylesheet(&store, &assets);
        let bundle = Bundle::new(Resolver::from_config(&config), assets);

        let fragment = Value::Function(Rc::new(Function::new("Fragment", FunctionKind::Fragment)));
        let builtins = builtin_modules(&fragment);
        let globals = Scope::root();
        let react = builtins.get("react").cloned().unwrap_or(Value::Undefined);
        globals::install(&globals, &react);

        info!(assets = bundle.assets().len(), "session created");

        let ctx = Rc::new(SessionContext {
            config,
            store,
            bundle: RefCell::new(bundle),
            builtins,
            globals,
            module_scopes: RefCell::new(Vec::new()),
            loaded_modules: RefCell::new(HashMap::new()),
            fragment,
            hooks: RefCell::new(HookStore::new()),
            render: RefCell::new(RenderState::default()),
            contexts: RefCell::new(vec![root_route_context()]),
            mount_request: RefCell::new(None),
            dirty: Cell::new(false),
            random_seed: Cell::new(RANDOM_SEED),
            timers: RefCell::new(TimerQueue::default()),
            storage: RefCell::new(BTreeMap::new()),
            stores: RefCell::new(Vec::new()),
            query_cache: RefCell::new(Vec::new()),
            location: RefCell::new(Location::new()),
            outbox: RefCell::new(Vec::new()),
            diagnostics: RefCell::new(Vec::new()),
        });

        Self {
            ev: Evaluator::new(ctx.clone()),
            ctx,
            phase: Phase::Idle,
            container: Vec::new(),
            stylesheet,
            failure: None,
            passes: 0,
            compiled: false,
        }
    }

    /// Await the runtime, then mount the entry
    #[instrument(skip(self))]
    pub async fn boot(&mut self) -> Result<(), BootError> {
        let policy = self.ctx.config.poll_policy;
        let ready = await_runtime(&BuiltinRuntime::new(&self.ctx.builtins), &policy).await;
        match ready {
            Ok(_) => self.start(),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// [`Self::boot`] without polling; the builtin runtime is always present
    pub fn boot_now(&mut self) -> Result<(), BootError> {
        self.start()
    }

    /// Compile every code file once; returns how many failed
    pub fn compile(&mut self) -> usize {
        if std::mem::replace(&mut self.compiled, true) {
            return 0;
        }
        let mut bundle = self.ctx.bundle.borrow_mut();
        let failed = compile_all(&self.ctx.store, &mut bundle);
        for failure in bundle.failures() {
            self.ctx.report(DiagnosticKind::Compile, Some(failure.path.as_str()), failure.error.to_string());
        }
        info!(modules = bundle.module_count(), failed, "files compiled");
        failed
    }

    fn start(&mut self) -> Result<(), BootError> {
        self.compile();
        match self.mount() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn mount(&mut self) -> Result<(), BootError> {
        let entry = locate_entry(&self.ctx.store, &self.ctx.config)?;
        let component_entry = is_component_entry(&entry, &self.ctx.config);
        info!(%entry, component_entry, "mounting entry");

        let exports = loader::load_path(&mut self.ev, &entry);
        let requested = self.ctx.mount_request.borrow_mut().take();
        let root = match requested {
            Some(element) if !component_entry => element,
            _ => {
                let default = self.ev.get_member(&exports, "default")?;
                if !default.is_callable() {
                    return Err(BootError::NotInvocable {
                        path: entry,
                        found: default.type_of().to_string(),
                    });
                }
                create_element(default, None, Vec::new())
            }
        };

        self.phase = Phase::Mounted(root);
        self.rerender()?;
        Ok(())
    }

    /// Show `err` in the mount container and record it
    fn fail(&mut self, err: BootError) -> BootError {
        error!(error = %err, "preview failed");
        let path = match &err {
            BootError::NotInvocable { path, .. } => Some(path.as_str()),
            BootError::Render(eval) => eval.path.as_deref(),
            _ => None,
        };
        self.ctx.report(DiagnosticKind::Bootstrap, path, err.to_string());

        let node = match &err {
            BootError::DependencyTimeout { .. } => status_vnode(&err.to_string()),
            BootError::Render(eval) => {
                OverlayPanel::from_eval_error(eval).to_vnode(self.ctx.config.stack_trace_lines)
            }
            other => OverlayPanel::new("Preview failed", other.to_string())
                .to_vnode(self.ctx.config.stack_trace_lines),
        };
        self.container = vec![node];
        self.phase = Phase::Failed;
        self.failure = Some(err.clone());
        err
    }

    /// Render until no state change is pending, bounded by `max_render_passes`
    fn rerender(&mut self) -> EvalResult<usize> {
        let Phase::Mounted(root) = self.phase.clone() else {
            return Ok(0);
        };
        let ctx = self.ctx.clone();
        let max = ctx.config.max_render_passes.max(1);

        for pass in 1..=max {
            ctx.dirty.set(false);
            ctx.hooks.borrow_mut().begin_pass();
            ctx.render.borrow_mut().begin();
            let bundle = ctx.bundle.borrow();
            let rendered = Renderer::new(&mut self.ev, bundle.assets()).render_root(&root);
            drop(bundle);
            ctx.hooks.borrow_mut().end_pass();
            self.container = rendered?;
            self.passes += 1;

            let effects = flush_effects(&mut self.ev)?;
            let timers = flush_timers(&mut self.ev)?;
            debug!(pass, effects, timers, dirty = ctx.dirty.get(), "render pass");
            if !ctx.dirty.get() {
                return Ok(pass);
            }
        }

        warn!(max, "state still changing after the last render pass");
        ctx.report(
            DiagnosticKind::Render,
            None,
            format!("State kept changing after {} render passes", max),
        );
        Ok(max)
    }

    /// Re-render after an interaction, routing failures to the overlay
    fn settle(&mut self) {
        if let Err(err) = self.rerender() {
            self.fail(BootError::Render(err));
        }
    }

    // ---------------------------------------------------------------
    // Interaction
    // ---------------------------------------------------------------

    fn event_object(kind: &str, target: Value) -> (Value, Rc<Cell<bool>>, Rc<Cell<bool>>) {
        let prevented = Rc::new(Cell::new(false));
        let stopped = Rc::new(Cell::new(false));
        let prevent_flag = prevented.clone();
        let stop_flag = stopped.clone();
        let event = Value::object(vec![
            ("type", Value::str(kind)),
            ("target", target.clone()),
            ("currentTarget", target),
            ("defaultPrevented", Value::Bool(false)),
            ("bubbles", Value::Bool(true)),
            ("button", Value::Number(0.0)),
            (
                "preventDefault",
                Value::native("preventDefault", move |_ev, this, _args| {
                    prevent_flag.set(true);
                    if let Value::Object(event) = this {
                        event.borrow_mut().set("defaultPrevented", Value::Bool(true));
                    }
                    Ok(Value::Undefined)
                }),
            ),
            (
                "stopPropagation",
                Value::native("stopPropagation", move |_ev, _this, _args| {
                    stop_flag.set(true);
                    Ok(Value::Undefined)
                }),
            ),
            ("persist", Value::native("persist", |_ev, _this, _args| Ok(Value::Undefined))),
        ]);
        (event, prevented, stopped)
    }

    /// Node ids from `node_id` up to the container, with the nodes' tags and attributes
    fn ancestry(&self, node_id: u32) -> Vec<(u32, VNode)> {
        let path = self
            .container
            .iter()
            .find_map(|node| node.path_to(node_id))
            .unwrap_or_default();
        path.into_iter()
            .rev()
            .filter_map(|node| node.id().map(|id| (id, shallow(node))))
            .collect()
    }

    /// Call `event` handlers from the target outwards; returns how many ran
    fn dispatch(&mut self, chain: &[(u32, VNode)], kind: &str, event: &Value, stopped: &Cell<bool>) -> EvalResult<usize> {
        let mut called = 0;
        for (id, _) in chain {
            let handler = self.ctx.render.borrow().handler(*id, kind);
            if let Some(handler) = handler {
                if let Value::Object(object) = event {
                    let current = chain
                        .iter()
                        .find(|(candidate, _)| candidate == id)
                        .map(|(_, node)| handle_for(node))
                        .unwrap_or(Value::Null);
                    object.borrow_mut().set("currentTarget", current);
                }
                self.ev.call_function(&handler, Value::Undefined, &[event.clone()])?;
                called += 1;
            }
            if stopped.get() {
                break;
            }
        }
        Ok(called)
    }

    /// Click the element with render id `node_id`
    #[instrument(skip(self))]
    pub fn click(&mut self, node_id: u32) -> bool {
        if let Some(message) = inspect_message(&self.document(), node_id, self.ctx.config.text_snippet_len) {
            self.ctx.outbox.borrow_mut().push(message);
        }
        let chain = self.ancestry(node_id);
        let Some((_, target)) = chain.first() else {
            return false;
        };

        let (event, prevented, stopped) = Self::event_object("click", handle_for(target));
        let outcome = self.dispatch(&chain, "click", &event, &stopped).and_then(|called| {
            if prevented.get() {
                return Ok(called);
            }
            self.default_click_action(&chain).map(|submitted| called + submitted)
        });

        match outcome {
            Ok(called) => {
                self.settle();
                called > 0
            }
            Err(err) => {
                self.fail(BootError::Render(err));
                true
            }
        }
    }

    /// Link navigation and form submission for an unprevented click
    fn default_click_action(&mut self, chain: &[(u32, VNode)]) -> EvalResult<usize> {
        if let Some(href) = chain
            .iter()
            .find(|(_, node)| node.tag() == Some("a"))
            .and_then(|(_, node)| node.attr("href"))
        {
            if href.starts_with('/') || href.starts_with('#') {
                self.ctx.navigate(href, false);
            }
            return Ok(0);
        }

        let submits = chain.first().map_or(false, |(_, node)| {
            node.tag() == Some("button") && !matches!(node.attr("type"), Some("button" | "reset"))
        });
        if !submits {
            return Ok(0);
        }
        let Some(position) = chain.iter().position(|(_, node)| node.tag() == Some("form")) else {
            return Ok(0);
        };
        let form = &chain[position..];
        let (event, _, stopped) = Self::event_object("submit", handle_for(&form[0].1));
        self.dispatch(form, "submit", &event, &stopped)
    }

    /// Type `value` into the input with render id `node_id`
    #[instrument(skip(self))]
    pub fn input(&mut self, node_id: u32, value: &str) -> bool {
        let chain = self.ancestry(node_id);
        let Some((_, target)) = chain.first() else {
            return false;
        };
        let handle = handle_for(target);
        if let Value::Object(object) = &handle {
            let mut object = object.borrow_mut();
            object.set("value", Value::str(value));
            object.set("checked", Value::Bool(value == "true" || value == "on"));
            if let Some(name) = target.attr("name") {
                object.set("name", Value::str(name));
            }
            if let Some(kind) = target.attr("type") {
                object.set("type", Value::str(kind));
            }
        }

        let mut called = 0;
        let mut outcome = Ok(());
        for kind in ["change", "input"] {
            let (event, _, stopped) = Self::event_object(kind, handle.clone());
            match self.dispatch(&chain, kind, &event, &stopped) {
                Ok(count) => called += count,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        match outcome {
            Ok(()) => self.settle(),
            Err(err) => {
                self.fail(BootError::Render(err));
            }
        }
        called > 0
    }

    /// Apply a message from the hosting window
    pub fn receive(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::NavigateTo { path } => {
                let changed = self.ctx.location.borrow_mut().set_hash(&path);
                debug!(%path, changed, "navigate-to received");
                if changed {
                    self.settle();
                }
            }
        }
    }

    /// Messages posted to the hosting window since the last call
    pub fn take_messages(&self) -> Vec<HostMessage> {
        std::mem::take(&mut *self.ctx.outbox.borrow_mut())
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// The page: mount container plus the collected stylesheet
    pub fn document(&self) -> VirtualDomDocument {
        let container = VNode::element("div")
            .with_attr("id", self.ctx.config.mount_id.clone())
            .with_children(self.container.clone());
        VirtualDomDocument {
            nodes: vec![container],
            stylesheet: self.stylesheet.clone(),
        }
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.ctx.diagnostics.borrow().clone()
    }

    pub fn failure(&self) -> Option<&BootError> {
        self.failure.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.phase, Phase::Mounted(_))
    }

    /// Render passes run since the session was created
    pub fn render_passes(&self) -> usize {
        self.passes
    }

    pub fn location(&self) -> Location {
        self.ctx.location.borrow().clone()
    }

    pub fn context(&self) -> &Rc<SessionContext> {
        &self.ctx
    }

    pub fn evaluator(&mut self) -> &mut Evaluator {
        &mut self.ev
    }

    /// Render id of the innermost element whose text contains `text`
    pub fn find_by_text(&self, text: &str) -> Option<u32> {
        self.container.iter().find_map(|node| node.find_by_text(text)).and_then(VNode::id)
    }

    /// Render id of the first element matching `predicate`
    pub fn find(&self, predicate: &dyn Fn(&VNode) -> bool) -> Option<u32> {
        self.container.iter().find_map(|node| node.find(predicate)).and_then(VNode::id)
    }
}

/// Copy of `node` without its children
fn shallow(node: &VNode) -> VNode {
    match node {
        VNode::Element { tag, attributes, id, .. } => VNode::Element {
            tag: tag.clone(),
            attributes: attributes.clone(),
            children: Vec::new(),
            id: *id,
        },
        other => other.clone(),
    }
}

/// DOM handle handed to event handlers as `target`
fn handle_for(node: &VNode) -> Value {
    let handle = element_handle(node.tag().unwrap_or("div"), node.attr("id").unwrap_or_default());
    if let Value::Object(object) = &handle {
        let mut object = object.borrow_mut();
        for attr in ["value", "name", "type", "href"] {
            if let Some(value) = node.attr(attr) {
                object.set(attr, Value::str(value));
            }
        }
        if let Some(class) = node.attr("class") {
            object.set("className", Value::str(class));
        }
    }
    handle
}
