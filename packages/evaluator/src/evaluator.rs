//! # Glimpse Evaluator
//!
//! Tree-walking interpreter for compiled preview modules.
//!
//! ## Modules
//!
//! `run_module` executes one compiled file against a fresh module scope that
//! holds `require`, `module` and `exports`. ES module syntax is lowered while
//! executing: an import binds a live reference into the required module's
//! exports object, so reads happen at use time and cyclic imports observe
//! members assigned after the import ran. Exported function declarations are
//! hoisted onto the exports object before the body runs.
//!
//! ## Errors
//!
//! Every runtime failure is an [`EvalError`] carrying the originating file,
//! `line:column` and the call stack at the point it was raised. `try/catch`
//! in previewed code observes the error as an ordinary JS value.
//!
//! ## Limits
//!
//! Nested calls are bounded by `max_call_depth` and loops by
//! [`MAX_LOOP_ITERATIONS`]; both surface as catchable errors instead of
//! hanging the session. Each call body runs through [`with_stack`], so the
//! depth limit is reached before the native stack of the host thread is.

use crate::loader;
use crate::scope::{AssignError, Binding, Scope};
use crate::session::SessionContext;
use crate::stub::call_stub;
use crate::value::*;
use glimpse_bundle::CompiledModule;
use glimpse_parser::ast::*;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, instrument};

pub type EvalResult<T> = Result<T, EvalError>;

/// Headroom required before entering another call body
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each heap-allocated stack segment once the red zone is hit
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// Run `f`, switching to a fresh stack segment when the current one is low
pub(crate) fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, f)
}

pub const MAX_LOOP_ITERATIONS: usize = 1_000_000;

#[derive(Error, Debug, Clone)]
pub enum EvalErrorKind {
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("{message}")]
    Thrown { message: String, value: Value },
}

#[derive(Error, Debug, Clone)]
#[error("{kind}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// File the error was raised in
    pub path: Option<String>,
    /// 1-based `(line, column)`
    pub loc: Option<(u32, u32)>,
    /// Innermost frame first
    pub stack: Vec<String>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self {
            kind,
            path: None,
            loc: None,
            stack: Vec::new(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Type(message.into()))
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Range(message.into()))
    }

    pub fn thrown(value: Value) -> Self {
        let message = thrown_message(&value);
        Self::new(EvalErrorKind::Thrown { message, value })
    }

    /// `file:line:column` when known
    pub fn location(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        Some(match self.loc {
            Some((line, column)) => format!("{}:{}:{}", path, line, column),
            None => path.clone(),
        })
    }

    pub fn name(&self) -> String {
        match &self.kind {
            EvalErrorKind::Reference(_) => "ReferenceError".to_string(),
            EvalErrorKind::Type(_) => "TypeError".to_string(),
            EvalErrorKind::Syntax(_) => "SyntaxError".to_string(),
            EvalErrorKind::Range(_) => "RangeError".to_string(),
            EvalErrorKind::Thrown { value, .. } => value
                .as_object()
                .and_then(|object| object.borrow().get_own("name").map(Value::to_js_string))
                .unwrap_or_else(|| "Error".to_string()),
        }
    }

    /// Message without the error name prefix
    pub fn message(&self) -> String {
        match &self.kind {
            EvalErrorKind::Reference(name) => format!("{} is not defined", name),
            EvalErrorKind::Type(message)
            | EvalErrorKind::Syntax(message)
            | EvalErrorKind::Range(message) => message.clone(),
            EvalErrorKind::Thrown { value, message } => match value.as_object() {
                Some(object) => object
                    .borrow()
                    .get_own("message")
                    .map(Value::to_js_string)
                    .unwrap_or_else(|| message.clone()),
                None => message.clone(),
            },
        }
    }

    /// The value a `catch` clause binds
    pub fn to_value(&self) -> Value {
        match &self.kind {
            EvalErrorKind::Thrown { value, .. } => value.clone(),
            _ => error_object(&self.name(), &self.message()),
        }
    }
}

fn thrown_message(value: &Value) -> String {
    match value.as_object() {
        Some(object) => {
            let object = object.borrow();
            match (object.get_own("name"), object.get_own("message")) {
                (Some(name), Some(message)) => {
                    format!("{}: {}", name.to_js_string(), message.to_js_string())
                }
                (None, Some(message)) => message.to_js_string(),
                _ => "Uncaught [object Object]".to_string(),
            }
        }
        None => format!("Uncaught {}", value.to_js_string()),
    }
}

/// `{ name, message, stack }`
pub fn error_object(name: &str, message: &str) -> Value {
    Value::object(vec![
        ("name", Value::str(name)),
        ("message", Value::str(message)),
        ("stack", Value::string(format!("{}: {}", name, message))),
    ])
}

/// Statement completion
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

enum BindMode {
    Declare { mutable: bool },
    Assign,
}

/// Evaluator
pub struct Evaluator {
    ctx: Rc<SessionContext>,
    module: Rc<str>,
    frames: Vec<String>,
    depth: usize,
    max_depth: usize,
}

impl Evaluator {
    pub fn new(ctx: Rc<SessionContext>) -> Self {
        let max_depth = ctx.config.max_call_depth;
        Self {
            ctx,
            module: Rc::from("<session>"),
            frames: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn ctx(&self) -> &Rc<SessionContext> {
        &self.ctx
    }

    /// Path of the module currently executing
    pub fn current_module(&self) -> &str {
        &self.module
    }

    /// Execute a compiled module's top-level statements
    #[instrument(skip_all, fields(path = %module.path))]
    pub fn run_module(
        &mut self,
        module: &CompiledModule,
        exports: &Value,
        module_object: &Value,
        require: Value,
    ) -> EvalResult<()> {
        let scope = Scope::child(&self.ctx.globals);
        scope.declare("import", loader::dynamic_import(&require, &module.path), false);
        scope.declare("require", require, false);
        scope.declare("module", module_object.clone(), false);
        scope.declare("exports", exports.clone(), false);
        self.ctx.module_scopes.borrow_mut().push(scope.clone());

        let previous = std::mem::replace(&mut self.module, Rc::from(module.path.as_str()));
        let result = self.run_module_body(module, exports, module_object, &scope);
        self.module = previous;
        result
    }

    fn run_module_body(
        &mut self,
        module: &CompiledModule,
        exports: &Value,
        module_object: &Value,
        scope: &Rc<Scope>,
    ) -> EvalResult<()> {
        let body = &module.program.body;
        self.hoist(body, scope, Some(exports));

        for stmt in body {
            match stmt {
                Statement::Import(import) => self.exec_import(import, scope)?,
                Statement::ExportDecl { declaration, .. } => {
                    self.exec_statement(declaration, scope)?;
                    if let Statement::VarDecl { declarators, .. } = declaration.as_ref() {
                        let mut names = Vec::new();
                        for declarator in declarators {
                            declarator.pattern.bound_names(&mut names);
                        }
                        for name in names {
                            let value = self.lookup(&name, scope, Span::default())?;
                            set_export(exports, &name, value);
                        }
                    }
                }
                Statement::ExportDefault { value, span } => {
                    let value = match value {
                        ExportDefault::Expression(expr) => {
                            let name = module_stem(&module.path);
                            self.eval_named(expr, &name, scope)
                                .map_err(|e| self.locate(e, *span))?
                        }
                        ExportDefault::Function(def) => match &def.name {
                            Some(name) => self.lookup(name, scope, *span)?,
                            None => self.make_closure(def, scope, &module_stem(&module.path)),
                        },
                    };
                    set_export(exports, "default", value);
                }
                Statement::ExportNamed {
                    specifiers,
                    source: Some(source),
                    ..
                } => {
                    let required = self.require(source);
                    for spec in specifiers {
                        let value = if spec.local == "*" {
                            required.clone()
                        } else {
                            self.read_import(&required, &spec.local)?
                        };
                        set_export(exports, &spec.exported, value);
                    }
                }
                Statement::ExportNamed { source: None, .. } => {}
                Statement::ExportAll { source, .. } => {
                    let required = self.require(source);
                    if let Value::Object(object) = &required {
                        let members: Vec<(String, Value)> = object
                            .borrow()
                            .entries()
                            .filter(|(key, _)| *key != "default")
                            .map(|(key, value)| (key.to_string(), value.clone()))
                            .collect();
                        for (key, value) in members {
                            set_export(exports, &key, value);
                        }
                    }
                }
                other => match self.exec_statement(other, scope)? {
                    Flow::Normal => {}
                    _ => break,
                },
            }
        }

        // Specifier lists bind the final value of each local
        for stmt in body {
            if let Statement::ExportNamed {
                specifiers,
                source: None,
                span,
            } = stmt
            {
                for spec in specifiers {
                    let value = self.lookup(&spec.local, scope, *span)?;
                    set_export(exports, &spec.exported, value);
                }
            }
        }

        // CommonJS `module.exports = x` copies into the existing exports object
        let assigned = self.get_member(module_object, "exports")?;
        if !assigned.strict_equals(exports) {
            match &assigned {
                Value::Object(object) => {
                    let members: Vec<(String, Value)> = object
                        .borrow()
                        .entries()
                        .map(|(key, value)| (key.to_string(), value.clone()))
                        .collect();
                    for (key, value) in members {
                        set_export(exports, &key, value);
                    }
                }
                other => set_export(exports, "default", other.clone()),
            }
            self.set_member(module_object, "exports", exports.clone())?;
        }

        Ok(())
    }

    fn exec_import(&mut self, import: &ImportDecl, scope: &Rc<Scope>) -> EvalResult<()> {
        let source = self.require(&import.source);
        for spec in &import.specifiers {
            match spec {
                ImportSpecifier::Default { local } => {
                    scope.declare_import(local, source.clone(), "default")
                }
                ImportSpecifier::Named { imported, local } => {
                    scope.declare_import(local, source.clone(), imported)
                }
                ImportSpecifier::Namespace { local } => scope.declare(local, source.clone(), false),
            }
        }
        Ok(())
    }

    fn require(&mut self, specifier: &str) -> Value {
        let from = self.module.to_string();
        loader::require(self, &from, specifier)
    }

    /// Read an imported member; a missing `default` falls back to the module itself
    pub fn read_import(&mut self, source: &Value, name: &str) -> EvalResult<Value> {
        if name == "default" {
            let has_default = match source {
                Value::Object(object) => object.borrow().has_own("default"),
                _ => false,
            };
            if !has_default {
                return Ok(match source {
                    Value::Stub(_) => source.clone(),
                    Value::Object(object) if object.borrow().has_dynamic() => {
                        self.get_member(source, name)?
                    }
                    _ => source.clone(),
                });
            }
        }
        self.get_member(source, name)
    }

    fn hoist(&mut self, stmts: &[Statement], scope: &Rc<Scope>, exports: Option<&Value>) {
        for stmt in stmts {
            let (def, exported) = match stmt {
                Statement::FunctionDecl(def) => (def, None),
                Statement::ExportDecl { declaration, .. } => match declaration.as_ref() {
                    Statement::FunctionDecl(def) => (def, def.name.clone()),
                    _ => continue,
                },
                Statement::ExportDefault {
                    value: ExportDefault::Function(def),
                    ..
                } if def.name.is_some() => (def, Some("default".to_string())),
                _ => continue,
            };
            let Some(name) = &def.name else { continue };
            let closure = self.make_closure(def, scope, name);
            scope.declare(name, closure.clone(), true);
            if let (Some(exports), Some(exported)) = (exports, exported) {
                set_export(exports, &exported, closure);
            }
        }
    }

    pub fn make_closure(&self, def: &Rc<FunctionDef>, scope: &Rc<Scope>, name: &str) -> Value {
        let name = def.name.clone().unwrap_or_else(|| name.to_string());
        Value::Function(Rc::new(Function::new(
            name,
            FunctionKind::Closure(Closure {
                def: def.clone(),
                scope: scope.clone(),
                module: self.module.clone(),
            }),
        )))
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    pub fn exec_block(&mut self, stmts: &[Statement], scope: &Rc<Scope>) -> EvalResult<Flow> {
        self.hoist(stmts, scope, None);
        for stmt in stmts {
            match self.exec_statement(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    pub fn exec_statement(&mut self, stmt: &Statement, scope: &Rc<Scope>) -> EvalResult<Flow> {
        match stmt {
            Statement::VarDecl {
                kind, declarators, ..
            } => {
                for declarator in declarators {
                    let value = match (&declarator.init, &declarator.pattern) {
                        (Some(init), Pattern::Ident(name)) => self.eval_named(init, name, scope)?,
                        (Some(init), _) => self.eval(init, scope)?,
                        (None, _) => Value::Undefined,
                    };
                    let mode = BindMode::Declare {
                        mutable: *kind != VarKind::Const,
                    };
                    self.bind_pattern(&declarator.pattern, value, scope, &mode)?;
                }
                Ok(Flow::Normal)
            }
            Statement::FunctionDecl(_) => Ok(Flow::Normal),
            Statement::Expression { expression, .. } => {
                self.eval(expression, scope)?;
                Ok(Flow::Normal)
            }
            Statement::Return { argument, .. } => {
                let value = match argument {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.exec_statement(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_statement(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::Block(stmts) => self.exec_block(stmts, &Scope::child(scope)),
            Statement::For {
                init,
                test,
                update,
                body,
                span,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope, *span),
            Statement::ForOf {
                kind,
                pattern,
                iterable,
                body,
                span,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let items = self.iterate(&iterable).map_err(|e| self.locate(e, *span))?;
                for item in items {
                    let iteration = Scope::child(scope);
                    let mode = BindMode::Declare {
                        mutable: *kind != VarKind::Const,
                    };
                    self.bind_pattern(pattern, item, &iteration, &mode)?;
                    match self.exec_statement(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::ForIn {
                kind,
                pattern,
                object,
                body,
                ..
            } => {
                let object = self.eval(object, scope)?;
                for key in own_keys(&object) {
                    let iteration = Scope::child(scope);
                    let mode = BindMode::Declare {
                        mutable: *kind != VarKind::Const,
                    };
                    self.bind_pattern(pattern, Value::string(key), &iteration, &mode)?;
                    match self.exec_statement(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::While { test, body, span } => {
                let mut iterations = 0;
                while self.eval(test, scope)?.is_truthy() {
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return Err(self.error_at(loop_limit(), *span));
                    }
                    match self.exec_statement(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Switch {
                discriminant,
                cases,
                ..
            } => {
                let value = self.eval(discriminant, scope)?;
                let switch_scope = Scope::child(scope);
                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if self.eval(test, &switch_scope)?.strict_equals(&value) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
                if let Some(start) = start {
                    for case in &cases[start..] {
                        for stmt in &case.body {
                            match self.exec_statement(stmt, &switch_scope)? {
                                Flow::Normal => {}
                                Flow::Break => return Ok(Flow::Normal),
                                other => return Ok(other),
                            }
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Break(_) => Ok(Flow::Break),
            Statement::Continue(_) => Ok(Flow::Continue),
            Statement::Throw { argument, span } => {
                let value = self.eval(argument, scope)?;
                Err(self.error_at_value(value, *span))
            }
            Statement::Try {
                block,
                param,
                handler,
                finalizer,
                ..
            } => {
                let mut outcome = self.exec_block(block, &Scope::child(scope));
                if let (Err(err), Some(handler)) = (&outcome, handler) {
                    let catch_scope = Scope::child(scope);
                    let caught = err.to_value();
                    debug!(error = %err, "caught error");
                    if let Some(param) = param {
                        self.bind_pattern(param, caught, &catch_scope, &BindMode::Declare { mutable: true })?;
                    }
                    outcome = self.exec_block(handler, &catch_scope);
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, &Scope::child(scope))? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                outcome
            }
            // Module-level forms outside a module body are inert
            Statement::Import(_)
            | Statement::ExportDecl { .. }
            | Statement::ExportDefault { .. }
            | Statement::ExportNamed { .. }
            | Statement::ExportAll { .. }
            | Statement::Empty => Ok(Flow::Normal),
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Statement>,
        test: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
        scope: &Rc<Scope>,
        span: Span,
    ) -> EvalResult<Flow> {
        let loop_scope = Scope::child(scope);
        if let Some(init) = init {
            self.exec_statement(init, &loop_scope)?;
        }
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > MAX_LOOP_ITERATIONS {
                return Err(self.error_at(loop_limit(), span));
            }
            // Fresh bindings per iteration so closures capture that iteration's values
            let iteration = Scope::child(scope);
            iteration.restore_bindings(loop_scope.own_bindings());
            if let Some(test) = test {
                if !self.eval(test, &iteration)?.is_truthy() {
                    break;
                }
            }
            let flow = self.exec_statement(body, &iteration)?;
            loop_scope.restore_bindings(iteration.own_bindings());
            match flow {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(update) = update {
                self.eval(update, &loop_scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ---------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &Rc<Scope>,
        mode: &BindMode,
    ) -> EvalResult<()> {
        match pattern {
            Pattern::Ident(name) => match mode {
                BindMode::Declare { mutable } => {
                    scope.declare(name, value, *mutable);
                    Ok(())
                }
                BindMode::Assign => self.assign_ident(name, value, scope, Span::default()),
            },
            Pattern::Object { properties, rest } => {
                if value.is_nullish() {
                    let first = properties
                        .first()
                        .map(|prop| match &prop.key {
                            PropertyKey::Named(name) => name.clone(),
                            PropertyKey::Computed(_) => "[computed]".to_string(),
                        })
                        .unwrap_or_default();
                    return Err(EvalError::type_error(format!(
                        "Cannot destructure property '{}' of '{}' as it is {}.",
                        first,
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                let mut used = Vec::new();
                for prop in properties {
                    let key = match &prop.key {
                        PropertyKey::Named(name) => name.clone(),
                        PropertyKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
                    };
                    let mut member = self.get_member(&value, &key)?;
                    if matches!(member, Value::Undefined) {
                        if let Some(default) = &prop.default {
                            member = match &prop.value {
                                Pattern::Ident(name) => self.eval_named(default, name, scope)?,
                                _ => self.eval(default, scope)?,
                            };
                        }
                    }
                    used.push(key);
                    self.bind_pattern(&prop.value, member, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let mut remaining = JsObject::new();
                    for key in own_keys(&value) {
                        if !used.contains(&key) {
                            let member = self.get_member(&value, &key)?;
                            remaining.set(key, member);
                        }
                    }
                    self.bind_pattern(
                        &Pattern::Ident(rest.clone()),
                        Value::from_object(remaining),
                        scope,
                        mode,
                    )?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    let Some(element) = element else { continue };
                    let mut item = items.get(index).cloned().unwrap_or(Value::Undefined);
                    if matches!(item, Value::Undefined) {
                        if let Some(default) = &element.default {
                            item = self.eval(default, scope)?;
                        }
                    }
                    self.bind_pattern(&element.pattern, item, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let remaining = items.iter().skip(elements.len()).cloned().collect();
                    self.bind_pattern(rest, Value::array(remaining), scope, mode)?;
                }
                Ok(())
            }
        }
    }

    fn lookup(&mut self, name: &str, scope: &Rc<Scope>, span: Span) -> EvalResult<Value> {
        match scope.lookup(name) {
            Some(Binding::Value { value, .. }) => Ok(value),
            Some(Binding::Import { source, name }) => {
                self.read_import(&source, &name).map_err(|e| self.locate(e, span))
            }
            None => Err(self.error_at(EvalErrorKind::Reference(name.to_string()), span)),
        }
    }

    fn assign_ident(&mut self, name: &str, value: Value, scope: &Rc<Scope>, span: Span) -> EvalResult<()> {
        match scope.assign(name, value) {
            Ok(()) => Ok(()),
            Err(AssignError::NotFound) => {
                Err(self.error_at(EvalErrorKind::Reference(name.to_string()), span))
            }
            Err(AssignError::Constant) => Err(self.error_at(
                EvalErrorKind::Type("Assignment to constant variable.".to_string()),
                span,
            )),
        }
    }

    // ---------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------

    /// Evaluate, naming anonymous functions after the binding they initialise
    fn eval_named(&mut self, expr: &Expression, name: &str, scope: &Rc<Scope>) -> EvalResult<Value> {
        match expr {
            Expression::Function(def) if def.name.is_none() => Ok(self.make_closure(def, scope, name)),
            _ => self.eval(expr, scope),
        }
    }

    pub fn eval(&mut self, expr: &Expression, scope: &Rc<Scope>) -> EvalResult<Value> {
        match expr {
            Expression::Literal { value, .. } => Ok(match value {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::str(s),
                Literal::Boolean(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expression::Template {
                quasis,
                expressions,
                ..
            } => {
                let mut out = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = expressions.get(index) {
                        out.push_str(&self.eval(expr, scope)?.to_js_string());
                    }
                }
                Ok(Value::string(out))
            }
            Expression::Ident { name, span } => self.lookup(name, scope, *span),
            Expression::Regex {
                pattern,
                flags,
                span,
            } => crate::methods::make_regex(pattern, flags).map_err(|e| self.locate(e, *span)),
            Expression::Array { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ArrayItem::Item(expr) => values.push(self.eval(expr, scope)?),
                        ArrayItem::Spread(expr) => {
                            let spread = self.eval(expr, scope)?;
                            values.extend(self.iterate(&spread)?);
                        }
                        ArrayItem::Hole => values.push(Value::Undefined),
                    }
                }
                Ok(Value::array(values))
            }
            Expression::Object { properties, .. } => {
                let mut object = JsObject::new();
                for prop in properties {
                    match prop {
                        ObjectProp::KeyValue { key, value } => {
                            let key = match key {
                                PropertyKey::Named(name) => name.clone(),
                                PropertyKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
                            };
                            let value = self.eval_named(value, &key, scope)?;
                            object.set(key, value);
                        }
                        ObjectProp::Shorthand(name) => {
                            let value = self.lookup(name, scope, expr.span())?;
                            object.set(name.clone(), value);
                        }
                        ObjectProp::Spread(expr) => {
                            let spread = self.eval(expr, scope)?;
                            for key in own_keys(&spread) {
                                let value = self.get_member(&spread, &key)?;
                                object.set(key, value);
                            }
                        }
                    }
                }
                Ok(Value::from_object(object))
            }
            Expression::Function(def) => Ok(self.make_closure(def, scope, "")),
            Expression::Unary { op, argument, .. } => self.eval_unary(*op, argument, scope),
            Expression::Update {
                op,
                prefix,
                target,
                span,
            } => {
                let delta = match op {
                    UpdateOp::Increment => 1.0,
                    UpdateOp::Decrement => -1.0,
                };
                let old = self.eval(target, scope)?.to_number();
                let new = Value::Number(old + delta);
                self.store(target, new.clone(), scope, *span)?;
                Ok(if *prefix { new } else { Value::Number(old) })
            }
            Expression::Binary {
                op,
                left,
                right,
                span,
            } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right).map_err(|e| self.locate(e, *span))
            }
            Expression::Logical { op, left, right, .. } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expression::Assign {
                op,
                target,
                value,
                span,
            } => self.eval_assign(*op, target, value, scope, *span),
            Expression::Call { .. } | Expression::Member { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(Value::Undefined))
            }
            Expression::New {
                callee,
                arguments,
                span,
            } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_arguments(arguments, scope)?;
                self.construct(&constructor, &args, callee)
                    .map_err(|e| self.locate(e, *span))
            }
            Expression::Sequence { expressions, .. } => {
                let mut last = Value::Undefined;
                for expr in expressions {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
            Expression::Await { argument, span } => {
                let value = self.eval(argument, scope)?;
                match value.as_promise() {
                    Some(Ok(resolved)) => Ok(resolved),
                    Some(Err(reason)) => Err(self.error_at_value(reason, *span)),
                    None => Ok(value),
                }
            }
            Expression::Jsx(element) => self.eval_jsx(element, scope),
        }
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        argument: &Expression,
        scope: &Rc<Scope>,
    ) -> EvalResult<Value> {
        if op == UnaryOp::TypeOf {
            if let Expression::Ident { name, .. } = argument {
                if scope.lookup(name).is_none() {
                    return Ok(Value::str("undefined"));
                }
            }
        }
        if op == UnaryOp::Delete {
            if let Expression::Member {
                object, property, ..
            } = argument
            {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                match &object {
                    Value::Object(obj) => {
                        obj.borrow_mut().remove(&key);
                    }
                    Value::Function(function) => {
                        function.props.borrow_mut().remove(&key);
                    }
                    _ => {}
                }
            }
            return Ok(Value::Bool(true));
        }

        let value = self.eval(argument, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Minus => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::str(value.type_of()),
            UnaryOp::Void => Value::Undefined,
            UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
            UnaryOp::Delete => Value::Bool(true),
        })
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &AssignTarget,
        value: &Expression,
        scope: &Rc<Scope>,
        span: Span,
    ) -> EvalResult<Value> {
        match target {
            AssignTarget::Pattern(pattern) => {
                let value = self.eval(value, scope)?;
                self.bind_pattern(pattern, value.clone(), scope, &BindMode::Assign)
                    .map_err(|e| self.locate(e, span))?;
                Ok(value)
            }
            AssignTarget::Ident(name) => {
                let next = match op {
                    AssignOp::Assign => self.eval_named(value, name, scope)?,
                    AssignOp::Compound(bin) => {
                        let current = self.lookup(name, scope, span)?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(bin, &current, &rhs).map_err(|e| self.locate(e, span))?
                    }
                    AssignOp::Logical(logical) => {
                        let current = self.lookup(name, scope, span)?;
                        if !logical_assigns(logical, &current) {
                            return Ok(current);
                        }
                        self.eval(value, scope)?
                    }
                };
                self.assign_ident(name, next.clone(), scope, span)?;
                Ok(next)
            }
            AssignTarget::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                let next = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(bin) => {
                        let current = self.get_member(&object, &key).map_err(|e| self.locate(e, span))?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(bin, &current, &rhs).map_err(|e| self.locate(e, span))?
                    }
                    AssignOp::Logical(logical) => {
                        let current = self.get_member(&object, &key).map_err(|e| self.locate(e, span))?;
                        if !logical_assigns(logical, &current) {
                            return Ok(current);
                        }
                        self.eval(value, scope)?
                    }
                };
                self.set_member(&object, &key, next.clone())
                    .map_err(|e| self.locate(e, span))?;
                Ok(next)
            }
        }
    }

    /// Write through an update-expression target
    fn store(&mut self, target: &Expression, value: Value, scope: &Rc<Scope>, span: Span) -> EvalResult<()> {
        match target {
            Expression::Ident { name, .. } => self.assign_ident(name, value, scope, span),
            Expression::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                self.set_member(&object, &key, value).map_err(|e| self.locate(e, span))
            }
            _ => Err(self.error_at(
                EvalErrorKind::Syntax("Invalid left-hand side expression in postfix operation".to_string()),
                span,
            )),
        }
    }

    fn member_key(&mut self, property: &MemberProp, scope: &Rc<Scope>) -> EvalResult<String> {
        Ok(match property {
            MemberProp::Named(name) => name.clone(),
            MemberProp::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
        })
    }

    /// Member and call chains; `None` when an optional link short-circuits
    fn eval_chain(&mut self, expr: &Expression, scope: &Rc<Scope>) -> EvalResult<Option<Value>> {
        match expr {
            Expression::Member {
                object,
                property,
                optional,
                span,
            } => {
                let Some(object) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                let value = self.get_member(&object, &key).map_err(|e| self.locate(e, *span))?;
                Ok(Some(value))
            }
            Expression::Call {
                callee,
                arguments,
                optional,
                span,
            } => {
                let (this, function) = match callee.as_ref() {
                    Expression::Member {
                        object,
                        property,
                        optional: member_optional,
                        span: member_span,
                    } => {
                        let Some(object) = self.eval_chain(object, scope)? else {
                            return Ok(None);
                        };
                        if *member_optional && object.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.member_key(property, scope)?;
                        let function = self
                            .get_member(&object, &key)
                            .map_err(|e| self.locate(e, *member_span))?;
                        (object, function)
                    }
                    other => {
                        let Some(function) = self.eval_chain(other, scope)? else {
                            return Ok(None);
                        };
                        (Value::Undefined, function)
                    }
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(arguments, scope)?;
                if !function.is_callable() {
                    return Err(self.error_at(
                        EvalErrorKind::Type(format!("{} is not a function", expression_label(callee))),
                        *span,
                    ));
                }
                let result = self
                    .call_function(&function, this, &args)
                    .map_err(|e| self.locate(e, *span))?;
                Ok(Some(result))
            }
            other => Ok(Some(self.eval(other, scope)?)),
        }
    }

    fn eval_arguments(&mut self, arguments: &[Argument], scope: &Rc<Scope>) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Argument::Item(expr) => values.push(self.eval(expr, scope)?),
                Argument::Spread(expr) => {
                    let spread = self.eval(expr, scope)?;
                    values.extend(self.iterate(&spread)?);
                }
            }
        }
        Ok(values)
    }

    fn eval_jsx(&mut self, element: &JsxElement, scope: &Rc<Scope>) -> EvalResult<Value> {
        let ty = match &element.name {
            JsxName::Intrinsic(tag) => Value::str(tag),
            JsxName::Fragment => self.ctx.fragment.clone(),
            JsxName::Component(parts) => {
                let mut value = self.lookup(&parts[0], scope, element.span)?;
                for part in &parts[1..] {
                    value = self
                        .get_member(&value, part)
                        .map_err(|e| self.locate(e, element.span))?;
                }
                value
            }
        };

        let mut props = JsObject::new();
        let mut key = None;
        for attribute in &element.attributes {
            match attribute {
                JsxAttribute::Named { name, value } => {
                    let value = match value {
                        None => Value::Bool(true),
                        Some(JsxAttrValue::String(s)) => Value::str(s),
                        Some(JsxAttrValue::Expression(expr)) => self.eval(expr, scope)?,
                    };
                    if name == "key" {
                        key = Some(value.to_property_key());
                    } else {
                        props.set(name.clone(), value);
                    }
                }
                JsxAttribute::Spread(expr) => {
                    let spread = self.eval(expr, scope)?;
                    for name in own_keys(&spread) {
                        let value = self.get_member(&spread, &name)?;
                        if name == "key" {
                            key = Some(value.to_property_key());
                        } else {
                            props.set(name, value);
                        }
                    }
                }
            }
        }

        let mut children = Vec::with_capacity(element.children.len());
        for child in &element.children {
            children.push(match child {
                JsxChild::Text(text) => Value::str(text),
                JsxChild::Expression(expr) => self.eval(expr, scope)?,
                JsxChild::Element(nested) => self.eval_jsx(nested, scope)?,
            });
        }
        match children.len() {
            0 => {}
            1 => props.set("children", children.remove(0)),
            _ => props.set("children", Value::array(children)),
        }

        Ok(Value::Element(Rc::new(Element {
            ty,
            props: Rc::new(RefCell::new(props)),
            key,
        })))
    }

    // ---------------------------------------------------------------
    // Calls
    // ---------------------------------------------------------------

    pub fn call_function(&mut self, function: &Value, this: Value, args: &[Value]) -> EvalResult<Value> {
        match function {
            Value::Function(rc) => match &rc.kind {
                FunctionKind::Closure(closure) => self.call_closure(rc, closure, this, args),
                FunctionKind::Native(native) => {
                    let native = native.clone();
                    native(self, &this, args)
                }
                FunctionKind::Fragment | FunctionKind::Provider(_) | FunctionKind::Consumer(_) => {
                    Ok(Value::Undefined)
                }
            },
            Value::Stub(stub) => Ok(call_stub(stub, args)),
            other => Err(EvalError::type_error(format!(
                "{} is not a function",
                other.to_js_string()
            ))),
        }
    }

    fn call_closure(
        &mut self,
        function: &Rc<Function>,
        closure: &Closure,
        this: Value,
        args: &[Value],
    ) -> EvalResult<Value> {
        if self.depth >= self.max_depth {
            return Err(self.error_at(
                EvalErrorKind::Range("Maximum call stack size exceeded".to_string()),
                closure.def.span,
            ));
        }

        let def = &closure.def;
        let scope = Scope::child(&closure.scope);
        if !def.is_arrow {
            scope.declare("this", this, false);
            scope.declare("arguments", Value::array(args.to_vec()), false);
        }

        let previous = std::mem::replace(&mut self.module, closure.module.clone());
        let name = if function.name.is_empty() {
            "<anonymous>"
        } else {
            function.name.as_str()
        };
        self.frames.push(format!(
            "at {} ({}:{}:{})",
            name, closure.module, def.span.line, def.span.column
        ));
        self.depth += 1;

        let result = with_stack(|| self.run_closure_body(def, &scope, args));

        self.depth -= 1;
        self.frames.pop();
        self.module = previous;

        if def.is_async {
            return Ok(match result {
                Ok(value) if value.as_promise().is_some() => value,
                Ok(value) => Value::promise(Ok(value)),
                Err(err) => Value::promise(Err(err.to_value())),
            });
        }
        result
    }

    fn run_closure_body(&mut self, def: &FunctionDef, scope: &Rc<Scope>, args: &[Value]) -> EvalResult<Value> {
        for (index, param) in def.params.iter().enumerate() {
            let value = if param.rest {
                Value::array(args.iter().skip(index).cloned().collect())
            } else {
                let mut value = args.get(index).cloned().unwrap_or(Value::Undefined);
                if matches!(value, Value::Undefined) {
                    if let Some(default) = &param.default {
                        value = self.eval(default, scope)?;
                    }
                }
                value
            };
            self.bind_pattern(&param.pattern, value, scope, &BindMode::Declare { mutable: true })?;
        }

        match &def.body {
            FunctionBody::Expression(expr) => self.eval(expr, scope),
            FunctionBody::Block(stmts) => match self.exec_block(stmts, scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn construct(&mut self, constructor: &Value, args: &[Value], callee: &Expression) -> EvalResult<Value> {
        match constructor {
            Value::Function(function) => match &function.kind {
                FunctionKind::Closure(_) => {
                    let this = Value::empty_object();
                    let result = self.call_function(constructor, this.clone(), args)?;
                    Ok(match result {
                        Value::Object(_) | Value::Array(_) | Value::Function(_) => result,
                        _ => this,
                    })
                }
                FunctionKind::Native(_) => self.call_function(constructor, Value::Undefined, args),
                _ => Err(EvalError::type_error(format!(
                    "{} is not a constructor",
                    expression_label(callee)
                ))),
            },
            Value::Stub(_) => Ok(constructor.clone()),
            _ => Err(EvalError::type_error(format!(
                "{} is not a constructor",
                expression_label(callee)
            ))),
        }
    }

    /// Values produced by iterating `value` with `for…of` or spread
    pub fn iterate(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            Value::Object(object) => match &object.borrow().internal {
                Internal::Set(items) => Ok(items.clone()),
                Internal::Map(entries) => Ok(entries
                    .iter()
                    .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                    .collect()),
                _ => Err(EvalError::type_error("object is not iterable")),
            },
            Value::Stub(_) => Ok(Vec::new()),
            other => Err(EvalError::type_error(format!(
                "{} is not iterable",
                other.to_js_string()
            ))),
        }
    }

    // ---------------------------------------------------------------
    // Operators
    // ---------------------------------------------------------------

    pub fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        Ok(match op {
            BinaryOp::Add => {
                let left = to_primitive(left);
                let right = to_primitive(right);
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    Value::string(format!("{}{}", left.to_js_string(), right.to_js_string()))
                } else {
                    Value::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
            BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
            BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
            BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
            BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
            BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
            BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
            BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
            BinaryOp::LooseNe => Value::Bool(!left.loose_equals(right)),
            BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
            BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
            BinaryOp::Le => Value::Bool(matches!(
                compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::Ge => Value::Bool(matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::BitAnd => int_op(left, right, |a, b| a & b),
            BinaryOp::BitOr => int_op(left, right, |a, b| a | b),
            BinaryOp::BitXor => int_op(left, right, |a, b| a ^ b),
            BinaryOp::In => {
                let key = left.to_property_key();
                Value::Bool(match right {
                    Value::Object(object) => object.borrow().has_own(&key),
                    Value::Array(items) => {
                        key == "length"
                            || Value::as_index(&key).map_or(false, |i| i < items.borrow().len())
                    }
                    Value::Function(function) => function.props.borrow().has_own(&key),
                    Value::Stub(_) => true,
                    other => {
                        return Err(EvalError::type_error(format!(
                            "Cannot use 'in' operator to search for '{}' in {}",
                            key,
                            other.to_js_string()
                        )))
                    }
                })
            }
            BinaryOp::InstanceOf => Value::Bool(instance_of(left, right)),
        })
    }

    // ---------------------------------------------------------------
    // Error helpers
    // ---------------------------------------------------------------

    fn stack_snapshot(&self) -> Vec<String> {
        self.frames.iter().rev().cloned().collect()
    }

    pub fn error_at(&self, kind: EvalErrorKind, span: Span) -> EvalError {
        let mut error = EvalError::new(kind);
        self.fill_location(&mut error, span);
        error
    }

    fn error_at_value(&self, value: Value, span: Span) -> EvalError {
        let mut error = EvalError::thrown(value);
        self.fill_location(&mut error, span);
        error
    }

    /// Attach location and stack to errors raised by host functions
    pub fn locate(&self, mut error: EvalError, span: Span) -> EvalError {
        if error.path.is_none() {
            self.fill_location(&mut error, span);
        }
        error
    }

    fn fill_location(&self, error: &mut EvalError, span: Span) {
        error.path = Some(self.module.to_string());
        if span.line > 0 {
            error.loc = Some((span.line, span.column));
        }
        error.stack = self.stack_snapshot();
    }
}

fn set_export(exports: &Value, name: &str, value: Value) {
    if let Value::Object(object) = exports {
        object.borrow_mut().set(name, value);
    }
}

fn module_stem(path: &str) -> String {
    path.rsplit('/')
        .next()
        .and_then(|file| file.split('.').next())
        .unwrap_or(path)
        .to_string()
}

fn logical_assigns(op: LogicalOp, current: &Value) -> bool {
    match op {
        LogicalOp::And => current.is_truthy(),
        LogicalOp::Or => !current.is_truthy(),
        LogicalOp::Nullish => current.is_nullish(),
    }
}

fn loop_limit() -> EvalErrorKind {
    EvalErrorKind::Range(format!(
        "Loop exceeded {} iterations",
        MAX_LOOP_ITERATIONS
    ))
}

/// Enumerable own keys, as `Object.keys` reports them
pub fn own_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object.borrow().keys(),
        Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        Value::Function(function) => function.props.borrow().keys(),
        Value::Element(_) => vec!["type".to_string(), "props".to_string(), "key".to_string()],
        _ => Vec::new(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Element(_) | Value::Stub(_) => {
            Value::string(value.to_js_string())
        }
        other => other.clone(),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let left = to_primitive(left);
    let right = to_primitive(right);
    match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64 & 0xFFFF_FFFF) as u32 as i32
}

fn int_op(left: &Value, right: &Value, op: impl Fn(i32, i32) -> i32) -> Value {
    Value::Number(f64::from(op(to_int32(left.to_number()), to_int32(right.to_number()))))
}

fn instance_of(left: &Value, right: &Value) -> bool {
    let Value::Function(constructor) = right else {
        return false;
    };
    match constructor.name.as_str() {
        "Array" => matches!(left, Value::Array(_)),
        "Function" => matches!(left, Value::Function(_)),
        "Object" => matches!(left, Value::Object(_) | Value::Array(_) | Value::Function(_)),
        name => match left {
            Value::Object(object) => {
                let object = object.borrow();
                match (&object.internal, name) {
                    (Internal::Date(_), "Date") => true,
                    (Internal::Map(_), "Map") => true,
                    (Internal::Set(_), "Set") => true,
                    (Internal::Promise(_), "Promise") => true,
                    (Internal::Regex(..), "RegExp") => true,
                    (Internal::None, "Error") => object.has_own("message") && object.has_own("name"),
                    (Internal::None, _) => object
                        .get_own("name")
                        .map_or(false, |n| n.to_js_string() == name),
                    _ => false,
                }
            }
            _ => false,
        },
    }
}

/// Source-like rendering of a callee for error messages
pub fn expression_label(expr: &Expression) -> String {
    match expr {
        Expression::Ident { name, .. } => name.clone(),
        Expression::Member {
            object, property, ..
        } => match property {
            MemberProp::Named(name) => format!("{}.{}", expression_label(object), name),
            MemberProp::Computed(_) => format!("{}[...]", expression_label(object)),
        },
        Expression::Call { callee, .. } => format!("{}(...)", expression_label(callee)),
        _ => "expression".to_string(),
    }
}
