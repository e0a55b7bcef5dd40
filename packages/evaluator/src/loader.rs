//! Synthetic module loader.
//!
//! `require` never fails. Builtins come first, then local files, then
//! UI-kit placeholders and the `cn` helper for design-system imports the
//! project does not contain. Anything left over is a [`MockStub`] that
//! renders as a labelled placeholder. Every degradation is recorded as a session diagnostic.

use crate::builtins::globals::from_json;
use crate::builtins::styling;
use crate::evaluator::Evaluator;
use crate::session::DiagnosticKind;
use crate::stub::{apply_fallback_exports, ui_kit_module, MockStub};
use crate::value::{JsObject, Value};
use glimpse_bundle::{is_image_like, public_path, CompiledModule};
use glimpse_common::{extension, file_stem, is_code_file, PreviewConfig};
use std::rc::Rc;
use tracing::{debug, error, instrument, warn};

/// `require` bound to the requesting file
pub fn require_fn(from: &str) -> Value {
    let from = from.to_string();
    Value::native("require", move |ev, _this, args| {
        let specifier = args.first().map(Value::to_js_string).unwrap_or_default();
        Ok(require(ev, &from, &specifier))
    })
}

/// Dynamic `import(specifier)`: the module, wrapped in a settled promise
pub fn dynamic_import(require: &Value, from: &str) -> Value {
    let require = require.clone();
    let import = Value::native("import", move |ev, _this, args| {
        let module = ev.call_function(&require, Value::Undefined, args)?;
        Ok(Value::promise(Ok(module)))
    });
    if let Value::Function(function) = &import {
        let env = Value::object(vec![
            ("MODE", Value::str("development")),
            ("DEV", Value::Bool(true)),
            ("PROD", Value::Bool(false)),
            ("SSR", Value::Bool(false)),
            ("BASE_URL", Value::str("/")),
        ]);
        let meta = Value::object(vec![
            ("env", env),
            ("url", Value::string(format!("file:///{}", from))),
        ]);
        function.props.borrow_mut().set("meta", meta);
    }
    import
}

/// Resolve and load `specifier` as imported by `from`
#[instrument(level = "debug", skip(ev))]
pub fn require(ev: &mut Evaluator, from: &str, specifier: &str) -> Value {
    let ctx = ev.ctx().clone();
    if let Some(module) = ctx.builtins.get(specifier) {
        debug!(specifier, "builtin module");
        return module.clone();
    }

    let resolved = ctx.bundle.borrow().resolver().resolve(specifier, from, &ctx.store);
    if let Some(path) = resolved {
        return load_path(ev, &path);
    }

    let cache_key = format!("?{}", specifier);
    if let Some(cached) = ctx.loaded_modules.borrow().get(&cache_key) {
        return cached.clone();
    }

    let module = if is_ui_kit_import(specifier, &ctx.config) {
        debug!(specifier, "design-system placeholder module");
        ui_kit_module(specifier)
    } else if is_utils_import(specifier, &ctx.config.alias_prefix) {
        debug!(specifier, "class name helpers supplied");
        styling::utils_module()
    } else if is_stylesheet(specifier) {
        debug!(specifier, "external stylesheet ignored");
        Value::empty_object()
    } else {
        warn!(specifier, from, "unknown module, using stub");
        ctx.report(
            DiagnosticKind::Resolution,
            Some(from),
            format!("Cannot resolve module '{}'", specifier),
        );
        Value::Stub(MockStub::new(specifier))
    };
    ctx.loaded_modules
        .borrow_mut()
        .insert(cache_key, module.clone());
    module
}

/// Whether the loader supplies `specifier` itself when no file matches it
pub fn has_fallback(specifier: &str, config: &PreviewConfig) -> bool {
    is_ui_kit_import(specifier, config)
        || is_utils_import(specifier, &config.alias_prefix)
        || is_stylesheet(specifier)
}

fn is_ui_kit_import(specifier: &str, config: &PreviewConfig) -> bool {
    specifier.contains(config.ui_kit_segment.as_str())
}

fn is_stylesheet(specifier: &str) -> bool {
    extension(specifier).map_or(false, |ext| ext.eq_ignore_ascii_case("css"))
}

/// `@/lib/utils` or a relative `../lib/utils`
fn is_utils_import(specifier: &str, alias_prefix: &str) -> bool {
    specifier
        .strip_prefix(alias_prefix)
        .map_or(specifier.ends_with("/lib/utils"), |rest| rest == "lib/utils")
}

/// Exports of the file at `path`, evaluating it on first use
pub fn load_path(ev: &mut Evaluator, path: &str) -> Value {
    let ctx = ev.ctx().clone();
    if let Some(exports) = ctx.loaded_modules.borrow().get(path) {
        return exports.clone();
    }

    let compiled = ctx.bundle.borrow().get_module(path);
    if let Some(module) = compiled {
        return evaluate(ev, &module);
    }

    let failed = ctx.bundle.borrow().get_failure(path).is_some();
    let exports = if failed {
        debug!(path, "module failed to compile, using stub");
        Value::Stub(MockStub::new(path))
    } else {
        let content = ctx.store.get(path).unwrap_or_default();
        asset_exports(ev, path, content)
    };
    ctx.loaded_modules
        .borrow_mut()
        .insert(path.to_string(), exports.clone());
    exports
}

fn evaluate(ev: &mut Evaluator, module: &Rc<CompiledModule>) -> Value {
    let ctx = ev.ctx().clone();
    let path = module.path.as_str();
    let exports = Value::empty_object();
    let module_object = Value::object(vec![
        ("exports", exports.clone()),
        ("id", Value::str(path)),
    ]);

    // Registered before the body runs so cyclic imports see this object
    ctx.loaded_modules
        .borrow_mut()
        .insert(path.to_string(), exports.clone());

    match ev.run_module(module, &exports, &module_object, require_fn(path)) {
        Ok(()) => repair_default_export(&exports, module),
        Err(err) => {
            error!(path, error = %err, location = ?err.location(), "module evaluation failed");
            ctx.report(
                DiagnosticKind::Evaluation,
                Some(path),
                format!("{}: {}", err.name(), err.message()),
            );
            apply_fallback_exports(&exports, path);
        }
    }
    exports
}

/// Alias a `default` export when the module declared none
pub fn repair_default_export(exports: &Value, module: &CompiledModule) {
    let Value::Object(object) = exports else {
        return;
    };
    let mut object = object.borrow_mut();
    if object.has_own("default") {
        return;
    }

    let mut named: Vec<String> = module
        .declared_exports
        .iter()
        .filter(|name| object.has_own(name))
        .cloned()
        .collect();
    if named.is_empty() {
        named = object
            .keys()
            .into_iter()
            .filter(|name| name != "__esModule")
            .collect();
    }

    let stem = file_stem(&module.path);
    let chosen = match named.as_slice() {
        [] => return,
        [only] => only.clone(),
        several => several
            .iter()
            .find(|name| name.eq_ignore_ascii_case(stem))
            .unwrap_or(&several[0])
            .clone(),
    };
    if let Some(value) = object.get_own(&chosen).cloned() {
        debug!(path = %module.path, export = %chosen, "aliased default export");
        object.set("default", value);
    }
}

/// Exports of a resolved non-code file
fn asset_exports(ev: &Evaluator, path: &str, content: &str) -> Value {
    let ctx = ev.ctx();
    let ext = extension(path).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("css") => Value::empty_object(),
        Some("json") => match serde_json::from_str::<serde_json::Value>(content) {
            Ok(json) => {
                let value = from_json(&json);
                let mut exports = JsObject::new();
                if let Value::Object(members) = &value {
                    for (key, member) in members.borrow().entries() {
                        exports.set(key, member.clone());
                    }
                }
                exports.set("default", value);
                Value::from_object(exports)
            }
            Err(err) => {
                ctx.report(DiagnosticKind::Evaluation, Some(path), format!("Invalid JSON: {}", err));
                Value::object(vec![("default", Value::Null)])
            }
        },
        _ if is_image_like(path, content) => {
            let url = ctx
                .bundle
                .borrow()
                .assets()
                .for_file(path)
                .map(str::to_string)
                .unwrap_or_else(|| public_path(path));
            Value::object(vec![("default", Value::string(url))])
        }
        _ if is_code_file(path) => Value::Stub(MockStub::new(path)),
        _ => Value::object(vec![("default", Value::str(content))]),
    }
}
