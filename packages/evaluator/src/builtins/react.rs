//! `react`, `react/jsx-runtime` and `react-dom`.

use crate::evaluator::{EvalError, EvalResult, Evaluator};
use crate::hooks;
use crate::value::*;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

pub const REACT_VERSION: &str = "18.3.1";

/// `createElement(type, props, ...children)`
pub fn create_element(ty: Value, props: Option<&Value>, children: Vec<Value>) -> Value {
    let mut object = JsObject::new();
    let mut key = None;
    if let Some(Value::Object(given)) = props {
        for (name, value) in given.borrow().entries() {
            match name {
                "key" if !value.is_nullish() => key = Some(value.to_property_key()),
                "key" | "__self" | "__source" => {}
                _ => object.set(name, value.clone()),
            }
        }
    }
    let mut children = children;
    match children.len() {
        0 => {}
        1 => object.set("children", children.remove(0)),
        _ => object.set("children", Value::array(children)),
    }
    Value::Element(Rc::new(Element {
        ty,
        props: Rc::new(RefCell::new(object)),
        key,
    }))
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn hook(name: &str, func: fn(&mut Evaluator, &[Value]) -> EvalResult<Value>) -> (&str, Value) {
    (name, Value::native(name, move |ev, _this, args| func(ev, args)))
}

/// `jsx(type, props, key)`
fn jsx_native() -> Value {
    Value::native("jsx", |_ev, _this, args| {
        let ty = arg(args, 0);
        let props = arg(args, 1);
        let element = create_element(ty, Some(&props), Vec::new());
        match (args.get(2), &element) {
            (Some(key), Value::Element(el)) if !key.is_nullish() => Ok(Value::Element(Rc::new(Element {
                ty: el.ty.clone(),
                props: el.props.clone(),
                key: Some(key.to_property_key()),
            }))),
            _ => Ok(element),
        }
    })
}

fn children_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Undefined | Value::Null | Value::Bool(_) => Vec::new(),
        Value::Array(items) => items.borrow().iter().flat_map(children_list).collect(),
        other => vec![other.clone()],
    }
}

fn children_api() -> Value {
    Value::object(vec![
        (
            "map",
            Value::native("map", |ev, _this, args| {
                let func = arg(args, 1);
                let mut out = Vec::new();
                for (index, child) in children_list(&arg(args, 0)).into_iter().enumerate() {
                    out.push(ev.call_function(&func, Value::Undefined, &[child, Value::from(index)])?);
                }
                Ok(Value::array(out))
            }),
        ),
        (
            "forEach",
            Value::native("forEach", |ev, _this, args| {
                let func = arg(args, 1);
                for (index, child) in children_list(&arg(args, 0)).into_iter().enumerate() {
                    ev.call_function(&func, Value::Undefined, &[child, Value::from(index)])?;
                }
                Ok(Value::Undefined)
            }),
        ),
        (
            "count",
            Value::native("count", |_ev, _this, args| {
                Ok(Value::from(children_list(&arg(args, 0)).len()))
            }),
        ),
        (
            "toArray",
            Value::native("toArray", |_ev, _this, args| {
                Ok(Value::array(children_list(&arg(args, 0))))
            }),
        ),
        (
            "only",
            Value::native("only", |_ev, _this, args| {
                let children = children_list(&arg(args, 0));
                match children.as_slice() {
                    [only] => Ok(only.clone()),
                    _ => Err(EvalError::type_error(
                        "React.Children.only expected to receive a single React element child.",
                    )),
                }
            }),
        ),
    ])
}

fn create_context() -> Value {
    Value::native("createContext", |ev, _this, args| {
        let default = arg(args, 0);
        let id = {
            let mut contexts = ev.ctx().contexts.borrow_mut();
            contexts.push(default);
            contexts.len() - 1
        };
        debug!(id, "created context");
        Ok(Value::object(vec![
            (
                "Provider",
                Value::Function(Rc::new(Function::new("Provider", FunctionKind::Provider(id)))),
            ),
            (
                "Consumer",
                Value::Function(Rc::new(Function::new("Consumer", FunctionKind::Consumer(id)))),
            ),
            ("displayName", Value::Undefined),
        ]))
    })
}

/// `forwardRef(render)`: a component passing `props.ref` as the second argument
fn forward_ref() -> Value {
    Value::native("forwardRef", |_ev, _this, args| {
        let render = arg(args, 0);
        let name = match &render {
            Value::Function(f) if !f.name.is_empty() => f.name.clone(),
            _ => "ForwardRef".to_string(),
        };
        Ok(Value::native(&name, move |ev, _this, args| {
            let props = arg(args, 0);
            let forwarded = match &props {
                Value::Object(object) => object.borrow().get_own("ref").cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            };
            ev.call_function(&render, Value::Undefined, &[props, forwarded])
        }))
    })
}

/// `lazy(() => import("./Page"))`; dynamic imports settle synchronously
fn lazy() -> Value {
    Value::native("lazy", |_ev, _this, args| {
        let factory = arg(args, 0);
        Ok(Value::native("Lazy", move |ev, _this, args| {
            let loaded = ev.call_function(&factory, Value::Undefined, &[])?;
            let module = match loaded.as_promise() {
                Some(Ok(module)) => module,
                Some(Err(reason)) => return Err(EvalError::thrown(reason)),
                None => loaded,
            };
            let component = ev.read_import(&module, "default")?;
            Ok(create_element(component, args.first(), Vec::new()))
        }))
    })
}

fn identity_wrapper(name: &str) -> Value {
    Value::native(name, |_ev, _this, args| Ok(arg(args, 0)))
}

/// Members shared by the `react` module and the `React` global
pub fn react_module(fragment: &Value) -> Value {
    let create = Value::native("createElement", |_ev, _this, args| {
        let ty = arg(args, 0);
        let props = args.get(1).cloned();
        let children = args.iter().skip(2).cloned().collect();
        Ok(create_element(ty, props.as_ref(), children))
    });

    let mut members = vec![
        ("createElement", create),
        (
            "cloneElement",
            Value::native("cloneElement", |_ev, _this, args| {
                let Value::Element(element) = arg(args, 0) else {
                    return Ok(arg(args, 0));
                };
                let mut props = element.props.borrow().clone();
                if let Some(Value::Object(extra)) = args.get(1) {
                    for (key, value) in extra.borrow().entries() {
                        props.set(key, value.clone());
                    }
                }
                let children: Vec<Value> = args.iter().skip(2).cloned().collect();
                match children.len() {
                    0 => {}
                    1 => props.set("children", children[0].clone()),
                    _ => props.set("children", Value::array(children)),
                }
                Ok(Value::Element(Rc::new(Element {
                    ty: element.ty.clone(),
                    props: Rc::new(RefCell::new(props)),
                    key: element.key.clone(),
                })))
            }),
        ),
        (
            "isValidElement",
            Value::native("isValidElement", |_ev, _this, args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Element(_))))
            }),
        ),
        ("Children", children_api()),
        ("Fragment", fragment.clone()),
        ("StrictMode", fragment.clone()),
        ("Suspense", fragment.clone()),
        ("Profiler", fragment.clone()),
        ("createContext", create_context()),
        ("forwardRef", forward_ref()),
        ("memo", identity_wrapper("memo")),
        ("lazy", lazy()),
        ("startTransition", Value::native("startTransition", |ev, _this, args| {
            ev.call_function(&arg(args, 0), Value::Undefined, &[])
        })),
        ("createRef", Value::native("createRef", |_ev, _this, _args| {
            Ok(Value::object(vec![("current", Value::Null)]))
        })),
        ("version", Value::str(REACT_VERSION)),
        hook("useState", hooks::use_state),
        hook("useReducer", hooks::use_reducer),
        hook("useEffect", hooks::use_effect),
        hook("useLayoutEffect", hooks::use_effect),
        hook("useInsertionEffect", hooks::use_effect),
        hook("useMemo", hooks::use_memo),
        hook("useCallback", hooks::use_callback),
        hook("useRef", hooks::use_ref),
        hook("useContext", hooks::use_context),
        hook("useId", hooks::use_id),
        (
            "useTransition",
            Value::native("useTransition", |_ev, _this, _args| {
                let start = Value::native("startTransition", |ev, _this, args| {
                    ev.call_function(&arg(args, 0), Value::Undefined, &[])
                });
                Ok(Value::array(vec![Value::Bool(false), start]))
            }),
        ),
        ("useDeferredValue", identity_wrapper("useDeferredValue")),
        (
            "useSyncExternalStore",
            Value::native("useSyncExternalStore", |ev, _this, args| {
                ev.call_function(&arg(args, 1), Value::Undefined, &[])
            }),
        ),
        ("useImperativeHandle", Value::native("useImperativeHandle", |ev, _this, args| {
            if let Value::Object(target) = arg(args, 0) {
                let handle = ev.call_function(&arg(args, 1), Value::Undefined, &[])?;
                target.borrow_mut().set("current", handle);
            }
            Ok(Value::Undefined)
        })),
        ("useDebugValue", Value::native("useDebugValue", |_ev, _this, _args| Ok(Value::Undefined))),
    ];

    let mut object = JsObject::new();
    for (name, value) in members.drain(..) {
        object.set(name, value);
    }
    Value::from_object(object)
}

pub fn jsx_runtime(fragment: &Value) -> Value {
    let jsx = jsx_native();
    Value::object(vec![
        ("jsx", jsx.clone()),
        ("jsxs", jsx.clone()),
        ("jsxDEV", jsx),
        ("Fragment", fragment.clone()),
    ])
}

fn request_mount(ev: &Evaluator, element: Value) {
    debug!(element = ?element, "mount requested");
    *ev.ctx().mount_request.borrow_mut() = Some(element);
}

/// `react-dom` and `react-dom/client`
pub fn react_dom() -> Value {
    let create_root = Value::native("createRoot", |_ev, _this, _args| {
        Ok(Value::object(vec![
            (
                "render",
                Value::native("render", |ev, _this, args| {
                    request_mount(ev, arg(args, 0));
                    Ok(Value::Undefined)
                }),
            ),
            ("unmount", Value::native("unmount", |_ev, _this, _args| Ok(Value::Undefined))),
        ]))
    });
    Value::object(vec![
        ("createRoot", create_root),
        (
            "hydrateRoot",
            Value::native("hydrateRoot", |ev, _this, args| {
                request_mount(ev, arg(args, 1));
                Ok(Value::Undefined)
            }),
        ),
        (
            "render",
            Value::native("render", |ev, _this, args| {
                request_mount(ev, arg(args, 0));
                Ok(Value::Undefined)
            }),
        ),
        (
            "createPortal",
            Value::native("createPortal", |_ev, _this, args| Ok(arg(args, 0))),
        ),
        (
            "flushSync",
            Value::native("flushSync", |ev, _this, args| {
                ev.call_function(&arg(args, 0), Value::Undefined, &[])
            }),
        ),
        ("version", Value::str(REACT_VERSION)),
    ])
}
