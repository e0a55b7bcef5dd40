//! The global environment previewed code runs in: language built-ins
//! (`Math`, `JSON`, `Object`, `Date`, `Promise`, ...), timers and the
//! browser surface generated apps commonly touch (`window`, `document`,
//! `localStorage`, `console`).

use crate::evaluator::{error_object, own_keys, EvalError, EvalErrorKind, EvalResult, Evaluator};
use crate::methods::{array_length, format_locale_number, make_regex};
use crate::scope::Scope;
use crate::value::*;
use base64::Engine;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

const MS_PER_DAY: f64 = 86_400_000.0;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn native<F>(name: &str, func: F) -> (&str, Value)
where
    F: Fn(&mut Evaluator, &Value, &[Value]) -> EvalResult<Value> + 'static,
{
    (name, Value::native(name, func))
}

fn noop(name: &str) -> (&str, Value) {
    native(name, |_ev, _this, _args| Ok(Value::Undefined))
}

/// Attach static members to a function value
fn with_statics(function: Value, statics: Vec<(&str, Value)>) -> Value {
    if let Value::Function(f) = &function {
        let mut props = f.props.borrow_mut();
        for (name, value) in statics {
            props.set(name, value);
        }
    }
    function
}

/// Declare every global binding into `scope`
pub fn install(scope: &Rc<Scope>, react: &Value) {
    let window = window_object();
    let globals: Vec<(&str, Value)> = vec![
        ("console", console_object()),
        ("Math", math_object()),
        ("JSON", json_object()),
        ("Object", object_constructor()),
        ("Array", array_constructor()),
        ("String", string_constructor()),
        ("Number", number_constructor()),
        ("Boolean", Value::native("Boolean", |_ev, _this, args| Ok(Value::Bool(arg(args, 0).is_truthy())))),
        ("Symbol", symbol_constructor()),
        ("Date", date_constructor()),
        ("Promise", promise_constructor()),
        ("RegExp", Value::native("RegExp", |_ev, _this, args| {
            let pattern = match arg(args, 0) {
                Value::Object(object) => match &object.borrow().internal {
                    Internal::Regex(re, _) => re.as_str().to_string(),
                    _ => "[object Object]".to_string(),
                },
                other => other.to_js_string(),
            };
            let flags = args.get(1).map(Value::to_js_string).unwrap_or_default();
            make_regex(&pattern, &flags)
        })),
        ("Map", collection_constructor("Map")),
        ("WeakMap", collection_constructor("Map")),
        ("Set", collection_constructor("Set")),
        ("WeakSet", collection_constructor("Set")),
        ("Error", error_constructor("Error")),
        ("TypeError", error_constructor("TypeError")),
        ("RangeError", error_constructor("RangeError")),
        ("SyntaxError", error_constructor("SyntaxError")),
        ("ReferenceError", error_constructor("ReferenceError")),
        ("Intl", intl_object()),
        ("URLSearchParams", Value::native("URLSearchParams", |_ev, _this, args| {
            Ok(url_search_params(&query_from_init(&arg(args, 0))))
        })),
        ("URL", url_constructor()),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("parseInt", parse_int()),
        ("parseFloat", parse_float()),
        ("isNaN", Value::native("isNaN", |_ev, _this, args| Ok(Value::Bool(arg(args, 0).to_number().is_nan())))),
        ("isFinite", Value::native("isFinite", |_ev, _this, args| {
            Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
        })),
        ("encodeURIComponent", Value::native("encodeURIComponent", |_ev, _this, args| {
            Ok(Value::string(percent_encode(&arg(args, 0).to_js_string(), true)))
        })),
        ("encodeURI", Value::native("encodeURI", |_ev, _this, args| {
            Ok(Value::string(percent_encode(&arg(args, 0).to_js_string(), false)))
        })),
        ("decodeURIComponent", Value::native("decodeURIComponent", |_ev, _this, args| {
            Ok(Value::string(percent_decode(&arg(args, 0).to_js_string())))
        })),
        ("decodeURI", Value::native("decodeURI", |_ev, _this, args| {
            Ok(Value::string(percent_decode(&arg(args, 0).to_js_string())))
        })),
        ("btoa", Value::native("btoa", |_ev, _this, args| {
            Ok(Value::string(base64::engine::general_purpose::STANDARD.encode(arg(args, 0).to_js_string())))
        })),
        ("atob", Value::native("atob", |_ev, _this, args| {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(arg(args, 0).to_js_string().trim())
                .map_err(|e| EvalError::type_error(format!("Failed to execute 'atob': {}", e)))?;
            Ok(Value::string(String::from_utf8_lossy(&decoded).into_owned()))
        })),
        ("structuredClone", Value::native("structuredClone", |_ev, _this, args| {
            Ok(from_json(&to_json(&arg(args, 0))))
        })),
        ("setTimeout", set_timeout(false)),
        ("setInterval", set_timeout(true)),
        ("clearTimeout", clear_timeout()),
        ("clearInterval", clear_timeout()),
        ("requestAnimationFrame", set_timeout(false)),
        ("cancelAnimationFrame", clear_timeout()),
        ("queueMicrotask", set_timeout(false)),
        ("fetch", Value::native("fetch", |_ev, _this, args| {
            debug!(url = %arg(args, 0).to_js_string(), "fetch rejected in preview");
            Ok(Value::promise(Err(error_object("TypeError", "Failed to fetch"))))
        })),
        ("alert", dialog("alert", Value::Undefined)),
        ("confirm", dialog("confirm", Value::Bool(true))),
        ("prompt", dialog("prompt", Value::Null)),
        ("localStorage", storage_object("local")),
        ("sessionStorage", storage_object("session")),
        ("navigator", navigator_object()),
        ("document", document_object()),
        ("crypto", crypto_object()),
        ("process", Value::object(vec![(
            "env",
            Value::object(vec![("NODE_ENV", Value::str("development"))]),
        )])),
        ("ResizeObserver", observer_constructor("ResizeObserver")),
        ("IntersectionObserver", observer_constructor("IntersectionObserver")),
        ("MutationObserver", observer_constructor("MutationObserver")),
        ("React", react.clone()),
        ("this", Value::Undefined),
    ];

    for (name, value) in globals {
        if let Value::Object(window) = &window {
            if name != "this" {
                window.borrow_mut().set(name, value.clone());
            }
        }
        scope.declare(name, value, true);
    }
    scope.declare("window", window.clone(), true);
    scope.declare("globalThis", window.clone(), true);
    scope.declare("self", window, true);
}

// -------------------------------------------------------------------
// console
// -------------------------------------------------------------------

fn format_console(args: &[Value]) -> String {
    args.iter()
        .map(|value| match value {
            Value::String(s) => s.to_string(),
            Value::Object(_) | Value::Array(_) => format!("{:?}", value),
            other => other.to_js_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_object() -> Value {
    Value::object(vec![
        native("log", |_ev, _this, args| {
            info!(target: "glimpse::console", "{}", format_console(args));
            Ok(Value::Undefined)
        }),
        native("info", |_ev, _this, args| {
            info!(target: "glimpse::console", "{}", format_console(args));
            Ok(Value::Undefined)
        }),
        native("debug", |_ev, _this, args| {
            debug!(target: "glimpse::console", "{}", format_console(args));
            Ok(Value::Undefined)
        }),
        native("table", |_ev, _this, args| {
            info!(target: "glimpse::console", "{}", format_console(args));
            Ok(Value::Undefined)
        }),
        native("warn", |_ev, _this, args| {
            warn!(target: "glimpse::console", "{}", format_console(args));
            Ok(Value::Undefined)
        }),
        native("error", |_ev, _this, args| {
            error!(target: "glimpse::console", "{}", format_console(args));
            Ok(Value::Undefined)
        }),
        noop("group"),
        noop("groupCollapsed"),
        noop("groupEnd"),
        noop("time"),
        noop("timeEnd"),
        noop("trace"),
        noop("assert"),
    ])
}

// -------------------------------------------------------------------
// Math, Number, String, Object, Array
// -------------------------------------------------------------------

fn math_unary(name: &str, op: fn(f64) -> f64) -> (&str, Value) {
    native(name, move |_ev, _this, args| Ok(Value::Number(op(arg(args, 0).to_number()))))
}

/// xorshift64*, seeded per session so previews render deterministically
pub fn next_random(state: u64) -> (u64, f64) {
    let mut x = state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    let out = x.wrapping_mul(0x2545_F491_4F6C_DD1D);
    (x, (out >> 11) as f64 / (1u64 << 53) as f64)
}

fn random(ev: &Evaluator) -> f64 {
    let seed = &ev.ctx().random_seed;
    let (next, value) = next_random(seed.get());
    seed.set(next);
    value
}

fn math_object() -> Value {
    Value::object(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("LN2", Value::Number(std::f64::consts::LN_2)),
        ("LN10", Value::Number(std::f64::consts::LN_10)),
        ("SQRT2", Value::Number(std::f64::consts::SQRT_2)),
        math_unary("abs", f64::abs),
        math_unary("floor", f64::floor),
        math_unary("ceil", f64::ceil),
        math_unary("round", |n| (n + 0.5).floor()),
        math_unary("trunc", f64::trunc),
        math_unary("sign", |n| if n.is_nan() || n == 0.0 { n } else { n.signum() }),
        math_unary("sqrt", f64::sqrt),
        math_unary("cbrt", f64::cbrt),
        math_unary("log", f64::ln),
        math_unary("log10", f64::log10),
        math_unary("log2", f64::log2),
        math_unary("exp", f64::exp),
        math_unary("sin", f64::sin),
        math_unary("cos", f64::cos),
        math_unary("tan", f64::tan),
        math_unary("asin", f64::asin),
        math_unary("acos", f64::acos),
        math_unary("atan", f64::atan),
        native("atan2", |_ev, _this, args| {
            Ok(Value::Number(arg(args, 0).to_number().atan2(arg(args, 1).to_number())))
        }),
        native("pow", |_ev, _this, args| {
            Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
        }),
        native("hypot", |_ev, _this, args| {
            Ok(Value::Number(args.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt()))
        }),
        native("min", |_ev, _this, args| {
            let mut min = f64::INFINITY;
            for value in args {
                let n = value.to_number();
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                min = min.min(n);
            }
            Ok(Value::Number(min))
        }),
        native("max", |_ev, _this, args| {
            let mut max = f64::NEG_INFINITY;
            for value in args {
                let n = value.to_number();
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                max = max.max(n);
            }
            Ok(Value::Number(max))
        }),
        native("random", |ev, _this, _args| Ok(Value::Number(random(ev)))),
    ])
}

fn parse_int() -> Value {
    Value::native("parseInt", |_ev, _this, args| {
        let text = arg(args, 0).to_js_string();
        let radix = match args.get(1) {
            Some(r) if !r.is_nullish() && r.to_number() != 0.0 => r.to_number() as u32,
            _ => 10,
        };
        let trimmed = text.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (radix, digits) = if radix == 16 || radix == 10 && (digits.starts_with("0x") || digits.starts_with("0X")) {
            (16, digits.trim_start_matches("0x").trim_start_matches("0X"))
        } else {
            (radix, digits)
        };
        if !(2..=36).contains(&radix) {
            return Ok(Value::Number(f64::NAN));
        }
        let valid: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
        if valid.is_empty() {
            return Ok(Value::Number(f64::NAN));
        }
        let mut n = 0f64;
        for c in valid.chars() {
            n = n * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
        }
        Ok(Value::Number(if negative { -n } else { n }))
    })
}

fn parse_float() -> Value {
    Value::native("parseFloat", |_ev, _this, args| {
        let text = arg(args, 0).to_js_string();
        let trimmed = text.trim_start();
        let mut end = 0;
        let mut seen_dot = false;
        let mut seen_exp = false;
        for (index, c) in trimmed.char_indices() {
            let ok = match c {
                '0'..='9' => true,
                '+' | '-' => index == 0 || trimmed[..index].ends_with(['e', 'E']),
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    true
                }
                'e' | 'E' if !seen_exp && index > 0 => {
                    seen_exp = true;
                    true
                }
                _ => false,
            };
            if !ok {
                break;
            }
            end = index + c.len_utf8();
        }
        let mut candidate = &trimmed[..end];
        while !candidate.is_empty() && candidate.parse::<f64>().is_err() {
            candidate = &candidate[..candidate.len() - 1];
        }
        if candidate.is_empty() && trimmed.starts_with("Infinity") {
            return Ok(Value::Number(f64::INFINITY));
        }
        Ok(Value::Number(candidate.parse().unwrap_or(f64::NAN)))
    })
}

fn number_constructor() -> Value {
    let number = Value::native("Number", |_ev, _this, args| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    with_statics(
        number,
        vec![
            native("isInteger", |_ev, _this, args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
            }),
            native("isFinite", |_ev, _this, args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
            }),
            native("isNaN", |_ev, _this, args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
            }),
            native("isSafeInteger", |_ev, _this, args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0)))
            }),
            ("parseFloat", parse_float()),
            ("parseInt", parse_int()),
            ("MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0)),
            ("MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0)),
            ("EPSILON", Value::Number(f64::EPSILON)),
            ("MAX_VALUE", Value::Number(f64::MAX)),
            ("MIN_VALUE", Value::Number(5e-324)),
            ("POSITIVE_INFINITY", Value::Number(f64::INFINITY)),
            ("NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY)),
            ("NaN", Value::Number(f64::NAN)),
        ],
    )
}

fn string_constructor() -> Value {
    let string = Value::native("String", |_ev, _this, args| {
        Ok(Value::string(args.first().map(Value::to_js_string).unwrap_or_default()))
    });
    with_statics(
        string,
        vec![native("fromCharCode", |_ev, _this, args| {
            Ok(Value::string(
                args.iter()
                    .filter_map(|code| char::from_u32(code.to_number() as u32))
                    .collect::<String>(),
            ))
        })],
    )
}

fn symbol_constructor() -> Value {
    let symbol = Value::native("Symbol", |_ev, _this, args| {
        Ok(Value::string(format!("Symbol({})", args.first().map(Value::to_js_string).unwrap_or_default())))
    });
    with_statics(symbol, vec![("iterator", Value::str("Symbol(Symbol.iterator)"))])
}

fn object_constructor() -> Value {
    let object = Value::native("Object", |_ev, _this, args| match arg(args, 0) {
        value @ (Value::Object(_) | Value::Array(_) | Value::Function(_)) => Ok(value),
        _ => Ok(Value::empty_object()),
    });
    with_statics(
        object,
        vec![
            native("keys", |_ev, _this, args| {
                Ok(Value::array(own_keys(&arg(args, 0)).into_iter().map(Value::string).collect()))
            }),
            native("getOwnPropertyNames", |_ev, _this, args| {
                Ok(Value::array(own_keys(&arg(args, 0)).into_iter().map(Value::string).collect()))
            }),
            native("values", |ev, _this, args| {
                let target = arg(args, 0);
                let mut values = Vec::new();
                for key in own_keys(&target) {
                    values.push(ev.get_member(&target, &key)?);
                }
                Ok(Value::array(values))
            }),
            native("entries", |ev, _this, args| {
                let target = arg(args, 0);
                let mut entries = Vec::new();
                for key in own_keys(&target) {
                    let value = ev.get_member(&target, &key)?;
                    entries.push(Value::array(vec![Value::string(key), value]));
                }
                Ok(Value::array(entries))
            }),
            native("assign", |ev, _this, args| {
                let target = arg(args, 0);
                for source in args.iter().skip(1) {
                    for key in own_keys(source) {
                        let value = ev.get_member(source, &key)?;
                        ev.set_member(&target, &key, value)?;
                    }
                }
                Ok(target)
            }),
            native("fromEntries", |ev, _this, args| {
                let mut object = JsObject::new();
                for entry in ev.iterate(&arg(args, 0))? {
                    let key = ev.get_member(&entry, "0")?.to_property_key();
                    let value = ev.get_member(&entry, "1")?;
                    object.set(key, value);
                }
                Ok(Value::from_object(object))
            }),
            native("freeze", |_ev, _this, args| Ok(arg(args, 0))),
            native("seal", |_ev, _this, args| Ok(arg(args, 0))),
            native("isFrozen", |_ev, _this, _args| Ok(Value::Bool(false))),
            native("create", |_ev, _this, _args| Ok(Value::empty_object())),
            native("getPrototypeOf", |_ev, _this, _args| Ok(Value::Null)),
            native("defineProperty", |ev, _this, args| {
                let target = arg(args, 0);
                let key = arg(args, 1).to_property_key();
                if let Value::Object(descriptor) = arg(args, 2) {
                    let value = descriptor.borrow().get_own("value").cloned();
                    if let Some(value) = value {
                        ev.set_member(&target, &key, value)?;
                    }
                }
                Ok(target)
            }),
            native("is", |_ev, _this, args| {
                let (a, b) = (arg(args, 0), arg(args, 1));
                Ok(Value::Bool(match (&a, &b) {
                    (Value::Number(x), Value::Number(y)) => {
                        (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
                    }
                    _ => a.strict_equals(&b),
                }))
            }),
        ],
    )
}

fn array_constructor() -> Value {
    let array = Value::native("Array", |_ev, _this, args| match args {
        [Value::Number(n)] => Ok(Value::array(vec![Value::Undefined; array_length(*n)?])),
        _ => Ok(Value::array(args.to_vec())),
    });
    with_statics(
        array,
        vec![
            native("isArray", |_ev, _this, args| Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))),
            native("of", |_ev, _this, args| Ok(Value::array(args.to_vec()))),
            native("from", |ev, _this, args| {
                let source = arg(args, 0);
                let items = match &source {
                    Value::Object(object) if matches!(object.borrow().internal, Internal::None) => {
                        let length = object.borrow().get_own("length").map_or(0.0, Value::to_number);
                        let length = if length > 0.0 { array_length(length.trunc())? } else { 0 };
                        let mut items = Vec::with_capacity(length);
                        for index in 0..length {
                            items.push(ev.get_member(&source, &index.to_string())?);
                        }
                        items
                    }
                    Value::Undefined | Value::Null => Vec::new(),
                    _ => ev.iterate(&source)?,
                };
                let map = arg(args, 1);
                if !map.is_callable() {
                    return Ok(Value::array(items));
                }
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    out.push(ev.call_function(&map, Value::Undefined, &[item, Value::from(index)])?);
                }
                Ok(Value::array(out))
            }),
        ],
    )
}

// -------------------------------------------------------------------
// JSON
// -------------------------------------------------------------------

/// Value to JSON; `undefined` and functions are dropped from objects
pub fn to_json(value: &Value) -> serde_json::Value {
    to_json_inner(value).unwrap_or(serde_json::Value::Null)
}

fn to_json_inner(value: &Value) -> Option<serde_json::Value> {
    Some(match value {
        Value::Undefined | Value::Function(_) => return None,
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9e15 => {
            serde_json::Value::Number(serde_json::Number::from(*n as i64))
        }
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => serde_json::Value::Array(
            items
                .borrow()
                .iter()
                .map(|item| to_json_inner(item).unwrap_or(serde_json::Value::Null))
                .collect(),
        ),
        Value::Object(object) => {
            let object = object.borrow();
            if let Internal::Date(ms) = object.internal {
                return Some(serde_json::Value::String(date_to_iso(ms)));
            }
            let mut map = serde_json::Map::new();
            for (key, value) in object.entries() {
                if let Some(json) = to_json_inner(value) {
                    map.insert(key.to_string(), json);
                }
            }
            serde_json::Value::Object(map)
        }
        Value::Element(_) => serde_json::Value::Object(serde_json::Map::new()),
        Value::Stub(stub) => serde_json::Value::String(stub.coerce()),
    })
}

pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(s),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut object = JsObject::new();
            for (key, value) in map {
                object.set(key.clone(), from_json(value));
            }
            Value::from_object(object)
        }
    }
}

fn json_object() -> Value {
    Value::object(vec![
        native("stringify", |_ev, _this, args| {
            let value = arg(args, 0);
            if matches!(value, Value::Undefined | Value::Function(_)) {
                return Ok(Value::Undefined);
            }
            let json = to_json(&value);
            let indent = match arg(args, 2) {
                Value::Number(n) if n > 0.0 => " ".repeat((n as usize).min(10)),
                Value::String(s) => s.chars().take(10).collect(),
                _ => String::new(),
            };
            let text = if indent.is_empty() {
                serde_json::to_string(&json)
            } else {
                let mut out = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                serde::Serialize::serialize(&json, &mut serializer)
                    .map(|_| String::from_utf8_lossy(&out).into_owned())
            };
            text.map(Value::string)
                .map_err(|e| EvalError::type_error(format!("JSON.stringify failed: {}", e)))
        }),
        native("parse", |_ev, _this, args| {
            let text = arg(args, 0).to_js_string();
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|json| from_json(&json))
                .map_err(|e| EvalError::new(EvalErrorKind::Syntax(format!("JSON.parse: {}", e))))
        }),
    ])
}

// -------------------------------------------------------------------
// Errors, collections, observers
// -------------------------------------------------------------------

fn error_constructor(name: &'static str) -> Value {
    Value::native(name, move |_ev, _this, args| {
        let message = match arg(args, 0) {
            Value::Undefined => String::new(),
            other => other.to_js_string(),
        };
        let error = error_object(name, &message);
        if let (Value::Object(error), Value::Object(options)) = (&error, arg(args, 1)) {
            if let Some(cause) = options.borrow().get_own("cause") {
                error.borrow_mut().set("cause", cause.clone());
            }
        }
        Ok(error)
    })
}

fn collection_constructor(kind: &'static str) -> Value {
    Value::native(kind, move |ev, _this, args| {
        let initial = match arg(args, 0) {
            Value::Undefined | Value::Null => Vec::new(),
            other => ev.iterate(&other)?,
        };
        let mut object = JsObject::new();
        object.internal = if kind == "Map" {
            let mut entries: Vec<(Value, Value)> = Vec::new();
            for entry in initial {
                let key = ev.get_member(&entry, "0")?;
                let value = ev.get_member(&entry, "1")?;
                match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((key, value)),
                }
            }
            Internal::Map(entries)
        } else {
            let mut items: Vec<Value> = Vec::new();
            for item in initial {
                if !items.iter().any(|existing| existing.same_value_zero(&item)) {
                    items.push(item);
                }
            }
            Internal::Set(items)
        };
        Ok(Value::from_object(object))
    })
}

fn observer_constructor(name: &str) -> Value {
    Value::native(name, |_ev, _this, _args| {
        Ok(Value::object(vec![
            noop("observe"),
            noop("unobserve"),
            noop("disconnect"),
            native("takeRecords", |_ev, _this, _args| Ok(Value::array(Vec::new()))),
        ]))
    })
}

// -------------------------------------------------------------------
// Promise
// -------------------------------------------------------------------

fn settle(value: Value) -> Result<Value, Value> {
    match value.as_promise() {
        Some(settled) => settled,
        None => Ok(value),
    }
}

fn promise_constructor() -> Value {
    let constructor = Value::native("Promise", |ev, _this, args| {
        let state: Rc<RefCell<Option<Result<Value, Value>>>> = Rc::new(RefCell::new(None));
        let resolve_state = state.clone();
        let resolve = Value::native("resolve", move |_ev, _this, args| {
            let mut slot = resolve_state.borrow_mut();
            if slot.is_none() {
                *slot = Some(settle(arg(args, 0)));
            }
            Ok(Value::Undefined)
        });
        let reject_state = state.clone();
        let reject = Value::native("reject", move |_ev, _this, args| {
            let mut slot = reject_state.borrow_mut();
            if slot.is_none() {
                *slot = Some(Err(arg(args, 0)));
            }
            Ok(Value::Undefined)
        });
        let executor = arg(args, 0);
        if let Err(err) = ev.call_function(&executor, Value::Undefined, &[resolve, reject]) {
            let mut slot = state.borrow_mut();
            if slot.is_none() {
                *slot = Some(Err(err.to_value()));
            }
        }
        // Executors that settle later (timers) resolve to undefined
        let settled = state.borrow_mut().take().unwrap_or(Ok(Value::Undefined));
        Ok(Value::promise(settled))
    });
    with_statics(
        constructor,
        vec![
            native("resolve", |_ev, _this, args| Ok(Value::promise(settle(arg(args, 0))))),
            native("reject", |_ev, _this, args| Ok(Value::promise(Err(arg(args, 0))))),
            native("all", |ev, _this, args| {
                let mut values = Vec::new();
                for item in ev.iterate(&arg(args, 0))? {
                    match settle(item) {
                        Ok(value) => values.push(value),
                        Err(reason) => return Ok(Value::promise(Err(reason))),
                    }
                }
                Ok(Value::promise(Ok(Value::array(values))))
            }),
            native("allSettled", |ev, _this, args| {
                let mut outcomes = Vec::new();
                for item in ev.iterate(&arg(args, 0))? {
                    outcomes.push(match settle(item) {
                        Ok(value) => Value::object(vec![("status", Value::str("fulfilled")), ("value", value)]),
                        Err(reason) => Value::object(vec![("status", Value::str("rejected")), ("reason", reason)]),
                    });
                }
                Ok(Value::promise(Ok(Value::array(outcomes))))
            }),
            native("race", |ev, _this, args| {
                let first = ev.iterate(&arg(args, 0))?.into_iter().next().unwrap_or(Value::Undefined);
                Ok(Value::promise(settle(first)))
            }),
            native("any", |ev, _this, args| {
                let items = ev.iterate(&arg(args, 0))?;
                for item in &items {
                    if let Ok(value) = settle(item.clone()) {
                        return Ok(Value::promise(Ok(value)));
                    }
                }
                Ok(Value::promise(Err(error_object("AggregateError", "All promises were rejected"))))
            }),
        ],
    )
}

// -------------------------------------------------------------------
// Timers
// -------------------------------------------------------------------

pub struct Timer {
    pub id: u32,
    pub delay: f64,
    pub callback: Value,
    pub args: Vec<Value>,
    /// Intervals are recorded but never fire
    pub repeat: bool,
}

#[derive(Default)]
pub struct TimerQueue {
    next_id: u32,
    pending: Vec<Timer>,
}

impl TimerQueue {
    pub fn schedule(&mut self, callback: Value, delay: f64, args: Vec<Value>, repeat: bool) -> u32 {
        self.next_id += 1;
        self.pending.push(Timer {
            id: self.next_id,
            delay,
            callback,
            args,
            repeat,
        });
        self.next_id
    }

    pub fn cancel(&mut self, id: u32) {
        self.pending.retain(|timer| timer.id != id);
    }

    /// One-shot timers in firing order; intervals stay queued
    pub fn take_due(&mut self) -> Vec<Timer> {
        let (mut due, intervals): (Vec<Timer>, Vec<Timer>) =
            std::mem::take(&mut self.pending).into_iter().partition(|timer| !timer.repeat);
        self.pending = intervals;
        due.sort_by(|a, b| a.delay.total_cmp(&b.delay).then(a.id.cmp(&b.id)));
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn set_timeout(repeat: bool) -> Value {
    let name = if repeat { "setInterval" } else { "setTimeout" };
    Value::native(name, move |ev, _this, args| {
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Ok(Value::Number(0.0));
        }
        let delay = args.get(1).map_or(0.0, Value::to_number);
        let delay = if delay.is_nan() { 0.0 } else { delay };
        let extra = args.iter().skip(2).cloned().collect();
        let id = ev.ctx().timers.borrow_mut().schedule(callback, delay, extra, repeat);
        Ok(Value::Number(f64::from(id)))
    })
}

fn clear_timeout() -> Value {
    Value::native("clearTimeout", |ev, _this, args| {
        let id = arg(args, 0).to_number();
        if id.is_finite() && id >= 0.0 {
            ev.ctx().timers.borrow_mut().cancel(id as u32);
        }
        Ok(Value::Undefined)
    })
}

/// Fire one-shot timers queued so far; returns how many ran
pub fn flush_timers(ev: &mut Evaluator) -> EvalResult<usize> {
    let due = ev.ctx().timers.borrow_mut().take_due();
    let count = due.len();
    for timer in due {
        ev.call_function(&timer.callback, Value::Undefined, &timer.args)?;
    }
    Ok(count)
}

// -------------------------------------------------------------------
// Browser surface
// -------------------------------------------------------------------

fn dialog(name: &'static str, result: Value) -> Value {
    Value::native(name, move |_ev, _this, args| {
        info!(target: "glimpse::console", dialog = name, "{}", format_console(args));
        Ok(result.clone())
    })
}

fn storage_object(area: &'static str) -> Value {
    let key_of = move |args: &[Value]| format!("{}:{}", area, arg(args, 0).to_js_string());
    Value::object(vec![
        native("getItem", move |ev, _this, args| {
            Ok(ev
                .ctx()
                .storage
                .borrow()
                .get(&key_of(args))
                .map_or(Value::Null, |v| Value::str(v)))
        }),
        native("setItem", move |ev, _this, args| {
            let value = arg(args, 1).to_js_string();
            ev.ctx().storage.borrow_mut().insert(key_of(args), value);
            Ok(Value::Undefined)
        }),
        native("removeItem", move |ev, _this, args| {
            ev.ctx().storage.borrow_mut().remove(&key_of(args));
            Ok(Value::Undefined)
        }),
        native("clear", move |ev, _this, _args| {
            let prefix = format!("{}:", area);
            ev.ctx().storage.borrow_mut().retain(|key, _| !key.starts_with(&prefix));
            Ok(Value::Undefined)
        }),
        native("key", move |ev, _this, args| {
            let index = arg(args, 0).to_number() as usize;
            let prefix = format!("{}:", area);
            Ok(ev
                .ctx()
                .storage
                .borrow()
                .keys()
                .filter_map(|key| key.strip_prefix(&prefix))
                .nth(index)
                .map_or(Value::Null, Value::str))
        }),
    ])
}

fn navigator_object() -> Value {
    Value::object(vec![
        ("userAgent", Value::str("Mozilla/5.0 (Glimpse Preview)")),
        ("language", Value::str("en-US")),
        ("languages", Value::array(vec![Value::str("en-US"), Value::str("en")])),
        ("onLine", Value::Bool(true)),
        ("platform", Value::str("Glimpse")),
        (
            "clipboard",
            Value::object(vec![
                native("writeText", |_ev, _this, _args| Ok(Value::promise(Ok(Value::Undefined)))),
                native("readText", |_ev, _this, _args| Ok(Value::promise(Ok(Value::str(""))))),
            ]),
        ),
        native("share", |_ev, _this, _args| Ok(Value::promise(Ok(Value::Undefined)))),
    ])
}

fn class_list() -> Value {
    let classes: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let (add, remove, toggle, contains) = (classes.clone(), classes.clone(), classes.clone(), classes);
    Value::object(vec![
        native("add", move |_ev, _this, args| {
            let mut classes = add.borrow_mut();
            for name in args.iter().map(Value::to_js_string) {
                if !classes.contains(&name) {
                    classes.push(name);
                }
            }
            Ok(Value::Undefined)
        }),
        native("remove", move |_ev, _this, args| {
            let names: Vec<String> = args.iter().map(Value::to_js_string).collect();
            remove.borrow_mut().retain(|name| !names.contains(name));
            Ok(Value::Undefined)
        }),
        native("toggle", move |_ev, _this, args| {
            let name = arg(args, 0).to_js_string();
            let mut classes = toggle.borrow_mut();
            let force = args.get(1).filter(|v| !v.is_nullish()).map(Value::is_truthy);
            let present = classes.contains(&name);
            let next = force.unwrap_or(!present);
            if next && !present {
                classes.push(name);
            } else if !next {
                classes.retain(|c| *c != name);
            }
            Ok(Value::Bool(next))
        }),
        native("contains", move |_ev, _this, args| {
            Ok(Value::Bool(contains.borrow().contains(&arg(args, 0).to_js_string())))
        }),
    ])
}

/// Minimal DOM node handle for imperative code (`focus`, `classList`, ...)
pub fn element_handle(tag: &str, id: &str) -> Value {
    Value::object(vec![
        ("id", Value::str(id)),
        ("tagName", Value::string(tag.to_uppercase())),
        ("nodeName", Value::string(tag.to_uppercase())),
        ("style", Value::empty_object()),
        ("dataset", Value::empty_object()),
        ("classList", class_list()),
        ("textContent", Value::str("")),
        ("innerHTML", Value::str("")),
        ("value", Value::str("")),
        ("scrollTop", Value::Number(0.0)),
        ("scrollHeight", Value::Number(0.0)),
        ("offsetWidth", Value::Number(0.0)),
        ("offsetHeight", Value::Number(0.0)),
        noop("focus"),
        noop("blur"),
        noop("click"),
        noop("scrollIntoView"),
        noop("scrollTo"),
        noop("addEventListener"),
        noop("removeEventListener"),
        noop("setAttribute"),
        noop("removeAttribute"),
        noop("appendChild"),
        noop("removeChild"),
        noop("remove"),
        native("getAttribute", |_ev, _this, _args| Ok(Value::Null)),
        native("contains", |_ev, _this, _args| Ok(Value::Bool(false))),
        native("querySelector", |_ev, _this, _args| Ok(Value::Null)),
        native("querySelectorAll", |_ev, _this, _args| Ok(Value::array(Vec::new()))),
        native("getBoundingClientRect", |_ev, _this, _args| {
            Ok(Value::object(vec![
                ("x", Value::Number(0.0)),
                ("y", Value::Number(0.0)),
                ("top", Value::Number(0.0)),
                ("left", Value::Number(0.0)),
                ("right", Value::Number(0.0)),
                ("bottom", Value::Number(0.0)),
                ("width", Value::Number(0.0)),
                ("height", Value::Number(0.0)),
            ]))
        }),
    ])
}

fn document_object() -> Value {
    let handles: Rc<RefCell<Vec<(String, Value)>>> = Rc::new(RefCell::new(Vec::new()));
    let by_id = handles.clone();
    Value::object(vec![
        ("title", Value::str("Preview")),
        ("cookie", Value::str("")),
        ("readyState", Value::str("complete")),
        ("documentElement", element_handle("html", "")),
        ("body", element_handle("body", "")),
        ("head", element_handle("head", "")),
        native("getElementById", move |_ev, _this, args| {
            let id = arg(args, 0).to_js_string();
            let mut handles = by_id.borrow_mut();
            if let Some((_, handle)) = handles.iter().find(|(known, _)| *known == id) {
                return Ok(handle.clone());
            }
            let handle = element_handle("div", &id);
            handles.push((id, handle.clone()));
            Ok(handle)
        }),
        native("querySelector", |_ev, _this, args| {
            let selector = arg(args, 0).to_js_string();
            Ok(element_handle("div", selector.trim_start_matches('#')))
        }),
        native("querySelectorAll", |_ev, _this, _args| Ok(Value::array(Vec::new()))),
        native("createElement", |_ev, _this, args| Ok(element_handle(&arg(args, 0).to_js_string(), ""))),
        native("createTextNode", |_ev, _this, _args| Ok(element_handle("#text", ""))),
        noop("addEventListener"),
        noop("removeEventListener"),
    ])
}

fn crypto_object() -> Value {
    Value::object(vec![
        native("randomUUID", |ev, _this, _args| {
            let mut hex = String::new();
            while hex.len() < 32 {
                hex.push_str(&format!("{:08x}", (random(ev) * f64::from(u32::MAX)) as u32));
            }
            Ok(Value::string(format!(
                "{}-{}-4{}-a{}-{}",
                &hex[0..8],
                &hex[8..12],
                &hex[13..16],
                &hex[17..20],
                &hex[20..32]
            )))
        }),
        native("getRandomValues", |ev, _this, args| {
            let target = arg(args, 0);
            if let Value::Array(items) = &target {
                let len = items.borrow().len();
                for index in 0..len {
                    let value = (random(ev) * 256.0).floor();
                    items.borrow_mut()[index] = Value::Number(value);
                }
            }
            Ok(target)
        }),
    ])
}

fn media_query_list() -> Value {
    Value::object(vec![
        ("matches", Value::Bool(false)),
        ("media", Value::str("")),
        noop("addEventListener"),
        noop("removeEventListener"),
        noop("addListener"),
        noop("removeListener"),
    ])
}

fn window_object() -> Value {
    Value::object(vec![
        ("innerWidth", Value::Number(1280.0)),
        ("innerHeight", Value::Number(800.0)),
        ("devicePixelRatio", Value::Number(1.0)),
        ("scrollX", Value::Number(0.0)),
        ("scrollY", Value::Number(0.0)),
        (
            "location",
            Value::object(vec![
                ("href", Value::str("http://localhost/")),
                ("origin", Value::str("http://localhost")),
                ("protocol", Value::str("http:")),
                ("host", Value::str("localhost")),
                ("hostname", Value::str("localhost")),
                ("pathname", Value::str("/")),
                ("search", Value::str("")),
                ("hash", Value::str("")),
                noop("reload"),
                noop("assign"),
                noop("replace"),
            ]),
        ),
        (
            "history",
            Value::object(vec![
                native("pushState", |ev, _this, args| {
                    if let Value::String(url) = arg(args, 2) {
                        ev.ctx().navigate(&url, false);
                    }
                    Ok(Value::Undefined)
                }),
                native("replaceState", |ev, _this, args| {
                    if let Value::String(url) = arg(args, 2) {
                        ev.ctx().navigate(&url, true);
                    }
                    Ok(Value::Undefined)
                }),
                native("back", |ev, _this, _args| {
                    ev.ctx().go_back();
                    Ok(Value::Undefined)
                }),
                ("length", Value::Number(1.0)),
            ]),
        ),
        native("matchMedia", |_ev, _this, _args| Ok(media_query_list())),
        native("getComputedStyle", |_ev, _this, _args| {
            Ok(Value::object(vec![native("getPropertyValue", |_ev, _this, _args| Ok(Value::str("")))]))
        }),
        noop("addEventListener"),
        noop("removeEventListener"),
        noop("dispatchEvent"),
        noop("scrollTo"),
        noop("scrollBy"),
        noop("open"),
        noop("print"),
    ])
}

// -------------------------------------------------------------------
// URLs
// -------------------------------------------------------------------

fn percent_encode(text: &str, component: bool) -> String {
    let mut out = String::new();
    for byte in text.bytes() {
        let c = byte as char;
        let keep = c.is_ascii_alphanumeric()
            || "-_.!~*'()".contains(c)
            || (!component && ";,/?:@&=+$#".contains(c));
        if keep {
            out.push(c);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let byte = std::str::from_utf8(&bytes[index + 1..index + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                out.push(byte);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn query_from_init(init: &Value) -> String {
    match init {
        Value::String(s) => s.trim_start_matches('?').to_string(),
        Value::Object(object) => object
            .borrow()
            .entries()
            .map(|(k, v)| format!("{}={}", percent_encode(k, true), percent_encode(&v.to_js_string(), true)))
            .collect::<Vec<_>>()
            .join("&"),
        _ => String::new(),
    }
}

/// Parse `a=1&b=2` into decoded pairs
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode(&key.replace('+', " ")),
                percent_decode(&value.replace('+', " ")),
            )
        })
        .collect()
}

/// `URLSearchParams` over a shared pair list
pub fn url_search_params(query: &str) -> Value {
    let pairs = Rc::new(RefCell::new(parse_query(query)));
    let (get, get_all, has, set, append, delete, to_string, entries, for_each) = (
        pairs.clone(),
        pairs.clone(),
        pairs.clone(),
        pairs.clone(),
        pairs.clone(),
        pairs.clone(),
        pairs.clone(),
        pairs.clone(),
        pairs,
    );
    Value::object(vec![
        native("get", move |_ev, _this, args| {
            let key = arg(args, 0).to_js_string();
            Ok(get
                .borrow()
                .iter()
                .find(|(k, _)| *k == key)
                .map_or(Value::Null, |(_, v)| Value::str(v)))
        }),
        native("getAll", move |_ev, _this, args| {
            let key = arg(args, 0).to_js_string();
            Ok(Value::array(
                get_all.borrow().iter().filter(|(k, _)| *k == key).map(|(_, v)| Value::str(v)).collect(),
            ))
        }),
        native("has", move |_ev, _this, args| {
            let key = arg(args, 0).to_js_string();
            Ok(Value::Bool(has.borrow().iter().any(|(k, _)| *k == key)))
        }),
        native("set", move |_ev, _this, args| {
            let key = arg(args, 0).to_js_string();
            let value = arg(args, 1).to_js_string();
            let mut pairs = set.borrow_mut();
            pairs.retain(|(k, _)| *k != key);
            pairs.push((key, value));
            Ok(Value::Undefined)
        }),
        native("append", move |_ev, _this, args| {
            append.borrow_mut().push((arg(args, 0).to_js_string(), arg(args, 1).to_js_string()));
            Ok(Value::Undefined)
        }),
        native("delete", move |_ev, _this, args| {
            let key = arg(args, 0).to_js_string();
            delete.borrow_mut().retain(|(k, _)| *k != key);
            Ok(Value::Undefined)
        }),
        native("toString", move |_ev, _this, _args| {
            Ok(Value::string(
                to_string
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}={}", percent_encode(k, true), percent_encode(v, true)))
                    .collect::<Vec<_>>()
                    .join("&"),
            ))
        }),
        native("entries", move |_ev, _this, _args| {
            Ok(Value::array(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::array(vec![Value::str(k), Value::str(v)]))
                    .collect(),
            ))
        }),
        native("forEach", move |ev, _this, args| {
            let func = arg(args, 0);
            let snapshot = for_each.borrow().clone();
            for (k, v) in snapshot {
                ev.call_function(&func, Value::Undefined, &[Value::string(v), Value::string(k)])?;
            }
            Ok(Value::Undefined)
        }),
    ])
}

fn url_constructor() -> Value {
    Value::native("URL", |_ev, _this, args| {
        let href = arg(args, 0).to_js_string();
        let (without_hash, hash) = match href.split_once('#') {
            Some((rest, hash)) => (rest.to_string(), format!("#{}", hash)),
            None => (href.clone(), String::new()),
        };
        let (base, search) = match without_hash.split_once('?') {
            Some((base, query)) => (base.to_string(), format!("?{}", query)),
            None => (without_hash, String::new()),
        };
        let (origin, pathname) = match base.find("://") {
            Some(scheme) => match base[scheme + 3..].find('/') {
                Some(slash) => (base[..scheme + 3 + slash].to_string(), base[scheme + 3 + slash..].to_string()),
                None => (base.clone(), "/".to_string()),
            },
            None => ("http://localhost".to_string(), base.clone()),
        };
        Ok(Value::object(vec![
            ("href", Value::str(&href)),
            ("origin", Value::str(&origin)),
            ("pathname", Value::str(&pathname)),
            ("search", Value::str(&search)),
            ("hash", Value::str(&hash)),
            ("searchParams", url_search_params(&search)),
            native("toString", move |_ev, _this, _args| Ok(Value::str(&href))),
        ]))
    })
}

// -------------------------------------------------------------------
// Intl
// -------------------------------------------------------------------

fn intl_object() -> Value {
    Value::object(vec![
        native("NumberFormat", |_ev, _this, args| {
            let locale = args.first().and_then(Value::as_str).unwrap_or("en-US").to_string();
            let options = arg(args, 1);
            Ok(Value::object(vec![native("format", move |_ev, _this, args| {
                Ok(Value::string(format_locale_number(arg(args, 0).to_number(), &locale, &options)))
            })]))
        }),
        native("DateTimeFormat", |_ev, _this, args| {
            let locale = args.first().and_then(Value::as_str).unwrap_or("en-US").to_string();
            let options = arg(args, 1);
            Ok(Value::object(vec![native("format", move |_ev, _this, args| {
                let ms = match arg(args, 0) {
                    Value::Undefined => now_ms(),
                    other => other.to_number(),
                };
                Ok(Value::string(format_locale_date(ms, &locale, &options, DateParts::Date)))
            })]))
        }),
    ])
}

// -------------------------------------------------------------------
// Date
// -------------------------------------------------------------------

fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn to_datetime(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
}

/// Parse the date formats generated code uses: ISO dates and timestamps
pub fn parse_date(text: &str) -> f64 {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return dt.timestamp_millis() as f64;
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return naive.and_utc().timestamp_millis() as f64;
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return naive.and_utc().timestamp_millis() as f64;
            }
        }
    }
    f64::NAN
}

/// `new Date(y, m, d, h, mi, s, ms)` with month/day overflow
pub fn date_from_parts(parts: &[f64]) -> f64 {
    if parts.iter().any(|p| !p.is_finite()) {
        return f64::NAN;
    }
    let year = parts.first().copied().unwrap_or(1970.0) as i32;
    let month = parts.get(1).copied().unwrap_or(0.0) as i32;
    let (year, month) = (year + month.div_euclid(12), month.rem_euclid(12) as u32 + 1);
    let Some(base) = NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return f64::NAN;
    };
    let base = base.and_utc().timestamp_millis() as f64;
    let day = parts.get(2).copied().unwrap_or(1.0);
    let hours = parts.get(3).copied().unwrap_or(0.0);
    let minutes = parts.get(4).copied().unwrap_or(0.0);
    let seconds = parts.get(5).copied().unwrap_or(0.0);
    let millis = parts.get(6).copied().unwrap_or(0.0);
    base + (day - 1.0) * MS_PER_DAY + hours * 3_600_000.0 + minutes * 60_000.0 + seconds * 1000.0 + millis
}

fn make_date(ms: f64) -> Value {
    let mut object = JsObject::new();
    object.internal = Internal::Date(ms);
    Value::from_object(object)
}

fn date_constructor() -> Value {
    let constructor = Value::native("Date", |_ev, _this, args| {
        let ms = match args {
            [] => now_ms(),
            [Value::String(text)] => parse_date(text),
            [single] => single.to_number(),
            parts => date_from_parts(&parts.iter().map(Value::to_number).collect::<Vec<_>>()),
        };
        Ok(make_date(ms))
    });
    with_statics(
        constructor,
        vec![
            native("now", |_ev, _this, _args| Ok(Value::Number(now_ms()))),
            native("parse", |_ev, _this, args| Ok(Value::Number(parse_date(&arg(args, 0).to_js_string())))),
            native("UTC", |_ev, _this, args| {
                Ok(Value::Number(date_from_parts(&args.iter().map(Value::to_number).collect::<Vec<_>>())))
            }),
        ],
    )
}

/// `Date.prototype.toString`
pub fn date_to_string(ms: f64) -> String {
    match to_datetime(ms) {
        Some(dt) => dt
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string(),
        None => "Invalid Date".to_string(),
    }
}

pub fn date_to_iso(ms: f64) -> String {
    match to_datetime(ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "Invalid Date".to_string(),
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum DateParts {
    Date,
    Time,
    Both,
}

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];
const WEEKDAYS: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

/// `toLocaleDateString` and friends for the common option shapes
pub fn format_locale_date(ms: f64, locale: &str, options: &Value, parts: DateParts) -> String {
    let Some(dt) = to_datetime(ms) else {
        return "Invalid Date".to_string();
    };
    let option = |key: &str| -> Option<String> {
        options
            .as_object()
            .and_then(|object| object.borrow().get_own(key).cloned())
            .filter(|value| !value.is_nullish())
            .map(|value| value.to_js_string())
    };

    let weekday = option("weekday");
    let year = option("year");
    let month = option("month");
    let day = option("day");
    let hour = option("hour");
    let minute = option("minute");
    let has_date_options = weekday.is_some() || year.is_some() || month.is_some() || day.is_some();
    let has_time_options = hour.is_some() || minute.is_some();

    let (show_date, show_time) = match parts {
        _ if has_date_options || has_time_options => (has_date_options, has_time_options),
        DateParts::Date => (true, false),
        DateParts::Time => (false, true),
        DateParts::Both => (true, true),
    };

    let mut out = String::new();
    if show_date {
        let month_index = dt.month0() as usize;
        let textual_month = matches!(month.as_deref(), Some("long") | Some("short") | Some("narrow"));
        if textual_month || (weekday.is_some() && month.is_none()) {
            let mut pieces = Vec::new();
            if let Some(style) = &weekday {
                let name = WEEKDAYS[dt.weekday().num_days_from_sunday() as usize];
                pieces.push(if style == "long" { name.to_string() } else { name[..3].to_string() });
            }
            let mut date = String::new();
            if let Some(style) = &month {
                let name = MONTHS[month_index];
                date.push_str(if style == "long" { name } else { &name[..3] });
            }
            if day.is_some() {
                if !date.is_empty() {
                    date.push(' ');
                }
                date.push_str(&dt.day().to_string());
            }
            if let Some(style) = &year {
                if !date.is_empty() {
                    date.push_str(if day.is_some() { ", " } else { " " });
                }
                date.push_str(&if style == "2-digit" {
                    format!("{:02}", dt.year() % 100)
                } else {
                    dt.year().to_string()
                });
            }
            if !date.is_empty() {
                pieces.push(date);
            }
            out.push_str(&pieces.join(", "));
        } else {
            let pad = |value: u32, style: &Option<String>| {
                if style.as_deref() == Some("2-digit") {
                    format!("{:02}", value)
                } else {
                    value.to_string()
                }
            };
            let m = pad(dt.month(), &month);
            let d = pad(dt.day(), &day);
            let y = dt.year().to_string();
            out.push_str(&match locale {
                l if l.starts_with("en-GB") || l.starts_with("fr") || l.starts_with("es") || l.starts_with("it") => {
                    format!("{:0>2}/{:0>2}/{}", d, m, y)
                }
                l if l.starts_with("de") => format!("{}.{}.{}", d, m, y),
                l if l.starts_with("ja") || l.starts_with("zh") || l.starts_with("ko") || l.starts_with("sv") => {
                    format!("{}-{:0>2}-{:0>2}", y, m, d)
                }
                _ => format!("{}/{}/{}", m, d, y),
            });
        }
    }
    if show_time {
        if show_date {
            out.push_str(", ");
        }
        let hour24 = options
            .as_object()
            .and_then(|object| object.borrow().get_own("hour12").cloned())
            .map_or(!locale.starts_with("en-US") && locale.contains('-'), |v| !v.is_truthy());
        let h = dt.hour();
        let minutes = format!("{:02}", dt.minute());
        let seconds = if has_time_options { None } else { Some(format!("{:02}", dt.second())) };
        let clock = if hour24 {
            format!("{:02}:{}", h, minutes)
        } else {
            let h12 = if h % 12 == 0 { 12 } else { h % 12 };
            let h12 = if hour.as_deref() == Some("2-digit") { format!("{:02}", h12) } else { h12.to_string() };
            format!("{}:{}", h12, minutes)
        };
        out.push_str(&clock);
        if let Some(seconds) = seconds {
            out.push(':');
            out.push_str(&seconds);
        }
        if !hour24 {
            out.push_str(if h < 12 { " AM" } else { " PM" });
        }
    }
    out
}

fn set_date(receiver: &Value, ms: f64) -> Value {
    if let Value::Object(object) = receiver {
        object.borrow_mut().internal = Internal::Date(ms);
    }
    Value::Number(ms)
}

/// Member of a `Date` instance
pub fn date_member(receiver: &Value, _ms: f64, key: &str) -> Value {
    let name = key.to_string();
    let receiver = receiver.clone();
    let current = |receiver: &Value| receiver.to_number();
    match key {
        "getTime" | "valueOf" | "getFullYear" | "getMonth" | "getDate" | "getDay" | "getHours"
        | "getMinutes" | "getSeconds" | "getMilliseconds" | "getTimezoneOffset" | "getUTCFullYear"
        | "getUTCMonth" | "getUTCDate" | "getUTCDay" | "getUTCHours" | "getUTCMinutes" | "toISOString"
        | "toJSON" | "toString" | "toDateString" | "toTimeString" | "toUTCString" => {
            Value::native(key, move |_ev, _this, _args| {
                let ms = current(&receiver);
                let Some(dt) = to_datetime(ms) else {
                    return Ok(match name.as_str() {
                        "toISOString" => {
                            return Err(EvalError::range_error("Invalid time value"));
                        }
                        "toString" | "toDateString" | "toTimeString" | "toUTCString" | "toJSON" => {
                            Value::str("Invalid Date")
                        }
                        _ => Value::Number(f64::NAN),
                    });
                };
                Ok(match name.as_str() {
                    "getTime" | "valueOf" => Value::Number(ms),
                    "getFullYear" | "getUTCFullYear" => Value::Number(f64::from(dt.year())),
                    "getMonth" | "getUTCMonth" => Value::Number(f64::from(dt.month0())),
                    "getDate" | "getUTCDate" => Value::Number(f64::from(dt.day())),
                    "getDay" | "getUTCDay" => Value::Number(f64::from(dt.weekday().num_days_from_sunday())),
                    "getHours" | "getUTCHours" => Value::Number(f64::from(dt.hour())),
                    "getMinutes" | "getUTCMinutes" => Value::Number(f64::from(dt.minute())),
                    "getSeconds" => Value::Number(f64::from(dt.second())),
                    "getMilliseconds" => Value::Number(f64::from(dt.timestamp_subsec_millis())),
                    "getTimezoneOffset" => Value::Number(0.0),
                    "toISOString" | "toJSON" => Value::string(date_to_iso(ms)),
                    "toDateString" => Value::string(dt.format("%a %b %d %Y").to_string()),
                    "toTimeString" => Value::string(dt.format("%H:%M:%S GMT+0000 (Coordinated Universal Time)").to_string()),
                    "toUTCString" => Value::string(dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
                    _ => Value::string(date_to_string(ms)),
                })
            })
        }
        "toLocaleDateString" | "toLocaleTimeString" | "toLocaleString" => {
            let parts = match key {
                "toLocaleDateString" => DateParts::Date,
                "toLocaleTimeString" => DateParts::Time,
                _ => DateParts::Both,
            };
            Value::native(key, move |_ev, _this, args| {
                let locale = args.first().and_then(Value::as_str).unwrap_or("en-US").to_string();
                Ok(Value::string(format_locale_date(current(&receiver), &locale, &arg(args, 1), parts)))
            })
        }
        "setTime" => Value::native(key, move |_ev, _this, args| Ok(set_date(&receiver, arg(args, 0).to_number()))),
        "setFullYear" | "setMonth" | "setDate" | "setHours" | "setMinutes" | "setSeconds" | "setMilliseconds" => {
            Value::native(key, move |_ev, _this, args| {
                let Some(dt) = to_datetime(current(&receiver)) else {
                    return Ok(Value::Number(f64::NAN));
                };
                let mut parts = [
                    f64::from(dt.year()),
                    f64::from(dt.month0()),
                    f64::from(dt.day()),
                    f64::from(dt.hour()),
                    f64::from(dt.minute()),
                    f64::from(dt.second()),
                    f64::from(dt.timestamp_subsec_millis()),
                ];
                let slot = match name.as_str() {
                    "setFullYear" => 0,
                    "setMonth" => 1,
                    "setDate" => 2,
                    "setHours" => 3,
                    "setMinutes" => 4,
                    "setSeconds" => 5,
                    _ => 6,
                };
                for (offset, value) in args.iter().enumerate() {
                    if slot + offset < parts.len() {
                        parts[slot + offset] = value.to_number();
                    }
                }
                Ok(set_date(&receiver, date_from_parts(&parts)))
            })
        }
        _ => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_is_deterministic() {
        let (state, first) = next_random(0x9E37_79B9_7F4A_7C15);
        let (_, second) = next_random(state);
        let (_, again) = next_random(0x9E37_79B9_7F4A_7C15);
        assert_eq!(first, again);
        assert_ne!(first, second);
        assert!((0.0..1.0).contains(&first));
    }

    #[test]
    fn test_date_parsing_and_formatting() {
        let ms = parse_date("2024-01-15");
        assert_eq!(date_to_iso(ms), "2024-01-15T00:00:00.000Z");
        assert_eq!(date_to_string(ms), "Mon Jan 15 2024 00:00:00 GMT+0000 (Coordinated Universal Time)");
        assert!(parse_date("not a date").is_nan());
        assert_eq!(date_to_string(f64::NAN), "Invalid Date");
    }

    #[test]
    fn test_date_from_parts_overflows_months() {
        let ms = date_from_parts(&[2023.0, 12.0, 1.0]);
        assert_eq!(date_to_iso(ms), "2024-01-01T00:00:00.000Z");
        let ms = date_from_parts(&[2024.0, 0.0, 32.0]);
        assert_eq!(date_to_iso(ms), "2024-02-01T00:00:00.000Z");
    }

    #[test]
    fn test_locale_dates() {
        let ms = parse_date("2024-03-05T14:07:00Z");
        let none = Value::Undefined;
        assert_eq!(format_locale_date(ms, "en-US", &none, DateParts::Date), "3/5/2024");
        assert_eq!(format_locale_date(ms, "en-US", &none, DateParts::Time), "2:07:00 PM");
        let long = Value::object(vec![
            ("year", Value::str("numeric")),
            ("month", Value::str("long")),
            ("day", Value::str("numeric")),
        ]);
        assert_eq!(format_locale_date(ms, "en-US", &long, DateParts::Date), "March 5, 2024");
        let short = Value::object(vec![("month", Value::str("short")), ("day", Value::str("numeric"))]);
        assert_eq!(format_locale_date(ms, "en-US", &short, DateParts::Date), "Mar 5");
    }

    #[test]
    fn test_query_parsing() {
        assert_eq!(
            parse_query("?q=hello+world&tag=a%26b"),
            vec![("q".to_string(), "hello world".to_string()), ("tag".to_string(), "a&b".to_string())]
        );
        assert_eq!(percent_encode("a b&c", true), "a%20b%26c");
        assert_eq!(percent_decode("a%20b"), "a b");
    }

    #[test]
    fn test_json_conversion_keeps_order() {
        let value = Value::object(vec![
            ("b", Value::Number(1.0)),
            ("a", Value::array(vec![Value::Undefined, Value::Bool(true)])),
            ("skip", Value::Undefined),
        ]);
        assert_eq!(to_json(&value).to_string(), r#"{"b":1,"a":[null,true]}"#);
    }

    #[test]
    fn test_timer_queue_orders_by_delay() {
        let mut queue = TimerQueue::default();
        let slow = queue.schedule(Value::Null, 500.0, Vec::new(), false);
        let fast = queue.schedule(Value::Null, 10.0, Vec::new(), false);
        queue.schedule(Value::Null, 100.0, Vec::new(), true);
        let due = queue.take_due();
        assert_eq!(due.iter().map(|t| t.id).collect::<Vec<_>>(), vec![fast, slow]);
        assert_eq!(queue.len(), 1);
    }
}
