//! Property access and the built-in methods of primitive and container values.

use crate::builtins::globals::date_member;
use crate::evaluator::{EvalError, EvalErrorKind, EvalResult, Evaluator};
use crate::value::*;
use std::cmp::Ordering;
use std::rc::Rc;

const ARRAY_METHODS: &[&str] = &[
    "map", "filter", "forEach", "find", "findIndex", "findLast", "findLastIndex", "some", "every",
    "reduce", "reduceRight", "includes", "indexOf", "lastIndexOf", "join", "slice", "concat",
    "push", "pop", "shift", "unshift", "splice", "sort", "toSorted", "reverse", "toReversed",
    "flat", "flatMap", "fill", "keys", "values", "entries", "at", "toString",
];

const STRING_METHODS: &[&str] = &[
    "charAt", "charCodeAt", "codePointAt", "indexOf", "lastIndexOf", "includes", "startsWith",
    "endsWith", "slice", "substring", "substr", "toUpperCase", "toLowerCase", "toLocaleUpperCase",
    "toLocaleLowerCase", "trim", "trimStart", "trimEnd", "split", "replace", "replaceAll", "match",
    "matchAll", "search", "padStart", "padEnd", "repeat", "concat", "at", "localeCompare",
    "toString", "valueOf", "normalize",
];

/// Longest dense array previewed code may create
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Longest string previewed code may build by repetition or padding
pub const MAX_STRING_LENGTH: usize = 1 << 26;

/// A requested array length: a uint32, within the dense storage cap
pub fn array_length(requested: f64) -> EvalResult<usize> {
    if requested.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&requested) {
        return Err(EvalError::range_error("Invalid array length"));
    }
    let length = requested as usize;
    if length > MAX_ARRAY_LENGTH {
        return Err(EvalError::range_error(format!(
            "Invalid array length: {} exceeds the preview limit of {}",
            length, MAX_ARRAY_LENGTH
        )));
    }
    Ok(length)
}

fn string_length(length: usize) -> EvalResult<usize> {
    if length > MAX_STRING_LENGTH {
        return Err(EvalError::range_error("Invalid string length"));
    }
    Ok(length)
}

impl Evaluator {
    /// `object[key]`
    pub fn get_member(&mut self, object: &Value, key: &str) -> EvalResult<Value> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                object.to_js_string(),
                key
            ))),
            Value::Bool(_) => Ok(match key {
                "toString" | "valueOf" => bound(object, key, |_ev, this, _args| {
                    Ok(Value::string(this.to_js_string()))
                }),
                _ => Value::Undefined,
            }),
            Value::Number(_) => Ok(match key {
                "toFixed" | "toString" | "toLocaleString" | "toPrecision" | "valueOf" => {
                    let name = key.to_string();
                    bound(object, key, move |_ev, this, args| number_method(this.to_number(), &name, args))
                }
                _ => Value::Undefined,
            }),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::from(s.chars().count()));
                }
                if let Some(index) = Value::as_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map_or(Value::Undefined, |c| Value::string(c.to_string())));
                }
                if STRING_METHODS.contains(&key) {
                    let name = key.to_string();
                    return Ok(bound(object, key, move |ev, this, args| {
                        let text = this.to_js_string();
                        string_method(ev, &text, &name, args)
                    }));
                }
                Ok(Value::Undefined)
            }
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::from(items.borrow().len()));
                }
                if let Some(index) = Value::as_index(key) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
                }
                if ARRAY_METHODS.contains(&key) {
                    let items = items.clone();
                    let name = key.to_string();
                    return Ok(Value::native(key, move |ev, _this, args| {
                        array_method(ev, &items, &name, args)
                    }));
                }
                Ok(Value::Undefined)
            }
            Value::Object(obj) => {
                if let Some(value) = obj.borrow().get(key) {
                    return Ok(value);
                }
                let internal = obj.borrow().internal.clone();
                match internal {
                    Internal::Promise(_) if matches!(key, "then" | "catch" | "finally") => {
                        let name = key.to_string();
                        Ok(bound(object, key, move |ev, this, args| promise_method(ev, this, &name, args)))
                    }
                    Internal::Date(ms) => Ok(date_member(object, ms, key)),
                    Internal::Map(_) | Internal::Set(_) => Ok(collection_member(object, obj, key)),
                    Internal::Regex(re, global) => Ok(match key {
                        "source" => Value::str(re.as_str()),
                        "global" => Value::Bool(global),
                        "flags" => Value::str(if global { "g" } else { "" }),
                        "test" => {
                            let re = re.clone();
                            Value::native("test", move |_ev, _this, args| {
                                let text = args.first().map(Value::to_js_string).unwrap_or_default();
                                Ok(Value::Bool(re.is_match(&text)))
                            })
                        }
                        "exec" => {
                            let re = re.clone();
                            Value::native("exec", move |_ev, _this, args| {
                                let text = args.first().map(Value::to_js_string).unwrap_or_default();
                                Ok(exec_once(&re, &text))
                            })
                        }
                        _ => Value::Undefined,
                    }),
                    _ => Ok(match key {
                        "hasOwnProperty" => {
                            let obj = obj.clone();
                            Value::native(key, move |_ev, _this, args| {
                                let name = args.first().map(Value::to_property_key).unwrap_or_default();
                                Ok(Value::Bool(obj.borrow().has_own(&name)))
                            })
                        }
                        "toString" | "valueOf" => {
                            bound(object, key, |_ev, this, _args| Ok(Value::string(this.to_js_string())))
                        }
                        _ => Value::Undefined,
                    }),
                }
            }
            Value::Function(function) => {
                if let Some(value) = function.props.borrow().get(key) {
                    return Ok(value);
                }
                Ok(match key {
                    "name" => Value::str(&function.name),
                    "displayName" => Value::Undefined,
                    "length" => Value::from(match &function.kind {
                        FunctionKind::Closure(closure) => closure.def.params.len(),
                        _ => 0,
                    }),
                    "call" => bound(object, key, |ev, this, args| {
                        let receiver = args.first().cloned().unwrap_or(Value::Undefined);
                        let rest = args.get(1..).unwrap_or(&[]);
                        ev.call_function(this, receiver, rest)
                    }),
                    "apply" => bound(object, key, |ev, this, args| {
                        let receiver = args.first().cloned().unwrap_or(Value::Undefined);
                        let rest = match args.get(1) {
                            Some(Value::Array(items)) => items.borrow().clone(),
                            _ => Vec::new(),
                        };
                        ev.call_function(this, receiver, &rest)
                    }),
                    "bind" => bound(object, key, |_ev, this, args| {
                        let target = this.clone();
                        let receiver = args.first().cloned().unwrap_or(Value::Undefined);
                        let preset: Vec<Value> = args.iter().skip(1).cloned().collect();
                        let name = match &target {
                            Value::Function(f) => format!("bound {}", f.name),
                            _ => "bound".to_string(),
                        };
                        Ok(Value::native(&name, move |ev, _this, args| {
                            let mut all = preset.clone();
                            all.extend_from_slice(args);
                            ev.call_function(&target, receiver.clone(), &all)
                        }))
                    }),
                    "toString" => Value::native(key, {
                        let text = object.to_js_string();
                        move |_ev, _this, _args| Ok(Value::str(&text))
                    }),
                    _ => Value::Undefined,
                })
            }
            Value::Element(element) => Ok(match key {
                "props" => Value::Object(element.props.clone()),
                "type" => element.ty.clone(),
                "key" => element.key.as_deref().map_or(Value::Null, Value::str),
                "$$typeof" => Value::str("react.element"),
                _ => Value::Undefined,
            }),
            Value::Stub(stub) => Ok(match key {
                "toString" | "valueOf" => {
                    let text = stub.coerce();
                    Value::native(key, move |_ev, _this, _args| Ok(Value::str(&text)))
                }
                _ => Value::Stub(stub.child(key)),
            }),
        }
    }

    /// `object[key] = value`
    pub fn set_member(&mut self, object: &Value, key: &str, value: Value) -> EvalResult<()> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                object.to_js_string(),
                key
            ))),
            Value::Object(obj) => {
                obj.borrow_mut().set(key, value);
                Ok(())
            }
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if key == "length" {
                    let length = array_length(value.to_number())?;
                    items.resize(length, Value::Undefined);
                } else if let Some(index) = Value::as_index(key) {
                    if index >= items.len() {
                        let length = array_length(index as f64 + 1.0)?;
                        items.resize(length, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            Value::Function(function) => {
                function.props.borrow_mut().set(key, value);
                Ok(())
            }
            // Primitives, elements and stubs absorb writes
            _ => Ok(()),
        }
    }
}

/// Method that receives its receiver as `this` even when detached
fn bound<F>(receiver: &Value, name: &str, func: F) -> Value
where
    F: Fn(&mut Evaluator, &Value, &[Value]) -> EvalResult<Value> + 'static,
{
    let receiver = receiver.clone();
    Value::native(name, move |ev, _this, args| func(ev, &receiver, args))
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn callback(args: &[Value], method: &str) -> EvalResult<Value> {
    let func = arg(args, 0);
    if func.is_callable() {
        Ok(func)
    } else {
        Err(EvalError::type_error(format!(
            "{} is not a function (in {})",
            func.to_js_string(),
            method
        )))
    }
}

/// Relative index as used by `slice`, `at` and friends
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

// -------------------------------------------------------------------
// Arrays
// -------------------------------------------------------------------

fn array_method(ev: &mut Evaluator, items: &ArrayRef, name: &str, args: &[Value]) -> EvalResult<Value> {
    let receiver = Value::Array(items.clone());
    let snapshot = items.borrow().clone();
    let len = snapshot.len();

    match name {
        "map" | "filter" | "forEach" | "find" | "findIndex" | "some" | "every" | "flatMap" => {
            let func = callback(args, name)?;
            let this = arg(args, 1);
            let mut out = Vec::new();
            for (index, item) in snapshot.iter().enumerate() {
                let result = ev.call_function(
                    &func,
                    this.clone(),
                    &[item.clone(), Value::from(index), receiver.clone()],
                )?;
                match name {
                    "map" => out.push(result),
                    "flatMap" => match result {
                        Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                        other => out.push(other),
                    },
                    "filter" if result.is_truthy() => out.push(item.clone()),
                    "find" if result.is_truthy() => return Ok(item.clone()),
                    "findIndex" if result.is_truthy() => return Ok(Value::from(index)),
                    "some" if result.is_truthy() => return Ok(Value::Bool(true)),
                    "every" if !result.is_truthy() => return Ok(Value::Bool(false)),
                    _ => {}
                }
            }
            Ok(match name {
                "map" | "filter" | "flatMap" => Value::array(out),
                "find" | "forEach" => Value::Undefined,
                "findIndex" => Value::Number(-1.0),
                "some" => Value::Bool(false),
                _ => Value::Bool(true),
            })
        }
        "findLast" | "findLastIndex" => {
            let func = callback(args, name)?;
            for (index, item) in snapshot.iter().enumerate().rev() {
                let result = ev.call_function(
                    &func,
                    Value::Undefined,
                    &[item.clone(), Value::from(index), receiver.clone()],
                )?;
                if result.is_truthy() {
                    return Ok(if name == "findLast" {
                        item.clone()
                    } else {
                        Value::from(index)
                    });
                }
            }
            Ok(if name == "findLast" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            })
        }
        "reduce" | "reduceRight" => {
            let func = callback(args, name)?;
            let mut order: Vec<usize> = (0..len).collect();
            if name == "reduceRight" {
                order.reverse();
            }
            let mut order = order.into_iter();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match order.next() {
                    Some(first) => snapshot[first].clone(),
                    None => {
                        return Err(EvalError::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for index in order {
                acc = ev.call_function(
                    &func,
                    Value::Undefined,
                    &[acc, snapshot[index].clone(), Value::from(index), receiver.clone()],
                )?;
            }
            Ok(acc)
        }
        "includes" => {
            let needle = arg(args, 0);
            Ok(Value::Bool(snapshot.iter().any(|item| item.same_value_zero(&needle))))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            Ok(snapshot
                .iter()
                .position(|item| item.strict_equals(&needle))
                .map_or(Value::Number(-1.0), Value::from))
        }
        "lastIndexOf" => {
            let needle = arg(args, 0);
            Ok(snapshot
                .iter()
                .rposition(|item| item.strict_equals(&needle))
                .map_or(Value::Number(-1.0), Value::from))
        }
        "join" | "toString" => {
            let separator = match args.first() {
                Some(Value::Undefined) | None => ",".to_string(),
                Some(sep) if name == "join" => sep.to_js_string(),
                Some(_) => ",".to_string(),
            };
            Ok(Value::string(
                snapshot
                    .iter()
                    .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            Ok(Value::array(if start < end {
                snapshot[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        "at" => {
            let n = arg(args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            Ok(if index >= 0.0 && (index as usize) < len {
                snapshot[index as usize].clone()
            } else {
                Value::Undefined
            })
        }
        "concat" => {
            let mut out = snapshot;
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Ok(Value::from(items.len()))
        }
        "pop" => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
        "shift" => {
            let mut items = items.borrow_mut();
            Ok(if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            })
        }
        "unshift" => {
            let mut items = items.borrow_mut();
            for (offset, value) in args.iter().enumerate() {
                items.insert(offset, value.clone());
            }
            Ok(Value::from(items.len()))
        }
        "splice" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let delete = match args.get(1) {
                None => len - start,
                Some(count) => {
                    let count = count.to_number();
                    if count.is_nan() || count < 0.0 {
                        0
                    } else {
                        (count as usize).min(len - start)
                    }
                }
            };
            let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
            let removed: Vec<Value> = items
                .borrow_mut()
                .splice(start..start + delete, inserted)
                .collect();
            Ok(Value::array(removed))
        }
        "sort" | "toSorted" => {
            let comparator = arg(args, 0);
            let sorted = merge_sort(snapshot, &mut |a, b| compare_for_sort(ev, &comparator, a, b))?;
            if name == "sort" {
                *items.borrow_mut() = sorted;
                Ok(receiver)
            } else {
                Ok(Value::array(sorted))
            }
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Ok(receiver)
        }
        "toReversed" => {
            let mut out = snapshot;
            out.reverse();
            Ok(Value::array(out))
        }
        "flat" => {
            let depth = match args.first() {
                Some(Value::Undefined) | None => 1.0,
                Some(depth) => depth.to_number(),
            };
            Ok(Value::array(flatten(&snapshot, depth)))
        }
        "fill" => {
            let value = arg(args, 0);
            let start = relative_index(&arg(args, 1), len, 0);
            let end = relative_index(&arg(args, 2), len, len);
            let mut items_mut = items.borrow_mut();
            for slot in items_mut.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            drop(items_mut);
            Ok(receiver)
        }
        "keys" => Ok(Value::array((0..len).map(Value::from).collect())),
        "values" => Ok(Value::array(snapshot)),
        "entries" => Ok(Value::array(
            snapshot
                .into_iter()
                .enumerate()
                .map(|(index, item)| Value::array(vec![Value::from(index), item]))
                .collect(),
        )),
        _ => Ok(Value::Undefined),
    }
}

fn flatten(items: &[Value], depth: f64) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => out.extend(flatten(&inner.borrow(), depth - 1.0)),
            other => out.push(other.clone()),
        }
    }
    out
}

fn compare_for_sort(ev: &mut Evaluator, comparator: &Value, a: &Value, b: &Value) -> EvalResult<Ordering> {
    // Undefined always sorts last
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    if comparator.is_callable() {
        let result = ev
            .call_function(comparator, Value::Undefined, &[a.clone(), b.clone()])?
            .to_number();
        Ok(if result < 0.0 {
            Ordering::Less
        } else if result > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        })
    } else {
        Ok(a.to_js_string().cmp(&b.to_js_string()))
    }
}

/// Stable merge sort tolerating inconsistent comparators such as random shuffles
fn merge_sort(
    mut values: Vec<Value>,
    compare: &mut dyn FnMut(&Value, &Value) -> EvalResult<Ordering>,
) -> EvalResult<Vec<Value>> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let right = values.split_off(values.len() / 2);
    let left = merge_sort(values, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => compare(a, b)? != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        if let Some(value) = next {
            merged.push(value);
        }
    }
    Ok(merged)
}

// -------------------------------------------------------------------
// Strings
// -------------------------------------------------------------------

fn char_index(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn char_slice(chars: &[char], start: usize, end: usize) -> String {
    if start >= end {
        String::new()
    } else {
        chars[start..end].iter().collect()
    }
}

fn string_method(ev: &mut Evaluator, text: &str, name: &str, args: &[Value]) -> EvalResult<Value> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    Ok(match name {
        "charAt" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index };
            chars
                .get(index as usize)
                .filter(|_| index >= 0.0)
                .map_or(Value::str(""), |c| Value::string(c.to_string()))
        }
        "charCodeAt" | "codePointAt" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index };
            chars
                .get(index as usize)
                .filter(|_| index >= 0.0)
                .map_or(Value::Number(f64::NAN), |c| Value::Number(f64::from(u32::from(*c))))
        }
        "indexOf" => {
            let needle = arg(args, 0).to_js_string();
            let from = relative_index(&arg(args, 1), len, 0);
            let offset: usize = chars[..from].iter().map(|c| c.len_utf8()).sum();
            text[offset..]
                .find(&needle)
                .map_or(Value::Number(-1.0), |byte| Value::from(char_index(text, offset + byte)))
        }
        "lastIndexOf" => {
            let needle = arg(args, 0).to_js_string();
            text.rfind(&needle)
                .map_or(Value::Number(-1.0), |byte| Value::from(char_index(text, byte)))
        }
        "includes" => Value::Bool(text.contains(&arg(args, 0).to_js_string())),
        "startsWith" => {
            let position = relative_index(&arg(args, 1), len, 0);
            Value::Bool(char_slice(&chars, position, len).starts_with(&arg(args, 0).to_js_string()))
        }
        "endsWith" => {
            let end = relative_index(&arg(args, 1), len, len);
            Value::Bool(char_slice(&chars, 0, end).ends_with(&arg(args, 0).to_js_string()))
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            Value::string(char_slice(&chars, start, end))
        }
        "substring" => {
            let clamp = |value: Value, default: usize| -> usize {
                if matches!(value, Value::Undefined) {
                    return default;
                }
                let n = value.to_number();
                if n.is_nan() || n < 0.0 {
                    0
                } else {
                    (n as usize).min(len)
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), len);
            Value::string(char_slice(&chars, a.min(b), a.max(b)))
        }
        "substr" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let count = match args.get(1) {
                None | Some(Value::Undefined) => len - start,
                Some(count) => count.to_number().max(0.0) as usize,
            };
            Value::string(char_slice(&chars, start, (start + count).min(len)))
        }
        "toUpperCase" | "toLocaleUpperCase" => Value::string(text.to_uppercase()),
        "toLowerCase" | "toLocaleLowerCase" => Value::string(text.to_lowercase()),
        "trim" => Value::str(text.trim()),
        "trimStart" => Value::str(text.trim_start()),
        "trimEnd" => Value::str(text.trim_end()),
        "split" => {
            let limit = match args.get(1) {
                None | Some(Value::Undefined) => usize::MAX,
                Some(limit) => limit.to_number().max(0.0) as usize,
            };
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::str(text)],
                Some(separator) => match regex_of(separator) {
                    Some((re, _)) => re.split(text).map(Value::str).collect(),
                    None => {
                        let separator = separator.to_js_string();
                        if separator.is_empty() {
                            chars.iter().map(|c| Value::string(c.to_string())).collect()
                        } else {
                            text.split(separator.as_str()).map(Value::str).collect()
                        }
                    }
                },
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "replace" | "replaceAll" => {
            let pattern = arg(args, 0);
            let replacement = arg(args, 1);
            match regex_of(&pattern) {
                Some((re, global)) => {
                    replace_regex(ev, text, &re, global || name == "replaceAll", &replacement)?
                }
                None => replace_literal(ev, text, &pattern.to_js_string(), name == "replaceAll", &replacement)?,
            }
        }
        "match" => {
            let pattern = arg(args, 0);
            let (re, global) = match regex_of(&pattern) {
                Some(found) => found,
                None => (Rc::new(literal_regex(&pattern.to_js_string())?), false),
            };
            if global {
                let found: Vec<Value> = re.find_iter(text).map(|m| Value::str(m.as_str())).collect();
                if found.is_empty() {
                    Value::Null
                } else {
                    Value::array(found)
                }
            } else {
                exec_once(&re, text)
            }
        }
        "matchAll" => {
            let Some((re, _)) = regex_of(&arg(args, 0)) else {
                return Err(EvalError::type_error("String.prototype.matchAll called with a non-RegExp"));
            };
            Value::array(re.captures_iter(text).map(|caps| captures_to_array(&caps)).collect())
        }
        "search" => {
            let pattern = arg(args, 0);
            let re = match regex_of(&pattern) {
                Some((re, _)) => re,
                None => Rc::new(literal_regex(&pattern.to_js_string())?),
            };
            re.find(text)
                .map_or(Value::Number(-1.0), |m| Value::from(char_index(text, m.start())))
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target as usize };
            string_length(target)?;
            let filler = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(filler) => filler.to_js_string(),
            };
            if target <= len || filler.is_empty() {
                Value::str(text)
            } else {
                let padding: String = filler.chars().cycle().take(target - len).collect();
                Value::string(if name == "padStart" {
                    format!("{}{}", padding, text)
                } else {
                    format!("{}{}", text, padding)
                })
            }
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::range_error(format!("Invalid count value: {}", format_number(count))));
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            string_length(text.len().saturating_mul(count))?;
            Value::string(text.repeat(count))
        }
        "concat" => {
            let mut out = text.to_string();
            for value in args {
                out.push_str(&value.to_js_string());
            }
            Value::string(out)
        }
        "at" => {
            let n = arg(args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index >= 0.0 && (index as usize) < len {
                Value::string(chars[index as usize].to_string())
            } else {
                Value::Undefined
            }
        }
        "localeCompare" => {
            let other = arg(args, 0).to_js_string();
            let ordering = text
                .to_lowercase()
                .cmp(&other.to_lowercase())
                .then_with(|| text.cmp(other.as_str()));
            Value::Number(match ordering {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            })
        }
        "toString" | "valueOf" | "normalize" => Value::str(text),
        _ => Value::Undefined,
    })
}

fn replace_literal(
    ev: &mut Evaluator,
    text: &str,
    pattern: &str,
    all: bool,
    replacement: &Value,
) -> EvalResult<Value> {
    let mut out = String::new();
    let mut last = 0;
    let matches: Vec<usize> = if pattern.is_empty() {
        vec![0]
    } else if all {
        text.match_indices(pattern).map(|(byte, _)| byte).collect()
    } else {
        text.find(pattern).into_iter().collect()
    };
    for byte in matches {
        out.push_str(&text[last..byte]);
        let piece = if replacement.is_callable() {
            ev.call_function(
                replacement,
                Value::Undefined,
                &[Value::str(pattern), Value::from(char_index(text, byte)), Value::str(text)],
            )?
            .to_js_string()
        } else {
            replacement.to_js_string().replace("$&", pattern)
        };
        out.push_str(&piece);
        last = byte + pattern.len();
    }
    out.push_str(&text[last..]);
    Ok(Value::string(out))
}

fn replace_regex(
    ev: &mut Evaluator,
    text: &str,
    re: &regex::Regex,
    all: bool,
    replacement: &Value,
) -> EvalResult<Value> {
    if !replacement.is_callable() {
        let template = translate_replacement(&replacement.to_js_string());
        return Ok(Value::string(if all {
            re.replace_all(text, template.as_str()).into_owned()
        } else {
            re.replace(text, template.as_str()).into_owned()
        }));
    }

    let mut out = String::new();
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let mut call_args = vec![Value::str(whole.as_str())];
        for group in caps.iter().skip(1) {
            call_args.push(group.map_or(Value::Undefined, |m| Value::str(m.as_str())));
        }
        call_args.push(Value::from(char_index(text, whole.start())));
        call_args.push(Value::str(text));
        let piece = ev.call_function(replacement, Value::Undefined, &call_args)?;
        out.push_str(&piece.to_js_string());
        last = whole.end();
        if !all {
            break;
        }
    }
    out.push_str(&text[last..]);
    Ok(Value::string(out))
}

/// `$1`, `$&` and `$<name>` to the regex crate's `${…}` syntax
fn translate_replacement(template: &str) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{}}}", digits));
            }
            Some('<') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                out.push_str(&format!("${{{}}}", name));
            }
            _ => out.push_str("$$"),
        }
    }
    out
}

fn regex_of(value: &Value) -> Option<(Rc<regex::Regex>, bool)> {
    match value {
        Value::Object(object) => match &object.borrow().internal {
            Internal::Regex(re, global) => Some((re.clone(), *global)),
            _ => None,
        },
        _ => None,
    }
}

fn literal_regex(pattern: &str) -> EvalResult<regex::Regex> {
    regex::Regex::new(&regex::escape(pattern)).map_err(|e| syntax_error(pattern, &e))
}

fn syntax_error(pattern: &str, error: &regex::Error) -> EvalError {
    EvalError::new(EvalErrorKind::Syntax(format!(
        "Invalid regular expression: /{}/: {}",
        pattern, error
    )))
}

fn captures_to_array(caps: &regex::Captures) -> Value {
    Value::array(
        caps.iter()
            .map(|group| group.map_or(Value::Undefined, |m| Value::str(m.as_str())))
            .collect(),
    )
}

fn exec_once(re: &regex::Regex, text: &str) -> Value {
    re.captures(text).map_or(Value::Null, |caps| captures_to_array(&caps))
}

/// Regex literal or `new RegExp(pattern, flags)`
pub fn make_regex(pattern: &str, flags: &str) -> EvalResult<Value> {
    let translated = pattern.replace("\\/", "/").replace("[^]", "(?s:.)");
    let re = regex::RegexBuilder::new(&translated)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| syntax_error(pattern, &e))?;
    let mut object = JsObject::new();
    object.internal = Internal::Regex(Rc::new(re), flags.contains('g'));
    Ok(Value::from_object(object))
}

// -------------------------------------------------------------------
// Numbers
// -------------------------------------------------------------------

fn number_method(n: f64, name: &str, args: &[Value]) -> EvalResult<Value> {
    Ok(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits as usize };
            if digits > 100 {
                return Err(EvalError::range_error("toFixed() digits argument must be between 0 and 100"));
            }
            Value::string(to_fixed(n, digits))
        }
        "toPrecision" => match args.first() {
            None | Some(Value::Undefined) => Value::string(format_number(n)),
            Some(precision) => {
                let precision = precision.to_number().max(1.0) as i32;
                if n == 0.0 || !n.is_finite() {
                    Value::string(format_number(n))
                } else {
                    let magnitude = n.abs().log10().floor() as i32;
                    let decimals = (precision - 1 - magnitude).max(0) as usize;
                    Value::string(to_fixed(n, decimals))
                }
            }
        },
        "toString" => {
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10,
                Some(radix) => radix.to_number() as u32,
            };
            if radix == 10 || !(2..=36).contains(&radix) || n.fract() != 0.0 {
                Value::string(format_number(n))
            } else {
                Value::string(to_radix(n as i64, radix))
            }
        }
        "toLocaleString" => {
            let locale = args.first().and_then(Value::as_str).unwrap_or("en-US").to_string();
            Value::string(format_locale_number(n, &locale, &arg(args, 1)))
        }
        _ => Value::Number(n),
    })
}

/// `Number.prototype.toFixed`, rounding half away from zero
pub fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let factor = 10f64.powi(digits as i32);
    let rounded = (n * factor).round() / factor;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.*}", digits, rounded)
}

fn to_radix(mut n: i64, radix: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let negative = n < 0;
    n = n.abs();
    let mut digits = Vec::new();
    while n > 0 {
        let digit = (n % i64::from(radix)) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        n /= i64::from(radix);
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// Locale-aware number formatting shared by `toLocaleString` and `Intl.NumberFormat`
pub fn format_locale_number(n: f64, locale: &str, options: &Value) -> String {
    let option = |key: &str| -> Option<Value> {
        options
            .as_object()
            .and_then(|object| object.borrow().get_own(key).cloned())
            .filter(|value| !value.is_nullish())
    };
    let style = option("style").map(|v| v.to_js_string()).unwrap_or_else(|| "decimal".to_string());
    let currency = option("currency").map(|v| v.to_js_string().to_uppercase()).unwrap_or_else(|| "USD".to_string());

    let (value, default_min, default_max) = match style.as_str() {
        "currency" => {
            let digits = if currency == "JPY" || currency == "KRW" { 0 } else { 2 };
            (n, digits, digits)
        }
        "percent" => (n * 100.0, 0, 0),
        _ => (n, 0, 3),
    };
    let min = option("minimumFractionDigits").map_or(default_min, |v| v.to_number() as usize);
    let max = option("maximumFractionDigits").map_or(default_max.max(min), |v| v.to_number() as usize);
    let max = max.max(min);

    if !value.is_finite() {
        return format_number(value);
    }

    let fixed = to_fixed(value.abs(), max);
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer.to_string(), fraction.to_string()),
        None => (fixed, String::new()),
    };
    let mut fraction = fraction;
    while fraction.len() > min && fraction.ends_with('0') {
        fraction.pop();
    }

    let (group, decimal) = match locale.split('-').next().unwrap_or("en") {
        "de" | "es" | "it" | "nl" | "pt" | "id" => (".", ","),
        "fr" => ("\u{202f}", ","),
        _ => (",", "."),
    };
    let use_grouping = option("useGrouping").map_or(true, |v| v.is_truthy());
    let mut grouped = String::new();
    for (index, c) in integer.chars().enumerate() {
        if use_grouping && index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push_str(group);
        }
        grouped.push(c);
    }
    let mut body = grouped;
    if !fraction.is_empty() {
        body.push_str(decimal);
        body.push_str(&fraction);
    }

    let negative = value < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0');
    let sign = if negative { "-" } else { "" };
    match style.as_str() {
        "currency" => {
            let symbol = match currency.as_str() {
                "USD" => "$",
                "EUR" => "€",
                "GBP" => "£",
                "JPY" => "¥",
                "INR" => "₹",
                "KRW" => "₩",
                _ => "",
            };
            if symbol.is_empty() {
                format!("{}{} {}", sign, currency, body)
            } else if decimal == "," {
                format!("{}{} {}", sign, body, symbol)
            } else {
                format!("{}{}{}", sign, symbol, body)
            }
        }
        "percent" => format!("{}{}%", sign, body),
        _ => format!("{}{}", sign, body),
    }
}

// -------------------------------------------------------------------
// Promises, maps and sets
// -------------------------------------------------------------------

fn promise_method(ev: &mut Evaluator, promise: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
    let Some(settled) = promise.as_promise() else {
        return Ok(Value::Undefined);
    };
    let (on_fulfilled, on_rejected) = match name {
        "then" => (arg(args, 0), arg(args, 1)),
        "catch" => (Value::Undefined, arg(args, 0)),
        _ => {
            let handler = arg(args, 0);
            if handler.is_callable() {
                ev.call_function(&handler, Value::Undefined, &[])?;
            }
            return Ok(promise.clone());
        }
    };
    let (handler, input) = match &settled {
        Ok(value) => (on_fulfilled, value.clone()),
        Err(reason) => (on_rejected, reason.clone()),
    };
    if !handler.is_callable() {
        return Ok(promise.clone());
    }
    Ok(match ev.call_function(&handler, Value::Undefined, &[input]) {
        Ok(result) if result.as_promise().is_some() => result,
        Ok(result) => Value::promise(Ok(result)),
        Err(err) => Value::promise(Err(err.to_value())),
    })
}

fn collection_member(receiver: &Value, object: &ObjectRef, key: &str) -> Value {
    if key == "size" {
        return Value::from(match &object.borrow().internal {
            Internal::Map(entries) => entries.len(),
            Internal::Set(items) => items.len(),
            _ => 0,
        });
    }
    let object = object.clone();
    let name = key.to_string();
    let receiver = receiver.clone();
    Value::native(key, move |ev, _this, args| collection_method(ev, &receiver, &object, &name, args))
}

fn collection_method(
    ev: &mut Evaluator,
    receiver: &Value,
    object: &ObjectRef,
    name: &str,
    args: &[Value],
) -> EvalResult<Value> {
    let key = arg(args, 0);
    let internal = object.borrow().internal.clone();
    match internal {
        Internal::Map(mut entries) => {
            let position = entries.iter().position(|(k, _)| k.same_value_zero(&key));
            let result = match name {
                "get" => return Ok(position.map_or(Value::Undefined, |i| entries[i].1.clone())),
                "has" => return Ok(Value::Bool(position.is_some())),
                "set" => {
                    let value = arg(args, 1);
                    match position {
                        Some(i) => entries[i].1 = value,
                        None => entries.push((key, value)),
                    }
                    receiver.clone()
                }
                "delete" => {
                    if let Some(i) = position {
                        entries.remove(i);
                    }
                    Value::Bool(position.is_some())
                }
                "clear" => {
                    entries.clear();
                    Value::Undefined
                }
                "forEach" => {
                    let func = callback(args, name)?;
                    for (k, v) in entries.clone() {
                        ev.call_function(&func, Value::Undefined, &[v, k, receiver.clone()])?;
                    }
                    return Ok(Value::Undefined);
                }
                "keys" => return Ok(Value::array(entries.iter().map(|(k, _)| k.clone()).collect())),
                "values" => return Ok(Value::array(entries.iter().map(|(_, v)| v.clone()).collect())),
                "entries" => {
                    return Ok(Value::array(
                        entries
                            .iter()
                            .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                            .collect(),
                    ))
                }
                _ => return Ok(Value::Undefined),
            };
            object.borrow_mut().internal = Internal::Map(entries);
            Ok(result)
        }
        Internal::Set(mut items) => {
            let position = items.iter().position(|item| item.same_value_zero(&key));
            let result = match name {
                "has" => return Ok(Value::Bool(position.is_some())),
                "add" => {
                    if position.is_none() {
                        items.push(key);
                    }
                    receiver.clone()
                }
                "delete" => {
                    if let Some(i) = position {
                        items.remove(i);
                    }
                    Value::Bool(position.is_some())
                }
                "clear" => {
                    items.clear();
                    Value::Undefined
                }
                "forEach" => {
                    let func = callback(args, name)?;
                    for item in items.clone() {
                        ev.call_function(&func, Value::Undefined, &[item.clone(), item, receiver.clone()])?;
                    }
                    return Ok(Value::Undefined);
                }
                "keys" | "values" => return Ok(Value::array(items)),
                "entries" => {
                    return Ok(Value::array(
                        items
                            .into_iter()
                            .map(|item| Value::array(vec![item.clone(), item]))
                            .collect(),
                    ))
                }
                _ => return Ok(Value::Undefined),
            };
            object.borrow_mut().internal = Internal::Set(items);
            Ok(result)
        }
        _ => Ok(Value::Undefined),
    }
}
