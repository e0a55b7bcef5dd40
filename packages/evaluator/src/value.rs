//! Runtime values of previewed code.
//!
//! Values are reference-counted and single-threaded. Objects keep insertion
//! order; an object may carry a [`DynamicMember`] that synthesises members it
//! does not own (UI-kit placeholder modules, the icon table, recursive stubs).

use crate::evaluator::{EvalResult, Evaluator};
use crate::scope::Scope;
use crate::stub::MockStub;
use glimpse_parser::ast::FunctionDef;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<JsObject>>;

/// Host function: `(evaluator, this, arguments)`
pub type NativeFn = Rc<dyn Fn(&mut Evaluator, &Value, &[Value]) -> EvalResult<Value>>;

/// Index into the session's context table
pub type ContextId = usize;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Function>),
    Element(Rc<Element>),
    Stub(Rc<MockStub>),
}

/// Members synthesised on demand for names an object does not own
pub trait DynamicMember {
    fn member(&self, name: &str) -> Value;
}

#[derive(Clone, Default)]
pub enum Internal {
    #[default]
    None,
    Promise(Result<Value, Value>),
    /// Milliseconds since the Unix epoch
    Date(f64),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Regex(Rc<regex::Regex>, bool),
}

/// Plain object with ordered own properties
#[derive(Clone, Default)]
pub struct JsObject {
    props: Vec<(String, Value)>,
    dynamic: Option<Rc<dyn DynamicMember>>,
    pub internal: Internal,
}

impl JsObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dynamic(dynamic: Rc<dyn DynamicMember>) -> Self {
        Self {
            dynamic: Some(dynamic),
            ..Self::default()
        }
    }

    /// Own property, then the dynamic fallback
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.get_own(key) {
            return Some(value.clone());
        }
        self.dynamic.as_ref().map(|dynamic| dynamic.member(key))
    }

    pub fn get_own(&self, key: &str) -> Option<&Value> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.props.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.props.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.props.iter().position(|(k, _)| k == key)?;
        Some(self.props.remove(index).1)
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.props.iter().any(|(k, _)| k == key)
    }

    pub fn set_dynamic(&mut self, dynamic: Rc<dyn DynamicMember>) {
        self.dynamic = Some(dynamic);
    }

    pub fn has_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.props.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub scope: Rc<Scope>,
    /// Module the function was defined in
    pub module: Rc<str>,
}

pub enum FunctionKind {
    Closure(Closure),
    Native(NativeFn),
    /// `Fragment`, `StrictMode`, `Suspense` and other pass-through wrappers
    Fragment,
    Provider(ContextId),
    Consumer(ContextId),
}

pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    pub props: RefCell<JsObject>,
}

impl Function {
    pub fn new(name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            props: RefCell::new(JsObject::new()),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(&self.kind, FunctionKind::Closure(closure) if closure.def.is_async)
    }
}

/// Result of `createElement` / a JSX expression
pub struct Element {
    /// Tag string, component function, fragment or stub
    pub ty: Value,
    pub props: ObjectRef,
    pub key: Option<String>,
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    pub fn string(s: impl Into<String>) -> Self {
        let s: String = s.into();
        Value::String(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Vec<(&str, Value)>) -> Self {
        let mut object = JsObject::new();
        for (key, value) in props {
            object.set(key, value);
        }
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn empty_object() -> Self {
        Value::Object(Rc::new(RefCell::new(JsObject::new())))
    }

    pub fn from_object(object: JsObject) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut Evaluator, &Value, &[Value]) -> EvalResult<Value> + 'static,
    {
        Value::Function(Rc::new(Function::new(name, FunctionKind::Native(Rc::new(func)))))
    }

    pub fn promise(settled: Result<Value, Value>) -> Self {
        let mut object = JsObject::new();
        object.internal = Internal::Promise(settled);
        Value::from_object(object)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Stub(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Settled promise state, if this is a promise
    pub fn as_promise(&self) -> Option<Result<Value, Value>> {
        match self {
            Value::Object(object) => match &object.borrow().internal {
                Internal::Promise(settled) => Some(settled.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) | Value::Object(_) | Value::Element(_) => "object",
            Value::Function(_) | Value::Stub(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.len() {
                    0 => 0.0,
                    1 => items[0].to_number(),
                    _ => f64::NAN,
                }
            }
            Value::Object(object) => match &object.borrow().internal {
                Internal::Date(ms) => *ms,
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// String conversion as performed by `String(value)` and template literals
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(object) => {
                let object = object.borrow();
                match &object.internal {
                    Internal::Date(ms) => crate::builtins::globals::date_to_string(*ms),
                    Internal::Regex(re, _) => format!("/{}/", re.as_str()),
                    _ => match (object.get_own("name"), object.get_own("message")) {
                        (Some(name), Some(message)) => {
                            format!("{}: {}", name.to_js_string(), message.to_js_string())
                        }
                        _ => "[object Object]".to_string(),
                    },
                }
            }
            Value::Function(function) => format!("function {}() {{ [native code] }}", function.name),
            Value::Element(_) => "[object Object]".to_string(),
            Value::Stub(stub) => stub.coerce(),
        }
    }

    pub fn to_property_key(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            other => other.to_js_string(),
        }
    }

    /// Array index named by a property key, if any
    pub fn as_index(key: &str) -> Option<usize> {
        if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
            return None;
        }
        key.parse().ok()
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b)) => Rc::ptr_eq(a, b),
            (Value::Stub(a), Value::Stub(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if matches!(self, Value::Bool(_) | Value::Number(_) | Value::String(_))
                    && matches!(other, Value::Bool(_) | Value::Number(_) | Value::String(_))
                {
                    self.to_number() == other.to_number()
                } else {
                    false
                }
            }
            (Value::Stub(_), Value::String(_)) | (Value::String(_), Value::Stub(_)) => {
                self.to_js_string() == other.to_js_string()
            }
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by `includes` and dependency arrays
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(object) => {
                let object = object.borrow();
                let mut map = f.debug_map();
                for (key, value) in object.entries() {
                    map.entry(&key, value);
                }
                map.finish()
            }
            Value::Function(function) => write!(f, "[Function: {}]", function.name),
            Value::Element(element) => write!(f, "<{}>", describe_type(&element.ty)),
            other => write!(f, "{}", other.to_js_string()),
        }
    }
}

/// Display name of an element type, used in logs and placeholders
pub fn describe_type(ty: &Value) -> String {
    match ty {
        Value::String(tag) => tag.to_string(),
        Value::Function(function) => match &function.kind {
            FunctionKind::Fragment => "Fragment".to_string(),
            FunctionKind::Provider(_) => "Context.Provider".to_string(),
            FunctionKind::Consumer(_) => "Context.Consumer".to_string(),
            _ if function.name.is_empty() => "Anonymous".to_string(),
            _ => function.name.clone(),
        },
        Value::Stub(stub) => stub.label().to_string(),
        other => other.type_of().to_string(),
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Number formatting following `Number.prototype.toString`
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.abs() >= 1e21 {
        return format!("{:e}", n).replace('e', "e+");
    }
    if n.fract() == 0.0 {
        return format!("{}", n as i128);
    }
    if n.abs() < 1e-6 {
        return format!("{:e}", n);
    }
    format!("{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1.5), "1.5");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(Value::str(" 42 ").to_number(), 42.0);
        assert!(Value::str("4px").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(!Value::str("").is_truthy());
        assert!(Value::empty_object().is_truthy());
        assert_eq!(
            Value::array(vec![Value::from(1.0), Value::Null, Value::str("a")]).to_js_string(),
            "1,,a"
        );
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::str("1").loose_equals(&Value::from(1.0)));
        let object = Value::empty_object();
        assert!(object.strict_equals(&object.clone()));
        assert!(!object.strict_equals(&Value::empty_object()));
        assert!(Value::from(f64::NAN).same_value_zero(&Value::from(f64::NAN)));
    }

    #[test]
    fn test_object_keeps_insertion_order() {
        let mut object = JsObject::new();
        object.set("b", Value::from(1.0));
        object.set("a", Value::from(2.0));
        object.set("b", Value::from(3.0));
        assert_eq!(object.keys(), vec!["b", "a"]);
        assert!(matches!(object.get("b"), Some(Value::Number(n)) if n == 3.0));
        assert!(object.get("missing").is_none());
    }
}
