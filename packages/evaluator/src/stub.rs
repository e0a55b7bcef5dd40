//! Fallbacks for modules that cannot be provided for real: the recursive
//! mock returned for unknown specifiers, synthesised design-system
//! components and the placeholder used when a module body throws.

use crate::builtins::react::create_element;
use crate::value::{DynamicMember, JsObject, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Self-describing stand-in for anything the loader cannot supply.
///
/// Every property access yields a child stub labelled `parent.property`;
/// children are cached so repeated access is identity-stable.
pub struct MockStub {
    label: String,
    children: RefCell<HashMap<String, Rc<MockStub>>>,
}

impl MockStub {
    pub fn new(label: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            label: label.into(),
            children: RefCell::new(HashMap::new()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn child(&self, name: &str) -> Rc<MockStub> {
        self.children
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| MockStub::new(format!("{}.{}", self.label, name)))
            .clone()
    }

    /// Primitive coercion
    pub fn coerce(&self) -> String {
        format!("[Mock:{}]", self.label)
    }
}

impl DynamicMember for MockStub {
    fn member(&self, name: &str) -> Value {
        Value::Stub(self.child(name))
    }
}

/// Calling a stub renders it as a placeholder element
pub fn call_stub(stub: &Rc<MockStub>, args: &[Value]) -> Value {
    let props = args.first().filter(|arg| arg.as_object().is_some());
    create_element(Value::Stub(stub.clone()), props, Vec::new())
}

/// `dropdown-menu` -> `DropdownMenu`
pub fn kebab_to_pascal(name: &str) -> String {
    name.split(|c| c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Host tag used to stand in for a design-system component
pub fn placeholder_tag(name: &str) -> &'static str {
    match name {
        "Input" => "input",
        "Button" => "button",
        "Label" => "label",
        "Textarea" => "textarea",
        "Badge" => "span",
        "Separator" => "hr",
        "CardTitle" => "h3",
        "CardDescription" => "p",
        _ => "div",
    }
}

/// Component rendering `placeholder_tag(name)` with the caller's props
pub fn placeholder_component(name: &str) -> Value {
    let component_name = name.to_string();
    let tag = placeholder_tag(name);
    Value::native(name, move |_ev, _this, args| {
        let mut props = JsObject::new();
        if let Some(Value::Object(given)) = args.first() {
            for (key, value) in given.borrow().entries() {
                if key != "asChild" && key != "variant" && key != "size" {
                    props.set(key, value.clone());
                }
            }
        }
        props.set("data-placeholder", Value::str(&component_name));
        let props = Value::from_object(props);
        Ok(create_element(Value::str(tag), Some(&props), Vec::new()))
    })
}

/// Exports of a design-system module the resolver could not find
struct UiKitMembers {
    cache: RefCell<HashMap<String, Value>>,
}

impl DynamicMember for UiKitMembers {
    fn member(&self, name: &str) -> Value {
        if name == "__esModule" {
            return Value::Bool(true);
        }
        self.cache
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| placeholder_component(name))
            .clone()
    }
}

/// Module object for `@/components/ui/<segment>`
pub fn ui_kit_module(specifier: &str) -> Value {
    let segment = specifier
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(specifier);
    let component = kebab_to_pascal(segment);

    let members = Rc::new(UiKitMembers {
        cache: RefCell::new(HashMap::new()),
    });
    let default = members.member(&component);
    let mut exports = JsObject::with_dynamic(members);
    exports.set("default", default);
    Value::from_object(exports)
}

/// Default export for a module that failed to compile or threw
pub fn failed_module_placeholder(path: &str) -> Value {
    let name = path
        .rsplit('/')
        .next()
        .and_then(|file| file.split('.').next())
        .unwrap_or(path)
        .to_string();
    let path = path.to_string();
    Value::native(&name.clone(), move |_ev, _this, _args| {
        let props = Value::object(vec![
            ("data-placeholder", Value::str(&name)),
            ("data-failed-module", Value::str(&path)),
            ("className", Value::str("glimpse-placeholder")),
        ]);
        Ok(create_element(
            Value::str("div"),
            Some(&props),
            vec![Value::string(format!("{} could not be loaded", name))],
        ))
    })
}

/// Named members of a module whose body threw: each is a placeholder
struct FailedModuleMembers {
    path: String,
    cache: RefCell<HashMap<String, Value>>,
}

impl DynamicMember for FailedModuleMembers {
    fn member(&self, name: &str) -> Value {
        if name == "__esModule" {
            return Value::Bool(true);
        }
        self.cache
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| failed_module_placeholder(&self.path))
            .clone()
    }
}

/// Turn `exports` into fallback exports in place, keeping its identity
pub fn apply_fallback_exports(exports: &Value, path: &str) {
    if let Value::Object(object) = exports {
        let mut object = object.borrow_mut();
        for key in object.keys() {
            object.remove(&key);
        }
        object.set("default", failed_module_placeholder(path));
        object.set_dynamic(Rc::new(FailedModuleMembers {
            path: path.to_string(),
            cache: RefCell::new(HashMap::new()),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_labels_accumulate() {
        let root = MockStub::new("some-lib");
        let deep = root.child("a").child("b");
        assert_eq!(deep.label(), "some-lib.a.b");
        assert_eq!(deep.coerce(), "[Mock:some-lib.a.b]");
        assert!(Rc::ptr_eq(&root.child("a"), &root.child("a")));
    }

    #[test]
    fn test_kebab_to_pascal() {
        assert_eq!(kebab_to_pascal("dropdown-menu"), "DropdownMenu");
        assert_eq!(kebab_to_pascal("button"), "Button");
        assert_eq!(kebab_to_pascal("alert_dialog"), "AlertDialog");
    }

    #[test]
    fn test_ui_kit_module_members() {
        let module = ui_kit_module("@/components/ui/card");
        let object = module.as_object().unwrap().borrow();
        let default = object.get("default").unwrap();
        assert!(matches!(&default, Value::Function(f) if f.name == "Card"));
        let header = object.get("CardHeader").unwrap();
        assert!(header.strict_equals(&object.get("CardHeader").unwrap()));
        assert_eq!(placeholder_tag("CardTitle"), "h3");
        assert_eq!(placeholder_tag("Tabs"), "div");
    }

    #[test]
    fn test_fallback_exports_keep_identity() {
        let exports = Value::object(vec![("Header", Value::Null)]);
        let before = exports.clone();
        apply_fallback_exports(&exports, "src/components/Header.tsx");
        assert!(exports.strict_equals(&before));
        let object = exports.as_object().unwrap().borrow();
        assert!(matches!(object.get_own("Header"), None));
        assert!(matches!(object.get("default"), Some(Value::Function(f)) if f.name == "Header"));
        assert!(object.get("Header").unwrap().is_callable());
    }
}
