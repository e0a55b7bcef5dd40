//! `framer-motion` / `motion/react`. Previews are static, so `motion.*`
//! components render their host element in its settled `animate` state
//! with the animation props removed; hooks return inert motion values.

use crate::builtins::react::create_element;
use crate::evaluator::EvalResult;
use crate::value::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const ANIMATION_PROPS: &[&str] = &[
    "initial", "animate", "exit", "transition", "variants", "whileHover", "whileTap", "whileFocus",
    "whileDrag", "whileInView", "drag", "dragConstraints", "dragElastic", "dragMomentum",
    "dragSnapToOrigin", "dragListener", "dragControls", "layout", "layoutId", "layoutScroll",
    "layoutDependency", "onAnimationStart", "onAnimationComplete", "onUpdate", "viewport", "custom",
    "inherit", "onHoverStart", "onHoverEnd", "onTap", "onTapStart", "onTapCancel", "onDragStart",
    "onDragEnd", "onDrag", "onViewportEnter", "onViewportLeave", "transformTemplate",
];

/// Transform shorthands that do not map to a CSS property
const TRANSFORM_KEYS: &[&str] = &[
    "x", "y", "z", "scale", "scaleX", "scaleY", "rotate", "rotateX", "rotateY", "skew", "skewX", "skewY",
    "transition", "transitionEnd",
];

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// The `animate` target as a plain object, resolving variant labels
fn settled_target(props: &JsObject) -> Option<JsObject> {
    let animate = props.get_own("animate")?.clone();
    let target = match &animate {
        Value::String(label) => props
            .get_own("variants")
            .and_then(|variants| variants.as_object().and_then(|v| v.borrow().get_own(label).cloned()))?,
        Value::Object(_) => animate,
        _ => return None,
    };
    let target = target.as_object()?.borrow();
    let mut style = JsObject::new();
    for (key, value) in target.entries() {
        if TRANSFORM_KEYS.contains(&key) {
            continue;
        }
        let value = match value {
            Value::Array(frames) => frames.borrow().last().cloned().unwrap_or(Value::Undefined),
            other => other.clone(),
        };
        if matches!(value, Value::Number(_) | Value::String(_)) {
            style.set(key, value);
        }
    }
    Some(style)
}

/// Props with animation keys removed and the settled target merged into `style`
pub fn strip_motion_props(props: &Value) -> Value {
    let Value::Object(given) = props else {
        return Value::empty_object();
    };
    let given = given.borrow();
    let mut out = JsObject::new();
    for (key, value) in given.entries() {
        if !ANIMATION_PROPS.contains(&key) {
            out.set(key, value.clone());
        }
    }
    if let Some(target) = settled_target(&given) {
        let mut style = match out.get_own("style") {
            Some(Value::Object(existing)) => existing.borrow().clone(),
            _ => JsObject::new(),
        };
        for (key, value) in target.entries() {
            style.set(key, value.clone());
        }
        out.set("style", Value::from_object(style));
    }
    Value::from_object(out)
}

fn motion_component(ty: Value, name: &str) -> Value {
    Value::native(name, move |_ev, _this, args| {
        let props = strip_motion_props(&arg(args, 0));
        Ok(create_element(ty.clone(), Some(&props), Vec::new()))
    })
}

struct MotionTags {
    cache: RefCell<HashMap<String, Value>>,
}

impl DynamicMember for MotionTags {
    fn member(&self, name: &str) -> Value {
        self.cache
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| motion_component(Value::str(name), &format!("motion.{}", name)))
            .clone()
    }
}

/// `motion(Component)` plus `motion.div`, `motion.span`, ...
fn motion_factory() -> Value {
    let motion = Value::native("motion", |_ev, _this, args| {
        let component = arg(args, 0);
        let name = match &component {
            Value::Function(f) => format!("motion({})", f.name),
            Value::String(tag) => format!("motion.{}", tag),
            _ => "motion(Component)".to_string(),
        };
        Ok(motion_component(component, &name))
    });
    if let Value::Function(function) = &motion {
        function.props.borrow_mut().set_dynamic(Rc::new(MotionTags {
            cache: RefCell::new(HashMap::new()),
        }));
    }
    motion
}

/// Motion value: `current` mirrors the latest `set`
pub fn motion_value(initial: Value) -> Value {
    let unsubscribe = || Value::native("unsubscribe", |_ev, _this, _args| Ok(Value::Undefined));
    Value::object(vec![
        ("current", initial),
        ("isMotionValue", Value::Bool(true)),
        ("get", Value::native("get", |_ev, this, _args| Ok(current_of(this)))),
        ("set", Value::native("set", |_ev, this, args| {
            if let Value::Object(object) = this {
                object.borrow_mut().set("current", arg(args, 0));
            }
            Ok(Value::Undefined)
        })),
        ("getVelocity", Value::native("getVelocity", |_ev, _this, _args| Ok(Value::Number(0.0)))),
        ("on", Value::native("on", move |_ev, _this, _args| Ok(unsubscribe()))),
        ("onChange", Value::native("onChange", move |_ev, _this, _args| Ok(unsubscribe()))),
        ("stop", Value::native("stop", |_ev, _this, _args| Ok(Value::Undefined))),
    ])
}

fn current_of(value: &Value) -> Value {
    match value {
        Value::Object(object) if object.borrow().get_own("isMotionValue").is_some() => {
            object.borrow().get_own("current").cloned().unwrap_or(Value::Undefined)
        }
        other => other.clone(),
    }
}

fn controls() -> Value {
    Value::object(vec![
        ("start", Value::native("start", |_ev, _this, _args| Ok(Value::promise(Ok(Value::Undefined))))),
        ("stop", Value::native("stop", |_ev, _this, _args| Ok(Value::Undefined))),
        ("set", Value::native("set", |_ev, _this, _args| Ok(Value::Undefined))),
        ("mount", Value::native("mount", |_ev, _this, _args| Ok(Value::Undefined))),
    ])
}

fn animation_handle() -> Value {
    Value::object(vec![
        ("stop", Value::native("stop", |_ev, _this, _args| Ok(Value::Undefined))),
        ("cancel", Value::native("cancel", |_ev, _this, _args| Ok(Value::Undefined))),
        ("complete", Value::native("complete", |_ev, _this, _args| Ok(Value::Undefined))),
        ("then", Value::native("then", |ev, _this, args| {
            let callback = arg(args, 0);
            if callback.is_callable() {
                ev.call_function(&callback, Value::Undefined, &[])?;
            }
            Ok(Value::promise(Ok(Value::Undefined)))
        })),
    ])
}

fn use_transform(args: &[Value]) -> EvalResult<Value> {
    let source = current_of(&arg(args, 0));
    let output = arg(args, 2);
    let value = match &output {
        Value::Array(items) => items.borrow().first().cloned().unwrap_or(Value::Undefined),
        _ => source,
    };
    Ok(motion_value(value))
}

fn presence(name: &str) -> Value {
    Value::native(name, |_ev, _this, args| {
        Ok(arg(args, 0)
            .as_object()
            .and_then(|props| props.borrow().get_own("children").cloned())
            .unwrap_or(Value::Null))
    })
}

pub fn motion_module() -> Value {
    let motion = motion_factory();
    let scroll = || {
        Value::object(vec![
            ("scrollX", motion_value(Value::Number(0.0))),
            ("scrollY", motion_value(Value::Number(0.0))),
            ("scrollXProgress", motion_value(Value::Number(0.0))),
            ("scrollYProgress", motion_value(Value::Number(0.0))),
        ])
    };
    Value::object(vec![
        ("motion", motion.clone()),
        ("m", motion),
        ("AnimatePresence", presence("AnimatePresence")),
        ("LayoutGroup", presence("LayoutGroup")),
        ("MotionConfig", presence("MotionConfig")),
        ("LazyMotion", presence("LazyMotion")),
        (
            "Reorder",
            Value::object(vec![
                ("Group", motion_component(Value::str("ul"), "Reorder.Group")),
                ("Item", motion_component(Value::str("li"), "Reorder.Item")),
            ]),
        ),
        ("domAnimation", Value::empty_object()),
        ("domMax", Value::empty_object()),
        ("useAnimation", Value::native("useAnimation", |_ev, _this, _args| Ok(controls()))),
        ("useAnimationControls", Value::native("useAnimationControls", |_ev, _this, _args| Ok(controls()))),
        ("useInView", Value::native("useInView", |_ev, _this, _args| Ok(Value::Bool(true)))),
        ("useScroll", Value::native("useScroll", move |_ev, _this, _args| Ok(scroll()))),
        ("useTransform", Value::native("useTransform", |_ev, _this, args| use_transform(args))),
        ("useMotionValue", Value::native("useMotionValue", |_ev, _this, args| Ok(motion_value(arg(args, 0))))),
        ("useSpring", Value::native("useSpring", |_ev, _this, args| {
            Ok(motion_value(current_of(&arg(args, 0))))
        })),
        ("useVelocity", Value::native("useVelocity", |_ev, _this, _args| Ok(motion_value(Value::Number(0.0))))),
        ("useMotionTemplate", Value::native("useMotionTemplate", |_ev, _this, args| {
            let text = match arg(args, 0) {
                Value::Array(strings) => {
                    let strings = strings.borrow();
                    let mut out = String::new();
                    for (index, part) in strings.iter().enumerate() {
                        out.push_str(&part.to_js_string());
                        if let Some(value) = args.get(index + 1) {
                            out.push_str(&current_of(value).to_js_string());
                        }
                    }
                    out
                }
                other => other.to_js_string(),
            };
            Ok(motion_value(Value::string(text)))
        })),
        ("useMotionValueEvent", Value::native("useMotionValueEvent", |_ev, _this, _args| Ok(Value::Undefined))),
        ("useAnimationFrame", Value::native("useAnimationFrame", |_ev, _this, _args| Ok(Value::Undefined))),
        ("useReducedMotion", Value::native("useReducedMotion", |_ev, _this, _args| Ok(Value::Bool(false)))),
        ("useDragControls", Value::native("useDragControls", |_ev, _this, _args| Ok(controls()))),
        ("useIsPresent", Value::native("useIsPresent", |_ev, _this, _args| Ok(Value::Bool(true)))),
        ("useAnimate", Value::native("useAnimate", |_ev, _this, _args| {
            let scope = Value::object(vec![("current", Value::Null)]);
            let animate = Value::native("animate", |_ev, _this, _args| Ok(animation_handle()));
            Ok(Value::array(vec![scope, animate]))
        })),
        ("animate", Value::native("animate", |_ev, _this, _args| Ok(animation_handle()))),
        ("stagger", Value::native("stagger", |_ev, _this, _args| Ok(Value::Number(0.0)))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_motion_props_settles_animate_target() {
        let props = Value::object(vec![
            ("className", Value::str("card")),
            ("initial", Value::object(vec![("opacity", Value::Number(0.0))])),
            (
                "animate",
                Value::object(vec![
                    ("opacity", Value::Number(1.0)),
                    ("y", Value::Number(0.0)),
                    ("color", Value::array(vec![Value::str("#000"), Value::str("#fff")])),
                ]),
            ),
            ("whileHover", Value::object(vec![("scale", Value::Number(1.1))])),
        ]);
        let stripped = strip_motion_props(&props);
        let object = stripped.as_object().unwrap().borrow();
        assert_eq!(object.keys(), vec!["className", "style"]);
        let style = object.get_own("style").unwrap().as_object().unwrap().borrow();
        assert_eq!(style.keys(), vec!["opacity", "color"]);
        assert_eq!(style.get_own("color").unwrap().to_js_string(), "#fff");
    }

    #[test]
    fn test_variant_labels_resolve() {
        let props = Value::object(vec![
            ("animate", Value::str("visible")),
            (
                "variants",
                Value::object(vec![("visible", Value::object(vec![("opacity", Value::Number(1.0))]))]),
            ),
        ]);
        let stripped = strip_motion_props(&props);
        let object = stripped.as_object().unwrap().borrow();
        let style = object.get_own("style").unwrap().as_object().unwrap().borrow();
        assert_eq!(style.get_own("opacity").unwrap().to_number(), 1.0);
    }

    #[test]
    fn test_motion_tags_are_cached() {
        let motion = motion_factory();
        let Value::Function(function) = &motion else { panic!("expected function") };
        let props = function.props.borrow();
        assert!(props.get("div").unwrap().strict_equals(&props.get("div").unwrap()));
    }
}
