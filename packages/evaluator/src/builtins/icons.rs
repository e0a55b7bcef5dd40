//! `lucide-react`: every PascalCase member is an icon component rendering
//! an outline `<svg>`. Known icons carry their real geometry; the rest
//! draw a circle so layouts keep their shape.

use crate::builtins::react::create_element;
use crate::evaluator::EvalResult;
use crate::value::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type Shape = (&'static str, &'static [(&'static str, &'static str)]);

const ICONS: &[(&str, &[Shape])] = &[
    ("Check", &[("path", &[("d", "M20 6 9 17l-5-5")])]),
    ("X", &[("path", &[("d", "M18 6 6 18")]), ("path", &[("d", "m6 6 12 12")])]),
    ("Plus", &[("path", &[("d", "M5 12h14")]), ("path", &[("d", "M12 5v14")])]),
    ("Minus", &[("path", &[("d", "M5 12h14")])]),
    ("ChevronRight", &[("path", &[("d", "m9 18 6-6-6-6")])]),
    ("ChevronLeft", &[("path", &[("d", "m15 18-6-6 6-6")])]),
    ("ChevronDown", &[("path", &[("d", "m6 9 6 6 6-6")])]),
    ("ChevronUp", &[("path", &[("d", "m18 15-6-6-6 6")])]),
    ("ArrowRight", &[("path", &[("d", "M5 12h14")]), ("path", &[("d", "m12 5 7 7-7 7")])]),
    ("ArrowLeft", &[("path", &[("d", "m12 19-7-7 7-7")]), ("path", &[("d", "M19 12H5")])]),
    (
        "Search",
        &[("circle", &[("cx", "11"), ("cy", "11"), ("r", "8")]), ("path", &[("d", "m21 21-4.3-4.3")])],
    ),
    (
        "Menu",
        &[
            ("line", &[("x1", "4"), ("x2", "20"), ("y1", "12"), ("y2", "12")]),
            ("line", &[("x1", "4"), ("x2", "20"), ("y1", "6"), ("y2", "6")]),
            ("line", &[("x1", "4"), ("x2", "20"), ("y1", "18"), ("y2", "18")]),
        ],
    ),
    (
        "User",
        &[
            ("path", &[("d", "M19 21v-2a4 4 0 0 0-4-4H9a4 4 0 0 0-4 4v2")]),
            ("circle", &[("cx", "12"), ("cy", "7"), ("r", "4")]),
        ],
    ),
    (
        "Home",
        &[
            ("path", &[("d", "m3 9 9-7 9 7v11a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2z")]),
            ("polyline", &[("points", "9 22 9 12 15 12 15 22")]),
        ],
    ),
    (
        "Heart",
        &[("path", &[("d", "M19 14c1.49-1.46 3-3.21 3-5.5A5.5 5.5 0 0 0 16.5 3c-1.76 0-3 .5-4.5 2-1.5-1.5-2.74-2-4.5-2A5.5 5.5 0 0 0 2 8.5c0 2.3 1.5 4.05 3 5.5l7 7Z")])],
    ),
    (
        "Star",
        &[("polygon", &[("points", "12 2 15.09 8.26 22 9.27 17 14.14 18.18 21.02 12 17.77 5.82 21.02 7 14.14 2 9.27 8.91 8.26 12 2")])],
    ),
    (
        "Mail",
        &[
            ("rect", &[("width", "20"), ("height", "16"), ("x", "2"), ("y", "4"), ("rx", "2")]),
            ("path", &[("d", "m22 7-8.97 5.7a1.94 1.94 0 0 1-2.06 0L2 7")]),
        ],
    ),
    ("Loader2", &[("path", &[("d", "M21 12a9 9 0 1 1-6.219-8.56")])]),
    (
        "Sun",
        &[
            ("circle", &[("cx", "12"), ("cy", "12"), ("r", "4")]),
            ("path", &[("d", "M12 2v2")]),
            ("path", &[("d", "M12 20v2")]),
            ("path", &[("d", "M2 12h2")]),
            ("path", &[("d", "M20 12h2")]),
        ],
    ),
    ("Moon", &[("path", &[("d", "M12 3a6 6 0 0 0 9 9 9 9 0 1 1-9-9Z")])]),
    (
        "Trash2",
        &[
            ("path", &[("d", "M3 6h18")]),
            ("path", &[("d", "M19 6v14c0 1-1 2-2 2H7c-1 0-2-1-2-2V6")]),
            ("path", &[("d", "M8 6V4c0-1 1-2 2-2h4c1 0 2 1 2 2v2")]),
        ],
    ),
    (
        "Bell",
        &[
            ("path", &[("d", "M6 8a6 6 0 0 1 12 0c0 7 3 9 3 9H3s3-2 3-9")]),
            ("path", &[("d", "M10.3 21a1.94 1.94 0 0 0 3.4 0")]),
        ],
    ),
    (
        "Calendar",
        &[
            ("rect", &[("width", "18"), ("height", "18"), ("x", "3"), ("y", "4"), ("rx", "2")]),
            ("line", &[("x1", "16"), ("x2", "16"), ("y1", "2"), ("y2", "6")]),
            ("line", &[("x1", "8"), ("x2", "8"), ("y1", "2"), ("y2", "6")]),
            ("line", &[("x1", "3"), ("x2", "21"), ("y1", "10"), ("y2", "10")]),
        ],
    ),
    (
        "ShoppingCart",
        &[
            ("circle", &[("cx", "8"), ("cy", "21"), ("r", "1")]),
            ("circle", &[("cx", "19"), ("cy", "21"), ("r", "1")]),
            ("path", &[("d", "M2.05 2.05h2l2.66 12.42a2 2 0 0 0 2 1.58h9.78a2 2 0 0 0 1.95-1.57l1.65-7.43H5.12")]),
        ],
    ),
    (
        "Settings",
        &[
            ("circle", &[("cx", "12"), ("cy", "12"), ("r", "3")]),
            ("path", &[("d", "M12 2v3M12 19v3M4.2 4.2l2.1 2.1M17.7 17.7l2.1 2.1M2 12h3M19 12h3M4.2 19.8l2.1-2.1M17.7 6.3l2.1-2.1")]),
        ],
    ),
];

const FALLBACK: &[Shape] = &[("circle", &[("cx", "12"), ("cy", "12"), ("r", "10")])];

/// `ArrowRight` -> `arrow-right`, `Loader2` -> `loader-2`
pub fn pascal_to_kebab(name: &str) -> String {
    let mut out = String::new();
    let mut previous: Option<char> = None;
    for c in name.chars() {
        let boundary = match previous {
            Some(p) => (c.is_ascii_uppercase() && (p.is_ascii_lowercase() || p.is_ascii_digit()))
                || (c.is_ascii_digit() && p.is_ascii_alphabetic()),
            None => false,
        };
        if boundary {
            out.push('-');
        }
        out.push(c.to_ascii_lowercase());
        previous = Some(c);
    }
    out
}

/// Canonical icon name: `SearchIcon`, `LucideSearch` -> `Search`
fn canonical(name: &str) -> &str {
    let name = name.strip_prefix("Lucide").filter(|rest| !rest.is_empty()).unwrap_or(name);
    name.strip_suffix("Icon").filter(|rest| !rest.is_empty()).unwrap_or(name)
}

fn static_shapes(name: &str) -> Vec<Value> {
    let shapes = ICONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, shapes)| *shapes)
        .unwrap_or(FALLBACK);
    shapes
        .iter()
        .map(|(tag, attributes)| {
            let props = Value::object(attributes.iter().map(|(k, v)| (*k, Value::str(v))).collect());
            create_element(Value::str(tag), Some(&props), Vec::new())
        })
        .collect()
}

const SVG_DEFAULTS: &[&str] = &["size", "color", "strokeWidth", "absoluteStrokeWidth", "className", "children"];

fn render_icon(name: &str, props: &Value, shapes: Vec<Value>) -> EvalResult<Value> {
    let get = |key: &str| {
        props
            .as_object()
            .and_then(|object| object.borrow().get(key))
            .filter(|value| !value.is_nullish())
    };
    let size = get("size").unwrap_or(Value::Number(24.0));
    let mut attributes = JsObject::new();
    attributes.set("xmlns", Value::str("http://www.w3.org/2000/svg"));
    attributes.set("width", size.clone());
    attributes.set("height", size);
    attributes.set("viewBox", Value::str("0 0 24 24"));
    attributes.set("fill", Value::str("none"));
    attributes.set("stroke", get("color").unwrap_or(Value::str("currentColor")));
    attributes.set("strokeWidth", get("strokeWidth").unwrap_or(Value::Number(2.0)));
    attributes.set("strokeLinecap", Value::str("round"));
    attributes.set("strokeLinejoin", Value::str("round"));
    let mut class = format!("lucide lucide-{}", pascal_to_kebab(name));
    if let Some(extra) = get("className") {
        class.push(' ');
        class.push_str(&extra.to_js_string());
    }
    attributes.set("className", Value::string(class));
    if let Value::Object(given) = props {
        for (key, value) in given.borrow().entries() {
            if !SVG_DEFAULTS.contains(&key) {
                attributes.set(key, value.clone());
            }
        }
    }
    let mut children = shapes;
    if let Some(extra) = get("children") {
        children.push(extra);
    }
    let attributes = Value::from_object(attributes);
    Ok(create_element(Value::str("svg"), Some(&attributes), children))
}

fn icon_component(name: &str) -> Value {
    let canonical = canonical(name).to_string();
    Value::native(name, move |_ev, _this, args| {
        let props = args.first().cloned().unwrap_or(Value::Undefined);
        render_icon(&canonical, &props, static_shapes(&canonical))
    })
}

struct IconTable {
    cache: RefCell<HashMap<String, Value>>,
}

impl DynamicMember for IconTable {
    fn member(&self, name: &str) -> Value {
        if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Value::Undefined;
        }
        self.cache
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| icon_component(name))
            .clone()
    }
}

/// `createLucideIcon(name, [[tag, attrs], ...])`
fn create_lucide_icon() -> Value {
    Value::native("createLucideIcon", |ev, _this, args| {
        let name = args.first().map(Value::to_js_string).unwrap_or_else(|| "Icon".to_string());
        let node = args.get(1).cloned().unwrap_or(Value::Undefined);
        let mut shapes: Vec<(Value, Value)> = Vec::new();
        if matches!(node, Value::Array(_)) {
            for entry in ev.iterate(&node)? {
                let tag = ev.get_member(&entry, "0")?;
                let attributes = ev.get_member(&entry, "1")?;
                shapes.push((tag, attributes));
            }
        }
        let component_name = name.clone();
        Ok(Value::native(&name, move |_ev, _this, args| {
            let props = args.first().cloned().unwrap_or(Value::Undefined);
            let children = shapes
                .iter()
                .map(|(tag, attributes)| create_element(tag.clone(), Some(attributes), Vec::new()))
                .collect();
            render_icon(&component_name, &props, children)
        }))
    })
}

pub fn lucide_module() -> Value {
    let table = Rc::new(IconTable {
        cache: RefCell::new(HashMap::new()),
    });
    let mut module = JsObject::with_dynamic(table);
    module.set("createLucideIcon", create_lucide_icon());
    module.set("icons", Value::empty_object());
    Value::from_object(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_to_kebab() {
        assert_eq!(pascal_to_kebab("ArrowRight"), "arrow-right");
        assert_eq!(pascal_to_kebab("Loader2"), "loader-2");
        assert_eq!(pascal_to_kebab("X"), "x");
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical("SearchIcon"), "Search");
        assert_eq!(canonical("LucideHeart"), "Heart");
        assert_eq!(canonical("Icon"), "Icon");
    }

    #[test]
    fn test_icon_members_are_stable() {
        let module = lucide_module();
        let object = module.as_object().unwrap().borrow();
        let first = object.get("Check").unwrap();
        assert!(first.strict_equals(&object.get("Check").unwrap()));
        assert!(matches!(object.get("default"), Some(Value::Undefined)));
        assert!(first.is_callable());
    }

    #[test]
    fn test_unknown_icons_fall_back_to_circle() {
        let shapes = static_shapes("Sparkles");
        assert_eq!(shapes.len(), 1);
        let Value::Element(element) = &shapes[0] else { panic!("expected element") };
        assert_eq!(element.ty.to_js_string(), "circle");
    }
}
