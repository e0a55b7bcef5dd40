//! Renderer: turns element values into virtual DOM nodes.
//!
//! Components are invoked with hook slots keyed by their position in the
//! tree. Host props are bound the way React DOM binds them: `className`
//! becomes `class`, style objects become declarations, `on*` handlers go to
//! the session's handler table keyed by node id, and source attributes of
//! image-like elements pass through the resource rewrite hook.

use crate::builtins::globals::element_handle;
use crate::evaluator::{with_stack, EvalError, EvalResult, Evaluator};
use crate::hooks::read_context;
use crate::stub::MockStub;
use crate::value::*;
use crate::vdom::VNode;
use glimpse_bundle::ResourceRewriteHook;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// Marks the placeholder rendered for a stubbed component
pub const MOCK_ATTR: &str = "data-glimpse-mock";

/// Nesting limit for rendered elements
pub const MAX_TREE_DEPTH: usize = 256;

/// Per-pass render bookkeeping
#[derive(Default)]
pub struct RenderState {
    /// Provided context values, innermost last
    pub contexts: Vec<(ContextId, Value)>,
    handlers: HashMap<u32, Vec<(String, Value)>>,
    next_id: u32,
}

impl RenderState {
    pub fn begin(&mut self) {
        self.contexts.clear();
        self.handlers.clear();
        self.next_id = 0;
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Handler bound to `event` on node `id`
    pub fn handler(&self, id: u32, event: &str) -> Option<Value> {
        self.handlers
            .get(&id)?
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

const UNITLESS: &[&str] = &[
    "animationIterationCount", "aspectRatio", "columnCount", "columns", "fillOpacity", "flex",
    "flexGrow", "flexShrink", "fontWeight", "gridArea", "gridColumn", "gridColumnEnd",
    "gridColumnStart", "gridRow", "gridRowEnd", "gridRowStart", "lineClamp", "lineHeight",
    "opacity", "order", "orphans", "scale", "stopOpacity", "strokeOpacity", "strokeWidth",
    "tabSize", "widows", "zIndex", "zoom",
];

const BOOLEAN_ATTRS: &[&str] = &[
    "allowfullscreen", "async", "autofocus", "autoplay", "checked", "controls", "default",
    "defer", "disabled", "formnovalidate", "hidden", "inert", "loop", "multiple", "muted",
    "nomodule", "novalidate", "open", "playsinline", "readonly", "required", "reversed",
    "selected",
];

/// SVG attributes whose camelCase spelling is the real attribute name
const SVG_CAMEL_ATTRS: &[&str] = &[
    "viewBox", "preserveAspectRatio", "gradientUnits", "gradientTransform", "patternUnits",
    "patternContentUnits", "patternTransform", "clipPathUnits", "maskUnits", "maskContentUnits",
    "markerWidth", "markerHeight", "markerUnits", "refX", "refY", "pathLength", "stdDeviation",
    "baseFrequency", "numOctaves", "filterUnits", "primitiveUnits", "spreadMethod", "startOffset",
    "textLength", "lengthAdjust", "attributeName", "repeatCount", "keyTimes", "keySplines",
    "calcMode", "tableValues", "kernelMatrix", "surfaceScale", "xChannelSelector",
    "yChannelSelector", "edgeMode",
];

const SKIPPED_PROPS: &[&str] = &[
    "children", "key", "__self", "__source", "suppressHydrationWarning",
    "suppressContentEditableWarning",
];

fn camel_to_kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `backgroundColor` -> `background-color`, `WebkitMask` -> `-webkit-mask`
pub fn css_property(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    if let Some(rest) = name.strip_prefix("ms") {
        if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
            return format!("-ms{}", camel_to_kebab(rest));
        }
    }
    let kebab = camel_to_kebab(name);
    if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        kebab
    } else {
        kebab.trim_start_matches('-').to_string()
    }
}

/// Latest value of a motion value, else the value itself
fn settle_motion(value: &Value) -> Value {
    if let Value::Object(object) = value {
        let object = object.borrow();
        if object.get_own("isMotionValue").map_or(false, Value::is_truthy) {
            return object.get_own("current").cloned().unwrap_or(Value::Undefined);
        }
    }
    value.clone()
}

fn transform_part(key: &str, value: &Value) -> Option<String> {
    let (unit, function) = match key {
        "x" => ("px", "translateX"),
        "y" => ("px", "translateY"),
        "z" => ("px", "translateZ"),
        "scale" | "scaleX" | "scaleY" => ("", key),
        "rotate" | "rotateX" | "rotateY" | "skew" | "skewX" | "skewY" => ("deg", key),
        _ => return None,
    };
    let text = match value {
        Value::Number(n) => format!("{}{}", format_number(*n), unit),
        Value::String(s) => s.to_string(),
        _ => return None,
    };
    Some(format!("{}({})", function, text))
}

/// Inline style object -> declaration list
pub fn style_to_css(style: &Value) -> Option<String> {
    let object = match style {
        Value::String(s) => return Some(s.to_string()),
        Value::Object(object) => object.borrow(),
        _ => return None,
    };
    let mut declarations = Vec::new();
    let mut transforms = Vec::new();
    for (key, value) in object.entries() {
        let value = settle_motion(value);
        if let Some(part) = transform_part(key, &value) {
            transforms.push(part);
            continue;
        }
        let text = match &value {
            Value::Number(n) if *n == 0.0 || UNITLESS.contains(&key) || key.starts_with("--") => {
                format_number(*n)
            }
            Value::Number(n) => format!("{}px", format_number(*n)),
            Value::String(s) => s.to_string(),
            _ => continue,
        };
        declarations.push(format!("{}:{}", css_property(key), text));
    }
    if !transforms.is_empty() {
        declarations.push(format!("transform:{}", transforms.join(" ")));
    }
    Some(declarations.join(";"))
}

/// DOM attribute name for a host prop
fn attribute_name(name: &str, svg: bool) -> String {
    match name {
        "className" => "class".to_string(),
        "htmlFor" => "for".to_string(),
        "defaultValue" => "value".to_string(),
        "defaultChecked" => "checked".to_string(),
        "xlinkHref" => "xlink:href".to_string(),
        "xmlnsXlink" => "xmlns:xlink".to_string(),
        "xmlSpace" => "xml:space".to_string(),
        "acceptCharset" => "accept-charset".to_string(),
        "httpEquiv" => "http-equiv".to_string(),
        _ if name.starts_with("data-") || name.starts_with("aria-") => name.to_string(),
        _ if svg && !SVG_CAMEL_ATTRS.contains(&name) => camel_to_kebab(name),
        _ if svg => name.to_string(),
        _ => name.to_ascii_lowercase(),
    }
}

fn is_event_prop(name: &str, value: &Value) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].starts_with(|c: char| c.is_ascii_uppercase())
        && value.is_callable()
}

fn prop_of(props: &ObjectRef, key: &str) -> Value {
    props.borrow().get_own(key).cloned().unwrap_or(Value::Undefined)
}

fn child_segment(path: &str, index: usize, child: &Value) -> String {
    match child {
        Value::Element(element) if element.key.is_some() => {
            format!("{}>${}", path, element.key.as_deref().unwrap_or_default())
        }
        _ => format!("{}>{}", path, index),
    }
}

/// `Objects are not valid as a React child` error, as React words it
fn invalid_child(object: &JsObject) -> EvalError {
    EvalError::type_error(format!(
        "Objects are not valid as a React child (found: object with keys {{{}}}). \
If you meant to render a collection of children, use an array instead.",
        object.keys().join(", ")
    ))
}

pub struct Renderer<'a> {
    ev: &'a mut Evaluator,
    rewrite: &'a dyn ResourceRewriteHook,
    depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(ev: &'a mut Evaluator, rewrite: &'a dyn ResourceRewriteHook) -> Self {
        Self {
            ev,
            rewrite,
            depth: 0,
        }
    }

    /// Render `root` as the content of the mount container
    pub fn render_root(&mut self, root: &Value) -> EvalResult<Vec<VNode>> {
        let mut out = Vec::new();
        self.render_value(root, "root", false, &mut out)?;
        Ok(out)
    }

    fn render_value(&mut self, value: &Value, path: &str, svg: bool, out: &mut Vec<VNode>) -> EvalResult<()> {
        match value {
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Function(_) => Ok(()),
            Value::Number(n) => {
                out.push(VNode::text(format_number(*n)));
                Ok(())
            }
            Value::String(s) => {
                if !s.is_empty() {
                    out.push(VNode::text(s.to_string()));
                }
                Ok(())
            }
            Value::Array(items) => {
                let items = items.borrow().clone();
                for (index, item) in items.iter().enumerate() {
                    self.render_value(item, &child_segment(path, index, item), svg, out)?;
                }
                Ok(())
            }
            Value::Element(element) => {
                self.depth += 1;
                let result = if self.depth > MAX_TREE_DEPTH {
                    Err(EvalError::range_error(
                        "Maximum update depth exceeded: the component tree nests too deeply",
                    ))
                } else {
                    with_stack(|| self.render_element(element, path, svg, out))
                };
                self.depth -= 1;
                result
            }
            Value::Stub(stub) => {
                out.push(VNode::text(stub.coerce()));
                Ok(())
            }
            Value::Object(object) => {
                let settled = value.as_promise();
                match settled {
                    Some(Ok(resolved)) => self.render_value(&resolved, path, svg, out),
                    Some(Err(reason)) => Err(EvalError::thrown(reason)),
                    None => Err(invalid_child(&object.borrow())),
                }
            }
        }
    }

    /// `props.children` of an element; a lone child sits at index 0
    fn render_children(&mut self, children: &Value, path: &str, svg: bool, out: &mut Vec<VNode>) -> EvalResult<()> {
        match children {
            Value::Array(_) => self.render_value(children, path, svg, out),
            other => self.render_value(other, &child_segment(path, 0, other), svg, out),
        }
    }

    fn render_element(&mut self, element: &Rc<Element>, path: &str, svg: bool, out: &mut Vec<VNode>) -> EvalResult<()> {
        match &element.ty {
            Value::String(tag) => {
                let node = self.render_host(tag, &element.props, path, svg)?;
                out.push(node);
                Ok(())
            }
            Value::Function(function) => match &function.kind {
                FunctionKind::Fragment => {
                    let children = prop_of(&element.props, "children");
                    self.render_children(&children, path, svg, out)
                }
                FunctionKind::Provider(id) => {
                    let value = prop_of(&element.props, "value");
                    let children = prop_of(&element.props, "children");
                    self.ev.ctx().render.borrow_mut().contexts.push((*id, value));
                    let result = self.render_children(&children, path, svg, out);
                    self.ev.ctx().render.borrow_mut().contexts.pop();
                    result
                }
                FunctionKind::Consumer(id) => {
                    let children = prop_of(&element.props, "children");
                    let value = read_context(self.ev, *id);
                    let rendered = self.ev.call_function(&children, Value::Undefined, &[value])?;
                    self.render_value(&rendered, path, svg, out)
                }
                FunctionKind::Closure(_) | FunctionKind::Native(_) => {
                    self.render_component(function, &element.ty, &element.props, path, svg, out)
                }
            },
            Value::Stub(stub) => self.render_mock(stub, &element.props, path, svg, out),
            other => Err(EvalError::type_error(format!(
                "Element type is invalid: expected a string (for built-in components) or a \
class/function (for composite components) but got: {}. You likely forgot to export your \
component from the file it's defined in, or you might have mixed up default and named imports.",
                match other {
                    Value::Undefined | Value::Null => other.to_js_string(),
                    _ => other.type_of().to_string(),
                }
            ))),
        }
    }

    fn render_component(
        &mut self,
        function: &Rc<Function>,
        ty: &Value,
        props: &ObjectRef,
        path: &str,
        svg: bool,
        out: &mut Vec<VNode>,
    ) -> EvalResult<()> {
        let name = if function.name.is_empty() {
            "Anonymous"
        } else {
            function.name.as_str()
        };
        let instance = format!("{}:{}", path, name);
        trace!(%instance, "render component");

        self.ev.ctx().hooks.borrow_mut().enter(&instance);
        let result = self
            .ev
            .call_function(ty, Value::Undefined, &[Value::Object(props.clone())]);
        self.ev.ctx().hooks.borrow_mut().exit();

        let rendered = result?;
        self.render_value(&rendered, &instance, svg, out)
    }

    /// Labelled placeholder for a stubbed component; children render inside
    fn render_mock(
        &mut self,
        stub: &Rc<MockStub>,
        props: &ObjectRef,
        path: &str,
        svg: bool,
        out: &mut Vec<VNode>,
    ) -> EvalResult<()> {
        let id = self.ev.ctx().render.borrow_mut().allocate();
        let mut node = VNode::element("div")
            .with_id(id)
            .with_attr("class", "glimpse-mock")
            .with_attr(MOCK_ATTR, stub.label());
        for attr in ["data-source-path", "data-source-loc"] {
            if let Value::String(value) = prop_of(props, attr) {
                node.set_attr(attr, value.to_string());
            }
        }

        let children = prop_of(props, "children");
        let mut rendered = Vec::new();
        self.render_children(&children, &format!("{}:{}", path, stub.label()), svg, &mut rendered)?;
        if rendered.is_empty() {
            rendered.push(VNode::text(mock_caption(stub.label()).to_string()));
        }
        out.push(node.with_children(rendered));
        Ok(())
    }

    fn render_host(&mut self, tag: &str, props: &ObjectRef, path: &str, svg: bool) -> EvalResult<VNode> {
        let svg = svg || tag == "svg";
        let ctx = self.ev.ctx().clone();
        let id = ctx.render.borrow_mut().allocate();
        let mut node = VNode::element(tag).with_id(id);

        let entries: Vec<(String, Value)> = props
            .borrow()
            .entries()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        let mut inner_html = None;
        let mut handlers = Vec::new();
        let mut reference = None;
        for (key, value) in &entries {
            let key = key.as_str();
            if SKIPPED_PROPS.contains(&key) {
                continue;
            }
            match key {
                "ref" => reference = Some(value.clone()),
                "dangerouslySetInnerHTML" => {
                    if let Value::Object(html) = value {
                        inner_html = html.borrow().get_own("__html").map(Value::to_js_string);
                    }
                }
                "style" => {
                    if let Some(css) = style_to_css(value).filter(|css| !css.is_empty()) {
                        let css = self.rewrite.rewrite_style_value(&css).unwrap_or(css);
                        node.set_attr("style", css);
                    }
                }
                _ if is_event_prop(key, value) => {
                    handlers.push((key[2..].to_ascii_lowercase(), value.clone()));
                }
                _ => {
                    if let Some((name, text)) = self.bind_attribute(tag, key, value, svg) {
                        node.set_attr(name, text);
                    }
                }
            }
        }

        if !handlers.is_empty() {
            ctx.render.borrow_mut().handlers.insert(id, handlers);
        }
        if let Some(reference) = reference {
            self.attach_ref(tag, node.attr("id").unwrap_or_default(), &reference)?;
        }

        let mut children = prop_of(props, "children");
        if tag == "textarea" && children.is_nullish() {
            children = prop_of(props, "value");
            if children.is_nullish() {
                children = prop_of(props, "defaultValue");
            }
        }

        if let Some(html) = inner_html {
            return Ok(node.with_child(VNode::raw(html)));
        }
        if is_void(tag) {
            return Ok(node);
        }
        let mut rendered = Vec::new();
        self.render_children(&children, path, svg, &mut rendered)?;
        Ok(node.with_children(rendered))
    }

    fn bind_attribute(&self, tag: &str, key: &str, value: &Value, svg: bool) -> Option<(String, String)> {
        let name = attribute_name(key, svg);
        let value = settle_motion(value);
        let text = match &value {
            Value::Undefined | Value::Null => return None,
            Value::Bool(flag) if name.starts_with("aria-") || name.starts_with("data-") => {
                flag.to_string()
            }
            Value::Bool(true) if BOOLEAN_ATTRS.contains(&name.as_str()) => String::new(),
            Value::Bool(flag) if matches!(name.as_str(), "draggable" | "spellcheck" | "contenteditable") => {
                flag.to_string()
            }
            Value::Bool(_) => return None,
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Stub(stub) => stub.coerce(),
            Value::Array(_) if name == "class" => value.to_js_string().replace(',', " "),
            _ => return None,
        };
        let text = self.rewrite.rewrite_attribute(tag, &name, &text).unwrap_or(text);
        Some((name, text))
    }

    fn attach_ref(&mut self, tag: &str, id: &str, reference: &Value) -> EvalResult<()> {
        let handle = element_handle(tag, id);
        match reference {
            Value::Object(object) => {
                object.borrow_mut().set("current", handle);
                Ok(())
            }
            callback if callback.is_callable() => {
                self.ev.call_function(callback, Value::Undefined, &[handle])?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Visible name of a mock: its last meaningful segment (`src/App.tsx` -> `App`)
fn mock_caption(label: &str) -> &str {
    label
        .rsplit(['/', '.'])
        .find(|segment| {
            !segment.is_empty()
                && !matches!(*segment, "default" | "tsx" | "ts" | "jsx" | "js" | "mjs" | "cjs")
        })
        .unwrap_or(label)
}

pub fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_to_css() {
        let style = Value::object(vec![
            ("backgroundColor", Value::str("red")),
            ("marginTop", Value::Number(8.0)),
            ("opacity", Value::Number(0.5)),
            ("zIndex", Value::Number(10.0)),
            ("WebkitBoxOrient", Value::str("vertical")),
            ("--accent", Value::str("#fff")),
            ("x", Value::Number(20.0)),
            ("rotate", Value::Number(45.0)),
        ]);
        assert_eq!(
            style_to_css(&style).unwrap(),
            "background-color:red;margin-top:8px;opacity:0.5;z-index:10;-webkit-box-orient:vertical;\
--accent:#fff;transform:translateX(20px) rotate(45deg)"
        );
    }

    #[test]
    fn test_motion_values_in_style() {
        let value = Value::object(vec![
            ("isMotionValue", Value::Bool(true)),
            ("current", Value::Number(0.25)),
        ]);
        let style = Value::object(vec![("opacity", value)]);
        assert_eq!(style_to_css(&style).unwrap(), "opacity:0.25");
    }

    #[test]
    fn test_mock_caption() {
        assert_eq!(mock_caption("src/App.tsx"), "App");
        assert_eq!(mock_caption("src/App.tsx.default"), "App");
        assert_eq!(mock_caption("src/Chart.tsx.Chart"), "Chart");
        assert_eq!(mock_caption("fancy-carousel.Carousel"), "Carousel");
        assert_eq!(mock_caption("fancy-widget"), "fancy-widget");
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(attribute_name("className", false), "class");
        assert_eq!(attribute_name("htmlFor", false), "for");
        assert_eq!(attribute_name("tabIndex", false), "tabindex");
        assert_eq!(attribute_name("strokeWidth", true), "stroke-width");
        assert_eq!(attribute_name("viewBox", true), "viewBox");
        assert_eq!(attribute_name("aria-hidden", false), "aria-hidden");
        assert_eq!(css_property("msTransform"), "-ms-transform");
    }

    #[test]
    fn test_event_props() {
        let handler = Value::native("h", |_ev, _this, _args| Ok(Value::Undefined));
        assert!(is_event_prop("onClick", &handler));
        assert!(!is_event_prop("onClick", &Value::str("alert(1)")));
        assert!(!is_event_prop("once", &handler));
    }
}
