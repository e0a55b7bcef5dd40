//! `react-router-dom` against the session's [`Location`](crate::channel::Location).
//!
//! Matched routes render as a chain of route-context providers: each level
//! carries the merged params, the pathname it consumed (`base`) and the
//! rendered child route as its `outlet`.

use crate::builtins::globals::url_search_params;
use crate::builtins::react::create_element;
use crate::evaluator::{EvalResult, Evaluator};
use crate::hooks::read_context;
use crate::value::*;
use std::rc::Rc;
use tracing::debug;

/// Context slot reserved for routing; created with the session
pub const ROUTE_CONTEXT: ContextId = 0;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn prop(props: &Value, key: &str) -> Value {
    props
        .as_object()
        .and_then(|object| object.borrow().get(key))
        .unwrap_or(Value::Undefined)
}

/// Default value of the route context
pub fn root_route_context() -> Value {
    Value::object(vec![
        ("params", Value::empty_object()),
        ("outlet", Value::Null),
        ("base", Value::str("")),
    ])
}

fn route_provider() -> Value {
    Value::Function(Rc::new(Function::new("RouteContext.Provider", FunctionKind::Provider(ROUTE_CONTEXT))))
}

#[derive(Clone)]
struct RouteDef {
    path: Option<String>,
    index: bool,
    element: Value,
    children: Vec<RouteDef>,
}

struct RouteMatch {
    route: RouteDef,
    params: Vec<(String, String)>,
    base: String,
}

fn is_route_element(value: &Value) -> bool {
    matches!(value, Value::Element(el) if matches!(&el.ty, Value::Function(f) if f.name == "Route"))
}

fn route_element_of(ev: &mut Evaluator, source: &Value) -> EvalResult<Value> {
    let element = ev.get_member(source, "element")?;
    if !element.is_nullish() {
        return Ok(element);
    }
    let component = ev.get_member(source, "Component")?;
    if component.is_callable() {
        return Ok(create_element(component, None, Vec::new()));
    }
    Ok(Value::Undefined)
}

fn string_prop(ev: &mut Evaluator, source: &Value, key: &str) -> EvalResult<Option<String>> {
    Ok(match ev.get_member(source, key)? {
        Value::String(s) => Some(s.to_string()),
        _ => None,
    })
}

/// `<Route>` children, looking through fragments and arrays
fn routes_from_children(ev: &mut Evaluator, children: &Value, out: &mut Vec<RouteDef>) -> EvalResult<()> {
    match children {
        Value::Array(items) => {
            let items = items.borrow().clone();
            for item in &items {
                routes_from_children(ev, item, out)?;
            }
        }
        Value::Element(element) if is_route_element(children) => {
            let props = Value::Object(element.props.clone());
            let mut nested = Vec::new();
            routes_from_children(ev, &prop(&props, "children"), &mut nested)?;
            out.push(RouteDef {
                path: string_prop(ev, &props, "path")?,
                index: prop(&props, "index").is_truthy(),
                element: route_element_of(ev, &props)?,
                children: nested,
            });
        }
        Value::Element(element) if matches!(&element.ty, Value::Function(f) if matches!(f.kind, FunctionKind::Fragment)) => {
            let inner = element.props.borrow().get("children").unwrap_or(Value::Undefined);
            routes_from_children(ev, &inner, out)?;
        }
        _ => {}
    }
    Ok(())
}

/// Object route configs as given to `useRoutes` or `createBrowserRouter`
fn routes_from_objects(ev: &mut Evaluator, routes: &Value) -> EvalResult<Vec<RouteDef>> {
    let mut out = Vec::new();
    for route in ev.iterate(routes)? {
        let children = ev.get_member(&route, "children")?;
        let children = if children.is_nullish() {
            Vec::new()
        } else {
            routes_from_objects(ev, &children)?
        };
        out.push(RouteDef {
            path: string_prop(ev, &route, "path")?,
            index: ev.get_member(&route, "index")?.is_truthy(),
            element: route_element_of(ev, &route)?,
            children,
        });
    }
    Ok(out)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Higher ranks are tried first; splats always lose
fn rank(route: &RouteDef) -> i32 {
    if route.index {
        return 2;
    }
    segments(route.path.as_deref().unwrap_or(""))
        .iter()
        .map(|segment| match *segment {
            "*" => -100,
            s if s.starts_with(':') => 3,
            _ => 10,
        })
        .sum()
}

/// Match `pattern` against the front of `path`: `(params, consumed, consumed excluding splat)`
fn match_prefix(pattern: &[&str], path: &[&str]) -> Option<(Vec<(String, String)>, usize, usize)> {
    let mut params = Vec::new();
    for (index, segment) in pattern.iter().enumerate() {
        if *segment == "*" {
            params.push(("*".to_string(), path[index.min(path.len())..].join("/")));
            return Some((params, path.len(), index));
        }
        if let Some(name) = segment.strip_prefix(':') {
            match (name.strip_suffix('?'), path.get(index)) {
                (_, Some(value)) => params.push((name.trim_end_matches('?').to_string(), value.to_string())),
                (Some(_), None) => return Some((params, index, index)),
                (None, None) => return None,
            }
            continue;
        }
        match path.get(index) {
            Some(value) if value.eq_ignore_ascii_case(segment) => {}
            _ => return None,
        }
    }
    Some((params, pattern.len(), pattern.len()))
}

fn join_base(base: &str, consumed: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for segment in consumed {
        out.push('/');
        out.push_str(segment);
    }
    out
}

fn match_routes(routes: &[RouteDef], path: &[&str], base: &str) -> Option<Vec<RouteMatch>> {
    let mut ranked: Vec<&RouteDef> = routes.iter().collect();
    ranked.sort_by_key(|route| -rank(route));
    for route in ranked {
        if route.index {
            if path.is_empty() {
                return Some(vec![RouteMatch {
                    route: route.clone(),
                    params: Vec::new(),
                    base: base.to_string(),
                }]);
            }
            continue;
        }
        let pattern = segments(route.path.as_deref().unwrap_or(""));
        let Some((params, consumed, kept)) = match_prefix(&pattern, path) else {
            continue;
        };
        let remainder = &path[consumed..];
        let level = RouteMatch {
            route: route.clone(),
            params,
            base: join_base(base, &path[..kept]),
        };
        if !route.children.is_empty() {
            if let Some(mut chain) = match_routes(&route.children, remainder, &level.base) {
                chain.insert(0, level);
                return Some(chain);
            }
        }
        if remainder.is_empty() {
            return Some(vec![level]);
        }
    }
    None
}

/// Render a matched chain, innermost route first
fn render_matches(ev: &mut Evaluator, chain: Vec<RouteMatch>, outlet_component: &Value) -> Value {
    let parent = read_context(ev, ROUTE_CONTEXT);
    let mut params = JsObject::new();
    if let Value::Object(inherited) = prop(&parent, "params") {
        for (key, value) in inherited.borrow().entries() {
            params.set(key, value.clone());
        }
    }
    for level in &chain {
        for (key, value) in &level.params {
            params.set(key.clone(), Value::str(value));
        }
    }
    let params = Value::from_object(params);

    let mut outlet = Value::Null;
    for level in chain.into_iter().rev() {
        let element = if level.route.element.is_nullish() {
            create_element(outlet_component.clone(), None, Vec::new())
        } else {
            level.route.element
        };
        let value = Value::object(vec![
            ("params", params.clone()),
            ("outlet", outlet),
            ("base", Value::string(level.base)),
        ]);
        let props = Value::object(vec![("value", value)]);
        outlet = create_element(route_provider(), Some(&props), vec![element]);
    }
    outlet
}

fn render_routes(ev: &mut Evaluator, routes: &[RouteDef], outlet_component: &Value) -> Value {
    let parent = read_context(ev, ROUTE_CONTEXT);
    let base = prop(&parent, "base").to_js_string();
    let route = ev.ctx().location.borrow().route_path();
    let relative = if base.is_empty() {
        route.as_str()
    } else {
        route.strip_prefix(base.as_str()).unwrap_or(route.as_str())
    };
    let path = segments(relative);
    match match_routes(routes, &path, &base) {
        Some(chain) => render_matches(ev, chain, outlet_component),
        None => {
            debug!(route = %route, "no route matched");
            Value::Null
        }
    }
}

/// Resolve `to` against the current route base
pub fn resolve_to(base: &str, to: &str) -> String {
    if to.starts_with('/') {
        return to.to_string();
    }
    let (to_path, suffix) = match to.find(['?', '#']) {
        Some(at) => (&to[..at], &to[at..]),
        None => (to, ""),
    };
    let mut stack: Vec<&str> = segments(base);
    for segment in to_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    format!("/{}{}", stack.join("/"), suffix)
}

fn target_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string()),
        Value::Object(object) => {
            let object = object.borrow();
            let pathname = object.get("pathname").map(|v| v.to_js_string()).unwrap_or_default();
            let search = object.get("search").map(|v| v.to_js_string()).unwrap_or_default();
            let hash = object.get("hash").map(|v| v.to_js_string()).unwrap_or_default();
            Some(format!("{}{}{}", pathname, search, hash))
        }
        _ => None,
    }
}

fn current_base(ev: &Evaluator) -> String {
    let base = prop(&read_context(ev, ROUTE_CONTEXT), "base").to_js_string();
    if base.is_empty() {
        ev.ctx().location.borrow().route_path()
    } else {
        base
    }
}

fn navigate_native() -> Value {
    Value::native("navigate", |ev, _this, args| {
        let to = arg(args, 0);
        if let Value::Number(delta) = to {
            if delta < 0.0 {
                ev.ctx().go_back();
            }
            return Ok(Value::Undefined);
        }
        if let Some(target) = target_of(&to) {
            let replace = prop(&arg(args, 1), "replace").is_truthy();
            let resolved = resolve_to(&current_base(ev), &target);
            ev.ctx().navigate(&resolved, replace);
        }
        Ok(Value::Undefined)
    })
}

fn children_of(props: &Value) -> Value {
    prop(props, "children")
}

fn passthrough(name: &str) -> Value {
    Value::native(name, |_ev, _this, args| Ok(children_of(&arg(args, 0))))
}

const LINK_ONLY_PROPS: &[&str] = &[
    "to", "replace", "state", "end", "caseSensitive", "reloadDocument", "preventScrollReset", "relative",
    "unstable_viewTransition", "viewTransition", "children", "className", "style",
];

fn is_active(ev: &Evaluator, target: &str, end: bool) -> bool {
    let current = ev.ctx().location.borrow().route_path();
    let target = target.split(['?', '#']).next().unwrap_or(target);
    let target = if target.len() > 1 { target.trim_end_matches('/') } else { target };
    current == target || (!end && target != "/" && current.starts_with(&format!("{}/", target)))
}

/// Shared by `Link` and `NavLink`
fn render_link(ev: &mut Evaluator, props: &Value, nav: bool) -> EvalResult<Value> {
    let target = target_of(&prop(props, "to")).unwrap_or_else(|| "/".to_string());
    let resolved = resolve_to(&current_base(ev), &target);
    let replace = prop(props, "replace").is_truthy();
    let active = nav && is_active(ev, &resolved, prop(props, "end").is_truthy());
    let state = Value::object(vec![("isActive", Value::Bool(active)), ("isPending", Value::Bool(false))]);

    let mut attributes = JsObject::new();
    if let Value::Object(given) = props {
        for (key, value) in given.borrow().entries() {
            if !LINK_ONLY_PROPS.contains(&key) {
                attributes.set(key, value.clone());
            }
        }
    }
    let href = if ev.ctx().location.borrow().hash_routing {
        format!("#{}", resolved)
    } else {
        resolved.clone()
    };
    attributes.set("href", Value::string(href));

    let class_name = match prop(props, "className") {
        class if nav && class.is_callable() => ev.call_function(&class, Value::Undefined, &[state.clone()])?,
        Value::Undefined if nav && active => Value::str("active"),
        Value::String(class) if nav && active => Value::string(format!("{} active", class)),
        class => class,
    };
    if !class_name.is_nullish() {
        attributes.set("className", class_name);
    }
    let style = match prop(props, "style") {
        style if nav && style.is_callable() => ev.call_function(&style, Value::Undefined, &[state.clone()])?,
        style => style,
    };
    if !style.is_nullish() {
        attributes.set("style", style);
    }
    if active {
        attributes.set("aria-current", Value::str("page"));
    }

    let user_click = prop(props, "onClick");
    let destination = resolved;
    attributes.set(
        "onClick",
        Value::native("onClick", move |ev, _this, args| {
            if user_click.is_callable() {
                ev.call_function(&user_click, Value::Undefined, args)?;
            }
            let event = arg(args, 0);
            if prop(&event, "defaultPrevented").is_truthy() {
                return Ok(Value::Undefined);
            }
            let prevent = prop(&event, "preventDefault");
            if prevent.is_callable() {
                ev.call_function(&prevent, event.clone(), &[])?;
            }
            ev.ctx().navigate(&destination, replace);
            Ok(Value::Undefined)
        }),
    );

    let children = match children_of(props) {
        children if nav && children.is_callable() => ev.call_function(&children, Value::Undefined, &[state])?,
        children => children,
    };
    let attributes = Value::from_object(attributes);
    Ok(create_element(Value::str("a"), Some(&attributes), vec![children]))
}

fn location_object(ev: &Evaluator) -> Value {
    let location = ev.ctx().location.borrow();
    Value::object(vec![
        ("pathname", Value::string(location.route_path())),
        ("search", Value::string(location.route_search())),
        ("hash", Value::string(if location.hash_routing { String::new() } else { location.hash.clone() })),
        ("state", Value::Null),
        ("key", Value::str("default")),
    ])
}

fn use_search_params() -> Value {
    Value::native("useSearchParams", |ev, _this, _args| {
        let search = ev.ctx().location.borrow().route_search();
        let params = url_search_params(&search);
        let setter = Value::native("setSearchParams", |ev, _this, args| {
            let next = arg(args, 0);
            let query = match &next {
                Value::String(s) => s.trim_start_matches('?').to_string(),
                Value::Object(object) if object.borrow().get_own("toString").is_some() => {
                    let to_string = ev.get_member(&next, "toString")?;
                    ev.call_function(&to_string, next.clone(), &[])?.to_js_string()
                }
                Value::Object(_) => {
                    let built = url_search_params("");
                    let append = ev.get_member(&built, "append")?;
                    for key in crate::evaluator::own_keys(&next) {
                        let value = ev.get_member(&next, &key)?;
                        ev.call_function(&append, Value::Undefined, &[Value::string(key), value])?;
                    }
                    let to_string = ev.get_member(&built, "toString")?;
                    ev.call_function(&to_string, built.clone(), &[])?.to_js_string()
                }
                _ => String::new(),
            };
            let path = ev.ctx().location.borrow().route_path();
            let target = if query.is_empty() { path } else { format!("{}?{}", path, query) };
            let replace = prop(&arg(args, 1), "replace").is_truthy();
            ev.ctx().navigate(&target, replace);
            Ok(Value::Undefined)
        });
        Ok(Value::array(vec![params, setter]))
    })
}

fn use_match() -> Value {
    Value::native("useMatch", |ev, _this, args| {
        let pattern = match arg(args, 0) {
            Value::String(s) => s.to_string(),
            other => prop(&other, "path").to_js_string(),
        };
        let route = ev.ctx().location.borrow().route_path();
        let path = segments(&route);
        let pattern_segments = segments(&pattern);
        match match_prefix(&pattern_segments, &path) {
            Some((params, consumed, _)) if consumed == path.len() => {
                let mut object = JsObject::new();
                for (key, value) in params {
                    object.set(key, Value::string(value));
                }
                Ok(Value::object(vec![
                    ("params", Value::from_object(object)),
                    ("pathname", Value::string(route)),
                    ("pattern", Value::object(vec![("path", Value::string(pattern))])),
                ]))
            }
            _ => Ok(Value::Null),
        }
    })
}

pub fn router_module() -> Value {
    let outlet = Value::native("Outlet", |ev, _this, _args| {
        Ok(prop(&read_context(ev, ROUTE_CONTEXT), "outlet"))
    });

    let routes_outlet = outlet.clone();
    let routes = Value::native("Routes", move |ev, _this, args| {
        let mut defs = Vec::new();
        routes_from_children(ev, &children_of(&arg(args, 0)), &mut defs)?;
        Ok(render_routes(ev, &defs, &routes_outlet))
    });

    let use_routes_outlet = outlet.clone();
    let use_routes = Value::native("useRoutes", move |ev, _this, args| {
        let defs = routes_from_objects(ev, &arg(args, 0))?;
        Ok(render_routes(ev, &defs, &use_routes_outlet))
    });

    let provider_outlet = outlet.clone();
    let router_provider = Value::native("RouterProvider", move |ev, _this, args| {
        let router = prop(&arg(args, 0), "router");
        let defs = routes_from_objects(ev, &prop(&router, "routes"))?;
        Ok(render_routes(ev, &defs, &provider_outlet))
    });

    let create_router = Value::native("createBrowserRouter", |_ev, _this, args| {
        Ok(Value::object(vec![("routes", arg(args, 0))]))
    });

    let hash_router = Value::native("HashRouter", |ev, _this, args| {
        ev.ctx().location.borrow_mut().hash_routing = true;
        Ok(children_of(&arg(args, 0)))
    });

    let navigate = Value::native("Navigate", |ev, _this, args| {
        let props = arg(args, 0);
        if let Some(target) = target_of(&prop(&props, "to")) {
            let resolved = resolve_to(&current_base(ev), &target);
            let current = ev.ctx().location.borrow().route_path();
            if resolved.split(['?', '#']).next() != Some(current.as_str()) {
                ev.ctx().navigate(&resolved, prop(&props, "replace").is_truthy());
            }
        }
        Ok(Value::Null)
    });

    Value::object(vec![
        ("BrowserRouter", passthrough("BrowserRouter")),
        ("MemoryRouter", passthrough("MemoryRouter")),
        ("Router", passthrough("Router")),
        ("HashRouter", hash_router),
        ("Routes", routes),
        ("Route", Value::native("Route", |_ev, _this, _args| Ok(Value::Null))),
        ("Outlet", outlet),
        ("Link", Value::native("Link", |ev, _this, args| render_link(ev, &arg(args, 0), false))),
        ("NavLink", Value::native("NavLink", |ev, _this, args| render_link(ev, &arg(args, 0), true))),
        ("Navigate", navigate),
        ("useNavigate", Value::native("useNavigate", |_ev, _this, _args| Ok(navigate_native()))),
        ("useLocation", Value::native("useLocation", |ev, _this, _args| Ok(location_object(ev)))),
        ("useParams", Value::native("useParams", |ev, _this, _args| {
            Ok(prop(&read_context(ev, ROUTE_CONTEXT), "params"))
        })),
        ("useSearchParams", use_search_params()),
        ("useMatch", use_match()),
        ("useRoutes", use_routes),
        ("useOutlet", Value::native("useOutlet", |ev, _this, _args| {
            Ok(prop(&read_context(ev, ROUTE_CONTEXT), "outlet"))
        })),
        ("createBrowserRouter", create_router.clone()),
        ("createHashRouter", create_router.clone()),
        ("createMemoryRouter", create_router),
        ("RouterProvider", router_provider),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> RouteDef {
        RouteDef {
            path: Some(path.to_string()),
            index: false,
            element: Value::str(path),
            children: Vec::new(),
        }
    }

    fn matched_paths(chain: &[RouteMatch]) -> Vec<String> {
        chain.iter().map(|m| m.route.element.to_js_string()).collect()
    }

    #[test]
    fn test_static_routes_beat_params_and_splats() {
        let routes = vec![route("*"), route("/products/:id"), route("/products/new")];
        let chain = match_routes(&routes, &segments("/products/new"), "").unwrap();
        assert_eq!(matched_paths(&chain), vec!["/products/new"]);

        let chain = match_routes(&routes, &segments("/products/42"), "").unwrap();
        assert_eq!(chain[0].params, vec![("id".to_string(), "42".to_string())]);

        let chain = match_routes(&routes, &segments("/missing/page"), "").unwrap();
        assert_eq!(chain[0].params, vec![("*".to_string(), "missing/page".to_string())]);
    }

    #[test]
    fn test_nested_routes_and_index() {
        let mut layout = route("/dashboard");
        let mut index = route("index");
        index.index = true;
        index.path = None;
        layout.children = vec![index, route("settings")];
        let routes = vec![layout];

        let chain = match_routes(&routes, &segments("/dashboard"), "").unwrap();
        assert_eq!(matched_paths(&chain), vec!["/dashboard", "index"]);
        let chain = match_routes(&routes, &segments("/dashboard/settings"), "").unwrap();
        assert_eq!(matched_paths(&chain), vec!["/dashboard", "settings"]);
        assert_eq!(chain[1].base, "/dashboard/settings");
        assert!(match_routes(&routes, &segments("/other"), "").is_none());
    }

    #[test]
    fn test_resolve_to() {
        assert_eq!(resolve_to("/users/1", "edit"), "/users/1/edit");
        assert_eq!(resolve_to("/users/1", "../2"), "/users/2");
        assert_eq!(resolve_to("/users", "/home"), "/home");
        assert_eq!(resolve_to("/", "about?tab=1"), "/about?tab=1");
    }
}
