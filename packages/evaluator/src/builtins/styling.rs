//! Class-name utilities: `clsx`/`classnames`, `tailwind-merge`,
//! `class-variance-authority` and the `cn` helper generated projects keep
//! in `@/lib/utils`.

use crate::evaluator::{EvalResult, Evaluator};
use crate::value::*;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Flatten clsx-style inputs into class tokens
pub fn collect_classes(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(s.split_whitespace().map(str::to_string)),
        Value::Number(n) if *n != 0.0 && !n.is_nan() => out.push(format_number(*n)),
        Value::Array(items) => {
            for item in items.borrow().iter() {
                collect_classes(item, out);
            }
        }
        Value::Object(object) => {
            for (key, enabled) in object.borrow().entries() {
                if enabled.is_truthy() {
                    out.extend(key.split_whitespace().map(str::to_string));
                }
            }
        }
        _ => {}
    }
}

pub fn clsx(args: &[Value]) -> String {
    let mut classes = Vec::new();
    for value in args {
        collect_classes(value, &mut classes);
    }
    classes.join(" ")
}

const DISPLAY: &[&str] = &[
    "block", "inline-block", "inline", "flex", "inline-flex", "grid", "inline-grid", "hidden", "contents",
    "table", "flow-root", "list-item",
];
const POSITION: &[&str] = &["static", "fixed", "absolute", "relative", "sticky"];
const TEXT_SIZES: &[&str] = &[
    "xs", "sm", "base", "lg", "xl", "2xl", "3xl", "4xl", "5xl", "6xl", "7xl", "8xl", "9xl",
];
const TEXT_ALIGN: &[&str] = &["left", "center", "right", "justify", "start", "end"];
const FONT_WEIGHTS: &[&str] = &[
    "thin", "extralight", "light", "normal", "medium", "semibold", "bold", "extrabold", "black",
];
const SHADOW_SIZES: &[&str] = &["sm", "md", "lg", "xl", "2xl", "inner", "none"];
const ROUNDED_SIDES: &[&str] = &["t", "r", "b", "l", "tl", "tr", "bl", "br", "s", "e"];

/// Utility prefixes whose value is the remainder, longest first
const PREFIX_GROUPS: &[&str] = &[
    "space-x", "space-y", "gap-x", "gap-y", "inset-x", "inset-y", "min-w", "max-w", "min-h", "max-h",
    "grid-cols", "grid-rows", "col-span", "row-span", "leading", "tracking", "opacity", "z", "gap",
    "inset", "top", "right", "bottom", "left", "w", "h", "size", "px", "py", "pt", "pr", "pb", "pl", "ps",
    "pe", "p", "mx", "my", "mt", "mr", "mb", "ml", "ms", "me", "m", "justify", "items", "self", "content",
    "place-items", "place-content", "overflow-x", "overflow-y", "overflow", "cursor", "duration", "ease",
    "delay", "transition", "translate-x", "translate-y", "rotate", "scale", "basis", "grow", "shrink",
    "order", "object", "aspect", "line-clamp", "whitespace", "break", "decoration", "underline-offset",
    "outline", "ring-offset", "fill", "stroke", "list", "select", "pointer-events", "backdrop-blur",
    "blur", "animate", "from", "via", "to",
];

fn is_color_like(value: &str) -> bool {
    value.starts_with('[') && value.contains('#')
        || value.contains('-')
            && value
                .rsplit('-')
                .next()
                .map_or(false, |shade| shade.split('/').next().map_or(false, |s| s.parse::<u32>().is_ok()))
        || matches!(
            value.split('/').next().unwrap_or(value),
            "white" | "black" | "transparent" | "current" | "inherit" | "primary" | "secondary" | "muted"
                | "accent" | "destructive" | "foreground" | "background" | "border" | "input" | "ring"
                | "card" | "popover" | "muted-foreground" | "primary-foreground" | "secondary-foreground"
                | "accent-foreground" | "destructive-foreground" | "card-foreground" | "popover-foreground"
        )
}

fn is_width_like(value: &str) -> bool {
    value.is_empty() || value.parse::<u32>().is_ok() || value.starts_with('[') && !value.contains('#')
}

/// Conflict group of a utility without its variant prefix
fn class_group(utility: &str) -> Option<String> {
    let utility = utility.strip_prefix('-').unwrap_or(utility);
    if DISPLAY.contains(&utility) {
        return Some("display".into());
    }
    if POSITION.contains(&utility) {
        return Some("position".into());
    }
    if let Some(rest) = utility.strip_prefix("text-") {
        if TEXT_SIZES.contains(&rest) {
            return Some("text-size".into());
        }
        if TEXT_ALIGN.contains(&rest) {
            return Some("text-align".into());
        }
        if rest == "ellipsis" || rest == "clip" {
            return Some("text-overflow".into());
        }
        return Some("text-color".into());
    }
    if let Some(rest) = utility.strip_prefix("font-") {
        if FONT_WEIGHTS.contains(&rest) {
            return Some("font-weight".into());
        }
        return Some("font-family".into());
    }
    if let Some(rest) = utility.strip_prefix("bg-") {
        if rest.starts_with("gradient") {
            return Some("bg-image".into());
        }
        if ["cover", "contain", "auto"].contains(&rest) {
            return Some("bg-size".into());
        }
        return Some("bg-color".into());
    }
    if utility == "border" || utility.starts_with("border-") {
        let rest = utility.strip_prefix("border").unwrap_or("").trim_start_matches('-');
        let (side, value) = match rest.split_once('-') {
            Some((side, value)) if ["x", "y", "t", "r", "b", "l", "s", "e"].contains(&side) => (side, value),
            _ if ["x", "y", "t", "r", "b", "l", "s", "e"].contains(&rest) => (rest, ""),
            _ => ("", rest),
        };
        if ["solid", "dashed", "dotted", "double", "none"].contains(&value) {
            return Some("border-style".into());
        }
        let kind = if is_width_like(value) { "width" } else { "color" };
        return Some(format!("border-{}-{}", kind, side));
    }
    if utility == "rounded" || utility.starts_with("rounded-") {
        let rest = utility.strip_prefix("rounded").unwrap_or("").trim_start_matches('-');
        let side = rest.split('-').next().filter(|side| ROUNDED_SIDES.contains(side)).unwrap_or("");
        return Some(format!("rounded-{}", side));
    }
    if utility == "shadow" || utility.strip_prefix("shadow-").map_or(false, |rest| SHADOW_SIZES.contains(&rest)) {
        return Some("shadow".into());
    }
    if utility.starts_with("shadow-") {
        return Some("shadow-color".into());
    }
    if utility == "ring" || utility.starts_with("ring-") && !utility.starts_with("ring-offset") {
        let value = utility.strip_prefix("ring").unwrap_or("").trim_start_matches('-');
        return Some(if is_width_like(value) || value == "inset" { "ring-width" } else { "ring-color" }.into());
    }
    if ["flex-row", "flex-col", "flex-row-reverse", "flex-col-reverse"].contains(&utility) {
        return Some("flex-direction".into());
    }
    if ["flex-wrap", "flex-nowrap", "flex-wrap-reverse"].contains(&utility) {
        return Some("flex-wrap".into());
    }
    if ["flex-1", "flex-auto", "flex-initial", "flex-none"].contains(&utility) {
        return Some("flex".into());
    }
    if ["italic", "not-italic"].contains(&utility) {
        return Some("font-style".into());
    }
    if ["uppercase", "lowercase", "capitalize", "normal-case"].contains(&utility) {
        return Some("text-transform".into());
    }
    if ["underline", "overline", "line-through", "no-underline"].contains(&utility) {
        return Some("text-decoration".into());
    }
    if utility == "truncate" {
        return Some("text-overflow".into());
    }
    if ["visible", "invisible", "collapse"].contains(&utility) {
        return Some("visibility".into());
    }
    let prefix = PREFIX_GROUPS
        .iter()
        .filter(|prefix| utility == **prefix || utility.starts_with(&format!("{}-", prefix)))
        .max_by_key(|prefix| prefix.len())?;
    if (*prefix == "outline" || *prefix == "stroke") && is_color_like(&utility[prefix.len()..].trim_start_matches('-')) {
        return Some(format!("{}-color", prefix));
    }
    Some((*prefix).to_string())
}

/// Split `hover:md:bg-red-500` into (`hover:md:`, `bg-red-500`); `!` is kept in the prefix
fn split_variants(class: &str) -> (String, &str) {
    let mut depth = 0usize;
    let mut last = 0usize;
    for (index, c) in class.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => last = index + 1,
            _ => {}
        }
    }
    let (variants, utility) = class.split_at(last);
    match utility.strip_prefix('!') {
        Some(rest) => (format!("{}!", variants), rest),
        None => (variants.to_string(), utility),
    }
}

/// Later utilities override earlier ones in the same conflict group
pub fn tw_merge(classes: &str) -> String {
    let tokens: Vec<&str> = classes.split_whitespace().collect();
    let mut seen: Vec<String> = Vec::new();
    let mut kept: Vec<&str> = Vec::new();
    for token in tokens.iter().rev() {
        let (variants, utility) = split_variants(token);
        let key = match class_group(utility) {
            Some(group) => format!("{}{}", variants, group),
            None => format!("{}{}", variants, utility),
        };
        // `p-4` also shadows earlier `px-*`/`py-*`
        let shadows_axes = matches!(class_group(utility).as_deref(), Some("p") | Some("m"));
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        if shadows_axes {
            let base = class_group(utility).unwrap_or_default();
            for axis in ["x", "y", "t", "r", "b", "l", "s", "e"] {
                seen.push(format!("{}{}{}", variants, base, axis));
            }
        }
        kept.push(token);
    }
    kept.reverse();
    kept.join(" ")
}

/// `cva(base, { variants, defaultVariants, compoundVariants })`
fn cva(base: Value, config: Value) -> Value {
    Value::native("cva", move |ev, _this, args| {
        let props = arg(args, 0);
        let read = |ev: &mut Evaluator, object: &Value, key: &str| -> EvalResult<Value> {
            if object.is_nullish() {
                return Ok(Value::Undefined);
            }
            ev.get_member(object, key)
        };
        let variants = read(ev, &config, "variants")?;
        let defaults = read(ev, &config, "defaultVariants")?;

        let mut classes = Vec::new();
        collect_classes(&base, &mut classes);

        let mut chosen: Vec<(String, String)> = Vec::new();
        if let Value::Object(object) = &variants {
            let names = object.borrow().keys();
            for name in names {
                let mut selected = read(ev, &props, &name)?;
                if matches!(selected, Value::Undefined) {
                    selected = read(ev, &defaults, &name)?;
                }
                if selected.is_nullish() {
                    continue;
                }
                let key = selected.to_property_key();
                let options = ev.get_member(&variants, &name)?;
                let class = read(ev, &options, &key)?;
                collect_classes(&class, &mut classes);
                chosen.push((name, key));
            }
        }

        if let Value::Array(compounds) = read(ev, &config, "compoundVariants")? {
            let compounds = compounds.borrow().clone();
            for compound in compounds {
                let Value::Object(object) = &compound else { continue };
                let conditions: Vec<(String, Value)> = object
                    .borrow()
                    .entries()
                    .filter(|(key, _)| *key != "class" && *key != "className")
                    .map(|(key, value)| (key.to_string(), value.clone()))
                    .collect();
                let matches = conditions.iter().all(|(name, expected)| {
                    let actual = chosen.iter().find(|(chosen, _)| chosen == name).map(|(_, value)| value.as_str());
                    match expected {
                        Value::Array(options) => options
                            .borrow()
                            .iter()
                            .any(|option| Some(option.to_property_key().as_str()) == actual),
                        other => Some(other.to_property_key().as_str()) == actual,
                    }
                });
                if matches {
                    let object = object.borrow();
                    for key in ["class", "className"] {
                        if let Some(class) = object.get_own(key) {
                            collect_classes(class, &mut classes);
                        }
                    }
                }
            }
        }

        for key in ["class", "className"] {
            let extra = read(ev, &props, key)?;
            collect_classes(&extra, &mut classes);
        }
        Ok(Value::string(classes.join(" ")))
    })
}

fn clsx_native(name: &str) -> Value {
    Value::native(name, |_ev, _this, args| Ok(Value::string(clsx(args))))
}

pub fn clsx_module() -> Value {
    let clsx = clsx_native("clsx");
    Value::object(vec![("default", clsx.clone()), ("clsx", clsx)])
}

pub fn classnames_module() -> Value {
    Value::object(vec![("default", clsx_native("classNames"))])
}

pub fn tailwind_merge_module() -> Value {
    let merge = Value::native("twMerge", |_ev, _this, args| Ok(Value::string(tw_merge(&clsx(args)))));
    Value::object(vec![
        ("twMerge", merge.clone()),
        ("twJoin", clsx_native("twJoin")),
        ("extendTailwindMerge", Value::native("extendTailwindMerge", move |_ev, _this, _args| Ok(merge.clone()))),
    ])
}

pub fn cva_module() -> Value {
    let cva = Value::native("cva", |_ev, _this, args| Ok(cva(arg(args, 0), arg(args, 1))));
    Value::object(vec![
        ("cva", cva.clone()),
        ("default", cva),
        ("cx", clsx_native("cx")),
    ])
}

/// Stand-in for a missing `@/lib/utils`: `cn(...inputs) = twMerge(clsx(inputs))`
pub fn utils_module() -> Value {
    Value::object(vec![(
        "cn",
        Value::native("cn", |_ev, _this, args| Ok(Value::string(tw_merge(&clsx(args))))),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clsx_flattens_inputs() {
        let args = vec![
            Value::str("a b"),
            Value::Bool(false),
            Value::array(vec![Value::str("c"), Value::Null]),
            Value::object(vec![("d", Value::Bool(true)), ("e", Value::Number(0.0))]),
        ];
        assert_eq!(clsx(&args), "a b c d");
    }

    #[test]
    fn test_tw_merge_keeps_last_conflict() {
        assert_eq!(tw_merge("px-2 py-1 p-3"), "p-3");
        assert_eq!(tw_merge("p-3 px-2"), "p-3 px-2");
        assert_eq!(tw_merge("text-sm text-red-500 text-lg"), "text-red-500 text-lg");
        assert_eq!(tw_merge("bg-white hover:bg-gray-100 bg-black"), "hover:bg-gray-100 bg-black");
        assert_eq!(tw_merge("flex hidden"), "hidden");
        assert_eq!(tw_merge("font-bold font-sans"), "font-bold font-sans");
        assert_eq!(tw_merge("rounded-md rounded-lg rounded-t-none"), "rounded-lg rounded-t-none");
        assert_eq!(tw_merge("border border-2 border-red-500"), "border-2 border-red-500");
        assert_eq!(tw_merge("custom-class other"), "custom-class other");
    }

    #[test]
    fn test_split_variants() {
        assert_eq!(split_variants("hover:md:bg-red-500"), ("hover:md:".to_string(), "bg-red-500"));
        assert_eq!(split_variants("!p-2"), ("!".to_string(), "p-2"));
        assert_eq!(split_variants("[&>svg]:w-4"), ("[&>svg]:".to_string(), "w-4"));
    }
}
