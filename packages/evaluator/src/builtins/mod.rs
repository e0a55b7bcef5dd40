//! Builtin module overrides. The table is built once per session so every
//! `require("react")` in that session returns the same object.

pub mod globals;
pub mod icons;
pub mod motion;
pub mod react;
pub mod router;
pub mod state;
pub mod styling;

use crate::value::Value;
use std::collections::HashMap;

/// Specifier -> module object for every library the preview supplies itself
pub fn builtin_modules(fragment: &Value) -> HashMap<String, Value> {
    let react = react::react_module(fragment);
    let jsx_runtime = react::jsx_runtime(fragment);
    let react_dom = react::react_dom();
    let router = router::router_module();
    let motion = motion::motion_module();
    let zustand = state::zustand_module();

    let modules: Vec<(&str, Value)> = vec![
        ("react", react),
        ("react/jsx-runtime", jsx_runtime.clone()),
        ("react/jsx-dev-runtime", jsx_runtime),
        ("react-dom", react_dom.clone()),
        ("react-dom/client", react_dom),
        ("react-router-dom", router.clone()),
        ("react-router", router),
        ("clsx", styling::clsx_module()),
        ("classnames", styling::classnames_module()),
        ("tailwind-merge", styling::tailwind_merge_module()),
        ("class-variance-authority", styling::cva_module()),
        ("lucide-react", icons::lucide_module()),
        ("framer-motion", motion.clone()),
        ("motion/react", motion),
        ("zustand", zustand.clone()),
        ("zustand/react", zustand),
        ("zustand/middleware", state::zustand_middleware_module()),
        ("@tanstack/react-query", state::react_query_module()),
    ];
    modules
        .into_iter()
        .map(|(name, module)| (name.to_string(), module))
        .collect()
}
