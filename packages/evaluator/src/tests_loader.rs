/// Module loading: caching, cycles, fallbacks and export repair
use crate::loader::require;
use crate::session::{DiagnosticKind, PreviewSession};
use crate::tests_session::{preview, text_of};
use crate::value::Value;
use glimpse_common::{PreviewConfig, VirtualFileStore};

/// Compiled but not mounted, for driving the loader directly
fn session(files: &[(&str, &str)]) -> PreviewSession {
    let mut session = PreviewSession::new(VirtualFileStore::new(files.iter().copied()), PreviewConfig::default());
    session.compile();
    session
}

fn member(value: &Value, key: &str) -> Value {
    value
        .as_object()
        .and_then(|object| object.borrow().get(key))
        .unwrap_or(Value::Undefined)
}

#[test]
fn test_same_path_yields_same_exports() {
    let mut session = session(&[
        ("src/lib/format.ts", "export const shout = (s) => s.toUpperCase();"),
        ("src/App.tsx", ""),
        ("src/pages/Home.tsx", ""),
    ]);
    let ev = session.evaluator();
    let first = require(ev, "src/App.tsx", "./lib/format");
    let second = require(ev, "src/pages/Home.tsx", "../lib/format.ts");
    let aliased = require(ev, "src/pages/Home.tsx", "@/lib/format");
    assert!(first.strict_equals(&second));
    assert!(first.strict_equals(&aliased));
    assert!(member(&first, "shout").is_callable());
}

#[test]
fn test_builtins_are_stable() {
    let mut session = session(&[("src/App.tsx", "")]);
    let ev = session.evaluator();
    let react = require(ev, "src/App.tsx", "react");
    assert!(react.strict_equals(&require(ev, "src/other.tsx", "react")));
    let utils = require(ev, "src/App.tsx", "@/lib/utils");
    assert!(member(&utils, "cn").is_callable());
}

#[test]
fn test_project_utils_shadow_builtin_helpers() {
    let session = preview(&[
        (
            "src/lib/utils.ts",
            r#"
export function cn(...classes: string[]) { return classes.filter(Boolean).join(" "); }
export const formatPrice = (cents: number) => "$" + (cents / 100).toFixed(2);
"#,
        ),
        (
            "src/App.tsx",
            r#"
import { cn, formatPrice } from "@/lib/utils";
export default function App() {
  return <p className={cn("price", false && "hidden")}>{formatPrice(1999)}</p>;
}
"#,
        ),
    ]);

    assert!(session.failure().is_none());
    assert!(text_of(&session).contains("$19.99"));
    let price = session.find(&|node| node.attr("class") == Some("price"));
    assert!(price.is_some());
}

#[test]
fn test_cycle_receives_partial_exports() {
    let mut session = session(&[
        (
            "src/a.ts",
            "import { seenFromB } from './b';\nexport const a = 'A';\nexport const report = seenFromB;",
        ),
        (
            "src/b.ts",
            "import * as modA from './a';\nexport const seenFromB = typeof modA.a;",
        ),
    ]);
    let exports = require(session.evaluator(), "src/main.ts", "./a");
    assert_eq!(member(&exports, "a").to_js_string(), "A");
    // b ran while a was still in progress
    assert_eq!(member(&exports, "report").to_js_string(), "undefined");
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_mutual_imports_in_render_closures() {
    let session = preview(&[
        (
            "src/App.tsx",
            r#"
import { Footer } from "./Footer";
export const brand = "Glimpse";
export function Header() { return <h1>{brand}</h1>; }
export default function App() { return <div><Header /><Footer /></div>; }
"#,
        ),
        (
            "src/Footer.tsx",
            r#"
import { brand, Header } from "./App";
export function Footer() { return <footer>© {brand} {typeof Header}</footer>; }
"#,
        ),
    ]);

    assert!(session.failure().is_none());
    assert!(text_of(&session).contains("© Glimpse function"));
}

#[test]
fn test_unknown_specifier_is_a_stub() {
    let mut session = session(&[("src/App.tsx", "")]);
    let ev = session.evaluator();
    let stub = require(ev, "src/App.tsx", "@acme/widgets");
    assert!(stub.is_callable());
    let deep = ev.get_member(&stub, "charts").unwrap();
    let deep = ev.get_member(&deep, "Line").unwrap();
    assert_eq!(deep.to_js_string(), "[Mock:@acme/widgets.charts.Line]");
    assert!(require(ev, "src/Other.tsx", "@acme/widgets").strict_equals(&stub));

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Resolution);
    assert_eq!(diagnostics[0].path.as_deref(), Some("src/App.tsx"));
}

#[test]
fn test_stub_component_renders_placeholder_with_children() {
    let session = preview(&[(
        "src/App.tsx",
        r#"
import { Carousel } from "fancy-carousel";
import Widget from "fancy-widget";
export default function App() {
  return <main><Carousel><p>slide one</p></Carousel><Widget /></main>;
}
"#,
    )]);

    assert!(session.is_mounted());
    let document = session.document();
    let mocks: Vec<_> = ["fancy-carousel.Carousel", "fancy-widget"]
        .iter()
        .map(|label| document.find(&|node| node.attr("data-glimpse-mock") == Some(*label)))
        .collect();
    assert!(mocks.iter().all(Option::is_some));
    assert!(mocks[0].unwrap().text_content().contains("slide one"));
    assert_eq!(mocks[1].unwrap().text_content(), "fancy-widget");
}

#[test]
fn test_missing_design_system_component() {
    let session = preview(&[(
        "src/App.tsx",
        r#"
import { Button } from "@/components/ui/button";
import { Card, CardHeader, CardTitle } from "@/components/ui/card";
export default function App() {
  return (
    <Card>
      <CardHeader><CardTitle>Plans</CardTitle></CardHeader>
      <Button variant="outline" onClick={() => {}}>Buy</Button>
    </Card>
  );
}
"#,
    )]);

    assert!(session.failure().is_none());
    assert!(session.diagnostics().is_empty());
    let document = session.document();
    let button = document.find(&|node| node.tag() == Some("button")).unwrap();
    assert_eq!(button.attr("data-placeholder"), Some("Button"));
    assert_eq!(button.attr("variant"), None);
    assert_eq!(button.text_content(), "Buy");
    let title = document.find(&|node| node.tag() == Some("h3")).unwrap();
    assert_eq!(title.text_content(), "Plans");
}

#[test]
fn test_local_design_system_component_wins() {
    let session = preview(&[
        (
            "src/components/ui/button.tsx",
            "export function Button({ children }) { return <button className=\"real\">{children}</button>; }",
        ),
        (
            "src/App.tsx",
            "import { Button } from '@/components/ui/button';\nexport default () => <Button>Go</Button>;",
        ),
    ]);
    let document = session.document();
    let button = document.find(&|node| node.tag() == Some("button")).unwrap();
    assert_eq!(button.attr("class"), Some("real"));
}

#[test]
fn test_default_export_repair() {
    let mut session = session(&[
        ("src/components/Only.tsx", "export const Only = () => null;"),
        (
            "src/components/Navbar.tsx",
            "export const links = [];\nexport function NavBar() { return null; }\nexport const Extra = 1;",
        ),
        ("src/components/Many.tsx", "export const First = 1;\nexport const Second = 2;"),
        ("src/components/Explicit.tsx", "export const Named = 1;\nexport default 'explicit';"),
    ]);
    let ev = session.evaluator();

    let only = require(ev, "src/App.tsx", "./components/Only");
    assert!(member(&only, "default").strict_equals(&member(&only, "Only")));

    let navbar = require(ev, "src/App.tsx", "./components/Navbar");
    assert!(member(&navbar, "default").strict_equals(&member(&navbar, "NavBar")));

    let many = require(ev, "src/App.tsx", "./components/Many");
    assert_eq!(member(&many, "default").to_js_string(), "1");

    let explicit = require(ev, "src/App.tsx", "./components/Explicit");
    assert_eq!(member(&explicit, "default").to_js_string(), "explicit");
}

#[test]
fn test_throwing_module_gets_placeholder_exports() {
    let session = preview(&[
        (
            "src/components/Chart.tsx",
            "const config = undefined;\nconst size = config.size;\nexport default function Chart() { return <canvas />; }",
        ),
        (
            "src/App.tsx",
            "import Chart from './components/Chart';\nexport default function App() { return <section><Chart /></section>; }",
        ),
    ]);

    assert!(session.is_mounted());
    let diagnostics = session.diagnostics();
    let failure = diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::Evaluation)
        .unwrap();
    assert_eq!(failure.path.as_deref(), Some("src/components/Chart.tsx"));
    assert!(failure.message.starts_with("TypeError"));

    let document = session.document();
    let placeholder = document
        .find(&|node| node.attr("data-failed-module") == Some("src/components/Chart.tsx"))
        .unwrap();
    assert!(placeholder.text_content().contains("Chart could not be loaded"));
}

#[test]
fn test_non_code_imports() {
    let mut session = session(&[
        ("src/data/plans.json", r#"{"free": {"price": 0}, "pro": {"price": 12}}"#),
        ("src/index.css", "body { margin: 0; }"),
        ("src/assets/logo.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"),
        ("src/broken.json", "{ nope"),
    ]);
    let ev = session.evaluator();

    let plans = require(ev, "src/App.tsx", "./data/plans.json");
    let pro = member(&plans, "pro");
    assert_eq!(member(&pro, "price").to_js_string(), "12");
    let default = member(&plans, "default");
    assert!(member(&default, "free").as_object().is_some());

    let css = require(ev, "src/App.tsx", "./index.css");
    assert!(css.as_object().map_or(false, |object| object.borrow().is_empty()));

    let logo = require(ev, "src/App.tsx", "./assets/logo.svg");
    assert!(member(&logo, "default")
        .to_js_string()
        .starts_with("data:image/svg+xml;base64,"));

    let broken = require(ev, "src/App.tsx", "./broken.json");
    assert!(matches!(member(&broken, "default"), Value::Null));
    assert!(session
        .diagnostics()
        .iter()
        .any(|d| d.path.as_deref() == Some("src/broken.json")));
}

#[test]
fn test_external_stylesheets_are_ignored() {
    let mut session = session(&[("src/App.tsx", "")]);
    let ev = session.evaluator();
    let css = require(ev, "src/App.tsx", "some-lib/dist/styles.css");
    assert!(css.as_object().is_some());
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_dynamic_import_settles_immediately() {
    let session = preview(&[
        ("src/lazy.ts", "export const message = 'loaded lazily';"),
        (
            "src/App.tsx",
            r#"
import { useEffect, useState } from "react";
export default function App() {
  const [text, setText] = useState("waiting");
  useEffect(() => { import("./lazy").then((mod) => setText(mod.message)); }, []);
  return <p>{text}</p>;
}
"#,
        ),
    ]);
    assert!(text_of(&session).contains("loaded lazily"));
}

#[test]
fn test_commonjs_module_exports() {
    let mut session = session(&[(
        "src/legacy.js",
        "function helper() { return 'legacy'; }\nmodule.exports = { helper };",
    )]);
    let exports = require(session.evaluator(), "src/App.tsx", "./legacy");
    assert!(member(&exports, "helper").is_callable());
}
