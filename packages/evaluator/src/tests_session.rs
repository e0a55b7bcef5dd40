//! Session lifecycle: boot, mount, re-render and interaction
use crate::bootstrap::BootError;
use crate::channel::{HostMessage, InboundMessage};
use crate::session::{DiagnosticKind, PreviewSession};
use glimpse_common::{PreviewConfig, VirtualFileStore};

/// Booted session over `files`
pub(crate) fn preview(files: &[(&str, &str)]) -> PreviewSession {
    let store = VirtualFileStore::new(files.iter().copied());
    let mut session = PreviewSession::new(store, PreviewConfig::default());
    let _ = session.boot_now();
    session
}

pub(crate) fn text_of(session: &PreviewSession) -> String {
    session.document().text_content()
}

#[test]
fn test_main_and_app_scenario() {
    let session = preview(&[
        (
            "src/main.tsx",
            r#"
import React from "react";
import ReactDOM from "react-dom/client";
import App from "./App";
ReactDOM.createRoot(document.getElementById("root")).render(<App />);
"#,
        ),
        ("src/App.tsx", "export default function App() { return <h1>Hello</h1>; }"),
    ]);

    assert!(session.is_mounted());
    assert!(session.failure().is_none());
    assert!(text_of(&session).contains("Hello"));
    let document = session.document();
    assert_eq!(document.nodes[0].attr("id"), Some("root"));
    assert!(document.find(&|node| node.tag() == Some("h1")).is_some());
}

#[test]
fn test_single_component_mounts_without_fallback() {
    let session = preview(&[(
        "src/App.tsx",
        "export default function App() { return <main className=\"page\">Only file</main>; }",
    )]);

    assert!(session.is_mounted());
    assert!(session.diagnostics().is_empty());
    let main = session.document();
    let main = main.find(&|node| node.tag() == Some("main")).unwrap();
    assert_eq!(main.attr("class"), Some("page"));
    assert_eq!(main.attr("data-source-path"), Some("src/App.tsx"));
    assert!(main.attr("data-source-loc").is_some());
}

#[test]
fn test_script_entry_without_mount_uses_default_export() {
    let session = preview(&[(
        "src/index.jsx",
        "export default function Root() { return <p>from default</p>; }",
    )]);
    assert!(text_of(&session).contains("from default"));
}

#[test]
fn test_no_entry_shows_overlay() {
    let session = preview(&[("src/lib/math.ts", "export const add = (a, b) => a + b;")]);

    assert!(!session.is_mounted());
    assert!(matches!(session.failure(), Some(BootError::NoEntry { .. })));
    let document = session.document();
    assert!(document
        .find(&|node| node.attr("id") == Some("glimpse-error-overlay"))
        .is_some());
    assert!(session
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::Bootstrap));
}

#[test]
fn test_default_export_not_invocable() {
    let session = preview(&[("src/App.tsx", "export default 42;")]);
    match session.failure() {
        Some(BootError::NotInvocable { path, found }) => {
            assert_eq!(path, "src/App.tsx");
            assert_eq!(found, "number");
        }
        other => panic!("expected NotInvocable, got {:?}", other),
    }
    assert!(text_of(&session).contains("not a component"));
}

#[test]
fn test_render_error_overlay_has_location_and_stack() {
    let session = preview(&[(
        "src/App.tsx",
        r#"
function Broken() {
  const user = null;
  return <span>{user.name}</span>;
}
export default function App() {
  return <div><Broken /></div>;
}
"#,
    )]);

    assert!(matches!(session.failure(), Some(BootError::Render(_))));
    let document = session.document();
    let overlay = document
        .find(&|node| node.attr("id") == Some("glimpse-error-overlay"))
        .unwrap();
    let text = overlay.text_content();
    assert!(text.contains("TypeError"));
    assert!(text.contains("Cannot read properties of null"));
    assert!(text.contains("src/App.tsx:4"));
}

#[test]
fn test_unbounded_recursion_shows_range_error() {
    let session = preview(&[(
        "src/App.tsx",
        r#"
function climb(n: number): number { return climb(n + 1); }
export default function App() { return <p>{climb(0)}</p>; }
"#,
    )]);

    match session.failure() {
        Some(BootError::Render(err)) => assert_eq!(err.name(), "RangeError"),
        other => panic!("expected a render failure, got {:?}", other),
    }
    let document = session.document();
    let overlay = document
        .find(&|node| node.attr("id") == Some("glimpse-error-overlay"))
        .unwrap();
    let text = overlay.text_content();
    assert!(text.contains("Maximum call stack size exceeded"));
    assert!(text.contains("at climb (src/App.tsx:2:"));
    assert!(!text.contains("at at"));
}

#[test]
fn test_deep_recursion_within_limit() {
    let config = PreviewConfig {
        max_call_depth: 5000,
        ..PreviewConfig::default()
    };
    let store = VirtualFileStore::new(vec![(
        "src/App.tsx",
        r#"
function sum(n: number): number { return n === 0 ? 0 : n + sum(n - 1); }
export default function App() { return <p>{sum(3000)}</p>; }
"#,
    )]);
    let mut session = PreviewSession::new(store, config);
    session.boot_now().unwrap();
    assert!(text_of(&session).contains("4501500"));
}

#[test]
fn test_self_nesting_component_is_bounded() {
    let session = preview(&[(
        "src/App.tsx",
        "function Tree() { return <div><Tree /></div>; }\nexport default function App() { return <Tree />; }",
    )]);

    assert!(matches!(session.failure(), Some(BootError::Render(_))));
    assert!(text_of(&session).contains("nests too deeply"));
}

#[test]
fn test_syntax_error_in_app_is_never_blank() {
    let session = preview(&[
        (
            "src/main.tsx",
            "import { createRoot } from 'react-dom/client';\nimport App from './App';\ncreateRoot(document.getElementById('root')).render(<App />);",
        ),
        ("src/App.tsx", "export default function App() { return <div>; }"),
    ]);

    let diagnostics = session.diagnostics();
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Compile && d.path.as_deref() == Some("src/App.tsx")));
    let document = session.document();
    let container = &document.nodes[0];
    assert!(!container.children().is_empty());
    let mock = document
        .find(&|node| node.attr("class") == Some("glimpse-mock"))
        .unwrap();
    assert_eq!(mock.text_content(), "App");
}

#[test]
fn test_state_updates_rerender_on_click() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { useState } from "react";
export default function App() {
  const [count, setCount] = useState(0);
  return (
    <div>
      <p>Count: {count}</p>
      <button onClick={() => setCount(count + 1)}>Increment</button>
    </div>
  );
}
"#,
    )]);

    assert!(text_of(&session).contains("Count: 0"));
    let button = session.find_by_text("Increment").unwrap();
    assert!(session.click(button));
    let button = session.find_by_text("Increment").unwrap();
    assert!(session.click(button));
    assert!(text_of(&session).contains("Count: 2"));
}

#[test]
fn test_click_posts_inspect_message() {
    let mut session = preview(&[(
        "src/App.tsx",
        "export default function App() {\n  return <section>\n    <button className=\"btn   primary\">Save   changes</button>\n  </section>;\n}\n",
    )]);

    let button = session.find_by_text("Save").unwrap();
    session.click(button);
    let messages = session.take_messages();
    assert_eq!(
        messages,
        vec![HostMessage::InspectElement {
            tag_name: "BUTTON".to_string(),
            class_name: "btn primary".to_string(),
            text_context: "Save changes".to_string(),
            path: Some("src/App.tsx".to_string()),
            loc: Some("3:5".to_string()),
        }]
    );
    assert!(session.take_messages().is_empty());
}

#[test]
fn test_stop_propagation() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { useState } from "react";
export default function App() {
  const [log, setLog] = useState([]);
  return (
    <div onClick={() => setLog((l) => [...l, "outer"])}>
      <button onClick={(e) => { e.stopPropagation(); setLog((l) => [...l, "inner"]); }}>Stop</button>
      <span onClick={() => setLog((l) => [...l, "span"])}>Bubble</span>
      <p>{log.join(",")}</p>
    </div>
  );
}
"#,
    )]);

    let stop = session.find_by_text("Stop").unwrap();
    session.click(stop);
    let bubble = session.find_by_text("Bubble").unwrap();
    session.click(bubble);
    assert!(text_of(&session).contains("inner,span,outer"));
}

#[test]
fn test_form_submit_and_input() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { useState } from "react";
export default function App() {
  const [name, setName] = useState("");
  const [saved, setSaved] = useState("nothing");
  return (
    <form onSubmit={(e) => { e.preventDefault(); setSaved(name); }}>
      <input name="name" value={name} onChange={(e) => setName(e.target.value)} />
      <button type="submit">Save</button>
      <p>Saved: {saved}</p>
    </form>
  );
}
"#,
    )]);

    let input = session
        .find(&|node| node.tag() == Some("input"))
        .unwrap();
    assert!(session.input(input, "Ada"));
    let input = session.document();
    let input = input.find(&|node| node.tag() == Some("input")).unwrap();
    assert_eq!(input.attr("value"), Some("Ada"));

    let button = session.find_by_text("Save").unwrap();
    session.click(button);
    assert!(text_of(&session).contains("Saved: Ada"));
}

#[test]
fn test_effects_run_after_render() {
    let session = preview(&[(
        "src/App.tsx",
        r#"
import { useEffect, useState } from "react";
export default function App() {
  const [ready, setReady] = useState(false);
  useEffect(() => { setReady(true); }, []);
  return <p>{ready ? "ready" : "loading"}</p>;
}
"#,
    )]);

    assert!(text_of(&session).contains("ready"));
    assert!(!text_of(&session).contains("loading"));
    assert!(session.render_passes() >= 2);
}

#[test]
fn test_runaway_state_is_bounded() {
    let session = preview(&[(
        "src/App.tsx",
        r#"
import { useEffect, useState } from "react";
export default function App() {
  const [n, setN] = useState(0);
  useEffect(() => { setN(n + 1); });
  return <p>{n}</p>;
}
"#,
    )]);

    assert!(session.is_mounted());
    assert_eq!(session.render_passes(), PreviewConfig::default().max_render_passes);
    assert!(session
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::Render));
}

#[test]
fn test_inbound_navigation_only_applies_changes() {
    let mut session = preview(&[(
        "src/App.tsx",
        "export default function App() { return <p>{window.location.pathname}</p>; }",
    )]);

    session.receive(InboundMessage::NavigateTo {
        path: "/about".to_string(),
    });
    assert_eq!(session.location().hash, "#/about");
    let passes = session.render_passes();

    session.receive(InboundMessage::NavigateTo {
        path: "about".to_string(),
    });
    assert_eq!(session.render_passes(), passes);
    assert!(session.take_messages().is_empty());
}

#[test]
fn test_sessions_are_isolated() {
    let files = [(
        "src/App.tsx",
        r#"
export default function App() {
  const visits = Number(localStorage.getItem("visits") || "0") + 1;
  localStorage.setItem("visits", String(visits));
  return <p>visits {visits}</p>;
}
"#,
    )];
    let first = preview(&files);
    let second = preview(&files);
    assert!(text_of(&first).contains("visits 1"));
    assert!(text_of(&second).contains("visits 1"));
}

#[tokio::test(start_paused = true)]
async fn test_async_boot() {
    let store = VirtualFileStore::new(vec![(
        "src/App.jsx",
        "export default () => <em>async</em>;",
    )]);
    let mut session = PreviewSession::new(store, PreviewConfig::default());
    session.boot().await.unwrap();
    assert!(text_of(&session).contains("async"));
}

#[test]
fn test_files_compile_on_boot() {
    let store = VirtualFileStore::new(vec![
        ("src/App.tsx", "import { Chart } from './Chart';\nexport default () => <Chart />;"),
        ("src/Chart.tsx", "export const Chart = () => <svg>;"),
    ]);
    let mut session = PreviewSession::new(store, PreviewConfig::default());
    assert_eq!(session.context().bundle.borrow().module_count(), 0);
    assert!(session.diagnostics().is_empty());

    session.boot_now().unwrap();
    assert_eq!(session.context().bundle.borrow().module_count(), 1);
    let compile: Vec<_> = session
        .diagnostics()
        .into_iter()
        .filter(|d| d.kind == DiagnosticKind::Compile)
        .collect();
    assert_eq!(compile.len(), 1);
    assert_eq!(compile[0].path.as_deref(), Some("src/Chart.tsx"));
    assert_eq!(session.compile(), 0);
}
