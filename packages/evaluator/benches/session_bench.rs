use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glimpse_common::{PreviewConfig, VirtualFileStore};
use glimpse_evaluator::PreviewSession;

fn store(files: &[(&str, &str)]) -> VirtualFileStore {
    VirtualFileStore::new(files.iter().copied())
}

fn boot_single_component(c: &mut Criterion) {
    let files = store(&[(
        "src/App.tsx",
        r#"
export default function App() {
  return (
    <div className="card">
      <h1>Hello</h1>
      <p>Single component preview</p>
    </div>
  );
}
"#,
    )]);

    c.bench_function("boot_single_component", |b| {
        b.iter(|| {
            let mut session = PreviewSession::new(black_box(files.clone()), PreviewConfig::default());
            session.boot_now()
        })
    });
}

fn boot_multi_module_app(c: &mut Criterion) {
    let files = store(&[
        (
            "src/main.tsx",
            "import { createRoot } from 'react-dom/client';\nimport App from './App';\ncreateRoot(document.getElementById('root')).render(<App />);",
        ),
        (
            "src/components/Row.tsx",
            "export const Row = ({ label, value }) => <tr><td>{label}</td><td>{value.toFixed(2)}</td></tr>;",
        ),
        (
            "src/lib/data.ts",
            "export const rows = Array.from({ length: 200 }, (_, i) => ({ label: `Item ${i}`, value: i * 1.5 }));",
        ),
        (
            "src/App.tsx",
            r#"
import { useMemo, useState } from "react";
import { Row } from "./components/Row";
import { rows } from "./lib/data";

export default function App() {
  const [query] = useState("1");
  const visible = useMemo(() => rows.filter((row) => row.label.includes(query)), [query]);
  return (
    <table>
      <tbody>{visible.map((row) => <Row key={row.label} {...row} />)}</tbody>
    </table>
  );
}
"#,
        ),
    ]);

    c.bench_function("boot_multi_module_app", |b| {
        b.iter(|| {
            let mut session = PreviewSession::new(black_box(files.clone()), PreviewConfig::default());
            session.boot_now()
        })
    });
}

fn click_rerender(c: &mut Criterion) {
    let files = store(&[(
        "src/App.tsx",
        r#"
import { useState } from "react";
export default function App() {
  const [count, setCount] = useState(0);
  return <button onClick={() => setCount(count + 1)}>Clicked {count}</button>;
}
"#,
    )]);
    let mut session = PreviewSession::new(files, PreviewConfig::default());
    let _ = session.boot_now();

    c.bench_function("click_rerender", |b| {
        b.iter(|| {
            if let Some(button) = session.find_by_text("Clicked") {
                session.click(button);
            }
            session.take_messages()
        })
    });
}

criterion_group!(benches, boot_single_component, boot_multi_module_app, click_rerender);
criterion_main!(benches);
