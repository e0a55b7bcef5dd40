/// Expression semantics observed through rendered output
use crate::tests_session::{preview, text_of};

/// Text rendered by an `App` whose body is `body`
fn render(body: &str) -> String {
    let source = format!("export default function App() {{\n{}\n}}\n", body);
    let session = preview(&[("src/App.tsx", source.as_str())]);
    assert!(session.failure().is_none(), "{:?}", session.failure());
    text_of(&session)
}

#[test]
fn test_comparisons_and_conditional() {
    let text = render(
        r#"
const count = 5;
return <p>{count < 10 ? "small" : "large"} {count >= 5 ? "ge" : "lt"} {count === "5" ? "strict" : "typed"}</p>;
"#,
    );
    assert_eq!(text, "small ge typed");
}

#[test]
fn test_logical_operators_short_circuit() {
    let text = render(
        r#"
let calls = 0;
const bump = () => { calls += 1; return true; };
const a = false && bump();
const b = true || bump();
const c = null ?? "fallback";
const d = 0 || "zero";
const e = 0 ?? "kept";
return <p>{String(a)}|{String(b)}|{c}|{d}|{e}|{calls}</p>;
"#,
    );
    assert_eq!(text, "false|true|fallback|zero|0|0");
}

#[test]
fn test_boolean_and_nullish_children_render_nothing() {
    let text = render(
        r#"
const show = false;
return <div>{show && <b>hidden</b>}{null}{undefined}{true}<i>visible</i></div>;
"#,
    );
    assert_eq!(text, "visible");
}

#[test]
fn test_template_literals() {
    let text = render(
        r#"
const name = "Ada";
const items = [1, 2, 3];
return <p>{`Hello, ${name}! You have ${items.length * 2} items.`}</p>;
"#,
    );
    assert_eq!(text, "Hello, Ada! You have 6 items.");
}

#[test]
fn test_operator_precedence() {
    let text = render("return <p>{2 + 3 * 4}-{(2 + 3) * 4}-{2 ** 3 ** 2}-{10 % 4}</p>;");
    assert_eq!(text, "14-20-512-2");
}

#[test]
fn test_string_and_number_methods() {
    let text = render(
        r#"
const word = "hello";
return <p>{word.toUpperCase().padStart(7, "*")} {(3.14159).toFixed(2)} {"a-b-c".split("-").join("+")}</p>;
"#,
    );
    assert_eq!(text, "**HELLO 3.14 a+b+c");
}

#[test]
fn test_array_pipeline() {
    let text = render(
        r#"
const products = [
  { name: "Lamp", price: 30, inStock: true },
  { name: "Desk", price: 120, inStock: false },
  { name: "Chair", price: 80, inStock: true },
];
const total = products.filter((p) => p.inStock).reduce((sum, p) => sum + p.price, 0);
const names = [...products].sort((a, b) => a.price - b.price).map((p) => p.name);
return <p>{total}:{names.join(",")}</p>;
"#,
    );
    assert_eq!(text, "110:Lamp,Chair,Desk");
}

#[test]
fn test_list_rendering_with_keys() {
    let source = r#"
const todos = [{ id: "a", title: "Write" }, { id: "b", title: "Test" }];
return <ul>{todos.map((todo) => <li key={todo.id}>{todo.title}</li>)}</ul>;
"#;
    let text = render(source);
    assert_eq!(text, "WriteTest");
}

#[test]
fn test_destructuring_defaults_and_spread() {
    let text = render(
        r#"
function Badge({ label, tone = "neutral", ...rest }) {
  return <span data-tone={tone} {...rest}>{label}</span>;
}
const { a, b: { c } = { c: 3 }, ...others } = { a: 1, d: 4, e: 5 };
const [first, , third = "z"] = ["x", "y"];
return <div><Badge label="new" title="t" />{a}{c}{Object.keys(others).join("")}{first}{third}</div>;
"#,
    );
    assert_eq!(text, "new13dexz");
}

#[test]
fn test_optional_chaining() {
    let text = render(
        r#"
const user = { profile: null, tags: ["x"] };
const noop = undefined;
return <p>{user.profile?.name ?? "anon"} {user.tags?.[0]} {String(noop?.())}</p>;
"#,
    );
    assert_eq!(text, "anon x undefined");
}

#[test]
fn test_closures_and_loops() {
    let text = render(
        r#"
const makeCounter = () => { let n = 0; return () => ++n; };
const next = makeCounter();
next(); next();
let out = "";
for (let i = 0; i < 3; i++) { if (i === 1) continue; out += i; }
for (const key in { x: 1, y: 2 }) out += key;
for (const value of [7, 8]) out += value;
let j = 0;
while (j < 10) { j += 4; }
return <p>{next()}:{out}:{j}</p>;
"#,
    );
    assert_eq!(text, "3:02xy78:12");
}

#[test]
fn test_switch_statement() {
    let text = render(
        r#"
const label = (status) => {
  switch (status) {
    case "active":
      return "On";
    case "paused":
    case "stopped":
      return "Off";
    default:
      return "?";
  }
};
return <p>{label("active")}{label("stopped")}{label("other")}</p>;
"#,
    );
    assert_eq!(text, "OnOff?");
}

#[test]
fn test_try_catch_observes_thrown_errors() {
    let text = render(
        r#"
let caught = "";
try {
  throw new Error("boom");
} catch (e) {
  caught = e.message;
} finally {
  caught += "!";
}
let typeError = "";
try {
  const missing = undefined;
  missing.field;
} catch (err) {
  typeError = err.name;
}
return <p>{caught} {typeError}</p>;
"#,
    );
    assert_eq!(text, "boom! TypeError");
}

#[test]
fn test_oversized_lengths_throw_range_errors() {
    let text = render(
        r#"
const attempt = (make) => {
  try {
    make();
    return "ok";
  } catch (e) {
    return e.name + ": " + e.message;
  }
};
const results = [
  attempt(() => new Array(1e12)),
  attempt(() => new Array(-1)),
  attempt(() => Array.from({ length: 1e12 })),
  attempt(() => { const list = [1]; list.length = 2.5; }),
  attempt(() => "ab".repeat(1e12)),
  attempt(() => "7".padStart(1e12, "0")),
  String(new Array(3).length),
];
return <p>{results.join("|")}</p>;
"#,
    );
    assert_eq!(
        text,
        "RangeError: Invalid array length|RangeError: Invalid array length|\
         RangeError: Invalid array length|RangeError: Invalid array length|\
         RangeError: Invalid string length|RangeError: Invalid string length|3"
    );
}

#[test]
fn test_dense_array_cap() {
    let text = render(
        r#"
let message = "";
try {
  new Array(4194304);
} catch (e) {
  message = e.message;
}
return <p>{message}</p>;
"#,
    );
    assert!(text.contains("4194304 exceeds the preview limit"));
}

#[test]
fn test_typeof_and_unknown_modules() {
    let source = r#"
import Chart from "some-chart-lib";
export default function App() {
  return <p>{typeof Chart} {typeof 1} {typeof "s"} {typeof undefined} {`${Chart.Axis.Label}`}</p>;
}
"#;
    let session = preview(&[("src/App.tsx", source)]);
    assert_eq!(
        text_of(&session),
        "function number string undefined [Mock:some-chart-lib.Axis.Label]"
    );
}

#[test]
fn test_json_round_trip() {
    let text = render(
        r#"
const data = JSON.parse('{"b":1,"a":[true,null]}');
return <p>{JSON.stringify(data)}</p>;
"#,
    );
    assert_eq!(text, r#"{"b":1,"a":[true,null]}"#);
}

#[test]
fn test_math_random_is_deterministic_per_session() {
    let body = "return <p>{Math.random()}</p>;";
    let first = render(body);
    let second = render(body);
    assert_eq!(first, second);
    let value: f64 = first.parse().unwrap();
    assert!((0.0..1.0).contains(&value));
}
