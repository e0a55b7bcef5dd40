/// Rendering of the mounted tree into virtual DOM nodes
use crate::tests_session::{preview, text_of};
use crate::vdom::VNode;
use crate::PreviewSession;

const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn app(source: &str) -> PreviewSession {
    preview(&[("src/App.tsx", source)])
}

fn first(session: &PreviewSession, tag: &str) -> VNode {
    session
        .document()
        .find(&|node| node.tag() == Some(tag))
        .cloned()
        .unwrap_or_else(|| panic!("no <{}> rendered", tag))
}

#[test]
fn test_host_attributes() {
    let session = app(
        r#"
export default function App() {
  return (
    <form>
      <label htmlFor="email" className="field">Email</label>
      <input id="email" type="email" disabled={true} readOnly={false} defaultValue="a@b.c" aria-invalid={false} tabIndex={2} />
      <div data-state="open" hidden={false} title={null}>x</div>
    </form>
  );
}
"#,
    );

    let label = first(&session, "label");
    assert_eq!(label.attr("for"), Some("email"));
    assert_eq!(label.attr("class"), Some("field"));

    let input = first(&session, "input");
    assert_eq!(input.attr("disabled"), Some(""));
    assert_eq!(input.attr("readonly"), None);
    assert_eq!(input.attr("value"), Some("a@b.c"));
    assert_eq!(input.attr("aria-invalid"), Some("false"));
    assert_eq!(input.attr("tabindex"), Some("2"));
    assert!(input.children().is_empty());

    let div = first(&session, "div");
    assert_eq!(div.attr("data-state"), Some("open"));
    assert_eq!(div.attr("hidden"), None);
    assert_eq!(div.attr("title"), None);
}

#[test]
fn test_inline_styles() {
    let session = app(
        r#"
export default function App() {
  return <div style={{ marginTop: 8, opacity: 0.5, zIndex: 3, backgroundColor: "red", padding: 0, "--gap": 4 }}>s</div>;
}
"#,
    );
    assert_eq!(
        first(&session, "div").attr("style"),
        Some("margin-top:8px;opacity:0.5;z-index:3;background-color:red;padding:0;--gap:4")
    );
}

#[test]
fn test_svg_attribute_names() {
    let session = app(
        r#"
export default function App() {
  return (
    <svg viewBox="0 0 10 10" className="chart">
      <path strokeWidth={2} strokeLinecap="round" d="M0 0L10 10" fillOpacity="0.4" />
    </svg>
  );
}
"#,
    );
    let svg = first(&session, "svg");
    assert_eq!(svg.attr("viewBox"), Some("0 0 10 10"));
    assert_eq!(svg.attr("class"), Some("chart"));
    let path = first(&session, "path");
    assert_eq!(path.attr("stroke-width"), Some("2"));
    assert_eq!(path.attr("stroke-linecap"), Some("round"));
    assert_eq!(path.attr("fill-opacity"), Some("0.4"));
}

#[test]
fn test_registered_image_paths_become_data_uris() {
    let session = preview(&[
        ("public/logo.png", PNG_BASE64),
        (
            "src/App.tsx",
            r#"
export default function App() {
  return (
    <header style={{ backgroundImage: "url(/logo.png)" }}>
      <img src="/logo.png" alt="logo" />
      <img src="./public/logo.png?v=2" alt="again" />
      <img src="https://cdn.example.com/missing.png" alt="remote" />
      <a href="/logo.png">download</a>
    </header>
  );
}
"#,
        ),
    ]);

    let uri = format!("data:image/png;base64,{}", PNG_BASE64);
    let document = session.document();
    let images: Vec<&VNode> = ["logo", "again", "remote"]
        .iter()
        .filter_map(|alt| document.find(&|node| node.attr("alt") == Some(*alt)))
        .collect();
    assert_eq!(images[0].attr("src"), Some(uri.as_str()));
    assert_eq!(images[1].attr("src"), Some(uri.as_str()));
    assert_eq!(images[2].attr("src"), Some("https://cdn.example.com/missing.png"));
    assert_eq!(first(&session, "a").attr("href"), Some("/logo.png"));
    let style = first(&session, "header").attr("style").unwrap_or_default().to_string();
    assert_eq!(style, format!("background-image:url({})", uri));
}

#[test]
fn test_fragments_keys_and_nested_arrays() {
    let session = app(
        r#"
import { Fragment } from "react";
const rows = [["a", "b"], ["c"]];
export default function App() {
  return (
    <>
      {rows.map((row, i) => (
        <Fragment key={i}>
          {row.map((cell) => <span key={cell}>{cell}</span>)}
        </Fragment>
      ))}
      <>{[1, [2, [3]]]}</>
    </>
  );
}
"#,
    );
    assert_eq!(text_of(&session), "abc123");
    let container = &session.document().nodes[0];
    assert_eq!(container.children().len(), 6);
}

#[test]
fn test_context_provider_and_consumer() {
    let session = app(
        r#"
import { createContext, useContext } from "react";
const Theme = createContext("light");
function Label() {
  const theme = useContext(Theme);
  return <span>{theme}</span>;
}
export default function App() {
  return (
    <div>
      <Label />
      <Theme.Provider value="dark">
        <Label />
        <Theme.Consumer>{(value) => <b>{value.toUpperCase()}</b>}</Theme.Consumer>
      </Theme.Provider>
    </div>
  );
}
"#,
    );
    assert_eq!(text_of(&session), "lightdarkDARK");
}

#[test]
fn test_memo_forward_ref_and_refs() {
    let session = app(
        r#"
import { forwardRef, memo, useRef, useEffect, useState } from "react";
const Field = forwardRef((props, ref) => <input ref={ref} id="field" {...props} />);
const Title = memo(({ text }) => <h2>{text}</h2>);
export default function App() {
  const ref = useRef(null);
  const [tag, setTag] = useState("none");
  useEffect(() => { setTag(ref.current ? ref.current.tagName : "missing"); }, []);
  return <div><Title text="Memo" /><Field ref={ref} placeholder="type" /><p>{tag}</p></div>;
}
"#,
    );
    assert!(session.failure().is_none(), "{:?}", session.failure());
    assert_eq!(first(&session, "input").attr("placeholder"), Some("type"));
    assert!(text_of(&session).contains("Memo"));
    assert!(text_of(&session).contains("INPUT"));
}

#[test]
fn test_dangerously_set_inner_html() {
    let session = app(
        r#"export default () => <div dangerouslySetInnerHTML={{ __html: "<b>raw</b>" }} />;"#,
    );
    let div = first(&session, "div");
    assert_eq!(div.children(), &[VNode::raw("<b>raw</b>")]);
}

#[test]
fn test_objects_are_not_valid_children() {
    let session = app(r#"export default () => <p>{{ a: 1 }}</p>;"#);
    let text = text_of(&session);
    assert!(text.contains("Objects are not valid as a React child"));
}

#[test]
fn test_invalid_element_type() {
    let session = preview(&[
        ("src/icons.ts", "export const Present = () => null;"),
        (
            "src/App.tsx",
            "import * as Icons from './icons';\nexport default () => <div><Icons.Missing /></div>;",
        ),
    ]);
    let text = text_of(&session);
    assert!(text.contains("Element type is invalid"));
    assert!(text.contains("got: undefined"));
}

#[test]
fn test_icons_render_svg() {
    let session = app(
        r#"
import { Search, ArrowRight as Next } from "lucide-react";
export default () => <nav><Search size={16} className="muted" /><Next /></nav>;
"#,
    );
    let document = session.document();
    let search = document
        .find(&|node| node.attr("class") == Some("lucide lucide-search muted"))
        .unwrap();
    assert_eq!(search.tag(), Some("svg"));
    assert_eq!(search.attr("width"), Some("16"));
    assert_eq!(search.attr("stroke-width"), Some("2"));
    assert!(document
        .find(&|node| node.attr("class") == Some("lucide lucide-arrow-right"))
        .is_some());
}

#[test]
fn test_motion_components_render_settled_state() {
    let session = app(
        r#"
import { motion, AnimatePresence } from "framer-motion";
export default () => (
  <AnimatePresence>
    <motion.div initial={{ opacity: 0 }} animate={{ opacity: 1, x: 10 }} transition={{ duration: 1 }} className="card">
      moving
    </motion.div>
  </AnimatePresence>
);
"#,
    );
    let div = first(&session, "div");
    assert_eq!(div.attr("class"), Some("card"));
    assert_eq!(div.attr("style"), Some("opacity:1"));
    assert_eq!(div.attr("initial"), None);
    assert_eq!(div.attr("transition"), None);
}

#[test]
fn test_class_utilities() {
    let session = app(
        r#"
import { cn } from "@/lib/utils";
import { cva } from "class-variance-authority";
const button = cva("btn", {
  variants: { size: { sm: "px-2", lg: "px-6" } },
  defaultVariants: { size: "sm" },
});
export default () => (
  <div className={cn("p-2", false && "hidden", { active: true }, "p-4")}>
    <button className={button({ size: "lg" })}>go</button>
    <button className={button()}>stop</button>
  </div>
);
"#,
    );
    assert_eq!(first(&session, "div").attr("class"), Some("active p-4"));
    let document = session.document();
    assert!(document.find(&|node| node.attr("class") == Some("btn px-6")).is_some());
    assert!(document.find(&|node| node.attr("class") == Some("btn px-2")).is_some());
}
