use crate::{compile_document, compile_vnodes, CompileError, DocumentOptions, BRIDGE_SCRIPT};
use glimpse_common::{PreviewConfig, VirtualFileStore};
use glimpse_evaluator::{PreviewSession, VNode};

fn session(files: &[(&str, &str)]) -> PreviewSession {
    let mut session = PreviewSession::new(VirtualFileStore::new(files.iter().copied()), PreviewConfig::default());
    let _ = session.boot_now();
    session
}

#[test]
fn test_escapes_text_and_attributes() {
    let node = VNode::element("p")
        .with_attr("title", "say \"hi\" & <wave>")
        .with_child(VNode::text("1 < 2 && 3 > 2"));
    let html = compile_vnodes(&[node]).unwrap();
    assert_eq!(
        html,
        "<p title=\"say &quot;hi&quot; &amp; &lt;wave&gt;\">1 &lt; 2 &amp;&amp; 3 &gt; 2</p>"
    );
}

#[test]
fn test_void_and_boolean_attributes() {
    let nodes = vec![
        VNode::element("input")
            .with_attr("type", "checkbox")
            .with_attr("checked", "")
            .with_attr("data-empty", ""),
        VNode::element("br"),
        VNode::element("div"),
    ];
    let html = compile_vnodes(&nodes).unwrap();
    assert_eq!(html, "<input type=\"checkbox\" checked data-empty=\"\"><br><div></div>");
}

#[test]
fn test_raw_and_comment_nodes() {
    let node = VNode::element("div")
        .with_child(VNode::raw("<b>trusted</b>"))
        .with_child(VNode::comment("a -- b"));
    let html = compile_vnodes(&[node]).unwrap();
    assert_eq!(html, "<div><b>trusted</b><!--a - - b--></div>");
}

#[test]
fn test_invalid_tag_name() {
    let node = VNode::element("my widget");
    match compile_vnodes(&[node]) {
        Err(CompileError::InvalidTagName(tag)) => assert_eq!(tag, "my widget"),
        other => panic!("expected InvalidTagName, got {:?}", other),
    }
}

#[test]
fn test_invalid_attribute_names_are_dropped() {
    let node = VNode::element("span").with_attr("on click", "x").with_attr("id", "ok");
    assert_eq!(compile_vnodes(&[node]).unwrap(), "<span id=\"ok\"></span>");
}

#[test]
fn test_inline_style_blocks_cannot_close_early() {
    let node = VNode::element("style").with_child(VNode::text("a::after { content: \"</style>\"; }"));
    let html = compile_vnodes(&[node]).unwrap();
    assert_eq!(html, "<style>a::after { content: \"<\\/style>\"; }</style>");
}

#[test]
fn test_document_embeds_page() {
    let session = session(&[
        ("src/index.css", "body { margin: 0; }"),
        (
            "src/App.tsx",
            "import './index.css';\nexport default function App() { return <main><h1>Hello</h1></main>; }",
        ),
    ]);
    let html = compile_document(&session, &DocumentOptions::default()).unwrap();

    println!("Generated HTML:\n{}", html);

    assert!(html.starts_with("<!DOCTYPE html>\n"));
    assert!(html.contains("<title>Glimpse Preview</title>"));
    assert!(html.contains("body { margin: 0; }"));
    assert!(html.contains("<div id=\"root\">"));
    assert!(html.contains(">Hello</h1>"));
    assert!(html.contains("data-source-path=\"src/App.tsx\""));
    assert!(html.contains("<script type=\"application/json\" id=\"__glimpse_files__\">"));
    assert!(html.contains("\"src/App.tsx\":"));
    assert!(html.contains("\"textSnippetLen\":50"));
    assert!(html.contains("inspect-element"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[test]
fn test_document_file_map_cannot_close_script() {
    let session = session(&[(
        "src/App.tsx",
        "export default () => <p>{\"</script><script>alert(1)</script>\"}</p>;",
    )]);
    let html = compile_document(&session, &DocumentOptions::default()).unwrap();
    let files_start = html.find("id=\"__glimpse_files__\">").unwrap();
    let files = &html[files_start..];
    let files_end = files.find("</script>").unwrap();
    assert!(!files[..files_end].contains("alert(1)</script>"));
    assert!(files[..files_end].contains("<\\/script>"));
}

#[test]
fn test_bridge_announces_link_navigation() {
    assert!(BRIDGE_SCRIPT.contains("closest(\"a[href]\")"));
    assert!(BRIDGE_SCRIPT.contains("post({ type: \"navigation\", path: route })"));

    let session = session(&[("src/App.tsx", "export default () => <a href=\"/about\">About</a>;")]);
    let html = compile_document(&session, &DocumentOptions::default()).unwrap();
    assert!(html.contains("<a href=\"/about\""));
    assert!(html.contains("closest(\"a[href]\")"));
}

#[test]
fn test_document_options() {
    let session = session(&[("src/App.tsx", "export default () => <p>plain</p>;")]);
    let options = DocumentOptions {
        title: "Tom & Jerry".to_string(),
        pretty: false,
        embed_files: false,
        bridge: false,
        ..DocumentOptions::default()
    };
    let html = compile_document(&session, &options).unwrap();
    assert!(!html.contains('\n'));
    assert!(html.contains("<title>Tom &amp; Jerry</title>"));
    assert!(!html.contains("__glimpse_files__"));
    assert!(!html.contains("<script"));
}

#[test]
fn test_failed_preview_still_compiles() {
    let session = session(&[("src/lib/math.ts", "export const add = (a, b) => a + b;")]);
    let html = compile_document(&session, &DocumentOptions::default()).unwrap();
    assert!(html.contains("id=\"glimpse-error-overlay\""));
    assert!(html.contains("role=\"alert\""));
}
