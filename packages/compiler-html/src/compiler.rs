use glimpse_evaluator::{PreviewSession, VNode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// In-page half of the host channel
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Errors that can occur during HTML compilation
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Invalid tag name: {0:?}")]
    InvalidTagName(String),

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Options for document compilation
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub title: String,
    /// Break element-only children onto indented lines
    pub pretty: bool,
    /// Indentation string
    pub indent: String,
    /// Embed the virtual file map as `__glimpse_files__`
    pub embed_files: bool,
    /// Include the bridge script
    pub bridge: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            title: "Glimpse Preview".to_string(),
            pretty: true,
            indent: "  ".to_string(),
            embed_files: true,
            bridge: true,
        }
    }
}

/// Settings handed to the bridge script
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeConfig<'a> {
    mount_id: &'a str,
    text_snippet_len: usize,
}

struct Context<'a> {
    options: &'a DocumentOptions,
    depth: usize,
    buffer: String,
}

impl<'a> Context<'a> {
    fn new(options: &'a DocumentOptions) -> Self {
        Self {
            options,
            depth: 0,
            buffer: String::new(),
        }
    }

    fn add(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn add_line(&mut self, text: &str) {
        if self.options.pretty {
            self.add_indent();
        }
        self.add(text);
        if self.options.pretty {
            self.add("\n");
        }
    }

    fn add_indent(&mut self) {
        for _ in 0..self.depth {
            self.buffer.push_str(&self.options.indent);
        }
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
    }

    fn get_output(self) -> String {
        self.buffer
    }
}

/// Compile the session's current page into one self-contained HTML document
#[instrument(skip_all, fields(title = %options.title))]
pub fn compile_document(session: &PreviewSession, options: &DocumentOptions) -> Result<String, CompileError> {
    let config = &session.context().config;
    let document = session.document();
    let mut ctx = Context::new(options);

    ctx.add_line("<!DOCTYPE html>");
    ctx.add_line("<html lang=\"en\">");
    ctx.indent();

    ctx.add_line("<head>");
    ctx.indent();
    ctx.add_line("<meta charset=\"UTF-8\">");
    ctx.add_line("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">");
    ctx.add_line(&format!("<title>{}</title>", escape_text(&options.title)));
    if !document.stylesheet.is_empty() {
        ctx.add_line("<style>");
        ctx.add(&escape_raw_text(&document.stylesheet, "style"));
        if options.pretty {
            ctx.add("\n");
        }
        ctx.add_line("</style>");
    }
    ctx.dedent();
    ctx.add_line("</head>");

    ctx.add_line("<body>");
    ctx.indent();
    for node in &document.nodes {
        compile_node(node, true, &mut ctx)?;
    }

    if options.embed_files {
        let files = to_json(&session.context().store.to_map(), "file map")?;
        ctx.add_line(&format!(
            "<script type=\"application/json\" id=\"__glimpse_files__\">{}</script>",
            escape_raw_text(&files, "script")
        ));
    }
    if options.bridge {
        let bridge = to_json(
            &BridgeConfig {
                mount_id: &config.mount_id,
                text_snippet_len: config.text_snippet_len,
            },
            "bridge config",
        )?;
        ctx.add_line(&format!(
            "<script type=\"application/json\" id=\"__glimpse_bridge__\">{}</script>",
            escape_raw_text(&bridge, "script")
        ));
        ctx.add_line("<script>");
        ctx.add(BRIDGE_SCRIPT);
        ctx.add_line("</script>");
    }

    ctx.dedent();
    ctx.add_line("</body>");
    ctx.dedent();
    ctx.add_line("</html>");

    let html = ctx.get_output();
    debug!(bytes = html.len(), mounted = session.is_mounted(), "document compiled");
    Ok(html)
}

/// Serialize rendered nodes as markup, without any document wrapper
pub fn compile_vnodes(nodes: &[VNode]) -> Result<String, CompileError> {
    let options = DocumentOptions {
        pretty: false,
        ..DocumentOptions::default()
    };
    let mut ctx = Context::new(&options);
    for node in nodes {
        compile_node(node, false, &mut ctx)?;
    }
    Ok(ctx.get_output())
}

fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<String, CompileError> {
    serde_json::to_string(value).map_err(|source| CompileError::Serialize { what, source })
}

/// `own_line` nodes are indented and followed by a newline when pretty printing
fn compile_node(node: &VNode, own_line: bool, ctx: &mut Context) -> Result<(), CompileError> {
    let own_line = own_line && ctx.options.pretty;
    if own_line {
        ctx.add_indent();
    }
    match node {
        VNode::Element {
            tag,
            attributes,
            children,
            ..
        } => compile_element(tag, attributes, children, ctx)?,
        VNode::Text { content } => ctx.add(&escape_text(content)),
        VNode::Raw { html } => ctx.add(html),
        VNode::Comment { content } => ctx.add(&format!("<!--{}-->", content.replace("--", "- -"))),
    }
    if own_line {
        ctx.add("\n");
    }
    Ok(())
}

fn compile_element(
    tag: &str,
    attributes: &[(String, String)],
    children: &[VNode],
    ctx: &mut Context,
) -> Result<(), CompileError> {
    if !is_valid_name(tag) {
        return Err(CompileError::InvalidTagName(tag.to_string()));
    }

    ctx.add(&format!("<{}", tag));
    for (name, value) in attributes {
        if !is_valid_name(name) {
            warn!(tag, attribute = %name, "dropping attribute with invalid name");
            continue;
        }
        ctx.add(" ");
        ctx.add(name);
        if value.is_empty() && is_boolean_attribute(name) {
            continue;
        }
        ctx.add("=\"");
        ctx.add(&escape_attribute(value));
        ctx.add("\"");
    }
    ctx.add(">");

    if is_void_element(tag) {
        return Ok(());
    }

    if is_raw_text_element(tag) {
        for child in children {
            match child {
                VNode::Text { content } | VNode::Raw { html: content } => {
                    ctx.add(&escape_raw_text(content, tag))
                }
                _ => compile_node(child, false, ctx)?,
            }
        }
    } else if ctx.options.pretty && !children.is_empty() && children.iter().all(is_element) {
        ctx.add("\n");
        ctx.indent();
        for child in children {
            compile_node(child, true, ctx)?;
        }
        ctx.dedent();
        ctx.add_indent();
    } else {
        for child in children {
            compile_node(child, false, ctx)?;
        }
    }

    ctx.add(&format!("</{}>", tag));
    Ok(())
}

fn is_element(node: &VNode) -> bool {
    matches!(node, VNode::Element { .. } | VNode::Comment { .. })
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '\'' | '>' | '/' | '=' | '<'))
}

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn escape_attribute(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keep `</tag` from closing a raw text element early
fn escape_raw_text(text: &str, tag: &str) -> String {
    let closing = format!("</{}", tag);
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = find_ignore_case(rest, &closing) {
        out.push_str(&rest[..at]);
        out.push_str("<\\/");
        out.push_str(&rest[at + 2..at + closing.len()]);
        rest = &rest[at + closing.len()..];
    }
    out.push_str(rest);
    out
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "img"
            | "input"
            | "br"
            | "hr"
            | "meta"
            | "link"
            | "area"
            | "base"
            | "col"
            | "embed"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

fn is_boolean_attribute(name: &str) -> bool {
    matches!(
        name,
        "allowfullscreen"
            | "async"
            | "autofocus"
            | "autoplay"
            | "checked"
            | "controls"
            | "default"
            | "defer"
            | "disabled"
            | "formnovalidate"
            | "hidden"
            | "inert"
            | "ismap"
            | "itemscope"
            | "loop"
            | "multiple"
            | "muted"
            | "nomodule"
            | "novalidate"
            | "open"
            | "playsinline"
            | "readonly"
            | "required"
            | "reversed"
            | "selected"
    )
}
