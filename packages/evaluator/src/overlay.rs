//! Diagnostic overlay: the panel that replaces the mount container's content
//! when bootstrap or render fails.

use crate::evaluator::EvalError;
use crate::vdom::VNode;

const PANEL_STYLE: &str = "position:fixed;inset:0;z-index:2147483647;overflow:auto;\
padding:24px;background:#1a1a1a;color:#f5f5f5;font-family:ui-monospace,Menlo,monospace;font-size:13px";
const TITLE_STYLE: &str = "margin:0 0 8px;color:#ff6b6b;font-size:16px";
const STATUS_STYLE: &str = "padding:24px;font-family:system-ui,sans-serif;color:#b91c1c";

/// Structured error panel
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPanel {
    pub title: String,
    pub message: String,
    /// `file:line:column`
    pub location: Option<String>,
    pub stack: Vec<String>,
}

impl OverlayPanel {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            location: None,
            stack: Vec::new(),
        }
    }

    pub fn from_eval_error(error: &EvalError) -> Self {
        Self {
            title: error.name(),
            message: error.message(),
            location: error.location(),
            stack: error.stack.clone(),
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Panel markup showing at most `stack_trace_lines` frames
    pub fn to_vnode(&self, stack_trace_lines: usize) -> VNode {
        let mut panel = VNode::element("div")
            .with_attr("id", "glimpse-error-overlay")
            .with_attr("role", "alert")
            .with_attr("style", PANEL_STYLE)
            .with_child(
                VNode::element("h2")
                    .with_attr("style", TITLE_STYLE)
                    .with_child(VNode::text(&self.title)),
            )
            .with_child(
                VNode::element("pre")
                    .with_attr("class", "glimpse-error-message")
                    .with_attr("style", "white-space:pre-wrap;margin:0 0 12px")
                    .with_child(VNode::text(&self.message)),
            );

        if let Some(location) = &self.location {
            panel = panel.with_child(
                VNode::element("div")
                    .with_attr("class", "glimpse-error-location")
                    .with_attr("style", "color:#9ca3af;margin-bottom:12px")
                    .with_child(VNode::text(location)),
            );
        }

        let frames: Vec<VNode> = self
            .stack
            .iter()
            .take(stack_trace_lines)
            .map(|frame| VNode::element("li").with_child(VNode::text(frame)))
            .collect();
        if !frames.is_empty() {
            panel = panel.with_child(
                VNode::element("ol")
                    .with_attr("class", "glimpse-error-stack")
                    .with_attr("style", "margin:0;padding-left:20px;color:#d1d5db")
                    .with_children(frames),
            );
        }
        panel
    }
}

/// Plain status line shown in the mount container
pub fn status_vnode(message: &str) -> VNode {
    VNode::element("div")
        .with_attr("class", "glimpse-status")
        .with_attr("style", STATUS_STYLE)
        .with_child(VNode::text(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_is_truncated() {
        let mut error = EvalError::type_error("x is not a function");
        error.path = Some("src/App.tsx".to_string());
        error.loc = Some((12, 5));
        error.stack = (0..8).map(|i| format!("at frame{} (src/App.tsx:{}:1)", i, i + 1)).collect();

        let panel = OverlayPanel::from_eval_error(&error);
        assert_eq!(panel.title, "TypeError");
        assert_eq!(panel.location.as_deref(), Some("src/App.tsx:12:5"));

        let node = panel.to_vnode(3);
        let stack = node
            .find(&|n| n.attr("class") == Some("glimpse-error-stack"))
            .unwrap();
        assert_eq!(stack.children().len(), 3);
        assert!(node.text_content().contains("x is not a function"));
        assert_eq!(stack.children()[0].text_content(), "at frame0 (src/App.tsx:1:1)");
        assert!(!node.text_content().contains("at at"));
        assert!(!node.text_content().contains("frame3"));
    }

    #[test]
    fn test_panel_without_location() {
        let node = OverlayPanel::new("Bootstrap failed", "No entry").to_vnode(5);
        assert!(node
            .find(&|n| n.attr("class") == Some("glimpse-error-location"))
            .is_none());
        assert_eq!(status_vnode("Failed to load libraries").text_content(), "Failed to load libraries");
    }
}
