//! Host communication channel.
//!
//! Messages exchanged with the hosting window, and the session's location,
//! which is the only piece of browser navigation state previewed code sees.

use crate::vdom::{VNode, VirtualDomDocument};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Posted to the hosting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    #[serde(rename_all = "camelCase")]
    InspectElement {
        tag_name: String,
        class_name: String,
        text_context: String,
        path: Option<String>,
        loc: Option<String>,
    },
    Navigation { path: String },
}

/// Received from the hosting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    NavigateTo { path: String },
}

/// Ensure a leading `/`
pub fn normalize_route(route: &str) -> String {
    let route = route.trim();
    if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{}", route)
    }
}

/// `pathname`, `search` and `hash` of the previewed page plus its history
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    /// Set by `HashRouter`: navigation writes the hash instead of the path
    pub hash_routing: bool,
    history: Vec<(String, String, String)>,
}

impl Default for Location {
    fn default() -> Self {
        Self::new()
    }
}

impl Location {
    pub fn new() -> Self {
        Self {
            pathname: "/".to_string(),
            search: String::new(),
            hash: String::new(),
            hash_routing: false,
            history: Vec::new(),
        }
    }

    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }

    /// Route reported to the host: the hash fragment when it holds a route
    pub fn route(&self) -> String {
        let fragment = self.hash.strip_prefix('#').unwrap_or(&self.hash);
        if fragment.starts_with('/') || (self.hash_routing && !fragment.is_empty()) {
            normalize_route(fragment)
        } else {
            normalize_route(&format!("{}{}", self.pathname, self.search))
        }
    }

    /// Route without its query string
    pub fn route_path(&self) -> String {
        let route = self.route();
        match route.find('?') {
            Some(cut) => route[..cut].to_string(),
            None => route,
        }
    }

    /// `?query` of the route, or empty
    pub fn route_search(&self) -> String {
        let route = self.route();
        match route.find('?') {
            Some(cut) => route[cut..].to_string(),
            None => String::new(),
        }
    }

    fn snapshot(&self) -> (String, String, String) {
        (self.pathname.clone(), self.search.clone(), self.hash.clone())
    }

    /// Navigate to `to`; returns whether the location changed
    pub fn navigate(&mut self, to: &str, replace: bool) -> bool {
        let before = self.snapshot();
        if self.hash_routing {
            let target = to.strip_prefix('#').unwrap_or(to);
            self.hash = format!("#{}", normalize_route(target));
        } else if let Some(hash) = to.strip_prefix('#') {
            self.hash = format!("#{}", hash);
        } else {
            let (rest, hash) = match to.find('#') {
                Some(cut) => (&to[..cut], to[cut..].to_string()),
                None => (to, String::new()),
            };
            let (path, search) = match rest.find('?') {
                Some(cut) => (&rest[..cut], rest[cut..].to_string()),
                None => (rest, String::new()),
            };
            self.pathname = if path.is_empty() {
                self.pathname.clone()
            } else {
                normalize_route(path)
            };
            self.search = search;
            self.hash = hash;
        }

        let changed = self.snapshot() != before;
        if changed && !replace {
            self.history.push(before);
        }
        debug!(to, replace, changed, href = %self.href(), "location navigated");
        changed
    }

    /// Return to the previous history entry
    pub fn back(&mut self) -> bool {
        match self.history.pop() {
            Some((pathname, search, hash)) => {
                self.pathname = pathname;
                self.search = search;
                self.hash = hash;
                true
            }
            None => false,
        }
    }

    /// Apply an inbound route to the hash, unless it is already current
    pub fn set_hash(&mut self, to: &str) -> bool {
        let target = to.strip_prefix('#').unwrap_or(to);
        let hash = format!("#{}", normalize_route(target));
        if hash == self.hash {
            return false;
        }
        self.history.push(self.snapshot());
        self.hash = hash;
        true
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Inspect event for a clicked node, built from its ancestor chain
pub fn inspect_message(
    document: &VirtualDomDocument,
    node_id: u32,
    text_snippet_len: usize,
) -> Option<HostMessage> {
    let chain = document.path_to(node_id)?;
    let target = chain.last()?;
    let tag = target.tag()?;
    let in_svg = chain.iter().any(|node| node.tag() == Some("svg"));

    let tag_name = if in_svg {
        tag.to_lowercase()
    } else {
        tag.to_uppercase()
    };
    let class_name = collapse_whitespace(target.attr("class").unwrap_or_default());
    let text_context = truncate_chars(
        &collapse_whitespace(&target.text_content()),
        text_snippet_len,
    );

    let tagged = closest(&chain, "data-source-path");
    let path = tagged.and_then(|node| node.attr("data-source-path")).map(str::to_string);
    let loc = tagged.and_then(|node| node.attr("data-source-loc")).map(str::to_string);

    Some(HostMessage::InspectElement {
        tag_name,
        class_name,
        text_context,
        path,
        loc,
    })
}

/// Nearest element in the chain carrying `attr`
pub fn closest<'a>(chain: &[&'a VNode], attr: &str) -> Option<&'a VNode> {
    chain.iter().rev().find(|node| node.attr(attr).is_some()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let message = HostMessage::InspectElement {
            tag_name: "BUTTON".to_string(),
            class_name: "btn primary".to_string(),
            text_context: "Save".to_string(),
            path: Some("src/App.tsx".to_string()),
            loc: Some("4:7".to_string()),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "inspect-element");
        assert_eq!(json["tagName"], "BUTTON");
        assert_eq!(json["textContext"], "Save");

        let nav = serde_json::to_string(&HostMessage::Navigation { path: "/about".into() }).unwrap();
        assert_eq!(nav, r#"{"type":"navigation","path":"/about"}"#);

        let inbound: InboundMessage =
            serde_json::from_str(r#"{"type":"navigate-to","path":"/settings"}"#).unwrap();
        assert_eq!(inbound, InboundMessage::NavigateTo { path: "/settings".into() });
    }

    #[test]
    fn test_route_prefers_hash() {
        let mut location = Location::new();
        assert_eq!(location.route(), "/");
        location.navigate("/users?page=2", false);
        assert_eq!(location.route(), "/users?page=2");
        assert_eq!(location.route_path(), "/users");
        assert_eq!(location.route_search(), "?page=2");

        location.navigate("#/settings", false);
        assert_eq!(location.pathname, "/users");
        assert_eq!(location.route(), "/settings");

        location.navigate("#section-2", false);
        assert_eq!(location.route(), "/users?page=2");
    }

    #[test]
    fn test_history_and_replace() {
        let mut location = Location::new();
        assert!(location.navigate("/a", false));
        assert!(location.navigate("/b", true));
        assert!(!location.navigate("/b", false));
        assert_eq!(location.history_len(), 1);
        assert!(location.back());
        assert_eq!(location.pathname, "/");
        assert!(!location.back());
    }

    #[test]
    fn test_hash_routing() {
        let mut location = Location::new();
        location.hash_routing = true;
        location.navigate("about", false);
        assert_eq!(location.hash, "#/about");
        assert_eq!(location.pathname, "/");
        assert_eq!(location.route(), "/about");
    }

    #[test]
    fn test_set_hash_ignores_current_route() {
        let mut location = Location::new();
        assert!(location.set_hash("/dashboard"));
        assert!(!location.set_hash("dashboard"));
        assert!(!location.set_hash("#/dashboard"));
        assert_eq!(location.route(), "/dashboard");
    }

    #[test]
    fn test_inspect_message() {
        let mut document = VirtualDomDocument::new();
        document.add_node(
            VNode::element("div")
                .with_id(1)
                .with_attr("data-source-path", "src/App.tsx")
                .with_attr("data-source-loc", "3:5")
                .with_child(
                    VNode::element("button")
                        .with_id(2)
                        .with_attr("class", "  px-4\n   py-2 ")
                        .with_child(VNode::text("Click   me\n now, please")),
                )
                .with_child(
                    VNode::element("svg")
                        .with_id(3)
                        .with_child(VNode::element("path").with_id(4)),
                ),
        );

        let Some(HostMessage::InspectElement {
            tag_name,
            class_name,
            text_context,
            path,
            loc,
        }) = inspect_message(&document, 2, 12)
        else {
            panic!("expected inspect message");
        };
        assert_eq!(tag_name, "BUTTON");
        assert_eq!(class_name, "px-4 py-2");
        assert_eq!(text_context, "Click me now");
        assert_eq!(path.as_deref(), Some("src/App.tsx"));
        assert_eq!(loc.as_deref(), Some("3:5"));

        let Some(HostMessage::InspectElement { tag_name, .. }) = inspect_message(&document, 4, 50)
        else {
            panic!("expected inspect message");
        };
        assert_eq!(tag_name, "path");
        assert!(inspect_message(&document, 99, 50).is_none());
    }
}
