use serde::{Deserialize, Serialize};

/// Virtual DOM node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VNode {
    /// HTML or SVG element
    Element {
        tag: String,
        /// Attributes in binding order
        attributes: Vec<(String, String)>,
        children: Vec<VNode>,
        /// Render-pass node id; keys the session's event handler table
        #[serde(skip)]
        id: u32,
    },

    /// Text node
    Text { content: String },

    /// Markup inserted verbatim (`dangerouslySetInnerHTML`)
    Raw { html: String },

    /// Comment node
    Comment { content: String },
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            id: 0,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text {
            content: content.into(),
        }
    }

    pub fn raw(html: impl Into<String>) -> Self {
        VNode::Raw { html: html.into() }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        VNode::Comment {
            content: content.into(),
        }
    }

    /// Set an attribute, replacing an earlier binding of the same name
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if let VNode::Element {
            ref mut attributes, ..
        } = self
        {
            let key = key.into();
            let value = value.into();
            match attributes.iter_mut().find(|(name, _)| *name == key) {
                Some(slot) => slot.1 = value,
                None => attributes.push((key, value)),
            }
        }
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        if let VNode::Element {
            ref mut children, ..
        } = self
        {
            children.push(child);
        }
        self
    }

    pub fn with_children(mut self, new_children: Vec<VNode>) -> Self {
        if let VNode::Element {
            ref mut children, ..
        } = self
        {
            children.extend(new_children);
        }
        self
    }

    pub fn with_id(mut self, node_id: u32) -> Self {
        if let VNode::Element { ref mut id, .. } = self {
            *id = node_id;
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<u32> {
        match self {
            VNode::Element { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            VNode::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            VNode::Text { content } => out.push_str(content),
            VNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
            VNode::Raw { .. } | VNode::Comment { .. } => {}
        }
    }

    /// First node, depth-first, matching `predicate`
    pub fn find(&self, predicate: &dyn Fn(&VNode) -> bool) -> Option<&VNode> {
        if predicate(self) {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(predicate))
    }

    /// Innermost element whose own text contains `text`
    pub fn find_by_text(&self, text: &str) -> Option<&VNode> {
        let own = self
            .children()
            .iter()
            .any(|child| matches!(child, VNode::Text { content } if content.contains(text)));
        self.children()
            .iter()
            .find_map(|child| child.find_by_text(text))
            .or(if own { Some(self) } else { None })
    }

    /// Chain of nodes from `self` down to the element with `id`
    pub fn path_to(&self, node_id: u32) -> Option<Vec<&VNode>> {
        if self.id() == Some(node_id) {
            return Some(vec![self]);
        }
        for child in self.children() {
            if let Some(mut path) = child.path_to(node_id) {
                path.insert(0, self);
                return Some(path);
            }
        }
        None
    }
}

/// Virtual document: root nodes plus the collected stylesheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualDomDocument {
    pub nodes: Vec<VNode>,
    pub stylesheet: String,
}

impl VirtualDomDocument {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            stylesheet: String::new(),
        }
    }

    pub fn add_node(&mut self, node: VNode) {
        self.nodes.push(node);
    }

    pub fn find(&self, predicate: &dyn Fn(&VNode) -> bool) -> Option<&VNode> {
        self.nodes.iter().find_map(|node| node.find(predicate))
    }

    pub fn find_by_text(&self, text: &str) -> Option<&VNode> {
        self.nodes.iter().find_map(|node| node.find_by_text(text))
    }

    pub fn path_to(&self, node_id: u32) -> Option<Vec<&VNode>> {
        self.nodes.iter().find_map(|node| node.path_to(node_id))
    }

    pub fn text_content(&self) -> String {
        self.nodes.iter().map(VNode::text_content).collect()
    }
}

impl Default for VirtualDomDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VNode {
        VNode::element("div")
            .with_id(1)
            .with_attr("id", "root")
            .with_child(
                VNode::element("button")
                    .with_id(2)
                    .with_attr("class", "btn")
                    .with_child(VNode::text("Save")),
            )
            .with_child(VNode::element("p").with_id(3).with_child(VNode::text("Saved 2 items")))
    }

    #[test]
    fn test_set_attr_replaces() {
        let node = VNode::element("a").with_attr("href", "/a").with_attr("href", "/b");
        assert_eq!(node.attr("href"), Some("/b"));
        let VNode::Element { attributes, .. } = &node else { unreachable!() };
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn test_find_by_text_prefers_innermost() {
        let root = sample();
        assert_eq!(root.find_by_text("Save").and_then(VNode::tag), Some("button"));
        assert_eq!(root.find_by_text("items").and_then(VNode::id), Some(3));
        assert!(root.find_by_text("missing").is_none());
    }

    #[test]
    fn test_path_to() {
        let root = sample();
        let path = root.path_to(2).unwrap();
        assert_eq!(path.iter().filter_map(|n| n.tag()).collect::<Vec<_>>(), vec!["div", "button"]);
        assert_eq!(root.text_content(), "SaveSaved 2 items");
    }

    #[test]
    fn test_ids_are_not_serialized() {
        let json = serde_json::to_string(&VNode::element("span").with_id(7)).unwrap();
        assert!(!json.contains('7'));
        assert!(json.contains("\"type\":\"Element\""));
    }
}
