// HTML Parser - converts scraper's DOM into our own small node tree
use scraper::{ElementRef, Html, Node};

/// A parsed HTML node, detached from the parser's arena
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

impl HtmlNode {
    pub fn element(tag: &str, children: Vec<HtmlNode>) -> Self {
        HtmlNode::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children,
        }
    }

    /// Tag name for elements, None for text
    pub fn tag(&self) -> Option<&str> {
        match self {
            HtmlNode::Element { tag, .. } => Some(tag),
            HtmlNode::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            HtmlNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            HtmlNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[HtmlNode] {
        match self {
            HtmlNode::Element { children, .. } => children,
            HtmlNode::Text(_) => &[],
        }
    }

    /// Concatenated text of this node and its descendants
    pub fn flatten_text(&self) -> String {
        match self {
            HtmlNode::Text(text) => text.clone(),
            HtmlNode::Element { children, .. } => {
                children.iter().map(|c| c.flatten_text()).collect()
            }
        }
    }
}

/// Result of parsing an HTML fragment
#[derive(Debug, Clone, Default)]
pub struct HtmlFragment {
    /// Top-level nodes of the fragment
    pub nodes: Vec<HtmlNode>,
    /// Parse errors reported by the tokenizer and tree builder
    pub errors: Vec<String>,
}

impl HtmlFragment {
    /// All visible text, ignoring structure
    pub fn visible_text(&self) -> String {
        self.nodes.iter().map(|n| n.flatten_text()).collect()
    }
}

/// Parse an HTML fragment (as stored in a document field) into a node tree
pub fn parse_html(html: &str) -> HtmlFragment {
    let parsed = Html::parse_fragment(html);
    let root = parsed.root_element();

    HtmlFragment {
        nodes: convert_children(root),
        errors: parsed
            .errors
            .iter()
            .map(|e| e.to_string())
            .filter(|e| !is_char_ref_error(e))
            .collect(),
    }
}

/// References such as `&#13;` are flagged but still decode to their character
fn is_char_ref_error(error: &str) -> bool {
    error.starts_with("Invalid numeric character reference")
}

fn convert_children(element: ElementRef) -> Vec<HtmlNode> {
    let mut nodes = Vec::new();

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = &text.text;
                nodes.push(HtmlNode::Text(text.to_string()));
            }
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                nodes.push(HtmlNode::Element {
                    tag: el.name().to_ascii_lowercase(),
                    attrs: el
                        .attrs()
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .collect(),
                    children: convert_children(child_ref),
                });
            }
            // comments, doctypes and processing instructions carry no content
            _ => {}
        }
    }

    nodes
}
