use std::fmt;

use serde::Serialize;

/// Elements that never take children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// A rendered output node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// HTML-ready text: literal source text passes through, substituted
    /// values have already been escaped.
    Text(String),
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn element(
        name: impl Into<String>,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    ) -> Self {
        Node::Element {
            name: name.into(),
            attributes,
            children,
        }
    }
}

/// Escape text for inclusion in HTML content or a quoted attribute value.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize a node list to HTML.
pub fn to_html(nodes: &[Node]) -> String {
    nodes.iter().map(|n| n.to_string()).collect()
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(s) => write!(f, "{}", s),
            Node::Element {
                name,
                attributes,
                children,
            } => {
                write!(f, "<{}", name)?;
                for (key, value) in attributes {
                    // Literal values may still hold a raw quote character.
                    write!(f, " {}=\"{}\"", key, value.replace('"', "&quot;"))?;
                }
                write!(f, ">")?;
                if is_void(name) && children.is_empty() {
                    return Ok(());
                }
                for child in children {
                    write!(f, "{}", child)?;
                }
                write!(f, "</{}>", name)
            }
        }
    }
}
