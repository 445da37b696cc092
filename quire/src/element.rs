use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where an element came from in its source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub filename: Arc<str>,
    /// 1-based line of the first byte of the element.
    pub line: usize,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
    /// The source file ID (for error reporting with codespan-reporting).
    #[serde(default)]
    pub file_id: usize,
}

impl Location {
    pub fn new(filename: impl Into<Arc<str>>, line: usize, span: Range<usize>, file_id: usize) -> Self {
        Location {
            filename: filename.into(),
            line,
            span,
            file_id,
        }
    }

    /// A location for elements built in code rather than read from a file.
    pub fn synthetic(filename: impl Into<Arc<str>>) -> Self {
        Location::new(filename, 0, 0..0, 0)
    }
}

/// A parsed input node. Produced by the markup reader (or any other producer of
/// this shape) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Element {
    Text(TextNode),
    Tag(TagNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagNode {
    pub name: String,
    /// Attributes in source order. Names are unique.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub children: Vec<Element>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Element {
    pub fn text(text: impl Into<String>, location: Location) -> Self {
        Element::Text(TextNode {
            text: text.into(),
            location,
        })
    }

    pub fn tag<K, V>(
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = (K, V)>,
        children: Vec<Element>,
        location: Location,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Element::Tag(TagNode {
            name: name.into(),
            attributes: attributes
                .into_iter()
                .map(|(name, value)| Attribute {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
            children,
            location,
        })
    }

    pub fn location(&self) -> &Location {
        match self {
            Element::Text(node) => &node.location,
            Element::Tag(node) => &node.location,
        }
    }

    /// The tag name, or `#text` for text nodes.
    pub fn name(&self) -> &str {
        match self {
            Element::Text(_) => "#text",
            Element::Tag(node) => &node.name,
        }
    }

    /// True for text nodes made only of whitespace.
    pub fn is_blank(&self) -> bool {
        matches!(self, Element::Text(node) if node.text.trim().is_empty())
    }
}

impl TagNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}
