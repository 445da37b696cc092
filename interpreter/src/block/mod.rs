pub mod attributes;
pub(crate) mod build;

use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use quire::{Location, Node, Segment};
use serde::Serialize;

use crate::chain::Chain;
use crate::document::Document;
use crate::report::BlockReport;
use crate::tag::{TagBehavior, TagDefinition};

pub use attributes::{AttributeValue, TagAttributes};

/// Index of a block in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An evaluatable node wrapping one parsed element.
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) parent: Option<BlockId>,
    pub(crate) seq: usize,
    pub(crate) kind: BlockKind,
    pub(crate) children: Vec<BlockId>,
    pub(crate) location: Location,
    pub(crate) path: String,
    pub(crate) report: OnceCell<BlockReport>,
    pub(crate) chain: OnceCell<Chain>,
}

pub enum BlockKind {
    /// Synthetic container for the top-level elements.
    Root,
    Text(TextBlock),
    /// A plain element with no registered tag definition.
    Inbuilt(InbuiltBlock),
    Tag(TagBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub segments: Vec<Segment>,
}

impl TextBlock {
    pub fn has_tokens(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Var(_)))
    }

    /// The text with every sigil escape collapsed and no substitution.
    pub fn literal(&self) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(_) => return None,
            }
        }
        Some(out)
    }
}

pub struct InbuiltBlock {
    pub name: String,
    pub attributes: Vec<(String, Vec<Segment>)>,
    /// Frozen output of a subtree with no variable references.
    pub(crate) constant: Option<Node>,
}

pub struct TagBlock {
    pub definition: Rc<TagDefinition>,
    pub attributes: TagAttributes,
    pub(crate) behavior: Box<dyn TagBehavior>,
    /// Report of the attributes alone.
    pub(crate) own: BlockReport,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            BlockKind::Root => "#root",
            BlockKind::Text(_) => "#text",
            BlockKind::Inbuilt(inbuilt) => &inbuilt.name,
            BlockKind::Tag(tag) => tag.definition.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            BlockKind::Root => "root",
            BlockKind::Text(_) => "text",
            BlockKind::Inbuilt(_) => "inbuilt",
            BlockKind::Tag(_) => "tag",
        }
    }

    /// Slash separated position from the root, e.g. `html[0]/body[1]`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Index among siblings.
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, BlockKind::Root)
    }

    /// Whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match &self.kind {
            BlockKind::Text(text) => text.text.trim().is_empty(),
            _ => false,
        }
    }

    /// False only for subtrees whose output never depends on the context.
    pub fn is_dynamic(&self) -> bool {
        match &self.kind {
            BlockKind::Root | BlockKind::Tag(_) => true,
            BlockKind::Text(text) => text.has_tokens(),
            BlockKind::Inbuilt(inbuilt) => inbuilt.constant.is_none(),
        }
    }

    pub fn is_looping(&self) -> bool {
        match &self.kind {
            BlockKind::Tag(tag) => tag.definition.looping,
            _ => false,
        }
    }

    pub fn tag(&self) -> Option<&TagBlock> {
        match &self.kind {
            BlockKind::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    /// The single text child, ignoring whitespace-only siblings.
    pub fn text_body<'a>(&'a self, doc: &'a Document) -> Option<&'a TextBlock> {
        let mut content = self
            .children
            .iter()
            .map(|&child| doc.block(child))
            .filter(|block| !block.is_blank());
        match (content.next(), content.next()) {
            (Some(block), None) => match &block.kind {
                BlockKind::Text(text) => Some(text),
                _ => None,
            },
            _ => None,
        }
    }

    /// What this block contributes before its children are taken into account.
    pub fn own_report(&self) -> BlockReport {
        match &self.kind {
            BlockKind::Root => BlockReport::default(),
            BlockKind::Text(text) => {
                let mut report = BlockReport::default();
                for segment in &text.segments {
                    if let Segment::Var(token) = segment {
                        if token.is_global() {
                            report.globals.insert(token.name.clone());
                        } else {
                            report.consumes.insert(token.name.clone());
                        }
                    }
                }
                report
            }
            BlockKind::Inbuilt(inbuilt) => attributes::template_report(&inbuilt.attributes),
            BlockKind::Tag(tag) => tag.own.clone(),
        }
    }

    /// Root dataset names this block makes valid for itself and its subtree.
    pub fn inject_globals(&self) -> Vec<String> {
        match &self.kind {
            BlockKind::Tag(tag) => tag.behavior.inject_globals(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("path", &self.path)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}
