use std::path::PathBuf;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use log::debug;
use once_cell::unsync::OnceCell;
use quire::scanner::{self, Dialect};
use quire::{Element, Location, Node, Segment, TagNode, ValidationError};

use super::attributes;
use super::{Block, BlockId, BlockKind, InbuiltBlock, TagBlock, TextBlock};
use crate::context::Context;
use crate::error::RenderError;
use crate::tag::{Body, Rendered, TagBehavior, TagDefinition, TagInstance, TagRegistry};

/// Builds the block arena for one document, bottom-up.
pub(crate) struct Builder<'r> {
    registry: &'r TagRegistry,
    text_dialect: Dialect,
    attribute_dialect: Dialect,
    base_dir: PathBuf,
    blocks: Vec<Block>,
    errors: Vec<ValidationError>,
}

impl<'r> Builder<'r> {
    pub(crate) fn new(
        registry: &'r TagRegistry,
        text_dialect: Dialect,
        attribute_dialect: Dialect,
        base_dir: PathBuf,
    ) -> Self {
        Builder {
            registry,
            text_dialect,
            attribute_dialect,
            base_dir,
            blocks: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Build the whole tree under a synthetic root. Returns the arena and
    /// every construction error found.
    pub(crate) fn build(
        mut self,
        filename: &str,
        elements: &[Element],
    ) -> (Vec<Block>, Vec<ValidationError>) {
        let root = self.reserve(None, 0, Location::synthetic(filename), String::new());
        let children = elements
            .iter()
            .enumerate()
            .map(|(seq, element)| self.element(element, root, seq))
            .collect();
        self.blocks[root.0].children = children;
        debug!("built {} blocks for {}", self.blocks.len(), filename);
        (self.blocks, self.errors)
    }

    fn reserve(&mut self, parent: Option<BlockId>, seq: usize, location: Location, path: String) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            id,
            parent,
            seq,
            kind: BlockKind::Root,
            children: Vec::new(),
            location,
            path,
            report: OnceCell::new(),
            chain: OnceCell::new(),
        });
        id
    }

    fn element(&mut self, element: &Element, parent: BlockId, seq: usize) -> BlockId {
        let path = child_path(&self.blocks[parent.0].path, element.name(), seq);
        let id = self.reserve(Some(parent), seq, element.location().clone(), path);

        let kind = match element {
            Element::Text(node) => BlockKind::Text(TextBlock {
                segments: scanner::scan(&node.text, self.text_dialect),
                text: node.text.clone(),
            }),
            Element::Tag(node) => {
                let children = node
                    .children
                    .iter()
                    .enumerate()
                    .map(|(seq, child)| self.element(child, id, seq))
                    .collect();
                self.blocks[id.0].children = children;

                match self.registry.get(&node.name).cloned() {
                    Some(definition) => BlockKind::Tag(self.tag(definition, node, id)),
                    None => BlockKind::Inbuilt(self.inbuilt(node, id)),
                }
            }
        };
        self.blocks[id.0].kind = kind;
        id
    }

    fn tag(&mut self, definition: Rc<TagDefinition>, node: &TagNode, id: BlockId) -> TagBlock {
        let before = self.errors.len();
        let attributes = attributes::validate(
            &definition,
            node,
            self.attribute_dialect,
            &self.base_dir,
            &mut self.errors,
        );

        let content: Vec<&Block> = self.blocks[id.0]
            .children
            .iter()
            .map(|&child| &self.blocks[child.0])
            .filter(|block| !block.is_blank())
            .collect();
        let texts = content
            .iter()
            .filter(|block| matches!(block.kind, BlockKind::Text(_)))
            .count();
        if let Err(violation) = definition.body.check(content.len(), texts) {
            self.errors.push(
                ValidationError::new(format!("body {}", violation), &node.location).in_tag(&node.name),
            );
        }
        let body_text = match content.as_slice() {
            [block] => match &block.kind {
                BlockKind::Text(text) => Some(text.text.clone()),
                _ => None,
            },
            _ => None,
        };

        let instance = TagInstance {
            name: &node.name,
            attributes: &attributes,
            location: &node.location,
            body_text: body_text.as_deref(),
        };
        // prepare only sees attributes that passed validation
        let behavior: Box<dyn TagBehavior> = if self.errors.len() > before {
            Box::new(Inert)
        } else {
            match (definition.prepare)(&instance) {
                Ok(behavior) => behavior,
                Err(err) => {
                    self.errors
                        .push(ValidationError::new(err.message, &node.location).in_tag(&node.name));
                    Box::new(Inert)
                }
            }
        };

        let own = attributes.report();
        TagBlock {
            definition,
            attributes,
            behavior,
            own,
        }
    }

    fn inbuilt(&mut self, node: &TagNode, id: BlockId) -> InbuiltBlock {
        let attributes: Vec<(String, Vec<Segment>)> = node
            .attributes
            .iter()
            .map(|a| (a.name.clone(), scanner::scan(&a.value, self.attribute_dialect)))
            .collect();
        let mut inbuilt = InbuiltBlock {
            name: node.name.clone(),
            attributes,
            constant: None,
        };
        inbuilt.constant = self.constant(&inbuilt, id);
        inbuilt
    }

    /// The fixed rendering of a subtree with no references anywhere in it.
    fn constant(&self, inbuilt: &InbuiltBlock, id: BlockId) -> Option<Node> {
        let mut attributes = Vec::with_capacity(inbuilt.attributes.len());
        for (name, segments) in &inbuilt.attributes {
            attributes.push((name.clone(), literal(segments)?));
        }
        let mut children = Vec::new();
        for &child in &self.blocks[id.0].children {
            match &self.blocks[child.0].kind {
                BlockKind::Text(text) => children.push(Node::Text(text.literal()?)),
                BlockKind::Inbuilt(nested) => children.push(nested.constant.clone()?),
                BlockKind::Tag(_) | BlockKind::Root => return None,
            }
        }
        Some(Node::element(inbuilt.name.clone(), attributes, children))
    }
}

fn literal(segments: &[Segment]) -> Option<String> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Var(_) => return None,
        }
    }
    Some(out)
}

fn child_path(parent: &str, name: &str, seq: usize) -> String {
    if parent.is_empty() {
        format!("{}[{}]", name, seq)
    } else {
        format!("{}/{}[{}]", parent, name, seq)
    }
}

/// Stands in for a tag whose `prepare` failed. The document is never
/// evaluable in that case, so this is only reachable by introspection.
struct Inert;

impl TagBehavior for Inert {
    fn render<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move { Ok(Rendered::empty(ctx)) }.boxed_local()
    }
}
