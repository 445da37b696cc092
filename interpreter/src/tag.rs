use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures_util::future::{self, FutureExt, LocalBoxFuture};
use quire::{AttributeSpec, BodyPolicy, Location, Node};

use crate::block::BlockId;
use crate::block::attributes::TagAttributes;
use crate::context::{Context, Escape};
use crate::document::Document;
use crate::error::RenderError;
use crate::render;

/// Builds the behavior of one tag instance. Called once per block at load time.
pub type PrepareFn = fn(&TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError>;

/// Declarative contract for one DSL tag kind.
pub struct TagDefinition {
    pub name: &'static str,
    pub attributes: Vec<AttributeSpec>,
    pub body: BodyPolicy,
    /// Loops cannot supply one deterministic binding to an isolated
    /// descendant, so their gate is skipped when chaining through them.
    pub looping: bool,
    pub prepare: PrepareFn,
}

impl TagDefinition {
    pub fn new(name: &'static str, body: BodyPolicy, prepare: PrepareFn) -> Self {
        TagDefinition {
            name,
            attributes: Vec::new(),
            body,
            looping: false,
            prepare,
        }
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

impl fmt::Debug for TagDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDefinition")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("body", &self.body)
            .field("looping", &self.looping)
            .finish()
    }
}

/// What `prepare` sees of the block it is building behavior for.
pub struct TagInstance<'a> {
    pub name: &'a str,
    pub attributes: &'a TagAttributes,
    pub location: &'a Location,
    /// Raw text of the body when it is a single text node.
    pub body_text: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PrepareError {
    pub message: String,
}

impl PrepareError {
    pub fn new(message: impl Into<String>) -> Self {
        PrepareError {
            message: message.into(),
        }
    }
}

/// Result of a `contains` check.
#[derive(Debug, Clone)]
pub struct Gate {
    /// False when a full evaluation would not reach inside this block.
    pub found: bool,
    /// The context descendants see, possibly narrowed.
    pub context: Context,
}

impl Gate {
    pub fn found(context: Context) -> Self {
        Gate {
            found: true,
            context,
        }
    }

    pub fn missing(context: Context) -> Self {
        Gate {
            found: false,
            context,
        }
    }

    pub fn when(found: bool, context: Context) -> Self {
        Gate { found, context }
    }
}

/// Output of evaluating a block: the context later siblings see, and elements.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub context: Context,
    pub nodes: Vec<Node>,
}

impl Rendered {
    pub fn new(context: Context, nodes: Vec<Node>) -> Self {
        Rendered { context, nodes }
    }

    pub fn empty(context: Context) -> Self {
        Rendered::new(context, Vec::new())
    }
}

/// Behavior of one prepared tag instance.
pub trait TagBehavior {
    /// Root dataset fields recognized as globals within this tag's subtree.
    fn inject_globals(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether this tag reads the response error field.
    fn consumes_error(&self) -> bool {
        false
    }

    /// Side-effect free check whether evaluation reaches this tag's body.
    fn contains<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
        future::ready(Ok(Gate::found(ctx))).boxed_local()
    }

    /// Apply this tag's state-changing effect without producing output.
    fn preceeds<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Context, RenderError>> {
        future::ready(Ok(ctx)).boxed_local()
    }

    /// Full evaluation.
    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>>;
}

/// A tag's view of its own children.
#[derive(Clone, Copy)]
pub struct Body<'a> {
    doc: &'a Document,
    block: BlockId,
}

impl<'a> Body<'a> {
    pub(crate) fn new(doc: &'a Document, block: BlockId) -> Self {
        Body { doc, block }
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn location(&self) -> &'a Location {
        self.doc.block(self.block).location()
    }

    /// True when there are no children besides whitespace.
    pub fn is_empty(&self) -> bool {
        self.doc
            .block(self.block)
            .children()
            .iter()
            .all(|&child| self.doc.block(child).is_blank())
    }

    /// Render the children concurrently, in the given context.
    pub async fn render(self, ctx: Context) -> Result<Rendered, RenderError> {
        render::render_collection(self.doc, self.block, ctx).await
    }

    /// Raw text of a body that is a single text node.
    pub fn text(&self) -> Option<&'a str> {
        self.doc.block(self.block).text_body(self.doc).map(|t| t.text.as_str())
    }

    /// The single text node's content with references substituted.
    pub fn interpolate(&self, ctx: &Context, escape: Escape) -> Result<Option<String>, RenderError> {
        match self.doc.block(self.block).text_body(self.doc) {
            Some(text) => ctx.interpolate(&text.segments, escape).map(Some),
            None => Ok(None),
        }
    }
}

/// Tag definitions by name. Element names not found here are inbuilt blocks.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<&'static str, Rc<TagDefinition>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        TagRegistry::default()
    }

    /// A registry holding the standard tag library.
    pub fn standard() -> Self {
        let mut registry = TagRegistry::new();
        crate::tags::register_standard(&mut registry);
        registry
    }

    pub fn register(&mut self, definition: TagDefinition) -> &mut Self {
        self.tags.insert(definition.name, Rc::new(definition));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Rc<TagDefinition>> {
        self.tags.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tags.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
