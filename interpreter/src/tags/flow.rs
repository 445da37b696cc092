use futures_util::future::{FutureExt, LocalBoxFuture};
use quire::{AttributeSpec, BodyPolicy, Segment, VarToken};
use serde_json::Value;

use super::{bind, binding, source};
use crate::context::{Context, Escape};
use crate::error::RenderError;
use crate::tag::{Body, Gate, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance};
use crate::value;

/// `<if source="$x">` renders its body when `$x` is truthy, or when it
/// equals the `equals` attribute if one is given.
pub fn if_definition() -> TagDefinition {
    TagDefinition::new("if", BodyPolicy::Require, prepare_if)
        .attribute(AttributeSpec::source("source").required())
        .attribute(AttributeSpec::template("equals"))
}

struct If {
    source: VarToken,
    equals: Option<Vec<Segment>>,
}

fn prepare_if(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(If {
        source: source(tag, "source")?,
        equals: tag.attributes.template("equals").map(<[Segment]>::to_vec),
    }))
}

impl If {
    fn matches(&self, ctx: &Context) -> Result<bool, RenderError> {
        let value = ctx.resolve(&self.source)?;
        match &self.equals {
            Some(expected) => Ok(value::to_text(&value) == ctx.interpolate(expected, Escape::None)?),
            None => Ok(value::is_truthy(&value)),
        }
    }
}

impl TagBehavior for If {
    fn contains<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
        async move { Ok(Gate::when(self.matches(&ctx)?, ctx)) }.boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move {
            if !self.matches(&ctx)? {
                return Ok(Rendered::empty(ctx));
            }
            let inner = body.render(ctx.clone()).await?;
            Ok(Rendered::new(ctx, inner.nodes))
        }
        .boxed_local()
    }
}

/// `<for source="$items" as="$item" index="$i">` renders its body once per item.
pub fn for_definition() -> TagDefinition {
    TagDefinition::new("for", BodyPolicy::Require, prepare_for)
        .attribute(AttributeSpec::source("source").required())
        .attribute(AttributeSpec::inject("as").required())
        .attribute(AttributeSpec::inject("index"))
        .looping()
}

struct For {
    source: VarToken,
    item: String,
    index: Option<String>,
}

fn prepare_for(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(For {
        source: source(tag, "source")?,
        item: binding(tag, "as")?,
        index: tag.attributes.binding("index").map(str::to_string),
    }))
}

impl TagBehavior for For {
    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move {
            let items: Vec<(Value, Value)> = match ctx.resolve(&self.source)? {
                Value::Null => Vec::new(),
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (Value::from(i), item))
                    .collect(),
                Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
                other => {
                    return Err(RenderError::TypeError {
                        expected: "array".to_string(),
                        got: value::type_name(&other).to_string(),
                    });
                }
            };

            let mut nodes = Vec::new();
            for (index, item) in items {
                let scope = bind(&ctx.set_var(self.item.clone(), item), self.index.as_deref(), index);
                nodes.extend(body.render(scope).await?.nodes);
            }
            Ok(Rendered::new(ctx, nodes))
        }
        .boxed_local()
    }
}

/// `<with source="$user.address" as="$address">` narrows its body to one
/// value and is skipped when that value is null.
pub fn with_definition() -> TagDefinition {
    TagDefinition::new("with", BodyPolicy::Require, prepare_with)
        .attribute(AttributeSpec::source("source").required())
        .attribute(AttributeSpec::inject("as").required())
}

struct With {
    source: VarToken,
    name: String,
}

fn prepare_with(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(With {
        source: source(tag, "source")?,
        name: binding(tag, "as")?,
    }))
}

impl With {
    fn narrow(&self, ctx: &Context) -> Result<Gate, RenderError> {
        let value = ctx.resolve(&self.source)?;
        if value.is_null() {
            return Ok(Gate::missing(ctx.clone()));
        }
        Ok(Gate::found(ctx.set_var(self.name.clone(), value)))
    }
}

impl TagBehavior for With {
    fn contains<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
        async move { self.narrow(&ctx) }.boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move {
            let gate = self.narrow(&ctx)?;
            if !gate.found {
                return Ok(Rendered::empty(ctx));
            }
            let inner = body.render(gate.context).await?;
            Ok(Rendered::new(ctx, inner.nodes))
        }
        .boxed_local()
    }
}
