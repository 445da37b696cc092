use futures_util::future::{self, FutureExt, LocalBoxFuture};
use quire::{AttributeSpec, BodyPolicy};

use crate::context::Context;
use crate::error::RenderError;
use crate::tag::{Body, Gate, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance};

/// `<page path="/users">` is reached only when the request matched its path.
/// Its subtree may read `@params`.
pub fn page_definition() -> TagDefinition {
    TagDefinition::new("page", BodyPolicy::Require, prepare_page)
        .attribute(AttributeSpec::route("path").required())
}

struct Page {
    path: String,
}

fn prepare_page(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    let path = tag
        .attributes
        .special("path")
        .ok_or_else(|| PrepareError::new("missing route path"))?;
    Ok(Box::new(Page {
        path: path.to_string(),
    }))
}

impl Page {
    fn matches(&self, ctx: &Context) -> bool {
        ctx.global("matchedPath").and_then(|v| v.as_str()) == Some(self.path.as_str())
    }
}

impl TagBehavior for Page {
    fn inject_globals(&self) -> Vec<String> {
        vec!["params".to_string()]
    }

    fn contains<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
        future::ready(Ok(Gate::when(self.matches(&ctx), ctx))).boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        gated(self.matches(&ctx), body, ctx)
    }
}

/// `<action>` is reached only when evaluating a submission. Its subtree may
/// read `@body`.
pub fn action_definition() -> TagDefinition {
    TagDefinition::new("action", BodyPolicy::Require, prepare_action)
}

struct Action;

fn prepare_action(_tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(Action))
}

impl TagBehavior for Action {
    fn inject_globals(&self) -> Vec<String> {
        vec!["body".to_string()]
    }

    fn contains<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
        future::ready(Ok(Gate::when(ctx.is_action(), ctx))).boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        gated(ctx.is_action(), body, ctx)
    }
}

fn gated<'a>(found: bool, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
    async move {
        if !found {
            return Ok(Rendered::empty(ctx));
        }
        let inner = body.render(ctx.clone()).await?;
        Ok(Rendered::new(ctx, inner.nodes))
    }
    .boxed_local()
}
