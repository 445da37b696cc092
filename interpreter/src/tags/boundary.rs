use futures_util::future::{FutureExt, LocalBoxFuture};
use log::debug;
use quire::{AttributeSpec, BodyPolicy};
use serde_json::json;

use super::bind;
use crate::context::Context;
use crate::error::RenderError;
use crate::tag::{Body, Gate, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance};

/// `<try>` keeps a failing body from failing the document. The failure is
/// recorded as the response error and the body's output is dropped.
pub fn try_definition() -> TagDefinition {
    TagDefinition::new("try", BodyPolicy::Require, prepare_try)
}

struct Try;

fn prepare_try(_tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(Try))
}

impl TagBehavior for Try {
    fn preceeds<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Context, RenderError>> {
        async move {
            if let Err(err) = body.render(ctx.clone()).await {
                debug!("<try> at {} caught on replay: {}", body.location().line, err);
                ctx.response().fail(&err);
            }
            Ok(ctx)
        }
        .boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move {
            match body.render(ctx.clone()).await {
                Ok(inner) => Ok(Rendered::new(ctx, inner.nodes)),
                Err(err) => {
                    debug!("<try> at {} caught: {}", body.location().line, err);
                    ctx.response().fail(&err);
                    Ok(Rendered::empty(ctx))
                }
            }
        }
        .boxed_local()
    }
}

/// `<catch as="$err">` renders only when a response error is set, and clears it.
pub fn catch_definition() -> TagDefinition {
    TagDefinition::new("catch", BodyPolicy::Allow, prepare_catch).attribute(AttributeSpec::inject("as"))
}

struct Catch {
    name: Option<String>,
}

fn prepare_catch(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(Catch {
        name: tag.attributes.binding("as").map(str::to_string),
    }))
}

impl TagBehavior for Catch {
    fn consumes_error(&self) -> bool {
        true
    }

    fn contains<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
        async move {
            match ctx.response().error() {
                Some(err) => {
                    let scope = bind(&ctx, self.name.as_deref(), json!(err));
                    Ok(Gate::found(scope))
                }
                None => Ok(Gate::missing(ctx)),
            }
        }
        .boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move {
            let Some(err) = ctx.response().take_error() else {
                return Ok(Rendered::empty(ctx));
            };
            let scope = bind(&ctx, self.name.as_deref(), json!(err));
            let inner = body.render(scope).await?;
            Ok(Rendered::new(ctx, inner.nodes))
        }
        .boxed_local()
    }
}
