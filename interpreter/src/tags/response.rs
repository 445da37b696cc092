use futures_util::future::{self, FutureExt, LocalBoxFuture};
use quire::{AttributeSpec, BodyPolicy, Segment, VarToken};

use super::source;
use crate::context::{Context, Escape};
use crate::error::RenderError;
use crate::tag::{Body, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance};

pub fn status_definition() -> TagDefinition {
    TagDefinition::new("status", BodyPolicy::Deny, prepare_status)
        .attribute(AttributeSpec::special("code").required())
}

struct Status(u16);

fn prepare_status(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    let raw = tag.attributes.special("code").unwrap_or_default();
    match raw.trim().parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => Ok(Box::new(Status(code))),
        _ => Err(PrepareError::new(format!("'{}' is not an HTTP status code", raw))),
    }
}

impl TagBehavior for Status {
    fn render<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        ctx.response().set_status(self.0);
        future::ready(Ok(Rendered::empty(ctx))).boxed_local()
    }
}

pub fn redirect_definition() -> TagDefinition {
    TagDefinition::new("redirect", BodyPolicy::Deny, prepare_redirect)
        .attribute(AttributeSpec::template("to").required())
}

struct Redirect(Vec<Segment>);

fn prepare_redirect(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    let to = tag.attributes.template("to").unwrap_or_default();
    Ok(Box::new(Redirect(to.to_vec())))
}

impl TagBehavior for Redirect {
    fn render<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        let result = ctx.interpolate(&self.0, Escape::None).map(|to| {
            ctx.response().redirect(to);
            Rendered::empty(ctx)
        });
        future::ready(result).boxed_local()
    }
}

pub fn cookie_definition() -> TagDefinition {
    TagDefinition::new("cookie", BodyPolicy::Deny, prepare_cookie)
        .attribute(AttributeSpec::special("name").required())
        .attribute(AttributeSpec::template("value").required())
}

struct Cookie {
    name: String,
    value: Vec<Segment>,
}

fn prepare_cookie(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    let name = tag.attributes.special("name").unwrap_or_default().trim();
    if name.is_empty() || name.contains(['=', ';', ' ']) {
        return Err(PrepareError::new(format!("'{}' is not a valid cookie name", name)));
    }
    Ok(Box::new(Cookie {
        name: name.to_string(),
        value: tag.attributes.template("value").unwrap_or_default().to_vec(),
    }))
}

impl TagBehavior for Cookie {
    fn render<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        let result = ctx.interpolate(&self.value, Escape::None).map(|value| {
            ctx.response().add_cookie(self.name.clone(), value);
            Rendered::empty(ctx)
        });
        future::ready(result).boxed_local()
    }
}

/// `<output source="$data">` answers the request with data instead of markup.
pub fn output_definition() -> TagDefinition {
    TagDefinition::new("output", BodyPolicy::Deny, prepare_output)
        .attribute(AttributeSpec::source("source").required())
}

struct Output(VarToken);

fn prepare_output(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(Output(source(tag, "source")?)))
}

impl TagBehavior for Output {
    fn render<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        let result = ctx.resolve(&self.0).map(|value| {
            ctx.response().set_output(value);
            Rendered::empty(ctx)
        });
        future::ready(result).boxed_local()
    }
}
