//! The standard tag library registered by [`TagRegistry::standard`].

mod boundary;
mod flow;
mod markdown;
mod response;
mod route;
mod set;

use quire::VarToken;
use serde_json::Value;

use crate::context::Context;
use crate::tag::{PrepareError, TagInstance, TagRegistry};

pub fn register_standard(registry: &mut TagRegistry) {
    registry
        .register(set::definition())
        .register(flow::if_definition())
        .register(flow::for_definition())
        .register(flow::with_definition())
        .register(response::status_definition())
        .register(response::redirect_definition())
        .register(response::cookie_definition())
        .register(response::output_definition())
        .register(boundary::try_definition())
        .register(boundary::catch_definition())
        .register(route::page_definition())
        .register(route::action_definition())
        .register(markdown::definition());
}

fn source(tag: &TagInstance<'_>, name: &str) -> Result<VarToken, PrepareError> {
    tag.attributes
        .source(name)
        .cloned()
        .ok_or_else(|| PrepareError::new(format!("missing source attribute '{}'", name)))
}

fn binding(tag: &TagInstance<'_>, name: &str) -> Result<String, PrepareError> {
    tag.attributes
        .binding(name)
        .map(str::to_string)
        .ok_or_else(|| PrepareError::new(format!("missing variable attribute '{}'", name)))
}

/// Fork `ctx` with `name` bound when a name was given.
fn bind(ctx: &Context, name: Option<&str>, value: Value) -> Context {
    match name {
        Some(name) => ctx.set_var(name, value),
        None => ctx.clone(),
    }
}
