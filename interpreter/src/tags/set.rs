use futures_util::future::{FutureExt, LocalBoxFuture};
use quire::{AttributeSpec, BodyPolicy, Segment};
use serde_json::Value;

use crate::context::{Context, Escape};
use crate::error::RenderError;
use crate::tag::{Body, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance};

/// `<set target="$name" value="...">` or `<set target="$name">{"json": true}</set>`
pub fn definition() -> TagDefinition {
    TagDefinition::new("set", BodyPolicy::AllowTextOnly, prepare)
        .attribute(AttributeSpec::target("target").required())
        .attribute(AttributeSpec::template("value"))
}

struct Set {
    target: String,
    value: Option<Vec<Segment>>,
    /// Body text that parsed as JSON.
    json: Option<Value>,
}

fn prepare(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    let value = tag.attributes.template("value").map(<[Segment]>::to_vec);
    if value.is_some() && tag.body_text.is_some() {
        return Err(PrepareError::new("give either a value attribute or a body, not both"));
    }
    Ok(Box::new(Set {
        target: super::binding(tag, "target")?,
        value,
        json: tag
            .body_text
            .and_then(|text| serde_json::from_str(text.trim()).ok()),
    }))
}

impl Set {
    fn assign(&self, body: Body<'_>, ctx: Context) -> Result<Context, RenderError> {
        let value = match (&self.value, &self.json) {
            (Some(segments), _) => ctx.evaluate(segments)?,
            (None, Some(json)) => json.clone(),
            (None, None) => body
                .interpolate(&ctx, Escape::None)?
                .map(|text| Value::String(text.trim().to_string()))
                .unwrap_or(Value::Null),
        };
        Ok(ctx.set_var(self.target.clone(), value))
    }
}

impl TagBehavior for Set {
    fn preceeds<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Context, RenderError>> {
        async move { self.assign(body, ctx) }.boxed_local()
    }

    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move { self.assign(body, ctx).map(Rendered::empty) }.boxed_local()
    }
}
