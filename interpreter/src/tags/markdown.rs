use futures_util::future::{self, FutureExt, LocalBoxFuture};
use pulldown_cmark::{Options, Parser, html};
use quire::{BodyPolicy, Node};

use crate::context::{Context, Escape};
use crate::error::RenderError;
use crate::tag::{Body, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance};

/// `<markdown>` renders its text body, with references substituted, as HTML.
pub fn definition() -> TagDefinition {
    TagDefinition::new("markdown", BodyPolicy::RequireTextOnly, prepare)
}

struct Markdown;

fn prepare(_tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    Ok(Box::new(Markdown))
}

impl TagBehavior for Markdown {
    fn render<'a>(&'a self, body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        let result = body.interpolate(&ctx, Escape::Html).map(|text| {
            let source = dedent(text.as_deref().unwrap_or_default());
            let mut out = String::new();
            html::push_html(&mut out, Parser::new_ext(&source, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES));
            Rendered::new(ctx, vec![Node::Text(out)])
        });
        future::ready(result).boxed_local()
    }
}

/// Strip the indentation shared by every non-blank line, so markdown nested
/// in markup is not read as a code block.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
