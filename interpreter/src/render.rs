use futures_util::future::{self, FutureExt, LocalBoxFuture, Shared};
use log::{trace, warn};
use quire::Node;

use crate::block::{BlockId, BlockKind};
use crate::collection::Collection;
use crate::context::{Context, Escape};
use crate::document::Document;
use crate::error::RenderError;
use crate::tag::{Body, Gate, Rendered};

type Task<'a> = Shared<LocalBoxFuture<'a, Result<Rendered, RenderError>>>;

/// Full evaluation of one block.
pub(crate) fn render_block<'a>(
    doc: &'a Document,
    id: BlockId,
    ctx: Context,
) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
    let block = doc.block(id);
    match &block.kind {
        BlockKind::Text(text) => {
            let rendered = ctx
                .interpolate(&text.segments, Escape::Html)
                .map(|s| Rendered::new(ctx, vec![Node::Text(s)]));
            future::ready(rendered).boxed_local()
        }
        BlockKind::Inbuilt(inbuilt) => match &inbuilt.constant {
            Some(node) => future::ready(Ok(Rendered::new(ctx, vec![node.clone()]))).boxed_local(),
            None => async move {
                let mut attributes = Vec::with_capacity(inbuilt.attributes.len());
                for (name, segments) in &inbuilt.attributes {
                    attributes.push((name.clone(), ctx.interpolate(segments, Escape::Html)?));
                }
                let inner = render_collection(doc, id, ctx).await?;
                Ok(Rendered::new(
                    inner.context,
                    vec![Node::element(inbuilt.name.clone(), attributes, inner.nodes)],
                ))
            }
            .boxed_local(),
        },
        BlockKind::Tag(tag) => tag.behavior.render(Body::new(doc, id), ctx),
        BlockKind::Root => render_collection(doc, id, ctx).boxed_local(),
    }
}

/// Render the children of `owner` as concurrent tasks.
///
/// Each child first awaits the earlier siblings it depends on and merges
/// their resulting contexts into its own. A failed prerequisite is logged
/// and skipped. Output is reassembled in document order.
pub(crate) async fn render_collection(
    doc: &Document,
    owner: BlockId,
    ctx: Context,
) -> Result<Rendered, RenderError> {
    let collection = Collection::new(doc, owner);
    let order = collection.render_order();
    let mut tasks: Vec<Task<'_>> = Vec::with_capacity(collection.len());

    for (i, &child) in collection.members().iter().enumerate() {
        let waits: Vec<(BlockId, Task<'_>)> = order[i]
            .iter()
            .map(|&j| (collection.members()[j], tasks[j].clone()))
            .collect();
        let start = ctx.clone();
        let task = async move {
            let mut working = start;
            for (dependency, task) in waits {
                trace!("{} waits on {}", child, dependency);
                match task.await {
                    Ok(done) => working = working.merge(&done.context),
                    Err(err) => warn!(
                        "{} continues without prerequisite {}: {}",
                        doc.block(child).path(),
                        doc.block(dependency).path(),
                        err
                    ),
                }
            }
            render_block(doc, child, working).await
        }
        .boxed_local()
        .shared();
        tasks.push(task);
    }

    let results = future::join_all(tasks).await;

    let mut context = ctx;
    let mut nodes = Vec::new();
    for result in results {
        let rendered = result?;
        context = context.merge(&rendered.context);
        nodes.extend(rendered.nodes);
    }
    Ok(Rendered::new(context, nodes))
}

/// Apply a block's state-changing effect without producing output.
pub(crate) fn preceeds_block<'a>(
    doc: &'a Document,
    id: BlockId,
    ctx: Context,
) -> LocalBoxFuture<'a, Result<Context, RenderError>> {
    let block = doc.block(id);
    match &block.kind {
        BlockKind::Text(_) => future::ready(Ok(ctx)).boxed_local(),
        BlockKind::Tag(tag) => tag.behavior.preceeds(Body::new(doc, id), ctx),
        BlockKind::Inbuilt(_) | BlockKind::Root => async move {
            let mut ctx = ctx;
            for &child in block.children() {
                if !matches!(doc.block(child).kind, BlockKind::Text(_)) {
                    ctx = preceeds_block(doc, child, ctx).await?;
                }
            }
            Ok(ctx)
        }
        .boxed_local(),
    }
}

/// Whether evaluation reaches inside a block. Only tags gate.
pub(crate) fn contains_block<'a>(
    doc: &'a Document,
    id: BlockId,
    ctx: Context,
) -> LocalBoxFuture<'a, Result<Gate, RenderError>> {
    match &doc.block(id).kind {
        BlockKind::Tag(tag) => tag.behavior.contains(Body::new(doc, id), ctx),
        _ => future::ready(Ok(Gate::found(ctx))).boxed_local(),
    }
}
