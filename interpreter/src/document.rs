use std::collections::BTreeMap;
use std::sync::Arc;

use crate::block::{Block, BlockId, BlockKind};
use crate::chain::{Chain, Isolate, Isolation};
use crate::collection::Collection;
use crate::context::Context;
use crate::describe::Description;
use crate::report::BlockReport;
use crate::request::Request;

/// A loaded, validated document: a block arena under a synthetic root.
pub struct Document {
    pub(crate) blocks: Vec<Block>,
    pub(crate) root: BlockId,
    pub(crate) filename: Arc<str>,
    pub(crate) routes: BTreeMap<String, BlockId>,
}

impl Document {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block(self.root).children().is_empty()
    }

    /// The dataflow report of a block, computed once.
    pub fn report(&self, id: BlockId) -> &BlockReport {
        self.block(id).report.get_or_init(|| self.compute_report(id))
    }

    fn compute_report(&self, id: BlockId) -> BlockReport {
        let block = self.block(id);
        match &block.kind {
            BlockKind::Root => self.collection(id).agg_report(),
            BlockKind::Text(_) => block.own_report(),
            BlockKind::Inbuilt(_) => {
                let mut report = block.own_report();
                report.append(&self.collection(id).agg_report());
                report
            }
            BlockKind::Tag(tag) => {
                let mut report = tag.own.clone();
                let body = self.collection(id).agg_report();
                let injected = tag.behavior.inject_globals();
                report.consumes.extend(
                    body.consumes
                        .into_iter()
                        .filter(|name| !tag.own.injects.contains(name)),
                );
                report.globals.extend(body.globals);
                report.globals.retain(|name| !injected.contains(name));
                report.consumes_error = tag.behavior.consumes_error() || body.consumes_error;
                report
            }
        }
    }

    pub fn collection(&self, owner: BlockId) -> Collection<'_> {
        Collection::new(self, owner)
    }

    pub(crate) fn chain(&self, id: BlockId) -> &Chain {
        self.block(id).chain.get_or_init(|| {
            let block = self.block(id);
            match block.parent() {
                Some(parent) => {
                    let report = self.report(id);
                    Chain::child_chain(self, parent, block.seq(), &report.consumes, report.consumes_error)
                }
                None => Chain::default(),
            }
        })
    }

    pub fn isolate(&self, id: BlockId) -> Isolate<'_> {
        Isolate::new(self, id)
    }

    /// Evaluate the whole document for one request.
    pub async fn render(&self, request: &Request) -> Isolation {
        self.isolate(self.root).run(Context::new(request)).await
    }

    /// The block registered under a route path.
    pub fn route(&self, path: &str) -> Option<BlockId> {
        self.routes.get(path).copied()
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, BlockId)> {
        self.routes.iter().map(|(path, &id)| (path.as_str(), id))
    }

    /// Evaluate only the block registered under `path`, with `matchedPath`
    /// set to the route. `None` when no block is registered there.
    pub async fn render_route(&self, path: &str, request: &Request) -> Option<Isolation> {
        let id = self.route(path)?;
        let request = Request {
            matched_path: path.to_string(),
            ..request.clone()
        };
        Some(self.isolate(id).run(Context::new(&request)).await)
    }

    /// First block in document order matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&Block) -> bool) -> Option<BlockId> {
        self.blocks.iter().find(|&b| predicate(b)).map(|b| b.id)
    }

    /// Every block matching `predicate`, in document order.
    pub fn find_all(&self, predicate: impl Fn(&Block) -> bool) -> Vec<BlockId> {
        self.blocks.iter().filter(|&b| predicate(b)).map(|b| b.id).collect()
    }

    /// Nearest ancestor matching `predicate`. The root ends the search and is
    /// never returned.
    pub fn find_ancestor(&self, id: BlockId, predicate: impl Fn(&Block) -> bool) -> Option<BlockId> {
        let mut current = self.block(id).parent();
        while let Some(ancestor) = current {
            let block = self.block(ancestor);
            if block.is_root() {
                return None;
            }
            if predicate(block) {
                return Some(ancestor);
            }
            current = block.parent();
        }
        None
    }

    pub fn describe(&self) -> Description {
        Description::of(self, self.root, &[])
    }
}
