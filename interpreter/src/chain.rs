use std::collections::BTreeSet;

use log::{debug, trace};
use quire::Node;
use quire::output::to_html;

use crate::block::{BlockId, BlockKind};
use crate::collection::Collection;
use crate::context::Context;
use crate::document::Document;
use crate::error::RenderError;
use crate::render;
use crate::response::ResponseState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStep {
    /// Run the `preceeds` effect of these blocks, in order.
    Replay(Vec<BlockId>),
    /// Run this block's `contains` check and continue in the context it yields.
    Gate(BlockId),
}

/// Reconstructs the context one position in the document is evaluated in,
/// replaying only the earlier computations it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    steps: Vec<ChainStep>,
}

/// Where a chain left off.
#[derive(Debug, Clone)]
pub struct ChainResult {
    pub context: Context,
    /// False when a full evaluation would never reach the position.
    pub found: bool,
}

impl Chain {
    /// Chain for the child at `seq` of `owner`, which needs `consumes` and,
    /// with `consumes_error`, the response error.
    pub fn child_chain(
        doc: &Document,
        owner: BlockId,
        seq: usize,
        consumes: &BTreeSet<String>,
        consumes_error: bool,
    ) -> Chain {
        let mut chain = Chain::default();
        chain.extend(doc, owner, seq, consumes, consumes_error);
        chain
    }

    fn extend(
        &mut self,
        doc: &Document,
        owner: BlockId,
        seq: usize,
        consumes: &BTreeSet<String>,
        consumes_error: bool,
    ) {
        let container = Collection::new(doc, owner).container_chain(seq, consumes, consumes_error);
        let block = doc.block(owner);

        if let Some(parent) = block.parent() {
            let own = block.own_report();
            let mut needs: BTreeSet<String> = container
                .consumes
                .iter()
                .filter(|name| !own.injects.contains(*name))
                .cloned()
                .collect();
            needs.extend(own.consumes.iter().cloned());
            let gate_reads_error = block.tag().is_some_and(|tag| tag.behavior.consumes_error());
            let needs_error = container.consumes_error || gate_reads_error;
            self.extend(doc, parent, block.seq(), &needs, needs_error);

            if matches!(block.kind, BlockKind::Tag(_)) && !block.is_looping() {
                self.steps.push(ChainStep::Gate(owner));
            }
        }

        if !container.members.is_empty() {
            self.steps.push(ChainStep::Replay(container.members));
        }
    }

    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    pub async fn run(&self, doc: &Document, ctx: Context) -> Result<ChainResult, RenderError> {
        let mut context = ctx;
        for step in &self.steps {
            match step {
                ChainStep::Replay(members) => {
                    for &member in members {
                        trace!("replaying {}", doc.block(member).path());
                        context = render::preceeds_block(doc, member, context).await?;
                    }
                }
                ChainStep::Gate(id) => {
                    let gate = render::contains_block(doc, *id, context).await?;
                    if !gate.found {
                        debug!("chain stopped at {}", doc.block(*id).path());
                        return Ok(ChainResult {
                            context: gate.context,
                            found: false,
                        });
                    }
                    context = gate.context;
                }
            }
        }
        Ok(ChainResult {
            context,
            found: true,
        })
    }
}

/// Evaluates one block as if the document had run up to it.
#[derive(Clone, Copy)]
pub struct Isolate<'a> {
    doc: &'a Document,
    id: BlockId,
}

/// Outcome of an isolated evaluation.
#[derive(Debug, Clone)]
pub struct Isolation {
    /// False is a not-found condition, never an error.
    pub found: bool,
    pub context: Context,
    pub nodes: Vec<Node>,
}

impl Isolation {
    pub fn html(&self) -> String {
        to_html(&self.nodes)
    }

    pub fn response(&self) -> ResponseState {
        self.context.response().snapshot()
    }
}

impl<'a> Isolate<'a> {
    pub(crate) fn new(doc: &'a Document, id: BlockId) -> Self {
        Isolate { doc, id }
    }

    pub fn block(&self) -> BlockId {
        self.id
    }

    /// The cached chain leading up to this block.
    pub fn chain(&self) -> &'a Chain {
        self.doc.chain(self.id)
    }

    /// Run the chain, then this block's own gate and render. A run-time
    /// failure is recorded in the response error instead of being returned.
    pub async fn run(&self, ctx: Context) -> Isolation {
        let response = ctx.response().clone();
        match self.try_run(ctx.clone()).await {
            Ok(isolation) => isolation,
            Err(err) => {
                debug!("isolating {} failed: {}", self.doc.block(self.id).path(), err);
                response.fail(&err);
                Isolation {
                    found: true,
                    context: ctx,
                    nodes: Vec::new(),
                }
            }
        }
    }

    async fn try_run(&self, ctx: Context) -> Result<Isolation, RenderError> {
        let doc = self.doc;
        let reached = self.chain().run(doc, ctx).await?;
        if !reached.found {
            return Ok(Isolation {
                found: false,
                context: reached.context,
                nodes: Vec::new(),
            });
        }

        let block = doc.block(self.id);
        if matches!(block.kind, BlockKind::Tag(_)) && !block.is_looping() {
            let gate = render::contains_block(doc, self.id, reached.context.clone()).await?;
            if !gate.found {
                return Ok(Isolation {
                    found: false,
                    context: gate.context,
                    nodes: Vec::new(),
                });
            }
        }

        let rendered = render::render_block(doc, self.id, reached.context).await?;
        Ok(Isolation {
            found: true,
            context: rendered.context,
            nodes: rendered.nodes,
        })
    }
}
