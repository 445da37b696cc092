use std::collections::BTreeSet;

use quire::ValidationError;

use crate::block::{BlockId, BlockKind};
use crate::document::Document;
use crate::report::BlockReport;

/// The ordered children of one block.
#[derive(Clone, Copy)]
pub struct Collection<'a> {
    doc: &'a Document,
    owner: BlockId,
    members: &'a [BlockId],
}

/// The minimal run of earlier siblings whose replay defines a set of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerChain {
    /// In document order.
    pub members: Vec<BlockId>,
    /// Names still needed from outside the collection.
    pub consumes: BTreeSet<String>,
    pub globals: BTreeSet<String>,
    /// Whether the response error is still needed from outside.
    pub consumes_error: bool,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(doc: &'a Document, owner: BlockId) -> Self {
        Collection {
            doc,
            owner,
            members: doc.block(owner).children(),
        }
    }

    pub fn owner(&self) -> BlockId {
        self.owner
    }

    pub fn members(&self) -> &'a [BlockId] {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fold the children's reports in document order.
    pub fn agg_report(&self) -> BlockReport {
        let mut agg = BlockReport::default();
        for &child in self.members {
            agg.append(self.doc.report(child));
        }
        agg
    }

    /// Check every child against the names available before it, collecting
    /// undefined, redefined and unknown-global errors for the whole subtree.
    pub fn check_all_consumer(
        &self,
        defined: &BTreeSet<String>,
        globals: &BTreeSet<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        let mut available = defined.clone();
        for &child in self.members {
            let block = self.doc.block(child);
            let own = block.own_report();
            let error = |message: String| {
                let err = ValidationError::new(message, block.location());
                match &block.kind {
                    BlockKind::Tag(_) => err.in_tag(block.name()),
                    _ => err,
                }
            };

            match &block.kind {
                BlockKind::Root => {}
                BlockKind::Text(_) | BlockKind::Inbuilt(_) => {
                    check_references(&own, &available, globals, &error, errors);
                    if matches!(block.kind, BlockKind::Inbuilt(_)) {
                        Collection::new(self.doc, child).check_all_consumer(&available, globals, errors);
                    }
                }
                BlockKind::Tag(_) => {
                    let mut scoped_globals = globals.clone();
                    scoped_globals.extend(block.inject_globals());
                    check_references(&own, &available, &scoped_globals, &error, errors);

                    for name in own.provides.iter().chain(&own.injects) {
                        if available.contains(name) {
                            errors.push(error(format!("{} redefined", name)));
                        }
                    }

                    let mut inner = available.clone();
                    inner.extend(own.injects.iter().cloned());
                    Collection::new(self.doc, child).check_all_consumer(&inner, &scoped_globals, errors);
                }
            }

            available.extend(self.doc.report(child).provides.iter().cloned());
        }
    }

    /// For each child, the indices of the earlier siblings it must wait on.
    ///
    /// A child waits on every earlier sibling providing a name it consumes.
    /// A child reading the response error waits on all earlier siblings.
    pub fn render_order(&self) -> Vec<Vec<usize>> {
        let reports: Vec<&BlockReport> = self.members.iter().map(|&c| self.doc.report(c)).collect();
        reports
            .iter()
            .enumerate()
            .map(|(i, report)| {
                (0..i)
                    .filter(|&j| report.consumes_error || reports[j].provides_any(&report.consumes))
                    .collect()
            })
            .collect()
    }

    /// Earlier siblings of position `seq` needed to define `consumes`, found
    /// by a reverse scan that also pulls in what those siblings need.
    ///
    /// When `consumes_error` is set the response error must be reproduced,
    /// so every earlier non-text sibling is pulled in.
    pub fn container_chain(&self, seq: usize, consumes: &BTreeSet<String>, consumes_error: bool) -> ContainerChain {
        let mut outstanding = consumes.clone();
        let mut wants_error = consumes_error;
        let mut globals = BTreeSet::new();
        let mut members = Vec::new();

        for &sibling in self.members[..seq.min(self.members.len())].iter().rev() {
            let report = self.doc.report(sibling);
            let is_text = matches!(self.doc.block(sibling).kind, BlockKind::Text(_));
            if !report.provides_any(&outstanding) && (is_text || !wants_error) {
                continue;
            }
            for name in &report.provides {
                outstanding.remove(name);
            }
            outstanding.extend(report.consumes.iter().cloned());
            globals.extend(report.globals.iter().cloned());
            wants_error |= report.consumes_error;
            members.push(sibling);
        }

        members.reverse();
        ContainerChain {
            members,
            consumes: outstanding,
            globals,
            consumes_error: wants_error,
        }
    }
}

fn check_references(
    own: &BlockReport,
    available: &BTreeSet<String>,
    globals: &BTreeSet<String>,
    error: &dyn Fn(String) -> ValidationError,
    errors: &mut Vec<ValidationError>,
) {
    for name in own.consumes.iter().filter(|n| !available.contains(*n)) {
        errors.push(error(format!("{} not defined", name)));
    }
    for name in own.globals.iter().filter(|n| !globals.contains(*n)) {
        errors.push(error(format!("{} is not a known global", name)));
    }
}
