use std::collections::BTreeSet;

use serde::Serialize;

/// Dataflow summary of a block or a collection of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockReport {
    /// Names defined for later siblings, in definition order.
    pub provides: Vec<String>,
    /// Names that must already be defined.
    pub consumes: BTreeSet<String>,
    /// Names defined only for descendants.
    pub injects: BTreeSet<String>,
    /// Root dataset fields referenced.
    pub globals: BTreeSet<String>,
    #[serde(rename = "doesConsumeError")]
    pub consumes_error: bool,
}

impl BlockReport {
    pub fn add_provide(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.provides.contains(&name) {
            self.provides.push(name);
        }
    }

    pub fn provides_any(&self, names: &BTreeSet<String>) -> bool {
        self.provides.iter().any(|p| names.contains(p))
    }

    pub fn is_empty(&self) -> bool {
        self.provides.is_empty()
            && self.consumes.is_empty()
            && self.injects.is_empty()
            && self.globals.is_empty()
            && !self.consumes_error
    }

    /// Fold `next` in after everything already aggregated: names it consumes
    /// that are provided earlier are resolved locally and do not propagate.
    pub fn append(&mut self, next: &BlockReport) {
        for name in &next.consumes {
            if !self.provides.contains(name) {
                self.consumes.insert(name.clone());
            }
        }
        for name in &next.provides {
            self.add_provide(name.clone());
        }
        self.globals.extend(next.globals.iter().cloned());
        self.consumes_error |= next.consumes_error;
    }
}
