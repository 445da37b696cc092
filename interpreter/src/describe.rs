use std::fmt;

use serde::Serialize;

use crate::block::BlockId;
use crate::document::Document;
use crate::report::BlockReport;

/// Read-only view of a loaded document's dependency graph, for tooling.
#[derive(Debug, Clone, Serialize)]
pub struct Description {
    pub id: BlockId,
    pub name: String,
    pub path: String,
    pub kind: &'static str,
    pub dynamic: bool,
    pub report: BlockReport,
    /// Sequence indices of the earlier siblings this block waits on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waits_on: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Description>,
}

impl Description {
    pub(crate) fn of(doc: &Document, id: BlockId, waits_on: &[usize]) -> Description {
        let block = doc.block(id);
        let order = doc.collection(id).render_order();
        let children = block
            .children()
            .iter()
            .zip(&order)
            .filter(|&(&child, _)| !doc.block(child).is_blank())
            .map(|(&child, waits)| Description::of(doc, child, waits))
            .collect();
        Description {
            id,
            name: block.name().to_string(),
            path: block.path().to_string(),
            kind: block.kind_name(),
            dynamic: block.is_dynamic(),
            report: doc.report(id).clone(),
            waits_on: waits_on.to_vec(),
            children,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.name, indent = depth * 2)?;
        if self.kind == "tag" {
            write!(f, " (tag)")?;
        } else if !self.dynamic {
            write!(f, " (constant)")?;
        }
        let report = &self.report;
        write_names(f, "provides", report.provides.iter())?;
        write_names(f, "consumes", report.consumes.iter())?;
        write_names(f, "injects", report.injects.iter())?;
        write_names(f, "globals", report.globals.iter())?;
        if report.consumes_error {
            write!(f, " consumes-error")?;
        }
        if !self.waits_on.is_empty() {
            let waits: Vec<String> = self.waits_on.iter().map(|s| s.to_string()).collect();
            write!(f, " waits-on=[{}]", waits.join(","))?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

fn write_names<'a>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    names: impl Iterator<Item = &'a String>,
) -> fmt::Result {
    let names: Vec<&str> = names.map(String::as_str).collect();
    if names.is_empty() {
        return Ok(());
    }
    write!(f, " {}=[{}]", label, names.join(","))
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
