use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use quire::scanner::{self, Dialect};
use quire::{AttributeKind, Segment, TagNode, ValidationError, VarToken};

use crate::report::BlockReport;
use crate::tag::TagDefinition;

/// A validated attribute value, shaped by its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Template(Vec<Segment>),
    Special(String),
    Source(VarToken),
    Target(String),
    Inject(String),
    Relative(PathBuf),
    Route(String),
}

/// The attributes of one DSL tag instance, checked against its definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagAttributes {
    values: Vec<(&'static str, AttributeValue)>,
}

impl TagAttributes {
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn template(&self, name: &str) -> Option<&[Segment]> {
        match self.get(name)? {
            AttributeValue::Template(segments) => Some(segments),
            _ => None,
        }
    }

    pub fn special(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            AttributeValue::Special(s) | AttributeValue::Route(s) => Some(s),
            _ => None,
        }
    }

    pub fn source(&self, name: &str) -> Option<&VarToken> {
        match self.get(name)? {
            AttributeValue::Source(token) => Some(token),
            _ => None,
        }
    }

    /// The variable name of a target or inject attribute.
    pub fn binding(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            AttributeValue::Target(n) | AttributeValue::Inject(n) => Some(n),
            _ => None,
        }
    }

    pub fn relative(&self, name: &str) -> Option<&Path> {
        match self.get(name)? {
            AttributeValue::Relative(path) => Some(path),
            _ => None,
        }
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(|(_, v)| match v {
            AttributeValue::Route(path) => Some(path.as_str()),
            _ => None,
        })
    }

    /// The dataflow contribution of the attributes alone.
    pub fn report(&self) -> BlockReport {
        let mut report = BlockReport::default();
        let mut add_token = |report: &mut BlockReport, token: &VarToken| {
            if token.is_global() {
                report.globals.insert(token.name.clone());
            } else {
                report.consumes.insert(token.name.clone());
            }
        };
        for (_, value) in &self.values {
            match value {
                AttributeValue::Template(segments) => {
                    for segment in segments {
                        if let Segment::Var(token) = segment {
                            add_token(&mut report, token);
                        }
                    }
                }
                AttributeValue::Source(token) => add_token(&mut report, token),
                AttributeValue::Target(name) => report.add_provide(name.clone()),
                AttributeValue::Inject(name) => {
                    report.injects.insert(name.clone());
                }
                AttributeValue::Special(_) | AttributeValue::Relative(_) | AttributeValue::Route(_) => {}
            }
        }
        report
    }
}

/// Check `node`'s attributes against `definition`, collecting every problem.
pub(crate) fn validate(
    definition: &TagDefinition,
    node: &TagNode,
    dialect: Dialect,
    base_dir: &Path,
    errors: &mut Vec<ValidationError>,
) -> TagAttributes {
    let error = |message: String| ValidationError::new(message, &node.location).in_tag(&node.name);
    let mut values = Vec::new();

    for attribute in &node.attributes {
        if definition.spec(&attribute.name).is_none() {
            errors.push(error(format!("unknown attribute '{}'", attribute.name)).with_note(format!(
                "<{}> accepts: {}",
                definition.name,
                definition
                    .attributes
                    .iter()
                    .map(|a| a.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
    }

    for spec in &definition.attributes {
        let Some(raw) = node.attribute(spec.name) else {
            if spec.required {
                errors.push(error(format!("missing required attribute '{}'", spec.name)));
            }
            continue;
        };

        let value = match spec.kind {
            AttributeKind::Template => Ok(AttributeValue::Template(scanner::scan(raw, dialect))),
            AttributeKind::Special => Ok(AttributeValue::Special(raw.to_string())),
            AttributeKind::Source => scanner::sole_token(raw, dialect)
                .map(AttributeValue::Source)
                .ok_or_else(|| {
                    format!(
                        "attribute '{}' must contain exactly one variable reference",
                        spec.name
                    )
                }),
            AttributeKind::Target | AttributeKind::Inject => match scanner::sole_token(raw, dialect) {
                Some(token) if !token.is_global() && token.path.is_empty() => {
                    if spec.kind == AttributeKind::Target {
                        Ok(AttributeValue::Target(token.name))
                    } else {
                        Ok(AttributeValue::Inject(token.name))
                    }
                }
                _ => Err(format!(
                    "attribute '{}' must be exactly one variable, like $name",
                    spec.name
                )),
            },
            AttributeKind::Relative => resolve_relative(base_dir, raw)
                .map(AttributeValue::Relative)
                .ok_or_else(|| {
                    format!(
                        "attribute '{}' points outside the document directory: {}",
                        spec.name, raw
                    )
                }),
            AttributeKind::Route if raw.starts_with('/') => Ok(AttributeValue::Route(raw.to_string())),
            AttributeKind::Route => Err(format!(
                "attribute '{}' must be a route path starting with '/'",
                spec.name
            )),
        };

        match value {
            Ok(value) => values.push((spec.name, value)),
            Err(message) => errors.push(error(message)),
        }
    }

    // One tag may not bind the same name twice.
    let mut bound = BTreeSet::new();
    for (_, value) in &values {
        if let AttributeValue::Target(name) | AttributeValue::Inject(name) = value {
            if !bound.insert(name.as_str()) {
                errors.push(error(format!("{} redefined", name)));
            }
        }
    }

    TagAttributes { values }
}

/// Resolve `raw` against `base_dir` without letting `..` climb above it.
pub(crate) fn resolve_relative(base_dir: &Path, raw: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(raw.trim()).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                parts.pop()?;
            }
        }
    }
    let mut path = base_dir.to_path_buf();
    path.extend(parts);
    Some(path)
}

/// Names and globals referenced by an inbuilt element's attributes.
pub(crate) fn template_report(attributes: &[(String, Vec<Segment>)]) -> BlockReport {
    let mut report = BlockReport::default();
    for (_, segments) in attributes {
        for segment in segments {
            if let Segment::Var(token) = segment {
                if token.is_global() {
                    report.globals.insert(token.name.clone());
                } else {
                    report.consumes.insert(token.name.clone());
                }
            }
        }
    }
    report
}
