use std::fmt;

use serde::Serialize;

/// How an attribute's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Free text; variable references are substituted at render time.
    Template,
    /// Taken literally, never variable-templated.
    Special,
    /// Exactly one variable reference, read to select or narrow context.
    Source,
    /// Exactly one bare variable, defined for later siblings.
    Target,
    /// Exactly one bare variable, defined only for descendants.
    Inject,
    /// A path resolved against the document's location.
    Relative,
    /// A literal route path served by isolating this block.
    Route,
}

/// Declaration of one attribute a tag accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub required: bool,
}

impl AttributeSpec {
    pub const fn new(name: &'static str, kind: AttributeKind) -> Self {
        AttributeSpec {
            name,
            kind,
            required: false,
        }
    }

    pub const fn template(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Template)
    }

    pub const fn special(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Special)
    }

    pub const fn source(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Source)
    }

    pub const fn target(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Target)
    }

    pub const fn inject(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Inject)
    }

    pub const fn relative(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Relative)
    }

    pub const fn route(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Route)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// What a tag accepts as content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyPolicy {
    Allow,
    Require,
    Deny,
    /// Exactly one text child.
    RequireTextOnly,
    /// Nothing, or exactly one text child.
    AllowTextOnly,
}

impl BodyPolicy {
    /// Check a body given its non-blank children. `texts` counts text children among them.
    pub fn check(&self, children: usize, texts: usize) -> Result<(), BodyViolation> {
        match self {
            BodyPolicy::Allow => Ok(()),
            BodyPolicy::Require if children == 0 => Err(BodyViolation::Missing),
            BodyPolicy::Require => Ok(()),
            BodyPolicy::Deny if children > 0 => Err(BodyViolation::Unexpected),
            BodyPolicy::Deny => Ok(()),
            BodyPolicy::RequireTextOnly if children == 1 && texts == 1 => Ok(()),
            BodyPolicy::RequireTextOnly => Err(BodyViolation::NotText { required: true }),
            BodyPolicy::AllowTextOnly if children == 0 || (children == 1 && texts == 1) => Ok(()),
            BodyPolicy::AllowTextOnly => Err(BodyViolation::NotText { required: false }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyViolation {
    Missing,
    Unexpected,
    NotText { required: bool },
}

impl fmt::Display for BodyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyViolation::Missing => write!(f, "must have content"),
            BodyViolation::Unexpected => write!(f, "must not have content"),
            BodyViolation::NotText { required: true } => {
                write!(f, "must contain exactly one text node")
            }
            BodyViolation::NotText { required: false } => {
                write!(f, "may only contain a single text node")
            }
        }
    }
}
