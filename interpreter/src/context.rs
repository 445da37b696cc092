use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use quire::output::escape_html;
use quire::{Segment, VarToken};
use serde_json::Value;

use crate::error::RenderError;
use crate::request::Request;
use crate::response::SharedResponse;
use crate::value;

/// How substituted values are written into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    None,
    Html,
}

/// One scope level: the bindings introduced by a single fork.
struct Scope {
    locals: HashMap<String, Value>,
    parent: Option<Rc<Scope>>,
    /// The root request dataset, shared by the whole lineage.
    root: Rc<Value>,
    response: SharedResponse,
}

/// The data environment a block is evaluated in.
///
/// A context is immutable; introducing names forks a new child scope.
/// Every fork of one request shares the same root dataset and response state.
#[derive(Clone)]
pub struct Context {
    scope: Rc<Scope>,
}

impl Context {
    pub fn new(request: &Request) -> Self {
        Context::from_root(request.to_value())
    }

    pub fn from_root(root: Value) -> Self {
        Context {
            scope: Rc::new(Scope {
                locals: HashMap::new(),
                parent: None,
                root: Rc::new(root),
                response: SharedResponse::new(),
            }),
        }
    }

    pub fn response(&self) -> &SharedResponse {
        &self.scope.response
    }

    /// The root request dataset.
    pub fn root(&self) -> &Value {
        &self.scope.root
    }

    /// A field of the root request dataset.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.scope.root.get(name)
    }

    /// True when evaluating an action (submission) rather than a load.
    pub fn is_action(&self) -> bool {
        self.global("action").is_some_and(value::is_truthy)
    }

    /// Look up a local variable, searching from the innermost scope outward.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes().find_map(|scope| scope.locals.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fork with one new binding.
    pub fn set_var(&self, name: impl Into<String>, value: Value) -> Context {
        self.select([(name.into(), value)])
    }

    /// Fork with several new bindings.
    pub fn select(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Context {
        self.fork(bindings.into_iter().collect())
    }

    fn fork(&self, locals: HashMap<String, Value>) -> Context {
        Context {
            scope: Rc::new(Scope {
                locals,
                parent: Some(self.scope.clone()),
                root: self.scope.root.clone(),
                response: self.scope.response.clone(),
            }),
        }
    }

    /// Overlay the bindings `other` introduced since it diverged from this
    /// context. The response state is untouched.
    pub fn merge(&self, other: &Context) -> Context {
        let mine: HashSet<*const Scope> = self.scopes().map(std::ptr::from_ref).collect();
        let mut overlay: HashMap<String, Value> = HashMap::new();
        for scope in other.scopes() {
            if mine.contains(&std::ptr::from_ref(scope)) {
                break;
            }
            for (name, value) in &scope.locals {
                overlay
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        if overlay.is_empty() {
            self.clone()
        } else {
            self.fork(overlay)
        }
    }

    /// All visible local bindings, innermost winning.
    pub fn bindings(&self) -> BTreeMap<String, Value> {
        let mut all = BTreeMap::new();
        for scope in self.scopes() {
            for (name, value) in &scope.locals {
                all.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        all
    }

    fn scopes(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(&*self.scope), |scope| scope.parent.as_deref())
    }

    /// The value a reference points at. A missing path below a defined name is null.
    pub fn resolve(&self, token: &VarToken) -> Result<Value, RenderError> {
        let base = if token.is_global() {
            self.global(&token.name)
        } else {
            self.get(&token.name)
        };
        let base = base.ok_or_else(|| RenderError::UndefinedVariable(token.name.clone()))?;
        Ok(value::lookup(base, &token.path)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Substitute every reference in `segments`.
    pub fn interpolate(&self, segments: &[Segment], escape: Escape) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(token) => {
                    let text = value::to_text(&self.resolve(token)?);
                    match escape {
                        Escape::None => out.push_str(&text),
                        Escape::Html => out.push_str(&escape_html(&text)),
                    }
                }
            }
        }
        Ok(out)
    }

    /// A templated value: a lone reference keeps its JSON value, anything
    /// else becomes a string.
    pub fn evaluate(&self, segments: &[Segment]) -> Result<Value, RenderError> {
        match segments {
            [Segment::Var(token)] => self.resolve(token),
            _ => Ok(Value::String(self.interpolate(segments, Escape::None)?)),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.bindings())
            .field("response", &*self.response().get())
            .finish()
    }
}
