use std::cell::{Ref, RefCell};
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// A run-time failure caught at an isolate boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorState {
    pub code: u16,
    pub message: String,
}

/// What one request's evaluation accumulates besides output elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseState {
    pub cookies: Vec<Cookie>,
    pub status: Option<u16>,
    pub redirect: Option<String>,
    pub error: Option<ErrorState>,
    /// API output, for documents that answer with data instead of markup.
    pub output: Option<Value>,
}

/// The response state shared by every fork of one request's context.
///
/// Writers do not coordinate: concurrent sibling branches race and the last
/// write wins.
#[derive(Debug, Clone, Default)]
pub struct SharedResponse(Rc<RefCell<ResponseState>>);

impl SharedResponse {
    pub fn new() -> Self {
        SharedResponse::default()
    }

    pub fn get(&self) -> Ref<'_, ResponseState> {
        self.0.borrow()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ResponseState {
        self.0.borrow().clone()
    }

    pub fn status(&self) -> Option<u16> {
        self.0.borrow().status
    }

    pub fn set_status(&self, code: u16) {
        self.0.borrow_mut().status = Some(code);
    }

    pub fn redirect(&self, to: impl Into<String>) {
        let mut state = self.0.borrow_mut();
        state.redirect = Some(to.into());
        if state.status.is_none() {
            state.status = Some(303);
        }
    }

    pub fn add_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.0.borrow_mut().cookies.push(Cookie {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn set_output(&self, value: Value) {
        self.0.borrow_mut().output = Some(value);
    }

    pub fn error(&self) -> Option<ErrorState> {
        self.0.borrow().error.clone()
    }

    /// Record a failure.
    pub fn fail(&self, err: &RenderError) {
        self.0.borrow_mut().error = Some(ErrorState {
            code: err.code(),
            message: err.to_string(),
        });
    }

    /// Remove and return the recorded failure.
    pub fn take_error(&self) -> Option<ErrorState> {
        self.0.borrow_mut().error.take()
    }

    pub fn ptr_eq(&self, other: &SharedResponse) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
