use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Root dataset names every document may reference as globals.
/// `params` and `body` are only recognized under tags that inject them.
pub const BASE_GLOBALS: &[&str] = &[
    "path",
    "matchedPath",
    "query",
    "method",
    "headers",
    "cookies",
    "action",
];

/// The per-request dataset supplied by the web layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    pub path: String,
    pub matched_path: String,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// True for an action (submission) evaluation, false for a loading one.
    pub action: bool,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            path: "/".to_string(),
            matched_path: "/".to_string(),
            params: BTreeMap::new(),
            query: BTreeMap::new(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            body: None,
            action: false,
        }
    }
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        let path = path.into();
        Request {
            matched_path: path.clone(),
            path,
            ..Request::default()
        }
    }

    /// A submission carrying `body`.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Request {
            method: "POST".to_string(),
            body: Some(body),
            action: true,
            ..Request::get(path)
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The dataset as the JSON object globals are resolved against.
    pub fn to_value(&self) -> Value {
        json!({
            "path": self.path,
            "matchedPath": self.matched_path,
            "params": self.params,
            "query": self.query,
            "method": self.method,
            "headers": self.headers,
            "cookies": self.cookies,
            "body": self.body.clone().unwrap_or(Value::Null),
            "action": self.action,
        })
    }
}
