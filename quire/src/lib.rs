pub mod element;
pub mod error;
pub mod output;
pub mod parser;
pub mod scanner;
pub mod tagspec;

pub use element::{Attribute, Element, Location, TagNode, TextNode};
pub use error::ValidationError;
pub use output::Node;
pub use scanner::{Dialect, Scope, Segment, VarToken};
pub use tagspec::{AttributeKind, AttributeSpec, BodyPolicy};
