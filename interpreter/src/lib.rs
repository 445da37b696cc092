pub mod block;
pub mod chain;
pub mod collection;
pub mod context;
pub mod describe;
pub mod document;
pub mod engine;
pub mod error;
pub mod options;
mod render;
pub mod report;
pub mod request;
pub mod response;
pub mod tag;
pub mod tags;
pub mod value;

pub use block::{Block, BlockId, BlockKind};
pub use chain::{Chain, ChainResult, ChainStep, Isolate, Isolation};
pub use collection::{Collection, ContainerChain};
pub use context::{Context, Escape};
pub use describe::Description;
pub use document::Document;
pub use engine::Engine;
pub use error::{LoadError, RenderError};
pub use options::{DialectName, EngineOptions};
pub use report::BlockReport;
pub use request::{BASE_GLOBALS, Request};
pub use response::{Cookie, ErrorState, ResponseState, SharedResponse};
pub use tag::{Body, Gate, PrepareError, Rendered, TagBehavior, TagDefinition, TagInstance, TagRegistry};
