use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use log::debug;
use quire::parser::Parser;
use quire::{Element, ValidationError};

use crate::block::BlockId;
use crate::block::build::Builder;
use crate::document::Document;
use crate::error::LoadError;
use crate::options::EngineOptions;
use crate::request::BASE_GLOBALS;
use crate::tag::TagRegistry;

/// Turns sources into validated documents.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    pub registry: TagRegistry,
    pub options: EngineOptions,
}

impl Engine {
    pub fn new(registry: TagRegistry, options: EngineOptions) -> Self {
        Engine { registry, options }
    }

    /// An engine with the standard tag library and default options.
    pub fn standard() -> Self {
        Engine::new(TagRegistry::standard(), EngineOptions::default())
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse and build a document from markup source.
    pub fn load(&self, filename: &str, source: &str, file_id: usize) -> Result<Document, LoadError> {
        let elements = Parser::new(filename, source, file_id)
            .parse()
            .map_err(|errors| LoadError { errors })?;
        self.build(filename, &elements)
    }

    /// Build a document from an element tree, collecting every load-time
    /// error before giving up.
    pub fn build(&self, filename: &str, elements: &[Element]) -> Result<Document, LoadError> {
        let base_dir = Path::new(filename)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let builder = Builder::new(
            &self.registry,
            self.options.text_dialect.dialect(),
            self.options.attribute_dialect.dialect(),
            base_dir,
        );
        let (blocks, mut errors) = builder.build(filename, elements);

        let mut document = Document {
            blocks,
            root: BlockId(0),
            filename: Arc::from(filename),
            routes: BTreeMap::new(),
        };
        document.routes = collect_routes(&document, &mut errors);

        let globals: BTreeSet<String> = BASE_GLOBALS
            .iter()
            .map(|g| g.to_string())
            .chain(self.options.globals.iter().cloned())
            .collect();
        document
            .collection(document.root)
            .check_all_consumer(&BTreeSet::new(), &globals, &mut errors);

        if errors.is_empty() {
            debug!("loaded {} ({} blocks)", filename, document.len());
            Ok(document)
        } else {
            errors.sort_by(|a, b| (a.file_id, a.span.start).cmp(&(b.file_id, b.span.start)));
            Err(LoadError { errors })
        }
    }
}

fn collect_routes(document: &Document, errors: &mut Vec<ValidationError>) -> BTreeMap<String, BlockId> {
    let mut routes: BTreeMap<String, BlockId> = BTreeMap::new();
    for block in document.blocks() {
        let Some(tag) = block.tag() else { continue };
        for path in tag.attributes.routes() {
            match routes.get(path) {
                Some(&first) => {
                    let first = document.block(first).location();
                    errors.push(
                        ValidationError::new(format!("duplicate route path '{}'", path), block.location())
                            .in_tag(block.name())
                            .with_note(format!("first defined at {}:{}", first.filename, first.line)),
                    );
                }
                None => {
                    routes.insert(path.to_string(), block.id());
                }
            }
        }
    }
    routes
}
