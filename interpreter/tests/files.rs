use std::path::PathBuf;

use futures_util::future::{FutureExt, LocalBoxFuture};
use interpreter::{
    Body, Context, Engine, EngineOptions, PrepareError, Rendered, RenderError, Request, TagBehavior,
    TagDefinition, TagInstance, TagRegistry,
};
use quire::output::escape_html;
use quire::{AttributeSpec, BodyPolicy, Node};

/// `<read src="file"/>` inlines a file next to the document as text.
fn read_definition() -> TagDefinition {
    TagDefinition::new("read", BodyPolicy::Deny, prepare_read)
        .attribute(AttributeSpec::relative("src").required())
}

struct Read(PathBuf);

fn prepare_read(tag: &TagInstance<'_>) -> Result<Box<dyn TagBehavior>, PrepareError> {
    let path = tag
        .attributes
        .relative("src")
        .ok_or_else(|| PrepareError::new("src missing"))?;
    Ok(Box::new(Read(path.to_path_buf())))
}

impl TagBehavior for Read {
    fn render<'a>(&'a self, _body: Body<'a>, ctx: Context) -> LocalBoxFuture<'a, Result<Rendered, RenderError>> {
        async move {
            let text = std::fs::read_to_string(&self.0)
                .map_err(|e| RenderError::IoError(format!("{}: {}", self.0.display(), e)))?;
            Ok(Rendered::new(ctx, vec![Node::Text(escape_html(text.trim_end()))]))
        }
        .boxed_local()
    }
}

fn engine() -> Engine {
    let mut registry = TagRegistry::standard();
    registry.register(read_definition());
    Engine::new(registry, EngineOptions::default())
}

#[tokio::test]
async fn relative_paths_resolve_next_to_the_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("parts")).expect("mkdir");
    std::fs::write(dir.path().join("parts/note.txt"), "fish & chips\n").expect("write");

    let page = dir.path().join("page.html");
    let doc = engine()
        .load(&page.to_string_lossy(), "<p><read src=\"./parts/../parts/note.txt\"/></p>", 0)
        .unwrap_or_else(|e| panic!("load failed: {:?}", e.messages()));
    let result = doc.render(&Request::default()).await;
    assert_eq!(result.html(), "<p>fish &amp; chips</p>");
}

#[test]
fn relative_paths_may_not_escape() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = dir.path().join("page.html");
    let err = engine()
        .load(&page.to_string_lossy(), "<read src=\"../secret.txt\"/>", 0)
        .err()
        .expect("load error");
    assert_eq!(
        err.messages(),
        vec!["attribute 'src' points outside the document directory: ../secret.txt"]
    );
}

#[tokio::test]
async fn missing_files_fail_at_render_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = dir.path().join("page.html");
    let doc = engine()
        .load(&page.to_string_lossy(), "<read src=\"gone.txt\"/>", 0)
        .unwrap_or_else(|e| panic!("load failed: {:?}", e.messages()));
    let result = doc.render(&Request::default()).await;
    let error = result.response().error.expect("error recorded");
    assert!(error.message.starts_with("I/O error: "), "{}", error.message);
    assert_eq!(error.code, 500);
}
