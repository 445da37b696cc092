use interpreter::{BlockReport, Context, Escape, RenderError, Request};
use quire::Dialect;
use quire::scanner::{scan, sole_token};
use serde_json::json;

fn token(text: &str) -> quire::VarToken {
    sole_token(text, Dialect::INLINE).expect("one token")
}

#[test]
fn forks_do_not_affect_their_parent() {
    let root = Context::new(&Request::default());
    let child = root.set_var("a", json!(1));
    let sibling = root.set_var("b", json!(2));
    assert_eq!(child.get("a"), Some(&json!(1)));
    assert!(!root.has("a"));
    assert!(!sibling.has("a"));
    assert!(!child.has("b"));
}

#[test]
fn inner_bindings_shadow_outer() {
    let ctx = Context::new(&Request::default())
        .set_var("x", json!("outer"))
        .set_var("x", json!("inner"));
    assert_eq!(ctx.get("x"), Some(&json!("inner")));
    assert_eq!(ctx.bindings().len(), 1);
}

#[test]
fn merge_overlays_only_what_diverged() {
    let base = Context::new(&Request::default()).set_var("shared", json!(0));
    let left = base.set_var("left", json!("l"));
    let right = base
        .select([("right".to_string(), json!("r")), ("other".to_string(), json!(true))]);
    let merged = left.merge(&right);
    assert_eq!(merged.get("left"), Some(&json!("l")));
    assert_eq!(merged.get("right"), Some(&json!("r")));
    assert_eq!(merged.get("shared"), Some(&json!(0)));
    assert!(!left.has("right"));
    assert_eq!(merged.bindings().len(), 4);
}

#[test]
fn merge_of_an_ancestor_changes_nothing() {
    let base = Context::new(&Request::default()).set_var("a", json!(1));
    let child = base.set_var("b", json!(2));
    let merged = child.merge(&base);
    assert_eq!(merged.bindings(), child.bindings());
}

#[test]
fn response_state_is_shared_by_every_fork() {
    let root = Context::new(&Request::default());
    let a = root.set_var("a", json!(1));
    let b = root.set_var("b", json!(2)).merge(&a);
    a.response().set_status(404);
    b.response().add_cookie("k", "v");
    assert_eq!(root.response().status(), Some(404));
    assert_eq!(root.response().snapshot().cookies.len(), 1);
    assert!(a.response().ptr_eq(b.response()));

    let other = Context::new(&Request::default());
    assert!(!other.response().ptr_eq(root.response()));
    assert_eq!(other.response().status(), None);
}

#[test]
fn resolving_references() {
    let ctx = Context::new(&Request::get("/x").with_query("page", "2"))
        .set_var("user", json!({"name": "Ada", "tags": ["a", "b"]}));
    assert_eq!(ctx.resolve(&token("$user.name")).unwrap(), json!("Ada"));
    assert_eq!(ctx.resolve(&token("$user.tags.1")).unwrap(), json!("b"));
    assert_eq!(ctx.resolve(&token("$user.email")).unwrap(), json!(null));
    assert_eq!(ctx.resolve(&token("@query.page")).unwrap(), json!("2"));
    assert_eq!(ctx.resolve(&token("@path")).unwrap(), json!("/x"));
    assert_eq!(
        ctx.resolve(&token("$nobody")),
        Err(RenderError::UndefinedVariable("nobody".to_string()))
    );
}

#[test]
fn interpolation_and_evaluation() {
    let ctx = Context::new(&Request::default()).set_var("v", json!({"n": 3, "s": "<&>"}));
    let text = scan("n=$v.n s=$v.s", Dialect::INLINE);
    assert_eq!(ctx.interpolate(&text, Escape::None).unwrap(), "n=3 s=<&>");
    assert_eq!(ctx.interpolate(&text, Escape::Html).unwrap(), "n=3 s=&lt;&amp;&gt;");
    assert_eq!(ctx.evaluate(&scan("$v", Dialect::INLINE)).unwrap(), json!({"n": 3, "s": "<&>"}));
    assert_eq!(ctx.evaluate(&scan("$v.n!", Dialect::INLINE)).unwrap(), json!("3!"));
}

#[test]
fn actions_are_flagged_by_the_request() {
    assert!(!Context::new(&Request::get("/")).is_action());
    assert!(Context::new(&Request::post("/", json!({}))).is_action());
}

#[test]
fn report_fold_resolves_locally_provided_names() {
    let mut first = BlockReport::default();
    first.add_provide("a");
    first.consumes.insert("x".to_string());
    let mut second = BlockReport::default();
    second.add_provide("b");
    second.consumes.insert("a".to_string());
    second.consumes.insert("y".to_string());
    second.consumes_error = true;

    let mut agg = BlockReport::default();
    agg.append(&first);
    agg.append(&second);
    assert_eq!(agg.provides, vec!["a", "b"]);
    assert_eq!(agg.consumes.iter().collect::<Vec<_>>(), vec!["x", "y"]);
    assert!(agg.consumes_error);
}

#[test]
fn report_serializes_error_flag_name() {
    let report = BlockReport {
        consumes_error: true,
        ..Default::default()
    };
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["doesConsumeError"], json!(true));
}
