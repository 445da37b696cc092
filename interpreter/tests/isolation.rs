use interpreter::{BlockId, ChainStep, Context, Document, Engine, Request};
use quire::Node;
use quire::output::to_html;
use serde_json::json;

fn load(source: &str) -> Document {
    Engine::standard()
        .load("test.html", source, 0)
        .unwrap_or_else(|e| panic!("load failed: {:?}", e.messages()))
}

fn tag(doc: &Document, name: &str) -> BlockId {
    doc.find(|b| b.name() == name).unwrap_or_else(|| panic!("no <{}>", name))
}

/// Nodes of the element named `name` found anywhere in `nodes`.
fn element_children<'n>(nodes: &'n [Node], name: &str) -> Option<&'n [Node]> {
    nodes.iter().find_map(|node| match node {
        Node::Element {
            name: n, children, ..
        } if n == name => Some(children.as_slice()),
        Node::Element { children, .. } => element_children(children, name),
        Node::Text(_) => None,
    })
}

const SHOP: &str = r#"<set target="$shop">{"name": "Corner", "open": true}</set>
<set target="$greeting" value="Welcome to $shop.name"/>
<set target="$unused" value="x"/>
<main>
  <h1>$greeting</h1>
  <if source="$shop.open"><section>$greeting, we are open at @path</section></if>
</main>"#;

#[tokio::test]
async fn isolated_block_matches_full_render() {
    let doc = load(SHOP);
    let request = Request::get("/shop");

    let full = doc.render(&request).await;
    let expected = element_children(&full.nodes, "main").expect("main rendered");
    let expected_if_output: Vec<Node> = expected
        .iter()
        .filter(|n| matches!(n, Node::Element { name, .. } if name == "section"))
        .cloned()
        .collect();

    let isolated = doc.isolate(tag(&doc, "if")).run(Context::new(&request)).await;
    assert!(isolated.found);
    assert_eq!(isolated.nodes, expected_if_output);
    assert_eq!(
        isolated.html(),
        "<section>Welcome to Corner, we are open at /shop</section>"
    );
}

#[tokio::test]
async fn chain_replays_only_what_is_needed() {
    let doc = load(SHOP);
    let section = tag(&doc, "section");
    let steps = doc.isolate(section).chain().steps().to_vec();

    let shop = doc.find(|b| b.path() == "set[0]").expect("first set");
    let greeting = doc.find(|b| b.path() == "set[2]").expect("second set");
    assert_eq!(
        steps,
        vec![
            ChainStep::Replay(vec![shop, greeting]),
            ChainStep::Gate(tag(&doc, "if")),
        ]
    );
}

#[tokio::test]
async fn false_condition_is_not_found() {
    let doc = load("<if source=\"@query.admin\"><p>secret</p></if>");
    let result = doc
        .isolate(tag(&doc, "if"))
        .run(Context::new(&Request::get("/")))
        .await;
    assert!(!result.found);
    assert!(result.nodes.is_empty());
    assert_eq!(result.response().error, None);

    let inner = doc
        .isolate(tag(&doc, "p"))
        .run(Context::new(&Request::get("/")))
        .await;
    assert!(!inner.found);

    let allowed = doc
        .isolate(tag(&doc, "p"))
        .run(Context::new(&Request::get("/").with_query("admin", "yes")))
        .await;
    assert!(allowed.found);
    assert_eq!(allowed.html(), "<p>secret</p>");
}

#[tokio::test]
async fn loops_do_not_gate_their_descendants() {
    let doc = load("<set target=\"$rows\">[]</set><table><for source=\"$rows\" as=\"$row\"><tr><td>static</td></tr></for></table>");
    let tr = tag(&doc, "tr");

    assert!(
        !doc.isolate(tr)
            .chain()
            .steps()
            .iter()
            .any(|step| matches!(step, ChainStep::Gate(_)))
    );

    let result = doc.isolate(tr).run(Context::new(&Request::default())).await;
    assert!(result.found);
    assert_eq!(result.html(), "<tr><td>static</td></tr>");
}

#[tokio::test]
async fn gates_narrow_the_context() {
    let doc = load(r#"<set target="$user">{"profile": {"nick": "ada"}}</set><with source="$user.profile" as="$p"><div><b>$p.nick</b></div></with>"#);
    let result = doc
        .isolate(tag(&doc, "b"))
        .run(Context::new(&Request::default()))
        .await;
    assert!(result.found);
    assert_eq!(result.html(), "<b>ada</b>");
}

#[tokio::test]
async fn transitive_providers_are_pulled_in() {
    let doc = load("<set target=\"$a\" value=\"1\"/><set target=\"$b\" value=\"$a+1\"/><set target=\"$c\" value=\"3\"/><p>$b</p>");
    let p = tag(&doc, "p");
    let chain = doc.collection(doc.root()).container_chain(3, &doc.report(p).consumes, false);
    let names: Vec<&str> = chain.members.iter().map(|&id| doc.block(id).path()).collect();
    assert_eq!(names, vec!["set[0]", "set[1]"]);
    assert!(chain.consumes.is_empty());

    let result = doc.isolate(p).run(Context::new(&Request::default())).await;
    assert_eq!(result.html(), "<p>1+1</p>");
}

#[tokio::test]
async fn routes_isolate_their_page() {
    let doc = load("<set target=\"$site\" value=\"Quire\"/><page path=\"/\"><h1>$site</h1></page><page path=\"/about\"><h1>About $site</h1></page>");
    assert_eq!(doc.routes().map(|(path, _)| path).collect::<Vec<_>>(), vec!["/", "/about"]);

    let about = doc
        .render_route("/about", &Request::get("/ignored"))
        .await
        .expect("route exists");
    assert!(about.found);
    assert_eq!(about.html(), "<h1>About Quire</h1>");
    assert!(doc.render_route("/missing", &Request::default()).await.is_none());
}

#[tokio::test]
async fn isolated_failures_are_recorded_not_raised() {
    let doc = load("<set target=\"$n\" value=\"5\"/><div><for source=\"$n\" as=\"$i\">$i</for></div>");
    let result = doc
        .isolate(tag(&doc, "div"))
        .run(Context::new(&Request::default()))
        .await;
    assert!(result.found);
    assert!(result.nodes.is_empty());
    assert_eq!(
        result.response().error.map(|e| e.message),
        Some("type error: expected array, got string".to_string())
    );
}

#[tokio::test]
async fn isolation_without_dependencies_needs_no_replay() {
    let doc = load("<set target=\"$x\" value=\"1\"/><p>plain</p>");
    let p = tag(&doc, "p");
    assert!(doc.isolate(p).chain().steps().is_empty());
    let result = doc.isolate(p).run(Context::new(&Request::default())).await;
    assert_eq!(to_html(&result.nodes), "<p>plain</p>");
}

#[test]
fn find_ancestor_stops_at_the_root() {
    let doc = load("<div><if source=\"@path\"><p>x</p></if></div>");
    let p = tag(&doc, "p");
    assert_eq!(doc.find_ancestor(p, |b| b.name() == "if"), Some(tag(&doc, "if")));
    assert_eq!(doc.find_ancestor(p, |b| b.name() == "div"), Some(tag(&doc, "div")));
    assert_eq!(doc.find_ancestor(p, |b| b.is_root()), None);
    assert_eq!(doc.find_ancestor(p, |_| false), None);
}

const RECOVERY: &str = r#"<set target="$s" value="text"/><try><for source="$s" as="$c">$c</for></try><catch as="$err"><p>$err.message</p></catch>"#;

#[tokio::test]
async fn isolated_catch_sees_the_error_its_try_recorded() {
    let doc = load(RECOVERY);
    let request = Request::default();
    let catch = tag(&doc, "catch");

    let set = tag(&doc, "set");
    let attempt = tag(&doc, "try");
    assert_eq!(
        doc.isolate(catch).chain().steps().to_vec(),
        vec![ChainStep::Replay(vec![set, attempt])]
    );

    let full = doc.render(&request).await;
    let isolated = doc.isolate(catch).run(Context::new(&request)).await;
    assert!(isolated.found);
    assert_eq!(isolated.html(), full.html());
    assert_eq!(isolated.html(), "<p>type error: expected array, got string</p>");
    assert_eq!(isolated.response().error, None);
}

#[tokio::test]
async fn error_readers_inside_a_catch_replay_the_try() {
    let doc = load(RECOVERY);
    let result = doc
        .isolate(tag(&doc, "p"))
        .run(Context::new(&Request::default()))
        .await;
    assert!(result.found);
    assert_eq!(result.html(), "<p>type error: expected array, got string</p>");
}

#[tokio::test]
async fn nested_try_is_replayed_through_its_container() {
    let doc = load(r#"<set target="$s" value="text"/><div><try><for source="$s" as="$c">$c</for></try></div><catch as="$err"><b>$err.code</b></catch>"#);
    let full = doc.render(&Request::default()).await;
    assert_eq!(full.html(), "<div></div><b>500</b>");

    let isolated = doc
        .isolate(tag(&doc, "catch"))
        .run(Context::new(&Request::default()))
        .await;
    assert!(isolated.found);
    assert_eq!(isolated.html(), "<b>500</b>");
}

#[tokio::test]
async fn catch_without_a_failure_is_not_found_in_isolation() {
    let doc = load("<try><p>fine</p></try><catch><p>oops</p></catch>");
    let result = doc
        .isolate(tag(&doc, "catch"))
        .run(Context::new(&Request::default()))
        .await;
    assert!(!result.found);
    assert_eq!(result.response().error, None);
}

#[tokio::test]
async fn literal_subtrees_render_identically_under_any_context() {
    let doc = load(r#"<set target="$n" value="1"/><ul class="menu"><li>Home</li><li><a href="/about">About</a></li></ul><div><p>n=$n</p></div><nav><a href="/u/$n">me</a></nav>"#);
    let ul = tag(&doc, "ul");
    assert!(!doc.block(ul).is_dynamic());
    assert!(!doc.block(tag(&doc, "li")).is_dynamic());

    let plain = doc.isolate(ul).run(Context::new(&Request::get("/a"))).await;
    let busy = doc
        .isolate(ul)
        .run(
            Context::new(&Request::post("/b", json!({"x": 1})).with_query("q", "z"))
                .set_var("other", json!("value")),
        )
        .await;
    let expected = "<ul class=\"menu\"><li>Home</li><li><a href=\"/about\">About</a></li></ul>";
    assert_eq!(plain.html(), expected);
    assert_eq!(busy.html(), expected);
}

#[test]
fn nested_references_make_ancestors_dynamic() {
    let doc = load(r#"<set target="$n" value="1"/><div><section><p>n=$n</p></section></div><nav><a href="/u/$n">me</a></nav>"#);
    assert!(doc.block(tag(&doc, "p")).is_dynamic());
    assert!(doc.block(tag(&doc, "section")).is_dynamic());
    assert!(doc.block(tag(&doc, "div")).is_dynamic());
    assert!(doc.block(tag(&doc, "nav")).is_dynamic());
    assert!(doc.block(tag(&doc, "a")).is_dynamic());
}
