use interpreter::{Document, Engine, Isolation, Request};
use serde_json::json;

fn load(source: &str) -> Document {
    Engine::standard()
        .load("test.html", source, 0)
        .unwrap_or_else(|e| panic!("load failed: {:?}", e.messages()))
}

async fn render(source: &str, request: &Request) -> Isolation {
    load(source).render(request).await
}

async fn html(source: &str) -> String {
    let result = render(source, &Request::default()).await;
    assert!(result.found);
    assert_eq!(result.response().error, None, "unexpected render error");
    result.html()
}

#[tokio::test]
async fn defined_variable_renders() {
    assert_eq!(
        html("<set target=\"$foo\" value=\"bar\"/><p>$foo</p>").await,
        "<p>bar</p>"
    );
}

#[tokio::test]
async fn plain_markup_passes_through() {
    assert_eq!(
        html("<!doctype html><div class=\"box\"><img src=\"a.png\"><p>hi &amp; bye</p></div>").await,
        "<!doctype html><div class=\"box\"><img src=\"a.png\"><p>hi &amp; bye</p></div>"
    );
}

#[tokio::test]
async fn substituted_values_are_escaped() {
    assert_eq!(
        html("<set target=\"$x\" value=\"<b>\"/><p title=\"$x\">$x</p>").await,
        "<p title=\"&lt;b&gt;\">&lt;b&gt;</p>"
    );
}

#[tokio::test]
async fn json_body_and_paths() {
    let source = r#"<set target="$user">{"name": "Ada", "langs": ["en", "fr"]}</set><p>$user.name speaks $user.langs.1</p>"#;
    assert_eq!(html(source).await, "<p>Ada speaks fr</p>");
}

#[tokio::test]
async fn missing_path_renders_empty() {
    assert_eq!(
        html(r#"<set target="$user">{"name": "Ada"}</set><p>[$user.email]</p>"#).await,
        "<p>[]</p>"
    );
}

#[tokio::test]
async fn globals_read_the_request() {
    let request = Request::get("/search").with_query("q", "rust");
    let result = render("<p>@path ? @query.q</p>", &request).await;
    assert_eq!(result.html(), "<p>/search ? rust</p>");
}

#[tokio::test]
async fn if_renders_only_when_truthy() {
    let source = "<if source=\"@query.show\"><p>shown</p></if><p>always</p>";
    let shown = render(source, &Request::get("/").with_query("show", "1")).await;
    assert_eq!(shown.html(), "<p>shown</p><p>always</p>");
    let hidden = render(source, &Request::get("/")).await;
    assert_eq!(hidden.html(), "<p>always</p>");
}

#[tokio::test]
async fn if_equals() {
    let source = "<if source=\"@method\" equals=\"POST\">post</if><if source=\"@method\" equals=\"GET\">get</if>";
    assert_eq!(html(source).await, "get");
}

#[tokio::test]
async fn for_loops_with_index() {
    let source = "<set target=\"$items\">[\"a\", \"b\", \"c\"]</set><ul><for source=\"$items\" as=\"$item\" index=\"$i\"><li>$i=$item</li></for></ul>";
    assert_eq!(html(source).await, "<ul><li>0=a</li><li>1=b</li><li>2=c</li></ul>");
}

#[tokio::test]
async fn for_over_null_renders_nothing() {
    let source = "<set target=\"$x\">null</set><for source=\"$x\" as=\"$i\"><p>$i</p></for>";
    assert_eq!(html(source).await, "");
}

#[tokio::test]
async fn with_narrows_and_skips_null() {
    let source = r#"<set target="$user">{"address": {"city": "Oslo"}}</set><with source="$user.address" as="$a"><p>$a.city</p></with><with source="$user.phone" as="$p"><p>$p</p></with>"#;
    assert_eq!(html(source).await, "<p>Oslo</p>");
}

#[tokio::test]
async fn inbuilt_elements_are_transparent() {
    let source = "<div><set target=\"$x\" value=\"1\"/></div><p>$x</p>";
    assert_eq!(html(source).await, "<div></div><p>1</p>");
}

#[tokio::test]
async fn response_tags() {
    let source = r#"<set target="$next" value="/done"/><status code="201"/><cookie name="seen" value="yes"/><redirect to="$next?ok=1"/><set target="$data">{"ok": true}</set><output source="$data"/>"#;
    let result = render(source, &Request::default()).await;
    let response = result.response();
    assert_eq!(response.status, Some(201));
    assert_eq!(response.redirect.as_deref(), Some("/done?ok=1"));
    assert_eq!(response.cookies.len(), 1);
    assert_eq!(response.cookies[0].name, "seen");
    assert_eq!(response.cookies[0].value, "yes");
    assert_eq!(response.output, Some(json!({"ok": true})));
    assert_eq!(result.html(), "");
}

#[tokio::test]
async fn redirect_defaults_to_see_other() {
    let result = render("<redirect to=\"/login\"/>", &Request::default()).await;
    assert_eq!(result.response().status, Some(303));
}

#[tokio::test]
async fn run_time_errors_become_the_response_error() {
    let source = "<set target=\"$s\" value=\"text\"/><p>before</p><for source=\"$s\" as=\"$c\"><p>$c</p></for>";
    let result = render(source, &Request::default()).await;
    assert!(result.found);
    assert!(result.nodes.is_empty());
    let error = result.response().error.expect("error recorded");
    assert_eq!(error.code, 500);
    assert_eq!(error.message, "type error: expected array, got string");
}

#[tokio::test]
async fn try_and_catch_recover_inside_the_document() {
    let source = r#"<set target="$s" value="text"/><try><p>lost</p><for source="$s" as="$c">$c</for></try><catch as="$err"><p class="error">$err.message ($err.code)</p></catch><p>end</p>"#;
    let result = render(source, &Request::default()).await;
    assert_eq!(
        result.html(),
        "<p class=\"error\">type error: expected array, got string (500)</p><p>end</p>"
    );
    assert_eq!(result.response().error, None);
}

#[tokio::test]
async fn catch_without_error_renders_nothing() {
    assert_eq!(
        html("<try><p>fine</p></try><catch><p>oops</p></catch>").await,
        "<p>fine</p>"
    );
}

#[tokio::test]
async fn pages_render_for_their_path() {
    let source = "<page path=\"/\"><h1>home</h1></page><page path=\"/users\"><h1>user @params.id</h1></page>";
    let doc = load(source);
    let home = doc.render(&Request::get("/")).await;
    assert_eq!(home.html(), "<h1>home</h1>");
    let users = doc.render(&Request::get("/users").with_param("id", "7")).await;
    assert_eq!(users.html(), "<h1>user 7</h1>");
}

#[tokio::test]
async fn actions_only_on_submission() {
    let source = "<form><action><p>got @body.name</p></action></form>";
    let doc = load(source);
    assert_eq!(doc.render(&Request::get("/")).await.html(), "<form></form>");
    let posted = doc
        .render(&Request::post("/", json!({"name": "Ada"})))
        .await;
    assert_eq!(posted.html(), "<form><p>got Ada</p></form>");
}

#[tokio::test]
async fn markdown_body() {
    let source = "<set target=\"$who\" value=\"<world>\"/><markdown>\n    # Hello $who\n\n    Some *text*.\n</markdown>";
    assert_eq!(
        html(source).await,
        "<h1>Hello &lt;world&gt;</h1>\n<p>Some <em>text</em>.</p>\n"
    );
}

#[tokio::test]
async fn braced_dialect() {
    let engine = Engine::standard().with_options(interpreter::EngineOptions {
        text_dialect: interpreter::DialectName::Braced,
        ..Default::default()
    });
    let doc = engine
        .load("t.html", "<set target=\"$n\" value=\"3\"/><p>costs $5, n={$n}</p>", 0)
        .expect("load");
    assert_eq!(doc.render(&Request::default()).await.html(), "<p>costs $5, n=3</p>");
}
