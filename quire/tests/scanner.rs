use proptest::prelude::*;
use quire::scanner::{scan, sole_token, tokens};
use quire::{Dialect, Scope, Segment};

fn names(text: &str, dialect: Dialect) -> Vec<String> {
    tokens(text, dialect).into_iter().map(|t| t.name).collect()
}

#[test]
fn inline_local_and_global() {
    let found = tokens("Hello $user.name from @query.city", Dialect::INLINE);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].scope, Scope::Local);
    assert_eq!(found[0].name, "user");
    assert_eq!(found[0].path, vec!["name"]);
    assert_eq!(found[1].scope, Scope::Global);
    assert_eq!(found[1].name, "query");
    assert_eq!(found[1].path, vec!["city"]);
}

#[test]
fn spans_cover_the_reference() {
    let text = "a $foo.bar b";
    let token = &tokens(text, Dialect::INLINE)[0];
    assert_eq!(&text[token.span.clone()], "$foo.bar");
}

#[test]
fn sigil_inside_word_is_literal() {
    assert!(names("mail me at user@example.com", Dialect::INLINE).is_empty());
    assert!(names("cost: 5$", Dialect::INLINE).is_empty());
}

#[test]
fn doubled_sigil_is_an_escape() {
    assert_eq!(
        scan("price $$5 and @@home", Dialect::INLINE),
        vec![Segment::Literal("price $5 and @home".to_string())]
    );
}

#[test]
fn trailing_period_ends_the_reference() {
    let found = tokens("Welcome back, $name.", Dialect::INLINE);
    assert_eq!(found[0].name, "name");
    assert!(found[0].path.is_empty());
}

#[test]
fn array_index_path_segments() {
    let found = tokens("$items.0.title", Dialect::INLINE);
    assert_eq!(found[0].path, vec!["0", "title"]);
}

#[test]
fn braced_only_inside_delimiters() {
    assert!(names("$not here", Dialect::BRACED).is_empty());
    assert_eq!(names("{$here} and { @there.x }", Dialect::BRACED), vec!["here", "there"]);
    assert_eq!(
        scan("{ not a ref }", Dialect::BRACED),
        vec![Segment::Literal("{ not a ref }".to_string())]
    );
}

#[test]
fn segments_alternate_literal_and_reference() {
    let segments = scan("<$a|$b>", Dialect::INLINE);
    assert_eq!(segments.len(), 5);
    assert!(matches!(&segments[0], Segment::Literal(s) if s == "<"));
    assert!(matches!(&segments[1], Segment::Var(t) if t.name == "a"));
    assert!(matches!(&segments[2], Segment::Literal(s) if s == "|"));
    assert!(matches!(&segments[3], Segment::Var(t) if t.name == "b"));
    assert!(matches!(&segments[4], Segment::Literal(s) if s == ">"));
}

#[test]
fn sole_token_rejects_extra_content() {
    assert_eq!(sole_token("  $user ", Dialect::INLINE).map(|t| t.name), Some("user".to_string()));
    assert!(sole_token("$a $b", Dialect::INLINE).is_none());
    assert!(sole_token("x$a", Dialect::INLINE).is_none());
    assert!(sole_token("hello", Dialect::INLINE).is_none());
    assert!(sole_token("{$a}", Dialect::BRACED).is_some());
}

#[test]
fn display_uses_inline_form() {
    let token = &tokens("{@cookies.session}", Dialect::BRACED)[0];
    assert_eq!(token.to_string(), "@cookies.session");
}

proptest! {
    #[test]
    fn text_without_sigils_is_one_literal(text in "[a-zA-Z0-9 .,!?<>/-]{1,40}") {
        prop_assert_eq!(scan(&text, Dialect::INLINE), vec![Segment::Literal(text.clone())]);
    }

    #[test]
    fn every_identifier_scans_back(name in "[a-z_][a-z0-9_]{0,12}", prefix in "[ .,(]{0,3}") {
        let text = format!("{}${}", prefix, name);
        let found = tokens(&text, Dialect::INLINE);
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(&found[0].name, &name);
        let expected = format!("${}", name);
        prop_assert_eq!(&text[found[0].span.clone()], expected.as_str());
    }
}
