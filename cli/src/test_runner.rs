use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use interpreter::{Engine, LoadError, Request};

const SUFFIX: &str = ".test.html";

#[derive(Debug, Deserialize)]
pub struct ExpectedError {
    /// Substring that must appear in the error message.
    pub contains: String,

    /// If set, the error must be reported on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

/// Front matter of a `.test.html` fixture.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub description: Option<String>,

    /// Request dataset; `GET /` when omitted.
    pub request: Option<Request>,

    /// Isolate the block registered under this route instead of rendering
    /// the whole document.
    pub route: Option<String>,

    /// Expected HTML (trimmed comparison).
    pub expect_output: Option<String>,

    /// Expected load errors, in report order. If present the document must
    /// fail to load.
    pub expect_errors: Option<Vec<ExpectedError>>,

    pub expect_status: Option<u16>,

    pub expect_found: Option<bool>,

    /// Substring of the run-time error recorded on the response.
    pub expect_error: Option<String>,
}

/// Split a fixture into its TOML front matter and markup source.
fn parse_fixture(content: &str) -> Result<(Fixture, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---")
        .ok_or("missing opening --- front matter delimiter")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    let (front, rest) = match body.strip_prefix("---") {
        Some(rest) => ("", rest),
        None => {
            let close = body
                .find("\n---")
                .ok_or("missing closing --- front matter delimiter")?;
            (body[..close].trim_end_matches('\r'), &body[close + 4..])
        }
    };
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let fixture = toml::from_str(front).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((fixture, source))
}

pub struct TestResult {
    pub path: PathBuf,
    pub label: String,
    /// `None` on success, otherwise why the fixture failed.
    pub failure: Option<String>,
}

fn run_single_test(engine: &Engine, path: &Path) -> TestResult {
    let mut label = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim_end_matches(SUFFIX).to_string())
        .unwrap_or_else(|| "?".to_string());

    let failure = match std::fs::read_to_string(path) {
        Err(e) => Some(format!("cannot read file: {}", e)),
        Ok(content) => match parse_fixture(&content) {
            Err(e) => Some(format!("front matter error: {}", e)),
            Ok((fixture, source)) => {
                if let Some(description) = &fixture.description {
                    label = description.clone();
                }
                let filename = path.to_string_lossy();
                check_fixture(engine, &filename, source, &fixture).err()
            }
        },
    };

    TestResult {
        path: path.to_path_buf(),
        label,
        failure,
    }
}

fn check_fixture(engine: &Engine, filename: &str, source: &str, fixture: &Fixture) -> Result<(), String> {
    let doc = match (engine.load(filename, source, 0), &fixture.expect_errors) {
        (Err(err), Some(expected)) => return check_load_errors(&err, expected),
        (Err(err), None) => {
            return Err(format!("unexpected load errors:\n{}", describe_errors(&err)));
        }
        (Ok(_), Some(expected)) if !expected.is_empty() => {
            return Err(format!("expected {} load error(s), but the document loaded", expected.len()));
        }
        (Ok(doc), _) => doc,
    };

    let request = fixture.request.clone().unwrap_or_default();
    let result = crate::evaluate(&doc, &request, fixture.route.as_deref())
        .ok_or_else(|| format!("no route '{}'", fixture.route.as_deref().unwrap_or_default()))?;
    let response = result.response();

    match (&fixture.expect_error, &response.error) {
        (Some(expected), Some(actual)) if !actual.message.contains(expected.as_str()) => {
            return Err(format!(
                "expected error containing \"{}\", got: {}",
                expected, actual.message
            ));
        }
        (Some(expected), None) => {
            return Err(format!(
                "expected error containing \"{}\", but rendering succeeded",
                expected
            ));
        }
        (None, Some(actual)) => {
            return Err(format!("unexpected runtime error ({}): {}", actual.code, actual.message));
        }
        _ => {}
    }

    if let Some(expected) = fixture.expect_found {
        if result.found != expected {
            return Err(format!("expected found = {}, got {}", expected, result.found));
        }
    }

    if fixture.expect_status.is_some() && response.status != fixture.expect_status {
        return Err(format!(
            "expected status {:?}, got {:?}",
            fixture.expect_status, response.status
        ));
    }

    if let Some(expected) = &fixture.expect_output {
        let actual = result.html();
        if actual.trim() != expected.trim() {
            return Err(format!(
                "output mismatch\n  expected: {}\n  actual:   {}",
                expected.trim(),
                actual.trim()
            ));
        }
    }

    Ok(())
}

fn describe_errors(err: &LoadError) -> String {
    err.errors
        .iter()
        .map(|e| format!("  - line {}: {}", e.line, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare reported load errors against expectations, in order.
fn check_load_errors(err: &LoadError, expected: &[ExpectedError]) -> Result<(), String> {
    if err.errors.len() != expected.len() {
        return Err(format!(
            "expected {} load error(s), got {}\n  actual errors:\n{}",
            expected.len(),
            err.errors.len(),
            describe_errors(err)
        ));
    }

    for (i, (actual, expected)) in err.errors.iter().zip(expected).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Err(format!(
                "error[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual.message
            ));
        }
        if let Some(line) = expected.line {
            if actual.line != line {
                return Err(format!(
                    "error[{}]: expected on line {}, but reported on line {}",
                    i, line, actual.line
                ));
            }
        }
    }
    Ok(())
}

/// Fixtures under `root`, keyed by the subfolder they live in ("" for
/// `root` itself). A single file is its own uncategorized suite.
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    if root.is_file() {
        categories.entry(String::new()).or_default().push(root.to_path_buf());
        return categories;
    }
    collect(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(SUFFIX));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", SUFFIX, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// Keep the categories named in `wanted` (and their subfolders), warning
/// about names that match nothing.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    wanted: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if wanted.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for requested in wanted {
        let requested = requested.trim_matches('/');
        let prefix = format!("{}/", requested);
        let before = selected.len();
        for (category, files) in all {
            if category == requested || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files);
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                requested,
                available.join(", ")
            );
        }
    }
    selected
}

struct Palette {
    color: bool,
}

impl Palette {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self, text: &str) -> String {
        self.paint(text, "32")
    }

    fn fail(&self, text: &str) -> String {
        self.paint(text, "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Run every fixture under `path` (or the single fixture at `path`).
/// Returns the process exit code: 0 when all pass.
pub fn run_tests(engine: &Engine, path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { color: !no_color };
    let all = discover(path);
    if all.is_empty() {
        eprintln!("no {} files found in {}", SUFFIX, path.display());
        return 1;
    }
    let selected = select(&all, categories);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if all.len() > 1 || !category.is_empty() {
            eprintln!();
            eprintln!("{}", palette.bold(category_label(category)));
        }
        for file in *files {
            let result = run_single_test(engine, file);
            if result.failure.is_none() {
                passed += 1;
                eprintln!("  {}  {}", palette.pass("PASS"), result.label);
            } else {
                eprintln!("  {}  {}", palette.fail("FAIL"), result.label);
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for result in &failures {
            eprintln!();
            eprintln!("  --- {} ---", result.path.display());
            for line in result.failure.iter().flat_map(|reason| reason.lines()) {
                eprintln!("  {}", line);
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", palette.pass("ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            palette.fail("FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn front_matter_is_split_from_source() {
        let (fixture, source) = parse_fixture(
            "---\nexpect_output = \"<p>hi</p>\"\nexpect_status = 404\n---\n<p>hi</p>\n",
        )
        .expect("fixture");
        assert_eq!(fixture.expect_output.as_deref(), Some("<p>hi</p>"));
        assert_eq!(fixture.expect_status, Some(404));
        assert_eq!(source, "<p>hi</p>\n");
    }

    #[test]
    fn missing_delimiters_are_reported() {
        assert!(parse_fixture("<p>hi</p>").is_err());
        assert!(parse_fixture("---\nexpect_found = true\n<p>hi</p>").is_err());
    }

    #[test]
    fn request_tables_deserialize() {
        let (fixture, _) = parse_fixture(
            "---\nroute = \"/u\"\n[request]\npath = \"/u\"\nmethod = \"POST\"\naction = true\nbody = { name = \"Ada\" }\n[request.params]\nid = \"7\"\n---\n",
        )
        .expect("fixture");
        let request = fixture.request.expect("request");
        assert_eq!(request.method, "POST");
        assert!(request.action);
        assert_eq!(request.params.get("id").map(String::as_str), Some("7"));
        assert_eq!(request.body, Some(serde_json::json!({"name": "Ada"})));
        assert_eq!(request.matched_path, "/");
    }

    #[test]
    fn passing_and_failing_fixtures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::standard();
        let pass = write(
            dir.path(),
            "basic/greet.test.html",
            "---\nexpect_output = \"<p>hi Ada</p>\"\n---\n<set target=\"$who\" value=\"Ada\"/><p>hi $who</p>\n",
        );
        let fail = write(
            dir.path(),
            "basic/wrong.test.html",
            "---\ndescription = \"wrong output\"\nexpect_output = \"<p>bye</p>\"\n---\n<p>hi</p>\n",
        );

        assert!(run_single_test(&engine, &pass).failure.is_none());
        let failed = run_single_test(&engine, &fail);
        assert_eq!(failed.label, "wrong output");
        assert!(failed.failure.expect("failure").starts_with("output mismatch"));

        assert_eq!(run_tests(&engine, dir.path(), true, &[]), 1);
        std::fs::remove_file(&fail).expect("remove");
        assert_eq!(run_tests(&engine, dir.path(), true, &[]), 0);
    }

    #[test]
    fn load_error_expectations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::standard();
        let path = write(
            dir.path(),
            "undefined.test.html",
            "---\n[[expect_errors]]\ncontains = \"foo not defined\"\nline = 2\n---\n<p>ok</p>\n<p>$foo</p>\n",
        );
        assert!(run_single_test(&engine, &path).failure.is_none());

        let unexpected = write(dir.path(), "bad.test.html", "---\n---\n<p>$foo</p>\n");
        let failure = run_single_test(&engine, &unexpected).failure.expect("failure");
        assert!(failure.contains("foo not defined"));
    }

    #[test]
    fn routes_status_and_runtime_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::standard();
        let routed = write(
            dir.path(),
            "routed.test.html",
            "---\nroute = \"/missing\"\nexpect_found = false\n---\n<page path=\"/missing\"><status code=\"404\"/>gone</page>\n",
        );
        let failure = run_single_test(&engine, &routed).failure.expect("found differs");
        assert_eq!(failure, "expected found = false, got true");

        let status = write(
            dir.path(),
            "status.test.html",
            "---\nroute = \"/missing\"\nexpect_status = 404\nexpect_output = \"gone\"\n---\n<page path=\"/missing\"><status code=\"404\"/>gone</page>\n",
        );
        assert!(run_single_test(&engine, &status).failure.is_none());

        let errored = write(
            dir.path(),
            "errored.test.html",
            "---\nexpect_error = \"expected array\"\n---\n<set target=\"$s\" value=\"x\"/><for source=\"$s\" as=\"$c\">$c</for>\n",
        );
        assert!(run_single_test(&engine, &errored).failure.is_none());
    }

    #[test]
    fn bundled_fixtures_pass() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        assert_eq!(run_tests(&Engine::standard(), &fixtures, true, &[]), 0);
    }

    #[test]
    fn categories_follow_subfolders() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "top.test.html", "---\n---\n");
        write(dir.path(), "flow/loops/a.test.html", "---\n---\n");
        write(dir.path(), "flow/b.test.html", "---\n---\n");
        write(dir.path(), "flow/notes.txt", "ignored");

        let all = discover(dir.path());
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["", "flow", "flow/loops"]);
        let selected = select(&all, &["flow".to_string()]);
        assert_eq!(selected.keys().copied().collect::<Vec<_>>(), vec!["flow", "flow/loops"]);
    }
}
