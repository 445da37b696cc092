mod test_runner;

use std::future::Future;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use log::debug;

use interpreter::{Document, Engine, EngineOptions, Isolation, LoadError, Request};

#[derive(Parser)]
#[command(name = "quire", version, about = "Dependency-aware HTML template engine")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Engine options file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log load and render milestones to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a document and report every validation error
    Check(FileArgs),

    /// Print the dependency graph of a document
    Graph(GraphArgs),

    /// Render a document for one request
    Render(RenderArgs),

    /// Run .test.html fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// Document to load
    file: String,
}

#[derive(clap::Args)]
struct GraphArgs {
    /// Document to load
    file: String,

    /// Print the graph as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Document to render
    file: String,

    /// Request dataset (TOML). Defaults to `GET /`.
    #[arg(short, long)]
    request: Option<PathBuf>,

    /// Render only the block registered under this route
    #[arg(long)]
    route: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.html file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let engine = Engine::standard().with_options(load_options(cli.config.as_ref()));

    match cli.command {
        Command::Check(args) => {
            load_or_exit(&engine, &args.file, color_choice);
            eprintln!("ok: {} is valid", args.file);
        }
        Command::Graph(args) => {
            let doc = load_or_exit(&engine, &args.file, color_choice);
            let description = doc.describe();
            if args.json {
                match serde_json::to_string_pretty(&description) {
                    Ok(json) => println!("{}", json),
                    Err(e) => fail(format!("cannot serialize graph: {}", e)),
                }
            } else {
                print!("{}", description);
            }
        }
        Command::Render(args) => do_render(&engine, args, color_choice),
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                return;
            }
            let exit_code = test_runner::run_tests(&engine, &args.path, cli.no_color, &args.category);
            process::exit(exit_code);
        }
    }
}

fn fail(message: String) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}

fn load_options(path: Option<&PathBuf>) -> EngineOptions {
    let Some(path) = path else {
        return EngineOptions::default();
    };
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("cannot read '{}': {}", path.display(), e)));
    EngineOptions::from_toml(&text)
        .unwrap_or_else(|e| fail(format!("invalid config '{}': {}", path.display(), e)))
}

fn load_request(path: Option<&PathBuf>) -> Request {
    let Some(path) = path else {
        return Request::default();
    };
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("cannot read '{}': {}", path.display(), e)));
    toml::from_str(&text)
        .unwrap_or_else(|e| fail(format!("invalid request '{}': {}", path.display(), e)))
}

fn load_or_exit(engine: &Engine, file: &str, color_choice: ColorChoice) -> Document {
    let source = std::fs::read_to_string(file)
        .unwrap_or_else(|e| fail(format!("cannot read '{}': {}", file, e)));

    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source.clone());

    match engine.load(file, &source, file_id) {
        Ok(doc) => doc,
        Err(err) => {
            emit_load_error(&files, &err, color_choice);
            process::exit(1);
        }
    }
}

fn emit_load_error(files: &SimpleFiles<String, String>, err: &LoadError, color_choice: ColorChoice) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for error in &err.errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
    eprintln!("{}", err);
}

/// Drive a render on a single-threaded runtime; sibling tasks interleave
/// cooperatively.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => fail(format!("cannot start runtime: {}", e)),
    }
}

/// Full render, or isolation of the block registered under `route`.
pub(crate) fn evaluate(doc: &Document, request: &Request, route: Option<&str>) -> Option<Isolation> {
    block_on(async {
        match route {
            Some(path) => doc.render_route(path, request).await,
            None => Some(doc.render(request).await),
        }
    })
}

fn do_render(engine: &Engine, args: RenderArgs, color_choice: ColorChoice) {
    let doc = load_or_exit(engine, &args.file, color_choice);
    let request = load_request(args.request.as_ref());
    debug!("rendering {} for {} {}", args.file, request.method, request.path);

    let Some(result) = evaluate(&doc, &request, args.route.as_deref()) else {
        fail(format!(
            "no route '{}' in {}",
            args.route.unwrap_or_default(),
            args.file
        ));
    };

    println!("{}", result.html());

    let response = result.response();
    if !result.found {
        eprintln!("not found");
    }
    if let Some(status) = response.status {
        eprintln!("status: {}", status);
    }
    if let Some(to) = &response.redirect {
        eprintln!("redirect: {}", to);
    }
    for cookie in &response.cookies {
        eprintln!("cookie: {}={}", cookie.name, cookie.value);
    }
    if let Some(output) = &response.output {
        eprintln!("output: {}", output);
    }
    if let Some(error) = &response.error {
        eprintln!("runtime error ({}): {}", error.code, error.message);
        process::exit(1);
    }
}
