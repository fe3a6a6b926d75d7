//! streamql interactive REPL: a thin line editor wired directly to an
//! in-process `QueryEngine` — no network hop, no server. Understands a
//! small admin-command surface (`create stream`, `insert into`, `flush`,
//! `list`, ...) plus bare pipelines and `create flow ... as ...` statements,
//! which go straight to `QueryEngine::execute_statement`.
//!
//! The admin dialect's full grammar is intentionally not implemented here —
//! this binary exists to give the crate a runnable entry point, not to
//! implement a parser for an admin console.

use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use streamql::document::Document;
use streamql::{EngineError, QueryEngine, StreamManager};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "streamql-repl")]
#[command(about = "Interactive REPL for the streamql stream-processing engine", long_about = None)]
struct Args {
    /// History file path (defaults to ~/.streamql_history)
    #[arg(short = 'H', long)]
    history_file: Option<std::path::PathBuf>,
}

fn print_banner() {
    println!(
        "{}",
        r#"
 _                            _ql
/ __| |_ _ _ ___ __ _ _ __  _ _| |
\__ \  _| '_/ -_) _` | ' \/ _` | |
|___/\__|_| \___\__,_|_|_|\__, |_|
                           |___/
"#
        .cyan()
    );
    println!(
        "  {} {}",
        "streamql REPL".white().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!(
        "  Type {} for help, {} to quit\n",
        ".help".yellow(),
        ".exit".yellow()
    );
}

fn print_help() {
    println!("\n{}", "Admin commands:".white().bold());
    println!("  {}", "create stream <name>".cyan());
    println!("  {}", "create or replace stream <name>".cyan());
    println!("  {}", "delete stream <name>".cyan());
    println!("  {}", "delete flow <name>".cyan());
    println!(
        "  {}",
        "insert into <stream> <json>   (unquoted keys accepted)".cyan()
    );
    println!("  {}", "flush <stream>".cyan());
    println!("  {}", "list streams | list flows".cyan());

    println!("\n{}", "Query pipelines:".white().bold());
    println!("  {}", "<stream> | where <expr> | select {..} | ...".green());
    println!(
        "  {}",
        "create flow <name> [ttl(<duration>)] as <stream> | ...".green()
    );

    println!("\n{}", "REPL commands:".white().bold());
    println!("  {}        Show this help", ".help".yellow());
    println!("  {}        Exit the REPL", ".exit".yellow());
    println!("  {}       Clear the screen", ".clear".yellow());
    println!();
}

fn format_value(value: &Document) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

fn format_error(err: &EngineError) -> String {
    format!("[{}] {}", err.code(), err)
}

/// One insert may carry a single document or a JSON array of documents.
fn insert_into(engine: &QueryEngine, stream: &str, json_text: &str) -> Result<usize, String> {
    let value =
        streamql_core::parse_permissive(json_text).map_err(|e| format!("invalid JSON: {e}"))?;
    let docs: Vec<Document> = match value {
        Document::Array(items) => items,
        other => vec![other],
    };
    let count = docs.len();
    for doc in docs {
        engine
            .streams()
            .insert(stream, doc)
            .map_err(|e| format_error(&e))?;
    }
    Ok(count)
}

fn handle_admin(engine: &QueryEngine, line: &str) -> Option<Result<String, String>> {
    let mut words = line.splitn(3, ' ');
    let first = words.next()?;
    let second = words.next().unwrap_or("");
    let rest = words.next().unwrap_or("");

    match (first, second) {
        ("create", "stream") => {
            let name = rest.trim();
            Some(
                engine
                    .streams()
                    .create_stream(name)
                    .map(|_| format!("stream '{name}' created"))
                    .map_err(|e| format_error(&e)),
            )
        }
        ("create", "or") => {
            // `create or replace stream <name>`
            let mut tail = rest.splitn(2, ' ');
            let replace_kw = tail.next().unwrap_or("");
            let stream_kw_and_name = tail.next().unwrap_or("");
            if replace_kw != "replace" {
                return Some(Err("expected 'create or replace stream <name>'".to_string()));
            }
            let name = stream_kw_and_name
                .strip_prefix("stream ")
                .unwrap_or(stream_kw_and_name)
                .trim();
            let _ = engine.streams().delete_stream(name);
            Some(
                engine
                    .streams()
                    .create_stream(name)
                    .map(|_| format!("stream '{name}' created"))
                    .map_err(|e| format_error(&e)),
            )
        }
        ("delete", "stream") => {
            let name = rest.trim();
            Some(
                engine
                    .delete_stream(name)
                    .map(|_| format!("stream '{name}' deleted"))
                    .map_err(|e| format_error(&e)),
            )
        }
        ("delete", "flow") => {
            let name = rest.trim();
            Some(
                engine
                    .stop_flow_by_name(name)
                    .map(|_| format!("flow '{name}' stopped"))
                    .map_err(|e| format_error(&e)),
            )
        }
        ("insert", "into") => {
            let mut tail = rest.splitn(2, ' ');
            let name = tail.next().unwrap_or("").trim();
            let json_text = tail.next().unwrap_or("").trim();
            Some(
                insert_into(engine, name, json_text)
                    .map(|n| format!("inserted {n} document(s) into '{name}'")),
            )
        }
        ("flush", stream) if !stream.is_empty() => Some(
            engine
                .flush_source(stream)
                .map(|_| format!("flushed flows reading from '{stream}'"))
                .map_err(|e| format_error(&e)),
        ),
        ("list", "streams") => Some(Ok(engine.streams().stream_names().join(", "))),
        ("list", "flows") => {
            let flows = engine.list_active_flows();
            if flows.is_empty() {
                Some(Ok("(no active flows)".to_string()))
            } else {
                let lines: Vec<String> = flows
                    .iter()
                    .map(|f| {
                        format!(
                            "  #{} {} <- {} [{:?}]",
                            f.id,
                            f.name.as_deref().unwrap_or("(anonymous)"),
                            f.source,
                            f.state
                        )
                    })
                    .collect();
                Some(Ok(lines.join("\n")))
            }
        }
        _ => None,
    }
}

fn run_line(engine: &QueryEngine, line: &str) {
    if let Some(result) = handle_admin(engine, line) {
        match result {
            Ok(msg) => println!("  {} {}", "ok".green().bold(), msg),
            Err(msg) => println!("  {} {}", "error".red().bold(), msg),
        }
        return;
    }

    match engine.execute_statement(line, move |doc| {
        println!("  {} {}", "=>".dimmed(), format_value(&doc));
    }) {
        Ok(outcome) => println!(
            "  {} flow #{} installed{}",
            "ok".green().bold(),
            outcome.id,
            outcome
                .name
                .map(|n| format!(" as '{n}'"))
                .unwrap_or_default()
        ),
        Err(err) => println!("  {} {}", "error".red().bold(), format_error(&err)),
    }
}

fn main() -> RlResult<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // TTL expiry is the engine's one asynchronous concern; the rest of the
    // REPL loop is synchronous, blocking `readline` calls.
    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let _guard = runtime.enter();

    print_banner();

    let streams = StreamManager::new();
    let engine = QueryEngine::new(streams);
    engine.on_flow_event(|event| {
        tracing::debug!(?event, "flow-event");
    });

    let mut rl = DefaultEditor::new()?;
    let history_file = args.history_file.unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|h| std::path::PathBuf::from(h).join(".streamql_history"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".streamql_history"))
    });
    let _ = rl.load_history(&history_file);

    loop {
        match rl.readline(&format!("{} ", "streamql>".cyan())) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    ".exit" | ".quit" | ".q" => {
                        println!("{}", "Goodbye!".dimmed());
                        break;
                    }
                    ".help" | ".h" | ".?" => {
                        print_help();
                        continue;
                    }
                    ".clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        print_banner();
                        continue;
                    }
                    _ => {}
                }

                run_line(&engine, line);
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Type .exit to quit".dimmed());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".dimmed());
                break;
            }
            Err(err) => {
                println!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_file);
    Ok(())
}
