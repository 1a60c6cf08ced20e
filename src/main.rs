// src/main.rs
//
// sanitize-ai-html — clean an AI answer payload for direct embedding
//
// - Reads a payload from a file or stdin, writes sanitized markup to a file or stdout.
// - By default the payload is treated like an answer-service response: a ```html
//   fence is unwrapped and only the <body> content is kept before sanitizing.
//   --raw sanitizes the input exactly as given.
// - --title prints the first <h1> text instead of markup.
//
// Logging goes to stderr. RUST_LOG overrides the level picked by -v.

use ai_html_sanitizer::{extract_html, extract_title, prepare_answer, sanitize};
use clap::{ArgAction, Parser};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI flags
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Sanitize the input as-is (no fence unwrapping or <body> extraction)
    #[arg(long, action = ArgAction::SetTrue)]
    raw: bool,

    /// Print only the text of the first <h1>
    #[arg(long, action = ArgAction::SetTrue)]
    title: bool,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Input file (default: stdin; "-" also reads stdin)
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    output: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let src = read_input(cli.input.as_deref())?;
    let text = String::from_utf8_lossy(&src);

    let rendered = if cli.title {
        let html = extract_html(&text).unwrap_or_else(|| text.to_string());
        let mut title = extract_title(&html).unwrap_or_default();
        title.push('\n');
        title
    } else if cli.raw {
        sanitize(&text)
    } else {
        prepare_answer(&text).html
    };

    info!(
        input_bytes = src.len(),
        output_bytes = rendered.len(),
        "sanitized payload"
    );

    write_output(cli.output.as_deref(), rendered.as_bytes())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(p) if p != Path::new("-") => fs::read(p),
        _ => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> io::Result<()> {
    match path {
        Some(p) => fs::write(p, bytes),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()
        }
    }
}
