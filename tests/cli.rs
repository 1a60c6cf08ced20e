use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use tempfile::{NamedTempFile, TempDir};

const BIN: &str = env!("CARGO_BIN_EXE_sanitize-ai-html");

fn run_with_stdin(args: &[&str], stdin: impl AsRef<[u8]>) -> Output {
    let mut child = Command::new(BIN)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn binary");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_ref())
        .expect("write stdin");
    child.wait_with_output().expect("wait")
}

fn input_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn stdin_to_stdout() {
    let out = run_with_stdin(&[], "<div><p style='x'>Hari Om</p></div>");
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        r#"<p class="my-3 text-slate-700 leading-relaxed">Hari Om</p>"#
    );
}

#[test]
fn file_to_file_unwraps_fenced_answer() {
    let input = input_file(
        "```html\n<!DOCTYPE html><html><head><style>*{}</style></head>\
         <body><h2>Dharma</h2><script>x()</script></body></html>\n```",
    );
    let dir = TempDir::new().expect("temp dir");
    let out_path = dir.path().join("answer.html");

    let status = Command::new(BIN)
        .arg(input.path())
        .arg(&out_path)
        .env_remove("RUST_LOG")
        .status()
        .expect("run binary");
    assert!(status.success());

    let written = fs::read_to_string(&out_path).expect("read output");
    assert_eq!(
        written,
        r#"<h2 class="text-2xl font-semibold mt-6 mb-3 text-amber-700">Dharma</h2>"#
    );
}

#[test]
fn raw_mode_skips_fence_unwrapping() {
    let out = run_with_stdin(&["--raw"], "```html\n<p>x</p>\n```");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("```html\n<p class="), "{stdout}");
}

#[test]
fn invalid_utf8_is_decoded_lossily() {
    let out = run_with_stdin(&["--raw"], b"\xff<p>x</p>".as_slice());
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8(out.stdout).expect("utf-8 output"),
        "\u{fffd}<p class=\"my-3 text-slate-700 leading-relaxed\">x</p>"
    );
}

#[test]
fn dash_reads_stdin() {
    let out = run_with_stdin(&["-"], "a < b");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "a &lt; b");
}

#[test]
fn title_flag_prints_first_heading() {
    let out = run_with_stdin(&["--title"], "<div><h1>The <b>Self</b></h1><p>body</p></div>");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "The Self\n");
}

#[test]
fn missing_input_file_fails() {
    let dir = TempDir::new().expect("temp dir");
    let status = Command::new(BIN)
        .arg(dir.path().join("nope.html"))
        .stderr(Stdio::null())
        .status()
        .expect("run binary");
    assert!(!status.success());
}

#[test]
fn verbose_logs_go_to_stderr() {
    let out = run_with_stdin(&["-vv"], "<span>x</span>");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "x");
    assert!(String::from_utf8_lossy(&out.stderr).contains("dropping disallowed tag"));
}
