// src/answer.rs
//
// Pre-processing of answer-service payloads before they reach the sanitizer:
// unwrap ```html fences, detect whether a payload is HTML at all, pull out the
// <body> content and the first <h1> as a title.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::sanitize::sanitize;

static RE_FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:```|`)html\r?\n").unwrap());

static RE_FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n`{1,3}$").unwrap());

static RE_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*?)</body\s*>").unwrap());

static RE_H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>").unwrap());

static RE_ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Strip a markdown ```html fence wrapped around a payload.
pub fn unwrap_fenced_html(text: &str) -> Option<String> {
    let opener = RE_FENCE_OPEN.find(text)?;
    let inner = &text[opener.end()..];
    let inner = match RE_FENCE_CLOSE.find(inner) {
        Some(closer) => &inner[..closer.start()],
        None => inner,
    };
    Some(inner.trim().to_string())
}

pub fn looks_like_html(text: &str) -> bool {
    text.contains("<!DOCTYPE html>") || text.contains("<html") || text.contains("<div")
}

/// The HTML carried by a payload, or `None` when it should be shown as plain text.
pub fn extract_html(text: &str) -> Option<String> {
    if let Some(html) = unwrap_fenced_html(text) {
        return Some(html);
    }
    looks_like_html(text).then(|| text.to_string())
}

/// Inner content of the first `<body>` element, or the whole input.
pub fn extract_body(html: &str) -> &str {
    RE_BODY
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map_or(html, |m| m.as_str())
}

/// Text of the first `<h1>`, with nested markup removed.
pub fn extract_title(html: &str) -> Option<String> {
    let inner = RE_H1.captures(html)?.get(1)?.as_str();
    let title = RE_ANY_TAG.replace_all(inner, "");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// A payload ready for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    pub title: Option<String>,
    /// Sanitized markup, safe to embed as-is.
    pub html: String,
}

/// Unwrap, extract and sanitize a raw answer payload.
pub fn prepare_answer(raw: &str) -> Answer {
    match extract_html(raw) {
        Some(html) => {
            let title = extract_title(&html);
            let body = extract_body(&html);
            debug!(
                title = title.as_deref(),
                body_len = body.len(),
                "preparing html answer"
            );
            Answer {
                title,
                html: sanitize(body),
            }
        }
        None => {
            debug!(len = raw.len(), "preparing plain-text answer");
            Answer {
                title: None,
                html: sanitize(raw),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_backtick_fence_is_unwrapped() {
        let text = "```html\n<div><p>Namaste</p></div>\n```";
        assert_eq!(
            unwrap_fenced_html(text).as_deref(),
            Some("<div><p>Namaste</p></div>")
        );
    }

    #[test]
    fn single_backtick_fence_is_unwrapped() {
        assert_eq!(unwrap_fenced_html("`html\n<p>x</p>\n`").as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn unclosed_fence_keeps_the_rest() {
        assert_eq!(unwrap_fenced_html("```html\n<p>x</p>  ").as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn other_fences_are_not_html() {
        assert_eq!(unwrap_fenced_html("```rust\nfn main() {}\n```"), None);
        assert_eq!(unwrap_fenced_html("``html\n<p>x</p>"), None);
        assert_eq!(unwrap_fenced_html("text ```html\n<p>x</p>"), None);
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html("<!DOCTYPE html><p>x</p>"));
        assert!(looks_like_html("intro <div>x</div>"));
        assert!(looks_like_html("<html lang='hi'>"));
        assert!(!looks_like_html("<p>only a paragraph</p>"));
        assert!(!looks_like_html("Meditation calms the mind."));
    }

    #[test]
    fn extract_html_prefers_fence() {
        assert_eq!(extract_html("```html\n<p>a</p>\n```").as_deref(), Some("<p>a</p>"));
        assert_eq!(extract_html("<div>b</div>").as_deref(), Some("<div>b</div>"));
        assert_eq!(extract_html("plain words"), None);
    }

    #[test]
    fn body_is_extracted() {
        let html = "<html><head><title>t</title></head><BODY class=\"x\">\n<p>in</p>\n</BODY></html>";
        assert_eq!(extract_body(html), "\n<p>in</p>\n");
        assert_eq!(extract_body("<p>no body</p>"), "<p>no body</p>");
    }

    #[test]
    fn title_comes_from_first_h1() {
        let html = "<h1 class=\"t\">The <em>Inner</em> Path</h1><h1>Second</h1>";
        assert_eq!(extract_title(html).as_deref(), Some("The Inner Path"));
        assert_eq!(extract_title("<h1>  </h1>"), None);
        assert_eq!(extract_title("<h2>x</h2>"), None);
    }

    #[test]
    fn prepare_html_answer() {
        let raw = "```html\n<!DOCTYPE html><html><head><style>h1{}</style></head>\
                   <body><h1>Karma</h1><div><p>Act without attachment.</p></div></body></html>\n```";
        let answer = prepare_answer(raw);
        assert_eq!(answer.title.as_deref(), Some("Karma"));
        assert_eq!(
            answer.html,
            "<h1 class=\"text-3xl font-bold mt-6 mb-4 text-amber-800 align-middle\">Karma</h1>\
             <p class=\"my-3 text-slate-700 leading-relaxed\">Act without attachment.</p>"
        );
    }

    #[test]
    fn prepare_plain_answer_escapes_text() {
        let answer = prepare_answer("  Peace <3 & joy");
        assert_eq!(answer.title, None);
        assert_eq!(answer.html, "Peace &lt;3 &amp; joy");
    }
}
