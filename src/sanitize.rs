// src/sanitize.rs
//
// Allow-list sanitizer for AI-generated HTML fragments.
//
// - Document shell (doctype, comments, <head>, <style>, <script> blocks and the
//   <html>/<body> wrapper markers) is stripped before tokenizing.
// - Tokens are complete tags `<...>` or runs of text. A '<' only opens a tag when
//   it is followed by a letter, '/' + letter, '!' or '?'; any other '<' is text.
// - Tags outside the allow-list are dropped (open and close); their text survives.
// - Allowed tags lose every source attribute and get the fixed class for the tag.
//   <a> keeps a neutralized href; <iframe> survives only for known embed origins.
// - Closing tags pop the open-tag stack down to their match; unmatched closers
//   vanish. Whatever is still open at the end is closed in reverse order.
// - Text is escaped, except for a small fixed set of character references which
//   pass through untouched. Running the sanitizer on its own output is a no-op.

use memchr::memchr;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace};

/* =============================== Core sets =============================== */

/// Tag names that survive sanitization.
pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "b", "em", "i", "u", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "code", "pre", "a", "hr", "iframe",
];

/// Block-level subset of [`ALLOWED_TAGS`]. Informational only.
pub const BLOCK_TAGS: &[&str] = &[
    "p", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
];

/// Embed origins an `<iframe src>` must start with to be kept.
pub const ALLOWED_IFRAME_PREFIXES: &[&str] = &[
    "https://www.youtube.com/embed/",
    "https://player.vimeo.com/video/",
];

pub const IFRAME_TITLE: &str = "Embedded content";

pub const IFRAME_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

const TAG_CLASSES: &[(&str, &str)] = &[
    ("h1", "text-3xl font-bold mt-6 mb-4 text-amber-800 align-middle"),
    ("h2", "text-2xl font-semibold mt-6 mb-3 text-amber-700"),
    ("h3", "text-xl font-semibold mt-5 mb-2 text-orange-700"),
    ("h4", "text-lg font-semibold mt-4 mb-2 text-orange-600"),
    ("h5", "text-base font-semibold mt-3 mb-2 text-yellow-700"),
    ("h6", "text-sm font-semibold mt-3 mb-2 text-yellow-600"),
    ("p", "my-3 text-slate-700 leading-relaxed"),
    ("ul", "list-disc pl-6 my-4 space-y-2 text-slate-700"),
    ("ol", "list-decimal pl-6 my-4 space-y-2 text-slate-700"),
    ("li", "text-slate-700 leading-relaxed"),
    (
        "blockquote",
        "border-l-4 border-amber-400 pl-4 italic my-4 text-amber-800 bg-amber-50/50 py-3 rounded-r shadow-sm",
    ),
    (
        "code",
        "px-2 py-1 rounded bg-amber-100 text-amber-900 text-sm font-mono border border-amber-200",
    ),
    (
        "pre",
        "bg-slate-900 text-amber-100 p-4 rounded-lg overflow-x-auto text-sm my-4 border border-amber-200",
    ),
    (
        "a",
        "text-amber-600 underline break-words hover:text-orange-700 transition-colors font-medium",
    ),
    ("hr", "my-8 border-amber-200"),
    ("iframe", "w-full rounded-lg my-6 aspect-video border-2 border-amber-200 shadow-lg"),
];

const DANGEROUS_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:"];

/// Character references left alone when escaping text and attribute values.
const KNOWN_ENTITIES: &[(&str, char)] = &[
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&apos;", '\''),
    ("&nbsp;", '\u{a0}'),
];

/// Presentation class applied to an allowed tag, if it has one.
pub fn class_for(tag: &str) -> Option<&'static str> {
    TAG_CLASSES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|&(_, class)| class)
}

pub fn is_allowed(tag: &str) -> bool {
    canonical_name(tag).is_some()
}

pub fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.iter().any(|b| b.eq_ignore_ascii_case(tag))
}

fn is_void(tag: &str) -> bool {
    tag == "br" || tag == "hr"
}

/// Lowercase `&'static` spelling of an allowed tag name.
fn canonical_name(name: &str) -> Option<&'static str> {
    ALLOWED_TAGS
        .iter()
        .copied()
        .find(|allowed| allowed.eq_ignore_ascii_case(name))
}

/* ============================ Document shell ============================= */

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static RE_DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").unwrap());

static RE_HEAD_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>").unwrap());

static RE_STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());

static RE_SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

/// Opening and closing `<html>` / `<body>` markers; their content stays.
static RE_WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(?:html|body)\b[^>]*>").unwrap());

static RE_BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\n\s*){3,}").unwrap());

fn strip_document_shell(input: &str) -> String {
    let mut html = RE_COMMENT.replace_all(input, "").into_owned();
    for re in [
        &*RE_DOCTYPE,
        &*RE_HEAD_BLOCK,
        &*RE_STYLE_BLOCK,
        &*RE_SCRIPT_BLOCK,
        &*RE_WRAPPER,
    ] {
        if re.is_match(&html) {
            html = re.replace_all(&html, "").into_owned();
        }
    }
    html
}

fn collapse_blank_lines(out: String) -> String {
    if !RE_BLANK_RUNS.is_match(&out) {
        return out;
    }
    RE_BLANK_RUNS.replace_all(&out, "\n\n").into_owned()
}

/* ============================== Tokenizer ================================ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'a> {
    Tag(&'a str),
    Text(&'a str),
}

struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

fn tokenize(src: &str) -> Tokens<'_> {
    Tokens { src, pos: 0 }
}

/// Does the '<' at `i` open a tag, as opposed to being a stray '<' in text?
fn starts_tag(s: &[u8], i: usize) -> bool {
    match s.get(i + 1) {
        Some(b) if b.is_ascii_alphabetic() => true,
        Some(b'!') | Some(b'?') => true,
        Some(b'/') => s.get(i + 2).map_or(false, |b| b.is_ascii_alphabetic()),
        _ => false,
    }
}

/// Find the '>' for a tag starting at `i` (s[i] == '<'), being quote-aware.
fn find_tag_end(s: &[u8], mut i: usize) -> Option<usize> {
    let n = s.len();
    i += 1;
    let mut quote: u8 = 0;
    while i < n {
        let b = s[i];
        if quote != 0 {
            if b == quote {
                quote = 0;
            }
        } else if b == b'"' || b == b'\'' {
            quote = b;
        } else if b == b'>' {
            return Some(i);
        }
        i += 1;
    }
    None
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let s = self.src.as_bytes();
        let n = s.len();
        let i = self.pos;
        if i >= n {
            return None;
        }

        if s[i] == b'<' && starts_tag(s, i) {
            // Unbalanced quote: fall back to the first '>' so the rest of the document survives.
            let end = find_tag_end(s, i).or_else(|| memchr(b'>', &s[i..]).map(|off| i + off));
            if let Some(j) = end {
                self.pos = j + 1;
                return Some(Token::Tag(&self.src[i..=j]));
            }
            self.pos = n;
            return Some(Token::Text(&self.src[i..]));
        }

        let mut k = i;
        let end = loop {
            match memchr(b'<', &s[k..]) {
                Some(off) if k + off > i && starts_tag(s, k + off) => break k + off,
                Some(off) => k += off + 1,
                None => break n,
            }
            if k >= n {
                break n;
            }
        };
        self.pos = end;
        Some(Token::Text(&self.src[i..end]))
    }
}

/* =============================== Tag parsing ============================= */

#[derive(Clone, Copy, Debug)]
struct TagInfo<'a> {
    name: &'a str,
    /// Everything between the name and the closing '>' (minus a trailing '/').
    attrs: &'a str,
    is_end: bool,
    self_closing: bool,
}

#[inline]
fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

#[inline]
fn is_ws(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' || b == b'\x0c'
}

/// Extract tag name, attribute text and end/self-closing flags from raw `<...>`.
fn parse_tag_info(tag: &str) -> TagInfo<'_> {
    let s = tag.as_bytes();
    let n = s.len();
    let mut i = 1;

    let mut is_end = false;
    if i < n && s[i] == b'/' {
        is_end = true;
        i += 1;
    }
    while i < n && is_ws(s[i]) {
        i += 1;
    }
    let start = i;
    while i < n && is_name_char(s[i]) {
        i += 1;
    }
    let name = &tag[start..i];

    // self-closing? check before '>'
    let mut j = n - 1;
    while j > i && is_ws(s[j - 1]) {
        j -= 1;
    }
    let self_closing = j > i && s[j - 1] == b'/';
    let attrs_end = if self_closing { j - 1 } else { n - 1 };

    TagInfo {
        name,
        attrs: &tag[i..attrs_end.max(i)],
        is_end,
        self_closing,
    }
}

/// Value of the first `wanted="..."` / `wanted='...'` attribute.
///
/// Attribute names are matched whole and case-insensitively; unquoted values
/// and valueless attributes are skipped over.
fn quoted_attr<'a>(attrs: &'a str, wanted: &str) -> Option<&'a str> {
    let s = attrs.as_bytes();
    let len = s.len();
    let mut i = 0usize;

    while i < len {
        // skip whitespace and slashes
        while i < len && (is_ws(s[i]) || s[i] == b'/') {
            i += 1;
        }
        if i >= len {
            break;
        }

        if !is_name_char(s[i]) {
            // Not a valid name start; advance to avoid infinite loops.
            i += 1;
            continue;
        }
        let name_start = i;
        while i < len && is_name_char(s[i]) {
            i += 1;
        }
        let name = &attrs[name_start..i];

        while i < len && is_ws(s[i]) {
            i += 1;
        }
        if i >= len || s[i] != b'=' {
            continue;
        }
        i += 1;
        while i < len && is_ws(s[i]) {
            i += 1;
        }
        if i >= len {
            break;
        }

        if s[i] == b'"' || s[i] == b'\'' {
            let q = s[i];
            let value_start = i + 1;
            let value_end = memchr(q, &s[value_start..]).map_or(len, |off| value_start + off);
            if name.eq_ignore_ascii_case(wanted) {
                return Some(&attrs[value_start..value_end]);
            }
            i = (value_end + 1).min(len);
        } else {
            while i < len && !is_ws(s[i]) {
                i += 1;
            }
        }
    }
    None
}

/* ============================ Escaping =================================== */

/// Escape `& < > " '` in `text`, leaving known character references intact.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    push_escaped(&mut out, text);
    out
}

fn push_escaped(out: &mut String, text: &str) {
    for (i, ch) in text.char_indices() {
        match ch {
            '&' if char_ref_len(&text[i..]).is_some() => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

/// Length and decoded char of a recognized character reference at the start of `s`.
fn char_ref_len(s: &str) -> Option<(usize, char)> {
    if let Some(&(entity, ch)) = KNOWN_ENTITIES.iter().find(|(e, _)| s.starts_with(e)) {
        return Some((entity.len(), ch));
    }
    let b = s.as_bytes();
    if b.len() < 4 || b[0] != b'&' || b[1] != b'#' {
        return None;
    }
    let hex = b[2] == b'x' || b[2] == b'X';
    let digits_start = if hex { 3 } else { 2 };
    let digits = b[digits_start..]
        .iter()
        .take_while(|c| if hex { c.is_ascii_hexdigit() } else { c.is_ascii_digit() })
        .count();
    if digits == 0 || digits > 8 || b.get(digits_start + digits) != Some(&b';') {
        return None;
    }
    let raw = &s[digits_start..digits_start + digits];
    let code = if hex {
        u32::from_str_radix(raw, 16).ok()?
    } else {
        raw.parse::<u32>().ok()?
    };
    let ch = char::from_u32(code).unwrap_or('\u{fffd}');
    Some((digits_start + digits + 1, ch))
}

/// Decode the recognized character references, as a browser would in an attribute.
fn decode_char_refs(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match char_ref_len(rest) {
            Some((len, ch)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/* ============================ Attribute policy =========================== */

fn has_dangerous_scheme(url: &str) -> bool {
    let decoded = decode_char_refs(url);
    let compact: String = decoded
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    DANGEROUS_SCHEMES.iter().any(|scheme| compact.starts_with(scheme))
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    push_escaped(out, value);
    out.push('"');
}

fn push_anchor_attrs(attrs: &str, out: &mut String) {
    let href = quoted_attr(attrs, "href")
        .map(str::trim)
        .filter(|href| !href.is_empty());
    if let Some(href) = href {
        if has_dangerous_scheme(href) {
            debug!(href, "neutralizing dangerous link");
            push_attr(out, "href", "#");
        } else {
            push_attr(out, "href", href);
        }
    }
    out.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
}

/// The iframe `src`, if present and pointing at an allowed embed origin.
fn allowed_iframe_src(attrs: &str) -> Option<&str> {
    let Some(src) = quoted_attr(attrs, "src").map(str::trim) else {
        debug!("dropping iframe without src");
        return None;
    };
    if !ALLOWED_IFRAME_PREFIXES.iter().any(|p| src.starts_with(p)) {
        debug!(src, "dropping iframe from disallowed origin");
        return None;
    }
    Some(src)
}

/* ============================== Transform =============================== */

fn push_close(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Close everything down to and including the nearest open `tag`.
fn close_to(tag: &'static str, stack: &mut Vec<&'static str>, out: &mut String) {
    let Some(idx) = stack.iter().rposition(|&open| open == tag) else {
        debug!(tag, "dropping unmatched closing tag");
        return;
    };
    for open in stack.drain(idx..).rev() {
        push_close(out, open);
    }
}

fn emit_tag(raw: &str, stack: &mut Vec<&'static str>, out: &mut String) {
    let ti = parse_tag_info(raw);
    let Some(tag) = canonical_name(ti.name) else {
        debug!(tag = ti.name, end = ti.is_end, "dropping disallowed tag");
        return;
    };

    if ti.is_end {
        close_to(tag, stack, out);
        return;
    }

    let mark = out.len();
    out.push('<');
    out.push_str(tag);
    match tag {
        "a" => push_anchor_attrs(ti.attrs, out),
        "iframe" => {
            let Some(src) = allowed_iframe_src(ti.attrs) else {
                out.truncate(mark);
                return;
            };
            push_attr(out, "src", src);
            push_attr(out, "title", IFRAME_TITLE);
            push_attr(out, "allow", IFRAME_ALLOW);
            out.push_str(" allowfullscreen");
        }
        _ => {}
    }
    if let Some(class) = class_for(tag) {
        push_attr(out, "class", class);
    }
    out.push('>');

    if is_void(tag) {
        // nothing to close
    } else if ti.self_closing {
        push_close(out, tag);
    } else {
        stack.push(tag);
    }
}

fn emit_text(text: &str, out: &mut String) {
    let text = text.trim_start();
    if text.is_empty() {
        return;
    }
    push_escaped(out, text);
}

/// Sanitize an untrusted HTML fragment into allow-listed, restyled markup.
///
/// Never fails: unknown tags are dropped, bad links neutralized, unmatched
/// closers ignored and anything left open is closed at the end.
pub fn sanitize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let html = strip_document_shell(input);
    let mut out = String::with_capacity(html.len() + html.len() / 2);
    let mut stack: Vec<&'static str> = Vec::new();

    for token in tokenize(&html) {
        trace!(?token, depth = stack.len(), "token");
        match token {
            Token::Tag(raw) => emit_tag(raw, &mut stack, &mut out),
            Token::Text(text) => emit_text(text, &mut out),
        }
    }

    while let Some(open) = stack.pop() {
        push_close(&mut out, open);
    }

    collapse_blank_lines(out)
}

/// [`sanitize`] for callers that may not have a string at all.
pub fn sanitize_opt(input: Option<&str>) -> String {
    input.map(sanitize).unwrap_or_default()
}

/// Reusable handle over [`sanitize`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Sanitizer;

impl Sanitizer {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, html: &str) -> String {
        sanitize(html)
    }
}
