//! Allow-list sanitizer for AI-generated HTML answers.
//!
//! Untrusted fragments (often full documents with inline styles and scripts)
//! are reduced to a small set of semantic tags, each restyled with a fixed
//! Tailwind class so the answer blends into the host page. The output is
//! balanced, escaped, and safe to embed directly as markup.
//!
//! ```
//! use ai_html_sanitizer::sanitize;
//!
//! let out = sanitize("<div style='color:red'><p>Om</p><script>x()</script></div>");
//! assert_eq!(out, r#"<p class="my-3 text-slate-700 leading-relaxed">Om</p>"#);
//! ```

pub mod answer;
pub mod sanitize;

pub use answer::{extract_body, extract_html, extract_title, prepare_answer, Answer};
pub use sanitize::{
    class_for, escape_text, is_allowed, is_block, sanitize, sanitize_opt, Sanitizer,
    ALLOWED_IFRAME_PREFIXES, ALLOWED_TAGS, BLOCK_TAGS, IFRAME_ALLOW, IFRAME_TITLE,
};
