// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn fenced_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap())
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

fn bold_star_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").unwrap())
}

fn bold_underscore_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"__(.+?)__").unwrap())
}

fn italic_star_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\w*])\*([^*]+)\*(?:[^\w*]|$)").unwrap())
}

fn italic_underscore_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\w_])_([^_]+)_(?:[^\w_]|$)").unwrap())
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap())
}

/// HTML-escapes `&`, `<`, `>` — the minimum Telegram's HTML parse mode
/// requires.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const CODE_PLACEHOLDER: char = '\u{0}';

/// Converts the agent's lightweight markdown subset into chat HTML,
/// preserving code content verbatim through the contractual five-step
/// extract/escape/transform/splice order (§4.2).
pub fn markdown_to_chat_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut code_blocks = Vec::new();
    let mut working = fenced_code_re()
        .replace_all(text, |caps: &Captures| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let code = escape_html(caps.get(2).unwrap().as_str().trim());
            let block = if lang.is_empty() {
                format!("<pre><code>{code}</code></pre>")
            } else {
                format!("<pre><code class=\"language-{lang}\">{code}</code></pre>")
            };
            code_blocks.push(block);
            format!("{CODE_PLACEHOLDER}CODE{}{CODE_PLACEHOLDER}", code_blocks.len() - 1)
        })
        .into_owned();

    let mut inline_codes = Vec::new();
    working = inline_code_re()
        .replace_all(&working, |caps: &Captures| {
            let code = escape_html(&caps[1]);
            inline_codes.push(format!("<code>{code}</code>"));
            format!(
                "{CODE_PLACEHOLDER}INLINE{}{CODE_PLACEHOLDER}",
                inline_codes.len() - 1
            )
        })
        .into_owned();

    working = escape_html(&working);

    working = bold_star_re().replace_all(&working, "<b>$1</b>").into_owned();
    working = bold_underscore_re()
        .replace_all(&working, "<b>$1</b>")
        .into_owned();
    working = replace_word_boundary_italic(&working, italic_star_re());
    working = replace_word_boundary_italic(&working, italic_underscore_re());
    working = link_re()
        .replace_all(&working, "<a href=\"$2\">$1</a>")
        .into_owned();

    for (i, block) in code_blocks.iter().enumerate() {
        working = working.replace(&format!("{CODE_PLACEHOLDER}CODE{i}{CODE_PLACEHOLDER}"), block);
    }
    for (i, code) in inline_codes.iter().enumerate() {
        working = working.replace(
            &format!("{CODE_PLACEHOLDER}INLINE{i}{CODE_PLACEHOLDER}"),
            code,
        );
    }

    working
}

/// Italic regexes capture a surrounding boundary char to emulate
/// Python's `(?<!\w)...(?!\w)` lookaround, which `regex` (no lookaround
/// support) can't express directly. Re-splice the captured boundaries
/// back around the replacement.
fn replace_word_boundary_italic(text: &str, re: &Regex) -> String {
    let mut result = String::new();
    let mut last_end = 0;
    for caps in re.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        result.push_str(&text[last_end..whole.start()]);
        let matched = whole.as_str();
        let inner = caps.get(1).unwrap().as_str();
        let leading = &matched[..matched.find(inner).unwrap()];
        let trailing = &matched[matched.find(inner).unwrap() + inner.len()..];
        result.push_str(leading);
        result.push_str("<i>");
        result.push_str(inner);
        result.push_str("</i>");
        result.push_str(trailing);
        last_end = whole.end();
    }
    result.push_str(&text[last_end..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(escape_html("<a> & <b>"), "&lt;a&gt; &amp; &lt;b&gt;");
    }

    #[test]
    fn translates_bold_and_italic() {
        let html = markdown_to_chat_html("**bold** and *italic* text");
        assert_eq!(html, "<b>bold</b> and <i>italic</i> text");
    }

    #[test]
    fn underscore_bold_and_italic() {
        let html = markdown_to_chat_html("__bold__ and _italic_");
        assert_eq!(html, "<b>bold</b> and <i>italic</i>");
    }

    #[test]
    fn italic_does_not_fire_inside_a_word() {
        let html = markdown_to_chat_html("snake_case_identifier stays put");
        assert!(!html.contains("<i>"));
    }

    #[test]
    fn inline_code_is_escaped_and_preserved_verbatim() {
        let html = markdown_to_chat_html("use `<script>` here");
        assert_eq!(html, "use <code>&lt;script&gt;</code> here");
    }

    #[test]
    fn fenced_code_block_keeps_language_class() {
        let html = markdown_to_chat_html("```rust\nfn main() {}\n```");
        assert_eq!(html, "<pre><code class=\"language-rust\">fn main() {}</code></pre>");
    }

    #[test]
    fn fenced_code_block_without_language_has_bare_pre() {
        let html = markdown_to_chat_html("```\nplain\n```");
        assert_eq!(html, "<pre><code>plain</code></pre>");
    }

    #[test]
    fn code_block_content_is_never_markdown_processed() {
        let html = markdown_to_chat_html("```\n**not bold** *not italic*\n```");
        assert!(html.contains("**not bold**"));
    }

    #[test]
    fn links_are_converted() {
        let html = markdown_to_chat_html("[docs](https://example.com)");
        assert_eq!(html, "<a href=\"https://example.com\">docs</a>");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(markdown_to_chat_html(""), "");
    }
}
