// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::OnceLock;

use regex::Regex;
use teleportd_core::ContextUsage;

fn context_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*?\*?Tokens:\*?\*?\s*([\d.]+)k\s*/\s*([\d.]+)k\s*\((\d+)%\)").unwrap()
    })
}

/// Extracts context-window usage from an agent output line such as
/// `**Tokens:** 21.8k / 200.0k (11%)` or `Tokens: 24.4k / 200.0k (12%)`.
/// Returns `None` on parse failure — the caller must leave the session's
/// context unchanged in that case (§4.2).
pub fn parse_context_output(text: &str) -> Option<ContextUsage> {
    let caps = context_re().captures(text)?;
    let used: f64 = caps[1].parse().ok()?;
    let max: f64 = caps[2].parse().ok()?;
    let percent: u8 = caps[3].parse().ok()?;
    Some(ContextUsage {
        tokens_used: (used * 1000.0) as u64,
        tokens_max: (max * 1000.0) as u64,
        percent_used: percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_form() {
        let usage = parse_context_output("Tokens: 24.4k / 200.0k (12%)").unwrap();
        assert_eq!(usage.tokens_used, 24400);
        assert_eq!(usage.tokens_max, 200000);
        assert_eq!(usage.percent_used, 12);
    }

    #[test]
    fn parses_bold_wrapped_form() {
        let usage = parse_context_output("**Tokens:** 21.8k / 200.0k (11%)").unwrap();
        assert_eq!(usage.tokens_used, 21800);
        assert_eq!(usage.percent_used, 11);
    }

    #[test]
    fn parses_embedded_in_larger_text() {
        let usage =
            parse_context_output("Some preamble\nTokens: 5k / 100k (5%)\ntrailer").unwrap();
        assert_eq!(usage.tokens_used, 5000);
    }

    #[test]
    fn returns_none_when_pattern_absent() {
        assert!(parse_context_output("no usage info here").is_none());
    }
}
