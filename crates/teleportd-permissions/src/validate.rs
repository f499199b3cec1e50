// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::tokenize::shell_tokenize;

/// A candidate Bash rule pattern must end in `" *"` or be the bare `"*"`;
/// its prefix must appear as an ordered (not necessarily contiguous)
/// subsequence of the original command's tokens.
pub fn pattern_matches_command(pattern: &str, command: &str) -> bool {
    if pattern != "*" && !pattern.ends_with(" *") {
        return false;
    }

    let prefix = pattern.trim_end_matches(['*', ' ']).trim();
    if prefix.is_empty() {
        return true;
    }

    let pattern_tokens = shell_tokenize(prefix);
    let command_tokens = shell_tokenize(command);
    if command_tokens.is_empty() {
        return false;
    }

    let mut cmd_idx = 0;
    for pat_token in &pattern_tokens {
        let mut found = false;
        while cmd_idx < command_tokens.len() {
            if &command_tokens[cmd_idx] == pat_token {
                found = true;
                cmd_idx += 1;
                break;
            }
            cmd_idx += 1;
        }
        if !found {
            return false;
        }
    }
    true
}

/// An empty prefix (the bare `*`) is dangerously broad and always rejected.
pub fn is_pattern_too_broad(pattern: &str) -> bool {
    pattern.trim_end_matches(['*', ' ']).trim().is_empty()
}
