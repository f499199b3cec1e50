// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use tracing::{info, warn};

use crate::tokenize::shell_tokenize;
use crate::validate::{is_pattern_too_broad, pattern_matches_command};

/// System prompt for the lightweight model call that turns a Bash
/// invocation into a wildcarded permission pattern: keep command,
/// subcommand, and flags; wildcard every value.
pub const SMART_RULE_SYSTEM_PROMPT: &str = "\
You convert bash commands to permission patterns. Output ONLY the pattern, nothing else.

Rules:
- Keep: command name, subcommand, all flags (starting with - or --)
- Remove: all values (paths, names, URLs, numbers like -20)
- End with single *

Examples:
Input: git push origin main --tags
Output: git push --tags *

Input: head -20 file.txt
Output: head *

Input: tail -f log.txt
Output: tail -f *

Input: docker run -it --rm -v /a:/b img
Output: docker run -it --rm -v *

Input: kubectl get pods -n ns -o wide
Output: kubectl get pods -n -o *

Input: python3 script.py --verbose
Output: python3 --verbose *

Respond with ONLY the pattern, no explanation.";

/// A single attempt at asking a model to turn a Bash command into a
/// wildcarded pattern. Implemented by whatever launches the external
/// agent process; kept abstract here so this crate stays free of a
/// process-management dependency.
#[async_trait]
pub trait BashRuleGenerator: Send + Sync {
    async fn generate_once(&self, command: &str) -> anyhow::Result<String>;
}

fn normalize_trailing_wildcard(mut pattern: String) -> String {
    pattern = pattern.trim().to_string();
    if !pattern.ends_with(" *") {
        if let Some(stripped) = pattern.strip_suffix('*') {
            pattern = format!("{} *", stripped.trim_end());
        } else {
            pattern.push_str(" *");
        }
    }
    pattern
}

/// Generates a smart Bash permission rule, retrying up to `max_retries`
/// times on a candidate that fails validation, then falling back to
/// `Bash(<basename>:*)`.
pub async fn generate_smart_bash_rule(
    generator: &dyn BashRuleGenerator,
    command: &str,
    max_retries: u32,
) -> String {
    let base_cmd = shell_tokenize(command)
        .first()
        .cloned()
        .unwrap_or_else(|| command.split_whitespace().next().unwrap_or("unknown").to_string());
    let fallback = format!("Bash({base_cmd}:*)");

    for attempt in 0..=max_retries {
        match generator.generate_once(command).await {
            Ok(raw) => {
                let pattern = normalize_trailing_wildcard(raw);
                if !pattern_matches_command(&pattern, command) {
                    warn!(attempt, pattern, "smart rule does not match command");
                    continue;
                }
                if is_pattern_too_broad(&pattern) {
                    warn!(attempt, pattern, "smart rule is too broad");
                    continue;
                }
                info!(pattern, "generated smart bash rule");
                return format!("Bash({pattern})");
            }
            Err(err) => {
                warn!(attempt, %err, "smart rule generation attempt failed");
            }
        }
    }

    warn!(fallback, "all smart rule attempts failed, using fallback");
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl BashRuleGenerator for FixedGenerator {
        async fn generate_once(&self, _command: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl BashRuleGenerator for FailingGenerator {
        async fn generate_once(&self, _command: &str) -> anyhow::Result<String> {
            anyhow::bail!("model unavailable")
        }
    }

    struct EventuallySucceeds {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BashRuleGenerator for EventuallySucceeds {
        async fn generate_once(&self, _command: &str) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < 1 {
                Ok("*".to_string()) // too broad, rejected
            } else {
                Ok("git push --tags *".to_string())
            }
        }
    }

    #[tokio::test]
    async fn valid_candidate_is_used_directly() {
        let gen = FixedGenerator("git push --tags *");
        let rule = generate_smart_bash_rule(&gen, "git push origin main --tags", 2).await;
        assert_eq!(rule, "Bash(git push --tags *)");
    }

    #[tokio::test]
    async fn missing_trailing_wildcard_is_normalized() {
        let gen = FixedGenerator("head");
        let rule = generate_smart_bash_rule(&gen, "head -20 file.txt", 2).await;
        assert_eq!(rule, "Bash(head *)");
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_basename() {
        let rule = generate_smart_bash_rule(&FailingGenerator, "git push origin", 2).await;
        assert_eq!(rule, "Bash(git:*)");
    }

    #[tokio::test]
    async fn too_broad_candidate_retries_then_succeeds() {
        let gen = EventuallySucceeds {
            calls: AtomicUsize::new(0),
        };
        let rule = generate_smart_bash_rule(&gen, "git push origin main --tags", 2).await;
        assert_eq!(rule, "Bash(git push --tags *)");
    }

    #[tokio::test]
    async fn exhausting_retries_on_bad_candidates_falls_back() {
        let gen = FixedGenerator("*");
        let rule = generate_smart_bash_rule(&gen, "git push origin", 2).await;
        assert_eq!(rule, "Bash(git:*)");
    }
}
