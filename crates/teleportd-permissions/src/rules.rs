// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::info;

use crate::ALLOW_LIST_RELATIVE_PATH;

/// Derives the allow-list pattern that would authorize a repeat of this
/// exact tool call, for non-Bash tools (§4.3 "Rule synthesis").
pub fn generate_permission_rule(tool_name: &str, input: &Value) -> String {
    match tool_name {
        "Edit" => format!("Edit(//{})", str_field(input, "file_path")),
        "Write" => format!("Write(//{})", str_field(input, "file_path")),
        "NotebookEdit" => format!("NotebookEdit(//{})", str_field(input, "notebook_path")),
        other => format!("{other}(*)"),
    }
}

fn str_field<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("")
}

/// The `.claude/settings.local.json`-style allow-list, scoped to a
/// session's working directory.
pub struct AllowList {
    path: PathBuf,
}

impl AllowList {
    pub fn for_cwd(cwd: &str) -> Self {
        Self {
            path: Path::new(cwd).join(ALLOW_LIST_RELATIVE_PATH),
        }
    }

    /// Loaded rules, or empty if the file is missing or unparseable.
    pub fn load(&self) -> Vec<String> {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let Ok(settings) = serde_json::from_str::<Value>(&text) else {
            return Vec::new();
        };
        settings
            .get("permissions")
            .and_then(|p| p.get("allow"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any loaded rule authorizes this tool call (§4.3 step 4):
    /// an exact match, or for Bash the `Bash(basename:*)` pattern or the
    /// bare `Bash(*)` wildcard.
    pub fn allows(&self, tool_name: &str, input: &Value) -> bool {
        let rules = self.load();
        let generated = generate_permission_rule(tool_name, input);
        if rules.iter().any(|r| r == &generated) {
            return true;
        }
        if tool_name == "Bash" {
            let command = str_field(input, "command");
            let base = command.split_whitespace().next().unwrap_or("");
            if rules.iter().any(|r| r == &format!("Bash({base}:*)")) {
                return true;
            }
            if rules.iter().any(|r| r == "Bash(*)") {
                return true;
            }
        }
        false
    }

    /// Appends `rule` to the allow-list, deduplicated, creating the file
    /// and its parent directory if needed.
    pub fn add(&self, rule: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut settings: Value = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_else(|| json!({}));

        let permissions = settings
            .as_object_mut()
            .unwrap()
            .entry("permissions")
            .or_insert_with(|| json!({"allow": [], "deny": [], "ask": []}));
        let allow = permissions
            .as_object_mut()
            .unwrap()
            .entry("allow")
            .or_insert_with(|| json!([]));
        let allow_arr = allow.as_array_mut().unwrap();
        if !allow_arr.iter().any(|v| v.as_str() == Some(rule)) {
            allow_arr.push(json!(rule));
            let rendered = serde_json::to_string_pretty(&settings)?;
            std::fs::write(&self.path, rendered)?;
            info!(rule, "added permission rule");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_rule_for_edit_uses_file_path() {
        let rule = generate_permission_rule("Edit", &json!({"file_path": "/tmp/a.rs"}));
        assert_eq!(rule, "Edit(///tmp/a.rs)");
    }

    #[test]
    fn generate_rule_for_unknown_tool_is_wildcard() {
        let rule = generate_permission_rule("WebFetch", &json!({}));
        assert_eq!(rule, "WebFetch(*)");
    }

    #[test]
    fn allow_list_missing_file_has_no_rules() {
        let dir = tempfile::tempdir().unwrap();
        let list = AllowList::for_cwd(dir.path().to_str().unwrap());
        assert!(list.load().is_empty());
        assert!(!list.allows("Bash", &json!({"command": "ls"})));
    }

    #[test]
    fn add_then_allows_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        let list = AllowList::for_cwd(dir.path().to_str().unwrap());
        list.add("Write(///tmp/a.rs)").unwrap();
        assert!(list.allows("Write", &json!({"file_path": "/tmp/a.rs"})));
    }

    #[test]
    fn add_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let list = AllowList::for_cwd(dir.path().to_str().unwrap());
        list.add("Bash(git:*)").unwrap();
        list.add("Bash(git:*)").unwrap();
        assert_eq!(list.load(), vec!["Bash(git:*)".to_string()]);
    }

    #[test]
    fn bash_basename_wildcard_allows_any_matching_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let list = AllowList::for_cwd(dir.path().to_str().unwrap());
        list.add("Bash(git:*)").unwrap();
        assert!(list.allows("Bash", &json!({"command": "git status"})));
        assert!(!list.allows("Bash", &json!({"command": "docker ps"})));
    }

    #[test]
    fn bare_bash_wildcard_allows_everything() {
        let dir = tempfile::tempdir().unwrap();
        let list = AllowList::for_cwd(dir.path().to_str().unwrap());
        list.add("Bash(*)").unwrap();
        assert!(list.allows("Bash", &json!({"command": "anything here"})));
    }
}
