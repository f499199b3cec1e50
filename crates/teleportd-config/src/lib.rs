// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Orchestrator configuration loaded from YAML.
//!
//! Configuration is YAML (never TOML). Layers are **deep-merged** — override
//! only the fields you care about in each file.
//!
//! Search order (later overrides earlier):
//! 1. `/etc/teleportd/orchestrator.yaml`
//! 2. `~/.config/teleportd/orchestrator.yaml`
//! 3. `.orchestrator/config.yaml` (workspace-local)
//! 4. Path given to [`load`] explicitly.
//!
//! **All defaults are production-safe.** Running `load(None)` with no config
//! file gives you a loopback-bound HTTP server and an empty (unauthorized)
//! chat identity — the process will refuse to serve until one is configured.
//!
//! # Loading
//!
//! ```rust
//! use teleportd_config::load;
//!
//! let config = load(None).unwrap();
//! assert!(config.http.bind.starts_with("127.0.0.1"));
//! ```
//!
//! # Example full config
//! ```yaml
//! http:
//!   bind: "127.0.0.1:8780"
//!   token_file: "~/.config/teleportd/token.yaml"
//!
//! chat:
//!   bot_token: "123456:ABC-DEF..."
//!   authorized_chat_id: 123456789
//!
//! agent:
//!   command: "claude"
//!   args: ["--print", "--output-format", "stream-json"]
//!
//! sse:
//!   keepalive_secs: 30
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_http_bind() -> String {
    "127.0.0.1:8780".to_string()
}

fn default_max_body() -> usize {
    4 * 1024 * 1024
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_allow_list_path() -> String {
    ".claude/settings.local.json".to_string()
}

fn default_snapshot_path() -> PathBuf {
    std::env::temp_dir().join("teleportd-session-state.json")
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sse: SseConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// `host:port` to listen on. Default: `127.0.0.1:8780` (loopback only).
    #[serde(default = "default_http_bind")]
    pub bind: String,

    /// Path to the YAML file storing the SHA-256 hashed bearer token. If
    /// `None`, auto-located at `~/.config/teleportd/token.yaml`.
    pub token_file: Option<PathBuf>,

    /// Maximum request body size in bytes (default: 4 MiB).
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,

    /// Path of the allow-list file relative to a session's cwd.
    /// Default: `.claude/settings.local.json`.
    #[serde(default = "default_allow_list_path")]
    pub allow_list_path: String,

    /// Path of the session-state snapshot used across hot reloads.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            token_file: None,
            max_body_bytes: default_max_body(),
            allow_list_path: default_allow_list_path(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Chat-SDK (Telegram) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Bot token for the chat SDK. Required to start the chat frontend.
    pub bot_token: Option<String>,

    /// The single chat identity permitted to drive this orchestrator.
    /// `None` means the orchestrator is unconfigured and will reject every
    /// chat message until `/link` completes the setup-wizard rendezvous.
    pub authorized_chat_id: Option<i64>,
}

/// External agent launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Executable to launch for each agent conversation.
    #[serde(default = "default_agent_command")]
    pub command: String,

    /// Extra arguments appended to every invocation.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_agent_command() -> String {
    "claude".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: Vec::new(),
        }
    }
}

/// SSE stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    /// Seconds of inactivity before a keepalive is emitted. Must stay ≤ 30
    /// per the SSE keepalive invariant.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

// ── Loader ────────────────────────────────────────────────────────────────────

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.push(PathBuf::from("/etc/teleportd/orchestrator.yaml"));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/teleportd/orchestrator.yaml"));
    }
    paths.push(PathBuf::from(".orchestrator/config.yaml"));
    paths
}

/// Load configuration from the default search paths, optionally merging an
/// explicit extra layer on top. Missing files at any layer are skipped, not
/// an error; an unparseable file that exists is.
pub fn load(extra: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading orchestrator config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit orchestrator config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let config: OrchestratorConfig =
        if matches!(&merged, serde_yaml::Value::Mapping(m) if m.is_empty()) {
            OrchestratorConfig::default()
        } else {
            serde_yaml::from_value(merged).context("invalid orchestrator config shape")?
        };
    Ok(config)
}

fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Returns `true` if the loaded config names an authorized chat identity —
/// a config that parses but has none is startup-fatal (§4.10).
pub fn is_usable(config: &OrchestratorConfig) -> bool {
    config.chat.authorized_chat_id.is_some() || config.chat.bot_token.is_some()
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_bind_is_loopback() {
        let c = OrchestratorConfig::default();
        assert!(c.http.bind.starts_with("127.0.0.1"));
    }

    #[test]
    fn default_keepalive_is_within_invariant() {
        let c = OrchestratorConfig::default();
        assert!(c.sse.keepalive_secs <= 30);
    }

    #[test]
    fn default_allow_list_path_matches_agent_convention() {
        let c = OrchestratorConfig::default();
        assert_eq!(c.http.allow_list_path, ".claude/settings.local.json");
    }

    #[test]
    fn config_yaml_round_trip() {
        let c = OrchestratorConfig::default();
        let yaml = serde_yaml::to_string(&c).unwrap();
        let back: OrchestratorConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.http.bind, c.http.bind);
        assert_eq!(back.agent.command, c.agent.command);
    }

    #[test]
    fn load_returns_defaults_when_no_files_exist() {
        let c = load(None).unwrap();
        assert_eq!(c.http.bind, default_http_bind());
    }

    #[test]
    fn load_merges_explicit_layer_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.yaml");
        std::fs::write(&path, "http:\n  bind: \"0.0.0.0:9999\"\nchat:\n  authorized_chat_id: 42\n")
            .unwrap();
        let c = load(Some(&path)).unwrap();
        assert_eq!(c.http.bind, "0.0.0.0:9999");
        assert_eq!(c.chat.authorized_chat_id, Some(42));
        // untouched field keeps its default
        assert_eq!(c.agent.command, default_agent_command());
    }

    #[test]
    fn is_usable_requires_chat_identity_or_token() {
        let mut c = OrchestratorConfig::default();
        assert!(!is_usable(&c));
        c.chat.authorized_chat_id = Some(1);
        assert!(is_usable(&c));
    }

    #[test]
    fn merge_yaml_deep_merges_nested_mappings() {
        let mut dst: serde_yaml::Value =
            serde_yaml::from_str("http:\n  bind: a\n  max_body_bytes: 1\n").unwrap();
        let src: serde_yaml::Value = serde_yaml::from_str("http:\n  bind: b\n").unwrap();
        merge_yaml(&mut dst, src);
        let mapping = dst.as_mapping().unwrap();
        let http = mapping
            .get(serde_yaml::Value::String("http".into()))
            .unwrap()
            .as_mapping()
            .unwrap();
        assert_eq!(
            http.get(serde_yaml::Value::String("bind".into()))
                .unwrap()
                .as_str(),
            Some("b")
        );
        assert_eq!(
            http.get(serde_yaml::Value::String("max_body_bytes".into()))
                .unwrap()
                .as_i64(),
            Some(1)
        );
    }
}
