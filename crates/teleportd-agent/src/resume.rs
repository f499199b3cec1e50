// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{info, warn};

/// Derives the on-disk transcript directory the agent CLI uses for a given
/// working directory, mirroring its own `cwd -> -a-b-c` slug convention.
fn project_log_dir(cwd: &str) -> Option<PathBuf> {
    let mut slug = cwd.replace('/', "-").replace(':', "");
    if slug.starts_with('-') {
        slug.remove(0);
    }
    dirs::home_dir().map(|home| home.join(".claude").join("projects").join(format!("-{slug}")))
}

/// Whether a prior conversation transcript exists and has genuine message
/// content (as opposed to metadata-only), in which case it is eligible to
/// be resumed (§4.2, grounded in `can_resume_session`).
pub fn can_resume_session(session_id: &str, cwd: &str) -> bool {
    let Some(log_dir) = project_log_dir(cwd) else {
        return false;
    };
    let log_file = log_dir.join(format!("{session_id}.jsonl"));
    let Ok(file) = std::fs::File::open(&log_file) else {
        info!(session_id, "cannot resume: transcript file not found");
        return false;
    };
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        if line.contains("\"type\":\"user\"") || line.contains("\"type\":\"assistant\"") {
            info!(session_id, "transcript has messages, resumable");
            return true;
        }
    }
    warn!(session_id, "transcript has no messages, not resumable");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_transcript_is_not_resumable() {
        assert!(!can_resume_session("nonexistent-session-id", "/tmp"));
    }

    #[test]
    fn transcript_with_only_metadata_is_not_resumable() {
        let home = dirs::home_dir().unwrap();
        let dir = home.join(".claude/projects/-tmp-teleportd-agent-test-metadata-only");
        std::fs::create_dir_all(&dir).unwrap();
        let session_id = "metadata-only-session";
        std::fs::write(
            dir.join(format!("{session_id}.jsonl")),
            "{\"type\":\"summary\"}\n",
        )
        .unwrap();
        assert!(!can_resume_session(session_id, "/tmp/teleportd-agent-test-metadata-only"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn transcript_with_a_user_message_is_resumable() {
        let home = dirs::home_dir().unwrap();
        let dir = home.join(".claude/projects/-tmp-teleportd-agent-test-with-messages");
        std::fs::create_dir_all(&dir).unwrap();
        let session_id = "with-messages-session";
        std::fs::write(
            dir.join(format!("{session_id}.jsonl")),
            "{\"type\":\"user\",\"content\":\"hi\"}\n",
        )
        .unwrap();
        assert!(can_resume_session(session_id, "/tmp/teleportd-agent-test-with-messages"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
