// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface of the core process — not the setup wizard, not a
/// terminal-side teleport hook (§6).
#[derive(Parser, Debug)]
#[command(
    name = "teleportd",
    about = "Bridges a terminal AI coding agent with a chat-app frontend",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Extra config layer merged on top of the default search path (§4.10).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Force debug logging regardless of RUST_LOG.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP/SSE server and, if configured, the chat frontend.
    Serve,
    /// Print the fully merged configuration as YAML and exit.
    ShowConfig,
}
