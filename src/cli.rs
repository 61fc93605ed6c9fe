// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "arbiterd", version, about = "Agentic session orchestration core")]
pub struct Cli {
    /// Path to an explicit config file, merged on top of the discovered layers.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Emit tracing output to stderr at debug level.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a single user turn against a fresh session and stream the
    /// resulting events to stdout.
    Run {
        message: String,
        /// Session token budget; defaults to the configured model's context window.
        #[arg(long)]
        max_tokens: Option<usize>,
    },
    /// Print the fully merged configuration as YAML.
    ShowConfig,
    /// Print shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
