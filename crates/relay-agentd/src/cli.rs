use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Relay agent: HTTP front end or command-channel daemon.
#[derive(Debug, Parser)]
#[command(name = "relay-agentd", version)]
pub struct Cli {
    /// JSON configuration file; every field has a default.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Role::Frontend)]
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Serve HTTP, dispatch calls, publish commands and run maintenance.
    Frontend,
    /// Answer commands pushed and requested over the command channel.
    Daemon,
}
