use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ferroftpd", about = "An explicit-FTPS server written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/ferroftpd.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the server in the foreground (the default)
    Start,
    /// Stop a running server via its PID file
    Stop,
    /// Stop a running server, then start a new one
    Restart,
    /// Report whether a server is running
    Status,
    /// Ask a running server to reload; currently restart-equivalent
    Reload,
    /// Parse and validate the configuration, then exit
    TestConfig,
    /// Alias of test-config
    Validate,
    /// Manage accounts stored in the configuration file
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Add an account; the password is hashed before it is written
    Add {
        username: String,
        password: String,
        home: PathBuf,
        /// Comma-separated permission names; empty grants everything
        #[arg(long, value_delimiter = ',')]
        permissions: Vec<String>,
    },
    /// Remove an account
    Remove { username: String },
    /// List configured accounts
    List,
}
