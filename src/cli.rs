use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const KNOWN_COMMANDS: &str = "start / last / createSSL / startBackground / stopBackground / list";

#[derive(Parser, Debug)]
#[command(name = "local-https", version, about = "Local development file server over http or https")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve a directory (port defaults to 443 with a certificate, 80 without)
    Start {
        port: Option<u16>,
        /// Directory to serve (default: current directory)
        path: Option<PathBuf>,
    },
    /// Serve the directory and port of the last successful start
    Last,
    /// Generate a self-signed certificate under ssl/
    #[command(name = "createSSL")]
    CreateSsl {
        /// File name for the key and certificate (default: server)
        name: Option<String>,
    },
    /// Run `start` detached under the process manager
    #[command(name = "startBackground")]
    StartBackground {
        port: Option<u16>,
        path: Option<PathBuf>,
        /// Name suffix for the background process (default: timestamp)
        tag: Option<String>,
    },
    /// Stop one tagged background server, or all of them
    #[command(name = "stopBackground")]
    StopBackground { tag: Option<String> },
    /// Show background servers started by this tool
    List,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Last => "last",
            Command::CreateSsl { .. } => "createSSL",
            Command::StartBackground { .. } => "startBackground",
            Command::StopBackground { .. } => "stopBackground",
            Command::List => "list",
        }
    }
}
