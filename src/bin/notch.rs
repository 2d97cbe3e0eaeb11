//! Notch CLI - query and pin Claude Code sessions tracked by notchd
//!
//! # Usage
//!
//! ```text
//! notch             # Daemon status and all tracked sessions
//! notch sessions    # Only the sessions worth displaying
//! notch pin         # Pin the current directory's sessions
//! notch unpin       # Clear all pins
//! notch health      # Liveness check
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use notch_cli::{output, NotchClient};
use notchd::settings::DEFAULT_PORT;

/// Notch CLI - monitor Claude Code sessions
#[derive(Parser, Debug)]
#[command(name = "notch", version, about)]
struct Args {
    /// Daemon port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show daemon status and all tracked sessions
    Status,
    /// Show the sessions worth displaying (active, working, or pinned)
    Sessions,
    /// Pin a project path so its sessions survive pruning
    Pin {
        /// Project path (defaults to the current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// Clear all pinned project paths
    Unpin,
    /// Check daemon liveness
    Health,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let client = NotchClient::new(args.port);

    match args.command.unwrap_or(Command::Status) {
        Command::Status => {
            let status = client.status()?;
            print!("{}", output::render_status(&status));
        }
        Command::Sessions => {
            let sessions = client.sessions()?;
            print!("{}", output::render_sessions(&sessions));
        }
        Command::Pin { cwd } => {
            let cwd = match cwd {
                Some(path) => path,
                None => std::env::current_dir().context("resolving current directory")?,
            };
            client.pin(&cwd.to_string_lossy())?;
            println!("pinned {}", cwd.display());
        }
        Command::Unpin => {
            client.unpin()?;
            println!("unpinned all projects");
        }
        Command::Health => {
            client.health()?;
            println!("notchd is running");
        }
    }

    Ok(())
}
