//! Loom command-line inspector.
//!
//! Reads and writes forest snapshots (`.json` or postcard), prints threads
//! and layouts, and applies edits through the branching policy.
//!
//! Usage:
//!   loom demo forest.json
//!   loom show forest.json
//!   loom thread forest.json "How do I" --chat
//!   loom edit forest.json 0193a2b4 --block 0 "New prompt text"
//!   loom layout forest.json --write
//!
//! Logging goes to stderr; set `RUST_LOG=loom_tree=debug` for detail.

mod commands;
mod config;
mod files;
mod resolve;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

/// Inspect and edit Loom conversation-tree snapshots.
#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Inspect and edit Loom conversation-tree snapshots")]
struct Cli {
    /// Config file (default: ~/.config/loom/loom.ron)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a sample forest with forks
    Demo { path: PathBuf },

    /// Print the forest as an outline
    Show { path: PathBuf },

    /// Print the thread ending at a node
    Thread {
        path: PathBuf,
        /// Node id, id prefix, or label prefix
        node: String,
        /// Emit completion messages as JSON
        #[arg(long)]
        chat: bool,
    },

    /// Print computed node positions
    Layout {
        path: PathBuf,
        /// Store the positions back into the snapshot
        #[arg(long)]
        write: bool,
    },

    /// Validate the forest and print a summary
    Check { path: PathBuf },

    /// Edit a block, forking when the edit would rewrite history
    Edit {
        path: PathBuf,
        /// Node id, id prefix, or label prefix
        node: String,
        /// Block order within the node
        #[arg(long, default_value_t = 0)]
        block: u32,
        content: String,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Demo { path } => {
            let tree = commands::demo(config)?;
            files::write_tree(&path, &tree)?;
            writeln!(out, "wrote {} node(s) to {}", tree.len(), path.display())?;
        }
        Command::Show { path } => {
            let tree = files::read_tree(&path, config)?;
            commands::show(&tree, &mut out)?;
        }
        Command::Thread { path, node, chat } => {
            let tree = files::read_tree(&path, config)?;
            commands::thread(&tree, &node, chat, &mut out)?;
        }
        Command::Layout { path, write } => {
            let mut tree = files::read_tree(&path, config)?;
            commands::layout(&tree, &mut out)?;
            if write {
                let moved = tree.auto_layout();
                files::write_tree(&path, &tree)?;
                tracing::info!(moved, path = %path.display(), "stored layout");
            }
        }
        Command::Check { path } => {
            let tree = files::read_tree(&path, config)?;
            commands::check(&tree, &mut out)?;
        }
        Command::Edit {
            path,
            node,
            block,
            content,
        } => {
            let mut tree = files::read_tree(&path, config)?;
            let outcome = commands::edit(&mut tree, &node, block, &content, &mut out)?;
            if outcome != loom_tree::EditOutcome::Unchanged {
                files::write_tree(&path, &tree)?;
            }
        }
    }
    Ok(())
}
