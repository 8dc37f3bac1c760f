//! mixfs binary
//!
//! Runs single contents operations against a router built from a TOML
//! configuration file. Results are printed to stdout as JSON.
//!
//! ## Usage
//!
//! ```bash
//! mixfs --config mixfs.toml mounts
//! mixfs get datahub/space1/notes
//! mixfs write datahub/scratch/a.txt "hello"
//! mixfs mv datahub/space1/a.txt datahub/space1/b.txt
//! mixfs checkpoint create notebooks/analysis.ipynb
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mixfs_kernel::{
    BackendRegistry, ContentsOps, GetOptions, MixedContents, Model, RouterConfig,
};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mixfs", version, about = "Mixed contents router")]
struct Cli {
    /// Router configuration file (defaults to the current directory as the
    /// only backend).
    #[arg(short, long, env = "MIXFS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the model at PATH.
    Get {
        path: String,
        /// Metadata only.
        #[arg(long)]
        no_content: bool,
    },
    /// Report whether anything exists at PATH.
    Exists { path: String },
    /// Create a directory.
    Mkdir { path: String },
    /// Write a text file.
    Write { path: String, text: String },
    /// Delete a file or empty directory.
    Rm { path: String },
    /// Move an entry within one owner.
    Mv { from: String, to: String },
    /// Manage checkpoints.
    #[command(subcommand)]
    Checkpoint(CheckpointCommand),
    /// List configured mounts.
    Mounts,
}

#[derive(Debug, Subcommand)]
enum CheckpointCommand {
    Create { path: String },
    List { path: String },
    Restore { id: String, path: String },
    Delete { id: String, path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RouterConfig> {
    match path {
        Some(path) => RouterConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(RouterConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let router = MixedContents::from_config(&config, &BackendRegistry::with_builtin())
        .context("building contents router")?;

    let output = execute(&router, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(router: &MixedContents, command: Command) -> Result<serde_json::Value> {
    let value = match command {
        Command::Get { path, no_content } => {
            let options = if no_content {
                GetOptions::metadata()
            } else {
                GetOptions::default()
            };
            serde_json::to_value(router.get(&path, options).await?)?
        }
        Command::Exists { path } => json!({ "path": path, "exists": router.exists(&path).await? }),
        Command::Mkdir { path } => {
            serde_json::to_value(router.save(Model::directory(path.as_str()), &path).await?)?
        }
        Command::Write { path, text } => {
            serde_json::to_value(router.save(Model::text_file(path.as_str(), text), &path).await?)?
        }
        Command::Rm { path } => {
            router.delete(&path).await?;
            json!({ "deleted": path })
        }
        Command::Mv { from, to } => {
            router.rename(&from, &to).await?;
            json!({ "from": from, "to": to })
        }
        Command::Checkpoint(cmd) => match cmd {
            CheckpointCommand::Create { path } => {
                serde_json::to_value(router.create_checkpoint(&path).await?)?
            }
            CheckpointCommand::List { path } => {
                serde_json::to_value(router.list_checkpoints(&path).await?)?
            }
            CheckpointCommand::Restore { id, path } => {
                router.restore_checkpoint(&id, &path).await?;
                json!({ "restored": id, "path": path })
            }
            CheckpointCommand::Delete { id, path } => {
                router.delete_checkpoint(&id, &path).await?;
                json!({ "deleted": id, "path": path })
            }
        },
        Command::Mounts => {
            let mounts: Vec<_> = router
                .list_mounts()
                .into_iter()
                .map(|m| json!({ "name": m.name, "path": m.path }))
                .collect();
            json!(mounts)
        }
    };
    Ok(value)
}
