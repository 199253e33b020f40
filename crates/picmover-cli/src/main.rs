// SPDX-License-Identifier: AGPL-3.0
// PicMover CLI - terminal frontend

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "picmover", version, about = "Back up photos to a PicMover server")]
struct Cli {
    /// Use this settings file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look for PicMover servers
    Scan {
        /// Host to probe; repeat for several. Defaults to the local /24.
        #[arg(long = "host")]
        hosts: Vec<String>,
    },
    /// Back up a directory of photos to a server
    Backup {
        #[arg(long)]
        host: String,
        /// Directory containing the photo library
        #[arg(long)]
        dir: PathBuf,
        /// Only retry photos that failed in earlier runs
        #[arg(long)]
        failed_only: bool,
        /// Override the server port from the settings file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect or reset the list of photos that failed to upload
    Failed {
        #[command(subcommand)]
        action: FailedAction,
    },
}

#[derive(Subcommand)]
enum FailedAction {
    List,
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("picmover_cli=info".parse().unwrap())
                .add_directive("picmover_core=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting PicMover CLI v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Scan { hosts } => commands::scan(cli.config, hosts).await,
        Command::Backup {
            host,
            dir,
            failed_only,
            port,
        } => commands::backup(cli.config, host, dir, failed_only, port).await,
        Command::Failed { action } => match action {
            FailedAction::List => commands::list_failed(),
            FailedAction::Clear => commands::clear_failed(),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
