//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod decode;
mod status;
mod wait;

pub use decode::DecodeArgs;
pub use status::StatusArgs;
pub use wait::WaitArgs;

use anyhow::Result;
use clap::{Args, Subcommand};
use qwatch_core::encoding::ResponseEncoding;
use qwatch_runner::QueryCommands;
use qwatch_runner::query::DEFAULT_STATUS_COMMAND;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Wait for one or more jobs to finish
    Wait(WaitArgs),
    /// Poll a job once and print its status
    Status(StatusArgs),
    /// Decode a (possibly base64-wrapped) response
    Decode(DecodeArgs),
}

/// Options shared by commands that query the batch system
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Transport encoding of remote responses (auto, base64, plain)
    #[arg(long, env = "QWATCH_ENCODING", default_value = "auto")]
    pub encoding: ResponseEncoding,

    /// Status command template; `{job_id}` is replaced by the job handle
    #[arg(long, env = "QWATCH_STATUS_COMMAND", default_value = DEFAULT_STATUS_COMMAND)]
    pub status_command: String,

    /// Command printing the exit status of a job that left the queue
    #[arg(long, env = "QWATCH_EXIT_STATUS_COMMAND")]
    pub exit_status_command: Option<String>,
}

impl QueryArgs {
    pub fn commands(&self) -> QueryCommands {
        let commands = QueryCommands::new(self.status_command.clone());
        match &self.exit_status_command {
            Some(exit) => commands.with_exit_status(exit.clone()),
            None => commands,
        }
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Returns
/// The process exit code
pub async fn handle_command(command: Commands, config: &Config) -> Result<i32> {
    match command {
        Commands::Wait(args) => wait::handle_wait(args, config).await,
        Commands::Status(args) => status::handle_status(args, config).await,
        Commands::Decode(args) => decode::handle_decode(args),
    }
}
