use clap::{ArgGroup, Args, Subcommand};
use std::path::PathBuf;

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept HL7 messages and acknowledge them.
    Listen(ListenArgs),
    /// Send one HL7 message and print the acknowledgment.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Host or address to bind (0.0.0.0 for every interface).
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Milliseconds to wait for an acknowledgment before the default is sent.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    /// Charset assumed when a message does not declare MSH-18.
    #[arg(long, value_name = "LABEL")]
    pub charset: Option<String>,
    /// Status code sent when the timeout acknowledges (AA, AE, AR).
    #[arg(long, value_name = "CODE")]
    pub timeout_ack: Option<String>,
    /// Answer every message right away: a status code or a full acknowledgment.
    #[arg(long, value_name = "REPLY")]
    pub ack: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["data", "file"])))]
pub struct SendArgs {
    /// Receiving host.
    pub host: String,
    /// Receiving port.
    pub port: u16,
    /// Message text; newlines become segment separators.
    #[arg(long)]
    pub data: Option<String>,
    /// Read the message from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Maximum time for the whole exchange (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
