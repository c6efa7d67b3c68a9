use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use plugwire_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use plugwire_peer::{PeerConfig, PluginMode, DEFAULT_MAX_PENDING};
use plugwire_transport::{PluginCommand, StderrMode};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod bench;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn a plugin, send requests and print the responses.
    Send(SendArgs),
    /// Run a built-in transform as a plugin (launched by a host, not by hand).
    Serve(ServeArgs),
    /// Drive a plugin from concurrent callers and report throughput.
    Bench(BenchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, mode: Option<PluginMode>, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Serve(args) => serve::run(args, mode),
        Command::Bench(args) => bench::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PluginStderr {
    /// Share this process's stderr.
    Inherit,
    /// Re-emit each stderr line as a log event.
    Log,
    /// Discard.
    Null,
}

impl From<PluginStderr> for StderrMode {
    fn from(value: PluginStderr) -> Self {
        match value {
            PluginStderr::Inherit => StderrMode::Inherit,
            PluginStderr::Log => StderrMode::Log,
            PluginStderr::Null => StderrMode::Null,
        }
    }
}

/// How to launch the plugin and size the host side.
#[derive(Args, Debug)]
pub struct PluginArgs {
    /// Plugin executable.
    pub program: PathBuf,
    /// Arguments passed to the plugin (after `--`).
    #[arg(last = true)]
    pub plugin_args: Vec<OsString>,
    /// Where the plugin's stderr goes.
    #[arg(long, value_name = "MODE", default_value = "inherit")]
    pub plugin_stderr: PluginStderr,
    /// Largest request or response payload, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
    /// Requests that may wait for dispatch before senders block.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PENDING)]
    pub max_pending: usize,
    /// Never block senders; queue without limit.
    #[arg(long)]
    pub unbounded: bool,
}

impl PluginArgs {
    pub fn command(&self) -> PluginCommand {
        PluginCommand::new(&self.program)
            .args(&self.plugin_args)
            .stderr(self.plugin_stderr.into())
    }

    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            frame: FrameConfig {
                max_payload_size: self.max_payload,
                ..FrameConfig::default()
            },
            max_pending: (!self.unbounded).then_some(self.max_pending),
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub plugin: PluginArgs,
    /// Raw string payload; repeat the flag to send several requests.
    #[arg(long, conflicts_with = "file")]
    pub data: Vec<String>,
    /// Read one payload from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Send every payload this many times.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Transform applied to every request.
    pub transform: serve::Transform,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    #[command(flatten)]
    pub plugin: PluginArgs,
    /// Concurrent calling threads.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub callers: u32,
    /// Requests sent by each caller.
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(1..))]
    pub requests: u32,
    /// Payload size in bytes. Batches are cut at 64 KiB, so large payloads
    /// travel a few per batch.
    #[arg(long, default_value_t = 100)]
    pub size: usize,
    /// Transform the plugin is expected to apply.
    #[arg(long, value_name = "TRANSFORM", default_value = "echo")]
    pub expect: serve::Transform,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
