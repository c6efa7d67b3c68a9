//! Plugin subprocess launcher and stdio plumbing.
//!
//! This is the lowest layer of plugwire. It knows how to:
//! - Spawn a plugin executable with the plugin-mode flag and piped stdin/stdout
//! - Forward the plugin's stderr (inherited, logged through `tracing`, or discarded)
//! - Reroute a plugin's own stdout so incidental output cannot corrupt frames
//!
//! It never looks at the bytes on the wire. Everything above builds on the
//! [`ChildStdin`](std::process::ChildStdin) / [`ChildStdout`](std::process::ChildStdout)
//! pair returned by [`PluginProcess::spawn`].

pub mod error;
pub mod process;
pub mod stdio;

pub use error::{Result, TransportError};
pub use process::{PluginCommand, PluginProcess, StderrMode};
pub use stdio::ProtocolStdio;

/// Command-line flag that puts a plugin executable into plugin mode.
pub const PLUGIN_FLAG: &str = "--plugwire-plugin";
