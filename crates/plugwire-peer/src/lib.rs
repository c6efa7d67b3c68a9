//! Batched request dispatch to a plugin subprocess.
//!
//! Host side: [`open`] spawns a plugin (or [`Plugin::from_streams`] adopts an
//! already-connected pair of streams) and returns a [`Plugin`] handle that
//! any number of threads can [`send`](Plugin::send) through. A single
//! dispatch thread owns the stream, batches whatever is queued, writes the
//! batch, then reads back one response per request in the same order.
//! Responses are matched to requests by position alone.
//!
//! Plugin side: [`PluginMode::detect`] recognizes the plugin flag and
//! [`PluginMode::serve`] runs the handler loop on stdin/stdout.

pub mod config;
pub mod connector;
mod dispatch;
pub mod error;
pub mod handle;
pub mod host;
pub mod mode;
pub mod plugin;
mod queue;

pub use config::{PeerConfig, DEFAULT_MAX_PENDING};
pub use connector::{open, open_with_config};
pub use error::{PeerError, Result};
pub use handle::ResponseHandle;
pub use host::Plugin;
pub use mode::PluginMode;
pub use plugin::serve;
