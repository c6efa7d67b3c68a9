//! Batched, order-correlated request/response IPC with plugin subprocesses.
//!
//! A host spawns a plugin executable and talks to it over the plugin's
//! stdin/stdout. Requests from any number of threads are queued, written in
//! batches of varint length-prefixed frames, and answered in the same order.
//!
//! # Crate Structure
//!
//! - [`transport`] - Plugin process spawning and stdio plumbing
//! - [`frame`] - Varint length-prefixed framing
//! - [`peer`] - Host-side dispatch and plugin-side serving (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use plugwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use plugwire_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use plugwire_peer::*;
}
