use std::path::PathBuf;

/// Errors that can occur while launching or wiring up a plugin process.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to spawn the plugin executable.
    #[error("failed to spawn plugin {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The spawned child did not expose a requested pipe.
    #[error("plugin {0} pipe unavailable")]
    MissingPipe(&'static str),

    /// Failed to reroute the process's own stdout.
    #[error("failed to redirect stdout: {0}")]
    Redirect(std::io::Error),

    /// An I/O error occurred while managing the process.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
