//! Plugin-side stdio for the frame protocol.
//!
//! A plugin speaks frames on its stdin/stdout. Anything else the process
//! prints to stdout would land in the middle of the response stream, so
//! [`ProtocolStdio::take`] keeps a private handle on the real stdout and
//! points file descriptor 1 at stderr. After that, `println!` and friends
//! show up on the host's stderr instead of corrupting frames.

use std::io::{Stdin, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Protocol output handle: a duplicate of the original stdout.
#[cfg(unix)]
pub type ProtocolOutput = std::fs::File;

/// Protocol output handle. Without descriptor duplication this is plain stdout.
#[cfg(not(unix))]
pub type ProtocolOutput = std::io::Stdout;

static TAKEN: AtomicBool = AtomicBool::new(false);

/// The plugin's protocol input and output.
#[derive(Debug)]
pub struct ProtocolStdio {
    input: Stdin,
    output: ProtocolOutput,
}

impl ProtocolStdio {
    /// Claim stdin/stdout for the protocol and reroute ordinary stdout to stderr.
    ///
    /// May be called once per process.
    pub fn take() -> Result<Self> {
        if TAKEN.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Redirect(std::io::Error::other(
                "protocol stdio already taken",
            )));
        }
        let _ = std::io::stdout().flush();
        let output = reroute_stdout()?;
        debug!("stdout rerouted to stderr for plugin mode");
        Ok(Self {
            input: std::io::stdin(),
            output,
        })
    }

    /// Split into the input and output halves.
    pub fn into_parts(self) -> (Stdin, ProtocolOutput) {
        (self.input, self.output)
    }
}

#[cfg(unix)]
fn reroute_stdout() -> Result<ProtocolOutput> {
    use std::os::fd::FromRawFd;

    // SAFETY: dup on the process's own stdout descriptor; the result is checked.
    let protocol_fd = unsafe { libc::dup(libc::STDOUT_FILENO) };
    if protocol_fd < 0 {
        return Err(TransportError::Redirect(std::io::Error::last_os_error()));
    }

    // SAFETY: both descriptors are open for the lifetime of the process.
    let rc = unsafe { libc::dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        // SAFETY: protocol_fd was returned by dup above and is not shared.
        unsafe { libc::close(protocol_fd) };
        return Err(TransportError::Redirect(err));
    }

    // SAFETY: protocol_fd is a freshly duplicated descriptor owned solely by the File.
    Ok(unsafe { std::fs::File::from_raw_fd(protocol_fd) })
}

#[cfg(not(unix))]
fn reroute_stdout() -> Result<ProtocolOutput> {
    Ok(std::io::stdout())
}
