use std::ffi::{OsStr, OsString};
use std::io::Write;

use bytes::Bytes;
use plugwire_frame::FrameConfig;
use plugwire_transport::{ProtocolStdio, PLUGIN_FLAG};
use tracing::info;

use crate::error::Result;
use crate::plugin::serve;

/// Proof that this process was launched as a plugin.
///
/// Obtained from [`detect`](Self::detect); serving requests on stdio is only
/// possible through this value, so a binary that was not started with the
/// plugin flag cannot accidentally take over its own stdout.
#[derive(Debug, Clone, Default)]
pub struct PluginMode {
    frame: FrameConfig,
}

impl PluginMode {
    /// Plugin mode if `args` contains the plugin flag.
    pub fn detect<I, S>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter()
            .any(|arg| arg.as_ref() == PLUGIN_FLAG)
            .then(Self::default)
    }

    /// Plugin mode if this process's own arguments contain the plugin flag.
    pub fn from_env() -> Option<Self> {
        Self::detect(std::env::args_os())
    }

    /// `args` without the plugin flag, for the plugin's own argument parser.
    pub fn strip_flag<I, S>(args: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter()
            .filter(|arg| arg.as_ref() != PLUGIN_FLAG)
            .map(|arg| arg.as_ref().to_os_string())
            .collect()
    }

    /// Use explicit frame limits for the handler loop.
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Frame limits the handler loop will use.
    pub fn frame_config(&self) -> &FrameConfig {
        &self.frame
    }

    /// Claim stdin/stdout for the protocol and run the handler loop until
    /// the host closes the stream.
    ///
    /// Ordinary stdout is rerouted to stderr first, so `println!` inside
    /// `transform` cannot corrupt the response stream.
    pub fn serve<F, O>(self, transform: F) -> Result<u64>
    where
        F: FnMut(Bytes) -> O,
        O: AsRef<[u8]>,
    {
        let (stdin, mut stdout) = ProtocolStdio::take()?.into_parts();
        info!(pid = std::process::id(), "serving plugin requests on stdio");
        let handled = serve(stdin.lock(), &mut stdout, &self.frame, transform)?;
        stdout.flush()?;
        Ok(handled)
    }
}
