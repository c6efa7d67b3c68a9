use std::io::{Read, Write};
use std::process::ExitStatus;
use std::thread::JoinHandle;

use bytes::Bytes;
use plugwire_frame::FrameError;
use plugwire_transport::PluginProcess;
use tracing::{debug, warn};

use crate::config::PeerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{PeerError, Result};
use crate::handle::{ResponseHandle, Terminal};
use crate::queue::{pending_queue, Message, PendingSender, Request, CLOSED_REASON};

/// Host-side handle to a plugin.
///
/// `Plugin` is `Send + Sync`: share it by reference or `Arc` and call
/// [`send`](Self::send) from any number of threads. Call [`close`](Self::close)
/// to shut down deterministically; dropping the handle instead shuts down on
/// a background thread.
pub struct Plugin {
    queue: PendingSender,
    terminal: Terminal,
    config: PeerConfig,
    dispatcher: Option<JoinHandle<()>>,
    process: Option<PluginProcess>,
}

impl Plugin {
    /// Start a dispatch loop over an already-connected pair of streams:
    /// `writer` feeds the plugin's input, `reader` carries its output.
    pub fn from_streams<W, R>(writer: W, reader: R, config: PeerConfig) -> Result<Self>
    where
        W: Write + Send + 'static,
        R: Read + Send + 'static,
    {
        Self::start(writer, reader, config, None)
    }

    pub(crate) fn start<W, R>(
        writer: W,
        reader: R,
        config: PeerConfig,
        process: Option<PluginProcess>,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
        R: Read + Send + 'static,
    {
        let (queue, rx) = pending_queue(config.max_pending);
        let terminal = Terminal::default();
        let dispatcher = Dispatcher::new(reader, writer, rx, terminal.clone(), &config.frame);

        let name = match &process {
            Some(process) => format!("plugwire-dispatch-{}", process.id()),
            None => "plugwire-dispatch".to_string(),
        };
        let dispatcher = std::thread::Builder::new()
            .name(name)
            .spawn(move || dispatcher.run())?;

        Ok(Self {
            queue,
            terminal,
            config,
            dispatcher: Some(dispatcher),
            process,
        })
    }

    /// Queue `input` for the plugin and return a handle to its response.
    ///
    /// Never waits for the plugin; it only blocks while a bounded queue is
    /// full. Fails immediately if the payload exceeds the frame cap or the
    /// dispatch loop has already stopped.
    pub fn send(&self, input: impl Into<Bytes>) -> Result<ResponseHandle> {
        let input = input.into();
        let max = self.config.frame.max_payload_size;
        if input.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: input.len() as u64,
                max,
            }
            .into());
        }
        if let Some(reason) = self.terminal.reason() {
            return Err(PeerError::Disconnected(reason.to_string()));
        }

        let (request, handle) = Request::new(input, self.terminal.clone());
        match self.queue.send(Message::Request(request)) {
            Ok(()) => Ok(handle),
            Err(_) => Err(PeerError::Disconnected(
                self.terminal.reason().unwrap_or(CLOSED_REASON).to_string(),
            )),
        }
    }

    /// Send and wait for the response.
    pub fn call(&self, input: impl Into<Bytes>) -> Result<Bytes> {
        self.send(input)?.output()
    }

    /// False once the dispatch loop has stopped for any reason.
    pub fn is_alive(&self) -> bool {
        self.terminal.reason().is_none()
    }

    /// Why the dispatch loop stopped, if it has.
    pub fn failure(&self) -> Option<&str> {
        self.terminal.reason()
    }

    /// Process id of the plugin, when this handle spawned it.
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().map(PluginProcess::id)
    }

    /// Shut down: stop the dispatch loop after in-flight requests resolve,
    /// close the plugin's input and wait for it to exit.
    ///
    /// Returns the exit status when this handle spawned the plugin. A plugin
    /// whose stream failed is killed rather than awaited.
    pub fn close(mut self) -> Result<Option<ExitStatus>> {
        let dispatcher = self.dispatcher.take();
        let process = self.process.take();
        shutdown(&self.queue, &self.terminal, dispatcher, process)
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        let Some(dispatcher) = self.dispatcher.take() else {
            return;
        };
        let process = self.process.take();
        let queue = self.queue.clone();
        let terminal = self.terminal.clone();

        debug!("plugin handle dropped without close; shutting down in background");
        let reaper = std::thread::Builder::new()
            .name("plugwire-reaper".to_string())
            .spawn(move || {
                if let Err(err) = shutdown(&queue, &terminal, Some(dispatcher), process) {
                    warn!(error = %err, "background plugin shutdown failed");
                }
            });
        if let Err(err) = reaper {
            warn!(error = %err, "could not spawn plugin reaper thread");
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("pid", &self.process_id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn shutdown(
    queue: &PendingSender,
    terminal: &Terminal,
    dispatcher: Option<JoinHandle<()>>,
    process: Option<PluginProcess>,
) -> Result<Option<ExitStatus>> {
    let _ = queue.send(Message::Shutdown);

    let panicked = match dispatcher {
        Some(dispatcher) => dispatcher.join().is_err(),
        None => false,
    };

    let status = match process {
        Some(mut process) => {
            // The dispatcher closed the plugin's stdin on exit. A plugin whose
            // stream failed may never read that EOF, so stop it instead.
            let stream_failed = terminal
                .reason()
                .is_some_and(|reason| reason != CLOSED_REASON);
            if panicked || stream_failed {
                let _ = process.kill();
            }
            Some(process.wait()?)
        }
        None => None,
    };

    if panicked {
        return Err(PeerError::DispatchPanicked);
    }
    Ok(status)
}
