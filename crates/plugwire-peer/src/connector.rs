use plugwire_transport::{PluginCommand, PluginProcess};

use crate::config::PeerConfig;
use crate::error::Result;
use crate::host::Plugin;

/// Spawn a plugin and start dispatching to it.
pub fn open(command: &PluginCommand) -> Result<Plugin> {
    open_with_config(command, PeerConfig::default())
}

/// Spawn a plugin with explicit configuration.
pub fn open_with_config(command: &PluginCommand, config: PeerConfig) -> Result<Plugin> {
    let (process, stdin, stdout) = PluginProcess::spawn(command)?;
    Plugin::start(stdin, stdout, config, Some(process))
}
