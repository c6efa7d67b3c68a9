//! Minimal plugin: uppercases every request.
//!
//! The same binary is both host and plugin. Run with:
//!   cargo run --example upper-plugin -- hello world
//!
//! Without the plugin flag it spawns itself as a plugin and sends each
//! argument as a request; with the flag it serves requests on stdio.

use plugwire::peer::{open, PluginMode};
use plugwire::transport::PluginCommand;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(mode) = PluginMode::from_env() {
        let handled = mode.serve(|input| input.to_ascii_uppercase())?;
        eprintln!("plugin handled {handled} requests");
        return Ok(());
    }

    let plugin = open(&PluginCommand::new(std::env::current_exe()?))?;
    let handles = std::env::args()
        .skip(1)
        .map(|word| plugin.send(word))
        .collect::<Result<Vec<_>, _>>()?;

    for handle in handles {
        println!("{}", String::from_utf8_lossy(&handle.output()?));
    }

    let status = plugin.close()?;
    eprintln!("plugin exited: {status:?}");
    Ok(())
}
