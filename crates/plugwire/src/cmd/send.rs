use std::fs;

use bytes::Bytes;
use plugwire_peer::{open_with_config, Plugin};
use tracing::{debug, warn};

use crate::cmd::SendArgs;
use crate::exit::{io_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_exchanges, Exchange, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payloads = resolve_payloads(&args)?;
    let plugin = open_with_config(&args.plugin.command(), args.plugin.peer_config())
        .map_err(|err| peer_error("failed to start plugin", err))?;

    let exchanged = exchange(&plugin, &payloads, args.repeat);
    let closed = plugin.close();

    let exchanges = exchanged?;
    match closed.map_err(|err| peer_error("failed to stop plugin", err))? {
        Some(status) if !status.success() => warn!(%status, "plugin exited unsuccessfully"),
        _ => {}
    }

    print_exchanges(
        &exchanges,
        &args.plugin.program.display().to_string(),
        format,
    );
    Ok(SUCCESS)
}

/// Queue every request before waiting on any, so they can share a batch.
fn exchange(plugin: &Plugin, payloads: &[Bytes], repeat: u32) -> CliResult<Vec<Exchange>> {
    let mut pending = Vec::with_capacity(payloads.len() * repeat as usize);
    for _ in 0..repeat {
        for payload in payloads {
            let handle = plugin
                .send(payload.clone())
                .map_err(|err| peer_error("send failed", err))?;
            pending.push((payload.len(), handle));
        }
    }
    debug!(requests = pending.len(), "requests queued");

    pending
        .into_iter()
        .enumerate()
        .map(|(index, (request_size, handle))| {
            let response = handle
                .output()
                .map_err(|err| peer_error("no response", err))?;
            Ok(Exchange {
                index,
                request_size,
                response,
            })
        })
        .collect()
}

fn resolve_payloads(args: &SendArgs) -> CliResult<Vec<Bytes>> {
    if let Some(path) = &args.file {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(vec![Bytes::from(data)]);
    }
    if !args.data.is_empty() {
        return Ok(args
            .data
            .iter()
            .map(|data| Bytes::copy_from_slice(data.as_bytes()))
            .collect());
    }
    Ok(vec![Bytes::new()])
}
