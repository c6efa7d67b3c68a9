use std::thread;
use std::time::Instant;

use bytes::Bytes;
use plugwire_peer::{open_with_config, Plugin};
use tracing::{info, warn};

use crate::cmd::serve::Transform;
use crate::cmd::BenchArgs;
use crate::exit::{peer_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_bench, BenchReport, OutputFormat};

pub fn run(args: BenchArgs, format: OutputFormat) -> CliResult<i32> {
    let callers = args.callers as usize;
    let requests = args.requests as usize;
    let (size, expect) = (args.size, args.expect);
    let plugin = open_with_config(&args.plugin.command(), args.plugin.peer_config())
        .map_err(|err| peer_error("failed to start plugin", err))?;
    info!(callers, requests, size, "bench started");

    let started = Instant::now();
    let outcome = thread::scope(|scope| {
        let workers: Vec<_> = (0..callers)
            .map(|caller| {
                let plugin = &plugin;
                scope.spawn(move || run_caller(plugin, caller, requests, size, expect))
            })
            .collect();

        let mut mismatches = 0;
        for worker in workers {
            mismatches += worker
                .join()
                .map_err(|_| CliError::new(INTERNAL, "bench caller panicked"))??;
        }
        Ok::<_, CliError>(mismatches)
    });
    let elapsed = started.elapsed();
    let closed = plugin.close();

    let mismatches = outcome?;
    closed.map_err(|err| peer_error("failed to stop plugin", err))?;

    let total = callers * requests;
    let report = BenchReport {
        plugin: args.plugin.program.display().to_string(),
        callers,
        requests_per_caller: requests,
        payload_size: args.size,
        total_requests: total,
        mismatches,
        elapsed_ms: elapsed.as_millis(),
        requests_per_sec: total as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    };
    print_bench(&report, format);

    if mismatches > 0 {
        warn!(mismatches, "responses did not match their requests");
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}

/// Send all of one caller's requests, then check every response.
fn run_caller(
    plugin: &Plugin,
    caller: usize,
    requests: usize,
    size: usize,
    expect: Transform,
) -> CliResult<usize> {
    let mut pending = Vec::with_capacity(requests);
    for seq in 0..requests {
        let input = payload(caller, seq, size);
        let expected = expect.apply(input.clone());
        let handle = plugin
            .send(input)
            .map_err(|err| peer_error("send failed", err))?;
        pending.push((expected, handle));
    }

    let mut mismatches = 0;
    for (expected, handle) in pending {
        let output = handle
            .output()
            .map_err(|err| peer_error("no response", err))?;
        if output != expected {
            mismatches += 1;
        }
    }
    Ok(mismatches)
}

/// Distinct payload per caller and sequence number. Never shorter than its tag.
fn payload(caller: usize, seq: usize, size: usize) -> Bytes {
    let mut data = format!("caller-{caller}-request-{seq}-").into_bytes();
    let fill = b'a' + (seq % 26) as u8;
    data.resize(size.max(data.len()), fill);
    Bytes::from(data)
}
