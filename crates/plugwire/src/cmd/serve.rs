use bytes::Bytes;
use clap::ValueEnum;
use plugwire_peer::PluginMode;
use plugwire_transport::PLUGIN_FLAG;
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, USAGE};

/// Built-in request transforms.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transform {
    /// Return the request unchanged.
    Echo,
    /// ASCII-uppercase the request.
    Upper,
    /// Reverse the request bytes.
    Reverse,
}

impl Transform {
    pub fn apply(self, input: Bytes) -> Bytes {
        match self {
            Transform::Echo => input,
            Transform::Upper => Bytes::from(input.to_ascii_uppercase()),
            Transform::Reverse => input.iter().rev().copied().collect(),
        }
    }
}

pub fn run(args: ServeArgs, mode: Option<PluginMode>) -> CliResult<i32> {
    let Some(mode) = mode else {
        return Err(CliError::new(
            USAGE,
            format!("serve speaks the plugin protocol on stdio and must be launched by a host ({PLUGIN_FLAG} not given)"),
        ));
    };

    let transform = args.transform;
    let handled = mode
        .serve(|input| transform.apply(input))
        .map_err(|err| peer_error("serve failed", err))?;
    info!(handled, ?transform, "request stream closed; plugin exiting");

    Ok(SUCCESS)
}
