use p2pmux_frame::CancelToken;
use p2pmux_session::connect_and_probe;

use crate::cmd::{install_ctrlc_handler, ProbeArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{self, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let config = args.peer.connect_config(cancel)?;
    tracing::info!(address = %config.transport.address(), "probing peer");
    let report = connect_and_probe(&config, args.peer.trace_sink(format))
        .map_err(|err| session_error("probe failed", err))?;

    output::print_probe(&report, format);
    Ok(SUCCESS)
}
