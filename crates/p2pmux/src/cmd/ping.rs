use p2pmux_frame::CancelToken;
use p2pmux_session::{connect_and_ping, PingConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cmd::{install_ctrlc_handler, PingArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{self, OutputFormat};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut config = args.peer.connect_config(cancel)?;
    config.session.first_stream_id = args.first_stream;
    let ping = PingConfig {
        count: args.count,
        payload_len: args.payload_len,
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::info!(
        address = %config.transport.address(),
        count = ping.count,
        "starting ping"
    );
    let (_, summary) = connect_and_ping(&config, &ping, &mut rng, args.peer.trace_sink(format))
        .map_err(|err| session_error("ping failed", err))?;

    for measurement in &summary.measurements {
        output::print_ping(measurement, format);
    }
    output::print_ping_summary(&summary, format);
    Ok(SUCCESS)
}
