use bytes::BytesMut;
use p2pmux_frame::{encode_mplex, encode_negotiation, FrameConfig, MplexFrame, Nesting};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{self, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = encode(&args).map_err(|err| frame_error("encode failed", err))?;
    output::print_encoded(&bytes, format);
    Ok(SUCCESS)
}

fn encode(args: &EncodeArgs) -> p2pmux_frame::Result<BytesMut> {
    let config = if args.varint {
        FrameConfig::varint()
    } else {
        FrameConfig::default()
    };
    let mut payload = args.payload.clone().into_bytes();
    if args.newline {
        payload.push(b'\n');
    }

    let mut dst = BytesMut::new();
    match args.stream {
        Some(stream_id) => {
            let nesting = if args.double_length {
                Nesting::DoubleLength
            } else {
                Nesting::Flat
            };
            let frame = MplexFrame::new(stream_id, args.message_type.into(), payload);
            encode_mplex(&frame, nesting, &config, &mut dst)?;
        }
        None => encode_negotiation(&payload, &config, &mut dst)?,
    }
    Ok(dst)
}
