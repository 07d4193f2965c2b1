use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("p2pmux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: p2pmux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, cli=true",
        cfg!(feature = "session")
    );
    println!(
        "protocols: {}",
        [
            p2pmux_session::literals::MULTISTREAM,
            p2pmux_session::literals::PLAINTEXT,
            p2pmux_session::literals::MPLEX,
            p2pmux_session::literals::PING,
        ]
        .map(|literal| p2pmux_session::literals::display(literal).trim_end().to_string())
        .join(", ")
    );

    Ok(SUCCESS)
}
