use conduitwire::frame::{HEADER_SIZE, MAGIC};
use conduitwire::DEFAULT_PORT;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("conduitwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: conduitwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("CONDUITWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("CONDUITWIRE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("protocol: magic=0x{MAGIC:08x} header={HEADER_SIZE}B payload=lz4-block checksum=crc32");
    println!("default_port: {DEFAULT_PORT}");
    println!("features: tls={}, cli=true", cfg!(feature = "tls"));

    Ok(SUCCESS)
}
