//! Command-line driver for the stack-string extractor: loads an executable
//! image, emulates from one or more entry points, and prints every
//! recovered region.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use stackstring::{Bounds, Config};

#[derive(Parser)]
#[command(name = "stackstring", about = "Recover stack-constructed byte strings from a compiled executable")]
struct Args {
    /// Path to the PE/ELF/Mach-O image to analyse.
    image: PathBuf,

    /// Entry-point virtual address to emulate from. May be repeated.
    #[arg(long = "address", required = true, value_parser = parse_hex)]
    addresses: Vec<u64>,

    /// Halt if this virtual address is about to execute.
    #[arg(long, value_parser = parse_hex)]
    stop: Option<u64>,

    /// Override the image's declared preferred load base.
    #[arg(long, value_parser = parse_hex)]
    base: Option<u64>,

    /// Minimum recovered region size to report.
    #[arg(long, default_value_t = 5)]
    patch_min: u64,

    /// Minimum write size to record.
    #[arg(long, default_value_t = 1)]
    write_min: u64,

    /// Halt after this many instructions without a qualifying write.
    #[arg(long, default_value_t = 10)]
    wait: u32,

    /// Freeze the wait counter while inside a call.
    #[arg(long)]
    calls_wait: bool,

    /// Size of each of the three synthetic stack sub-regions.
    #[arg(long, default_value_t = 0x10000, value_parser = parse_hex)]
    stack_size: u64,

    /// Alignment granularity for segment and page-fault mappings.
    #[arg(long, default_value_t = 0x1000, value_parser = parse_hex)]
    block_size: u64,
}

fn parse_hex(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let image = fs::read(&args.image)?;

    let mut config = Config::new(args.addresses);
    config.stop = args.stop;
    config.base = args.base;
    config.patch_range = Bounds::at_least(args.patch_min);
    config.write_range = Bounds::at_least(args.write_min);
    config.wait = args.wait;
    config.calls_wait = args.calls_wait;
    config.stack_size = args.stack_size;
    config.block_size = args.block_size;

    let regions = stackstring::extract(&image, config)?;
    for region in &regions {
        println!("{}", String::from_utf8_lossy(region).escape_default());
    }
    log::info!("recovered {} region(s)", regions.len());

    Ok(())
}
