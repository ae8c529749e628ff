use anyhow::Context;
use clap::Parser;

use posix_serial::logging;
use posix_serial::serial::{BaudRate, Serial};

#[derive(Parser, Debug)]
#[command(about = "Set every standard baud rate on a port and read it back")]
struct Args {
    /// Serial device, e.g. /dev/ttyUSB0
    port: String,

    /// Extra non-standard rates to try
    #[arg(long = "custom", value_delimiter = ',')]
    custom: Vec<u32>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(log::LevelFilter::Warn);

    let mut serial = Serial::new();
    serial.open(&args.port).with_context(|| format!("opening {}", args.port))?;

    let rates = BaudRate::ALL.iter().map(|b| b.as_u32()).chain(args.custom.iter().copied());
    let mut failures = 0;
    for rate in rates {
        match serial.set_baud_rate(rate).and_then(|_| serial.get_baud_rate()) {
            Ok(actual) if actual == rate => println!("  Set: {:>7} -> Got: {:>7} ok", rate, actual),
            Ok(actual) => {
                failures += 1;
                println!("  Set: {:>7} -> Got: {:>7} MISMATCH", rate, actual);
            }
            Err(e) => {
                failures += 1;
                println!("  Failed to set {}: {}", rate, e);
            }
        }
    }

    serial.close()?;
    if failures > 0 {
        anyhow::bail!("{} baud rate(s) did not read back", failures);
    }
    Ok(())
}
