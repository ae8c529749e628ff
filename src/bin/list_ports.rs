use anyhow::Context;
use clap::Parser;

use posix_serial::device::{Ports, DEFAULT_BY_ID_DIR};
use posix_serial::logging;

#[derive(Parser, Debug)]
#[command(about = "List serial devices")]
struct Args {
    /// Directory of by-id symlinks to scan
    #[arg(long, default_value = DEFAULT_BY_ID_DIR)]
    dir: String,

    /// Use the system port enumeration instead of the by-id directory
    #[arg(long)]
    system: bool,

    /// Print devices as JSON lines
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn });

    let mut ports = Ports::with_dir(&args.dir);
    let count = if args.system {
        ports.scan_system_ports().context("enumerating system serial ports")?
    } else {
        ports.scan_ports().with_context(|| format!("scanning {}", args.dir))?
    };

    if !args.json {
        println!("Number of devices: {}", count);
    }
    for device in ports.devices() {
        if args.json {
            println!("{}", device.to_json()?);
        } else {
            println!();
            println!("Device ID:   {}", device.id());
            println!("Device name: {}", device.name());
            println!("Port path:   {}", device.port_path());
            println!("Bus path:    {}", device.bus_path());
        }
    }
    Ok(())
}
