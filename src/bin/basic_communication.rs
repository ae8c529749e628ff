use std::io::BufRead;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use posix_serial::logging;
use posix_serial::serial::{BaudRate, PortSettings, Serial};

#[derive(Parser, Debug)]
#[command(
    about = "Send and receive lines over a serial port",
    after_help = "Virtual ports for testing:\n  socat -d -d pty,link=/tmp/ttyV0,raw,echo=0 pty,link=/tmp/ttyV1,raw,echo=0"
)]
struct Args {
    /// Serial device, e.g. /tmp/ttyV0
    port: String,

    /// JSON file with port settings; replaces the 115200 default
    #[arg(long)]
    settings: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn print_pending(serial: &mut Serial) -> anyhow::Result<()> {
    let available = serial.available_bytes()?;
    if available == 0 {
        println!("No response received.");
        return Ok(());
    }
    let mut buffer = Vec::new();
    let n = serial.read(&mut buffer)?;
    println!("Received ({} bytes): '{}'", n, String::from_utf8_lossy(&buffer));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(if args.verbose { log::LevelFilter::Trace } else { log::LevelFilter::Info });

    let mut serial = Serial::new();
    println!("Opening serial port: {}", args.port);
    serial.open(&args.port).with_context(|| format!("opening {}", args.port))?;

    match &args.settings {
        Some(path) => {
            let settings = PortSettings::from_json_file(path).with_context(|| format!("loading {}", path))?;
            serial.apply_settings(&settings)?;
        }
        None => serial.set_baud_rate(BaudRate::B115200)?,
    }
    println!("Current baud rate: {}", serial.get_baud_rate()?);

    let greeting = b"Hello from posix-serial!\n";
    serial.write(greeting)?;
    println!("Sent greeting, waiting for response...");
    thread::sleep(Duration::from_millis(500));
    print_pending(&mut serial)?;

    println!();
    println!("Interactive mode - type messages (Ctrl+D to exit):");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        serial.write_with_terminator(line.as_bytes(), serial.terminator())?;
        println!("Sent: '{}'", line);
        thread::sleep(Duration::from_millis(100));
        print_pending(&mut serial)?;
    }

    serial.close()?;
    Ok(())
}
