// DNA ingestion server binary
// Listens for client connections and persists every valid sequence as a
// 2-bit encoded .ich file

use anyhow::Result;
use clap::Parser;
use inchrosil_core::{DnaServer, DnaServerConfig};
use std::io::Write;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dna-server")]
#[command(version, about = "INCHROSIL DNA ingestion server", long_about = None)]
struct Args {
    /// TCP port to listen on
    #[arg(default_value = "9090")]
    port: String,

    /// Verbosity level (0=quiet, 1=normal)
    #[arg(short = 'v', long, default_value_t = 1)]
    verbosity: u32,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let port: u16 = match args.port.parse() {
        Ok(port) if port != 0 => port,
        _ => {
            eprintln!("Invalid port number: {}", args.port);
            eprintln!("Usage: dna-server [PORT]");
            std::process::exit(1);
        }
    };

    let config = DnaServerConfig {
        port,
        verbosity: args.verbosity,
        ..Default::default()
    };
    let num_workers = config.num_workers;
    let out_dir = config.out_dir.clone();

    let mut server = DnaServer::new(config);
    server.start()?;

    eprintln!("DNA server started on port {}", port);
    eprintln!("Worker threads: {}", num_workers);
    eprintln!("Output directory: {}", out_dir.display());
    #[cfg(target_arch = "aarch64")]
    eprintln!("Hardware acceleration: enabled (NEON + CRC32)");
    #[cfg(not(target_arch = "aarch64"))]
    eprintln!("Hardware acceleration: portable fallback");
    eprintln!("Waiting for clients...");

    // The process serves until an external signal kills it; processing
    // errors only ever show up in the status counters
    let stats = server.stats();
    loop {
        thread::sleep(Duration::from_secs(1));
        eprint!("\r{}  ", stats.status_line());
        let _ = std::io::stderr().flush();
    }
}
