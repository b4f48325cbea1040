// DNA client binary
// Sends sequences to the ingestion server from a file, stdin or a
// random-sequence generator

use anyhow::Result;
use clap::Parser;
use inchrosil_core::DnaClient;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dna-client")]
#[command(version, about = "INCHROSIL DNA client", long_about = None)]
struct Args {
    /// Server host name or address
    host: String,

    /// Server TCP port
    #[arg(default_value = "9090")]
    port: String,

    /// Send sequences from a FASTA/FASTQ/raw file
    #[arg(long, value_name = "PATH", conflicts_with_all = ["interactive", "stress"])]
    file: Option<PathBuf>,

    /// Read raw sequences from standard input
    #[arg(long, conflicts_with = "stress")]
    interactive: bool,

    /// Send COUNT random sequences
    #[arg(long, value_name = "COUNT")]
    stress: Option<u64>,

    /// Sequence length in bases for stress mode
    #[arg(long, value_name = "BASES", default_value_t = 1000)]
    length: usize,
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
            std::process::exit(1);
        }
    };

    eprintln!("Connecting to {}:{}...", args.host, port);
    let mut client = DnaClient::new(args.host.clone(), port);
    client.connect()?;
    eprintln!("Connected");

    if let Some(path) = args.file {
        client.send_file(&path)?;
    } else if args.interactive {
        client.send_interactive()?;
    } else if let Some(count) = args.stress {
        client.send_stress(count, args.length)?;
    } else {
        client.send_test_sequence()?;
        eprintln!("Sequence sent successfully");
    }

    client.disconnect();
    Ok(())
}
