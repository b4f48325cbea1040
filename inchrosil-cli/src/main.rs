// INCHROSIL CLI - offline container tools
// Pack FASTA input into binary containers, inspect and extract them back

use anyhow::Result;
use clap::{Parser, Subcommand};
use inchrosil_core::{container_info, extract_to_fasta, pack_fasta_files};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inchrosil")]
#[command(version, about = "INCHROSIL DNA container tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack FASTA file(s) into a binary container
    Pack {
        /// Output container file path
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Input FASTA files, `.gz` accepted (can specify multiple)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Verbosity level (0=quiet, 1=normal)
        #[arg(short = 'v', long, default_value_t = 1)]
        verbosity: u32,
    },

    /// Display information about a container or single-record file
    Info {
        /// Input file path
        file: PathBuf,
    },

    /// Decode a container back to FASTA, verifying checksums
    Extract {
        /// Input file path
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Pack {
            output,
            inputs,
            verbosity,
        } => {
            let summary = pack_fasta_files(&inputs, &output)?;
            if verbosity > 0 {
                let savings = (1.0 - 1.0 / summary.ratio()) * 100.0;
                println!("Generated: {}", output.display());
                println!("  Sequences:   {}", summary.sequences);
                println!("  Total bases: {} bp", summary.total_bases);
                println!("  Binary size: {} bytes", summary.payload_bytes);
                println!(
                    "  Compression: {:.2}:1 ({:.1}% savings vs ASCII)",
                    summary.ratio(),
                    savings
                );
            }
        }

        Commands::Info { file } => {
            let stdout = io::stdout();
            container_info(&file, &mut stdout.lock())?;
        }

        Commands::Extract { file, output } => match output {
            Some(path) => {
                let mut writer = BufWriter::new(File::create(&path)?);
                extract_to_fasta(&file, &mut writer)?;
                writer.flush()?;
            }
            None => {
                let stdout = io::stdout();
                extract_to_fasta(&file, &mut stdout.lock())?;
            }
        },
    }

    Ok(())
}
