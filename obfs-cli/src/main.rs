extern crate core;
extern crate libobfs;

use std::io::Write;
use std::path::Path;

use clap::{Parser, Subcommand};
use libobfs::{ObfsConfig, Outcome};
use miette::{IntoDiagnostic, Result};

#[derive(Parser, Debug)]
#[command(name = "Obfs CLI")]
#[command(about, author, version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Obfuscate marked strings from the input file into a new output file
    #[command(arg_required_else_help = true)]
    Encode {
        /// Input file
        input: String,
        /// Output file
        output: String,
        /// Encoding key (0-255)
        key: u8,
        /// Overwrite the output file without asking
        #[arg(short, long, default_value_t = false, value_name = "TRUE|FALSE")]
        force: bool,
    },
    /// Print the markers found in the input file without rewriting it
    #[command(arg_required_else_help = true)]
    Scan {
        /// Input file
        input: String,
    },
    /// Decode a file of obfuscated bytes to stdout
    #[command(arg_required_else_help = true)]
    Decode {
        /// Input file holding the obfuscated bytes
        input: String,
        /// Decoding key (0-255)
        key: u8,
    },
}

pub fn main() -> Result<()> {
    let stdout = console::Term::stdout();
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            key,
            force,
        } => command_encode(stdout, input, output, key, force)?,
        Commands::Scan { input } => command_scan(stdout, input)?,
        Commands::Decode { input, key } => command_decode(input, key)?,
    }

    Ok(())
}

fn command_encode(
    stdout: console::Term,
    input: String,
    output: String,
    key: u8,
    force: bool,
) -> Result<()> {
    if !force && Path::new(&output).exists() {
        let message = format!("File \"{}\" exists. Overwrite it?", output);

        if !dialoguer::Confirm::new()
            .with_prompt(message)
            .interact()
            .into_diagnostic()?
        {
            return Ok(());
        }
    }

    let config = ObfsConfig::default();
    stdout
        .write_line(&format!("Obfuscating strings using key: 0x{:02x}...", key))
        .into_diagnostic()?;

    match libobfs::obfuscate_file(&input, &output, key, &config)? {
        Outcome::NoTargets => {
            stdout
                .write_line("No marked strings found; output not written.")
                .into_diagnostic()?;
        }
        Outcome::Obfuscated(report) => {
            for record in report.table.records() {
                let encoded = record.span_length - config.marker.len() as u64;
                stdout
                    .write_line(&format!("Offset 0x{:08x} : {} bytes", record.offset, encoded))
                    .into_diagnostic()?;
            }
            stdout
                .write_line(&format!(
                    "{} strings obfuscated ({} bytes written)",
                    report.table.len(),
                    report.bytes_written
                ))
                .into_diagnostic()?;
        }
    }

    Ok(())
}

fn command_scan(stdout: console::Term, input: String) -> Result<()> {
    let config = ObfsConfig::default();
    let file = std::fs::File::open(&input).into_diagnostic()?;
    let mut reader = std::io::BufReader::new(file);
    let table = libobfs::scanner::build_table(&mut reader, &config)?;

    for record in table.records() {
        let target = record.span_length - config.marker.len() as u64;
        stdout
            .write_line(&format!(
                "0x{:08x}  span {} bytes, target {} bytes",
                record.offset, record.span_length, target
            ))
            .into_diagnostic()?;
    }
    stdout
        .write_line(&format!("{} targets identified", table.len()))
        .into_diagnostic()?;

    Ok(())
}

fn command_decode(input: String, key: u8) -> Result<()> {
    let mut data = std::fs::read(&input).into_diagnostic()?;
    libobfs::keystream::decode_in_place(key, &mut data);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data).into_diagnostic()?;
    stdout.flush().into_diagnostic()?;

    Ok(())
}
