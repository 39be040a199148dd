//! gbx - dump and restore Game Boy cartridges through the Arduino reader.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gbx_link::report::{write_stdout_json, write_stdout_line, ConsoleProgress, HeaderReport};
use gbx_link::transport::SerialTransport;
use gbx_link::{CancelToken, CartridgeClient, LinkConfig, LinkError};

/// Exit status after Ctrl-C, as a shell would report SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "gbx")]
#[command(about = "Game Boy cartridge reader/writer client")]
#[command(version)]
struct Args {
    /// Serial port of the reader (e.g. /dev/ttyACM0, COM9)
    #[arg(short, long)]
    port: String,

    /// JSON file with link settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the cartridge header
    Header {
        /// Print one JSON object instead of text
        #[arg(long)]
        json: bool,
    },
    /// Dump the ROM (default file: <title>.gb)
    ReadRom {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Dump the save RAM (default file: <title>.sav)
    ReadRam {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore the save RAM from a file (default file: <title>.sav)
    WriteRam {
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Read the RAM back and compare after writing
        #[arg(long)]
        verify: bool,
    },
    /// Print the cartridge RAM size in bytes
    RamSize,
}

#[derive(Debug, Clone, Copy)]
enum Region {
    Rom,
    Ram,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info,gbx_link=debug",
        _ => "debug,gbx_link=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => LinkConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LinkConfig::default(),
    };

    let cancel = CancelToken::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    let port = SerialTransport::open(&args.port, config.baud_rate)
        .with_context(|| format!("opening serial port {}", args.port))?;
    let mut client = CartridgeClient::new(port, config, cancel);

    match run(&mut client, args.action).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if is_cancelled(&e) => {
            eprintln!("Cancelled");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e) => Err(e),
    }
}

/// First Ctrl-C cancels the running operation, a second one exits.
async fn watch_interrupts(token: CancelToken) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if token.is_cancelled() {
            eprintln!("Interrupted again, exiting");
            std::process::exit(EXIT_CANCELLED.into());
        }
        tracing::warn!("Interrupted, cancelling (press Ctrl-C again to exit)");
        token.cancel();
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<LinkError>()
        .is_some_and(LinkError::is_cancelled)
}

async fn run(client: &mut CartridgeClient<SerialTransport>, action: Action) -> Result<()> {
    client.wait_for_device().await?;
    let meta = client
        .read_header()
        .await
        .context("reading cartridge header")?;

    match action {
        Action::Header { json } => {
            let report = HeaderReport::new(&meta);
            if json {
                write_stdout_json(&report)?;
            } else {
                write_stdout_line(&report.to_text())?;
            }
        }
        Action::ReadRom { output } => {
            let path = target(output, meta.rom_file_name())?;
            dump(client, Region::Rom, &path).await?;
        }
        Action::ReadRam { output } => {
            let path = target(output, meta.save_file_name())?;
            dump(client, Region::Ram, &path).await?;
        }
        Action::WriteRam { input, verify } => {
            let path = target(input, meta.save_file_name())?;
            restore(client, &path, verify).await?;
        }
        Action::RamSize => {
            let size = client.ram_size().await.context("querying RAM size")?;
            write_stdout_line(&size.to_string())?;
        }
    }
    Ok(())
}

/// Explicit path, else the name derived from a valid header.
fn target(explicit: Option<PathBuf>, derived: Option<String>) -> Result<PathBuf> {
    explicit
        .or_else(|| derived.map(PathBuf::from))
        .ok_or_else(|| LinkError::NoCartridge.into())
}

async fn dump(
    client: &mut CartridgeClient<SerialTransport>,
    region: Region,
    path: &Path,
) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let mut progress = ConsoleProgress::new();

    let result = match region {
        Region::Rom => client.read_rom(&mut file, &mut progress).await,
        Region::Ram => client.read_ram(&mut file, &mut progress).await,
    };

    match result {
        Ok(written) => {
            write_stdout_line(&format!("Wrote {} bytes to {}", written, path.display()))?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} is incomplete", path.display());
            Err(e.into())
        }
    }
}

async fn restore(
    client: &mut CartridgeClient<SerialTransport>,
    path: &Path,
    verify: bool,
) -> Result<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let len = file
        .metadata()
        .await
        .with_context(|| format!("reading size of {}", path.display()))?
        .len();
    let mut progress = ConsoleProgress::new();

    let report = client
        .write_ram(&mut file, len, verify, &mut progress)
        .await?;

    write_stdout_line(&format!("Sent {} bytes from {}", report.sent, path.display()))?;
    if let Some(outcome) = &report.verification {
        write_stdout_line(&outcome.to_string())?;
    }
    Ok(())
}
