//! kvlog CLI
//!
//! Offline inspection of a transaction log file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kvlog::wal::{EventKind, LogReader};
use kvlog::{KvError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// kvlog CLI
#[derive(Parser, Debug)]
#[command(name = "kvlog-cli")]
#[command(about = "Inspect kvlog transaction logs")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a log and report whether it is well-formed
    Verify {
        /// The log file
        path: PathBuf,
    },

    /// Print every event in a log
    Dump {
        /// The log file
        path: PathBuf,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    let outcome = match args.command {
        Commands::Verify { path } => verify(&path),
        Commands::Dump { path, json } => dump(&path, json),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn verify(path: &Path) -> Result<()> {
    let mut reader = LogReader::open(path)?;
    let (mut puts, mut deletes) = (0u64, 0u64);

    for event in reader.by_ref() {
        match event?.kind {
            EventKind::Put => puts += 1,
            EventKind::Delete => deletes += 1,
        }
    }

    println!(
        "{}: ok, {} events ({} puts, {} deletes), last sequence {}",
        path.display(),
        puts + deletes,
        puts,
        deletes,
        reader.last_sequence()
    );
    Ok(())
}

fn dump(path: &Path, json: bool) -> Result<()> {
    for event in LogReader::open(path)? {
        let event = event?;
        if json {
            let line = serde_json::to_string(&event)
                .map_err(|e| KvError::Serialization(e.to_string()))?;
            println!("{}", line);
        } else {
            println!("{}", event);
        }
    }
    Ok(())
}
