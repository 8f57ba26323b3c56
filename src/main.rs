//! Tool to inspect the Firmware Interface Table (FIT) of Intel firmware images
//!
//! The FIT is only found in full images, i.e., including the BIOS region at
//! the top of the flash, since the pointer to it sits right below the reset
//! vector. Dumps of only the BIOS region work as well, as long as they end
//! where the flash does.

use std::{fs, process};

use clap::{Parser, Subcommand};
use log::{debug, error, info};

mod show;

use intel_fit::{addr, fit::Fit};

#[derive(Subcommand, Debug)]
enum Command {
    /// Display the FIT entries (full image or BIOS region)
    #[clap(verbatim_doc_comment)]
    Show {
        /// File to read
        file_name: String,
    },
    /// Print the FIT header and entries as JSON, one object per line
    #[clap(verbatim_doc_comment)]
    Json {
        /// File to read
        file_name: String,
    },
}

/// Analyze the Firmware Interface Table of Intel firmware images
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command to run
    #[command(subcommand)]
    cmd: Command,
    #[clap(long, short, action)]
    debug: bool,
    #[clap(long, short, action)]
    verbose: bool,
}

fn load(file_name: &str) -> Result<(Vec<u8>, Fit), String> {
    info!("Reading {file_name}...");
    let data = fs::read(file_name).map_err(|e| format!("Cannot read {file_name}: {e}"))?;
    let size = data.len();
    debug!("Image size: 0x{size:08x}, mapped @ 0x{:08x}", addr::mask(size));
    let fit = Fit::parse(&data).map_err(|e| format!("Could not parse FIT: {e}"))?;
    debug!("FIT @ 0x{:08x}, {} entries", fit.offset, fit.entry_count());
    Ok((data, fit))
}

fn main() {
    let Cli {
        cmd,
        debug,
        verbose,
    } = Cli::parse();

    // Default to log level "info". Otherwise, you get no "regular" logs.
    let level = if debug { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(level);
    env_logger::Builder::from_env(env).init();

    let res = match cmd {
        Command::Show { file_name } => {
            println!("Intel FIT Tool 🔧");
            load(&file_name).map(|(data, fit)| show::show(&fit, data.len(), verbose))
        }
        Command::Json { file_name } => load(&file_name).and_then(|(data, fit)| {
            show::json(&fit, data.len()).map_err(|e| format!("Cannot encode JSON: {e}"))
        }),
    };
    if let Err(e) = res {
        error!("{e}");
        process::exit(1);
    }
}
