//! uringcp - copy one file into another through io_uring
//!
//! Usage: uringcp <SOURCE> <DESTINATION> [OPTIONS]

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uringcp::config::{DEFAULT_MAX_TRANSIENT_RETRIES, DEFAULT_QUEUE_DEPTH};
use uringcp::{copy_path, parse_size, CopyConfig, SetupFlags};

#[derive(Parser, Debug)]
#[command(name = "uringcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy a file with a pipeline of io_uring reads and writes")]
struct Cli {
    /// File to read
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// File to create or truncate
    #[arg(value_name = "DESTINATION")]
    destination: PathBuf,

    /// Reads and writes kept in flight at once
    #[arg(short = 'q', long, env = "URINGCP_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: u32,

    /// Bytes per operation (accepts K, M, G suffixes)
    #[arg(short = 'b', long, env = "URINGCP_BLOCK_SIZE", default_value = "16K", value_parser = parse_size)]
    block_size: u32,

    /// EAGAIN completions tolerated in a row for one operation
    #[arg(long, default_value_t = DEFAULT_MAX_TRANSIENT_RETRIES, value_name = "NUM")]
    max_retries: u32,

    /// Clamp the ring size to the kernel limit instead of failing
    #[arg(long)]
    clamp: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Do not print the summary line
    #[arg(long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> uringcp::Result<()> {
    let mut flags = SetupFlags::empty();
    if cli.clamp {
        flags |= SetupFlags::CLAMP;
    }
    let config = CopyConfig::default()
        .with_queue_depth(cli.queue_depth)
        .with_block_size(cli.block_size)
        .with_max_transient_retries(cli.max_retries)
        .with_setup_flags(flags);

    let report = copy_path(&cli.source, &cli.destination, &config)?;
    tracing::info!(
        bytes = report.bytes,
        blocks = report.blocks,
        submits = report.submit_calls,
        short = report.short_completions,
        retries = report.transient_retries,
        "copy complete"
    );

    if !cli.quiet {
        let secs = report.elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            report.bytes as f64 / secs / (1024.0 * 1024.0)
        } else {
            0.0
        };
        println!(
            "Copied {} bytes from {} to {} in {:.3}s ({:.1} MiB/s)",
            report.bytes,
            cli.source.display(),
            cli.destination.display(),
            secs,
            rate
        );
    }
    Ok(())
}
