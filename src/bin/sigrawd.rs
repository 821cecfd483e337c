//! The volume daemon: decode one raw product file, serve it on a socket.

use clap::Parser;
use sigmet::ipc::Daemon;
use sigmet::{DecodeOptions, Volume};
use std::path::PathBuf;
use std::process::ExitCode;

/// Serve a decoded Sigmet/IRIS raw product volume on a Unix socket.
#[derive(Debug, Parser)]
#[command(name = "sigrawd", version, about)]
struct Args {
    /// Path of the socket to create.
    socket: PathBuf,

    /// The raw product file to decode.
    file: PathBuf,

    /// Treat soft anomalies in the file as fatal.
    #[arg(long)]
    strict: bool,
}

fn app_name() -> String {
    std::env::var("APP_NAME").unwrap_or_else(|_| "sigrawd".to_string())
}

fn run(args: Args) -> sigmet::Result<()> {
    let mut options = DecodeOptions::from_env();
    if args.strict {
        options.strict = true;
    }
    let volume = Volume::from_path_with_options(&args.file, options)?;
    log::info!(
        "decoded {}: {} sweeps, {} rays, {} bins",
        args.file.display(),
        volume.num_sweeps(),
        volume.num_rays_per_sweep(),
        volume.num_bins_out()
    );
    let daemon = Daemon::bind(&args.socket, volume)?;
    daemon.serve()
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {}", app_name(), err);
            ExitCode::FAILURE
        }
    }
}
