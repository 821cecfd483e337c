//! Print pieces of a raw product volume, from a file or a running daemon.

use chrono::TimeZone;
use clap::{Parser, Subcommand};
use sigmet::ipc::Client;
use sigmet::{
    DataType, SweepHeaderRecord, TimeZoneSpec, Volume, VolumeHeader, WideRayHeader,
};
use std::io::Write;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Read Sigmet/IRIS raw product volumes.
#[derive(Debug, Parser)]
#[command(name = "sigraw", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the volume's headers.
    VolumeHeaders {
        /// A raw product file or a daemon socket.
        target: PathBuf,
    },
    /// Print one header line per sweep.
    SweepHeaders {
        /// A raw product file or a daemon socket.
        target: PathBuf,
    },
    /// Print ray headers for one sweep, or "all".
    RayHeaders {
        /// Sweep index, or "all".
        sweep: String,
        /// A raw product file or a daemon socket.
        target: PathBuf,
        /// Data type abbreviation, e.g. DB_DBZ.
        #[arg(long = "type")]
        data_type: Option<String>,
    },
    /// Print one sweep of physical values for one data type.
    Data {
        /// Data type abbreviation, e.g. DB_DBZ.
        data_type: String,
        /// Sweep index.
        sweep: usize,
        /// A raw product file or a daemon socket.
        target: PathBuf,
        /// Write raw little-endian f32 values instead of text.
        #[arg(short = 'b')]
        binary: bool,
        /// Apply the per-type correction pass.
        #[arg(long)]
        corrected: bool,
    },
    /// Ask a daemon to exit.
    Exit {
        /// The daemon socket.
        socket: PathBuf,
    },
}

fn app_name() -> String {
    std::env::var("APP_NAME").unwrap_or_else(|_| "sigraw".to_string())
}

fn is_socket(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|metadata| metadata.file_type().is_socket())
        .unwrap_or(false)
}

fn parse_sweep(text: &str) -> sigmet::Result<Option<usize>> {
    if text.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    text.parse().map(Some).map_err(|_| {
        sigmet::Error::BadArgument(format!("{} is not a sweep index or \"all\"", text))
    })
}

/// Point the time formatting at the volume's reported zone.
fn adopt_time_zone(zone: TimeZoneSpec) {
    std::env::set_var("TZ", zone.to_string());
}

fn format_time(seconds: f64, zone: TimeZoneSpec) -> String {
    if !seconds.is_finite() {
        return "unknown".to_string();
    }
    let millis = (seconds * 1000.0).round() as i64;
    match zone.to_fixed_offset().timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        _ => "unknown".to_string(),
    }
}

fn run(command: Command) -> sigmet::Result<()> {
    match command {
        Command::VolumeHeaders { target } => volume_headers(&target),
        Command::SweepHeaders { target } => sweep_headers(&target),
        Command::RayHeaders {
            sweep,
            target,
            data_type,
        } => ray_headers(&sweep, &target, data_type.as_deref()),
        Command::Data {
            data_type,
            sweep,
            target,
            binary,
            corrected,
        } => data(&data_type, sweep, &target, binary, corrected),
        Command::Exit { socket } => {
            Client::new(&socket).exit()?;
            Ok(())
        }
    }
}

fn volume_headers(target: &Path) -> sigmet::Result<()> {
    let (header, zone) = if is_socket(target) {
        let (response, header) = Client::new(target).volume_headers()?;
        (header, TimeZoneSpec::from_wire(&response.time_zone)?)
    } else {
        let volume = Volume::from_path(target)?;
        (VolumeHeader::for_volume(&volume), volume.time_zone())
    };
    adopt_time_zone(zone);
    println!("site:        {}", header.product.site_name());
    println!("task:        {}", header.product.task_name());
    println!("generated:   {}", header.product.configuration.generation_time);
    println!("volume start:{}", header.ingest.configuration.volume_start_time);
    println!("time zone:   {}", zone);
    println!("sweeps:      {}", header.num_sweeps);
    println!("rays/sweep:  {}", header.num_rays_per_sweep);
    println!("bins/ray:    {}", header.num_bins_out);
    print!("types:      ");
    for bit in &header.type_bits {
        match DataType::from_bit(*bit) {
            Some(data_type) => print!(" {}", data_type.abbrev()),
            None => print!(" bit{}", bit),
        }
    }
    println!();
    Ok(())
}

fn sweep_headers(target: &Path) -> sigmet::Result<()> {
    let (records, zone) = if is_socket(target) {
        let (response, records) = Client::new(target).sweep_headers(None)?;
        (records, TimeZoneSpec::from_wire(&response.time_zone)?)
    } else {
        let volume = Volume::from_path(target)?;
        (volume.sweep_header_records(None)?, volume.time_zone())
    };
    adopt_time_zone(zone);
    print_sweep_headers(&records, zone);
    Ok(())
}

fn print_sweep_headers(records: &[SweepHeaderRecord], zone: TimeZoneSpec) {
    for (index, record) in records.iter().enumerate() {
        println!(
            "sweep {:2}  angle {:6.2}  rays {:4}  {}",
            index,
            record.fixed_angle.to_degrees(),
            record.num_rays,
            format_time(record.time, zone)
        );
    }
}

fn ray_headers(sweep: &str, target: &Path, data_type: Option<&str>) -> sigmet::Result<()> {
    if let Some(name) = data_type {
        if DataType::from_abbrev(name).is_none() {
            return Err(sigmet::Error::BadArgument(format!(
                "{} is not a Sigmet data type.",
                name
            )));
        }
    }
    let sweep = parse_sweep(sweep)?;
    let (headers, zone) = if is_socket(target) {
        let (response, headers) = Client::new(target).ray_headers(sweep)?;
        (headers, TimeZoneSpec::from_wire(&response.time_zone)?)
    } else {
        let volume = Volume::from_path(target)?;
        (volume.wide_ray_headers(sweep)?, volume.time_zone())
    };
    adopt_time_zone(zone);
    for (index, header) in headers.iter().enumerate() {
        if header.num_bins == 0 {
            println!("ray {:4}  absent", index);
            continue;
        }
        println!(
            "ray {:4}  az {:6.2} -> {:6.2}  tilt {:5.2} -> {:5.2}  bins {:4}  {}",
            index,
            header.azimuth_begin.to_degrees(),
            header.azimuth_end.to_degrees(),
            header.tilt_begin.to_degrees(),
            header.tilt_end.to_degrees(),
            header.num_bins,
            format_time(header.time, zone)
        );
    }
    Ok(())
}

fn data(
    data_type: &str,
    sweep: usize,
    target: &Path,
    binary: bool,
    corrected: bool,
) -> sigmet::Result<()> {
    let resolved = DataType::from_abbrev(data_type).ok_or_else(|| {
        sigmet::Error::BadArgument(format!("{} is not a Sigmet data type.", data_type))
    })?;
    let (values, headers, zone) = if is_socket(target) {
        let client = Client::new(target);
        let (_, headers) = client.ray_headers(Some(sweep))?;
        let (response, values) = if corrected {
            client.corrected(Some(data_type), sweep)?
        } else {
            client.data(Some(data_type), sweep)?
        };
        (values, headers, TimeZoneSpec::from_wire(&response.time_zone)?)
    } else {
        let volume = Volume::from_path(target)?;
        let values = volume.sweep_data(resolved, sweep, corrected)?;
        let headers = volume.wide_ray_headers(Some(sweep))?;
        (values, headers, volume.time_zone())
    };
    adopt_time_zone(zone);
    if binary {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        for value in &values {
            stdout.write_all(&value.to_le_bytes())?;
        }
        stdout.flush()?;
        return Ok(());
    }
    print_data(resolved, &values, &headers);
    Ok(())
}

fn print_data(data_type: DataType, values: &[f32], headers: &[WideRayHeader]) {
    let bins_out = if headers.is_empty() {
        0
    } else {
        values.len() / headers.len()
    };
    if bins_out == 0 {
        return;
    }
    for (index, (header, ray_values)) in headers.iter().zip(values.chunks(bins_out)).enumerate() {
        if header.num_bins == 0 {
            println!("ray {:4}: absent", index);
            continue;
        }
        print!("ray {:4}:", index);
        for value in &ray_values[..(header.num_bins as usize).min(ray_values.len())] {
            print!(" {}", data_type.format_value(*value));
        }
        println!();
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {}", app_name(), err);
            ExitCode::FAILURE
        }
    }
}
