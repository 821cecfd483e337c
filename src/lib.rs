//! Native library for reading [Sigmet/IRIS raw
//! product](https://www.sigmet.com) weather-radar volumes and serving them
//! to local clients.
//!
//! A raw product file is a record-structured, run-length-encoded archive of
//! one radar volume: a handful of sweeps, each a fan of rays, each ray a
//! run of range bins for every recorded data type.
//!
//! # Reading a volume
//!
//! Use [Volume::from_path] to decode a whole file in one pass:
//!
//! ```no_run
//! use sigmet::Volume;
//!
//! let volume = Volume::from_path("202407151200.RAWXYZ").unwrap();
//! println!(
//!     "{} sweeps of {} rays, {} bins each",
//!     volume.num_sweeps(),
//!     volume.num_rays_per_sweep(),
//!     volume.num_bins_out(),
//! );
//! for data_type in volume.present_types() {
//!     println!("{}: {}", data_type.abbrev(), data_type.description());
//! }
//! ```
//!
//! Decoding is strict about structure and lenient about content: an
//! unknown data-type bit is logged and skipped unless
//! [DecodeOptions::strict] is set (the `SIGMET_STRICT` environment
//! variable sets it too).
//!
//! # Serving a volume
//!
//! Decoding a large volume is far more expensive than any one question a
//! client asks of it, so a long-lived daemon can hold the decoded
//! [Volume] and serve many short-lived clients over a Unix socket. Each
//! request passes two file descriptors: an error channel for diagnostics
//! and a bulk channel for the payload.
//!
//! ```no_run
//! use sigmet::ipc::Daemon;
//! use sigmet::Volume;
//!
//! let volume = Volume::from_path("202407151200.RAWXYZ").unwrap();
//! let daemon = Daemon::bind("/tmp/sigmet.sock", volume).unwrap();
//! daemon.serve().unwrap(); // runs until an Exit request
//! ```
//!
//! ```no_run
//! use sigmet::ipc::Client;
//!
//! let client = Client::new("/tmp/sigmet.sock");
//! let (response, headers) = client.ray_headers(Some(0)).unwrap();
//! println!("sweep of {} rays", response.num_rays_per_sweep);
//! # let _ = headers;
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

pub mod angle;
pub mod bits;
pub mod data_type;
pub mod ipc;
pub mod mask;
pub mod raw;

mod decode;
mod error;
mod volume;
mod ymds;

pub use data_type::DataType;
pub use decode::DecodeOptions;
pub use error::Error;
pub use volume::{
    Ray, RayHeader, Sweep, SweepHeaderRecord, Volume, VolumeHeader, WideRayHeader,
    SWEEP_HEADER_RECORD_SIZE, WIDE_RAY_HEADER_SIZE,
};
pub use ymds::{TimeZoneSpec, Ymds, TIME_ZONE_LEN, YMDS_SIZE};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
