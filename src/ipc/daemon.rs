//! The volume daemon.
//!
//! Decoding a volume costs far more than any one question a client asks of
//! it, so the daemon decodes once, keeps the immutable [Volume] in memory,
//! and answers requests over a Unix socket, one connection per request.
//! The status reply always goes out on the socket before the first bulk
//! byte, and a client tearing down its bulk channel early is logged, never
//! fatal.

use crate::data_type::DataType;
use crate::ipc::wire::{Request, Response, Status, Subcommand, REQUEST_SIZE};
use crate::ipc::{fd, fd::REQUEST_FDS};
use crate::volume::{Volume, VolumeHeader};
use crate::{Error, Result};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

enum Flow {
    Continue,
    Exit,
}

/// A daemon holding one decoded volume.
#[derive(Debug)]
pub struct Daemon {
    listener: UnixListener,
    path: PathBuf,
    volume: Volume,
}

impl Daemon {
    /// Binds the daemon's socket.
    ///
    /// The path must not already exist; the daemon removes it again when
    /// [serve](Daemon::serve) finishes.
    pub fn bind<P: AsRef<Path>>(path: P, volume: Volume) -> Result<Daemon> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        Ok(Daemon {
            listener,
            path,
            volume,
        })
    }

    /// The volume being served.
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// The socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serves requests until a client sends `Exit`.
    ///
    /// Per-request failures are answered on the wire and logged; only
    /// socket-level failures end the loop early.
    pub fn serve(self) -> Result<()> {
        fd::ignore_sigpipe();
        log::info!(
            "serving {} sweeps on {}",
            self.volume.num_sweeps(),
            self.path.display()
        );
        let result = loop {
            let stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(err) => break Err(Error::Io(err)),
            };
            match self.handle(&stream) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => {
                    log::info!("exit requested");
                    break Ok(());
                }
                Err(err) => log::warn!("request failed: {}", err),
            }
        };
        if let Err(err) = std::fs::remove_file(&self.path) {
            log::warn!("could not remove {}: {}", self.path.display(), err);
        }
        result
    }

    fn handle(&self, stream: &UnixStream) -> Result<Flow> {
        let mut buf = [0u8; REQUEST_SIZE];
        let (len, mut fds) = fd::recv_with_fds(stream, &mut buf).map_err(Error::Io)?;
        if fds.len() != REQUEST_FDS {
            // No usable error channel; the socket reply is all the client
            // gets.
            let mut socket = stream;
            let _ = Response::failure().write_to(&mut socket);
            return Err(Error::Protocol(format!(
                "request carried {} file descriptors, expected {}",
                fds.len(),
                REQUEST_FDS
            )));
        }
        let bulk = File::from(fds.pop().ok_or_else(|| Error::Protocol("no bulk fd".into()))?);
        let mut error_channel =
            File::from(fds.pop().ok_or_else(|| Error::Protocol("no error fd".into()))?);
        if len != REQUEST_SIZE {
            let err = Error::Protocol(format!(
                "request is {} bytes, expected {}",
                len, REQUEST_SIZE
            ));
            self.respond_failure(stream, &mut error_channel, &err);
            return Ok(Flow::Continue);
        }
        let request = match Request::decode(&buf) {
            Ok(request) => request,
            Err(err) => {
                self.respond_failure(stream, &mut error_channel, &err);
                return Ok(Flow::Continue);
            }
        };
        log::debug!(
            "{:?} type={:?} sweep={:?}",
            request.subcommand,
            request.data_type_abbrev(),
            request.sweep_index()
        );
        if request.subcommand == Subcommand::Exit {
            let mut response = self.response_skeleton();
            response.num_sweeps = self.volume.num_sweeps() as u32;
            let mut socket = stream;
            response.write_to(&mut socket)?;
            return Ok(Flow::Exit);
        }
        match self.prepare(&request) {
            Ok((response, artifact)) => {
                let mut socket = stream;
                response.write_to(&mut socket)?;
                self.write_bulk(bulk, &artifact, &mut error_channel);
                Ok(Flow::Continue)
            }
            Err(err) => {
                self.respond_failure(stream, &mut error_channel, &err);
                Ok(Flow::Continue)
            }
        }
    }

    /// Builds the response and the full bulk payload for a request.
    ///
    /// Everything that can fail does so here, before any byte of the
    /// reply is on the wire.
    fn prepare(&self, request: &Request) -> Result<(Response, Vec<u8>)> {
        let mut response = self.response_skeleton();
        response.num_rays_per_sweep = self.volume.num_rays_per_sweep() as u32;
        let mut artifact = Vec::new();
        match request.subcommand {
            Subcommand::Exit => unreachable!("handled by the caller"),
            Subcommand::VolumeHeaders => {
                response.num_sweeps = self.volume.num_sweeps() as u32;
                response.sweep_time = self.first_sweep_time();
                VolumeHeader::for_volume(&self.volume).write_to(&mut artifact)?;
            }
            Subcommand::SweepHeaders => {
                let sweep = request.sweep_index();
                let records = self.volume.sweep_header_records(sweep)?;
                response.num_sweeps = records.len() as u32;
                response.sweep_time = records
                    .first()
                    .map(|record| record.time)
                    .unwrap_or(f64::NAN);
                for record in &records {
                    record.write_to(&mut artifact)?;
                }
            }
            Subcommand::RayHeaders => {
                let sweep = request.sweep_index();
                let headers = self.volume.wide_ray_headers(sweep)?;
                response.num_sweeps = match sweep {
                    Some(_) => 1,
                    None => self.volume.num_sweeps() as u32,
                };
                response.sweep_time = self
                    .volume
                    .sweep_time_seconds(sweep.unwrap_or(0))
                    .unwrap_or(f64::NAN);
                for header in &headers {
                    header.write_to(&mut artifact)?;
                }
            }
            Subcommand::Data | Subcommand::Corrected => {
                let sweep = request.sweep_index().ok_or_else(|| {
                    Error::BadArgument(
                        "data requests need a sweep index, not \"all\"".to_string(),
                    )
                })?;
                let data_type = self.resolve_data_type(request)?;
                let corrected = request.subcommand == Subcommand::Corrected;
                let values = self.volume.sweep_data(data_type, sweep, corrected)?;
                response.num_sweeps = 1;
                response.num_bins_in_sweep = values.len() as u32;
                response.sweep_time = self.volume.sweep_time_seconds(sweep).unwrap_or(f64::NAN);
                artifact.reserve(values.len() * 4);
                for value in &values {
                    artifact.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        Ok((response, artifact))
    }

    fn resolve_data_type(&self, request: &Request) -> Result<DataType> {
        match request.data_type_abbrev() {
            None => self.volume.default_data_type().ok_or_else(|| {
                Error::BadArgument("the volume holds no real data types".to_string())
            }),
            Some(name) => DataType::from_abbrev(name).ok_or_else(|| {
                Error::BadArgument(format!("{} is not a Sigmet data type.", name))
            }),
        }
    }

    fn response_skeleton(&self) -> Response {
        Response {
            status: Status::Okay,
            time_zone: self.volume.time_zone().to_wire(),
            ..Default::default()
        }
    }

    fn first_sweep_time(&self) -> f64 {
        self.volume.sweep_time_seconds(0).unwrap_or(f64::NAN)
    }

    /// Streams a prepared artifact down the bulk channel.
    ///
    /// A broken pipe means the client went away early; that is its
    /// privilege, so it is logged and reported on the error channel but
    /// never escalated.
    fn write_bulk(&self, mut bulk: File, artifact: &[u8], error_channel: &mut File) {
        match bulk.write_all(artifact).and_then(|_| bulk.flush()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                log::warn!("client closed the bulk channel early");
                let _ = writeln!(error_channel, "bulk channel closed before the payload ended");
            }
            Err(err) => {
                log::warn!("bulk write failed: {}", err);
                let _ = writeln!(error_channel, "bulk write failed: {}", err);
            }
        }
    }

    /// Sends `status = Error` on the socket and the reason down the error
    /// channel.
    fn respond_failure(&self, stream: &UnixStream, error_channel: &mut File, err: &Error) {
        let mut response = Response::failure();
        response.time_zone = self.volume.time_zone().to_wire();
        let mut socket = stream;
        if let Err(write_err) = response.write_to(&mut socket) {
            log::warn!("could not send the failure response: {}", write_err);
        }
        if let Err(write_err) = writeln!(error_channel, "{}", err) {
            log::warn!("could not write to the error channel: {}", write_err);
        }
        log::debug!("request rejected: {}", err);
    }
}
