//! The daemon's client side.
//!
//! A client opens one connection per request, hands the daemon a pipe for
//! the bulk payload and another for error text, and reads both to end of
//! file. The payload parsers mirror the daemon's writers, so what comes
//! back is exactly what the daemon holds.

use crate::ipc::fd;
use crate::ipc::wire::{Request, Response, Status, Subcommand, RESPONSE_SIZE};
use crate::volume::{SweepHeaderRecord, VolumeHeader, WideRayHeader};
use crate::{Error, Result, WIDE_RAY_HEADER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{Cursor, Read};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// A client of a volume daemon.
#[derive(Clone, Debug)]
pub struct Client {
    path: PathBuf,
}

impl Client {
    /// Creates a client for the daemon at the given socket path.
    ///
    /// No connection happens until a request method is called; every
    /// request opens its own connection.
    pub fn new<P: AsRef<Path>>(path: P) -> Client {
        Client {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Asks the daemon to exit.
    ///
    /// The bulk and error channels are unused here, so placeholders on
    /// `/dev/null` keep the message shape constant.
    pub fn exit(&self) -> Result<Response> {
        let stream = UnixStream::connect(&self.path)?;
        let placeholder_error = File::options().write(true).open("/dev/null")?;
        let placeholder_bulk = File::options().write(true).open("/dev/null")?;
        let request = Request::new(Subcommand::Exit, None, None);
        fd::send_with_fds(
            &stream,
            &request.encode(),
            &[placeholder_error.as_raw_fd(), placeholder_bulk.as_raw_fd()],
        )?;
        self.read_response(&stream)
    }

    /// Fetches the volume's header value.
    pub fn volume_headers(&self) -> Result<(Response, VolumeHeader)> {
        let (response, bulk) = self.request(Request::new(Subcommand::VolumeHeaders, None, None))?;
        let header = VolumeHeader::read_from(&mut Cursor::new(bulk))?;
        Ok((response, header))
    }

    /// Fetches sweep headers for one sweep, or all sweeps when `None`.
    pub fn sweep_headers(&self, sweep: Option<usize>) -> Result<(Response, Vec<SweepHeaderRecord>)> {
        let (response, bulk) =
            self.request(Request::new(Subcommand::SweepHeaders, None, sweep))?;
        let mut cursor = Cursor::new(&bulk);
        let mut records = Vec::new();
        while (cursor.position() as usize) < bulk.len() {
            records.push(SweepHeaderRecord::read_from(&mut cursor)?);
        }
        Ok((response, records))
    }

    /// Fetches wide ray headers for one sweep, or all sweeps when `None`.
    pub fn ray_headers(&self, sweep: Option<usize>) -> Result<(Response, Vec<WideRayHeader>)> {
        let (response, bulk) = self.request(Request::new(Subcommand::RayHeaders, None, sweep))?;
        if bulk.len() % WIDE_RAY_HEADER_SIZE != 0 {
            return Err(Error::Protocol(format!(
                "ray header stream of {} bytes is not a whole number of records",
                bulk.len()
            )));
        }
        let mut cursor = Cursor::new(&bulk);
        let mut headers = Vec::with_capacity(bulk.len() / WIDE_RAY_HEADER_SIZE);
        while (cursor.position() as usize) < bulk.len() {
            headers.push(WideRayHeader::read_from(&mut cursor)?);
        }
        Ok((response, headers))
    }

    /// Fetches one sweep of physical values.
    ///
    /// `abbrev` of `None` means the volume's default data type.
    pub fn data(&self, abbrev: Option<&str>, sweep: usize) -> Result<(Response, Vec<f32>)> {
        self.fetch_values(Subcommand::Data, abbrev, sweep)
    }

    /// Like [data](Client::data), with the correction pass applied.
    pub fn corrected(&self, abbrev: Option<&str>, sweep: usize) -> Result<(Response, Vec<f32>)> {
        self.fetch_values(Subcommand::Corrected, abbrev, sweep)
    }

    fn fetch_values(
        &self,
        subcommand: Subcommand,
        abbrev: Option<&str>,
        sweep: usize,
    ) -> Result<(Response, Vec<f32>)> {
        let (response, bulk) = self.request(Request::new(subcommand, abbrev, Some(sweep)))?;
        let mut cursor = Cursor::new(&bulk);
        let mut values = Vec::with_capacity(bulk.len() / 4);
        while (cursor.position() as usize) < bulk.len() {
            values.push(cursor.read_f32::<LittleEndian>()?);
        }
        Ok((response, values))
    }

    /// One full request round trip: connect, send, read the response,
    /// drain both channels.
    fn request(&self, request: Request) -> Result<(Response, Vec<u8>)> {
        let stream = UnixStream::connect(&self.path)?;
        let (error_read, error_write) = fd::pipe()?;
        let (bulk_read, bulk_write) = fd::pipe()?;
        fd::send_with_fds(
            &stream,
            &request.encode(),
            &[error_write.as_raw_fd(), bulk_write.as_raw_fd()],
        )?;
        // Only the daemon may hold write ends now, so end of file arrives
        // when it finishes.
        drop(error_write);
        drop(bulk_write);
        let response = self.read_response(&stream)?;
        let mut bulk = Vec::new();
        File::from(bulk_read).read_to_end(&mut bulk)?;
        let mut error_text = String::new();
        File::from(error_read).read_to_string(&mut error_text)?;
        if response.status == Status::Error {
            let message = error_text.trim_end();
            if message.is_empty() {
                return Err(Error::Daemon("the daemon reported an error".to_string()));
            }
            return Err(Error::Daemon(message.to_string()));
        }
        Ok((response, bulk))
    }

    fn read_response(&self, stream: &UnixStream) -> Result<Response> {
        let mut buf = [0u8; RESPONSE_SIZE];
        let mut socket = stream;
        socket.read_exact(&mut buf)?;
        Response::read_from(&mut Cursor::new(buf))
    }
}
