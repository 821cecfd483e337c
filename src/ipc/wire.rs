//! The request/response wire format.
//!
//! A request is one message of fixed size: the subcommand code, a 16-byte
//! zero-padded data-type abbreviation, and a sweep index, with the error
//! and bulk file descriptors riding along as ancillary data. A response is
//! a fixed seven-slot vector, every slot present whether or not the
//! request succeeded, so a client can always parse the reply before it
//! touches the bulk channel.

use crate::ymds::TIME_ZONE_LEN;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The size of an encoded request in bytes.
pub const REQUEST_SIZE: usize = 24;

/// The size of an encoded response in bytes.
pub const RESPONSE_SIZE: usize = 39;

/// The size of the data-type abbreviation field.
pub const ABBREV_LEN: usize = 16;

/// The sweep index meaning "all sweeps".
pub const ALL_SWEEPS: u32 = u32::MAX;

/// What a client can ask of the daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subcommand {
    /// Stop serving and exit.
    Exit,
    /// The volume's header records and derived dimensions.
    VolumeHeaders,
    /// One sweep-header record per sweep.
    SweepHeaders,
    /// Wide ray headers, one per ray.
    RayHeaders,
    /// One sweep of physical values for one data type.
    Data,
    /// Like `Data`, with the per-type correction pass applied.
    Corrected,
}

impl Subcommand {
    fn code(self) -> u32 {
        match self {
            Subcommand::Exit => 0,
            Subcommand::VolumeHeaders => 1,
            Subcommand::SweepHeaders => 2,
            Subcommand::RayHeaders => 3,
            Subcommand::Data => 4,
            Subcommand::Corrected => 5,
        }
    }

    fn from_code(code: u32) -> Result<Subcommand> {
        match code {
            0 => Ok(Subcommand::Exit),
            1 => Ok(Subcommand::VolumeHeaders),
            2 => Ok(Subcommand::SweepHeaders),
            3 => Ok(Subcommand::RayHeaders),
            4 => Ok(Subcommand::Data),
            5 => Ok(Subcommand::Corrected),
            code => Err(Error::Protocol(format!("unknown subcommand code {}", code))),
        }
    }
}

/// One request as it travels on the socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    /// The subcommand.
    pub subcommand: Subcommand,
    /// Zero-padded data-type abbreviation; all zeros means "the volume's
    /// default type".
    pub abbrev: [u8; ABBREV_LEN],
    /// Sweep index, or [ALL_SWEEPS].
    pub sweep: u32,
}

impl Request {
    /// Builds a request.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigmet::ipc::wire::{Request, Subcommand, ALL_SWEEPS};
    /// let request = Request::new(Subcommand::Data, Some("DB_DBZ"), Some(0));
    /// assert_eq!(0, request.sweep);
    /// let request = Request::new(Subcommand::RayHeaders, None, None);
    /// assert_eq!(ALL_SWEEPS, request.sweep);
    /// ```
    pub fn new(subcommand: Subcommand, abbrev: Option<&str>, sweep: Option<usize>) -> Request {
        let mut field = [0u8; ABBREV_LEN];
        if let Some(abbrev) = abbrev {
            for (slot, byte) in field.iter_mut().zip(abbrev.bytes()) {
                *slot = byte;
            }
        }
        Request {
            subcommand,
            abbrev: field,
            sweep: sweep.map(|sweep| sweep as u32).unwrap_or(ALL_SWEEPS),
        }
    }

    /// The abbreviation as text, `None` when blank (default type).
    pub fn data_type_abbrev(&self) -> Option<&str> {
        let end = self
            .abbrev
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(ABBREV_LEN);
        if end == 0 {
            return None;
        }
        std::str::from_utf8(&self.abbrev[..end]).ok()
    }

    /// The sweep index, `None` when [ALL_SWEEPS].
    pub fn sweep_index(&self) -> Option<usize> {
        if self.sweep == ALL_SWEEPS {
            None
        } else {
            Some(self.sweep as usize)
        }
    }

    /// Encodes into the fixed wire form.
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut buf = [0u8; REQUEST_SIZE];
        buf[..4].copy_from_slice(&self.subcommand.code().to_le_bytes());
        buf[4..4 + ABBREV_LEN].copy_from_slice(&self.abbrev);
        buf[4 + ABBREV_LEN..].copy_from_slice(&self.sweep.to_le_bytes());
        buf
    }

    /// Decodes the fixed wire form.
    pub fn decode(buf: &[u8]) -> Result<Request> {
        if buf.len() != REQUEST_SIZE {
            return Err(Error::Protocol(format!(
                "request is {} bytes, expected {}",
                buf.len(),
                REQUEST_SIZE
            )));
        }
        let code = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let mut abbrev = [0u8; ABBREV_LEN];
        abbrev.copy_from_slice(&buf[4..4 + ABBREV_LEN]);
        let sweep = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]);
        Ok(Request {
            subcommand: Subcommand::from_code(code)?,
            abbrev,
            sweep,
        })
    }
}

/// Whether a request succeeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Status {
    /// The request succeeded; the bulk channel carries the artifact.
    #[default]
    Okay,
    /// The request failed; the error channel carries the reason.
    Error,
}

/// The fixed seven-slot response.
///
/// Unused slots are zero. The response always precedes any bulk-channel
/// byte, so a client can size its reads from it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Response {
    /// Whether the request succeeded.
    pub status: Status,
    /// Number of sweeps the bulk stream covers.
    pub num_sweeps: u32,
    /// Number of rays per sweep.
    pub num_rays_per_sweep: u32,
    /// Number of bins in one sweep of data; only set for `Data` and
    /// `Corrected`.
    pub num_bins_in_sweep: u32,
    /// Start time of the (first) sweep, seconds since the epoch.
    pub sweep_time: f64,
    /// The volume's reported time zone.
    pub time_zone: [u8; TIME_ZONE_LEN],
    /// Reserved.
    pub err_flag: u32,
}

impl Response {
    /// A failure response; every metadata slot zero.
    pub fn failure() -> Response {
        Response {
            status: Status::Error,
            ..Default::default()
        }
    }

    /// Writes the seven slots.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        let status = match self.status {
            Status::Okay => 0u32,
            Status::Error => 1,
        };
        write.write_u32::<LittleEndian>(status)?;
        write.write_u32::<LittleEndian>(self.num_sweeps)?;
        write.write_u32::<LittleEndian>(self.num_rays_per_sweep)?;
        write.write_u32::<LittleEndian>(self.num_bins_in_sweep)?;
        write.write_f64::<LittleEndian>(self.sweep_time)?;
        write.write_all(&self.time_zone)?;
        write.write_u32::<LittleEndian>(self.err_flag)?;
        Ok(())
    }

    /// Reads the seven slots.
    pub fn read_from<R: Read>(read: &mut R) -> Result<Response> {
        let status = match read.read_u32::<LittleEndian>()? {
            0 => Status::Okay,
            1 => Status::Error,
            code => {
                return Err(Error::Protocol(format!("unknown status code {}", code)));
            }
        };
        let num_sweeps = read.read_u32::<LittleEndian>()?;
        let num_rays_per_sweep = read.read_u32::<LittleEndian>()?;
        let num_bins_in_sweep = read.read_u32::<LittleEndian>()?;
        let sweep_time = read.read_f64::<LittleEndian>()?;
        let mut time_zone = [0u8; TIME_ZONE_LEN];
        read.read_exact(&mut time_zone)?;
        let err_flag = read.read_u32::<LittleEndian>()?;
        Ok(Response {
            status,
            num_sweeps,
            num_rays_per_sweep,
            num_bins_in_sweep,
            sweep_time,
            time_zone,
            err_flag,
        })
    }
}
