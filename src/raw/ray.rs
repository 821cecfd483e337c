//! The 12-byte header at the front of each decompressed ray chunk.

use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The on-disk size of a [RayHeader] in bytes.
pub const RAY_HEADER_SIZE: usize = 12;

/// The header at the front of each ray chunk in the decompressed stream.
///
/// Angles are 16-bit binary angles; storage bytes for `num_bins` bins
/// follow immediately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RayHeader {
    /// Azimuth at the start of the dwell.
    pub begin_azimuth: u16,
    /// Elevation at the start of the dwell.
    pub begin_elevation: u16,
    /// Azimuth at the end of the dwell.
    pub end_azimuth: u16,
    /// Elevation at the end of the dwell.
    pub end_elevation: u16,
    /// Number of bins actually recorded in this ray.
    pub num_bins: u16,
    /// Whole seconds since the start of the sweep.
    pub seconds: u16,
}

impl RayHeader {
    /// Reads a ray header.
    pub fn read_from<R: Read>(read: &mut R) -> Result<RayHeader> {
        Ok(RayHeader {
            begin_azimuth: read.read_u16::<LittleEndian>()?,
            begin_elevation: read.read_u16::<LittleEndian>()?,
            end_azimuth: read.read_u16::<LittleEndian>()?,
            end_elevation: read.read_u16::<LittleEndian>()?,
            num_bins: read.read_u16::<LittleEndian>()?,
            seconds: read.read_u16::<LittleEndian>()?,
        })
    }

    /// Writes this ray header.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.begin_azimuth)?;
        write.write_u16::<LittleEndian>(self.begin_elevation)?;
        write.write_u16::<LittleEndian>(self.end_azimuth)?;
        write.write_u16::<LittleEndian>(self.end_elevation)?;
        write.write_u16::<LittleEndian>(self.num_bins)?;
        write.write_u16::<LittleEndian>(self.seconds)?;
        Ok(())
    }

    /// True if every field is zero, which is how an absent chunk reads.
    pub fn is_zero(&self) -> bool {
        *self == RayHeader::default()
    }
}
