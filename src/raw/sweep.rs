//! The header at the start of each sweep's ray stream.

use crate::{Error, Result, Ymds};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Identifier in the first word of a sweep header.
///
/// A zero word where this identifier is expected means the file holds no
/// more sweeps.
pub const SWEEP_HEADER_ID: u16 = 26;

/// The on-disk size of a [SweepHeader] in bytes.
pub const SWEEP_HEADER_SIZE: usize = 22;

/// The uncompressed header at the start of each sweep.
///
/// It follows the record header of the first record belonging to the sweep;
/// the compressed ray stream starts immediately after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepHeader {
    /// Structure identifier, [SWEEP_HEADER_ID].
    pub id: u16,
    /// The sweep's fixed angle as a 16-bit binary angle.
    pub fixed_angle: u16,
    /// Number of rays expected in the sweep.
    pub num_rays: u16,
    /// Azimuth of the first ray as a 16-bit binary angle.
    pub start_azimuth: u16,
    /// Elevation of the first ray as a 16-bit binary angle.
    pub start_elevation: u16,
    /// Time the sweep started.
    pub time: Ymds,
}

impl Default for SweepHeader {
    fn default() -> SweepHeader {
        SweepHeader {
            id: SWEEP_HEADER_ID,
            fixed_angle: 0,
            num_rays: 0,
            start_azimuth: 0,
            start_elevation: 0,
            time: Ymds::default(),
        }
    }
}

impl SweepHeader {
    /// Reads a sweep header whose leading identifier word has already been
    /// consumed and checked.
    pub fn read_after_id<R: Read>(read: &mut R) -> Result<SweepHeader> {
        Ok(SweepHeader {
            id: SWEEP_HEADER_ID,
            fixed_angle: read.read_u16::<LittleEndian>()?,
            num_rays: read.read_u16::<LittleEndian>()?,
            start_azimuth: read.read_u16::<LittleEndian>()?,
            start_elevation: read.read_u16::<LittleEndian>()?,
            time: Ymds::read_from(read)?,
        })
    }

    /// Reads a sweep header including the identifier word.
    pub fn read_from<R: Read>(read: &mut R) -> Result<SweepHeader> {
        let id = read.read_u16::<LittleEndian>()?;
        if id != SWEEP_HEADER_ID {
            return Err(Error::MalformedHeader(format!(
                "expected sweep header (id {}) but found word {:#06x}",
                SWEEP_HEADER_ID, id
            )));
        }
        SweepHeader::read_after_id(read)
    }

    /// Writes this sweep header.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.id)?;
        write.write_u16::<LittleEndian>(self.fixed_angle)?;
        write.write_u16::<LittleEndian>(self.num_rays)?;
        write.write_u16::<LittleEndian>(self.start_azimuth)?;
        write.write_u16::<LittleEndian>(self.start_elevation)?;
        self.time.write_to(write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip() {
        let header = SweepHeader {
            fixed_angle: 0x0123,
            num_rays: 360,
            start_azimuth: 0x8000,
            start_elevation: 0x0100,
            time: Ymds::new(2024, 7, 15, 3_600, 0),
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(SWEEP_HEADER_SIZE, buf.len());
        assert_eq!(header, SweepHeader::read_from(&mut Cursor::new(buf)).unwrap());
    }

    #[test]
    fn wrong_id_is_malformed() {
        let buf = [0xFFu8; SWEEP_HEADER_SIZE];
        assert!(matches!(
            SweepHeader::read_from(&mut Cursor::new(buf)),
            Err(Error::MalformedHeader(_))
        ));
    }
}
