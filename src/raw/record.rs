//! The 12-byte header at the front of every data record.

use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The on-disk size of a [RawProdBhdr] in bytes.
pub const RAW_PROD_BHDR_SIZE: usize = 12;

/// The header at the front of each data record.
///
/// Every record from the third onward starts with one of these; the
/// compressed ray stream continues right across them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawProdBhdr {
    /// Record number, counted from zero at the first data record.
    pub record_number: u16,
    /// One-based sweep number the record belongs to.
    pub sweep_number: u16,
    /// Byte offset of the first ray header in this record, or zero when no
    /// ray starts here.
    pub first_ray_offset: u16,
    /// Record flags.
    pub flags: u16,
    /// Reserved.
    pub reserved: [u8; 4],
}

impl RawProdBhdr {
    /// Reads a record header.
    pub fn read_from<R: Read>(read: &mut R) -> Result<RawProdBhdr> {
        let record_number = read.read_u16::<LittleEndian>()?;
        let sweep_number = read.read_u16::<LittleEndian>()?;
        let first_ray_offset = read.read_u16::<LittleEndian>()?;
        let flags = read.read_u16::<LittleEndian>()?;
        let mut reserved = [0; 4];
        read.read_exact(&mut reserved)?;
        Ok(RawProdBhdr {
            record_number,
            sweep_number,
            first_ray_offset,
            flags,
            reserved,
        })
    }

    /// Writes this record header.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.record_number)?;
        write.write_u16::<LittleEndian>(self.sweep_number)?;
        write.write_u16::<LittleEndian>(self.first_ray_offset)?;
        write.write_u16::<LittleEndian>(self.flags)?;
        write.write_all(&self.reserved)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip() {
        let bhdr = RawProdBhdr {
            record_number: 7,
            sweep_number: 2,
            first_ray_offset: 40,
            flags: 0,
            reserved: [0; 4],
        };
        let mut buf = Vec::new();
        bhdr.write_to(&mut buf).unwrap();
        assert_eq!(RAW_PROD_BHDR_SIZE, buf.len());
        assert_eq!(bhdr, RawProdBhdr::read_from(&mut Cursor::new(buf)).unwrap());
    }
}
