//! Raw structures for IRIS raw-product entities.
//!
//! These structures map directly onto the little-endian byte layout of a
//! raw product file. Each one reads and writes its exact on-disk size;
//! record padding and alignment are the decoder's business, not theirs.

mod ingest;
mod product;
mod ray;
mod record;
mod sweep;

pub use self::ingest::{
    IngestConfiguration, IngestHeader, ScanMode, TaskCalibInfo, TaskConfiguration, TaskDspInfo,
    TaskEndInfo, TaskMiscInfo, TaskRangeInfo, TaskScanInfo, TaskScheduleInfo,
};
pub use self::product::{ColorScale, ProductConfiguration, ProductEnd, ProductHeader};
pub use self::ray::{RayHeader, RAY_HEADER_SIZE};
pub use self::record::{RawProdBhdr, RAW_PROD_BHDR_SIZE};
pub use self::sweep::{SweepHeader, SWEEP_HEADER_ID, SWEEP_HEADER_SIZE};

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The size of a physical record in a raw product file.
pub const RECORD_SIZE: usize = 6144;

/// Structure identifier of the product header.
pub const PRODUCT_HEADER_ID: i16 = 27;

/// Structure identifier of the ingest header.
pub const INGEST_HEADER_ID: i16 = 23;

/// Structure identifier of the task configuration.
pub const TASK_CONFIGURATION_ID: i16 = 22;

/// The maximum number of sweeps a volume may declare.
pub const MAX_SWEEPS: usize = 40;

/// The 12-byte header that prefixes every IRIS structure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StructureHeader {
    /// Structure identifier.
    pub id: i16,
    /// Format version of the structure.
    pub format_version: i16,
    /// Number of bytes in the whole structure.
    pub bytes: i32,
    /// Reserved.
    pub reserved: i16,
    /// Structure flags.
    pub flags: i16,
}

impl StructureHeader {
    /// Creates a header for the given structure id and size.
    pub fn new(id: i16, bytes: i32) -> StructureHeader {
        StructureHeader {
            id,
            format_version: 1,
            bytes,
            reserved: 0,
            flags: 0,
        }
    }

    /// Reads a structure header.
    pub fn read_from<R: Read>(read: &mut R) -> Result<StructureHeader> {
        Ok(StructureHeader {
            id: read.read_i16::<LittleEndian>()?,
            format_version: read.read_i16::<LittleEndian>()?,
            bytes: read.read_i32::<LittleEndian>()?,
            reserved: read.read_i16::<LittleEndian>()?,
            flags: read.read_i16::<LittleEndian>()?,
        })
    }

    /// Writes this structure header.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_i16::<LittleEndian>(self.id)?;
        write.write_i16::<LittleEndian>(self.format_version)?;
        write.write_i32::<LittleEndian>(self.bytes)?;
        write.write_i16::<LittleEndian>(self.reserved)?;
        write.write_i16::<LittleEndian>(self.flags)?;
        Ok(())
    }

    /// Fails unless the header carries the expected structure id.
    pub fn expect_id(&self, id: i16, what: &str) -> Result<()> {
        if self.id == id {
            Ok(())
        } else {
            Err(Error::MalformedHeader(format!(
                "expected {} (structure id {}) but found id {}",
                what, id, self.id
            )))
        }
    }
}

/// Interprets a NUL-padded name field as text.
pub(crate) fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

/// Fills a NUL-padded name field from text, truncating if oversized.
pub(crate) fn fill_text(field: &mut [u8], name: &str) {
    for byte in field.iter_mut() {
        *byte = 0;
    }
    for (slot, byte) in field.iter_mut().zip(name.bytes()) {
        *slot = byte;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn structure_header_roundtrip() {
        let header = StructureHeader::new(PRODUCT_HEADER_ID, 640);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(12, buf.len());
        let read = StructureHeader::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(header, read);
        assert!(read.expect_id(PRODUCT_HEADER_ID, "product header").is_ok());
        assert!(read.expect_id(INGEST_HEADER_ID, "ingest header").is_err());
    }

    #[test]
    fn text_trims_nul_padding() {
        assert_eq!("PPIVOL_A", text(b"PPIVOL_A\0\0\0\0"));
        let mut field = [0xFFu8; 8];
        fill_text(&mut field, "WSR");
        assert_eq!(b"WSR\0\0\0\0\0", &field);
    }
}
