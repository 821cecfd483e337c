//! One-pass decoding of raw product files.
//!
//! The file is a sequence of 6144-byte physical records: the product
//! header, the ingest header, then data records carrying a compressed ray
//! stream. Each data record starts with a twelve-byte record header; the
//! compressed stream runs straight across record boundaries, so the
//! decoder keeps a single output cursor and consumes tokens wherever they
//! fall.

use crate::data_type::{self, DataType};
use crate::raw::{
    IngestHeader, ProductHeader, RawProdBhdr, RayHeader as RawRayHeader, SweepHeader,
    MAX_SWEEPS, RAW_PROD_BHDR_SIZE, RAY_HEADER_SIZE, RECORD_SIZE, SWEEP_HEADER_ID,
    SWEEP_HEADER_SIZE,
};
use crate::volume::{Ray, RayHeader, Sweep, Volume};
use crate::{bits, Error, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// End-of-ray token.
const END_OF_RAY: u16 = 0x0000;
/// End-of-sweep token.
const END_OF_SWEEP: u16 = 0x8000;

/// Decoder configuration.
///
/// Strict mode turns soft anomalies, like a mask bit with no registered
/// data type, into hard failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Treat soft anomalies as fatal.
    pub strict: bool,
}

impl DecodeOptions {
    /// Reads the configuration from the environment.
    ///
    /// `SIGMET_STRICT` set to anything but the empty string or `0` turns
    /// strict mode on.
    pub fn from_env() -> DecodeOptions {
        let strict = std::env::var("SIGMET_STRICT")
            .map(|value| !value.is_empty() && value != "0")
            .unwrap_or(false);
        DecodeOptions { strict }
    }
}

impl Volume {
    /// Decodes a volume from a file, with options from the environment.
    ///
    /// ```no_run
    /// let volume = sigmet::Volume::from_path("202407151200.RAWXYZ").unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Volume> {
        Volume::from_path_with_options(path, DecodeOptions::from_env())
    }

    /// Decodes a volume from a file with explicit options.
    pub fn from_path_with_options<P: AsRef<Path>>(
        path: P,
        options: DecodeOptions,
    ) -> Result<Volume> {
        let mut read = BufReader::new(File::open(path)?);
        Volume::read_from(&mut read, options)
    }

    /// Decodes a volume from a byte source in one forward pass.
    ///
    /// On any failure no partial volume is observable; the error is all
    /// the caller gets.
    pub fn read_from<R: Read>(read: &mut R, options: DecodeOptions) -> Result<Volume> {
        Decoder::new(options).decode(read)
    }
}

struct Decoder {
    options: DecodeOptions,
}

impl Decoder {
    fn new(options: DecodeOptions) -> Decoder {
        Decoder { options }
    }

    fn decode<R: Read>(&self, read: &mut R) -> Result<Volume> {
        let mut record = vec![0u8; RECORD_SIZE];
        read_record(read, &mut record, "product header record")?;
        let product_header = ProductHeader::read_from(&mut Cursor::new(&record[..]))?;
        read_record(read, &mut record, "ingest header record")?;
        let ingest_header = IngestHeader::read_from(&mut Cursor::new(&record[..]))?;
        drop(record);

        let layout = Layout::new(&ingest_header, self.options.strict)?;
        let mut samples = Vec::new();
        samples.try_reserve_exact(layout.sample_capacity)?;

        let mut stream = RecordStream::new(read);
        let mut scratch = vec![0u8; layout.max_ray_size];
        let mut sweeps = Vec::new();
        let mut rays: Vec<Option<Ray>> = Vec::new();
        let mut extended_millis: Vec<Option<u32>> = Vec::new();

        'sweeps: for sweep_index in 0..layout.num_sweeps {
            let id = loop {
                if !stream.advance_record()? {
                    log::debug!(
                        "file ends after {} of {} sweeps",
                        sweep_index,
                        layout.num_sweeps
                    );
                    break 'sweeps;
                }
                match stream.read_u16()? {
                    // an end-of-sweep token that spilled into its own
                    // record; the sweep it closed is already done
                    END_OF_SWEEP => stream.skip_rest_of_record(),
                    id => break id,
                }
            };
            stream.expect_sweep(sweep_index as u16 + 1);
            if id == END_OF_RAY {
                log::debug!(
                    "no more sweeps after {} of {}",
                    sweep_index,
                    layout.num_sweeps
                );
                break;
            }
            if id != SWEEP_HEADER_ID {
                return Err(Error::MalformedHeader(format!(
                    "expected a sweep header but found word {:#06x}",
                    id
                )));
            }
            let mut header_bytes = [0u8; SWEEP_HEADER_SIZE - 2];
            stream.read_bytes(&mut header_bytes)?;
            let sweep_header = SweepHeader::read_after_id(&mut Cursor::new(&header_bytes[..]))?;
            sweeps.push(Sweep {
                time: sweep_header.time,
                fixed_angle: crate::angle::bin2_to_radians(sweep_header.fixed_angle),
                num_rays: u32::from(sweep_header.num_rays),
            });

            let mut sweep_done = false;
            for _ray in 0..layout.num_rays {
                if sweep_done {
                    self.push_absent_ray(&layout, &mut rays, &mut extended_millis);
                    continue;
                }
                let (len, end) = decompress_ray(&mut stream, &mut scratch)?;
                if end == RayEnd::Sweep {
                    sweep_done = true;
                }
                if len == 0 {
                    self.push_absent_ray(&layout, &mut rays, &mut extended_millis);
                    continue;
                }
                self.push_ray(
                    &layout,
                    &scratch,
                    &mut samples,
                    &mut rays,
                    &mut extended_millis,
                )?;
            }
            stream.skip_rest_of_record();
        }

        let volume = Volume {
            product_header,
            ingest_header,
            present_types: layout.types,
            sweeps,
            rays,
            extended_millis,
            samples,
        };
        volume.validate()?;
        Ok(volume)
    }

    fn push_absent_ray(
        &self,
        layout: &Layout,
        rays: &mut Vec<Option<Ray>>,
        extended_millis: &mut Vec<Option<u32>>,
    ) {
        for _ in 0..layout.types.len() {
            rays.push(None);
        }
        extended_millis.push(None);
    }

    /// Splits one decompressed ray into its per-type chunks.
    fn push_ray(
        &self,
        layout: &Layout,
        scratch: &[u8],
        samples: &mut Vec<u8>,
        rays: &mut Vec<Option<Ray>>,
        extended_millis: &mut Vec<Option<u32>>,
    ) -> Result<()> {
        let mut cursor = 0usize;
        let mut ray_millis = None;
        for (data_type, width) in layout.types.iter().zip(&layout.widths) {
            let mut chunk = Cursor::new(&scratch[cursor..cursor + RAY_HEADER_SIZE]);
            let raw_header = RawRayHeader::read_from(&mut chunk)?;
            cursor += layout.ray_header_size;
            if raw_header.is_zero() {
                rays.push(None);
                continue;
            }
            let num_bins = usize::from(raw_header.num_bins);
            if num_bins > layout.num_bins {
                return Err(Error::MalformedHeader(format!(
                    "ray claims {} bins but the task outputs {}",
                    num_bins, layout.num_bins
                )));
            }
            let data_len = width.bytes_for_bins(num_bins);
            let data = &scratch[cursor..cursor + data_len];
            cursor += data_len;
            if data_type.is_extended_header() {
                ray_millis = extended_header_millis(data);
            }
            let data_offset = samples.len();
            samples.extend_from_slice(data);
            rays.push(Some(Ray {
                header: RayHeader::from_raw(&raw_header),
                data_offset,
                data_len,
            }));
        }
        extended_millis.push(ray_millis);
        Ok(())
    }
}

/// The per-ray offset of the extended-header clock, milliseconds since the
/// start of the sweep.
fn extended_header_millis(data: &[u8]) -> Option<u32> {
    if data.len() >= 4 {
        bits::le_u32(data, 0).ok()
    } else {
        bits::le_u16(data, 0).ok().map(u32::from)
    }
}

/// Validated dimensions and the resolved type list.
struct Layout {
    num_sweeps: usize,
    num_rays: usize,
    num_bins: usize,
    ray_header_size: usize,
    types: Vec<DataType>,
    widths: Vec<data_type::DatumWidth>,
    max_ray_size: usize,
    sample_capacity: usize,
}

impl Layout {
    fn new(ingest: &IngestHeader, strict: bool) -> Result<Layout> {
        let num_sweeps = usize::from(ingest.task.scan.num_sweeps);
        let num_rays = usize::from(ingest.configuration.num_rays_per_sweep);
        let num_bins = usize::from(ingest.task.range.num_bins_out);
        if num_sweeps == 0 || num_sweeps > MAX_SWEEPS {
            return Err(Error::MalformedHeader(format!(
                "task declares {} sweeps, allowed range is 1-{}",
                num_sweeps, MAX_SWEEPS
            )));
        }
        if num_rays == 0 {
            return Err(Error::MalformedHeader(
                "task declares zero rays per sweep".to_string(),
            ));
        }
        if num_bins == 0 {
            return Err(Error::MalformedHeader(
                "task outputs zero bins".to_string(),
            ));
        }
        let ray_header_size = usize::from(ingest.configuration.ray_header_size);
        if ray_header_size < RAY_HEADER_SIZE {
            return Err(Error::MalformedHeader(format!(
                "ray header size {} is smaller than the {}-byte header",
                ray_header_size, RAY_HEADER_SIZE
            )));
        }
        let types = data_type::types_from_mask(&ingest.task.dsp.data_mask, strict)?;
        if !types.iter().any(|data_type| !data_type.is_extended_header()) {
            return Err(Error::MalformedHeader(
                "the data mask names no real data types".to_string(),
            ));
        }
        let widths: Vec<_> = types
            .iter()
            .map(|data_type| data_type.datum_width(ingest))
            .collect();
        let mut per_ray_data = 0usize;
        for width in &widths {
            per_ray_data = per_ray_data
                .checked_add(width.bytes_for_bins(num_bins))
                .ok_or_else(|| Error::ResourceExhausted("ray size overflows".to_string()))?;
        }
        let max_ray_size = per_ray_data
            .checked_add(ray_header_size.checked_mul(types.len()).ok_or_else(|| {
                Error::ResourceExhausted("ray size overflows".to_string())
            })?)
            .ok_or_else(|| Error::ResourceExhausted("ray size overflows".to_string()))?;
        let sample_capacity = num_sweeps
            .checked_mul(num_rays)
            .and_then(|rays| rays.checked_mul(per_ray_data))
            .ok_or_else(|| Error::ResourceExhausted("sample buffer overflows".to_string()))?;
        Ok(Layout {
            num_sweeps,
            num_rays,
            num_bins,
            ray_header_size,
            types,
            widths,
            max_ray_size,
            sample_capacity,
        })
    }
}

fn read_record<R: Read>(read: &mut R, record: &mut [u8], what: &str) -> Result<()> {
    read.read_exact(record).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::TruncatedStream(format!("file ends inside the {}", what))
        } else {
            Error::Io(err)
        }
    })
}

/// How a decompressed ray ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RayEnd {
    /// The end-of-ray token.
    Ray,
    /// The end-of-sweep token; no more rays in this sweep.
    Sweep,
}

/// Decompresses one ray into `scratch`, zero-filling the tail.
///
/// Returns the number of bytes the compressed stream actually produced.
/// Overlong runs and literals are truncated to the scratch size; the
/// excess words of a literal are still consumed so the token stream stays
/// in step.
fn decompress_ray<R: Read>(
    stream: &mut RecordStream<'_, R>,
    scratch: &mut [u8],
) -> Result<(usize, RayEnd)> {
    let mut filled = 0usize;
    loop {
        let token = stream.read_u16()?;
        match token {
            END_OF_RAY => {
                zero_fill(&mut scratch[filled..]);
                return Ok((filled, RayEnd::Ray));
            }
            END_OF_SWEEP => {
                zero_fill(&mut scratch[filled..]);
                return Ok((filled, RayEnd::Sweep));
            }
            token if token & 0x8000 != 0 => {
                let bytes = 2 * usize::from(token & 0x7FFF);
                let take = bytes.min(scratch.len() - filled);
                zero_fill(&mut scratch[filled..filled + take]);
                filled += take;
            }
            token => {
                let bytes = 2 * usize::from(token);
                let take = bytes.min(scratch.len() - filled);
                stream.read_bytes(&mut scratch[filled..filled + take])?;
                filled += take;
                if bytes > take {
                    stream.discard(bytes - take)?;
                }
            }
        }
    }
}

fn zero_fill(buf: &mut [u8]) {
    for byte in buf {
        *byte = 0;
    }
}

/// A reader over the data records, stripping each record's header.
struct RecordStream<'a, R: Read> {
    read: &'a mut R,
    record: Vec<u8>,
    pos: usize,
    have_record: bool,
    bhdr: RawProdBhdr,
    expected_sweep: u16,
}

impl<'a, R: Read> RecordStream<'a, R> {
    fn new(read: &'a mut R) -> RecordStream<'a, R> {
        RecordStream {
            read,
            record: vec![0u8; RECORD_SIZE],
            pos: RECORD_SIZE,
            have_record: false,
            bhdr: RawProdBhdr::default(),
            expected_sweep: 0,
        }
    }

    /// The sweep number the decoder is currently framing, for mismatch
    /// logging.
    fn expect_sweep(&mut self, sweep_number: u16) {
        self.expected_sweep = sweep_number;
    }

    /// Reads the next record and its header. Returns false on clean end of
    /// file at a record boundary.
    fn advance_record(&mut self) -> Result<bool> {
        let mut filled = 0usize;
        while filled < RECORD_SIZE {
            let n = self.read.read(&mut self.record[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            self.have_record = false;
            return Ok(false);
        }
        if filled < RECORD_SIZE {
            return Err(Error::TruncatedStream(format!(
                "record ends after {} of {} bytes",
                filled, RECORD_SIZE
            )));
        }
        self.bhdr = RawProdBhdr::read_from(&mut Cursor::new(&self.record[..RAW_PROD_BHDR_SIZE]))?;
        if self.expected_sweep != 0 && self.bhdr.sweep_number != self.expected_sweep {
            log::debug!(
                "record {} carries sweep number {}, expected {}",
                self.bhdr.record_number,
                self.bhdr.sweep_number,
                self.expected_sweep
            );
        }
        self.pos = RAW_PROD_BHDR_SIZE;
        self.have_record = true;
        Ok(true)
    }

    /// Reads exactly `out.len()` bytes of the logical stream, crossing
    /// record boundaries as needed.
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        while done < out.len() {
            if !self.have_record || self.pos == RECORD_SIZE {
                if !self.advance_record()? {
                    return Err(Error::TruncatedStream(format!(
                        "file ends {} bytes into a {}-byte read",
                        done,
                        out.len()
                    )));
                }
            }
            let take = (RECORD_SIZE - self.pos).min(out.len() - done);
            out[done..done + take].copy_from_slice(&self.record[self.pos..self.pos + take]);
            self.pos += take;
            done += take;
        }
        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.read_bytes(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Reads and drops `n` bytes.
    fn discard(&mut self, n: usize) -> Result<()> {
        let mut remaining = n;
        let mut chaff = [0u8; 64];
        while remaining > 0 {
            let take = remaining.min(chaff.len());
            self.read_bytes(&mut chaff[..take])?;
            remaining -= take;
        }
        Ok(())
    }

    /// Discards the remainder of the current record; the next read starts
    /// at the next record boundary.
    fn skip_rest_of_record(&mut self) {
        self.pos = RECORD_SIZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_lenient() {
        assert!(!DecodeOptions::default().strict);
    }

    #[test]
    fn decompression_roundtrip() {
        // two literal words, a three-word zero run, one literal word, end
        let mut compressed = Vec::new();
        for word in [0x0002u16, 0x1122, 0x3344, 0x8003, 0x0001, 0x5566, 0x0000] {
            compressed.extend_from_slice(&word.to_le_bytes());
        }
        let mut record = vec![0u8; RECORD_SIZE];
        record[RAW_PROD_BHDR_SIZE..RAW_PROD_BHDR_SIZE + compressed.len()]
            .copy_from_slice(&compressed);
        let mut cursor = Cursor::new(record);
        let mut stream = RecordStream::new(&mut cursor);
        let mut scratch = vec![0xAAu8; 16];
        let (len, end) = decompress_ray(&mut stream, &mut scratch).unwrap();
        assert_eq!(12, len);
        assert_eq!(RayEnd::Ray, end);
        assert_eq!(
            &[0x22, 0x11, 0x44, 0x33, 0, 0, 0, 0, 0, 0, 0x66, 0x55, 0, 0, 0, 0],
            &scratch[..]
        );
    }

    #[test]
    fn overlong_run_truncates() {
        let mut compressed = Vec::new();
        // a zero run far larger than the ray, then end of sweep
        for word in [0xFFFFu16, END_OF_SWEEP] {
            compressed.extend_from_slice(&word.to_le_bytes());
        }
        let mut record = vec![0u8; RECORD_SIZE];
        record[RAW_PROD_BHDR_SIZE..RAW_PROD_BHDR_SIZE + compressed.len()]
            .copy_from_slice(&compressed);
        let mut cursor = Cursor::new(record);
        let mut stream = RecordStream::new(&mut cursor);
        let mut scratch = vec![0xAAu8; 8];
        let (len, end) = decompress_ray(&mut stream, &mut scratch).unwrap();
        assert_eq!(8, len);
        assert_eq!(RayEnd::Sweep, end);
        assert_eq!(&[0u8; 8], &scratch[..]);
    }

    #[test]
    fn literal_past_end_of_file_is_truncated_stream() {
        let mut record = vec![0u8; RECORD_SIZE];
        // a literal demanding more words than the file holds
        let token = 0x7000u16.to_le_bytes();
        record[RAW_PROD_BHDR_SIZE..RAW_PROD_BHDR_SIZE + 2].copy_from_slice(&token);
        let mut cursor = Cursor::new(record);
        let mut stream = RecordStream::new(&mut cursor);
        let mut scratch = vec![0u8; 0x8000 * 2];
        assert!(matches!(
            decompress_ray(&mut stream, &mut scratch),
            Err(Error::TruncatedStream(_))
        ));
    }

    #[test]
    fn stream_crosses_record_boundaries() {
        let mut file = Vec::new();
        let mut first = vec![0u8; RECORD_SIZE];
        let bhdr = RawProdBhdr {
            record_number: 0,
            sweep_number: 1,
            ..Default::default()
        };
        let mut cursor = Cursor::new(&mut first[..]);
        bhdr.write_to(&mut cursor).unwrap();
        for (index, byte) in first.iter_mut().enumerate().skip(RAW_PROD_BHDR_SIZE) {
            *byte = index as u8;
        }
        let mut second = first.clone();
        second[0] = 1; // record number
        file.extend_from_slice(&first);
        file.extend_from_slice(&second);
        let mut cursor = Cursor::new(file);
        let mut stream = RecordStream::new(&mut cursor);
        let payload = RECORD_SIZE - RAW_PROD_BHDR_SIZE;
        let mut out = vec![0u8; payload + 8];
        stream.read_bytes(&mut out).unwrap();
        assert_eq!(first[RAW_PROD_BHDR_SIZE..], out[..payload]);
        assert_eq!(second[RAW_PROD_BHDR_SIZE..RAW_PROD_BHDR_SIZE + 8], out[payload..]);
    }

    #[test]
    fn partial_record_is_truncated_stream() {
        let mut cursor = Cursor::new(vec![0u8; 100]);
        let mut stream = RecordStream::new(&mut cursor);
        assert!(matches!(
            stream.advance_record(),
            Err(Error::TruncatedStream(_))
        ));
    }
}
