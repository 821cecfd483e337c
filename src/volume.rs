//! The decoded, in-memory form of a raw product file.
//!
//! A [Volume] is built once by the decoder and never changes afterwards.
//! All bin storage lives in one contiguous sample buffer; ray entries hold
//! spans into it, never pointers.

use crate::data_type::DataType;
use crate::raw::{self, MAX_SWEEPS};
use crate::{angle, Error, Result, TimeZoneSpec, Ymds};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::f64::consts::TAU;
use std::io::{Read, Write};

/// A decoded ray header with angles in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayHeader {
    /// Azimuth at the start of the dwell, radians.
    pub azimuth_begin: f64,
    /// Azimuth at the end of the dwell, radians.
    pub azimuth_end: f64,
    /// Elevation at the start of the dwell, radians.
    pub tilt_begin: f64,
    /// Elevation at the end of the dwell, radians.
    pub tilt_end: f64,
    /// Number of bins actually recorded.
    pub num_bins: u32,
    /// Whole seconds since the start of the sweep.
    pub seconds: u32,
}

impl RayHeader {
    pub(crate) fn from_raw(header: &raw::RayHeader) -> RayHeader {
        RayHeader {
            azimuth_begin: angle::bin2_to_radians(header.begin_azimuth),
            azimuth_end: angle::bin2_to_radians(header.end_azimuth),
            tilt_begin: angle::bin2_to_radians(header.begin_elevation),
            tilt_end: angle::bin2_to_radians(header.end_elevation),
            num_bins: u32::from(header.num_bins),
            seconds: u32::from(header.seconds),
        }
    }
}

/// One ray of one data type: its header and a span into the sample buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// The decoded ray header.
    pub header: RayHeader,
    /// Byte offset of this ray's storage in the sample buffer.
    pub data_offset: usize,
    /// Number of storage bytes.
    pub data_len: usize,
}

/// One sweep's identity: when it ran and at what fixed angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweep {
    /// Time the sweep started.
    pub time: Ymds,
    /// The sweep's fixed angle, radians.
    pub fixed_angle: f64,
    /// Number of rays the sweep declared.
    pub num_rays: u32,
}

/// A fully decoded raw product volume.
///
/// Construct one with [Volume::from_path](crate::Volume::from_path) or
/// [Volume::read_from](crate::Volume::read_from):
///
/// ```no_run
/// use sigmet::Volume;
/// let volume = Volume::from_path("202407151200.RAWXYZ").unwrap();
/// println!("{} sweeps", volume.num_sweeps());
/// ```
#[derive(Debug, Clone)]
pub struct Volume {
    pub(crate) product_header: raw::ProductHeader,
    pub(crate) ingest_header: raw::IngestHeader,
    pub(crate) present_types: Vec<DataType>,
    pub(crate) sweeps: Vec<Sweep>,
    /// `sweeps × rays × types`, absent rays are `None`.
    pub(crate) rays: Vec<Option<Ray>>,
    /// `sweeps × rays` extended-header milliseconds.
    pub(crate) extended_millis: Vec<Option<u32>>,
    pub(crate) samples: Vec<u8>,
}

impl Volume {
    /// The product header record.
    pub fn product_header(&self) -> &raw::ProductHeader {
        &self.product_header
    }

    /// The ingest header record, task configuration included.
    pub fn ingest_header(&self) -> &raw::IngestHeader {
        &self.ingest_header
    }

    /// The data types present, in mask-bit order.
    pub fn present_types(&self) -> &[DataType] {
        &self.present_types
    }

    /// The first real (non-extended-header) data type.
    pub fn default_data_type(&self) -> Option<DataType> {
        self.present_types
            .iter()
            .copied()
            .find(|data_type| !data_type.is_extended_header())
    }

    /// The number of sweeps actually decoded.
    pub fn num_sweeps(&self) -> usize {
        self.sweeps.len()
    }

    /// The number of rays in each sweep.
    pub fn num_rays_per_sweep(&self) -> usize {
        usize::from(self.ingest_header.configuration.num_rays_per_sweep)
    }

    /// The number of output bins in each ray.
    pub fn num_bins_out(&self) -> usize {
        usize::from(self.ingest_header.task.range.num_bins_out)
    }

    /// The number of data-type slots, the extended header included.
    pub fn num_types(&self) -> usize {
        self.present_types.len()
    }

    /// The decoded sweeps.
    pub fn sweeps(&self) -> &[Sweep] {
        &self.sweeps
    }

    /// The whole sample buffer.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// One ray entry, or `None` when the ray is absent.
    pub fn ray(&self, sweep: usize, ray: usize, data_type: usize) -> Option<&Ray> {
        if ray >= self.num_rays_per_sweep() || data_type >= self.num_types() {
            return None;
        }
        let index =
            (sweep * self.num_rays_per_sweep() + ray) * self.num_types() + data_type;
        self.rays.get(index).and_then(|entry| entry.as_ref())
    }

    /// A ray's storage bytes out of the shared sample buffer.
    pub fn ray_samples(&self, ray: &Ray) -> &[u8] {
        &self.samples[ray.data_offset..ray.data_offset + ray.data_len]
    }

    /// A sweep's start time as seconds since the epoch.
    pub fn sweep_time_seconds(&self, sweep: usize) -> Result<f64> {
        let sweep = self
            .sweeps
            .get(sweep)
            .ok_or_else(|| Error::BadArgument(format!("no sweep {}", sweep)))?;
        sweep.time.to_unix_seconds()
    }

    /// A ray's absolute time, preferring the extended-header clock.
    ///
    /// NaN when the ray is absent or the sweep time is unusable.
    pub fn ray_time(&self, sweep: usize, ray: usize) -> f64 {
        let base = match self
            .sweeps
            .get(sweep)
            .and_then(|entry| entry.time.to_unix_seconds().ok())
        {
            Some(base) => base,
            None => return f64::NAN,
        };
        if let Some(millis) = self
            .extended_millis
            .get(sweep * self.num_rays_per_sweep() + ray)
            .copied()
            .flatten()
        {
            return base + f64::from(millis) / 1000.0;
        }
        match self.ray_header(sweep, ray) {
            Some(header) => base + f64::from(header.seconds),
            None => f64::NAN,
        }
    }

    /// The ray header of the first real data type's entry for a ray.
    pub fn ray_header(&self, sweep: usize, ray: usize) -> Option<RayHeader> {
        self.present_types
            .iter()
            .enumerate()
            .filter(|(_, data_type)| !data_type.is_extended_header())
            .find_map(|(slot, _)| self.ray(sweep, ray, slot))
            .map(|entry| entry.header)
    }

    /// The radar's reported time zone.
    pub fn time_zone(&self) -> TimeZoneSpec {
        self.ingest_header.time_zone()
    }

    /// Wide ray headers for one sweep, or for all sweeps when `None`.
    ///
    /// One record per ray; absent rays produce a zeroed header with NaN
    /// time.
    pub fn wide_ray_headers(&self, sweep: Option<usize>) -> Result<Vec<WideRayHeader>> {
        let sweeps = self.sweep_range(sweep)?;
        let mut headers = Vec::with_capacity(sweeps.len() * self.num_rays_per_sweep());
        for sweep in sweeps {
            for ray in 0..self.num_rays_per_sweep() {
                let header = self.ray_header(sweep, ray).unwrap_or_default();
                headers.push(WideRayHeader {
                    azimuth_begin: header.azimuth_begin,
                    azimuth_end: header.azimuth_end,
                    tilt_begin: header.tilt_begin,
                    tilt_end: header.tilt_end,
                    num_bins: header.num_bins,
                    time: self.ray_time(sweep, ray),
                });
            }
        }
        Ok(headers)
    }

    /// Physical values for one sweep of one data type, rays concatenated.
    ///
    /// Every ray contributes exactly [num_bins_out](Volume::num_bins_out)
    /// values; absent rays contribute zeros, and bins past a short ray's
    /// recorded count are NaN.
    pub fn sweep_data(
        &self,
        data_type: DataType,
        sweep: usize,
        corrected: bool,
    ) -> Result<Vec<f32>> {
        if sweep >= self.num_sweeps() {
            return Err(Error::BadArgument(format!("no sweep {}", sweep)));
        }
        let slot = self
            .present_types
            .iter()
            .position(|&present| present == data_type)
            .ok_or_else(|| {
                Error::BadArgument(format!(
                    "{} is not in this volume.",
                    data_type.abbrev()
                ))
            })?;
        let bins = self.num_bins_out();
        let mut values = vec![0f32; self.num_rays_per_sweep() * bins];
        for (ray_index, ray_values) in values.chunks_mut(bins).enumerate() {
            if let Some(ray) = self.ray(sweep, ray_index, slot) {
                let recorded = (ray.header.num_bins as usize).min(bins);
                data_type.storage_to_value(
                    &self.ingest_header,
                    self.ray_samples(ray),
                    &mut ray_values[..recorded],
                );
                for value in &mut ray_values[recorded..] {
                    *value = f32::NAN;
                }
                if corrected {
                    data_type.correct_values(&self.ingest_header, ray_values);
                }
            }
        }
        Ok(values)
    }

    fn sweep_range(&self, sweep: Option<usize>) -> Result<std::ops::Range<usize>> {
        match sweep {
            None => Ok(0..self.num_sweeps()),
            Some(sweep) if sweep < self.num_sweeps() => Ok(sweep..sweep + 1),
            Some(sweep) => Err(Error::BadArgument(format!("no sweep {}", sweep))),
        }
    }

    /// Checks the volume's structural invariants.
    ///
    /// The decoder runs this before handing a volume out; it is public so
    /// tests and consumers can assert it too.
    pub fn validate(&self) -> Result<()> {
        if self.sweeps.len() > MAX_SWEEPS {
            return Err(Error::MalformedHeader(format!(
                "{} sweeps exceeds the limit of {}",
                self.sweeps.len(),
                MAX_SWEEPS
            )));
        }
        if self.present_types.len() > crate::data_type::NUM_TYPES {
            return Err(Error::MalformedHeader(format!(
                "{} data types exceeds the dictionary",
                self.present_types.len()
            )));
        }
        let expected = self.num_sweeps() * self.num_rays_per_sweep() * self.num_types();
        if self.rays.len() != expected {
            return Err(Error::MalformedHeader(format!(
                "ray grid holds {} entries, expected {}",
                self.rays.len(),
                expected
            )));
        }
        let bins = self.num_bins_out() as u32;
        for ray in self.rays.iter().flatten() {
            if ray.data_offset + ray.data_len > self.samples.len() {
                return Err(Error::MalformedHeader(format!(
                    "ray span {}..{} outside sample buffer of {} bytes",
                    ray.data_offset,
                    ray.data_offset + ray.data_len,
                    self.samples.len()
                )));
            }
            if ray.header.num_bins > bins {
                return Err(Error::MalformedHeader(format!(
                    "ray holds {} bins but the task outputs {}",
                    ray.header.num_bins, bins
                )));
            }
            for angle in [
                ray.header.azimuth_begin,
                ray.header.azimuth_end,
                ray.header.tilt_begin,
                ray.header.tilt_end,
            ] {
                if !angle.is_finite() || !(0.0..TAU).contains(&angle) {
                    return Err(Error::MalformedHeader(format!(
                        "ray angle {} outside [0, 2π)",
                        angle
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The on-wire size of a [WideRayHeader] in bytes.
pub const WIDE_RAY_HEADER_SIZE: usize = 44;

/// A ray header augmented with the ray's absolute time.
///
/// This is the record the `RayHeaders` request streams over the bulk
/// channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WideRayHeader {
    /// Azimuth at the start of the dwell, radians.
    pub azimuth_begin: f64,
    /// Azimuth at the end of the dwell, radians.
    pub azimuth_end: f64,
    /// Elevation at the start of the dwell, radians.
    pub tilt_begin: f64,
    /// Elevation at the end of the dwell, radians.
    pub tilt_end: f64,
    /// Number of bins actually recorded.
    pub num_bins: u32,
    /// Seconds since the epoch, NaN when unavailable.
    pub time: f64,
}

impl WideRayHeader {
    /// Writes this header in its wire form.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_f64::<LittleEndian>(self.azimuth_begin)?;
        write.write_f64::<LittleEndian>(self.azimuth_end)?;
        write.write_f64::<LittleEndian>(self.tilt_begin)?;
        write.write_f64::<LittleEndian>(self.tilt_end)?;
        write.write_u32::<LittleEndian>(self.num_bins)?;
        write.write_f64::<LittleEndian>(self.time)?;
        Ok(())
    }

    /// Reads a header from its wire form.
    pub fn read_from<R: Read>(read: &mut R) -> Result<WideRayHeader> {
        Ok(WideRayHeader {
            azimuth_begin: read.read_f64::<LittleEndian>()?,
            azimuth_end: read.read_f64::<LittleEndian>()?,
            tilt_begin: read.read_f64::<LittleEndian>()?,
            tilt_end: read.read_f64::<LittleEndian>()?,
            num_bins: read.read_u32::<LittleEndian>()?,
            time: read.read_f64::<LittleEndian>()?,
        })
    }
}

/// The on-wire size of a [SweepHeaderRecord] in bytes.
pub const SWEEP_HEADER_RECORD_SIZE: usize = 20;

/// One sweep's identity as streamed by the `SweepHeaders` request.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SweepHeaderRecord {
    /// Sweep start, seconds since the epoch; NaN when unusable.
    pub time: f64,
    /// The sweep's fixed angle, radians.
    pub fixed_angle: f64,
    /// Number of rays the sweep declared.
    pub num_rays: u32,
}

impl SweepHeaderRecord {
    /// Writes this record in its wire form.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_f64::<LittleEndian>(self.time)?;
        write.write_f64::<LittleEndian>(self.fixed_angle)?;
        write.write_u32::<LittleEndian>(self.num_rays)?;
        Ok(())
    }

    /// Reads a record from its wire form.
    pub fn read_from<R: Read>(read: &mut R) -> Result<SweepHeaderRecord> {
        Ok(SweepHeaderRecord {
            time: read.read_f64::<LittleEndian>()?,
            fixed_angle: read.read_f64::<LittleEndian>()?,
            num_rays: read.read_u32::<LittleEndian>()?,
        })
    }
}

impl Volume {
    /// Sweep header records for one sweep, or all sweeps when `None`.
    pub fn sweep_header_records(&self, sweep: Option<usize>) -> Result<Vec<SweepHeaderRecord>> {
        let sweeps = self.sweep_range(sweep)?;
        Ok(sweeps
            .map(|index| {
                let sweep = &self.sweeps[index];
                SweepHeaderRecord {
                    time: sweep.time.to_unix_seconds().unwrap_or(f64::NAN),
                    fixed_angle: sweep.fixed_angle,
                    num_rays: sweep.num_rays,
                }
            })
            .collect())
    }
}

/// The volume's header records plus its derived dimensions.
///
/// This is the value the `VolumeHeaders` request transfers; daemon and
/// client use the same encoding, so the client reads back exactly what the
/// daemon holds.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeHeader {
    /// The product header record.
    pub product: raw::ProductHeader,
    /// The ingest header record.
    pub ingest: raw::IngestHeader,
    /// Number of decoded sweeps.
    pub num_sweeps: u32,
    /// Number of rays per sweep.
    pub num_rays_per_sweep: u32,
    /// Number of output bins per ray.
    pub num_bins_out: u32,
    /// Mask bits of the present types, ascending.
    pub type_bits: Vec<u16>,
}

impl VolumeHeader {
    /// Builds the header value for a volume.
    pub fn for_volume(volume: &Volume) -> VolumeHeader {
        VolumeHeader {
            product: volume.product_header,
            ingest: volume.ingest_header,
            num_sweeps: volume.num_sweeps() as u32,
            num_rays_per_sweep: volume.num_rays_per_sweep() as u32,
            num_bins_out: volume.num_bins_out() as u32,
            type_bits: volume
                .present_types
                .iter()
                .map(|data_type| data_type.bit())
                .collect(),
        }
    }

    /// Writes this header in its wire form.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        self.product.write_to(write)?;
        self.ingest.write_to(write)?;
        write.write_u32::<LittleEndian>(self.num_sweeps)?;
        write.write_u32::<LittleEndian>(self.num_rays_per_sweep)?;
        write.write_u32::<LittleEndian>(self.num_bins_out)?;
        write.write_u16::<LittleEndian>(self.type_bits.len() as u16)?;
        for bit in &self.type_bits {
            write.write_u16::<LittleEndian>(*bit)?;
        }
        Ok(())
    }

    /// Reads a header from its wire form.
    pub fn read_from<R: Read>(read: &mut R) -> Result<VolumeHeader> {
        let product = raw::ProductHeader::read_from(read)?;
        let ingest = raw::IngestHeader::read_from(read)?;
        let num_sweeps = read.read_u32::<LittleEndian>()?;
        let num_rays_per_sweep = read.read_u32::<LittleEndian>()?;
        let num_bins_out = read.read_u32::<LittleEndian>()?;
        let count = read.read_u16::<LittleEndian>()?;
        let mut type_bits = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            type_bits.push(read.read_u16::<LittleEndian>()?);
        }
        Ok(VolumeHeader {
            product,
            ingest,
            num_sweeps,
            num_rays_per_sweep,
            num_bins_out,
            type_bits,
        })
    }
}
