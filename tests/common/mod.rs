//! A synthetic raw-product builder for the integration tests.
//!
//! Builds byte-exact files the way an IRIS writer would: product and
//! ingest header records, then data records whose compressed ray stream
//! runs across record boundaries.

// each integration test crate uses a different slice of this module
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use sigmet::mask::DataMask;
use sigmet::raw::{
    IngestHeader, ProductHeader, RawProdBhdr, RayHeader, StructureHeader, SweepHeader,
    INGEST_HEADER_ID, PRODUCT_HEADER_ID, RAW_PROD_BHDR_SIZE, RECORD_SIZE, SWEEP_HEADER_ID,
    TASK_CONFIGURATION_ID,
};
use sigmet::{angle, DataType, Volume, Ymds};
use std::collections::HashSet;

/// The deterministic storage byte for a bin, always inside the valid
/// range of the one-byte formats.
pub fn sample_byte(sweep: usize, ray: usize, bin: usize) -> u8 {
    (64 + ((sweep * 31 + ray * 7 + bin) % 150)) as u8
}

/// The extended-header clock the builder stamps on each ray.
pub fn sample_millis(ray: usize) -> u32 {
    (ray as u32 + 1) * 500
}

/// Builds synthetic raw product files.
pub struct VolumeBuilder {
    pub num_sweeps: u16,
    pub num_rays: u16,
    pub num_bins: u16,
    pub type_bits: Vec<u16>,
    pub prf_hertz: i32,
    pub wavelength_hundredths_cm: i32,
    pub time_zone_minutes_west: i16,
    pub sweep_time_base: u16,
    pub calibration_reflectivity: i16,
    /// Rays written as absent (a bare end-of-ray token).
    pub absent: HashSet<(usize, usize)>,
    /// Sweeps actually written, when fewer than declared.
    pub sweeps_in_file: Option<u16>,
}

impl VolumeBuilder {
    pub fn new(num_sweeps: u16, num_rays: u16, num_bins: u16, type_bits: &[u16]) -> VolumeBuilder {
        VolumeBuilder {
            num_sweeps,
            num_rays,
            num_bins,
            type_bits: type_bits.to_vec(),
            prf_hertz: 1_000,
            wavelength_hundredths_cm: 530,
            time_zone_minutes_west: 0,
            sweep_time_base: 1,
            calibration_reflectivity: 0,
            absent: HashSet::new(),
            sweeps_in_file: None,
        }
    }

    pub fn ingest_header(&self) -> IngestHeader {
        let mut ingest = IngestHeader {
            structure: StructureHeader::new(INGEST_HEADER_ID, 392),
            ..Default::default()
        };
        ingest.task.structure = StructureHeader::new(TASK_CONFIGURATION_ID, 258);
        ingest.configuration.num_rays_per_sweep = self.num_rays;
        ingest.configuration.volume_start_time = Ymds::new(2024, 7, 15, 3_600, 0);
        ingest.configuration.time_zone_minutes_west = self.time_zone_minutes_west;
        ingest.configuration.sweep_time_base = self.sweep_time_base;
        ingest.task.scan.num_sweeps = self.num_sweeps;
        for (index, slot) in ingest.task.scan.fixed_angles.iter_mut().enumerate() {
            *slot = angle::radians_to_bin2((index as f64 + 1.0) * 0.01);
        }
        ingest.task.range.num_bins_out = self.num_bins;
        ingest.task.dsp.prf_hertz = self.prf_hertz;
        ingest.task.misc.wavelength_hundredths_cm = self.wavelength_hundredths_cm;
        ingest.task.calibration.calibration_reflectivity = self.calibration_reflectivity;
        ingest.task.dsp.data_mask = DataMask::with_bits(&self.type_bits);
        ingest
    }

    fn product_header(&self) -> ProductHeader {
        let mut product = ProductHeader {
            structure: StructureHeader::new(PRODUCT_HEADER_ID, 176),
            ..Default::default()
        };
        product.configuration.generation_time = Ymds::new(2024, 7, 15, 3_700, 0);
        product.configuration.ingest_time = Ymds::new(2024, 7, 15, 3_600, 0);
        product.end.prf_hertz = self.prf_hertz;
        product.end.wavelength_hundredths_cm = self.wavelength_hundredths_cm;
        product
    }

    fn known_types(&self) -> Vec<DataType> {
        self.type_bits
            .iter()
            .filter_map(|&bit| DataType::from_bit(bit))
            .collect()
    }

    /// The full file bytes.
    pub fn build(&self) -> Vec<u8> {
        let ingest = self.ingest_header();
        let types = self.known_types();
        let mut file = Vec::new();
        file.extend_from_slice(&record_of(&{
            let mut bytes = Vec::new();
            self.product_header().write_to(&mut bytes).unwrap();
            bytes
        }));
        file.extend_from_slice(&record_of(&{
            let mut bytes = Vec::new();
            ingest.write_to(&mut bytes).unwrap();
            bytes
        }));

        let mut writer = RecordWriter::new();
        let sweeps = self.sweeps_in_file.unwrap_or(self.num_sweeps);
        for sweep in 0..usize::from(sweeps) {
            writer.begin_sweep(sweep as u16 + 1);
            let header = SweepHeader {
                id: SWEEP_HEADER_ID,
                fixed_angle: ingest.task.scan.fixed_angles[sweep],
                num_rays: self.num_rays,
                start_azimuth: 0,
                start_elevation: ingest.task.scan.fixed_angles[sweep],
                time: Ymds::new(2024, 7, 15, 3_600 + 60 * sweep as i32, 0),
            };
            let mut bytes = Vec::new();
            header.write_to(&mut bytes).unwrap();
            writer.write(&bytes);
            for ray in 0..usize::from(self.num_rays) {
                if self.absent.contains(&(sweep, ray)) {
                    writer.write(&0x0000u16.to_le_bytes());
                    continue;
                }
                let payload = self.ray_payload(&ingest, &types, sweep, ray);
                writer.write(&compress(&payload));
            }
            writer.write(&0x8000u16.to_le_bytes());
        }
        file.extend_from_slice(&writer.finish());
        file
    }

    /// Decodes the built file.
    pub fn volume(&self) -> Volume {
        Volume::read_from(
            &mut std::io::Cursor::new(self.build()),
            sigmet::DecodeOptions::default(),
        )
        .unwrap()
    }

    fn ray_payload(
        &self,
        ingest: &IngestHeader,
        types: &[DataType],
        sweep: usize,
        ray: usize,
    ) -> Vec<u8> {
        let mut payload = Vec::new();
        for data_type in types {
            let num_bins = if data_type.is_extended_header() {
                2u16
            } else {
                self.num_bins
            };
            let header = RayHeader {
                begin_azimuth: ray_azimuth(ray, usize::from(self.num_rays)),
                begin_elevation: ingest.task.scan.fixed_angles[sweep],
                end_azimuth: ray_azimuth(ray + 1, usize::from(self.num_rays)),
                end_elevation: ingest.task.scan.fixed_angles[sweep],
                num_bins,
                seconds: ray as u16,
            };
            header.write_to(&mut payload).unwrap();
            if data_type.is_extended_header() {
                payload
                    .write_u32::<LittleEndian>(sample_millis(ray))
                    .unwrap();
                continue;
            }
            match data_type.datum_width(ingest) {
                sigmet::data_type::DatumWidth::Bytes(1) => {
                    for bin in 0..usize::from(num_bins) {
                        payload.push(sample_byte(sweep, ray, bin));
                    }
                }
                sigmet::data_type::DatumWidth::Bytes(2) => {
                    for bin in 0..usize::from(num_bins) {
                        let word = 32_768 + u16::from(sample_byte(sweep, ray, bin));
                        payload.write_u16::<LittleEndian>(word).unwrap();
                    }
                }
                sigmet::data_type::DatumWidth::Bytes(_) => {
                    for bin in 0..usize::from(num_bins) {
                        let value = f32::from(sample_byte(sweep, ray, bin));
                        payload.write_u32::<LittleEndian>(value.to_bits()).unwrap();
                    }
                }
                sigmet::data_type::DatumWidth::Bits(_) => {
                    let mut byte = 0u8;
                    let mut used = 0;
                    for bin in 0..usize::from(num_bins) {
                        if sample_byte(sweep, ray, bin) % 2 == 1 {
                            byte |= 1 << used;
                        }
                        used += 1;
                        if used == 8 {
                            payload.push(byte);
                            byte = 0;
                            used = 0;
                        }
                    }
                    if used > 0 {
                        payload.push(byte);
                    }
                }
            }
        }
        payload
    }
}

fn ray_azimuth(ray: usize, num_rays: usize) -> u16 {
    ((ray % num_rays) * 65_536 / num_rays) as u16
}

/// Pads header bytes to one full record.
fn record_of(bytes: &[u8]) -> Vec<u8> {
    assert!(bytes.len() <= RECORD_SIZE);
    let mut record = bytes.to_vec();
    record.resize(RECORD_SIZE, 0);
    record
}

/// Compresses one ray payload: literal tokens, a pad byte when the
/// payload is odd, and the end-of-ray token.
pub fn compress(payload: &[u8]) -> Vec<u8> {
    let mut padded = payload.to_vec();
    if padded.len() % 2 != 0 {
        padded.push(0);
    }
    let mut out = Vec::new();
    for chunk in padded.chunks(0x7FFE * 2) {
        let words = (chunk.len() / 2) as u16;
        out.extend_from_slice(&words.to_le_bytes());
        out.extend_from_slice(chunk);
    }
    out.extend_from_slice(&0x0000u16.to_le_bytes());
    out
}

/// Writes data records, splitting payload across record boundaries and
/// stamping each record's header.
struct RecordWriter {
    out: Vec<u8>,
    record: Vec<u8>,
    record_number: u16,
    sweep_number: u16,
}

impl RecordWriter {
    fn new() -> RecordWriter {
        RecordWriter {
            out: Vec::new(),
            record: Vec::new(),
            record_number: 0,
            sweep_number: 0,
        }
    }

    fn begin_sweep(&mut self, sweep_number: u16) {
        self.flush_record();
        self.sweep_number = sweep_number;
        self.open_record();
    }

    fn open_record(&mut self) {
        let bhdr = RawProdBhdr {
            record_number: self.record_number,
            sweep_number: self.sweep_number,
            first_ray_offset: RAW_PROD_BHDR_SIZE as u16,
            flags: 0,
            reserved: [0; 4],
        };
        self.record = Vec::with_capacity(RECORD_SIZE);
        bhdr.write_to(&mut self.record).unwrap();
        self.record_number += 1;
    }

    fn write(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.record.is_empty() {
                self.open_record();
            }
            let room = RECORD_SIZE - self.record.len();
            let take = room.min(bytes.len());
            self.record.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.record.len() == RECORD_SIZE {
                self.flush_record();
            }
        }
    }

    fn flush_record(&mut self) {
        if !self.record.is_empty() {
            self.record.resize(RECORD_SIZE, 0);
            self.out.extend_from_slice(&self.record);
            self.record = Vec::new();
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.flush_record();
        self.out
    }
}
