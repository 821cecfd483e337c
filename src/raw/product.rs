//! The product header, the first record of a raw product file.

use crate::raw::{self, StructureHeader, PRODUCT_HEADER_ID};
use crate::{Result, Ymds};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Identification of the product: what was generated, when, and from which
/// task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProductConfiguration {
    /// Product type code.
    pub product_type: u16,
    /// Scheduling code.
    pub scheduling: u16,
    /// Seconds between product runs.
    pub seconds_between_runs: i32,
    /// Time the product was generated.
    pub generation_time: Ymds,
    /// Time of the ingest the product was generated from.
    pub ingest_time: Ymds,
    /// Name of the product configuration.
    pub product_name: [u8; 12],
    /// Name of the task that acquired the data.
    pub task_name: [u8; 12],
    /// Product flags.
    pub flags: u16,
    /// Projection-specific horizontal scale, cm per pixel.
    pub x_scale: i32,
    /// Projection-specific vertical scale, cm per pixel.
    pub y_scale: i32,
}

impl ProductConfiguration {
    fn read_from<R: Read>(read: &mut R) -> Result<ProductConfiguration> {
        let product_type = read.read_u16::<LittleEndian>()?;
        let scheduling = read.read_u16::<LittleEndian>()?;
        let seconds_between_runs = read.read_i32::<LittleEndian>()?;
        let generation_time = Ymds::read_from(read)?;
        let ingest_time = Ymds::read_from(read)?;
        let mut product_name = [0; 12];
        read.read_exact(&mut product_name)?;
        let mut task_name = [0; 12];
        read.read_exact(&mut task_name)?;
        Ok(ProductConfiguration {
            product_type,
            scheduling,
            seconds_between_runs,
            generation_time,
            ingest_time,
            product_name,
            task_name,
            flags: read.read_u16::<LittleEndian>()?,
            x_scale: read.read_i32::<LittleEndian>()?,
            y_scale: read.read_i32::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.product_type)?;
        write.write_u16::<LittleEndian>(self.scheduling)?;
        write.write_i32::<LittleEndian>(self.seconds_between_runs)?;
        self.generation_time.write_to(write)?;
        self.ingest_time.write_to(write)?;
        write.write_all(&self.product_name)?;
        write.write_all(&self.task_name)?;
        write.write_u16::<LittleEndian>(self.flags)?;
        write.write_i32::<LittleEndian>(self.x_scale)?;
        write.write_i32::<LittleEndian>(self.y_scale)?;
        Ok(())
    }
}

/// The color scale the product was rendered with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorScale {
    /// Color scale flags.
    pub flags: u32,
    /// Storage value of the first level.
    pub starting_level: i32,
    /// Storage step between levels.
    pub level_step: i32,
    /// Number of levels in use.
    pub num_levels: i16,
    /// Reserved.
    pub reserved: i16,
    /// Level codes.
    pub levels: [u16; 16],
}

impl ColorScale {
    fn read_from<R: Read>(read: &mut R) -> Result<ColorScale> {
        let flags = read.read_u32::<LittleEndian>()?;
        let starting_level = read.read_i32::<LittleEndian>()?;
        let level_step = read.read_i32::<LittleEndian>()?;
        let num_levels = read.read_i16::<LittleEndian>()?;
        let reserved = read.read_i16::<LittleEndian>()?;
        let mut levels = [0u16; 16];
        for level in &mut levels {
            *level = read.read_u16::<LittleEndian>()?;
        }
        Ok(ColorScale {
            flags,
            starting_level,
            level_step,
            num_levels,
            reserved,
            levels,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u32::<LittleEndian>(self.flags)?;
        write.write_i32::<LittleEndian>(self.starting_level)?;
        write.write_i32::<LittleEndian>(self.level_step)?;
        write.write_i16::<LittleEndian>(self.num_levels)?;
        write.write_i16::<LittleEndian>(self.reserved)?;
        for level in &self.levels {
            write.write_u16::<LittleEndian>(*level)?;
        }
        Ok(())
    }
}

/// Site and transmitter state at the time the product was made.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProductEnd {
    /// Name of the radar site.
    pub site_name: [u8; 16],
    /// IRIS version that made the product.
    pub iris_version: [u8; 8],
    /// Site latitude as a 32-bit binary angle, north positive.
    pub latitude: u32,
    /// Site longitude as a 32-bit binary angle, east positive.
    pub longitude: u32,
    /// Ground height above sea level, meters.
    pub ground_height_meters: i16,
    /// Radar height above the ground, meters.
    pub radar_height_meters: i16,
    /// Pulse repetition frequency, hertz.
    pub prf_hertz: i32,
    /// Pulse width, hundredths of a microsecond.
    pub pulse_width_hundredths_us: i32,
    /// Wavelength, hundredths of a centimeter.
    pub wavelength_hundredths_cm: i32,
    /// Polarization code.
    pub polarization: u16,
    /// Color scale the product was rendered with.
    pub color_scale: ColorScale,
}

impl ProductEnd {
    fn read_from<R: Read>(read: &mut R) -> Result<ProductEnd> {
        let mut site_name = [0; 16];
        read.read_exact(&mut site_name)?;
        let mut iris_version = [0; 8];
        read.read_exact(&mut iris_version)?;
        Ok(ProductEnd {
            site_name,
            iris_version,
            latitude: read.read_u32::<LittleEndian>()?,
            longitude: read.read_u32::<LittleEndian>()?,
            ground_height_meters: read.read_i16::<LittleEndian>()?,
            radar_height_meters: read.read_i16::<LittleEndian>()?,
            prf_hertz: read.read_i32::<LittleEndian>()?,
            pulse_width_hundredths_us: read.read_i32::<LittleEndian>()?,
            wavelength_hundredths_cm: read.read_i32::<LittleEndian>()?,
            polarization: read.read_u16::<LittleEndian>()?,
            color_scale: ColorScale::read_from(read)?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_all(&self.site_name)?;
        write.write_all(&self.iris_version)?;
        write.write_u32::<LittleEndian>(self.latitude)?;
        write.write_u32::<LittleEndian>(self.longitude)?;
        write.write_i16::<LittleEndian>(self.ground_height_meters)?;
        write.write_i16::<LittleEndian>(self.radar_height_meters)?;
        write.write_i32::<LittleEndian>(self.prf_hertz)?;
        write.write_i32::<LittleEndian>(self.pulse_width_hundredths_us)?;
        write.write_i32::<LittleEndian>(self.wavelength_hundredths_cm)?;
        write.write_u16::<LittleEndian>(self.polarization)?;
        self.color_scale.write_to(write)
    }
}

/// The first record of a raw product file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProductHeader {
    /// The structure header, id [PRODUCT_HEADER_ID].
    pub structure: StructureHeader,
    /// Identification of the product.
    pub configuration: ProductConfiguration,
    /// Site and transmitter state.
    pub end: ProductEnd,
}

impl ProductHeader {
    /// Reads a product header, checking the structure id.
    pub fn read_from<R: Read>(read: &mut R) -> Result<ProductHeader> {
        let structure = StructureHeader::read_from(read)?;
        structure.expect_id(PRODUCT_HEADER_ID, "product header")?;
        Ok(ProductHeader {
            structure,
            configuration: ProductConfiguration::read_from(read)?,
            end: ProductEnd::read_from(read)?,
        })
    }

    /// Writes this product header.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        self.structure.write_to(write)?;
        self.configuration.write_to(write)?;
        self.end.write_to(write)
    }

    /// The task name as text.
    pub fn task_name(&self) -> String {
        raw::text(&self.configuration.task_name)
    }

    /// The site name as text.
    pub fn site_name(&self) -> String {
        raw::text(&self.end.site_name)
    }
}
