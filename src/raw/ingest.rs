//! The ingest header, the second record of a raw product file.
//!
//! The ingest header carries file-level bookkeeping plus the full task
//! configuration: the schedule, signal-processor setup (including the data
//! mask), calibration, range layout, scan geometry, and assorted site
//! parameters the task ran with.

use crate::mask::DataMask;
use crate::raw::{self, StructureHeader, INGEST_HEADER_ID, MAX_SWEEPS, TASK_CONFIGURATION_ID};
use crate::{Result, TimeZoneSpec, Ymds};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// How the antenna was driven during the task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Sector PPI scan.
    #[default]
    PpiSector,
    /// RHI scan.
    Rhi,
    /// Manual antenna control.
    Manual,
    /// Continuous (full-circle) PPI scan.
    PpiContinuous,
    /// Data replayed from a file.
    File,
    /// A code this library does not know.
    Unknown(u16),
}

impl From<u16> for ScanMode {
    fn from(code: u16) -> ScanMode {
        match code {
            1 => ScanMode::PpiSector,
            2 => ScanMode::Rhi,
            3 => ScanMode::Manual,
            4 => ScanMode::PpiContinuous,
            5 => ScanMode::File,
            code => ScanMode::Unknown(code),
        }
    }
}

impl From<ScanMode> for u16 {
    fn from(mode: ScanMode) -> u16 {
        match mode {
            ScanMode::PpiSector => 1,
            ScanMode::Rhi => 2,
            ScanMode::Manual => 3,
            ScanMode::PpiContinuous => 4,
            ScanMode::File => 5,
            ScanMode::Unknown(code) => code,
        }
    }
}

/// File-level bookkeeping for the ingest that produced the volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestConfiguration {
    /// Name of the ingest file on the IRIS host.
    pub file_name: [u8; 80],
    /// Number of sweeps completed when the file was written.
    pub num_sweeps_completed: u16,
    /// Total size of all files for this ingest, bytes.
    pub file_size_bytes: i32,
    /// Time the volume scan started.
    pub volume_start_time: Ymds,
    /// Size of each ray header in the ray stream, bytes.
    pub ray_header_size: u16,
    /// Number of rays in each sweep.
    pub num_rays_per_sweep: u16,
    /// IRIS version that wrote the file.
    pub iris_version: [u8; 8],
    /// Minutes west of UTC of the radar's local time zone.
    pub time_zone_minutes_west: i16,
    /// Name of the radar's local time zone.
    pub time_zone_name: [u8; 8],
    /// Sweep time base: zero for radar-local, one for UTC.
    pub sweep_time_base: u16,
}

impl Default for IngestConfiguration {
    fn default() -> IngestConfiguration {
        IngestConfiguration {
            file_name: [0; 80],
            num_sweeps_completed: 0,
            file_size_bytes: 0,
            volume_start_time: Ymds::default(),
            ray_header_size: raw::RAY_HEADER_SIZE as u16,
            num_rays_per_sweep: 0,
            iris_version: [0; 8],
            time_zone_minutes_west: 0,
            time_zone_name: [0; 8],
            sweep_time_base: 1,
        }
    }
}

impl IngestConfiguration {
    fn read_from<R: Read>(read: &mut R) -> Result<IngestConfiguration> {
        let mut file_name = [0; 80];
        read.read_exact(&mut file_name)?;
        let num_sweeps_completed = read.read_u16::<LittleEndian>()?;
        let file_size_bytes = read.read_i32::<LittleEndian>()?;
        let volume_start_time = Ymds::read_from(read)?;
        let ray_header_size = read.read_u16::<LittleEndian>()?;
        let num_rays_per_sweep = read.read_u16::<LittleEndian>()?;
        let mut iris_version = [0; 8];
        read.read_exact(&mut iris_version)?;
        let time_zone_minutes_west = read.read_i16::<LittleEndian>()?;
        let mut time_zone_name = [0; 8];
        read.read_exact(&mut time_zone_name)?;
        let sweep_time_base = read.read_u16::<LittleEndian>()?;
        Ok(IngestConfiguration {
            file_name,
            num_sweeps_completed,
            file_size_bytes,
            volume_start_time,
            ray_header_size,
            num_rays_per_sweep,
            iris_version,
            time_zone_minutes_west,
            time_zone_name,
            sweep_time_base,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_all(&self.file_name)?;
        write.write_u16::<LittleEndian>(self.num_sweeps_completed)?;
        write.write_i32::<LittleEndian>(self.file_size_bytes)?;
        self.volume_start_time.write_to(write)?;
        write.write_u16::<LittleEndian>(self.ray_header_size)?;
        write.write_u16::<LittleEndian>(self.num_rays_per_sweep)?;
        write.write_all(&self.iris_version)?;
        write.write_i16::<LittleEndian>(self.time_zone_minutes_west)?;
        write.write_all(&self.time_zone_name)?;
        write.write_u16::<LittleEndian>(self.sweep_time_base)?;
        Ok(())
    }
}

/// When the task ran and how it was scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskScheduleInfo {
    /// Start time, seconds within a day.
    pub start_seconds: i32,
    /// Stop time, seconds within a day.
    pub stop_seconds: i32,
    /// Desired skip between runs, seconds.
    pub skip_seconds: i32,
    /// Time the task last ran.
    pub last_run_time: Ymds,
    /// Schedule flags.
    pub flags: u16,
    /// Reserved.
    pub reserved: u16,
}

impl TaskScheduleInfo {
    fn read_from<R: Read>(read: &mut R) -> Result<TaskScheduleInfo> {
        Ok(TaskScheduleInfo {
            start_seconds: read.read_i32::<LittleEndian>()?,
            stop_seconds: read.read_i32::<LittleEndian>()?,
            skip_seconds: read.read_i32::<LittleEndian>()?,
            last_run_time: Ymds::read_from(read)?,
            flags: read.read_u16::<LittleEndian>()?,
            reserved: read.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_i32::<LittleEndian>(self.start_seconds)?;
        write.write_i32::<LittleEndian>(self.stop_seconds)?;
        write.write_i32::<LittleEndian>(self.skip_seconds)?;
        self.last_run_time.write_to(write)?;
        write.write_u16::<LittleEndian>(self.flags)?;
        write.write_u16::<LittleEndian>(self.reserved)?;
        Ok(())
    }
}

/// Signal-processor setup, including the data mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskDspInfo {
    /// DSP major mode.
    pub major_mode: u16,
    /// DSP hardware type.
    pub dsp_type: u16,
    /// Which data-type slots were recorded.
    pub data_mask: DataMask,
    /// Pulse repetition frequency, hertz.
    pub prf_hertz: i32,
    /// Pulse width, hundredths of a microsecond.
    pub pulse_width_hundredths_us: i32,
    /// Multi-PRF mode flag.
    pub multi_prf_mode: u16,
    /// Dual-PRF ratio code.
    pub dual_prf_ratio: i16,
}

impl TaskDspInfo {
    fn read_from<R: Read>(read: &mut R) -> Result<TaskDspInfo> {
        Ok(TaskDspInfo {
            major_mode: read.read_u16::<LittleEndian>()?,
            dsp_type: read.read_u16::<LittleEndian>()?,
            data_mask: DataMask::read_from(read)?,
            prf_hertz: read.read_i32::<LittleEndian>()?,
            pulse_width_hundredths_us: read.read_i32::<LittleEndian>()?,
            multi_prf_mode: read.read_u16::<LittleEndian>()?,
            dual_prf_ratio: read.read_i16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.major_mode)?;
        write.write_u16::<LittleEndian>(self.dsp_type)?;
        self.data_mask.write_to(write)?;
        write.write_i32::<LittleEndian>(self.prf_hertz)?;
        write.write_i32::<LittleEndian>(self.pulse_width_hundredths_us)?;
        write.write_u16::<LittleEndian>(self.multi_prf_mode)?;
        write.write_i16::<LittleEndian>(self.dual_prf_ratio)?;
        Ok(())
    }
}

/// Receiver calibration at task time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskCalibInfo {
    /// Reflectivity slope, hundredths of dB per A/D count.
    pub reflectivity_slope: i16,
    /// Reflectivity noise threshold, sixteenths of dB above noise.
    pub reflectivity_noise_threshold: i16,
    /// Clutter-correction threshold, sixteenths of dB.
    pub clutter_correction_threshold: i16,
    /// SQI threshold, hundredths.
    pub sqi_threshold: i16,
    /// Power threshold, sixteenths of dBZ.
    pub power_threshold: i16,
    /// Calibration reflectivity offset, sixteenths of dBZ.
    pub calibration_reflectivity: i16,
    /// ZDR bias, sixteenths of dB.
    pub zdr_bias: i16,
    /// Threshold flags.
    pub flags: u16,
    /// Reserved.
    pub reserved: [u8; 4],
}

impl TaskCalibInfo {
    fn read_from<R: Read>(read: &mut R) -> Result<TaskCalibInfo> {
        let reflectivity_slope = read.read_i16::<LittleEndian>()?;
        let reflectivity_noise_threshold = read.read_i16::<LittleEndian>()?;
        let clutter_correction_threshold = read.read_i16::<LittleEndian>()?;
        let sqi_threshold = read.read_i16::<LittleEndian>()?;
        let power_threshold = read.read_i16::<LittleEndian>()?;
        let calibration_reflectivity = read.read_i16::<LittleEndian>()?;
        let zdr_bias = read.read_i16::<LittleEndian>()?;
        let flags = read.read_u16::<LittleEndian>()?;
        let mut reserved = [0; 4];
        read.read_exact(&mut reserved)?;
        Ok(TaskCalibInfo {
            reflectivity_slope,
            reflectivity_noise_threshold,
            clutter_correction_threshold,
            sqi_threshold,
            power_threshold,
            calibration_reflectivity,
            zdr_bias,
            flags,
            reserved,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_i16::<LittleEndian>(self.reflectivity_slope)?;
        write.write_i16::<LittleEndian>(self.reflectivity_noise_threshold)?;
        write.write_i16::<LittleEndian>(self.clutter_correction_threshold)?;
        write.write_i16::<LittleEndian>(self.sqi_threshold)?;
        write.write_i16::<LittleEndian>(self.power_threshold)?;
        write.write_i16::<LittleEndian>(self.calibration_reflectivity)?;
        write.write_i16::<LittleEndian>(self.zdr_bias)?;
        write.write_u16::<LittleEndian>(self.flags)?;
        write.write_all(&self.reserved)?;
        Ok(())
    }
}

/// Range-bin layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskRangeInfo {
    /// Range to the first bin, centimeters.
    pub first_bin_cm: i32,
    /// Range to the last bin, centimeters.
    pub last_bin_cm: i32,
    /// Number of input bins.
    pub num_bins_in: u16,
    /// Number of output bins.
    pub num_bins_out: u16,
    /// Step between input bins, centimeters.
    pub input_step_cm: i32,
    /// Step between output bins, centimeters.
    pub output_step_cm: i32,
    /// Range-averaging flags.
    pub averaging_flags: u16,
    /// Reserved.
    pub reserved: u16,
}

impl TaskRangeInfo {
    fn read_from<R: Read>(read: &mut R) -> Result<TaskRangeInfo> {
        Ok(TaskRangeInfo {
            first_bin_cm: read.read_i32::<LittleEndian>()?,
            last_bin_cm: read.read_i32::<LittleEndian>()?,
            num_bins_in: read.read_u16::<LittleEndian>()?,
            num_bins_out: read.read_u16::<LittleEndian>()?,
            input_step_cm: read.read_i32::<LittleEndian>()?,
            output_step_cm: read.read_i32::<LittleEndian>()?,
            averaging_flags: read.read_u16::<LittleEndian>()?,
            reserved: read.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_i32::<LittleEndian>(self.first_bin_cm)?;
        write.write_i32::<LittleEndian>(self.last_bin_cm)?;
        write.write_u16::<LittleEndian>(self.num_bins_in)?;
        write.write_u16::<LittleEndian>(self.num_bins_out)?;
        write.write_i32::<LittleEndian>(self.input_step_cm)?;
        write.write_i32::<LittleEndian>(self.output_step_cm)?;
        write.write_u16::<LittleEndian>(self.averaging_flags)?;
        write.write_u16::<LittleEndian>(self.reserved)?;
        Ok(())
    }
}

/// Scan geometry: the mode and the per-sweep fixed angles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskScanInfo {
    /// Scan mode code; see [ScanMode].
    pub scan_mode: u16,
    /// Desired angular resolution, thousandths of a degree.
    pub angular_resolution: u16,
    /// Number of sweeps in the task.
    pub num_sweeps: u16,
    /// Reserved.
    pub reserved: u16,
    /// Fixed angle for each sweep as a 16-bit binary angle; elevations for
    /// PPI modes, azimuths for RHI.
    pub fixed_angles: [u16; MAX_SWEEPS],
}

impl Default for TaskScanInfo {
    fn default() -> TaskScanInfo {
        TaskScanInfo {
            scan_mode: u16::from(ScanMode::PpiContinuous),
            angular_resolution: 1000,
            num_sweeps: 0,
            reserved: 0,
            fixed_angles: [0; MAX_SWEEPS],
        }
    }
}

impl TaskScanInfo {
    /// The scan mode as an enum.
    pub fn mode(&self) -> ScanMode {
        ScanMode::from(self.scan_mode)
    }

    fn read_from<R: Read>(read: &mut R) -> Result<TaskScanInfo> {
        let scan_mode = read.read_u16::<LittleEndian>()?;
        let angular_resolution = read.read_u16::<LittleEndian>()?;
        let num_sweeps = read.read_u16::<LittleEndian>()?;
        let reserved = read.read_u16::<LittleEndian>()?;
        let mut fixed_angles = [0u16; MAX_SWEEPS];
        for angle in &mut fixed_angles {
            *angle = read.read_u16::<LittleEndian>()?;
        }
        Ok(TaskScanInfo {
            scan_mode,
            angular_resolution,
            num_sweeps,
            reserved,
            fixed_angles,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.scan_mode)?;
        write.write_u16::<LittleEndian>(self.angular_resolution)?;
        write.write_u16::<LittleEndian>(self.num_sweeps)?;
        write.write_u16::<LittleEndian>(self.reserved)?;
        for angle in &self.fixed_angles {
            write.write_u16::<LittleEndian>(*angle)?;
        }
        Ok(())
    }
}

/// Miscellaneous task parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskMiscInfo {
    /// Wavelength, hundredths of a centimeter.
    pub wavelength_hundredths_cm: i32,
    /// Transmit power, watts.
    pub transmit_power_watts: i32,
    /// Polarization code.
    pub polarization: u16,
    /// Truncation height, centimeters above the radar.
    pub truncation_height_cm: i32,
    /// Reserved.
    pub reserved: u16,
}

impl TaskMiscInfo {
    fn read_from<R: Read>(read: &mut R) -> Result<TaskMiscInfo> {
        Ok(TaskMiscInfo {
            wavelength_hundredths_cm: read.read_i32::<LittleEndian>()?,
            transmit_power_watts: read.read_i32::<LittleEndian>()?,
            polarization: read.read_u16::<LittleEndian>()?,
            truncation_height_cm: read.read_i32::<LittleEndian>()?,
            reserved: read.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_i32::<LittleEndian>(self.wavelength_hundredths_cm)?;
        write.write_i32::<LittleEndian>(self.transmit_power_watts)?;
        write.write_u16::<LittleEndian>(self.polarization)?;
        write.write_i32::<LittleEndian>(self.truncation_height_cm)?;
        write.write_u16::<LittleEndian>(self.reserved)?;
        Ok(())
    }
}

/// Task identification and state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskEndInfo {
    /// Task major number.
    pub major_number: u16,
    /// Task minor number.
    pub minor_number: u16,
    /// Task name.
    pub task_name: [u8; 12],
    /// Task state code.
    pub state: u16,
    /// Reserved.
    pub reserved: u16,
    /// Time the task configuration was last modified.
    pub modify_time: Ymds,
}

impl TaskEndInfo {
    fn read_from<R: Read>(read: &mut R) -> Result<TaskEndInfo> {
        let major_number = read.read_u16::<LittleEndian>()?;
        let minor_number = read.read_u16::<LittleEndian>()?;
        let mut task_name = [0; 12];
        read.read_exact(&mut task_name)?;
        Ok(TaskEndInfo {
            major_number,
            minor_number,
            task_name,
            state: read.read_u16::<LittleEndian>()?,
            reserved: read.read_u16::<LittleEndian>()?,
            modify_time: Ymds::read_from(read)?,
        })
    }

    fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.major_number)?;
        write.write_u16::<LittleEndian>(self.minor_number)?;
        write.write_all(&self.task_name)?;
        write.write_u16::<LittleEndian>(self.state)?;
        write.write_u16::<LittleEndian>(self.reserved)?;
        self.modify_time.write_to(write)
    }
}

/// The full task configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskConfiguration {
    /// The structure header, id [TASK_CONFIGURATION_ID].
    pub structure: StructureHeader,
    /// Scheduling.
    pub schedule: TaskScheduleInfo,
    /// Signal-processor setup.
    pub dsp: TaskDspInfo,
    /// Calibration.
    pub calibration: TaskCalibInfo,
    /// Range-bin layout.
    pub range: TaskRangeInfo,
    /// Scan geometry.
    pub scan: TaskScanInfo,
    /// Miscellaneous parameters.
    pub misc: TaskMiscInfo,
    /// Identification and state.
    pub end: TaskEndInfo,
}

impl TaskConfiguration {
    /// Reads a task configuration, checking the structure id.
    pub fn read_from<R: Read>(read: &mut R) -> Result<TaskConfiguration> {
        let structure = StructureHeader::read_from(read)?;
        structure.expect_id(TASK_CONFIGURATION_ID, "task configuration")?;
        Ok(TaskConfiguration {
            structure,
            schedule: TaskScheduleInfo::read_from(read)?,
            dsp: TaskDspInfo::read_from(read)?,
            calibration: TaskCalibInfo::read_from(read)?,
            range: TaskRangeInfo::read_from(read)?,
            scan: TaskScanInfo::read_from(read)?,
            misc: TaskMiscInfo::read_from(read)?,
            end: TaskEndInfo::read_from(read)?,
        })
    }

    /// Writes this task configuration.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        self.structure.write_to(write)?;
        self.schedule.write_to(write)?;
        self.dsp.write_to(write)?;
        self.calibration.write_to(write)?;
        self.range.write_to(write)?;
        self.scan.write_to(write)?;
        self.misc.write_to(write)?;
        self.end.write_to(write)
    }
}

/// The second record of a raw product file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestHeader {
    /// The structure header, id [INGEST_HEADER_ID].
    pub structure: StructureHeader,
    /// File-level bookkeeping.
    pub configuration: IngestConfiguration,
    /// The task configuration the data was acquired with.
    pub task: TaskConfiguration,
}

impl IngestHeader {
    /// Reads an ingest header, checking the structure ids.
    pub fn read_from<R: Read>(read: &mut R) -> Result<IngestHeader> {
        let structure = StructureHeader::read_from(read)?;
        structure.expect_id(INGEST_HEADER_ID, "ingest header")?;
        Ok(IngestHeader {
            structure,
            configuration: IngestConfiguration::read_from(read)?,
            task: TaskConfiguration::read_from(read)?,
        })
    }

    /// Writes this ingest header.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        self.structure.write_to(write)?;
        self.configuration.write_to(write)?;
        self.task.write_to(write)
    }

    /// The radar's local time zone as a wire spec.
    ///
    /// A UTC sweep time base reports UTC regardless of the zone fields.
    pub fn time_zone(&self) -> TimeZoneSpec {
        if self.configuration.sweep_time_base != 0 {
            TimeZoneSpec::from_minutes_east(0)
        } else {
            TimeZoneSpec::from_minutes_east(-i32::from(self.configuration.time_zone_minutes_west))
        }
    }

    /// The Nyquist velocity implied by the PRF and wavelength, m/s.
    ///
    /// Zero when either parameter is missing.
    pub fn nyquist_velocity(&self) -> f64 {
        let wavelength_m = f64::from(self.task.misc.wavelength_hundredths_cm) / 10_000.0;
        let prf = f64::from(self.task.dsp.prf_hertz);
        wavelength_m * prf / 4.0
    }
}
