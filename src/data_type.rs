//! The IRIS measurement dictionary.
//!
//! Every measurement a raw product file can carry is one of a fixed set of
//! data types, named by its bit position in the task configuration's data
//! mask. The decoder never branches on a concrete type: it asks a
//! [DataType] for its storage width, hands storage bytes back for physical
//! conversion, and leaves the formulas in the table here.
//!
//! Slot zero is the extended ray header, a pseudo-type that carries per-ray
//! timing rather than a measurement.

use crate::mask::{DataMask, EXTENDED_HEADER_BIT};
use crate::raw::IngestHeader;
use crate::{Error, Result};
use std::fmt;

/// The number of registered data types.
pub const NUM_TYPES: usize = DESCRIPTORS.len();

/// Storage width of one bin, in bits or whole bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatumWidth {
    /// The bin occupies this many bits, packed LSB-first.
    Bits(u32),
    /// The bin occupies this many bytes.
    Bytes(u32),
}

impl DatumWidth {
    /// The number of storage bytes `bins` bins occupy.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigmet::data_type::DatumWidth;
    /// assert_eq!(6, DatumWidth::Bytes(2).bytes_for_bins(3));
    /// assert_eq!(2, DatumWidth::Bits(1).bytes_for_bins(9));
    /// ```
    pub fn bytes_for_bins(&self, bins: usize) -> usize {
        match *self {
            DatumWidth::Bits(bits) => (bins * bits as usize).div_ceil(8),
            DatumWidth::Bytes(bytes) => bins * bytes as usize,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Width {
    Bits1,
    Bytes1,
    Bytes2,
    Bytes4,
    /// Width of the extended ray header's storage words, set by the task
    /// configuration.
    Xhdr,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Conversion {
    /// The extended ray header; not a measurement.
    None,
    /// The storage value as-is.
    Identity,
    /// A one-bit flag per bin.
    Flag,
    /// `(n - offset) × scale`.
    Linear { scale: f32, offset: f32 },
    /// `(n - 128) / 127 × Nyquist velocity`.
    NyquistScaled,
    /// `n / 256 × Nyquist velocity`.
    NyquistWidth,
    /// `sqrt((n - 1) / 253)`.
    RootQuality,
    /// `(n - 1) / 65533`.
    WideQuality,
    /// Wavelength-scaled exponential specific differential phase.
    ExponentialKdp,
    /// IEEE bits.
    Float32,
    /// Class codes; zero is reserved.
    Class,
}

struct Descriptor {
    bit: u16,
    abbrev: &'static str,
    description: &'static str,
    width: Width,
    conversion: Conversion,
}

const DB_BYTE: Conversion = Conversion::Linear {
    scale: 0.5,
    offset: 64.0,
};
const DB_WORD: Conversion = Conversion::Linear {
    scale: 0.01,
    offset: 32768.0,
};
const ZDR_BYTE: Conversion = Conversion::Linear {
    scale: 0.0625,
    offset: 128.0,
};
const PHASE_BYTE: Conversion = Conversion::Linear {
    scale: 0.708_661_4,
    offset: 1.0,
};
const PHASE_WORD: Conversion = Conversion::Linear {
    scale: 0.005_493_5,
    offset: 1.0,
};
const LDR_BYTE: Conversion = Conversion::Linear {
    scale: 0.166_666_67,
    offset: 250.0,
};
const RATE_WORD: Conversion = Conversion::Linear {
    scale: 0.01,
    offset: 0.0,
};
const DEPTH_WORD: Conversion = Conversion::Linear {
    scale: 0.001,
    offset: 0.0,
};

const DESCRIPTORS: &[Descriptor] = &[
    Descriptor { bit: 0, abbrev: "DB_XHDR", description: "Extended ray headers", width: Width::Xhdr, conversion: Conversion::None },
    Descriptor { bit: 1, abbrev: "DB_DBT", description: "Total power", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 2, abbrev: "DB_DBZ", description: "Reflectivity", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 3, abbrev: "DB_VEL", description: "Radial velocity", width: Width::Bytes1, conversion: Conversion::NyquistScaled },
    Descriptor { bit: 4, abbrev: "DB_WIDTH", description: "Spectrum width", width: Width::Bytes1, conversion: Conversion::NyquistWidth },
    Descriptor { bit: 5, abbrev: "DB_ZDR", description: "Differential reflectivity", width: Width::Bytes1, conversion: ZDR_BYTE },
    Descriptor { bit: 6, abbrev: "DB_ORAIN", description: "Rainfall rate (legacy)", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.1, offset: 0.0 } },
    Descriptor { bit: 7, abbrev: "DB_DBZC", description: "Corrected reflectivity", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 8, abbrev: "DB_DBT2", description: "Total power", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 9, abbrev: "DB_DBZ2", description: "Reflectivity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 10, abbrev: "DB_VEL2", description: "Radial velocity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 11, abbrev: "DB_WIDTH2", description: "Spectrum width", width: Width::Bytes2, conversion: RATE_WORD },
    Descriptor { bit: 12, abbrev: "DB_ZDR2", description: "Differential reflectivity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 13, abbrev: "DB_RAINRATE2", description: "Rainfall rate", width: Width::Bytes2, conversion: RATE_WORD },
    Descriptor { bit: 14, abbrev: "DB_KDP", description: "Specific differential phase", width: Width::Bytes1, conversion: Conversion::ExponentialKdp },
    Descriptor { bit: 15, abbrev: "DB_KDP2", description: "Specific differential phase", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 16, abbrev: "DB_PHIDP", description: "Differential phase", width: Width::Bytes1, conversion: PHASE_BYTE },
    Descriptor { bit: 17, abbrev: "DB_VELC", description: "Unfolded radial velocity", width: Width::Bytes1, conversion: Conversion::NyquistScaled },
    Descriptor { bit: 18, abbrev: "DB_SQI", description: "Signal quality index", width: Width::Bytes1, conversion: Conversion::RootQuality },
    Descriptor { bit: 19, abbrev: "DB_RHOHV", description: "Copolar correlation", width: Width::Bytes1, conversion: Conversion::RootQuality },
    Descriptor { bit: 20, abbrev: "DB_RHOHV2", description: "Copolar correlation", width: Width::Bytes2, conversion: Conversion::WideQuality },
    Descriptor { bit: 21, abbrev: "DB_DBZC2", description: "Corrected reflectivity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 22, abbrev: "DB_VELC2", description: "Unfolded radial velocity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 23, abbrev: "DB_SQI2", description: "Signal quality index", width: Width::Bytes2, conversion: Conversion::WideQuality },
    Descriptor { bit: 24, abbrev: "DB_PHIDP2", description: "Differential phase", width: Width::Bytes2, conversion: PHASE_WORD },
    Descriptor { bit: 25, abbrev: "DB_LDRH", description: "Linear depolarization ratio H", width: Width::Bytes1, conversion: LDR_BYTE },
    Descriptor { bit: 26, abbrev: "DB_LDRH2", description: "Linear depolarization ratio H", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 27, abbrev: "DB_LDRV", description: "Linear depolarization ratio V", width: Width::Bytes1, conversion: LDR_BYTE },
    Descriptor { bit: 28, abbrev: "DB_LDRV2", description: "Linear depolarization ratio V", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 29, abbrev: "DB_FLAGS", description: "Threshold flags", width: Width::Bits1, conversion: Conversion::Flag },
    Descriptor { bit: 30, abbrev: "DB_FLAGS2", description: "Threshold flags", width: Width::Bytes2, conversion: Conversion::Identity },
    Descriptor { bit: 31, abbrev: "DB_FLOAT32", description: "Floating point", width: Width::Bytes4, conversion: Conversion::Float32 },
    Descriptor { bit: 32, abbrev: "DB_HEIGHT", description: "Echo height", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.1, offset: 1.0 } },
    Descriptor { bit: 33, abbrev: "DB_VIL2", description: "Vertically integrated liquid", width: Width::Bytes2, conversion: DEPTH_WORD },
    Descriptor { bit: 34, abbrev: "DB_NULL", description: "Unused slot", width: Width::Bytes1, conversion: Conversion::Identity },
    Descriptor { bit: 35, abbrev: "DB_SHEAR", description: "Wind shear", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.2, offset: 128.0 } },
    Descriptor { bit: 36, abbrev: "DB_DIVERGE2", description: "Divergence", width: Width::Bytes2, conversion: Conversion::Linear { scale: 0.001, offset: 32768.0 } },
    Descriptor { bit: 37, abbrev: "DB_FLIQUID2", description: "Floated liquid", width: Width::Bytes2, conversion: DEPTH_WORD },
    Descriptor { bit: 38, abbrev: "DB_USER", description: "User defined", width: Width::Bytes1, conversion: Conversion::Identity },
    Descriptor { bit: 39, abbrev: "DB_OTHER", description: "Unspecified", width: Width::Bytes1, conversion: Conversion::Identity },
    Descriptor { bit: 40, abbrev: "DB_DEFLECT2", description: "Deflection", width: Width::Bytes2, conversion: Conversion::Linear { scale: 0.001, offset: 32768.0 } },
    Descriptor { bit: 41, abbrev: "DB_VVEL2", description: "Vertical velocity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 42, abbrev: "DB_HVEL2", description: "Horizontal velocity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 43, abbrev: "DB_HDIR2", description: "Horizontal wind direction", width: Width::Bytes2, conversion: Conversion::Linear { scale: 0.1, offset: 0.0 } },
    Descriptor { bit: 44, abbrev: "DB_AXDIL2", description: "Axis of dilation", width: Width::Bytes2, conversion: Conversion::Linear { scale: 0.1, offset: 0.0 } },
    Descriptor { bit: 45, abbrev: "DB_TIME2", description: "Time in seconds", width: Width::Bytes2, conversion: Conversion::Identity },
    Descriptor { bit: 46, abbrev: "DB_RHOH", description: "Horizontal correlation", width: Width::Bytes1, conversion: Conversion::RootQuality },
    Descriptor { bit: 47, abbrev: "DB_RHOH2", description: "Horizontal correlation", width: Width::Bytes2, conversion: Conversion::WideQuality },
    Descriptor { bit: 48, abbrev: "DB_RHOV", description: "Vertical correlation", width: Width::Bytes1, conversion: Conversion::RootQuality },
    Descriptor { bit: 49, abbrev: "DB_RHOV2", description: "Vertical correlation", width: Width::Bytes2, conversion: Conversion::WideQuality },
    Descriptor { bit: 50, abbrev: "DB_PHIH", description: "Horizontal phase", width: Width::Bytes1, conversion: PHASE_BYTE },
    Descriptor { bit: 51, abbrev: "DB_PHIH2", description: "Horizontal phase", width: Width::Bytes2, conversion: PHASE_WORD },
    Descriptor { bit: 52, abbrev: "DB_PHIV", description: "Vertical phase", width: Width::Bytes1, conversion: PHASE_BYTE },
    Descriptor { bit: 53, abbrev: "DB_PHIV2", description: "Vertical phase", width: Width::Bytes2, conversion: PHASE_WORD },
    Descriptor { bit: 54, abbrev: "DB_USER2", description: "User defined", width: Width::Bytes2, conversion: Conversion::Identity },
    Descriptor { bit: 55, abbrev: "DB_HCLASS", description: "Hydrometeor class", width: Width::Bytes1, conversion: Conversion::Class },
    Descriptor { bit: 56, abbrev: "DB_HCLASS2", description: "Hydrometeor class", width: Width::Bytes2, conversion: Conversion::Class },
    Descriptor { bit: 57, abbrev: "DB_ZDRC", description: "Corrected differential reflectivity", width: Width::Bytes1, conversion: ZDR_BYTE },
    Descriptor { bit: 58, abbrev: "DB_ZDRC2", description: "Corrected differential reflectivity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 59, abbrev: "DB_TEMPERATURE16", description: "Temperature", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 60, abbrev: "DB_VIR16", description: "Vertically integrated reflectivity", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 61, abbrev: "DB_DBTV8", description: "Total power vertical", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 62, abbrev: "DB_DBTV16", description: "Total power vertical", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 63, abbrev: "DB_DBZV8", description: "Reflectivity vertical", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 64, abbrev: "DB_DBZV16", description: "Reflectivity vertical", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 65, abbrev: "DB_SNR8", description: "Signal-to-noise ratio", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 66, abbrev: "DB_SNR16", description: "Signal-to-noise ratio", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 67, abbrev: "DB_ALBEDO8", description: "Albedo", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.5, offset: 0.0 } },
    Descriptor { bit: 68, abbrev: "DB_ALBEDO16", description: "Albedo", width: Width::Bytes2, conversion: RATE_WORD },
    Descriptor { bit: 69, abbrev: "DB_VILD16", description: "VIL density", width: Width::Bytes2, conversion: DEPTH_WORD },
    Descriptor { bit: 70, abbrev: "DB_TURB16", description: "Turbulence", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 71, abbrev: "DB_DBTE8", description: "Total power enhanced", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 72, abbrev: "DB_DBTE16", description: "Total power enhanced", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 73, abbrev: "DB_DBZE8", description: "Reflectivity enhanced", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 74, abbrev: "DB_DBZE16", description: "Reflectivity enhanced", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 75, abbrev: "DB_POLSIG", description: "Polarimetric meteo signature", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 76, abbrev: "DB_LOG8", description: "Log receiver signal", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 77, abbrev: "DB_LOG16", description: "Log receiver signal", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 78, abbrev: "DB_CSP8", description: "Clutter-to-signal power", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 79, abbrev: "DB_CSP16", description: "Clutter-to-signal power", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 80, abbrev: "DB_CCOR8", description: "Clutter correction", width: Width::Bytes1, conversion: DB_BYTE },
    Descriptor { bit: 81, abbrev: "DB_CCOR16", description: "Clutter correction", width: Width::Bytes2, conversion: DB_WORD },
    Descriptor { bit: 82, abbrev: "DB_AH8", description: "Specific attenuation H", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.1, offset: 0.0 } },
    Descriptor { bit: 83, abbrev: "DB_AH16", description: "Specific attenuation H", width: Width::Bytes2, conversion: RATE_WORD },
    Descriptor { bit: 84, abbrev: "DB_AV8", description: "Specific attenuation V", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.1, offset: 0.0 } },
    Descriptor { bit: 85, abbrev: "DB_AV16", description: "Specific attenuation V", width: Width::Bytes2, conversion: RATE_WORD },
    Descriptor { bit: 86, abbrev: "DB_AZDR8", description: "Specific differential attenuation", width: Width::Bytes1, conversion: Conversion::Linear { scale: 0.1, offset: 0.0 } },
    Descriptor { bit: 87, abbrev: "DB_AZDR16", description: "Specific differential attenuation", width: Width::Bytes2, conversion: RATE_WORD },
];

/// One entry of the measurement dictionary, named by its mask bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataType(u16);

impl DataType {
    /// Looks a type up by its mask bit position.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigmet::DataType;
    /// assert_eq!("DB_DBZ", DataType::from_bit(2).unwrap().abbrev());
    /// assert!(DataType::from_bit(150).is_none());
    /// ```
    pub fn from_bit(bit: u16) -> Option<DataType> {
        DESCRIPTORS
            .binary_search_by_key(&bit, |descriptor| descriptor.bit)
            .ok()
            .map(|_| DataType(bit))
    }

    /// Looks a type up by abbreviation, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigmet::DataType;
    /// assert!(DataType::from_abbrev("DB_VEL").is_some());
    /// assert!(DataType::from_abbrev("db_vel").is_some());
    /// assert!(DataType::from_abbrev("DB_BOGUS").is_none());
    /// ```
    pub fn from_abbrev(abbrev: &str) -> Option<DataType> {
        DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.abbrev.eq_ignore_ascii_case(abbrev))
            .map(|descriptor| DataType(descriptor.bit))
    }

    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTORS[DESCRIPTORS
            .binary_search_by_key(&self.0, |descriptor| descriptor.bit)
            .unwrap_or(0)]
    }

    /// This type's mask bit position.
    pub fn bit(&self) -> u16 {
        self.0
    }

    /// This type's abbreviation, e.g. `"DB_DBZ"`.
    pub fn abbrev(&self) -> &'static str {
        self.descriptor().abbrev
    }

    /// A short description of the measurement.
    pub fn description(&self) -> &'static str {
        self.descriptor().description
    }

    /// True for the extended-ray-header pseudo-type.
    pub fn is_extended_header(&self) -> bool {
        self.0 == EXTENDED_HEADER_BIT
    }

    /// The storage width of one bin under the given configuration.
    pub fn datum_width(&self, ingest: &IngestHeader) -> DatumWidth {
        match self.descriptor().width {
            Width::Bits1 => DatumWidth::Bits(1),
            Width::Bytes1 => DatumWidth::Bytes(1),
            Width::Bytes2 => DatumWidth::Bytes(2),
            Width::Bytes4 => DatumWidth::Bytes(4),
            Width::Xhdr => {
                if ingest.task.dsp.data_mask.extended_header_type == 1 {
                    DatumWidth::Bytes(4)
                } else {
                    DatumWidth::Bytes(2)
                }
            }
        }
    }

    /// The largest number of storage bytes one ray of this type can hold.
    pub fn max_ray_data_size(&self, ingest: &IngestHeader) -> usize {
        self.datum_width(ingest)
            .bytes_for_bins(usize::from(ingest.task.range.num_bins_out))
    }

    /// Converts storage-form bins to physical values.
    ///
    /// One value is produced per slot of `out`; storage the ray does not
    /// cover, and storage values outside the type's valid range, come out
    /// as NaN.
    pub fn storage_to_value(&self, ingest: &IngestHeader, storage: &[u8], out: &mut [f32]) {
        let width = self.datum_width(ingest);
        for (bin, value) in out.iter_mut().enumerate() {
            *value = match self.storage_bin(width, storage, bin) {
                Some(n) => self.convert(ingest, n, width),
                None => f32::NAN,
            };
        }
    }

    /// Applies this type's correction pass to already-converted values.
    ///
    /// Reflectivity and total-power families get the task's calibration
    /// offset; other types are returned unchanged.
    pub fn correct_values(&self, ingest: &IngestHeader, values: &mut [f32]) {
        let abbrev = self.abbrev();
        if !abbrev.contains("DBZ") && !abbrev.contains("DBT") {
            return;
        }
        let offset = f32::from(ingest.task.calibration.calibration_reflectivity) / 16.0;
        for value in values.iter_mut() {
            if value.is_finite() {
                *value += offset;
            }
        }
    }

    /// Formats one physical value the way the print tools do.
    pub fn format_value(&self, value: f32) -> String {
        if value.is_nan() {
            return format!("{:>8}", "nodat");
        }
        let precision = match self.descriptor().conversion {
            Conversion::None | Conversion::Identity | Conversion::Flag | Conversion::Class => 0,
            Conversion::Linear { scale, .. } => {
                if scale >= 0.25 {
                    1
                } else {
                    2
                }
            }
            Conversion::NyquistScaled | Conversion::NyquistWidth => 2,
            Conversion::RootQuality
            | Conversion::WideQuality
            | Conversion::ExponentialKdp
            | Conversion::Float32 => 3,
        };
        format!("{:8.*}", precision, value)
    }

    fn storage_bin(&self, width: DatumWidth, storage: &[u8], bin: usize) -> Option<u32> {
        match width {
            DatumWidth::Bits(bits) => {
                let bits = bits as usize;
                let bit_index = bin * bits;
                if bits > 32 || bit_index + bits > storage.len() * 8 {
                    return None;
                }
                let mut out = [0u8; 4];
                crate::bits::copy_bits_right_packed(storage, bit_index, bits, &mut out);
                Some(u32::from_le_bytes(out))
            }
            DatumWidth::Bytes(1) => storage.get(bin).map(|&n| u32::from(n)),
            DatumWidth::Bytes(2) => {
                let bytes = storage.get(bin * 2..bin * 2 + 2)?;
                Some(u32::from(u16::from_le_bytes([bytes[0], bytes[1]])))
            }
            DatumWidth::Bytes(_) => {
                let bytes = storage.get(bin * 4..bin * 4 + 4)?;
                Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        }
    }

    fn convert(&self, ingest: &IngestHeader, n: u32, width: DatumWidth) -> f32 {
        // Zero always marks missing data; the all-ones value is reserved
        // only where the format gives it no physical meaning.
        let zero = n == 0;
        let top = match width {
            DatumWidth::Bytes(2) => n == 0xFFFF,
            DatumWidth::Bytes(1) => n == 0xFF,
            _ => false,
        };
        match self.descriptor().conversion {
            Conversion::None => f32::NAN,
            Conversion::Identity => n as f32,
            Conversion::Flag => n as f32,
            Conversion::Float32 => f32::from_bits(n),
            Conversion::Linear { scale, offset } => {
                if zero || top {
                    f32::NAN
                } else {
                    (n as f32 - offset) * scale
                }
            }
            Conversion::NyquistScaled => {
                if zero {
                    f32::NAN
                } else {
                    (n as f32 - 128.0) / 127.0 * ingest.nyquist_velocity() as f32
                }
            }
            Conversion::NyquistWidth => {
                if zero {
                    f32::NAN
                } else {
                    n as f32 / 256.0 * ingest.nyquist_velocity() as f32
                }
            }
            Conversion::RootQuality => {
                if zero {
                    f32::NAN
                } else {
                    ((n as f32 - 1.0) / 253.0).sqrt()
                }
            }
            Conversion::WideQuality => {
                if zero {
                    f32::NAN
                } else {
                    (n as f32 - 1.0) / 65533.0
                }
            }
            Conversion::ExponentialKdp => {
                if zero || top {
                    return f32::NAN;
                }
                let wavelength_cm = {
                    let cm = ingest.task.misc.wavelength_hundredths_cm as f32 / 100.0;
                    if cm > 0.0 {
                        cm
                    } else {
                        10.0
                    }
                };
                let scaled = |exponent: f32| 0.25 * 600f32.powf(exponent / 126.0) * 10.0 / wavelength_cm;
                match n.cmp(&128) {
                    std::cmp::Ordering::Less => -scaled(127.0 - n as f32),
                    std::cmp::Ordering::Equal => 0.0,
                    std::cmp::Ordering::Greater => scaled(n as f32 - 129.0),
                }
            }
            Conversion::Class => {
                if n == 0 {
                    f32::NAN
                } else {
                    n as f32
                }
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// Enumerates the data mask into an ordered list of types.
///
/// Bits are visited in ascending order, so the extended-header slot, when
/// flagged, lands at index zero. Unknown bits are logged and skipped, or
/// fatal when `strict` is set.
pub fn types_from_mask(mask: &DataMask, strict: bool) -> Result<Vec<DataType>> {
    let mut types = Vec::new();
    for bit in mask.iter() {
        match DataType::from_bit(bit) {
            Some(data_type) => types.push(data_type),
            None if strict => return Err(Error::UnknownDataType(bit)),
            None => log::warn!("skipping unknown data type bit {}", bit),
        }
    }
    Ok(types)
}
