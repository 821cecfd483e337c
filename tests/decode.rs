mod common;

use common::{sample_byte, sample_millis, VolumeBuilder};
use sigmet::{DataType, DecodeOptions, Error, Volume};
use std::f64::consts::TAU;
use std::io::Cursor;

#[test]
fn two_sweeps_of_dbz() {
    // 2 sweeps × 4 rays × 3 bins of the one-byte reflectivity type
    let builder = VolumeBuilder::new(2, 4, 3, &[2]);
    let volume = builder.volume();
    assert_eq!(2, volume.num_sweeps());
    assert_eq!(4, volume.num_rays_per_sweep());
    assert_eq!(3, volume.num_bins_out());
    assert_eq!(1, volume.num_types());
    assert_eq!("DB_DBZ", volume.present_types()[0].abbrev());
    assert_eq!(24, volume.samples().len());
    for sweep in 0..2 {
        for ray in 0..4 {
            let entry = volume.ray(sweep, ray, 0).expect("ray is present");
            assert_eq!(3, entry.data_len);
            assert_eq!(3, entry.header.num_bins);
            let samples = volume.ray_samples(entry);
            for bin in 0..3 {
                assert_eq!(sample_byte(sweep, ray, bin), samples[bin]);
            }
        }
    }
    volume.validate().unwrap();
}

#[test]
fn extended_headers_drive_ray_times() {
    let builder = VolumeBuilder::new(1, 4, 3, &[0, 2]);
    let volume = builder.volume();
    assert_eq!(2, volume.num_types());
    assert!(volume.present_types()[0].is_extended_header());
    assert!(!volume.present_types()[1].is_extended_header());
    let sweep_time = volume.sweep_time_seconds(0).unwrap();
    for ray in 0..4 {
        let expected = sweep_time + f64::from(sample_millis(ray)) / 1000.0;
        assert!((volume.ray_time(0, ray) - expected).abs() < 1e-9);
    }
}

#[test]
fn without_extended_headers_ray_times_are_whole_seconds() {
    let builder = VolumeBuilder::new(1, 4, 3, &[2]);
    let volume = builder.volume();
    let sweep_time = volume.sweep_time_seconds(0).unwrap();
    // the builder stamps each ray's offset as its index in seconds
    assert_eq!(sweep_time + 2.0, volume.ray_time(0, 2));
}

#[test]
fn truncation_fails_with_no_partial_volume() {
    let builder = VolumeBuilder::new(2, 4, 3, &[2]);
    let mut bytes = builder.build();
    bytes.truncate(10_000);
    let result = Volume::read_from(&mut Cursor::new(bytes), DecodeOptions::default());
    assert!(matches!(result, Err(Error::TruncatedStream(_))));
}

#[test]
fn truncated_headers_fail() {
    let builder = VolumeBuilder::new(1, 2, 3, &[2]);
    let mut bytes = builder.build();
    bytes.truncate(100);
    assert!(matches!(
        Volume::read_from(&mut Cursor::new(bytes), DecodeOptions::default()),
        Err(Error::TruncatedStream(_))
    ));
}

#[test]
fn absent_rays_are_null_and_zero_filled() {
    let mut builder = VolumeBuilder::new(1, 4, 3, &[2]);
    builder.absent.insert((0, 1));
    let volume = builder.volume();
    assert!(volume.ray(0, 1, 0).is_none());
    assert!(volume.ray(0, 0, 0).is_some());
    let data_type = volume.default_data_type().unwrap();
    let values = volume.sweep_data(data_type, 0, false).unwrap();
    assert_eq!(12, values.len());
    assert_eq!(&[0.0, 0.0, 0.0], &values[3..6]);
    // present rays convert per the one-byte dB formula
    let expected = (f32::from(sample_byte(0, 0, 0)) - 64.0) / 2.0;
    assert_eq!(expected, values[0]);
}

#[test]
fn rays_span_record_boundaries() {
    // 6012-byte rays cannot fit a 6144-byte record once headers and
    // tokens are in; every ray crosses into the next record
    let builder = VolumeBuilder::new(1, 3, 3_000, &[9]);
    let volume = builder.volume();
    assert_eq!(1, volume.num_sweeps());
    for ray in 0..3 {
        let entry = volume.ray(0, ray, 0).expect("ray is present");
        assert_eq!(6_000, entry.data_len);
        let samples = volume.ray_samples(entry);
        let first = u16::from_le_bytes([samples[0], samples[1]]);
        assert_eq!(32_768 + u16::from(sample_byte(0, ray, 0)), first);
    }
    volume.validate().unwrap();
}

#[test]
fn one_bit_type_decodes_through_bit_copy() {
    let builder = VolumeBuilder::new(1, 2, 12, &[2, 29]);
    let volume = builder.volume();
    let flags = DataType::from_abbrev("DB_FLAGS").unwrap();
    assert_eq!(flags, volume.present_types()[1]);
    let entry = volume.ray(0, 0, 1).expect("flags ray is present");
    // twelve one-bit bins pack into two bytes
    assert_eq!(2, entry.data_len);
    let values = volume.sweep_data(flags, 0, false).unwrap();
    for bin in 0..12 {
        let expected = f32::from(sample_byte(0, 0, bin) % 2);
        assert_eq!(expected, values[bin], "bin {}", bin);
    }
}

#[test]
fn fewer_sweeps_in_file_than_declared() {
    let mut builder = VolumeBuilder::new(3, 2, 3, &[2]);
    builder.sweeps_in_file = Some(2);
    let volume = builder.volume();
    assert_eq!(2, volume.num_sweeps());
    volume.validate().unwrap();
}

#[test]
fn unknown_mask_bits_skip_unless_strict() {
    let mut builder = VolumeBuilder::new(1, 2, 3, &[2]);
    builder.type_bits.push(119);
    let bytes = builder.build();
    let volume =
        Volume::read_from(&mut Cursor::new(bytes.clone()), DecodeOptions::default()).unwrap();
    assert_eq!(1, volume.num_types());
    let result = Volume::read_from(&mut Cursor::new(bytes), DecodeOptions { strict: true });
    assert!(matches!(result, Err(Error::UnknownDataType(119))));
}

#[test]
fn zero_bins_is_malformed() {
    let builder = VolumeBuilder::new(1, 2, 0, &[2]);
    assert!(matches!(
        Volume::read_from(&mut Cursor::new(builder.build()), DecodeOptions::default()),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn too_many_sweeps_is_malformed() {
    let mut builder = VolumeBuilder::new(1, 2, 3, &[2]);
    builder.num_sweeps = 41;
    builder.sweeps_in_file = Some(0);
    assert!(matches!(
        Volume::read_from(&mut Cursor::new(builder.build()), DecodeOptions::default()),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn mask_with_no_real_types_is_malformed() {
    let builder = VolumeBuilder::new(1, 2, 3, &[0]);
    assert!(matches!(
        Volume::read_from(&mut Cursor::new(builder.build()), DecodeOptions::default()),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn decoded_volumes_hold_their_invariants() {
    let mut builder = VolumeBuilder::new(3, 5, 7, &[0, 2, 3, 9]);
    builder.absent.insert((1, 2));
    let volume = builder.volume();
    volume.validate().unwrap();
    assert!(volume.num_sweeps() <= 40);
    assert!(volume.num_types() <= 89);
    for sweep in 0..volume.num_sweeps() {
        for ray in 0..volume.num_rays_per_sweep() {
            if let Some(header) = volume.ray_header(sweep, ray) {
                for angle in [
                    header.azimuth_begin,
                    header.azimuth_end,
                    header.tilt_begin,
                    header.tilt_end,
                ] {
                    assert!((0.0..TAU).contains(&angle));
                }
            }
        }
    }
}

#[test]
fn corrected_data_applies_calibration() {
    let mut builder = VolumeBuilder::new(1, 2, 3, &[2]);
    builder.calibration_reflectivity = 32; // 2 dB in sixteenths
    let volume = builder.volume();
    let data_type = volume.default_data_type().unwrap();
    let plain = volume.sweep_data(data_type, 0, false).unwrap();
    let corrected = volume.sweep_data(data_type, 0, true).unwrap();
    for (plain, corrected) in plain.iter().zip(&corrected) {
        assert!((corrected - plain - 2.0).abs() < 1e-6);
    }
}

#[test]
fn sweep_data_rejects_bad_arguments() {
    let builder = VolumeBuilder::new(1, 2, 3, &[2]);
    let volume = builder.volume();
    let data_type = volume.default_data_type().unwrap();
    assert!(matches!(
        volume.sweep_data(data_type, 5, false),
        Err(Error::BadArgument(_))
    ));
    let missing = DataType::from_abbrev("DB_VEL").unwrap();
    assert!(matches!(
        volume.sweep_data(missing, 0, false),
        Err(Error::BadArgument(_))
    ));
}

#[test]
fn wide_ray_headers_cover_all_sweeps() {
    let mut builder = VolumeBuilder::new(2, 3, 4, &[2]);
    builder.absent.insert((0, 2));
    let volume = builder.volume();
    let headers = volume.wide_ray_headers(None).unwrap();
    assert_eq!(6, headers.len());
    assert!(headers[2].time.is_nan());
    assert_eq!(0, headers[2].num_bins);
    assert_eq!(4, headers[3].num_bins);
    let one = volume.wide_ray_headers(Some(1)).unwrap();
    assert_eq!(3, one.len());
    assert_eq!(headers[3..], one[..]);
}
