mod common;

use common::VolumeBuilder;
use sigmet::ipc::wire::{Request, Response, Status, Subcommand, RESPONSE_SIZE};
use sigmet::ipc::{fd, Client, Daemon};
use sigmet::{Error, VolumeHeader, WIDE_RAY_HEADER_SIZE};
use std::fs::File;
use std::io::{Cursor, Read};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread::JoinHandle;

struct RunningDaemon {
    path: PathBuf,
    _dir: tempfile::TempDir,
    handle: JoinHandle<sigmet::Result<()>>,
}

impl RunningDaemon {
    fn start(builder: &VolumeBuilder) -> RunningDaemon {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigmet.sock");
        let daemon = Daemon::bind(&path, builder.volume()).unwrap();
        let handle = std::thread::spawn(move || daemon.serve());
        RunningDaemon {
            path,
            _dir: dir,
            handle,
        }
    }

    fn client(&self) -> Client {
        Client::new(&self.path)
    }

    fn stop(self) {
        self.client().exit().unwrap();
        self.handle.join().unwrap().unwrap();
        assert!(!self.path.exists(), "socket path is removed on exit");
    }

    /// A raw request round trip with explicit descriptors: a `/dev/null`
    /// placeholder error channel and a pipe bulk channel.
    fn raw_request(&self, request: Request) -> (Response, Vec<u8>) {
        let stream = UnixStream::connect(&self.path).unwrap();
        let placeholder_error = File::options().write(true).open("/dev/null").unwrap();
        let (bulk_read, bulk_write) = fd::pipe().unwrap();
        fd::send_with_fds(
            &stream,
            &request.encode(),
            &[placeholder_error.as_raw_fd(), bulk_write.as_raw_fd()],
        )
        .unwrap();
        drop(bulk_write);
        let mut buf = [0u8; RESPONSE_SIZE];
        (&stream).read_exact(&mut buf).unwrap();
        let response = Response::read_from(&mut Cursor::new(buf)).unwrap();
        let mut bulk = Vec::new();
        File::from(bulk_read).read_to_end(&mut bulk).unwrap();
        (response, bulk)
    }
}

#[test]
fn volume_headers_match_the_daemon_memory() {
    let builder = VolumeBuilder::new(2, 4, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let (response, bulk) =
        daemon.raw_request(Request::new(Subcommand::VolumeHeaders, None, None));
    assert_eq!(Status::Okay, response.status);
    assert_eq!(2, response.num_sweeps);
    let header = VolumeHeader::read_from(&mut Cursor::new(bulk)).unwrap();
    assert_eq!(VolumeHeader::for_volume(&builder.volume()), header);
    daemon.stop();
}

#[test]
fn client_volume_headers_roundtrip() {
    let builder = VolumeBuilder::new(2, 4, 3, &[0, 2, 3]);
    let daemon = RunningDaemon::start(&builder);
    let (response, header) = daemon.client().volume_headers().unwrap();
    assert_eq!(Status::Okay, response.status);
    assert_eq!(vec![0, 2, 3], header.type_bits);
    assert_eq!(4, header.num_rays_per_sweep);
    daemon.stop();
}

#[test]
fn ray_headers_for_all_sweeps() {
    let builder = VolumeBuilder::new(3, 4, 5, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let (response, bulk) = daemon.raw_request(Request::new(Subcommand::RayHeaders, None, None));
    assert_eq!(Status::Okay, response.status);
    assert_eq!(3, response.num_sweeps);
    assert_eq!(4, response.num_rays_per_sweep);
    assert_eq!(3 * 4 * WIDE_RAY_HEADER_SIZE, bulk.len());
    let (_, headers) = daemon.client().ray_headers(None).unwrap();
    assert_eq!(12, headers.len());
    daemon.stop();
}

#[test]
fn ray_headers_for_one_sweep_report_one_sweep() {
    let builder = VolumeBuilder::new(3, 4, 5, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let (response, headers) = daemon.client().ray_headers(Some(1)).unwrap();
    assert_eq!(1, response.num_sweeps);
    assert_eq!(4, headers.len());
    let volume = builder.volume();
    assert_eq!(volume.wide_ray_headers(Some(1)).unwrap(), headers);
    daemon.stop();
}

#[test]
fn unknown_data_type_is_a_daemon_error() {
    let builder = VolumeBuilder::new(1, 2, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let err = daemon.client().data(Some("DB_KDPX"), 0).unwrap_err();
    match err {
        Error::Daemon(message) => {
            assert_eq!("DB_KDPX is not a Sigmet data type.", message);
        }
        other => panic!("expected a daemon error, got {:?}", other),
    }
    daemon.stop();
}

#[test]
fn data_matches_a_local_decode() {
    let builder = VolumeBuilder::new(2, 4, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let (response, values) = daemon.client().data(None, 1).unwrap();
    assert_eq!(Status::Okay, response.status);
    assert_eq!(values.len() as u32, response.num_bins_in_sweep);
    let volume = builder.volume();
    let expected = volume
        .sweep_data(volume.default_data_type().unwrap(), 1, false)
        .unwrap();
    assert_eq!(expected, values);
    daemon.stop();
}

#[test]
fn corrected_data_applies_the_calibration_offset() {
    let mut builder = VolumeBuilder::new(1, 2, 3, &[2]);
    builder.calibration_reflectivity = 32; // 2 dB in sixteenths
    let daemon = RunningDaemon::start(&builder);
    let client = daemon.client();
    let (_, plain) = client.data(Some("DB_DBZ"), 0).unwrap();
    let (_, corrected) = client.corrected(Some("DB_DBZ"), 0).unwrap();
    assert_eq!(plain.len(), corrected.len());
    for (plain, corrected) in plain.iter().zip(&corrected) {
        assert!((corrected - plain - 2.0).abs() < 1e-6);
    }
    daemon.stop();
}

#[test]
fn data_for_all_sweeps_is_rejected() {
    let builder = VolumeBuilder::new(2, 2, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let (response, bulk) = daemon.raw_request(Request::new(Subcommand::Data, None, None));
    assert_eq!(Status::Error, response.status);
    assert!(bulk.is_empty());
    daemon.stop();
}

#[test]
fn sweep_headers_for_each_and_all() {
    let builder = VolumeBuilder::new(3, 2, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let client = daemon.client();
    let (response, records) = client.sweep_headers(None).unwrap();
    assert_eq!(3, response.num_sweeps);
    assert_eq!(3, records.len());
    // sweeps are a minute apart in the synthetic volume
    assert_eq!(60.0, records[1].time - records[0].time);
    let (response, one) = client.sweep_headers(Some(2)).unwrap();
    assert_eq!(1, response.num_sweeps);
    assert_eq!(vec![records[2]], one);
    daemon.stop();
}

#[test]
fn every_response_parses_even_on_garbage_requests() {
    let builder = VolumeBuilder::new(1, 2, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let mut encoded = Request::new(Subcommand::Data, None, Some(0)).encode();
    encoded[0] = 99; // unknown subcommand code
    let stream = UnixStream::connect(&daemon.path).unwrap();
    let (error_read, error_write) = fd::pipe().unwrap();
    let (_bulk_read, bulk_write) = fd::pipe().unwrap();
    fd::send_with_fds(
        &stream,
        &encoded,
        &[error_write.as_raw_fd(), bulk_write.as_raw_fd()],
    )
    .unwrap();
    drop(error_write);
    drop(bulk_write);
    let mut buf = [0u8; RESPONSE_SIZE];
    (&stream).read_exact(&mut buf).unwrap();
    let response = Response::read_from(&mut Cursor::new(buf)).unwrap();
    assert_eq!(Status::Error, response.status);
    let mut text = String::new();
    File::from(error_read).read_to_string(&mut text).unwrap();
    assert!(text.contains("unknown subcommand"), "got {:?}", text);
    daemon.stop();
}

#[test]
fn wrong_descriptor_count_is_survivable() {
    let builder = VolumeBuilder::new(1, 2, 3, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let stream = UnixStream::connect(&daemon.path).unwrap();
    let placeholder = File::options().write(true).open("/dev/null").unwrap();
    let request = Request::new(Subcommand::VolumeHeaders, None, None);
    fd::send_with_fds(&stream, &request.encode(), &[placeholder.as_raw_fd()]).unwrap();
    let mut buf = [0u8; RESPONSE_SIZE];
    (&stream).read_exact(&mut buf).unwrap();
    let response = Response::read_from(&mut Cursor::new(buf)).unwrap();
    assert_eq!(Status::Error, response.status);
    // the daemon is still alive and serving
    let (response, _) = daemon.client().volume_headers().unwrap();
    assert_eq!(Status::Okay, response.status);
    daemon.stop();
}

#[test]
fn early_bulk_teardown_does_not_kill_the_daemon() {
    let builder = VolumeBuilder::new(1, 4, 100, &[2]);
    let daemon = RunningDaemon::start(&builder);
    let stream = UnixStream::connect(&daemon.path).unwrap();
    let (error_read, error_write) = fd::pipe().unwrap();
    let (bulk_read, bulk_write) = fd::pipe().unwrap();
    let request = Request::new(Subcommand::Data, None, Some(0));
    fd::send_with_fds(
        &stream,
        &request.encode(),
        &[error_write.as_raw_fd(), bulk_write.as_raw_fd()],
    )
    .unwrap();
    drop(error_write);
    drop(bulk_write);
    // walk away without draining the bulk channel
    drop(bulk_read);
    let mut buf = [0u8; RESPONSE_SIZE];
    (&stream).read_exact(&mut buf).unwrap();
    drop(error_read);
    drop(stream);
    // the daemon shrugs it off
    let (response, values) = daemon.client().data(None, 0).unwrap();
    assert_eq!(Status::Okay, response.status);
    assert_eq!(400, values.len());
    daemon.stop();
}

#[test]
fn time_zone_rides_every_response() {
    let mut builder = VolumeBuilder::new(1, 2, 3, &[2]);
    builder.time_zone_minutes_west = 300;
    builder.sweep_time_base = 0; // radar-local
    let daemon = RunningDaemon::start(&builder);
    let (response, _) = daemon.client().volume_headers().unwrap();
    let zone = sigmet::TimeZoneSpec::from_wire(&response.time_zone).unwrap();
    assert_eq!(Some(-300), zone.minutes_east());
    daemon.stop();
}
