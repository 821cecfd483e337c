//! File-descriptor passing over Unix sockets.
//!
//! The request protocol moves two open file descriptors per request as
//! `SCM_RIGHTS` ancillary data. Received descriptors come back as
//! [OwnedFd], so they are closed on every exit path, decoder errors
//! included.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::ptr;

/// The number of descriptors every request carries: the error channel and
/// the bulk channel.
pub const REQUEST_FDS: usize = 2;

// Control buffer with room for a few descriptors more than the protocol
// allows, so an overfull message is seen rather than truncated.
const CMSG_CAPACITY: usize = 128;

#[repr(align(8))]
struct CmsgBuffer([u8; CMSG_CAPACITY]);

/// Sends `bytes` plus the given descriptors in one message.
pub fn send_with_fds(socket: &UnixStream, bytes: &[u8], fds: &[RawFd]) -> io::Result<()> {
    let mut iov = libc::iovec {
        iov_base: bytes.as_ptr() as *mut libc::c_void,
        iov_len: bytes.len(),
    };
    let mut cmsg_buffer = CmsgBuffer([0; CMSG_CAPACITY]);
    let fd_bytes = size_of_val(fds);
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    if !fds.is_empty() {
        msg.msg_control = cmsg_buffer.0.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = unsafe { libc::CMSG_SPACE(fd_bytes as u32) } as _;
        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN(fd_bytes as u32) as _;
            ptr::copy_nonoverlapping(
                fds.as_ptr() as *const u8,
                libc::CMSG_DATA(cmsg),
                fd_bytes,
            );
        }
    }
    let sent = unsafe { libc::sendmsg(socket.as_raw_fd(), &msg, 0) };
    if sent < 0 {
        return Err(io::Error::last_os_error());
    }
    if sent as usize != bytes.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("sent {} of {} request bytes", sent, bytes.len()),
        ));
    }
    Ok(())
}

/// Receives one message and whatever descriptors rode along with it.
///
/// Returns the number of regular bytes read and the received descriptors,
/// already owned. The caller checks the count against [REQUEST_FDS].
pub fn recv_with_fds(socket: &UnixStream, buf: &mut [u8]) -> io::Result<(usize, Vec<OwnedFd>)> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let mut cmsg_buffer = CmsgBuffer([0; CMSG_CAPACITY]);
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buffer.0.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = CMSG_CAPACITY as _;
    let received = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, libc::MSG_CMSG_CLOEXEC) };
    if received < 0 {
        return Err(io::Error::last_os_error());
    }
    let mut fds = Vec::new();
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data_len = (*cmsg).cmsg_len as usize - libc::CMSG_LEN(0) as usize;
                let count = data_len / size_of::<RawFd>();
                let data = libc::CMSG_DATA(cmsg) as *const RawFd;
                for index in 0..count {
                    fds.push(OwnedFd::from_raw_fd(ptr::read_unaligned(data.add(index))));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }
    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "ancillary data truncated",
        ));
    }
    Ok((received as usize, fds))
}

/// Creates a pipe, returning `(read end, write end)`.
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Stops `SIGPIPE` from killing the process when a client closes its bulk
/// channel early; writes report `EPIPE` instead.
pub fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Write};

    #[test]
    fn fds_cross_a_socket_pair() {
        let (left, right) = UnixStream::pair().unwrap();
        let (pipe_read, pipe_write) = pipe().unwrap();
        send_with_fds(
            &left,
            b"hello",
            &[pipe_read.as_raw_fd(), pipe_write.as_raw_fd()],
        )
        .unwrap();
        let mut buf = [0u8; 16];
        let (n, mut fds) = recv_with_fds(&right, &mut buf).unwrap();
        assert_eq!(5, n);
        assert_eq!(b"hello", &buf[..5]);
        assert_eq!(REQUEST_FDS, fds.len());
        // the received descriptors are live: write through one, read from
        // the other
        let received_write = fds.pop().unwrap();
        let received_read = fds.pop().unwrap();
        drop(pipe_write);
        File::from(received_write).write_all(b"ping").unwrap();
        let mut text = String::new();
        File::from(received_read).read_to_string(&mut text).unwrap();
        assert_eq!("ping", text);
        drop(pipe_read);
    }

    #[test]
    fn plain_messages_carry_no_fds() {
        let (left, right) = UnixStream::pair().unwrap();
        send_with_fds(&left, b"x", &[]).unwrap();
        let mut buf = [0u8; 4];
        let (n, fds) = recv_with_fds(&right, &mut buf).unwrap();
        assert_eq!(1, n);
        assert!(fds.is_empty());
    }
}
