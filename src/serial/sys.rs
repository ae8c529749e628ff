//! Syscall seam for the session.
//!
//! Every OS call the session makes goes through [`SysCalls`]. The default
//! method bodies hit the kernel directly, so [`PosixSys`] is an empty
//! implementation; tests override individual calls to inject failures.
use std::os::unix::io::RawFd;

use nix::errno::Errno;

use super::attributes::TerminalAttributes;

nix::ioctl_read_bad!(tcgets2, libc::TCGETS2, libc::termios2);
nix::ioctl_write_ptr_bad!(tcsets2, libc::TCSETS2, libc::termios2);
nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);
nix::ioctl_write_int_bad!(tcflsh, libc::TCFLSH);

pub trait SysCalls: Send {
    /// Waits up to `timeout_ms` (-1 blocks) for `events` on `fd`. Returns
    /// the number of ready descriptors, 0 on expiry.
    fn poll(&self, fd: RawFd, events: libc::c_short, timeout_ms: libc::c_int) -> nix::Result<libc::c_int> {
        let mut pfd = libc::pollfd { fd, events, revents: 0 };
        // SAFETY: one valid pollfd, count 1.
        Errno::result(unsafe { libc::poll(&mut pfd, 1, timeout_ms) })
    }

    fn read(&self, fd: RawFd, buf: &mut [u8]) -> nix::Result<usize> {
        // SAFETY: the pointer and length describe `buf`.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        Errno::result(n).map(|n| n as usize)
    }

    fn write(&self, fd: RawFd, buf: &[u8]) -> nix::Result<usize> {
        // SAFETY: the pointer and length describe `buf`.
        let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        Errno::result(n).map(|n| n as usize)
    }

    fn get_attributes(&self, fd: RawFd) -> nix::Result<TerminalAttributes> {
        let mut attrs = TerminalAttributes::default();
        // SAFETY: termios2 out-pointer is valid for the call.
        unsafe { tcgets2(fd, attrs.as_raw_mut()) }?;
        Ok(attrs)
    }

    fn set_attributes(&self, fd: RawFd, attrs: &TerminalAttributes) -> nix::Result<()> {
        // SAFETY: termios2 in-pointer is valid for the call.
        unsafe { tcsets2(fd, attrs.as_raw()) }?;
        Ok(())
    }

    fn bytes_available(&self, fd: RawFd) -> nix::Result<usize> {
        let mut count: libc::c_int = 0;
        // SAFETY: FIONREAD writes a single c_int.
        unsafe { fionread(fd, &mut count) }?;
        Ok(count.max(0) as usize)
    }

    fn flush_input(&self, fd: RawFd) -> nix::Result<()> {
        // SAFETY: TCFLSH takes its queue selector by value.
        unsafe { tcflsh(fd, libc::TCIFLUSH) }?;
        Ok(())
    }
}

/// Kernel-backed syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixSys;

impl SysCalls for PosixSys {}
