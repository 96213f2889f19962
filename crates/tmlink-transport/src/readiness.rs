use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

/// Readiness to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Data to read, or end of stream.
    Read,
    /// Room to write, or a finished connect.
    Write,
}

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor is ready (or has a pending hangup/error to report).
    Ready,
    /// Nothing happened before the timeout.
    Timeout,
    /// The wait returned but the descriptor is not usable.
    NotReady,
}

/// Wait until `fd` is ready for `interest` or `timeout` elapses.
///
/// Hangup and error conditions count as ready so that the following
/// read or `SO_ERROR` check observes them.
pub fn wait_ready(fd: BorrowedFd<'_>, interest: Interest, timeout: Duration) -> io::Result<Readiness> {
    let events = match interest {
        Interest::Read => libc::POLLIN,
        Interest::Write => libc::POLLOUT,
    };
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events,
        revents: 0,
    };
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    loop {
        // SAFETY: `pfd` is a valid, writable pollfd and `nfds` is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(Readiness::Timeout);
        }

        let ready_mask = events | libc::POLLHUP | libc::POLLERR;
        return Ok(if pfd.revents & ready_mask != 0 {
            Readiness::Ready
        } else {
            Readiness::NotReady
        });
    }
}
