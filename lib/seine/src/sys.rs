//! Platform shims for the handful of calls the socket2 surface does not
//! cover: the vectored readiness poll and the raw option passthrough.

#[cfg(unix)]
pub use self::unix::*;
#[cfg(windows)]
pub use self::windows::*;

#[cfg(unix)]
mod unix {
    use crate::poller::Readiness;
    use socket2::Socket;
    use std::io;
    use std::os::unix::io::{AsRawFd, RawFd};

    pub type RawDescriptor = RawFd;

    pub const IPPROTO_RAW: i32 = libc::IPPROTO_RAW;

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    pub const IPPROTO_SCTP: Option<i32> = Some(libc::IPPROTO_SCTP);
    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    pub const IPPROTO_SCTP: Option<i32> = None;

    pub type PollFd = libc::pollfd;

    #[inline]
    pub fn descriptor(socket: &Socket) -> RawDescriptor {
        socket.as_raw_fd()
    }

    /// Builds a pollfd for the requested interest set. Error conditions are
    /// always reported by the OS regardless of the events field.
    pub fn pollfd(fd: RawDescriptor, interest: Readiness) -> PollFd {
        let mut events: libc::c_short = 0;

        if interest.is_readable() {
            events |= libc::POLLIN;
        }
        if interest.is_writable() {
            events |= libc::POLLOUT;
        }

        libc::pollfd {
            fd,
            events,
            revents: 0,
        }
    }

    /// Folds returned revents into the three-bit readiness mask.
    pub fn readiness(entry: &PollFd) -> Readiness {
        let mut ready = Readiness::EMPTY;

        if entry.revents & libc::POLLIN != 0 {
            ready |= Readiness::READABLE;
        }
        if entry.revents & libc::POLLOUT != 0 {
            ready |= Readiness::WRITABLE;
        }
        if entry.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            ready |= Readiness::ERROR;
        }

        ready
    }

    /// One bounded poll over the whole descriptor set.
    pub fn poll(entries: &mut [PollFd], timeout_ms: i32) -> io::Result<usize> {
        let rc = unsafe { libc::poll(entries.as_mut_ptr(), entries.len() as libc::nfds_t, timeout_ms) };

        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(rc as usize)
    }

    /// Raw setsockopt passthrough; the level and option integers are handed
    /// to the OS unchanged.
    pub fn set_option(fd: RawDescriptor, level: i32, option: i32, value: i32) -> io::Result<()> {
        let rc = unsafe {
            libc::setsockopt(
                fd,
                level,
                option,
                &value as *const i32 as *const libc::c_void,
                std::mem::size_of::<i32>() as libc::socklen_t,
            )
        };

        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Raw getsockopt passthrough.
    pub fn get_option(fd: RawDescriptor, level: i32, option: i32) -> io::Result<i32> {
        let mut value: i32 = 0;
        let mut len = std::mem::size_of::<i32>() as libc::socklen_t;

        let rc = unsafe {
            libc::getsockopt(
                fd,
                level,
                option,
                &mut value as *mut i32 as *mut libc::c_void,
                &mut len,
            )
        };

        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(value)
    }
}

#[cfg(windows)]
mod windows {
    use crate::poller::Readiness;
    use socket2::Socket;
    use std::io;
    use std::os::windows::io::{AsRawSocket, RawSocket};
    use windows_sys::Win32::Networking::WinSock as ws;

    pub type RawDescriptor = RawSocket;

    pub const IPPROTO_RAW: i32 = ws::IPPROTO_RAW;
    pub const IPPROTO_SCTP: Option<i32> = None;

    pub type PollFd = ws::WSAPOLLFD;

    #[inline]
    pub fn descriptor(socket: &Socket) -> RawDescriptor {
        socket.as_raw_socket()
    }

    pub fn pollfd(fd: RawDescriptor, interest: Readiness) -> PollFd {
        let mut events: i16 = 0;

        if interest.is_readable() {
            events |= ws::POLLRDNORM as i16;
        }
        if interest.is_writable() {
            events |= ws::POLLWRNORM as i16;
        }

        ws::WSAPOLLFD {
            fd: fd as usize,
            events,
            revents: 0,
        }
    }

    pub fn readiness(entry: &PollFd) -> Readiness {
        let mut ready = Readiness::EMPTY;
        let revents = entry.revents as u16;

        if revents & (ws::POLLRDNORM as u16 | ws::POLLIN as u16) != 0 {
            ready |= Readiness::READABLE;
        }
        if revents & (ws::POLLWRNORM as u16 | ws::POLLOUT as u16) != 0 {
            ready |= Readiness::WRITABLE;
        }
        if revents & (ws::POLLERR as u16 | ws::POLLHUP as u16 | ws::POLLNVAL as u16) != 0 {
            ready |= Readiness::ERROR;
        }

        ready
    }

    pub fn poll(entries: &mut [PollFd], timeout_ms: i32) -> io::Result<usize> {
        let rc = unsafe { ws::WSAPoll(entries.as_mut_ptr(), entries.len() as u32, timeout_ms) };

        if rc == ws::SOCKET_ERROR {
            return Err(io::Error::last_os_error());
        }

        Ok(rc as usize)
    }

    pub fn set_option(fd: RawDescriptor, level: i32, option: i32, value: i32) -> io::Result<()> {
        let rc = unsafe {
            ws::setsockopt(
                fd as usize,
                level,
                option,
                &value as *const i32 as *const u8,
                std::mem::size_of::<i32>() as i32,
            )
        };

        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    pub fn get_option(fd: RawDescriptor, level: i32, option: i32) -> io::Result<i32> {
        let mut value: i32 = 0;
        let mut len = std::mem::size_of::<i32>() as i32;

        let rc = unsafe {
            ws::getsockopt(
                fd as usize,
                level,
                option,
                &mut value as *mut i32 as *mut u8,
                &mut len,
            )
        };

        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(value)
    }
}
