//! Last-error capture
//!
//! Each thread owns its slots. A `Function` refreshes them on the calling
//! thread immediately after the native body returns, before the execution
//! lock is reacquired, so concurrent callers never see each other's codes.
//! Slots start unset; `set_*` overwrites the slot only, never the OS value.

use std::cell::Cell;

use crate::logging;

#[derive(Debug, Clone, Copy, Default)]
struct Slots {
    errno: Option<i32>,
    #[cfg(windows)]
    win32: Option<u32>,
    #[cfg(windows)]
    win32_socket: Option<i32>,
}

thread_local! {
    static SLOTS: Cell<Slots> = Cell::new(Slots::default());
}

/// Last errno recorded on this thread, `None` if no call has recorded one
pub fn last_error() -> Option<i32> {
    SLOTS.with(|s| s.get().errno)
}

/// Overwrite (or clear) this thread's errno slot
pub fn set_last_error(code: Option<i32>) {
    logging::log_errno_reset("errno", code.map(i64::from));
    SLOTS.with(|s| {
        let mut slots = s.get();
        slots.errno = code;
        s.set(slots);
    });
}

#[cfg(windows)]
pub fn win32_last_error() -> Option<u32> {
    SLOTS.with(|s| s.get().win32)
}

#[cfg(windows)]
pub fn set_win32_last_error(code: Option<u32>) {
    logging::log_errno_reset("win32", code.map(i64::from));
    SLOTS.with(|s| {
        let mut slots = s.get();
        slots.win32 = code;
        s.set(slots);
    });
}

#[cfg(windows)]
pub fn win32_last_socket_error() -> Option<i32> {
    SLOTS.with(|s| s.get().win32_socket)
}

#[cfg(windows)]
pub fn set_win32_last_socket_error(code: Option<i32>) {
    logging::log_errno_reset("win32_socket", code.map(i64::from));
    SLOTS.with(|s| {
        let mut slots = s.get();
        slots.win32_socket = code;
        s.set(slots);
    });
}

/// Read the OS error state into this thread's slots
///
/// Must run directly after the native call, before anything else that could
/// touch errno or the Win32 last-error value.
#[inline]
pub(crate) fn capture() -> i32 {
    // Read every OS value before any Rust code of ours runs
    let errno = os::errno();
    #[cfg(windows)]
    let (win32, socket) = (os::win32_last_error(), os::win32_last_socket_error());

    SLOTS.with(|s| {
        let mut slots = s.get();
        slots.errno = Some(errno);
        #[cfg(windows)]
        {
            slots.win32 = Some(win32);
            slots.win32_socket = Some(socket);
        }
        s.set(slots);
    });
    errno
}

/// Platform readers for the OS error state
pub(crate) mod os {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))]
    unsafe fn location() -> *mut libc::c_int {
        libc::__errno_location()
    }

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly"
    ))]
    unsafe fn location() -> *mut libc::c_int {
        libc::__error()
    }

    #[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
    unsafe fn location() -> *mut libc::c_int {
        libc::__errno()
    }

    #[cfg(unix)]
    pub fn errno() -> i32 {
        unsafe { *location() }
    }

    /// Overwrite the OS errno of this thread
    #[cfg(all(unix, test))]
    pub fn set_errno(code: i32) {
        unsafe { *location() = code };
    }

    #[cfg(windows)]
    pub fn errno() -> i32 {
        extern "C" {
            fn _errno() -> *mut i32;
        }
        unsafe { *_errno() }
    }

    #[cfg(all(windows, test))]
    pub fn set_errno(code: i32) {
        extern "C" {
            fn _errno() -> *mut i32;
        }
        unsafe { *_errno() = code };
    }

    #[cfg(windows)]
    pub fn win32_last_error() -> u32 {
        unsafe { winapi::um::errhandlingapi::GetLastError() }
    }

    #[cfg(windows)]
    pub fn win32_last_socket_error() -> i32 {
        unsafe { winapi::um::winsock2::WSAGetLastError() }
    }
}
