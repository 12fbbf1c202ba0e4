//! Dynamic library loading and symbol resolution
//!
//! Platform-agnostic wrapper around dlopen/LoadLibrary. Addresses returned by
//! [`Library::symbol`] are only valid while the `Library` is alive.

use core::ffi::c_void;
use core::ptr::NonNull;
use std::ffi::CString;
use std::fmt;

use crate::error::{Error, Result};
use crate::logging;
use crate::stats;
use crate::value::Address;

/// Handle to a dynamically loaded library
pub struct Library {
    handle: NonNull<c_void>,
    name: String,
    /// Handles from `this_process` are borrowed and never closed
    owned: bool,
}

impl Library {
    /// Load a library by name or path
    pub fn open(name: &str) -> Result<Self> {
        let _perf = logging::perf::track("library_open");
        let cname = CString::new(name).map_err(|_| Error::Load {
            name: name.to_string(),
            reason: "name contains a NUL byte".to_string(),
        })?;

        let handle = imp::open(&cname).map_err(|reason| {
            logging::log_library(name, None, false);
            Error::Load {
                name: name.to_string(),
                reason,
            }
        })?;

        stats::record_library_loaded();
        logging::log_library(name, None, true);
        Ok(Self {
            handle,
            name: name.to_string(),
            owned: true,
        })
    }

    /// Symbols already linked into the running process
    pub fn this_process() -> Result<Self> {
        let handle = imp::this_process().map_err(|reason| Error::Load {
            name: "<process>".to_string(),
            reason,
        })?;
        Ok(Self {
            handle,
            name: "<process>".to_string(),
            owned: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `symbol` to its address
    pub fn symbol(&self, symbol: &str) -> Result<Address> {
        let not_found = || Error::Symbol {
            library: self.name.clone(),
            symbol: symbol.to_string(),
        };
        let cname = CString::new(symbol).map_err(|_| not_found())?;

        let ptr = unsafe { imp::symbol(self.handle, &cname) };
        logging::log_library(&self.name, Some(symbol), !ptr.is_null());
        if ptr.is_null() {
            Err(not_found())
        } else {
            Ok(Address::from_ptr(ptr))
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if self.owned {
            unsafe { imp::close(self.handle) };
        }
    }
}

// Loader handles are process-global and safe to use from any thread
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(unix)]
mod imp {
    use core::ffi::{c_void, CStr};
    use core::ptr::NonNull;

    fn last_dl_error() -> String {
        unsafe {
            let err = libc::dlerror();
            if err.is_null() {
                "unknown error".into()
            } else {
                CStr::from_ptr(err).to_string_lossy().into_owned()
            }
        }
    }

    pub fn open(name: &CStr) -> Result<NonNull<c_void>, String> {
        let handle = unsafe { libc::dlopen(name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        NonNull::new(handle).ok_or_else(last_dl_error)
    }

    pub fn this_process() -> Result<NonNull<c_void>, String> {
        let handle = unsafe { libc::dlopen(core::ptr::null(), libc::RTLD_NOW) };
        NonNull::new(handle).ok_or_else(last_dl_error)
    }

    pub unsafe fn symbol(handle: NonNull<c_void>, name: &CStr) -> *mut c_void {
        libc::dlsym(handle.as_ptr(), name.as_ptr())
    }

    pub unsafe fn close(handle: NonNull<c_void>) {
        libc::dlclose(handle.as_ptr());
    }
}

#[cfg(windows)]
mod imp {
    use core::ffi::{c_void, CStr};
    use core::ptr::NonNull;
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;

    use winapi::shared::minwindef::HMODULE;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::libloaderapi::{FreeLibrary, GetModuleHandleW, GetProcAddress, LoadLibraryW};

    pub fn open(name: &CStr) -> Result<NonNull<c_void>, String> {
        let wide: Vec<u16> = OsStr::new(&*name.to_string_lossy())
            .encode_wide()
            .chain(Some(0))
            .collect();
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        NonNull::new(handle as *mut c_void)
            .ok_or_else(|| format!("error code {}", unsafe { GetLastError() }))
    }

    pub fn this_process() -> Result<NonNull<c_void>, String> {
        let handle = unsafe { GetModuleHandleW(core::ptr::null()) };
        NonNull::new(handle as *mut c_void)
            .ok_or_else(|| format!("error code {}", unsafe { GetLastError() }))
    }

    pub unsafe fn symbol(handle: NonNull<c_void>, name: &CStr) -> *mut c_void {
        GetProcAddress(handle.as_ptr() as HMODULE, name.as_ptr()) as *mut c_void
    }

    pub unsafe fn close(handle: NonNull<c_void>) {
        FreeLibrary(handle.as_ptr() as HMODULE);
    }
}
