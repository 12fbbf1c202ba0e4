//! Native memory with deterministic release
//!
//! `NativeBuffer` is a block of zeroed native memory that native code may
//! read and write through its address. Release happens exactly once: through
//! an explicit `free()` or when the last handle drops. A block passed to a
//! native call is pinned for the duration of the call; freeing it meanwhile
//! marks it freed at once but defers the deallocation until the last pin
//! drops. Every allocated block is recorded in a concurrent registry for
//! leak auditing.

use std::alloc::{self, Layout};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::logging;
use crate::value::Address;

/// Allocated blocks: address -> size
static LIVE: Lazy<DashMap<usize, usize>> = Lazy::new(|| DashMap::with_capacity(64));

const ALIGN: usize = 16;

#[derive(Debug, Default)]
struct State {
    freed: bool,
    pins: usize,
}

struct Block {
    ptr: *mut u8,
    size: usize,
    layout: Layout,
    state: Mutex<State>,
}

// Safety: the block is only written by native code through its address;
// release and pinning are serialized by `state`.
unsafe impl Send for Block {}
unsafe impl Sync for Block {}

impl Block {
    fn layout(size: usize) -> Result<Layout> {
        // Zero-size blocks still get one byte so every buffer has a distinct address
        Layout::from_size_align(size.max(1), ALIGN).map_err(|_| Error::Alloc { size })
    }

    /// Return the memory to the allocator; callers guarantee this runs once
    fn deallocate(&self) {
        LIVE.remove(&(self.ptr as usize));
        logging::log_free(self.ptr, self.size);
        unsafe { alloc::dealloc(self.ptr, self.layout) };
    }

    /// Mark freed if not yet; returns whether this call did it
    fn release(&self) -> bool {
        let mut state = self.state.lock();
        if state.freed {
            return false;
        }
        state.freed = true;
        if state.pins == 0 {
            self.deallocate();
        }
        true
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // Pins hold an Arc, so none remain here
        if !self.state.get_mut().freed {
            self.deallocate();
        }
    }
}

/// Keeps a block's memory allocated while native code may touch it
pub(crate) struct Pinned {
    block: Arc<Block>,
}

impl Pinned {
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.block.ptr
    }
}

impl Drop for Pinned {
    fn drop(&mut self) {
        let mut state = self.block.state.lock();
        state.pins -= 1;
        if state.freed && state.pins == 0 {
            self.block.deallocate();
        }
    }
}

impl fmt::Debug for Pinned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pinned").field(&self.block.ptr).finish()
    }
}

/// Shared handle to a block of native memory
#[derive(Clone)]
pub struct NativeBuffer {
    block: Arc<Block>,
}

impl NativeBuffer {
    /// Allocate `size` zeroed bytes, aborting if the allocator fails
    pub fn malloc(size: usize) -> Self {
        match Self::try_malloc(size) {
            Ok(buf) => buf,
            Err(_) => alloc::handle_alloc_error(Block::layout(size).unwrap_or(Layout::new::<u8>())),
        }
    }

    /// Allocate `size` zeroed bytes
    pub fn try_malloc(size: usize) -> Result<Self> {
        let layout = Block::layout(size)?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::Alloc { size });
        }
        LIVE.insert(ptr as usize, size);
        logging::log_alloc(ptr, size);
        Ok(Self {
            block: Arc::new(Block {
                ptr,
                size,
                layout,
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Allocate a buffer holding a copy of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let buf = Self::malloc(bytes.len());
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.block.ptr, bytes.len()) };
        buf
    }

    /// Keep the memory allocated until the guard drops; fails once freed
    pub(crate) fn pin(&self) -> Result<Pinned> {
        let mut state = self.block.state.lock();
        if state.freed {
            return Err(Error::Freed(self.block.ptr as usize));
        }
        state.pins += 1;
        Ok(Pinned {
            block: Arc::clone(&self.block),
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.block.size
    }

    #[inline]
    pub fn is_freed(&self) -> bool {
        self.block.state.lock().freed
    }

    /// Address of the first byte; fails once freed
    pub fn address(&self) -> Result<Address> {
        self.check_live()?;
        Ok(Address::from_ptr(self.block.ptr))
    }

    /// Copy of the current contents
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let pinned = self.pin()?;
        let slice = unsafe { core::slice::from_raw_parts(pinned.as_ptr(), self.block.size) };
        Ok(slice.to_vec())
    }

    /// Contents up to the first NUL byte (or the whole buffer)
    pub fn read_c_string(&self) -> Result<String> {
        let bytes = self.to_bytes()?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Overwrite from `offset`; bytes past the end are dropped
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<usize> {
        let pinned = self.pin()?;
        if offset >= self.block.size {
            return Ok(0);
        }
        let n = bytes.len().min(self.block.size - offset);
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), pinned.as_ptr().add(offset), n) };
        Ok(n)
    }

    /// Mark freed; memory returns to the allocator once no call pins it.
    /// Later calls are no-ops and return false.
    pub fn free(&self) -> bool {
        self.block.release()
    }

    /// True when both handles refer to the same block
    pub fn same_allocation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.block, &other.block)
    }

    fn check_live(&self) -> Result<()> {
        if self.is_freed() {
            return Err(Error::Freed(self.block.ptr as usize));
        }
        Ok(())
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("ptr", &self.block.ptr)
            .field("size", &self.block.size)
            .field("freed", &self.is_freed())
            .finish()
    }
}

/// Number of blocks whose memory is still allocated
pub fn live_allocations() -> usize {
    LIVE.len()
}

/// Total bytes held by allocated blocks
pub fn live_bytes() -> usize {
    LIVE.iter().map(|entry| *entry.value()).sum()
}

/// Whether `addr` is the start of an allocated block
pub fn is_live(addr: Address) -> bool {
    LIVE.contains_key(&addr.as_usize())
}
