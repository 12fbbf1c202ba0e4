//! Host values crossing the native boundary

use core::ffi::{c_char, c_void, CStr};
use core::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::memory::NativeBuffer;
use crate::types::NativeType;

/// Raw native address
///
/// Not owned memory: an `Address` never frees or keeps alive what it points at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(usize);

impl Address {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Read a NUL-terminated string at this address
    ///
    /// # Safety
    /// Address must be null or point to a readable NUL-terminated byte string.
    pub unsafe fn read_c_string(self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        let s = CStr::from_ptr(self.0 as *const c_char);
        Some(s.to_string_lossy().into_owned())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Single-shot conversion protocol for values with no direct native form
///
/// Called at most once per argument slot per call. The result is used as-is;
/// a result that still does not fit the slot is a type error.
pub trait Convert: fmt::Debug + Send + Sync {
    fn convert(&self, target: NativeType) -> Result<Value>;
}

/// Host value
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value; void returns and null pointers
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Pointer(Address),
    /// Copied into NUL-terminated temporary storage when passed as a pointer
    Str(String),
    Bytes(Vec<u8>),
    /// Native memory passed by address
    Buffer(NativeBuffer),
    /// Converted through [`Convert`] before marshalling
    Object(Arc<dyn Convert>),
}

impl Value {
    /// Wrap a convertible object
    pub fn object(obj: impl Convert + 'static) -> Self {
        Self::Object(Arc::new(obj))
    }

    /// Name used in type errors
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Pointer(_) => "pointer",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Buffer(_) => "buffer",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view; unsigned values wrap into i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => Some(*v as i64),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v as u64),
            Self::UInt(v) => Some(*v),
            Self::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Pointer(a) => Some(*a),
            Self::Null => Some(Address::NULL),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Int(a), Self::UInt(b)) | (Self::UInt(b), Self::Int(a)) => {
                *a >= 0 && *a as u64 == *b
            }
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Buffer(a), Self::Buffer(b)) => a.same_allocation(b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Self::Pointer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<NativeBuffer> for Value {
    fn from(v: NativeBuffer) -> Self {
        Self::Buffer(v)
    }
}

impl From<&NativeBuffer> for Value {
    fn from(v: &NativeBuffer) -> Self {
        Self::Buffer(v.clone())
    }
}
