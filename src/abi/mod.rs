//! ABI dispatch
//!
//! A `CallInterface` is a prepared libffi call frame description for one
//! signature and calling convention. It is built once per `Function` and
//! only read afterwards, so one interface serves any number of concurrent
//! calls.

use core::ffi::c_void;

use libffi::low::{ffi_abi, ffi_abi_FFI_DEFAULT_ABI};
use libffi::middle::{Cif, Type};
use smallvec::SmallVec;

use crate::types::{IntWidth, NativeType};
use crate::value::Address;

/// Calling convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallingConvention {
    /// C calling convention (platform default)
    #[default]
    Default,
    /// Win32 `__stdcall`; identical to `Default` on targets without a
    /// distinct stdcall ABI
    Stdcall,
}

impl CallingConvention {
    /// Whether this convention differs from the default on the current target
    #[inline]
    pub const fn is_distinct(self) -> bool {
        match self {
            Self::Default => false,
            Self::Stdcall => cfg!(all(target_arch = "x86", target_os = "windows")),
        }
    }

    fn ffi_abi(self) -> ffi_abi {
        match self {
            Self::Default => ffi_abi_FFI_DEFAULT_ABI,
            #[cfg(all(target_arch = "x86", target_os = "windows"))]
            Self::Stdcall => libffi::raw::ffi_abi_FFI_STDCALL,
            #[cfg(not(all(target_arch = "x86", target_os = "windows")))]
            Self::Stdcall => ffi_abi_FFI_DEFAULT_ABI,
        }
    }
}

/// Storage for one native argument or return value
///
/// libffi reads argument slots from offset 0 with the slot's own width and
/// widens integral returns narrower than a register to `reg`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union FfiValue {
    pub i8: i8,
    pub i16: i16,
    pub i32: i32,
    pub i64: i64,
    pub u8: u8,
    pub u16: u16,
    pub u32: u32,
    pub u64: u64,
    pub f32: f32,
    pub f64: f64,
    pub reg: usize,
    pub ptr: *mut c_void,
    bytes: [u8; 16],
}

impl FfiValue {
    #[inline]
    pub const fn zeroed() -> Self {
        Self { bytes: [0; 16] }
    }

    #[inline]
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        let mut v = Self::zeroed();
        v.ptr = ptr;
        v
    }
}

impl Default for FfiValue {
    #[inline]
    fn default() -> Self {
        Self::zeroed()
    }
}

impl core::fmt::Debug for FfiValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Every bit pattern of the 16 bytes is a valid u64 pair
        let (lo, hi) = unsafe {
            let b = self.bytes;
            (
                u64::from_ne_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                u64::from_ne_bytes([b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]]),
            )
        };
        write!(f, "FfiValue({:#018x}, {:#018x})", lo, hi)
    }
}

/// libffi type for a descriptor
fn ffi_type(ty: NativeType) -> Type {
    match ty {
        NativeType::Void => Type::void(),
        NativeType::Integer { width, signed } => match (width, signed) {
            (IntWidth::W8, true) => Type::i8(),
            (IntWidth::W8, false) => Type::u8(),
            (IntWidth::W16, true) => Type::i16(),
            (IntWidth::W16, false) => Type::u16(),
            (IntWidth::W32, true) => Type::i32(),
            (IntWidth::W32, false) => Type::u32(),
            (IntWidth::W64, true) => Type::i64(),
            (IntWidth::W64, false) => Type::u64(),
        },
        NativeType::Float => Type::f32(),
        NativeType::Double => Type::f64(),
        NativeType::Bool => Type::u8(),
        NativeType::Pointer | NativeType::ConstString => Type::pointer(),
    }
}

/// Prepared call frame description
pub struct CallInterface {
    cif: Cif,
    arg_types: Vec<NativeType>,
    return_type: NativeType,
    convention: CallingConvention,
}

// Safety: the cif and the type arrays it points into are never mutated after
// construction; ffi_call only reads them.
unsafe impl Send for CallInterface {}
unsafe impl Sync for CallInterface {}

impl CallInterface {
    pub fn new(
        arg_types: Vec<NativeType>,
        return_type: NativeType,
        convention: CallingConvention,
    ) -> Self {
        let mut cif = Cif::new(arg_types.iter().copied().map(ffi_type), ffi_type(return_type));
        if convention != CallingConvention::Default {
            cif.set_abi(convention.ffi_abi());
        }
        Self {
            cif,
            arg_types,
            return_type,
            convention,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    #[inline]
    pub fn arg_types(&self) -> &[NativeType] {
        &self.arg_types
    }

    #[inline]
    pub fn return_type(&self) -> NativeType {
        self.return_type
    }

    #[inline]
    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    /// Transfer control to `address` with prepared argument slots
    ///
    /// # Safety
    /// Caller must ensure:
    /// - `address` is a live function with exactly this signature and convention
    /// - `args.len() == self.arity()` and each slot holds a value of its type
    /// - every pointer carried in a slot is valid for what the callee does with it
    pub unsafe fn invoke(&self, address: Address, args: &mut [FfiValue]) -> FfiValue {
        debug_assert_eq!(args.len(), self.arg_types.len());
        debug_assert!(!address.is_null());

        let mut arg_ptrs: SmallVec<[*mut c_void; 8]> = args
            .iter_mut()
            .map(|slot| slot as *mut FfiValue as *mut c_void)
            .collect();
        let mut ret = FfiValue::zeroed();
        let fun: unsafe extern "C" fn() = core::mem::transmute(address.as_ptr());

        libffi::raw::ffi_call(
            self.cif.as_raw_ptr(),
            Some(fun),
            &mut ret as *mut FfiValue as *mut c_void,
            arg_ptrs.as_mut_ptr(),
        );
        ret
    }
}

impl core::fmt::Debug for CallInterface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallInterface")
            .field("arg_types", &self.arg_types)
            .field("return_type", &self.return_type)
            .field("convention", &self.convention)
            .finish()
    }
}

#[cfg(test)]
mod tests;
