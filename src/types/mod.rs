//! Native type descriptors
//!
//! Every descriptor maps to exactly one fixed storage slot on the current
//! target. C spellings (`"unsigned long"`, `"size_t"`, `"void*"`) and
//! integer codes (negative meaning unsigned) resolve to descriptors.

use core::ffi::{c_int, c_long, c_longlong, c_short};
use core::fmt;
use core::mem::{align_of, size_of};

use crate::error::{Error, Result};

/// Integer storage width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width in bytes
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::W8 => 1,
            Self::W16 => 2,
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }

    /// Only evaluated in constant context; an unsupported width fails the build
    const fn of_bytes(n: usize) -> Self {
        match n {
            1 => Self::W8,
            2 => Self::W16,
            4 => Self::W32,
            8 => Self::W64,
            _ => panic!("unsupported integer width"),
        }
    }
}

/// Native type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Void,
    Integer { width: IntWidth, signed: bool },
    Float,
    Double,
    Bool,
    Pointer,
    /// NUL-terminated string, read back into an owned host string
    ConstString,
}

const _: () = assert!(matches!(size_of::<c_short>(), 2 | 4 | 8));
const _: () = assert!(matches!(size_of::<c_int>(), 2 | 4 | 8));
const _: () = assert!(matches!(size_of::<c_long>(), 4 | 8));
const _: () = assert!(matches!(size_of::<c_longlong>(), 8));
const _: () = assert!(matches!(size_of::<usize>(), 4 | 8));

const fn int(bytes: usize, signed: bool) -> NativeType {
    NativeType::Integer {
        width: IntWidth::of_bytes(bytes),
        signed,
    }
}

impl NativeType {
    pub const CHAR: Self = int(1, true);
    pub const UCHAR: Self = int(1, false);
    pub const SHORT: Self = int(size_of::<c_short>(), true);
    pub const USHORT: Self = int(size_of::<c_short>(), false);
    pub const INT: Self = int(size_of::<c_int>(), true);
    pub const UINT: Self = int(size_of::<c_int>(), false);
    pub const LONG: Self = int(size_of::<c_long>(), true);
    pub const ULONG: Self = int(size_of::<c_long>(), false);
    pub const LONG_LONG: Self = int(size_of::<c_longlong>(), true);
    pub const ULONG_LONG: Self = int(size_of::<c_longlong>(), false);
    pub const INT8: Self = int(1, true);
    pub const UINT8: Self = int(1, false);
    pub const INT16: Self = int(2, true);
    pub const UINT16: Self = int(2, false);
    pub const INT32: Self = int(4, true);
    pub const UINT32: Self = int(4, false);
    pub const INT64: Self = int(8, true);
    pub const UINT64: Self = int(8, false);
    pub const SIZE_T: Self = int(size_of::<usize>(), false);
    pub const SSIZE_T: Self = int(size_of::<isize>(), true);
    pub const PTRDIFF_T: Self = int(size_of::<isize>(), true);
    pub const INTPTR_T: Self = int(size_of::<isize>(), true);
    pub const UINTPTR_T: Self = int(size_of::<usize>(), false);
    pub const VOIDP: Self = Self::Pointer;

    /// Storage size in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Integer { width, .. } => width.bytes(),
            Self::Float => 4,
            Self::Double => 8,
            Self::Bool => 1,
            Self::Pointer | Self::ConstString => size_of::<usize>(),
        }
    }

    /// Alignment requirement
    #[inline]
    pub const fn align(self) -> usize {
        match self {
            Self::Void | Self::Bool => 1,
            Self::Integer { width, .. } => match width {
                IntWidth::W8 => 1,
                IntWidth::W16 => align_of::<i16>(),
                IntWidth::W32 => align_of::<i32>(),
                IntWidth::W64 => align_of::<i64>(),
            },
            Self::Float => align_of::<f32>(),
            Self::Double => align_of::<f64>(),
            Self::Pointer | Self::ConstString => align_of::<usize>(),
        }
    }

    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Integer { .. })
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    #[inline]
    pub const fn is_pointer(self) -> bool {
        matches!(self, Self::Pointer | Self::ConstString)
    }

    /// Resolve a C spelling such as `"double"`, `"unsigned long"` or `"void*"`
    pub fn resolve(tag: &str) -> Result<Self> {
        let normalized = tag.split_whitespace().collect::<Vec<_>>().join(" ");
        let spelled = normalized.replace(" *", "*");

        if let Some(base) = spelled.strip_suffix('*') {
            return match base.trim() {
                "const char" | "char const" => Ok(Self::ConstString),
                "" => Err(Error::UnknownType(tag.to_string())),
                _ => Ok(Self::Pointer),
            };
        }

        let ty = match spelled.as_str() {
            "void" => Self::Void,
            "char" | "signed char" => Self::CHAR,
            "unsigned char" | "uchar" => Self::UCHAR,
            "short" | "short int" | "signed short" | "signed short int" => Self::SHORT,
            "unsigned short" | "unsigned short int" | "ushort" => Self::USHORT,
            "int" | "signed" | "signed int" => Self::INT,
            "unsigned" | "unsigned int" | "uint" => Self::UINT,
            "long" | "long int" | "signed long" | "signed long int" => Self::LONG,
            "unsigned long" | "unsigned long int" | "ulong" => Self::ULONG,
            "long long" | "long long int" | "signed long long" => Self::LONG_LONG,
            "unsigned long long" | "unsigned long long int" => Self::ULONG_LONG,
            "int8_t" => Self::INT8,
            "uint8_t" => Self::UINT8,
            "int16_t" => Self::INT16,
            "uint16_t" => Self::UINT16,
            "int32_t" => Self::INT32,
            "uint32_t" => Self::UINT32,
            "int64_t" => Self::INT64,
            "uint64_t" => Self::UINT64,
            "float" => Self::Float,
            "double" => Self::Double,
            "bool" | "_Bool" => Self::Bool,
            "size_t" => Self::SIZE_T,
            "ssize_t" => Self::SSIZE_T,
            "ptrdiff_t" => Self::PTRDIFF_T,
            "intptr_t" => Self::INTPTR_T,
            "uintptr_t" => Self::UINTPTR_T,
            "voidp" => Self::VOIDP,
            _ => return Err(Error::UnknownType(tag.to_string())),
        };
        Ok(ty)
    }

    /// Resolve an integer type code; a negated integer code means unsigned
    pub fn from_code(raw: i32) -> Result<Self> {
        let unsigned = raw < 0;
        let ty = match raw.unsigned_abs() as i32 {
            code::VOID if !unsigned => Self::Void,
            code::VOIDP if !unsigned => Self::Pointer,
            code::CHAR => sign(unsigned, Self::CHAR, Self::UCHAR),
            code::SHORT => sign(unsigned, Self::SHORT, Self::USHORT),
            code::INT => sign(unsigned, Self::INT, Self::UINT),
            code::LONG => sign(unsigned, Self::LONG, Self::ULONG),
            code::LONG_LONG => sign(unsigned, Self::LONG_LONG, Self::ULONG_LONG),
            code::FLOAT if !unsigned => Self::Float,
            code::DOUBLE if !unsigned => Self::Double,
            code::CONST_STRING if !unsigned => Self::ConstString,
            code::BOOL if !unsigned => Self::Bool,
            _ => return Err(Error::UnknownType(format!("type code {}", raw))),
        };
        Ok(ty)
    }
}

#[inline]
const fn sign(unsigned: bool, signed: NativeType, unsigned_ty: NativeType) -> NativeType {
    if unsigned {
        unsigned_ty
    } else {
        signed
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Integer { width, signed } => {
                let prefix = if *signed { "" } else { "u" };
                write!(f, "{}int{}_t", prefix, width.bytes() * 8)
            }
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Bool => f.write_str("bool"),
            Self::Pointer => f.write_str("void*"),
            Self::ConstString => f.write_str("const char*"),
        }
    }
}

/// Integer type codes
pub mod code {
    pub const VOID: i32 = 0;
    pub const VOIDP: i32 = 1;
    pub const CHAR: i32 = 2;
    pub const SHORT: i32 = 3;
    pub const INT: i32 = 4;
    pub const LONG: i32 = 5;
    pub const LONG_LONG: i32 = 6;
    pub const FLOAT: i32 = 7;
    pub const DOUBLE: i32 = 8;
    // 9 is reserved for variadic arguments, which are not supported
    pub const CONST_STRING: i32 = 10;
    pub const BOOL: i32 = 11;
}

/// Anything that names a native type
pub trait IntoNativeType {
    fn into_native_type(self) -> Result<NativeType>;
}

impl IntoNativeType for NativeType {
    #[inline]
    fn into_native_type(self) -> Result<NativeType> {
        Ok(self)
    }
}

impl IntoNativeType for &str {
    fn into_native_type(self) -> Result<NativeType> {
        NativeType::resolve(self)
    }
}

impl IntoNativeType for String {
    fn into_native_type(self) -> Result<NativeType> {
        NativeType::resolve(&self)
    }
}

impl IntoNativeType for &String {
    fn into_native_type(self) -> Result<NativeType> {
        NativeType::resolve(self)
    }
}

impl IntoNativeType for i32 {
    fn into_native_type(self) -> Result<NativeType> {
        NativeType::from_code(self)
    }
}

#[cfg(test)]
mod tests;
