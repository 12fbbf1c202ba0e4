//! Type marshaling - host values ↔ native slots
//!
//! Coercion order per argument:
//! 1. the value's own native form, if it has one for the slot's category
//! 2. one call to [`Convert::convert`] for `Value::Object`, never retried
//! 3. otherwise a type error
//!
//! Integers are stored with fixed-width wraparound: only the low bits of the
//! host integer that fit the slot are kept.
//!
//! [`Convert::convert`]: crate::value::Convert::convert

use core::ffi::c_void;

use smallvec::SmallVec;

use crate::abi::FfiValue;
use crate::error::{Error, Result};
use crate::logging;
use crate::memory::{NativeBuffer, Pinned};
use crate::types::{IntWidth, NativeType};
use crate::value::{Address, Value};

/// Per-call native storage: copies of host strings and pins on buffers
///
/// Released on drop, exactly once, whether or not the call happened. A
/// buffer freed while pinned here stays allocated until this drops.
#[derive(Debug, Default)]
pub struct TempStorage {
    blocks: SmallVec<[Box<[u8]>; 2]>,
    pins: SmallVec<[Pinned; 2]>,
}

impl TempStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `bytes` plus a terminating NUL; returns the copy's address
    fn hold(&mut self, bytes: &[u8]) -> *mut c_void {
        let mut block = Vec::with_capacity(bytes.len() + 1);
        block.extend_from_slice(bytes);
        block.push(0);
        let mut block = block.into_boxed_slice();
        let ptr = block.as_mut_ptr() as *mut c_void;
        self.blocks.push(block);
        ptr
    }

    /// Pin `buf` for the rest of the call; returns its address
    fn pin(&mut self, buf: &NativeBuffer) -> Result<*mut c_void> {
        let pinned = buf.pin()?;
        let ptr = pinned.as_ptr() as *mut c_void;
        self.pins.push(pinned);
        Ok(ptr)
    }

    /// Number of string copies held
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.pins.is_empty()
    }

    /// Number of buffers pinned
    pub fn pinned(&self) -> usize {
        self.pins.len()
    }
}

/// Coerce one host value into a native argument slot
pub fn coerce_argument(value: &Value, ty: NativeType, temps: &mut TempStorage) -> Result<FfiValue> {
    if let Some(slot) = direct(value, ty, temps)? {
        return Ok(slot);
    }

    match value {
        Value::Object(obj) => {
            logging::log_coercion(value.kind(), &ty);
            let converted = obj.convert(ty)?;
            direct(&converted, ty, temps)?.ok_or(Error::Type {
                expected: ty,
                found: converted.kind(),
            })
        }
        other => Err(Error::Type {
            expected: ty,
            found: other.kind(),
        }),
    }
}

/// Coerce a full argument list; `values.len()` must equal `types.len()`
pub fn marshal_args(
    values: &[Value],
    types: &[NativeType],
    temps: &mut TempStorage,
) -> Result<SmallVec<[FfiValue; 8]>> {
    debug_assert_eq!(values.len(), types.len());
    values
        .iter()
        .zip(types)
        .map(|(value, &ty)| coerce_argument(value, ty, temps))
        .collect()
}

/// Native form of a value without any conversion, `None` if it has none
fn direct(value: &Value, ty: NativeType, temps: &mut TempStorage) -> Result<Option<FfiValue>> {
    let mut slot = FfiValue::zeroed();
    match ty {
        NativeType::Void => return Ok(None),
        NativeType::Integer { width, .. } => {
            let bits = match value {
                Value::Int(v) => *v as u64,
                Value::UInt(v) => *v,
                _ => return Ok(None),
            };
            store_int(&mut slot, width, bits);
        }
        NativeType::Bool => {
            slot.u8 = match value {
                Value::Bool(b) => *b as u8,
                Value::Int(v) => (*v != 0) as u8,
                Value::UInt(v) => (*v != 0) as u8,
                _ => return Ok(None),
            };
        }
        NativeType::Float | NativeType::Double => {
            let v = match value {
                Value::Float(v) => *v,
                Value::Int(v) => *v as f64,
                Value::UInt(v) => *v as f64,
                _ => return Ok(None),
            };
            if ty == NativeType::Float {
                slot.f32 = v as f32;
            } else {
                slot.f64 = v;
            }
        }
        NativeType::Pointer | NativeType::ConstString => {
            slot.ptr = match value {
                Value::Null => core::ptr::null_mut(),
                Value::Pointer(addr) => addr.as_ptr(),
                Value::Int(v) => *v as usize as *mut c_void,
                Value::UInt(v) => *v as usize as *mut c_void,
                Value::Buffer(buf) => temps.pin(buf)?,
                Value::Str(s) => temps.hold(s.as_bytes()),
                Value::Bytes(b) => temps.hold(b),
                _ => return Ok(None),
            };
        }
    }
    Ok(Some(slot))
}

/// Store the low `width` bits of `bits`
#[inline]
fn store_int(slot: &mut FfiValue, width: IntWidth, bits: u64) {
    match width {
        IntWidth::W8 => slot.u8 = bits as u8,
        IntWidth::W16 => slot.u16 = bits as u16,
        IntWidth::W32 => slot.u32 = bits as u32,
        IntWidth::W64 => slot.u64 = bits,
    }
}

/// Convert a raw return slot into a host value
///
/// # Safety
/// `raw` must be the return slot of a call whose return type is `ty`; for
/// `ConstString` the pointer must be null or a readable C string.
pub unsafe fn from_native(raw: FfiValue, ty: NativeType) -> Value {
    match ty {
        NativeType::Void => Value::Null,
        NativeType::Integer {
            width: IntWidth::W64,
            signed,
        } => {
            if signed {
                Value::Int(raw.i64)
            } else {
                Value::UInt(raw.u64)
            }
        }
        // Narrow integral returns arrive widened to a full register
        NativeType::Integer { width, signed } => {
            let reg = raw.reg;
            match (width, signed) {
                (IntWidth::W8, true) => Value::Int(reg as i8 as i64),
                (IntWidth::W16, true) => Value::Int(reg as i16 as i64),
                (_, true) => Value::Int(reg as i32 as i64),
                (IntWidth::W8, false) => Value::UInt(reg as u8 as u64),
                (IntWidth::W16, false) => Value::UInt(reg as u16 as u64),
                (_, false) => Value::UInt(reg as u32 as u64),
            }
        }
        NativeType::Bool => Value::Bool(raw.reg as u8 != 0),
        NativeType::Float => Value::Float(raw.f32 as f64),
        NativeType::Double => Value::Float(raw.f64),
        NativeType::Pointer => Value::Pointer(Address::from_ptr(raw.ptr)),
        NativeType::ConstString => match Address::from_ptr(raw.ptr).read_c_string() {
            Some(s) => Value::Str(s),
            None => Value::Null,
        },
    }
}

#[cfg(test)]
mod tests;
