use super::*;
use crate::memory::NativeBuffer;
use crate::value::Convert;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Converts to a fixed value and counts how often it was asked
#[derive(Debug)]
struct Counting {
    result: Value,
    calls: AtomicUsize,
}

impl Counting {
    fn new(result: Value) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Convert for Counting {
    fn convert(&self, _target: NativeType) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

#[derive(Debug)]
struct Failing;

impl Convert for Failing {
    fn convert(&self, _target: NativeType) -> Result<Value> {
        Err(Error::Conversion("refused".into()))
    }
}

fn coerce(value: &Value, ty: NativeType) -> Result<FfiValue> {
    coerce_argument(value, ty, &mut TempStorage::new())
}

#[test]
fn direct_integer() {
    let slot = coerce(&Value::Int(-7), NativeType::INT32).unwrap();
    assert_eq!(unsafe { slot.i32 }, -7);
}

#[test]
fn integer_wraps_to_width() {
    let slot = coerce(&Value::Int(0x1_0000_0005), NativeType::INT32).unwrap();
    assert_eq!(unsafe { slot.i32 }, 5);

    let slot = coerce(&Value::Int(-1), NativeType::UINT8).unwrap();
    assert_eq!(unsafe { slot.u8 }, 0xff);

    let slot = coerce(&Value::UInt(u64::MAX), NativeType::INT64).unwrap();
    assert_eq!(unsafe { slot.i64 }, -1);
}

#[test]
fn integers_widen_to_double() {
    let slot = coerce(&Value::Int(3), NativeType::Double).unwrap();
    assert_eq!(unsafe { slot.f64 }, 3.0);

    let slot = coerce(&Value::Float(0.5), NativeType::Float).unwrap();
    assert_eq!(unsafe { slot.f32 }, 0.5);
}

#[test]
fn float_rejected_for_integer() {
    let err = coerce(&Value::Float(1.0), NativeType::INT).unwrap_err();
    assert!(matches!(err, Error::Type { found: "float", .. }));
}

#[test]
fn bool_slot() {
    assert_eq!(unsafe { coerce(&Value::Bool(true), NativeType::Bool).unwrap().u8 }, 1);
    assert_eq!(unsafe { coerce(&Value::Int(0), NativeType::Bool).unwrap().u8 }, 0);
    assert!(coerce(&Value::Bool(true), NativeType::INT).is_err());
}

#[test]
fn pointer_forms() {
    assert!(unsafe { coerce(&Value::Null, NativeType::Pointer).unwrap().ptr }.is_null());

    let slot = coerce(&Value::Pointer(Address::new(0x40)), NativeType::Pointer).unwrap();
    assert_eq!(unsafe { slot.ptr } as usize, 0x40);

    let slot = coerce(&Value::Int(0x80), NativeType::Pointer).unwrap();
    assert_eq!(unsafe { slot.ptr } as usize, 0x80);
}

#[test]
fn strings_copied_into_temporaries() {
    let mut temps = TempStorage::new();
    let slot = coerce_argument(&Value::from("123"), NativeType::ConstString, &mut temps).unwrap();
    assert_eq!(temps.len(), 1);
    let copied = unsafe { Address::from_ptr(slot.ptr).read_c_string() };
    assert_eq!(copied.as_deref(), Some("123"));

    coerce_argument(&Value::Bytes(b"ab".to_vec()), NativeType::Pointer, &mut temps).unwrap();
    assert_eq!(temps.len(), 2);
}

#[test]
fn buffer_passes_its_address() {
    let buf = NativeBuffer::malloc(8);
    let mut temps = TempStorage::new();
    let slot = coerce_argument(&Value::Buffer(buf.clone()), NativeType::Pointer, &mut temps).unwrap();
    assert_eq!(Address::from_ptr(unsafe { slot.ptr }), buf.address().unwrap());
    assert_eq!(temps.pinned(), 1);
    assert_eq!(temps.len(), 0);
}

#[test]
fn pinned_buffer_survives_free_until_call_ends() {
    let buf = NativeBuffer::malloc(8);
    let addr = buf.address().unwrap();
    let mut temps = TempStorage::new();
    coerce_argument(&Value::Buffer(buf.clone()), NativeType::Pointer, &mut temps).unwrap();

    assert!(buf.free());
    assert!(crate::memory::is_live(addr));
    drop(temps);
}

#[test]
fn freed_buffer_rejected() {
    let buf = NativeBuffer::malloc(8);
    buf.free();
    let err = coerce(&Value::Buffer(buf), NativeType::Pointer).unwrap_err();
    assert!(matches!(err, Error::Freed(_)));
}

#[test]
fn conversion_runs_once() {
    let conv = Counting::new(Value::Int(9));
    let value = Value::Object(conv.clone());
    let slot = coerce(&value, NativeType::LONG).unwrap();
    assert_eq!(unsafe { slot.i64 } as i32 as i64, 9);
    assert_eq!(conv.calls(), 1);
}

#[test]
fn conversion_not_retried_on_mismatch() {
    let conv = Counting::new(Value::Float(1.5));
    let err = coerce(&Value::Object(conv.clone()), NativeType::INT).unwrap_err();
    assert!(matches!(err, Error::Type { found: "float", .. }));
    assert_eq!(conv.calls(), 1);
}

#[test]
fn conversion_to_object_is_rejected() {
    let inner = Counting::new(Value::Int(1));
    let outer = Counting::new(Value::Object(inner.clone()));
    let err = coerce(&Value::Object(outer.clone()), NativeType::INT).unwrap_err();
    assert!(matches!(err, Error::Type { found: "object", .. }));
    assert_eq!(outer.calls(), 1);
    assert_eq!(inner.calls(), 0);
}

#[test]
fn conversion_error_propagates() {
    let err = coerce(&Value::object(Failing), NativeType::INT).unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
}

#[test]
fn shared_object_converted_once_per_slot() {
    let conv = Counting::new(Value::Int(2));
    let value = Value::Object(conv.clone());
    let slots = marshal_args(
        &[value.clone(), value],
        &[NativeType::INT, NativeType::INT],
        &mut TempStorage::new(),
    )
    .unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(conv.calls(), 2);
}

#[test]
fn marshal_stops_at_first_error() {
    let conv = Counting::new(Value::Int(2));
    let result = marshal_args(
        &[Value::Float(1.0), Value::Object(conv.clone())],
        &[NativeType::INT, NativeType::INT],
        &mut TempStorage::new(),
    );
    assert!(result.is_err());
    assert_eq!(conv.calls(), 0);
}

#[test]
fn void_is_never_an_argument() {
    assert!(coerce(&Value::Null, NativeType::Void).is_err());
}

#[test]
fn return_values_unmarshal() {
    let mut raw = FfiValue::zeroed();
    raw.reg = usize::MAX;
    unsafe {
        assert_eq!(from_native(raw, NativeType::INT8), Value::Int(-1));
        assert_eq!(from_native(raw, NativeType::UINT16), Value::UInt(0xffff));
        assert_eq!(from_native(raw, NativeType::INT32), Value::Int(-1));
        assert_eq!(from_native(raw, NativeType::Bool), Value::Bool(true));
        assert_eq!(from_native(raw, NativeType::Void), Value::Null);
    }

    let mut raw = FfiValue::zeroed();
    raw.f64 = 2.5;
    assert_eq!(unsafe { from_native(raw, NativeType::Double) }, Value::Float(2.5));

    let raw = FfiValue::zeroed();
    assert_eq!(unsafe { from_native(raw, NativeType::ConstString) }, Value::Null);
    assert_eq!(
        unsafe { from_native(raw, NativeType::Pointer) },
        Value::Pointer(Address::NULL)
    );
}

proptest! {
    #[test]
    fn int32_slot_keeps_low_bits(v in any::<i64>()) {
        let slot = coerce(&Value::Int(v), NativeType::INT32).unwrap();
        prop_assert_eq!(unsafe { slot.i32 }, v as i32);
    }

    #[test]
    fn uint16_slot_keeps_low_bits(v in any::<u64>()) {
        let slot = coerce(&Value::UInt(v), NativeType::UINT16).unwrap();
        prop_assert_eq!(unsafe { slot.u16 }, v as u16);
    }
}
