use super::*;

extern "C" fn add_i32(a: i32, b: i32) -> i32 {
    a + b
}

extern "C" fn mul_f64(a: f64, b: f64) -> f64 {
    a * b
}

extern "C" fn half_f32(a: f32) -> f32 {
    a / 2.0
}

extern "C" fn neg_i8(a: i8) -> i8 {
    a.wrapping_neg()
}

extern "C" fn mixed(a: i64, b: f64, c: u8, d: f32) -> f64 {
    a as f64 + b + c as f64 + d as f64
}

extern "C" fn identity_ptr(ptr: *mut c_void) -> *mut c_void {
    ptr
}

extern "C" fn no_args() -> i32 {
    42
}

fn address_of(f: *const ()) -> Address {
    Address::from_ptr(f)
}

fn slot_i32(v: i32) -> FfiValue {
    let mut s = FfiValue::zeroed();
    s.i32 = v;
    s
}

fn slot_f64(v: f64) -> FfiValue {
    let mut s = FfiValue::zeroed();
    s.f64 = v;
    s
}

#[test]
fn test_convention_default() {
    assert_eq!(CallingConvention::default(), CallingConvention::Default);
    assert!(!CallingConvention::Default.is_distinct());
}

#[test]
fn test_call_no_args() {
    let iface = CallInterface::new(vec![], NativeType::INT32, CallingConvention::Default);
    assert_eq!(iface.arity(), 0);
    let ret = unsafe { iface.invoke(address_of(no_args as *const ()), &mut []) };
    assert_eq!(unsafe { ret.reg } as i32, 42);
}

#[test]
fn test_call_int_args() {
    let iface = CallInterface::new(
        vec![NativeType::INT32, NativeType::INT32],
        NativeType::INT32,
        CallingConvention::Default,
    );
    let mut args = [slot_i32(40), slot_i32(2)];
    let ret = unsafe { iface.invoke(address_of(add_i32 as *const ()), &mut args) };
    assert_eq!(unsafe { ret.reg } as i32, 42);
}

#[test]
fn test_call_double_args() {
    let iface = CallInterface::new(
        vec![NativeType::Double, NativeType::Double],
        NativeType::Double,
        CallingConvention::Default,
    );
    let mut args = [slot_f64(1.5), slot_f64(4.0)];
    let ret = unsafe { iface.invoke(address_of(mul_f64 as *const ()), &mut args) };
    assert_eq!(unsafe { ret.f64 }, 6.0);
}

#[test]
fn test_call_float_return() {
    let iface = CallInterface::new(vec![NativeType::Float], NativeType::Float, CallingConvention::Default);
    let mut arg = FfiValue::zeroed();
    arg.f32 = 3.0;
    let ret = unsafe { iface.invoke(address_of(half_f32 as *const ()), &mut [arg]) };
    assert_eq!(unsafe { ret.f32 }, 1.5);
}

#[test]
fn test_narrow_return_widened() {
    let iface = CallInterface::new(vec![NativeType::INT8], NativeType::INT8, CallingConvention::Default);
    let mut arg = FfiValue::zeroed();
    arg.i8 = 5;
    let ret = unsafe { iface.invoke(address_of(neg_i8 as *const ()), &mut [arg]) };
    assert_eq!(unsafe { ret.reg } as i8, -5);
}

#[test]
fn test_mixed_register_classes() {
    let iface = CallInterface::new(
        vec![NativeType::INT64, NativeType::Double, NativeType::UINT8, NativeType::Float],
        NativeType::Double,
        CallingConvention::Default,
    );
    let mut a = FfiValue::zeroed();
    a.i64 = 10;
    let mut c = FfiValue::zeroed();
    c.u8 = 3;
    let mut d = FfiValue::zeroed();
    d.f32 = 0.5;
    let mut args = [a, slot_f64(0.25), c, d];
    let ret = unsafe { iface.invoke(address_of(mixed as *const ()), &mut args) };
    assert_eq!(unsafe { ret.f64 }, 13.75);
}

#[test]
fn test_pointer_round_trip() {
    let iface = CallInterface::new(vec![NativeType::Pointer], NativeType::Pointer, CallingConvention::Default);
    let target = 0x1234usize as *mut c_void;
    let ret = unsafe {
        iface.invoke(address_of(identity_ptr as *const ()), &mut [FfiValue::from_ptr(target)])
    };
    assert_eq!(unsafe { ret.ptr }, target);
}

#[test]
fn test_stdcall_accepted() {
    let iface = CallInterface::new(
        vec![NativeType::INT32, NativeType::INT32],
        NativeType::INT32,
        CallingConvention::Stdcall,
    );
    assert_eq!(iface.convention(), CallingConvention::Stdcall);
    // On targets without a distinct stdcall this is the C convention
    if !CallingConvention::Stdcall.is_distinct() {
        let mut args = [slot_i32(1), slot_i32(2)];
        let ret = unsafe { iface.invoke(address_of(add_i32 as *const ()), &mut args) };
        assert_eq!(unsafe { ret.reg } as i32, 3);
    }
}

#[test]
fn test_interface_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CallInterface>();
}
