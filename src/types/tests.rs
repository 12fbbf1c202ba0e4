use super::*;
use core::ffi::c_long;

#[test]
fn test_fixed_width_sizes() {
    assert_eq!(NativeType::INT8.size(), 1);
    assert_eq!(NativeType::INT16.size(), 2);
    assert_eq!(NativeType::INT32.size(), 4);
    assert_eq!(NativeType::INT64.size(), 8);
    assert_eq!(NativeType::Float.size(), 4);
    assert_eq!(NativeType::Double.size(), 8);
    assert_eq!(NativeType::Void.size(), 0);
}

#[test]
fn test_platform_sizes() {
    assert_eq!(NativeType::LONG.size(), core::mem::size_of::<c_long>());
    assert_eq!(NativeType::SIZE_T.size(), core::mem::size_of::<usize>());
    assert_eq!(NativeType::VOIDP.size(), core::mem::size_of::<*const u8>());
    assert_eq!(NativeType::UINTPTR_T.size(), NativeType::VOIDP.size());
}

#[test]
fn test_alignment() {
    assert_eq!(NativeType::INT8.align(), 1);
    assert_eq!(NativeType::Double.align(), core::mem::align_of::<f64>());
    assert_eq!(NativeType::Pointer.align(), core::mem::align_of::<usize>());
}

#[test]
fn test_resolve_c_spellings() {
    assert_eq!(NativeType::resolve("double").unwrap(), NativeType::Double);
    assert_eq!(NativeType::resolve("int").unwrap(), NativeType::INT);
    assert_eq!(NativeType::resolve("long").unwrap(), NativeType::LONG);
    assert_eq!(NativeType::resolve("unsigned  long").unwrap(), NativeType::ULONG);
    assert_eq!(NativeType::resolve("size_t").unwrap(), NativeType::SIZE_T);
    assert_eq!(NativeType::resolve("void").unwrap(), NativeType::Void);
}

#[test]
fn test_resolve_pointers() {
    assert_eq!(NativeType::resolve("void*").unwrap(), NativeType::Pointer);
    assert_eq!(NativeType::resolve("void *").unwrap(), NativeType::Pointer);
    assert_eq!(NativeType::resolve("char*").unwrap(), NativeType::Pointer);
    assert_eq!(NativeType::resolve("const char *").unwrap(), NativeType::ConstString);
    assert!(NativeType::resolve("*").is_err());
}

#[test]
fn test_resolve_unknown_tag() {
    let err = NativeType::resolve("quadruple").unwrap_err();
    assert!(err.is_type());
    assert!(err.to_string().contains("quadruple"));
}

#[test]
fn test_type_codes() {
    assert_eq!(NativeType::from_code(code::DOUBLE).unwrap(), NativeType::Double);
    assert_eq!(NativeType::from_code(code::VOIDP).unwrap(), NativeType::Pointer);
    assert_eq!(NativeType::from_code(-code::INT).unwrap(), NativeType::UINT);
    assert_eq!(NativeType::from_code(-code::LONG).unwrap(), NativeType::ULONG);
    assert_eq!(NativeType::from_code(code::LONG_LONG).unwrap(), NativeType::INT64);
    assert_eq!(NativeType::from_code(-code::CHAR).unwrap(), NativeType::UINT8);
}

#[test]
fn test_c_widths_match_platform() {
    let cases = [
        (NativeType::SHORT, core::mem::size_of::<core::ffi::c_short>()),
        (NativeType::INT, core::mem::size_of::<core::ffi::c_int>()),
        (NativeType::LONG, core::mem::size_of::<c_long>()),
        (NativeType::ULONG_LONG, core::mem::size_of::<core::ffi::c_longlong>()),
        (NativeType::SIZE_T, core::mem::size_of::<usize>()),
    ];
    for (ty, bytes) in cases {
        assert_eq!(ty.size(), bytes, "{}", ty);
        assert!(matches!(ty, NativeType::Integer { width, .. } if width.bytes() == bytes));
    }
}

#[test]
fn test_type_codes_rejected() {
    // variadic
    assert!(NativeType::from_code(9).is_err());
    // unsigned only applies to integers
    assert!(NativeType::from_code(-code::DOUBLE).is_err());
    assert!(NativeType::from_code(99).is_err());
}

#[test]
fn test_category_checks() {
    assert!(NativeType::INT.is_integral());
    assert!(NativeType::Double.is_float());
    assert!(!NativeType::Void.is_integral());
    assert!(!NativeType::Pointer.is_float());
    assert!(NativeType::ConstString.is_pointer());
}

#[test]
fn test_display() {
    assert_eq!(NativeType::INT32.to_string(), "int32_t");
    assert_eq!(NativeType::UINT8.to_string(), "uint8_t");
    assert_eq!(NativeType::Pointer.to_string(), "void*");
}

#[test]
fn test_into_native_type() {
    assert_eq!("double".into_native_type().unwrap(), NativeType::Double);
    assert_eq!(String::from("int").into_native_type().unwrap(), NativeType::INT);
    assert_eq!(code::FLOAT.into_native_type().unwrap(), NativeType::Float);
    assert_eq!(NativeType::Bool.into_native_type().unwrap(), NativeType::Bool);
}
