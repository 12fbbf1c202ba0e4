//! natcall - call native functions through typed signatures
//!
//! A `Function` binds one resolved symbol address to a call signature
//! (argument types, return type, calling convention). Calling it coerces
//! host `Value`s into native argument slots, dispatches through libffi,
//! records the native error state for the calling thread and converts the
//! return slot back into a `Value`.
//!
//! Architecture:
//! - `types` - native type descriptors and tag resolution
//! - `value` - host values and the single-shot conversion protocol
//! - `marshal` - host ↔ native coercion, per-call temporary storage
//! - `abi` - calling conventions and the libffi call interface
//! - `function` - the callable wrapper
//! - `invoke` - call adaptation (procs, installed methods)
//! - `runtime` - global execution lock
//! - `errno` - last-error capture
//! - `memory` - native buffers and allocation auditing
//! - `library` - symbol resolution

pub mod abi;
pub mod errno;
pub mod error;
pub mod function;
pub mod invoke;
pub mod library;
pub mod logging;
pub mod marshal;
pub mod memory;
pub mod runtime;
pub mod stats;
pub mod types;
pub mod value;

pub use abi::CallingConvention;
pub use errno::{last_error, set_last_error};
#[cfg(windows)]
pub use errno::{
    set_win32_last_error, set_win32_last_socket_error, win32_last_error,
    win32_last_socket_error,
};
pub use error::{Error, Result};
pub use function::{Function, FunctionOptions};
pub use invoke::{Closure, Invoke, Object, Proc};
pub use library::Library;
pub use memory::NativeBuffer;
pub use runtime::{ExecutionContext, Runtime};
pub use stats::{stats, InteropStats};
pub use types::{IntWidth, IntoNativeType, NativeType};
pub use value::{Address, Convert, Value};
