//! Callable wrapper around one native symbol
//!
//! A `Function` owns nothing native: it borrows the symbol address from
//! whatever loaded it and must not outlive that library. Everything it holds
//! is fixed at construction, so clones share one immutable state and may be
//! called from any number of threads at once.

use std::fmt;
use std::sync::Arc;

use crate::abi::{CallInterface, CallingConvention, FfiValue};
use crate::errno;
use crate::error::{Error, Result};
use crate::invoke::{Invoke, Proc};
use crate::logging;
use crate::marshal::{self, TempStorage};
use crate::runtime::ExecutionContext;
use crate::stats;
use crate::types::{IntoNativeType, NativeType};
use crate::value::{Address, Value};

/// Construction options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionOptions {
    name: Option<String>,
    abi: CallingConvention,
    release_lock: bool,
}

impl FunctionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name, used in logs and by `Function::name`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn abi(mut self, abi: CallingConvention) -> Self {
        self.abi = abi;
        self
    }

    /// Release the execution lock while the native body runs
    pub fn release_lock(mut self, release: bool) -> Self {
        self.release_lock = release;
        self
    }
}

struct Inner {
    address: Address,
    interface: CallInterface,
    name: Option<String>,
    label: String,
    release_lock: bool,
}

/// Native function bound to a call signature
#[derive(Clone)]
pub struct Function {
    inner: Arc<Inner>,
}

impl Function {
    /// Bind `address` to a signature
    ///
    /// Fails if a type tag does not resolve, an argument is `void`, or the
    /// address is null.
    ///
    /// # Safety
    /// `address` must be a function taking exactly `arg_types` and returning
    /// `return_type` under the chosen convention, and must stay valid for as
    /// long as this `Function` (or any clone or proc made from it) is called.
    pub unsafe fn new<A, T, R>(
        address: Address,
        arg_types: A,
        return_type: R,
        options: FunctionOptions,
    ) -> Result<Self>
    where
        A: IntoIterator<Item = T>,
        T: IntoNativeType,
        R: IntoNativeType,
    {
        let arg_types = arg_types
            .into_iter()
            .map(IntoNativeType::into_native_type)
            .collect::<Result<Vec<_>>>()?;
        let return_type = return_type.into_native_type()?;

        if let Some(pos) = arg_types.iter().position(|t| *t == NativeType::Void) {
            return Err(Error::Signature(format!("argument {} is void", pos)));
        }
        if address.is_null() {
            return Err(Error::Signature("null function address".to_string()));
        }

        let label = match &options.name {
            Some(name) => name.clone(),
            None => address.to_string(),
        };
        let interface = CallInterface::new(arg_types, return_type, options.abi);

        Ok(Self {
            inner: Arc::new(Inner {
                address,
                interface,
                name: options.name,
                label,
                release_lock: options.release_lock,
            }),
        })
    }

    /// Call with exactly `arity()` arguments
    ///
    /// Arity and coercion failures return before any native code runs. The
    /// calling thread's last-error slots are refreshed right after the native
    /// body returns.
    pub fn call(&self, cx: &mut ExecutionContext<'_>, args: &[Value]) -> Result<Value> {
        let inner = &*self.inner;
        let _span = tracing::trace_span!("ffi_call", function = %inner.label).entered();

        if args.len() != inner.interface.arity() {
            stats::record_arity_error();
            let err = Error::Arity {
                expected: inner.interface.arity(),
                got: args.len(),
            };
            logging::log_ffi_error(&inner.label, &err);
            return Err(err);
        }

        let mut temps = TempStorage::new();
        let mut slots = marshal::marshal_args(args, inner.interface.arg_types(), &mut temps)
            .map_err(|err| {
                stats::record_coercion_error();
                logging::log_ffi_error(&inner.label, &err);
                err
            })?;

        logging::log_ffi_call(&inner.label, args.len(), inner.release_lock);
        let (raw, errno) = if inner.release_lock {
            logging::log_lock_release(&inner.label);
            cx.without_lock(|| self.dispatch(&mut slots))
        } else {
            self.dispatch(&mut slots)
        };
        drop(temps);

        stats::record_call(inner.release_lock);
        logging::log_ffi_return(&inner.label, errno);

        // Safety: raw is the return slot of a call typed by the interface
        Ok(unsafe { marshal::from_native(raw, inner.interface.return_type()) })
    }

    /// Native body plus immediate error capture
    fn dispatch(&self, slots: &mut [FfiValue]) -> (FfiValue, i32) {
        // Safety: the constructor's contract covers the address and signature,
        // and every slot was produced by coercion to its declared type
        let raw = unsafe { self.inner.interface.invoke(self.inner.address, slots) };
        let errno = errno::capture();
        (raw, errno)
    }

    /// Proc sharing this function's state
    pub fn to_proc(&self) -> Proc {
        Proc::new(self.clone())
    }

    /// Symbol address
    #[inline]
    pub fn ptr(&self) -> Address {
        self.inner.address
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    #[inline]
    pub fn abi(&self) -> CallingConvention {
        self.inner.interface.convention()
    }

    #[inline]
    pub fn arg_types(&self) -> &[NativeType] {
        self.inner.interface.arg_types()
    }

    #[inline]
    pub fn return_type(&self) -> NativeType {
        self.inner.interface.return_type()
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.inner.interface.arity()
    }

    #[inline]
    pub fn releases_lock(&self) -> bool {
        self.inner.release_lock
    }
}

impl Invoke for Function {
    fn arity(&self) -> usize {
        Function::arity(self)
    }

    fn invoke(&self, cx: &mut ExecutionContext<'_>, args: &[Value]) -> Result<Value> {
        self.call(cx, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("address", &self.inner.address)
            .field("name", &self.inner.name)
            .field("arg_types", &self.arg_types())
            .field("return_type", &self.return_type())
            .field("abi", &self.abi())
            .field("release_lock", &self.inner.release_lock)
            .finish()
    }
}
