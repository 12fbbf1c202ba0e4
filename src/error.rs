//! Error taxonomy for construction and invocation
//!
//! Native-side failures (errno, Win32 last-error) are never reported here;
//! they are captured into the per-thread slots of [`crate::errno`].

use crate::types::NativeType;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised synchronously at the call site, before any native code runs
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A type tag that does not name any native type
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A value (or the result of its one conversion) does not fit the slot
    #[error("type error: expected {expected}, got {found}")]
    Type {
        expected: NativeType,
        found: &'static str,
    },

    /// Signature that cannot describe a native function
    #[error("invalid signature: {0}")]
    Signature(String),

    /// Argument count differs from the signature
    #[error("wrong number of arguments (given {got}, expected {expected})")]
    Arity { expected: usize, got: usize },

    /// Library could not be opened
    #[error("failed to load library '{name}': {reason}")]
    Load { name: String, reason: String },

    /// Symbol lookup failed
    #[error("unknown symbol '{symbol}' in '{library}'")]
    Symbol { library: String, symbol: String },

    /// Native memory could not be allocated
    #[error("cannot allocate {size} bytes of native memory")]
    Alloc { size: usize },

    /// Native resource used after release
    #[error("use of freed native resource at {0:#x}")]
    Freed(usize),

    /// Method not installed on an object
    #[error("undefined method '{method}' for {receiver}")]
    NoMethod { receiver: String, method: String },

    /// Raised by a user conversion
    #[error("conversion failed: {0}")]
    Conversion(String),
}

impl Error {
    /// True for errors that correspond to an argument-count mismatch
    pub fn is_arity(&self) -> bool {
        matches!(self, Self::Arity { .. })
    }

    /// True for coercion and type-resolution failures
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Self::Type { .. } | Self::UnknownType(_) | Self::Signature(_)
        )
    }

    /// True for library/symbol resolution failures
    pub fn is_dl(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Symbol { .. })
    }
}
