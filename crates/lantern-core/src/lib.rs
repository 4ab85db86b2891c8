//! Lantern WebAssembly interpreter core.
//!
//! A `no_std`-capable (alloc-only) engine providing binary decoding,
//! instantiation, and execution of a small WebAssembly instruction subset,
//! plus just enough WASI to service `fd_write`. The `std` feature (on by
//! default) enables the WASI host shim; without it the engine still decodes
//! and executes modules against caller-supplied host imports.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod binary;
pub mod error;
pub mod exec;
pub mod types;

use core::fmt;

use crate::error::DecodeError;
use crate::exec::trap::Trap;

/// Any failure the engine can surface: a malformed binary at decode time,
/// or a trap at instantiation/execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Decode(DecodeError),
    Trap(Trap),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "{e}"),
            Error::Trap(t) => write!(f, "{t}"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<Trap> for Error {
    fn from(t: Trap) -> Self {
        Error::Trap(t)
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            Error::Trap(t) => Some(t),
        }
    }
}
