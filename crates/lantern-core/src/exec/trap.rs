//! Structured execution errors.
//!
//! Traps cover every failure the engine can hit after a successful decode:
//! instantiation problems (bad indices, data segments that do not fit) and
//! runtime problems (stack underflow, out-of-bounds memory access, missing
//! imports). Host functions return traps too; nothing in the engine panics.

use alloc::string::String;
use core::fmt;

/// An instantiation or execution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    /// The named export does not exist.
    ExportNotFound { name: String },
    /// The named export exists but is not a function.
    ExportNotCallable { name: String },
    /// A function index is outside the function space.
    UnknownFunction { index: u32 },
    /// A type index is outside the type section.
    UnknownType { index: u32 },
    /// A local index is outside the frame's locals.
    UnknownLocal { index: u32 },
    /// An instruction needed more operands than the stack holds.
    StackUnderflow,
    /// A value had the wrong type for the operation.
    TypeMismatch { expected: &'static str },
    /// A function declares a local of a type the executor cannot represent.
    UnsupportedLocalType,
    /// The module has no linear memory at the required index.
    NoMemory,
    /// A memory access fell outside the linear memory.
    MemoryOutOfBounds { addr: usize, len: usize },
    /// An active data segment does not fit in its target memory.
    DataOutOfBounds { offset: i32, len: usize },
    /// A structured block has no matching `end`.
    MissingEnd,
    /// A function with results produced none.
    MissingReturnValue,
    /// No host function is registered for an import.
    UnresolvedImport { module: String, field: String },
    /// The WASI shim does not implement the requested function.
    UnsupportedWasi { field: String },
    /// A host function failed.
    Host(String),
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::ExportNotFound { name } => write!(f, "export `{name}` not found"),
            Trap::ExportNotCallable { name } => {
                write!(f, "export `{name}` is not a function")
            }
            Trap::UnknownFunction { index } => write!(f, "unknown function index {index}"),
            Trap::UnknownType { index } => write!(f, "unknown type index {index}"),
            Trap::UnknownLocal { index } => write!(f, "unknown local index {index}"),
            Trap::StackUnderflow => write!(f, "operand stack underflow"),
            Trap::TypeMismatch { expected } => write!(f, "type mismatch (expected {expected})"),
            Trap::UnsupportedLocalType => write!(f, "unsupported local type"),
            Trap::NoMemory => write!(f, "linear memory not found"),
            Trap::MemoryOutOfBounds { addr, len } => {
                write!(f, "memory access out of bounds ({len} bytes at {addr})")
            }
            Trap::DataOutOfBounds { offset, len } => {
                write!(
                    f,
                    "data segment out of bounds ({len} bytes at offset {offset})"
                )
            }
            Trap::MissingEnd => write!(f, "structured block has no matching end"),
            Trap::MissingReturnValue => write!(f, "function returned no value"),
            Trap::UnresolvedImport { module, field } => {
                write!(f, "unresolved import `{module}`.`{field}`")
            }
            Trap::UnsupportedWasi { field } => {
                write!(f, "WASI function `{field}` is not implemented")
            }
            Trap::Host(msg) => write!(f, "host error: {msg}"),
        }
    }
}

impl core::error::Error for Trap {}
