//! Error types for binary decoding.
//!
//! All errors carry byte offsets into the original binary and structured
//! context, enabling precise diagnostic messages.

use core::fmt;

/// The byte offset into the WASM binary where an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOffset(pub usize);

/// Contextual information about what was being decoded when the error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeContext {
    /// Decoding the WASM magic number.
    Magic,
    /// Decoding the WASM version number.
    Version,
    /// Decoding a section header.
    SectionHeader,
    /// Decoding section contents that have no dedicated context.
    SectionBody { id: u8 },
    /// Decoding a LEB128 value.
    Leb128,
    /// Decoding a length-prefixed name.
    Name,
    /// Decoding a custom section.
    CustomSection,
    /// Decoding the type section.
    TypeSection,
    /// Decoding the import section.
    ImportSection,
    /// Decoding the function section.
    FunctionSection,
    /// Decoding the memory section.
    MemorySection,
    /// Decoding the export section.
    ExportSection,
    /// Decoding the data section.
    DataSection,
    /// Decoding the code section.
    CodeSection,
}

impl fmt::Display for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeContext::Magic => write!(f, "WASM magic number"),
            DecodeContext::Version => write!(f, "WASM version"),
            DecodeContext::SectionHeader => write!(f, "section header"),
            DecodeContext::SectionBody { id } => write!(f, "section body (id={id})"),
            DecodeContext::Leb128 => write!(f, "LEB128 value"),
            DecodeContext::Name => write!(f, "name"),
            DecodeContext::CustomSection => write!(f, "custom section"),
            DecodeContext::TypeSection => write!(f, "type section"),
            DecodeContext::ImportSection => write!(f, "import section"),
            DecodeContext::FunctionSection => write!(f, "function section"),
            DecodeContext::MemorySection => write!(f, "memory section"),
            DecodeContext::ExportSection => write!(f, "export section"),
            DecodeContext::DataSection => write!(f, "data section"),
            DecodeContext::CodeSection => write!(f, "code section"),
        }
    }
}

/// Errors that can occur during binary decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Byte offset into the binary where the error was detected.
    pub offset: ByteOffset,
    /// What was being decoded.
    pub context: DecodeContext,
    /// The specific error kind.
    pub kind: DecodeErrorKind,
}

/// Specific categories of decode errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Unexpected end of input.
    UnexpectedEof,
    /// Invalid magic number (expected `\0asm`).
    InvalidMagic,
    /// Unsupported WASM version.
    UnsupportedVersion { found: u32 },
    /// LEB128 encoding exceeds the maximum number of bytes for the target type.
    Leb128TooLong,
    /// LEB128 encoding has unused bits set in the final byte (overlong/overflow).
    Leb128Overflow,
    /// Unknown section ID.
    UnknownSectionId { id: u8 },
    /// Section extends beyond the end of the binary.
    SectionOverflow,
    /// Sections are out of order (non-custom sections must be ordered by ID).
    SectionOutOfOrder { prev: u8, current: u8 },
    /// Duplicate non-custom section.
    DuplicateSection { id: u8 },
    /// Unknown value type encoding byte.
    UnknownValType { byte: u8 },
    /// Unexpected byte value.
    UnexpectedByte { expected: u8, found: u8 },
    /// Section body was not fully consumed.
    SectionSizeMismatch { expected: u32, consumed: u32 },
    /// A name is not valid UTF-8.
    InvalidUtf8Name,
    /// Unknown limits flag (expected 0x00 or 0x01).
    UnknownLimitsFlag { byte: u8 },
    /// Unknown import descriptor kind byte.
    UnknownImportKind { byte: u8 },
    /// Unknown export descriptor kind byte.
    UnknownExportKind { byte: u8 },
    /// Unknown or unsupported opcode byte.
    UnknownOpcode { byte: u8 },
    /// Unknown block type byte.
    UnknownBlockType { byte: u8 },
    /// Data segment offset expression uses an unsupported opcode.
    UnsupportedInitExpr { byte: u8 },
    /// The function and code sections disagree on the number of functions.
    FunctionCountMismatch { functions: u32, bodies: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decode error at byte {}: {}: {}",
            self.offset.0, self.context, self.kind
        )
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            DecodeErrorKind::InvalidMagic => write!(f, "invalid magic number (expected \\0asm)"),
            DecodeErrorKind::UnsupportedVersion { found } => {
                write!(f, "unsupported WASM version {found} (expected 1)")
            }
            DecodeErrorKind::Leb128TooLong => write!(f, "LEB128 encoding too long"),
            DecodeErrorKind::Leb128Overflow => write!(f, "LEB128 overflow (unused bits set)"),
            DecodeErrorKind::UnknownSectionId { id } => {
                write!(f, "unknown section ID {id:#04x}")
            }
            DecodeErrorKind::SectionOverflow => {
                write!(f, "section extends beyond end of binary")
            }
            DecodeErrorKind::SectionOutOfOrder { prev, current } => {
                write!(
                    f,
                    "section {current} appears after section {prev} (out of order)"
                )
            }
            DecodeErrorKind::DuplicateSection { id } => {
                write!(f, "duplicate section (id={id})")
            }
            DecodeErrorKind::UnknownValType { byte } => {
                write!(f, "unknown value type {byte:#04x}")
            }
            DecodeErrorKind::UnexpectedByte { expected, found } => {
                write!(f, "expected {expected:#04x}, found {found:#04x}")
            }
            DecodeErrorKind::SectionSizeMismatch { expected, consumed } => {
                write!(
                    f,
                    "section size mismatch: declared {expected} bytes, consumed {consumed}"
                )
            }
            DecodeErrorKind::InvalidUtf8Name => write!(f, "name is not valid UTF-8"),
            DecodeErrorKind::UnknownLimitsFlag { byte } => {
                write!(f, "unknown limits flag {byte:#04x}")
            }
            DecodeErrorKind::UnknownImportKind { byte } => {
                write!(f, "unknown import kind {byte:#04x}")
            }
            DecodeErrorKind::UnknownExportKind { byte } => {
                write!(f, "unknown export kind {byte:#04x}")
            }
            DecodeErrorKind::UnknownOpcode { byte } => {
                write!(f, "unknown opcode {byte:#04x}")
            }
            DecodeErrorKind::UnknownBlockType { byte } => {
                write!(f, "unknown block type {byte:#04x}")
            }
            DecodeErrorKind::UnsupportedInitExpr { byte } => {
                write!(f, "unsupported data offset expression opcode {byte:#04x}")
            }
            DecodeErrorKind::FunctionCountMismatch { functions, bodies } => {
                write!(
                    f,
                    "function section declares {functions} functions but code section has {bodies} bodies"
                )
            }
        }
    }
}

impl core::error::Error for DecodeError {}
