//! Top-level WASM module decoding.
//!
//! Produces a `Module` — a parsed but not yet instantiated representation of
//! a WASM binary, with section contents decoded into typed structures.
//! Table, global, start, element, and data-count sections are framed but
//! their contents are skipped; the executor has no use for them.
//! See [Spec §5.5](https://webassembly.github.io/spec/core/binary/modules.html).

use alloc::string::String;
use alloc::vec::Vec;

use crate::binary::code::{self, FuncBody};
use crate::binary::reader::Reader;
use crate::binary::section::{self, RawSection, SectionId};
use crate::error::{ByteOffset, DecodeContext, DecodeError, DecodeErrorKind};
use crate::types::{FuncType, Limits, MemIdx, MemType, TypeIdx};

/// A custom section: a name and an uninterpreted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Custom {
    pub name: String,
    pub data: Vec<u8>,
}

/// What an import provides. Only function imports are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportDesc {
    Func(TypeIdx),
}

/// A single import: `module`.`field` of the described kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

/// What an export refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Func(crate::types::FuncIdx),
    Table(u32),
    Memory(u32),
    Global(u32),
}

/// A single export: a name bound to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

/// An active data segment: bytes copied into a memory at instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub memory: MemIdx,
    /// Evaluated `i32.const` offset expression.
    pub offset: i32,
    pub init: Vec<u8>,
}

/// A decoded WASM module.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Module {
    pub customs: Vec<Custom>,
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    /// Type index of each module-defined function, in function-space order
    /// (after the imports).
    pub functions: Vec<TypeIdx>,
    pub memories: Vec<MemType>,
    pub exports: Vec<Export>,
    pub data: Vec<DataSegment>,
    /// Body of each module-defined function, parallel to `functions`.
    pub code: Vec<FuncBody>,
}

impl Module {
    /// Decode a WASM binary into a `Module`.
    ///
    /// Validates the preamble, section framing and ordering, and the
    /// contents of every supported section.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);

        section::parse_preamble(&mut reader)?;
        let sections = section::parse_sections(&mut reader)?;

        let mut module = Module::default();
        let mut code_offset = 0;

        for s in &sections {
            let mut r = Reader::with_offset(s.data, s.offset);
            match s.id {
                SectionId::Custom => {
                    let custom =
                        decode_custom(&mut r).map_err(in_ctx(DecodeContext::CustomSection))?;
                    module.customs.push(custom);
                    // A custom section's payload is whatever follows the
                    // name; nothing left to consume.
                    continue;
                }
                SectionId::Type => {
                    module.types =
                        decode_type_section(&mut r).map_err(in_ctx(DecodeContext::TypeSection))?;
                }
                SectionId::Import => {
                    module.imports = decode_import_section(&mut r)
                        .map_err(in_ctx(DecodeContext::ImportSection))?;
                }
                SectionId::Function => {
                    module.functions = decode_function_section(&mut r)
                        .map_err(in_ctx(DecodeContext::FunctionSection))?;
                }
                SectionId::Memory => {
                    module.memories = decode_memory_section(&mut r)
                        .map_err(in_ctx(DecodeContext::MemorySection))?;
                }
                SectionId::Export => {
                    module.exports = decode_export_section(&mut r)
                        .map_err(in_ctx(DecodeContext::ExportSection))?;
                }
                SectionId::Data => {
                    module.data =
                        decode_data_section(&mut r).map_err(in_ctx(DecodeContext::DataSection))?;
                }
                SectionId::Code => {
                    code_offset = s.offset;
                    module.code =
                        decode_code_section(&mut r).map_err(in_ctx(DecodeContext::CodeSection))?;
                }
                // Framed but not decoded.
                SectionId::Table
                | SectionId::Global
                | SectionId::Start
                | SectionId::Element
                | SectionId::DataCount => continue,
            }
            ensure_consumed(&r, s)?;
        }

        if module.functions.len() != module.code.len() {
            return Err(DecodeError {
                offset: ByteOffset(code_offset),
                context: DecodeContext::CodeSection,
                kind: DecodeErrorKind::FunctionCountMismatch {
                    functions: module.functions.len() as u32,
                    bodies: module.code.len() as u32,
                },
            });
        }

        Ok(module)
    }
}

/// Override the context of an inner decode error with the section it
/// occurred in.
fn in_ctx(context: DecodeContext) -> impl Fn(DecodeError) -> DecodeError {
    move |mut e| {
        e.context = context;
        e
    }
}

/// Check that a section's content decoder consumed the declared size.
fn ensure_consumed(reader: &Reader<'_>, s: &RawSection<'_>) -> Result<(), DecodeError> {
    if reader.is_empty() {
        return Ok(());
    }
    Err(DecodeError {
        offset: ByteOffset(reader.position()),
        context: DecodeContext::SectionBody { id: s.id as u8 },
        kind: DecodeErrorKind::SectionSizeMismatch {
            expected: s.data.len() as u32,
            consumed: (reader.position() - s.offset) as u32,
        },
    })
}

fn decode_custom(r: &mut Reader<'_>) -> Result<Custom, DecodeError> {
    let name = r.read_name()?;
    let data = r.remaining().to_vec();
    Ok(Custom { name, data })
}

fn decode_type_section(r: &mut Reader<'_>) -> Result<Vec<FuncType>, DecodeError> {
    let count = r.read_u32()?;
    let mut types = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let offset = r.position();
        let tag = r.read_byte()?;
        if tag != 0x60 {
            return Err(DecodeError {
                offset: ByteOffset(offset),
                context: DecodeContext::TypeSection,
                kind: DecodeErrorKind::UnexpectedByte {
                    expected: 0x60,
                    found: tag,
                },
            });
        }

        let params = decode_result_type(r)?;
        let results = decode_result_type(r)?;
        types.push(FuncType { params, results });
    }

    Ok(types)
}

fn decode_result_type(r: &mut Reader<'_>) -> Result<Vec<crate::types::ValType>, DecodeError> {
    let count = r.read_u32()?;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        types.push(code::read_val_type(r)?);
    }
    Ok(types)
}

fn decode_import_section(r: &mut Reader<'_>) -> Result<Vec<Import>, DecodeError> {
    let count = r.read_u32()?;
    let mut imports = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let module = r.read_name()?;
        let field = r.read_name()?;

        let offset = r.position();
        let kind = r.read_byte()?;
        let desc = match kind {
            0x00 => ImportDesc::Func(TypeIdx(r.read_u32()?)),
            byte => {
                return Err(DecodeError {
                    offset: ByteOffset(offset),
                    context: DecodeContext::ImportSection,
                    kind: DecodeErrorKind::UnknownImportKind { byte },
                });
            }
        };

        imports.push(Import {
            module,
            field,
            desc,
        });
    }

    Ok(imports)
}

fn decode_function_section(r: &mut Reader<'_>) -> Result<Vec<TypeIdx>, DecodeError> {
    let count = r.read_u32()?;
    let mut indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        indices.push(TypeIdx(r.read_u32()?));
    }
    Ok(indices)
}

fn decode_memory_section(r: &mut Reader<'_>) -> Result<Vec<MemType>, DecodeError> {
    let count = r.read_u32()?;
    let mut memories = Vec::with_capacity(count as usize);
    for _ in 0..count {
        memories.push(MemType {
            limits: decode_limits(r)?,
        });
    }
    Ok(memories)
}

fn decode_limits(r: &mut Reader<'_>) -> Result<Limits, DecodeError> {
    let offset = r.position();
    let flag = r.read_byte()?;
    let min = r.read_u32()?;
    let max = match flag {
        0x00 => None,
        0x01 => Some(r.read_u32()?),
        byte => {
            return Err(DecodeError {
                offset: ByteOffset(offset),
                context: DecodeContext::MemorySection,
                kind: DecodeErrorKind::UnknownLimitsFlag { byte },
            });
        }
    };
    Ok(Limits { min, max })
}

fn decode_export_section(r: &mut Reader<'_>) -> Result<Vec<Export>, DecodeError> {
    let count = r.read_u32()?;
    let mut exports = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let name = r.read_name()?;
        let offset = r.position();
        let kind = r.read_byte()?;
        let index = r.read_u32()?;
        let desc = match kind {
            0x00 => ExportDesc::Func(crate::types::FuncIdx(index)),
            0x01 => ExportDesc::Table(index),
            0x02 => ExportDesc::Memory(index),
            0x03 => ExportDesc::Global(index),
            byte => {
                return Err(DecodeError {
                    offset: ByteOffset(offset),
                    context: DecodeContext::ExportSection,
                    kind: DecodeErrorKind::UnknownExportKind { byte },
                });
            }
        };
        exports.push(Export { name, desc });
    }

    Ok(exports)
}

fn decode_data_section(r: &mut Reader<'_>) -> Result<Vec<DataSegment>, DecodeError> {
    let count = r.read_u32()?;
    let mut segments = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let memory = MemIdx(r.read_u32()?);
        let offset = decode_i32_const_expr(r)?;
        let size = r.read_u32()?;
        let init = r.read_bytes(size as usize)?.to_vec();
        segments.push(DataSegment {
            memory,
            offset,
            init,
        });
    }

    Ok(segments)
}

/// Decode an `i32.const <n> end` constant expression, the only offset
/// expression form the data section supports here.
fn decode_i32_const_expr(r: &mut Reader<'_>) -> Result<i32, DecodeError> {
    let offset = r.position();
    let op = r.read_byte()?;
    if op != 0x41 {
        return Err(DecodeError {
            offset: ByteOffset(offset),
            context: DecodeContext::DataSection,
            kind: DecodeErrorKind::UnsupportedInitExpr { byte: op },
        });
    }
    let value = r.read_i32()?;

    let end_offset = r.position();
    let end = r.read_byte()?;
    if end != 0x0B {
        return Err(DecodeError {
            offset: ByteOffset(end_offset),
            context: DecodeContext::DataSection,
            kind: DecodeErrorKind::UnexpectedByte {
                expected: 0x0B,
                found: end,
            },
        });
    }

    Ok(value)
}

fn decode_code_section(r: &mut Reader<'_>) -> Result<Vec<FuncBody>, DecodeError> {
    let count = r.read_u32()?;
    let mut bodies = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let size = r.read_u32()?;
        let offset = r.position();
        let bytes = r.read_bytes(size as usize)?;
        let mut body_reader = Reader::with_offset(bytes, offset);
        bodies.push(code::decode_func_body(&mut body_reader)?);
    }

    Ok(bodies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::code::{Instruction, MemArg};
    use crate::types::{FuncIdx, NumType, ValType};

    const I32: ValType = ValType::Num(NumType::I32);

    #[test]
    fn decode_minimal_module() {
        let bytes = [
            0x00, 0x61, 0x73, 0x6D, // magic
            0x01, 0x00, 0x00, 0x00, // version
        ];
        let module = Module::decode(&bytes).unwrap();
        assert_eq!(module, Module::default());
    }

    #[test]
    fn decode_hello_world_fixture() {
        let bytes = lantern_testdata::fixture_bytes("hello_world");
        let module = Module::decode(&bytes).unwrap();

        // Two signatures: fd_write's and the entry routine's.
        assert_eq!(module.types.len(), 2);
        assert_eq!(module.types[0].params, [I32, I32, I32, I32]);
        assert_eq!(module.types[0].results, [I32]);
        assert!(module.types[1].params.is_empty());
        assert_eq!(module.types[1].results, [I32]);

        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].module, "wasi_snapshot_preview1");
        assert_eq!(module.imports[0].field, "fd_write");
        assert_eq!(module.imports[0].desc, ImportDesc::Func(TypeIdx(0)));

        assert_eq!(module.functions, [TypeIdx(1)]);

        // One page of linear memory, no maximum.
        assert_eq!(module.memories.len(), 1);
        assert_eq!(module.memories[0].limits.min, 1);
        assert_eq!(module.memories[0].limits.max, None);

        assert_eq!(module.exports.len(), 1);
        assert_eq!(module.exports[0].name, "_start");
        assert_eq!(module.exports[0].desc, ExportDesc::Func(FuncIdx(1)));

        // The greeting bytes at offset 0.
        assert_eq!(module.data.len(), 1);
        assert_eq!(module.data[0].memory, MemIdx(0));
        assert_eq!(module.data[0].offset, 0);
        assert_eq!(module.data[0].init, b"Hello, World!\n");

        // The entry routine: store the descriptor, call fd_write.
        assert_eq!(module.code.len(), 1);
        let store = MemArg { align: 2, offset: 0 };
        assert_eq!(
            module.code[0].code,
            [
                Instruction::I32Const(16),
                Instruction::I32Const(0),
                Instruction::I32Store(store),
                Instruction::I32Const(20),
                Instruction::I32Const(14),
                Instruction::I32Store(store),
                Instruction::I32Const(1),
                Instruction::I32Const(16),
                Instruction::I32Const(1),
                Instruction::I32Const(24),
                Instruction::Call(0),
                Instruction::End,
            ]
        );
    }

    #[test]
    fn decode_math_fixture() {
        let bytes = lantern_testdata::fixture_bytes("math");
        let module = Module::decode(&bytes).unwrap();

        assert_eq!(module.code.len(), 3);
        let names: Vec<_> = module.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["add", "sub", "lts"]);
    }

    #[test]
    fn decode_custom_section() {
        let bytes = [
            0x00, 0x61, 0x73, 0x6D, // magic
            0x01, 0x00, 0x00, 0x00, // version
            0x00, 0x08, // custom section, 8 bytes
            0x04, b'n', b'o', b't', b'e', // name "note"
            0x01, 0x02, 0x03, // payload
        ];
        let module = Module::decode(&bytes).unwrap();
        assert_eq!(module.customs.len(), 1);
        assert_eq!(module.customs[0].name, "note");
        assert_eq!(module.customs[0].data, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn reject_truncated_binary() {
        let bytes = [0x00, 0x61]; // truncated magic
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnexpectedEof);
    }

    #[test]
    fn reject_bad_magic() {
        let bytes = [
            0xDE, 0xAD, 0xBE, 0xEF, // wrong magic
            0x01, 0x00, 0x00, 0x00, // version
        ];
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidMagic);
    }

    #[test]
    fn reject_function_without_body() {
        let bytes = [
            0x00, 0x61, 0x73, 0x6D, // magic
            0x01, 0x00, 0x00, 0x00, // version
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type section: 1 functype () -> ()
            0x03, 0x02, 0x01, 0x00, // function section: 1 function, no code section
        ];
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::FunctionCountMismatch {
                functions: 1,
                bodies: 0
            }
        );
    }

    #[test]
    fn reject_trailing_section_bytes() {
        let bytes = [
            0x00, 0x61, 0x73, 0x6D, // magic
            0x01, 0x00, 0x00, 0x00, // version
            // type section declares 5 bytes but the functype only needs 4
            0x01, 0x05, 0x01, 0x60, 0x00, 0x00, 0xFF,
        ];
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::SectionSizeMismatch {
                expected: 5,
                consumed: 4
            }
        );
    }

    #[test]
    fn reject_unknown_opcode_in_body() {
        let bytes = [
            0x00, 0x61, 0x73, 0x6D, // magic
            0x01, 0x00, 0x00, 0x00, // version
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type section: () -> ()
            0x03, 0x02, 0x01, 0x00, // function section
            0x0A, 0x05, 0x01, // code section: 1 body
            0x03, 0x00, 0x00, 0x0B, // body: no locals, `unreachable`, end
        ];
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnknownOpcode { byte: 0x00 });
        assert_eq!(err.context, DecodeContext::CodeSection);
    }
}
