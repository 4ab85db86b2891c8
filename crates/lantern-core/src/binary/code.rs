//! Instruction and function-body decoding.
//!
//! Covers the instruction subset the executor supports: structured control
//! (`if`/`end`/`return`/`call`), locals, `i32` constants, stores, and the
//! arithmetic/comparison trio. Anything else is a decode error.
//! See [Spec §5.4](https://webassembly.github.io/spec/core/binary/instructions.html).

use alloc::vec::Vec;

use crate::binary::reader::Reader;
use crate::error::{ByteOffset, DecodeContext, DecodeError, DecodeErrorKind};
use crate::types::{BlockType, ValType};

/// Supported opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    If = 0x04,
    End = 0x0B,
    Return = 0x0F,
    Call = 0x10,
    LocalGet = 0x20,
    LocalSet = 0x21,
    I32Store = 0x36,
    I32Const = 0x41,
    I32LtS = 0x48,
    I32Add = 0x6A,
    I32Sub = 0x6B,
}

impl Opcode {
    /// Try to construct an `Opcode` from a raw byte value.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x04 => Some(Opcode::If),
            0x0B => Some(Opcode::End),
            0x0F => Some(Opcode::Return),
            0x10 => Some(Opcode::Call),
            0x20 => Some(Opcode::LocalGet),
            0x21 => Some(Opcode::LocalSet),
            0x36 => Some(Opcode::I32Store),
            0x41 => Some(Opcode::I32Const),
            0x48 => Some(Opcode::I32LtS),
            0x6A => Some(Opcode::I32Add),
            0x6B => Some(Opcode::I32Sub),
            _ => None,
        }
    }
}

/// Memory access immediates: alignment hint and constant offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub align: u32,
    pub offset: u32,
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    If(BlockType),
    End,
    Return,
    Call(u32),
    LocalGet(u32),
    LocalSet(u32),
    I32Store(MemArg),
    I32Const(i32),
    I32LtS,
    I32Add,
    I32Sub,
}

/// One entry of a code-section locals vector: `count` locals of type `ty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDecl {
    pub count: u32,
    pub ty: ValType,
}

/// A decoded function body: locals declarations plus the instruction
/// sequence, including the terminating `end`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FuncBody {
    pub locals: Vec<LocalDecl>,
    pub code: Vec<Instruction>,
}

/// Decode a function body from a reader covering exactly the body's bytes.
pub fn decode_func_body(reader: &mut Reader<'_>) -> Result<FuncBody, DecodeError> {
    let mut body = FuncBody::default();

    let decl_count = reader.read_u32()?;
    for _ in 0..decl_count {
        let count = reader.read_u32()?;
        let ty = read_val_type(reader)?;
        body.locals.push(LocalDecl { count, ty });
    }

    while !reader.is_empty() {
        body.code.push(decode_instruction(reader)?);
    }

    Ok(body)
}

fn decode_instruction(reader: &mut Reader<'_>) -> Result<Instruction, DecodeError> {
    let offset = reader.position();
    let byte = reader.read_byte()?;
    let op = Opcode::from_byte(byte).ok_or(DecodeError {
        offset: ByteOffset(offset),
        context: DecodeContext::CodeSection,
        kind: DecodeErrorKind::UnknownOpcode { byte },
    })?;

    let inst = match op {
        Opcode::If => Instruction::If(decode_block_type(reader)?),
        Opcode::End => Instruction::End,
        Opcode::Return => Instruction::Return,
        Opcode::Call => Instruction::Call(reader.read_u32()?),
        Opcode::LocalGet => Instruction::LocalGet(reader.read_u32()?),
        Opcode::LocalSet => Instruction::LocalSet(reader.read_u32()?),
        Opcode::I32Store => {
            let align = reader.read_u32()?;
            let offset = reader.read_u32()?;
            Instruction::I32Store(MemArg { align, offset })
        }
        Opcode::I32Const => Instruction::I32Const(reader.read_i32()?),
        Opcode::I32LtS => Instruction::I32LtS,
        Opcode::I32Add => Instruction::I32Add,
        Opcode::I32Sub => Instruction::I32Sub,
    };
    Ok(inst)
}

fn decode_block_type(reader: &mut Reader<'_>) -> Result<BlockType, DecodeError> {
    let offset = reader.position();
    let byte = reader.read_byte()?;
    if byte == 0x40 {
        return Ok(BlockType::Empty);
    }
    match ValType::from_encoding(byte) {
        Some(ty) => Ok(BlockType::Val(ty)),
        None => Err(DecodeError {
            offset: ByteOffset(offset),
            context: DecodeContext::CodeSection,
            kind: DecodeErrorKind::UnknownBlockType { byte },
        }),
    }
}

pub(crate) fn read_val_type(reader: &mut Reader<'_>) -> Result<ValType, DecodeError> {
    let offset = reader.position();
    let byte = reader.read_byte()?;
    ValType::from_encoding(byte).ok_or(DecodeError {
        offset: ByteOffset(offset),
        context: DecodeContext::Leb128,
        kind: DecodeErrorKind::UnknownValType { byte },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NumType;

    #[test]
    fn opcode_from_byte() {
        assert_eq!(Opcode::from_byte(0x41), Some(Opcode::I32Const));
        assert_eq!(Opcode::from_byte(0x0B), Some(Opcode::End));
        // `unreachable` is outside the supported subset.
        assert_eq!(Opcode::from_byte(0x00), None);
    }

    #[test]
    fn decode_body_with_locals() {
        // locals: one declaration of 2 × i32
        // code: i32.const 42; local.set 0; end
        let bytes = [0x01, 0x02, 0x7F, 0x41, 0x2A, 0x21, 0x00, 0x0B];
        let mut reader = Reader::new(&bytes);
        let body = decode_func_body(&mut reader).unwrap();

        assert_eq!(
            body.locals,
            [LocalDecl {
                count: 2,
                ty: ValType::Num(NumType::I32)
            }]
        );
        assert_eq!(
            body.code,
            [
                Instruction::I32Const(42),
                Instruction::LocalSet(0),
                Instruction::End
            ]
        );
    }

    #[test]
    fn decode_store_with_memarg() {
        // no locals; code: i32.const 0; i32.const 42; i32.store align=2 offset=0; end
        let bytes = [0x00, 0x41, 0x00, 0x41, 0x2A, 0x36, 0x02, 0x00, 0x0B];
        let mut reader = Reader::new(&bytes);
        let body = decode_func_body(&mut reader).unwrap();

        assert_eq!(
            body.code[2],
            Instruction::I32Store(MemArg { align: 2, offset: 0 })
        );
    }

    #[test]
    fn decode_if_block_types() {
        // no locals; code: local.get 0; if (empty); end; end
        let bytes = [0x00, 0x20, 0x00, 0x04, 0x40, 0x0B, 0x0B];
        let mut reader = Reader::new(&bytes);
        let body = decode_func_body(&mut reader).unwrap();
        assert_eq!(body.code[1], Instruction::If(BlockType::Empty));

        // if with an i32 result type
        let bytes = [0x00, 0x20, 0x00, 0x04, 0x7F, 0x0B, 0x0B];
        let mut reader = Reader::new(&bytes);
        let body = decode_func_body(&mut reader).unwrap();
        assert_eq!(
            body.code[1],
            Instruction::If(BlockType::Val(ValType::Num(NumType::I32)))
        );
    }

    #[test]
    fn reject_unknown_opcode() {
        // no locals; code: 0xFE (not an opcode we know)
        let bytes = [0x00, 0xFE];
        let mut reader = Reader::new(&bytes);
        let err = decode_func_body(&mut reader).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnknownOpcode { byte: 0xFE });
    }

    #[test]
    fn reject_unknown_block_type() {
        let bytes = [0x00, 0x04, 0x13];
        let mut reader = Reader::new(&bytes);
        let err = decode_func_body(&mut reader).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnknownBlockType { byte: 0x13 });
    }
}
