//! Instruction decoding from binary format

use super::{ByteRange, Instruction, InstructionKind};
use crate::parser::encoding::*;
use crate::parser::reader::Reader;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("unsupported opcode {opcode:#04x} at offset {offset}")]
    UnsupportedOpcode { opcode: u8, offset: usize },

    #[error("constant expression required")]
    NonConstant,

    #[error("END opcode expected")]
    MissingEnd,

    #[error("section size mismatch")]
    TrailingBytes,
}

impl InstructionKind {
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let offset = reader.pos();
        let opcode = reader.read_byte()?;

        use InstructionKind::*;
        match opcode {
            OP_UNREACHABLE => Ok(Unreachable),
            OP_NOP => Ok(Nop),
            OP_END => Ok(End),
            OP_RETURN => Ok(Return),
            OP_CALL => Ok(Call {
                func_idx: reader.read_vu32()?,
            }),
            OP_DROP => Ok(Drop),
            OP_LOCAL_GET => Ok(LocalGet {
                local_idx: reader.read_vu32()?,
            }),
            OP_LOCAL_SET => Ok(LocalSet {
                local_idx: reader.read_vu32()?,
            }),
            OP_LOCAL_TEE => Ok(LocalTee {
                local_idx: reader.read_vu32()?,
            }),
            OP_GLOBAL_GET => Ok(GlobalGet {
                global_idx: reader.read_vu32()?,
            }),
            OP_GLOBAL_SET => Ok(GlobalSet {
                global_idx: reader.read_vu32()?,
            }),
            OP_I32_CONST => Ok(I32Const {
                value: reader.read_vs32()?,
            }),
            OP_I64_CONST => Ok(I64Const {
                value: reader.read_vs64()?,
            }),
            OP_F32_CONST => Ok(F32Const {
                value: reader.read_f32()?,
            }),
            OP_F64_CONST => Ok(F64Const {
                value: reader.read_f64()?,
            }),
            OP_I32_ADD => Ok(I32Add),
            OP_I64_ADD => Ok(I64Add),
            _ => Err(DecodeError::UnsupportedOpcode { opcode, offset }),
        }
    }
}

impl Instruction {
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let offset = reader.pos();
        let kind = InstructionKind::decode(reader)?;
        let length = reader.pos() - offset;
        Ok(Instruction::new(kind, ByteRange { offset, length }))
    }
}

/// Read instructions up to and including the first `end`.
fn read_till_end(reader: &mut Reader, constant: bool) -> Result<Vec<Instruction>, DecodeError> {
    let mut instructions = Vec::new();
    loop {
        if reader.is_empty() {
            return Err(DecodeError::MissingEnd);
        }
        let instruction = Instruction::decode(reader)?;
        if constant && !instruction.kind.is_constant() {
            return Err(DecodeError::NonConstant);
        }
        let done = instruction.kind == InstructionKind::End;
        instructions.push(instruction);
        if done {
            return Ok(instructions);
        }
    }
}

/// Decode a function body's expression. Without block instructions the
/// first `end` closes the body, so anything after it is malformed.
pub fn decode_function_body(reader: &mut Reader) -> Result<Vec<Instruction>, DecodeError> {
    let instructions = read_till_end(reader, false)?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(instructions)
}

/// Decode a constant expression (global initialisers). Types are checked
/// later, once the whole module is available.
pub fn decode_constant_expression(reader: &mut Reader) -> Result<Vec<Instruction>, DecodeError> {
    read_till_end(reader, true)
}
