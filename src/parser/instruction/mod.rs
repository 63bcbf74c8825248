//! WebAssembly instruction representation
//!
//! Only the straight-line subset needed to move values across the host
//! boundary is represented: constants, locals, globals, calls and integer
//! addition. Structured control flow is rejected at decode time.

pub mod decode;

pub use decode::{decode_constant_expression, decode_function_body, DecodeError};

use fhex::ToHex;
use std::fmt;

/// Position information for an instruction in the binary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByteRange {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub position: ByteRange,
}

impl Instruction {
    pub fn new(kind: InstructionKind, position: ByteRange) -> Self {
        Instruction { kind, position }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    // Control instructions
    Unreachable,
    Nop,
    End,
    Return,
    Call { func_idx: u32 },

    // Parametric instructions
    Drop,

    // Variable instructions
    LocalGet { local_idx: u32 },
    LocalSet { local_idx: u32 },
    LocalTee { local_idx: u32 },
    GlobalGet { global_idx: u32 },
    GlobalSet { global_idx: u32 },

    // Numeric instructions
    I32Const { value: i32 },
    I64Const { value: i64 },
    F32Const { value: f32 },
    F64Const { value: f64 },
    I32Add,
    I64Add,
}

impl InstructionKind {
    pub fn mnemonic(&self) -> &'static str {
        use InstructionKind::*;
        match self {
            Unreachable => "unreachable",
            Nop => "nop",
            End => "end",
            Return => "return",
            Call { .. } => "call",
            Drop => "drop",
            LocalGet { .. } => "local.get",
            LocalSet { .. } => "local.set",
            LocalTee { .. } => "local.tee",
            GlobalGet { .. } => "global.get",
            GlobalSet { .. } => "global.set",
            I32Const { .. } => "i32.const",
            I64Const { .. } => "i64.const",
            F32Const { .. } => "f32.const",
            F64Const { .. } => "f64.const",
            I32Add => "i32.add",
            I64Add => "i64.add",
        }
    }

    /// Whether this instruction may appear in a constant expression.
    pub fn is_constant(&self) -> bool {
        use InstructionKind::*;
        matches!(
            self,
            I32Const { .. } | I64Const { .. } | F32Const { .. } | F64Const { .. } | GlobalGet { .. } | End
        )
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstructionKind::*;

        write!(f, "{}", self.mnemonic())?;

        match self {
            Call { func_idx } => write!(f, " {func_idx}"),
            LocalGet { local_idx } | LocalSet { local_idx } | LocalTee { local_idx } => write!(f, " {local_idx}"),
            GlobalGet { global_idx } | GlobalSet { global_idx } => write!(f, " {global_idx}"),
            I32Const { value } => write!(f, " {value}"),
            I64Const { value } => write!(f, " {value}"),
            F32Const { value } => write!(f, " {}", value.to_hex()),
            F64Const { value } => write!(f, " {}", value.to_hex()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(InstructionKind::I64Const { value: -5 }.to_string(), "i64.const -5");
        assert_eq!(InstructionKind::LocalGet { local_idx: 0 }.to_string(), "local.get 0");
        assert_eq!(InstructionKind::I64Add.to_string(), "i64.add");
    }
}
