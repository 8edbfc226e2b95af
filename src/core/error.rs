// This module defines the error types shared between the guest translator, the code
// installation step and the execution of installed code, using the thiserror crate for
// idiomatic Rust error handling. CompileError is the failure type of the Compiler
// collaborator: instruction fetch failures, unsupported or malformed guest opcodes,
// branches whose condition codes cannot be derived inside the block, encoder range
// failures, and code installation failures. ExecutionError is raised by an installed
// native-code handle when it cannot finish a unit: an unsupported host instruction, a
// trap instruction, running off the end of the buffer, or exceeding the step budget.
// FetchError is the single failure of the big-endian MemoryReader. Each variant carries
// the guest PC or host offset needed to locate the fault. CompileResult<T> is the
// convenience alias for Result<T, CompileError>.

//! Error types for translation and execution.
//!
//! Using thiserror for more idiomatic error handling.

use crate::arm64::encoder::{EncodingError, MachineWord};
use thiserror::Error;

/// Guest memory could not supply the requested bytes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Guest memory fetch failed at {addr:#010x} ({len} bytes)")]
pub struct FetchError {
    pub addr: u32,
    pub len: u32,
}

/// Failure of the Compiler collaborator for one guest region.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Guest PC {pc:#010x} is not instruction aligned")]
    MisalignedPc { pc: u32 },

    #[error("Unsupported guest opcode {opcode:#06x} at {pc:#010x}")]
    UnsupportedOpcode { pc: u32, opcode: u16 },

    #[error("Condition codes for branch at {pc:#010x} are not available in this block")]
    ConditionCodesUnavailable { pc: u32 },

    #[error("Encoding failed for guest instruction at {pc:#010x}: {source}")]
    Encoding {
        pc: u32,
        #[source]
        source: EncodingError,
    },

    #[error("Code installation failed: {reason}")]
    Install { reason: String },
}

/// Failure of installed native code while running a unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Unsupported host instruction {word} at word offset {offset}")]
    UnsupportedInstruction { word: MachineWord, offset: usize },

    #[error("Host code trapped with immediate {imm:#x} at word offset {offset}")]
    Trap { imm: u16, offset: usize },

    #[error("Host code left its buffer at word offset {offset}")]
    RanOffEnd { offset: i64 },

    #[error("Host code did not return within {limit} steps")]
    StepLimit { limit: usize },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
