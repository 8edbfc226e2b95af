// This module holds the reference guest compiler for the 32-bit big-endian guest CPU. decode
// reads guest instructions from a MemoryReader and classifies the supported subset (long-sized
// register and immediate forms, quick arithmetic, immediate shifts and rotates, SWAP/EXT/MULU,
// BRA/Bcc/JMP). translator lowers a block of them to A64 words through the encoder, using the
// register binding for guest registers, and installs the result through a CodeAllocator.

//! M68k guest decoding and translation.

pub mod decode;
pub mod translator;

pub use decode::{decode, Decoded, GuestCondition, Instruction, Operand, ShiftOp};
pub use translator::{host_condition, BlockTranslator, FlagSource};
