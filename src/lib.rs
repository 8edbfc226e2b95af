//! emujit - dynamic translation of a 32-bit big-endian guest to AArch64.
//!
//! Guest code is compiled one block at a time into A64 machine code, the
//! compiled blocks are cached by guest program counter, and a driver loop
//! alternates between guest-state bookkeeping and the generated code.
//!
//! # Primary Usage
//!
//! ```ignore
//! use emujit::arm64::InterpretingAllocator;
//! use emujit::jit::{Driver, GuestMemory, GuestState};
//! use emujit::m68k::BlockTranslator;
//!
//! let memory = GuestMemory::new(0x1000, image);
//! let translator = BlockTranslator::new(InterpretingAllocator::default());
//! let mut driver = Driver::new(translator, memory)?;
//! let outcome = driver.run(GuestState::new(), 0x1000, 0)?;
//! println!("{}", outcome.state);
//! ```
//!
//! # Architecture
//!
//! - [`arm64`] - A64 encoder, register binding and interpreter
//! - [`core`] - Shared infrastructure (errors, registers, sessions)
//! - [`jit`] - Translation cache and execution driver
//! - [`m68k`] - Reference guest translator

pub mod arm64;
pub mod core;
pub mod jit;
pub mod m68k;

pub use arm64::{
    EncodingError, HostRegisters, InstructionDescriptor, InterpretingAllocator, MachineWord,
    RegisterBinding,
};
pub use core::{AsmReg, CompileError, CompileResult, ExecutionError, TranslationSession};
pub use jit::{
    CacheStats, Driver, DriverError, GuestCompiler, GuestMemory, GuestState, JitConfig,
    RunOutcome, TranslationCache, TranslationUnit,
};
pub use m68k::BlockTranslator;
