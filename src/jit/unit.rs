// This module defines the translation unit and the collaborator interfaces around it. A
// TranslationUnit is the compiled form of one guest region: the guest PC it starts at, the
// number of guest bytes it covers, the native-code handle and the statistics reported by the
// compiler. Units are immutable once built and are shared through Arc so the cache and a running
// driver can hold the same unit. ExecutableCode is the only way control enters native code: the
// driver calls enter() with the guest state and the handle runs until its unit ends. CodeAllocator
// turns emitted machine words into such a handle and owns the register binding the handle
// marshals through, so a compiler reports its allocator's binding rather than keeping its own.
// GuestCompiler is the external "compile this guest region" operation that the cache invokes on
// a miss.

//! Translation units and the compiler/allocator/execution interfaces.

use crate::arm64::encoder::MachineWord;
use crate::arm64::register_binding::RegisterBinding;
use crate::core::error::{CompileResult, ExecutionError};
use crate::jit::guest::{GuestState, MemoryReader};
use std::fmt;
use std::sync::Arc;

/// Handle to installed native code for one unit.
pub trait ExecutableCode: Send + Sync + fmt::Debug {
    /// Run the unit. On return the guest PC names the next guest instruction.
    fn enter(&self, state: &mut GuestState) -> Result<(), ExecutionError>;

    /// Size of the native code in bytes.
    fn code_size(&self) -> usize;

    /// The native code, when the handle keeps it.
    fn words(&self) -> &[MachineWord];
}

/// Turns emitted words into an executable handle.
pub trait CodeAllocator {
    fn install(&self, words: &[MachineWord]) -> CompileResult<Arc<dyn ExecutableCode>>;

    /// The binding installed handles use to move guest registers in and out.
    fn register_binding(&self) -> &RegisterBinding;
}

/// Compiler-reported statistics for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub guest_instructions: usize,
    pub native_words: usize,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} guest instructions -> {} host words",
            self.guest_instructions, self.native_words
        )
    }
}

/// Result of compiling one guest region.
#[derive(Debug, Clone)]
pub struct CompiledBlock {
    /// Guest bytes covered, starting at the requested PC.
    pub guest_extent: u32,
    pub entry: Arc<dyn ExecutableCode>,
    pub stats: CompileStats,
}

/// The external "compile this guest region" operation.
pub trait GuestCompiler {
    fn compile(&self, pc: u32, memory: &dyn MemoryReader) -> CompileResult<CompiledBlock>;

    /// The register binding the emitted code assumes.
    fn register_binding(&self) -> &RegisterBinding;
}

/// One compiled guest region.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub guest_start_pc: u32,
    pub guest_extent: u32,
    pub entry: Arc<dyn ExecutableCode>,
    pub stats: CompileStats,
}

impl TranslationUnit {
    pub fn from_block(pc: u32, block: CompiledBlock) -> Self {
        Self {
            guest_start_pc: pc,
            guest_extent: block.guest_extent,
            entry: block.entry,
            stats: block.stats,
        }
    }

    /// One past the last guest byte, widened so a unit ending at 4 GiB does not wrap.
    pub fn guest_end(&self) -> u64 {
        self.guest_start_pc as u64 + self.guest_extent as u64
    }

    /// Whether the unit's guest bytes intersect `[start, end)`.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        (self.guest_start_pc as u64) < end && start < self.guest_end()
    }

    pub fn native_size(&self) -> usize {
        self.entry.code_size()
    }
}

impl fmt::Display for TranslationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unit {:#010x}..{:#010x} ({}, {} bytes native)",
            self.guest_start_pc,
            self.guest_end(),
            self.stats,
            self.native_size()
        )
    }
}
