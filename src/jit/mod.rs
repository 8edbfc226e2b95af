//! Translation cache and execution driver.
//!
//! - [`guest`] - guest register block and instruction fetch
//! - [`unit`] - translation units and the compiler/allocator interfaces
//! - [`cache`] - guest PC to unit cache
//! - [`driver`] - dispatch loop
//! - [`elf_dump`] - code cache as an ELF object

pub mod cache;
pub mod clock;
pub mod config;
pub mod driver;
pub mod elf_dump;
pub mod guest;
pub mod unit;

pub use cache::{CacheError, CacheStats, SharedTranslationCache, TranslationCache};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::JitConfig;
pub use driver::{Driver, DriverError, DriverPhase, RunOutcome, RunStats};
pub use elf_dump::{build_elf, write_elf, ElfDumpError};
pub use guest::{GuestMemory, GuestState, MemoryReader};
pub use unit::{
    CodeAllocator, CompileStats, CompiledBlock, ExecutableCode, GuestCompiler, TranslationUnit,
};
