// This module implements the execution driver, the loop that alternates between guest-state
// bookkeeping and compiled code. A run starts from a caller-supplied GuestState with the entry PC
// written into it. In the Dispatch phase the driver reads the guest PC; when it differs from the
// start PC of the unit selected last time it asks the translation cache for the unit, compiling
// it on a miss. In the Executing phase it enters the unit's native-code handle with the guest
// state, and the unit leaves the next guest PC behind. The run ends (Halted) when the PC equals
// the halt sentinel. The driver reads and writes nothing but the PC. Clock readings bracket each
// entry into compiled code and feed only the run report. Construction validates the register
// binding and checks that the compiler emits code for the same binding; a compile failure or an
// execution fault ends the run with the guest state at the failure and the run counters gathered
// so far attached to the error.

//! Execution driver: fetch, compile if needed, execute, until halt.

use crate::arm64::register_binding::{BindingError, RegisterBinding};
use crate::core::error::{CompileError, ExecutionError};
use crate::jit::cache::{CacheError, CacheStats, TranslationCache};
use crate::jit::clock::{Clock, MonotonicClock};
use crate::jit::config::JitConfig;
use crate::jit::guest::{GuestState, MemoryReader};
use crate::jit::unit::{GuestCompiler, TranslationUnit};
use log::{debug, info, trace};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where the driver is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Idle,
    Dispatch,
    Executing,
    Halted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Compilation failed at guest PC {pc:#010x}: {source}")]
    CompileFailure {
        pc: u32,
        #[source]
        source: CompileError,
        state: Box<GuestState>,
        stats: Box<RunStats>,
    },

    #[error("Execution of unit {pc:#010x} failed: {source}")]
    Execution {
        pc: u32,
        #[source]
        source: ExecutionError,
        state: Box<GuestState>,
        stats: Box<RunStats>,
    },

    #[error("Invalid register binding: {0}")]
    Binding(#[from] BindingError),

    #[error("Compiler register binding does not match the driver's")]
    BindingMismatch,
}

impl DriverError {
    /// Guest state at the point of failure, when the run got that far.
    pub fn state(&self) -> Option<&GuestState> {
        match self {
            DriverError::CompileFailure { state, .. } | DriverError::Execution { state, .. } => {
                Some(state)
            }
            _ => None,
        }
    }

    /// Counters of the failed run up to the point of failure.
    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            DriverError::CompileFailure { stats, .. } | DriverError::Execution { stats, .. } => {
                Some(stats)
            }
            _ => None,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Entries into compiled code.
    pub dispatch_cycles: u64,
    /// Cache consultations (PC changed since the last selected unit).
    pub unit_selections: u64,
    /// Time spent inside compiled code.
    pub guest_micros: u64,
    /// Cache counters at the end of the run.
    pub cache: CacheStats,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[JIT] Time spent in guest mode: {} us", self.guest_micros)?;
        writeln!(
            f,
            "[JIT] Number of host-guest switches: {}",
            self.dispatch_cycles
        )?;
        writeln!(f, "[JIT] Unit selections: {}", self.unit_selections)?;
        write!(f, "{}", self.cache)
    }
}

/// Final state and statistics of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub state: GuestState,
    pub stats: RunStats,
}

pub struct Driver<C, M, K = MonotonicClock> {
    compiler: C,
    memory: M,
    clock: K,
    config: JitConfig,
    binding: RegisterBinding,
    cache: TranslationCache,
    phase: DriverPhase,
}

impl<C: GuestCompiler, M: MemoryReader> Driver<C, M, MonotonicClock> {
    /// Driver with the default configuration, wall clock and the EMU68 binding.
    pub fn new(compiler: C, memory: M) -> Result<Self, DriverError> {
        Self::with_parts(
            compiler,
            memory,
            MonotonicClock::new(),
            JitConfig::default(),
            RegisterBinding::EMU68,
        )
    }
}

impl<C: GuestCompiler, M: MemoryReader, K: Clock> Driver<C, M, K> {
    pub fn with_parts(
        compiler: C,
        memory: M,
        clock: K,
        config: JitConfig,
        binding: RegisterBinding,
    ) -> Result<Self, DriverError> {
        binding.validate()?;
        if compiler.register_binding() != &binding {
            return Err(DriverError::BindingMismatch);
        }
        Ok(Self {
            compiler,
            memory,
            clock,
            config,
            binding,
            cache: TranslationCache::new(),
            phase: DriverPhase::Idle,
        })
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    pub fn binding(&self) -> &RegisterBinding {
        &self.binding
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Run from `entry_pc` until the guest PC equals `halt`.
    pub fn run(
        &mut self,
        initial: GuestState,
        entry_pc: u32,
        halt: u32,
    ) -> Result<RunOutcome, DriverError> {
        if self.config.reset_cache_on_run {
            self.cache.reset();
        }

        let mut state = initial;
        state.pc = entry_pc;
        let mut stats = RunStats::default();
        let mut current: Option<Arc<TranslationUnit>> = None;
        info!("run: entry {:#010x}, halt at {:#010x}", entry_pc, halt);

        self.phase = DriverPhase::Dispatch;
        while state.pc != halt {
            self.phase = DriverPhase::Dispatch;
            let unit = match &current {
                Some(unit) if unit.guest_start_pc == state.pc => unit.clone(),
                _ => {
                    let unit = self.select(&state, &stats)?;
                    stats.unit_selections += 1;
                    current = Some(unit.clone());
                    unit
                }
            };

            self.phase = DriverPhase::Executing;
            trace!("enter unit {:#010x}", unit.guest_start_pc);
            let t0 = self.clock.now_micros();
            let result = unit.entry.enter(&mut state);
            let t1 = self.clock.now_micros();
            stats.guest_micros += t1.saturating_sub(t0);
            stats.dispatch_cycles += 1;

            if let Err(source) = result {
                return Err(DriverError::Execution {
                    pc: unit.guest_start_pc,
                    source,
                    stats: self.abort(&stats),
                    state: Box::new(state),
                });
            }
        }

        self.phase = DriverPhase::Halted;
        stats.cache = self.cache.stats();
        info!(
            "run halted at {:#010x} after {} dispatch cycles",
            state.pc, stats.dispatch_cycles
        );
        debug!("\n{}", stats);
        Ok(RunOutcome { state, stats })
    }

    fn select(
        &mut self,
        state: &GuestState,
        stats: &RunStats,
    ) -> Result<Arc<TranslationUnit>, DriverError> {
        match self.cache.get_or_create(state.pc, &self.compiler, &self.memory) {
            Ok(unit) => Ok(unit),
            Err(CacheError::CompileFailure { pc, source }) => Err(DriverError::CompileFailure {
                pc,
                source,
                state: Box::new(state.clone()),
                stats: self.abort(stats),
            }),
        }
    }

    /// End the run on an error, keeping the counters gathered so far.
    fn abort(&mut self, stats: &RunStats) -> Box<RunStats> {
        self.phase = DriverPhase::Halted;
        let mut stats = stats.clone();
        stats.cache = self.cache.stats();
        Box::new(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm64::encoder::MachineWord;
    use crate::arm64::x;
    use crate::core::error::CompileResult;
    use crate::jit::clock::ManualClock;
    use crate::jit::guest::GuestMemory;
    use crate::jit::unit::{CompileStats, CompiledBlock, ExecutableCode};

    /// Unit that jumps to a fixed PC and bumps D0.
    #[derive(Debug)]
    struct Hop(u32);

    impl ExecutableCode for Hop {
        fn enter(&self, state: &mut GuestState) -> Result<(), ExecutionError> {
            state.d[0] += 1;
            state.pc = self.0;
            Ok(())
        }

        fn code_size(&self) -> usize {
            4
        }

        fn words(&self) -> &[MachineWord] {
            &[]
        }
    }

    /// Every block at `pc` jumps to `pc + 0x10`.
    struct Chain {
        binding: RegisterBinding,
    }

    impl GuestCompiler for Chain {
        fn compile(&self, pc: u32, _memory: &dyn MemoryReader) -> CompileResult<CompiledBlock> {
            Ok(CompiledBlock {
                guest_extent: 0x10,
                entry: Arc::new(Hop(pc + 0x10)),
                stats: CompileStats::default(),
            })
        }

        fn register_binding(&self) -> &RegisterBinding {
            &self.binding
        }
    }

    fn chain() -> Chain {
        Chain {
            binding: RegisterBinding::EMU68,
        }
    }

    #[test]
    fn test_phases() {
        let mut driver = Driver::new(chain(), GuestMemory::default()).unwrap();
        assert_eq!(driver.phase(), DriverPhase::Idle);
        driver.run(GuestState::new(), 0x100, 0x130).unwrap();
        assert_eq!(driver.phase(), DriverPhase::Halted);
    }

    #[test]
    fn test_guest_time_uses_clock() {
        let mut driver = Driver::with_parts(
            chain(),
            GuestMemory::default(),
            ManualClock::new(0, 7),
            JitConfig::default(),
            RegisterBinding::EMU68,
        )
        .unwrap();
        let outcome = driver.run(GuestState::new(), 0, 0x20).unwrap();
        assert_eq!(outcome.stats.dispatch_cycles, 2);
        assert_eq!(outcome.stats.guest_micros, 14);
        assert_eq!(outcome.state.d[0], 2);
    }

    #[test]
    fn test_entry_at_halt_runs_nothing() {
        let mut driver = Driver::new(chain(), GuestMemory::default()).unwrap();
        let outcome = driver.run(GuestState::new(), 0x40, 0x40).unwrap();
        assert_eq!(outcome.stats.dispatch_cycles, 0);
        assert_eq!(outcome.stats.cache.compiles, 0);
    }

    #[test]
    fn test_reset_on_run() {
        let config = JitConfig {
            reset_cache_on_run: true,
            ..JitConfig::default()
        };
        let mut driver = Driver::with_parts(
            chain(),
            GuestMemory::default(),
            MonotonicClock::new(),
            config,
            RegisterBinding::EMU68,
        )
        .unwrap();
        driver.run(GuestState::new(), 0, 0x10).unwrap();
        let second = driver.run(GuestState::new(), 0, 0x10).unwrap();
        assert_eq!(second.stats.cache.compiles, 2);
        assert_eq!(second.stats.cache.resets, 2);
    }

    /// Unit that fails on entry.
    #[derive(Debug)]
    struct Trap;

    impl ExecutableCode for Trap {
        fn enter(&self, _state: &mut GuestState) -> Result<(), ExecutionError> {
            Err(ExecutionError::Trap { imm: 0, offset: 0 })
        }

        fn code_size(&self) -> usize {
            4
        }

        fn words(&self) -> &[MachineWord] {
            &[]
        }
    }

    /// Chain whose block at `trap_pc` faults.
    struct TrapAt {
        trap_pc: u32,
        binding: RegisterBinding,
    }

    impl GuestCompiler for TrapAt {
        fn compile(&self, pc: u32, _memory: &dyn MemoryReader) -> CompileResult<CompiledBlock> {
            let entry: Arc<dyn ExecutableCode> = if pc == self.trap_pc {
                Arc::new(Trap)
            } else {
                Arc::new(Hop(pc + 0x10))
            };
            Ok(CompiledBlock {
                guest_extent: 0x10,
                entry,
                stats: CompileStats::default(),
            })
        }

        fn register_binding(&self) -> &RegisterBinding {
            &self.binding
        }
    }

    #[test]
    fn test_execution_fault_keeps_counters() {
        let compiler = TrapAt {
            trap_pc: 0x20,
            binding: RegisterBinding::EMU68,
        };
        let mut driver = Driver::with_parts(
            compiler,
            GuestMemory::default(),
            ManualClock::new(0, 5),
            JitConfig::default(),
            RegisterBinding::EMU68,
        )
        .unwrap();

        let err = driver.run(GuestState::new(), 0, 0x100).unwrap_err();
        assert_eq!(driver.phase(), DriverPhase::Halted);
        match &err {
            DriverError::Execution { pc, source, .. } => {
                assert_eq!(*pc, 0x20);
                assert_eq!(*source, ExecutionError::Trap { imm: 0, offset: 0 });
            }
            other => panic!("unexpected error {other:?}"),
        }
        let state = err.state().unwrap();
        assert_eq!(state.pc, 0x20);
        assert_eq!(state.d[0], 2);

        let stats = err.stats().unwrap();
        assert_eq!(stats.dispatch_cycles, 3);
        assert_eq!(stats.unit_selections, 3);
        assert_eq!(stats.guest_micros, 15);
        assert_eq!(stats.cache.compiles, 3);
    }

    #[test]
    fn test_binding_errors_carry_no_counters() {
        assert!(DriverError::BindingMismatch.stats().is_none());
        assert!(DriverError::BindingMismatch.state().is_none());
    }

    #[test]
    fn test_invalid_binding_rejected() {
        let mut binding = RegisterBinding::EMU68;
        binding.data[0] = x(31);
        let compiler = Chain { binding };
        assert!(matches!(
            Driver::with_parts(
                compiler,
                GuestMemory::default(),
                MonotonicClock::new(),
                JitConfig::default(),
                binding
            ),
            Err(DriverError::Binding(BindingError::Reserved { .. }))
        ));
    }
}
