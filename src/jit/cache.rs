// This module implements the translation cache: a hashbrown map from guest PC to the compiled
// TranslationUnit that starts there. lookup() is a pure query; get_or_create() returns the unit
// for a PC, invoking the GuestCompiler on a miss and inserting the result, so each PC is compiled
// at most once between resets. A compiler failure is returned as CacheError::CompileFailure and
// leaves the cache unchanged. Inserting over an existing entry means the map and the lookup path
// disagree, which is treated as corruption and asserted against. reset() drops every unit, and
// invalidate_range() drops the units whose guest bytes overlap a range. CacheStats counts lookups,
// hits, misses, compiles, failures, native and guest bytes, resets and invalidations, and formats
// itself for the run report. SharedTranslationCache wraps the cache in a parking_lot Mutex for
// several execution contexts: compilation happens under the lock, so the first caller compiles
// and the others receive its unit.

//! Guest PC to translation unit cache.

use crate::core::error::CompileError;
use crate::jit::guest::MemoryReader;
use crate::jit::unit::{GuestCompiler, TranslationUnit};
use hashbrown::HashMap;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Compilation of guest code at {pc:#010x} failed: {source}")]
    CompileFailure {
        pc: u32,
        #[source]
        source: CompileError,
    },
}

/// Cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls to get_or_create.
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub compiles: u64,
    pub failures: u64,
    /// Native code bytes emitted by all compiles.
    pub native_bytes: u64,
    /// Guest bytes covered by all compiles.
    pub guest_bytes: u64,
    pub resets: u64,
    /// Units removed by invalidate_range.
    pub invalidated: u64,
    /// Units currently cached.
    pub live_units: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Translation Cache Statistics:")?;
        writeln!(
            f,
            "  Lookups: {} ({} hits, {} misses)",
            self.lookups, self.hits, self.misses
        )?;
        writeln!(
            f,
            "  Compiles: {} ({} failed)",
            self.compiles, self.failures
        )?;
        writeln!(
            f,
            "  Code: {} guest bytes -> {} native bytes",
            self.guest_bytes, self.native_bytes
        )?;
        write!(
            f,
            "  Units: {} live, {} invalidated, {} resets",
            self.live_units, self.invalidated, self.resets
        )
    }
}

/// Single-owner translation cache.
#[derive(Debug, Default)]
pub struct TranslationCache {
    units: HashMap<u32, Arc<TranslationUnit>>,
    stats: CacheStats,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query without compiling. Not counted in the statistics.
    pub fn lookup(&self, pc: u32) -> Option<Arc<TranslationUnit>> {
        self.units.get(&pc).cloned()
    }

    /// Return the unit for `pc`, compiling it on a miss.
    pub fn get_or_create<C: GuestCompiler + ?Sized>(
        &mut self,
        pc: u32,
        compiler: &C,
        memory: &dyn MemoryReader,
    ) -> Result<Arc<TranslationUnit>, CacheError> {
        self.stats.lookups += 1;
        if let Some(unit) = self.units.get(&pc) {
            self.stats.hits += 1;
            trace!("cache hit at {:#010x}", pc);
            return Ok(unit.clone());
        }
        self.stats.misses += 1;

        let block = match compiler.compile(pc, memory) {
            Ok(block) => block,
            Err(source) => {
                self.stats.failures += 1;
                warn!("compile failed at {:#010x}: {}", pc, source);
                return Err(CacheError::CompileFailure { pc, source });
            }
        };

        let unit = Arc::new(TranslationUnit::from_block(pc, block));
        self.stats.compiles += 1;
        self.stats.native_bytes += unit.native_size() as u64;
        self.stats.guest_bytes += unit.guest_extent as u64;
        debug!("compiled {}", unit);

        let previous = self.units.insert(pc, unit.clone());
        assert!(
            previous.is_none(),
            "translation cache corrupted: second unit inserted for {:#010x}",
            pc
        );
        self.stats.live_units = self.units.len();
        Ok(unit)
    }

    /// Discard every unit.
    pub fn reset(&mut self) {
        debug!("cache reset, dropping {} units", self.units.len());
        self.units.clear();
        self.stats.resets += 1;
        self.stats.live_units = 0;
    }

    /// Discard units whose guest bytes overlap `range`. Returns how many were removed.
    ///
    /// Takes any range form, so `..` and `a..=u32::MAX` reach the last guest byte.
    pub fn invalidate_range(&mut self, range: impl RangeBounds<u32>) -> usize {
        let (start, end) = guest_span(&range);
        if start >= end {
            return 0;
        }
        let before = self.units.len();
        self.units.retain(|_, unit| !unit.overlaps(start, end));
        let removed = before - self.units.len();
        if removed > 0 {
            debug!(
                "invalidated {} units in {:#010x}..{:#010x}",
                removed, start, end
            );
        }
        self.stats.invalidated += removed as u64;
        self.stats.live_units = self.units.len();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// All cached units ordered by guest PC.
    pub fn units(&self) -> Vec<Arc<TranslationUnit>> {
        let mut units: Vec<_> = self.units.values().cloned().collect();
        units.sort_by_key(|unit| unit.guest_start_pc);
        units
    }
}

/// Half-open u64 span of guest bytes covered by `range`.
fn guest_span(range: &impl RangeBounds<u32>) -> (u64, u64) {
    let start = match range.start_bound() {
        Bound::Included(&s) => s as u64,
        Bound::Excluded(&s) => s as u64 + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e as u64 + 1,
        Bound::Excluded(&e) => e as u64,
        Bound::Unbounded => 1 << 32,
    };
    (start, end)
}

/// Translation cache shared by several execution contexts.
#[derive(Debug, Default)]
pub struct SharedTranslationCache {
    inner: Mutex<TranslationCache>,
}

impl SharedTranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, pc: u32) -> Option<Arc<TranslationUnit>> {
        self.inner.lock().lookup(pc)
    }

    /// Same contract as [`TranslationCache::get_or_create`]. The lock is held while compiling.
    pub fn get_or_create<C: GuestCompiler + ?Sized>(
        &self,
        pc: u32,
        compiler: &C,
        memory: &dyn MemoryReader,
    ) -> Result<Arc<TranslationUnit>, CacheError> {
        self.inner.lock().get_or_create(pc, compiler, memory)
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn invalidate_range(&self, range: impl RangeBounds<u32>) -> usize {
        self.inner.lock().invalidate_range(range)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    pub fn into_inner(self) -> TranslationCache {
        self.inner.into_inner()
    }
}
