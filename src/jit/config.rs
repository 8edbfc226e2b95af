//! Translator and driver configuration.

use log::warn;
use std::path::PathBuf;

/// Environment variable overriding [`JitConfig::max_block_instructions`].
pub const MAX_BLOCK_ENV: &str = "EMUJIT_MAX_BLOCK";

/// Default number of guest instructions per translation unit.
pub const DEFAULT_MAX_BLOCK_INSTRUCTIONS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitConfig {
    /// Upper bound on guest instructions in one unit. A block that reaches it
    /// ends with a jump to the next guest instruction.
    pub max_block_instructions: usize,
    /// Drop all cached units at the start of every run.
    pub reset_cache_on_run: bool,
    /// Write the code cache as an ELF object here after a run.
    pub elf_dump: Option<PathBuf>,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            max_block_instructions: DEFAULT_MAX_BLOCK_INSTRUCTIONS,
            reset_cache_on_run: false,
            elf_dump: None,
        }
    }
}

impl JitConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(MAX_BLOCK_ENV) {
            config.apply_max_block(&value);
        }
        config
    }

    fn apply_max_block(&mut self, value: &str) {
        match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => self.max_block_instructions = n,
            _ => warn!(
                "ignoring {}={:?}: expected a positive integer",
                MAX_BLOCK_ENV, value
            ),
        }
    }

    pub fn with_max_block_instructions(mut self, n: usize) -> Self {
        self.max_block_instructions = n.max(1);
        self
    }
}
