// This module provides arena-based translation session management using the bumpalo crate.
// A TranslationSession lives for the compilation of exactly one guest block: it owns a
// reference to the arena, collects the emitted A64 machine words in an arena-backed vector,
// and records per-block statistics (guest instructions decoded, host words emitted, and a
// per-mnemonic breakdown). When the block is finished the translator copies the words out
// into an executable handle and the arena is dropped, so nothing compiled for one block can
// leak into another. SessionStats implements Display so the breakdown can be written to the
// diagnostics log.

//! Arena-based translation session management.
//!
//! All scratch state for translating one guest block lives in a bump arena
//! and shares the session lifetime.

use crate::arm64::encoder::MachineWord;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based translation session for a single guest block.
pub struct TranslationSession<'arena> {
    /// Arena allocator for the session.
    arena: &'arena Bump,

    /// Guest PC the block starts at.
    start_pc: u32,

    /// Emitted host words, in program order.
    words: RefCell<BumpVec<'arena, MachineWord>>,

    /// Statistics for this block.
    stats: RefCell<SessionStats>,
}

impl<'arena> TranslationSession<'arena> {
    /// Create a new session for the block starting at `start_pc`.
    pub fn new(arena: &'arena Bump, start_pc: u32) -> Self {
        Self {
            arena,
            start_pc,
            words: RefCell::new(BumpVec::new_in(arena)),
            stats: RefCell::new(SessionStats::default()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub fn start_pc(&self) -> u32 {
        self.start_pc
    }

    /// Append one host word.
    pub fn emit(&self, word: MachineWord) {
        self.words.borrow_mut().push(word);
    }

    /// Append a sequence of host words.
    pub fn emit_all(&self, words: &[MachineWord]) {
        self.words.borrow_mut().extend_from_slice(words);
    }

    /// Number of host words emitted so far.
    pub fn position(&self) -> usize {
        self.words.borrow().len()
    }

    /// Record that a guest instruction was translated.
    pub fn record_instruction(&self, mnemonic: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.guest_instructions += 1;
        *stats.instruction_counts.entry(mnemonic).or_insert(0) += 1;
    }

    /// Copy the emitted words out of the arena.
    pub fn finish(&self) -> Vec<MachineWord> {
        let words = self.words.borrow();
        self.stats.borrow_mut().native_words = words.len();
        words.iter().copied().collect()
    }

    /// Get session statistics.
    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.borrow().clone();
        stats.native_words = self.position();
        stats
    }
}

/// Statistics for one translated block.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Guest instructions decoded and translated.
    pub guest_instructions: usize,

    /// Host words emitted.
    pub native_words: usize,

    /// Count of each guest mnemonic translated.
    pub instruction_counts: HashMap<&'static str, usize>,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Translation Session Statistics:")?;
        writeln!(f, "  Guest instructions: {}", self.guest_instructions)?;
        writeln!(
            f,
            "  Host code size: {} words ({} bytes)",
            self.native_words,
            self.native_words * 4
        )?;

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::test::TestContext;

    #[test]
    fn test_session_creation() {
        let ctx = TestContext::new();
        let session = ctx.create_session(0x1000);

        assert_eq!(session.start_pc(), 0x1000);
        assert_eq!(session.position(), 0);
        let stats = session.stats();
        assert_eq!(stats.guest_instructions, 0);
        assert_eq!(stats.native_words, 0);
    }

    #[test]
    fn test_emit_and_finish() {
        let ctx = TestContext::new();
        let session = ctx.create_session(0);

        session.emit(MachineWord(0xD503201F));
        session.emit_all(&[MachineWord(0x52800020), MachineWord(0xD65F03C0)]);
        assert_eq!(session.position(), 3);

        let words = session.finish();
        assert_eq!(
            words,
            vec![
                MachineWord(0xD503201F),
                MachineWord(0x52800020),
                MachineWord(0xD65F03C0)
            ]
        );
        assert!(ctx.memory_used() > 0);
    }

    #[test]
    fn test_session_statistics() {
        let ctx = TestContext::new();
        ctx.with_session(0x400, |session| {
            session.record_instruction("add.l");
            session.record_instruction("moveq");
            session.record_instruction("add.l");
            session.emit(MachineWord(0));

            let stats = session.stats();
            assert_eq!(stats.guest_instructions, 3);
            assert_eq!(stats.native_words, 1);
            assert_eq!(stats.instruction_counts["add.l"], 2);
            assert_eq!(stats.instruction_counts["moveq"], 1);
        });
    }

    #[test]
    fn test_statistics_display() {
        let ctx = TestContext::new();
        let session = ctx.create_session(0);
        session.record_instruction("bra");
        session.emit_all(&[MachineWord(0), MachineWord(1)]);

        let output = format!("{}", session.stats());
        assert!(output.contains("Guest instructions: 1"));
        assert!(output.contains("2 words (8 bytes)"));
        assert!(output.contains("bra: 1"));
    }
}
