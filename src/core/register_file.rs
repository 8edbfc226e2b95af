//! Host register identifiers and register sets.
//!
//! Registers are named by bank and index, the same way for every consumer:
//! the encoder validates operands against them, the register binding checks
//! its table for overlaps with [`RegBitSet`], and the interpreter indexes its
//! register file with them.

use std::fmt;

/// Maximum number of register banks supported (GP, FP).
pub const MAX_REGISTER_BANKS: usize = 2;

/// Maximum number of registers per bank.
pub const MAX_REGISTERS_PER_BANK: usize = 32;

/// Type for register bank indices.
pub type RegBank = u8;

/// Type for register IDs within a bank.
pub type RegId = u8;

/// General purpose (X/W) bank.
pub const GP_BANK: RegBank = 0;

/// SIMD/FP (V/D) bank.
pub const FP_BANK: RegBank = 1;

/// Combined register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsmReg {
    pub bank: RegBank,
    pub id: RegId,
}

impl AsmReg {
    pub const fn new(bank: RegBank, id: RegId) -> Self {
        Self { bank, id }
    }

    /// Whether the identifier names an architectural register at all.
    pub const fn is_valid(&self) -> bool {
        (self.bank as usize) < MAX_REGISTER_BANKS && (self.id as usize) < MAX_REGISTERS_PER_BANK
    }

    pub const fn is_gp(&self) -> bool {
        self.bank == GP_BANK
    }
}

impl fmt::Display for AsmReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.bank, self.id) {
            (GP_BANK, 31) => write!(f, "xzr/sp"),
            (GP_BANK, id) => write!(f, "x{id}"),
            (FP_BANK, id) => write!(f, "v{id}"),
            (bank, id) => write!(f, "r{bank}.{id}"),
        }
    }
}

/// Bit set for tracking register sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegBitSet {
    /// Bit mask for each register bank.
    banks: [u32; MAX_REGISTER_BANKS],
}

impl RegBitSet {
    /// Create empty register set.
    pub const fn new() -> Self {
        Self {
            banks: [0; MAX_REGISTER_BANKS],
        }
    }

    /// Build a set from a list of registers. Invalid registers are ignored.
    pub fn from_regs(regs: &[AsmReg]) -> Self {
        let mut set = Self::new();
        for &reg in regs {
            set.set(reg);
        }
        set
    }

    /// Check if register is set.
    pub fn contains(&self, reg: AsmReg) -> bool {
        if !reg.is_valid() {
            return false;
        }
        (self.banks[reg.bank as usize] & (1u32 << reg.id)) != 0
    }

    /// Set a register. Returns `false` if it was already present.
    pub fn set(&mut self, reg: AsmReg) -> bool {
        if !reg.is_valid() {
            return false;
        }
        let bit = 1u32 << reg.id;
        let fresh = self.banks[reg.bank as usize] & bit == 0;
        self.banks[reg.bank as usize] |= bit;
        fresh
    }

    /// Clear a register.
    pub fn clear(&mut self, reg: AsmReg) {
        if reg.is_valid() {
            self.banks[reg.bank as usize] &= !(1u32 << reg.id);
        }
    }

    /// Count number of set registers in bank.
    pub fn count_in_bank(&self, bank: RegBank) -> u32 {
        if bank as usize >= MAX_REGISTER_BANKS {
            return 0;
        }
        self.banks[bank as usize].count_ones()
    }

    /// Iterate over the registers in the set, bank by bank.
    pub fn iter(&self) -> impl Iterator<Item = AsmReg> + '_ {
        self.banks.iter().enumerate().flat_map(|(bank, &mask)| {
            (0..MAX_REGISTERS_PER_BANK as u8)
                .filter(move |id| mask & (1u32 << id) != 0)
                .map(move |id| AsmReg::new(bank as RegBank, id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_tracks_banks_separately() {
        let mut set = RegBitSet::new();
        assert!(set.set(AsmReg::new(GP_BANK, 8)));
        assert!(set.set(AsmReg::new(FP_BANK, 8)));
        assert!(!set.set(AsmReg::new(GP_BANK, 8)));

        assert_eq!(set.count_in_bank(GP_BANK), 1);
        assert_eq!(set.count_in_bank(FP_BANK), 1);

        set.clear(AsmReg::new(GP_BANK, 8));
        assert!(!set.contains(AsmReg::new(GP_BANK, 8)));
        assert!(set.contains(AsmReg::new(FP_BANK, 8)));
    }

    #[test]
    fn test_invalid_registers_are_ignored() {
        let mut set = RegBitSet::new();
        assert!(!set.set(AsmReg::new(GP_BANK, 32)));
        assert!(!set.set(AsmReg::new(5, 0)));
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn test_iteration_order() {
        let a = RegBitSet::from_regs(&[AsmReg::new(GP_BANK, 30), AsmReg::new(GP_BANK, 1)]);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            vec![AsmReg::new(GP_BANK, 1), AsmReg::new(GP_BANK, 30)]
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(AsmReg::new(GP_BANK, 18).to_string(), "x18");
        assert_eq!(AsmReg::new(GP_BANK, 31).to_string(), "xzr/sp");
        assert_eq!(AsmReg::new(FP_BANK, 9).to_string(), "v9");
    }
}
