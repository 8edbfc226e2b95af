// This module holds the guest side of the execution model: GuestState, the register block of the
// 32-bit big-endian guest CPU (data registers D0-D7, address registers A0-A7, FP0-FP7 kept as raw
// 64-bit patterns, the program counter, the status register and the three mode stack pointers
// USP/ISP/MSP), and the big-endian MemoryReader used for instruction fetch. The status-register
// flag bits are exported as constants. GuestState implements Display in the context-dump layout
// (four registers per row, SR flags as XNZVC letters with '.' for clear bits). GuestMemory is a
// flat region at a base address that serves fetches for the demo binary and for tests; reads
// outside it fail with FetchError.

//! Guest CPU state and instruction fetch.

use crate::core::error::FetchError;
use std::fmt;

/// Carry.
pub const SR_C: u16 = 0x0001;
/// Overflow.
pub const SR_V: u16 = 0x0002;
/// Zero.
pub const SR_Z: u16 = 0x0004;
/// Negative.
pub const SR_N: u16 = 0x0008;
/// Extend.
pub const SR_X: u16 = 0x0010;

/// Register block of the guest CPU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestState {
    pub d: [u32; 8],
    pub a: [u32; 8],
    /// FP0-FP7 as raw 64-bit patterns.
    pub fp: [u64; 8],
    pub pc: u32,
    pub sr: u16,
    pub usp: u32,
    pub isp: u32,
    pub msp: u32,
}

impl GuestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pc(mut self, pc: u32) -> Self {
        self.pc = pc;
        self
    }

    pub fn with_data(mut self, n: usize, value: u32) -> Self {
        self.d[n & 7] = value;
        self
    }

    pub fn with_address(mut self, n: usize, value: u32) -> Self {
        self.a[n & 7] = value;
        self
    }

    pub fn with_sr(mut self, sr: u16) -> Self {
        self.sr = sr;
        self
    }

    pub fn flag(&self, bit: u16) -> bool {
        self.sr & bit != 0
    }
}

impl fmt::Display for GuestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "M68K Context:")?;
        for (prefix, regs) in [("D", &self.d), ("A", &self.a)] {
            for (i, value) in regs.iter().enumerate() {
                if i == 4 {
                    writeln!(f)?;
                }
                write!(f, "    {prefix}{i} = 0x{value:08x}")?;
            }
            writeln!(f)?;
        }

        write!(f, "    PC = 0x{:08x}    SR = ", self.pc)?;
        for (bit, letter) in [(SR_X, 'X'), (SR_N, 'N'), (SR_Z, 'Z'), (SR_V, 'V'), (SR_C, 'C')] {
            let c = if self.flag(bit) { letter } else { '.' };
            write!(f, "{c}")?;
        }
        writeln!(f)?;
        write!(
            f,
            "    USP= 0x{:08x}    MSP= 0x{:08x}    ISP= 0x{:08x}",
            self.usp, self.msp, self.isp
        )
    }
}

/// Big-endian instruction fetch.
pub trait MemoryReader {
    fn read_u16(&self, addr: u32) -> Result<u16, FetchError>;

    fn read_u32(&self, addr: u32) -> Result<u32, FetchError> {
        let hi = self.read_u16(addr)? as u32;
        let lo = self.read_u16(addr.wrapping_add(2))? as u32;
        Ok(hi << 16 | lo)
    }
}

/// Flat guest memory region.
#[derive(Debug, Clone, Default)]
pub struct GuestMemory {
    base: u32,
    bytes: Vec<u8>,
}

impl GuestMemory {
    pub fn new(base: u32, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// Build a region from 16-bit instruction words.
    pub fn from_words(base: u32, words: &[u16]) -> Self {
        let bytes = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        Self::new(base, bytes)
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last guest address.
    pub fn end(&self) -> u64 {
        self.base as u64 + self.bytes.len() as u64
    }

    fn slice(&self, addr: u32, len: u32) -> Result<&[u8], FetchError> {
        let err = FetchError { addr, len };
        let start = addr.checked_sub(self.base).ok_or(err)? as usize;
        let end = start.checked_add(len as usize).ok_or(err)?;
        self.bytes.get(start..end).ok_or(err)
    }
}

impl MemoryReader for GuestMemory {
    fn read_u16(&self, addr: u32) -> Result<u16, FetchError> {
        let bytes = self.slice(addr, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&self, addr: u32) -> Result<u32, FetchError> {
        let bytes = self.slice(addr, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
