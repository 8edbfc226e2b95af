// This module writes the contents of the translation cache as an AArch64 ELF relocatable object
// using the object crate, so generated code can be inspected with ordinary tools (objdump -d,
// llvm-objdump, gdb). Each unit's machine words are appended to .text, 4-byte aligned and
// least-significant byte first, and described by a function symbol named unit_<guest pc> whose
// size is the unit's native size. Units whose handle does not keep its words are skipped.

//! ELF image of the code cache.

use crate::arm64::encoder::words_to_bytes;
use crate::jit::unit::TranslationUnit;
use log::debug;
use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElfDumpError {
    #[error("Failed to build ELF object: {0}")]
    Write(#[from] object::write::Error),

    #[error("Failed to write ELF file: {0}")]
    Io(#[from] std::io::Error),
}

/// Symbol name for the unit starting at `pc`.
pub fn unit_symbol(pc: u32) -> String {
    format!("unit_{pc:08x}")
}

/// Build an ELF object holding every unit's code.
pub fn build_elf(units: &[Arc<TranslationUnit>]) -> Result<Vec<u8>, ElfDumpError> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Aarch64, Endianness::Little);
    let text = obj.section_id(StandardSection::Text);

    for unit in units {
        let words = unit.entry.words();
        if words.is_empty() {
            debug!("elf dump: unit {:#010x} has no code, skipped", unit.guest_start_pc);
            continue;
        }
        let bytes = words_to_bytes(words);
        let offset = obj.append_section_data(text, &bytes, 4);
        obj.add_symbol(Symbol {
            name: unit_symbol(unit.guest_start_pc).into_bytes(),
            value: offset,
            size: bytes.len() as u64,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }

    Ok(obj.write()?)
}

/// Build the object and write it to `path`.
pub fn write_elf(path: &Path, units: &[Arc<TranslationUnit>]) -> Result<usize, ElfDumpError> {
    let image = build_elf(units)?;
    std::fs::write(path, &image)?;
    debug!("elf dump: {} bytes written to {}", image.len(), path.display());
    Ok(image.len())
}
