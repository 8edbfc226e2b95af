//! The ELF image of a populated cache carries every unit's code and symbol.

use emujit::arm64::InterpretingAllocator;
use emujit::jit::{build_elf, write_elf, Driver, GuestMemory, GuestState};
use emujit::m68k::BlockTranslator;
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};

fn populated_driver() -> Driver<BlockTranslator<InterpretingAllocator>, GuestMemory> {
    let memory = GuestMemory::from_words(
        0x1000,
        &[
            0x7003, // moveq #3,d0
            0xD280, // add.l d0,d1
            0x5380, // subq.l #1,d0
            0x66FA, // bne.s 0x1002
            0x4EF9, 0x0000, 0x3000, // jmp $3000
        ],
    );
    let translator = BlockTranslator::new(InterpretingAllocator::default());
    let mut driver = Driver::new(translator, memory).unwrap();
    driver.run(GuestState::new(), 0x1000, 0x3000).unwrap();
    driver
}

#[test]
fn text_holds_every_unit() {
    let _ = env_logger::builder().is_test(true).try_init();
    let driver = populated_driver();
    let units = driver.cache().units();
    assert_eq!(units.len(), 3);

    let image = build_elf(&units).unwrap();
    let file = object::File::parse(&*image).unwrap();
    assert_eq!(file.architecture(), object::Architecture::Aarch64);
    assert!(file.is_little_endian());

    let text = file.section_by_name(".text").unwrap();
    let native: u64 = units.iter().map(|u| u.native_size() as u64).sum();
    assert_eq!(text.size(), native);

    let data = text.data().unwrap();
    let first = units[0].entry.words()[0].raw();
    assert_eq!(&data[..4], &first.to_le_bytes());

    for unit in &units {
        let name = format!("unit_{:08x}", unit.guest_start_pc);
        let symbol = file
            .symbols()
            .find(|s| s.name() == Ok(name.as_str()))
            .unwrap_or_else(|| panic!("missing symbol {name}"));
        assert_eq!(symbol.kind(), SymbolKind::Text);
        assert_eq!(symbol.size(), unit.native_size() as u64);

        let start = (symbol.address() - text.address()) as usize;
        let words = unit.entry.words();
        let last = words[words.len() - 1].raw().to_le_bytes();
        let end = start + unit.native_size();
        assert_eq!(&data[end - 4..end], &last);
    }
}

#[test]
fn write_elf_creates_file() {
    let driver = populated_driver();
    let path = std::env::temp_dir().join(format!("emujit-dump-{}.o", std::process::id()));

    let written = write_elf(&path, &driver.cache().units()).unwrap();
    let on_disk = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(written, on_disk.len());
    assert_eq!(&on_disk[..4], b"\x7fELF");
}
