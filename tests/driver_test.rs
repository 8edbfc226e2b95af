//! End-to-end runs: guest images through the block translator, the
//! interpreting allocator and the execution driver.

use emujit::arm64::{x, InterpretingAllocator, RegisterBinding};
use emujit::core::{CompileError, ExecutionError};
use emujit::jit::{
    Driver, DriverError, DriverPhase, GuestCompiler, GuestMemory, GuestState, JitConfig,
    ManualClock, MonotonicClock,
};
use emujit::m68k::BlockTranslator;

const BASE: u32 = 0x1000;

fn driver(words: &[u16]) -> Driver<BlockTranslator<InterpretingAllocator>, GuestMemory> {
    let _ = env_logger::builder().is_test(true).try_init();
    let translator = BlockTranslator::new(InterpretingAllocator::default());
    Driver::new(translator, GuestMemory::from_words(BASE, words)).unwrap()
}

#[test]
fn straight_line_block_adds_registers() {
    let mut driver = driver(&[
        0x203C, 0x0000, 0x0028, // move.l #40,d0
        0x223C, 0x0000, 0x0002, // move.l #2,d1
        0xD280, // add.l d0,d1
        0x4EF9, 0x0000, 0x2000, // jmp $2000
    ]);

    let outcome = driver.run(GuestState::new(), BASE, 0x2000).unwrap();
    assert_eq!(outcome.state.d[1], 42);
    assert_eq!(outcome.state.d[0], 40);
    assert_eq!(outcome.state.pc, 0x2000);
    assert_eq!(outcome.stats.dispatch_cycles, 1);
    assert_eq!(outcome.stats.unit_selections, 1);
    assert_eq!(outcome.stats.cache.compiles, 1);
    assert_eq!(driver.phase(), DriverPhase::Halted);
}

#[test]
fn counted_loop_reuses_its_unit() {
    let mut driver = driver(&[
        0x7003, // moveq #3,d0
        0xD280, // loop: add.l d0,d1
        0x5380, // subq.l #1,d0
        0x66FA, // bne.s loop
        0x4EF9, 0x0000, 0x3000, // jmp $3000
    ]);

    let outcome = driver.run(GuestState::new(), BASE, 0x3000).unwrap();
    assert_eq!(outcome.state.d[1], 3 + 2 + 1);
    assert_eq!(outcome.state.d[0], 0);

    // 0x1000 (taken to 0x1002), 0x1002 twice, then 0x1008.
    let stats = &outcome.stats;
    assert_eq!(stats.dispatch_cycles, 4);
    assert_eq!(stats.cache.compiles, 3);
    // The second pass through 0x1002 re-enters the current unit without a lookup.
    assert_eq!(stats.unit_selections, 3);
    assert_eq!(stats.cache.lookups, 3);

    let pcs: Vec<u32> = driver
        .cache()
        .units()
        .iter()
        .map(|unit| unit.guest_start_pc)
        .collect();
    assert_eq!(pcs, vec![0x1000, 0x1002, 0x1008]);
}

#[test]
fn second_run_hits_the_cache() {
    let mut driver = driver(&[0x7207, 0x4EF9, 0x0000, 0x2000]); // moveq #7,d1; jmp $2000
    driver.run(GuestState::new(), BASE, 0x2000).unwrap();
    let outcome = driver.run(GuestState::new(), BASE, 0x2000).unwrap();
    assert_eq!(outcome.state.d[1], 7);
    assert_eq!(outcome.stats.cache.compiles, 1);
    assert_eq!(outcome.stats.cache.hits, 1);
}

#[test]
fn initial_registers_flow_through() {
    // add.l d2,d3; movea.l d3,a5; jmp (a5)
    let mut driver = driver(&[0xD682, 0x2A43, 0x4ED5]);
    let initial = GuestState::new().with_data(2, 0x100).with_data(3, 0x4000);

    let outcome = driver.run(initial, BASE, 0x4100).unwrap();
    assert_eq!(outcome.state.d[3], 0x4100);
    assert_eq!(outcome.state.a[5], 0x4100);
    assert_eq!(outcome.state.d[2], 0x100);
}

#[test]
fn unsupported_opcode_reports_state() {
    let mut driver = driver(&[
        0x7005, // moveq #5,d0
        0x6002, // bra.s +2
        0x4E71, // nop (skipped)
        0x4E75, // rts
    ]);

    let err = driver.run(GuestState::new(), BASE, 0).unwrap_err();
    match &err {
        DriverError::CompileFailure {
            pc, source, state, ..
        } => {
            assert_eq!(*pc, 0x1006);
            assert_eq!(
                *source,
                CompileError::UnsupportedOpcode {
                    pc: 0x1006,
                    opcode: 0x4E75
                }
            );
            assert_eq!(state.pc, 0x1006);
            assert_eq!(state.d[0], 5);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.state().is_some());
    assert_eq!(driver.phase(), DriverPhase::Halted);
    assert_eq!(driver.cache().len(), 1);

    // The first block ran before the failing compile.
    let stats = err.stats().unwrap();
    assert_eq!(stats.dispatch_cycles, 1);
    assert_eq!(stats.cache.compiles, 1);
    assert_eq!(stats.cache.failures, 1);
}

#[test]
fn fetch_outside_image_fails_compile() {
    let mut driver = driver(&[0x4EF9, 0x0000, 0x8000]); // jmp $8000
    let err = driver.run(GuestState::new(), BASE, 0).unwrap_err();
    assert!(matches!(
        err,
        DriverError::CompileFailure {
            pc: 0x8000,
            source: CompileError::Fetch(_),
            ..
        }
    ));
}

#[test]
fn entry_equal_to_halt_does_nothing() {
    let mut driver = driver(&[0x4E75]);
    let outcome = driver.run(GuestState::new().with_data(0, 9), BASE, BASE).unwrap();
    assert_eq!(outcome.stats.dispatch_cycles, 0);
    assert_eq!(outcome.stats.cache.compiles, 0);
    assert_eq!(outcome.state.d[0], 9);
}

#[test]
fn one_cycle_per_block() {
    // Each block is a single jmp to the next one.
    let mut words = Vec::new();
    for i in 1..=5u32 {
        let target = BASE + i * 6;
        words.extend([0x4EF9, (target >> 16) as u16, target as u16]);
    }
    let mut driver = driver(&words);

    let outcome = driver.run(GuestState::new(), BASE, BASE + 30).unwrap();
    assert_eq!(outcome.stats.dispatch_cycles, 5);
    assert_eq!(outcome.stats.unit_selections, 5);
    assert_eq!(outcome.stats.cache.compiles, 5);
}

#[test]
fn block_limit_splits_without_changing_results() {
    let words = [
        0x7001, // moveq #1,d0
        0x7202, // moveq #2,d1
        0xD280, // add.l d0,d1
        0xD081, // add.l d1,d0
        0x4EF9, 0x0000, 0x2000, // jmp $2000
    ];
    let config = JitConfig::default().with_max_block_instructions(2);
    let translator = BlockTranslator::from_config(InterpretingAllocator::default(), &config);
    let mut split = Driver::with_parts(
        translator,
        GuestMemory::from_words(BASE, &words),
        ManualClock::new(0, 1),
        config,
        RegisterBinding::EMU68,
    )
    .unwrap();

    let outcome = split.run(GuestState::new(), BASE, 0x2000).unwrap();
    assert_eq!(outcome.state.d[1], 3);
    assert_eq!(outcome.state.d[0], 4);
    assert_eq!(outcome.stats.dispatch_cycles, 3);
    assert_eq!(outcome.stats.guest_micros, 3);

    let whole = driver(&words).run(GuestState::new(), BASE, 0x2000).unwrap();
    assert_eq!(whole.state, outcome.state);
    assert_eq!(whole.stats.dispatch_cycles, 1);
}

#[test]
fn execution_fault_ends_run_with_entry_state() {
    // moveq #5,d0; jmp $2000, run under a one-step budget.
    let allocator = InterpretingAllocator::default().with_step_limit(1);
    let mut driver = Driver::new(
        BlockTranslator::new(allocator),
        GuestMemory::from_words(BASE, &[0x7005, 0x4EF9, 0x0000, 0x2000]),
    )
    .unwrap();

    let err = driver
        .run(GuestState::new().with_data(0, 9), BASE, 0x2000)
        .unwrap_err();
    match &err {
        DriverError::Execution { pc, source, state, .. } => {
            assert_eq!(*pc, BASE);
            assert_eq!(*source, ExecutionError::StepLimit { limit: 1 });
            // The faulting unit's register writes are not stored back.
            assert_eq!(state.pc, BASE);
            assert_eq!(state.d[0], 9);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(driver.phase(), DriverPhase::Halted);
    assert_eq!(err.stats().unwrap().dispatch_cycles, 1);
}

#[test]
fn binding_mismatch_is_rejected() {
    let translator = BlockTranslator::new(InterpretingAllocator::default());
    let mut other = RegisterBinding::EMU68;
    other.data.swap(0, 1);
    let result = Driver::with_parts(
        translator,
        GuestMemory::default(),
        MonotonicClock::new(),
        JitConfig::default(),
        other,
    );
    assert!(matches!(result, Err(DriverError::BindingMismatch)));
}

#[test]
fn translator_emits_for_the_allocator_binding() {
    let mut swapped = RegisterBinding::EMU68;
    swapped.data.swap(0, 1);
    let translator = BlockTranslator::new(InterpretingAllocator::new(swapped));
    assert_eq!(translator.register_binding(), &swapped);

    // The allocator's binding is the one checked against the driver's.
    let mut driver = Driver::with_parts(
        translator,
        GuestMemory::from_words(BASE, &[0x7005, 0x4EF9, 0x0000, 0x2000]),
        MonotonicClock::new(),
        JitConfig::default(),
        swapped,
    )
    .unwrap();
    let outcome = driver.run(GuestState::new(), BASE, 0x2000).unwrap();
    assert_eq!(outcome.state.d[0], 5);
    assert_eq!(outcome.state.d[1], 0);

    let mismatched = BlockTranslator::new(InterpretingAllocator::new(swapped));
    let result = Driver::with_parts(
        mismatched,
        GuestMemory::default(),
        MonotonicClock::new(),
        JitConfig::default(),
        RegisterBinding::EMU68,
    );
    assert!(matches!(result, Err(DriverError::BindingMismatch)));
}

#[test]
fn invalid_binding_is_rejected() {
    let mut binding = RegisterBinding::EMU68;
    binding.address[0] = x(19);
    let translator = BlockTranslator::new(InterpretingAllocator::new(binding));
    let result = Driver::with_parts(
        translator,
        GuestMemory::default(),
        MonotonicClock::new(),
        JitConfig::default(),
        binding,
    );
    assert!(matches!(result, Err(DriverError::Binding(_))));
}
