//! Command line runner.
//!
//! Loads a raw big-endian guest image, runs it through the reference
//! translator and the interpreting code allocator until the guest PC reaches
//! the halt address, then prints the guest context and run statistics.

use clap::Parser;
use emujit::arm64::{GuestRole, InterpretingAllocator, RegisterBinding};
use emujit::jit::{Driver, GuestMemory, GuestState, JitConfig, MonotonicClock};
use emujit::m68k::BlockTranslator;
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "emujit")]
#[command(about = "Run a guest image through the AArch64 block translator")]
struct Args {
    /// Raw guest image, loaded as-is
    image: PathBuf,

    /// Guest address of the first image byte
    #[arg(short, long, default_value = "0x1000", value_parser = parse_u32)]
    load_address: u32,

    /// Entry PC (defaults to the load address)
    #[arg(short, long, value_parser = parse_u32)]
    entry: Option<u32>,

    /// The run stops when the guest PC reaches this address
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    halt: u32,

    /// Initial register value, e.g. D0=0x10 or A7=0x80000 (repeatable)
    #[arg(short, long = "reg", value_name = "REG=VALUE", value_parser = parse_reg)]
    regs: Vec<(GuestRole, u32)>,

    /// Maximum guest instructions per translation unit
    #[arg(long)]
    max_block: Option<usize>,

    /// Write the code cache to this ELF file after the run
    #[arg(long)]
    dump_elf: Option<PathBuf>,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid value {s:?}: {e}"))
}

fn parse_reg(s: &str) -> Result<(GuestRole, u32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected REG=VALUE, got {s:?}"))?;
    let name = name.trim().to_ascii_uppercase();
    let (kind, index) = name.split_at(1.min(name.len()));
    let n: u8 = index
        .parse()
        .ok()
        .filter(|n| *n < 8)
        .ok_or_else(|| format!("unknown register {name:?}"))?;
    let role = match kind {
        "D" => GuestRole::Data(n),
        "A" => GuestRole::Address(n),
        _ => return Err(format!("unknown register {name:?}")),
    };
    Ok((role, parse_u32(value)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let image = fs::read(&args.image)?;
    info!(
        "loaded {} bytes at {:#010x} from {}",
        image.len(),
        args.load_address,
        args.image.display()
    );
    let memory = GuestMemory::new(args.load_address, image);

    let mut config = JitConfig::from_env();
    if let Some(n) = args.max_block {
        config = config.with_max_block_instructions(n);
    }
    config.elf_dump = args.dump_elf.clone();

    let binding = RegisterBinding::EMU68;
    let translator = BlockTranslator::from_config(InterpretingAllocator::new(binding), &config);
    let mut driver =
        Driver::with_parts(translator, memory, MonotonicClock::new(), config, binding)?;

    let mut state = GuestState::new();
    for (role, value) in &args.regs {
        match *role {
            GuestRole::Data(n) => state.d[n as usize] = *value,
            GuestRole::Address(n) => state.a[n as usize] = *value,
            _ => {}
        }
    }
    let entry = args.entry.unwrap_or(args.load_address);
    state.pc = entry;
    println!("{}", state);

    let result = driver.run(state, entry, args.halt);

    if let Some(path) = &driver.config().elf_dump {
        let bytes = emujit::jit::write_elf(path, &driver.cache().units())?;
        println!("[JIT] Code cache written to {} ({} bytes)", path.display(), bytes);
    }

    match result {
        Ok(outcome) => {
            println!("{}", outcome.state);
            println!("{}", outcome.stats);
            Ok(())
        }
        Err(err) => {
            if let Some(state) = err.state() {
                eprintln!("{}", state);
            }
            match err.stats() {
                Some(stats) => eprintln!("{}", stats),
                None => eprintln!("{}", driver.cache().stats()),
            }
            Err(err.into())
        }
    }
}
