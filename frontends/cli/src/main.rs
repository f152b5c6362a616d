use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use arm_core::log_buffer;
use arm_core::{Cpu, ExecutionMode, MemoryMap};
use clap::Parser;

mod board;
mod config;

use board::{BoardStatus, HostBoard};
use config::{save_config, Config};

/// Cycles between log drains while running.
const LOG_SLICE: u64 = 100_000;

#[derive(Parser, Debug)]
#[command(version, about = "Runs a raw ARM7TDMI program image.", long_about = None)]
struct Args {
    /// Program image; defaults to the most recently run one.
    #[arg(name = "IMAGE")]
    image: Option<PathBuf>,

    /// Where the image is copied; defaults to the configured entry point.
    #[arg(long, value_parser = parse_address)]
    load_address: Option<u32>,

    /// First instruction; defaults to the load address.
    #[arg(long, value_parser = parse_address)]
    entry: Option<u32>,

    /// Start in Thumb state.
    #[arg(long)]
    thumb: bool,

    #[arg(long, default_value_t = 10_000_000)]
    cycles: u64,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final CPU state as TOML.
    #[arg(long)]
    dump_state: Option<PathBuf>,

    /// off, error, warn, info, debug or trace.
    #[arg(long, value_parser = parse_level)]
    log_level: Option<log::LevelFilter>,
}

/// Accepts `0x`-prefixed hex or decimal, with optional `_` separators.
fn parse_address(text: &str) -> Result<u32, String> {
    let digits = text.replace('_', "");
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => digits.parse(),
    };
    parsed.map_err(|e| format!("invalid address {text:?}: {e}"))
}

fn parse_level(text: &str) -> Result<log::LevelFilter, String> {
    text.parse().map_err(|_| format!("unknown log level {text:?}"))
}

fn print_logs() {
    for entry in log_buffer::drain_logs() {
        eprintln!("{entry}");
    }
}

fn build_cpu(args: &Args, config: &Config, image: &[u8]) -> io::Result<(Cpu, Rc<BoardStatus>)> {
    let load_address = args.load_address.unwrap_or(config.reset.entry_point);
    let entry = args.entry.unwrap_or(load_address);

    let mut map = MemoryMap::from_configs(&config.regions);
    if !map.load(load_address, image) {
        return Err(io::Error::other(format!(
            "image of {} bytes does not fit at {load_address:#010x}",
            image.len()
        )));
    }

    let board = HostBoard::new(config.timer_period);
    let status = board.status();

    let mut cpu = Cpu::new();
    let mut reset = config.reset;
    reset.entry_point = entry;
    cpu.set_reset_config(reset);
    cpu.associate_memory(Box::new(map));
    cpu.associate_board(Box::new(board));
    cpu.reset();
    if args.thumb {
        cpu.set_execution_mode(ExecutionMode::Thumb);
        cpu.set_pc(entry);
    }
    Ok((cpu, status))
}

/// Runs until the budget is spent, the program halts, or a step stalls.
fn run(cpu: &mut Cpu, status: &BoardStatus, budget: u64) -> u64 {
    let start = cpu.absolute_cycles();
    let mut next_drain = start + LOG_SLICE;
    while cpu.absolute_cycles() - start < budget && !status.halted.get() {
        let before = cpu.absolute_cycles();
        cpu.run();
        if cpu.absolute_cycles() == before {
            log::warn!("no progress at {:#010x}", cpu.pc());
            break;
        }
        if cpu.absolute_cycles() >= next_drain {
            print_logs();
            next_drain += LOG_SLICE;
        }
    }
    cpu.absolute_cycles() - start
}

fn report(cpu: &Cpu, status: &BoardStatus, elapsed: u64) {
    let reason = if status.halted.get() { "halted" } else { "budget spent" };
    println!("{reason} after {elapsed} cycles");
    println!(
        "pc={:#010x} cpsr={:#010x} mode={:?} state={:?}",
        cpu.pc(),
        cpu.cpsr().raw(),
        cpu.privilege_mode(),
        cpu.execution_mode()
    );
    for (row, regs) in cpu.registers().chunks(4).enumerate() {
        let line: Vec<String> = regs
            .iter()
            .enumerate()
            .map(|(i, value)| format!("r{:<2}={value:#010x}", row * 4 + i))
            .collect();
        println!("{}", line.join(" "));
    }
    println!(
        "timer irqs={} bios calls={} stubs={}",
        status.timer_irqs.get(),
        status.hle_calls.get(),
        status.stub_hits.get()
    );
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let default_level = if cfg!(feature = "debug_logs") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = log_buffer::init_logger(args.log_level.unwrap_or(default_level), log_buffer::DEFAULT_CAPACITY);

    let mut config = config::load_config(args.config.as_deref());
    let Some(image_path) = args.image.clone().or_else(|| config.recent_images.first().cloned()) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no image given and none run before"));
    };
    let image = fs::read(&image_path)?;
    log::info!("loaded {} ({} bytes)", image_path.display(), image.len());

    let (mut cpu, status) = build_cpu(&args, &config, &image)?;
    let elapsed = run(&mut cpu, &status, args.cycles);
    print_logs();
    report(&cpu, &status, elapsed);

    let dropped = log_buffer::dropped_logs();
    if dropped > 0 {
        eprintln!("{dropped} log entries were dropped");
    }

    if let Some(path) = &args.dump_state {
        let text = toml::to_string(&cpu.snapshot()).map_err(io::Error::other)?;
        fs::write(path, text)?;
    }

    config.add_recent(image_path);
    if let Err(e) = save_config(&config, args.config.as_deref()) {
        eprintln!("Failed to save config: {}", e);
    }
    Ok(())
}
