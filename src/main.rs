use std::error::Error;
use std::path::PathBuf;
use std::{fs, process};

use clap::Parser;

use rv64_emulator::bus::{SystemBus, SystemConfig};
use rv64_emulator::devices::uart::Uart;
use rv64_emulator::execute::{Hart, StopReason};
use rv64_emulator::loader;
use rv64_emulator::Uxlen;

fn parse_address(s: &str) -> Result<Uxlen, String> {
    let digits = s.trim_start_matches("0x").replace('_', "");
    Uxlen::from_str_radix(&digits, 16).map_err(|e| format!("invalid address {s}: {e}"))
}

/// Runs a RISC-V ELF image on a single RV64 hart.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ELF image to run.
    image: PathBuf,

    /// Stop after this many instructions.
    #[arg(short, long, default_value_t = SystemConfig::default().max_instructions)]
    max_instructions: u64,

    /// Physical address of main memory (hex).
    #[arg(long, value_parser = parse_address, default_value = "0x8000_0000")]
    dram_base: Uxlen,

    /// Main memory size in MiB.
    #[arg(long, default_value_t = 128)]
    dram_mib: usize,

    #[arg(long, value_parser = parse_address, default_value = "0x1000_0000")]
    uart_base: Uxlen,

    #[arg(long, value_parser = parse_address, default_value = "0x0c00_0000")]
    plic_base: Uxlen,

    /// Forward stdin to the UART.
    #[arg(long)]
    stdin: bool,
}

impl Args {
    fn config(&self) -> SystemConfig {
        SystemConfig {
            dram_base: self.dram_base,
            dram_size: self.dram_mib << 20,
            uart_base: self.uart_base,
            plic_base: self.plic_base,
            max_instructions: self.max_instructions,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let config = args.config();
    let image = fs::read(&args.image)?;

    let uart = Uart::new(Box::new(std::io::stdout()));
    if args.stdin {
        uart.spawn_stdin_reader();
    }
    let mut bus = SystemBus::with_uart(config.clone(), uart);
    let loaded = loader::load_elf(&image, &mut bus)?;
    bus.set_tohost(loaded.tohost);
    log::info!(
        "Loaded {}, entry {:#x}, tohost {:x?}",
        args.image.display(),
        loaded.entry,
        loaded.tohost
    );

    let mut hart = Hart::new(bus, loaded.entry);
    match hart.run(config.max_instructions) {
        StopReason::HostExit(code) => {
            log::info!("Guest exited with code {code}");
            process::exit(code as i32);
        }
        StopReason::Fatal(trap) => {
            log::error!("Stopped by {trap:?}");
            process::exit(1);
        }
        StopReason::MaxInstrReached => {
            log::warn!(
                "Instruction budget of {} exhausted at pc {:#x}",
                config.max_instructions,
                hart.reg_pc
            );
            process::exit(2);
        }
    }
}
