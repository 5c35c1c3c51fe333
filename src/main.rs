mod emulator;

use std::path::PathBuf;

use clap::Parser;

use emulator::{DEFAULT_FRAME_RATE, DEFAULT_INSTRUCTIONS_PER_SECOND, Emulator, Settings};

#[derive(Parser)]
#[command(name = "chip8")]
#[command(about = "A CHIP-8 interpreter for the terminal")]
struct Args {
    /// ROM file to load
    rom: PathBuf,

    #[arg(long, default_value_t = DEFAULT_FRAME_RATE, value_parser = clap::value_parser!(u64).range(1..), help = "Frames (and timer ticks) per second")]
    frame_rate: u64,

    #[arg(long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND, help = "Instructions executed per second")]
    ips: u64,

    #[arg(long, help = "Seed for a reproducible random source")]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let settings = Settings::new(args.frame_rate, args.ips, args.rom, args.seed);
    let mut emulator = Emulator::new(settings);

    emulator.run()
}
