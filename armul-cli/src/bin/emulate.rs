//! `emulate <in.bin>`: loads a flat binary image and runs it to completion,
//! printing GPIO accesses and the halt-time state dump to stdout as the
//! reference implementation does.

use std::path::PathBuf;
use std::process::ExitCode;

use armul::exec::{Machine, StdoutSink};
use armul::memory::Memory;
use clap::Parser;

/// Runs an assembled binary image to its `ANDEQ`-encoded halt.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Assembled binary image to load at address 0
    image: PathBuf,
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    armul_cli::init_logging(args.verbose);

    let bytes = match std::fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(err) => {
            armul_cli::report(args.image.display(), line!(), "main", err);
            return ExitCode::FAILURE;
        }
    };

    let mut machine = Machine::new(Memory::from_image(&bytes));
    let mut sink = StdoutSink;
    if let Err(err) = machine.run(&mut sink) {
        armul_cli::report(args.image.display(), line!(), "emulate", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
