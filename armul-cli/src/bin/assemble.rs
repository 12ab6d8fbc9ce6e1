//! `assemble <source.s> <out.bin>`: reads assembly source, emits the
//! assembled byte image, or reports every line's error and exits non-zero.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Assembles a `.s` source file into a flat binary image.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Assembly source file to read
    source: PathBuf,
    /// Path to write the assembled binary image to
    out: PathBuf,
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    armul_cli::init_logging(args.verbose);

    let source = match std::fs::read_to_string(&args.source) {
        Ok(source) => source,
        Err(err) => {
            armul_cli::report(args.source.display(), line!(), "main", err);
            return ExitCode::FAILURE;
        }
    };

    let program = match armul::assemble::assemble(&source) {
        Ok(program) => program,
        Err(errors) => {
            for error in &errors {
                armul_cli::report(args.source.display(), error.line, "assemble", &error.source);
            }
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(bytes = program.image.len(), labels = program.labels.len(), "assembled");

    if let Err(err) = std::fs::write(&args.out, &program.image) {
        armul_cli::report(args.out.display(), line!(), "main", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
