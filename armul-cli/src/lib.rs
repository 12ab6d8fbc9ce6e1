//! Shared plumbing for the `assemble` and `emulate` binaries: log setup and
//! the `<file>:<line>:<func>(): <message>` error line both of them print.

use std::fmt::Display;

/// Installs a `tracing-subscriber` formatter controlled by `RUST_LOG`,
/// raising the default level once per `-v` the caller passed.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_target(false)
        .without_time()
        .init();
}

/// Prints one `<file>:<line>:<func>(): <message>` diagnostic line to stderr.
pub fn report(file: impl Display, line: impl Display, func: &str, message: impl Display) {
    eprintln!("{file}:{line}:{func}(): {message}");
}
