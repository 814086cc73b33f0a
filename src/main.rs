//! aerokv CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors have already
//! been printed as a JSON response; the process exits non-zero.

use aerokv::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
