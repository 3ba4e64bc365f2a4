//! tablerepl CLI entry point
//!
//! Parses arguments and dispatches to the CLI module, which prints the
//! result envelope. Exits non-zero on failure.

use tablerepl::cli;

fn main() {
    if cli::run().is_err() {
        std::process::exit(1);
    }
}
