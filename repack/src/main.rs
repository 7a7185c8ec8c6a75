//! Harness repackager CLI entrypoint.
//!
//! Rebuilds the prebuilt instrumentation harness for an application under
//! test, or re-signs an existing package, and prints the resulting path.

use clap::Parser;
use harness_repack::cli::Cli;
use harness_repack::launcher::{exit_code_for_run_result, run};

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
