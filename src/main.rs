use std::process::ExitCode;

use clap::Parser;
use quantfolio::cli::{run, Cli};

fn main() -> ExitCode {
    run(Cli::parse())
}
