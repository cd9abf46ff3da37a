use clap::Parser;
use regime::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
