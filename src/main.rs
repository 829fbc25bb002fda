#![forbid(unsafe_code)]

//! Entry point for the `shufv` binary.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("shufv: {e}");
        std::process::exit(e.exit_code());
    }
}
