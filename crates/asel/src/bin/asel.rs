#![forbid(unsafe_code)]

//! `asel` binary entry point.

use std::process::ExitCode;

use asel::cli::{self, Command};
use asel::logging;

fn main() -> ExitCode {
    let opts = match cli::parse() {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            println!("{}", cli::HELP_TEXT);
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("asel {}", cli::VERSION);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("asel: {err}");
            eprintln!("Try 'asel --help' for more information.");
            return ExitCode::from(cli::EXIT_FAILURE);
        }
    };

    if let Err(err) = logging::init_from_env() {
        eprintln!("asel: logging disabled: {err}");
    }

    let result = cli::run(&opts);
    match &result {
        Ok(choice) => println!("{choice}"),
        Err(err) if err.is_cancelled() => {}
        Err(err) => eprintln!("asel: {err}"),
    }
    ExitCode::from(cli::exit_code(&result))
}
