//! txmatrix CLI
//!
//! - `txmatrix matrix --variant V`: reset the backend and run every point of
//!   a matrix variant, then print the report
//! - `txmatrix scenario ...`: run a single point; the last stdout line is
//!   `PASS` or a `FAIL: ...` line
//! - `txmatrix reset`: stop, start and bootstrap the backend

mod commands;
mod logging;
mod run;

use std::process;

use commands::build_cli;

fn main() {
    let cli = build_cli();
    let matches = cli.get_matches();

    let code = match matches.subcommand() {
        Some((name, sub)) => {
            logging::init(sub.get_flag("quiet"));
            match name {
                "matrix" => run::matrix(sub),
                "scenario" => run::scenario(sub),
                "reset" => run::reset(sub),
                other => {
                    eprintln!("unknown command '{}'", other);
                    run::EXIT_FATAL
                }
            }
        }
        None => run::EXIT_FATAL,
    };
    process::exit(code);
}
