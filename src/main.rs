//! # Command Line Interface
//!
//! Dispatch subcommands to `commands` module, translating `RtppError`
//! into the exit codes spec.md §7 calls for: 0 success, 1 parse/IO
//! failure, 2 pass invariant violation.

use colored::Colorize;
use runtime_preproc::commands;
use runtime_preproc::error::RtppError;
mod cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    let main_cmd = cli::build_cli();
    let matches = main_cmd.get_matches();

    let result = if let Some(cmd) = matches.subcommand_matches("patch") {
        commands::patch::patch(cmd)
    } else if let Some(cmd) = matches.subcommand_matches("print") {
        commands::print_cmd::print_cmd(cmd)
    } else if let Some(cmd) = matches.subcommand_matches("graphviz") {
        commands::graphviz_cmd::graphviz_cmd(cmd)
    } else {
        log::error!("No subcommand was found, try `rtpp --help`");
        std::process::exit(1);
    };

    if let Err(err) = result {
        eprintln!("{} {err}", "error:".red().bold());
        let code = match err {
            RtppError::Invariant(_) => 2,
            RtppError::Io(_) | RtppError::Parse { .. } | RtppError::Unsupported(_) => 1,
        };
        std::process::exit(code);
    }
}
