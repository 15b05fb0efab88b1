//! # Command Line Interface
//!
//! Dispatch to the `commands` module.

#[cfg(windows)]
use colored;
use bootctl::commands;
mod cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    let main_cmd = cli::build_cli();
    let matches = main_cmd.get_matches();

    if let Some(sub) = matches.subcommand_matches("completions") {
        commands::completions::completions(&mut cli::build_cli(),sub);
        return;
    }

    let extract = !matches.get_flag("no-extract");
    let inputs: Vec<String> = matches
        .get_many::<String>("input_file")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    let mut had_failure = false;
    for input_file in &inputs {
        if let Err(e) = commands::run::run(input_file,extract) {
            log::error!("{input_file}: {e}");
            had_failure = true;
        }
    }

    if had_failure {
        std::process::exit(1);
    }
}
