use clap::{Command,ArgMatches};
use clap_complete::{generate,Shell};
use std::io::stdout;

pub fn completions(cmd: &mut Command, sub: &ArgMatches) {
    let shell_name = sub.get_one::<String>("shell").unwrap();
    let shell = match shell_name.as_str() {
        "bash" => Shell::Bash,
        "elv" => Shell::Elvish,
        "fish" => Shell::Fish,
        "ps1" => Shell::PowerShell,
        "zsh" => Shell::Zsh,
        other => panic!("unsupported shell {other}"),
    };
    let name = cmd.get_name().to_string();
    generate(shell,cmd,name,&mut stdout());
}
