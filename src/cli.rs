use clap::{arg,crate_version,Arg,ArgAction,Command};

const LONG_HELP: &str = "bootctl decrypts a vendor boot container and, unless `-no` is given,
unpacks its NTFS or exFAT volume image to the host filesystem.
Set RUST_LOG to control logging verbosity: trace,debug,info,warn,error.

Examples:
---------
Decrypt and extract:     `bootctl image.bin`
Decrypt only:             `bootctl -no image.bin`
Process several inputs:   `bootctl disk1.bin disk2.bin`";

pub fn build_cli() -> Command {
    Command::new("bootctl")
        .about("Decrypts and unpacks vendor boot containers")
        .after_long_help(LONG_HELP)
        .version(crate_version!())
        .arg(
            Arg::new("no-extract")
                .short('n')
                .long("no")
                .action(ArgAction::SetTrue)
                .help("decrypt only, do not extract the volume image"),
        )
        .arg(
            arg!([input_file] ... "container file(s) to decrypt")
                .required(false),
        )
        .subcommand(
            Command::new("completions")
                .about("generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .long("shell")
                        .required(true)
                        .value_parser(["bash","elv","fish","ps1","zsh"]),
                ),
        )
}
