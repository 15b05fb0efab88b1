//! Subcommand implementations, dispatched from `main.rs`.

pub mod completions;
pub mod run;
