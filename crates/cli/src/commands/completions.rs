//! `mizmaster completions` — Shell completion scripts.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

use crate::Cli;

pub fn run(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "mizmaster", &mut io::stdout());
}
