use std::io::Write;
use crate::args::parse_command;
use crate::inferior::Inferior;
use crate::{ read, search };


/// A `mydbg` subcommand that runs against the selected process.
pub trait Subcommand: argh::FromArgs {
    const NAME: &'static str;

    fn execute(self, inferior: &mut dyn Inferior, stdout: &mut dyn Write) -> anyhow::Result<()>;
}

impl Subcommand for search::Command {
    const NAME: &'static str = "search";

    fn execute(self, inferior: &mut dyn Inferior, stdout: &mut dyn Write) -> anyhow::Result<()> {
        search::Command::execute(self, inferior, stdout)
    }
}

impl Subcommand for read::Command {
    const NAME: &'static str = "read";

    fn execute(self, inferior: &mut dyn Inferior, stdout: &mut dyn Write) -> anyhow::Result<()> {
        read::Command::execute(self, inferior, stdout)
    }
}

/// Parse and run one invocation, the result is what lldb gets back.
///
/// Usage output and failures are written to `stdout`.
pub fn run<C: Subcommand>(
    args: &[&str],
    inferior: &mut dyn Inferior,
    stdout: &mut dyn Write,
) -> bool {
    let cmd = match parse_command::<C>(C::NAME, args) {
        Ok(cmd) => cmd,
        Err(output) => {
            let _ = writeln!(stdout, "{}", output);
            return false
        }
    };

    match cmd.execute(inferior, stdout) {
        Ok(()) => true,
        Err(err) => {
            log::error!("{} {:?} failed: {:#}", C::NAME, args, err);
            let _ = writeln!(stdout, "{} failed: {:?}", C::NAME, err);
            false
        }
    }
}
