use std::io::Write;
use std::path::PathBuf;
use argh::FromArgs;
use anyhow::Context;
use crate::inferior::Inferior;
use crate::util::{ parse_address, parse_size, print_pretty_bytes };


const DEFAULT_SIZE: usize = 64;
const CHUNK_SIZE: usize = 16 * 1024;

/// MyDbg Read command
#[derive(FromArgs)]
pub struct Command {
    /// read address
    #[argh(positional, from_str_fn(parse_address))]
    address: u64,

    /// read size, default 64, accepts units like `4KiB`
    #[argh(option, short = 's', from_str_fn(parse_size))]
    size: Option<usize>,

    /// read bytes to output file
    #[argh(option, short = 'o')]
    output: Option<PathBuf>
}

impl Command {
    pub fn execute(self, inferior: &mut dyn Inferior, stdout: &mut dyn Write) -> anyhow::Result<()> {
        let addr = self.address;
        let size = self.size.unwrap_or(DEFAULT_SIZE);

        addr.checked_add(size as u64)
            .with_context(|| format!("read range overflow: addr={:p},size={}", addr as *const u8, size))?;

        let mut buf: Vec<u8> = Vec::new();

        if let Some(path) = self.output {
            let mut output = std::fs::File::create(&path)
                .with_context(|| format!("create {} failed", path.display()))?;

            for offset in (0..size).step_by(CHUNK_SIZE) {
                let addr = addr + offset as u64;
                let size = std::cmp::min(size - offset, CHUNK_SIZE);

                let buf = inferior.read_memory(&mut buf, addr, size)
                    .with_context(|| format!("addr={:p},size={}", addr as *const u8, size))?;

                output.write_all(buf)?;
            }

            output.flush()?;
            log::debug!("read {} bytes at {:#x} into {}", size, addr, path.display());
        } else {
            let buf = inferior.read_memory(&mut buf, addr, size)?;

            print_pretty_bytes(stdout, addr, buf)?;
            stdout.flush()?;
        }

        Ok(())
    }
}
