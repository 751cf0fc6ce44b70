use std::io::Write;
use std::ops::Range;
use argh::FromArgs;
use anyhow::Context;
use bstr::ByteSlice;
use crate::inferior::{ register_searchable, Inferior, ThreadInfo };
use crate::util::{ hex_bytes, parse_address, print_pretty_bytes, u64ptr };


const MAX_REGION_SIZE: u64 = 4 * 1024 * 1024 * 1024;
const CONTEXT_SIZE: usize = 16;

/// MyDbg Search command
#[derive(FromArgs)]
pub struct Command {
    /// search by value
    #[argh(positional)]
    value: String,

    /// value is hex encoded
    #[argh(switch, short = 'x')]
    is_hex: bool,

    /// value is 64bit pointer
    #[argh(switch, short = 'p')]
    is_64bit_pointer: bool,

    /// search register only
    #[argh(switch)]
    register_only: bool,

    /// search memory start address
    #[argh(option, from_str_fn(parse_address))]
    memory_start: Option<u64>,

    /// search memory end address
    #[argh(option, from_str_fn(parse_address))]
    memory_end: Option<u64>,
}

impl Command {
    pub fn value(&self) -> anyhow::Result<Value> {
        let value = if self.is_64bit_pointer {
            Value::U64(u64ptr(self.value.as_str())?)
        } else if self.is_hex {
            let value = self.value.as_str();
            if let Some(value) = value.strip_prefix("0x") {
                // written as a number, search it in memory order
                let mut buf = hex_bytes(value)?;
                buf.reverse();
                Value::Bytes(buf)
            } else {
                Value::Bytes(hex_bytes(value)?)
            }
        } else {
            Value::Bytes(self.value.as_bytes().to_vec())
        };

        anyhow::ensure!(!value.is_empty(), "empty search value");

        Ok(value)
    }

    fn window(&self) -> Range<u64> {
        self.memory_start.unwrap_or(0)..self.memory_end.unwrap_or(u64::MAX)
    }

    pub fn execute(self, inferior: &mut dyn Inferior, stdout: &mut dyn Write) -> anyhow::Result<()> {
        let value = self.value()?;

        let threads = inferior.threads().context("scan threads failed")?;
        let (thread_list, register_hits) = scan_threads_and_search_by_registers(stdout, &threads, &value)?;

        let memory_hits = if !self.register_only {
            search_by_all_memory_region(stdout, inferior, &value, &thread_list, self.window())?
        } else {
            0
        };

        log::debug!(
            "search finished, {} threads, {} register hits, {} memory hits",
            thread_list.len(),
            register_hits,
            memory_hits
        );

        stdout.flush()?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Value {
    U64(u64),
    Bytes(Vec<u8>)
}

impl Value {
    pub fn len(&self) -> usize {
        match self {
            Value::U64(_) => std::mem::size_of::<u64>(),
            Value::Bytes(v) => v.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches_register(&self, data: &[u8]) -> bool {
        match self {
            Value::U64(v) => data.get(..8)
                .and_then(|b| <[u8; 8]>::try_from(b).ok())
                .map(u64::from_le_bytes)
                == Some(*v),
            Value::Bytes(v) => memchr::memmem::find(data, v).is_some()
        }
    }

    /// Offsets of every hit in `buf`, which starts at address `base`.
    ///
    /// Pointers are only matched at 8 byte aligned addresses.
    fn find_iter<'a>(&'a self, base: u64, buf: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
        match self {
            Value::U64(v) => {
                const SIZE: usize = std::mem::size_of::<u64>();

                let skip = ((SIZE as u64 - base % SIZE as u64) % SIZE as u64) as usize;
                let aligned = buf.get(skip..).unwrap_or_default();

                let iter = aligned.chunks_exact(SIZE)
                    .enumerate()
                    .filter(move |(_, chunk)| {
                        <[u8; SIZE]>::try_from(*chunk).ok().map(u64::from_le_bytes) == Some(*v)
                    })
                    .map(move |(i, _)| skip + i * SIZE);
                either::Left(iter)
            },
            Value::Bytes(v) => either::Right(memchr::memmem::find_iter(buf, v.as_slice()))
        }
    }
}

/// Stack of one thread, bounded by the stack pointers of its frames.
pub struct ThreadStack {
    name: Vec<u8>,
    index: usize,
    range: Range<u64>
}

pub fn scan_threads_and_search_by_registers(
    stdout: &mut dyn Write,
    threads: &[ThreadInfo],
    value: &Value,
) -> anyhow::Result<(Vec<ThreadStack>, usize)> {
    let mut thread_list = Vec::with_capacity(threads.len());
    let mut hits = 0;

    for thread in threads {
        let mut sp_range: Option<Range<u64>> = None;

        for frame in &thread.frames {
            // find stack scope
            // https://github.com/llvm/llvm-project/blob/main/lldb/examples/darwin/heap_find/heap.py#L1172
            let sp_range = sp_range.get_or_insert_with(|| frame.sp..frame.sp);
            sp_range.start = std::cmp::min(sp_range.start, frame.sp);
            sp_range.end = std::cmp::max(sp_range.end, frame.sp);

            if frame.inlined {
                continue
            }

            for reg in &frame.registers {
                let size = reg.data.len();
                if !register_searchable(size) || size < value.len() {
                    continue
                }

                if !value.matches_register(&reg.data) {
                    continue
                }

                hits += 1;

                writeln!(
                    stdout, "thread #{} {:?}, frame #{}, register {:?}",
                    thread.index,
                    thread.name.as_ref().map(|b| b.as_bstr()),
                    frame.index,
                    reg.name.as_ref().map(|b| b.as_bstr()),
                )?;

                match value {
                    Value::U64(v) => print_pretty_bytes(stdout, 0, &v.to_le_bytes())?,
                    Value::Bytes(_) => print_pretty_bytes(stdout, 0, &reg.data)?
                }
                writeln!(stdout)?;
            }
        }

        thread_list.push(ThreadStack {
            name: thread.name.clone().unwrap_or_default(),
            index: thread.index,
            range: sp_range.context("no frame thread ?")?
        });
    }

    Ok((thread_list, hits))
}

pub fn search_by_all_memory_region(
    stdout: &mut dyn Write,
    inferior: &mut dyn Inferior,
    value: &Value,
    thread_list: &[ThreadStack],
    window: Range<u64>,
) -> anyhow::Result<usize> {
    let regions = inferior.memory_regions().context("get memory regions failed")?;

    let mut buf: Vec<u8> = Vec::new();
    let mut hits = 0;

    for region in &regions {
        if !region.readable {
            continue
        }

        let (region_start, region_end) = (region.range.start, region.range.end);
        anyhow::ensure!(
            region_start <= region_end,
            "invalid region addr: {}..{}",
            region_start,
            region_end
        );

        let start_addr = std::cmp::max(region_start, window.start);
        let end_addr = std::cmp::min(region_end, window.end);
        if start_addr >= end_addr {
            continue
        }

        let mem_size = end_addr - start_addr;
        if mem_size > MAX_REGION_SIZE {
            writeln!(stdout, "memory region too large: {:?}", start_addr..end_addr)?;
            continue
        }
        let mem_size: usize = mem_size.try_into()
            .with_context(|| format!("invalid region addr: {}..{}", start_addr, end_addr))?;

        let buf = match inferior.read_memory(&mut buf, start_addr, mem_size) {
            Ok(buf) => buf,
            Err(err) => {
                log::debug!("skip region {:#x}..{:#x}: {:#}", start_addr, end_addr, err);
                continue
            }
        };

        let mut iter = value.find_iter(start_addr, buf);

        let item = iter.next();
        if item.is_some() {
            writeln!(
                stdout,
                "[{:018p}-{:018p}] {} {:?}",
                region_start as *const u8,
                region_end as *const u8,
                region.perms(),
                region.name.as_ref().map(|b| b.as_bstr()),
            )?;
        }

        for offset in item.into_iter().chain(iter) {
            let addr = start_addr + offset as u64;
            hits += 1;

            if let Some(thread) = thread_list.iter()
                .find(|thread| thread.range.contains(&addr))
            {
                writeln!(stdout, "by thread #{} {:?}", thread.index, thread.name.as_bstr())?;
            }

            let show_start = offset.saturating_sub(CONTEXT_SIZE);
            let show_end = offset.saturating_add(value.len()).saturating_add(CONTEXT_SIZE);
            let show_end = std::cmp::min(show_end, buf.len());
            let show_addr_base = start_addr + show_start as u64;

            print_pretty_bytes(stdout, show_addr_base, &buf[show_start..show_end])?;
            writeln!(stdout)?;
        }
    }

    Ok(hits)
}
