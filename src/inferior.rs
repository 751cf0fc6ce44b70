use std::ops::Range;


/// registers wider than this are vector state, not worth a look
pub const MAX_REGISTER_SIZE: usize = 128;

pub struct ThreadInfo {
    pub index: usize,
    pub name: Option<Vec<u8>>,
    pub frames: Vec<FrameInfo>,
}

pub struct FrameInfo {
    pub index: u32,
    pub sp: u64,
    pub inlined: bool,
    pub registers: Vec<Register>,
}

pub struct Register {
    pub name: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct MemoryRegion {
    pub range: Range<u64>,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub name: Option<Vec<u8>>,
}

/// Whether a register of `size` bytes is read at all.
pub fn register_searchable(size: usize) -> bool {
    size != 0 && size <= MAX_REGISTER_SIZE
}

pub trait Inferior {
    /// All threads of the selected process, with their frames and registers.
    ///
    /// Inlined frames carry no registers, registers failing
    /// [`register_searchable`] are left out.
    fn threads(&mut self) -> anyhow::Result<Vec<ThreadInfo>>;

    fn memory_regions(&mut self) -> anyhow::Result<Vec<MemoryRegion>>;

    /// Read exactly `size` bytes at `addr` into `buf`.
    ///
    /// A failed or short read is an error.
    fn read_memory<'a>(
        &mut self,
        buf: &'a mut Vec<u8>,
        addr: u64,
        size: usize,
    ) -> anyhow::Result<&'a [u8]>;
}

impl MemoryRegion {
    pub fn perms(&self) -> String {
        [
            if self.readable { 'r' } else { '-' },
            if self.writable { 'w' } else { '-' },
            if self.executable { 'x' } else { '-' },
        ].iter().collect()
    }
}

#[test]
fn test_register_searchable() {
    assert!(!register_searchable(0));
    assert!(register_searchable(1));
    assert!(register_searchable(8));
    assert!(register_searchable(MAX_REGISTER_SIZE));
    assert!(!register_searchable(MAX_REGISTER_SIZE + 1));
    assert!(!register_searchable(256));
}

#[cfg(test)]
pub mod fake {
    use super::*;

    #[derive(Default)]
    pub struct FakeInferior {
        pub threads: Vec<FakeThread>,
        pub regions: Vec<(MemoryRegion, Vec<u8>)>,
        pub reads: Vec<(u64, usize)>,
    }

    pub struct FakeThread {
        pub name: Option<&'static str>,
        pub frames: Vec<(u64, bool, Vec<(&'static str, Vec<u8>)>)>,
    }

    impl FakeInferior {
        pub fn region(mut self, base: u64, data: Vec<u8>, perms: &str, name: Option<&str>) -> Self {
            let region = MemoryRegion {
                range: base..base + data.len() as u64,
                readable: perms.contains('r'),
                writable: perms.contains('w'),
                executable: perms.contains('x'),
                name: name.map(|name| name.as_bytes().to_vec()),
            };
            self.regions.push((region, data));
            self
        }

        pub fn thread(mut self, thread: FakeThread) -> Self {
            self.threads.push(thread);
            self
        }
    }

    impl Inferior for FakeInferior {
        fn threads(&mut self) -> anyhow::Result<Vec<ThreadInfo>> {
            let threads = self.threads.iter()
                .enumerate()
                .map(|(index, thread)| ThreadInfo {
                    index,
                    name: thread.name.map(|name| name.as_bytes().to_vec()),
                    frames: thread.frames.iter()
                        .enumerate()
                        .map(|(index, (sp, inlined, regs))| FrameInfo {
                            index: index as u32,
                            sp: *sp,
                            inlined: *inlined,
                            registers: regs.iter()
                                .filter(|(_, data)| !*inlined && register_searchable(data.len()))
                                .map(|(name, data)| Register {
                                    name: Some(name.as_bytes().to_vec()),
                                    data: data.clone(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect();
            Ok(threads)
        }

        fn memory_regions(&mut self) -> anyhow::Result<Vec<MemoryRegion>> {
            Ok(self.regions.iter().map(|(region, _)| region.clone()).collect())
        }

        fn read_memory<'a>(
            &mut self,
            buf: &'a mut Vec<u8>,
            addr: u64,
            size: usize,
        ) -> anyhow::Result<&'a [u8]> {
            self.reads.push((addr, size));

            let (region, data) = self.regions.iter()
                .find(|(region, _)| region.range.contains(&addr))
                .ok_or_else(|| anyhow::format_err!("read memory failed: unmapped {:#x}", addr))?;

            let start = (addr - region.range.start) as usize;
            let end = std::cmp::min(start + size, data.len());
            anyhow::ensure!(end - start == size, "short read?");

            buf.clear();
            buf.extend_from_slice(&data[start..end]);
            Ok(buf.as_slice())
        }
    }
}
