macro_rules! cstr {
    ( unsafe $value:expr ) => {
        unsafe {
            let value = $value;
            if !value.is_null() {
                Some(std::ffi::CStr::from_ptr(value))
            } else {
                None
            }
        }
    }
}

pub mod sys;

use std::ffi::CStr;
use std::io::{ self, Write };
use std::panic::{ self, AssertUnwindSafe };
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use anyhow::Context;
use libc::{ c_char, c_void };
use autocxx::moveit::moveit;
use crate::args::collect_argv;
use crate::command::{ self, Subcommand };
use crate::inferior::{ register_searchable, FrameInfo, Inferior, MemoryRegion, Register, ThreadInfo };
use crate::plugin::{ self, CommandAdapter, ExecuteFn, Registry };
use sys::lldb;


pub struct LldbInferior<'a> {
    debugger: Pin<&'a mut lldb::SBDebugger>,
}

impl<'a> LldbInferior<'a> {
    pub fn new(debugger: Pin<&'a mut lldb::SBDebugger>) -> Self {
        LldbInferior { debugger }
    }
}

impl Inferior for LldbInferior<'_> {
    fn threads(&mut self) -> anyhow::Result<Vec<ThreadInfo>> {
        moveit!{
            let mut target = self.debugger.as_mut().GetSelectedTarget();
            let mut process = target.as_mut().GetProcess();
            let mut error = lldb::SBError::new();
        }

        let mut thread_list = Vec::new();

        let threads = process.as_mut().GetNumThreads() as usize;
        for thread_idx in 0..threads {
            moveit!(let mut thread = process.as_mut().GetThreadAtIndex(thread_idx));

            let name = cstr!(unsafe thread.GetName())
                .map(|name| Vec::from(name.to_bytes()));
            let mut frame_list = Vec::new();

            let frames = thread.as_mut().GetNumFrames();
            for frame_idx in 0..frames {
                moveit!{
                    let mut frame = thread.as_mut().GetFrameAtIndex(frame_idx);
                    let registers = frame.as_mut().GetRegisters();
                }

                let sp = frame.GetSP();
                let inlined = frame.IsInlined1();
                let mut register_list = Vec::new();

                let regs_list_len = if inlined { 0 } else { registers.GetSize() };
                for regs_list_idx in 0..regs_list_len {
                    moveit!(let mut regs = registers.GetValueAtIndex(regs_list_idx));

                    let regs_len = regs.as_mut().GetNumChildren();
                    for regs_idx in 0..regs_len {
                        moveit!{
                            let mut reg = regs.as_mut().GetChildAtIndex(regs_idx);
                            let mut reg_data = reg.as_mut().GetData();
                        };

                        let reg_name = cstr!(unsafe reg.as_mut().GetName())
                            .map(|name| Vec::from(name.to_bytes()));
                        let reg_data_size = reg_data.as_mut().GetByteSize();

                        if !register_searchable(reg_data_size) {
                            continue
                        }

                        let mut data: Vec<u8> = Vec::new();
                        data.try_reserve_exact(reg_data_size).context("oom")?;
                        error.as_mut().Clear();

                        // # Safety
                        //
                        // read raw data from register
                        unsafe {
                            let len = reg_data.as_mut().ReadRawData(
                                error.as_mut(),
                                0,
                                data.as_mut_ptr().cast(),
                                reg_data_size
                            );

                            data.set_len(std::cmp::min(len, reg_data_size));
                        }

                        if !error.Success() {
                            log::debug!("skip register {:?}: read failed", reg_name);
                            continue
                        }

                        register_list.push(Register { name: reg_name, data });
                    }
                }

                frame_list.push(FrameInfo {
                    index: frame_idx,
                    sp,
                    inlined,
                    registers: register_list,
                });
            }

            thread_list.push(ThreadInfo {
                index: thread_idx,
                name,
                frames: frame_list,
            });
        }

        Ok(thread_list)
    }

    fn memory_regions(&mut self) -> anyhow::Result<Vec<MemoryRegion>> {
        moveit!{
            let mut target = self.debugger.as_mut().GetSelectedTarget();
            let mut process = target.as_mut().GetProcess();
            let mut mem_list = process.as_mut().GetMemoryRegions();
            let mut mem = lldb::SBMemoryRegionInfo::new();
        }

        let mut regions = Vec::new();

        let mem_len = mem_list.GetSize();
        for mem_idx in 0..mem_len {
            if !mem_list.as_mut().GetMemoryRegionAtIndex(mem_idx, mem.as_mut()) {
                log::debug!("memory region #{} unavailable", mem_idx);
                continue
            }

            regions.push(MemoryRegion {
                range: mem.as_mut().GetRegionBase()..mem.as_mut().GetRegionEnd(),
                readable: mem.as_mut().IsReadable(),
                writable: mem.as_mut().IsWritable(),
                executable: mem.as_mut().IsExecutable(),
                name: cstr!(unsafe mem.as_mut().GetName())
                    .map(|name| Vec::from(name.to_bytes())),
            });
        }

        Ok(regions)
    }

    fn read_memory<'a>(
        &mut self,
        buf: &'a mut Vec<u8>,
        addr: u64,
        size: usize,
    ) -> anyhow::Result<&'a [u8]> {
        moveit!{
            let mut target = self.debugger.as_mut().GetSelectedTarget();
            let mut process = target.as_mut().GetProcess();
            let mut error = lldb::SBError::new();
        }

        buf.clear();
        buf.try_reserve_exact(size).context("oom")?;

        // # Safety
        //
        // read raw data from memory
        unsafe {
            let len = process.as_mut().ReadMemory(
                addr,
                buf.as_mut_ptr().cast(),
                size,
                error.as_mut()
            );

            buf.set_len(std::cmp::min(len, size));
        }

        if error.Success() {
            anyhow::ensure!(buf.len() == size, "short read? {} of {}", buf.len(), size);

            Ok(buf.as_slice())
        } else {
            let err_msg = cstr!(unsafe error.GetCString());
            anyhow::bail!("read memory failed: {:?}", err_msg)
        }
    }
}

extern "C" {
    fn mydbg_debugger_interpreter(debugger: *mut c_void) -> *mut c_void;
    fn mydbg_interpreter_free(interpreter: *mut c_void);
    fn mydbg_add_multiword(interpreter: *mut c_void, name: *const c_char, help: *const c_char) -> *mut c_void;
    fn mydbg_add_subcommand(
        parent: *mut c_void,
        name: *const c_char,
        execute: ExecuteFn,
        help: *const c_char
    ) -> bool;
    fn mydbg_command_free(command: *mut c_void);
}

/// `lldb::SBCommandInterpreter`, behind the c++ glue.
pub struct LldbRegistry {
    interpreter: *mut c_void,
}

/// An owned `lldb::SBCommand` handle.
pub struct SbCommand(*mut c_void);

impl Drop for SbCommand {
    fn drop(&mut self) {
        unsafe { mydbg_command_free(self.0) }
    }
}

impl Registry for LldbRegistry {
    type Command = SbCommand;

    fn add_multiword(&mut self, name: &CStr, help: Option<&CStr>) -> anyhow::Result<SbCommand> {
        let help = help.map(CStr::as_ptr).unwrap_or(std::ptr::null());
        let command = unsafe { mydbg_add_multiword(self.interpreter, name.as_ptr(), help) };

        anyhow::ensure!(!command.is_null(), "add multiword command {:?} failed", name);
        Ok(SbCommand(command))
    }

    fn add_subcommand(&mut self, parent: &mut SbCommand, adapter: &CommandAdapter) -> anyhow::Result<()> {
        let ok = unsafe {
            mydbg_add_subcommand(parent.0, adapter.name.as_ptr(), adapter.execute, adapter.help.as_ptr())
        };

        anyhow::ensure!(ok, "add command {:?} failed", adapter.name);
        Ok(())
    }
}

static REGISTERED: AtomicBool = AtomicBool::new(false);

pub static COMMANDS: [CommandAdapter; 2] = plugin::command_table(
    crate::mydbg_search_do_execute,
    crate::mydbg_read_do_execute,
);

fn init_logger() {
    let env = env_logger::Env::default()
        .filter_or("MYDBG_LOG", "warn")
        .write_style("MYDBG_LOG_STYLE");

    // lldb may already host another rust plugin with its own logger
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// An owned `lldb::SBCommandInterpreter` handle.
struct SbInterpreter(*mut c_void);

impl Drop for SbInterpreter {
    fn drop(&mut self) {
        unsafe { mydbg_interpreter_free(self.0) }
    }
}

/// # Safety
///
/// `debugger` must point to the live `lldb::SBDebugger` given to `PluginInitialize`.
pub unsafe fn plugin_initialize(debugger: *mut c_void) -> bool {
    init_logger();

    if debugger.is_null() {
        log::error!("no debugger");
        return false
    }

    let interpreter = mydbg_debugger_interpreter(debugger);
    if interpreter.is_null() {
        log::error!("no command interpreter");
        return false
    }
    let interpreter = SbInterpreter(interpreter);

    let mut registry = LldbRegistry { interpreter: interpreter.0 };

    match plugin::register(&REGISTERED, &mut registry, &COMMANDS) {
        Ok(_) => true,
        Err(err) => {
            log::error!("register {:?} failed: {:#}", plugin::MULTIWORD_NAME, err);
            false
        }
    }
}

/// Body of the exported `*_do_execute` functions.
///
/// # Safety
///
/// `debugger` must point to the `lldb::SBDebugger` lldb passed to `DoExecute`,
/// `command` must be null or a null terminated argv.
pub unsafe fn forward<C: Subcommand>(
    debugger: *mut c_void,
    command: *const *const c_char,
) -> bool {
    if debugger.is_null() {
        log::error!("{}: null debugger", C::NAME);
        return false
    }

    let ret = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut stdout = io::stdout().lock();

        let args = match collect_argv(command) {
            Ok(args) => args,
            Err(err) => {
                let _ = writeln!(stdout, "{}", err);
                return false
            }
        };

        let debugger = Pin::new_unchecked(&mut *(debugger as *mut lldb::SBDebugger));
        let mut inferior = LldbInferior::new(debugger);

        let ret = command::run::<C>(&args, &mut inferior, &mut stdout);
        let _ = stdout.flush();
        ret
    }));

    ret.unwrap_or_else(|_| {
        log::error!("{} panicked", C::NAME);
        false
    })
}
