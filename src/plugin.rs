use std::ffi::CStr;
use libc::{ c_char, c_void };
use std::sync::atomic::{ AtomicBool, Ordering };


/// Signature of `SBCommandPluginInterface::DoExecute` as seen from the glue:
/// debugger, null terminated argv, result object.
pub type ExecuteFn = unsafe extern "C" fn(
    debugger: *mut c_void,
    command: *const *const c_char,
    result: *mut c_void,
) -> bool;

pub const MULTIWORD_NAME: &CStr = c"mydbg";

/// Itanium mangled `lldb::PluginInitialize(lldb::SBDebugger)`, the symbol
/// `plugin load` resolves.
macro_rules! plugin_initialize_symbol {
    () => { "_ZN4lldb16PluginInitializeENS_10SBDebuggerE" }
}

pub const PLUGIN_INITIALIZE_SYMBOL: &str = plugin_initialize_symbol!();

pub struct CommandAdapter {
    pub name: &'static CStr,
    pub help: &'static CStr,
    pub execute: ExecuteFn,
}

impl CommandAdapter {
    /// Forward one invocation, unchanged, and hand back its result.
    ///
    /// # Safety
    ///
    /// The handles must be valid for `execute`.
    pub unsafe fn invoke(
        &self,
        debugger: *mut c_void,
        command: *const *const c_char,
        result: *mut c_void,
    ) -> bool {
        (self.execute)(debugger, command, result)
    }
}

pub const fn command_table(search: ExecuteFn, read: ExecuteFn) -> [CommandAdapter; 2] {
    [
        CommandAdapter {
            name: c"search",
            help: c"search value from stack/heap/registers",
            execute: search,
        },
        CommandAdapter {
            name: c"read",
            help: c"read value from memory",
            execute: read,
        },
    ]
}

/// The host command interpreter.
pub trait Registry {
    type Command;

    fn add_multiword(&mut self, name: &CStr, help: Option<&CStr>) -> anyhow::Result<Self::Command>;

    fn add_subcommand(&mut self, parent: &mut Self::Command, adapter: &CommandAdapter) -> anyhow::Result<()>;
}

/// Attach `commands` under `mydbg`, unless `latch` says it was done already.
///
/// Returns whether anything was registered. A failed attempt still sets the latch.
pub fn register<R: Registry>(
    latch: &AtomicBool,
    registry: &mut R,
    commands: &[CommandAdapter],
) -> anyhow::Result<bool> {
    if latch.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        log::warn!("{:?} already registered", MULTIWORD_NAME);
        return Ok(false);
    }

    let mut parent = registry.add_multiword(MULTIWORD_NAME, None)?;

    for adapter in commands {
        registry.add_subcommand(&mut parent, adapter)?;
        log::debug!("registered {:?} {:?}", MULTIWORD_NAME, adapter.name);
    }

    log::info!("{:?} registered with {} subcommands", MULTIWORD_NAME, commands.len());

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRegistry {
        multiwords: Vec<CString>,
        subcommands: Vec<(usize, CString, CString, ExecuteFn)>,
        reject: Option<&'static str>,
    }

    impl Registry for RecordingRegistry {
        type Command = usize;

        fn add_multiword(&mut self, name: &CStr, help: Option<&CStr>) -> anyhow::Result<usize> {
            assert!(help.is_none());
            self.multiwords.push(name.to_owned());
            Ok(self.multiwords.len() - 1)
        }

        fn add_subcommand(&mut self, parent: &mut usize, adapter: &CommandAdapter) -> anyhow::Result<()> {
            if self.reject.is_some_and(|name| adapter.name.to_bytes() == name.as_bytes()) {
                anyhow::bail!("rejected {:?}", adapter.name);
            }

            self.subcommands.push((*parent, adapter.name.to_owned(), adapter.help.to_owned(), adapter.execute));
            Ok(())
        }
    }

    // (adapter, debugger, command, result)
    static CALLS: Mutex<Vec<(&'static str, usize, usize, usize)>> = Mutex::new(Vec::new());

    unsafe extern "C" fn fake_search(debugger: *mut c_void, command: *const *const c_char, result: *mut c_void) -> bool {
        CALLS.lock().unwrap().push(("search", debugger as usize, command as usize, result as usize));
        !debugger.is_null()
    }

    unsafe extern "C" fn fake_read(debugger: *mut c_void, command: *const *const c_char, result: *mut c_void) -> bool {
        CALLS.lock().unwrap().push(("read", debugger as usize, command as usize, result as usize));
        !debugger.is_null()
    }

    fn calls_of(name: &str) -> Vec<(usize, usize, usize)> {
        CALLS.lock().unwrap()
            .iter()
            .filter(|call| call.0 == name)
            .map(|call| (call.1, call.2, call.3))
            .collect()
    }

    #[test]
    fn test_plugin_initialize_symbol() {
        fn source_name(name: &str) -> String {
            format!("{}{}", name.len(), name)
        }

        // function lldb::PluginInitialize, one parameter lldb::SBDebugger,
        // the namespace substituted by S_
        let mangled = format!(
            "_ZN{}{}EN{}{}E",
            source_name("lldb"),
            source_name("PluginInitialize"),
            "S_",
            source_name("SBDebugger"),
        );
        assert_eq!(PLUGIN_INITIALIZE_SYMBOL, mangled);
    }

    #[test]
    fn test_register_attaches_both_once() {
        let latch = AtomicBool::new(false);
        let commands = command_table(fake_search, fake_read);
        let mut registry = RecordingRegistry::default();

        assert!(register(&latch, &mut registry, &commands).unwrap());
        assert!(!register(&latch, &mut registry, &commands).unwrap());

        assert_eq!(registry.multiwords, vec![CString::new("mydbg").unwrap()]);

        let names: Vec<(usize, &CStr, &CStr)> = registry.subcommands.iter()
            .map(|(parent, name, help, _)| (*parent, name.as_c_str(), help.as_c_str()))
            .collect();
        assert_eq!(names, vec![
            (0, c"search", c"search value from stack/heap/registers"),
            (0, c"read", c"read value from memory"),
        ]);
    }

    #[test]
    fn test_register_failure_is_reported_once() {
        let latch = AtomicBool::new(false);
        let commands = command_table(fake_search, fake_read);
        let mut registry = RecordingRegistry { reject: Some("read"), ..Default::default() };

        assert!(register(&latch, &mut registry, &commands).is_err());
        assert!(latch.load(Ordering::Acquire));
        assert!(!register(&latch, &mut registry, &commands).unwrap());
        assert_eq!(registry.multiwords.len(), 1);
    }

    #[test]
    fn test_adapter_forwards_unchanged() {
        let commands = command_table(fake_search, fake_read);
        let debugger = 0x1000 as *mut c_void;
        let argv = [c"-p".as_ptr(), c"0x10".as_ptr(), ptr::null()];
        let result = 0x2000 as *mut c_void;

        let before = calls_of("search").len();
        let ok = unsafe { commands[0].invoke(debugger, argv.as_ptr(), result) };

        assert!(ok);
        let calls = calls_of("search");
        assert_eq!(calls.len(), before + 1);
        assert!(calls.contains(&(0x1000, argv.as_ptr() as usize, 0x2000)));
    }

    #[test]
    fn test_adapter_returns_callee_result() {
        let commands = command_table(fake_search, fake_read);
        let argv = [ptr::null()];

        let ok = unsafe { commands[1].invoke(0x3000 as *mut c_void, argv.as_ptr(), ptr::null_mut()) };
        assert!(ok);

        let ok = unsafe { commands[1].invoke(ptr::null_mut(), argv.as_ptr(), 0x4000 as *mut c_void) };
        assert!(!ok);

        let calls = calls_of("read");
        assert!(calls.contains(&(0x3000, argv.as_ptr() as usize, 0)));
        assert!(calls.contains(&(0, argv.as_ptr() as usize, 0x4000)));
    }
}
