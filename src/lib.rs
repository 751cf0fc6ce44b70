mod util;
pub mod args;
pub mod inferior;
pub mod command;
#[macro_use]
pub mod plugin;
pub mod search;
pub mod read;

#[cfg(feature = "lldb")]
pub mod lldb;

#[cfg(feature = "lldb")]
use libc::{ c_char, c_void };


/// `bool lldb::PluginInitialize(lldb::SBDebugger)`, looked up by `plugin load`.
///
/// `SBDebugger` is not trivially copyable, so the itanium abi passes it by
/// hidden pointer and the caller keeps ownership.
///
/// # Safety
///
/// Only lldb calls this, with a live `lldb::SBDebugger`.
#[cfg(all(feature = "lldb", not(target_env = "msvc")))]
#[export_name = plugin_initialize_symbol!()]
pub unsafe extern "C" fn lldb_plugin_initialize(debugger: *mut c_void) -> bool {
    lldb::plugin_initialize(debugger)
}

/// # Safety
///
/// Only lldb calls this, through the `mydbg search` adapter.
#[cfg(feature = "lldb")]
#[no_mangle]
pub unsafe extern "C" fn mydbg_search_do_execute(
    debugger: *mut c_void,
    command: *const *const c_char,
    _result: *mut c_void
) -> bool {
    lldb::forward::<search::Command>(debugger, command)
}

/// # Safety
///
/// Only lldb calls this, through the `mydbg read` adapter.
#[cfg(feature = "lldb")]
#[no_mangle]
pub unsafe extern "C" fn mydbg_read_do_execute(
    debugger: *mut c_void,
    command: *const *const c_char,
    _result: *mut c_void
) -> bool {
    lldb::forward::<read::Command>(debugger, command)
}
