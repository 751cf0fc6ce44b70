use std::ffi::CStr;
use libc::c_char;


#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("invalid argument #{index}: not utf-8")]
    InvalidUtf8 { index: usize },

    /// argh usage or help output
    #[error("{0}")]
    Usage(String),
}

/// Collect a null terminated `char **` argv, a null pointer means no arguments.
///
/// # Safety
///
/// `command` must be null or point to a null terminated array of valid C strings
/// that outlive the returned slices.
pub unsafe fn collect_argv<'a>(command: *const *const c_char) -> Result<Vec<&'a str>, ArgsError> {
    let mut args = Vec::new();

    if command.is_null() {
        return Ok(args);
    }

    loop {
        let arg = *command.add(args.len());
        if arg.is_null() {
            break
        }

        let arg = CStr::from_ptr(arg)
            .to_str()
            .map_err(|_| ArgsError::InvalidUtf8 { index: args.len() })?;
        args.push(arg);
    }

    Ok(args)
}

pub fn parse_command<T: argh::FromArgs>(name: &str, args: &[&str]) -> Result<T, ArgsError> {
    T::from_args(&[name], args).map_err(|err| ArgsError::Usage(err.output))
}

/// # Safety
///
/// Same contract as [`collect_argv`].
pub unsafe fn command_from_ptr<T: argh::FromArgs>(
    name: &str,
    command: *const *const c_char
) -> Result<T, ArgsError> {
    let args = collect_argv(command)?;
    parse_command(name, &args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;
    use argh::FromArgs;

    /// test command
    #[derive(FromArgs, Debug)]
    struct Demo {
        /// a value
        #[argh(positional)]
        value: String,

        /// a flag
        #[argh(switch, short = 'f')]
        flag: bool,
    }

    fn argv(args: &[CString]) -> Vec<*const c_char> {
        args.iter()
            .map(|arg| arg.as_ptr())
            .chain(Some(ptr::null()))
            .collect()
    }

    #[test]
    fn test_null_command_is_empty() {
        let args = unsafe { collect_argv(ptr::null()) }.unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_collect_argv_keeps_order() {
        let owned = vec![
            CString::new("-f").unwrap(),
            CString::new("hello world").unwrap(),
        ];
        let ptrs = argv(&owned);

        let args = unsafe { collect_argv(ptrs.as_ptr()) }.unwrap();
        assert_eq!(args, vec!["-f", "hello world"]);

        let empty = argv(&[]);
        let args = unsafe { collect_argv(empty.as_ptr()) }.unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_collect_argv_rejects_non_utf8() {
        let owned = vec![
            CString::new("ok").unwrap(),
            CString::new(vec![0xff, 0xfe]).unwrap(),
        ];
        let ptrs = argv(&owned);

        let err = unsafe { collect_argv(ptrs.as_ptr()) }.unwrap_err();
        assert_eq!(err, ArgsError::InvalidUtf8 { index: 1 });
    }

    #[test]
    fn test_command_from_ptr() {
        let owned = vec![
            CString::new("-f").unwrap(),
            CString::new("0x10").unwrap(),
        ];
        let ptrs = argv(&owned);

        let cmd: Demo = unsafe { command_from_ptr("demo", ptrs.as_ptr()) }.unwrap();
        assert!(cmd.flag);
        assert_eq!(cmd.value, "0x10");
    }

    #[test]
    fn test_usage_error() {
        let err = parse_command::<Demo>("demo", &[]).unwrap_err();
        match err {
            ArgsError::Usage(output) => assert!(output.contains("value"), "{}", output),
            err => panic!("unexpected {:?}", err),
        }

        let err = parse_command::<Demo>("demo", &["--help"]).unwrap_err();
        match err {
            ArgsError::Usage(output) => assert!(output.contains("Usage: demo"), "{}", output),
            err => panic!("unexpected {:?}", err),
        }
    }
}
