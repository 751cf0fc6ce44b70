fn main() -> anyhow::Result<()> {
    #[cfg(feature = "lldb")]
    build_lldb_glue()?;

    Ok(())
}

#[cfg(feature = "lldb")]
fn build_lldb_glue() -> anyhow::Result<()> {
    use std::env;
    use std::path::PathBuf;

    let path = "src/lldb/sys.rs";
    let glue = "wrapping/plugin.cpp";

    let include_dir = env::var_os("LLDB_INCLUDE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/usr/include"));

    let mut b = autocxx_build::Builder::new(path, &[&include_dir])
        .build()?;
    b.file(glue)
        .include(&include_dir)
        .flag_if_supported("-std=c++14")
        .compile("mydbg-lldb");

    if let Some(lib_dir) = env::var_os("LLDB_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", PathBuf::from(lib_dir).display());
        println!("cargo:rustc-link-lib=dylib=lldb");
    }

    println!("cargo:rerun-if-changed={}", path);
    println!("cargo:rerun-if-changed={}", glue);
    println!("cargo:rerun-if-env-changed=LLDB_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=LLDB_LIB_DIR");
    Ok(())
}
