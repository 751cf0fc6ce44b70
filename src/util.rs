use std::io::Write;
use anyhow::Context;


pub fn print_pretty_bytes(
    stdout: &mut dyn Write,
    base: u64,
    bytes: &[u8],
) -> anyhow::Result<()> {
    use std::fmt;

    struct HexPrinter<'a>(&'a [u8]);
    struct AsciiPrinter<'a>(&'a [u8]);

    impl fmt::Display for HexPrinter<'_> {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            for &b in self.0.iter() {
                write!(f, "{:02x} ", b)?;
            }

            for _ in self.0.len()..16 {
                write!(f, "   ")?;
            }

            Ok(())
        }
    }

    impl fmt::Display for AsciiPrinter<'_> {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            use std::fmt::Write;

            for &b in self.0.iter() {
                let c = if b.is_ascii_graphic() { b as char } else { '.' };
                f.write_char(c)?;
            }

            Ok(())
        }
    }

    for (line, chunk) in bytes.chunks(16).enumerate() {
        let addr = base.wrapping_add(line as u64 * 16) as *const u8;

        writeln!(
            stdout,
            "{:018p}: {} {}",
            addr,
            HexPrinter(chunk),
            AsciiPrinter(chunk)
        )?;
    }

    Ok(())
}

/// Parse a 64bit number, `0x` prefixed big endian hex or decimal.
pub fn u64ptr(value: &str) -> anyhow::Result<u64> {
    let value = if let Some(value) = value.strip_prefix("0x") {
        anyhow::ensure!(!value.is_empty(), "empty hex value");
        let value = even_hex(value);
        let mut buf = [0; 8];
        let n = data_encoding::HEXLOWER_PERMISSIVE.decode_len(value.len())
            .map_err(|err| anyhow::format_err!("hex decode failed: {:?}", err))?;
        let n = buf.len().checked_sub(n).context("hex value is greater than 64bit")?;
        data_encoding::HEXLOWER_PERMISSIVE
            .decode_mut(value.as_bytes(), &mut buf[n..])
            .map_err(|err| anyhow::format_err!("hex decode failed: {:?}", err.error))?;
        u64::from_be_bytes(buf)
    } else {
        value.parse::<u64>().context("number parse failed")?
    };
    Ok(value)
}

/// `u64ptr` for argh `from_str_fn`.
pub fn parse_address(value: &str) -> Result<u64, String> {
    u64ptr(value).map_err(|err| format!("{:#}", err))
}

/// Decode hex bytes in written order, an odd digit count gets a leading zero.
pub fn hex_bytes(value: &str) -> anyhow::Result<Vec<u8>> {
    data_encoding::HEXLOWER_PERMISSIVE
        .decode(even_hex(value).as_bytes())
        .context("hex decode failed")
}

fn even_hex(value: &str) -> std::borrow::Cow<'_, str> {
    if value.len() % 2 == 1 {
        format!("0{}", value).into()
    } else {
        value.into()
    }
}

/// Parse a byte count, either plain or with a unit like `4KiB`.
pub fn parse_size(value: &str) -> Result<usize, String> {
    use human_size::SpecificSize;
    use human_size::multiples::Byte;

    if let Ok(n) = value.parse::<usize>() {
        return Ok(n);
    }

    // human_size wants a space between number and unit
    let normalized = match value.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => format!("{} {}", value[..idx].trim_end(), &value[idx..]),
        None => value.to_owned()
    };

    let size: SpecificSize<Byte> = normalized.parse()
        .map_err(|err| format!("invalid size {:?}: {}", value, err))?;
    let size = size.value();

    if size < 0.0 || size.fract() != 0.0 || size > usize::MAX as f64 {
        return Err(format!("invalid size {:?}", value));
    }

    Ok(size as usize)
}

#[test]
fn test_u64ptr() {
    assert_eq!(
        0x01,
        u64ptr("0x01").unwrap()
    );
    assert_eq!(
        0x0f,
        u64ptr("0xf").unwrap()
    );
    assert_eq!(
        0x000056257f77c380,
        u64ptr("0x000056257f77c380").unwrap()
    );
    assert_eq!(
        0x0056257f77c38000,
        u64ptr("0x0056257f77c38000").unwrap()
    );
    assert_eq!(
        0x56257f77c380,
        u64ptr("0x56257F77C380").unwrap()
    );
    assert_eq!(94_759_964_730_240, u64ptr("94759964730240").unwrap());

    assert!(u64ptr("0x0100000000000000000").is_err());
    assert!(u64ptr("0xzz").is_err());
    assert!(u64ptr("0x").is_err());
    assert!(u64ptr("").is_err());
    assert!(u64ptr("-1").is_err());
}

#[test]
fn test_hex_bytes() {
    assert_eq!(hex_bytes("deadBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(hex_bytes("abc").unwrap(), vec![0x0a, 0xbc]);
    assert!(hex_bytes("xyz").is_err());
}

#[test]
fn test_parse_size() {
    assert_eq!(parse_size("64"), Ok(64));
    assert_eq!(parse_size("4KiB"), Ok(4096));
    assert_eq!(parse_size("4 KiB"), Ok(4096));
    assert_eq!(parse_size("1 MiB"), Ok(1024 * 1024));
    assert!(parse_size("-3").is_err());
    assert!(parse_size("lots").is_err());
}

#[test]
fn test_print_pretty_bytes() {
    let mut out = Vec::new();
    let bytes: Vec<u8> = (b'A'..=b'R').collect();
    print_pretty_bytes(&mut out, 0x1000, &bytes).unwrap();

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "0x0000000000001000: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50  ABCDEFGHIJKLMNOP"
    );
    assert_eq!(
        lines[1],
        format!("0x0000000000001010: 51 52 {} QR", " ".repeat(14 * 3))
    );
}

#[test]
fn test_print_pretty_bytes_non_graphic() {
    let mut out = Vec::new();
    print_pretty_bytes(&mut out, 0, &[0x00, b' ', b'~', 0xff]).unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.ends_with(" ..~.\n"), "{:?}", out);
}
