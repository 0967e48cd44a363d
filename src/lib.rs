// SOOMFON stream controller driver - shared library
// Configuration and helpers used by the CLI

pub mod config;

pub use config::{ConfigError, DriverConfig};

/// Parse hex byte arguments such as `["00", "0x03", "5a7e"]`
///
/// Each argument holds one or more whole bytes; an optional `0x` prefix is
/// accepted.
pub fn parse_hex_bytes<S: AsRef<str>>(args: &[S]) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        let digits = arg
            .strip_prefix("0x")
            .or_else(|| arg.strip_prefix("0X"))
            .unwrap_or(arg);
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(format!("'{arg}' is not a whole number of hex bytes"));
        }
        for i in (0..digits.len()).step_by(2) {
            let pair = digits
                .get(i..i + 2)
                .ok_or_else(|| format!("'{arg}' is not ASCII hex"))?;
            let byte =
                u8::from_str_radix(pair, 16).map_err(|e| format!("'{arg}': {e}"))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}
