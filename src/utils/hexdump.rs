use std::fmt::Write;

/// Uppercase hex of `bytes` with no separators, e.g. `[0xde, 0xad]` -> `DEAD`.
pub(crate) fn to_hex_upper(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, &b| {
            // Writing to a `String` cannot fail.
            let _ = write!(acc, "{:02X}", b);
            acc
        })
}
