use std::fmt::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use jiff::{Timestamp, civil::DateTime, tz::Offset};

use crate::err::{DeserializationError, DeserializationResult};

/// Milliseconds between 1601-01-01 (FILETIME epoch) and 1970-01-01 (Unix epoch).
pub(crate) const FILETIME_EPOCH_OFFSET_MS: i64 = -11_644_473_600_000;

fn invalid_time(what: &'static str) -> DeserializationError {
    DeserializationError::InvalidData { what, offset: 0 }
}

/// Convert a FILETIME tick count (100ns since 1601-01-01 UTC) to a timestamp,
/// truncated to millisecond precision.
pub(crate) fn filetime_to_timestamp(ticks: u64) -> DeserializationResult<Timestamp> {
    let millis = i64::try_from(ticks / 10_000).map_err(|_| invalid_time("filetime"))?
        + FILETIME_EPOCH_OFFSET_MS;
    Timestamp::from_millisecond(millis).map_err(|_| invalid_time("filetime"))
}

/// Decode a 16-byte SYSTEMTIME: eight little-endian `u16` fields
/// `year, month, day_of_week, day, hour, minute, second, milliseconds`.
pub(crate) fn systime_from_bytes(bytes: &[u8; 16]) -> DeserializationResult<Timestamp> {
    let field = |i: usize| LittleEndian::read_u16(&bytes[i * 2..i * 2 + 2]);
    let year = field(0);
    let month = field(1);
    let _day_of_week = field(2);
    let day = field(3);
    let hour = field(4);
    let minute = field(5);
    let second = field(6);
    let milliseconds = field(7);

    // The entire value is unset; by convention this is the FILETIME epoch.
    if bytes.iter().all(|&b| b == 0) {
        return filetime_to_timestamp(0);
    }

    let small = |v: u16| i8::try_from(v).map_err(|_| invalid_time("systemtime"));
    let year = i16::try_from(year).map_err(|_| invalid_time("systemtime"))?;
    if milliseconds > 999 {
        return Err(invalid_time("systemtime"));
    }

    let dt = DateTime::new(
        year,
        small(month)?,
        small(day)?,
        small(hour)?,
        small(minute)?,
        small(second)?,
        i32::from(milliseconds) * 1_000_000,
    )
    .map_err(|_| invalid_time("systemtime"))?;

    Offset::UTC
        .to_timestamp(dt)
        .map_err(|_| invalid_time("systemtime"))
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC, millisecond precision).
pub(crate) fn format_timestamp(ts: &Timestamp) -> String {
    let dt = Offset::UTC.to_datetime(*ts);
    let mut out = String::with_capacity(24);
    push_digits(&mut out, dt.year() as u32, 4);
    out.push('-');
    push_digits(&mut out, dt.month() as u32, 2);
    out.push('-');
    push_digits(&mut out, dt.day() as u32, 2);
    out.push('T');
    push_digits(&mut out, dt.hour() as u32, 2);
    out.push(':');
    push_digits(&mut out, dt.minute() as u32, 2);
    out.push(':');
    push_digits(&mut out, dt.second() as u32, 2);
    out.push('.');
    push_digits(&mut out, (dt.subsec_nanosecond() / 1_000_000) as u32, 3);
    out.push('Z');
    out
}

fn push_digits(out: &mut String, value: u32, width: u32) {
    for exp in (0..width).rev() {
        let digit = (value / 10_u32.pow(exp)) % 10;
        out.push(char::from(b'0' + digit as u8));
    }
}

/// Render a SID as `S-{revision}-{authority}-{sub1}-...`.
///
/// The identifier authority is a 48-bit big-endian integer. If the buffer holds fewer
/// sub-authorities than declared, rendering stops at the last complete one.
pub(crate) fn format_sid(bytes: &[u8]) -> DeserializationResult<String> {
    if bytes.len() < 8 {
        return Err(DeserializationError::Truncated {
            what: "sid",
            offset: 0,
            need: 8,
            have: bytes.len(),
        });
    }

    let revision = bytes[0];
    let sub_count = usize::from(bytes[1]);
    let authority = BigEndian::read_u48(&bytes[2..8]);

    let mut out = format!("S-{}-{}", revision, authority);
    for sub in bytes[8..].chunks_exact(4).take(sub_count) {
        let _ = write!(out, "-{}", LittleEndian::read_u32(sub));
    }
    Ok(out)
}

/// Render a 16-byte GUID as `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`.
///
/// The first three groups are stored little-endian, the last two are raw bytes.
pub(crate) fn format_guid(bytes: &[u8; 16]) -> String {
    let data1 = LittleEndian::read_u32(&bytes[0..4]);
    let data2 = LittleEndian::read_u16(&bytes[4..6]);
    let data3 = LittleEndian::read_u16(&bytes[6..8]);

    let mut s = String::with_capacity(38);
    let _ = write!(s, "{{{:08X}-{:04X}-{:04X}-", data1, data2, data3);
    for b in &bytes[8..10] {
        let _ = write!(s, "{:02X}", b);
    }
    s.push('-');
    for b in &bytes[10..16] {
        let _ = write!(s, "{:02X}", b);
    }
    s.push('}');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filetime_zero_is_windows_epoch() {
        let ts = filetime_to_timestamp(0).unwrap();
        assert_eq!(format_timestamp(&ts), "1601-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_filetime_known_value() {
        // 2019-03-06T15:45:37.123Z
        let ticks: u64 = 131_963_607_371_230_000;
        let ts = filetime_to_timestamp(ticks).unwrap();
        assert_eq!(format_timestamp(&ts), "2019-03-06T15:45:37.123Z");
    }

    #[test]
    fn test_filetime_out_of_range_fails() {
        assert!(filetime_to_timestamp(u64::MAX).is_err());
    }

    #[test]
    fn test_systime_decodes_fields_and_skips_day_of_week() {
        let fields: [u16; 8] = [2021, 7, 3, 15, 8, 30, 59, 250];
        let mut bytes = [0_u8; 16];
        for (i, f) in fields.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&f.to_le_bytes());
        }
        let ts = systime_from_bytes(&bytes).unwrap();
        assert_eq!(format_timestamp(&ts), "2021-07-15T08:30:59.250Z");
    }

    #[test]
    fn test_systime_rejects_invalid_month() {
        let fields: [u16; 8] = [2021, 13, 0, 1, 0, 0, 0, 0];
        let mut bytes = [0_u8; 16];
        for (i, f) in fields.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&f.to_le_bytes());
        }
        assert!(systime_from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_sid_well_known() {
        // S-1-5-18 (LocalSystem)
        let bytes = [1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0];
        assert_eq!(format_sid(&bytes).unwrap(), "S-1-5-18");
    }

    #[test]
    fn test_sid_truncates_missing_sub_authorities() {
        // Declares 3 sub authorities but only carries one and a half.
        let bytes = [1, 3, 0, 0, 0, 0, 0, 5, 21, 0, 0, 0, 7, 7];
        assert_eq!(format_sid(&bytes).unwrap(), "S-1-5-21");
    }

    #[test]
    fn test_sid_too_short() {
        assert!(format_sid(&[1, 1, 0]).is_err());
    }

    #[test]
    fn test_guid_grouping() {
        let bytes = [
            0x25, 0x96, 0x84, 0x54, 0x78, 0x54, 0x94, 0x49, 0xA5, 0xBA, 0x3E, 0x3B, 0x03, 0x28,
            0xC3, 0x0D,
        ];
        assert_eq!(
            format_guid(&bytes),
            "{54849625-5478-4994-A5BA-3E3B0328C30D}"
        );
        assert_eq!(
            format_guid(&[0; 16]),
            "{00000000-0000-0000-0000-000000000000}"
        );
    }
}
