use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;
use crate::utils::utf16::decode_utf16le_bytes_z;

/// A lightweight cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`. All reads are little-endian and
/// advance the cursor on success; a failed read leaves the cursor where it was.
///
/// `base` is the absolute offset of `buf[0]` (non-zero when decoding a nested fragment that was
/// copied out of a larger buffer). Offsets stored in Binary XML are absolute, so comparisons
/// and error reports go through [`ByteCursor::position`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn with_pos(buf: &'a [u8], pos: usize, base: u64) -> DeserializationResult<Self> {
        // Allow pos == len (EOF), reject pos > len.
        let _ = bytes::slice_r(buf, base, pos, 0, "cursor.position")?;
        Ok(Self { buf, pos, base })
    }

    #[inline]
    pub(crate) fn buf(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn base(&self) -> u64 {
        self.base
    }

    /// Absolute position (base + relative position).
    #[inline]
    pub(crate) fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub(crate) fn set_pos(&mut self, pos: usize, what: &'static str) -> DeserializationResult<()> {
        let _ = bytes::slice_r(self.buf, self.base, pos, 0, what)?;
        self.pos = pos;
        Ok(())
    }

    /// Translate an absolute offset into a position within this cursor's slice.
    pub(crate) fn relative(&self, absolute: u64, what: &'static str) -> DeserializationResult<usize> {
        absolute
            .checked_sub(self.base)
            .and_then(|rel| usize::try_from(rel).ok())
            .filter(|&rel| rel <= self.buf.len())
            .ok_or(DeserializationError::Truncated {
                what,
                offset: absolute,
                need: 1,
                have: 0,
            })
    }

    /// Fail with `Truncated` unless at least `need` bytes remain.
    #[inline]
    pub(crate) fn ensure(&self, need: usize, what: &'static str) -> DeserializationResult<()> {
        bytes::slice_r(self.buf, self.base, self.pos, need, what).map(|_| ())
    }

    #[inline]
    pub(crate) fn take_bytes(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> DeserializationResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.base, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> DeserializationResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.base, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn peek_u8(&self) -> Option<u8> {
        bytes::read_u8(self.buf, self.pos)
    }

    #[inline]
    pub(crate) fn u8_named(&mut self, what: &'static str) -> DeserializationResult<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    #[inline]
    pub(crate) fn u16_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        Ok(u16::from_le_bytes(self.array::<2>(what)?))
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        Ok(u32::from_le_bytes(self.array::<4>(what)?))
    }

    /// Read `char_count` UTF-16 code units and decode them, stopping at NUL if present.
    pub(crate) fn utf16_by_char_count(
        &mut self,
        char_count: usize,
        what: &'static str,
    ) -> DeserializationResult<String> {
        let start = self.position();
        let byte_len = char_count
            .checked_mul(2)
            .ok_or_else(|| bytes::truncated(what, self.base, self.pos, usize::MAX, self.buf.len()))?;
        let raw = bytes::slice_r(self.buf, self.base, self.pos, byte_len, what)?;
        let s = decode_utf16le_bytes_z(raw)
            .map_err(|_| DeserializationError::InvalidData { what, offset: start })?;
        self.pos += byte_len;
        Ok(s)
    }

    /// Read a `u16` length prefix (number of UTF-16 code units), then that many code units.
    /// Optionally reads and discards a trailing NUL code unit.
    pub(crate) fn len_prefixed_utf16_string(
        &mut self,
        is_null_terminated: bool,
        what: &'static str,
    ) -> DeserializationResult<String> {
        let mut probe = *self;
        let char_count = usize::from(probe.u16_named(what)?);
        let s = probe.utf16_by_char_count(char_count, what)?;
        if is_null_terminated {
            let _ = probe.u16_named(what)?;
        }
        *self = probe;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failed_read_does_not_advance() {
        let buf = [0x03, 0x00, b'a', 0x00];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert!(c.len_prefixed_utf16_string(false, "name").is_err());
        assert_eq!(c.pos(), 0);
        assert!(c.u32_named("u32").is_ok());
        assert!(c.u8_named("u8").is_err());
        assert_eq!(c.pos(), 4);
    }

    #[test]
    fn test_len_prefixed_string_with_terminator() {
        let buf = [0x02, 0x00, b'h', 0x00, b'i', 0x00, 0x00, 0x00, 0xff];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(c.len_prefixed_utf16_string(true, "name").unwrap(), "hi");
        assert_eq!(c.pos(), 8);
        assert_eq!(c.peek_u8(), Some(0xff));
    }

    #[test]
    fn test_base_offset_is_reported_in_positions_and_errors() {
        let buf = [0_u8; 2];
        let mut c = ByteCursor::with_pos(&buf, 1, 500).unwrap();
        assert_eq!(c.position(), 501);
        assert_eq!(c.relative(502, "x").unwrap(), 2);
        assert!(c.relative(499, "x").is_err());
        assert_eq!(
            c.u16_named("u16").unwrap_err(),
            DeserializationError::Truncated {
                what: "u16",
                offset: 501,
                need: 2,
                have: 1,
            }
        );
    }

    #[test]
    fn test_with_pos_past_end_fails() {
        assert!(ByteCursor::with_pos(&[0_u8; 2], 3, 0).is_err());
        assert!(ByteCursor::with_pos(&[0_u8; 2], 2, 0).unwrap().is_eof());
    }
}
