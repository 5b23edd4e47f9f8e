//! Bounds checked slice reads.
//!
//! The `*_r` variants turn a short read into `DeserializationError::Truncated`. Offsets are
//! relative to the slice passed in; `base` is only used to report absolute offsets in errors.

use crate::err::DeserializationError;

/// Read `N` raw bytes at `offset`.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

#[inline]
pub(crate) fn truncated(
    what: &'static str,
    base: u64,
    offset: usize,
    need: usize,
    len: usize,
) -> DeserializationError {
    DeserializationError::Truncated {
        what,
        offset: base + offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

/// Borrow `len` bytes at `offset`, or fail with `Truncated`.
pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    base: u64,
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DeserializationError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, base, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, base, offset, len, buf.len()))
}

pub(crate) fn read_array_r<const N: usize>(
    buf: &[u8],
    base: u64,
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], DeserializationError> {
    read_array::<N>(buf, offset).ok_or_else(|| truncated(what, base, offset, N, buf.len()))
}
