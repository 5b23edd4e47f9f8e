use crate::ChunkOffset;
use crate::err::DeserializationResult as Result;
use crate::string_cache::StringCache;
use crate::utils::ByteCursor;

use log::trace;
use std::fmt;

/// A name stored in the chunk string table (element, attribute and entity names).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BinXmlName {
    str: String,
    /// Size of the whole on-disk structure, link header included.
    data_size: u32,
}

impl fmt::Display for BinXmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.str)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct BinXmlNameLink {
    pub next_string: Option<ChunkOffset>,
    pub hash: u16,
}

impl BinXmlNameLink {
    pub(crate) const DATA_SIZE: u32 = 6;

    pub(crate) fn from_cursor(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let next_string = cursor.u32_named("next_string")?;
        let hash = cursor.u16_named("name_hash")?;

        Ok(BinXmlNameLink {
            next_string: if next_string > 0 {
                Some(next_string)
            } else {
                None
            },
            hash,
        })
    }
}

impl BinXmlName {
    pub fn new(s: impl Into<String>) -> Self {
        let str = s.into();
        // Length prefix, UTF-16 units and the NUL terminator.
        let string_size = 2 + str.encode_utf16().count() * 2 + 2;
        BinXmlName {
            str,
            data_size: BinXmlNameLink::DATA_SIZE + string_size as u32,
        }
    }

    /// Reads the link header followed by the length-prefixed, NUL-terminated string.
    pub(crate) fn from_cursor(cursor: &mut ByteCursor<'_>) -> Result<(BinXmlNameLink, Self)> {
        let position_before_read = cursor.pos();
        let link = BinXmlNameLink::from_cursor(cursor)?;
        let str = cursor.len_prefixed_utf16_string(true, "name")?;
        let data_size = (cursor.pos() - position_before_read) as u32;

        Ok((link, BinXmlName { str, data_size }))
    }

    pub fn as_str(&self) -> &str {
        &self.str
    }

    pub fn data_size(&self) -> u32 {
        self.data_size
    }
}

/// Reads a `u32` name offset and resolves it.
///
/// A name the string table already knows is taken from there. Otherwise, when the offset points
/// at the current position the name follows inline and the cursor moves past it; any other
/// offset is read out of line and the cursor stays put.
pub(crate) fn read_name(cursor: &mut ByteCursor<'_>, strings: &StringCache) -> Result<String> {
    let name_offset = cursor.u32_named("name_offset")?;
    let is_inline = u64::from(name_offset) == cursor.position();

    if let Some(name) = strings.get_cached_string(name_offset) {
        if is_inline {
            let position_after_string = cursor.pos() + name.data_size() as usize;
            cursor.set_pos(position_after_string, "skip cached name")?;
        }
        return Ok(name.as_str().to_owned());
    }

    if is_inline {
        trace!("name is here");
        let (_, name) = BinXmlName::from_cursor(cursor)?;
        Ok(name.str)
    } else {
        let pos = cursor.relative(u64::from(name_offset), "name_offset")?;
        let mut out_of_line = ByteCursor::with_pos(cursor.buf(), pos, cursor.base())?;
        let (_, name) = BinXmlName::from_cursor(&mut out_of_line)?;
        Ok(name.str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name_struct(s: &str) -> Vec<u8> {
        let mut out = vec![0, 0, 0, 0, 0xaa, 0xbb];
        out.extend_from_slice(&(s.len() as u16).to_le_bytes());
        for u in s.encode_utf16() {
            out.extend_from_slice(&u.to_le_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        out
    }

    #[test]
    fn test_inline_name_advances_cursor() {
        let mut buf = 4_u32.to_le_bytes().to_vec();
        buf.extend(name_struct("Event"));
        buf.push(0x02);

        let mut cursor = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        let name = read_name(&mut cursor, &StringCache::new()).unwrap();

        assert_eq!(name, "Event");
        assert_eq!(cursor.peek_u8(), Some(0x02));
    }

    #[test]
    fn test_out_of_line_name_leaves_cursor() {
        let mut buf = name_struct("Data");
        let at = buf.len();
        buf.extend_from_slice(&0_u32.to_le_bytes());
        buf.push(0x03);

        let mut cursor = ByteCursor::with_pos(&buf, at, 0).unwrap();
        assert_eq!(read_name(&mut cursor, &StringCache::new()).unwrap(), "Data");
        assert_eq!(cursor.peek_u8(), Some(0x03));
    }

    #[test]
    fn test_cached_inline_name_is_skipped() {
        let mut buf = 4_u32.to_le_bytes().to_vec();
        buf.extend(name_struct("System"));
        buf.push(0x02);

        let mut strings = StringCache::new();
        strings.insert(4, BinXmlName::new("System"));

        let mut cursor = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(read_name(&mut cursor, &strings).unwrap(), "System");
        assert_eq!(cursor.peek_u8(), Some(0x02));
    }

    #[test]
    fn test_name_offset_outside_buffer_fails() {
        let buf = 4000_u32.to_le_bytes();
        let mut cursor = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert!(read_name(&mut cursor, &StringCache::new()).is_err());
    }

    #[test]
    fn test_data_size_matches_on_disk_size() {
        assert_eq!(BinXmlName::new("Event").data_size() as usize, name_struct("Event").len());
    }
}
