mod byte_cursor;
pub(crate) mod bytes;
mod escape;
mod hexdump;
mod utf16;
pub(crate) mod windows;

pub(crate) use self::byte_cursor::ByteCursor;
pub(crate) use self::escape::escape_xml;
pub(crate) use self::hexdump::to_hex_upper;
pub(crate) use self::utf16::decode_utf16le_bytes_z;
