//! Typed value rendering.
//!
//! Turns a value type tag plus its raw payload into the canonical text used in the XML
//! output (numbers, GUIDs, timestamps, SIDs, hex dumps and `[a, b]` arrays).
//!
//! Rendering never fails: any payload that cannot be decoded degrades to a
//! `[Parse Error: <hex>]` marker so the surrounding document still renders.

use std::fmt::{self, Write};

use byteorder::{ByteOrder, LittleEndian};
use encoding::{DecoderTrap, EncodingRef};
use log::warn;

use crate::binxml::value_variant::{
    BinXmlValueType, array_element_size, base_type, is_array_type, value_type_name,
};
use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::windows::{
    filetime_to_timestamp, format_guid, format_sid, format_timestamp, systime_from_bytes,
};
use crate::utils::{decode_utf16le_bytes_z, to_hex_upper};

/// Rendered in place of arrays whose element type has no fixed width.
pub const UNKNOWN_ARRAY_TYPE: &str = "[Unknown Array Type]";

/// Render `bytes` as a value of type `value_type`, decoding ANSI strings as Latin-1.
pub fn render_value(value_type: u8, bytes: &[u8]) -> String {
    ValueRenderer::default().render(value_type, bytes)
}

/// The marker emitted for any payload that could not be decoded.
pub fn parse_error_marker(bytes: &[u8]) -> String {
    format!("[Parse Error: {}]", to_hex_upper(bytes))
}

#[derive(Clone, Copy)]
pub struct ValueRenderer {
    ansi_codec: EncodingRef,
}

impl Default for ValueRenderer {
    fn default() -> Self {
        ValueRenderer::new(encoding::all::ISO_8859_1)
    }
}

impl fmt::Debug for ValueRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRenderer")
            .field("ansi_codec", &self.ansi_codec.name())
            .finish()
    }
}

impl ValueRenderer {
    pub fn new(ansi_codec: EncodingRef) -> Self {
        ValueRenderer { ansi_codec }
    }

    pub fn render(&self, value_type: u8, bytes: &[u8]) -> String {
        match self.try_render(value_type, bytes) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "Failed to render value of type {}: {}",
                    value_type_name(value_type),
                    e
                );
                parse_error_marker(bytes)
            }
        }
    }

    /// Like [`ValueRenderer::render`], but surfaces the decoding failure.
    pub fn try_render(&self, value_type: u8, bytes: &[u8]) -> DeserializationResult<String> {
        let mut out = String::new();
        if is_array_type(value_type) {
            self.write_array(&mut out, value_type, bytes)?;
        } else {
            self.write_scalar(&mut out, value_type, bytes)?;
        }
        Ok(out)
    }

    fn write_array(
        &self,
        out: &mut String,
        value_type: u8,
        bytes: &[u8],
    ) -> DeserializationResult<()> {
        let element_size = array_element_size(value_type);
        if element_size == 0 {
            out.push_str(UNKNOWN_ARRAY_TYPE);
            return Ok(());
        }

        let base = base_type(value_type);
        out.push('[');
        // `chunks_exact` drops a trailing partial element, so we never read past the payload.
        for (i, element) in bytes.chunks_exact(element_size).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_scalar(out, base, element)?;
        }
        out.push(']');
        Ok(())
    }

    fn write_scalar(
        &self,
        out: &mut String,
        value_type: u8,
        bytes: &[u8],
    ) -> DeserializationResult<()> {
        let Some(ty) = BinXmlValueType::from_u8(value_type) else {
            warn!(
                "Unknown value type {}, rendering {} bytes as hex",
                value_type_name(value_type),
                bytes.len()
            );
            out.push_str(&to_hex_upper(bytes));
            return Ok(());
        };

        // Writing to a `String` cannot fail, so `write!` results are discarded below.
        match ty {
            BinXmlValueType::NullType => {}
            BinXmlValueType::StringType => {
                let s = decode_utf16le_bytes_z(bytes).map_err(|_| invalid("utf-16 string"))?;
                out.push_str(&s);
            }
            BinXmlValueType::AnsiStringType => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = self
                    .ansi_codec
                    .decode(&bytes[..end], DecoderTrap::Replace)
                    .map_err(|_| invalid("ansi string"))?;
                out.push_str(&s);
            }
            BinXmlValueType::Int8Type => {
                let _ = write!(out, "{}", fixed::<1>(bytes, "i8")?[0] as i8);
            }
            BinXmlValueType::UInt8Type => {
                let _ = write!(out, "{}", fixed::<1>(bytes, "u8")?[0]);
            }
            BinXmlValueType::Int16Type => {
                let _ = write!(out, "{}", i16::from_le_bytes(fixed(bytes, "i16")?));
            }
            BinXmlValueType::UInt16Type => {
                let _ = write!(out, "{}", u16::from_le_bytes(fixed(bytes, "u16")?));
            }
            BinXmlValueType::Int32Type => {
                let _ = write!(out, "{}", i32::from_le_bytes(fixed(bytes, "i32")?));
            }
            BinXmlValueType::UInt32Type => {
                let _ = write!(out, "{}", u32::from_le_bytes(fixed(bytes, "u32")?));
            }
            BinXmlValueType::Int64Type => {
                let _ = write!(out, "{}", i64::from_le_bytes(fixed(bytes, "i64")?));
            }
            BinXmlValueType::UInt64Type => {
                let _ = write!(out, "{}", u64::from_le_bytes(fixed(bytes, "u64")?));
            }
            BinXmlValueType::Real32Type => {
                let _ = write!(out, "{}", f32::from_le_bytes(fixed(bytes, "f32")?));
            }
            BinXmlValueType::Real64Type => {
                let _ = write!(out, "{}", f64::from_le_bytes(fixed(bytes, "f64")?));
            }
            BinXmlValueType::BoolType => {
                let first = fixed::<1>(bytes, "bool")?[0];
                out.push_str(if first != 0 { "true" } else { "false" });
            }
            BinXmlValueType::BinaryType
            | BinXmlValueType::EvtHandle
            | BinXmlValueType::BinXmlType
            | BinXmlValueType::EvtXmlType => out.push_str(&to_hex_upper(bytes)),
            BinXmlValueType::GuidType => out.push_str(&format_guid(&fixed(bytes, "guid")?)),
            BinXmlValueType::SizeTType => match bytes.len() {
                4 => {
                    let _ = write!(out, "0x{:08X}", LittleEndian::read_u32(bytes));
                }
                8 => {
                    let _ = write!(out, "0x{:016X}", LittleEndian::read_u64(bytes));
                }
                _ => return Err(invalid("size_t")),
            },
            BinXmlValueType::FileTimeType => {
                let ticks = u64::from_le_bytes(fixed(bytes, "filetime")?);
                out.push_str(&format_timestamp(&filetime_to_timestamp(ticks)?));
            }
            BinXmlValueType::SysTimeType => {
                let decoded =
                    fixed::<16>(bytes, "systemtime").and_then(|raw| systime_from_bytes(&raw));
                match decoded {
                    Ok(ts) => out.push_str(&format_timestamp(&ts)),
                    Err(e) => {
                        warn!("Invalid SYSTEMTIME ({}), rendering as hex", e);
                        out.push_str(&to_hex_upper(bytes));
                    }
                }
            }
            BinXmlValueType::SidType => out.push_str(&format_sid(bytes)?),
            BinXmlValueType::HexInt32Type => {
                let _ = write!(out, "0x{:08X}", u32::from_le_bytes(fixed(bytes, "hex32")?));
            }
            BinXmlValueType::HexInt64Type => {
                let _ = write!(out, "0x{:016X}", u64::from_le_bytes(fixed(bytes, "hex64")?));
            }
            // An array tag with the flag cleared never lands here; `write_array` strips it.
            _ => return Err(invalid("array element")),
        }
        Ok(())
    }
}

fn invalid(what: &'static str) -> DeserializationError {
    DeserializationError::InvalidData { what, offset: 0 }
}

/// The leading `N` bytes of a fixed-width payload. Extra trailing bytes are ignored.
fn fixed<const N: usize>(bytes: &[u8], what: &'static str) -> DeserializationResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(DeserializationError::Truncated {
            what,
            offset: 0,
            need: N,
            have: bytes.len(),
        })
}
