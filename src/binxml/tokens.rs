use crate::ChunkOffset;
use crate::binxml::deserializer::BinXmlDeserializer;
use crate::binxml::name::read_name;
use crate::binxml::value_variant::BinXmlValueType;
use crate::chunk_context::ChunkContext;
use crate::err::{DeserializationError, DeserializationResult as Result, ParseError, ParseResult};
use crate::model::deserialized::*;
use crate::model::raw::BinXmlRawToken;
use crate::string_cache::StringCache;
use crate::template_cache::Template;
use crate::utils::ByteCursor;

use log::{debug, trace};

/// Discriminator, template id, substitution array offset and substitution count.
pub const TEMPLATE_INSTANCE_HEADER_SIZE: usize = 11;
/// Next template offset, GUID and data size.
pub const TEMPLATE_DEFINITION_HEADER_SIZE: usize = 24;

pub fn read_fragment_header(cursor: &mut ByteCursor<'_>) -> Result<BinXMLFragmentHeader> {
    let major_version = cursor.u8_named("fragment_header_major_version")?;
    let minor_version = cursor.u8_named("fragment_header_minor_version")?;
    let flags = cursor.u8_named("fragment_header_flags")?;
    Ok(BinXMLFragmentHeader {
        major_version,
        minor_version,
        flags,
    })
}

/// Reads the start tag header. Attributes and children are filled in by the deserializer.
pub fn read_open_start_element(
    cursor: &mut ByteCursor<'_>,
    strings: &StringCache,
    has_attributes: bool,
) -> Result<BinXMLOpenStartElement> {
    let dependency_id = cursor.u16_named("open_start_element_dependency_id")?;
    let data_size = cursor.u32_named("open_start_element_data_size")?;
    let name = read_name(cursor, strings)?;

    if has_attributes {
        let attribute_list_data_size = cursor.u32_named("attribute_list_data_size")?;
        trace!("\t attribute list: {} bytes", attribute_list_data_size);
    }

    Ok(BinXMLOpenStartElement {
        name,
        dependency_id,
        data_size,
        attributes: vec![],
        children: vec![],
    })
}

pub fn read_attribute_name(cursor: &mut ByteCursor<'_>, strings: &StringCache) -> Result<String> {
    let name = read_name(cursor, strings)?;
    trace!("\t attribute name: {:?}", name);
    Ok(name)
}

pub fn read_value(cursor: &mut ByteCursor<'_>) -> Result<Token> {
    let value_type = cursor.u8_named("value_type")?;

    let raw = match BinXmlValueType::from_u8(value_type) {
        Some(BinXmlValueType::StringType) => {
            let char_count = usize::from(cursor.u16_named("value_string_length")?);
            cursor.take_bytes(char_count * 2, "value_string")?
        }
        Some(fixed) if fixed.fixed_size().is_some() => {
            let size = fixed.fixed_size().unwrap_or_default();
            cursor.take_bytes(size, "value_fixed")?
        }
        _ => {
            let size = usize::from(cursor.u16_named("value_size")?);
            cursor.take_bytes(size, "value_bytes")?
        }
    };

    Ok(Token::Value {
        value_type,
        raw: raw.to_vec(),
    })
}

pub fn read_substitution(cursor: &mut ByteCursor<'_>, raw: BinXmlRawToken) -> Result<Token> {
    let index = cursor.u16_named("substitution_index")?;
    let value_type = cursor.u8_named("substitution_value_type")?;

    match raw {
        BinXmlRawToken::OptionalSubstitution => {
            Ok(Token::OptionalSubstitution { index, value_type })
        }
        BinXmlRawToken::ConditionalSubstitution => {
            let condition = cursor.u8_named("substitution_condition")?;
            Ok(Token::ConditionalSubstitution {
                index,
                value_type,
                condition,
            })
        }
        _ => Ok(Token::NormalSubstitution { index, value_type }),
    }
}

pub fn read_char_ref(cursor: &mut ByteCursor<'_>) -> Result<Token> {
    Ok(Token::CharRef(cursor.u16_named("char_ref")?))
}

pub fn read_entity_ref(cursor: &mut ByteCursor<'_>, strings: &StringCache) -> Result<Token> {
    trace!("EntityReference at {}", cursor.position());
    let name = read_name(cursor, strings)?;
    trace!("\t name: {:?}", name);
    Ok(Token::EntityRef { name })
}

pub fn read_processing_instruction_target(
    cursor: &mut ByteCursor<'_>,
    strings: &StringCache,
) -> Result<String> {
    read_name(cursor, strings)
}

/// `u16` character count followed by that many UTF-16LE units.
/// Used by CDATA sections, comments and processing instruction data.
pub fn read_text(cursor: &mut ByteCursor<'_>, what: &'static str) -> Result<String> {
    cursor.len_prefixed_utf16_string(false, what)
}

/// Reads a template instance whose discriminator sits at `token_start`.
///
/// The substitution array starts `relative offset` bytes after the header and the cursor ends up
/// right after its last entry.
pub fn read_template_instance(
    cursor: &mut ByteCursor<'_>,
    token_start: usize,
    chunk: &ChunkContext,
) -> Result<BinXmlTemplateInstance> {
    let mut c = ByteCursor::with_pos(cursor.buf(), token_start, cursor.base())?;
    c.ensure(TEMPLATE_INSTANCE_HEADER_SIZE, "template_instance_header")?;

    let _ = c.u8_named("template_instance_token")?;
    let template_id = c.u32_named("template_id")?;
    let array_offset = c.u32_named("substitution_array_offset")?;
    let substitution_count = c.u16_named("substitution_count")?;

    let array_start = c
        .pos()
        .checked_add(array_offset as usize)
        .ok_or(DeserializationError::InvalidData {
            what: "substitution_array_offset",
            offset: c.position(),
        })?;
    c.set_pos(array_start, "substitution_array")?;

    // Every entry has at least a four byte header; don't trust the declared count for capacity.
    let mut substitutions =
        Vec::with_capacity(usize::from(substitution_count).min(c.remaining() / 4));

    for _ in 0..substitution_count {
        let size = c.u16_named("substitution_size")?;
        // The high byte of the type word is unused.
        let value_type = c.u16_named("substitution_value_type")? as u8;
        let position = c.position() as ChunkOffset;
        let bytes = c.take_bytes(usize::from(size), "substitution_value")?;

        trace!(
            "Substitution: type 0x{:02x}, {} bytes at {}",
            value_type, size, position
        );
        substitutions.push(SubstitutionEntry {
            position,
            size,
            value_type,
            bytes: bytes.to_vec(),
        });
    }

    *cursor = c;

    let bound_template = chunk.get_template(template_id);
    debug!(
        "TemplateInstance {} with {} substitutions ({})",
        template_id,
        substitutions.len(),
        if bound_template.is_some() {
            "bound"
        } else {
            "unbound"
        }
    );

    Ok(BinXmlTemplateInstance {
        template_id,
        substitutions,
        bound_template,
    })
}

pub fn read_template_definition_header(
    cursor: &mut ByteCursor<'_>,
) -> Result<BinXmlTemplateDefinitionHeader> {
    cursor.ensure(TEMPLATE_DEFINITION_HEADER_SIZE, "template_definition_header")?;
    let next_template_offset = cursor.u32_named("next_template_offset")?;
    let guid = cursor.array::<16>("template_guid")?;
    let data_size = cursor.u32_named("template_data_size")?;

    Ok(BinXmlTemplateDefinitionHeader {
        next_template_offset,
        guid,
        data_size,
    })
}

/// Parses the template body that follows `header` at the cursor.
///
/// The body holds a fragment header, exactly one root node and an end of stream marker.
pub fn read_template_definition(
    cursor: &mut ByteCursor<'_>,
    header: BinXmlTemplateDefinitionHeader,
    chunk: &ChunkContext,
    max_depth: usize,
) -> ParseResult<Template> {
    let body_start = cursor.position();
    let to_parse_error = |e| ParseError::new(body_start, None, e);

    let data = cursor
        .take_bytes(header.data_size as usize, "template_data")
        .map_err(to_parse_error)?;

    let tokens = BinXmlDeserializer::from_fragment(data, body_start, chunk)
        .map_err(to_parse_error)?
        .with_max_nesting_depth(max_depth)
        .parse_all(None)?;

    let mut significant = tokens.into_iter().filter(|t| !t.is_marker());
    match (significant.next(), significant.next()) {
        (Some(root_token), None) => Ok(Template::new(header, root_token)),
        _ => Err(to_parse_error(DeserializationError::InvalidData {
            what: "template body must hold exactly one root node",
            offset: body_start,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_value_widths() {
        // StringType: char count then UTF-16.
        let buf = [0x01, 0x02, 0x00, b'h', 0, b'i', 0, 0xff];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(
            read_value(&mut c).unwrap(),
            Token::Value {
                value_type: 0x01,
                raw: vec![b'h', 0, b'i', 0],
            }
        );
        assert_eq!(c.peek_u8(), Some(0xff));

        // Fixed width types carry no length.
        let buf = [0x08, 1, 0, 0, 0];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(
            read_value(&mut c).unwrap(),
            Token::Value {
                value_type: 0x08,
                raw: vec![1, 0, 0, 0],
            }
        );
        assert!(c.is_eof());

        // Everything else is length prefixed.
        let buf = [0x0e, 2, 0, 0xde, 0xad];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(
            read_value(&mut c).unwrap(),
            Token::Value {
                value_type: 0x0e,
                raw: vec![0xde, 0xad],
            }
        );
    }

    #[test]
    fn test_truncated_value_fails() {
        let buf = [0x08, 1, 0];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert!(matches!(
            read_value(&mut c),
            Err(DeserializationError::Truncated { need: 4, have: 2, .. })
        ));
    }

    #[test]
    fn test_substitution_kinds() {
        let buf = [0x02, 0x00, 0x01, 0x07];
        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(
            read_substitution(&mut c, BinXmlRawToken::ConditionalSubstitution).unwrap(),
            Token::ConditionalSubstitution {
                index: 2,
                value_type: 1,
                condition: 7,
            }
        );

        let mut c = ByteCursor::with_pos(&buf, 0, 0).unwrap();
        assert_eq!(
            read_substitution(&mut c, BinXmlRawToken::OptionalSubstitution).unwrap(),
            Token::OptionalSubstitution {
                index: 2,
                value_type: 1,
            }
        );
        assert_eq!(c.pos(), 3);
    }

    #[test]
    fn test_template_instance_reads_substitution_array() {
        let mut buf = vec![0x0c];
        buf.extend_from_slice(&9_u32.to_le_bytes());
        // One padding byte between the header and the array.
        buf.extend_from_slice(&1_u32.to_le_bytes());
        buf.extend_from_slice(&2_u16.to_le_bytes());
        buf.push(0xee);
        buf.extend_from_slice(&[2, 0, 0x06, 0x00, 0x10, 0x12]);
        buf.extend_from_slice(&[0, 0, 0x00, 0x00]);
        buf.push(0x00);

        let chunk = ChunkContext::new();
        let mut c = ByteCursor::with_pos(&buf, 1, 0).unwrap();
        let instance = read_template_instance(&mut c, 0, &chunk).unwrap();

        assert_eq!(instance.template_id, 9);
        assert!(instance.bound_template.is_none());
        assert_eq!(
            instance.substitutions,
            vec![
                SubstitutionEntry {
                    position: 16,
                    size: 2,
                    value_type: 0x06,
                    bytes: vec![0x10, 0x12],
                },
                SubstitutionEntry {
                    position: 22,
                    size: 0,
                    value_type: 0x00,
                    bytes: vec![],
                },
            ]
        );
        assert_eq!(c.peek_u8(), Some(0x00));
    }

    #[test]
    fn test_template_instance_header_is_validated_up_front() {
        let buf = [0x0c, 1, 0, 0, 0, 0, 0];
        let mut c = ByteCursor::with_pos(&buf, 1, 0).unwrap();
        assert!(matches!(
            read_template_instance(&mut c, 0, &ChunkContext::new()),
            Err(DeserializationError::Truncated { need: 11, have: 7, .. })
        ));
        assert_eq!(c.pos(), 1);
    }
}
