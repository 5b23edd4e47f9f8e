use std::borrow::Cow;

/// Escape text for an XML text node or a double-quoted attribute value.
///
/// All five predefined entities are replaced (`&`, `<`, `>`, `"`, `'`).
pub(crate) fn escape_xml(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}
