use crate::ChunkOffset;
use crate::binxml::name::BinXmlName;
use crate::binxml::tokens::{read_template_definition, read_template_definition_header};
use crate::err::{ParseError, ParseResult};
use crate::settings::DEFAULT_MAX_NESTING_DEPTH;
use crate::string_cache::StringCache;
use crate::template_cache::{CachedTemplate, Template, TemplateCache};
use crate::utils::ByteCursor;

use log::{debug, trace};

/// Per-chunk lookup tables shared by every record of one chunk.
///
/// Populated by the caller (directly, or from chunk bytes with [`ChunkContext::load_templates`]
/// and [`ChunkContext::load_strings`]) and only read while decoding.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    templates: TemplateCache,
    strings: StringCache,
    /// Element nesting allowed in template bodies read by [`ChunkContext::load_templates`].
    max_nesting_depth: usize,
}

impl Default for ChunkContext {
    fn default() -> Self {
        ChunkContext::new()
    }
}

impl ChunkContext {
    pub fn new() -> Self {
        ChunkContext {
            templates: TemplateCache::new(),
            strings: StringCache::new(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Use the same value as [`DecoderSettings::max_nesting_depth`](crate::DecoderSettings)
    /// so templates loaded from chunk bytes obey the decoder's limit.
    pub fn with_max_nesting_depth(mut self, max_nesting_depth: usize) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }

    pub fn get_max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    pub fn add_template(&mut self, template: Template) -> CachedTemplate {
        debug!("Registering template {}", template.id);
        self.templates.add(template)
    }

    pub fn get_template(&self, id: u32) -> Option<CachedTemplate> {
        self.templates.get(id).cloned()
    }

    pub fn has_template(&self, id: u32) -> bool {
        self.templates.has(id)
    }

    pub fn remove_template(&mut self, id: u32) -> Option<CachedTemplate> {
        self.templates.remove(id)
    }

    pub fn add_string(&mut self, offset: ChunkOffset, value: impl Into<String>) {
        self.strings.insert(offset, BinXmlName::new(value));
    }

    pub fn get_string(&self, offset: ChunkOffset) -> Option<&str> {
        self.strings.get_cached_string(offset).map(BinXmlName::as_str)
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn strings(&self) -> &StringCache {
        &self.strings
    }

    /// Drops every template and string, for reuse with the next chunk.
    pub fn clear(&mut self) {
        self.templates.clear();
        self.strings.clear();
    }

    /// Reads the strings reachable from the chunk's string bucket `offsets`.
    /// Returns how many new strings were registered.
    pub fn load_strings(&mut self, data: &[u8], offsets: &[ChunkOffset]) -> ParseResult<usize> {
        self.strings
            .populate(data, offsets)
            .map_err(|e| ParseError::new(0, None, e))
    }

    /// Reads the template definitions reachable from the chunk's template bucket `offsets`,
    /// following each bucket's `next_template_offset` chain. Templates already registered are
    /// skipped without parsing their body. Returns how many new templates were registered.
    ///
    /// Load strings first: template bodies refer to names through the string table.
    pub fn load_templates(&mut self, data: &[u8], offsets: &[ChunkOffset]) -> ParseResult<usize> {
        let mut added = 0;

        for &offset in offsets.iter().filter(|&&offset| offset > 0) {
            let mut next = offset;
            let mut visited = 0_usize;

            while next > 0 {
                // A corrupt chain could point back at itself.
                visited += 1;
                if visited > data.len() {
                    break;
                }

                let table_offset = u64::from(next);
                let to_parse_error = |e| ParseError::new(table_offset, None, e);

                let mut cursor =
                    ByteCursor::with_pos(data, next as usize, 0).map_err(to_parse_error)?;
                let header = read_template_definition_header(&mut cursor).map_err(to_parse_error)?;
                let template_id = header.template_id();
                next = header.next_template_offset;

                if self.templates.has(template_id) {
                    trace!("Template {} is already cached", template_id);
                    continue;
                }

                let template =
                    read_template_definition(&mut cursor, header, self, self.max_nesting_depth)?;
                self.add_template(template);
                added += 1;

                trace!("Next template will be at {}", next);
            }
        }

        debug!("Loaded {} templates", added);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::deserialized::Token;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strings_roundtrip_through_context() {
        let mut chunk = ChunkContext::new();
        chunk.add_string(120, "Provider");

        assert_eq!(chunk.get_string(120), Some("Provider"));
        assert_eq!(chunk.get_string(121), None);

        chunk.clear();
        assert_eq!(chunk.get_string(120), None);
    }

    #[test]
    fn test_templates_through_context() {
        let mut chunk = ChunkContext::new();
        chunk.add_template(Template::with_id(3, Token::EndOfStream));

        assert!(chunk.has_template(3));
        assert_eq!(chunk.get_template(3).map(|t| t.id), Some(3));
        assert!(chunk.remove_template(3).is_some());
        assert!(!chunk.has_template(3));
    }
}
