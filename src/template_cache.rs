use crate::model::deserialized::{BinXmlTemplateDefinitionHeader, Token};

use hashbrown::HashMap;
use std::sync::Arc;

/// A parsed template body: an element tree with substitution placeholders.
///
/// Immutable once built; shared between every record (and every thread) that instantiates it.
#[derive(Debug, PartialEq, Clone)]
pub struct Template {
    pub id: u32,
    pub header: BinXmlTemplateDefinitionHeader,
    pub root_token: Token,
}

impl Template {
    pub fn new(header: BinXmlTemplateDefinitionHeader, root_token: Token) -> Self {
        Template {
            id: header.template_id(),
            header,
            root_token,
        }
    }

    /// A template that did not come from a chunk template table.
    pub fn with_id(id: u32, root_token: Token) -> Self {
        let mut guid = [0_u8; 16];
        guid[..4].copy_from_slice(&id.to_le_bytes());

        Template::new(
            BinXmlTemplateDefinitionHeader {
                next_template_offset: 0,
                guid,
                data_size: 0,
            },
            root_token,
        )
    }
}

pub type CachedTemplate = Arc<Template>;

/// Templates of one chunk, keyed by template id.
#[derive(Debug, Default, Clone)]
pub struct TemplateCache(HashMap<u32, CachedTemplate, ahash::RandomState>);

impl TemplateCache {
    pub fn new() -> Self {
        TemplateCache(HashMap::with_hasher(ahash::RandomState::new()))
    }

    /// Registers `template`, replacing any previous template with the same id.
    pub fn add(&mut self, template: Template) -> CachedTemplate {
        let template = Arc::new(template);
        self.0.insert(template.id, Arc::clone(&template));
        template
    }

    pub fn get(&self, id: u32) -> Option<&CachedTemplate> {
        self.0.get(&id)
    }

    pub fn has(&self, id: u32) -> bool {
        self.0.contains_key(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<CachedTemplate> {
        self.0.remove(&id)
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
