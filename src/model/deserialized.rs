use crate::ChunkOffset;
use crate::binxml::value_variant::value_type_name;
use crate::template_cache::Template;
use crate::utils::windows::format_guid;

use std::fmt::{self, Formatter};
use std::sync::Arc;

/// One decoded unit of a Binary XML stream.
///
/// Elements own their attributes and children, so a parsed fragment is a plain tree.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    StartOfStream,
    EndOfStream,
    FragmentHeader(BinXMLFragmentHeader),
    OpenStartElement(BinXMLOpenStartElement),
    CloseStartElement,
    CloseEmptyElement,
    EndElement,
    Value { value_type: u8, raw: Vec<u8> },
    CharRef(u16),
    EntityRef { name: String },
    ProcessingInstruction { target: String, data: String },
    Comment { text: String },
    CData { text: String },
    NormalSubstitution { index: u16, value_type: u8 },
    OptionalSubstitution { index: u16, value_type: u8 },
    /// `condition` is preserved but not evaluated; this renders like a normal substitution.
    ConditionalSubstitution {
        index: u16,
        value_type: u8,
        condition: u8,
    },
    TemplateInstance(BinXmlTemplateInstance),
}

impl Token {
    /// Stream markers carry no content and are ignored when assembling a document.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            Token::StartOfStream | Token::EndOfStream | Token::FragmentHeader(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Token::StartOfStream => "StartOfStream",
            Token::EndOfStream => "EndOfStream",
            Token::FragmentHeader(_) => "FragmentHeader",
            Token::OpenStartElement(_) => "OpenStartElement",
            Token::CloseStartElement => "CloseStartElement",
            Token::CloseEmptyElement => "CloseEmptyElement",
            Token::EndElement => "EndElement",
            Token::Value { .. } => "Value",
            Token::CharRef(_) => "CharRef",
            Token::EntityRef { .. } => "EntityRef",
            Token::ProcessingInstruction { .. } => "ProcessingInstruction",
            Token::Comment { .. } => "Comment",
            Token::CData { .. } => "CDATASection",
            Token::NormalSubstitution { .. } => "NormalSubstitution",
            Token::OptionalSubstitution { .. } => "OptionalSubstitution",
            Token::ConditionalSubstitution { .. } => "ConditionalSubstitution",
            Token::TemplateInstance(_) => "TemplateInstance",
        }
    }

    /// A short single line label, for diagnostics and error reports.
    pub fn describe(&self) -> String {
        match self {
            Token::FragmentHeader(header) => format!(
                "FragmentHeader({}.{}, flags=0x{:02X})",
                header.major_version, header.minor_version, header.flags
            ),
            Token::OpenStartElement(element) => format!(
                "OpenStartElement({}, {} attributes, {} children)",
                element.name,
                element.attributes.len(),
                element.children.len()
            ),
            Token::Value { value_type, raw } => format!(
                "Value({}, {} bytes)",
                value_type_name(*value_type),
                raw.len()
            ),
            Token::CharRef(code_point) => format!("CharRef({})", code_point),
            Token::EntityRef { name } => format!("EntityRef({})", name),
            Token::ProcessingInstruction { target, .. } => {
                format!("ProcessingInstruction({})", target)
            }
            Token::Comment { text } => format!("Comment({} chars)", text.chars().count()),
            Token::CData { text } => format!("CDATASection({} chars)", text.chars().count()),
            Token::NormalSubstitution { index, value_type }
            | Token::OptionalSubstitution { index, value_type } => format!(
                "{}(index={}, type={})",
                self.name(),
                index,
                value_type_name(*value_type)
            ),
            Token::ConditionalSubstitution {
                index,
                value_type,
                condition,
            } => format!(
                "ConditionalSubstitution(index={}, type={}, condition={})",
                index,
                value_type_name(*value_type),
                condition
            ),
            Token::TemplateInstance(instance) => format!(
                "TemplateInstance(id={}, {} substitutions, {})",
                instance.template_id,
                instance.substitutions.len(),
                if instance.bound_template.is_some() {
                    "bound"
                } else {
                    "unbound"
                }
            ),
            _ => self.name().to_owned(),
        }
    }
}

#[repr(C)]
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy)]
pub struct BinXMLFragmentHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u8,
}

/// An element together with everything between its start tag and its end tag.
#[derive(Debug, PartialEq, Clone)]
pub struct BinXMLOpenStartElement {
    pub name: String,
    pub dependency_id: u16,
    pub data_size: u32,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Token>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Attribute {
    pub name: String,
    /// Always a value-producing token: a value, a reference or a substitution.
    pub value: Token,
}

/// One entry of a template instance's substitution array.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubstitutionEntry {
    /// Offset of the payload within the decoded buffer.
    pub position: ChunkOffset,
    pub size: u16,
    pub value_type: u8,
    pub bytes: Vec<u8>,
}

/// Template instance token payload with substitutions.
#[derive(Debug, PartialEq, Clone)]
pub struct BinXmlTemplateInstance {
    pub template_id: u32,
    pub substitutions: Vec<SubstitutionEntry>,
    /// Resolved while parsing when the template was already registered.
    pub bound_template: Option<Arc<Template>>,
}

/// Template definition header stored in the chunk template table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BinXmlTemplateDefinitionHeader {
    /// A pointer to the next template in the bucket.
    pub next_template_offset: ChunkOffset,
    pub guid: [u8; 16],
    pub data_size: u32,
}

impl fmt::Display for BinXmlTemplateDefinitionHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<BinXmlTemplateDefinitionHeader - id: {guid}, data_size: {size}>",
            guid = format_guid(&self.guid),
            size = self.data_size
        )
    }
}

impl BinXmlTemplateDefinitionHeader {
    /// Templates are keyed by the first four bytes of their GUID.
    pub fn template_id(&self) -> u32 {
        u32::from_le_bytes([self.guid[0], self.guid[1], self.guid[2], self.guid[3]])
    }
}
