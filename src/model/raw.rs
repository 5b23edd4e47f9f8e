use std::borrow::Cow;

/// The token a discriminator byte selects, before any payload is read.
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy)]
pub enum BinXmlRawToken {
    EndOfStream,
    // True if has attributes, otherwise false.
    OpenStartElement(OpenStartElementTokenMeta),
    CloseStartElement,
    CloseEmptyElement,
    EndElement,
    Value,
    Attribute(AttributeTokenMeta),
    CDataSection,
    CharReference,
    EntityReference,
    ProcessingInstructionTarget,
    ProcessingInstructionData,
    TemplateInstance,
    NormalSubstitution,
    OptionalSubstitution,
    ConditionalSubstitution,
    FragmentHeader,
    StartOfStream,
    Comment,
}

impl BinXmlRawToken {
    pub fn from_u8(byte: u8) -> Option<BinXmlRawToken> {
        match byte {
            0x00 => Some(BinXmlRawToken::EndOfStream),
            // <Event>
            0x01 => Some(BinXmlRawToken::OpenStartElement(
                OpenStartElementTokenMeta {
                    has_attributes: false,
                },
            )),
            0x41 => Some(BinXmlRawToken::OpenStartElement(
                OpenStartElementTokenMeta {
                    has_attributes: true,
                },
            )),
            // Indicates end of start element
            0x02 => Some(BinXmlRawToken::CloseStartElement),
            0x03 => Some(BinXmlRawToken::CloseEmptyElement),
            // </Event>
            0x04 => Some(BinXmlRawToken::EndElement),
            0x05 | 0x45 => Some(BinXmlRawToken::Value),
            0x06 => Some(BinXmlRawToken::Attribute(AttributeTokenMeta {
                more_attributes_expected: false,
            })),
            0x46 => Some(BinXmlRawToken::Attribute(AttributeTokenMeta {
                more_attributes_expected: true,
            })),
            0x07 | 0x47 => Some(BinXmlRawToken::CDataSection),
            0x08 | 0x48 => Some(BinXmlRawToken::CharReference),
            0x09 | 0x49 => Some(BinXmlRawToken::EntityReference),
            0x0a | 0x4a => Some(BinXmlRawToken::ProcessingInstructionTarget),
            0x0b => Some(BinXmlRawToken::ProcessingInstructionData),
            0x0c => Some(BinXmlRawToken::TemplateInstance),
            0x0d => Some(BinXmlRawToken::NormalSubstitution),
            0x0e => Some(BinXmlRawToken::OptionalSubstitution),
            0x4e => Some(BinXmlRawToken::ConditionalSubstitution),
            0x0f => Some(BinXmlRawToken::FragmentHeader),
            0x10 => Some(BinXmlRawToken::StartOfStream),
            0x11 | 0x51 => Some(BinXmlRawToken::Comment),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BinXmlRawToken::EndOfStream => "EndOfStream",
            BinXmlRawToken::OpenStartElement(_) => "OpenStartElement",
            BinXmlRawToken::CloseStartElement => "CloseStartElement",
            BinXmlRawToken::CloseEmptyElement => "CloseEmptyElement",
            BinXmlRawToken::EndElement => "EndElement",
            BinXmlRawToken::Value => "Value",
            BinXmlRawToken::Attribute(_) => "Attribute",
            BinXmlRawToken::CDataSection => "CDATASection",
            BinXmlRawToken::CharReference => "CharRef",
            BinXmlRawToken::EntityReference => "EntityRef",
            BinXmlRawToken::ProcessingInstructionTarget => "PITarget",
            BinXmlRawToken::ProcessingInstructionData => "PIData",
            BinXmlRawToken::TemplateInstance => "TemplateInstance",
            BinXmlRawToken::NormalSubstitution => "NormalSubstitution",
            BinXmlRawToken::OptionalSubstitution => "OptionalSubstitution",
            BinXmlRawToken::ConditionalSubstitution => "ConditionalSubstitution",
            BinXmlRawToken::FragmentHeader => "FragmentHeader",
            BinXmlRawToken::StartOfStream => "StartOfStream",
            BinXmlRawToken::Comment => "Comment",
        }
    }
}

#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy)]
pub struct OpenStartElementTokenMeta {
    pub has_attributes: bool,
}

#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy)]
pub struct AttributeTokenMeta {
    pub more_attributes_expected: bool,
}

/// Human readable name of a token discriminator, `Unknown(0xNN)` for unassigned bytes.
pub fn token_type_name(tag: u8) -> Cow<'static, str> {
    match BinXmlRawToken::from_u8(tag) {
        Some(token) => Cow::Borrowed(token.name()),
        None => Cow::Owned(format!("Unknown(0x{:02X})", tag)),
    }
}
