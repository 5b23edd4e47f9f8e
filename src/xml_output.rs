//! Renders decoded token trees as XML text.

use crate::binxml::deserializer::BinXmlDeserializer;
use crate::binxml::value_render::{ValueRenderer, parse_error_marker};
use crate::binxml::value_variant::BinXmlValueType;
use crate::chunk_context::ChunkContext;
use crate::err::{RenderError, RenderResult};
use crate::model::deserialized::{
    Attribute, BinXMLOpenStartElement, BinXmlTemplateInstance, SubstitutionEntry, Token,
};
use crate::settings::DecoderSettings;
use crate::template_cache::Template;
use crate::utils::escape_xml;

use log::{trace, warn};
use std::fmt::Write;

/// Renders tokens against one chunk's templates.
///
/// Substitution tokens are resolved against the substitution array handed to
/// [`XmlRenderer::render`], never against the chunk.
#[derive(Debug, Clone, Copy)]
pub struct XmlRenderer<'c> {
    chunk: &'c ChunkContext,
    values: ValueRenderer,
    /// Bounds elements, template instances and nested fragments together.
    max_depth: usize,
}

fn entity_char(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

impl<'c> XmlRenderer<'c> {
    pub fn new(chunk: &'c ChunkContext, settings: &DecoderSettings) -> Self {
        XmlRenderer {
            chunk,
            values: ValueRenderer::new(settings.get_ansi_codec()),
            max_depth: settings.get_max_nesting_depth(),
        }
    }

    pub fn render(&self, token: &Token, substitutions: &[SubstitutionEntry]) -> RenderResult<String> {
        let mut out = String::new();
        self.write_token(&mut out, token, substitutions, 0)?;
        Ok(out)
    }

    fn descend(&self, depth: usize, token: &Token) -> RenderResult<usize> {
        if depth >= self.max_depth {
            return Err(RenderError::NestingTooDeep {
                limit: self.max_depth,
                what: token.describe(),
            });
        }
        Ok(depth + 1)
    }

    fn write_token(
        &self,
        out: &mut String,
        token: &Token,
        substitutions: &[SubstitutionEntry],
        depth: usize,
    ) -> RenderResult<()> {
        match token {
            // Structure is already encoded by the element tree.
            Token::StartOfStream
            | Token::EndOfStream
            | Token::FragmentHeader(_)
            | Token::CloseStartElement
            | Token::CloseEmptyElement
            | Token::EndElement => {}
            Token::OpenStartElement(element) => {
                let depth = self.descend(depth, token)?;
                self.write_element(out, element, substitutions, depth)?
            }
            Token::Value { value_type, raw } => {
                out.push_str(&escape_xml(&self.values.render(*value_type, raw)));
            }
            Token::CharRef(code_point) => {
                let _ = write!(out, "&#{};", code_point);
            }
            Token::EntityRef { name } => match entity_char(name) {
                Some(c) => out.push(c),
                None => {
                    let _ = write!(out, "&{};", name);
                }
            },
            Token::ProcessingInstruction { target, data } => {
                if data.is_empty() {
                    let _ = write!(out, "<?{}?>", target);
                } else {
                    let _ = write!(out, "<?{} {}?>", target, data);
                }
            }
            Token::Comment { text } => {
                let _ = write!(out, "<!-- {} -->", escape_xml(text));
            }
            Token::CData { text } => {
                let _ = write!(out, "<![CDATA[{}]]>", text);
            }
            Token::NormalSubstitution { index, .. }
            | Token::ConditionalSubstitution { index, .. } => {
                self.write_substitution(out, *index, true, substitutions, depth)?
            }
            Token::OptionalSubstitution { index, .. } => {
                self.write_substitution(out, *index, false, substitutions, depth)?
            }
            Token::TemplateInstance(instance) => {
                let depth = self.descend(depth, token)?;
                self.write_template_instance(out, instance, depth)?
            }
        }
        Ok(())
    }

    fn write_element(
        &self,
        out: &mut String,
        element: &BinXMLOpenStartElement,
        substitutions: &[SubstitutionEntry],
        depth: usize,
    ) -> RenderResult<()> {
        out.push('<');
        out.push_str(&element.name);

        for attribute in &element.attributes {
            self.write_attribute(out, attribute, substitutions, depth)?;
        }
        out.push('>');

        for child in &element.children {
            self.write_token(out, child, substitutions, depth)?;
        }

        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
        Ok(())
    }

    fn write_attribute(
        &self,
        out: &mut String,
        attribute: &Attribute,
        substitutions: &[SubstitutionEntry],
        depth: usize,
    ) -> RenderResult<()> {
        let mut value = String::new();
        match &attribute.value {
            // A literal quote would end the attribute early.
            Token::EntityRef { name } if entity_char(name).is_some() => {
                let _ = write!(value, "&{};", name);
            }
            token => self.write_token(&mut value, token, substitutions, depth)?,
        }

        if value.is_empty() && matches!(attribute.value, Token::OptionalSubstitution { .. }) {
            trace!("Omitting empty optional attribute `{}`", attribute.name);
            return Ok(());
        }

        let _ = write!(out, " {}=\"{}\"", attribute.name, value);
        Ok(())
    }

    fn write_substitution(
        &self,
        out: &mut String,
        index: u16,
        required: bool,
        substitutions: &[SubstitutionEntry],
        depth: usize,
    ) -> RenderResult<()> {
        let Some(entry) = substitutions.get(usize::from(index)) else {
            if required {
                warn!(
                    "Substitution {} is missing ({} available)",
                    index,
                    substitutions.len()
                );
                let _ = write!(out, "[Missing Substitution {}]", index);
            }
            return Ok(());
        };

        match BinXmlValueType::from_u8(entry.value_type) {
            Some(BinXmlValueType::NullType) => {}
            Some(BinXmlValueType::BinXmlType) => {
                self.write_nested_fragment(out, entry, substitutions, depth)?
            }
            _ => out.push_str(&escape_xml(
                &self.values.render(entry.value_type, &entry.bytes),
            )),
        }
        Ok(())
    }

    /// A substitution holding Binary XML of its own, decoded with the same chunk tables.
    fn write_nested_fragment(
        &self,
        out: &mut String,
        entry: &SubstitutionEntry,
        substitutions: &[SubstitutionEntry],
        depth: usize,
    ) -> RenderResult<()> {
        if depth >= self.max_depth {
            return Err(RenderError::NestingTooDeep {
                limit: self.max_depth,
                what: format!("nested fragment at offset {}", entry.position),
            });
        }

        let parsed = BinXmlDeserializer::from_fragment(
            &entry.bytes,
            u64::from(entry.position),
            self.chunk,
        )
        .map_err(|e| e.to_string())
        .and_then(|de| {
            de.with_max_nesting_depth(self.max_depth)
                .parse_all(None)
                .map_err(|e| e.to_string())
        });

        match parsed {
            Ok(tokens) => {
                for token in tokens.iter().filter(|t| !t.is_marker()) {
                    self.write_token(out, token, substitutions, depth + 1)?;
                }
            }
            Err(message) => {
                warn!(
                    "Failed to decode nested fragment at offset {}: {}",
                    entry.position, message
                );
                out.push_str(&parse_error_marker(&entry.bytes));
            }
        }
        Ok(())
    }

    fn write_template_instance(
        &self,
        out: &mut String,
        instance: &BinXmlTemplateInstance,
        depth: usize,
    ) -> RenderResult<()> {
        let template = instance
            .bound_template
            .clone()
            .or_else(|| self.chunk.get_template(instance.template_id));

        match template {
            Some(template) => {
                self.write_token(out, &template.root_token, &instance.substitutions, depth)
            }
            None => {
                warn!("Template {} is not registered", instance.template_id);
                let _ = write!(out, "[Missing Template {}]", instance.template_id);
                Ok(())
            }
        }
    }
}

impl Token {
    /// Renders this token as XML, filling substitution placeholders from `substitutions`.
    pub fn render(
        &self,
        substitutions: &[SubstitutionEntry],
        chunk: &ChunkContext,
    ) -> RenderResult<String> {
        XmlRenderer::new(chunk, &DecoderSettings::default()).render(self, substitutions)
    }
}

impl Template {
    pub fn render(
        &self,
        substitutions: &[SubstitutionEntry],
        chunk: &ChunkContext,
    ) -> RenderResult<String> {
        self.root_token.render(substitutions, chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_env_logger_initialized;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn text(s: &str) -> Token {
        Token::Value {
            value_type: 0x01,
            raw: s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        }
    }

    fn element(name: &str, attributes: Vec<Attribute>, children: Vec<Token>) -> Token {
        Token::OpenStartElement(BinXMLOpenStartElement {
            name: name.to_owned(),
            dependency_id: 0,
            data_size: 0,
            attributes,
            children,
        })
    }

    fn string_entry(s: &str) -> SubstitutionEntry {
        let bytes: Vec<u8> = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        SubstitutionEntry {
            position: 0,
            size: bytes.len() as u16,
            value_type: 0x01,
            bytes,
        }
    }

    #[test]
    fn test_element_with_attribute_and_text() {
        let chunk = ChunkContext::new();
        let token = element(
            "Data",
            vec![Attribute {
                name: "Name".to_owned(),
                value: text("a\"b"),
            }],
            vec![text("1 < 2 & 'x'")],
        );

        assert_eq!(
            token.render(&[], &chunk).unwrap(),
            "<Data Name=\"a&quot;b\">1 &lt; 2 &amp; &apos;x&apos;</Data>"
        );
    }

    #[test]
    fn test_empty_element_keeps_end_tag() {
        let chunk = ChunkContext::new();
        assert_eq!(
            element("Security", vec![], vec![]).render(&[], &chunk).unwrap(),
            "<Security></Security>"
        );
    }

    #[test]
    fn test_references_comments_and_cdata() {
        let chunk = ChunkContext::new();
        let render = |t: Token| t.render(&[], &chunk).unwrap();

        assert_eq!(render(Token::CharRef(65)), "&#65;");
        assert_eq!(render(Token::EntityRef { name: "lt".to_owned() }), "<");
        assert_eq!(render(Token::EntityRef { name: "nbsp".to_owned() }), "&nbsp;");
        assert_eq!(
            render(Token::Comment { text: "a&b".to_owned() }),
            "<!-- a&amp;b -->"
        );
        assert_eq!(
            render(Token::CData { text: "<&>\"'".to_owned() }),
            "<![CDATA[<&>\"']]>"
        );
        assert_eq!(
            render(Token::ProcessingInstruction {
                target: "pi".to_owned(),
                data: "x".to_owned(),
            }),
            "<?pi x?>"
        );
    }

    #[test]
    fn test_entity_ref_in_attribute_stays_escaped() {
        let chunk = ChunkContext::new();
        let token = element(
            "a",
            vec![Attribute {
                name: "q".to_owned(),
                value: Token::EntityRef { name: "quot".to_owned() },
            }],
            vec![],
        );
        assert_eq!(token.render(&[], &chunk).unwrap(), "<a q=\"&quot;\"></a>");
    }

    #[test]
    fn test_substitutions() {
        ensure_env_logger_initialized();
        let chunk = ChunkContext::new();
        let subs = vec![string_entry("alice")];
        let render = |t: Token| t.render(&subs, &chunk).unwrap();

        assert_eq!(
            render(Token::NormalSubstitution { index: 0, value_type: 1 }),
            "alice"
        );
        assert_eq!(
            render(Token::ConditionalSubstitution {
                index: 0,
                value_type: 1,
                condition: 1,
            }),
            "alice"
        );
        assert_eq!(
            render(Token::NormalSubstitution { index: 3, value_type: 1 }),
            "[Missing Substitution 3]"
        );
        assert_eq!(
            render(Token::ConditionalSubstitution {
                index: 3,
                value_type: 1,
                condition: 0,
            }),
            "[Missing Substitution 3]"
        );
        assert_eq!(
            render(Token::OptionalSubstitution { index: 3, value_type: 1 }),
            ""
        );
    }

    #[test]
    fn test_substitution_values_are_escaped_and_null_is_empty() {
        let chunk = ChunkContext::new();
        let subs = vec![
            string_entry("<x>"),
            SubstitutionEntry {
                position: 0,
                size: 0,
                value_type: 0x00,
                bytes: vec![],
            },
        ];

        assert_eq!(
            Token::NormalSubstitution { index: 0, value_type: 1 }
                .render(&subs, &chunk)
                .unwrap(),
            "&lt;x&gt;"
        );
        assert_eq!(
            Token::NormalSubstitution { index: 1, value_type: 0 }
                .render(&subs, &chunk)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn test_empty_optional_attribute_is_omitted() {
        let chunk = ChunkContext::new();
        let token = element(
            "Execution",
            vec![
                Attribute {
                    name: "ProcessID".to_owned(),
                    value: Token::NormalSubstitution { index: 0, value_type: 1 },
                },
                Attribute {
                    name: "ThreadID".to_owned(),
                    value: Token::OptionalSubstitution { index: 5, value_type: 1 },
                },
            ],
            vec![],
        );

        assert_eq!(
            token.render(&[string_entry("4")], &chunk).unwrap(),
            "<Execution ProcessID=\"4\"></Execution>"
        );
    }

    #[test]
    fn test_template_instance_binding() {
        let mut chunk = ChunkContext::new();
        let template = chunk.add_template(Template::with_id(
            1,
            element(
                "Event",
                vec![],
                vec![Token::NormalSubstitution { index: 0, value_type: 1 }],
            ),
        ));

        let unbound = Token::TemplateInstance(BinXmlTemplateInstance {
            template_id: 1,
            substitutions: vec![string_entry("alice")],
            bound_template: None,
        });
        assert_eq!(unbound.render(&[], &chunk).unwrap(), "<Event>alice</Event>");

        // A bound template wins even when the chunk no longer knows it.
        let bound = Token::TemplateInstance(BinXmlTemplateInstance {
            template_id: 1,
            substitutions: vec![string_entry("bob")],
            bound_template: Some(Arc::clone(&template)),
        });
        let empty = ChunkContext::new();
        assert_eq!(bound.render(&[], &empty).unwrap(), "<Event>bob</Event>");

        let missing = Token::TemplateInstance(BinXmlTemplateInstance {
            template_id: 2,
            substitutions: vec![],
            bound_template: None,
        });
        assert_eq!(missing.render(&[], &chunk).unwrap(), "[Missing Template 2]");

        assert_eq!(
            template.render(&[string_entry("carol")], &chunk).unwrap(),
            "<Event>carol</Event>"
        );
    }

    #[test]
    fn test_elements_count_toward_render_depth() {
        let chunk = ChunkContext::new();
        let mut token = text("leaf");
        for _ in 0..4 {
            token = element("a", vec![], vec![token]);
        }

        let settings = DecoderSettings::default().max_nesting_depth(4);
        assert_eq!(
            XmlRenderer::new(&chunk, &settings).render(&token, &[]).unwrap(),
            "<a><a><a><a>leaf</a></a></a></a>"
        );

        let settings = DecoderSettings::default().max_nesting_depth(3);
        let err = XmlRenderer::new(&chunk, &settings)
            .render(&token, &[])
            .unwrap_err();
        assert!(matches!(err, RenderError::NestingTooDeep { limit: 3, .. }));
    }

    #[test]
    fn test_self_referencing_template_hits_depth_limit() {
        let mut chunk = ChunkContext::new();
        let instance = Token::TemplateInstance(BinXmlTemplateInstance {
            template_id: 9,
            substitutions: vec![],
            bound_template: None,
        });
        chunk.add_template(Template::with_id(9, element("Loop", vec![], vec![instance.clone()])));

        let settings = DecoderSettings::default().max_nesting_depth(4);
        let err = XmlRenderer::new(&chunk, &settings)
            .render(&instance, &[])
            .unwrap_err();

        assert!(matches!(err, RenderError::NestingTooDeep { limit: 4, .. }));
    }
}
