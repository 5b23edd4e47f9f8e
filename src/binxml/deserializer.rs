use log::{trace, warn};

use crate::binxml::tokens::{
    read_attribute_name, read_char_ref, read_entity_ref, read_fragment_header,
    read_open_start_element, read_processing_instruction_target, read_substitution,
    read_template_instance, read_text, read_value,
};
use crate::chunk_context::ChunkContext;
use crate::err::{DeserializationError, DeserializationResult, ParseError, ParseResult};
use crate::model::deserialized::{Attribute, Token};
use crate::model::raw::{BinXmlRawToken, token_type_name};
use crate::settings::DEFAULT_MAX_NESTING_DEPTH;
use crate::utils::ByteCursor;

/// Sequential Binary XML token reader.
///
/// Reads one discriminator byte at a time and dispatches to the matching token decoder.
/// Elements are read as a whole: the returned `OpenStartElement` owns its attributes and
/// children, and the cursor ends up after the matching end tag.
pub struct BinXmlDeserializer<'a, 'c> {
    cursor: ByteCursor<'a>,
    chunk: &'c ChunkContext,
    max_depth: usize,
    finished: bool,
}

fn wrap<T>(start: u64, discriminator: u8, r: DeserializationResult<T>) -> ParseResult<T> {
    r.map_err(|e| ParseError::new(start, Some(discriminator), e))
}

fn is_attribute_value(raw: BinXmlRawToken) -> bool {
    matches!(
        raw,
        BinXmlRawToken::Value
            | BinXmlRawToken::CharReference
            | BinXmlRawToken::EntityReference
            | BinXmlRawToken::NormalSubstitution
            | BinXmlRawToken::OptionalSubstitution
            | BinXmlRawToken::ConditionalSubstitution
    )
}

impl<'a, 'c> BinXmlDeserializer<'a, 'c> {
    /// A deserializer positioned at `offset` within `data`.
    pub fn new(data: &'a [u8], offset: usize, chunk: &'c ChunkContext) -> ParseResult<Self> {
        let cursor = ByteCursor::with_pos(data, offset, 0)
            .map_err(|e| ParseError::new(offset as u64, None, e))?;

        Ok(BinXmlDeserializer {
            cursor,
            chunk,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
            finished: false,
        })
    }

    /// A deserializer over a fragment copied out of a larger buffer, where `data[0]` lives at
    /// offset `base`. Name offsets inside the fragment stay relative to the larger buffer.
    pub(crate) fn from_fragment(
        data: &'a [u8],
        base: u64,
        chunk: &'c ChunkContext,
    ) -> DeserializationResult<Self> {
        Ok(BinXmlDeserializer {
            cursor: ByteCursor::with_pos(data, 0, base)?,
            chunk,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
            finished: false,
        })
    }

    pub fn with_max_nesting_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Current position, relative to the start of the data.
    pub fn position(&self) -> usize {
        self.cursor.pos()
    }

    /// Reads one token, returning it with the position of the token that follows.
    pub fn parse_next(&mut self) -> ParseResult<(Token, usize)> {
        let token = self.read_token(0)?;
        Ok((token, self.cursor.pos()))
    }

    /// Reads tokens until the end of the data, an `EndOfStream` token (consumed and included),
    /// or the `terminator` discriminator (left unread).
    pub fn parse_all(&mut self, terminator: Option<u8>) -> ParseResult<Vec<Token>> {
        let mut tokens = vec![];

        while let Some(next) = self.cursor.peek_u8() {
            if terminator == Some(next) {
                trace!("Stopping at terminator 0x{:02x}", next);
                break;
            }

            let (token, _) = self.parse_next()?;
            let is_end = token == Token::EndOfStream;
            tokens.push(token);

            if is_end {
                break;
            }
        }

        Ok(tokens)
    }

    /// Best-effort parsing of a possibly corrupt stream.
    ///
    /// A token that fails to parse is reported as `At offset X: <message>` and parsing resumes
    /// one byte later, so this visits every offset at most once and always terminates.
    pub fn parse_with_recovery(mut self) -> (Vec<Token>, Vec<String>) {
        let mut tokens = vec![];
        let mut errors = vec![];

        while !self.cursor.is_eof() {
            let pos = self.cursor.pos();
            let start = self.cursor.position();

            match self.parse_next() {
                Ok((token, _)) => tokens.push(token),
                Err(e) => {
                    warn!("Skipping a byte at offset {} after error: {}", start, e);
                    errors.push(format!("At offset {}: {}", start, e.detail()));
                    if self.cursor.set_pos(pos + 1, "resynchronize").is_err() {
                        break;
                    }
                }
            }
        }

        (tokens, errors)
    }

    fn read_token(&mut self, depth: usize) -> ParseResult<Token> {
        let token_start = self.cursor.pos();
        let start = self.cursor.position();

        let discriminator = self
            .cursor
            .u8_named("token")
            .map_err(|e| ParseError::new(start, None, e))?;

        let raw = BinXmlRawToken::from_u8(discriminator).ok_or_else(|| {
            ParseError::new(
                start,
                Some(discriminator),
                DeserializationError::InvalidToken {
                    value: discriminator,
                    offset: start,
                },
            )
        })?;

        trace!("Offset `0x{:08x} ({})`: {}", start, start, raw.name());
        let chunk = self.chunk;
        let strings = chunk.strings();

        let token = match raw {
            BinXmlRawToken::EndOfStream => Token::EndOfStream,
            BinXmlRawToken::OpenStartElement(meta) => {
                return self.read_element(meta.has_attributes, start, discriminator, depth);
            }
            BinXmlRawToken::CloseStartElement => Token::CloseStartElement,
            BinXmlRawToken::CloseEmptyElement => Token::CloseEmptyElement,
            BinXmlRawToken::EndElement => Token::EndElement,
            BinXmlRawToken::Value => wrap(start, discriminator, read_value(&mut self.cursor))?,
            BinXmlRawToken::Attribute(_) => {
                return Err(ParseError::new(
                    start,
                    Some(discriminator),
                    DeserializationError::UnexpectedToken {
                        found: raw.name().to_owned(),
                        expected: "an attribute only inside a start tag",
                        offset: start,
                    },
                ));
            }
            BinXmlRawToken::CDataSection => Token::CData {
                text: wrap(start, discriminator, read_text(&mut self.cursor, "cdata"))?,
            },
            BinXmlRawToken::CharReference => {
                wrap(start, discriminator, read_char_ref(&mut self.cursor))?
            }
            BinXmlRawToken::EntityReference => {
                wrap(start, discriminator, read_entity_ref(&mut self.cursor, strings))?
            }
            BinXmlRawToken::ProcessingInstructionTarget => {
                let target = wrap(
                    start,
                    discriminator,
                    read_processing_instruction_target(&mut self.cursor, strings),
                )?;
                let data = match self.cursor.peek_u8().and_then(BinXmlRawToken::from_u8) {
                    Some(BinXmlRawToken::ProcessingInstructionData) => {
                        let data_start = self.cursor.position();
                        let mut probe = self.cursor;
                        let data_token = probe.u8_named("pi_data_token");
                        let data = data_token.and_then(|_| read_text(&mut probe, "pi_data"));
                        let data = data.map_err(|e| ParseError::new(data_start, Some(0x0b), e))?;
                        self.cursor = probe;
                        data
                    }
                    _ => String::new(),
                };
                Token::ProcessingInstruction { target, data }
            }
            BinXmlRawToken::ProcessingInstructionData => Token::ProcessingInstruction {
                target: String::new(),
                data: wrap(start, discriminator, read_text(&mut self.cursor, "pi_data"))?,
            },
            BinXmlRawToken::TemplateInstance => Token::TemplateInstance(wrap(
                start,
                discriminator,
                read_template_instance(&mut self.cursor, token_start, self.chunk),
            )?),
            BinXmlRawToken::NormalSubstitution
            | BinXmlRawToken::OptionalSubstitution
            | BinXmlRawToken::ConditionalSubstitution => {
                wrap(start, discriminator, read_substitution(&mut self.cursor, raw))?
            }
            BinXmlRawToken::FragmentHeader => Token::FragmentHeader(wrap(
                start,
                discriminator,
                read_fragment_header(&mut self.cursor),
            )?),
            BinXmlRawToken::StartOfStream => Token::StartOfStream,
            BinXmlRawToken::Comment => Token::Comment {
                text: wrap(start, discriminator, read_text(&mut self.cursor, "comment"))?,
            },
        };

        Ok(token)
    }

    fn read_element(
        &mut self,
        has_attributes: bool,
        start: u64,
        discriminator: u8,
        depth: usize,
    ) -> ParseResult<Token> {
        if depth >= self.max_depth {
            return Err(ParseError::new(
                start,
                Some(discriminator),
                DeserializationError::NestingTooDeep {
                    limit: self.max_depth,
                    offset: start,
                },
            ));
        }

        let mut element = wrap(
            start,
            discriminator,
            read_open_start_element(&mut self.cursor, self.chunk.strings(), has_attributes),
        )?;
        trace!("\t element: {:?}", element.name);

        // Attributes, up to the end of the start tag.
        loop {
            let next_start = self.cursor.position();
            let Some(next) = self.cursor.peek_u8() else {
                warn!(
                    "Element `{}` at offset {} is cut off by the end of data",
                    element.name, start
                );
                return Ok(Token::OpenStartElement(element));
            };

            match BinXmlRawToken::from_u8(next) {
                Some(BinXmlRawToken::Attribute(_)) => {
                    let attribute = self.read_attribute(depth)?;
                    element.attributes.push(attribute);
                }
                Some(BinXmlRawToken::CloseStartElement) => {
                    self.skip_discriminator();
                    break;
                }
                Some(BinXmlRawToken::CloseEmptyElement) => {
                    self.skip_discriminator();
                    return Ok(Token::OpenStartElement(element));
                }
                Some(BinXmlRawToken::EndOfStream) => {
                    warn!(
                        "Element `{}` at offset {} is closed by end of stream",
                        element.name, start
                    );
                    return Ok(Token::OpenStartElement(element));
                }
                _ => {
                    return Err(ParseError::new(
                        next_start,
                        Some(next),
                        DeserializationError::UnexpectedToken {
                            found: token_type_name(next).into_owned(),
                            expected: "an attribute or the end of the start tag",
                            offset: next_start,
                        },
                    ));
                }
            }
        }

        // Content, up to the matching end tag.
        loop {
            match self.cursor.peek_u8() {
                Some(0x04) => {
                    self.skip_discriminator();
                    break;
                }
                Some(0x00) => {
                    warn!(
                        "Element `{}` at offset {} is closed by end of stream",
                        element.name, start
                    );
                    break;
                }
                None => {
                    warn!(
                        "Element `{}` at offset {} is cut off by the end of data",
                        element.name, start
                    );
                    break;
                }
                Some(next @ (0x02 | 0x03)) => {
                    warn!(
                        "Stray `{}` at offset {} inside element `{}`",
                        token_type_name(next),
                        self.cursor.position(),
                        element.name
                    );
                    let child = self.read_token(depth + 1)?;
                    element.children.push(child);
                }
                Some(_) => {
                    let child = self.read_token(depth + 1)?;
                    element.children.push(child);
                }
            }
        }

        Ok(Token::OpenStartElement(element))
    }

    fn read_attribute(&mut self, depth: usize) -> ParseResult<Attribute> {
        let start = self.cursor.position();
        let discriminator = self
            .cursor
            .u8_named("attribute_token")
            .map_err(|e| ParseError::new(start, None, e))?;

        let name = wrap(
            start,
            discriminator,
            read_attribute_name(&mut self.cursor, self.chunk.strings()),
        )?;

        let value_start = self.cursor.position();
        let next = self.cursor.peek_u8();
        match next.and_then(BinXmlRawToken::from_u8) {
            Some(raw) if is_attribute_value(raw) => {}
            _ => {
                let found = next
                    .map(|t| token_type_name(t).into_owned())
                    .unwrap_or_else(|| "end of data".to_owned());
                return Err(ParseError::new(
                    value_start,
                    next,
                    DeserializationError::UnexpectedToken {
                        found,
                        expected: "an attribute value",
                        offset: value_start,
                    },
                ));
            }
        }

        let value = self.read_token(depth + 1)?;
        Ok(Attribute { name, value })
    }

    /// Consumes a discriminator that was already peeked.
    fn skip_discriminator(&mut self) {
        let _ = self.cursor.u8_named("token");
    }
}

impl Iterator for BinXmlDeserializer<'_, '_> {
    type Item = ParseResult<Token>;

    /// Yields top-level tokens until the end of data, an `EndOfStream` token or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.cursor.is_eof() {
            return None;
        }

        match self.parse_next() {
            Ok((token, _)) => {
                if token == Token::EndOfStream {
                    self.finished = true;
                }
                Some(Ok(token))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
