use crate::binxml::deserializer::BinXmlDeserializer;
use crate::chunk_context::ChunkContext;
use crate::err::{ParseError, ParseResult, RenderError};
use crate::model::deserialized::Token;
use crate::settings::DecoderSettings;
use crate::utils::escape_xml;
use crate::xml_output::XmlRenderer;

use log::{debug, trace, warn};

#[cfg(feature = "multithreading")]
use rayon::prelude::*;

/// Output of [`BinXmlDecoder::parse_with_recovery`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredDocument {
    pub xml: String,
    pub tokens: Vec<Token>,
    /// One `At offset X: <message>` entry per skipped byte.
    pub errors: Vec<String>,
}

/// Top-level entry point: decodes Binary XML streams of one chunk into XML documents.
#[derive(Debug, Clone)]
pub struct BinXmlDecoder<'c> {
    chunk: &'c ChunkContext,
    settings: DecoderSettings,
}

impl<'c> BinXmlDecoder<'c> {
    pub fn new(chunk: &'c ChunkContext) -> Self {
        BinXmlDecoder::with_settings(chunk, DecoderSettings::default())
    }

    pub fn with_settings(chunk: &'c ChunkContext, settings: DecoderSettings) -> Self {
        BinXmlDecoder { chunk, settings }
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    /// Parses the stream at `offset` into its top-level tokens.
    pub fn decode_tokens(&self, data: &[u8], offset: usize) -> ParseResult<Vec<Token>> {
        BinXmlDeserializer::new(data, offset, self.chunk)?
            .with_max_nesting_depth(self.settings.get_max_nesting_depth())
            .parse_all(None)
    }

    /// Decodes the stream at `offset` into one XML document.
    ///
    /// Never fails: a stream that cannot be tokenized renders as a `<ParseError>` document.
    pub fn decode(&self, data: &[u8], offset: usize) -> String {
        match self.decode_tokens(data, offset) {
            Ok(tokens) => self.render_document(&tokens),
            Err(e) => {
                warn!("Failed to parse record at offset {}: {}", offset, e);
                parse_error_document(&e)
            }
        }
    }

    /// Assembles top-level tokens into one document.
    ///
    /// A lone template instance is returned as is. Otherwise the non-empty renders are
    /// concatenated, and wrapped in the synthetic root element when there is more than one.
    pub fn render_document(&self, tokens: &[Token]) -> String {
        let renderer = XmlRenderer::new(self.chunk, &self.settings);
        let significant: Vec<&Token> = tokens.iter().filter(|t| !t.is_marker()).collect();

        if significant.len() == 1 && matches!(significant[0], Token::TemplateInstance(_)) {
            return render_or_error(&renderer, significant[0]);
        }

        let rendered: Vec<String> = significant
            .iter()
            .map(|token| render_or_error(&renderer, token))
            .filter(|xml| !xml.is_empty())
            .collect();

        trace!("Assembled {} top-level nodes", rendered.len());

        if rendered.len() > 1 {
            let root = self.settings.get_synthetic_root_name();
            format!("<{root}>{}</{root}>", rendered.concat())
        } else {
            rendered.concat()
        }
    }

    /// Best-effort decoding of a corrupt stream: unreadable bytes are skipped one at a time
    /// and reported, and whatever tokens could be read are rendered.
    pub fn parse_with_recovery(&self, data: &[u8], offset: usize) -> RecoveredDocument {
        let deserializer = match BinXmlDeserializer::new(data, offset, self.chunk) {
            Ok(de) => de.with_max_nesting_depth(self.settings.get_max_nesting_depth()),
            Err(e) => {
                return RecoveredDocument {
                    xml: String::new(),
                    tokens: vec![],
                    errors: vec![format!("At offset {}: {}", offset, e.detail())],
                };
            }
        };

        let (tokens, errors) = deserializer.parse_with_recovery();
        if !errors.is_empty() {
            debug!(
                "Recovered {} tokens, skipped {} bytes",
                tokens.len(),
                errors.len()
            );
        }

        RecoveredDocument {
            xml: self.render_document(&tokens),
            tokens,
            errors,
        }
    }

    /// Decodes several streams of the same chunk, in the order of `offsets`.
    #[cfg(feature = "multithreading")]
    pub fn decode_many(&self, data: &[u8], offsets: &[usize]) -> Vec<String> {
        let decode_all = || {
            offsets
                .par_iter()
                .map(|&offset| self.decode(data, offset))
                .collect::<Vec<String>>()
        };

        match self.settings.get_num_threads() {
            0 => decode_all(),
            num_threads => {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                {
                    Ok(pool) => pool.install(decode_all),
                    Err(e) => {
                        warn!("Failed to build a pool of {} threads: {}", num_threads, e);
                        decode_all()
                    }
                }
            }
        }
    }

    /// Decodes several streams of the same chunk, in the order of `offsets`.
    #[cfg(not(feature = "multithreading"))]
    pub fn decode_many(&self, data: &[u8], offsets: &[usize]) -> Vec<String> {
        offsets
            .iter()
            .map(|&offset| self.decode(data, offset))
            .collect()
    }
}

fn render_or_error(renderer: &XmlRenderer<'_>, token: &Token) -> String {
    renderer.render(token, &[]).unwrap_or_else(|e| {
        warn!("Failed to render {}: {}", token.describe(), e);
        token_error_element(token, &e)
    })
}

fn token_error_element(token: &Token, error: &RenderError) -> String {
    format!(
        "<TokenError token=\"{}\">{}</TokenError>",
        token.name(),
        escape_xml(&error.to_string())
    )
}

fn parse_error_document(error: &ParseError) -> String {
    format!(
        "<ParseError offset=\"{}\" token=\"{}\">{}</ParseError>",
        error.offset,
        escape_xml(&error.token_name()),
        escape_xml(&error.message())
    )
}
