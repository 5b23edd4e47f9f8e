#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub use binxml::assemble::{BinXmlDecoder, RecoveredDocument};
pub use binxml::deserializer::BinXmlDeserializer;
pub use binxml::value_render::{ValueRenderer, render_value};
pub use binxml::value_variant::{BinXmlValueType, base_type, is_array_type, value_type_name};
pub use chunk_context::ChunkContext;
pub use err::{DeserializationError, ParseError, RenderError};
pub use model::deserialized::{
    Attribute, BinXMLFragmentHeader, BinXMLOpenStartElement, BinXmlTemplateInstance,
    SubstitutionEntry, Token,
};
pub use model::raw::{BinXmlRawToken, token_type_name};
pub use settings::DecoderSettings;
pub use template_cache::{Template, TemplateCache};
pub use xml_output::XmlRenderer;

pub mod binxml;
pub mod chunk_context;
pub mod err;
pub mod model;
pub mod settings;
pub mod string_cache;
pub mod template_cache;
pub mod xml_output;

mod utils;

/// Offsets inside a chunk (and inside any buffer handed to the decoder) are 32 bit.
pub type ChunkOffset = u32;

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
