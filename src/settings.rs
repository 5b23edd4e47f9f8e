use encoding::EncodingRef;
use encoding::all::ISO_8859_1;
use std::fmt::{self, Debug, Formatter};

/// Element name used to wrap documents that decode to more than one top-level node.
pub const DEFAULT_SYNTHETIC_ROOT: &str = "Events";
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

#[derive(Clone)]
pub struct DecoderSettings {
    /// Codec used to decode `AnsiStringType` values.
    ansi_codec: EncodingRef,
    synthetic_root_name: String,
    /// Bounds element nesting while parsing, and template / nested fragment depth while rendering.
    max_nesting_depth: usize,
    /// Worker count for batch decoding. `0` lets rayon pick.
    num_threads: usize,
}

impl Debug for DecoderSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderSettings")
            .field("ansi_codec", &self.ansi_codec.name())
            .field("synthetic_root_name", &self.synthetic_root_name)
            .field("max_nesting_depth", &self.max_nesting_depth)
            .field("num_threads", &self.num_threads)
            .finish()
    }
}

impl PartialEq for DecoderSettings {
    fn eq(&self, other: &Self) -> bool {
        self.ansi_codec.name() == other.ansi_codec.name()
            && self.synthetic_root_name == other.synthetic_root_name
            && self.max_nesting_depth == other.max_nesting_depth
            && self.num_threads == other.num_threads
    }
}

impl Default for DecoderSettings {
    fn default() -> Self {
        DecoderSettings {
            ansi_codec: ISO_8859_1,
            synthetic_root_name: DEFAULT_SYNTHETIC_ROOT.to_owned(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            num_threads: 0,
        }
    }
}

impl DecoderSettings {
    pub fn new() -> Self {
        DecoderSettings::default()
    }

    /// Sets the codec used to decode ANSI strings.
    /// Defaults to ISO-8859-1 (Latin-1).
    pub fn ansi_codec(mut self, ansi_codec: EncodingRef) -> Self {
        self.ansi_codec = ansi_codec;
        self
    }

    /// Name of the element that wraps multi-node documents.
    pub fn synthetic_root_name(mut self, name: impl Into<String>) -> Self {
        self.synthetic_root_name = name.into();
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Sets the number of worker threads used by batch decoding.
    /// `0` means rayon's default. Ignored without the `multithreading` feature.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }

    pub fn get_synthetic_root_name(&self) -> &str {
        &self.synthetic_root_name
    }

    pub fn get_max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_overrides_defaults() {
        let settings = DecoderSettings::new()
            .ansi_codec(encoding::all::WINDOWS_1252)
            .synthetic_root_name("Records")
            .max_nesting_depth(8)
            .num_threads(2);

        assert_eq!(settings.get_ansi_codec().name(), "windows-1252");
        assert_eq!(settings.get_synthetic_root_name(), "Records");
        assert_eq!(settings.get_max_nesting_depth(), 8);
        assert_eq!(settings.get_num_threads(), 2);
        assert!(settings != DecoderSettings::default());
    }

    #[test]
    fn test_debug_shows_codec_name() {
        let rendered = format!("{:?}", DecoderSettings::default());
        assert!(rendered.contains("iso-8859-1"), "{}", rendered);
    }
}
