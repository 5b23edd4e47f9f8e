pub mod assemble;
pub mod deserializer;
pub mod name;
pub(crate) mod tokens;
pub mod value_render;
pub mod value_variant;
