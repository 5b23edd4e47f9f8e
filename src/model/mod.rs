pub mod deserialized;
pub mod raw;
