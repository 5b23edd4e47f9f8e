use std::borrow::Cow;

/// Set on a value type tag when the payload is an array of the base type.
pub const ARRAY_FLAG: u8 = 0x80;

#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinXmlValueType {
    NullType,
    StringType,
    AnsiStringType,
    Int8Type,
    UInt8Type,
    Int16Type,
    UInt16Type,
    Int32Type,
    UInt32Type,
    Int64Type,
    UInt64Type,
    Real32Type,
    Real64Type,
    BoolType,
    BinaryType,
    GuidType,
    SizeTType,
    FileTimeType,
    SysTimeType,
    SidType,
    HexInt32Type,
    HexInt64Type,
    EvtHandle,
    BinXmlType,
    EvtXmlType,
    StringArrayType,
    AnsiStringArrayType,
    Int8ArrayType,
    UInt8ArrayType,
    Int16ArrayType,
    UInt16ArrayType,
    Int32ArrayType,
    UInt32ArrayType,
    Int64ArrayType,
    UInt64ArrayType,
    Real32ArrayType,
    Real64ArrayType,
    BoolArrayType,
    BinaryArrayType,
    GuidArrayType,
    SizeTArrayType,
    FileTimeArrayType,
    SysTimeArrayType,
    SidArrayType,
    HexInt32ArrayType,
    HexInt64ArrayType,
}

impl BinXmlValueType {
    pub fn from_u8(byte: u8) -> Option<BinXmlValueType> {
        match byte {
            0x00 => Some(BinXmlValueType::NullType),
            0x01 => Some(BinXmlValueType::StringType),
            0x02 => Some(BinXmlValueType::AnsiStringType),
            0x03 => Some(BinXmlValueType::Int8Type),
            0x04 => Some(BinXmlValueType::UInt8Type),
            0x05 => Some(BinXmlValueType::Int16Type),
            0x06 => Some(BinXmlValueType::UInt16Type),
            0x07 => Some(BinXmlValueType::Int32Type),
            0x08 => Some(BinXmlValueType::UInt32Type),
            0x09 => Some(BinXmlValueType::Int64Type),
            0x0a => Some(BinXmlValueType::UInt64Type),
            0x0b => Some(BinXmlValueType::Real32Type),
            0x0c => Some(BinXmlValueType::Real64Type),
            0x0d => Some(BinXmlValueType::BoolType),
            0x0e => Some(BinXmlValueType::BinaryType),
            0x0f => Some(BinXmlValueType::GuidType),
            0x10 => Some(BinXmlValueType::SizeTType),
            0x11 => Some(BinXmlValueType::FileTimeType),
            0x12 => Some(BinXmlValueType::SysTimeType),
            0x13 => Some(BinXmlValueType::SidType),
            0x14 => Some(BinXmlValueType::HexInt32Type),
            0x15 => Some(BinXmlValueType::HexInt64Type),
            0x20 => Some(BinXmlValueType::EvtHandle),
            0x21 => Some(BinXmlValueType::BinXmlType),
            0x23 => Some(BinXmlValueType::EvtXmlType),
            0x81 => Some(BinXmlValueType::StringArrayType),
            0x82 => Some(BinXmlValueType::AnsiStringArrayType),
            0x83 => Some(BinXmlValueType::Int8ArrayType),
            0x84 => Some(BinXmlValueType::UInt8ArrayType),
            0x85 => Some(BinXmlValueType::Int16ArrayType),
            0x86 => Some(BinXmlValueType::UInt16ArrayType),
            0x87 => Some(BinXmlValueType::Int32ArrayType),
            0x88 => Some(BinXmlValueType::UInt32ArrayType),
            0x89 => Some(BinXmlValueType::Int64ArrayType),
            0x8a => Some(BinXmlValueType::UInt64ArrayType),
            0x8b => Some(BinXmlValueType::Real32ArrayType),
            0x8c => Some(BinXmlValueType::Real64ArrayType),
            0x8d => Some(BinXmlValueType::BoolArrayType),
            0x8e => Some(BinXmlValueType::BinaryArrayType),
            0x8f => Some(BinXmlValueType::GuidArrayType),
            0x90 => Some(BinXmlValueType::SizeTArrayType),
            0x91 => Some(BinXmlValueType::FileTimeArrayType),
            0x92 => Some(BinXmlValueType::SysTimeArrayType),
            0x93 => Some(BinXmlValueType::SidArrayType),
            0x94 => Some(BinXmlValueType::HexInt32ArrayType),
            0x95 => Some(BinXmlValueType::HexInt64ArrayType),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BinXmlValueType::NullType => "NullType",
            BinXmlValueType::StringType => "StringType",
            BinXmlValueType::AnsiStringType => "AnsiStringType",
            BinXmlValueType::Int8Type => "Int8Type",
            BinXmlValueType::UInt8Type => "UInt8Type",
            BinXmlValueType::Int16Type => "Int16Type",
            BinXmlValueType::UInt16Type => "UInt16Type",
            BinXmlValueType::Int32Type => "Int32Type",
            BinXmlValueType::UInt32Type => "UInt32Type",
            BinXmlValueType::Int64Type => "Int64Type",
            BinXmlValueType::UInt64Type => "UInt64Type",
            BinXmlValueType::Real32Type => "Real32Type",
            BinXmlValueType::Real64Type => "Real64Type",
            BinXmlValueType::BoolType => "BoolType",
            BinXmlValueType::BinaryType => "BinaryType",
            BinXmlValueType::GuidType => "GuidType",
            BinXmlValueType::SizeTType => "SizeTType",
            BinXmlValueType::FileTimeType => "FileTimeType",
            BinXmlValueType::SysTimeType => "SysTimeType",
            BinXmlValueType::SidType => "SidType",
            BinXmlValueType::HexInt32Type => "HexInt32Type",
            BinXmlValueType::HexInt64Type => "HexInt64Type",
            BinXmlValueType::EvtHandle => "EvtHandle",
            BinXmlValueType::BinXmlType => "BinXmlType",
            BinXmlValueType::EvtXmlType => "EvtXmlType",
            BinXmlValueType::StringArrayType => "StringArrayType",
            BinXmlValueType::AnsiStringArrayType => "AnsiStringArrayType",
            BinXmlValueType::Int8ArrayType => "Int8ArrayType",
            BinXmlValueType::UInt8ArrayType => "UInt8ArrayType",
            BinXmlValueType::Int16ArrayType => "Int16ArrayType",
            BinXmlValueType::UInt16ArrayType => "UInt16ArrayType",
            BinXmlValueType::Int32ArrayType => "Int32ArrayType",
            BinXmlValueType::UInt32ArrayType => "UInt32ArrayType",
            BinXmlValueType::Int64ArrayType => "Int64ArrayType",
            BinXmlValueType::UInt64ArrayType => "UInt64ArrayType",
            BinXmlValueType::Real32ArrayType => "Real32ArrayType",
            BinXmlValueType::Real64ArrayType => "Real64ArrayType",
            BinXmlValueType::BoolArrayType => "BoolArrayType",
            BinXmlValueType::BinaryArrayType => "BinaryArrayType",
            BinXmlValueType::GuidArrayType => "GuidArrayType",
            BinXmlValueType::SizeTArrayType => "SizeTArrayType",
            BinXmlValueType::FileTimeArrayType => "FileTimeArrayType",
            BinXmlValueType::SysTimeArrayType => "SysTimeArrayType",
            BinXmlValueType::SidArrayType => "SidArrayType",
            BinXmlValueType::HexInt32ArrayType => "HexInt32ArrayType",
            BinXmlValueType::HexInt64ArrayType => "HexInt64ArrayType",
        }
    }

    /// Fixed payload width of a scalar type, `None` for variable-length types.
    ///
    /// This is also the element size used to slice arrays of this type.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            BinXmlValueType::Int8Type | BinXmlValueType::UInt8Type => Some(1),
            BinXmlValueType::Int16Type | BinXmlValueType::UInt16Type => Some(2),
            BinXmlValueType::Int32Type
            | BinXmlValueType::UInt32Type
            | BinXmlValueType::Real32Type
            | BinXmlValueType::HexInt32Type
            | BinXmlValueType::BoolType => Some(4),
            BinXmlValueType::Int64Type
            | BinXmlValueType::UInt64Type
            | BinXmlValueType::Real64Type
            | BinXmlValueType::HexInt64Type
            | BinXmlValueType::SizeTType
            | BinXmlValueType::FileTimeType => Some(8),
            BinXmlValueType::GuidType | BinXmlValueType::SysTimeType => Some(16),
            _ => None,
        }
    }
}

pub fn is_array_type(tag: u8) -> bool {
    (tag & ARRAY_FLAG) != 0
}

pub fn base_type(tag: u8) -> u8 {
    tag & !ARRAY_FLAG
}

/// Size in bytes of one element of an array type tag (or of the scalar itself).
///
/// Returns 0 for variable-length element types (strings, SIDs, binary blobs) and for unknown
/// tags, which cannot be sliced into elements.
pub fn array_element_size(tag: u8) -> usize {
    BinXmlValueType::from_u8(base_type(tag))
        .and_then(|t| t.fixed_size())
        .unwrap_or(0)
}

/// Human readable name of a value type tag, `Unknown(0xNN)` for unassigned tags.
pub fn value_type_name(tag: u8) -> Cow<'static, str> {
    match BinXmlValueType::from_u8(tag) {
        Some(t) => Cow::Borrowed(t.name()),
        None => Cow::Owned(format!("Unknown(0x{:02X})", tag)),
    }
}
