use std::borrow::Cow;

use zarrs::array::{DataType, FillValue, data_type};

use crate::{Error, Result};

/// Runtime tag for the fixed-size numeric data types this crate can copy and
/// transform.
///
/// Bridges a runtime [`DataType`] to the compile-time element types the
/// generic read/write/cast paths are instantiated for; see [`with_scalar!`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Identify the scalar type backing `data_type`.
    ///
    /// Non-numeric and variable-length data types are unsupported.
    pub fn from_data_type(data_type: &DataType) -> Result<Self> {
        let name = data_type.name_v3();
        match name.as_deref() {
            Some("int8") => Ok(Self::Int8),
            Some("int16") => Ok(Self::Int16),
            Some("int32") => Ok(Self::Int32),
            Some("int64") => Ok(Self::Int64),
            Some("uint8") => Ok(Self::UInt8),
            Some("uint16") => Ok(Self::UInt16),
            Some("uint32") => Ok(Self::UInt32),
            Some("uint64") => Ok(Self::UInt64),
            Some("float32") => Ok(Self::Float32),
            Some("float64") => Ok(Self::Float64),
            _ => Err(Error::UnsupportedDataType(
                name.map_or_else(|| "<unnamed>".to_string(), Cow::into_owned),
            )),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int8 => data_type::int8(),
            Self::Int16 => data_type::int16(),
            Self::Int32 => data_type::int32(),
            Self::Int64 => data_type::int64(),
            Self::UInt8 => data_type::uint8(),
            Self::UInt16 => data_type::uint16(),
            Self::UInt32 => data_type::uint32(),
            Self::UInt64 => data_type::uint64(),
            Self::Float32 => data_type::float32(),
            Self::Float64 => data_type::float64(),
        }
    }

    /// The numeric zero of this type, as a fill value.
    pub fn zero_fill(&self) -> FillValue {
        match self {
            Self::Int8 => FillValue::from(0i8),
            Self::Int16 => FillValue::from(0i16),
            Self::Int32 => FillValue::from(0i32),
            Self::Int64 => FillValue::from(0i64),
            Self::UInt8 => FillValue::from(0u8),
            Self::UInt16 => FillValue::from(0u16),
            Self::UInt32 => FillValue::from(0u32),
            Self::UInt64 => FillValue::from(0u64),
            Self::Float32 => FillValue::from(0f32),
            Self::Float64 => FillValue::from(0f64),
        }
    }
}

/// Expand `$body` with `$t` aliased to the concrete element type tagged by a
/// [`ScalarType`].
///
/// ```
/// use zarrs_rechunk::{ScalarType, with_scalar};
///
/// fn size_of(scalar: ScalarType) -> usize {
///     with_scalar!(scalar, T, { std::mem::size_of::<T>() })
/// }
/// assert_eq!(size_of(ScalarType::Float64), 8);
/// ```
#[macro_export]
macro_rules! with_scalar {
    ($scalar:expr, $t:ident, $body:block) => {
        match $scalar {
            $crate::ScalarType::Int8 => {
                type $t = i8;
                $body
            }
            $crate::ScalarType::Int16 => {
                type $t = i16;
                $body
            }
            $crate::ScalarType::Int32 => {
                type $t = i32;
                $body
            }
            $crate::ScalarType::Int64 => {
                type $t = i64;
                $body
            }
            $crate::ScalarType::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::ScalarType::UInt16 => {
                type $t = u16;
                $body
            }
            $crate::ScalarType::UInt32 => {
                type $t = u32;
                $body
            }
            $crate::ScalarType::UInt64 => {
                type $t = u64;
                $body
            }
            $crate::ScalarType::Float32 => {
                type $t = f32;
                $body
            }
            $crate::ScalarType::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}
