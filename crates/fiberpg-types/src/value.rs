//! Host value representation.

use std::fmt;

use bytes::Bytes;

/// A dynamically typed value as seen by the host runtime.
///
/// This is the closed set of shapes the codec understands. Parameters are
/// built from it and decoded columns are turned back into it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    /// Absent value (SQL NULL).
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Host number (double precision float).
    Number(f64),
    /// Signed 64-bit integer, kept apart from [`HostValue::Number`] to
    /// preserve precision.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Text as raw bytes. No UTF-8 validation is imposed.
    Text(Bytes),
    /// Exact decimal value.
    #[cfg(feature = "decimal")]
    Decimal(rust_decimal::Decimal),
    /// Any other host object, carried as its text rendering.
    Other(String),
}

impl HostValue {
    /// Create a text value from anything byte-like.
    pub fn text(v: impl Into<Bytes>) -> Self {
        Self::Text(v.into())
    }

    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is numeric.
    ///
    /// Wide integers are converted and may lose precision.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Int64(v) => Some(*v as f64),
            Self::UInt64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as an i64, if it is an exact integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get the raw bytes of a text value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is valid UTF-8 text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => std::str::from_utf8(v).ok(),
            Self::Other(v) => Some(v),
            _ => None,
        }
    }

    /// Get the host type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Int64(_) => "int64",
            Self::UInt64(_) => "uint64",
            Self::Text(_) => "string",
            #[cfg(feature = "decimal")]
            Self::Decimal(_) => "decimal",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(&String::from_utf8_lossy(v)),
            #[cfg(feature = "decimal")]
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Other(v) => f.write_str(v),
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for HostValue {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        Self::Text(Bytes::from(v))
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        Self::Text(Bytes::copy_from_slice(v.as_bytes()))
    }
}

impl From<Bytes> for HostValue {
    fn from(v: Bytes) -> Self {
        Self::Text(v)
    }
}

impl<T> From<Option<T>> for HostValue
where
    T: Into<HostValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(feature = "decimal")]
impl From<rust_decimal::Decimal> for HostValue {
    fn from(v: rust_decimal::Decimal) -> Self {
        Self::Decimal(v)
    }
}
