//! Text-format decoding of column values into host values.
//!
//! Columns arrive as text plus a wire type tag. Small integers and
//! `numeric` go through a floating intermediate, `int8` is parsed exactly,
//! `bool` looks at the first byte, and anything else is handed back as raw
//! bytes. How `numeric` decodes is chosen per call by a [`DecimalPolicy`].

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::TypeError;
use crate::oid::{self, Oid};
use crate::value::HostValue;

/// Error returned by a custom decimal cast.
pub type CastError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied conversion for `numeric` columns.
///
/// Receives the raw text of one value. An `Err` omits that column from the
/// row; it never fails the query.
pub type DecimalCast = Box<dyn FnMut(&[u8]) -> Result<HostValue, CastError> + Send>;

/// How `numeric` columns are decoded for one execute call.
#[derive(Default)]
pub enum DecimalPolicy {
    /// Decode as a host number (may lose precision).
    #[default]
    Number,
    /// Decode as the raw text the server sent.
    String,
    /// Hand the raw text to a conversion function.
    Custom(DecimalCast),
}

impl DecimalPolicy {
    /// Create a custom policy from a conversion function.
    pub fn custom<F>(cast: F) -> Self
    where
        F: FnMut(&[u8]) -> Result<HostValue, CastError> + Send + 'static,
    {
        Self::Custom(Box::new(cast))
    }

    /// Custom policy decoding `numeric` into an exact [`rust_decimal::Decimal`].
    #[cfg(feature = "decimal")]
    #[must_use]
    pub fn decimal() -> Self {
        Self::custom(|raw| {
            let text = std::str::from_utf8(raw)?;
            let value: rust_decimal::Decimal = text.parse()?;
            Ok(HostValue::Decimal(value))
        })
    }

    /// Get the policy name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Number => "numeric",
            Self::String => "string",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for DecimalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => f.write_str("Number"),
            Self::String => f.write_str("String"),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl FromStr for DecimalPolicy {
    type Err = TypeError;

    /// Parse the policy names a host passes in. `custom` needs a function
    /// and cannot be built from a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numeric" | "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            other => Err(TypeError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Decode one column value.
///
/// `raw` is `None` for a wire NULL. Returns `None` when the column should be
/// left out of the row: for NULL, and when a custom cast fails.
pub fn decode_column(raw: Option<&[u8]>, oid: Oid, policy: &mut DecimalPolicy) -> Option<HostValue> {
    let raw = raw?;
    match oid {
        oid::INT2 | oid::INT4 => Some(decode_number(raw)),
        oid::NUMERIC => match policy {
            DecimalPolicy::Number => Some(decode_number(raw)),
            DecimalPolicy::String => Some(raw_text(raw)),
            DecimalPolicy::Custom(cast) => match cast(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(error = %e, "decimal cast failed, omitting column");
                    None
                }
            },
        },
        oid::INT8 => Some(decode_int8(raw)),
        oid::BOOL => Some(HostValue::Bool(matches!(raw.first(), Some(b't' | b'T')))),
        _ => Some(raw_text(raw)),
    }
}

/// Parse a numeral through a floating intermediate.
///
/// Accepts anything the server prints for `int2`, `int4` and `numeric`,
/// including `NaN` and the infinities. Unparseable text is kept as text.
pub fn parse_number(raw: &[u8]) -> Result<f64, TypeError> {
    let text = std::str::from_utf8(raw).map_err(|e| TypeError::InvalidEncoding(e.to_string()))?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| TypeError::InvalidNumber(text.to_string()))
}

/// Parse an `int8` value exactly.
pub fn parse_int8(raw: &[u8]) -> Result<i64, TypeError> {
    let text = std::str::from_utf8(raw).map_err(|e| TypeError::InvalidEncoding(e.to_string()))?;
    text.trim()
        .parse::<i64>()
        .map_err(|_| TypeError::InvalidNumber(text.to_string()))
}

fn decode_number(raw: &[u8]) -> HostValue {
    match parse_number(raw) {
        Ok(v) => HostValue::Number(v),
        Err(e) => {
            tracing::trace!(error = %e, "keeping unparseable number as text");
            raw_text(raw)
        }
    }
}

fn decode_int8(raw: &[u8]) -> HostValue {
    match parse_int8(raw) {
        Ok(v) => HostValue::Int64(v),
        Err(e) => {
            tracing::trace!(error = %e, "keeping unparseable int8 as text");
            raw_text(raw)
        }
    }
}

fn raw_text(raw: &[u8]) -> HostValue {
    HostValue::Text(Bytes::copy_from_slice(raw))
}
