//! Text-format encoding of host values into bound parameters.
//!
//! Every parameter travels as text together with the wire type the server
//! should parse it as. Encoding is total: values with no dedicated mapping
//! fall back to `text`.

use bytes::Bytes;

use crate::oid::{self, Oid};
use crate::value::HostValue;

static PG_TRUE: &[u8] = b"t";
static PG_FALSE: &[u8] = b"f";

/// One bound parameter: text bytes (or NULL), byte length and wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Text-format value, `None` for NULL.
    pub value: Option<Bytes>,
    /// Byte length of `value` (0 for NULL).
    pub length: usize,
    /// Wire type tag the server should parse the value as.
    pub oid: Oid,
}

impl Parameter {
    /// The NULL parameter, typed as "let the server decide".
    #[must_use]
    pub fn null() -> Self {
        Self {
            value: None,
            length: 0,
            oid: oid::UNTYPED,
        }
    }

    /// Create a parameter from text bytes and a type tag.
    #[must_use]
    pub fn new(value: Bytes, oid: Oid) -> Self {
        Self {
            length: value.len(),
            value: Some(value),
            oid,
        }
    }

    /// Check if the parameter is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// Trait for values that can be bound as text-format parameters.
pub trait PgEncode {
    /// Encode this value as a parameter.
    fn encode(&self) -> Parameter;

    /// Get the wire type tag this value is bound with.
    fn type_oid(&self) -> Oid;
}

impl PgEncode for HostValue {
    fn encode(&self) -> Parameter {
        match self {
            HostValue::Null => Parameter::null(),
            HostValue::Bool(v) => {
                let text = if *v { PG_TRUE } else { PG_FALSE };
                Parameter::new(Bytes::from_static(text), oid::BOOL)
            }
            HostValue::Number(v) => Parameter::new(format_number(*v).into(), oid::NUMERIC),
            HostValue::Int64(v) => Parameter::new(v.to_string().into(), oid::INT8),
            HostValue::UInt64(v) => Parameter::new(v.to_string().into(), oid::NUMERIC),
            HostValue::Text(v) => Parameter::new(v.clone(), oid::TEXT),
            #[cfg(feature = "decimal")]
            HostValue::Decimal(v) => Parameter::new(v.to_string().into(), oid::NUMERIC),
            HostValue::Other(v) => Parameter::new(Bytes::copy_from_slice(v.as_bytes()), oid::TEXT),
        }
    }

    fn type_oid(&self) -> Oid {
        match self {
            HostValue::Null => oid::UNTYPED,
            HostValue::Bool(_) => oid::BOOL,
            HostValue::Number(_) | HostValue::UInt64(_) => oid::NUMERIC,
            HostValue::Int64(_) => oid::INT8,
            #[cfg(feature = "decimal")]
            HostValue::Decimal(_) => oid::NUMERIC,
            HostValue::Text(_) | HostValue::Other(_) => oid::TEXT,
        }
    }
}

/// Encode one host value as a parameter.
#[must_use]
pub fn encode_parameter(value: &HostValue) -> Parameter {
    value.encode()
}

/// Render a host number the way `numeric` input accepts it.
///
/// Integral values print without a fractional part; infinities use the
/// spelling the server understands.
fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        v.to_string()
    }
}
