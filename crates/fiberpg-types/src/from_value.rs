//! Trait for converting decoded host values into Rust types.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::HostValue;

/// Trait for types that can be extracted from host values.
///
/// Used by typed row accessors on top of the decoded representation.
pub trait FromHostValue: Sized {
    /// Convert from a host value to this type.
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError>;

    /// Convert from an optional host value.
    ///
    /// Returns `None` if the value is absent or NULL.
    fn from_host_value_nullable(value: Option<&HostValue>) -> Result<Option<Self>, TypeError> {
        match value {
            None | Some(HostValue::Null) => Ok(None),
            Some(v) => Self::from_host_value(v).map(Some),
        }
    }
}

fn mismatch(expected: &'static str, value: &HostValue) -> TypeError {
    if value.is_null() {
        TypeError::UnexpectedNull
    } else {
        TypeError::TypeMismatch {
            expected,
            actual: value.type_name().to_string(),
        }
    }
}

impl FromHostValue for bool {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        match value {
            HostValue::Bool(v) => Ok(*v),
            _ => Err(mismatch("bool", value)),
        }
    }
}

impl FromHostValue for i64 {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        match value {
            HostValue::Int64(v) => Ok(*v),
            HostValue::UInt64(v) => {
                i64::try_from(*v).map_err(|_| TypeError::OutOfRange { target_type: "i64" })
            }
            HostValue::Number(v) if v.fract() == 0.0 && v.abs() <= 9_007_199_254_740_992.0 => {
                Ok(*v as i64)
            }
            HostValue::Number(_) => Err(TypeError::OutOfRange { target_type: "i64" }),
            _ => Err(mismatch("i64", value)),
        }
    }
}

impl FromHostValue for u64 {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        match value {
            HostValue::UInt64(v) => Ok(*v),
            HostValue::Int64(v) => {
                u64::try_from(*v).map_err(|_| TypeError::OutOfRange { target_type: "u64" })
            }
            _ => Err(mismatch("u64", value)),
        }
    }
}

impl FromHostValue for f64 {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromHostValue for String {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        match value {
            HostValue::Text(v) => String::from_utf8(v.to_vec())
                .map_err(|e| TypeError::InvalidEncoding(e.to_string())),
            HostValue::Other(v) => Ok(v.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromHostValue for Bytes {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        match value {
            HostValue::Text(v) => Ok(v.clone()),
            _ => Err(mismatch("Bytes", value)),
        }
    }
}

#[cfg(feature = "decimal")]
impl FromHostValue for rust_decimal::Decimal {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        match value {
            HostValue::Decimal(v) => Ok(*v),
            HostValue::Int64(v) => Ok(Self::from(*v)),
            HostValue::Text(v) => std::str::from_utf8(v)
                .map_err(|e| TypeError::InvalidEncoding(e.to_string()))?
                .parse()
                .map_err(|e: rust_decimal::Error| TypeError::InvalidNumber(e.to_string())),
            _ => Err(mismatch("Decimal", value)),
        }
    }
}

impl<T: FromHostValue> FromHostValue for Option<T> {
    fn from_host_value(value: &HostValue) -> Result<Self, TypeError> {
        T::from_host_value_nullable(Some(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_null_to_non_option_fails() {
        let result = i64::from_host_value(&HostValue::Null);
        assert!(matches!(result, Err(TypeError::UnexpectedNull)));
    }

    #[test]
    fn test_null_to_option() {
        assert_eq!(Option::<i64>::from_host_value(&HostValue::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_host_value_nullable(None).unwrap(),
            None
        );
    }

    #[test]
    fn test_integral_number_to_i64() {
        assert_eq!(i64::from_host_value(&HostValue::Number(42.0)).unwrap(), 42);
        assert!(matches!(
            i64::from_host_value(&HostValue::Number(1.5)),
            Err(TypeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_text_to_string() {
        assert_eq!(String::from_host_value(&HostValue::from("hi")).unwrap(), "hi");
        let bad = HostValue::text(Bytes::from_static(&[0xc3]));
        assert!(matches!(
            String::from_host_value(&bad),
            Err(TypeError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let err = bool::from_host_value(&HostValue::Number(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "type mismatch: expected bool, got number");
    }

    #[cfg(feature = "decimal")]
    #[test]
    fn test_text_to_decimal() {
        let d = rust_decimal::Decimal::from_host_value(&HostValue::from("10.50")).unwrap();
        assert_eq!(d.to_string(), "10.50");
    }
}
