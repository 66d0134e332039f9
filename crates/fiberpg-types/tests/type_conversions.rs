//! Value codec edge case and property tests.
//!
//! Tests edge cases for:
//! - NULL handling through encode and decode
//! - Boolean and numeric round trips through the text wire format
//! - 64-bit integer precision
//! - Parameter batch ordering

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::approx_constant)]

use bytes::Bytes;
use fiberpg_types::{
    decode_column, encode_parameter, oid, DecimalPolicy, HostValue, ParamBatch, Parameter,
};
use proptest::prelude::*;

// ============================================================================
// NULL Handling
// ============================================================================

mod null_handling {
    use super::*;

    #[test]
    fn test_null_parameter_triple() {
        let p = encode_parameter(&HostValue::Null);
        assert!(p.is_null());
        assert_eq!(p.length, 0);
        assert_eq!(p.oid, oid::UNTYPED);
    }

    #[test]
    fn test_null_column_is_absent_for_every_policy() {
        for oid in [oid::BOOL, oid::INT2, oid::INT4, oid::INT8, oid::NUMERIC, oid::TEXT, 1082] {
            assert_eq!(decode_column(None, oid, &mut DecimalPolicy::Number), None);
            assert_eq!(decode_column(None, oid, &mut DecimalPolicy::String), None);
            let mut custom = DecimalPolicy::custom(|_| Ok(HostValue::Bool(true)));
            assert_eq!(decode_column(None, oid, &mut custom), None);
        }
    }
}

// ============================================================================
// Round Trips Through Text
// ============================================================================

mod round_trips {
    use super::*;

    fn wire_bytes(p: &Parameter) -> &[u8] {
        p.value.as_deref().expect("non-null parameter")
    }

    #[test]
    fn test_bool_round_trip() {
        for b in [true, false] {
            let p = encode_parameter(&HostValue::Bool(b));
            let back = decode_column(Some(wire_bytes(&p)), oid::BOOL, &mut DecimalPolicy::Number);
            assert_eq!(back, Some(HostValue::Bool(b)));
        }
    }

    #[test]
    fn test_int8_max_is_exact() {
        let back = decode_column(
            Some(&b"9223372036854775807"[..]),
            oid::INT8,
            &mut DecimalPolicy::Number,
        );
        assert_eq!(back, Some(HostValue::Int64(9_223_372_036_854_775_807)));
    }

    #[test]
    fn test_numeric_string_policy_preserves_precision() {
        let raw: &'static [u8] = b"3.14159265358979323846264338327950288";
        let back = decode_column(Some(raw), oid::NUMERIC, &mut DecimalPolicy::String);
        assert_eq!(back, Some(HostValue::Text(Bytes::from_static(raw))));
    }

    proptest! {
        #[test]
        fn prop_number_round_trip(v in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let p = encode_parameter(&HostValue::Number(v));
            prop_assert_eq!(p.oid, oid::NUMERIC);
            let back = decode_column(Some(wire_bytes(&p)), oid::NUMERIC, &mut DecimalPolicy::Number);
            match back {
                Some(HostValue::Number(d)) => prop_assert!((d - v).abs() <= f64::EPSILON * v.abs()),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn prop_int64_round_trip(v in any::<i64>()) {
            let p = encode_parameter(&HostValue::Int64(v));
            prop_assert_eq!(p.oid, oid::INT8);
            let back = decode_column(Some(wire_bytes(&p)), oid::INT8, &mut DecimalPolicy::Number);
            prop_assert_eq!(back, Some(HostValue::Int64(v)));
        }

        #[test]
        fn prop_digit_string_as_numeric(v in -1_000_000i64..1_000_000i64) {
            let text = v.to_string();
            let back = decode_column(Some(text.as_bytes()), oid::NUMERIC, &mut DecimalPolicy::Number);
            prop_assert_eq!(back, Some(HostValue::Number(v as f64)));
        }

        #[test]
        fn prop_unknown_types_pass_bytes_through(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let back = decode_column(Some(raw.as_slice()), 17, &mut DecimalPolicy::Number);
            prop_assert_eq!(back, Some(HostValue::Text(Bytes::from(raw.clone()))));
        }

        #[test]
        fn prop_text_parameter_length_matches(s in ".*") {
            let p = encode_parameter(&HostValue::from(s.as_str()));
            prop_assert_eq!(p.length, s.len());
            prop_assert_eq!(p.oid, oid::TEXT);
        }
    }
}

// ============================================================================
// Parameter Batches
// ============================================================================

mod batches {
    use super::*;

    fn host_value() -> impl Strategy<Value = HostValue> {
        prop_oneof![
            Just(HostValue::Null),
            any::<bool>().prop_map(HostValue::Bool),
            (-1e9f64..1e9f64).prop_map(HostValue::Number),
            any::<i64>().prop_map(HostValue::Int64),
            any::<u64>().prop_map(HostValue::UInt64),
            "[a-z]{0,12}".prop_map(|s| HostValue::from(s.as_str())),
        ]
    }

    proptest! {
        #[test]
        fn prop_build_preserves_order(values in proptest::collection::vec(host_value(), 0..32)) {
            let batch = ParamBatch::build(&values);
            prop_assert_eq!(batch.len(), values.len());
            for (i, v) in values.iter().enumerate() {
                prop_assert_eq!(batch.get(i), Some(&encode_parameter(v)));
            }
        }
    }

    #[test]
    fn test_custom_failure_only_affects_numeric() {
        let mut policy = DecimalPolicy::custom(|raw| {
            if raw == b"bad" {
                Err("rejected".into())
            } else {
                Ok(HostValue::from("ok"))
            }
        });
        assert_eq!(decode_column(Some(&b"bad"[..]), oid::NUMERIC, &mut policy), None);
        assert_eq!(
            decode_column(Some(&b"1"[..]), oid::NUMERIC, &mut policy),
            Some(HostValue::from("ok"))
        );
        assert_eq!(
            decode_column(Some(&b"bad"[..]), oid::TEXT, &mut policy),
            Some(HostValue::from("bad"))
        );
    }
}
