//! # fiberpg-types
//!
//! Host value model and PostgreSQL text-format value codec.
//!
//! This crate provides bidirectional marshaling between a dynamically typed
//! host value and the server's text wire representation. It does no I/O and
//! keeps no state.
//!
//! ## Features
//!
//! - `decimal` (default): exact `numeric` support via rust_decimal
//!
//! ## Parameter Encoding
//!
//! | Host value | Wire text | Wire type |
//! |------------|-----------|-----------|
//! | `Null` | NULL | unknown (0) |
//! | `Bool` | `t` / `f` | `bool` |
//! | `Number` | digits | `numeric` |
//! | `Int64` | digits | `int8` |
//! | `UInt64` | digits | `numeric` |
//! | `Decimal` | digits | `numeric` |
//! | `Text` / `Other` | as-is | `text` |
//!
//! ## Column Decoding
//!
//! | Wire type | Host value |
//! |-----------|------------|
//! | `int2`, `int4` | `Number` |
//! | `numeric` | per [`DecimalPolicy`] |
//! | `int8` | `Int64` (exact) |
//! | `bool` | `Bool` (`t`/`T` is true) |
//! | anything else | `Text` (raw bytes) |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decode;
pub mod encode;
pub mod error;
pub mod from_value;
pub mod oid;
pub mod params;
pub mod value;

pub use decode::{decode_column, CastError, DecimalCast, DecimalPolicy};
pub use encode::{encode_parameter, Parameter, PgEncode};
pub use error::TypeError;
pub use from_value::FromHostValue;
pub use oid::Oid;
pub use params::ParamBatch;
pub use value::HostValue;
