//! PostgreSQL wire type tags.
//!
//! The server identifies every column and parameter type by an object id
//! from `pg_catalog.pg_type`. Only the handful of ids the codec treats
//! specially are named here; every other id passes through as text.

/// A wire type tag (`pg_type.oid`).
pub type Oid = u32;

/// Let the server infer the parameter type.
pub const UNTYPED: Oid = 0;
/// `bool`
pub const BOOL: Oid = 16;
/// `int8` / `bigint`
pub const INT8: Oid = 20;
/// `int2` / `smallint`
pub const INT2: Oid = 21;
/// `int4` / `integer`
pub const INT4: Oid = 23;
/// `text`
pub const TEXT: Oid = 25;
/// `numeric` / `decimal`
pub const NUMERIC: Oid = 1700;

/// Get the catalog name of a known type tag.
#[must_use]
pub fn type_name(oid: Oid) -> &'static str {
    match oid {
        UNTYPED => "unknown",
        BOOL => "bool",
        INT8 => "int8",
        INT2 => "int2",
        INT4 => "int4",
        TEXT => "text",
        NUMERIC => "numeric",
        _ => "other",
    }
}
