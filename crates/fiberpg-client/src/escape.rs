//! Literal and identifier quoting.
//!
//! Escaping goes through the wire library because the rules depend on the
//! connection's encoding and `standard_conforming_strings` setting.

use bytes::Bytes;

use crate::connection::Connection;
use crate::driver::WireConnection;
use crate::error::{Error, Result};

impl<C: WireConnection> Connection<C> {
    /// Quote `text` as a string literal, quotes included.
    ///
    /// ```rust,ignore
    /// assert_eq!(conn.quote_literal("O'Brien")?, "'O''Brien'");
    /// ```
    pub fn quote_literal(&self, text: impl AsRef<[u8]>) -> Result<Bytes> {
        self.with_handle(|conn| conn.escape_literal(text.as_ref()))?
            .ok_or_else(allocation_failure)
    }

    /// Quote `text` as an identifier, quotes included.
    pub fn quote_identifier(&self, text: impl AsRef<[u8]>) -> Result<Bytes> {
        self.with_handle(|conn| conn.escape_identifier(text.as_ref()))?
            .ok_or_else(allocation_failure)
    }
}

fn allocation_failure() -> Error {
    tracing::debug!("wire library failed to escape text");
    Error::Allocation("can't allocate memory".into())
}
