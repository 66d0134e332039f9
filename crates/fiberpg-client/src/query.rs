//! Statement requests.
//!
//! A [`Query`] bundles statement text, bound parameters and the decimal
//! policy for one execute call. Executing consumes the query, so a custom
//! decimal cast lives exactly as long as that call, on every exit path.

use fiberpg_types::{DecimalPolicy, HostValue, ParamBatch};

use crate::error::{Error, Result};

/// A statement to execute.
///
/// ```rust,ignore
/// let query = Query::new("SELECT * FROM users WHERE id = $1 AND active = $2")
///     .bind(42i64)
///     .bind(true)
///     .decimal_policy(DecimalPolicy::String);
/// ```
#[derive(Debug)]
pub struct Query {
    sql: String,
    params: Vec<HostValue>,
    policy: DecimalPolicy,
}

impl Query {
    /// Create a query with no parameters and the default decimal policy.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            policy: DecimalPolicy::default(),
        }
    }

    /// Create a query from a host value, which must be text.
    pub fn from_host(sql: &HostValue) -> Result<Self> {
        match sql {
            HostValue::Text(bytes) => std::str::from_utf8(bytes)
                .map(Self::new)
                .map_err(|_| Error::Usage("SQL text is not valid UTF-8".into())),
            other => Err(Error::Usage(format!(
                "SQL must be a string, got {}",
                other.type_name()
            ))),
        }
    }

    /// Bind the next parameter (`$1`, `$2`, ...).
    #[must_use]
    pub fn bind(mut self, value: impl Into<HostValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Replace all parameters.
    #[must_use]
    pub fn params(mut self, params: Vec<HostValue>) -> Self {
        self.params = params;
        self
    }

    /// Set how `numeric` columns are decoded.
    #[must_use]
    pub fn decimal_policy(mut self, policy: DecimalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the bound parameters.
    #[must_use]
    pub fn parameters(&self) -> &[HostValue] {
        &self.params
    }

    /// Check that the statement can be handed to the wire library.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.sql.contains('\0') {
            return Err(Error::Usage("SQL text contains a NUL byte".into()));
        }
        Ok(())
    }

    /// Encode the parameters, or `None` when there are none.
    pub(crate) fn encode_params(&self) -> Option<ParamBatch> {
        (!self.params.is_empty()).then(|| ParamBatch::build(&self.params))
    }

    pub(crate) fn into_parts(self) -> (String, Option<ParamBatch>, DecimalPolicy) {
        let batch = self.encode_params();
        (self.sql, batch, self.policy)
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}
