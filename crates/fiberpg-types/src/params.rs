//! Parameter batches for parameterized statements.
//!
//! The wire library takes parameters as three parallel arrays: values,
//! lengths and type tags. [`ParamBatch`] keeps all three in a single
//! allocation sized exactly for the call and exposes each as a view.

use bytes::Bytes;

use crate::encode::{Parameter, PgEncode};
use crate::oid::Oid;
use crate::value::HostValue;

/// An ordered batch of encoded parameters.
///
/// Entry `i` is bound to placeholder `$i+1`. Order is never changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBatch {
    params: Box<[Parameter]>,
}

impl ParamBatch {
    /// Encode a sequence of host values, left to right.
    #[must_use]
    pub fn build(values: &[HostValue]) -> Self {
        values.iter().map(PgEncode::encode).collect()
    }

    /// Get the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get the parameters as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Parameter] {
        &self.params
    }

    /// Get a parameter by position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    /// Iterate over the parameter values (`None` for NULL).
    pub fn values(&self) -> impl ExactSizeIterator<Item = Option<&Bytes>> + '_ {
        self.params.iter().map(|p| p.value.as_ref())
    }

    /// Iterate over the parameter byte lengths.
    pub fn lengths(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.params.iter().map(|p| p.length)
    }

    /// Iterate over the parameter type tags.
    pub fn types(&self) -> impl ExactSizeIterator<Item = Oid> + '_ {
        self.params.iter().map(|p| p.oid)
    }

    /// Iterate over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }
}

impl FromIterator<Parameter> for ParamBatch {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        // Collecting into a boxed slice trims to the exact length.
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Parameter>> for ParamBatch {
    fn from(params: Vec<Parameter>) -> Self {
        Self {
            params: params.into_boxed_slice(),
        }
    }
}

impl<'a> IntoIterator for &'a ParamBatch {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
