//! Decoded statement results.
//!
//! A statement produces zero or more [`ResultSet`]s, one per row-returning
//! result, numbered from 1 in arrival order. A [`Row`] maps column names to
//! decoded values; NULL columns are absent from the row, never stored as an
//! explicit null.

use std::sync::Arc;

use fiberpg_types::{FromHostValue, HostValue, TypeError};

/// Affected-row count and command tag reported with a result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandStatus {
    /// Rows affected or returned. `0` when the server reports none.
    pub rows_affected: u64,
    /// Command tag, e.g. `INSERT 0 3` or `SELECT 2`.
    pub message: String,
}

impl CommandStatus {
    /// Build from the wire library's textual fields.
    ///
    /// An empty affected-row text (DDL, utility statements) counts as `0`.
    #[must_use]
    pub fn from_wire(cmd_tuples: &str, cmd_status: &str) -> Self {
        let rows_affected = match cmd_tuples.trim() {
            "" => 0,
            text => text.parse().unwrap_or_else(|_| {
                tracing::trace!(cmd_tuples = text, "unparseable affected-row count");
                0
            }),
        };
        Self {
            rows_affected,
            message: cmd_status.to_string(),
        }
    }
}

/// One decoded row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<(Arc<str>, HostValue)>,
}

impl Row {
    /// Create an empty row with room for `capacity` columns.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Set a column value. A repeated column name replaces the earlier value.
    pub fn insert(&mut self, name: Arc<str>, value: HostValue) {
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Append a column value. The caller guarantees `name` is not present.
    pub(crate) fn push(&mut self, name: Arc<str>, value: HostValue) {
        self.values.push((name, value));
    }

    /// Get a column value by name. `None` for NULL or unknown columns.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<&HostValue> {
        self.values
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Get a column value converted to `T`.
    ///
    /// Absent columns convert as NULL, so `Option<T>` reads them as `None`.
    pub fn get<T: FromHostValue>(&self, name: &str) -> Result<T, TypeError> {
        T::from_host_value(self.get_raw(name).unwrap_or(&HostValue::Null))
    }

    /// Get a column value converted to `T`, or `None` on any failure.
    #[must_use]
    pub fn try_get<T: FromHostValue>(&self, name: &str) -> Option<T> {
        self.get(name).ok()
    }

    /// Check if a non-NULL value is present for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get_raw(name).is_some()
    }

    /// Get the number of non-NULL columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if every column was NULL.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.values.iter().map(|(n, v)| (n.as_ref(), v))
    }

    /// Get the names of the non-NULL columns.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_ref())
    }
}

/// Rows from one row-returning result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    index: usize,
    rows: Vec<Row>,
    status: CommandStatus,
}

impl ResultSet {
    /// Create a result set.
    #[must_use]
    pub fn new(index: usize, rows: Vec<Row>, status: CommandStatus) -> Self {
        Self {
            index,
            rows,
            status,
        }
    }

    /// Get the 1-based position of this set within the statement output.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Take the rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Get the status reported with the rows.
    #[must_use]
    pub fn status(&self) -> &CommandStatus {
        &self.status
    }

    /// Get the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the set has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Everything a successful execute call produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOutput {
    result_sets: Vec<ResultSet>,
    command: Option<CommandStatus>,
}

impl QueryOutput {
    /// Create an output.
    #[must_use]
    pub fn new(result_sets: Vec<ResultSet>, command: Option<CommandStatus>) -> Self {
        Self {
            result_sets,
            command,
        }
    }

    /// Get the result sets in arrival order.
    #[must_use]
    pub fn result_sets(&self) -> &[ResultSet] {
        &self.result_sets
    }

    /// Take the result sets.
    #[must_use]
    pub fn into_result_sets(self) -> Vec<ResultSet> {
        self.result_sets
    }

    /// Get a result set by its 1-based index.
    #[must_use]
    pub fn result_set(&self, index: usize) -> Option<&ResultSet> {
        index
            .checked_sub(1)
            .and_then(|i| self.result_sets.get(i))
    }

    /// Get the rows of the first result set; empty if there is none.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        self.result_sets.first().map_or(&[][..], ResultSet::rows)
    }

    /// Get the status of the command that ended the statement, if any.
    #[must_use]
    pub fn command(&self) -> Option<&CommandStatus> {
        self.command.as_ref()
    }

    /// Get the affected-row count of the final command, or of the last
    /// result set when no command ran.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.command
            .as_ref()
            .or_else(|| self.result_sets.last().map(ResultSet::status))
            .map_or(0, |s| s.rows_affected)
    }
}
