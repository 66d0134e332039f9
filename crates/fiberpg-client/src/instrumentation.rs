//! Tracing instrumentation for database operations.
//!
//! Connect, execute and close run inside `tracing` spans whose names and
//! fields follow the OpenTelemetry database conventions, so any subscriber
//! that exports spans (an OTLP layer included) picks them up unchanged.
//!
//! ## Semantic Conventions
//!
//! - `db.system`: "postgresql"
//! - `db.statement`: SQL statement (sanitized if configured)
//! - `db.operation`: Statement type (SELECT, INSERT, etc.)
//! - `db.rows_affected`: Rows reported by the final command
//!
//! Server notices are logged at `info` level under the
//! [`NOTICE_TARGET`] target.

/// Database system identifier.
pub const DB_SYSTEM: &str = "postgresql";

/// Log target for server notices.
pub const NOTICE_TARGET: &str = "fiberpg::notice";

/// Span names.
pub mod span_names {
    /// Connection establishment span.
    pub const CONNECT: &str = "fiberpg.connect";
    /// Statement execution span.
    pub const EXECUTE: &str = "fiberpg.execute";
    /// Connection close span.
    pub const CLOSE: &str = "fiberpg.close";
}

/// Span fields recorded after the span is opened.
pub mod attributes {
    /// Affected row count.
    pub const DB_ROWS_AFFECTED: &str = "db.rows_affected";
    /// Socket descriptor of the connection.
    pub const DB_CONNECTION_FD: &str = "db.connection.fd";
}

/// Configuration for SQL statement sanitization.
#[derive(Debug, Clone)]
pub struct SanitizationConfig {
    /// Whether to sanitize SQL statements.
    pub enabled: bool,
    /// Maximum length of statement to record.
    pub max_length: usize,
    /// Placeholder to use for sanitized values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Create a configuration that doesn't sanitize statements.
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Sanitize a SQL statement according to the configuration.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate_string(sql, self.max_length);
        }

        let sanitized = sanitize_sql(sql, &self.placeholder);
        truncate_string(&sanitized, self.max_length)
    }
}

/// Replace string and numeric literals with a placeholder.
///
/// Double-quoted text is an identifier and is kept. Bind placeholders
/// (`$1`) are kept; dollar-quoted bodies (`$$...$$`, `$tag$...$tag$`) are
/// replaced.
fn sanitize_sql(sql: &str, placeholder: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '\'' => {
                // '' inside a literal is an escaped quote
                loop {
                    match chars.next() {
                        Some((_, '\'')) => {
                            if chars.next_if(|(_, ch)| *ch == '\'').is_none() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                result.push_str(placeholder);
            }
            '"' => {
                result.push(c);
                for (_, ch) in chars.by_ref() {
                    result.push(ch);
                    if ch == '"' {
                        break;
                    }
                }
            }
            '$' if chars.peek().is_some_and(|(_, ch)| ch.is_ascii_digit()) => {
                result.push(c);
                while let Some((_, ch)) = chars.next_if(|(_, ch)| ch.is_ascii_digit()) {
                    result.push(ch);
                }
            }
            '$' => match dollar_tag(&sql[pos..]) {
                Some(tag) => {
                    let body_start = pos + tag.len();
                    let end = sql[body_start..]
                        .find(tag)
                        .map_or(sql.len(), |i| body_start + i + tag.len());
                    while chars.next_if(|(i, _)| *i < end).is_some() {}
                    result.push_str(placeholder);
                }
                None => result.push(c),
            },
            c if c.is_ascii_digit()
                && !result.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_') =>
            {
                while chars
                    .next_if(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
                    .is_some()
                {}
                result.push_str(placeholder);
            }
            c => result.push(c),
        }
    }

    result
}

/// Get the opening tag of a dollar-quoted string at the start of `s`.
fn dollar_tag(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('$')?;
    let len = rest
        .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .unwrap_or(rest.len());
    if rest[len..].starts_with('$') {
        Some(&s[..len + 2])
    } else {
        None
    }
}

/// Truncate a string to a maximum length, on a character boundary.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len.saturating_sub(3);
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

/// Extract the operation type from a SQL statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let word = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();

    match word.as_str() {
        "SELECT" | "VALUES" | "TABLE" => "SELECT",
        "INSERT" => "INSERT",
        "UPDATE" => "UPDATE",
        "DELETE" => "DELETE",
        "WITH" => "WITH",
        "BEGIN" | "START" => "BEGIN",
        "COMMIT" | "END" => "COMMIT",
        "ROLLBACK" | "ABORT" => "ROLLBACK",
        "CREATE" => "CREATE",
        "ALTER" => "ALTER",
        "DROP" => "DROP",
        "COPY" => "COPY",
        "CALL" | "DO" => "CALL",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("SELECT * FROM users"), "SELECT");
        assert_eq!(extract_operation("  select id from users"), "SELECT");
        assert_eq!(extract_operation("INSERT INTO users VALUES (1)"), "INSERT");
        assert_eq!(extract_operation("UPDATE users SET name = 'foo'"), "UPDATE");
        assert_eq!(extract_operation("DELETE FROM users"), "DELETE");
        assert_eq!(extract_operation("with x as (select 1) select * from x"), "WITH");
        assert_eq!(extract_operation("BEGIN"), "BEGIN");
        assert_eq!(extract_operation("START TRANSACTION"), "BEGIN");
        assert_eq!(extract_operation("COMMIT"), "COMMIT");
        assert_eq!(extract_operation("ROLLBACK"), "ROLLBACK");
        assert_eq!(extract_operation("CREATE TABLE foo"), "CREATE");
        assert_eq!(extract_operation("COPY t FROM STDIN"), "COPY");
        assert_eq!(extract_operation("unknown stuff"), "OTHER");
        assert_eq!(extract_operation(""), "OTHER");
    }

    #[test]
    fn test_sanitize_sql() {
        let placeholder = "?";

        assert_eq!(
            sanitize_sql("SELECT * FROM users WHERE name = 'Alice'", placeholder),
            "SELECT * FROM users WHERE name = ?"
        );
        assert_eq!(
            sanitize_sql("INSERT INTO t VALUES ('a', 'b')", placeholder),
            "INSERT INTO t VALUES (?, ?)"
        );
        assert_eq!(
            sanitize_sql("SELECT * WHERE name = 'O''Brien'", placeholder),
            "SELECT * WHERE name = ?"
        );
        assert_eq!(
            sanitize_sql("SELECT * WHERE id = 42 AND name = 'test'", placeholder),
            "SELECT * WHERE id = ? AND name = ?"
        );
    }

    #[test]
    fn test_sanitize_keeps_identifiers_and_binds() {
        assert_eq!(
            sanitize_sql(r#"SELECT "col1" FROM t2 WHERE a = $1 AND b = $12"#, "?"),
            r#"SELECT "col1" FROM t2 WHERE a = $1 AND b = $12"#
        );
    }

    #[test]
    fn test_sanitize_dollar_quoted() {
        assert_eq!(
            sanitize_sql("SELECT $$it's 5$$, $fn$body$fn$ || 'x'", "?"),
            "SELECT ?, ? || ?"
        );
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hi", 2), "hi");
        // Never splits a multi-byte character.
        assert_eq!(truncate_string("ééééé", 6), "é...");
    }

    #[test]
    fn test_sanitization_config_default() {
        let config = SanitizationConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_length, 2048);
        assert_eq!(config.placeholder, "?");
    }

    #[test]
    fn test_sanitization_config_no_sanitization() {
        let config = SanitizationConfig::no_sanitization();
        assert!(!config.enabled);

        let sql = "SELECT * FROM users WHERE name = 'Alice'";
        assert_eq!(config.sanitize(sql), sql);
    }
}
