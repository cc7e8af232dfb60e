//! Read-only contract enforcement.
//!
//! A deliberately blunt textual filter: the candidate must start with
//! `SELECT` and must not contain any deny-listed keyword anywhere, including
//! inside string literals and identifiers. False rejections are accepted.

use serde::{Deserialize, Serialize};

/// Statement keywords that reject a candidate wherever they appear.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "EXECUTE", "EXEC",
];

const NOT_SELECT_REASON: &str =
    "Generated query is not a SELECT statement. This system only supports read-only queries.";

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub ok: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn pass() -> Self {
        Self { ok: true, reason: None }
    }

    fn reject(reason: String) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }

    pub fn into_result(self) -> std::result::Result<(), String> {
        match self.reason {
            Some(reason) if !self.ok => Err(reason),
            _ => Ok(()),
        }
    }
}

/// Check a candidate statement without touching the network.
///
/// Deny-listed keywords are reported before the `SELECT` prefix so that a
/// mutation like `DELETE FROM t` is rejected with the keyword named.
pub fn validate(sql: &str) -> SafetyVerdict {
    let normalized = sql.trim().to_uppercase();

    if let Some(keyword) = FORBIDDEN_KEYWORDS
        .iter()
        .find(|keyword| normalized.contains(*keyword))
    {
        return SafetyVerdict::reject(format!(
            "Query contains forbidden keyword '{keyword}'. Only SELECT queries are allowed."
        ));
    }

    if !normalized.starts_with("SELECT") {
        return SafetyVerdict::reject(NOT_SELECT_REASON.to_string());
    }

    SafetyVerdict::pass()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_select_with_leading_whitespace() {
        assert!(validate("\n   select * from projects").ok);
    }

    #[test]
    fn delete_names_the_keyword() {
        let verdict = validate("DELETE FROM projects");
        assert!(!verdict.ok);
        assert_eq!(
            verdict.reason.as_deref(),
            Some("Query contains forbidden keyword 'DELETE'. Only SELECT queries are allowed.")
        );
    }

    #[test]
    fn rejects_non_select_without_keywords() {
        let verdict = validate("WITH x AS (SELECT 1) SELECT * FROM x");
        assert_eq!(verdict.reason.as_deref(), Some(NOT_SELECT_REASON));
        assert!(!validate("").ok);
        assert!(!validate("EXPLAIN SELECT 1").ok);
    }

    #[test]
    fn fails_closed_on_keywords_inside_literals_and_identifiers() {
        assert!(!validate("SELECT * FROM projects WHERE status = 'dropped'").ok);
        assert!(!validate("SELECT created_at FROM orders").ok);
        assert!(!validate("SELECT 1; drop table projects").ok);
    }

    #[test]
    fn every_keyword_is_rejected_in_any_case() {
        for keyword in FORBIDDEN_KEYWORDS {
            let sql = format!("SELECT 1 FROM t WHERE x = '{}'", keyword.to_lowercase());
            assert!(!validate(&sql).ok, "{keyword} should be rejected");
        }
    }

    #[test]
    fn execute_is_reported_before_exec() {
        let reason = validate("SELECT 1 EXECUTE").into_result().expect_err("rejected");
        assert!(reason.contains("'EXECUTE'"));
    }
}
