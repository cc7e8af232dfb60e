//! Local existence checks for relations and qualified columns.
//!
//! The synthesizer is instructed to refuse unknown identifiers, but the reply
//! is checked here as well so a hallucinated table never reaches the database.

use std::collections::HashSet;

use inventorydb_core::SchemaDescriptor;

use crate::lexer::{Token, tokenize};

/// Keywords whose parentheses may contain a non-relational `FROM`.
const FROM_FUNCTIONS: &[&str] = &["EXTRACT", "SUBSTRING", "TRIM", "OVERLAY", "POSITION"];

/// Words that end a table reference instead of aliasing it.
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "ON", "USING", "GROUP",
    "ORDER", "LIMIT", "OFFSET", "HAVING", "UNION", "EXCEPT", "INTERSECT", "WINDOW", "FETCH", "FOR",
    "TABLESAMPLE",
];

/// A relation named after `FROM` or `JOIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Dotted name as written, quotes removed.
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    fn last_segment(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Verify every `FROM`/`JOIN` relation and every `qualifier.column` reference.
///
/// Errors use the synthesizer's `ERROR:` format, naming the missing
/// identifier and listing what is available.
pub fn check_tables(sql: &str, schema: &SchemaDescriptor) -> std::result::Result<(), String> {
    let tokens = tokenize(sql);
    let ctes = cte_names(&tokens);
    let (refs, consumed) = table_refs(&tokens);

    for table in &refs {
        if resolve(schema, table).is_some() || ctes.contains(&table.last_segment().to_ascii_lowercase()) {
            continue;
        }
        return Err(format!(
            "ERROR: table '{}' not found. Available tables: {}",
            table.name,
            schema.table_names().join(", ")
        ));
    }

    check_qualified_columns(&tokens, &consumed, &refs, schema)
}

fn resolve<'a>(schema: &'a SchemaDescriptor, table: &TableRef) -> Option<&'a str> {
    schema
        .find_table(&table.name)
        .or_else(|| schema.find_table(table.last_segment()))
        .map(|(name, _)| name)
}

/// Names defined by `name AS (` or `name (cols) AS (`.
fn cte_names(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    for (idx, token) in tokens.iter().enumerate() {
        if !token.is_keyword("AS") || !matches!(tokens.get(idx + 1), Some(Token::LParen)) {
            continue;
        }
        let mut before = idx;
        if matches!(tokens.get(before.wrapping_sub(1)), Some(Token::RParen)) {
            let mut depth = 0usize;
            while before > 0 {
                before -= 1;
                match tokens[before] {
                    Token::RParen => depth += 1,
                    Token::LParen => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(name) = before.checked_sub(1).and_then(|i| tokens[i].ident()) {
            names.insert(name.to_ascii_lowercase());
        }
    }
    names
}

/// Collect relation references and the token positions their names occupy.
fn table_refs(tokens: &[Token]) -> (Vec<TableRef>, HashSet<usize>) {
    let mut refs = Vec::new();
    let mut consumed = HashSet::new();
    // One flag per open paren: true when it belongs to a FROM-taking function.
    let mut parens: Vec<bool> = Vec::new();
    let mut idx = 0;

    while idx < tokens.len() {
        match &tokens[idx] {
            Token::LParen => {
                let function_scope = idx
                    .checked_sub(1)
                    .map(|prev| FROM_FUNCTIONS.iter().any(|kw| tokens[prev].is_keyword(kw)))
                    .unwrap_or(false);
                parens.push(function_scope);
            }
            Token::RParen => {
                parens.pop();
            }
            token if token.is_keyword("FROM") || token.is_keyword("JOIN") => {
                let in_function = parens.last().copied().unwrap_or(false);
                let after_distinct = idx
                    .checked_sub(1)
                    .map(|prev| tokens[prev].is_keyword("DISTINCT"))
                    .unwrap_or(false);
                if !(token.is_keyword("FROM") && (in_function || after_distinct)) {
                    let allow_list = token.is_keyword("FROM");
                    idx = read_from_list(tokens, idx + 1, allow_list, &mut refs, &mut consumed);
                    continue;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    (refs, consumed)
}

/// Parse `name [AS] [alias] [, name ...]` starting at `idx`; returns the next index.
fn read_from_list(
    tokens: &[Token],
    mut idx: usize,
    allow_list: bool,
    refs: &mut Vec<TableRef>,
    consumed: &mut HashSet<usize>,
) -> usize {
    loop {
        if tokens.get(idx).is_some_and(|t| t.is_keyword("ONLY") || t.is_keyword("LATERAL")) {
            idx += 1;
        }

        let start = idx;
        let mut parts = Vec::new();
        while let Some(part) = tokens.get(idx).and_then(Token::ident) {
            parts.push(part.to_string());
            idx += 1;
            if tokens.get(idx).is_some_and(|t| t.is_symbol('.')) {
                idx += 1;
            } else {
                break;
            }
        }

        // Subqueries, set-returning functions and empty references are skipped.
        if parts.is_empty() || matches!(tokens.get(idx), Some(Token::LParen)) {
            return idx;
        }
        consumed.extend(start..idx);

        let mut alias = None;
        if tokens.get(idx).is_some_and(|t| t.is_keyword("AS")) {
            idx += 1;
        }
        if let Some(word) = tokens.get(idx).and_then(Token::ident) {
            let is_clause = matches!(tokens[idx], Token::Word(_))
                && CLAUSE_WORDS.iter().any(|kw| tokens[idx].is_keyword(kw));
            if !is_clause {
                alias = Some(word.to_string());
                consumed.insert(idx);
                idx += 1;
            }
        }

        refs.push(TableRef {
            name: parts.join("."),
            alias,
        });

        if allow_list && tokens.get(idx).is_some_and(|t| t.is_symbol(',')) {
            idx += 1;
            continue;
        }
        return idx;
    }
}

/// `qualifier.column` pairs whose qualifier names a known table must name a
/// real column of that table.
fn check_qualified_columns(
    tokens: &[Token],
    consumed: &HashSet<usize>,
    refs: &[TableRef],
    schema: &SchemaDescriptor,
) -> std::result::Result<(), String> {
    for idx in 0..tokens.len().saturating_sub(2) {
        if consumed.contains(&idx) || !tokens[idx + 1].is_symbol('.') {
            continue;
        }
        let (Some(qualifier), Some(column)) = (tokens[idx].ident(), tokens[idx + 2].ident()) else {
            continue;
        };
        let preceded_by_dot = idx > 0 && tokens[idx - 1].is_symbol('.');
        let followed_by_more = tokens
            .get(idx + 3)
            .is_some_and(|t| t.is_symbol('.') || matches!(t, Token::LParen));
        if preceded_by_dot || followed_by_more {
            continue;
        }

        let Some(table_ref) = refs.iter().find(|r| {
            r.alias
                .as_deref()
                .map(|alias| alias.eq_ignore_ascii_case(qualifier))
                .unwrap_or_else(|| r.last_segment().eq_ignore_ascii_case(qualifier))
        }) else {
            continue;
        };
        let Some(table_name) = resolve(schema, table_ref) else {
            continue;
        };
        let Some((_, table)) = schema.find_table(table_name) else {
            continue;
        };

        if !table.columns.keys().any(|col| col.eq_ignore_ascii_case(column)) {
            let available: Vec<&str> = table.columns.keys().map(String::as_str).collect();
            return Err(format!(
                "ERROR: column '{qualifier}.{column}' not found. Available columns in {table_name}: {}",
                available.join(", ")
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventorydb_core::fallback_schema;

    #[test]
    fn unknown_table_lists_alternatives() {
        let err = check_tables("SELECT * FROM nonexistent_table", &fallback_schema())
            .expect_err("unknown table");
        assert_eq!(
            err,
            "ERROR: table 'nonexistent_table' not found. Available tables: clients, orders, projects"
        );
    }

    #[test]
    fn joins_aliases_and_lists_resolve() {
        let schema = fallback_schema();
        let sql = "SELECT p.project_name, SUM(o.amount) AS total \
                   FROM clients c, projects p JOIN orders AS o ON p.project_id = o.project_id \
                   WHERE c.client_id = p.client_id \
                   GROUP BY p.project_name";
        assert_eq!(check_tables(sql, &schema), Ok(()));
    }

    #[test]
    fn join_against_unknown_table_is_caught() {
        let err = check_tables(
            "SELECT * FROM projects p LEFT JOIN invoices i ON i.project_id = p.project_id",
            &fallback_schema(),
        )
        .expect_err("invoices is unknown");
        assert!(err.starts_with("ERROR: table 'invoices' not found."));
    }

    #[test]
    fn non_relational_from_is_ignored() {
        let schema = fallback_schema();
        let sql = "SELECT EXTRACT(YEAR FROM start_date), TRIM(BOTH ' ' FROM project_name) \
                   FROM projects WHERE status IS DISTINCT FROM 'closed'";
        assert_eq!(check_tables(sql, &schema), Ok(()));
        assert_eq!(
            check_tables("SELECT * FROM generate_series(1, 3) AS g(n)", &schema),
            Ok(())
        );
    }

    #[test]
    fn ctes_and_subqueries_are_not_tables() {
        let schema = fallback_schema();
        let sql = "SELECT big.project_id FROM (SELECT project_id FROM projects WHERE budget > 10) big";
        assert_eq!(check_tables(sql, &schema), Ok(()));

        let cte = "WITH recent (id) AS (SELECT order_id FROM orders) SELECT * FROM recent";
        assert_eq!(check_tables(cte, &schema), Ok(()));
    }

    #[test]
    fn schema_qualified_names_fall_back_to_last_segment() {
        assert_eq!(
            check_tables("SELECT * FROM public.projects", &fallback_schema()),
            Ok(())
        );
    }

    #[test]
    fn qualified_unknown_column_is_reported() {
        let err = check_tables(
            "SELECT o.total_amount FROM orders o",
            &fallback_schema(),
        )
        .expect_err("no such column");
        assert!(err.starts_with("ERROR: column 'o.total_amount' not found. Available columns in orders:"));
        assert!(err.contains("amount"));
    }
}
