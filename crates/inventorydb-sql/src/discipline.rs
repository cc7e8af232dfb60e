//! Statement-shape rules the database would otherwise reject at run time.

use std::collections::HashSet;

use inventorydb_core::SchemaDescriptor;

use crate::lexer::{Token, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Projection,
    From,
    Where,
    GroupBy,
    Having,
    Other,
}

impl Clause {
    fn label(self) -> &'static str {
        match self {
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::Having => "HAVING",
            _ => "",
        }
    }

    fn forbids_aliases(self) -> bool {
        matches!(self, Clause::Where | Clause::GroupBy | Clause::Having)
    }
}

/// Enforce a single statement and no projection alias reuse in
/// `WHERE`, `GROUP BY` or `HAVING`.
///
/// An alias that is also a real column name is allowed, since the bare name
/// then resolves to the column.
pub fn check(sql: &str, schema: &SchemaDescriptor) -> std::result::Result<(), String> {
    let tokens = tokenize(sql);
    check_single_statement(&tokens)?;
    check_alias_usage(&tokens, schema)
}

fn check_single_statement(tokens: &[Token]) -> std::result::Result<(), String> {
    let first_semicolon = tokens.iter().position(|t| t.is_symbol(';'));
    if let Some(pos) = first_semicolon {
        if tokens[pos..].iter().any(|t| !t.is_symbol(';')) {
            return Err("Only a single SQL statement is allowed.".to_string());
        }
    }
    Ok(())
}

fn check_alias_usage(tokens: &[Token], schema: &SchemaDescriptor) -> std::result::Result<(), String> {
    let mut aliases: HashSet<String> = HashSet::new();
    let mut clause = Clause::Other;
    let mut depth = 0usize;

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => {
                depth += 1;
                continue;
            }
            Token::RParen => {
                depth = depth.saturating_sub(1);
                continue;
            }
            _ => {}
        }

        if depth == 0 {
            if let Some(next) = clause_transition(tokens, idx) {
                clause = next;
                continue;
            }
        }

        if clause == Clause::Projection && depth == 0 && token.is_keyword("AS") {
            if let Some(alias) = tokens.get(idx + 1).and_then(Token::ident) {
                aliases.insert(alias.to_ascii_lowercase());
            }
            continue;
        }

        if !clause.forbids_aliases() {
            continue;
        }
        let Some(name) = token.ident() else {
            continue;
        };
        let lowered = name.to_ascii_lowercase();
        if !aliases.contains(&lowered) || schema.has_column(name) {
            continue;
        }
        let qualified = idx > 0 && tokens[idx - 1].is_symbol('.');
        let qualifies = tokens
            .get(idx + 1)
            .is_some_and(|t| t.is_symbol('.') || matches!(t, Token::LParen));
        if qualified || qualifies {
            continue;
        }
        return Err(format!(
            "Column alias '{name}' cannot be used in {}. Repeat the underlying expression instead.",
            clause.label()
        ));
    }

    Ok(())
}

/// Clause entered at a top-level keyword, if any.
fn clause_transition(tokens: &[Token], idx: usize) -> Option<Clause> {
    let token = &tokens[idx];
    if token.is_keyword("SELECT") {
        return Some(Clause::Projection);
    }
    if token.is_keyword("FROM") {
        return Some(Clause::From);
    }
    if token.is_keyword("WHERE") {
        return Some(Clause::Where);
    }
    if token.is_keyword("HAVING") {
        return Some(Clause::Having);
    }
    let next_is_by = tokens.get(idx + 1).is_some_and(|t| t.is_keyword("BY"));
    if token.is_keyword("GROUP") && next_is_by {
        return Some(Clause::GroupBy);
    }
    if token.is_keyword("BY") && idx > 0 && tokens[idx - 1].is_keyword("GROUP") {
        return Some(Clause::GroupBy);
    }
    let closes = ["ORDER", "LIMIT", "OFFSET", "UNION", "EXCEPT", "INTERSECT", "WINDOW", "FETCH", "FOR"];
    closes
        .iter()
        .any(|kw| token.is_keyword(kw))
        .then_some(Clause::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventorydb_core::fallback_schema;

    #[test]
    fn alias_in_having_is_rejected() {
        let sql = "SELECT p.project_id, SUM(o.amount) AS total_amount \
                   FROM projects p JOIN orders o ON p.project_id = o.project_id \
                   GROUP BY p.project_id HAVING total_amount > 1000";
        let err = check(sql, &fallback_schema()).expect_err("alias reuse");
        assert_eq!(
            err,
            "Column alias 'total_amount' cannot be used in HAVING. Repeat the underlying expression instead."
        );
    }

    #[test]
    fn aggregate_expression_in_having_is_fine() {
        let sql = "SELECT p.project_id, SUM(o.amount) AS total_amount \
                   FROM projects p JOIN orders o ON p.project_id = o.project_id \
                   GROUP BY p.project_id HAVING SUM(o.amount) > 1000 ORDER BY total_amount DESC";
        assert_eq!(check(sql, &fallback_schema()), Ok(()));
    }

    #[test]
    fn alias_in_where_and_group_by_is_rejected() {
        let schema = fallback_schema();
        let where_sql = "SELECT budget * 2 AS doubled FROM projects WHERE doubled > 5";
        assert!(check(where_sql, &schema).unwrap_err().contains("WHERE"));

        let group_sql = "SELECT EXTRACT(YEAR FROM order_date) AS yr, COUNT(*) FROM orders GROUP BY yr";
        assert!(check(group_sql, &schema).unwrap_err().contains("GROUP BY"));
    }

    #[test]
    fn alias_matching_a_real_column_is_allowed() {
        let sql = "SELECT o.status AS status FROM orders o WHERE status = 'open'";
        assert_eq!(check(sql, &fallback_schema()), Ok(()));
    }

    #[test]
    fn multiple_statements_are_rejected() {
        let schema = fallback_schema();
        assert!(check("SELECT 1; SELECT 2", &schema).is_err());
        assert_eq!(check("SELECT 1;", &schema), Ok(()));
        assert_eq!(check("SELECT ';' FROM projects", &schema), Ok(()));
    }
}
