use inventorydb_core::{PipelineError, SchemaDescriptor};
use inventorydb_llm::{Gateway, is_error_reply};
use regex::Regex;

use crate::{discipline, references, safety};

pub const SYNTHESIZER_SYSTEM: &str = "You are an assistant that converts a confirmed natural-language request into one correct, read-only PostgreSQL SELECT statement. Use only the provided schema. Rules:
1. Produce a single SELECT statement (no DML, no DDL, no multiple statements).
2. Validate all tables and columns against the schema. If any referenced table or column does not exist, reply with exactly one line of the form \"ERROR: table '<name>' not found. Available tables: <comma separated list>\" (or the same shape for a column, listing that table's columns) and stop.
3. Do not invent joins or columns not present in the schema.
4. If the user specified columns, include exactly those columns. If only one table is involved and no columns are specified, SELECT * is allowed. With several tables, list columns explicitly and disambiguate duplicates with aliases.
5. Column aliases (AS) may appear only in the SELECT list. Never use an alias in WHERE, GROUP BY or HAVING; repeat the full expression instead (HAVING SUM(amount) > 1000, not HAVING total_amount > 1000).
6. Do not add LIMIT unless the request asks for it; the display is capped separately.
7. Use 'YYYY-MM-DD' literals for dates.

Output: only the final SQL in a single ```sql code block.";

/// A statement that passed every local check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCandidate {
    pub sql: String,
}

fn synthesis_request(instruction: &str, schema: &SchemaDescriptor) -> String {
    format!(
        "Generate SQL for this request: {instruction}\n\nDatabase schema:\n{}\n\nRemember: produce only a single SELECT statement. Validate all tables and columns against the schema above.",
        schema.to_prompt_json()
    )
}

/// Turn a refined instruction into one validated `SELECT`.
///
/// Model-reported errors and unknown identifiers come back as
/// [`PipelineError::Synthesis`] with the `ERROR:` text intact; read-only and
/// shape violations come back as [`PipelineError::Validation`].
pub async fn synthesize(
    gateway: &Gateway,
    instruction: &str,
    schema: &SchemaDescriptor,
) -> std::result::Result<SqlCandidate, PipelineError> {
    let reply = gateway
        .complete(SYNTHESIZER_SYSTEM, &synthesis_request(instruction, schema))
        .await;

    if is_error_reply(&reply) {
        tracing::warn!(event = "sql_generation_failed", reply = %reply);
        return Err(PipelineError::Synthesis(reply.trim().to_string()));
    }

    let sql = extract_sql(&reply);
    if sql.is_empty() {
        return Err(PipelineError::Synthesis(
            "ERROR: the model returned no SQL statement.".to_string(),
        ));
    }

    check_candidate(&sql, schema)?;
    tracing::info!(event = "sql_generated", sql = %sql);
    Ok(SqlCandidate { sql })
}

/// Every local gate a candidate must pass before execution.
pub fn check_candidate(sql: &str, schema: &SchemaDescriptor) -> std::result::Result<(), PipelineError> {
    safety::validate(sql)
        .into_result()
        .map_err(PipelineError::Validation)?;
    references::check_tables(sql, schema).map_err(PipelineError::Synthesis)?;
    discipline::check(sql, schema).map_err(PipelineError::Validation)?;
    Ok(())
}

/// Pull SQL out of a model reply: a ```sql fence, any fence, or the raw text.
pub fn extract_sql(reply: &str) -> String {
    fenced(reply, r"(?is)```sql[ \t]*\r?\n?(.*?)```")
        .or_else(|| fenced(reply, r"(?s)```[ \t]*(?:[A-Za-z]+[ \t]*\r?\n)?(.*?)```"))
        .unwrap_or_else(|| reply.trim().to_string())
}

fn fenced(reply: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(reply)?;
    Some(caps.get(1)?.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_sql_fence() {
        let reply = "Here you go:\n```sql\nSELECT * FROM projects;\n```\nDone.";
        assert_eq!(extract_sql(reply), "SELECT * FROM projects;");
    }

    #[test]
    fn extracts_untagged_and_other_tagged_fences() {
        assert_eq!(extract_sql("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(extract_sql("```postgresql\nSELECT 2\n```"), "SELECT 2");
    }

    #[test]
    fn raw_text_is_trimmed() {
        assert_eq!(extract_sql("  SELECT 3  \n"), "SELECT 3");
    }

    #[test]
    fn request_embeds_schema_json() {
        let schema = inventorydb_core::fallback_schema();
        let request = synthesis_request("list clients", &schema);
        assert!(request.starts_with("Generate SQL for this request: list clients"));
        assert!(request.contains("\"contact_email\": \"TEXT\""));
    }
}
