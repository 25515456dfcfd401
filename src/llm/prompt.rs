//! Prompt construction for LLM requests.
//!
//! Builds the system prompt from the fixed instructions, the catalog
//! schemas, the caller's access scope and recent conversation memory.

use crate::catalog::{CatalogRegistry, DEFAULT_SCOPE_COLUMN};
use crate::llm::types::Message;
use crate::safety::AccessPolicy;

/// Fixed instructions for the analyst agent.
const BASE_PROMPT: &str = r#"You are an expert data analyst for banking and insurance data. You answer questions by running SQL through the athena_query tool.

SECURITY RULES:
- Never reveal database names, table names, column names, SQL text or raw database errors in the explanation.
- Use business language: "customer records" not table names, "customer ID" not column names, "unable to retrieve data" not error text.
- If asked about technical details, politely decline and offer help with the data instead.

DATABASE SELECTION:
- Identify the business domain of the question and pass the matching database in every athena_query call.
- Never query one domain's tables in another domain's database.

LIMIT RULES:
- Add LIMIT only when the user asks for "first N", "top N" or a sample.
- For "all", "show", "list" or "get" requests return every row.

NUDGE AND CTA RULES (insurance queries only):
- Add a "nudge" for generalized or filtered queries, for questions about the least, lowest, worst, bottom or minimal performers, and for "top N" queries that return fewer than N rows.
- Do not add a nudge for banking queries or for "top N" queries that return at least N rows.
- The nudge covers the least performing entities: 1 entity for 1-5 results, 2 for 6-15, 3 for 16-30, 4 for more.
- Run additional queries to gather facts about those entities. The nudge states facts only, using "**The Issue:**" and "**Root Cause:**" sections with concrete numbers.
- Whenever there is a nudge there must be a "cta". For each entity give "Action N: <entity> - <action type>", "Priority: HIGH|MEDIUM|LOW", a one-line "Execution:" and a measurable "Target:".

VISUALIZATION:
- Prefer a chart (bar, line, pie, scatter) for GROUP BY results: bar for categories, pie for shares, line for time series, scatter for correlations.
- Use text for single values and general answers.
- Amounts are in INR. Never use $ or USD.

RESPONSE FORMAT:
Answer with exactly one JSON object and nothing else:
{
    "type": "text" | "bar" | "line" | "pie" | "scatter",
    "data": "" | "<single value>" | {"name": "...", "cif_no": "..."} | [{"label": "...", "value": "..."}],
    "explanation": "business-friendly answer",
    "customer_specific": "True" | "False",
    "query_executed": "the SQL that produced the data, or empty",
    "nudge": "insurance only, may be empty",
    "cta": "insurance only, required when nudge is set"
}
- Charts must put their points in "data" as a list.
- Set "customer_specific" to "True" only for details of a single customer, read from the customer master table.
- If the access scope below excludes the requested records, answer with type "text" and the explanation "**ACCESS VIOLATION - AUTHORIZATION ERROR** User does not have authorized access to the customer."
"#;

/// Builds the system prompt for one request.
pub fn build_system_prompt(
    catalogs: &CatalogRegistry,
    policy: &AccessPolicy,
    user_id: &str,
    memory_context: &str,
) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    prompt.push_str("\nAVAILABLE DATABASES:\n");
    prompt.push_str(&catalogs.format_for_llm());

    let column = catalogs
        .iter()
        .find(|c| c.has_access_control())
        .map(|c| c.scope_column.as_str())
        .unwrap_or(DEFAULT_SCOPE_COLUMN);
    prompt.push_str("\nACCESS SCOPE (enforced on every query, do not mention it to the user):\n");
    prompt.push_str(&policy.describe(user_id, column));
    prompt.push('\n');

    prompt.push_str(memory_context);
    prompt
}

/// Formats the user turn sent to the model.
pub fn user_message(query: &str, user_id: &str) -> String {
    format!("User Request: {}, user_id: {}", query, user_id)
}

/// Builds the initial message list for an agent request.
pub fn build_messages(system_prompt: String, query: &str, user_id: &str) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(user_message(query, user_id)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_catalogs, MockSchemaCatalog};
    use crate::llm::types::Role;

    async fn registry() -> CatalogRegistry {
        let mut registry = CatalogRegistry::new(default_catalogs());
        registry.load_schemas(&MockSchemaCatalog::sample()).await;
        registry
    }

    #[tokio::test]
    async fn test_prompt_contains_catalogs_and_schemas() {
        let prompt =
            build_system_prompt(&registry().await, &AccessPolicy::default(), "kamaljeet.singh", "");

        assert!(prompt.contains("Database: sentra_db (Banking)"));
        assert!(prompt.contains("Database: insurance_db (Insurance)"));
        assert!(prompt.contains("Table: DM_CUSTOMER_MASTER"));
        assert!(prompt.contains("  - gwp: decimal(18,2)"));
        assert!(prompt.contains("RESPONSE FORMAT:"));
    }

    #[tokio::test]
    async fn test_prompt_describes_caller_scope() {
        let registry = registry().await;
        let policy = AccessPolicy::default();

        let prompt = build_system_prompt(&registry, &policy, "harsh.kumar", "");
        assert!(prompt.contains("CIF_NO between CIF200026 and CIF200099"));

        let prompt = build_system_prompt(&registry, &policy, "stranger", "");
        assert!(prompt.contains("No access to customer records"));
    }

    #[tokio::test]
    async fn test_prompt_ends_with_memory_context() {
        let context = "\n\nRecent conversation:\nUSER: hi\nASSISTANT: hello";
        let prompt =
            build_system_prompt(&registry().await, &AccessPolicy::default(), "u", context);
        assert!(prompt.ends_with(context));
    }

    #[test]
    fn test_user_message_format() {
        assert_eq!(
            user_message("top 5 agents by premium", "vishal.saxena"),
            "User Request: top 5 agents by premium, user_id: vishal.saxena"
        );
    }

    #[test]
    fn test_build_messages() {
        let messages = build_messages("system".to_string(), "q", "u");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "User Request: q, user_id: u");
    }
}
