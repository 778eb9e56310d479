use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::semantic_search::SemanticSearch;
use crate::database::Database;
use crate::models::{AgentQueryResponse, ToolCallRecord};
use crate::providers::traits::{ChatMessage, CompletionProvider, Part, ToolDeclaration};

pub const EMPTY_TURN_ANSWER: &str = "I couldn't process that request fully. Please try again.";
pub const TOO_LONG_ANSWER: &str =
    "I'm having trouble processing this request. The conversation became too long.";

const MAX_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentTool {
    Summary,
    Entities,
    Search,
}

impl AgentTool {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "get_document_summary" => Some(Self::Summary),
            "get_document_entities" => Some(Self::Entities),
            "semantic_search_document" => Some(Self::Search),
            _ => None,
        }
    }

    fn declarations() -> Vec<ToolDeclaration> {
        let document_id = json!({
            "type": "STRING",
            "description": "The unique ID of the document."
        });

        vec![
            ToolDeclaration {
                name: "get_document_summary".to_string(),
                description: "Retrieves the pre-generated summary of a specific document."
                    .to_string(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {"document_id": document_id.clone()},
                    "required": ["document_id"]
                }),
            },
            ToolDeclaration {
                name: "get_document_entities".to_string(),
                description: "Retrieves the pre-generated named entities (PERSON, ORG, LOC, DATE, \
                              MONEY, GPE) from a specific document."
                    .to_string(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {"document_id": document_id.clone()},
                    "required": ["document_id"]
                }),
            },
            ToolDeclaration {
                name: "semantic_search_document".to_string(),
                description: "Performs a semantic search within a document to find relevant text \
                              sections based on a query."
                    .to_string(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {
                        "document_id": document_id.clone(),
                        "query": {
                            "type": "STRING",
                            "description": "The search query or question to find relevant sections."
                        }
                    },
                    "required": ["document_id", "query"]
                }),
            },
        ]
    }
}

/// Function-calling agent that answers questions about one document using
/// its stored summary, entities and chunks.
pub struct DocumentAgent {
    provider: Arc<dyn CompletionProvider>,
    database: Database,
    search: SemanticSearch,
    top_k: usize,
    tools: Vec<ToolDeclaration>,
}

impl DocumentAgent {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        database: Database,
        search: SemanticSearch,
        top_k: usize,
    ) -> Self {
        Self {
            provider,
            database,
            search,
            top_k,
            tools: AgentTool::declarations(),
        }
    }

    /// Runs the tool loop until the model answers in text. Provider errors
    /// propagate; tool failures are reported back to the model.
    pub async fn invoke(&self, document_id: &str, query: &str) -> Result<AgentQueryResponse> {
        let system = format!(
            "You answer questions about the document with ID {document_id}. \
             Use the available tools to read its summary, entities or relevant sections \
             before answering."
        );

        let mut history = vec![ChatMessage::user_text(query)];
        let mut tool_calls = Vec::new();

        loop {
            let turn = self
                .provider
                .chat(&history, &self.tools, Some(&system))
                .await?;
            let first = turn.parts.first().cloned();
            history.push(turn);

            match first {
                Some(Part::FunctionCall { name, args }) => {
                    let args = with_document_id(args, document_id);
                    info!(tool = %name, "agent called tool");
                    tool_calls.push(ToolCallRecord {
                        tool: name.clone(),
                        args: args.clone(),
                    });

                    match AgentTool::from_name(&name) {
                        Some(tool) => {
                            let output = self.run_tool(tool, document_id, &args).await;
                            debug!(tool = %name, output_len = output.len(), "tool finished");
                            history.push(ChatMessage::function_response(name, output));
                        }
                        None => {
                            warn!(tool = %name, "agent called unknown tool");
                            history.push(ChatMessage::user_text(format!(
                                "Agent tried to call unknown tool: {name}"
                            )));
                        }
                    }
                }
                Some(Part::Text(answer)) => {
                    return Ok(finish(answer, tool_calls, &history));
                }
                Some(Part::FunctionResponse { .. }) | None => {
                    warn!("agent turn had neither text nor a tool call");
                    return Ok(finish(EMPTY_TURN_ANSWER.to_string(), tool_calls, &history));
                }
            }

            if history.len() > MAX_HISTORY {
                warn!(turns = history.len(), "agent loop exceeded history limit");
                return Ok(finish(TOO_LONG_ANSWER.to_string(), tool_calls, &history));
            }
        }
    }

    async fn run_tool(&self, tool: AgentTool, document_id: &str, args: &Value) -> String {
        match tool {
            AgentTool::Summary => match self.database.get_summary(document_id).await {
                Ok(Some(summary)) => summary,
                Ok(None) => format!("No summary found for document ID: {document_id}"),
                Err(e) => format!("Error retrieving summary for document ID {document_id}: {e}"),
            },
            AgentTool::Entities => match self.database.get_entities(document_id).await {
                Ok(Some(entities)) if !entities.is_empty() => serde_json::to_string(&entities)
                    .unwrap_or_else(|e| {
                        format!("Error retrieving entities for document ID {document_id}: {e}")
                    }),
                Ok(_) => format!("No entities found for document ID: {document_id}"),
                Err(e) => format!("Error retrieving entities for document ID {document_id}: {e}"),
            },
            AgentTool::Search => {
                let Some(query) = args.get("query").and_then(Value::as_str) else {
                    return format!(
                        "Error performing semantic search for document ID {document_id}: \
                         missing 'query' argument"
                    );
                };
                match self.search.relevant_chunks(document_id, query, self.top_k).await {
                    Ok(chunks) if !chunks.is_empty() => {
                        format!("Relevant sections:\n{}", chunks.join("\n---\n"))
                    }
                    Ok(_) => format!(
                        "No relevant sections found for query '{query}' in document ID: {document_id}"
                    ),
                    Err(e) => format!(
                        "Error performing semantic search for document ID {document_id}: {e}"
                    ),
                }
            }
        }
    }
}

/// The model may guess or omit the document id; the caller's id always wins.
fn with_document_id(args: Value, document_id: &str) -> Value {
    let mut map = match args {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    map.insert("document_id".to_string(), Value::String(document_id.to_string()));
    Value::Object(map)
}

fn finish(
    answer: String,
    tool_calls: Vec<ToolCallRecord>,
    history: &[ChatMessage],
) -> AgentQueryResponse {
    AgentQueryResponse {
        answer,
        tool_calls: Some(tool_calls),
        final_prompt: serde_json::to_string(history).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewDocument;
    use crate::llm::EmbeddingGenerator;
    use crate::models::Entity;
    use crate::providers::traits::Role;
    use crate::testing::ScriptedProvider;

    fn call(name: &str, args: Value) -> ChatMessage {
        ChatMessage {
            role: Role::Model,
            parts: vec![Part::FunctionCall {
                name: name.to_string(),
                args,
            }],
        }
    }

    fn text(answer: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Model,
            parts: vec![Part::Text(answer.to_string())],
        }
    }

    async fn agent_with(turns: Vec<ChatMessage>) -> (DocumentAgent, Arc<ScriptedProvider>, String) {
        let provider = Arc::new(ScriptedProvider::new().with_turns(turns));
        let database = Database::in_memory().await.unwrap();
        let id = database
            .insert_document(NewDocument {
                user_id: "u1".to_string(),
                filename: "lease.pdf".to_string(),
                storage_path: "documents/u1/lease.pdf".to_string(),
                summary: "A residential lease.".to_string(),
                entities: vec![Entity {
                    text: "Jane Doe".to_string(),
                    label: "PERSON".to_string(),
                    start: Some(0),
                    end: Some(8),
                }],
                content: None,
            })
            .await
            .unwrap();

        let embeddings = Arc::new(EmbeddingGenerator::new(provider.clone(), 8, 2));
        let search = SemanticSearch::new(database.clone(), embeddings);
        search
            .index_document(
                &id,
                vec![
                    "Rent is due on the first day".to_string(),
                    "Late fees are fifty dollars".to_string(),
                ],
            )
            .await
            .unwrap();

        let agent = DocumentAgent::new(provider.clone(), database, search, 5);
        (agent, provider, id)
    }

    fn function_output(message: &ChatMessage) -> String {
        match &message.parts[0] {
            Part::FunctionResponse { response, .. } => {
                response["content"].as_str().unwrap_or_default().to_string()
            }
            other => panic!("expected function response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_turn_answers_immediately() {
        let (agent, _, id) = agent_with(vec![text("It is a lease.")]).await;
        let response = agent.invoke(&id, "What is this?").await.unwrap();

        assert_eq!(response.answer, "It is a lease.");
        assert_eq!(response.tool_calls, Some(Vec::new()));
        assert!(response.final_prompt.unwrap().contains("What is this?"));
    }

    #[tokio::test]
    async fn tool_call_overrides_document_id_and_returns_output() {
        let (agent, provider, id) = agent_with(vec![
            call("get_document_summary", json!({"document_id": "made-up"})),
            text("It is a residential lease."),
        ])
        .await;

        let response = agent.invoke(&id, "Summarize").await.unwrap();
        assert_eq!(response.answer, "It is a residential lease.");

        let calls = response.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "get_document_summary");
        assert_eq!(calls[0].args["document_id"], id.as_str());

        let second_request = &provider.histories()[1];
        assert_eq!(second_request.len(), 3);
        assert_eq!(second_request[2].role, Role::Function);
        assert_eq!(function_output(&second_request[2]), "A residential lease.");
    }

    #[tokio::test]
    async fn search_and_entity_tools_format_output() {
        let (agent, provider, id) = agent_with(vec![
            call("semantic_search_document", json!({"query": "late fees"})),
            call("get_document_entities", json!({})),
            text("Fifty dollars, says Jane Doe."),
        ])
        .await;

        agent.invoke(&id, "How much are late fees?").await.unwrap();
        let histories = provider.histories();

        let search_output = function_output(&histories[1][2]);
        assert!(search_output.starts_with("Relevant sections:\n"));
        assert!(search_output.contains("Late fees are fifty dollars"));
        assert!(search_output.contains("\n---\n"));

        let entity_output = function_output(&histories[2][4]);
        let entities: Vec<Entity> = serde_json::from_str(&entity_output).unwrap();
        assert_eq!(entities[0].text, "Jane Doe");
    }

    #[tokio::test]
    async fn missing_document_data_is_reported_to_model() {
        let (agent, provider, _) = agent_with(vec![
            call("get_document_summary", json!({})),
            call("semantic_search_document", json!({"query": "anything"})),
            text("I don't know."),
        ])
        .await;

        agent.invoke("other-doc", "?").await.unwrap();
        let histories = provider.histories();
        assert_eq!(
            function_output(&histories[1][2]),
            "No summary found for document ID: other-doc"
        );
        assert_eq!(
            function_output(&histories[2][4]),
            "No relevant sections found for query 'anything' in document ID: other-doc"
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_user_text() {
        let (agent, provider, id) =
            agent_with(vec![call("delete_everything", json!({})), text("Sorry.")]).await;

        let response = agent.invoke(&id, "Do it").await.unwrap();
        assert_eq!(response.answer, "Sorry.");
        assert_eq!(response.tool_calls.unwrap()[0].tool, "delete_everything");

        let second_request = &provider.histories()[1];
        assert_eq!(
            second_request[2],
            ChatMessage::user_text("Agent tried to call unknown tool: delete_everything")
        );
    }

    #[tokio::test]
    async fn empty_turn_ends_with_fallback() {
        let empty = ChatMessage {
            role: Role::Model,
            parts: Vec::new(),
        };
        let (agent, _, id) = agent_with(vec![empty]).await;
        let response = agent.invoke(&id, "?").await.unwrap();
        assert_eq!(response.answer, EMPTY_TURN_ANSWER);
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_history_limit() {
        let turns = (0..30).map(|_| call("get_document_summary", json!({})));
        let (agent, _, id) = agent_with(turns.collect()).await;

        let response = agent.invoke(&id, "Loop forever").await.unwrap();
        assert_eq!(response.answer, TOO_LONG_ANSWER);
        assert_eq!(response.tool_calls.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let (agent, _, id) = agent_with(Vec::new()).await;
        assert!(agent.invoke(&id, "?").await.is_err());
    }
}
