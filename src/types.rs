//! Core types: conversation messages, tool calls, and the chat-completions wire format.

use crate::config::RequestConfig;
use serde::{Deserialize, Serialize};

/// Name of the only capability the model may call.
pub const WEB_SEARCH: &str = "webSearch";

/// Role of a message author in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model
    System,
    /// The person asking
    User,
    /// The model, including its tool-call requests
    Assistant,
    /// The result of a capability invocation
    Tool,
}

/// One entry in the conversation sent to the API.
///
/// `content` is serialized as `null` when absent; an assistant message that only
/// requests a tool call has no text. `tool_calls` appears only on such assistant
/// messages, `name` and `tool_call_id` only on tool results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(text.into()),
            tool_calls: None,
            name: None,
            tool_call_id: None,
        }
    }

    /// Creates a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(MessageRole::System, text)
    }

    /// Creates a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(MessageRole::User, text)
    }

    /// Creates the assistant message that records a tool call the model made.
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(vec![call]),
            name: None,
            tool_call_id: None,
        }
    }

    /// Creates the tool message answering `call`.
    ///
    /// The call identifier links the result back to the assistant message that
    /// must immediately precede it in the conversation.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            name: Some(call.function.name.clone()),
            tool_call_id: Some(call.id.clone()),
        }
    }
}

/// A tool call requested by the model.
///
/// Built up while a response streams in. The identifier stays empty until the
/// server assigns one, so an empty `id` after decoding means "no tool call".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

/// Function name and raw JSON argument text of a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    /// The empty call a response starts decoding into.
    pub fn pending() -> Self {
        Self {
            id: String::new(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: WEB_SEARCH.to_string(),
                arguments: String::new(),
            },
        }
    }

    /// Creates a fully-formed call, mostly useful in tests.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// A call is complete once the server has given it an identifier.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty()
    }
}

impl Default for ToolCall {
    fn default() -> Self {
        Self::pending()
    }
}

/// Request body for one hop.
///
/// The request configuration is flattened into the top level next to
/// `messages`. `tools` is omitted entirely on the follow-up hop.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    #[serde(flatten)]
    pub config: &'a RequestConfig,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
}

impl ChatRequest<'_> {
    /// True when the capability catalog is attached.
    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }
}

// ============================================================================
// STREAMING WIRE FORMAT
// ============================================================================
// Every field is optional: servers differ in what they include per frame and
// the decoder only cares about `choices[0].delta`.

/// One JSON frame from a `data: ` line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A fragment of a tool call as it appears on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_tool_call_serializes_null_content() {
        let call = ToolCall::new("call_1", WEB_SEARCH, r#"{"query":"rust"}"#);
        let value = serde_json::to_value(Message::assistant_tool_call(call)).unwrap();

        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "webSearch", "arguments": "{\"query\":\"rust\"}" }
                }]
            })
        );
    }

    #[test]
    fn test_tool_result_links_call_id() {
        let call = ToolCall::new("call_9", WEB_SEARCH, "{}");
        let value = serde_json::to_value(Message::tool_result(&call, "docs")).unwrap();

        assert_eq!(value["role"], "tool");
        assert_eq!(value["name"], "webSearch");
        assert_eq!(value["tool_call_id"], "call_9");
        assert_eq!(value["content"], "docs");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_user_message_omits_tool_fields() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "hi" }));
    }

    #[test]
    fn test_pending_tool_call_is_incomplete() {
        let call = ToolCall::pending();
        assert!(!call.is_complete());
        assert_eq!(call.call_type, "function");
        assert_eq!(call.function.name, WEB_SEARCH);
        assert!(call.function.arguments.is_empty());
    }

    #[test]
    fn test_chat_request_flattens_config_and_omits_tools() {
        let config = RequestConfig::new("test-model").with_temperature(0.5);
        let messages = vec![Message::user("hello")];
        let request = ChatRequest {
            config: &config,
            messages: &messages,
            tools: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "test-model");
        assert_eq!(value["stream"], true);
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["messages"][0]["content"], "hello");
        assert!(value.get("tools").is_none());
        assert!(!request.has_tools());
    }

    #[test]
    fn test_stream_chunk_tolerates_missing_fields() {
        let frame = r#"{"id":"x","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        let chunk: StreamChunk = serde_json::from_str(frame).unwrap();
        assert_eq!(chunk.choices.len(), 1);
        assert!(chunk.choices[0].delta.content.is_none());

        let empty: StreamChunk = serde_json::from_str("{}").unwrap();
        assert!(empty.choices.is_empty());
    }
}
