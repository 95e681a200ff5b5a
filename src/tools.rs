//! Capability catalog: declarations of the tools the model may call.
//!
//! A [`Tool`] here is a declaration only (name, description, JSON Schema for
//! its parameters). Running the capability is the job of
//! [`CapabilityExecutor`](crate::CapabilityExecutor).
//!
//! ```rust
//! use search_chat::tool;
//!
//! let lookup = tool("lookup", "Look something up")
//!     .param("query", "string", "What to look up")
//!     .build();
//!
//! let declaration = lookup.to_openai_format();
//! assert_eq!(declaration["function"]["parameters"]["required"][0], "query");
//! ```

use crate::types::WEB_SEARCH;
use serde_json::{Map, Value, json};

/// Declaration of one capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

impl Tool {
    /// The catalog entry sent in the `tools` array of a request.
    pub fn to_openai_format(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Fluent builder for [`Tool`] declarations.
pub struct ToolBuilder {
    name: String,
    description: String,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Adds a required parameter. `json_type` is a JSON Schema type name.
    pub fn param(mut self, name: &str, json_type: &str, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({ "type": json_type, "description": description }),
        );
        if !self.required.iter().any(|existing| existing == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> Tool {
        Tool {
            name: self.name,
            description: self.description,
            input_schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required
            }),
        }
    }
}

/// Starts a [`ToolBuilder`].
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

/// The web search declaration: the only entry in the catalog.
pub fn web_search_tool() -> Tool {
    tool(
        WEB_SEARCH,
        "Get real-time or current or up to date information from the internet.",
    )
    .param("query", "string", "A well constructed google search query.")
    .build()
}
