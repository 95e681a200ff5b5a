//! Capability execution boundary.
//!
//! The orchestrator never talks to the web directly. It hands the tool call to a
//! [`CapabilityExecutor`], which validates the arguments and runs the matching
//! [`SearchBackend`]. A backend failure is not a turn failure: it produces an
//! empty document list and the model still receives a `tool` message.

use crate::tools::{Tool, web_search_tool};
use crate::types::ToolCall;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Something that can answer a search query with text documents.
///
/// Implementations swallow their own failures and return an empty vector.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Vec<String>;
}

/// Parsed input of the web search capability.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchArguments {
    pub query: String,
}

impl SearchArguments {
    /// Parses the accumulated argument text of a completed call.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedToolArguments`] when the text is not a JSON object with
    /// a string `query`.
    pub fn parse(call: &ToolCall) -> Result<Self> {
        serde_json::from_str(&call.function.arguments).map_err(|e| {
            Error::malformed_tool_arguments(format!(
                "{} (arguments: {:?})",
                e, call.function.arguments
            ))
        })
    }
}

/// Wraps one fetched page the way documents are presented to the model.
pub fn wrap_document(source: &str, markdown: &str) -> String {
    format!(
        "### Start of content for {}\n\n{}\n\n### End",
        source, markdown
    )
}

/// Joins documents into the content of a `tool` message.
pub fn compose_tool_result(documents: &[String]) -> String {
    documents.join("\n\n")
}

/// Runs capabilities declared in the catalog.
#[derive(Clone)]
pub struct CapabilityExecutor {
    declaration: Tool,
    backend: Arc<dyn SearchBackend>,
}

impl std::fmt::Debug for CapabilityExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityExecutor")
            .field("declaration", &self.declaration.name())
            .finish()
    }
}

impl CapabilityExecutor {
    /// Executor for the web search capability.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            declaration: web_search_tool(),
            backend,
        }
    }

    /// The catalog this executor can serve.
    pub fn catalog(&self) -> Vec<&Tool> {
        vec![&self.declaration]
    }

    pub fn declaration(&self) -> &Tool {
        &self.declaration
    }

    /// Runs `capability` for `query`.
    ///
    /// A capability that is not in the catalog is treated like a failed search:
    /// logged, and answered with no documents.
    pub async fn execute(&self, capability: &str, query: &str) -> Vec<String> {
        if capability != self.declaration.name() {
            log::warn!("model requested unknown capability '{}'", capability);
            return Vec::new();
        }

        log::debug!("running {} for query {:?}", capability, query);
        let documents = self.backend.search(query).await;
        if documents.is_empty() {
            log::warn!("{} returned no documents for {:?}", capability, query);
        }
        documents
    }
}
