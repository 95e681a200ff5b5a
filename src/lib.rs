//! # search-chat
//!
//! A streaming chat-completions client that can make one web search per turn.
//!
//! ## Overview
//!
//! Each user turn sends the prompt to an OpenAI-compatible endpoint and prints
//! the answer token by token as it streams in. When the model asks for the
//! `webSearch` tool instead, the session:
//!
//! 1. finishes decoding the (fragmented) tool call,
//! 2. runs the search,
//! 3. appends the call and its result to the conversation,
//! 4. asks again *without* the tool catalog and streams the final answer.
//!
//! Starting a new turn cancels the previous one, so a slow answer never keeps
//! printing after the user has moved on.
//!
//! ## Example
//!
//! ```rust,no_run
//! use search_chat::{ApiConfig, Session, WebSearch};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::builder()
//!         .endpoint("http://localhost:1234/v1/chat/completions")
//!         .model("qwen2.5-32b-instruct")
//!         .temperature(0.7)
//!         .build()?;
//!
//!     let session = Session::new(&config, Arc::new(WebSearch::new()?))?;
//!
//!     let token = session.begin_turn();
//!     let outcome = session
//!         .ask("Who won the last Tour de France?", &token, &mut std::io::stdout())
//!         .await?;
//!
//!     if outcome.used_tool() {
//!         println!("\n(answered with a web search)");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **decoder**: bytes → lines → events; prints text deltas as they arrive
//! - **accumulator**: folds tool-call fragments into one [`ToolCall`]
//! - **session**: the per-turn state machine and the two request hops
//! - **cancel**: turn-scoped cancellation tokens
//! - **capability** / **web_search**: the search capability and its backend
//! - **tools** / **prompt**: the capability catalog and system prompt
//! - **transport**: the `reqwest` HTTP seam
//! - **config** / **error** / **types**: configuration, errors, wire types

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Tool-call fragment accumulation as an explicit fold.
mod accumulator;

/// Turn-scoped cancellation tokens and the controller that replaces them.
mod cancel;

/// Capability execution boundary and the search backend trait.
mod capability;

/// Endpoint, headers, and request parameters; environment loading.
mod config;

/// Streaming response decoding: UTF-8 carry, line splitting, frame classification.
mod decoder;

/// Error type and `Result` alias.
mod error;

/// The assistant's system prompt.
mod prompt;

/// Turn orchestration.
mod session;

/// Capability catalog declarations.
mod tools;

/// HTTP transport.
mod transport;

/// Messages, tool calls, and wire types.
mod types;

/// Brave-backed web search.
mod web_search;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

// --- Orchestration ---

pub use session::{Session, TurnOutcome, TurnState};

// --- Decoding ---

pub use accumulator::{ToolCallFragment, ToolCallState, accumulate, accumulate_all};
pub use decoder::{DATA_PREFIX, DONE_LINE, DecodedEvent, LineDecoder, classify_line, decode};

// --- Cancellation ---

pub use cancel::{CancellationToken, TurnController};

// --- Capabilities ---

pub use capability::{
    CapabilityExecutor, SearchArguments, SearchBackend, compose_tool_result, wrap_document,
};
pub use tools::{Tool, ToolBuilder, tool, web_search_tool};
pub use prompt::system_prompt;
pub use web_search::{WebSearch, extract_result_links, html_to_markdown};

// --- Transport & configuration ---

pub use config::{ApiConfig, ApiConfigBuilder, DEFAULT_MODEL, Provider, RequestConfig};
pub use transport::{ByteStream, ChatTransport, HttpTransport};

// --- Errors & types ---

pub use error::{Error, Result};
pub use types::{
    ChatRequest, FunctionCall, Message, MessageRole, StreamChunk, ToolCall, WEB_SEARCH,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The items most callers need: `use search_chat::prelude::*;`
pub mod prelude {
    pub use crate::{
        ApiConfig, CancellationToken, Error, Message, Result, SearchBackend, Session, ToolCall,
        TurnOutcome, WebSearch,
    };
}
