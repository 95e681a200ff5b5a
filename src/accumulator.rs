//! Tool-call accumulation as an explicit left fold.
//!
//! Tool calls arrive as fragments spread over many frames:
//!
//! ```text
//! Frame 1: tool_calls: [{ index: 0, id: "call_1", function: { name: "webSearch", arguments: "{\"qu" } }]
//! Frame 2: tool_calls: [{ index: 0, function: { arguments: "ery\":\"x\"}" } }]
//! ```
//!
//! The first fragment carrying an identifier starts the call and names it; later
//! identifiers and names are ignored. Every fragment, the first included, appends
//! its argument text in arrival order. No fragment is dropped or reordered, and
//! empty ones still count.

use crate::types::{ToolCall, ToolCallDelta};

/// One decoded tool-call fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// Present on the fragment that starts a call
    pub id: Option<String>,
    /// Present on the fragment that starts a call
    pub name: Option<String>,
    /// Argument text; may be empty or split anywhere, even mid-escape
    pub arguments: String,
}

impl ToolCallFragment {
    /// Fragment that starts a call.
    pub fn start(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: arguments.into(),
        }
    }

    /// Fragment that continues the current call.
    pub fn continuation(arguments: impl Into<String>) -> Self {
        Self {
            arguments: arguments.into(),
            ..Self::default()
        }
    }
}

impl From<ToolCallDelta> for ToolCallFragment {
    fn from(delta: ToolCallDelta) -> Self {
        let (name, arguments) = match delta.function {
            Some(function) => (function.name, function.arguments.unwrap_or_default()),
            None => (None, String::new()),
        };

        Self {
            id: delta.id,
            name,
            arguments,
        }
    }
}

/// Fold state: the call being built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallState {
    call: ToolCall,
}

impl ToolCallState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finishes the fold.
    pub fn into_call(self) -> ToolCall {
        self.call
    }
}

/// Applies one fragment. `accumulate(state, fragment) -> state`.
pub fn accumulate(mut state: ToolCallState, fragment: ToolCallFragment) -> ToolCallState {
    if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
        if !state.call.is_complete() {
            state.call.id = id;
            if let Some(name) = fragment.name.filter(|name| !name.is_empty()) {
                state.call.function.name = name;
            }
        } else if id != state.call.id {
            log::debug!(
                "fragment names call {} while building {}; appending its arguments",
                id,
                state.call.id
            );
        }
    }

    state.call.function.arguments.push_str(&fragment.arguments);
    state
}

/// Folds a whole fragment sequence into a call.
pub fn accumulate_all<I>(fragments: I) -> ToolCall
where
    I: IntoIterator<Item = ToolCallFragment>,
{
    fragments
        .into_iter()
        .fold(ToolCallState::new(), accumulate)
        .into_call()
}
