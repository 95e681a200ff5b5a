//! Turn-scoped cancellation.
//!
//! Every user turn gets its own [`CancellationToken`]. Starting the next turn
//! through [`TurnController::begin_turn`] signals the previous token, so a stream
//! still being read for the old turn unwinds instead of printing over the new one.
//!
//! ```rust
//! use search_chat::TurnController;
//!
//! let turns = TurnController::new();
//! let first = turns.begin_turn();
//! let second = turns.begin_turn();
//!
//! assert!(first.is_signaled());
//! assert!(!second.is_signaled());
//! assert_eq!(second.generation(), first.generation() + 1);
//! ```

use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken as Signal;

/// Cooperative cancellation signal for one turn.
///
/// Cloning is cheap and every clone observes the same signal. The generation
/// number identifies which turn the token belongs to.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    signal: Signal,
    generation: u64,
}

impl CancellationToken {
    /// Creates an unsignalled token for the given generation.
    pub fn new(generation: u64) -> Self {
        Self {
            signal: Signal::new(),
            generation,
        }
    }

    /// Generation of the turn this token belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the turn has been asked to stop
    pub fn is_signaled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Asks the turn to stop. Idempotent.
    pub fn signal(&self) {
        self.signal.cancel();
    }

    /// Completes once the token is signalled.
    pub async fn cancelled(&self) {
        self.signal.cancelled().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Holds the current turn's token.
///
/// Exactly one token is current at a time.
#[derive(Debug, Default)]
pub struct TurnController {
    current: Mutex<Option<CancellationToken>>,
}

impl TurnController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals the previous turn (if any) and installs a fresh token as current.
    ///
    /// Both happen under one lock, so two concurrent callers can never both
    /// end up holding an unsignalled token.
    pub fn begin_turn(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = current.as_ref().map_or(1, |token| token.generation() + 1);
        let next = CancellationToken::new(generation);

        if let Some(previous) = current.replace(next.clone()) {
            log::debug!("cancelling turn {}", previous.generation());
            previous.signal();
        }

        next
    }

    /// The token of the turn in flight, if a turn was ever started
    pub fn current(&self) -> Option<CancellationToken> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Signals the current turn at session end. Later calls to
    /// [`begin_turn`](Self::begin_turn) still work.
    pub fn shutdown(&self) {
        if let Some(token) = self.current() {
            token.signal();
        }
    }
}
