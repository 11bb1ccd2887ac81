//! Observer trait for orchestrator events.
//!
//! Inject an [`Arc<dyn GenerationObserver>`] via
//! [`crate::orchestrator::GenerationOrchestrator::with_observer`] to follow
//! the state machine from a presentation layer: a terminal spinner, a
//! WebSocket, a log line. The orchestrator knows nothing about how the host
//! displays state.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2diagram::{GenerationObserver, GenerationState};
//!
//! struct Printer;
//!
//! impl GenerationObserver for Printer {
//!     fn on_state_change(&self, state: &GenerationState) {
//!         eprintln!("now: {}", state.label());
//!     }
//! }
//! ```

use crate::error::{GenerationError, Phase};
use crate::orchestrator::GenerationState;
use std::sync::Arc;

/// Receives orchestrator events.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// State changes are reported one at a time, in the order they happen: a
/// second request cannot be admitted until the `ready` or `failed` event of
/// the first has returned. The state lock itself is released before the
/// call, so an observer may read
/// [`state`](crate::orchestrator::GenerationOrchestrator::state), but it must
/// not block on another request.
pub trait GenerationObserver: Send + Sync {
    /// Called after every state transition, with the new state.
    fn on_state_change(&self, state: &GenerationState) {
        let _ = state;
    }

    /// Called when a service call failed and will be retried.
    ///
    /// `attempt` is the 1-indexed retry about to run.
    fn on_retry(&self, phase: Phase, attempt: u32, error: &GenerationError) {
        let _ = (phase, attempt, error);
    }

    /// Called when a request is rejected before admission
    /// (`MissingInput`, `EmptyPrompt`, `Busy`). The state is unchanged.
    fn on_rejected(&self, error: &GenerationError) {
        let _ = error;
    }
}

/// A no-op observer; the default when none is configured.
pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}

/// Convenience alias for the type stored by the orchestrator.
pub type Observer = Arc<dyn GenerationObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<String>>,
        retries: Mutex<Vec<(Phase, u32)>>,
    }

    impl GenerationObserver for Recorder {
        fn on_state_change(&self, state: &GenerationState) {
            self.states.lock().unwrap().push(state.label().to_string());
        }

        fn on_retry(&self, phase: Phase, attempt: u32, _error: &GenerationError) {
            self.retries.lock().unwrap().push((phase, attempt));
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_state_change(&GenerationState::Analyzing);
        obs.on_retry(Phase::Generation, 1, &GenerationError::EmptyPrompt);
        obs.on_rejected(&GenerationError::MissingInput);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_state_change(&GenerationState::Generating);
        rec.on_state_change(&GenerationState::Idle);
        rec.on_retry(
            Phase::Analysis,
            2,
            &GenerationError::ServiceError {
                message: "503".into(),
            },
        );
        assert_eq!(*rec.states.lock().unwrap(), vec!["generating", "idle"]);
        assert_eq!(*rec.retries.lock().unwrap(), vec![(Phase::Analysis, 2)]);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Observer = Arc::new(NoopObserver);
        obs.on_state_change(&GenerationState::Idle);
    }
}
