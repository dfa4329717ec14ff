//! Gesture state machine.
//!
//! One gesture moves through:
//! - Idle -> Capturing (gesture started on a valid key)
//! - Capturing -> Capturing (a new gesture replaces an unfinished one)
//! - Capturing -> Idle (gesture finished or abandoned)
//!
//! Gestures are driven from the UI thread only, so the machine is a plain
//! value owned by the session.

use std::fmt;

use glide_core::error::{GlideError, Result};

/// Phase of the gesture currently being drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GestureState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Points are being accumulated into the bound recognizer.
    Capturing,
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureState::Idle => write!(f, "Idle"),
            GestureState::Capturing => write!(f, "Capturing"),
        }
    }
}

impl GestureState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &GestureState) -> bool {
        matches!(
            (self, target),
            (GestureState::Idle, GestureState::Capturing)
                | (GestureState::Capturing, GestureState::Capturing)
                | (GestureState::Capturing, GestureState::Idle)
        )
    }
}

/// Validated holder of the current `GestureState`.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: GestureState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> GestureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == GestureState::Capturing
    }

    /// Attempt to transition to the target state.
    pub fn transition(&mut self, target: GestureState) -> Result<()> {
        if self.state.can_transition_to(&target) {
            tracing::trace!("Gesture state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(GlideError::Session(format!(
                "Invalid state transition: {} -> {}",
                self.state, target
            )))
        }
    }

    /// Force the machine back to Idle, e.g. when the recognizer goes away
    /// mid-gesture.
    pub fn reset(&mut self) {
        if self.state != GestureState::Idle {
            tracing::debug!("Gesture state machine reset to Idle from {}", self.state);
        }
        self.state = GestureState::Idle;
    }
}

// =============================================================================
// Tests
// =============================================================================
