use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EvictionReason, LayoutKey, LoadingState, Timestamp};

/// Domain events emitted by the gesture-typing layer.
///
/// Consumed by hosts for logging and diagnostics. Emission is fire-and-forget:
/// having no listener is not an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GestureEvent {
    // =========================================================================
    // Detector lifecycle
    // =========================================================================
    /// A recognizer was created for a layout that had none cached.
    DetectorCreated {
        entry_id: Uuid,
        layout: LayoutKey,
        timestamp: Timestamp,
    },

    /// A cached recognizer was destroyed.
    DetectorDestroyed {
        entry_id: Uuid,
        layout: LayoutKey,
        reason: EvictionReason,
        timestamp: Timestamp,
    },

    /// The effective enabled flag was recomputed.
    EnabledChanged { enabled: bool, timestamp: Timestamp },

    /// The current recognizer reported a new loading state.
    ReadinessChanged {
        state: LoadingState,
        ready: bool,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Dictionaries
    // =========================================================================
    /// A merged corpus was handed to a recognizer.
    CorpusDelivered {
        layout: LayoutKey,
        batches: usize,
        words: usize,
        timestamp: Timestamp,
    },

    /// One dictionary failed to load; aggregation continued without it.
    DictionaryLoadFailed {
        dictionary: String,
        reason: String,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Gestures
    // =========================================================================
    /// A gesture produced candidates and the first one became composing text.
    GestureCommitted {
        word: String,
        candidates: usize,
        timestamp: Timestamp,
    },

    /// A pending gesture word was committed to the document.
    GestureConfirmed {
        word: String,
        auto_space: bool,
        timestamp: Timestamp,
    },
}

impl GestureEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            GestureEvent::DetectorCreated { timestamp, .. }
            | GestureEvent::DetectorDestroyed { timestamp, .. }
            | GestureEvent::EnabledChanged { timestamp, .. }
            | GestureEvent::ReadinessChanged { timestamp, .. }
            | GestureEvent::CorpusDelivered { timestamp, .. }
            | GestureEvent::DictionaryLoadFailed { timestamp, .. }
            | GestureEvent::GestureCommitted { timestamp, .. }
            | GestureEvent::GestureConfirmed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            GestureEvent::DetectorCreated { .. } => "detector_created",
            GestureEvent::DetectorDestroyed { .. } => "detector_destroyed",
            GestureEvent::EnabledChanged { .. } => "enabled_changed",
            GestureEvent::ReadinessChanged { .. } => "readiness_changed",
            GestureEvent::CorpusDelivered { .. } => "corpus_delivered",
            GestureEvent::DictionaryLoadFailed { .. } => "dictionary_load_failed",
            GestureEvent::GestureCommitted { .. } => "gesture_committed",
            GestureEvent::GestureConfirmed { .. } => "gesture_confirmed",
        }
    }
}
