//! Enabled-state derivation and recognizer readiness tracking.
//!
//! Gesture typing is on when the user preference allows it and the device is
//! not in power-saving mode. The two inputs arrive independently; the tracker
//! keeps the last value of each and recomputes on every update, even when the
//! result does not change. Each recomputation tells the owner to either tear
//! everything down or (re)activate the current keyboard.
//!
//! Readiness is a `watch` subscription to the current recognizer's loading
//! state. It is polled from the UI thread; a closed channel means the
//! recognizer is gone and therefore not ready.

use tokio::sync::watch;
use tracing::{debug, info};

use glide_core::types::LoadingState;

/// What the owner must do after the enabled state was recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Destroy every detector.
    Disable,
    /// Set up gesture typing for the current alphabet keyboard, if any.
    Enable,
}

impl Gate {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Gate::Enable)
    }
}

/// A readiness change observed while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessChange {
    /// New loading state, or `None` when the stream terminated.
    pub state: Option<LoadingState>,
    pub ready: bool,
}

/// Combines the enabled inputs and follows the current recognizer's readiness.
#[derive(Debug, Default)]
pub struct ReadinessTracker {
    power_saving: Option<bool>,
    preference: Option<bool>,
    enabled: bool,
    subscription: Option<watch::Receiver<LoadingState>>,
    last_state: Option<LoadingState>,
    ready: bool,
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a power-saving update.
    ///
    /// Returns `None` until the preference has been seen at least once.
    pub fn set_power_saving(&mut self, power_saving: bool) -> Option<Gate> {
        self.power_saving = Some(power_saving);
        self.recompute()
    }

    /// Record a preference update.
    ///
    /// Returns `None` until the power-saving state has been seen at least once.
    pub fn set_preference(&mut self, enabled: bool) -> Option<Gate> {
        self.preference = Some(enabled);
        self.recompute()
    }

    fn recompute(&mut self) -> Option<Gate> {
        let power_saving = self.power_saving?;
        let preference = self.preference?;

        let enabled = if power_saving { false } else { preference };
        if enabled != self.enabled {
            info!(enabled, power_saving, preference, "Gesture typing enabled state changed");
        }
        self.enabled = enabled;

        // Every recomputation starts from a clean subscription.
        self.dispose();

        Some(if enabled { Gate::Enable } else { Gate::Disable })
    }

    /// Effective enabled state. False until both inputs were seen.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the current recognizer has finished loading its corpus.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn last_state(&self) -> Option<LoadingState> {
        self.last_state
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Follow a new readiness stream, dropping the previous subscription.
    ///
    /// The current value of the stream is applied immediately.
    pub fn subscribe(&mut self, mut receiver: watch::Receiver<LoadingState>) -> ReadinessChange {
        self.dispose();
        let state = *receiver.borrow_and_update();
        self.subscription = Some(receiver);
        self.apply(Some(state))
    }

    /// Check the subscription for a new value.
    ///
    /// Returns `Some` when the loading state changed or the stream terminated.
    pub fn poll(&mut self) -> Option<ReadinessChange> {
        let receiver = self.subscription.as_mut()?;
        match receiver.has_changed() {
            Ok(false) => None,
            Ok(true) => {
                let state = *receiver.borrow_and_update();
                Some(self.apply(Some(state)))
            }
            Err(_) => {
                debug!("Recognizer readiness stream terminated");
                self.subscription = None;
                Some(self.apply(None))
            }
        }
    }

    /// Drop the readiness subscription and mark not ready. Idempotent.
    pub fn dispose(&mut self) {
        if self.subscription.take().is_some() {
            debug!("Readiness subscription disposed");
        }
        self.ready = false;
        self.last_state = None;
    }

    fn apply(&mut self, state: Option<LoadingState>) -> ReadinessChange {
        self.last_state = state;
        self.ready = state == Some(LoadingState::Loaded);
        debug!(state = ?state, ready = self.ready, "Gesture detector readiness");
        ReadinessChange {
            state,
            ready: self.ready,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(power_saving: bool, preference: bool) -> (ReadinessTracker, Gate) {
        let mut tracker = ReadinessTracker::new();
        assert!(tracker.set_power_saving(power_saving).is_none());
        let gate = tracker.set_preference(preference).unwrap();
        (tracker, gate)
    }

    #[test]
    fn test_no_gate_until_both_inputs_seen() {
        let mut tracker = ReadinessTracker::new();
        assert!(tracker.set_preference(true).is_none());
        assert!(!tracker.is_enabled());
        assert_eq!(tracker.set_power_saving(false), Some(Gate::Enable));
        assert!(tracker.is_enabled());
    }

    #[test]
    fn test_combination_table() {
        assert_eq!(tracker(false, true).1, Gate::Enable);
        assert_eq!(tracker(false, false).1, Gate::Disable);
        assert_eq!(tracker(true, true).1, Gate::Disable);
        assert_eq!(tracker(true, false).1, Gate::Disable);
    }

    #[test]
    fn test_power_saving_overrides_preference() {
        let (mut tracker, _) = tracker(false, true);
        assert_eq!(tracker.set_power_saving(true), Some(Gate::Disable));
        assert!(!tracker.is_enabled());
        assert_eq!(tracker.set_preference(true), Some(Gate::Disable));
        assert_eq!(tracker.set_power_saving(false), Some(Gate::Enable));
    }

    #[test]
    fn test_recomputes_on_unchanged_input() {
        let (mut tracker, _) = tracker(false, true);
        assert_eq!(tracker.set_preference(true), Some(Gate::Enable));
        assert_eq!(tracker.set_preference(true), Some(Gate::Enable));
    }

    #[test]
    fn test_recompute_disposes_subscription() {
        let (mut tracker, _) = tracker(false, true);
        let (tx, rx) = watch::channel(LoadingState::Loaded);
        assert!(tracker.subscribe(rx).ready);
        assert!(tracker.is_ready());

        tracker.set_preference(true);
        assert!(!tracker.is_subscribed());
        assert!(!tracker.is_ready());
        drop(tx);
    }

    #[test]
    fn test_subscribe_applies_current_value() {
        let mut tracker = ReadinessTracker::new();
        let (_tx, rx) = watch::channel(LoadingState::Loading);
        let change = tracker.subscribe(rx);
        assert_eq!(change.state, Some(LoadingState::Loading));
        assert!(!change.ready);
        assert_eq!(tracker.last_state(), Some(LoadingState::Loading));
    }

    #[test]
    fn test_poll_follows_state_changes() {
        let mut tracker = ReadinessTracker::new();
        let (tx, rx) = watch::channel(LoadingState::Unloaded);
        tracker.subscribe(rx);
        assert!(tracker.poll().is_none());

        tx.send_replace(LoadingState::Loading);
        assert_eq!(tracker.poll().unwrap().state, Some(LoadingState::Loading));
        assert!(!tracker.is_ready());

        tx.send_replace(LoadingState::Loaded);
        assert!(tracker.poll().unwrap().ready);
        assert!(tracker.is_ready());
        assert!(tracker.poll().is_none());
    }

    #[test]
    fn test_error_state_is_not_ready() {
        let mut tracker = ReadinessTracker::new();
        let (tx, rx) = watch::channel(LoadingState::Loaded);
        tracker.subscribe(rx);
        assert!(tracker.is_ready());

        tx.send_replace(LoadingState::Error);
        let change = tracker.poll().unwrap();
        assert_eq!(change.state, Some(LoadingState::Error));
        assert!(!tracker.is_ready());
    }

    #[test]
    fn test_stream_termination_is_not_ready() {
        let mut tracker = ReadinessTracker::new();
        let (tx, rx) = watch::channel(LoadingState::Loaded);
        tracker.subscribe(rx);
        assert!(tracker.is_ready());

        drop(tx);
        let change = tracker.poll().unwrap();
        assert_eq!(change.state, None);
        assert!(!change.ready);
        assert!(!tracker.is_subscribed());
        assert!(tracker.poll().is_none());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut tracker = ReadinessTracker::new();
        let (_tx, rx) = watch::channel(LoadingState::Loaded);
        tracker.subscribe(rx);
        tracker.dispose();
        tracker.dispose();
        assert!(!tracker.is_ready());
        assert!(!tracker.is_subscribed());
    }

    #[test]
    fn test_resubscribe_replaces_previous_stream() {
        let mut tracker = ReadinessTracker::new();
        let (old_tx, old_rx) = watch::channel(LoadingState::Loading);
        tracker.subscribe(old_rx);
        let (_new_tx, new_rx) = watch::channel(LoadingState::Loaded);
        tracker.subscribe(new_rx);
        assert!(tracker.is_ready());

        // Updates on the old stream are no longer observed.
        old_tx.send_replace(LoadingState::Error);
        assert!(tracker.poll().is_none());
        assert!(tracker.is_ready());
    }
}
