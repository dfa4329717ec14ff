//! Gesture session managing a single gesture from first touch to commit.
//!
//! The `GestureSession` drives the `StateMachine` and owns the one piece of
//! state that outlives a gesture: the word left composing after the last
//! gesture, waiting to be confirmed by the next key press or gesture.
//! Everything else it needs (enabled flag, bound recognizer, shift state,
//! host text field) is handed in explicitly on each call.

use tracing::{debug, info, trace, warn};

use glide_core::types::{key_codes, Key, ShiftState};

use crate::recognizer::Recognizer;
use crate::state::{GestureState, StateMachine};
use crate::text_commit::{
    capitalize_candidates, commit_word, compose_gesture_result, InputConnection, SuggestionSink,
};

/// Whether `key` may begin a gesture.
///
/// Only keys that can start a word qualify: no functional keys, no
/// non-printable codes, no space or enter.
pub fn is_valid_gesture_start(key: &Key) -> bool {
    if key.functional || key.primary_code <= 0 {
        return false;
    }
    !matches!(key.primary_code, key_codes::SPACE | key_codes::ENTER)
}

/// Per-call view of the controller state a gesture depends on.
pub struct GestureContext<'a> {
    pub enabled: bool,
    /// Recognizer bound to the on-screen keyboard.
    pub recognizer: Option<&'a mut dyn Recognizer>,
    pub shift: ShiftState,
    /// Locale of the alphabet keyboard; capitalization is skipped without one.
    pub locale: Option<&'a str>,
    pub auto_space: bool,
}

/// The host surfaces a gesture writes into.
pub struct TextTarget<'a> {
    pub connection: &'a mut dyn InputConnection,
    pub suggestions: &'a mut dyn SuggestionSink,
}

/// A word placed as composing text by the last finished gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGesture {
    pub word: String,
    /// Every candidate shown, best first. `word` is the first one.
    pub candidates: Vec<String>,
}

/// Result of a gesture that produced candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedGesture {
    pub word: String,
    pub candidates: Vec<String>,
    pub points: usize,
    /// Milliseconds between the first and last touch event.
    pub duration_ms: i64,
}

/// Tracks the gesture in progress and the last composed word.
#[derive(Debug, Default)]
pub struct GestureSession {
    machine: StateMachine,
    pending: Option<PendingGesture>,
    points: usize,
    started_at: Option<i64>,
    last_event_at: Option<i64>,
}

impl GestureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.machine.current()
    }

    pub fn is_capturing(&self) -> bool {
        self.machine.is_capturing()
    }

    /// Whether the last gesture left a word waiting for confirmation.
    pub fn gesture_performed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingGesture> {
        self.pending.as_ref()
    }

    /// Points captured for the gesture in progress.
    pub fn point_count(&self) -> usize {
        self.points
    }

    /// Begin a new gesture at `(x, y)` on `key`.
    ///
    /// Returns false, capturing nothing, when gesture typing is off, no
    /// recognizer is bound or the key cannot start a word. A false return
    /// means the touch is left to regular tap typing.
    pub fn start(
        &mut self,
        ctx: GestureContext<'_>,
        target: &mut TextTarget<'_>,
        key: &Key,
        x: i32,
        y: i32,
        event_time: i64,
    ) -> bool {
        if !ctx.enabled || !is_valid_gesture_start(key) {
            return false;
        }
        let Some(recognizer) = ctx.recognizer else {
            return false;
        };

        self.confirm(target, ctx.auto_space);

        recognizer.clear_gesture();
        if let Err(err) = self.machine.transition(GestureState::Capturing) {
            warn!(error = %err, "Could not start gesture");
            return false;
        }
        self.points = 0;
        self.started_at = Some(event_time);
        self.record_point(recognizer, x, y, event_time);

        debug!(key = key.primary_code, x, y, "Gesture started");
        true
    }

    /// Append a point to the gesture in progress. Silently ignored unless a
    /// gesture is being captured.
    pub fn input(&mut self, ctx: GestureContext<'_>, x: i32, y: i32, event_time: i64) {
        if !ctx.enabled || !self.machine.is_capturing() {
            return;
        }
        if let Some(recognizer) = ctx.recognizer {
            self.record_point(recognizer, x, y, event_time);
        }
    }

    fn record_point(&mut self, recognizer: &mut dyn Recognizer, x: i32, y: i32, event_time: i64) {
        recognizer.add_point(x, y);
        self.points += 1;
        self.last_event_at = Some(event_time);
    }

    /// Complete the gesture in progress.
    ///
    /// When the recognizer has candidates, the best one becomes composing
    /// text and the full list is published as suggestions. The recognizer's
    /// path is cleared and the session returns to Idle either way.
    pub fn finish(
        &mut self,
        ctx: GestureContext<'_>,
        target: &mut TextTarget<'_>,
    ) -> Option<ComposedGesture> {
        if !self.machine.is_capturing() {
            return None;
        }
        let recognizer = match ctx.recognizer {
            Some(recognizer) if ctx.enabled => recognizer,
            _ => {
                self.abandon();
                return None;
            }
        };

        let mut candidates = recognizer.candidates();
        let composed = if candidates.is_empty() {
            debug!(points = self.points, "Gesture produced no candidates");
            None
        } else {
            capitalize_candidates(
                &mut candidates,
                ctx.shift.is_active(),
                ctx.shift.is_locked(),
                ctx.locale,
            );
            compose_gesture_result(target.connection, target.suggestions, &candidates).map(
                |word| {
                    info!(
                        word = %word,
                        candidates = candidates.len(),
                        points = self.points,
                        "Gesture composed"
                    );
                    self.pending = Some(PendingGesture {
                        word: word.clone(),
                        candidates: candidates.clone(),
                    });
                    ComposedGesture {
                        word,
                        candidates,
                        points: self.points,
                        duration_ms: self.duration_ms(),
                    }
                },
            )
        };

        recognizer.clear_gesture();
        self.abandon();
        composed
    }

    /// Commit the word left by the last gesture, if any.
    ///
    /// Returns the committed word. Without a pending gesture this is a no-op.
    pub fn confirm(&mut self, target: &mut TextTarget<'_>, with_auto_space: bool) -> Option<String> {
        let pending = self.pending.take()?;
        trace!(word = %pending.word, with_auto_space, "Confirming last gesture");
        commit_word(
            target.connection,
            target.suggestions,
            &pending.word,
            with_auto_space,
        );
        Some(pending.word)
    }

    /// Handle a regular key press.
    ///
    /// A printable key typed right after a gesture confirms it first, with a
    /// trailing space unless the key is itself a space.
    pub fn on_key(
        &mut self,
        enabled: bool,
        primary_code: i32,
        target: &mut TextTarget<'_>,
        auto_space: bool,
    ) -> Option<String> {
        if !enabled || self.pending.is_none() || primary_code <= 0 {
            return None;
        }
        self.confirm(target, primary_code != key_codes::SPACE && auto_space)
    }

    /// Drop the gesture in progress and any pending word.
    pub fn reset(&mut self) {
        self.abandon();
        self.pending = None;
    }

    fn abandon(&mut self) {
        self.machine.reset();
        self.points = 0;
        self.started_at = None;
        self.last_event_at = None;
    }

    fn duration_ms(&self) -> i64 {
        match (self.started_at, self.last_event_at) {
            (Some(start), Some(last)) => (last - start).max(0),
            _ => 0,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ConnectionOp, MemoryConnection, MockRecognizer, RecordingSuggestions};
    use glide_core::types::LayoutKey;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    fn ctx<'a>(recognizer: Option<&'a mut dyn Recognizer>) -> GestureContext<'a> {
        GestureContext {
            enabled: true,
            recognizer,
            shift: ShiftState::Off,
            locale: Some("en"),
            auto_space: true,
        }
    }

    struct Host {
        connection: MemoryConnection,
        suggestions: RecordingSuggestions,
    }

    impl Host {
        fn new(text: &str) -> Self {
            Self {
                connection: MemoryConnection::with_text(text),
                suggestions: RecordingSuggestions::default(),
            }
        }

        fn target(&mut self) -> TextTarget<'_> {
            TextTarget {
                connection: &mut self.connection,
                suggestions: &mut self.suggestions,
            }
        }
    }

    fn letter(ch: char) -> Key {
        Key::letter(ch, 0, 0, 10, 10)
    }

    #[test]
    fn test_valid_gesture_start_keys() {
        assert!(is_valid_gesture_start(&letter('a')));
        assert!(is_valid_gesture_start(&letter('\'')));
        assert!(!is_valid_gesture_start(&letter(' ')));
        assert!(!is_valid_gesture_start(&letter('\n')));
        assert!(!is_valid_gesture_start(&Key::functional(
            key_codes::SHIFT,
            0,
            0,
            10,
            10
        )));
        // Functional flag wins even with a printable code.
        assert!(!is_valid_gesture_start(&Key::functional('a' as i32, 0, 0, 10, 10)));
        let mut zero = letter('a');
        zero.primary_code = 0;
        assert!(!is_valid_gesture_start(&zero));
    }

    #[test]
    fn test_start_rejected_when_disabled() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let handle = recognizer.handle(LayoutKey::new("q", 1, 1));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        let mut context = ctx(Some(&mut recognizer));
        context.enabled = false;
        assert!(!session.start(context, &mut host.target(), &letter('c'), 1, 2, 0));
        assert_eq!(session.state(), GestureState::Idle);
        assert!(handle.points().is_empty());
        assert_eq!(handle.clears(), 0);
    }

    #[test]
    fn test_start_rejected_without_recognizer() {
        let mut host = Host::new("");
        let mut session = GestureSession::new();
        assert!(!session.start(ctx(None), &mut host.target(), &letter('c'), 1, 2, 0));
        assert!(!session.is_capturing());
    }

    #[test]
    fn test_start_rejected_on_space() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let handle = recognizer.handle(LayoutKey::new("q", 1, 1));
        let mut host = Host::new("");
        let mut session = GestureSession::new();
        assert!(!session.start(
            ctx(Some(&mut recognizer)),
            &mut host.target(),
            &letter(' '),
            1,
            2,
            0
        ));
        assert!(handle.points().is_empty());
    }

    #[test]
    fn test_full_gesture_composes_best_candidate() {
        let mut recognizer = MockRecognizer::new(words(&["cat", "car"]));
        let handle = recognizer.handle(LayoutKey::new("q", 1, 1));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        assert!(session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 10, 10, 100));
        session.input(ctx(Some(&mut recognizer)), 20, 12, 120);
        session.input(ctx(Some(&mut recognizer)), 30, 14, 150);
        assert_eq!(handle.points(), vec![(10, 10), (20, 12), (30, 14)]);
        assert_eq!(session.point_count(), 3);

        let composed = session
            .finish(ctx(Some(&mut recognizer)), &mut host.target())
            .unwrap();
        assert_eq!(composed.word, "cat");
        assert_eq!(composed.candidates, words(&["cat", "car"]));
        assert_eq!(composed.points, 3);
        assert_eq!(composed.duration_ms, 50);

        assert_eq!(host.connection.composing(), Some("cat"));
        assert_eq!(host.suggestions.suggestions, words(&["cat", "car"]));
        assert!(session.gesture_performed());
        assert_eq!(session.state(), GestureState::Idle);
        // Cleared once on start and once on finish.
        assert_eq!(handle.clears(), 2);
        assert!(handle.points().is_empty());
    }

    #[test]
    fn test_finish_without_candidates_still_clears() {
        let mut recognizer = MockRecognizer::new(vec![]);
        let handle = recognizer.handle(LayoutKey::new("q", 1, 1));
        let mut host = Host::new("abc");
        let mut session = GestureSession::new();

        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('x'), 0, 0, 0);
        assert!(session
            .finish(ctx(Some(&mut recognizer)), &mut host.target())
            .is_none());
        assert_eq!(handle.clears(), 2);
        assert!(!session.gesture_performed());
        assert!(host.connection.ops().is_empty());
        assert_eq!(session.state(), GestureState::Idle);
    }

    #[test]
    fn test_finish_applies_shift_state() {
        let mut recognizer = MockRecognizer::new(words(&["hello", "world"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('h'), 0, 0, 0);
        let mut context = ctx(Some(&mut recognizer));
        context.shift = ShiftState::Locked;
        let composed = session.finish(context, &mut host.target()).unwrap();
        assert_eq!(composed.candidates, words(&["HELLO", "WORLD"]));
        assert_eq!(host.connection.composing(), Some("HELLO"));
    }

    #[test]
    fn test_finish_without_locale_keeps_case() {
        let mut recognizer = MockRecognizer::new(words(&["hello"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('h'), 0, 0, 0);
        let mut context = ctx(Some(&mut recognizer));
        context.shift = ShiftState::Shifted;
        context.locale = None;
        let composed = session.finish(context, &mut host.target()).unwrap();
        assert_eq!(composed.word, "hello");
    }

    #[test]
    fn test_input_and_finish_while_idle_are_noops() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let handle = recognizer.handle(LayoutKey::new("q", 1, 1));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        session.input(ctx(Some(&mut recognizer)), 1, 1, 0);
        assert!(handle.points().is_empty());
        assert!(session
            .finish(ctx(Some(&mut recognizer)), &mut host.target())
            .is_none());
        assert_eq!(handle.clears(), 0);
        assert!(host.connection.ops().is_empty());
    }

    #[test]
    fn test_finish_after_disable_abandons_gesture() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);
        let mut context = ctx(Some(&mut recognizer));
        context.enabled = false;
        assert!(session.finish(context, &mut host.target()).is_none());
        assert_eq!(session.state(), GestureState::Idle);
        assert!(host.connection.ops().is_empty());
    }

    #[test]
    fn test_new_gesture_confirms_pending_word() {
        let mut recognizer = MockRecognizer::new(words(&["cat", "car"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();

        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);
        session.finish(ctx(Some(&mut recognizer)), &mut host.target());
        assert_eq!(host.connection.text(), "cat");

        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 10);
        assert_eq!(host.connection.committed(), "cat ");
        assert_eq!(host.connection.composing(), None);
        assert!(!session.gesture_performed());

        session.finish(ctx(Some(&mut recognizer)), &mut host.target());
        // The auto space already separates the words.
        assert_eq!(host.connection.text(), "cat cat");
    }

    #[test]
    fn test_confirm_without_pending_is_noop() {
        let mut host = Host::new("abc");
        let mut session = GestureSession::new();
        assert!(session.confirm(&mut host.target(), true).is_none());
        assert!(host.connection.ops().is_empty());
    }

    #[test]
    fn test_on_key_confirms_printable_keys() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();
        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);
        session.finish(ctx(Some(&mut recognizer)), &mut host.target());

        // Functional keys leave the gesture pending.
        assert!(session
            .on_key(true, key_codes::SHIFT, &mut host.target(), true)
            .is_none());
        assert!(session.gesture_performed());

        let confirmed = session.on_key(true, 'x' as i32, &mut host.target(), true);
        assert_eq!(confirmed.as_deref(), Some("cat"));
        assert_eq!(host.connection.committed(), "cat ");
        assert!(host.connection.ops().contains(&ConnectionOp::Commit("cat".into())));
    }

    #[test]
    fn test_on_key_space_confirms_without_auto_space() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();
        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);
        session.finish(ctx(Some(&mut recognizer)), &mut host.target());

        session.on_key(true, key_codes::SPACE, &mut host.target(), true);
        // The space key itself supplies the separator.
        assert_eq!(host.connection.committed(), "cat");
    }

    #[test]
    fn test_on_key_ignored_when_disabled() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();
        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);
        session.finish(ctx(Some(&mut recognizer)), &mut host.target());

        assert!(session
            .on_key(false, 'x' as i32, &mut host.target(), true)
            .is_none());
        assert!(session.gesture_performed());
    }

    #[test]
    fn test_reset_drops_capture_and_pending() {
        let mut recognizer = MockRecognizer::new(words(&["cat"]));
        let mut host = Host::new("");
        let mut session = GestureSession::new();
        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);
        session.finish(ctx(Some(&mut recognizer)), &mut host.target());
        session.start(ctx(Some(&mut recognizer)), &mut host.target(), &letter('c'), 0, 0, 0);

        session.reset();
        assert_eq!(session.state(), GestureState::Idle);
        assert!(!session.gesture_performed());
        assert_eq!(session.point_count(), 0);
    }
}
