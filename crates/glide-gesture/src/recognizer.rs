//! The recognizer capability consumed by the gesture layer.
//!
//! A recognizer turns a captured touch path plus a word corpus into ranked
//! candidates. The integration layer never looks inside; it only relies on
//! the contract below.

use tokio::sync::watch;

use glide_core::types::{KeyboardDescriptor, LoadingState, WordCorpus};

/// Gesture recognition engine bound to one keyboard layout.
///
/// `add_point`, `clear_gesture` and `candidates` are only called from the UI
/// thread. `set_words` may be called at any time and affects only recognition
/// that happens afterwards.
pub trait Recognizer: Send {
    /// Append a point to the in-progress path. Must not block.
    fn add_point(&mut self, x: i32, y: i32);

    /// Discard the in-progress path.
    fn clear_gesture(&mut self);

    /// Ranked candidates for the current path, best first.
    fn candidates(&mut self) -> Vec<String>;

    /// Replace the corpus used for recognition.
    fn set_words(&mut self, corpus: WordCorpus);

    /// Subscribe to loading-state changes.
    ///
    /// The receiver starts at the current state. When the recognizer goes
    /// away the channel closes, which observers treat as "not ready".
    fn readiness(&self) -> watch::Receiver<LoadingState>;

    /// Release every resource held by the recognizer.
    ///
    /// Safe to call while a corpus is still being prepared in the background.
    fn destroy(self: Box<Self>);
}

/// Creates recognizers for newly activated layouts.
pub trait RecognizerFactory: Send {
    fn create(&self, keyboard: &KeyboardDescriptor) -> Box<dyn Recognizer>;
}
