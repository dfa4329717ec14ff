//! In-memory stand-ins for the host and the recognizer.
//!
//! Used by the test suites and by the command-line simulator, which has no
//! real text field to type into.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

use glide_core::types::{KeyboardDescriptor, LayoutKey, LoadingState, WordCorpus};

use crate::recognizer::{Recognizer, RecognizerFactory};
use crate::text_commit::{InputConnection, SuggestionSink};

// =============================================================================
// Recognizer
// =============================================================================

/// Everything a `MockRecognizer` was asked to do.
#[derive(Debug, Default)]
pub struct MockRecognizerLog {
    pub points: Vec<(i32, i32)>,
    pub clears: usize,
    pub set_words_calls: usize,
    pub corpus: Option<WordCorpus>,
    pub destroyed: bool,
}

/// Recognizer returning a scripted candidate list.
pub struct MockRecognizer {
    candidates: Vec<String>,
    auto_load: bool,
    log: Arc<Mutex<MockRecognizerLog>>,
    state: Arc<watch::Sender<LoadingState>>,
}

impl MockRecognizer {
    pub fn new(candidates: Vec<String>) -> Self {
        let (state, _) = watch::channel(LoadingState::Unloaded);
        Self {
            candidates,
            auto_load: true,
            log: Arc::new(Mutex::new(MockRecognizerLog::default())),
            state: Arc::new(state),
        }
    }

    /// Handle for inspecting the recognizer after it has been boxed away.
    pub fn handle(&self, layout: LayoutKey) -> MockHandle {
        MockHandle {
            layout,
            log: Arc::clone(&self.log),
            state: Arc::downgrade(&self.state),
        }
    }
}

impl Recognizer for MockRecognizer {
    fn add_point(&mut self, x: i32, y: i32) {
        self.log.lock().expect("mock log poisoned").points.push((x, y));
    }

    fn clear_gesture(&mut self) {
        let mut log = self.log.lock().expect("mock log poisoned");
        log.points.clear();
        log.clears += 1;
    }

    fn candidates(&mut self) -> Vec<String> {
        self.candidates.clone()
    }

    fn set_words(&mut self, corpus: WordCorpus) {
        {
            let mut log = self.log.lock().expect("mock log poisoned");
            log.set_words_calls += 1;
            log.corpus = Some(corpus);
        }
        if self.auto_load {
            self.state.send_replace(LoadingState::Loaded);
        } else {
            self.state.send_replace(LoadingState::Loading);
        }
    }

    fn readiness(&self) -> watch::Receiver<LoadingState> {
        self.state.subscribe()
    }

    fn destroy(self: Box<Self>) {
        self.log.lock().expect("mock log poisoned").destroyed = true;
    }
}

/// Test-side view of a `MockRecognizer` owned by a registry.
#[derive(Clone)]
pub struct MockHandle {
    pub layout: LayoutKey,
    log: Arc<Mutex<MockRecognizerLog>>,
    state: Weak<watch::Sender<LoadingState>>,
}

impl MockHandle {
    pub fn points(&self) -> Vec<(i32, i32)> {
        self.log.lock().expect("mock log poisoned").points.clone()
    }

    pub fn clears(&self) -> usize {
        self.log.lock().expect("mock log poisoned").clears
    }

    pub fn set_words_calls(&self) -> usize {
        self.log.lock().expect("mock log poisoned").set_words_calls
    }

    pub fn corpus(&self) -> Option<WordCorpus> {
        self.log.lock().expect("mock log poisoned").corpus.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.log.lock().expect("mock log poisoned").destroyed
    }

    /// Push a loading state, as the recognizer's background worker would.
    ///
    /// Returns false once the recognizer is gone.
    pub fn emit(&self, state: LoadingState) -> bool {
        match self.state.upgrade() {
            Some(sender) => {
                sender.send_replace(state);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct FactoryInner {
    candidates: Vec<String>,
    manual_loading: bool,
    created: Vec<MockHandle>,
}

/// Factory producing `MockRecognizer`s. Clones share the creation log.
#[derive(Clone, Default)]
pub struct MockRecognizerFactory {
    inner: Arc<Mutex<FactoryInner>>,
}

impl MockRecognizerFactory {
    pub fn new(candidates: &[&str]) -> Self {
        let factory = Self::default();
        factory.inner.lock().expect("mock factory poisoned").candidates =
            candidates.iter().map(|c| c.to_string()).collect();
        factory
    }

    /// Recognizers stay in `Loading` after `set_words` until a test emits
    /// a state through their handle.
    pub fn manual_loading(self) -> Self {
        self.inner.lock().expect("mock factory poisoned").manual_loading = true;
        self
    }

    pub fn created(&self) -> Vec<MockHandle> {
        self.inner.lock().expect("mock factory poisoned").created.clone()
    }

    pub fn created_count(&self) -> usize {
        self.inner.lock().expect("mock factory poisoned").created.len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.created().iter().filter(|h| h.is_destroyed()).count()
    }

    /// Most recent recognizer created for `layout`.
    pub fn handle_for(&self, layout: &LayoutKey) -> Option<MockHandle> {
        self.created()
            .into_iter()
            .rev()
            .find(|h| &h.layout == layout)
    }
}

impl RecognizerFactory for MockRecognizerFactory {
    fn create(&self, keyboard: &KeyboardDescriptor) -> Box<dyn Recognizer> {
        let mut inner = self.inner.lock().expect("mock factory poisoned");
        let mut recognizer = MockRecognizer::new(inner.candidates.clone());
        recognizer.auto_load = !inner.manual_loading;
        inner.created.push(recognizer.handle(keyboard.layout_key()));
        Box::new(recognizer)
    }
}

// =============================================================================
// Host text field
// =============================================================================

/// One call made on a `MemoryConnection`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionOp {
    BeginBatch,
    EndBatch,
    SetComposing(String),
    Commit(String),
}

/// In-memory text field with a composing region at the end.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    committed: String,
    composing: Option<String>,
    batch_depth: usize,
    ops: Vec<ConnectionOp>,
}

impl MemoryConnection {
    pub fn with_text(text: &str) -> Self {
        Self {
            committed: text.to_string(),
            ..Self::default()
        }
    }

    /// Committed text followed by the composing region.
    pub fn text(&self) -> String {
        let mut text = self.committed.clone();
        if let Some(composing) = &self.composing {
            text.push_str(composing);
        }
        text
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn composing(&self) -> Option<&str> {
        self.composing.as_deref()
    }

    pub fn batch_depth(&self) -> usize {
        self.batch_depth
    }

    pub fn ops(&self) -> &[ConnectionOp] {
        &self.ops
    }
}

impl InputConnection for MemoryConnection {
    fn begin_batch_edit(&mut self) {
        self.batch_depth += 1;
        self.ops.push(ConnectionOp::BeginBatch);
    }

    fn end_batch_edit(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.ops.push(ConnectionOp::EndBatch);
    }

    fn text_before_cursor(&self, n: usize) -> String {
        let text = self.text();
        let skip = text.chars().count().saturating_sub(n);
        text.chars().skip(skip).collect()
    }

    fn set_composing_text(&mut self, text: &str) {
        self.composing = Some(text.to_string());
        self.ops.push(ConnectionOp::SetComposing(text.to_string()));
    }

    fn commit_text(&mut self, text: &str) {
        self.composing = None;
        self.committed.push_str(text);
        self.ops.push(ConnectionOp::Commit(text.to_string()));
    }
}

/// Suggestion strip that remembers what it was shown.
#[derive(Debug, Default)]
pub struct RecordingSuggestions {
    pub suggestions: Vec<String>,
    pub cleared: usize,
    pub aborted: usize,
}

impl SuggestionSink for RecordingSuggestions {
    fn set_suggestions(&mut self, words: &[String]) {
        self.suggestions = words.to_vec();
    }

    fn clear_suggestions(&mut self) {
        self.suggestions.clear();
        self.cleared += 1;
    }

    fn abort_correction(&mut self) {
        self.aborted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_connection_text_before_cursor() {
        let mut ic = MemoryConnection::with_text("hello");
        assert_eq!(ic.text_before_cursor(2), "lo");
        ic.set_composing_text("wo");
        assert_eq!(ic.text_before_cursor(3), "owo");
        assert_eq!(ic.text_before_cursor(100), "hellowo");
    }

    #[test]
    fn test_memory_connection_commit_replaces_composing() {
        let mut ic = MemoryConnection::with_text("a ");
        ic.set_composing_text("ca");
        ic.commit_text("cat");
        assert_eq!(ic.text(), "a cat");
        assert_eq!(ic.composing(), None);
    }

    #[test]
    fn test_mock_handle_emit_after_destroy() {
        let recognizer = MockRecognizer::new(vec![]);
        let handle = recognizer.handle(LayoutKey::new("q", 1, 1));
        let rx = recognizer.readiness();
        assert!(handle.emit(LoadingState::Loading));
        assert_eq!(*rx.borrow(), LoadingState::Loading);

        Box::new(recognizer).destroy();
        assert!(handle.is_destroyed());
        assert!(!handle.emit(LoadingState::Loaded));
    }
}
