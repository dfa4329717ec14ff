//! Fan-in of concurrently loading dictionaries into one corpus.
//!
//! Every dictionary that starts loading for a keyboard bumps an outstanding
//! count; every terminal call (done or failed) lowers it. When the count
//! returns to zero the accumulated batches are handed to the completion
//! callback exactly once and the accumulator starts over empty.
//!
//! The count and the accumulator sit behind the same mutex, so a batch can
//! never be appended after the corpus it belongs to was delivered. The
//! callback itself runs outside the lock, on whichever thread performed the
//! terminal decrement.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, warn};

use glide_core::error::{GlideError, Result};
use glide_core::types::{corpus_word_count, DictionaryId, LayoutKey, WordBatch, WordCorpus};

/// Receives progress from the external dictionary loader.
///
/// Calls for different dictionaries interleave arbitrarily and come from
/// independent tasks. For a single dictionary, `on_load_started` always
/// precedes its own `on_load_done` or `on_load_failed`.
pub trait DictionaryLoadListener: Send + Sync {
    fn on_load_started(&self, dictionary: &DictionaryId) -> Result<()>;

    fn on_load_done(&self, dictionary: &DictionaryId, batch: WordBatch) -> Result<()>;

    fn on_load_failed(
        &self,
        dictionary: &DictionaryId,
        cause: &(dyn std::error::Error + Send + Sync),
    ) -> Result<()>;
}

/// Invoked with the target layout and the merged corpus.
pub type CompletionFn = Box<dyn Fn(&LayoutKey, WordCorpus) + Send + Sync>;

/// Invoked with the failed dictionary and the rendered cause.
pub type FailureFn = Box<dyn Fn(&DictionaryId, &str) + Send + Sync>;

#[derive(Debug, Default)]
struct AggregationState {
    outstanding: usize,
    batches: WordCorpus,
}

/// Merges the word lists of one keyboard's dictionaries.
pub struct DictionaryAggregator {
    layout: LayoutKey,
    state: Mutex<AggregationState>,
    on_complete: CompletionFn,
    on_failure: Option<FailureFn>,
    completions: AtomicUsize,
}

impl std::fmt::Debug for DictionaryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryAggregator")
            .field("layout", &self.layout)
            .field("state", &self.state)
            .field("completions", &self.completions.load(Ordering::Relaxed))
            .finish()
    }
}

impl DictionaryAggregator {
    pub fn new(layout: LayoutKey, on_complete: CompletionFn) -> Self {
        Self {
            layout,
            state: Mutex::new(AggregationState::default()),
            on_complete,
            on_failure: None,
            completions: AtomicUsize::new(0),
        }
    }

    /// Also report each failed dictionary, before it is counted as finished.
    pub fn with_failure_hook(mut self, on_failure: FailureFn) -> Self {
        self.on_failure = Some(on_failure);
        self
    }

    pub fn layout(&self) -> &LayoutKey {
        &self.layout
    }

    /// Dictionaries started but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.state.lock().map(|s| s.outstanding).unwrap_or(0)
    }

    /// How many times the completion callback has fired.
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, AggregationState>> {
        self.state
            .lock()
            .map_err(|e| GlideError::Aggregation(format!("Aggregator mutex poisoned: {}", e)))
    }

    /// Shared terminal path for done and failed loads.
    ///
    /// A rejected batch is reported only after the count was lowered, so a
    /// malformed payload can never stall completion.
    fn finish_one(&self, dictionary: &DictionaryId, batch: Option<WordBatch>) -> Result<()> {
        let mut rejected = None;
        let completed = {
            let mut state = self.lock()?;
            if state.outstanding == 0 {
                warn!(dictionary = %dictionary, layout = %self.layout, "Load finished without a matching start");
                return Err(GlideError::UnbalancedLoad {
                    dictionary: dictionary.to_string(),
                });
            }

            if let Some(batch) = batch {
                if batch.is_empty() {
                    debug!(dictionary = %dictionary, "Dictionary produced no words");
                } else if batch.is_consistent() {
                    debug!(dictionary = %dictionary, words = batch.len(), "Dictionary words accumulated");
                    state.batches.push(batch);
                } else {
                    let err = GlideError::InvalidPayload {
                        dictionary: dictionary.to_string(),
                        words: batch.words.len(),
                        frequencies: batch.frequencies.len(),
                    };
                    error!(error = %err, "Rejected dictionary payload");
                    rejected = Some(err);
                }
            }

            state.outstanding -= 1;
            if state.outstanding == 0 {
                Some(std::mem::take(&mut state.batches))
            } else {
                None
            }
        };

        if let Some(corpus) = completed {
            debug!(
                layout = %self.layout,
                batches = corpus.len(),
                words = corpus_word_count(&corpus),
                "All dictionaries finished loading"
            );
            self.completions.fetch_add(1, Ordering::SeqCst);
            (self.on_complete)(&self.layout, corpus);
        }

        match rejected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl DictionaryLoadListener for DictionaryAggregator {
    fn on_load_started(&self, dictionary: &DictionaryId) -> Result<()> {
        let mut state = self.lock()?;
        state.outstanding += 1;
        debug!(dictionary = %dictionary, outstanding = state.outstanding, "Dictionary loading started");
        Ok(())
    }

    fn on_load_done(&self, dictionary: &DictionaryId, batch: WordBatch) -> Result<()> {
        self.finish_one(dictionary, Some(batch))
    }

    fn on_load_failed(
        &self,
        dictionary: &DictionaryId,
        cause: &(dyn std::error::Error + Send + Sync),
    ) -> Result<()> {
        error!(dictionary = %dictionary, error = %cause, "Dictionary loading failed");
        if let Some(on_failure) = &self.on_failure {
            on_failure(dictionary, &cause.to_string());
        }
        self.finish_one(dictionary, None)
    }
}

// =============================================================================
// Tests
// =============================================================================
