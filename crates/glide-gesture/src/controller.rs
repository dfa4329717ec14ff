//! UI-thread façade tying the gesture-typing pieces together.
//!
//! `GestureTyping` owns the detector registry, the readiness tracker and the
//! gesture session, and reacts to the host's keyboard lifecycle the way an
//! input-method service drives it. Dictionary loads complete on background
//! tasks; their merged corpus comes back through a channel and is applied in
//! `pump`, which the host calls from its UI loop.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use glide_core::config::{GestureConfig, GlideConfig};
use glide_core::error::Result;
use glide_core::events::GestureEvent;
use glide_core::types::{
    corpus_word_count, Key, KeyboardDescriptor, LayoutKey, LoadingState, ShiftState, Timestamp,
    WordCorpus,
};

use crate::aggregator::DictionaryAggregator;
use crate::readiness::{Gate, ReadinessChange, ReadinessTracker};
use crate::recognizer::RecognizerFactory;
use crate::registry::{Activation, DetectorRegistry, Eviction};
use crate::session::{ComposedGesture, GestureContext, GestureSession, TextTarget};
use crate::text_commit::{InputConnection, SuggestionSink};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Gesture indicator shown on the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Gesture typing is on and the recognizer can run.
    Ready,
    /// Gesture typing is on but the recognizer is still loading.
    NotLoaded,
    /// Nothing to show.
    Hidden,
}

/// Messages sent from dictionary-loading tasks back to the UI thread.
#[derive(Debug)]
enum LoaderMessage {
    Completed(LayoutKey, WordCorpus),
    Failed { dictionary: String, reason: String },
}

/// Gesture-typing integration for one input-method instance.
pub struct GestureTyping {
    config: GestureConfig,
    registry: DetectorRegistry,
    tracker: ReadinessTracker,
    session: GestureSession,
    keyboard: Option<KeyboardDescriptor>,
    shift: ShiftState,
    loader_tx: mpsc::UnboundedSender<LoaderMessage>,
    loader_rx: mpsc::UnboundedReceiver<LoaderMessage>,
    events: broadcast::Sender<GestureEvent>,
    power_saving_source: Option<watch::Receiver<bool>>,
    preference_source: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for GestureTyping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureTyping")
            .field("enabled", &self.is_enabled())
            .field("ready", &self.is_ready())
            .field("registry", &self.registry)
            .field("session", &self.session)
            .field("keyboard", &self.keyboard.as_ref().map(|k| k.layout_key()))
            .finish()
    }
}

/// Build the per-call gesture context from disjoint controller fields.
fn context<'a>(
    registry: &'a mut DetectorRegistry,
    keyboard: Option<&'a KeyboardDescriptor>,
    enabled: bool,
    shift: ShiftState,
    auto_space: bool,
) -> GestureContext<'a> {
    GestureContext {
        enabled,
        recognizer: registry.current_mut(),
        shift,
        locale: keyboard.and_then(|k| k.locale.as_deref()),
        auto_space,
    }
}

impl GestureTyping {
    /// Create the controller and apply the initial preference and
    /// power-saving values from `config`.
    pub fn new(config: &GlideConfig, factory: Box<dyn RecognizerFactory>) -> Self {
        let (loader_tx, loader_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut controller = Self {
            config: config.gesture.clone(),
            registry: DetectorRegistry::new(factory),
            tracker: ReadinessTracker::new(),
            session: GestureSession::new(),
            keyboard: None,
            shift: ShiftState::Off,
            loader_tx,
            loader_rx,
            events,
            power_saving_source: None,
            preference_source: None,
        };
        controller.set_power_saving(config.power.power_saving);
        controller.set_preference(config.gesture.enabled);
        controller
    }

    /// Subscribe to the domain events emitted by this controller.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GestureEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: GestureEvent) {
        debug!(event = event.event_name(), "Gesture event");
        // Having no subscriber is fine.
        let _ = self.events.send(event);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn is_enabled(&self) -> bool {
        self.tracker.is_enabled()
    }

    /// Whether the current recognizer has its corpus loaded.
    pub fn is_ready(&self) -> bool {
        self.tracker.is_ready()
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn session(&self) -> &GestureSession {
        &self.session
    }

    pub fn set_shift_state(&mut self, shift: ShiftState) {
        self.shift = shift;
    }

    /// Which gesture indicator the keyboard should draw.
    pub fn watermark(&self) -> Watermark {
        if !self.is_enabled() {
            Watermark::Hidden
        } else if self.is_ready() {
            Watermark::Ready
        } else if self.registry.current_layout().is_some() {
            Watermark::NotLoaded
        } else {
            Watermark::Hidden
        }
    }

    // -------------------------------------------------------------------------
    // Enabled state
    // -------------------------------------------------------------------------

    pub fn set_power_saving(&mut self, power_saving: bool) {
        if let Some(gate) = self.tracker.set_power_saving(power_saving) {
            self.apply_gate(gate);
        }
    }

    pub fn set_preference(&mut self, enabled: bool) {
        if let Some(gate) = self.tracker.set_preference(enabled) {
            self.apply_gate(gate);
        }
    }

    /// Follow a power-saving signal. The current value is applied now, later
    /// ones in `pump`.
    pub fn attach_power_saving_source(&mut self, mut source: watch::Receiver<bool>) {
        let power_saving = *source.borrow_and_update();
        self.power_saving_source = Some(source);
        self.set_power_saving(power_saving);
    }

    /// Follow a preference signal. The current value is applied now, later
    /// ones in `pump`.
    pub fn attach_preference_source(&mut self, mut source: watch::Receiver<bool>) {
        let enabled = *source.borrow_and_update();
        self.preference_source = Some(source);
        self.set_preference(enabled);
    }

    fn apply_gate(&mut self, gate: Gate) {
        let enabled = gate.is_enabled();
        let was_enabled = self.registry.is_enabled();
        let evicted = self.registry.set_enabled(enabled);
        self.emit_evictions(evicted);
        if was_enabled != enabled {
            self.emit(GestureEvent::EnabledChanged {
                enabled,
                timestamp: Timestamp::now(),
            });
        }

        if enabled {
            self.setup_current_keyboard();
        } else {
            self.session.reset();
        }
    }

    // -------------------------------------------------------------------------
    // Keyboard lifecycle
    // -------------------------------------------------------------------------

    /// An alphabet keyboard became visible.
    pub fn on_alphabet_keyboard_set(&mut self, keyboard: KeyboardDescriptor) {
        debug!(layout = %keyboard.layout_key(), "Alphabet keyboard set");
        self.keyboard = Some(keyboard);
        self.tracker.dispose();
        if self.is_enabled() {
            self.setup_current_keyboard();
        }
    }

    /// A symbols keyboard replaced the alphabet one. The alphabet detector
    /// stays cached for when the user switches back.
    pub fn on_symbols_keyboard_set(&mut self) {
        debug!("Symbols keyboard set, unbinding gesture detector");
        self.tracker.dispose();
        self.registry.clear_current();
        self.session.reset();
    }

    /// The host is short on memory.
    pub fn on_low_memory(&mut self) {
        let evicted = self.registry.evict_unused();
        self.emit_evictions(evicted);
    }

    /// Keyboard add-ons changed in a way that invalidates every layout.
    pub fn on_add_ons_critical_change(&mut self) {
        info!("Keyboard add-ons changed, destroying all gesture detectors");
        self.tracker.dispose();
        self.session.reset();
        let evicted = self.registry.on_critical_configuration_change();
        self.emit_evictions(evicted);
    }

    fn setup_current_keyboard(&mut self) {
        let Some(keyboard) = self.keyboard.as_ref() else {
            return;
        };
        let Some(activation) = self.registry.activate_layout(keyboard) else {
            return;
        };
        self.emit_activation(&activation);

        if let Some(entry) = self.registry.current_entry() {
            let change = self.tracker.subscribe(entry.readiness());
            self.emit_readiness(change);
        }
    }

    // -------------------------------------------------------------------------
    // Dictionaries
    // -------------------------------------------------------------------------

    /// Listener to hand to the dictionary loader for `keyboard`.
    ///
    /// `None` when gesture typing is off or the current detector already has
    /// its words; the host then keeps its regular listener.
    pub fn dictionary_listener(
        &self,
        keyboard: &KeyboardDescriptor,
    ) -> Option<Arc<DictionaryAggregator>> {
        if !self.is_enabled() || self.is_ready() {
            return None;
        }

        let completed_tx = self.loader_tx.clone();
        let failed_tx = self.loader_tx.clone();
        let aggregator = DictionaryAggregator::new(
            keyboard.layout_key(),
            Box::new(move |layout, corpus| {
                if completed_tx
                    .send(LoaderMessage::Completed(layout.clone(), corpus))
                    .is_err()
                {
                    debug!(layout = %layout, "Controller gone, dropping loaded corpus");
                }
            }),
        )
        .with_failure_hook(Box::new(move |dictionary, reason| {
            let _ = failed_tx.send(LoaderMessage::Failed {
                dictionary: dictionary.to_string(),
                reason: reason.to_string(),
            });
        }));

        Some(Arc::new(aggregator))
    }

    /// Apply everything that arrived from other threads.
    ///
    /// Polls the enabled-state sources, hands loaded corpora to their
    /// detectors and picks up readiness changes. Returns the number of
    /// corpora delivered. A corpus arriving while gesture typing is off or no
    /// detector is current is dropped. A corpus for a layout with no cached
    /// detector otherwise is an error; the remaining messages are still
    /// applied.
    pub fn pump(&mut self) -> Result<usize> {
        self.poll_sources();

        let mut delivered = 0;
        let mut outcome = Ok(());
        while let Ok(message) = self.loader_rx.try_recv() {
            match message {
                LoaderMessage::Completed(layout, corpus) => {
                    if !self.is_enabled() || self.registry.current_layout().is_none() {
                        debug!(
                            %layout,
                            enabled = self.is_enabled(),
                            "Dropping corpus, no detector is current"
                        );
                        continue;
                    }
                    let batches = corpus.len();
                    let words = corpus_word_count(&corpus);
                    match self.registry.deliver_words(&layout, corpus) {
                        Ok(()) => {
                            delivered += 1;
                            self.emit(GestureEvent::CorpusDelivered {
                                layout,
                                batches,
                                words,
                                timestamp: Timestamp::now(),
                            });
                        }
                        Err(err) => outcome = Err(err),
                    }
                }
                LoaderMessage::Failed { dictionary, reason } => {
                    self.emit(GestureEvent::DictionaryLoadFailed {
                        dictionary,
                        reason,
                        timestamp: Timestamp::now(),
                    });
                }
            }
        }

        if let Some(change) = self.tracker.poll() {
            self.emit_readiness(change);
        }

        outcome.map(|()| delivered)
    }

    fn poll_sources(&mut self) {
        if let Some(power_saving) = poll_source(&mut self.power_saving_source, "power saving") {
            self.set_power_saving(power_saving);
        }
        if let Some(enabled) = poll_source(&mut self.preference_source, "preference") {
            self.set_preference(enabled);
        }
    }

    // -------------------------------------------------------------------------
    // Gestures
    // -------------------------------------------------------------------------

    /// First touch of a potential gesture. False means the touch is left to
    /// regular typing.
    pub fn gesture_start(
        &mut self,
        x: i32,
        y: i32,
        key: &Key,
        event_time: i64,
        connection: &mut dyn InputConnection,
        suggestions: &mut dyn SuggestionSink,
    ) -> bool {
        let pending = self.session.pending().map(|p| p.word.clone());
        let auto_space = self.config.auto_space;
        let ctx = context(
            &mut self.registry,
            self.keyboard.as_ref(),
            self.tracker.is_enabled(),
            self.shift,
            auto_space,
        );
        let mut target = TextTarget {
            connection,
            suggestions,
        };
        let started = self
            .session
            .start(ctx, &mut target, key, x, y, event_time);

        if started {
            if let Some(word) = pending {
                self.emit(GestureEvent::GestureConfirmed {
                    word,
                    auto_space,
                    timestamp: Timestamp::now(),
                });
            }
        }
        started
    }

    pub fn gesture_input(&mut self, x: i32, y: i32, event_time: i64) {
        let ctx = context(
            &mut self.registry,
            self.keyboard.as_ref(),
            self.tracker.is_enabled(),
            self.shift,
            self.config.auto_space,
        );
        self.session.input(ctx, x, y, event_time);
    }

    /// The finger was lifted.
    pub fn gesture_done(
        &mut self,
        connection: &mut dyn InputConnection,
        suggestions: &mut dyn SuggestionSink,
    ) -> Option<ComposedGesture> {
        let ctx = context(
            &mut self.registry,
            self.keyboard.as_ref(),
            self.tracker.is_enabled(),
            self.shift,
            self.config.auto_space,
        );
        let mut target = TextTarget {
            connection,
            suggestions,
        };
        let composed = self.session.finish(ctx, &mut target)?;
        self.emit(GestureEvent::GestureCommitted {
            word: composed.word.clone(),
            candidates: composed.candidates.len(),
            timestamp: Timestamp::now(),
        });
        Some(composed)
    }

    /// Commit the word left composing by the last gesture, if any.
    pub fn confirm_last_gesture(
        &mut self,
        connection: &mut dyn InputConnection,
        suggestions: &mut dyn SuggestionSink,
    ) -> Option<String> {
        let auto_space = self.config.auto_space;
        let mut target = TextTarget {
            connection,
            suggestions,
        };
        let word = self.session.confirm(&mut target, auto_space)?;
        self.emit_confirmed(&word, auto_space);
        Some(word)
    }

    /// A regular key was pressed. Confirms a pending gesture word first when
    /// the key is printable.
    pub fn on_key(
        &mut self,
        primary_code: i32,
        connection: &mut dyn InputConnection,
        suggestions: &mut dyn SuggestionSink,
    ) -> Option<String> {
        let with_auto_space = primary_code != glide_core::types::key_codes::SPACE
            && self.config.auto_space;
        let mut target = TextTarget {
            connection,
            suggestions,
        };
        let word = self.session.on_key(
            self.tracker.is_enabled(),
            primary_code,
            &mut target,
            self.config.auto_space,
        )?;
        self.emit_confirmed(&word, with_auto_space);
        Some(word)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    fn emit_confirmed(&self, word: &str, auto_space: bool) {
        self.emit(GestureEvent::GestureConfirmed {
            word: word.to_string(),
            auto_space,
            timestamp: Timestamp::now(),
        });
    }

    fn emit_activation(&self, activation: &Activation) {
        if activation.created {
            self.emit(GestureEvent::DetectorCreated {
                entry_id: activation.entry_id,
                layout: activation.layout.clone(),
                timestamp: Timestamp::now(),
            });
        }
    }

    fn emit_evictions(&self, evicted: Vec<Eviction>) {
        for eviction in evicted {
            self.emit(GestureEvent::DetectorDestroyed {
                entry_id: eviction.entry_id,
                layout: eviction.layout,
                reason: eviction.reason,
                timestamp: Timestamp::now(),
            });
        }
    }

    fn emit_readiness(&self, change: ReadinessChange) {
        self.emit(GestureEvent::ReadinessChanged {
            state: change.state.unwrap_or(LoadingState::Unloaded),
            ready: change.ready,
            timestamp: Timestamp::now(),
        });
    }
}

/// Take the latest value of a signal source, dropping it once closed.
fn poll_source(source: &mut Option<watch::Receiver<bool>>, name: &str) -> Option<bool> {
    let receiver = source.as_mut()?;
    match receiver.has_changed() {
        Ok(true) => Some(*receiver.borrow_and_update()),
        Ok(false) => None,
        Err(_) => {
            warn!(source = name, "Signal source closed, keeping last value");
            *source = None;
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
