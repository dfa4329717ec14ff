//! Cache of gesture recognizers, one per keyboard layout.
//!
//! Recognizers are expensive to build, so the registry keeps one per
//! `LayoutKey` and hands out the one bound to the on-screen alphabet keyboard
//! as "current". The map is the sole owner of every recognizer; "current" is
//! only a key into it. The registry is driven from the UI thread exclusively.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use glide_core::error::{GlideError, Result};
use glide_core::types::{
    corpus_word_count, EvictionReason, KeyboardDescriptor, LayoutKey, LoadingState, WordCorpus,
};

use crate::recognizer::{Recognizer, RecognizerFactory};

/// A cached recognizer and its bookkeeping.
pub struct RecognizerEntry {
    id: Uuid,
    created_at: DateTime<Utc>,
    recognizer: Box<dyn Recognizer>,
}

impl RecognizerEntry {
    fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            recognizer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest loading state reported by the recognizer.
    pub fn loading_state(&self) -> LoadingState {
        *self.recognizer.readiness().borrow()
    }

    pub fn readiness(&self) -> watch::Receiver<LoadingState> {
        self.recognizer.readiness()
    }

    pub fn recognizer_mut(&mut self) -> &mut dyn Recognizer {
        self.recognizer.as_mut()
    }

    fn destroy(self) {
        let lifetime_ms = (Utc::now() - self.created_at).num_milliseconds();
        debug!(entry_id = %self.id, lifetime_ms, "Releasing recognizer");
        self.recognizer.destroy();
    }
}

impl std::fmt::Debug for RecognizerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerEntry")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("loading_state", &self.loading_state())
            .finish()
    }
}

/// Outcome of activating a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub layout: LayoutKey,
    pub entry_id: Uuid,
    /// Whether a new recognizer had to be built.
    pub created: bool,
}

/// A recognizer that was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub layout: LayoutKey,
    pub entry_id: Uuid,
    pub reason: EvictionReason,
}

/// Owns every cached recognizer and tracks the current one.
pub struct DetectorRegistry {
    entries: HashMap<LayoutKey, RecognizerEntry>,
    current: Option<LayoutKey>,
    enabled: bool,
    factory: Box<dyn RecognizerFactory>,
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("entries", &self.entries)
            .field("current", &self.current)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl DetectorRegistry {
    /// Create an empty, disabled registry.
    pub fn new(factory: Box<dyn RecognizerFactory>) -> Self {
        Self {
            entries: HashMap::new(),
            current: None,
            enabled: false,
            factory,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, layout: &LayoutKey) -> bool {
        self.entries.contains_key(layout)
    }

    pub fn entry(&self, layout: &LayoutKey) -> Option<&RecognizerEntry> {
        self.entries.get(layout)
    }

    pub fn current_layout(&self) -> Option<&LayoutKey> {
        self.current.as_ref()
    }

    pub fn current_entry(&self) -> Option<&RecognizerEntry> {
        self.current.as_ref().and_then(|key| self.entries.get(key))
    }

    /// The recognizer bound to the on-screen keyboard, if any.
    pub fn current_mut(&mut self) -> Option<&mut dyn Recognizer> {
        let key = self.current.as_ref()?;
        self.entries.get_mut(key).map(RecognizerEntry::recognizer_mut)
    }

    /// Turn gesture typing on or off.
    ///
    /// Switching off destroys every cached recognizer. Switching on creates
    /// nothing; the next layout activation does.
    pub fn set_enabled(&mut self, enabled: bool) -> Vec<Eviction> {
        let was_enabled = std::mem::replace(&mut self.enabled, enabled);
        if was_enabled == enabled {
            return Vec::new();
        }
        info!(enabled, "Gesture detectors {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            Vec::new()
        } else {
            self.destroy_all(EvictionReason::Disabled)
        }
    }

    /// Make the recognizer for `keyboard` current, creating it if needed.
    ///
    /// Returns `None` while disabled.
    pub fn activate_layout(&mut self, keyboard: &KeyboardDescriptor) -> Option<Activation> {
        if !self.enabled {
            debug!(layout = %keyboard.layout_key(), "Gesture typing disabled, not activating layout");
            return None;
        }

        let layout = keyboard.layout_key();
        let created = !self.entries.contains_key(&layout);
        let factory = &self.factory;
        let entry = self.entries.entry(layout.clone()).or_insert_with(|| {
            RecognizerEntry::new(factory.create(keyboard))
        });
        let entry_id = entry.id;

        if created {
            info!(layout = %layout, entry_id = %entry_id, "Gesture detector created");
        } else {
            debug!(layout = %layout, entry_id = %entry_id, "Reusing cached gesture detector");
        }

        self.current = Some(layout.clone());
        Some(Activation {
            layout,
            entry_id,
            created,
        })
    }

    /// Unbind the current recognizer without destroying it.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Destroy every recognizer except the current one.
    ///
    /// Without a current recognizer everything goes.
    pub fn evict_unused(&mut self) -> Vec<Eviction> {
        let Some(current) = self.current.clone() else {
            return self.destroy_all(EvictionReason::MemoryPressure);
        };

        let unused: Vec<LayoutKey> = self
            .entries
            .keys()
            .filter(|key| **key != current)
            .cloned()
            .collect();

        let evicted: Vec<Eviction> = unused
            .into_iter()
            .filter_map(|key| self.destroy_entry(key, EvictionReason::MemoryPressure))
            .collect();

        info!(evicted = evicted.len(), kept = %current, "Evicted unused gesture detectors");
        evicted
    }

    /// Destroy everything, the current recognizer included.
    pub fn on_critical_configuration_change(&mut self) -> Vec<Eviction> {
        self.destroy_all(EvictionReason::ConfigurationChange)
    }

    /// Hand a merged corpus to the recognizer of `layout`.
    ///
    /// The recognizer must exist: its absence means the lifecycle went wrong
    /// somewhere and is reported as `DetectorMissing`.
    pub fn deliver_words(&mut self, layout: &LayoutKey, corpus: WordCorpus) -> Result<()> {
        match self.entries.get_mut(layout) {
            Some(entry) => {
                debug!(
                    layout = %layout,
                    batches = corpus.len(),
                    words = corpus_word_count(&corpus),
                    "Delivering words to gesture detector"
                );
                entry.recognizer.set_words(corpus);
                Ok(())
            }
            None => {
                error!(layout = %layout, "Could not find gesture detector for layout");
                Err(GlideError::DetectorMissing {
                    key: layout.to_string(),
                })
            }
        }
    }

    fn destroy_all(&mut self, reason: EvictionReason) -> Vec<Eviction> {
        self.current = None;
        let evicted: Vec<Eviction> = self
            .entries
            .drain()
            .map(|(layout, entry)| {
                let entry_id = entry.id;
                entry.destroy();
                Eviction {
                    layout,
                    entry_id,
                    reason,
                }
            })
            .collect();
        if !evicted.is_empty() {
            info!(count = evicted.len(), ?reason, "Destroyed all gesture detectors");
        }
        evicted
    }

    fn destroy_entry(&mut self, layout: LayoutKey, reason: EvictionReason) -> Option<Eviction> {
        if self.current.as_ref() == Some(&layout) {
            return None;
        }
        let entry = self.entries.remove(&layout)?;
        let entry_id = entry.id;
        debug!(layout = %layout, entry_id = %entry_id, ?reason, "Destroying gesture detector");
        entry.destroy();
        Some(Eviction {
            layout,
            entry_id,
            reason,
        })
    }
}

impl Drop for DetectorRegistry {
    fn drop(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.destroy();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRecognizerFactory;
    use glide_core::types::{Key, WordBatch};

    fn keyboard(id: &str, width: u32) -> KeyboardDescriptor {
        KeyboardDescriptor {
            layout_id: id.to_string(),
            min_width: width,
            height: 400,
            locale: Some("en".to_string()),
            keys: vec![Key::letter('a', 0, 0, 10, 10)],
        }
    }

    fn enabled_registry() -> (DetectorRegistry, MockRecognizerFactory) {
        let factory = MockRecognizerFactory::new(&["cat"]);
        let mut registry = DetectorRegistry::new(Box::new(factory.clone()));
        registry.set_enabled(true);
        (registry, factory)
    }

    #[test]
    fn test_new_registry_is_empty_and_disabled() {
        let registry = DetectorRegistry::new(Box::new(MockRecognizerFactory::default()));
        assert!(registry.is_empty());
        assert!(!registry.is_enabled());
        assert!(registry.current_layout().is_none());
    }

    #[test]
    fn test_activation_while_disabled_creates_nothing() {
        let factory = MockRecognizerFactory::default();
        let mut registry = DetectorRegistry::new(Box::new(factory.clone()));
        assert!(registry.activate_layout(&keyboard("qwerty", 1080)).is_none());
        assert!(registry.is_empty());
        assert_eq!(factory.created_count(), 0);
    }

    #[test]
    fn test_enabling_does_not_create_eagerly() {
        let (registry, factory) = enabled_registry();
        assert!(registry.is_empty());
        assert_eq!(factory.created_count(), 0);
    }

    #[test]
    fn test_activate_creates_and_binds() {
        let (mut registry, factory) = enabled_registry();
        let activation = registry.activate_layout(&keyboard("qwerty", 1080)).unwrap();
        assert!(activation.created);
        assert_eq!(activation.layout, LayoutKey::new("qwerty", 1080, 400));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.current_layout(), Some(&activation.layout));
        assert!(registry.current_mut().is_some());
        assert_eq!(factory.created_count(), 1);
    }

    #[test]
    fn test_double_activation_yields_one_entry() {
        let (mut registry, factory) = enabled_registry();
        let first = registry.activate_layout(&keyboard("qwerty", 1080)).unwrap();
        let second = registry.activate_layout(&keyboard("qwerty", 1080)).unwrap();

        assert!(!second.created);
        assert_eq!(first.entry_id, second.entry_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(factory.created_count(), 1);
        assert_eq!(registry.current_layout(), Some(&first.layout));
    }

    #[test]
    fn test_switching_layouts_keeps_both_cached() {
        let (mut registry, _factory) = enabled_registry();
        let a = registry.activate_layout(&keyboard("qwerty", 1080)).unwrap();
        let b = registry.activate_layout(&keyboard("dvorak", 1080)).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.current_layout(), Some(&b.layout));

        let again = registry.activate_layout(&keyboard("qwerty", 1080)).unwrap();
        assert!(!again.created);
        assert_eq!(again.entry_id, a.entry_id);
    }

    #[test]
    fn test_disable_destroys_everything() {
        let (mut registry, factory) = enabled_registry();
        registry.activate_layout(&keyboard("a", 1));
        registry.activate_layout(&keyboard("b", 1));

        let evicted = registry.set_enabled(false);
        assert_eq!(evicted.len(), 2);
        assert!(evicted.iter().all(|e| e.reason == EvictionReason::Disabled));
        assert!(registry.is_empty());
        assert!(registry.current_layout().is_none());
        assert_eq!(factory.destroyed_count(), 2);
    }

    #[test]
    fn test_disable_twice_is_idempotent() {
        let (mut registry, factory) = enabled_registry();
        registry.activate_layout(&keyboard("a", 1));

        registry.set_enabled(false);
        let second = registry.set_enabled(false);
        assert!(second.is_empty());
        assert!(registry.is_empty());
        assert!(!registry.is_enabled());
        assert_eq!(factory.destroyed_count(), 1);
    }

    #[test]
    fn test_memory_pressure_keeps_current() {
        let (mut registry, factory) = enabled_registry();
        registry.activate_layout(&keyboard("a", 1));
        registry.activate_layout(&keyboard("b", 1));
        let current = registry.activate_layout(&keyboard("c", 1)).unwrap();

        let evicted = registry.evict_unused();
        assert_eq!(evicted.len(), 2);
        assert!(evicted
            .iter()
            .all(|e| e.reason == EvictionReason::MemoryPressure && e.layout != current.layout));
        assert_eq!(registry.len(), 1);
        assert_eq!(factory.destroyed_count(), 2);

        // The current entry is untouched and still queryable.
        assert_eq!(registry.current_layout(), Some(&current.layout));
        assert_eq!(registry.entry(&current.layout).unwrap().id(), current.entry_id);
        assert!(registry.current_mut().is_some());
        assert!(!factory.handle_for(&current.layout).unwrap().is_destroyed());
    }

    #[test]
    fn test_memory_pressure_without_current_destroys_all() {
        let (mut registry, factory) = enabled_registry();
        registry.activate_layout(&keyboard("a", 1));
        registry.activate_layout(&keyboard("b", 1));
        registry.clear_current();

        let evicted = registry.evict_unused();
        assert_eq!(evicted.len(), 2);
        assert!(registry.is_empty());
        assert_eq!(factory.destroyed_count(), 2);
    }

    #[test]
    fn test_critical_change_destroys_current_too() {
        let (mut registry, factory) = enabled_registry();
        registry.activate_layout(&keyboard("a", 1));
        registry.activate_layout(&keyboard("b", 1));

        let evicted = registry.on_critical_configuration_change();
        assert_eq!(evicted.len(), 2);
        assert!(evicted
            .iter()
            .all(|e| e.reason == EvictionReason::ConfigurationChange));
        assert!(registry.is_empty());
        assert!(registry.current_layout().is_none());
        assert_eq!(factory.destroyed_count(), 2);
        // Still enabled: the next activation builds a fresh recognizer.
        assert!(registry.activate_layout(&keyboard("a", 1)).unwrap().created);
    }

    #[test]
    fn test_clear_current_keeps_entry() {
        let (mut registry, factory) = enabled_registry();
        let activation = registry.activate_layout(&keyboard("a", 1)).unwrap();
        registry.clear_current();
        assert!(registry.current_mut().is_none());
        assert!(registry.contains(&activation.layout));
        assert_eq!(factory.destroyed_count(), 0);
    }

    #[test]
    fn test_deliver_words_reaches_recognizer() {
        let (mut registry, factory) = enabled_registry();
        let activation = registry.activate_layout(&keyboard("a", 1)).unwrap();
        let corpus = vec![WordBatch::new(vec!["cat".into()], vec![5])];

        registry.deliver_words(&activation.layout, corpus.clone()).unwrap();

        let handle = factory.handle_for(&activation.layout).unwrap();
        assert_eq!(handle.corpus(), Some(corpus));
        assert_eq!(
            registry.entry(&activation.layout).unwrap().loading_state(),
            LoadingState::Loaded
        );
    }

    #[test]
    fn test_deliver_words_to_missing_layout_fails_loudly() {
        let (mut registry, _factory) = enabled_registry();
        let result = registry.deliver_words(&LayoutKey::new("ghost", 1, 1), vec![]);
        match result {
            Err(GlideError::DetectorMissing { key }) => assert_eq!(key, "ghost,1,1"),
            other => panic!("Expected DetectorMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_destroys_remaining_entries() {
        let (mut registry, factory) = enabled_registry();
        registry.activate_layout(&keyboard("a", 1));
        drop(registry);
        assert_eq!(factory.destroyed_count(), 1);
    }
}
