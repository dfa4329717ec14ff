//! Reference shape-matching recognizer.
//!
//! Each corpus word is turned into the ideal path through its key centers on
//! the bound layout. A gesture is compared against every such template after
//! both are resampled to the same number of equidistant points; words are
//! ranked by mean point distance, nudged by a log-frequency bonus.
//!
//! Template preparation is CPU-bound. With a tokio runtime handle it runs on
//! the blocking pool and the UI thread only sees the readiness stream move;
//! without one it runs inline inside `set_words`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use glide_core::config::GestureConfig;
use glide_core::types::{corpus_word_count, KeyboardDescriptor, LoadingState, Point, WordCorpus};

use crate::recognizer::{Recognizer, RecognizerFactory};

/// Key widths a maximal frequency bonus is worth per unit of weight.
const FREQUENCY_BONUS_SCALE: f64 = 0.1;

/// Tuning for `ShapeRecognizer`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSettings {
    pub max_suggestions: usize,
    pub min_point_distance: f32,
    pub resample_points: usize,
    pub frequency_weight: f64,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self::from(&GestureConfig::default())
    }
}

impl From<&GestureConfig> for ShapeSettings {
    fn from(config: &GestureConfig) -> Self {
        Self {
            max_suggestions: config.max_suggestions,
            min_point_distance: config.min_point_distance as f32,
            resample_points: config.resample_points.max(2),
            frequency_weight: config.frequency_weight,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

fn path_length(points: &[Point]) -> f32 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Resample `points` to `n` points spaced evenly along the path.
fn resample(points: &[Point], n: usize) -> Vec<Point> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let total = path_length(points);
    if n < 2 || total <= f32::EPSILON {
        return vec![first; n.max(1)];
    }

    let step = total / (n - 1) as f32;
    let mut out = Vec::with_capacity(n);
    out.push(first);

    let mut carried = 0.0f32;
    let mut prev = first;
    for &next in &points[1..] {
        let mut segment = prev.distance(&next);
        while carried + segment >= step && out.len() < n {
            let t = (step - carried) / segment;
            let point = Point::new(prev.x + t * (next.x - prev.x), prev.y + t * (next.y - prev.y));
            out.push(point);
            segment -= step - carried;
            prev = point;
            carried = 0.0;
        }
        carried += segment;
        prev = next;
    }

    // Float drift can leave the last sample out.
    let last = *points.last().unwrap_or(&first);
    while out.len() < n {
        out.push(last);
    }
    out
}

fn mean_distance(a: &[Point], b: &[Point]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b).map(|(p, q)| p.distance(q)).sum::<f32>() / a.len() as f32
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Key centers of the printable keys, by lowercase character.
#[derive(Debug, Default)]
struct KeyMap {
    centers: HashMap<char, Point>,
    /// Typical key size, used to normalize distances.
    key_scale: f32,
}

impl KeyMap {
    fn from_keyboard(keyboard: &KeyboardDescriptor) -> Self {
        let mut centers = HashMap::new();
        let mut widths = Vec::new();
        for key in &keyboard.keys {
            let Some(ch) = key.character() else {
                continue;
            };
            for lower in ch.to_lowercase() {
                centers.entry(lower).or_insert_with(|| key.center());
            }
            widths.push(key.width.max(1) as f32);
        }
        let key_scale = if widths.is_empty() {
            1.0
        } else {
            widths.iter().sum::<f32>() / widths.len() as f32
        };
        Self { centers, key_scale }
    }

    /// Ideal path for `word`: its key centers with repeated keys collapsed.
    fn word_path(&self, word: &str) -> Option<Vec<Point>> {
        let mut path: Vec<Point> = Vec::with_capacity(word.len());
        for ch in word.chars().flat_map(char::to_lowercase) {
            let center = *self.centers.get(&ch)?;
            if path.last() != Some(&center) {
                path.push(center);
            }
        }
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}

#[derive(Debug)]
struct Template {
    word: String,
    frequency: u32,
    path: Vec<Point>,
}

#[derive(Debug, Default)]
struct ShapeModel {
    templates: Vec<Template>,
    max_frequency: u32,
}

impl ShapeModel {
    /// Build templates for every word that can be typed on `keys`.
    ///
    /// Words appearing in several batches keep their highest frequency.
    fn build(keys: &KeyMap, corpus: &WordCorpus, resample_points: usize) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut templates: Vec<Template> = Vec::new();

        for (word, frequency) in corpus.iter().flat_map(|batch| batch.iter()) {
            if let Some(&existing) = index.get(word) {
                let template = &mut templates[existing];
                template.frequency = template.frequency.max(frequency);
                continue;
            }
            let Some(path) = keys.word_path(word) else {
                continue;
            };
            index.insert(word.to_string(), templates.len());
            templates.push(Template {
                word: word.to_string(),
                frequency,
                path: resample(&path, resample_points),
            });
        }

        let max_frequency = templates.iter().map(|t| t.frequency).max().unwrap_or(0);
        Self {
            templates,
            max_frequency,
        }
    }

    fn rank(&self, gesture: &[Point], settings: &ShapeSettings, key_scale: f32) -> Vec<String> {
        let sampled = resample(gesture, settings.resample_points);
        let max_log = (1.0 + self.max_frequency as f64).ln().max(f64::EPSILON);

        let mut scored: Vec<(f64, &Template)> = self
            .templates
            .iter()
            .map(|template| {
                let shape = (mean_distance(&sampled, &template.path) / key_scale) as f64;
                let bonus = (1.0 + template.frequency as f64).ln() / max_log;
                (shape - settings.frequency_weight * bonus * FREQUENCY_BONUS_SCALE, template)
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored
            .into_iter()
            .take(settings.max_suggestions)
            .map(|(_, template)| template.word.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

fn lock_model(
    model: &Mutex<Option<Arc<ShapeModel>>>,
) -> std::sync::MutexGuard<'_, Option<Arc<ShapeModel>>> {
    match model.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Work item preparing a corpus for one generation.
struct PrepareJob {
    keys: Arc<KeyMap>,
    corpus: WordCorpus,
    resample_points: usize,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    model: Arc<Mutex<Option<Arc<ShapeModel>>>>,
    state: Weak<watch::Sender<LoadingState>>,
}

impl PrepareJob {
    fn is_stale(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) != self.generation
    }

    fn run(self) {
        if self.is_stale() {
            debug!(generation = self.generation, "Skipping stale corpus preparation");
            return;
        }

        let words = corpus_word_count(&self.corpus);
        let built = ShapeModel::build(&self.keys, &self.corpus, self.resample_points);
        let outcome = if words > 0 && built.templates.is_empty() {
            warn!(words, "No corpus word can be typed on this layout");
            LoadingState::Error
        } else {
            LoadingState::Loaded
        };
        let templates = built.templates.len();

        let mut model = lock_model(&self.model);
        // Checked under the lock so a newer corpus or a destroy always wins.
        // The state is published under the same lock for the same reason.
        if self.is_stale() {
            debug!(generation = self.generation, "Discarding stale shape model");
            return;
        }
        *model = Some(Arc::new(built));
        if let Some(state) = self.state.upgrade() {
            state.send_replace(outcome);
        }
        drop(model);

        info!(words, templates, state = %outcome, "Shape model prepared");
    }
}

/// Shape-matching recognizer bound to one keyboard layout.
pub struct ShapeRecognizer {
    settings: ShapeSettings,
    keys: Arc<KeyMap>,
    path: Vec<Point>,
    model: Arc<Mutex<Option<Arc<ShapeModel>>>>,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<LoadingState>>,
    runtime: Option<Handle>,
}

impl std::fmt::Debug for ShapeRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeRecognizer")
            .field("settings", &self.settings)
            .field("keys", &self.keys.centers.len())
            .field("path", &self.path.len())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl ShapeRecognizer {
    pub fn new(keyboard: &KeyboardDescriptor, settings: ShapeSettings, runtime: Option<Handle>) -> Self {
        let (state, _) = watch::channel(LoadingState::Unloaded);
        Self {
            settings,
            keys: Arc::new(KeyMap::from_keyboard(keyboard)),
            path: Vec::new(),
            model: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            runtime,
        }
    }

    /// Number of points kept for the current gesture.
    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    fn current_model(&self) -> Option<Arc<ShapeModel>> {
        lock_model(&self.model).clone()
    }

    /// Start a new preparation generation and report `Loading` for it.
    ///
    /// Serialized with `PrepareJob::run` through the model lock, so an older
    /// job can never publish its outcome after this.
    fn begin_generation(&self) -> u64 {
        let _model = lock_model(&self.model);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(LoadingState::Loading);
        generation
    }
}

impl Recognizer for ShapeRecognizer {
    fn add_point(&mut self, x: i32, y: i32) {
        let point = Point::new(x as f32, y as f32);
        if let Some(last) = self.path.last() {
            if last.distance(&point) < self.settings.min_point_distance {
                return;
            }
        }
        self.path.push(point);
    }

    fn clear_gesture(&mut self) {
        self.path.clear();
    }

    fn candidates(&mut self) -> Vec<String> {
        if self.path.is_empty() {
            return Vec::new();
        }
        match self.current_model() {
            Some(model) => model.rank(&self.path, &self.settings, self.keys.key_scale),
            None => {
                debug!("Candidates requested before a corpus was prepared");
                Vec::new()
            }
        }
    }

    fn set_words(&mut self, corpus: WordCorpus) {
        let generation = self.begin_generation();

        let job = PrepareJob {
            keys: Arc::clone(&self.keys),
            corpus,
            resample_points: self.settings.resample_points,
            generation,
            current_generation: Arc::clone(&self.generation),
            model: Arc::clone(&self.model),
            state: Arc::downgrade(&self.state),
        };

        match &self.runtime {
            Some(runtime) => {
                let state = Arc::downgrade(&self.state);
                let current = Arc::clone(&self.generation);
                let task = runtime.spawn_blocking(move || job.run());
                runtime.spawn(async move {
                    if let Err(err) = task.await {
                        error!(error = %err, "Shape model preparation panicked");
                        if current.load(Ordering::SeqCst) == generation {
                            if let Some(state) = state.upgrade() {
                                state.send_replace(LoadingState::Error);
                            }
                        }
                    }
                });
            }
            None => job.run(),
        }
    }

    fn readiness(&self) -> watch::Receiver<LoadingState> {
        self.state.subscribe()
    }

    fn destroy(self: Box<Self>) {
        // Invalidate any preparation still in flight.
        let _model = lock_model(&self.model);
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Shape recognizer destroyed");
    }
}

/// Creates a `ShapeRecognizer` per activated layout.
#[derive(Debug, Clone, Default)]
pub struct ShapeRecognizerFactory {
    settings: ShapeSettings,
    runtime: Option<Handle>,
}

impl ShapeRecognizerFactory {
    /// Factory preparing corpora inline.
    pub fn new(settings: ShapeSettings) -> Self {
        Self {
            settings,
            runtime: None,
        }
    }

    /// Prepare corpora on the blocking pool of `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl RecognizerFactory for ShapeRecognizerFactory {
    fn create(&self, keyboard: &KeyboardDescriptor) -> Box<dyn Recognizer> {
        debug!(layout = %keyboard.layout_key(), keys = keyboard.keys.len(), "Creating shape recognizer");
        Box::new(ShapeRecognizer::new(
            keyboard,
            self.settings.clone(),
            self.runtime.clone(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
