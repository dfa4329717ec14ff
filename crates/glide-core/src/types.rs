use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Key codes
// =============================================================================

/// Primary codes the gesture layer needs to recognise.
///
/// Printable keys carry their Unicode scalar value as primary code. Functional
/// keys (shift, delete, mode change) use non-positive codes.
pub mod key_codes {
    pub const SPACE: i32 = ' ' as i32;
    pub const ENTER: i32 = '\n' as i32;
    pub const SHIFT: i32 = -1;
    pub const MODE_SYMBOLS: i32 = -2;
    pub const DELETE: i32 = -5;
}

// =============================================================================
// Enums
// =============================================================================

/// Readiness of a recognizer's corpus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    /// No words have been handed to the recognizer yet.
    #[default]
    Unloaded,
    /// Words were handed over and are being prepared.
    Loading,
    /// Recognition can run.
    Loaded,
    /// Preparing the corpus failed.
    Error,
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadingState::Unloaded => write!(f, "Unloaded"),
            LoadingState::Loading => write!(f, "Loading"),
            LoadingState::Loaded => write!(f, "Loaded"),
            LoadingState::Error => write!(f, "Error"),
        }
    }
}

/// Shift key state at the moment a gesture completes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftState {
    #[default]
    Off,
    /// Shift pressed for the next word only.
    Shifted,
    /// Caps lock.
    Locked,
}

impl ShiftState {
    pub fn is_active(&self) -> bool {
        !matches!(self, ShiftState::Off)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, ShiftState::Locked)
    }
}

/// Why a detector was torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Gesture typing was switched off (preference or power saving).
    Disabled,
    /// The host signalled low memory.
    MemoryPressure,
    /// Keyboard add-ons or the layout set changed.
    ConfigurationChange,
}

// =============================================================================
// Keyboard
// =============================================================================

/// One key of a keyboard layout, in keyboard-local pixel coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub primary_code: i32,
    pub functional: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Key {
    /// A printable letter key.
    pub fn letter(ch: char, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            primary_code: ch as i32,
            functional: false,
            x,
            y,
            width,
            height,
        }
    }

    /// A functional key such as shift or delete.
    pub fn functional(primary_code: i32, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            primary_code,
            functional: true,
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// The character typed by this key, if it types one.
    pub fn character(&self) -> Option<char> {
        if self.functional || self.primary_code <= 0 {
            return None;
        }
        char::from_u32(self.primary_code as u32)
    }
}

/// A keyboard layout as provided by the host's layout provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardDescriptor {
    pub layout_id: String,
    pub min_width: u32,
    pub height: u32,
    /// Locale tag such as "en" or "tr". `None` disables capitalization of
    /// gesture candidates.
    pub locale: Option<String>,
    pub keys: Vec<Key>,
}

impl KeyboardDescriptor {
    pub fn layout_key(&self) -> LayoutKey {
        LayoutKey::new(&self.layout_id, self.min_width, self.height)
    }
}

/// Identity of a keyboard arrangement, used as the detector cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutKey {
    layout_id: String,
    min_width: u32,
    height: u32,
}

impl LayoutKey {
    pub fn new(layout_id: &str, min_width: u32, height: u32) -> Self {
        Self {
            layout_id: layout_id.to_string(),
            min_width,
            height,
        }
    }

    pub fn layout_id(&self) -> &str {
        &self.layout_id
    }

    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Display for LayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.layout_id, self.min_width, self.height)
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// A touch point in keyboard-local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

// =============================================================================
// Dictionaries
// =============================================================================

/// Identifies one dictionary taking part in an aggregation session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictionaryId(pub String);

impl DictionaryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Words loaded from one dictionary together with their frequencies.
///
/// `words[i]` has frequency `frequencies[i]`. The two vectors are expected to
/// have the same length; the aggregator rejects batches where they do not.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBatch {
    pub words: Vec<String>,
    pub frequencies: Vec<u32>,
}

impl WordBatch {
    pub fn new(words: Vec<String>, frequencies: Vec<u32>) -> Self {
        Self { words, frequencies }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_consistent(&self) -> bool {
        self.words.len() == self.frequencies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.words
            .iter()
            .map(String::as_str)
            .zip(self.frequencies.iter().copied())
    }
}

/// The merged result of an aggregation session: batches in arrival order.
pub type WordCorpus = Vec<WordBatch>;

/// Total number of words across all batches of a corpus.
pub fn corpus_word_count(corpus: &[WordBatch]) -> usize {
    corpus.iter().map(WordBatch::len).sum()
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in milliseconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }

    pub fn elapsed_millis(&self) -> i64 {
        Timestamp::now().0 - self.0
    }
}
