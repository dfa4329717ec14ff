//! Glide gesture crate - detector cache, dictionary aggregation, readiness
//! tracking and the gesture session.
//!
//! A gesture moves through a small state machine: Idle -> Capturing -> Idle.
//! Recognizers are cached per keyboard layout in the `DetectorRegistry`;
//! dictionaries loading on background tasks are merged by a
//! `DictionaryAggregator` and handed back to the UI thread through the
//! `GestureTyping` controller, which is the entry point for hosts.

pub mod aggregator;
pub mod controller;
pub mod layout;
pub mod mock;
pub mod readiness;
pub mod recognizer;
pub mod registry;
pub mod session;
pub mod shape;
pub mod state;
pub mod text_commit;

pub use aggregator::{DictionaryAggregator, DictionaryLoadListener};
pub use controller::{GestureTyping, Watermark};
pub use readiness::{Gate, ReadinessTracker};
pub use recognizer::{Recognizer, RecognizerFactory};
pub use registry::DetectorRegistry;
pub use session::{ComposedGesture, GestureSession};
pub use shape::{ShapeRecognizerFactory, ShapeSettings};
pub use state::GestureState;
pub use text_commit::{InputConnection, SuggestionSink};
