//! Glide core crate - configuration, errors, domain events and shared types
//! for the gesture-typing layer.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::GlideConfig;
pub use error::{GlideError, Result};
pub use events::GestureEvent;
pub use types::*;
