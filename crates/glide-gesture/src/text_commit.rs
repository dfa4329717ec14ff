//! Handoff of gesture results into the host's text field.
//!
//! The host text-input connection is an opaque transactional sink: every
//! mutation performed while committing a gesture happens inside one batch
//! edit, which the host presents atomically.

use tracing::trace;

/// How many characters before the cursor are inspected when deciding whether
/// a separating space is needed.
pub const MAX_CHARS_BEFORE_CURSOR: usize = 2;

/// Host text field.
pub trait InputConnection {
    fn begin_batch_edit(&mut self);
    fn end_batch_edit(&mut self);
    /// Up to `n` characters immediately before the cursor, composing text
    /// included.
    fn text_before_cursor(&self, n: usize) -> String;
    /// Replace the composing region with `text`, keeping it provisional.
    fn set_composing_text(&mut self, text: &str);
    /// Replace the composing region (if any) with `text` and finalize it.
    fn commit_text(&mut self, text: &str);
}

/// Host suggestion strip.
pub trait SuggestionSink {
    fn set_suggestions(&mut self, words: &[String]);
    fn clear_suggestions(&mut self);
    /// Drop any pending auto-correction and next-word prediction state.
    fn abort_correction(&mut self) {}
}

/// Uppercase `text` following the casing rules of `locale`.
///
/// Turkic locales map the dotted `i` to `İ`; everything else uses the
/// Unicode default mapping.
pub fn to_upper_for_locale(text: &str, locale: &str) -> String {
    let language = locale.split(['_', '-']).next().unwrap_or_default();
    if matches!(language, "tr" | "az") {
        text.chars()
            .map(|c| match c {
                'i' => "İ".to_string(),
                other => other.to_uppercase().collect(),
            })
            .collect()
    } else {
        text.to_uppercase()
    }
}

fn capitalize_first(word: &str, locale: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = to_upper_for_locale(&first.to_string(), locale);
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Apply the shift state to every candidate.
///
/// Caps lock uppercases whole words, a plain shift capitalizes the first
/// letter. Without a locale candidates are left untouched.
pub fn capitalize_candidates(
    candidates: &mut [String],
    shifted: bool,
    caps_locked: bool,
    locale: Option<&str>,
) {
    let Some(locale) = locale else {
        return;
    };
    if !shifted && !caps_locked {
        return;
    }
    for word in candidates.iter_mut() {
        *word = if caps_locked {
            to_upper_for_locale(word, locale)
        } else {
            capitalize_first(word, locale)
        };
    }
}

/// Whether a space must be inserted before a word typed after `text_before`.
///
/// No space at the beginning of the text, after whitespace, or inside a
/// word joined by an apostrophe or hyphen.
pub fn needs_separator(text_before: &str) -> bool {
    match text_before.chars().last() {
        None => {
            trace!("Beginning of text found, not adding a space");
            false
        }
        Some(c) if c.is_whitespace() || c == '\'' || c == '-' => {
            trace!("Separator found, not adding a space");
            false
        }
        Some(_) => true,
    }
}

/// Place the best candidate as composing text and publish the rest.
///
/// Expects `candidates` to be non-empty and already capitalized. Returns the
/// composing word.
pub fn compose_gesture_result(
    connection: &mut dyn InputConnection,
    suggestions: &mut dyn SuggestionSink,
    candidates: &[String],
) -> Option<String> {
    let word = candidates.first()?.clone();

    connection.begin_batch_edit();
    suggestions.abort_correction();

    let before = connection.text_before_cursor(MAX_CHARS_BEFORE_CURSOR);
    if needs_separator(&before) {
        trace!("Non-separator found, adding a space");
        connection.commit_text(" ");
    }
    connection.set_composing_text(&word);

    if candidates.len() > 1 {
        suggestions.set_suggestions(candidates);
    } else {
        suggestions.clear_suggestions();
    }

    connection.end_batch_edit();
    Some(word)
}

/// Commit `word` the way picking it from the suggestion strip would.
pub fn commit_word(
    connection: &mut dyn InputConnection,
    suggestions: &mut dyn SuggestionSink,
    word: &str,
    with_auto_space: bool,
) {
    connection.begin_batch_edit();
    connection.commit_text(word);
    if with_auto_space {
        connection.commit_text(" ");
    }
    suggestions.clear_suggestions();
    connection.end_batch_edit();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
