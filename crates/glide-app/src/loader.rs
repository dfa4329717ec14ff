//! Word-list loading on background tasks.
//!
//! Every list is announced to the listener before its task is spawned, so
//! the aggregator cannot complete before all lists have been counted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glide_core::error::{GlideError, Result};
use glide_core::types::{DictionaryId, WordBatch};
use glide_gesture::aggregator::DictionaryLoadListener;
use tokio::task::JoinHandle;

/// Words used when no word list is given on the command line.
const BUILTIN_WORDS: &str = "\
the 255
and 240
hello 180
world 170
quick 90
brown 80
fox 75
jumps 60
over 120
lazy 50
dog 110
cat 115
car 105
gesture 40
typing 45
glide 30
";

/// Parse `word [frequency]` lines. Blank lines and `#` comments are skipped;
/// a missing frequency counts as 1.
pub fn parse_word_list(source: &str, content: &str) -> Result<WordBatch> {
    let mut words = Vec::new();
    let mut frequencies = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(word) = fields.next() else {
            continue;
        };
        let frequency = match fields.next() {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                GlideError::DictionaryLoad(format!(
                    "{}:{}: invalid frequency {:?}: {}",
                    source,
                    number + 1,
                    raw,
                    e
                ))
            })?,
            None => 1,
        };
        words.push(word.to_string());
        frequencies.push(frequency);
    }

    Ok(WordBatch::new(words, frequencies))
}

async fn read_word_list(path: &Path) -> Result<WordBatch> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_word_list(&path.display().to_string(), &content)
}

/// Load every word list concurrently into `listener`.
///
/// With no paths the built-in list is used. Returns the spawned tasks.
pub fn spawn_loads(
    paths: &[PathBuf],
    listener: Arc<dyn DictionaryLoadListener>,
) -> Result<Vec<JoinHandle<()>>> {
    if paths.is_empty() {
        let id = DictionaryId::new("builtin");
        listener.on_load_started(&id)?;
        let batch = parse_word_list("builtin", BUILTIN_WORDS)?;
        return Ok(vec![tokio::spawn(async move {
            if let Err(e) = listener.on_load_done(&id, batch) {
                tracing::warn!(error = %e, "Built-in word list rejected");
            }
        })]);
    }

    let mut tasks = Vec::with_capacity(paths.len());
    for path in paths {
        let id = DictionaryId::new(path.display().to_string());
        listener.on_load_started(&id)?;

        let listener = Arc::clone(&listener);
        let path = path.clone();
        tasks.push(tokio::spawn(async move {
            let outcome = match read_word_list(&path).await {
                Ok(batch) => {
                    tracing::info!(dictionary = %id, words = batch.len(), "Word list loaded");
                    listener.on_load_done(&id, batch)
                }
                Err(e) => listener.on_load_failed(&id, &e),
            };
            if let Err(e) = outcome {
                tracing::warn!(dictionary = %id, error = %e, "Word list not accepted");
            }
        }));
    }
    Ok(tasks)
}
