//! crates/reading_adventure_core/src/text.rs

/// Splits a passage into sentences so each one can be read aloud on its own.
///
/// Runs of `.`, `!` and `?` end a sentence; the terminators are dropped.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    text.split(|c: char| c == '.' || c == '?' || c == '!')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
