//! crates/reading_adventure_core/src/codec.rs
//!
//! Flattens nested learning content into single text cells and back.
//!
//! `,` `:` and `;` are structural separators. Every component value is
//! percent-escaped before joining, so values containing separators (or line
//! breaks) survive a round trip. Decoding only rewrites `%XX` sequences that
//! name an ASCII byte, which keeps older unescaped cells readable as-is.
//!
//! Spaces and tabs around a raw component are trimmed on decode, so hand-edited
//! cells like `sun: a star` read cleanly. The encoder escapes padding at either
//! end of a value to keep it through that trim.

use crate::domain::VocabularyEntry;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use tracing::debug;

const PAIR_SEPARATOR: char = ',';
const WORD_SEPARATOR: char = ':';
const QUESTION_SEPARATOR: char = ';';

/// Naive ISO-8601 layout found in files written without an offset.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

//=========================================================================================
// Escaping
//=========================================================================================

fn is_padding(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Escapes the separator characters, `%` itself, line breaks, and spaces or
/// tabs at either end of the value.
pub fn escape_component(value: &str) -> String {
    let body_start = value.len() - value.trim_start_matches(is_padding).len();
    let body_end = value.trim_end_matches(is_padding).len();
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.char_indices() {
        let at_edge = i < body_start || i >= body_end;
        match c {
            ' ' if at_edge => out.push_str("%20"),
            '\t' if at_edge => out.push_str("%09"),
            '%' => out.push_str("%25"),
            ',' => out.push_str("%2C"),
            ':' => out.push_str("%3A"),
            ';' => out.push_str("%3B"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`escape_component`]. A `%` not followed by two hex digits of an
/// ASCII byte is kept literally.
pub fn unescape_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let decoded = tail
            .get(..2)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .filter(u8::is_ascii);
        match decoded {
            Some(byte) => {
                out.push(char::from(byte));
                rest = &tail[2..];
            }
            None => {
                out.push('%');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Trims unescaped padding, then unescapes.
fn decode_component(raw: &str) -> String {
    unescape_component(raw.trim_matches(is_padding))
}

//=========================================================================================
// Vocabulary
//=========================================================================================

/// Encodes pairs as `word:definition`, joined with `,`.
pub fn encode_vocabulary(pairs: &[VocabularyEntry]) -> String {
    pairs
        .iter()
        .map(|entry| {
            format!(
                "{}{}{}",
                escape_component(&entry.word),
                WORD_SEPARATOR,
                escape_component(&entry.definition)
            )
        })
        .collect::<Vec<_>>()
        .join(&PAIR_SEPARATOR.to_string())
}

/// Inverse of [`encode_vocabulary`].
///
/// Entries without a `:` or with an empty word are skipped. A pair whose word
/// is the empty string therefore does not survive a round trip; every other
/// pair does.
pub fn decode_vocabulary(encoded: &str) -> Vec<VocabularyEntry> {
    encoded
        .split(PAIR_SEPARATOR)
        .filter(|entry| !entry.trim_matches(is_padding).is_empty())
        .filter_map(|entry| match entry.split_once(WORD_SEPARATOR) {
            Some((word, _)) if word.trim_matches(is_padding).is_empty() => {
                debug!(entry, "Skipping vocabulary entry without a word");
                None
            }
            Some((word, definition)) => Some(VocabularyEntry::new(
                decode_component(word),
                decode_component(definition),
            )),
            None => {
                debug!(entry, "Skipping vocabulary entry without a definition separator");
                None
            }
        })
        .collect()
}

//=========================================================================================
// Questions
//=========================================================================================

pub fn encode_questions(questions: &[String]) -> String {
    questions
        .iter()
        .map(|q| escape_component(q))
        .collect::<Vec<_>>()
        .join(&QUESTION_SEPARATOR.to_string())
}

/// Inverse of [`encode_questions`].
///
/// Empty or blank segments are dropped, so an empty question does not survive
/// a round trip; every other question does.
pub fn decode_questions(encoded: &str) -> Vec<String> {
    encoded
        .split(QUESTION_SEPARATOR)
        .filter(|q| !q.trim_matches(is_padding).is_empty())
        .map(decode_component)
        .collect()
}

//=========================================================================================
// Learned Vocabulary
//=========================================================================================

/// Encodes learned words joined with `,`. Repeats are written once.
pub fn encode_vocab_learned(words: &[String]) -> String {
    let mut seen = HashSet::new();
    words
        .iter()
        .filter(|w| seen.insert(w.as_str()))
        .map(|w| escape_component(w))
        .collect::<Vec<_>>()
        .join(&PAIR_SEPARATOR.to_string())
}

/// Inverse of [`encode_vocab_learned`]; the result holds each word once,
/// in order of first appearance.
pub fn decode_vocab_learned(encoded: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    encoded
        .split(PAIR_SEPARATOR)
        .filter(|w| !w.trim_matches(is_padding).is_empty())
        .map(decode_component)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

//=========================================================================================
// Timestamps
//=========================================================================================

/// Formats a timestamp as RFC 3339 in UTC without losing sub-second precision.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses RFC 3339 (any offset) or a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
}
