//! Segment buffering for streamed text.
//!
//! Chunks are appended as they arrive. A segment is complete once a boundary
//! follows it: a blank-line run, or sentence-final punctuation followed by
//! whitespace and the start of a new sentence (uppercase Latin letter or a
//! CJK ideograph). Whatever follows the last boundary stays buffered, since
//! the next chunk may still extend it.

use crate::ai::lexicon::is_cjk;

/// Segments shorter than this (in chars, after trimming) are dropped.
pub const DEFAULT_MIN_SEGMENT_CHARS: usize = 12;
/// Length of the text prefix used as a segment's dedup key.
pub const DEFAULT_DEDUP_PREFIX_CHARS: usize = 50;

const SENTENCE_END: &[char] = &['.', '!', '?', '。', '！', '？'];

/// A completed, trimmed unit of text selected for one classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    text: String,
    key: String,
}

impl Segment {
    pub fn new(raw: &str, key_chars: usize) -> Self {
        let text = raw.trim().to_string();
        let key = text.chars().take(key_chars).collect();
        Self { text, key }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Approximate identity: the first `key_chars` chars of the trimmed text.
    /// Distinct segments sharing that prefix collide.
    pub fn dedup_key(&self) -> &str {
        &self.key
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Growing text buffer with boundary detection.
#[derive(Debug, Clone)]
pub struct SegmentBuffer {
    buffer: String,
    min_chars: usize,
    key_chars: usize,
}

impl Default for SegmentBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SEGMENT_CHARS)
    }
}

impl SegmentBuffer {
    pub fn new(min_chars: usize) -> Self {
        Self::with_key_chars(min_chars, DEFAULT_DEDUP_PREFIX_CHARS)
    }

    pub fn with_key_chars(min_chars: usize, key_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            min_chars,
            key_chars,
        }
    }

    pub fn append(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn has_boundary(&self) -> bool {
        next_separator(&self.buffer, 0).is_some()
    }

    /// Split the buffer at every boundary. Returns the completed segments
    /// (too-short ones dropped) and the incomplete tail. Does not modify the
    /// buffer; callers install the tail with [`SegmentBuffer::replace`].
    pub fn extract_completed(&self) -> (Vec<Segment>, String) {
        let text = self.buffer.as_str();
        let mut segments = Vec::new();
        let mut fragment_start = 0;
        let mut pos = 0;

        while let Some((sep_start, sep_end)) = next_separator(text, pos) {
            let fragment = &text[fragment_start..sep_start];
            let segment = Segment::new(fragment, self.key_chars);
            if segment.char_len() >= self.min_chars {
                segments.push(segment);
            }
            fragment_start = sep_end;
            pos = sep_end;
        }

        (segments, text[fragment_start..].to_string())
    }

    pub fn replace(&mut self, tail: String) {
        self.buffer = tail;
    }

    /// Drain extracted segments and keep only the tail.
    pub fn take_completed(&mut self) -> Vec<Segment> {
        let (segments, tail) = self.extract_completed();
        self.buffer = tail;
        segments
    }

    /// End of stream: hand back everything buffered as one final segment,
    /// ignoring boundaries, if it is long enough. Always empties the buffer.
    pub fn flush(&mut self) -> Option<Segment> {
        let rest = std::mem::take(&mut self.buffer);
        let segment = Segment::new(&rest, self.key_chars);
        (segment.char_len() >= self.min_chars).then_some(segment)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Byte range of the first separator at or after `from`.
fn next_separator(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut pos = from;
    while let Some(c) = text[pos..].chars().next() {
        let after = pos + c.len_utf8();

        if SENTENCE_END.contains(&c) {
            let ws_end = skip_whitespace(text, after);
            if ws_end > after {
                if let Some(next) = text[ws_end..].chars().next() {
                    if next.is_ascii_uppercase() || is_cjk(next) {
                        return Some((after, ws_end));
                    }
                }
            }
        } else if c == '\n' {
            // Greedy, like `\n\s*\n`: runs to the last newline in the
            // whitespace that follows.
            let run_end = skip_whitespace(text, after);
            if let Some(last_nl) = text[after..run_end].rfind('\n') {
                return Some((pos, after + last_nl + 1));
            }
        }

        pos = after;
    }
    None
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(text.len(), |(i, _)| from + i)
}
