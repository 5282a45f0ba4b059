//! Recursive character text splitting.
//!
//! [`RecursiveSplitter`] breaks text on the largest boundary that yields
//! pieces shorter than `chunk_size` (paragraphs, then lines, then sentences,
//! then words, then single characters) and greedily merges those pieces back
//! into chunks, carrying up to `chunk_overlap` characters from the end of one
//! chunk into the start of the next.
//!
//! All lengths are counted in `char`s, not bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::RecursiveSplitter;
//!
//! let splitter = RecursiveSplitter::new(1000, 200);
//! let chunks = splitter.split("First paragraph.\n\nSecond paragraph.");
//! ```

/// Separators tried in order, from coarsest to finest.
///
/// The empty separator splits into single characters and always succeeds.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Splits text hierarchically with a character budget and overlap.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a new `RecursiveSplitter` with the default separators.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - maximum number of characters shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator hierarchy.
    ///
    /// An empty separator is appended if missing, so every input can be
    /// reduced below `chunk_size`.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        let mut separators: Vec<String> = separators.iter().map(|s| s.to_string()).collect();
        if separators.last().is_none_or(|s| !s.is_empty()) {
            separators.push(String::new());
        }
        self.separators = separators;
        self
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator present in the text; "" always matches.
        let (separator, finer) = match separators.iter().position(|s| s.is_empty() || text.contains(s))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                // Only reachable with a custom hierarchy; hard-wrap the piece.
                chunks.extend(hard_wrap(piece, self.chunk_size));
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily merge pieces (each shorter than `chunk_size`) into chunks.
    ///
    /// When a chunk is emitted, pieces are dropped from the front of the
    /// window until at most `chunk_overlap` characters remain and the next
    /// piece fits.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut window_len = 0usize;

        for &piece in pieces {
            let piece_len = char_len(piece);

            if window_len + piece_len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);

                while window_len > self.chunk_overlap
                    || (window_len + piece_len > self.chunk_size && window_len > 0)
                {
                    let first = window.remove(0);
                    window_len -= char_len(first);
                }
            }

            window.push(piece);
            window_len += piece_len;
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &[&str]) {
    let joined = window.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
///
/// The empty separator splits into individual characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }

    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Cut text into consecutive windows of at most `size` characters.
fn hard_wrap(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|window| window.iter().collect::<String>())
        .filter_map(|s| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}
