/// Text chunking for embedding long documents
use regex::Regex;
use std::collections::VecDeque;
use std::sync::OnceLock;
use tracing::debug;

use crate::domain::{Chunk, DocumentId};

/// Default chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default number of trailing characters carried into the next chunk
pub const DEFAULT_OVERLAP: usize = 50;

/// Splits text into paragraphs and collapses whitespace
#[derive(Debug)]
struct Normalizer {
    paragraph_regex: Regex,
    whitespace_regex: Regex,
}

impl Normalizer {
    fn new() -> Self {
        Normalizer {
            paragraph_regex: Regex::new(r"(?:\r?\n)+").expect("paragraph pattern is valid"),
            whitespace_regex: Regex::new(r"\s+").expect("whitespace pattern is valid"),
        }
    }

    fn instance() -> &'static Self {
        static INSTANCE: OnceLock<Normalizer> = OnceLock::new();
        INSTANCE.get_or_init(Normalizer::new)
    }

    /// Non-empty paragraphs, each with runs of whitespace collapsed to one space
    fn paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_regex
            .split(text)
            .map(|p| self.whitespace_regex.replace_all(p.trim(), " ").into_owned())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Paragraph-aware chunker with character overlap.
///
/// All lengths are counted in characters, not bytes. Every chunk is at most
/// `chunk_size` characters long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` is clamped below `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Chunker {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Normalize `text` and cut it into chunks.
    ///
    /// Text that fits in one chunk comes back as a single normalized chunk, even
    /// when empty. Longer text is packed paragraph by paragraph; when the next
    /// paragraph would overflow the buffer, the buffer becomes a chunk and its
    /// trailing `overlap` characters start the next one. A paragraph too long to
    /// follow the carried overlap is split so its head fills the rest of that chunk.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let paragraphs = Normalizer::instance().paragraphs(text);
        let normalized = paragraphs.join(" ");
        if char_len(&normalized) <= self.chunk_size {
            return vec![normalized];
        }

        let mut queue: VecDeque<&str> = paragraphs
            .iter()
            .flat_map(|paragraph| self.pieces(paragraph))
            .collect();

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        // false while the buffer holds nothing but carried-over overlap
        let mut pending = false;

        while let Some(piece) = queue.pop_front() {
            if buffer.is_empty() || joined_len(&buffer, piece) <= self.chunk_size {
                if !buffer.is_empty() {
                    buffer.push(' ');
                }
                buffer.push_str(piece);
                pending = true;
                continue;
            }

            if pending {
                let carry = tail(&buffer, self.overlap).trim_start().to_string();
                chunks.push(std::mem::replace(&mut buffer, carry));
                pending = false;
                queue.push_front(piece);
                continue;
            }

            // only the carry is buffered and the piece does not fit after it
            let fit = self.chunk_size.saturating_sub(char_len(&buffer) + 1);
            if fit == 0 {
                debug!("Overlap of {} characters leaves no room, dropping it", self.overlap);
                buffer.clear();
                queue.push_front(piece);
                continue;
            }

            let (head, rest) = split_at_char(piece, fit);
            buffer.push(' ');
            buffer.push_str(head.trim_end());
            pending = true;
            let rest = rest.trim_start();
            if !rest.is_empty() {
                queue.push_front(rest);
            }
        }

        if pending {
            chunks.push(buffer);
        }
        chunks
    }

    /// Chunk a document's text into `Chunk`s numbered from zero
    pub fn chunk_document(&self, parent: &DocumentId, source: &str, text: &str) -> Vec<Chunk> {
        let texts = self.chunk(text);
        let total = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                parent: parent.clone(),
                source: source.to_string(),
                index,
                total,
                text,
            })
            .collect()
    }

    /// A paragraph, hard-split if it cannot fit in one chunk
    fn pieces<'a>(&self, paragraph: &'a str) -> Vec<&'a str> {
        if char_len(paragraph) <= self.chunk_size {
            return vec![paragraph];
        }

        // leave room for the carried overlap and a joining space
        let room = self.chunk_size.saturating_sub(self.overlap + 1);
        let width = if self.overlap == 0 || room == 0 {
            self.chunk_size
        } else {
            room
        };

        let boundaries: Vec<usize> = paragraph
            .char_indices()
            .map(|(i, _)| i)
            .step_by(width)
            .chain(std::iter::once(paragraph.len()))
            .collect();
        boundaries
            .windows(2)
            .map(|w| paragraph[w[0]..w[1]].trim())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
    }
}

/// Chunk `text` with a one-off chunker
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    Chunker::new(chunk_size, overlap).chunk(text)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn joined_len(buffer: &str, piece: &str) -> usize {
    if buffer.is_empty() {
        char_len(piece)
    } else {
        char_len(buffer) + 1 + char_len(piece)
    }
}

/// `text` cut after its first `n` characters
fn split_at_char(text: &str, n: usize) -> (&str, &str) {
    match text.char_indices().nth(n) {
        Some((i, _)) => text.split_at(i),
        None => (text, ""),
    }
}

/// The last `n` characters of `text`
fn tail(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &text[i..],
        None => text,
    }
}
