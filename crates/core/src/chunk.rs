use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 500;

/// Terminal punctuation followed by whitespace. The punctuation stays with
/// the sentence it ends; the whitespace run is dropped.
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.?!]\s+").expect("sentence regex"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Upper bound on passage length, in characters.
    pub max_length: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_CHUNK_LENGTH,
        }
    }
}

/// Greedy sentence packer.
///
/// Sentences are accumulated into a buffer (joined by a single space) until
/// the next one would push the buffer past `max_length`; the buffer is then
/// flushed as a passage. The joining space counts toward the length, so a
/// packed passage never exceeds `max_length`. A sentence longer than
/// `max_length` on its own is emitted whole rather than split.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self::new(ChunkConfig { max_length })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let max_length = self.config.max_length;
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;
        for sentence in split_sentences(text) {
            let sentence_chars = sentence.chars().count();
            let separator = usize::from(!buffer.is_empty());
            if buffer_chars + separator + sentence_chars <= max_length {
                if separator == 1 {
                    buffer.push(' ');
                }
                buffer.push_str(sentence);
                buffer_chars += separator + sentence_chars;
                continue;
            }
            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            }
            buffer.push_str(sentence);
            buffer_chars = sentence_chars;
        }
        if !buffer.is_empty() {
            chunks.push(buffer);
        }
        chunks
    }
}

pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    Chunker::with_max_length(max_length).chunk(text)
}

/// Splits after `.`, `?` or `!` when followed by whitespace. Returned
/// sentences are trimmed; blank ones are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for found in SENTENCE_BREAK.find_iter(text) {
        // punctuation is a single ASCII byte
        let end = found.start() + 1;
        push_trimmed(&mut sentences, &text[start..end]);
        start = found.end();
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, sentence: &'a str) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_nothing() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   \n\t ", 10).is_empty());
    }

    #[test]
    fn one_passage_per_sentence_when_pairs_overflow() {
        assert_eq!(chunk_text("A. B. C.", 4), vec!["A.", "B.", "C."]);
    }

    #[test]
    fn joining_space_counts_toward_the_limit() {
        assert_eq!(chunk_text("Ab. Cd.", 7), vec!["Ab. Cd."]);
        assert_eq!(chunk_text("Ab. Cd.", 6), vec!["Ab.", "Cd."]);
    }

    #[test]
    fn packs_sentences_up_to_the_limit() {
        let chunks = chunk_text("One two. Three four? Five six! Seven.", 20);
        assert_eq!(chunks, vec!["One two. Three four?", "Five six! Seven."]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn oversized_sentence_is_kept_whole() {
        let long = "This sentence is much longer than the limit allows.";
        let text = format!("Short. {long} Tail.");
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks, vec!["Short.", long, "Tail."]);
    }

    #[test]
    fn splits_only_on_punctuation_followed_by_whitespace() {
        let sentences = split_sentences("Version 1.2 shipped.Next  line! Done?\nYes");
        assert_eq!(sentences, vec!["Version 1.2 shipped.Next  line!", "Done?", "Yes"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = chunk_text("Ünïcödé. Ünïcödé.", 17);
        assert_eq!(chunks, vec!["Ünïcödé. Ünïcödé."]);
    }
}
