use crate::IngestError;
use crate::chunk::Chunk;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Window length in characters.
    pub size: usize,
    /// Characters shared between consecutive windows. Must be < size.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            size: 800,
            overlap: 100,
        }
    }
}

/// Sliding-window chunker over character offsets. Window length `size`,
/// stride `size - overlap`, last window truncated to the remaining text.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, IngestError> {
        if config.size == 0 || config.size <= config.overlap {
            return Err(IngestError::Config {
                size: config.size,
                overlap: config.overlap,
            });
        }
        Ok(Self { config })
    }

    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let stride = self.config.size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.config.size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            chunks.push(Chunk::new(
                doc_id.to_string(),
                window,
                source.to_string(),
                (start, end),
                chunks.len(),
            ));

            if end == chars.len() {
                break;
            }
            start += stride;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
        let chunker = Chunker::new(ChunkerConfig { size, overlap }).unwrap();
        chunker.chunk_text("doc", text, "test")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(Chunker::new(ChunkerConfig { size: 10, overlap: 10 }).is_err());
        assert!(Chunker::new(ChunkerConfig { size: 0, overlap: 0 }).is_err());
        assert!(Chunker::new(ChunkerConfig { size: 10, overlap: 0 }).is_ok());
    }

    #[test]
    fn covers_all_text_without_gaps() {
        let text: String = (0..997).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk(&text, 100, 20);

        assert_eq!(chunks[0].offset.0, 0);
        for pair in chunks.windows(2) {
            // Next window starts inside the previous one: no gaps.
            assert!(pair[1].offset.0 <= pair[0].offset.1);
            assert_eq!(pair[0].offset.1 - pair[1].offset.0, 20);
        }
        assert_eq!(chunks.last().unwrap().offset.1, 997);
    }

    #[test]
    fn two_windows_share_exact_overlap() {
        // 4400 chars at size=4000/overlap=200 must yield exactly 2 chunks
        // whose boundary regions are identical.
        let text: String = (0..4400).map(|i| char::from(b'a' + (i % 23) as u8)).collect();
        let chunks = chunk(&text, 4000, 200);

        assert_eq!(chunks.len(), 2);
        let tail: String = chunks[0].text.chars().skip(3800).collect();
        let head: String = chunks[1].text.chars().take(200).collect();
        assert_eq!(tail, head);
        assert_eq!(chunks[1].offset, (3800, 4400));
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = chunk("tiny", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!(chunks[0].offset, (0, 4));
    }

    #[test]
    fn handles_multibyte_characters_by_char_offset() {
        let text = "αβγδ".repeat(10); // 40 chars, 80 bytes
        let chunks = chunk(&text, 25, 5);
        assert_eq!(chunks[0].text.chars().count(), 25);
        assert_eq!(chunks.last().unwrap().offset.1, 40);
    }
}
