use crate::extractor::PageText;
use crate::models::Chunk;
use tracing::debug;

/// Break-point preference, best first: paragraph, line, sentence, word.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", " "];

/// Collapses every whitespace run (including non-breaking spaces) to a
/// single ASCII space and trims the ends. Idempotent.
pub fn clean(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits cleaned text into overlapping pieces of at most `chunk_size`
/// characters, preferring natural break points over hard cuts. Same input
/// and parameters always produce the same boundaries.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            let trimmed = text.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                self.break_point(&chars, start, hard_end)
            };

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }

            if end == chars.len() {
                break;
            }
            // Carry `chunk_overlap` characters into the next piece while
            // always advancing past the previous start.
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        pieces
    }

    /// Attaches every produced piece to its originating page number.
    pub fn split_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            let cleaned = clean(&page.content);
            for text in self.split_text(&cleaned) {
                chunks.push(Chunk {
                    text,
                    page: page.page,
                });
            }
        }

        debug!(
            chunks = chunks.len(),
            pages = pages.len(),
            "split pages into chunks"
        );
        chunks
    }

    /// Picks the latest preferred separator in the window whose cut still
    /// lands past the overlap region, so every piece makes real progress.
    fn break_point(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + self.chunk_overlap + 1;
        for separator in SEPARATORS {
            let separator: Vec<char> = separator.chars().collect();
            if let Some(cut) = rfind_separator(chars, &separator, start, hard_end) {
                if cut >= floor {
                    return cut;
                }
            }
        }
        hard_end
    }
}

/// Index just past the last occurrence of `separator` fully inside
/// `chars[start..end]`, if any.
fn rfind_separator(chars: &[char], separator: &[char], start: usize, end: usize) -> Option<usize> {
    if separator.is_empty() || separator.len() > end - start {
        return None;
    }

    let mut position = end - separator.len();
    loop {
        if chars[position..position + separator.len()] == *separator {
            return Some(position + separator.len());
        }
        if position == start {
            return None;
        }
        position -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{clean, TextSplitter};
    use crate::extractor::PageText;

    #[test]
    fn clean_collapses_whitespace_runs() {
        let input = "A  \t  lot\nof\u{a0}\u{a0}spacing  ";
        assert_eq!(clean(input), "A lot of spacing");
    }

    #[test]
    fn clean_is_idempotent() {
        let input = "Revenue\u{a0}was   $100\n\nin 2023.";
        let once = clean(input);
        assert_eq!(clean(&once), once);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::new(100, 10);
        assert_eq!(splitter.split_text("small text"), vec!["small text"]);
        assert!(splitter.split_text("   ").is_empty());
    }

    #[test]
    fn word_boundaries_and_overlap_are_respected() {
        let splitter = TextSplitter::new(10, 4);
        let pieces = splitter.split_text("aaaa bbbb cccc dddd eeee ffff");

        assert_eq!(
            pieces,
            vec!["aaaa bbbb", "bbb cccc", "ccc dddd", "ddd eeee", "eee ffff"]
        );
        assert!(pieces.iter().all(|piece| piece.chars().count() <= 10));
    }

    #[test]
    fn sentence_boundaries_beat_hard_cuts() {
        let splitter = TextSplitter::new(20, 0);
        let pieces = splitter.split_text("First sentence. Second sentence. Third.");
        assert_eq!(
            pieces,
            vec!["First sentence.", "Second sentence.", "Third."]
        );
    }

    #[test]
    fn splitting_is_deterministic() {
        let splitter = TextSplitter::new(15, 5);
        let text = "Net income rose by 12 percent over the prior fiscal year.";
        assert_eq!(splitter.split_text(text), splitter.split_text(text));
    }

    #[test]
    fn text_without_separators_falls_back_to_hard_cuts() {
        let splitter = TextSplitter::new(8, 2);
        let pieces = splitter.split_text("abcdefghijklmnopqrst");
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|piece| piece.chars().count() <= 8));
    }

    #[test]
    fn empty_pages_yield_no_chunks_and_provenance_is_kept() {
        let splitter = TextSplitter::new(1_000, 200);
        let pages = vec![
            PageText {
                page: 1,
                content: "Revenue was $100 in 2023.".to_string(),
            },
            PageText {
                page: 2,
                content: String::new(),
            },
        ];

        let chunks = splitter.split_pages(&pages);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.page == 1));
    }
}
