//! Overlapping window splitter.
//!
//! Cuts text into windows of at most `max_chars` characters. A window ends
//! just after the last sentence or line break (`.`, `!`, `?`, `\n`) it
//! contains; without one it is cut hard at the limit. Consecutive windows
//! share `overlap` characters.

use super::ChunkingConfig;

/// One window of the source text.
///
/// `start` and `end` are character offsets (end exclusive) of the untrimmed
/// window in the source; `text` is the trimmed content.
#[derive(Debug, Clone, PartialEq)]
pub struct TextWindow {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Character-window splitter with boundary preference.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    max_chars: usize,
    overlap: usize,
}

impl TextSplitter {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            overlap: config.overlap,
        }
    }

    /// Split `text` into windows. Blank input yields no windows.
    pub fn split(&self, text: &str) -> Vec<TextWindow> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Offsets are in chars so accented text never splits inside a code point.
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        if len <= self.max_chars {
            return vec![TextWindow {
                text: text.trim().to_string(),
                start: 0,
                end: len,
            }];
        }

        let mut windows = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = (start + self.max_chars).min(len);

            if end < len {
                if let Some(boundary) = (start + 1..end).rev().find(|&i| is_boundary(chars[i])) {
                    end = boundary + 1;
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                windows.push(TextWindow {
                    text: trimmed.to_string(),
                    start,
                    end,
                });
            }

            if end >= len {
                break;
            }

            // A boundary close to `start` would otherwise move the cursor backwards.
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        windows
    }
}

fn is_boundary(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(max_chars: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(&ChunkingConfig { max_chars, overlap })
    }

    #[test]
    fn test_short_text_single_window() {
        let windows = splitter(500, 50).split("  Concert de jazz au parc.  ");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, "Concert de jazz au parc.");
    }

    #[test]
    fn test_blank_text_no_windows() {
        assert!(splitter(500, 50).split("").is_empty());
        assert!(splitter(500, 50).split(" \n\t ").is_empty());
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = "Première phrase ici. Deuxième phrase un peu plus longue que la première.";
        let windows = splitter(30, 5).split(text);

        assert!(windows.len() > 1);
        assert_eq!(windows[0].text, "Première phrase ici.");
        for w in &windows {
            assert!(w.end - w.start <= 30);
        }
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        let text = "a".repeat(95);
        let windows = splitter(40, 10).split(&text);

        assert_eq!(windows[0].end, 40);
        assert_eq!(windows[1].start, 30);
        assert_eq!(windows.last().unwrap().end, 95);
    }

    #[test]
    fn test_windows_cover_text_with_overlap() {
        let text = "Le festival ouvre ses portes! Trois scènes accueillent les artistes.\n\
                    Des ateliers pour enfants sont prévus? Oui, chaque après-midi. \
                    La clôture aura lieu dimanche soir avec un feu d'artifice.";
        let len = text.chars().count();
        let windows = splitter(60, 12).split(text);

        assert!(windows.len() > 1);
        assert_eq!(windows[0].start, 0);
        assert_eq!(windows.last().unwrap().end, len);

        for pair in windows.windows(2) {
            assert!(pair[1].start <= pair[0].end, "gap between windows");
            assert!(pair[1].start > pair[0].start, "cursor did not advance");
        }

        let chars: Vec<char> = text.chars().collect();
        for w in &windows {
            let span: String = chars[w.start..w.end].iter().collect();
            assert_eq!(span.trim(), w.text);
        }
    }

    #[test]
    fn test_early_boundary_still_advances() {
        // Boundary right after start with an overlap larger than the window it produces.
        let text = format!("A.{}", "b".repeat(100));
        let windows = splitter(50, 20).split(&text);

        assert_eq!(windows[0].text, "A.");
        assert_eq!(windows[1].start, 2);
        assert_eq!(windows.last().unwrap().end, 102);
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "é".repeat(120);
        let windows = splitter(50, 5).split(&text);
        assert!(windows.iter().all(|w| w.text.chars().count() <= 50));
        assert_eq!(windows.last().unwrap().end, 120);
    }
}
