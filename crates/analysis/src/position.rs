use crate::types::{Locator, TextPosition, TextRange};

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Maps tool locators onto word ranges in the current document text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionResolver;

impl PositionResolver {
    /// Returns the range of the word at `locator`, or `None` if the position
    /// no longer lands on a word, e.g. after an edit moved or removed it.
    ///
    /// Columns count characters. A position just past the end of a word
    /// resolves to that word.
    pub fn resolve(&self, text: &str, locator: Locator) -> Option<TextRange> {
        let line_index = locator.line.checked_sub(1)?;
        let line = text.split('\n').nth(line_index as usize)?;
        let chars: Vec<char> = line.trim_end_matches('\r').chars().collect();

        let column = locator.column as usize;
        if column > chars.len() {
            return None;
        }

        let anchor = if chars.get(column).copied().is_some_and(is_word_char) {
            column
        } else if column > 0 && is_word_char(chars[column - 1]) {
            column - 1
        } else {
            return None;
        };

        let start = chars[..anchor]
            .iter()
            .rposition(|c| !is_word_char(*c))
            .map_or(0, |i| i + 1);
        let end = chars[anchor..]
            .iter()
            .position(|c| !is_word_char(*c))
            .map_or(chars.len(), |i| anchor + i);

        Some(TextRange {
            start: TextPosition {
                line: line_index,
                character: start as u32,
            },
            end: TextPosition {
                line: line_index,
                character: end as u32,
            },
        })
    }
}
