//! Text statistics for the editor status line and the `stats` command.

use mdpress_api_types::StatsResponse;
use serde::Serialize;

const WORDS_PER_MINUTE: usize = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub chars: usize,
    pub chars_no_spaces: usize,
    /// CJK ideographs count one each; Latin words count one each.
    pub words: usize,
    pub lines: usize,
    pub paragraphs: usize,
    pub read_time_minutes: usize,
}

pub fn text_stats(text: &str) -> TextStats {
    if text.trim().is_empty() {
        return TextStats::default();
    }

    let chars = text.chars().count();
    let chars_no_spaces = text.chars().filter(|c| !c.is_whitespace()).count();
    let lines = text.split('\n').count();
    let paragraphs = count_paragraphs(text);
    let words = count_cjk(text) + count_latin_words(text);

    TextStats {
        chars,
        chars_no_spaces,
        words,
        lines,
        paragraphs,
        read_time_minutes: words.div_ceil(WORDS_PER_MINUTE).max(1),
    }
}

impl From<TextStats> for StatsResponse {
    fn from(stats: TextStats) -> Self {
        Self {
            chars: stats.chars,
            chars_no_spaces: stats.chars_no_spaces,
            words: stats.words,
            lines: stats.lines,
            paragraphs: stats.paragraphs,
            read_time_minutes: stats.read_time_minutes,
        }
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

fn count_cjk(text: &str) -> usize {
    text.chars().filter(|c| is_cjk(*c)).count()
}

fn count_latin_words(text: &str) -> usize {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|run| !run.is_empty())
        .count()
}

/// Blocks separated by at least one blank (whitespace-only) line.
fn count_paragraphs(text: &str) -> usize {
    let mut paragraphs = 0;
    let mut in_paragraph = false;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            in_paragraph = false;
        } else if !in_paragraph {
            paragraphs += 1;
            in_paragraph = true;
        }
    }
    paragraphs
}
