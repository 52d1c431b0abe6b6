use std::ops::Range;

/// A contiguous piece of a document with its 1-based inclusive line bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

pub trait ChunkSplitter: Send + Sync {
    /// Splits `text` into ordered spans of at most `chunk_size` characters.
    fn split(&self, text: &str, chunk_size: usize) -> Vec<TextSpan>;
}

/// Recursive splitter for markdown: packs whole sections, then paragraphs,
/// then lines, then words, falling back to raw characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownSplitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Section,
    Paragraph,
    Line,
}

impl Level {
    fn finer(self) -> Option<Level> {
        match self {
            Level::Section => Some(Level::Paragraph),
            Level::Paragraph => Some(Level::Line),
            Level::Line => None,
        }
    }
}

impl ChunkSplitter for MarkdownSplitter {
    fn split(&self, text: &str, chunk_size: usize) -> Vec<TextSpan> {
        let chunk_size = chunk_size.max(1);
        let lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();

        let mut splitter = SpanWriter {
            lines: &lines,
            chunk_size,
            spans: Vec::new(),
        };
        splitter.split_range(0..lines.len(), Level::Section);
        splitter.spans
    }
}

struct SpanWriter<'a> {
    lines: &'a [&'a str],
    chunk_size: usize,
    spans: Vec<TextSpan>,
}

impl SpanWriter<'_> {
    fn split_range(&mut self, range: Range<usize>, level: Level) {
        let mut pending: Option<Range<usize>> = None;

        for group in self.groups(range, level) {
            if self.span_len(&group) > self.chunk_size {
                if let Some(open) = pending.take() {
                    self.emit(open);
                }
                match level.finer() {
                    Some(finer) => self.split_range(group, finer),
                    None => self.split_long_line(group.start),
                }
                continue;
            }

            pending = match pending {
                None => Some(group),
                Some(open) => {
                    let merged = open.start..group.end;
                    if self.span_len(&merged) <= self.chunk_size {
                        Some(merged)
                    } else {
                        self.emit(open);
                        Some(group)
                    }
                }
            };
        }

        if let Some(open) = pending {
            self.emit(open);
        }
    }

    fn groups(&self, range: Range<usize>, level: Level) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        match level {
            Level::Section => {
                let mut start = range.start;
                for index in range.clone() {
                    if index > start && is_heading(self.lines[index]) {
                        groups.push(start..index);
                        start = index;
                    }
                }
                if start < range.end {
                    groups.push(start..range.end);
                }
            }
            Level::Paragraph => {
                let mut start = None;
                for index in range.clone() {
                    let blank = self.lines[index].trim().is_empty();
                    match (blank, start) {
                        (false, None) => start = Some(index),
                        (true, Some(open)) => {
                            groups.push(open..index);
                            start = None;
                        }
                        _ => {}
                    }
                }
                if let Some(open) = start {
                    groups.push(open..range.end);
                }
            }
            Level::Line => {
                groups.extend(
                    range
                        .filter(|index| !self.lines[*index].trim().is_empty())
                        .map(|index| index..index + 1),
                );
            }
        }
        groups
    }

    fn span_len(&self, range: &Range<usize>) -> usize {
        let (start, end) = self.trimmed(range.clone());
        if start >= end {
            return 0;
        }
        self.lines[start..end]
            .iter()
            .map(|line| line.chars().count())
            .sum::<usize>()
            + (end - start - 1)
    }

    fn trimmed(&self, range: Range<usize>) -> (usize, usize) {
        let mut start = range.start;
        let mut end = range.end;
        while start < end && self.lines[start].trim().is_empty() {
            start += 1;
        }
        while end > start && self.lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        (start, end)
    }

    fn emit(&mut self, range: Range<usize>) {
        let (start, end) = self.trimmed(range);
        if start >= end {
            return;
        }
        self.spans.push(TextSpan {
            content: self.lines[start..end].join("\n"),
            start_line: start + 1,
            end_line: end,
        });
    }

    fn split_long_line(&mut self, index: usize) {
        let line_number = index + 1;
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in self.lines[index].split_whitespace() {
            let word_len = word.chars().count();
            if word_len > self.chunk_size {
                if !current.is_empty() {
                    self.push_line_piece(std::mem::take(&mut current), line_number);
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(self.chunk_size) {
                    self.push_line_piece(piece.iter().collect(), line_number);
                }
                continue;
            }

            let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
            if needed > self.chunk_size {
                self.push_line_piece(std::mem::take(&mut current), line_number);
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }

        if !current.is_empty() {
            self.push_line_piece(current, line_number);
        }
    }

    fn push_line_piece(&mut self, content: String, line_number: usize) {
        self.spans.push(TextSpan {
            content,
            start_line: line_number,
            end_line: line_number,
        });
    }
}

fn is_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|byte| *byte == b'#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_document_is_one_chunk() {
        let spans = MarkdownSplitter.split("# Title\n\nShort body.", 1_000);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_line, 1);
        assert_eq!(spans[0].end_line, 3);
        assert_eq!(spans[0].content, "# Title\n\nShort body.");
    }

    #[test]
    fn sections_split_at_headings_with_line_ranges() {
        let text = "# One\nalpha alpha\n\n# Two\nbeta beta";
        let spans = MarkdownSplitter.split(text, 20);

        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start_line, spans[0].end_line), (1, 2));
        assert_eq!(spans[0].content, "# One\nalpha alpha");
        assert_eq!((spans[1].start_line, spans[1].end_line), (4, 5));
    }

    #[test]
    fn long_lines_split_by_words_and_characters() {
        let text = format!("intro\n{} tail", "x".repeat(25));
        let spans = MarkdownSplitter.split(&text, 10);

        assert!(spans.iter().all(|span| span.content.chars().count() <= 10));
        assert_eq!(spans[0].content, "intro");
        assert!(spans[1..].iter().all(|span| span.start_line == 2));
        assert_eq!(spans.last().map(|span| span.content.as_str()), Some("tail"));
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(MarkdownSplitter.split("", 100).is_empty());
        assert!(MarkdownSplitter.split("\n  \n", 100).is_empty());
    }

    #[test]
    fn spans_are_ordered_and_bounded() {
        let text = (1..=40)
            .map(|index| format!("line number {index}"))
            .collect::<Vec<_>>()
            .join("\n");
        let spans = MarkdownSplitter.split(&text, 60);

        assert!(spans.len() > 1);
        assert!(spans.iter().all(|span| span.content.chars().count() <= 60));
        for pair in spans.windows(2) {
            assert!(pair[0].end_line < pair[1].start_line);
        }
        assert_eq!(spans.last().map(|span| span.end_line), Some(40));
    }
}
