/// Line reader: normalizes raw input into logical lines
///
/// Each logical line is fully tab-expanded (to the next 4-column stop,
/// measured from the start of the line), has NUL bytes replaced by U+FFFD,
/// and ends with a canonical `\n` regardless of the source terminator
/// (`\r\n`, `\r`, `\n`, or end of input). Because expansion happens here,
/// downstream parsing can treat char index and virtual column as the same
/// thing.
use crate::ast::Span;

pub const TAB_STOP: usize = 4;

/// One logical line. `map[i]` is the original byte range that produced
/// `chars[i]`; every space expanded from a tab maps to the tab's byte, and
/// the trailing `\n` maps to the whole source terminator, so a `\r\n` pair
/// is recoverable from the newline's span alone.
#[derive(Debug, Clone)]
pub struct Line {
    pub chars: Vec<char>,
    pub map: Vec<Span>,
    /// 1-based line number.
    pub number: usize,
}

impl Line {
    /// Origin span of the char at `idx`, when tracking is on.
    pub fn origin(&self, idx: usize) -> Option<Span> {
        self.map.get(idx).copied()
    }
}

pub struct LineReader<'a> {
    rest: &'a str,
    offset: usize,
    track: bool,
    number: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(source: &'a str, track: bool) -> Self {
        LineReader {
            rest: source,
            offset: 0,
            track,
            number: 0,
        }
    }
}

impl Iterator for LineReader<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.rest.is_empty() {
            return None;
        }
        self.number += 1;

        let mut chars = Vec::new();
        let mut map = Vec::new();
        let mut col = 0usize;
        let mut push = |ch: char, span: Span, map: &mut Vec<Span>, chars: &mut Vec<char>| {
            chars.push(ch);
            if self.track {
                map.push(span);
            }
        };

        let mut iter = self.rest.char_indices();
        let mut consumed = self.rest.len();
        let mut terminator = Span::new(
            (self.offset + self.rest.len()) as u32,
            (self.offset + self.rest.len()) as u32,
        );

        while let Some((i, ch)) = iter.next() {
            let at = (self.offset + i) as u32;
            match ch {
                '\n' => {
                    consumed = i + 1;
                    terminator = Span::new(at, at + 1);
                    break;
                }
                '\r' => {
                    // \r\n counts as a single two-byte terminator
                    if self.rest[i + 1..].starts_with('\n') {
                        consumed = i + 2;
                        terminator = Span::new(at, at + 2);
                    } else {
                        consumed = i + 1;
                        terminator = Span::new(at, at + 1);
                    }
                    break;
                }
                '\t' => {
                    let stop = (col / TAB_STOP + 1) * TAB_STOP;
                    while col < stop {
                        push(' ', Span::new(at, at + 1), &mut map, &mut chars);
                        col += 1;
                    }
                }
                '\0' => {
                    push('\u{FFFD}', Span::new(at, at + 1), &mut map, &mut chars);
                    col += 1;
                }
                _ => {
                    push(
                        ch,
                        Span::new(at, at + ch.len_utf8() as u32),
                        &mut map,
                        &mut chars,
                    );
                    col += 1;
                }
            }
        }

        push('\n', terminator, &mut map, &mut chars);
        self.offset += consumed;
        self.rest = &self.rest[consumed..];

        Some(Line {
            chars,
            map,
            number: self.number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(source: &str, track: bool) -> Vec<Line> {
        LineReader::new(source, track).collect()
    }

    fn text(line: &Line) -> String {
        line.chars.iter().collect()
    }

    #[test]
    fn splits_on_all_terminators() {
        let all = lines("a\nb\r\nc\rd", false);
        let texts: Vec<String> = all.iter().map(text).collect();
        assert_eq!(texts, vec!["a\n", "b\n", "c\n", "d\n"]);
        assert_eq!(all[3].number, 4);
    }

    #[test]
    fn expands_tabs_from_line_start() {
        let all = lines("\tfoo\n  \tbar\n", false);
        assert_eq!(text(&all[0]), "    foo\n");
        assert_eq!(text(&all[1]), "    bar\n");
    }

    #[test]
    fn substitutes_nul() {
        let all = lines("a\0b\n", false);
        assert_eq!(text(&all[0]), "a\u{FFFD}b\n");
    }

    #[test]
    fn origin_map_covers_tab_expansion() {
        let all = lines("\tx\n", true);
        let line = &all[0];
        // four spaces all map to the tab byte at offset 0
        for i in 0..4 {
            assert_eq!(line.origin(i), Some(Span::new(0, 1)));
        }
        assert_eq!(line.origin(4), Some(Span::new(1, 2)));
    }

    #[test]
    fn crlf_terminator_spans_both_bytes() {
        let all = lines("ab\r\ncd\n", true);
        let first = &all[0];
        let newline = first.origin(2).unwrap();
        assert_eq!(newline, Span::new(2, 4));
        // second line starts past the \r\n
        assert_eq!(all[1].origin(0), Some(Span::new(4, 5)));
    }

    #[test]
    fn final_line_without_terminator() {
        let all = lines("abc", true);
        assert_eq!(text(&all[0]), "abc\n");
        // synthetic newline has a zero-length span at end of input
        assert_eq!(all[0].origin(3), Some(Span::new(3, 3)));
    }
}
