/// Link reference definitions
///
/// Definitions are collected while paragraphs are finalized and looked up
/// during inline parsing. Matching follows CommonMark label normalization:
/// trim, collapse internal whitespace, and Unicode case fold (the case fold
/// is skipped when the map is case sensitive).
use crate::scanners;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_casefold::UnicodeCaseFold;

/// Labels longer than this (before normalization) never match anything.
pub const MAX_LABEL_LENGTH: usize = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMap {
    map: HashMap<String, Reference>,
    case_sensitive: bool,
}

impl ReferenceMap {
    pub fn new(case_sensitive: bool) -> Self {
        ReferenceMap {
            map: HashMap::new(),
            case_sensitive,
        }
    }

    /// Normalized form of a label, or None when the label is empty, blank,
    /// or over the length limit.
    pub fn normalize(&self, label: &str) -> Option<String> {
        if label.len() > MAX_LABEL_LENGTH {
            return None;
        }
        let mut normalized = String::with_capacity(label.len());
        let mut pending_space = false;
        for ch in label.trim().chars() {
            if ch.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space {
                normalized.push(' ');
                pending_space = false;
            }
            if self.case_sensitive {
                normalized.push(ch);
            } else {
                normalized.extend(ch.case_fold());
            }
        }
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    /// Insert a definition. The first definition for a label wins; later
    /// ones are ignored.
    pub fn insert(&mut self, label: &str, url: String, title: Option<String>) {
        if let Some(key) = self.normalize(label) {
            self.map
                .entry(key)
                .or_insert(Reference { url, title });
        }
    }

    pub fn lookup(&self, label: &str) -> Option<&Reference> {
        let key = self.normalize(label)?;
        self.map.get(&key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Try to parse one link reference definition at `pos` in a finalized
/// paragraph buffer (where every line ends in `\n`). The definition must
/// end cleanly at a line boundary; a title that leaves garbage on its line
/// is dropped and the parse is retried without it. Returns the label, the
/// destination, the optional title, and the chars consumed (through the
/// final newline).
pub fn parse_reference(chars: &[char], pos: usize) -> Option<(String, String, Option<String>, usize)> {
    let (label, label_len) = scanners::scan_link_label(chars, pos)?;
    if label.trim().is_empty() {
        return None;
    }
    let mut i = pos + label_len;
    if chars.get(i) != Some(&':') {
        return None;
    }
    i += 1;

    // whitespace before the destination, at most one newline
    i += skip_spacing(chars, i, 1)?;
    let (url, url_len) = scanners::scan_link_destination(chars, i)?;
    i += url_len;

    let after_url = i;
    // a title needs whitespace before it, again at most one newline
    let title = match skip_spacing(chars, i, 1) {
        Some(spacing) if spacing > 0 => {
            match scanners::scan_link_title(chars, i + spacing) {
                Some((title, title_len)) => {
                    let end = i + spacing + title_len;
                    if scanners::rest_is_blank(chars, end) {
                        i = end;
                        Some(title)
                    } else {
                        None
                    }
                }
                None => None,
            }
        }
        _ => None,
    };

    if title.is_none() {
        i = after_url;
    }
    if !scanners::rest_is_blank(chars, i) {
        return None;
    }
    // consume through the end of the line
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    if i < chars.len() {
        i += 1;
    }
    Some((label, url, title, i - pos))
}

/// Spaces and up to `max_newlines` newlines starting at `pos`. None when a
/// second newline appears (a blank line ends any definition).
fn skip_spacing(chars: &[char], pos: usize, max_newlines: usize) -> Option<usize> {
    let mut i = pos;
    let mut newlines = 0;
    while i < chars.len() {
        match chars[i] {
            ' ' => i += 1,
            '\n' => {
                newlines += 1;
                if newlines > max_newlines {
                    return None;
                }
                i += 1;
            }
            _ => break,
        }
    }
    Some(i - pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[test]
    fn labels_fold_and_collapse() {
        let mut refs = ReferenceMap::new(false);
        refs.insert("  Foo \n  Bar ", "/url".to_string(), None);
        assert_eq!(
            refs.lookup("foo bar").map(|r| r.url.as_str()),
            Some("/url")
        );
        assert_eq!(refs.lookup("FOO BAR").map(|r| r.url.as_str()), Some("/url"));
        assert!(refs.lookup("foobar").is_none());
    }

    #[test]
    fn case_fold_handles_non_ascii() {
        let refs = ReferenceMap::new(false);
        assert_eq!(refs.normalize("ToLERANz"), refs.normalize("toleranz"));
        // U+00DF folds to "ss"
        assert_eq!(refs.normalize("stra\u{00DF}e"), refs.normalize("strasse"));
    }

    #[test]
    fn case_sensitive_map_does_not_fold() {
        let mut refs = ReferenceMap::new(true);
        refs.insert("Foo", "/url".to_string(), None);
        assert!(refs.lookup("foo").is_none());
        assert!(refs.lookup("Foo").is_some());
    }

    #[test]
    fn first_definition_wins() {
        let mut refs = ReferenceMap::new(false);
        refs.insert("foo", "/first".to_string(), None);
        refs.insert("foo", "/second".to_string(), Some("t".to_string()));
        let reference = refs.lookup("foo").unwrap();
        assert_eq!(reference.url, "/first");
        assert_eq!(reference.title, None);
    }

    #[test]
    fn oversized_labels_never_match() {
        let mut refs = ReferenceMap::new(false);
        let big = "x".repeat(MAX_LABEL_LENGTH + 1);
        refs.insert(&big, "/url".to_string(), None);
        assert!(refs.is_empty());
        assert!(refs.lookup(&big).is_none());
    }

    #[test]
    fn parses_full_definition() {
        let input = chars("[foo]: /url \"title\"\nrest");
        let (label, url, title, consumed) = parse_reference(&input, 0).unwrap();
        assert_eq!(label, "foo");
        assert_eq!(url, "/url");
        assert_eq!(title.as_deref(), Some("title"));
        assert_eq!(consumed, 20);
        assert_eq!(input[consumed], 'r');
    }

    #[test]
    fn destination_may_start_on_next_line() {
        let input = chars("[foo]:\n/url\n");
        let (_, url, title, consumed) = parse_reference(&input, 0).unwrap();
        assert_eq!(url, "/url");
        assert_eq!(title, None);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn bad_title_line_drops_title_only() {
        // the title line has trailing garbage, so only the destination
        // counts and parsing resumes after the url line
        let input = chars("[foo]: /url\n\"title\" extra\n");
        let (_, url, title, consumed) = parse_reference(&input, 0).unwrap();
        assert_eq!(url, "/url");
        assert_eq!(title, None);
        assert_eq!(consumed, 12);
    }

    #[test]
    fn garbage_after_destination_is_not_a_definition() {
        let input = chars("[foo]: /url extra\n");
        assert!(parse_reference(&input, 0).is_none());
    }

    #[test]
    fn blank_line_ends_the_search() {
        let input = chars("[foo]:\n\n/url\n");
        assert!(parse_reference(&input, 0).is_none());
    }
}
