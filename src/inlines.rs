/// Phase 2: inline structure
///
/// Each leaf block's raw text is rescanned into an inline tree. Emphasis
/// and brackets share a single delimiter stack; nothing recurses. When a
/// delimiter pair matches, the text node that held the run is promoted in
/// place to the container node (Emphasis, Strong, Link, ...) whenever its
/// run is fully consumed, so sibling links and pending delimiters stay
/// valid without any tree rebuilding.
use crate::ast::{BlockTag, Document, Inline, InlineId, InlineTag, Span};
use crate::entities;
use crate::error::Result;
use crate::scanners;
use crate::settings::Settings;

/// Parse inline content for every block that carries it. Block `content`
/// buffers are consumed in the process.
pub fn parse_inlines(doc: &mut Document, settings: &Settings) -> Result<()> {
    for id in 0..doc.blocks.len() {
        let wants_inlines = {
            let tag = &doc.block(id).tag;
            tag.has_inlines()
                || (matches!(tag, BlockTag::IndentedCode) && settings.emphasis_in_code)
        };
        if !wants_inlines {
            continue;
        }
        let (chars, map) = {
            let block = doc.block_mut(id);
            (
                std::mem::take(&mut block.content),
                std::mem::take(&mut block.content_map),
            )
        };
        let first = {
            let mut parser = InlineParser::new(doc, settings, chars, map);
            parser.run()?
        };
        doc.block_mut(id).first_inline = first;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Emphasis,
    Bracket,
}

struct Delim {
    scope: Scope,
    ch: char,
    /// Remaining run length. Openers are consumed from the run's end,
    /// closers from its start.
    count: usize,
    /// The text node holding the (remaining) literal run.
    node: InlineId,
    /// Char index of the first remaining run char.
    position: usize,
    /// Brackets: first char of the enclosed text.
    text_start: usize,
    can_open: bool,
    can_close: bool,
    /// Brackets: cleared once an enclosing link forms, since links may not
    /// nest.
    active: bool,
    image: bool,
}

struct InlineParser<'d, 's> {
    doc: &'d mut Document,
    settings: &'s Settings,
    chars: Vec<char>,
    map: Vec<Span>,
    pos: usize,
    first: Option<InlineId>,
    last: Option<InlineId>,
    delims: Vec<Delim>,
}

impl<'d, 's> InlineParser<'d, 's> {
    fn new(
        doc: &'d mut Document,
        settings: &'s Settings,
        mut chars: Vec<char>,
        mut map: Vec<Span>,
    ) -> Self {
        // trailing whitespace never carries inline content
        while matches!(chars.last(), Some('\n') | Some(' ')) {
            chars.pop();
            map.pop();
        }
        InlineParser {
            doc,
            settings,
            chars,
            map,
            pos: 0,
            first: None,
            last: None,
            delims: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<Option<InlineId>> {
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                '\n' => self.parse_newline(),
                '\\' => self.parse_backslash(),
                '`' => self.parse_backticks(),
                '<' => self.parse_angle(),
                '&' => self.parse_entity(),
                '[' => self.open_bracket(false),
                '!' if self.chars.get(self.pos + 1) == Some(&'[') => self.open_bracket(true),
                '!' => {
                    self.push_text("!".to_string(), self.pos, self.pos + 1);
                    self.pos += 1;
                }
                ']' => self.close_bracket()?,
                ch @ ('*' | '_') => self.parse_delimiter_run(ch),
                '~' if self.settings.strikethrough || self.settings.sub_superscript => {
                    self.parse_delimiter_run('~')
                }
                '^' if self.settings.sub_superscript => self.parse_delimiter_run('^'),
                _ => self.parse_text(),
            }
        }
        self.process_emphasis(0)?;
        self.delims.clear();
        Ok(self.first)
    }

    fn is_special(&self, ch: char) -> bool {
        matches!(ch, '\n' | '\\' | '`' | '<' | '&' | '[' | ']' | '!' | '*' | '_')
            || (ch == '~' && (self.settings.strikethrough || self.settings.sub_superscript))
            || (ch == '^' && self.settings.sub_superscript)
    }

    fn span_of(&self, start: usize, end: usize) -> Span {
        if start < end && self.map.len() >= end {
            Span::new(self.map[start].start, self.map[end - 1].end)
        } else {
            Span::default()
        }
    }

    fn append(&mut self, inline: Inline) -> InlineId {
        let id = self.doc.push_inline(inline);
        match self.last {
            Some(last) => self.doc.inline_mut(last).next = Some(id),
            None => self.first = Some(id),
        }
        self.last = Some(id);
        id
    }

    fn push_text(&mut self, text: String, start: usize, end: usize) -> InlineId {
        let mut inline = Inline::new(InlineTag::Text(text));
        inline.span = self.span_of(start, end);
        self.append(inline)
    }

    fn parse_text(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len() && !self.is_special(self.chars[self.pos]) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push_text(text, start, self.pos);
    }

    /// Soft or hard line break. Two or more spaces before the newline make
    /// it hard; the spaces are removed from the preceding text node either
    /// way, as are spaces at the start of the next line.
    fn parse_newline(&mut self) {
        let pos = self.pos;
        let mut spaces = 0;
        while pos > spaces && self.chars[pos - spaces - 1] == ' ' {
            spaces += 1;
        }
        if spaces > 0
            && let Some(last) = self.last
            && let InlineTag::Text(text) = &mut self.doc.inline_mut(last).tag
        {
            let new_len = text.len().saturating_sub(spaces);
            text.truncate(new_len);
            let empty = text.is_empty();
            let node = self.doc.inline_mut(last);
            if empty {
                node.span.end = node.span.start;
            } else if !self.map.is_empty() {
                node.span.end = self.map[pos - spaces - 1].end;
            }
        }
        let tag = if spaces >= 2 {
            InlineTag::LineBreak
        } else {
            InlineTag::SoftBreak
        };
        let mut inline = Inline::new(tag);
        inline.span = self.span_of(pos, pos + 1);
        self.append(inline);
        self.pos = pos + 1;
        self.pos += scanners::scan_spaces(&self.chars, self.pos);
    }

    fn parse_backslash(&mut self) {
        let pos = self.pos;
        match self.chars.get(pos + 1) {
            Some('\n') => {
                let mut inline = Inline::new(InlineTag::LineBreak);
                inline.span = self.span_of(pos, pos + 2);
                self.append(inline);
                self.pos = pos + 2;
                self.pos += scanners::scan_spaces(&self.chars, self.pos);
            }
            Some(&next) if scanners::is_ascii_punctuation(next) => {
                self.push_text(next.to_string(), pos, pos + 2);
                self.pos = pos + 2;
            }
            _ => {
                self.push_text("\\".to_string(), pos, pos + 1);
                self.pos = pos + 1;
            }
        }
    }

    /// Code span: the closing run must have exactly the opener's length.
    /// Newlines inside become spaces; one space is stripped from both ends
    /// when present and the content is not all spaces.
    fn parse_backticks(&mut self) {
        let pos = self.pos;
        let open_len = scanners::run_length(&self.chars, pos, '`');
        let mut j = pos + open_len;
        while j < self.chars.len() {
            if self.chars[j] == '`' {
                let close_len = scanners::run_length(&self.chars, j, '`');
                if close_len == open_len {
                    let mut content: String = self.chars[pos + open_len..j]
                        .iter()
                        .map(|&c| if c == '\n' { ' ' } else { c })
                        .collect();
                    if content.starts_with(' ')
                        && content.ends_with(' ')
                        && content.chars().any(|c| c != ' ')
                    {
                        content = content[1..content.len() - 1].to_string();
                    }
                    let mut inline = Inline::new(InlineTag::Code(content));
                    inline.span = self.span_of(pos, j + close_len);
                    self.append(inline);
                    self.pos = j + close_len;
                    return;
                }
                j += close_len;
            } else {
                j += 1;
            }
        }
        self.push_text("`".repeat(open_len), pos, pos + open_len);
        self.pos = pos + open_len;
    }

    fn parse_angle(&mut self) {
        let pos = self.pos;
        let uri_len = scanners::scan_autolink_uri(&self.chars, pos);
        if uri_len > 0 {
            let uri: String = self.chars[pos + 1..pos + uri_len - 1].iter().collect();
            self.make_autolink(uri.clone(), uri, pos, uri_len);
            return;
        }
        let email_len = scanners::scan_autolink_email(&self.chars, pos);
        if email_len > 0 {
            let address: String = self.chars[pos + 1..pos + email_len - 1].iter().collect();
            self.make_autolink(format!("mailto:{address}"), address, pos, email_len);
            return;
        }
        let tag_len = scanners::scan_html_tag(&self.chars, pos);
        if tag_len > 0 {
            let raw: String = self.chars[pos..pos + tag_len].iter().collect();
            let mut inline = Inline::new(InlineTag::RawHtml(raw));
            inline.span = self.span_of(pos, pos + tag_len);
            self.append(inline);
            self.pos = pos + tag_len;
            return;
        }
        self.push_text("<".to_string(), pos, pos + 1);
        self.pos = pos + 1;
    }

    fn make_autolink(&mut self, destination: String, text: String, pos: usize, len: usize) {
        let mut child = Inline::new(InlineTag::Text(text));
        child.span = self.span_of(pos + 1, pos + len - 1);
        let child_id = self.doc.push_inline(child);
        let mut link = Inline::new(InlineTag::Link {
            destination,
            title: None,
        });
        link.first_child = Some(child_id);
        link.span = self.span_of(pos, pos + len);
        self.append(link);
        self.pos = pos + len;
    }

    fn parse_entity(&mut self) {
        let pos = self.pos;
        match entities::scan_entity(&self.chars, pos) {
            Some((decoded, consumed)) => {
                self.push_text(decoded, pos, pos + consumed);
                self.pos = pos + consumed;
            }
            None => {
                self.push_text("&".to_string(), pos, pos + 1);
                self.pos = pos + 1;
            }
        }
    }

    fn open_bracket(&mut self, image: bool) {
        let pos = self.pos;
        let (literal, width) = if image {
            ("![".to_string(), 2)
        } else {
            ("[".to_string(), 1)
        };
        let node = self.push_text(literal, pos, pos + width);
        self.delims.push(Delim {
            scope: Scope::Bracket,
            ch: '[',
            count: 1,
            node,
            position: pos,
            text_start: pos + width,
            can_open: true,
            can_close: false,
            active: true,
            image,
        });
        self.pos = pos + width;
    }

    fn close_bracket(&mut self) -> Result<()> {
        let pos = self.pos;
        let Some(bracket_idx) = self
            .delims
            .iter()
            .rposition(|d| d.scope == Scope::Bracket)
        else {
            self.push_text("]".to_string(), pos, pos + 1);
            self.pos = pos + 1;
            return Ok(());
        };
        if !self.delims[bracket_idx].active {
            self.delims.remove(bracket_idx);
            self.push_text("]".to_string(), pos, pos + 1);
            self.pos = pos + 1;
            return Ok(());
        }
        let image = self.delims[bracket_idx].image;
        let text_start = self.delims[bracket_idx].text_start;
        let opener_node = self.delims[bracket_idx].node;

        // destination, title, and the char index past the whole construct
        let mut matched: Option<(String, Option<String>, usize)> = None;
        if self.chars.get(pos + 1) == Some(&'(') {
            matched = self.try_inline_link(pos + 2);
        }
        if matched.is_none() {
            let mut label: Option<String> = None;
            let mut end = pos + 1;
            if self.chars.get(pos + 1) == Some(&'[')
                && let Some((text, len)) = scanners::scan_link_label(&self.chars, pos + 1)
            {
                end = pos + 1 + len;
                if !text.trim().is_empty() {
                    label = Some(text);
                }
            }
            let shortcut = end == pos + 1;
            let label =
                label.unwrap_or_else(|| self.chars[text_start..pos].iter().collect());
            if let Some(reference) = self.doc.refs.lookup(&label) {
                matched = Some((reference.url.clone(), reference.title.clone(), end));
            } else if shortcut
                && !image
                && let Some(resolver) = &self.settings.placeholder_resolver
                && let Some(url) = resolver(&label)
            {
                matched = Some((url, None, pos + 1));
            }
        }

        let Some((destination, title, end)) = matched else {
            self.delims.remove(bracket_idx);
            self.push_text("]".to_string(), pos, pos + 1);
            self.pos = pos + 1;
            return Ok(());
        };

        // emphasis inside the brackets resolves against this boundary only
        self.process_emphasis(bracket_idx + 1)?;
        self.delims.truncate(bracket_idx);

        let first_child = self.doc.inline(opener_node).next;
        let node = self.doc.inline_mut(opener_node);
        node.tag = if image {
            InlineTag::Image { destination, title }
        } else {
            InlineTag::Link { destination, title }
        };
        node.first_child = first_child;
        node.next = None;
        if !self.map.is_empty() && end > 0 {
            node.span.end = self.map[end - 1].end;
        }
        self.last = Some(opener_node);

        if !image {
            for delim in &mut self.delims {
                if delim.scope == Scope::Bracket && !delim.image {
                    delim.active = false;
                }
            }
        }
        self.pos = end;
        Ok(())
    }

    /// `](` has been seen; `i` is past the paren. Whitespace (including
    /// newlines) is allowed around the destination and title.
    fn try_inline_link(&self, mut i: usize) -> Option<(String, Option<String>, usize)> {
        i += self.spacing(i);
        let (destination, dest_len) =
            scanners::scan_link_destination(&self.chars, i).unwrap_or((String::new(), 0));
        i += dest_len;
        let spacing = self.spacing(i);
        let title = if spacing > 0 {
            scanners::scan_link_title(&self.chars, i + spacing)
        } else {
            None
        };
        let after = match title {
            Some((_, title_len)) => i + spacing + title_len,
            None => i,
        };
        let close = after + self.spacing(after);
        if self.chars.get(close) == Some(&')') {
            Some((destination, title.map(|(t, _)| t), close + 1))
        } else {
            None
        }
    }

    fn spacing(&self, pos: usize) -> usize {
        let mut i = pos;
        while matches!(self.chars.get(i), Some(' ') | Some('\n')) {
            i += 1;
        }
        i - pos
    }

    fn parse_delimiter_run(&mut self, ch: char) {
        let pos = self.pos;
        let count = scanners::run_length(&self.chars, pos, ch);
        let before = pos.checked_sub(1).map(|i| self.chars[i]);
        let after = self.chars.get(pos + count).copied();
        let before_ws = before.is_none_or(|c| c.is_whitespace());
        let after_ws = after.is_none_or(|c| c.is_whitespace());
        let before_punct = before.is_some_and(scanners::is_unicode_punctuation);
        let after_punct = after.is_some_and(scanners::is_unicode_punctuation);

        let left_flanking = !after_ws && (!after_punct || before_ws || before_punct);
        let right_flanking = !before_ws && (!before_punct || after_ws || after_punct);
        let (can_open, can_close) = if ch == '_' {
            (
                left_flanking && (!right_flanking || before_punct),
                right_flanking && (!left_flanking || after_punct),
            )
        } else {
            (left_flanking, right_flanking)
        };

        let text: String = std::iter::repeat_n(ch, count).collect();
        let node = self.push_text(text, pos, pos + count);
        if can_open || can_close {
            self.delims.push(Delim {
                scope: Scope::Emphasis,
                ch,
                count,
                node,
                position: pos,
                text_start: pos,
                can_open,
                can_close,
                active: true,
                image: false,
            });
        }
        self.pos = pos + count;
    }

    /// How many delimiter chars one opener/closer pairing consumes.
    /// With both runs shorter than 3 the smaller run wins outright; two
    /// long runs peel off 2 when the closer is even, 1 otherwise.
    fn use_count(&self, opener: usize, closer: usize, ch: char) -> usize {
        match ch {
            '~' => {
                if opener >= 2 && closer >= 2 {
                    2
                } else {
                    1
                }
            }
            '^' => 1,
            _ => {
                if opener >= 3 && closer >= 3 {
                    if closer % 2 == 0 { 2 } else { 1 }
                } else {
                    opener.min(closer)
                }
            }
        }
    }

    fn pairable(&self, opener: usize, closer: usize, ch: char) -> bool {
        if ch == '~' && !self.settings.sub_superscript {
            // strikethrough alone needs two tildes on both sides
            opener >= 2 && closer >= 2
        } else {
            true
        }
    }

    fn container_tag(&self, ch: char, use_count: usize) -> InlineTag {
        match (ch, use_count) {
            ('~', 2) => InlineTag::Strikethrough,
            ('~', _) => InlineTag::Subscript,
            ('^', _) => InlineTag::Superscript,
            (_, 2) => InlineTag::Strong,
            _ => InlineTag::Emphasis,
        }
    }

    /// Resolve emphasis-scope delimiters above `bottom` against each other.
    fn process_emphasis(&mut self, bottom: usize) -> Result<()> {
        let mut closer_idx = bottom;
        while closer_idx < self.delims.len() {
            let closer = &self.delims[closer_idx];
            if closer.scope != Scope::Emphasis || !closer.can_close {
                closer_idx += 1;
                continue;
            }
            let closer_ch = closer.ch;
            let closer_count = closer.count;

            let mut found = None;
            for i in (bottom..closer_idx).rev() {
                let d = &self.delims[i];
                if d.scope == Scope::Emphasis
                    && d.ch == closer_ch
                    && d.can_open
                    && self.pairable(d.count, closer_count, closer_ch)
                {
                    found = Some(i);
                    break;
                }
            }
            let Some(opener_idx) = found else {
                if !self.delims[closer_idx].can_open {
                    self.delims.remove(closer_idx);
                } else {
                    closer_idx += 1;
                }
                continue;
            };

            let opener_count = self.delims[opener_idx].count;
            let use_count = self.use_count(opener_count, closer_count, closer_ch);
            let tag = self.container_tag(closer_ch, use_count);
            let opener_node = self.delims[opener_idx].node;
            let opener_pos = self.delims[opener_idx].position;
            let closer_node = self.delims[closer_idx].node;
            let closer_pos = self.delims[closer_idx].position;
            let opener_spent = opener_count == use_count;
            let closer_spent = closer_count == use_count;

            // opener chars come off the run's end, closer chars off its
            // start, so nested pairs nest their spans correctly
            let container_span = if self.map.is_empty() {
                Span::default()
            } else {
                Span::new(
                    self.map[opener_pos + opener_count - use_count].start,
                    self.map[closer_pos + use_count - 1].end,
                )
            };

            // detach the sibling run between opener and closer
            let first_between = self
                .doc
                .inline(opener_node)
                .next
                .filter(|&n| n != closer_node);
            if let Some(mut n) = first_between {
                while let Some(next) = self.doc.inline(n).next {
                    if next == closer_node {
                        self.doc.inline_mut(n).next = None;
                        break;
                    }
                    n = next;
                }
            }

            if opener_spent {
                let node = self.doc.inline_mut(opener_node);
                node.tag = tag;
                node.first_child = first_between;
                node.next = Some(closer_node);
                node.span = container_span;
            } else if closer_spent {
                let node = self.doc.inline_mut(closer_node);
                node.tag = tag;
                node.first_child = first_between;
                node.span = container_span;
                self.doc.inline_mut(opener_node).next = Some(closer_node);
            } else {
                let mut container = Inline::new(tag);
                container.first_child = first_between;
                container.next = Some(closer_node);
                container.span = container_span;
                let id = self.doc.push_inline(container);
                self.doc.inline_mut(opener_node).next = Some(id);
            }

            // shrink the surviving runs
            if !opener_spent {
                let remaining = opener_count - use_count;
                self.delims[opener_idx].count = remaining;
                let span = self.span_of(opener_pos, opener_pos + remaining);
                let node = self.doc.inline_mut(opener_node);
                node.tag = InlineTag::Text(std::iter::repeat_n(closer_ch, remaining).collect());
                node.span = span;
            }
            if closer_spent {
                if opener_spent {
                    // both runs consumed; the closer stays as an empty
                    // placeholder in the sibling chain
                    let node = self.doc.inline_mut(closer_node);
                    node.tag = InlineTag::Text(String::new());
                    node.span.start = node.span.end;
                }
            } else {
                let remaining = closer_count - use_count;
                self.delims[closer_idx].count = remaining;
                self.delims[closer_idx].position = closer_pos + use_count;
                let span = self.span_of(closer_pos + use_count, closer_pos + use_count + remaining);
                let node = self.doc.inline_mut(closer_node);
                node.tag = InlineTag::Text(std::iter::repeat_n(closer_ch, remaining).collect());
                node.span = span;
            }

            // delimiters between the pair can never match anything now
            self.delims.drain(opener_idx + 1..closer_idx);
            closer_idx = opener_idx + 1;
            if opener_spent {
                self.delims.remove(opener_idx);
                closer_idx = opener_idx;
            }
            if closer_spent {
                self.delims.remove(closer_idx);
            }
        }
        Ok(())
    }
}
