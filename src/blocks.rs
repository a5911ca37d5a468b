/// Phase 1: block structure
///
/// The parser keeps a stack of open blocks (root to tip) and feeds it one
/// logical line at a time. Each line is consumed in three steps: match the
/// continuation conditions of the open blocks, try to start new blocks at
/// the deepest matched container, then hand the remaining text to the tip.
/// No recursion anywhere; the open stack is the parent chain in the arena.
use crate::ast::{
    Alignment, Block, BlockId, BlockTag, Document, FenceData, ListData, ListKind, Span,
};
use crate::entities;
use crate::error::{Error, Result};
use crate::line::{Line, LineReader};
use crate::refs;
use crate::scanners;
use crate::settings::Settings;

const CODE_INDENT: usize = 4;

/// Parse source text into a block tree. Leaf blocks keep their raw text in
/// `content`; inline parsing happens in a separate phase.
pub fn parse_blocks(source: &str, settings: &Settings) -> Result<Document> {
    let mut parser = BlockParser::new(settings);
    for line in LineReader::new(source, settings.track_positions) {
        parser.incorporate_line(line)?;
    }
    parser.finish(source.len() as u32)
}

enum Continue {
    Matched,
    NotMatched,
    /// The line was fully consumed by the continuation check (closing
    /// fence, front matter terminator).
    LineDone,
}

enum Start {
    None,
    Container,
    Leaf,
}

struct BlockParser<'s> {
    doc: Document,
    settings: &'s Settings,
    tip: BlockId,
    oldtip: BlockId,
    last_matched: BlockId,
    all_closed: bool,
    line: Line,
    offset: usize,
    next_nonspace: usize,
    indent: usize,
    blank: bool,
}

impl<'s> BlockParser<'s> {
    fn new(settings: &'s Settings) -> Self {
        BlockParser {
            doc: Document::new(settings.case_sensitive_refs),
            settings,
            tip: Document::ROOT,
            oldtip: Document::ROOT,
            last_matched: Document::ROOT,
            all_closed: true,
            line: Line {
                chars: Vec::new(),
                map: Vec::new(),
                number: 0,
            },
            offset: 0,
            next_nonspace: 0,
            indent: 0,
            blank: false,
        }
    }

    fn find_next_nonspace(&mut self) {
        let spaces = scanners::scan_spaces(&self.line.chars, self.offset);
        self.next_nonspace = self.offset + spaces;
        self.indent = spaces;
        self.blank = self.line.chars.get(self.next_nonspace) == Some(&'\n');
    }

    fn advance_offset(&mut self, count: usize) {
        self.offset = (self.offset + count).min(self.line.chars.len());
    }

    fn advance_next_nonspace(&mut self) {
        self.offset = self.next_nonspace;
    }

    /// Origin of the char at `idx`, when tracking; zero span otherwise.
    fn origin(&self, idx: usize) -> Span {
        self.line.origin(idx).unwrap_or_default()
    }

    /// End offset of the last non-blank char on the current line.
    fn line_end(&self) -> u32 {
        let mut i = self.line.chars.len();
        while i > 0 && matches!(self.line.chars[i - 1], '\n' | ' ') {
            i -= 1;
        }
        if i == 0 {
            self.origin(0).start
        } else {
            self.origin(i - 1).end
        }
    }

    fn incorporate_line(&mut self, line: Line) -> Result<()> {
        self.line = line;
        self.offset = 0;
        self.blank = false;
        self.oldtip = self.tip;

        // Step 1: descend the open chain, matching continuation conditions.
        let mut container = Document::ROOT;
        loop {
            let child = match self.doc.block(container).last_child {
                Some(c) if self.doc.block(c).open => c,
                _ => break,
            };
            match self.check_continue(child)? {
                Continue::Matched => container = child,
                Continue::NotMatched => break,
                Continue::LineDone => return Ok(()),
            }
        }
        self.last_matched = container;
        self.all_closed = container == self.oldtip;

        // Two blank lines in a row break out of any list.
        if self.blank && self.doc.block(container).last_line_blank {
            container = self.break_out_of_lists(container)?;
        }

        // Step 2: look for new block starts, descending into new containers.
        let mut matched_leaf = {
            let tag = &self.doc.block(container).tag;
            !matches!(tag, BlockTag::Paragraph) && tag.accepts_lines()
        };
        while !matched_leaf {
            self.find_next_nonspace();
            match self.try_start(&mut container)? {
                Start::None => {
                    self.advance_next_nonspace();
                    break;
                }
                Start::Container => {}
                Start::Leaf => matched_leaf = true,
            }
        }

        // Step 3: text on the line belongs to the tip.
        if !self.all_closed
            && !self.blank
            && matches!(self.doc.block(self.tip).tag, BlockTag::Paragraph)
        {
            // lazy continuation of a paragraph
            self.add_line(self.tip);
            return Ok(());
        }

        self.close_unmatched()?;
        let container = self.tip;
        let tag = self.doc.block(container).tag.clone();

        let last_line_blank = self.blank
            && !matches!(tag, BlockTag::BlockQuote | BlockTag::FencedCode(_))
            && !(matches!(tag, BlockTag::ListItem(_))
                && self.doc.block(container).first_child.is_none()
                && self.doc.block(container).start_line == self.line.number);
        let mut walk = Some(container);
        while let Some(id) = walk {
            self.doc.block_mut(id).last_line_blank = last_line_blank;
            walk = self.doc.block(id).parent;
        }

        if tag.accepts_lines() {
            self.add_line(container);
            if let BlockTag::HtmlBlock { kind } = tag
                && (1..=5).contains(&kind)
                && scanners::scan_html_block_end(kind, &self.line.chars, self.offset)
            {
                self.finalize(container)?;
            }
        } else if !self.blank && self.line.chars.get(self.offset).is_some_and(|&c| c != '\n') {
            let paragraph = self.add_child(BlockTag::Paragraph, self.next_nonspace)?;
            self.advance_next_nonspace();
            self.add_line(paragraph);
        }
        Ok(())
    }

    fn check_continue(&mut self, id: BlockId) -> Result<Continue> {
        let tag = self.doc.block(id).tag.clone();
        self.find_next_nonspace();
        let result = match tag {
            BlockTag::BlockQuote => {
                if self.indent < CODE_INDENT
                    && self.line.chars.get(self.next_nonspace) == Some(&'>')
                {
                    self.advance_next_nonspace();
                    self.advance_offset(1);
                    if self.line.chars.get(self.offset) == Some(&' ') {
                        self.advance_offset(1);
                    }
                    Continue::Matched
                } else {
                    Continue::NotMatched
                }
            }
            BlockTag::List(_) => Continue::Matched,
            BlockTag::ListItem(data) => {
                if self.blank {
                    if self.doc.block(id).first_child.is_none() {
                        // blank line directly after an empty item closes it
                        Continue::NotMatched
                    } else {
                        self.advance_next_nonspace();
                        Continue::Matched
                    }
                } else if self.indent >= data.marker_offset + data.padding {
                    self.advance_offset(data.marker_offset + data.padding);
                    Continue::Matched
                } else {
                    Continue::NotMatched
                }
            }
            BlockTag::Paragraph => {
                if self.blank {
                    Continue::NotMatched
                } else {
                    Continue::Matched
                }
            }
            BlockTag::IndentedCode => {
                if self.indent >= CODE_INDENT {
                    self.advance_offset(CODE_INDENT);
                    Continue::Matched
                } else if self.blank {
                    self.advance_next_nonspace();
                    Continue::Matched
                } else {
                    Continue::NotMatched
                }
            }
            BlockTag::FencedCode(data) => {
                if data.front_matter {
                    let text: String = self.line.chars[self.offset..]
                        .iter()
                        .take_while(|&&c| c != '\n')
                        .collect();
                    // YAML ends a document with either marker
                    if matches!(text.trim_end(), "---" | "...") {
                        self.doc.block_mut(id).span.end = self.line_end();
                        self.doc.block_mut(id).end_line = self.line.number;
                        self.finalize(id)?;
                        Continue::LineDone
                    } else {
                        Continue::Matched
                    }
                } else if self.indent < CODE_INDENT
                    && self.line.chars.get(self.next_nonspace) == Some(&data.fence_char)
                    && scanners::scan_close_code_fence(
                        &self.line.chars,
                        self.next_nonspace,
                        data.fence_char,
                        data.fence_length,
                    )
                {
                    self.doc.block_mut(id).span.end = self.line_end();
                    self.doc.block_mut(id).end_line = self.line.number;
                    self.finalize(id)?;
                    Continue::LineDone
                } else {
                    // strip up to the opening fence's indentation
                    let strip = data.fence_offset.min(self.indent);
                    self.advance_offset(strip);
                    Continue::Matched
                }
            }
            BlockTag::HtmlBlock { kind } => {
                if self.blank && (kind == 6 || kind == 7) {
                    Continue::NotMatched
                } else {
                    Continue::Matched
                }
            }
            // single-line leaves never continue
            _ => Continue::NotMatched,
        };
        Ok(result)
    }

    /// Close every open list from the tip down to the innermost list in
    /// `container`'s chain. Returns the new deepest matched container.
    fn break_out_of_lists(&mut self, container: BlockId) -> Result<BlockId> {
        let mut innermost_list = None;
        let mut walk = Some(container);
        while let Some(id) = walk {
            if matches!(self.doc.block(id).tag, BlockTag::List(_)) {
                innermost_list = Some(id);
            }
            walk = self.doc.block(id).parent;
        }
        let Some(list) = innermost_list else {
            return Ok(container);
        };
        while self.tip != list {
            let id = self.tip;
            self.finalize(id)?;
        }
        self.finalize(list)?;
        let parent = self
            .doc
            .block(list)
            .parent
            .ok_or_else(|| Error::invariant("list closed at document root"))?;
        // everything at or below the list is closed now
        self.oldtip = parent;
        self.last_matched = parent;
        self.all_closed = true;
        Ok(parent)
    }

    fn try_start(&mut self, container: &mut BlockId) -> Result<Start> {
        let chars_len = self.line.chars.len();
        let indented = self.indent >= CODE_INDENT;

        // YAML front matter, only as the very first line of the document
        if self.settings.front_matter
            && self.line.number == 1
            && self.tip == Document::ROOT
            && self.offset == 0
        {
            let text: String = self.line.chars.iter().take_while(|&&c| c != '\n').collect();
            if text == "---" {
                let fence = BlockTag::FencedCode(FenceData {
                    fence_char: '-',
                    fence_length: 3,
                    fence_offset: 0,
                    info: String::new(),
                    front_matter: true,
                });
                *container = self.add_child(fence, 0)?;
                self.advance_offset(chars_len);
                return Ok(Start::Leaf);
            }
        }

        if !indented && self.line.chars.get(self.next_nonspace) == Some(&'>') {
            self.advance_next_nonspace();
            self.advance_offset(1);
            if self.line.chars.get(self.offset) == Some(&' ') {
                self.advance_offset(1);
            }
            self.close_unmatched()?;
            *container = self.add_child(BlockTag::BlockQuote, self.next_nonspace)?;
            return Ok(Start::Container);
        }

        if !indented
            && let Some((level, consumed)) =
                scanners::scan_atx_heading_start(&self.line.chars, self.next_nonspace)
        {
            self.advance_next_nonspace();
            self.advance_offset(consumed);
            self.close_unmatched()?;
            *container = self.add_child(BlockTag::AtxHeading { level }, self.next_nonspace)?;
            return Ok(Start::Leaf);
        }

        if !indented
            && let Some((fence_char, fence_length)) =
                scanners::scan_open_code_fence(&self.line.chars, self.next_nonspace)
        {
            let fence = BlockTag::FencedCode(FenceData {
                fence_char,
                fence_length,
                fence_offset: self.indent,
                info: String::new(),
                front_matter: false,
            });
            self.close_unmatched()?;
            *container = self.add_child(fence, self.next_nonspace)?;
            self.advance_next_nonspace();
            self.advance_offset(fence_length);
            return Ok(Start::Leaf);
        }

        if !indented
            && let Some(kind) = scanners::scan_html_block_start(
                &self.line.chars,
                self.next_nonspace,
                matches!(self.doc.block(*container).tag, BlockTag::Paragraph),
            )
        {
            self.close_unmatched()?;
            *container = self.add_child(BlockTag::HtmlBlock { kind }, self.next_nonspace)?;
            return Ok(Start::Leaf);
        }

        if !indented
            && matches!(self.doc.block(*container).tag, BlockTag::Paragraph)
            && let Some(level) = scanners::scan_setext_underline(&self.line.chars, self.next_nonspace)
        {
            self.close_unmatched()?;
            self.strip_references(*container);
            if !self.doc.block(*container).content.is_empty() {
                let end = self.line_end();
                let block = self.doc.block_mut(*container);
                block.tag = BlockTag::SetextHeading { level };
                block.span.end = end;
                block.end_line = self.line.number;
                self.advance_offset(chars_len);
                return Ok(Start::Leaf);
            }
            // the paragraph held only reference definitions; fall through
            // so the underline can match as some other block
        }

        if !indented
            && scanners::scan_thematic_break(&self.line.chars, self.next_nonspace).is_some()
        {
            self.close_unmatched()?;
            let id = self.add_child(BlockTag::ThematicBreak, self.next_nonspace)?;
            let end = self.line_end();
            self.doc.block_mut(id).span.end = end;
            *container = id;
            self.advance_offset(chars_len);
            return Ok(Start::Leaf);
        }

        if (!indented || matches!(self.doc.block(*container).tag, BlockTag::List(_)))
            && let Some((data, consumed)) = self.parse_list_marker(*container)
        {
            self.close_unmatched()?;
            self.advance_next_nonspace();
            self.advance_offset(consumed);

            let needs_list = match &self.doc.block(self.tip).tag {
                BlockTag::List(existing) => !existing.kind.matches(&data.kind),
                _ => true,
            };
            if needs_list {
                self.add_child(BlockTag::List(data.clone()), self.next_nonspace)?;
            }
            *container = self.add_child(BlockTag::ListItem(data), self.next_nonspace)?;
            return Ok(Start::Container);
        }

        if indented
            && !self.blank
            && !matches!(self.doc.block(self.tip).tag, BlockTag::Paragraph)
        {
            self.advance_offset(CODE_INDENT);
            self.close_unmatched()?;
            *container = self.add_child(BlockTag::IndentedCode, self.offset)?;
            return Ok(Start::Leaf);
        }

        Ok(Start::None)
    }

    /// List marker at the next nonspace char. Markers that would interrupt a
    /// paragraph must have content and (when ordered) start at 1.
    fn parse_list_marker(&self, container: BlockId) -> Option<(ListData, usize)> {
        let chars = &self.line.chars;
        let pos = self.next_nonspace;
        let interrupts_paragraph =
            matches!(self.doc.block(container).tag, BlockTag::Paragraph);

        let (kind, marker_len) = match chars.get(pos)? {
            &c @ ('-' | '+' | '*') => (ListKind::Bullet(c), 1),
            c if c.is_ascii_digit() => {
                let digits = chars[pos..]
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .count();
                if digits > 9 {
                    return None;
                }
                let start: u32 = chars[pos..pos + digits]
                    .iter()
                    .collect::<String>()
                    .parse()
                    .ok()?;
                let delimiter = match chars.get(pos + digits)? {
                    &d @ ('.' | ')') => d,
                    _ => return None,
                };
                (ListKind::Ordered { start, delimiter }, digits + 1)
            }
            _ => return None,
        };

        // marker must be followed by spacing or end of line
        match chars.get(pos + marker_len) {
            Some(' ') | Some('\n') => {}
            _ => return None,
        }

        let spaces_after = scanners::scan_spaces(chars, pos + marker_len);
        let rest_blank = chars.get(pos + marker_len + spaces_after) == Some(&'\n');

        if interrupts_paragraph {
            if rest_blank {
                return None;
            }
            if let ListKind::Ordered { start, .. } = kind
                && start != 1
            {
                return None;
            }
        }

        // more than 4 spaces after the marker reads as one space plus
        // indented content
        let padding = if rest_blank || spaces_after > 4 || spaces_after == 0 {
            marker_len + 1
        } else {
            marker_len + spaces_after
        };
        let consumed = if rest_blank {
            marker_len
        } else {
            padding
        };
        Some((
            ListData {
                kind,
                tight: true,
                marker_offset: self.indent,
                padding,
            },
            consumed,
        ))
    }

    /// Append a new block under the tip, closing blocks that cannot contain
    /// it first. `start_idx` is the char index the block starts at.
    fn add_child(&mut self, tag: BlockTag, start_idx: usize) -> Result<BlockId> {
        while !self.can_contain(self.tip, &tag) {
            let id = self.tip;
            self.finalize(id)?;
        }
        let mut block = Block::new(tag, self.line.number);
        if self.settings.track_positions {
            let at = self.origin(start_idx).start;
            block.span = Span::new(at, at);
        }
        let id = self.doc.append_block(self.tip, block);
        self.tip = id;
        Ok(id)
    }

    fn can_contain(&self, id: BlockId, child: &BlockTag) -> bool {
        match &self.doc.block(id).tag {
            BlockTag::List(_) => matches!(child, BlockTag::ListItem(_)),
            tag if tag.is_container() => !matches!(child, BlockTag::ListItem(_)),
            _ => false,
        }
    }

    fn add_line(&mut self, id: BlockId) {
        let track = self.settings.track_positions;
        let offset = self.offset;
        let number = self.line.number;
        let block = self.doc.block_mut(id);
        block.content.extend_from_slice(&self.line.chars[offset..]);
        if track {
            block.content_map.extend_from_slice(&self.line.map[offset..]);
        }
        block.end_line = number;
    }

    fn close_unmatched(&mut self) -> Result<()> {
        while self.oldtip != self.last_matched {
            let parent = self
                .doc
                .block(self.oldtip)
                .parent
                .ok_or_else(|| Error::invariant("open block chain detached from root"))?;
            let id = self.oldtip;
            self.finalize(id)?;
            self.oldtip = parent;
        }
        self.all_closed = true;
        Ok(())
    }

    /// Close a block, performing its tag-specific finalization. Children
    /// are always closed before their parent.
    fn finalize(&mut self, id: BlockId) -> Result<()> {
        if !self.doc.block(id).open {
            return Err(Error::invariant("block finalized twice"));
        }
        if let Some(parent) = self.doc.block(id).parent {
            self.tip = parent;
        } else if id != Document::ROOT {
            return Err(Error::invariant("non-root block without parent"));
        }
        self.doc.block_mut(id).open = false;

        match self.doc.block(id).tag.clone() {
            BlockTag::Paragraph => {
                self.strip_references(id);
                let block = self.doc.block_mut(id);
                if block.content.iter().all(|&c| matches!(c, ' ' | '\n')) {
                    block.tag = BlockTag::ReferenceDefinition;
                    block.content.clear();
                    block.content_map.clear();
                } else if self.settings.pipe_tables {
                    self.try_make_table(id);
                }
            }
            BlockTag::AtxHeading { .. } => self.finalize_atx(id),
            BlockTag::IndentedCode => {
                // drop trailing blank lines
                let block = self.doc.block_mut(id);
                let mut keep = 0;
                let mut line_has_text = false;
                for (i, &ch) in block.content.iter().enumerate() {
                    match ch {
                        '\n' => {
                            if line_has_text {
                                keep = i + 1;
                            }
                            line_has_text = false;
                        }
                        ' ' => {}
                        _ => line_has_text = true,
                    }
                }
                if line_has_text {
                    keep = block.content.len();
                }
                block.content.truncate(keep);
                block.content_map.truncate(keep);
                block.literal = block.content_string();
            }
            BlockTag::FencedCode(mut data) => {
                let block = self.doc.block_mut(id);
                if data.front_matter {
                    block.literal = block.content_string();
                } else {
                    // first line is the info string
                    let content = block.content_string();
                    let (info_line, body) = match content.find('\n') {
                        Some(nl) => (&content[..nl], &content[nl + 1..]),
                        None => (content.as_str(), ""),
                    };
                    data.info = entities::decode_entities(&unescape(info_line.trim()));
                    block.literal = body.to_string();
                    block.tag = BlockTag::FencedCode(data);
                }
            }
            BlockTag::HtmlBlock { .. } => {
                let block = self.doc.block_mut(id);
                block.literal = block.content_string();
                let trimmed = block.literal.trim_end_matches(['\n', ' ']).len();
                block.literal.truncate(trimmed);
            }
            BlockTag::List(mut data) => {
                data.tight = self.list_is_tight(id);
                self.doc.block_mut(id).tag = BlockTag::List(data);
            }
            _ => {}
        }

        // freeze position data
        let end_line = self
            .doc
            .block(id)
            .last_child
            .map(|c| self.doc.block(c).end_line)
            .unwrap_or(0)
            .max(self.doc.block(id).end_line);
        self.doc.block_mut(id).end_line = end_line;
        if self.settings.track_positions && self.doc.block(id).span.is_empty() {
            let end = self.content_end(id).or_else(|| {
                self.doc
                    .block(id)
                    .last_child
                    .map(|c| self.doc.block(c).span.end)
            });
            if let Some(end) = end {
                self.doc.block_mut(id).span.end = end;
            }
            // a block that stays empty keeps its zero-length span
        }
        Ok(())
    }

    /// Origin end of the last non-whitespace content char.
    fn content_end(&self, id: BlockId) -> Option<u32> {
        let block = self.doc.block(id);
        let last = block
            .content
            .iter()
            .rposition(|&c| !matches!(c, ' ' | '\n'))?;
        block.content_map.get(last).map(|span| span.end)
    }

    /// Strip the trailing `#` run (and surrounding spaces) from a finalized
    /// ATX heading, keeping the position map aligned.
    fn finalize_atx(&mut self, id: BlockId) {
        if self.settings.track_positions && self.doc.block(id).span.is_empty() {
            if let Some(end) = self.content_end(id) {
                self.doc.block_mut(id).span.end = end;
            }
        }
        let block = self.doc.block_mut(id);
        let mut end = block.content.len();
        while end > 0 && matches!(block.content[end - 1], ' ' | '\n') {
            end -= 1;
        }
        let hashes_end = end;
        while end > 0 && block.content[end - 1] == '#' {
            end -= 1;
        }
        if end < hashes_end && (end == 0 || block.content[end - 1] == ' ') {
            while end > 0 && block.content[end - 1] == ' ' {
                end -= 1;
            }
        } else {
            end = hashes_end;
        }
        block.content.truncate(end);
        block.content_map.truncate(end);
    }

    /// Move leading link reference definitions out of a paragraph's content
    /// and into the document's reference map.
    fn strip_references(&mut self, id: BlockId) {
        let block = &mut self.doc.blocks[id];
        let mut pos = 0;
        while block.content.get(pos) == Some(&'[') {
            match refs::parse_reference(&block.content, pos) {
                Some((label, url, title, consumed)) => {
                    self.doc.refs.insert(&label, url, title);
                    pos += consumed;
                }
                None => break,
            }
        }
        if pos > 0 {
            block.content.drain(..pos);
            if !block.content_map.is_empty() {
                block.content_map.drain(..pos);
            }
            // the definition lines no longer contribute to the span
            if self.settings.track_positions {
                let start = block
                    .content_map
                    .first()
                    .map(|span| span.start)
                    .unwrap_or(block.span.start);
                block.span.start = start;
            }
        }
    }

    /// A list is loose when any item ends with a blank line and more
    /// content follows it.
    fn list_is_tight(&self, list: BlockId) -> bool {
        let mut item = self.doc.block(list).first_child;
        while let Some(item_id) = item {
            let item_next = self.doc.block(item_id).next;
            if self.ends_with_blank_line(item_id) && item_next.is_some() {
                return false;
            }
            let mut sub = self.doc.block(item_id).first_child;
            while let Some(sub_id) = sub {
                let sub_next = self.doc.block(sub_id).next;
                if self.ends_with_blank_line(sub_id)
                    && (item_next.is_some() || sub_next.is_some())
                {
                    return false;
                }
                sub = sub_next;
            }
            item = item_next;
        }
        true
    }

    fn ends_with_blank_line(&self, mut id: BlockId) -> bool {
        loop {
            let block = self.doc.block(id);
            if block.last_line_blank {
                return true;
            }
            match &block.tag {
                BlockTag::List(_) | BlockTag::ListItem(_) => match block.last_child {
                    Some(child) => id = child,
                    None => return false,
                },
                _ => return false,
            }
        }
    }

    /// GitHub-style pipe table: a paragraph whose second line is a valid
    /// delimiter row with the same column count as the first. The whole
    /// paragraph converts in place; rows and cells become closed child
    /// blocks carrying the cell text for inline parsing.
    fn try_make_table(&mut self, id: BlockId) {
        let (content, map) = {
            let block = self.doc.block(id);
            (block.content.clone(), block.content_map.clone())
        };
        let lines = split_lines(&content);
        if lines.len() < 2 {
            return;
        }
        let header_cells = split_table_row(&content, lines[0]);
        if header_cells.is_empty() || !content[lines[0].0..lines[0].1].contains(&'|') {
            return;
        }
        let delim_cells = split_table_row(&content, lines[1]);
        if delim_cells.len() != header_cells.len() {
            return;
        }
        let mut alignments = Vec::with_capacity(delim_cells.len());
        for &(start, end) in &delim_cells {
            match parse_alignment(&content[start..end]) {
                Some(alignment) => alignments.push(alignment),
                None => return,
            }
        }
        let columns = alignments.len();

        let block = self.doc.block_mut(id);
        block.tag = BlockTag::Table { alignments };
        block.content.clear();
        block.content_map.clear();

        for (row_idx, &(line_start, line_end)) in lines.iter().enumerate() {
            if row_idx == 1 {
                continue;
            }
            let header = row_idx == 0;
            let cells = split_table_row(&content, (line_start, line_end));
            let row_span = self.slice_span(&map, line_start, line_end);
            let row_id = self.doc.append_block(
                id,
                closed_block(BlockTag::TableRow { header }, self.line.number, row_span),
            );
            for col in 0..columns {
                let mut cell =
                    closed_block(BlockTag::TableCell, self.line.number, Span::default());
                if let Some(&(start, end)) = cells.get(col) {
                    cell.content = content[start..end].to_vec();
                    if !map.is_empty() {
                        cell.content_map = map[start..end].to_vec();
                    }
                    cell.span = self.slice_span(&map, start, end);
                }
                self.doc.append_block(row_id, cell);
            }
        }
    }

    fn slice_span(&self, map: &[Span], start: usize, end: usize) -> Span {
        if !self.settings.track_positions || start >= end || map.len() < end {
            return Span::default();
        }
        Span::new(map[start].start, map[end - 1].end)
    }

    fn finish(mut self, source_len: u32) -> Result<Document> {
        while self.tip != Document::ROOT {
            let id = self.tip;
            self.finalize(id)?;
        }
        self.finalize(Document::ROOT)?;
        if self.settings.track_positions {
            let root = self.doc.block_mut(Document::ROOT);
            root.span = Span::new(0, source_len);
        }
        Ok(self.doc)
    }
}

fn closed_block(tag: BlockTag, line: usize, span: Span) -> Block {
    let mut block = Block::new(tag, line);
    block.open = false;
    block.span = span;
    block
}

/// Remove backslash escapes before ASCII punctuation.
fn unescape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\'
            && i + 1 < chars.len()
            && scanners::is_ascii_punctuation(chars[i + 1])
        {
            result.push(chars[i + 1]);
            i += 2;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }
    result
}

/// (start, end) char ranges of each line, newline excluded.
fn split_lines(content: &[char]) -> Vec<(usize, usize)> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &ch) in content.iter().enumerate() {
        if ch == '\n' {
            lines.push((start, i));
            start = i + 1;
        }
    }
    if start < content.len() {
        lines.push((start, content.len()));
    }
    lines
}

/// Split one table row into trimmed cell ranges. Leading and trailing pipes
/// are dropped; a pipe preceded by an odd number of backslashes does not
/// split.
fn split_table_row(content: &[char], (start, end): (usize, usize)) -> Vec<(usize, usize)> {
    let mut i = start + scanners::scan_spaces(content, start).min(end - start);
    let mut stop = end;
    while stop > i && content[stop - 1] == ' ' {
        stop -= 1;
    }
    if i < stop && content[i] == '|' {
        i += 1;
    }
    if stop > i && content[stop - 1] == '|' && !pipe_is_escaped(content, stop - 1) {
        stop -= 1;
    }
    let mut cells = Vec::new();
    let mut cell_start = i;
    let mut j = i;
    while j <= stop {
        if j == stop || (content[j] == '|' && !pipe_is_escaped(content, j)) {
            let mut a = cell_start;
            let mut b = j;
            while a < b && content[a] == ' ' {
                a += 1;
            }
            while b > a && content[b - 1] == ' ' {
                b -= 1;
            }
            cells.push((a, b));
            cell_start = j + 1;
        }
        j += 1;
    }
    cells
}

fn pipe_is_escaped(content: &[char], pos: usize) -> bool {
    let mut backslashes = 0;
    let mut i = pos;
    while i > 0 && content[i - 1] == '\\' {
        backslashes += 1;
        i -= 1;
    }
    backslashes % 2 == 1
}

/// Delimiter cell: optional `:`, one or more `-`, optional `:`.
fn parse_alignment(cell: &[char]) -> Option<Alignment> {
    if cell.is_empty() {
        return None;
    }
    let left = cell[0] == ':';
    let right = cell[cell.len() - 1] == ':' && (cell.len() > 1 || !left);
    let dash_start = if left { 1 } else { 0 };
    let dash_end = if right { cell.len() - 1 } else { cell.len() };
    if dash_start >= dash_end || !cell[dash_start..dash_end].iter().all(|&c| c == '-') {
        return None;
    }
    Some(match (left, right) {
        (false, false) => Alignment::None,
        (true, false) => Alignment::Left,
        (false, true) => Alignment::Right,
        (true, true) => Alignment::Center,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Document {
        parse_blocks(source, &Settings::new()).unwrap()
    }

    fn parse_with(source: &str, settings: &Settings) -> Document {
        parse_blocks(source, settings).unwrap()
    }

    fn child_tags(doc: &Document, id: BlockId) -> Vec<&'static str> {
        doc.block_children(id)
            .map(|c| doc.block(c).tag.type_name())
            .collect()
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let doc = parse("one\ntwo\n\nthree\n");
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["paragraph", "paragraph"]);
        let first = doc.block_children(Document::ROOT).next().unwrap();
        assert_eq!(doc.block(first).content_string(), "one\ntwo\n");
    }

    #[test]
    fn atx_heading_strips_closing_hashes() {
        let doc = parse("## foo ###\n# bar #baz\n");
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).tag, BlockTag::AtxHeading { level: 2 });
        assert_eq!(doc.block(ids[0]).content_string(), "foo");
        // a closing run must be preceded by a space
        assert_eq!(doc.block(ids[1]).content_string(), "bar #baz");
    }

    #[test]
    fn setext_heading_replaces_paragraph() {
        let doc = parse("title\n=====\nbody\n");
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).tag, BlockTag::SetextHeading { level: 1 });
        assert_eq!(doc.block(ids[0]).content_string(), "title\n");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);
    }

    #[test]
    fn thematic_break_beats_setext_for_reference_only_paragraph() {
        let doc = parse("[foo]: /url\n---\n");
        assert_eq!(
            child_tags(&doc, Document::ROOT),
            vec!["reference_def", "thematic_break"]
        );
        assert_eq!(doc.refs.lookup("foo").unwrap().url, "/url");
    }

    #[test]
    fn indented_code_drops_trailing_blank_lines() {
        let doc = parse("    code\n\n    more\n\n\nafter\n");
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).tag, BlockTag::IndentedCode);
        assert_eq!(doc.block(ids[0]).literal, "code\n\nmore\n");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);
    }

    #[test]
    fn indented_code_cannot_interrupt_paragraph() {
        let doc = parse("para\n    still para\n");
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["paragraph"]);
    }

    #[test]
    fn fenced_code_takes_info_string() {
        let doc = parse("```rust ignore\nfn x() {}\n```\n");
        let id = doc.block_children(Document::ROOT).next().unwrap();
        match &doc.block(id).tag {
            BlockTag::FencedCode(data) => {
                assert_eq!(data.info, "rust ignore");
                assert_eq!(data.fence_length, 3);
            }
            other => panic!("expected fenced code, got {other:?}"),
        }
        assert_eq!(doc.block(id).literal, "fn x() {}\n");
    }

    #[test]
    fn unclosed_fence_runs_to_end_of_input() {
        let doc = parse("```\ncode\n");
        let id = doc.block_children(Document::ROOT).next().unwrap();
        assert_eq!(doc.block(id).literal, "code\n");
        assert!(!doc.block(id).open);
    }

    #[test]
    fn block_quote_with_lazy_continuation() {
        let doc = parse("> quoted\nlazy\n\nafter\n");
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).tag, BlockTag::BlockQuote);
        let inner = doc.block_children(ids[0]).next().unwrap();
        assert_eq!(doc.block(inner).content_string(), "quoted\nlazy\n");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);
    }

    #[test]
    fn tight_and_loose_lists() {
        let tight = parse("- a\n- b\n");
        let list = tight.block_children(Document::ROOT).next().unwrap();
        match &tight.block(list).tag {
            BlockTag::List(data) => assert!(data.tight),
            other => panic!("expected list, got {other:?}"),
        }

        let loose = parse("- a\n\n- b\n");
        let list = loose.block_children(Document::ROOT).next().unwrap();
        match &loose.block(list).tag {
            BlockTag::List(data) => assert!(!data.tight),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_bullet_starts_new_list() {
        let doc = parse("- a\n+ b\n");
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["list", "list"]);
    }

    #[test]
    fn ordered_list_keeps_start_number() {
        let doc = parse("3. c\n4. d\n");
        let list = doc.block_children(Document::ROOT).next().unwrap();
        match &doc.block(list).tag {
            BlockTag::List(data) => {
                assert_eq!(
                    data.kind,
                    ListKind::Ordered {
                        start: 3,
                        delimiter: '.'
                    }
                );
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn ordered_list_interrupting_paragraph_must_start_at_one() {
        let doc = parse("para\n2. item\n");
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["paragraph"]);
        let doc = parse("para\n1. item\n");
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["paragraph", "list"]);
    }

    #[test]
    fn two_blank_lines_break_out_of_a_list() {
        let doc = parse("- a\n\n\n- b\n");
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["list", "list"]);
    }

    #[test]
    fn empty_list_item_then_blank_closes_item() {
        let doc = parse("- a\n-\n\n  not in list\n");
        let tags = child_tags(&doc, Document::ROOT);
        assert_eq!(tags[0], "list");
        assert_eq!(tags[1], "paragraph");
    }

    #[test]
    fn html_block_type_six_ends_on_blank_line() {
        let doc = parse("<div>\nline\n\npara\n");
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).tag, BlockTag::HtmlBlock { kind: 6 });
        assert_eq!(doc.block(ids[0]).literal, "<div>\nline");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);
    }

    #[test]
    fn html_comment_block_ends_on_close_marker() {
        let doc = parse("<!-- a\nb -->\nafter\n");
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).tag, BlockTag::HtmlBlock { kind: 2 });
        assert_eq!(doc.block(ids[0]).literal, "<!-- a\nb -->");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);
    }

    #[test]
    fn reference_definitions_leave_no_paragraph() {
        let doc = parse("[a]: /one\n[b]: /two \"title\"\n\ntext [a]\n");
        assert_eq!(
            child_tags(&doc, Document::ROOT),
            vec!["reference_def", "paragraph"]
        );
        assert_eq!(doc.refs.lookup("a").unwrap().url, "/one");
        assert_eq!(
            doc.refs.lookup("b").unwrap().title.as_deref(),
            Some("title")
        );
    }

    #[test]
    fn front_matter_only_at_document_start() {
        let settings = Settings::builder().front_matter(true).build();
        let doc = parse_with("---\ntitle: x\n---\nbody\n", &settings);
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        match &doc.block(ids[0]).tag {
            BlockTag::FencedCode(data) => assert!(data.front_matter),
            other => panic!("expected front matter, got {other:?}"),
        }
        assert_eq!(doc.block(ids[0]).literal, "title: x\n");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);

        // without the flag the same input is a thematic break + setext
        let doc = parse("---\ntitle: x\n---\nbody\n");
        let first = doc.block_children(Document::ROOT).next().unwrap();
        assert_eq!(doc.block(first).tag, BlockTag::ThematicBreak);
    }

    #[test]
    fn front_matter_closes_on_dots() {
        let settings = Settings::builder().front_matter(true).build();
        let doc = parse_with("---\ntitle: x\n...\nbody\n", &settings);
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).literal, "title: x\n");
        assert_eq!(doc.block(ids[1]).tag, BlockTag::Paragraph);
    }

    #[test]
    fn pipe_table_conversion() {
        let settings = Settings::builder().pipe_tables(true).build();
        let doc = parse_with(
            "| a | b |\n|:--|--:|\n| 1 | 2 |\n| 3 |\n",
            &settings,
        );
        let table = doc.block_children(Document::ROOT).next().unwrap();
        match &doc.block(table).tag {
            BlockTag::Table { alignments } => {
                assert_eq!(alignments, &[Alignment::Left, Alignment::Right]);
            }
            other => panic!("expected table, got {other:?}"),
        }
        let rows: Vec<_> = doc.block_children(table).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(doc.block(rows[0]).tag, BlockTag::TableRow { header: true });
        let cells: Vec<_> = doc.block_children(rows[0]).collect();
        assert_eq!(doc.block(cells[0]).content_string(), "a");
        // short row is padded to the column count
        let last: Vec<_> = doc.block_children(rows[2]).collect();
        assert_eq!(last.len(), 2);
        assert_eq!(doc.block(last[1]).content_string(), "");
    }

    #[test]
    fn invalid_delimiter_row_stays_a_paragraph() {
        let settings = Settings::builder().pipe_tables(true).build();
        let doc = parse_with("| a | b |\n| x | - |\n", &settings);
        assert_eq!(child_tags(&doc, Document::ROOT), vec!["paragraph"]);
    }

    #[test]
    fn spans_track_original_bytes() {
        let settings = Settings::builder().track_positions(true).build();
        let doc = parse_with("# hi\n\npara\n", &settings);
        let ids: Vec<_> = doc.block_children(Document::ROOT).collect();
        assert_eq!(doc.block(ids[0]).span, Span::new(0, 4));
        assert_eq!(doc.block(ids[1]).span, Span::new(6, 10));
        assert_eq!(doc.block(Document::ROOT).span, Span::new(0, 11));
    }

    #[test]
    fn empty_list_item_has_zero_length_span() {
        let settings = Settings::builder().track_positions(true).build();
        let doc = parse_with("-\n", &settings);
        let list = doc.block_children(Document::ROOT).next().unwrap();
        let item = doc.block_children(list).next().unwrap();
        assert!(doc.block(item).span.is_empty());
    }

    #[test]
    fn crlf_and_nul_are_normalized() {
        let doc = parse("a\0b\r\nnext\n");
        let id = doc.block_children(Document::ROOT).next().unwrap();
        assert_eq!(doc.block(id).content_string(), "a\u{FFFD}b\nnext\n");
    }
}
