/// Output selection and the non-HTML renderers
///
/// HTML is the primary output; the debug tree shows the parsed structure
/// for troubleshooting, and the markdown renderer re-emits a normalized
/// document from the tree.
use crate::ast::{BlockId, BlockTag, Document, InlineTag, ListKind};
use crate::error::Result;
use crate::html::{self, OverrideFn};
use crate::settings::Settings;
use crate::visit::{BlockWalker, InlineWalker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Html,
    DebugTree,
    Markdown,
}

pub fn render(doc: &Document, settings: &Settings, mode: OutputMode) -> Result<String> {
    match mode {
        OutputMode::Html => html::render_html(doc, settings),
        OutputMode::DebugTree => Ok(debug_tree(doc)),
        OutputMode::Markdown => Ok(MarkdownRenderer::new().render(doc)),
    }
}

/// HTML output with a caller-supplied override hook.
pub fn render_with<'o>(
    doc: &Document,
    settings: &Settings,
    hook: &'o mut OverrideFn<'o>,
) -> Result<String> {
    html::render_html_with(doc, settings, hook)
}

fn block_label(doc: &Document, id: BlockId) -> String {
    let block = doc.block(id);
    let mut label = block.tag.type_name().to_string();
    match &block.tag {
        BlockTag::AtxHeading { level } | BlockTag::SetextHeading { level } => {
            label.push_str(&format!(" level={level}"));
        }
        BlockTag::List(data) => {
            match data.kind {
                ListKind::Bullet(ch) => label.push_str(&format!(" bullet={ch}")),
                ListKind::Ordered { start, delimiter } => {
                    label.push_str(&format!(" start={start} delim={delimiter}"));
                }
            }
            label.push_str(if data.tight { " tight" } else { " loose" });
        }
        BlockTag::FencedCode(data) => {
            if data.front_matter {
                label.push_str(" front_matter");
            } else if !data.info.is_empty() {
                label.push_str(&format!(" info={:?}", data.info));
            }
        }
        BlockTag::HtmlBlock { kind } => label.push_str(&format!(" kind={kind}")),
        BlockTag::Table { alignments } => {
            label.push_str(&format!(" columns={}", alignments.len()));
        }
        _ => {}
    }
    if !block.span.is_empty() {
        label.push_str(&format!(" [{}..{}]", block.span.start, block.span.end));
    }
    label
}

/// Indented structure dump of the whole document, inline trees included.
pub fn debug_tree(doc: &Document) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut walker = BlockWalker::new(doc, Document::ROOT);
    while let Some(visit) = walker.next() {
        if visit.opening {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&block_label(doc, visit.id));
            out.push('\n');
            debug_inlines(doc, visit.id, depth + 1, &mut out);
            if !visit.closing {
                depth += 1;
            }
        } else {
            depth = depth.saturating_sub(1);
        }
    }
    out
}

fn debug_inlines(doc: &Document, block: BlockId, base: usize, out: &mut String) {
    let mut depth = base;
    let mut walker = InlineWalker::new(doc, doc.block(block).first_inline);
    while let Some(visit) = walker.next() {
        if visit.opening {
            let inline = doc.inline(visit.id);
            if matches!(&inline.tag, InlineTag::Text(t) if t.is_empty()) {
                continue;
            }
            out.push_str(&"  ".repeat(depth));
            out.push_str(inline.tag.type_name());
            match &inline.tag {
                InlineTag::Text(t) | InlineTag::Code(t) | InlineTag::RawHtml(t) => {
                    out.push_str(&format!(" {t:?}"));
                }
                InlineTag::Link { destination, .. } | InlineTag::Image { destination, .. } => {
                    out.push_str(&format!(" dest={destination:?}"));
                }
                _ => {}
            }
            if !inline.span.is_empty() {
                out.push_str(&format!(" [{}..{}]", inline.span.start, inline.span.end));
            }
            out.push('\n');
            if !visit.closing {
                depth += 1;
            }
        } else {
            depth = depth.saturating_sub(1);
        }
    }
}

/// Re-emits normalized markdown: ATX headings, fenced code, `-` bullets
/// kept as parsed, reference links resolved to inline form.
struct MarkdownRenderer {
    out: String,
    prefix: Vec<String>,
    /// One-shot first-line prefix (list marker already included).
    pending: Option<String>,
    counters: Vec<u32>,
}

impl MarkdownRenderer {
    fn new() -> Self {
        MarkdownRenderer {
            out: String::new(),
            prefix: Vec::new(),
            pending: None,
            counters: Vec::new(),
        }
    }

    fn line_open(&mut self) {
        match self.pending.take() {
            Some(prefix) => self.out.push_str(&prefix),
            None => {
                let prefix = self.prefix.concat();
                self.out.push_str(&prefix);
            }
        }
    }

    /// Blank (but prefixed) line between a block and its next sibling.
    fn separate(&mut self, doc: &Document, id: BlockId) {
        if doc.block(id).next.is_none() {
            return;
        }
        if let Some(parent) = doc.block(id).parent
            && let BlockTag::List(data) = &doc.block(parent).tag
            && data.tight
        {
            return;
        }
        let prefix = self.prefix.concat();
        self.out.push_str(prefix.trim_end());
        self.out.push('\n');
    }

    fn push_literal_lines(&mut self, literal: &str, indent: &str) {
        for line in literal.split_inclusive('\n') {
            self.line_open();
            self.out.push_str(indent);
            self.out.push_str(line);
        }
        if !literal.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn render(mut self, doc: &Document) -> String {
        let mut walker = BlockWalker::new(doc, Document::ROOT);
        while let Some(visit) = walker.next() {
            let id = visit.id;
            match doc.block(id).tag.clone() {
                BlockTag::Document => {}
                BlockTag::Paragraph => {
                    if visit.opening {
                        self.line_open();
                        self.inlines(doc, id);
                        self.out.push('\n');
                    }
                    if visit.closing {
                        self.separate(doc, id);
                    }
                }
                BlockTag::AtxHeading { level } | BlockTag::SetextHeading { level } => {
                    if visit.opening {
                        self.line_open();
                        self.out.push_str(&"#".repeat(level as usize));
                        self.out.push(' ');
                        self.inlines(doc, id);
                        self.out.push('\n');
                    }
                    if visit.closing {
                        self.separate(doc, id);
                    }
                }
                BlockTag::ThematicBreak => {
                    self.line_open();
                    self.out.push_str("---\n");
                    self.separate(doc, id);
                }
                BlockTag::IndentedCode => {
                    self.push_literal_lines(&doc.block(id).literal, "    ");
                    self.separate(doc, id);
                }
                BlockTag::FencedCode(data) => {
                    if data.front_matter {
                        self.out.push_str("---\n");
                        self.out.push_str(&doc.block(id).literal);
                        self.out.push_str("---\n");
                    } else {
                        self.line_open();
                        self.out.push_str("```");
                        self.out.push_str(&data.info);
                        self.out.push('\n');
                        self.push_literal_lines(&doc.block(id).literal, "");
                        self.line_open();
                        self.out.push_str("```\n");
                    }
                    self.separate(doc, id);
                }
                BlockTag::HtmlBlock { .. } => {
                    self.push_literal_lines(&doc.block(id).literal, "");
                    self.separate(doc, id);
                }
                BlockTag::ReferenceDefinition => {}
                BlockTag::BlockQuote => {
                    if visit.opening {
                        if let Some(pending) = self.pending.take() {
                            self.pending = Some(pending + "> ");
                        }
                        self.prefix.push("> ".to_string());
                    }
                    if visit.closing {
                        self.prefix.pop();
                        self.separate(doc, id);
                    }
                }
                BlockTag::List(data) => {
                    if visit.opening {
                        let start = match data.kind {
                            ListKind::Ordered { start, .. } => start,
                            ListKind::Bullet(_) => 0,
                        };
                        self.counters.push(start);
                    }
                    if visit.closing {
                        self.counters.pop();
                        self.separate(doc, id);
                    }
                }
                BlockTag::ListItem(data) => {
                    if visit.opening {
                        let marker = match data.kind {
                            ListKind::Bullet(ch) => format!("{ch} "),
                            ListKind::Ordered { delimiter, .. } => {
                                let n = self.counters.last_mut().map(|c| {
                                    let n = *c;
                                    *c += 1;
                                    n
                                });
                                format!("{}{delimiter} ", n.unwrap_or(1))
                            }
                        };
                        let continuation = " ".repeat(marker.len());
                        self.pending = Some(self.prefix.concat() + &marker);
                        self.prefix.push(continuation);
                    }
                    if visit.closing {
                        self.prefix.pop();
                        self.separate(doc, id);
                    }
                }
                BlockTag::Table { alignments } => {
                    if visit.closing {
                        let _ = alignments;
                        self.separate(doc, id);
                    }
                }
                BlockTag::TableRow { header } => {
                    if visit.opening {
                        self.line_open();
                    }
                    if visit.closing {
                        self.out.push_str("|\n");
                        if header
                            && let Some(table) = doc.block(id).parent
                            && let BlockTag::Table { alignments } = &doc.block(table).tag
                        {
                            self.line_open();
                            for alignment in alignments {
                                use crate::ast::Alignment;
                                self.out.push_str(match alignment {
                                    Alignment::None => "| --- ",
                                    Alignment::Left => "| :-- ",
                                    Alignment::Right => "| --: ",
                                    Alignment::Center => "| :-: ",
                                });
                            }
                            self.out.push_str("|\n");
                        }
                    }
                }
                BlockTag::TableCell => {
                    if visit.opening {
                        self.out.push_str("| ");
                        self.inlines(doc, id);
                        self.out.push(' ');
                    }
                }
            }
        }
        // at most one trailing newline
        while self.out.ends_with("\n\n") {
            self.out.pop();
        }
        self.out
    }

    fn inlines(&mut self, doc: &Document, block: BlockId) {
        let mut walker = InlineWalker::new(doc, doc.block(block).first_inline);
        while let Some(visit) = walker.next() {
            let inline = doc.inline(visit.id);
            match &inline.tag {
                InlineTag::Text(text) => self.out.push_str(text),
                InlineTag::Code(code) => {
                    self.out.push('`');
                    self.out.push_str(code);
                    self.out.push('`');
                }
                InlineTag::RawHtml(raw) => self.out.push_str(raw),
                InlineTag::SoftBreak => {
                    self.out.push('\n');
                    self.line_open();
                }
                InlineTag::LineBreak => {
                    self.out.push_str("\\\n");
                    self.line_open();
                }
                InlineTag::Emphasis => self.out.push('*'),
                InlineTag::Strong => self.out.push_str("**"),
                InlineTag::Strikethrough => self.out.push_str("~~"),
                InlineTag::Subscript => self.out.push('~'),
                InlineTag::Superscript => self.out.push('^'),
                InlineTag::Link { destination, title } => {
                    if visit.opening {
                        self.out.push('[');
                    }
                    if visit.closing {
                        self.out.push_str("](");
                        self.out.push_str(destination);
                        if let Some(title) = title {
                            self.out.push_str(&format!(" \"{title}\""));
                        }
                        self.out.push(')');
                    }
                }
                InlineTag::Image { destination, title } => {
                    if visit.opening {
                        self.out.push_str("![");
                    }
                    if visit.closing {
                        self.out.push_str("](");
                        self.out.push_str(destination);
                        if let Some(title) = title {
                            self.out.push_str(&format!(" \"{title}\""));
                        }
                        self.out.push(')');
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::parse_blocks;
    use crate::inlines::parse_inlines;
    use pretty_assertions::assert_eq;

    fn document(source: &str, settings: &Settings) -> Document {
        let mut doc = parse_blocks(source, settings).unwrap();
        parse_inlines(&mut doc, settings).unwrap();
        doc
    }

    #[test]
    fn debug_tree_shows_structure() {
        let settings = Settings::new();
        let doc = document("# hi\n\n- *a*\n", &settings);
        let tree = debug_tree(&doc);
        assert_eq!(
            tree,
            "document\n  heading level=1\n    text \"hi\"\n  list bullet=- tight\n    \
             item\n      paragraph\n        emph\n          text \"a\"\n"
        );
    }

    #[test]
    fn markdown_round_trips_basic_blocks() {
        let settings = Settings::new();
        let doc = document("# Title\n\npara *em* `code`\n\n- one\n- two\n", &settings);
        let markdown = render(&doc, &settings, OutputMode::Markdown).unwrap();
        assert_eq!(
            markdown,
            "# Title\n\npara *em* `code`\n\n- one\n- two\n"
        );
    }

    #[test]
    fn markdown_prefixes_block_quotes() {
        let settings = Settings::new();
        let doc = document("> a\n>\n> b\n", &settings);
        let markdown = render(&doc, &settings, OutputMode::Markdown).unwrap();
        assert_eq!(markdown, "> a\n>\n> b\n");
    }

    #[test]
    fn markdown_resolves_reference_links() {
        let settings = Settings::new();
        let doc = document("[foo][bar]\n\n[bar]: /url\n", &settings);
        let markdown = render(&doc, &settings, OutputMode::Markdown).unwrap();
        assert_eq!(markdown, "[foo](/url)\n");
    }

    #[test]
    fn markdown_emits_tables() {
        let settings = Settings::builder().pipe_tables(true).build();
        let doc = document("| a | b |\n|:--|--:|\n| 1 | 2 |\n", &settings);
        let markdown = render(&doc, &settings, OutputMode::Markdown).unwrap();
        assert_eq!(
            markdown,
            "| a | b |\n| :-- | --: |\n| 1 | 2 |\n"
        );
    }

    #[test]
    fn markdown_keeps_ordered_numbering() {
        let settings = Settings::new();
        let doc = document("3. c\n4. d\n", &settings);
        let markdown = render(&doc, &settings, OutputMode::Markdown).unwrap();
        assert_eq!(markdown, "3. c\n4. d\n");
    }
}
