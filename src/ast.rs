/// AST node types for CommonMark documents
///
/// Both trees are arena-backed: nodes live in flat `Vec`s and refer to each
/// other by index. Indices are stable for the life of a document, which lets
/// the inline parser promote a literal text node into an Emphasis/Strong/
/// Link/Image node in place without disturbing sibling links or the pending
/// delimiter stack.
use crate::refs::ReferenceMap;
use serde::{Deserialize, Serialize};

pub type BlockId = usize;
pub type InlineId = usize;

/// A byte range in the original (pre-expansion) source text.
/// `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    /// Marker character is `-`, `+`, or `*`.
    Bullet(char),
    /// Start number and delimiter (`.` or `)`).
    Ordered { start: u32, delimiter: char },
}

impl ListKind {
    /// Two markers continue the same list only when the marker character
    /// (bullets) or delimiter (ordered) agrees.
    pub fn matches(&self, other: &ListKind) -> bool {
        match (self, other) {
            (ListKind::Bullet(a), ListKind::Bullet(b)) => a == b,
            (ListKind::Ordered { delimiter: a, .. }, ListKind::Ordered { delimiter: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListData {
    pub kind: ListKind,
    /// Tight lists don't wrap simple item content in `<p>` tags.
    pub tight: bool,
    /// Columns of indentation before the marker.
    pub marker_offset: usize,
    /// Marker width plus the spacing after it; continuation lines must be
    /// indented at least `marker_offset + padding` columns.
    pub padding: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceData {
    pub fence_char: char,
    pub fence_length: usize,
    /// Indentation of the opening fence; stripped from content lines.
    pub fence_offset: usize,
    /// Info string (first word is the language class), set at finalization.
    pub info: String,
    /// YAML front matter: rendered as nothing in HTML output.
    pub front_matter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    None,
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockTag {
    Document,
    BlockQuote,
    List(ListData),
    ListItem(ListData),
    Paragraph,
    AtxHeading { level: u8 },
    SetextHeading { level: u8 },
    IndentedCode,
    FencedCode(FenceData),
    HtmlBlock { kind: u8 },
    ThematicBreak,
    /// A paragraph that consisted entirely of link reference definitions.
    ReferenceDefinition,
    Table { alignments: Vec<Alignment> },
    TableRow { header: bool },
    TableCell,
}

impl BlockTag {
    /// Container blocks hold other blocks; everything else is a leaf.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            BlockTag::Document
                | BlockTag::BlockQuote
                | BlockTag::List(_)
                | BlockTag::ListItem(_)
                | BlockTag::Table { .. }
                | BlockTag::TableRow { .. }
        )
    }

    /// Leaf blocks that take raw text line by line.
    pub fn accepts_lines(&self) -> bool {
        matches!(
            self,
            BlockTag::Paragraph
                | BlockTag::AtxHeading { .. }
                | BlockTag::IndentedCode
                | BlockTag::FencedCode(_)
                | BlockTag::HtmlBlock { .. }
        )
    }

    /// Leaf blocks whose raw text is replaced by an inline tree in phase 2.
    pub fn has_inlines(&self) -> bool {
        matches!(
            self,
            BlockTag::Paragraph
                | BlockTag::AtxHeading { .. }
                | BlockTag::SetextHeading { .. }
                | BlockTag::TableCell
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BlockTag::Document => "document",
            BlockTag::BlockQuote => "block_quote",
            BlockTag::List(_) => "list",
            BlockTag::ListItem(_) => "item",
            BlockTag::Paragraph => "paragraph",
            BlockTag::AtxHeading { .. } | BlockTag::SetextHeading { .. } => "heading",
            BlockTag::IndentedCode | BlockTag::FencedCode(_) => "code_block",
            BlockTag::HtmlBlock { .. } => "html_block",
            BlockTag::ThematicBreak => "thematic_break",
            BlockTag::ReferenceDefinition => "reference_def",
            BlockTag::Table { .. } => "table",
            BlockTag::TableRow { .. } => "table_row",
            BlockTag::TableCell => "table_cell",
        }
    }
}

/// One block-level node, owned by the document arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub tag: BlockTag,
    /// Mutable only while open; finalization freezes tag-specific fields.
    pub open: bool,
    /// Whether the last line contributing to this block was blank; feeds
    /// tight/loose list determination.
    pub last_line_blank: bool,
    /// Accumulated raw text (tab-expanded chars), phase 1 only.
    pub content: Vec<char>,
    /// Per-char origin spans back into the original input, parallel to
    /// `content`; empty when position tracking is off.
    pub content_map: Vec<Span>,
    /// Verbatim text for code and HTML blocks, set at finalization.
    pub literal: String,
    /// Root of the inline tree, populated in phase 2.
    pub first_inline: Option<InlineId>,
    pub parent: Option<BlockId>,
    pub first_child: Option<BlockId>,
    pub last_child: Option<BlockId>,
    pub next: Option<BlockId>,
    pub start_line: usize,
    pub end_line: usize,
    pub span: Span,
}

impl Block {
    pub fn new(tag: BlockTag, start_line: usize) -> Self {
        Block {
            tag,
            open: true,
            last_line_blank: false,
            content: Vec::new(),
            content_map: Vec::new(),
            literal: String::new(),
            first_inline: None,
            parent: None,
            first_child: None,
            last_child: None,
            next: None,
            start_line,
            end_line: start_line,
            span: Span::default(),
        }
    }

    pub fn content_string(&self) -> String {
        self.content.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InlineTag {
    Text(String),
    Code(String),
    RawHtml(String),
    SoftBreak,
    LineBreak,
    Emphasis,
    Strong,
    Strikethrough,
    Subscript,
    Superscript,
    Link {
        destination: String,
        title: Option<String>,
    },
    Image {
        destination: String,
        title: Option<String>,
    },
}

impl InlineTag {
    pub fn type_name(&self) -> &'static str {
        match self {
            InlineTag::Text(_) => "text",
            InlineTag::Code(_) => "code",
            InlineTag::RawHtml(_) => "html_inline",
            InlineTag::SoftBreak => "softbreak",
            InlineTag::LineBreak => "linebreak",
            InlineTag::Emphasis => "emph",
            InlineTag::Strong => "strong",
            InlineTag::Strikethrough => "strikethrough",
            InlineTag::Subscript => "subscript",
            InlineTag::Superscript => "superscript",
            InlineTag::Link { .. } => "link",
            InlineTag::Image { .. } => "image",
        }
    }
}

/// One inline node. Inline trees only link forward (first child and next
/// sibling); they are produced bottom-up and never need a parent pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inline {
    pub tag: InlineTag,
    pub first_child: Option<InlineId>,
    pub next: Option<InlineId>,
    pub span: Span,
}

impl Inline {
    pub fn new(tag: InlineTag) -> Self {
        Inline {
            tag,
            first_child: None,
            next: None,
            span: Span::default(),
        }
    }
}

/// A parsed document: both arenas plus the reference side-table.
/// Scoped to one conversion call; never shared across conversions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub inlines: Vec<Inline>,
    pub refs: ReferenceMap,
}

impl Document {
    pub const ROOT: BlockId = 0;

    pub fn new(case_sensitive_refs: bool) -> Self {
        Document {
            blocks: vec![Block::new(BlockTag::Document, 1)],
            inlines: Vec::new(),
            refs: ReferenceMap::new(case_sensitive_refs),
        }
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    pub fn inline(&self, id: InlineId) -> &Inline {
        &self.inlines[id]
    }

    pub fn inline_mut(&mut self, id: InlineId) -> &mut Inline {
        &mut self.inlines[id]
    }

    /// Append a block as the last child of `parent`.
    pub fn append_block(&mut self, parent: BlockId, block: Block) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(block);
        self.blocks[id].parent = Some(parent);
        match self.blocks[parent].last_child {
            Some(last) => {
                self.blocks[last].next = Some(id);
                self.blocks[parent].last_child = Some(id);
            }
            None => {
                self.blocks[parent].first_child = Some(id);
                self.blocks[parent].last_child = Some(id);
            }
        }
        id
    }

    pub fn push_inline(&mut self, inline: Inline) -> InlineId {
        let id = self.inlines.len();
        self.inlines.push(inline);
        id
    }

    /// Child blocks of `id`, in order.
    pub fn block_children(&self, id: BlockId) -> BlockChildren<'_> {
        BlockChildren {
            doc: self,
            next: self.blocks[id].first_child,
        }
    }
}

pub struct BlockChildren<'d> {
    doc: &'d Document,
    next: Option<BlockId>,
}

impl Iterator for BlockChildren<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let id = self.next?;
        self.next = self.doc.blocks[id].next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_links_siblings() {
        let mut doc = Document::new(false);
        let a = doc.append_block(Document::ROOT, Block::new(BlockTag::Paragraph, 1));
        let b = doc.append_block(Document::ROOT, Block::new(BlockTag::ThematicBreak, 2));
        assert_eq!(doc.block(Document::ROOT).first_child, Some(a));
        assert_eq!(doc.block(a).next, Some(b));
        assert_eq!(doc.block(Document::ROOT).last_child, Some(b));
        assert_eq!(
            doc.block_children(Document::ROOT).collect::<Vec<_>>(),
            vec![a, b]
        );
    }

    #[test]
    fn list_kind_compatibility() {
        let dash = ListKind::Bullet('-');
        let star = ListKind::Bullet('*');
        let dot = ListKind::Ordered {
            start: 1,
            delimiter: '.',
        };
        let paren = ListKind::Ordered {
            start: 3,
            delimiter: ')',
        };
        assert!(dash.matches(&ListKind::Bullet('-')));
        assert!(!dash.matches(&star));
        assert!(dot.matches(&ListKind::Ordered {
            start: 9,
            delimiter: '.',
        }));
        assert!(!dot.matches(&paren));
        assert!(!dash.matches(&dot));
    }
}
