/// Iterative tree traversal
///
/// Both walkers drive an explicit step stack, so arbitrarily deep documents
/// never touch the call stack. Container nodes yield an opening visit,
/// their children, then a closing visit; childless nodes yield a single
/// visit with both flags set.
use crate::ast::{BlockId, Document, InlineId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockVisit {
    pub id: BlockId,
    pub opening: bool,
    pub closing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineVisit {
    pub id: InlineId,
    pub opening: bool,
    pub closing: bool,
}

enum Step<T> {
    Enter(T),
    Leave(T),
}

pub struct BlockWalker<'d> {
    doc: &'d Document,
    stack: Vec<Step<BlockId>>,
}

impl<'d> BlockWalker<'d> {
    pub fn new(doc: &'d Document, root: BlockId) -> Self {
        BlockWalker {
            doc,
            stack: vec![Step::Enter(root)],
        }
    }

    /// Drop the pending children of the container whose opening visit was
    /// just returned; its closing visit still follows.
    pub fn skip_children(&mut self) {
        while matches!(self.stack.last(), Some(Step::Enter(_))) {
            self.stack.pop();
        }
    }
}

impl Iterator for BlockWalker<'_> {
    type Item = BlockVisit;

    fn next(&mut self) -> Option<BlockVisit> {
        match self.stack.pop()? {
            Step::Enter(id) => {
                let block = self.doc.block(id);
                match block.first_child {
                    None => Some(BlockVisit {
                        id,
                        opening: true,
                        closing: true,
                    }),
                    Some(first) => {
                        self.stack.push(Step::Leave(id));
                        // children entered left to right
                        let from = self.stack.len();
                        let mut child = Some(first);
                        while let Some(c) = child {
                            self.stack.push(Step::Enter(c));
                            child = self.doc.block(c).next;
                        }
                        self.stack[from..].reverse();
                        Some(BlockVisit {
                            id,
                            opening: true,
                            closing: false,
                        })
                    }
                }
            }
            Step::Leave(id) => Some(BlockVisit {
                id,
                opening: false,
                closing: true,
            }),
        }
    }
}

pub struct InlineWalker<'d> {
    doc: &'d Document,
    stack: Vec<Step<InlineId>>,
}

impl<'d> InlineWalker<'d> {
    pub fn new(doc: &'d Document, first: Option<InlineId>) -> Self {
        let mut stack = Vec::new();
        let mut node = first;
        while let Some(id) = node {
            stack.push(Step::Enter(id));
            node = doc.inline(id).next;
        }
        stack.reverse();
        InlineWalker { doc, stack }
    }

    pub fn skip_children(&mut self) {
        while matches!(self.stack.last(), Some(Step::Enter(_))) {
            self.stack.pop();
        }
    }
}

impl Iterator for InlineWalker<'_> {
    type Item = InlineVisit;

    fn next(&mut self) -> Option<InlineVisit> {
        match self.stack.pop()? {
            Step::Enter(id) => {
                let inline = self.doc.inline(id);
                match inline.first_child {
                    None => Some(InlineVisit {
                        id,
                        opening: true,
                        closing: true,
                    }),
                    Some(first) => {
                        self.stack.push(Step::Leave(id));
                        let from = self.stack.len();
                        let mut child = Some(first);
                        while let Some(c) = child {
                            self.stack.push(Step::Enter(c));
                            child = self.doc.inline(c).next;
                        }
                        self.stack[from..].reverse();
                        Some(InlineVisit {
                            id,
                            opening: true,
                            closing: false,
                        })
                    }
                }
            }
            Step::Leave(id) => Some(InlineVisit {
                id,
                opening: false,
                closing: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::parse_blocks;
    use crate::settings::Settings;

    #[test]
    fn visits_pair_up() {
        let doc = parse_blocks("> a\n\nb\n", &Settings::new()).unwrap();
        let visits: Vec<_> = BlockWalker::new(&doc, Document::ROOT)
            .map(|v| (doc.block(v.id).tag.type_name(), v.opening, v.closing))
            .collect();
        assert_eq!(
            visits,
            vec![
                ("document", true, false),
                ("block_quote", true, false),
                ("paragraph", true, true),
                ("block_quote", false, true),
                ("paragraph", true, true),
                ("document", false, true),
            ]
        );
    }

    #[test]
    fn skip_children_still_yields_the_closing_visit() {
        let doc = parse_blocks("> a\n>\n> b\n\nafter\n", &Settings::new()).unwrap();
        let mut walker = BlockWalker::new(&doc, Document::ROOT);
        let mut seen = Vec::new();
        while let Some(visit) = walker.next() {
            let name = doc.block(visit.id).tag.type_name();
            if name == "block_quote" && visit.opening {
                walker.skip_children();
            }
            seen.push((name, visit.opening, visit.closing));
        }
        assert_eq!(
            seen,
            vec![
                ("document", true, false),
                ("block_quote", true, false),
                ("block_quote", false, true),
                ("paragraph", true, true),
                ("document", false, true),
            ]
        );
    }
}
