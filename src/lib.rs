//! CommonMark-compliant markdown to HTML conversion.
//!
//! Parsing runs in two phases over an arena-backed document: a line-oriented
//! block pass builds the block tree, then an inline pass replaces the raw
//! text of paragraphs and headings with inline trees. Rendering walks the
//! finished document with iterative visitors.
//!
//! ```
//! use tidemark::{markdown_to_html, Settings};
//!
//! let html = markdown_to_html("Hello, *world*!\n", &Settings::new()).unwrap();
//! assert_eq!(html, "<p>Hello, <em>world</em>!</p>\n");
//! ```

pub mod ast;
pub mod blocks;
pub mod entities;
pub mod error;
pub mod html;
pub mod inlines;
pub mod line;
pub mod refs;
pub mod render;
pub mod scanners;
pub mod settings;
pub mod visit;

pub use ast::{Block, BlockId, BlockTag, Document, Inline, InlineId, InlineTag, Span};
pub use error::{Error, Result};
pub use html::{OverrideFn, Visit, render_html, render_html_with};
pub use render::{OutputMode, render};
pub use settings::{Settings, SettingsBuilder};
pub use visit::{BlockVisit, BlockWalker, InlineVisit, InlineWalker};

/// Parse `source` into a finished document (both phases).
pub fn parse_document(source: &str, settings: &Settings) -> Result<Document> {
    let mut doc = blocks::parse_blocks(source, settings)?;
    inlines::parse_inlines(&mut doc, settings)?;
    Ok(doc)
}

/// One-call conversion to HTML.
pub fn markdown_to_html(source: &str, settings: &Settings) -> Result<String> {
    let doc = parse_document(source, settings)?;
    render_html(&doc, settings)
}

/// Conversion to HTML with a per-node override hook; see
/// [`html::render_html_with`].
pub fn markdown_to_html_with<'o>(
    source: &str,
    settings: &Settings,
    hook: &'o mut OverrideFn<'o>,
) -> Result<String> {
    let doc = parse_document(source, settings)?;
    render_html_with(&doc, settings, hook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(markdown_to_html("", &Settings::new()).unwrap(), "");
    }

    #[test]
    fn basic_document() {
        let html = markdown_to_html("# Title\n\nSome **bold** text.\n", &Settings::new()).unwrap();
        assert_eq!(html, "<h1>Title</h1>\n<p>Some <strong>bold</strong> text.</p>\n");
    }

    #[test]
    fn image_with_title() {
        let html =
            markdown_to_html("![alt](/img.png \"t\")\n", &Settings::new()).unwrap();
        assert_eq!(html, "<p><img src=\"/img.png\" alt=\"alt\" title=\"t\" /></p>\n");
    }

    #[test]
    fn override_hook_reaches_the_top_call() {
        let settings = Settings::new();
        let mut hook = |doc: &Document, visit: Visit| {
            if let Visit::Inline(v) = visit
                && matches!(doc.inline(v.id).tag, InlineTag::Code(_))
            {
                return Ok(Some("<kbd>x</kbd>".to_string()));
            }
            Ok(None)
        };
        let html = markdown_to_html_with("`x`\n", &settings, &mut hook).unwrap();
        assert_eq!(html, "<p><kbd>x</kbd></p>\n");
    }
}
