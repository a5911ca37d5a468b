/// HTML output
///
/// A single pass over the block tree (and each block's inline tree) with
/// the iterative walkers. Rendering of every node kind is closed over the
/// tag enums; the one extension point is an optional override callback
/// that can replace the output for any visit.
use crate::ast::{Alignment, BlockId, BlockTag, Document, InlineTag};
use crate::entities::{escape_html, escape_url};
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::visit::{BlockVisit, BlockWalker, InlineVisit, InlineWalker};
use std::collections::HashMap;

/// One rendering event, block or inline level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Block(BlockVisit),
    Inline(InlineVisit),
}

/// Override hook: return `Ok(Some(html))` to replace the default output for
/// a visit, `Ok(None)` to keep it, `Err` to abort the conversion.
pub type OverrideFn<'a> =
    dyn FnMut(&Document, Visit) -> std::result::Result<Option<String>, String> + 'a;

pub fn render_html(doc: &Document, settings: &Settings) -> Result<String> {
    HtmlRenderer::new(settings).render(doc)
}

pub fn render_html_with<'o>(
    doc: &Document,
    settings: &Settings,
    hook: &'o mut OverrideFn<'o>,
) -> Result<String> {
    let mut renderer = HtmlRenderer::new(settings);
    renderer.hook = Some(hook);
    renderer.render(doc)
}

pub struct HtmlRenderer<'s, 'o> {
    settings: &'s Settings,
    out: String,
    hook: Option<&'o mut OverrideFn<'o>>,
    used_ids: HashMap<String, usize>,
    /// Depth of `<img alt="...">` rendering; positive means plain text only.
    alt_depth: usize,
    /// Current table state.
    alignments: Vec<Alignment>,
    cell_index: usize,
    cell_is_header: bool,
    in_tbody: bool,
}

impl<'s, 'o> HtmlRenderer<'s, 'o> {
    pub fn new(settings: &'s Settings) -> Self {
        HtmlRenderer {
            settings,
            out: String::new(),
            hook: None,
            used_ids: HashMap::new(),
            alt_depth: 0,
            alignments: Vec::new(),
            cell_index: 0,
            cell_is_header: false,
            in_tbody: false,
        }
    }

    pub fn render(mut self, doc: &Document) -> Result<String> {
        let mut walker = BlockWalker::new(doc, Document::ROOT);
        while let Some(visit) = walker.next() {
            if let Some(hook) = self.hook.as_mut() {
                match hook(doc, Visit::Block(visit)) {
                    Ok(Some(html)) => {
                        self.out.push_str(&html);
                        continue;
                    }
                    Ok(None) => {}
                    Err(message) => return Err(Error::Visitor { message }),
                }
            }
            self.render_block(doc, visit)?;
        }
        Ok(self.out)
    }

    /// Ensure output sits at the start of a line.
    fn cr(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn sourcepos(&self, doc: &Document, id: BlockId) -> String {
        if self.settings.track_positions {
            let span = doc.block(id).span;
            format!(" data-sourcepos=\"{}-{}\"", span.start, span.end)
        } else {
            String::new()
        }
    }

    /// A paragraph renders bare when its list is tight.
    fn in_tight_list(&self, doc: &Document, id: BlockId) -> bool {
        let Some(item) = doc.block(id).parent else {
            return false;
        };
        if !matches!(doc.block(item).tag, BlockTag::ListItem(_)) {
            return false;
        }
        match doc.block(item).parent.map(|list| &doc.block(list).tag) {
            Some(BlockTag::List(data)) => data.tight,
            _ => false,
        }
    }

    fn render_block(&mut self, doc: &Document, visit: BlockVisit) -> Result<()> {
        let id = visit.id;
        match &doc.block(id).tag {
            BlockTag::Document => {}
            BlockTag::ThematicBreak => {
                self.cr();
                let pos = self.sourcepos(doc, id);
                self.out.push_str(&format!("<hr{pos} />\n"));
            }
            BlockTag::Paragraph => {
                let tight = self.in_tight_list(doc, id);
                if visit.opening {
                    if !tight {
                        self.cr();
                        let pos = self.sourcepos(doc, id);
                        self.out.push_str(&format!("<p{pos}>"));
                    }
                    self.render_inlines(doc, id)?;
                }
                if visit.closing && !tight {
                    self.out.push_str("</p>\n");
                }
            }
            BlockTag::AtxHeading { level } | BlockTag::SetextHeading { level } => {
                let level = *level;
                if visit.opening {
                    self.cr();
                    let pos = self.sourcepos(doc, id);
                    let id_attr = if self.settings.heading_ids {
                        format!(" id=\"{}\"", self.heading_id(doc, id))
                    } else {
                        String::new()
                    };
                    self.out.push_str(&format!("<h{level}{pos}{id_attr}>"));
                    self.render_inlines(doc, id)?;
                }
                if visit.closing {
                    self.out.push_str(&format!("</h{level}>\n"));
                }
            }
            BlockTag::IndentedCode => {
                self.cr();
                let pos = self.sourcepos(doc, id);
                self.out.push_str(&format!("<pre{pos}><code>"));
                if doc.block(id).first_inline.is_some() {
                    // inline structure was parsed inside the code block
                    self.render_inlines(doc, id)?;
                    self.out.push('\n');
                } else {
                    self.out.push_str(&escape_html(&doc.block(id).literal));
                }
                self.out.push_str("</code></pre>\n");
            }
            BlockTag::FencedCode(data) => {
                if data.front_matter {
                    return Ok(());
                }
                self.cr();
                let pos = self.sourcepos(doc, id);
                let class = match data.info.split_whitespace().next() {
                    Some(language) => {
                        format!(" class=\"language-{}\"", escape_html(language))
                    }
                    None => String::new(),
                };
                self.out.push_str(&format!("<pre{pos}><code{class}>"));
                self.out.push_str(&escape_html(&doc.block(id).literal));
                self.out.push_str("</code></pre>\n");
            }
            BlockTag::HtmlBlock { .. } => {
                self.cr();
                self.out.push_str(&doc.block(id).literal);
                self.out.push('\n');
            }
            BlockTag::BlockQuote => {
                if visit.opening {
                    self.cr();
                    let pos = self.sourcepos(doc, id);
                    self.out.push_str(&format!("<blockquote{pos}>\n"));
                }
                if visit.closing {
                    self.cr();
                    self.out.push_str("</blockquote>\n");
                }
            }
            BlockTag::List(data) => {
                if visit.opening {
                    self.cr();
                    let pos = self.sourcepos(doc, id);
                    match data.kind {
                        crate::ast::ListKind::Bullet(_) => {
                            self.out.push_str(&format!("<ul{pos}>\n"));
                        }
                        crate::ast::ListKind::Ordered { start, .. } => {
                            if start == 1 {
                                self.out.push_str(&format!("<ol{pos}>\n"));
                            } else {
                                self.out.push_str(&format!("<ol{pos} start=\"{start}\">\n"));
                            }
                        }
                    }
                }
                if visit.closing {
                    self.cr();
                    match data.kind {
                        crate::ast::ListKind::Bullet(_) => self.out.push_str("</ul>\n"),
                        crate::ast::ListKind::Ordered { .. } => self.out.push_str("</ol>\n"),
                    }
                }
            }
            BlockTag::ListItem(_) => {
                if visit.opening {
                    let pos = self.sourcepos(doc, id);
                    self.out.push_str(&format!("<li{pos}>"));
                }
                if visit.closing {
                    self.out.push_str("</li>\n");
                }
            }
            BlockTag::ReferenceDefinition => {}
            BlockTag::Table { alignments } => {
                if visit.opening {
                    self.cr();
                    let pos = self.sourcepos(doc, id);
                    self.out.push_str(&format!("<table{pos}>\n"));
                    self.alignments = alignments.clone();
                    self.in_tbody = false;
                }
                if visit.closing {
                    if self.in_tbody {
                        self.out.push_str("</tbody>\n");
                    }
                    self.out.push_str("</table>\n");
                }
            }
            BlockTag::TableRow { header } => {
                if visit.opening {
                    if *header {
                        self.out.push_str("<thead>\n");
                    } else if !self.in_tbody {
                        self.out.push_str("<tbody>\n");
                        self.in_tbody = true;
                    }
                    self.out.push_str("<tr>\n");
                    self.cell_index = 0;
                    self.cell_is_header = *header;
                }
                if visit.closing {
                    self.out.push_str("</tr>\n");
                    if *header {
                        self.out.push_str("</thead>\n");
                    }
                }
            }
            BlockTag::TableCell => {
                let tag = if self.cell_is_header { "th" } else { "td" };
                if visit.opening {
                    let align = match self.alignments.get(self.cell_index) {
                        Some(Alignment::Left) => " align=\"left\"",
                        Some(Alignment::Right) => " align=\"right\"",
                        Some(Alignment::Center) => " align=\"center\"",
                        _ => "",
                    };
                    self.out.push_str(&format!("<{tag}{align}>"));
                    self.render_inlines(doc, id)?;
                }
                if visit.closing {
                    self.out.push_str(&format!("</{tag}>\n"));
                    self.cell_index += 1;
                }
            }
        }
        Ok(())
    }

    fn render_inlines(&mut self, doc: &Document, block: BlockId) -> Result<()> {
        let mut walker = InlineWalker::new(doc, doc.block(block).first_inline);
        while let Some(visit) = walker.next() {
            if let Some(hook) = self.hook.as_mut() {
                match hook(doc, Visit::Inline(visit)) {
                    Ok(Some(html)) => {
                        self.out.push_str(&html);
                        continue;
                    }
                    Ok(None) => {}
                    Err(message) => return Err(Error::Visitor { message }),
                }
            }
            self.render_inline(doc, visit)?;
        }
        Ok(())
    }

    fn render_inline(&mut self, doc: &Document, visit: InlineVisit) -> Result<()> {
        let inline = doc.inline(visit.id);
        let alt = self.alt_depth > 0;
        match &inline.tag {
            InlineTag::Text(text) => self.out.push_str(&escape_html(text)),
            InlineTag::Code(code) => {
                if alt {
                    self.out.push_str(&escape_html(code));
                } else {
                    self.out.push_str(&format!("<code>{}</code>", escape_html(code)));
                }
            }
            InlineTag::RawHtml(raw) => {
                if !alt {
                    self.out.push_str(raw);
                }
            }
            InlineTag::SoftBreak => {
                if alt {
                    self.out.push(' ');
                } else if self.settings.soft_break_as_br {
                    self.out.push_str("<br />\n");
                } else {
                    self.out.push('\n');
                }
            }
            InlineTag::LineBreak => {
                if alt {
                    self.out.push(' ');
                } else {
                    self.out.push_str("<br />\n");
                }
            }
            InlineTag::Emphasis => self.paired(visit, alt, "<em>", "</em>"),
            InlineTag::Strong => self.paired(visit, alt, "<strong>", "</strong>"),
            InlineTag::Strikethrough => self.paired(visit, alt, "<del>", "</del>"),
            InlineTag::Subscript => self.paired(visit, alt, "<sub>", "</sub>"),
            InlineTag::Superscript => self.paired(visit, alt, "<sup>", "</sup>"),
            InlineTag::Link { destination, title } => {
                if !alt {
                    if visit.opening {
                        let url = self.resolve_url(destination)?;
                        let title_attr = match title {
                            Some(title) => format!(" title=\"{}\"", escape_html(title)),
                            None => String::new(),
                        };
                        self.out.push_str(&format!(
                            "<a href=\"{}\"{title_attr}>",
                            escape_url(&url)
                        ));
                    }
                    if visit.closing {
                        self.out.push_str("</a>");
                    }
                }
            }
            InlineTag::Image { destination, title } => {
                if alt {
                    // nested image contributes only its alt text
                    return Ok(());
                }
                if visit.opening {
                    let url = self.resolve_url(destination)?;
                    self.out.push_str(&format!(
                        "<img src=\"{}\" alt=\"",
                        escape_url(&url)
                    ));
                    self.alt_depth += 1;
                }
                if visit.closing {
                    self.alt_depth -= 1;
                    self.out.push('"');
                    if let Some(title) = title {
                        self.out
                            .push_str(&format!(" title=\"{}\"", escape_html(title)));
                    }
                    self.out.push_str(" />");
                }
            }
        }
        Ok(())
    }

    fn paired(&mut self, visit: InlineVisit, alt: bool, open: &str, close: &str) {
        if alt {
            return;
        }
        if visit.opening {
            self.out.push_str(open);
        }
        if visit.closing {
            self.out.push_str(close);
        }
    }

    fn resolve_url(&self, destination: &str) -> Result<String> {
        match &self.settings.url_resolver {
            Some(resolver) => resolver(destination).map_err(|message| Error::UrlResolver {
                url: destination.to_string(),
                message,
            }),
            None => Ok(destination.to_string()),
        }
    }

    /// GitHub-style heading anchor, de-duplicated with `-n` suffixes.
    fn heading_id(&mut self, doc: &Document, block: BlockId) -> String {
        let mut slug = String::new();
        for visit in InlineWalker::new(doc, doc.block(block).first_inline) {
            if !visit.opening {
                continue;
            }
            let text = match &doc.inline(visit.id).tag {
                InlineTag::Text(t) | InlineTag::Code(t) => t.as_str(),
                InlineTag::SoftBreak | InlineTag::LineBreak => " ",
                _ => continue,
            };
            for ch in text.chars() {
                if ch.is_alphanumeric() {
                    slug.extend(ch.to_lowercase());
                } else if matches!(ch, ' ' | '-' | '_') && !slug.ends_with('-') {
                    slug.push('-');
                }
            }
        }
        let slug = slug.trim_matches('-').to_string();
        let slug = if slug.is_empty() {
            "section".to_string()
        } else {
            slug
        };
        let seen = self.used_ids.entry(slug.clone()).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            format!("{slug}-{}", *seen - 1)
        } else {
            slug
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::parse_blocks;
    use crate::inlines::parse_inlines;
    use pretty_assertions::assert_eq;

    fn html(source: &str) -> String {
        html_with(source, &Settings::new())
    }

    fn html_with(source: &str, settings: &Settings) -> String {
        let mut doc = parse_blocks(source, settings).unwrap();
        parse_inlines(&mut doc, settings).unwrap();
        render_html(&doc, settings).unwrap()
    }

    #[test]
    fn basic_blocks() {
        assert_eq!(html("# hi\n"), "<h1>hi</h1>\n");
        assert_eq!(html("para\n"), "<p>para</p>\n");
        assert_eq!(html("***\n"), "<hr />\n");
        assert_eq!(html("> q\n"), "<blockquote>\n<p>q</p>\n</blockquote>\n");
    }

    #[test]
    fn emphasis_nesting() {
        assert_eq!(html("*_*_\n"), "<p><em>_</em>_</p>\n");
        assert_eq!(
            html("**foo, *bar*, abc**\n"),
            "<p><strong>foo, <em>bar</em>, abc</strong></p>\n"
        );
    }

    #[test]
    fn code_blocks() {
        assert_eq!(
            html("```rust\nlet x = 1;\n```\n"),
            "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>\n"
        );
        assert_eq!(
            html("    a < b\n"),
            "<pre><code>a &lt; b\n</code></pre>\n"
        );
    }

    #[test]
    fn tight_and_loose_list_output() {
        assert_eq!(
            html("- a\n- b\n"),
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n"
        );
        assert_eq!(
            html("- a\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
        assert_eq!(
            html("3. c\n4. d\n"),
            "<ol start=\"3\">\n<li>c</li>\n<li>d</li>\n</ol>\n"
        );
    }

    #[test]
    fn links_and_images() {
        assert_eq!(
            html("[foo](/url \"t\")\n"),
            "<p><a href=\"/url\" title=\"t\">foo</a></p>\n"
        );
        assert_eq!(
            html("![a *b*](/img.png)\n"),
            "<p><img src=\"/img.png\" alt=\"a b\" /></p>\n"
        );
        // destination chars outside the safe set are percent-encoded
        assert_eq!(
            html("[x](/a b)\n"),
            "<p>[x](/a b)</p>\n"
        );
        assert_eq!(
            html("[x](<\u{00E9}>)\n"),
            "<p><a href=\"%C3%A9\">x</a></p>\n"
        );
    }

    #[test]
    fn nul_byte_becomes_replacement_char() {
        assert_eq!(html("a\0b\n"), "<p>a\u{FFFD}b</p>\n");
    }

    #[test]
    fn raw_html_passes_through() {
        assert_eq!(html("<div>\n*x*\n</div>\n"), "<div>\n*x*\n</div>\n");
        assert_eq!(html("a <em>b</em>\n"), "<p>a <em>b</em></p>\n");
    }

    #[test]
    fn soft_break_modes() {
        assert_eq!(html("a\nb\n"), "<p>a\nb</p>\n");
        let settings = Settings::builder().soft_break_as_br(true).build();
        assert_eq!(html_with("a\nb\n", &settings), "<p>a<br />\nb</p>\n");
    }

    #[test]
    fn heading_ids_deduplicate() {
        let settings = Settings::builder().heading_ids(true).build();
        assert_eq!(
            html_with("# One Two\n\n# One Two\n\n# !!\n", &settings),
            "<h1 id=\"one-two\">One Two</h1>\n<h1 id=\"one-two-1\">One Two</h1>\n<h1 id=\"section\">!!</h1>\n"
        );
    }

    #[test]
    fn front_matter_renders_nothing() {
        let settings = Settings::builder().front_matter(true).build();
        assert_eq!(
            html_with("---\ntitle: x\n---\nbody\n", &settings),
            "<p>body</p>\n"
        );
    }

    #[test]
    fn table_output() {
        let settings = Settings::builder().pipe_tables(true).build();
        assert_eq!(
            html_with("| a | b |\n|:--|--:|\n| 1 | 2 |\n", &settings),
            "<table>\n<thead>\n<tr>\n<th align=\"left\">a</th>\n<th align=\"right\">b</th>\n\
             </tr>\n</thead>\n<tbody>\n<tr>\n<td align=\"left\">1</td>\n\
             <td align=\"right\">2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn url_resolver_rewrites_and_fails() {
        let settings = Settings::builder()
            .url_resolver(|url: &str| {
                if url.starts_with("wiki:") {
                    Ok(format!("/wiki/{}", &url[5..]))
                } else {
                    Err("unknown scheme".to_string())
                }
            })
            .build();
        assert_eq!(
            html_with("[w](wiki:Home)\n", &settings),
            "<p><a href=\"/wiki/Home\">w</a></p>\n"
        );
        let mut doc = parse_blocks("[w](ftp:x)\n", &settings).unwrap();
        parse_inlines(&mut doc, &settings).unwrap();
        let err = render_html(&doc, &settings).unwrap_err();
        assert!(matches!(err, Error::UrlResolver { .. }));
    }

    #[test]
    fn override_hook_replaces_output() {
        let settings = Settings::new();
        let mut doc = parse_blocks("para\n", &settings).unwrap();
        parse_inlines(&mut doc, &settings).unwrap();
        let mut hook = |doc: &Document, visit: Visit| match visit {
            Visit::Block(v)
                if matches!(doc.block(v.id).tag, BlockTag::Paragraph) =>
            {
                Ok(Some("<section>custom</section>\n".to_string()))
            }
            _ => Ok(None),
        };
        assert_eq!(
            render_html_with(&doc, &settings, &mut hook).unwrap(),
            "<section>custom</section>\n"
        );
    }

    #[test]
    fn override_hook_error_aborts() {
        let settings = Settings::new();
        let mut doc = parse_blocks("para\n", &settings).unwrap();
        parse_inlines(&mut doc, &settings).unwrap();
        let mut hook =
            |_: &Document, _: Visit| Err("nope".to_string());
        let err = render_html_with(&doc, &settings, &mut hook).unwrap_err();
        assert!(matches!(err, Error::Visitor { .. }));
    }

    #[test]
    fn sourcepos_attributes() {
        let settings = Settings::builder().track_positions(true).build();
        assert_eq!(
            html_with("# hi\n\npara\n", &settings),
            "<h1 data-sourcepos=\"0-4\">hi</h1>\n<p data-sourcepos=\"6-10\">para</p>\n"
        );
    }
}
