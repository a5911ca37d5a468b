use pretty_assertions::assert_eq;
use rstest::rstest;
use tidemark::{
    BlockWalker, Document, Error, Settings, markdown_to_html, parse_document,
};

fn html(source: &str) -> String {
    markdown_to_html(source, &Settings::new()).unwrap()
}

fn html_with(source: &str, settings: &Settings) -> String {
    markdown_to_html(source, settings).unwrap()
}

#[rstest]
#[case("*a*", "<p><em>a</em></p>\n")]
#[case("**a**", "<p><strong>a</strong></p>\n")]
#[case("***a***", "<p><strong><em>a</em></strong></p>\n")]
#[case("***a*", "<p>**<em>a</em></p>\n")]
#[case("***a**", "<p>*<strong>a</strong></p>\n")]
#[case("**a***", "<p><strong>a</strong>*</p>\n")]
#[case("*_*_", "<p><em>_</em>_</p>\n")]
#[case("**foo, *bar*, abc**", "<p><strong>foo, <em>bar</em>, abc</strong></p>\n")]
fn emphasis_delimiter_pairing(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(html(source), expected);
}

#[test]
fn bang_without_bracket_is_plain_text() {
    assert_eq!(html("Hello! There\n"), "<p>Hello! There</p>\n");
}

#[test]
fn nul_bytes_become_replacement_chars() {
    assert_eq!(html("a\u{0}b\n"), "<p>a\u{FFFD}b</p>\n");
}

#[test]
fn link_destination_may_follow_a_newline() {
    assert_eq!(html("[foo](\n/url)\n"), "<p><a href=\"/url\">foo</a></p>\n");
    // a dangling opener at end of input stays literal
    assert_eq!(
        html("[foo](\n/url)\n\n[foo]("),
        "<p><a href=\"/url\">foo</a></p>\n<p>[foo](</p>\n"
    );
}

#[test]
fn crlf_input_parses_like_lf() {
    assert_eq!(html("a\r\nb\r\n"), "<p>a\nb</p>\n");
}

#[test]
fn hard_break_from_trailing_spaces() {
    assert_eq!(html("a  \nb\n"), "<p>a<br />\nb</p>\n");
}

#[test]
fn code_span_with_extra_backticks() {
    assert_eq!(html("`` `a` ``\n"), "<p><code>`a`</code></p>\n");
}

#[test]
fn entities_decode_and_reescape() {
    assert_eq!(html("&amp; &copy; &#35;\n"), "<p>&amp; \u{a9} #</p>\n");
}

#[test]
fn autolink_uri() {
    assert_eq!(
        html("<https://example.com>\n"),
        "<p><a href=\"https://example.com\">https://example.com</a></p>\n"
    );
}

#[test]
fn first_reference_definition_wins() {
    assert_eq!(
        html("[a]\n\n[a]: /one\n[a]: /two\n"),
        "<p><a href=\"/one\">a</a></p>\n"
    );
}

#[test]
fn case_sensitive_refs_reject_other_casing() {
    let settings = Settings::builder().case_sensitive_refs(true).build();
    assert_eq!(html_with("[A]\n\n[a]: /u\n", &settings), "<p>[A]</p>\n");
    assert_eq!(
        html_with("[a]\n\n[a]: /u\n", &settings),
        "<p><a href=\"/u\">a</a></p>\n"
    );
}

#[test]
fn pipe_table_renders_thead_and_tbody() {
    let settings = Settings::builder().pipe_tables(true).build();
    assert_eq!(
        html_with("| a | b |\n| --- | --- |\n| 1 | 2 |\n", &settings),
        "<table>\n<thead>\n<tr>\n<th>a</th>\n<th>b</th>\n</tr>\n</thead>\n\
         <tbody>\n<tr>\n<td>1</td>\n<td>2</td>\n</tr>\n</tbody>\n</table>\n"
    );
}

#[test]
fn front_matter_renders_nothing() {
    let settings = Settings::builder().front_matter(true).build();
    assert_eq!(html_with("---\nkey: v\n---\n\n# t\n", &settings), "<h1>t</h1>\n");
}

#[test]
fn strikethrough_and_scripts_behind_flags() {
    let settings = Settings::builder()
        .strikethrough(true)
        .sub_superscript(true)
        .build();
    assert_eq!(html_with("~~x~~\n", &settings), "<p><del>x</del></p>\n");
    assert_eq!(
        html_with("H~2~O and x^2^\n", &settings),
        "<p>H<sub>2</sub>O and x<sup>2</sup></p>\n"
    );
    // off by default
    assert_eq!(html("~~x~~\n"), "<p>~~x~~</p>\n");
}

#[test]
fn emphasis_inside_indented_code_behind_flag() {
    let settings = Settings::builder().emphasis_in_code(true).build();
    assert_eq!(
        html_with("    *x*\n", &settings),
        "<pre><code><em>x</em>\n</code></pre>\n"
    );
    assert_eq!(html("    *x*\n"), "<pre><code>*x*\n</code></pre>\n");
}

#[test]
fn soft_break_as_br() {
    let settings = Settings::builder().soft_break_as_br(true).build();
    assert_eq!(html_with("a\nb\n", &settings), "<p>a<br />\nb</p>\n");
}

#[test]
fn heading_ids_are_deduplicated() {
    let settings = Settings::builder().heading_ids(true).build();
    assert_eq!(
        html_with("# One Two\n\n# One Two\n", &settings),
        "<h1 id=\"one-two\">One Two</h1>\n<h1 id=\"one-two-1\">One Two</h1>\n"
    );
}

#[test]
fn placeholder_resolver_turns_tokens_into_links() {
    let settings = Settings::builder()
        .placeholder_resolver(|token: &str| {
            (token == "home").then(|| "/home".to_string())
        })
        .build();
    assert_eq!(
        html_with("see [home] or [other]\n", &settings),
        "<p>see <a href=\"/home\">home</a> or [other]</p>\n"
    );
}

#[test]
fn url_resolver_failure_aborts_with_the_url() {
    let settings = Settings::builder()
        .url_resolver(|_: &str| Err("offline".to_string()))
        .build();
    let err = markdown_to_html("[a](/u)\n", &settings).unwrap_err();
    match err {
        Error::UrlResolver { url, message } => {
            assert_eq!(url, "/u");
            assert_eq!(message, "offline");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sourcepos_attributes_carry_byte_offsets() {
    let settings = Settings::builder().track_positions(true).build();
    assert_eq!(
        html_with("# hi\n\npara\n", &settings),
        "<h1 data-sourcepos=\"0-4\">hi</h1>\n<p data-sourcepos=\"6-10\">para</p>\n"
    );
}

#[test]
fn lazy_continuation_joins_quoted_paragraphs() {
    assert_eq!(
        html("> a\nb\n"),
        "<blockquote>\n<p>a\nb</p>\n</blockquote>\n"
    );
}

#[test]
fn tight_and_loose_lists() {
    assert_eq!(html("- a\n- b\n"), "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n");
    assert_eq!(
        html("- a\n\n- b\n"),
        "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
    );
}

#[test]
fn walker_visits_are_balanced() {
    let settings = Settings::new();
    let doc = parse_document("> - a\n> - *b*\n\n# h\n\npara\n", &settings).unwrap();
    let mut opened = 0usize;
    let mut closed = 0usize;
    for visit in BlockWalker::new(&doc, Document::ROOT) {
        if visit.opening {
            opened += 1;
        }
        if visit.closing {
            closed += 1;
        }
    }
    assert_eq!(opened, closed);
    assert_eq!(opened, doc.blocks.len());
}
