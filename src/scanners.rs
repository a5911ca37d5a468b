/// Low-level scanners
///
/// Stateless matchers over a char buffer: given a position, each recognizes
/// one lexical construct and reports how much it matched (0 / None means no
/// match). Nothing here mutates input or allocates beyond the returned
/// payload, and nothing here panics on malformed input.
use crate::entities;

/// Schemes recognized in URI autolinks. Sorted; compared case-insensitively.
const AUTOLINK_SCHEMES: &[&str] = &[
    "bitcoin", "data", "dns", "file", "ftp", "geo", "git", "gopher", "http", "https", "im",
    "imap", "ipfs", "irc", "irc6", "ircs", "magnet", "mailto", "mms", "news", "nntp", "rtsp",
    "sftp", "sip", "sips", "skype", "smtp", "ssh", "svn", "tel", "telnet", "udp", "urn",
    "webcal", "ws", "wss", "xmpp",
];

/// Block-level tag names for HTML block type 6.
const BLOCK_TAG_NAMES: &[&str] = &[
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption",
    "center", "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2",
    "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link",
    "main", "menu", "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param",
    "search", "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title",
    "tr", "track", "ul",
];

pub fn is_ascii_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
}

/// Unicode punctuation or symbol, for emphasis flanking rules. Approximates
/// the P and S general categories by range: ASCII fast path plus the
/// punctuation blocks and per-script punctuation of the major scripts.
/// Unlisted codepoints classify as non-punctuation.
pub fn is_unicode_punctuation(ch: char) -> bool {
    if ch.is_ascii_punctuation() {
        return true;
    }
    let code = ch as u32;
    matches!(code,
        // Latin-1 Supplement punctuation and symbols
        0x00A1..=0x00BF | 0x00D7 | 0x00F7 |
        // Greek and Armenian punctuation
        0x037E | 0x0387 | 0x055A..=0x055F | 0x0589 | 0x058A |
        // Hebrew punctuation
        0x05BE | 0x05C0 | 0x05C3 | 0x05C6 | 0x05F3 | 0x05F4 |
        // Arabic punctuation and signs
        0x0609..=0x060D | 0x061B..=0x061F | 0x066A..=0x066D | 0x06D4 |
        // Syriac, Devanagari, Sinhala punctuation
        0x0700..=0x070D | 0x0964 | 0x0965 | 0x0970 | 0x0DF4 |
        // Thai and Tibetan marks
        0x0E4F | 0x0E5A | 0x0E5B | 0x0F01..=0x0F17 | 0x0F3A..=0x0F3D | 0x0F85 |
        // Myanmar, Georgian, Ethiopic punctuation
        0x104A..=0x104F | 0x10FB | 0x1360..=0x1368 |
        // Khmer and Mongolian punctuation
        0x17D4..=0x17D6 | 0x17D8..=0x17DA | 0x1800..=0x180A |
        // General and Supplemental Punctuation
        0x2000..=0x206F | 0x2E00..=0x2E7F |
        // Currency symbols
        0x20A0..=0x20CF |
        // Arrows, Mathematical Operators, Miscellaneous Technical
        0x2190..=0x21FF | 0x2200..=0x22FF | 0x2300..=0x23FF |
        // Box Drawing through Dingbats
        0x2500..=0x27BF |
        // Miscellaneous Mathematical Symbols, Supplemental Arrows
        0x27C0..=0x27EF | 0x27F0..=0x27FF | 0x2900..=0x297F | 0x2980..=0x29FF |
        // Miscellaneous Symbols and Arrows
        0x2B00..=0x2BFF |
        // CJK punctuation, katakana middle dot
        0x3000..=0x303F | 0x30FB |
        // Ornate parens, vertical/small forms, fullwidth forms
        0xFD3E | 0xFD3F | 0xFE10..=0xFE19 | 0xFE30..=0xFE4F | 0xFE50..=0xFE6B |
        0xFF00..=0xFF0F | 0xFF1A..=0xFF20 | 0xFF3B..=0xFF40 | 0xFF5B..=0xFF65
    )
}

/// Length of the run of `ch` starting at `pos`.
pub fn run_length(chars: &[char], pos: usize, ch: char) -> usize {
    let mut i = pos;
    while i < chars.len() && chars[i] == ch {
        i += 1;
    }
    i - pos
}

/// Count spaces starting at `pos` (tabs are gone after line expansion).
pub fn scan_spaces(chars: &[char], pos: usize) -> usize {
    let mut i = pos;
    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }
    i - pos
}

/// True when only spaces remain before the line terminator.
pub fn rest_is_blank(chars: &[char], pos: usize) -> bool {
    chars[pos..]
        .iter()
        .all(|&ch| ch == ' ' || ch == '\n')
}

/// ATX heading marker: 1-6 `#` followed by space or end of line. Returns
/// (level, chars consumed including the spacing after the marker).
pub fn scan_atx_heading_start(chars: &[char], pos: usize) -> Option<(u8, usize)> {
    let hashes = run_length(chars, pos, '#');
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match chars.get(pos + hashes) {
        Some(' ') => {
            let spaces = scan_spaces(chars, pos + hashes);
            Some((hashes as u8, hashes + spaces))
        }
        Some('\n') | None => Some((hashes as u8, hashes)),
        _ => None,
    }
}

/// Thematic break: 3+ of the same `*`, `-`, or `_`, optionally
/// space-separated, and nothing else on the line. Returns the break char.
pub fn scan_thematic_break(chars: &[char], pos: usize) -> Option<char> {
    let break_char = match chars.get(pos) {
        Some(&c @ ('*' | '-' | '_')) => c,
        _ => return None,
    };
    let mut count = 0;
    for &ch in &chars[pos..] {
        match ch {
            c if c == break_char => count += 1,
            ' ' => {}
            '\n' => break,
            _ => return None,
        }
    }
    if count >= 3 { Some(break_char) } else { None }
}

/// Setext underline: a run of `=` (level 1) or `-` (level 2) with optional
/// trailing spaces.
pub fn scan_setext_underline(chars: &[char], pos: usize) -> Option<u8> {
    let (underline_char, level) = match chars.get(pos) {
        Some('=') => ('=', 1),
        Some('-') => ('-', 2),
        _ => return None,
    };
    let run = run_length(chars, pos, underline_char);
    if run == 0 || !rest_is_blank(chars, pos + run) {
        return None;
    }
    Some(level)
}

/// Opening code fence: 3+ backticks or tildes. A backtick fence's info
/// string may not contain backticks. Returns (fence char, fence length).
pub fn scan_open_code_fence(chars: &[char], pos: usize) -> Option<(char, usize)> {
    let fence_char = match chars.get(pos) {
        Some(&c @ ('`' | '~')) => c,
        _ => return None,
    };
    let length = run_length(chars, pos, fence_char);
    if length < 3 {
        return None;
    }
    if fence_char == '`'
        && chars[pos + length..]
            .iter()
            .take_while(|&&c| c != '\n')
            .any(|&c| c == '`')
    {
        return None;
    }
    Some((fence_char, length))
}

/// Closing fence: same char, at least as long as the opener, only
/// whitespace after.
pub fn scan_close_code_fence(chars: &[char], pos: usize, fence_char: char, min_len: usize) -> bool {
    let length = run_length(chars, pos, fence_char);
    length >= min_len && rest_is_blank(chars, pos + length)
}

fn scheme_allowed(scheme: &str) -> bool {
    let lower = scheme.to_ascii_lowercase();
    AUTOLINK_SCHEMES.binary_search(&lower.as_str()).is_ok()
}

/// URI autolink starting at `<`: allow-listed scheme, `:`, then any chars
/// other than `<`, `>`, controls, and whitespace, closed by `>`. Returns
/// the full matched length including both angle brackets.
pub fn scan_autolink_uri(chars: &[char], pos: usize) -> usize {
    if chars.get(pos) != Some(&'<') {
        return 0;
    }
    let mut i = pos + 1;
    let scheme_start = i;
    if !matches!(chars.get(i), Some(c) if c.is_ascii_alphabetic()) {
        return 0;
    }
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '+' | '.' | '-'))
    {
        i += 1;
    }
    let scheme: String = chars[scheme_start..i].iter().collect();
    if scheme.len() < 2 || chars.get(i) != Some(&':') || !scheme_allowed(&scheme) {
        return 0;
    }
    i += 1;
    while i < chars.len() {
        match chars[i] {
            '>' => return i + 1 - pos,
            '<' | '\n' => return 0,
            c if c.is_whitespace() || c.is_ascii_control() => return 0,
            _ => i += 1,
        }
    }
    0
}

fn is_email_local_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '.' | '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~' | '-'
        )
}

/// Email autolink starting at `<`: RFC-5321-ish local part, `@`, dotted
/// domain of alphanumeric/hyphen labels. Returns the full matched length.
pub fn scan_autolink_email(chars: &[char], pos: usize) -> usize {
    if chars.get(pos) != Some(&'<') {
        return 0;
    }
    let mut i = pos + 1;
    let local_start = i;
    while i < chars.len() && is_email_local_char(chars[i]) {
        i += 1;
    }
    if i == local_start || chars.get(i) != Some(&'@') {
        return 0;
    }
    i += 1;
    // domain labels: alnum with interior hyphens, dot separated
    loop {
        let label_start = i;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
            i += 1;
        }
        let label = &chars[label_start..i];
        if label.is_empty()
            || label[0] == '-'
            || label[label.len() - 1] == '-'
            || label.len() > 63
        {
            return 0;
        }
        match chars.get(i) {
            Some('.') => i += 1,
            Some('>') => return i + 1 - pos,
            _ => return 0,
        }
    }
}

fn is_tag_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic()
}

fn is_tag_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-'
}

fn scan_tag_name(chars: &[char], pos: usize) -> usize {
    if pos >= chars.len() || !is_tag_name_start(chars[pos]) {
        return 0;
    }
    let mut i = pos + 1;
    while i < chars.len() && is_tag_name_char(chars[i]) {
        i += 1;
    }
    i - pos
}

fn scan_whitespace(chars: &[char], pos: usize) -> usize {
    let mut i = pos;
    while i < chars.len() && (chars[i] == ' ' || chars[i] == '\n') {
        i += 1;
    }
    i - pos
}

fn scan_attribute(chars: &[char], pos: usize) -> usize {
    // requires at least one leading whitespace char
    let ws = scan_whitespace(chars, pos);
    if ws == 0 {
        return 0;
    }
    let mut i = pos + ws;
    if i >= chars.len() || !(chars[i].is_ascii_alphabetic() || matches!(chars[i], '_' | ':')) {
        return 0;
    }
    i += 1;
    while i < chars.len()
        && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '.' | ':' | '-'))
    {
        i += 1;
    }
    // optional value
    let mut j = i + scan_whitespace(chars, i);
    if chars.get(j) != Some(&'=') {
        return i - pos;
    }
    j += 1;
    j += scan_whitespace(chars, j);
    match chars.get(j) {
        Some(&quote @ ('"' | '\'')) => {
            j += 1;
            while j < chars.len() && chars[j] != quote {
                j += 1;
            }
            if j >= chars.len() {
                return 0;
            }
            j + 1 - pos
        }
        Some(_) => {
            let value_start = j;
            while j < chars.len()
                && !chars[j].is_whitespace()
                && !matches!(chars[j], '"' | '\'' | '=' | '<' | '>' | '`')
            {
                j += 1;
            }
            if j == value_start {
                return 0;
            }
            j - pos
        }
        None => 0,
    }
}

fn scan_open_tag(chars: &[char], pos: usize) -> usize {
    // chars[pos] is the char after '<'
    let name = scan_tag_name(chars, pos);
    if name == 0 {
        return 0;
    }
    let mut i = pos + name;
    loop {
        let attr = scan_attribute(chars, i);
        if attr == 0 {
            break;
        }
        i += attr;
    }
    i += scan_whitespace(chars, i);
    if chars.get(i) == Some(&'/') {
        i += 1;
    }
    if chars.get(i) == Some(&'>') { i + 1 - pos } else { 0 }
}

fn scan_close_tag(chars: &[char], pos: usize) -> usize {
    let name = scan_tag_name(chars, pos);
    if name == 0 {
        return 0;
    }
    let mut i = pos + name;
    i += scan_whitespace(chars, i);
    if chars.get(i) == Some(&'>') { i + 1 - pos } else { 0 }
}

fn starts_with_at(chars: &[char], pos: usize, prefix: &str) -> bool {
    let mut i = pos;
    for expected in prefix.chars() {
        if chars.get(i) != Some(&expected) {
            return false;
        }
        i += 1;
    }
    true
}

fn find_at(chars: &[char], pos: usize, needle: &str) -> Option<usize> {
    let needle_chars: Vec<char> = needle.chars().collect();
    let mut i = pos;
    while i + needle_chars.len() <= chars.len() {
        if chars[i..i + needle_chars.len()] == needle_chars[..] {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Raw HTML tag starting at `<`: open tag, close tag, comment, processing
/// instruction, CDATA section, or declaration. Returns the matched length.
pub fn scan_html_tag(chars: &[char], pos: usize) -> usize {
    if chars.get(pos) != Some(&'<') {
        return 0;
    }
    let i = pos + 1;
    match chars.get(i) {
        Some('/') => {
            let len = scan_close_tag(chars, i + 1);
            if len > 0 { len + 2 } else { 0 }
        }
        Some('?') => {
            // processing instruction: everything to the first "?>"
            match find_at(chars, i + 1, "?>") {
                Some(end) => end + 2 - pos,
                None => 0,
            }
        }
        Some('!') => {
            if starts_with_at(chars, i + 1, "--") {
                // comment: content may not start with > or ->, may not
                // contain --
                let content_start = i + 3;
                if chars.get(content_start) == Some(&'>')
                    || starts_with_at(chars, content_start, "->")
                {
                    return 0;
                }
                let Some(close) = find_at(chars, content_start, "-->") else {
                    return 0;
                };
                if let Some(dashes) = find_at(chars, content_start, "--")
                    && dashes < close
                {
                    return 0;
                }
                close + 3 - pos
            } else if starts_with_at(chars, i + 1, "[CDATA[") {
                match find_at(chars, i + 8, "]]>") {
                    Some(end) => end + 3 - pos,
                    None => 0,
                }
            } else if matches!(chars.get(i + 1), Some(c) if c.is_ascii_uppercase()) {
                // declaration
                let mut j = i + 2;
                while j < chars.len() && chars[j].is_ascii_uppercase() {
                    j += 1;
                }
                if scan_whitespace(chars, j) == 0 {
                    return 0;
                }
                match chars[j..].iter().position(|&c| c == '>') {
                    Some(rel) => j + rel + 1 - pos,
                    None => 0,
                }
            } else {
                0
            }
        }
        Some(_) => scan_open_tag(chars, i),
        None => 0,
    }
}

fn line_to_lower(chars: &[char], pos: usize) -> String {
    chars[pos..]
        .iter()
        .take_while(|&&c| c != '\n')
        .collect::<String>()
        .to_lowercase()
}

/// HTML block start at `pos` (the `<`). Returns the block type 1-7; type 7
/// is suppressed when `in_paragraph` because a bare tag line cannot
/// interrupt a paragraph.
pub fn scan_html_block_start(chars: &[char], pos: usize, in_paragraph: bool) -> Option<u8> {
    if chars.get(pos) != Some(&'<') {
        return None;
    }
    let lower = line_to_lower(chars, pos);

    // Type 1: <pre, <script, <style, <textarea
    for tag in ["<pre", "<script", "<style", "<textarea"] {
        if lower.starts_with(tag) {
            let after = &lower[tag.len()..];
            if after.is_empty() || after.starts_with('>') || after.starts_with(' ') {
                return Some(1);
            }
        }
    }
    if lower.starts_with("<!--") {
        return Some(2);
    }
    if lower.starts_with("<?") {
        return Some(3);
    }
    if lower.starts_with("<![cdata[") {
        return Some(5);
    }
    if lower.starts_with("<!")
        && matches!(chars.get(pos + 2), Some(c) if c.is_ascii_uppercase())
    {
        return Some(4);
    }

    // Type 6: block-level tag names, open or close
    let name_pos = if lower.starts_with("</") { 2 } else { 1 };
    let name: String = lower[name_pos..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if BLOCK_TAG_NAMES.binary_search(&name.as_str()).is_ok() {
        let after = &lower[name_pos + name.len()..];
        if after.is_empty()
            || after.starts_with('>')
            || after.starts_with(' ')
            || after.starts_with("/>")
        {
            return Some(6);
        }
    }

    // Type 7: a single complete open or close tag and nothing else
    if !in_paragraph {
        let tag_len = scan_html_tag(chars, pos);
        if tag_len > 0 && rest_is_blank(chars, pos + tag_len) {
            return Some(7);
        }
    }
    None
}

/// End condition for HTML block types 1-5, tested against one line.
pub fn scan_html_block_end(kind: u8, chars: &[char], pos: usize) -> bool {
    let lower = line_to_lower(chars, pos);
    match kind {
        1 => {
            lower.contains("</pre>")
                || lower.contains("</script>")
                || lower.contains("</style>")
                || lower.contains("</textarea>")
        }
        2 => lower.contains("-->"),
        3 => lower.contains("?>"),
        4 => lower.contains('>'),
        5 => lower.contains("]]>"),
        _ => false,
    }
}

/// Link destination: `<...>`-wrapped (no unescaped `<`, `>`, or newline) or
/// a run of non-space chars with balanced parentheses. Returns the decoded
/// destination (backslash escapes and entities resolved) and chars consumed.
pub fn scan_link_destination(chars: &[char], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos) == Some(&'<') {
        let mut i = pos + 1;
        let mut dest = String::new();
        while i < chars.len() {
            match chars[i] {
                '>' => return Some((entities::decode_entities(&dest), i + 1 - pos)),
                '<' | '\n' => return None,
                '\\' if i + 1 < chars.len() && is_ascii_punctuation(chars[i + 1]) => {
                    dest.push(chars[i + 1]);
                    i += 2;
                }
                ch => {
                    dest.push(ch);
                    i += 1;
                }
            }
        }
        return None;
    }

    let mut i = pos;
    let mut dest = String::new();
    let mut paren_depth = 0u32;
    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => break,
            c if c.is_ascii_control() => break,
            '\\' if i + 1 < chars.len() && is_ascii_punctuation(chars[i + 1]) => {
                dest.push(chars[i + 1]);
                i += 2;
            }
            '(' => {
                paren_depth += 1;
                dest.push('(');
                i += 1;
            }
            ')' => {
                if paren_depth == 0 {
                    break;
                }
                paren_depth -= 1;
                dest.push(')');
                i += 1;
            }
            ch => {
                dest.push(ch);
                i += 1;
            }
        }
    }
    if dest.is_empty() || paren_depth != 0 {
        None
    } else {
        Some((entities::decode_entities(&dest), i - pos))
    }
}

/// Link title: `"..."`, `'...'`, or `(...)` with backslash escaping.
/// Returns the decoded title and chars consumed.
pub fn scan_link_title(chars: &[char], pos: usize) -> Option<(String, usize)> {
    let closer = match chars.get(pos) {
        Some('"') => '"',
        Some('\'') => '\'',
        Some('(') => ')',
        _ => return None,
    };
    let mut i = pos + 1;
    let mut title = String::new();
    while i < chars.len() {
        match chars[i] {
            c if c == closer => {
                return Some((entities::decode_entities(&title), i + 1 - pos));
            }
            '(' if closer == ')' => return None,
            '\\' if i + 1 < chars.len() && is_ascii_punctuation(chars[i + 1]) => {
                title.push(chars[i + 1]);
                i += 2;
            }
            ch => {
                title.push(ch);
                i += 1;
            }
        }
    }
    None
}

/// Link label: `[...]` with no unescaped brackets inside, at most 999 chars
/// of content. Returns the raw label text and chars consumed.
pub fn scan_link_label(chars: &[char], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos) != Some(&'[') {
        return None;
    }
    let mut i = pos + 1;
    let mut label = String::new();
    while i < chars.len() && label.len() <= crate::refs::MAX_LABEL_LENGTH {
        match chars[i] {
            ']' => return Some((label, i + 1 - pos)),
            '[' => return None,
            '\\' if i + 1 < chars.len() => {
                label.push(chars[i]);
                label.push(chars[i + 1]);
                i += 2;
            }
            ch => {
                label.push(ch);
                i += 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[rstest]
    #[case('!', true)]
    #[case('\u{00BF}', true)] // inverted question mark
    #[case('\u{066A}', true)] // Arabic percent sign
    #[case('\u{0F04}', true)] // Tibetan initial yig mgo
    #[case('\u{2014}', true)] // em dash
    #[case('\u{3002}', true)] // ideographic full stop
    #[case('a', false)]
    #[case('\u{05D0}', false)] // Hebrew alef
    #[case('\u{3042}', false)] // Hiragana a
    fn unicode_punctuation_classification(#[case] ch: char, #[case] expected: bool) {
        assert_eq!(is_unicode_punctuation(ch), expected);
    }

    #[rstest]
    #[case("# foo\n", Some((1, 2)))]
    #[case("###   foo\n", Some((3, 6)))]
    #[case("######\n", Some((6, 6)))]
    #[case("####### x\n", None)]
    #[case("#foo\n", None)]
    fn atx_start(#[case] input: &str, #[case] expected: Option<(u8, usize)>) {
        assert_eq!(scan_atx_heading_start(&chars(input), 0), expected);
    }

    #[rstest]
    #[case("***\n", Some('*'))]
    #[case("- - -\n", Some('-'))]
    #[case("__ __ __\n", Some('_'))]
    #[case("**\n", None)]
    #[case("*-*\n", None)]
    fn thematic_break(#[case] input: &str, #[case] expected: Option<char>) {
        assert_eq!(scan_thematic_break(&chars(input), 0), expected);
    }

    #[rstest]
    #[case("===\n", Some(1))]
    #[case("-\n", Some(2))]
    #[case("==  \n", Some(1))]
    #[case("= =\n", None)]
    fn setext(#[case] input: &str, #[case] expected: Option<u8>) {
        assert_eq!(scan_setext_underline(&chars(input), 0), expected);
    }

    #[test]
    fn code_fences() {
        assert_eq!(scan_open_code_fence(&chars("```rust\n"), 0), Some(('`', 3)));
        assert_eq!(scan_open_code_fence(&chars("~~~~\n"), 0), Some(('~', 4)));
        assert_eq!(scan_open_code_fence(&chars("``\n"), 0), None);
        // backtick fence info may not contain backticks
        assert_eq!(scan_open_code_fence(&chars("``` a`b\n"), 0), None);
        assert!(scan_close_code_fence(&chars("````  \n"), 0, '`', 3));
        assert!(!scan_close_code_fence(&chars("``` x\n"), 0, '`', 3));
        assert!(!scan_close_code_fence(&chars("~~~\n"), 0, '`', 3));
    }

    #[test]
    fn autolink_uri_scheme_allow_list() {
        assert_eq!(scan_autolink_uri(&chars("<http://a.b>"), 0), 12);
        assert_eq!(scan_autolink_uri(&chars("<HTTPS://x>"), 0), 11);
        assert_eq!(scan_autolink_uri(&chars("<javascript:x>"), 0), 0);
        assert_eq!(scan_autolink_uri(&chars("<http://a b>"), 0), 0);
        assert_eq!(scan_autolink_uri(&chars("<http://a.b"), 0), 0);
    }

    #[test]
    fn autolink_email() {
        assert_eq!(scan_autolink_email(&chars("<foo@bar.example.com>"), 0), 21);
        assert_eq!(scan_autolink_email(&chars("<foo@bar>"), 0), 9);
        assert_eq!(scan_autolink_email(&chars("<foo@-bar.com>"), 0), 0);
        assert_eq!(scan_autolink_email(&chars("<@bar.com>"), 0), 0);
    }

    #[test]
    fn html_tags() {
        assert_eq!(scan_html_tag(&chars("<a>"), 0), 3);
        assert_eq!(scan_html_tag(&chars("<a href=\"x\" >"), 0), 13);
        assert_eq!(scan_html_tag(&chars("<br/>"), 0), 5);
        assert_eq!(scan_html_tag(&chars("</div >"), 0), 7);
        assert_eq!(scan_html_tag(&chars("<!-- ok -->"), 0), 11);
        assert_eq!(scan_html_tag(&chars("<!--> no -->"), 0), 0);
        assert_eq!(scan_html_tag(&chars("<!-- a -- b -->"), 0), 0);
        assert_eq!(scan_html_tag(&chars("<?php x ?>"), 0), 10);
        assert_eq!(scan_html_tag(&chars("<![CDATA[x]]>"), 0), 13);
        assert_eq!(scan_html_tag(&chars("<!DOCTYPE html>"), 0), 15);
        assert_eq!(scan_html_tag(&chars("<1bad>"), 0), 0);
    }

    #[test]
    fn html_block_starts() {
        assert_eq!(scan_html_block_start(&chars("<pre>\n"), 0, false), Some(1));
        assert_eq!(scan_html_block_start(&chars("<!-- c\n"), 0, false), Some(2));
        assert_eq!(scan_html_block_start(&chars("<?php\n"), 0, false), Some(3));
        assert_eq!(scan_html_block_start(&chars("<!X>\n"), 0, false), Some(4));
        assert_eq!(
            scan_html_block_start(&chars("<![CDATA[\n"), 0, false),
            Some(5)
        );
        assert_eq!(scan_html_block_start(&chars("<div>\n"), 0, true), Some(6));
        assert_eq!(
            scan_html_block_start(&chars("<x-tag>\n"), 0, false),
            Some(7)
        );
        // type 7 cannot interrupt a paragraph
        assert_eq!(scan_html_block_start(&chars("<x-tag>\n"), 0, true), None);
        assert_eq!(scan_html_block_start(&chars("plain\n"), 0, false), None);
    }

    #[test]
    fn link_destinations() {
        assert_eq!(
            scan_link_destination(&chars("/url rest"), 0),
            Some(("/url".to_string(), 4))
        );
        assert_eq!(
            scan_link_destination(&chars("<my url>"), 0),
            Some(("my url".to_string(), 8))
        );
        assert_eq!(
            scan_link_destination(&chars("a(b)c d"), 0),
            Some(("a(b)c".to_string(), 5))
        );
        assert_eq!(
            scan_link_destination(&chars("\\(lit rest"), 0),
            Some(("(lit".to_string(), 5))
        );
        assert_eq!(scan_link_destination(&chars("<a\nb>"), 0), None);
    }

    #[test]
    fn link_titles() {
        assert_eq!(
            scan_link_title(&chars("\"a title\")"), 0),
            Some(("a title".to_string(), 9))
        );
        assert_eq!(
            scan_link_title(&chars("(in parens)"), 0),
            Some(("in parens".to_string(), 11))
        );
        assert_eq!(
            scan_link_title(&chars("'it\\'s'"), 0),
            Some(("it's".to_string(), 7))
        );
        assert_eq!(scan_link_title(&chars("\"unterminated"), 0), None);
    }

    #[test]
    fn link_labels() {
        assert_eq!(
            scan_link_label(&chars("[foo]"), 0),
            Some(("foo".to_string(), 5))
        );
        assert_eq!(
            scan_link_label(&chars("[a\\]b]"), 0),
            Some(("a\\]b".to_string(), 6))
        );
        assert_eq!(scan_link_label(&chars("[a[b]]"), 0), None);
        assert_eq!(scan_link_label(&chars("[open"), 0), None);
    }

    #[test]
    fn scheme_table_is_sorted() {
        for pair in AUTOLINK_SCHEMES.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for pair in BLOCK_TAG_NAMES.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
