/// HTML entity decoding and output escaping
///
/// Named entities come from a sorted subset of the HTML5 table (binary
/// searched); numeric references decode 1-8 hex or decimal digits, with
/// NUL and out-of-range scalars replaced by U+FFFD.

/// Sorted by name for binary search.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("AElig", "\u{00C6}"),
    ("AMP", "&"),
    ("Aacute", "\u{00C1}"),
    ("Acirc", "\u{00C2}"),
    ("Agrave", "\u{00C0}"),
    ("Aring", "\u{00C5}"),
    ("Atilde", "\u{00C3}"),
    ("Auml", "\u{00C4}"),
    ("COPY", "\u{00A9}"),
    ("Ccedil", "\u{00C7}"),
    ("Dagger", "\u{2021}"),
    ("Eacute", "\u{00C9}"),
    ("GT", ">"),
    ("LT", "<"),
    ("Ntilde", "\u{00D1}"),
    ("OElig", "\u{0152}"),
    ("Ouml", "\u{00D6}"),
    ("QUOT", "\""),
    ("REG", "\u{00AE}"),
    ("Uuml", "\u{00DC}"),
    ("aacute", "\u{00E1}"),
    ("acirc", "\u{00E2}"),
    ("aelig", "\u{00E6}"),
    ("agrave", "\u{00E0}"),
    ("amp", "&"),
    ("apos", "'"),
    ("aring", "\u{00E5}"),
    ("atilde", "\u{00E3}"),
    ("auml", "\u{00E4}"),
    ("bull", "\u{2022}"),
    ("ccedil", "\u{00E7}"),
    ("cent", "\u{00A2}"),
    ("copy", "\u{00A9}"),
    ("dagger", "\u{2020}"),
    ("darr", "\u{2193}"),
    ("deg", "\u{00B0}"),
    ("divide", "\u{00F7}"),
    ("eacute", "\u{00E9}"),
    ("ecirc", "\u{00EA}"),
    ("egrave", "\u{00E8}"),
    ("emsp", "\u{2003}"),
    ("ensp", "\u{2002}"),
    ("euml", "\u{00EB}"),
    ("euro", "\u{20AC}"),
    ("frac12", "\u{00BD}"),
    ("frac14", "\u{00BC}"),
    ("frac34", "\u{00BE}"),
    ("gt", ">"),
    ("harr", "\u{2194}"),
    ("hellip", "\u{2026}"),
    ("iexcl", "\u{00A1}"),
    ("iquest", "\u{00BF}"),
    ("larr", "\u{2190}"),
    ("laquo", "\u{00AB}"),
    ("ldquo", "\u{201C}"),
    ("lsquo", "\u{2018}"),
    ("lt", "<"),
    ("mdash", "\u{2014}"),
    ("micro", "\u{00B5}"),
    ("middot", "\u{00B7}"),
    ("nbsp", "\u{00A0}"),
    ("ndash", "\u{2013}"),
    ("ntilde", "\u{00F1}"),
    ("oelig", "\u{0153}"),
    ("ouml", "\u{00F6}"),
    ("para", "\u{00B6}"),
    ("plusmn", "\u{00B1}"),
    ("pound", "\u{00A3}"),
    ("quot", "\""),
    ("raquo", "\u{00BB}"),
    ("rarr", "\u{2192}"),
    ("rdquo", "\u{201D}"),
    ("reg", "\u{00AE}"),
    ("rsquo", "\u{2019}"),
    ("sect", "\u{00A7}"),
    ("shy", "\u{00AD}"),
    ("sup1", "\u{00B9}"),
    ("sup2", "\u{00B2}"),
    ("sup3", "\u{00B3}"),
    ("szlig", "\u{00DF}"),
    ("times", "\u{00D7}"),
    ("trade", "\u{2122}"),
    ("uarr", "\u{2191}"),
    ("uuml", "\u{00FC}"),
    ("yen", "\u{00A5}"),
];

/// Look up a named entity (without `&` and `;`).
pub fn decode_named(name: &str) -> Option<&'static str> {
    NAMED_ENTITIES
        .binary_search_by(|(n, _)| (*n).cmp(name))
        .ok()
        .map(|idx| NAMED_ENTITIES[idx].1)
}

fn scalar_or_replacement(code_point: u32) -> char {
    if code_point == 0 {
        return '\u{FFFD}';
    }
    char::from_u32(code_point).unwrap_or('\u{FFFD}')
}

/// Scan one entity at `chars[pos]` (which must be `&`). Returns the decoded
/// text and the number of chars consumed, or None if no entity matches.
pub fn scan_entity(chars: &[char], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos) != Some(&'&') {
        return None;
    }
    let mut i = pos + 1;

    if chars.get(i) == Some(&'#') {
        i += 1;
        let hex = matches!(chars.get(i), Some('x') | Some('X'));
        if hex {
            i += 1;
        }
        let digits_start = i;
        while i < chars.len() && i - digits_start < 8 {
            let ok = if hex {
                chars[i].is_ascii_hexdigit()
            } else {
                chars[i].is_ascii_digit()
            };
            if !ok {
                break;
            }
            i += 1;
        }
        if i == digits_start || chars.get(i) != Some(&';') {
            return None;
        }
        let digits: String = chars[digits_start..i].iter().collect();
        let radix = if hex { 16 } else { 10 };
        let code_point = u32::from_str_radix(&digits, radix).unwrap_or(u32::MAX);
        return Some((
            scalar_or_replacement(code_point).to_string(),
            i + 1 - pos,
        ));
    }

    // Named entity: 1-32 alphanumeric chars
    let name_start = i;
    while i < chars.len() && i - name_start < 32 && chars[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == name_start || chars.get(i) != Some(&';') {
        return None;
    }
    let name: String = chars[name_start..i].iter().collect();
    let decoded = decode_named(&name)?;
    Some((decoded.to_string(), i + 1 - pos))
}

/// Decode all entities in a string; unmatched `&` stays literal.
pub fn decode_entities(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '&'
            && let Some((decoded, consumed)) = scan_entity(&chars, i)
        {
            result.push_str(&decoded);
            i += consumed;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }
    result
}

/// Escape `& < > "` for HTML text and attribute contexts.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Percent-encode everything outside a fixed URL-safe ASCII set; non-ASCII
/// scalars are UTF-8 byte-encoded.
pub fn escape_url(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric()
            || matches!(
                ch,
                '-' | '_'
                    | '.'
                    | '~'
                    | '!'
                    | '*'
                    | '\''
                    | '('
                    | ')'
                    | ';'
                    | ':'
                    | '@'
                    | '&'
                    | '='
                    | '+'
                    | '$'
                    | ','
                    | '/'
                    | '?'
                    | '#'
                    | '['
                    | ']'
                    | '%'
            )
        {
            result.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).as_bytes() {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
