//! Shared text plumbing: entity decoding, anchor encoding, and link target
//! normalization.

use html_escape::NAMED_ENTITIES;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::borrow::Cow;

/// Characters percent-encoded inside generated `href` values.
const HREF_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'|');

/// The longest candidate between `&` and `;` worth examining. The longest
/// HTML5 entity name is 31 bytes; the RLM aliases are 6.
const MAX_ENTITY_LEN: usize = 32;

/// Decodes HTML entities according to the wikitext rules: the standard HTML5
/// named entities plus the two special RLM aliases.
///
/// Input without an ampersand is returned borrowed.
pub(crate) fn decode_html(text: &str) -> Cow<'_, str> {
    let Some(first_amp) = memchr::memchr(b'&', text.as_bytes()) else {
        return Cow::Borrowed(text);
    };

    let mut decoded = String::with_capacity(text.len());
    decoded.push_str(&text[..first_amp]);
    let mut rest = &text[first_amp..];

    // `rest` always begins at a candidate `&`. Either a terminated,
    // decodable entity follows and is replaced, or the ampersand is kept
    // verbatim and scanning resumes after it.
    loop {
        let mut window_end = (1 + MAX_ENTITY_LEN).min(rest.len());
        while !rest.is_char_boundary(window_end) {
            window_end -= 1;
        }
        let candidate = memchr::memchr(b';', rest[1..window_end].as_bytes())
            .and_then(|semi| decode_entity(&rest[1..1 + semi]).map(|c| (c, semi)));

        match candidate {
            Some((c, semi)) => {
                decoded.push(c);
                rest = &rest[1 + semi + 1..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }

        match memchr::memchr(b'&', rest.as_bytes()) {
            Some(next_amp) => {
                decoded.push_str(&rest[..next_amp]);
                rest = &rest[next_amp..];
            }
            None => {
                decoded.push_str(rest);
                return Cow::Owned(decoded);
            }
        }
    }
}

/// Decodes the inside of a single `&…;` entity, without delimiters.
pub(crate) fn decode_entity(name: &str) -> Option<char> {
    if let Some(name) = name.strip_prefix('#') {
        if let Some(name) = name.strip_prefix(|c: char| matches!(c, 'X' | 'x')) {
            u32::from_str_radix(name, 16)
        } else {
            name.parse::<u32>()
        }
        .ok()
        .and_then(char::from_u32)
    } else {
        NAMED_ENTITIES
            .binary_search_by(|(t_name, _)| t_name.cmp(&name.as_bytes()))
            .map_or_else(
                |_| (name == "רלמ" || name == "رلم").then_some('\u{200f}'),
                |index| NAMED_ENTITIES[index].1.chars().next(),
            )
    }
}

/// Encodes section heading text into the modern anchor id format: entities
/// decoded, whitespace collapsed to underscores, Unicode preserved.
pub(crate) fn anchor_encode(text: &str) -> String {
    let text = decode_html(text.trim());
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push('_');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Encodes section heading text into the legacy anchor id format used by the
/// fallback-id span: like URL encoding of the UTF-8 bytes, with `%` replaced
/// by `.`.
pub(crate) fn anchor_encode_legacy(text: &str) -> String {
    use core::fmt::Write as _;

    let id = anchor_encode(text);
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, ".{byte:02X}");
            }
        }
    }
    out
}

/// Normalizes a link target into a title key: trimmed, first letter
/// uppercased, spaces collapsed to underscores.
pub(crate) fn normalize_title(target: &str) -> String {
    let target = target.trim().replace(' ', "_");
    let mut chars = target.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => target,
    }
}

/// Builds a local `./Page_name` href for a normalized title.
pub(crate) fn title_href(title: &str) -> String {
    format!("./{}", utf8_percent_encode(title, HREF_ENCODE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities() {
        assert_eq!(decode_html("a &amp; b"), "a & b");
        assert_eq!(decode_html("&#233;&#xE9;"), "éé");
        assert_eq!(decode_html("&nosuch; &רלמ;"), "&nosuch; \u{200f}");
        assert!(matches!(decode_html("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn anchors() {
        assert_eq!(anchor_encode("Test 1 2 3"), "Test_1_2_3");
        assert_eq!(anchor_encode("Références"), "Références");
        assert_eq!(anchor_encode_legacy("Références"), "R.C3.A9f.C3.A9rences");
    }

    #[test]
    fn titles() {
        assert_eq!(normalize_title("main page"), "Main_page");
        assert_eq!(title_href("A b|c"), "./A%20b%7Cc");
    }
}
