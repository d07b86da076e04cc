//! Text cleanup applied to every retrieved chunk before it is shown or sent
//! to the model. The steps run in a fixed order; later steps rely on the
//! earlier ones having already run.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// The information separators U+001C..U+001F count as whitespace here, as they
// do for the producer's `str.split`/`str.strip`.
static ARTIFACT_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s\x1c-\x1f]*<EOS>[\s\x1c-\x1f]*<pad>[\s\x1c-\x1f]*").expect("static regex")
});
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\x1c-\x1f]+").expect("static regex"));
static CHARACTER_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+;?|#[xX][0-9a-fA-F]+;?|[^\t\n\x0c <&#;]{1,32};?)").expect("static regex")
});

/// Named references that are recognised without a closing `;`. Sorted.
#[rustfmt::skip]
const LEGACY_ENTITIES: &[(&str, char)] = &[
    ("AElig", '\u{c6}'), ("AMP", '\u{26}'), ("Aacute", '\u{c1}'), ("Acirc", '\u{c2}'),
    ("Agrave", '\u{c0}'), ("Aring", '\u{c5}'), ("Atilde", '\u{c3}'), ("Auml", '\u{c4}'),
    ("COPY", '\u{a9}'), ("Ccedil", '\u{c7}'), ("ETH", '\u{d0}'), ("Eacute", '\u{c9}'),
    ("Ecirc", '\u{ca}'), ("Egrave", '\u{c8}'), ("Euml", '\u{cb}'), ("GT", '\u{3e}'),
    ("Iacute", '\u{cd}'), ("Icirc", '\u{ce}'), ("Igrave", '\u{cc}'), ("Iuml", '\u{cf}'),
    ("LT", '\u{3c}'), ("Ntilde", '\u{d1}'), ("Oacute", '\u{d3}'), ("Ocirc", '\u{d4}'),
    ("Ograve", '\u{d2}'), ("Oslash", '\u{d8}'), ("Otilde", '\u{d5}'), ("Ouml", '\u{d6}'),
    ("QUOT", '\u{22}'), ("REG", '\u{ae}'), ("THORN", '\u{de}'), ("Uacute", '\u{da}'),
    ("Ucirc", '\u{db}'), ("Ugrave", '\u{d9}'), ("Uuml", '\u{dc}'), ("Yacute", '\u{dd}'),
    ("aacute", '\u{e1}'), ("acirc", '\u{e2}'), ("acute", '\u{b4}'), ("aelig", '\u{e6}'),
    ("agrave", '\u{e0}'), ("amp", '\u{26}'), ("aring", '\u{e5}'), ("atilde", '\u{e3}'),
    ("auml", '\u{e4}'), ("brvbar", '\u{a6}'), ("ccedil", '\u{e7}'), ("cedil", '\u{b8}'),
    ("cent", '\u{a2}'), ("copy", '\u{a9}'), ("curren", '\u{a4}'), ("deg", '\u{b0}'),
    ("divide", '\u{f7}'), ("eacute", '\u{e9}'), ("ecirc", '\u{ea}'), ("egrave", '\u{e8}'),
    ("eth", '\u{f0}'), ("euml", '\u{eb}'), ("frac12", '\u{bd}'), ("frac14", '\u{bc}'),
    ("frac34", '\u{be}'), ("gt", '\u{3e}'), ("iacute", '\u{ed}'), ("icirc", '\u{ee}'),
    ("iexcl", '\u{a1}'), ("igrave", '\u{ec}'), ("iquest", '\u{bf}'), ("iuml", '\u{ef}'),
    ("laquo", '\u{ab}'), ("lt", '\u{3c}'), ("macr", '\u{af}'), ("micro", '\u{b5}'),
    ("middot", '\u{b7}'), ("nbsp", '\u{a0}'), ("not", '\u{ac}'), ("ntilde", '\u{f1}'),
    ("oacute", '\u{f3}'), ("ocirc", '\u{f4}'), ("ograve", '\u{f2}'), ("ordf", '\u{aa}'),
    ("ordm", '\u{ba}'), ("oslash", '\u{f8}'), ("otilde", '\u{f5}'), ("ouml", '\u{f6}'),
    ("para", '\u{b6}'), ("plusmn", '\u{b1}'), ("pound", '\u{a3}'), ("quot", '\u{22}'),
    ("raquo", '\u{bb}'), ("reg", '\u{ae}'), ("sect", '\u{a7}'), ("shy", '\u{ad}'),
    ("sup1", '\u{b9}'), ("sup2", '\u{b2}'), ("sup3", '\u{b3}'), ("szlig", '\u{df}'),
    ("thorn", '\u{fe}'), ("times", '\u{d7}'), ("uacute", '\u{fa}'), ("ucirc", '\u{fb}'),
    ("ugrave", '\u{f9}'), ("uml", '\u{a8}'), ("uuml", '\u{fc}'), ("yacute", '\u{fd}'),
    ("yen", '\u{a5}'), ("yuml", '\u{ff}'),
];

/// Mojibake fixes, applied top to bottom. Order matters when entries overlap.
const DEFAULT_REPAIRS: &[(&str, &str)] = &[
    ("\u{e2}\u{80}\u{93}", "-"),
    ("\u{e2}\u{88}\u{88}", "\u{2208}"),
    ("\u{c3}\u{97}", "\u{d7}"),
    ("\u{ef}\u{ac}\u{81}", "fi"),
    ("\u{e2}\u{88}\u{88}", "\u{2208}"),
    ("\u{c2}\u{b7}", "\u{b7}"),
    ("\u{ef}\u{ac}\u{82}", "fl"),
];

/// Ordered list of literal `(corrupted, replacement)` substitutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairTable {
    entries: Vec<(String, String)>,
}

impl Default for RepairTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_REPAIRS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl RepairTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends a substitution that runs after every existing one.
    pub fn with_entry(mut self, corrupted: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.entries.push((corrupted.into(), replacement.into()));
        self
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn apply(&self, content: &str) -> String {
        self.entries
            .iter()
            .fold(content.to_string(), |text, (from, to)| text.replace(from.as_str(), to))
    }
}

/// Runs the whole cleanup pipeline over a raw chunk.
pub fn clean_content(raw: &str, repairs: &RepairTable) -> String {
    let content = decode_escapes(raw);
    let content = normalize_newlines(&content);
    let content = strip_artifact_tokens(&content);
    // Collapsing here also flattens the line breaks restored above.
    let content = collapse_whitespace(&content);
    let content = decode_html_entities(&content);
    let content = repair_encoding(&content);
    repairs.apply(&content)
}

/// Undoes backslash escaping introduced when the record was stringified.
///
/// Works on the UTF-8 bytes of `raw`: escape sequences are decoded, every
/// other byte becomes the character with the same value (a Latin-1 reading).
/// Multi-byte characters therefore come out as mojibake here and are put back
/// together by [`repair_encoding`]. Unknown or truncated escapes are kept as
/// written.
pub fn decode_escapes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(char::from(b));
            i += 1;
            continue;
        }
        let Some(&next) = bytes.get(i + 1) else {
            out.push('\\');
            break;
        };
        i += 2;

        match next {
            b'\n' => {}
            b'\\' => out.push('\\'),
            b'\'' => out.push('\''),
            b'"' => out.push('"'),
            b'a' => out.push('\u{07}'),
            b'b' => out.push('\u{08}'),
            b'f' => out.push('\u{0c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'v' => out.push('\u{0b}'),
            b'0'..=b'7' => {
                let mut code = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    code = code * 8 + u32::from(bytes[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                // At most 0o777, always a valid scalar.
                out.extend(char::from_u32(code));
            }
            b'x' | b'u' | b'U' => {
                let width = match next {
                    b'x' => 2,
                    b'u' => 4,
                    _ => 8,
                };
                match read_hex(bytes, i, width) {
                    Some(c) => {
                        out.push(c);
                        i += width;
                    }
                    None => {
                        out.push('\\');
                        out.push(char::from(next));
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(char::from(other));
            }
        }
    }

    out
}

/// Escapes backslashes the way stringifying a record does, so text that was
/// never stringified comes out of [`decode_escapes`] unchanged.
pub fn escape_backslashes(content: &str) -> String {
    content.replace('\\', "\\\\")
}

fn read_hex(bytes: &[u8], start: usize, width: usize) -> Option<char> {
    let digits = bytes.get(start..start + width)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let code = u32::from_str_radix(std::str::from_utf8(digits).ok()?, 16).ok()?;
    char::from_u32(code)
}

/// Turns any literal `\n` pairs left over into line breaks. Idempotent.
pub fn normalize_newlines(content: &str) -> String {
    content.replace("\\n", "\n")
}

/// Drops `<EOS> <pad>` pairs left in the chunk by the model that produced it,
/// together with the whitespace around them.
pub fn strip_artifact_tokens(content: &str) -> String {
    ARTIFACT_TOKENS.replace_all(content, " ").into_owned()
}

pub fn collapse_whitespace(content: &str) -> String {
    WHITESPACE_RUN
        .replace_all(content, " ")
        .trim_matches(is_separator)
        .to_string()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Decodes character references, including legacy names written without
/// the closing `;` (`&amp`, `&copy2020`). Unknown names are left alone.
pub fn decode_html_entities(content: &str) -> String {
    CHARACTER_REFERENCE
        .replace_all(content, |caps: &Captures| {
            let reference = &caps[0];
            let decoded = html_escape::decode_html_entities(reference);
            if decoded != reference || reference.starts_with("&#") {
                return decoded.into_owned();
            }

            let body = &caps[1];
            let (name, terminator) = match body.strip_suffix(';') {
                Some(name) => (name, ";"),
                None => (body, ""),
            };
            match legacy_entity(name) {
                Some((value, rest)) => format!("{}{}{}", value, rest, terminator),
                None => reference.to_string(),
            }
        })
        .into_owned()
}

/// Longest legacy entity name that prefixes `name`, with the text after it.
fn legacy_entity(name: &str) -> Option<(char, &str)> {
    (2..=name.len()).rev().find_map(|len| {
        let prefix = name.get(..len)?;
        let found = LEGACY_ENTITIES
            .binary_search_by(|(entity, _)| (*entity).cmp(prefix))
            .ok()?;
        Some((LEGACY_ENTITIES[found].1, &name[len..]))
    })
}

/// Reads the characters back as Latin-1 bytes and decodes them as UTF-8.
///
/// Characters above U+00FF have no byte to map to and are dropped, as are
/// byte sequences that are not valid UTF-8.
pub fn repair_encoding(content: &str) -> String {
    let bytes: Vec<u8> = content
        .chars()
        .filter_map(|c| u8::try_from(c).ok())
        .collect();

    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
