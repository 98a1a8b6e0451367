//! Expands `@(name)` and `@(name?)` placeholders in shell snippets.
//!
//! Substitution is textual and non-recursive: inserted text is never
//! re-scanned for further placeholders. Name comparison is
//! case-insensitive. The sole escape is a literal `@` not followed by
//! `(`, which is emitted verbatim.

use crate::error::{ChariotError, Result};

/// A two-layer variable scope: built-in stage variables take priority
/// over user-supplied `--var` overrides, matching the embedder's
/// "built-in first, then user-supplied" lookup order.
pub struct Scope<'a> {
    builtins: Vec<(&'a str, String)>,
    user: &'a [(String, String)],
}

impl<'a> Scope<'a> {
    pub fn new(builtins: Vec<(&'a str, String)>, user: &'a [(String, String)]) -> Self {
        Scope { builtins, user }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.builtins
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .or_else(|| {
                self.user
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v.as_str())
            })
    }
}

/// Expand every `@(name)` / `@(name?)` placeholder in `text` against
/// `scope`. `@()` is a no-op. An unrecognized `@` not followed by `(` is
/// copied through unchanged.
pub fn expand(text: &str, scope: &Scope) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'@' && bytes.get(i + 1) == Some(&b'(') {
            let start = i + 2;
            let mut j = start;
            while j < bytes.len() && bytes[j] != b')' {
                j += 1;
            }
            if j >= bytes.len() {
                return Err(ChariotError::EmbedUnknownVariable {
                    name: String::new(),
                    text: text.to_string(),
                });
            }

            let inner = &text[start..j];
            let (name, optional) = match inner.strip_suffix('?') {
                Some(stripped) => (stripped, true),
                None => (inner, false),
            };

            if name.is_empty() {
                // `@()` — no-op.
            } else if let Some(value) = scope.lookup(name) {
                out.push_str(value);
            } else if optional {
                // unknown optional variable: spliced out as empty text
            } else {
                return Err(ChariotError::EmbedUnknownVariable {
                    name: name.to_string(),
                    text: text.to_string(),
                });
            }

            i = j + 1;
        } else {
            // Push one UTF-8 scalar at a time so multi-byte characters in
            // shell text survive untouched.
            let ch_len = utf8_len(bytes[i]);
            out.push_str(&text[i..i + ch_len]);
            i += ch_len;
        }
    }

    Ok(out)
}

fn utf8_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1
    } else if first_byte & 0xE0 == 0xC0 {
        2
    } else if first_byte & 0xF0 == 0xE0 {
        3
    } else if first_byte & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}
