//! Locale-aware text normalization.
//!
//! Profile pages mix Persian (U+06F0–U+06F9) and Arabic-Indic
//! (U+0660–U+0669) digit glyphs with ASCII digits, and pad text with
//! zero-width joiners. Every extracted string passes through
//! [`normalize_text`] before any comparison or dedup key is computed.

/// Converts Persian and Arabic-Indic digit glyphs to ASCII `0-9`, removes
/// zero-width (non-)joiner characters, collapses whitespace runs to a
/// single space, and trims the ends.
///
/// Total and deterministic: never fails, and
/// `normalize_text(normalize_text(x)) == normalize_text(x)`.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        let ch = match ch {
            // Persian digits.
            '\u{06F0}'..='\u{06F9}' => ascii_digit(ch as u32 - 0x06F0),
            // Arabic-Indic digits.
            '\u{0660}'..='\u{0669}' => ascii_digit(ch as u32 - 0x0660),
            // ZWNJ / ZWJ.
            '\u{200C}' | '\u{200D}' => continue,
            other => other,
        };

        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out
}

fn ascii_digit(value: u32) -> char {
    // value is 0..=9 by construction at both call sites.
    char::from(b'0' + u8::try_from(value).unwrap_or(0))
}
