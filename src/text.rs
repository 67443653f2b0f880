//! # Text Measurement
//!
//! Widths of the standard PDF fonts the report uses, and greedy line
//! wrapping over UAX#14 break opportunities. Cell text is wrapped here once
//! so header lines and observation cells break identically wherever they are
//! measured.
//!
//! Widths are the Adobe AFM advance widths in 1/1000 em. Accented Latin
//! letters take the width of their base letter.
//!
//! The standard fonts only cover WinAnsiEncoding. [`printable`] reduces any
//! other text to that repertoire before it reaches either renderer, so the
//! preview never shows a character the PDF cannot draw.

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::checklist::CHECK_MARK;

/// The three faces a report is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Regular,
    Bold,
    /// ZapfDingbats, used only for the checkmark.
    Symbol,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // 'p'..'~'
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// ZapfDingbats `a19`, the check mark.
const CHECK_WIDTH: u16 = 755;

fn base_letter(ch: char) -> char {
    match ch {
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Advance width of one character in 1/1000 em.
pub fn char_units(ch: char, face: Face) -> u16 {
    if face == Face::Symbol {
        return CHECK_WIDTH;
    }
    let table = match face {
        Face::Bold => &HELVETICA_BOLD,
        _ => &HELVETICA,
    };
    let ch = base_letter(ch);
    match ch as u32 {
        cp @ 0x20..=0x7E => table[(cp - 0x20) as usize],
        0xBF => 611, // ¿
        0xA1 => 333, // ¡
        0xB0 => 400, // °
        _ if ch.is_uppercase() => 722,
        _ => 556,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, size: f64, face: Face) -> f64 {
    let units: u32 = text.chars().map(|ch| char_units(ch, face) as u32).sum();
    units as f64 * size / 1000.0
}

/// Greedy line wrapping. Breaks only at UAX#14 opportunities, always at
/// mandatory ones, and splits a single word that is wider than the line by
/// characters. Returns no lines for empty text.
pub fn wrap(text: &str, max_width: f64, size: f64, face: Face) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (end, opportunity) in linebreaks(text) {
        let segment = &text[start..end];
        start = end;

        let candidate = format!("{}{}", current, segment);
        if text_width(candidate.trim_end(), size, face) <= max_width {
            current = candidate;
        } else {
            if !current.trim_end().is_empty() {
                lines.push(current.trim_end().to_string());
            }
            current = String::new();
            let word = segment.trim_end_matches(['\n', '\r']);
            if text_width(word.trim_end(), size, face) <= max_width {
                current.push_str(segment);
            } else {
                let mut pieces = split_chars(word, max_width, size, face);
                if let Some(last) = pieces.pop() {
                    lines.extend(pieces);
                    current = last;
                }
            }
        }

        if opportunity == BreakOpportunity::Mandatory && end < text.len() {
            lines.push(current.trim_end().to_string());
            current = String::new();
        }
    }

    if !current.trim_end().is_empty() {
        lines.push(current.trim_end().to_string());
    }
    lines
}

fn split_chars(word: &str, max_width: f64, size: f64, face: Face) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().count() > 1 && text_width(piece.trim_end(), size, face) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(ch);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Most codepoints in
/// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
/// contains special mappings for smart quotes, bullets, dashes, etc.
pub fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x2122 => Some(0x99), // Trade mark sign
        _ => None,
    }
}

/// Check glyphs accepted as a standalone mark and drawn as [`CHECK_MARK`].
const CHECK_GLYPHS: [char; 5] = ['✓', '✔', '☑', '✅', '🗸'];
const CROSS_GLYPHS: [char; 5] = ['✗', '✘', '☒', '❌', '✕'];

fn substitute(ch: char) -> Option<&'static str> {
    let s = match ch {
        '≥' => ">=",
        '≤' => "<=",
        '≠' => "<>",
        '≈' => "~",
        '→' | '⇒' | '➔' => "->",
        '←' | '⇐' => "<-",
        '↔' => "<->",
        '−' | '‐' | '‑' | '‒' => "-",
        '′' => "'",
        '″' => "\"",
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => "",
        c if CHECK_GLYPHS.contains(&c) => "OK",
        c if CROSS_GLYPHS.contains(&c) => "X",
        _ => return None,
    };
    Some(s)
}

/// `text` reduced to what the standard fonts can draw. Line breaks survive,
/// other whitespace becomes a plain space, known symbols get an ASCII
/// spelling and anything else becomes `?`.
pub fn printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            out.push(ch);
        } else if unicode_to_winansi(ch).is_some() {
            out.push(ch);
        } else if let Some(s) = substitute(ch) {
            out.push_str(s);
        } else if ch.is_whitespace() || ch.is_control() {
            out.push(' ');
        } else {
            out.push('?');
        }
    }
    out
}

/// Like [`printable`], but a lone check glyph stays a check mark.
pub fn printable_mark(text: &str) -> String {
    let mut chars = text.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if CHECK_GLYPHS.contains(&c) => CHECK_MARK.to_string(),
        _ => printable(text),
    }
}

/// [`printable`] applied word by word, keeping every standalone check glyph
/// as a check mark.
pub fn printable_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in text.split_inclusive(char::is_whitespace) {
        let word = piece.trim_end_matches(char::is_whitespace);
        out.push_str(&printable_mark(word));
        out.push_str(&printable(&piece[word.len()..]));
    }
    out
}

/// Runs of whitespace collapsed to one space, trimmed at both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_widths() {
        assert_eq!(char_units('A', Face::Regular), 667);
        assert_eq!(char_units('i', Face::Regular), 222);
        assert_eq!(char_units('i', Face::Bold), 278);
        assert_eq!(char_units('~', Face::Bold), 584);
        assert!((text_width("Hello", 12.0, Face::Regular) - 27.336).abs() < 1e-9);
    }

    #[test]
    fn test_accented_letters_use_base_width() {
        assert_eq!(char_units('É', Face::Regular), char_units('E', Face::Regular));
        assert_eq!(char_units('ñ', Face::Bold), char_units('n', Face::Bold));
    }

    #[test]
    fn test_bold_is_wider() {
        assert!(text_width("MECÁNICO", 8.0, Face::Bold) > text_width("MECÁNICO", 8.0, Face::Regular));
    }

    #[test]
    fn test_wrap_fits_on_one_line() {
        assert_eq!(wrap("Sistema de dirección", 500.0, 7.0, Face::Regular), vec!["Sistema de dirección"]);
        assert!(wrap("", 100.0, 7.0, Face::Regular).is_empty());
    }

    #[test]
    fn test_wrap_breaks_between_words() {
        let width = text_width("Frenos de servicio", 7.0, Face::Regular);
        let lines = wrap("Frenos de servicio y de estacionamiento", width, 7.0, Face::Regular);
        assert_eq!(lines[0], "Frenos de servicio");
        assert!(lines.iter().all(|l| text_width(l, 7.0, Face::Regular) <= width));
        assert_eq!(lines.join(" "), "Frenos de servicio y de estacionamiento");
    }

    #[test]
    fn test_wrap_honors_newlines() {
        let lines = wrap("uno\ndos", 500.0, 7.0, Face::Regular);
        assert_eq!(lines, vec!["uno", "dos"]);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap("XXXXXXXXXXXXXXXXXXXX", 30.0, 10.0, Face::Regular);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "XXXXXXXXXXXXXXXXXXXX");
    }

    #[test]
    fn test_printable_keeps_winansi() {
        assert_eq!(printable("Inspección – “ok” 25°C ¿sí? €"), "Inspección – “ok” 25°C ¿sí? €");
        assert_eq!(printable("uno\ndos\tfin"), "uno\ndos fin");
    }

    #[test]
    fn test_printable_substitutes_symbols() {
        assert_eq!(printable("Presión ≥ 30 psi → OK"), "Presión >= 30 psi -> OK");
        assert_eq!(printable("frenos ✔"), "frenos OK");
        assert_eq!(printable("Ωmega 日本"), "?mega ??");
        assert!(printable("Ω ≥ ✓ 日").chars().all(|c| unicode_to_winansi(c).is_some()));
    }

    #[test]
    fn test_printable_mark() {
        assert_eq!(printable_mark("✔"), "✓");
        assert_eq!(printable_mark(" ✓ "), "✓");
        assert_eq!(printable_mark("✗"), "X");
        assert_eq!(printable_mark("≥"), ">=");
    }

    #[test]
    fn test_printable_words_keeps_standalone_checks() {
        assert_eq!(printable_words("✔ = CONFORME  ≠ X"), "✓ = CONFORME  <> X");
        assert_eq!(printable_words("a✓b"), "aOKb");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n  b\tc "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }
}
