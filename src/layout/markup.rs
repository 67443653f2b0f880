//! Minimal inline markup for the note and footer prose: `**bold**` runs and
//! line breaks (`\n` or `<br>`). Nothing else is interpreted.

use serde::Serialize;

/// A run of text with one weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

/// One printed line of marked-up text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkupLine {
    pub spans: Vec<Span>,
}

impl MarkupLine {
    /// The line with markup removed.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

const BREAK_TAGS: [&str; 3] = ["<br>", "<br/>", "<br />"];

/// Split `text` into lines of bold/regular spans. Bold state carries across
/// line breaks; an unclosed `**` runs to the end of the text.
pub fn parse(text: &str) -> Vec<MarkupLine> {
    let mut normalized = text.replace("\r\n", "\n");
    for tag in BREAK_TAGS {
        normalized = normalized.replace(tag, "\n");
    }

    let mut bold = false;
    let mut lines = Vec::new();
    for raw_line in normalized.split('\n') {
        let mut line = MarkupLine::default();
        for (i, piece) in raw_line.split("**").enumerate() {
            if i > 0 {
                bold = !bold;
            }
            if piece.is_empty() {
                continue;
            }
            match line.spans.last_mut() {
                Some(last) if last.bold == bold => last.text.push_str(piece),
                _ => line.spans.push(Span {
                    text: piece.to_string(),
                    bold,
                }),
            }
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_one_regular_span() {
        let lines = parse("NOTA: sin marcas");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans, vec![Span { text: "NOTA: sin marcas".into(), bold: false }]);
    }

    #[test]
    fn test_bold_and_breaks() {
        let lines = parse("**Firma:** supervisor<br>segunda\nlínea");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].spans[0], Span { text: "Firma:".into(), bold: true });
        assert_eq!(lines[0].spans[1], Span { text: " supervisor".into(), bold: false });
        assert_eq!(lines[1].plain_text(), "segunda");
        assert_eq!(lines[2].plain_text(), "línea");
    }

    #[test]
    fn test_bold_spans_lines() {
        let lines = parse("**uno\ndos** tres");
        assert!(lines[0].spans[0].bold);
        assert!(lines[1].spans[0].bold);
        assert!(!lines[1].spans[1].bold);
    }
}
