use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::error::ExportError;

pub const TITLE: &str = "Maturity Diagnostic";

const REPLACEMENT: char = '?';

/// Map `text` onto printable Latin-1 plus newlines.
pub fn sanitize_latin1(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            '\r' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' => {}
            '\t' => out.push(' '),
            '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{2043}' => out.push('-'),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{2023}' | '\u{25CF}' | '\u{25E6}' => out.push('-'),
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' => out.push(' '),
            '\u{2122}' => out.push_str("TM"),
            '\u{20AC}' => out.push_str("EUR"),
            ' '..='~' | '\u{00A1}'..='\u{00FF}' => out.push(c),
            _ => out.push(REPLACEMENT),
        }
    }
    out
}

fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT as u8))
        .collect()
}

fn document_title(institution: Option<&str>) -> String {
    match institution.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("{TITLE} - {name}"),
        None => TITLE.to_string(),
    }
}

pub trait DocumentRenderer {
    fn render(&self, profile: &str, institution: Option<&str>) -> Result<Vec<u8>, ExportError>;

    fn file_extension(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Pdf,
    Text,
}

impl ExportFormat {
    pub fn renderer(self, issued_on: NaiveDate) -> Box<dyn DocumentRenderer> {
        match self {
            Self::Pdf => Box::new(PdfRenderer::new(issued_on)),
            Self::Text => Box::new(TextRenderer::new(issued_on)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextRenderer {
    issued_on: NaiveDate,
}

impl TextRenderer {
    pub fn new(issued_on: NaiveDate) -> Self {
        Self { issued_on }
    }
}

impl DocumentRenderer for TextRenderer {
    fn render(&self, profile: &str, institution: Option<&str>) -> Result<Vec<u8>, ExportError> {
        if profile.trim().is_empty() {
            return Err(ExportError::EmptyProfile);
        }

        let mut document = String::new();
        let _ = writeln!(document, "{}", document_title(institution));
        let _ = writeln!(document, "Issued on {}", self.issued_on);
        let _ = writeln!(document);
        let _ = writeln!(document, "{}", profile.trim_end());

        Ok(latin1_bytes(&sanitize_latin1(&document)))
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 56;
const BODY_SIZE: u32 = 10;
const TITLE_SIZE: u32 = 16;
const LEADING: u32 = 14;
/// Helvetica 10pt averages about 5.6pt per glyph over the 483pt text width.
const WRAP_COLUMNS: usize = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfRenderer {
    issued_on: NaiveDate,
}

impl PdfRenderer {
    pub fn new(issued_on: NaiveDate) -> Self {
        Self { issued_on }
    }

    fn layout(&self, profile: &str, institution: Option<&str>) -> Vec<Vec<u8>> {
        let mut lines: Vec<(Font, u32, String)> = vec![
            (
                Font::Bold,
                TITLE_SIZE,
                sanitize_latin1(&document_title(institution)),
            ),
            (Font::Regular, BODY_SIZE, format!("Issued on {}", self.issued_on)),
            (Font::Regular, BODY_SIZE, String::new()),
        ];
        for line in body_lines(profile) {
            lines.push((Font::Regular, BODY_SIZE, line));
        }

        let top = PAGE_HEIGHT - MARGIN;
        let mut pages = Vec::new();
        let mut stream = Vec::new();
        let mut y = top;

        for (font, size, text) in lines {
            if y < MARGIN {
                pages.push(std::mem::take(&mut stream));
                y = top;
            }
            if !text.is_empty() {
                stream.extend_from_slice(
                    format!("BT /{} {} Tf {} {} Td (", font.resource(), size, MARGIN, y).as_bytes(),
                );
                stream.extend(pdf_escape(&latin1_bytes(&text)));
                stream.extend_from_slice(b") Tj ET\n");
            }
            y = y.saturating_sub(if font == Font::Bold { LEADING + 8 } else { LEADING });
        }
        pages.push(stream);
        pages
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, profile: &str, institution: Option<&str>) -> Result<Vec<u8>, ExportError> {
        if profile.trim().is_empty() {
            return Err(ExportError::EmptyProfile);
        }

        let pages = self.layout(profile, institution);
        let mut writer = PdfWriter::new();

        // Fixed object numbers: 1 catalog, 2 page tree, 3-4 fonts, then a
        // page/content pair per page, then the info dictionary.
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| 5 + 2 * i).collect();
        let info_id = 5 + 2 * pages.len();

        writer.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        writer.object(
            2,
            format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()).as_bytes(),
        );
        writer.object(
            3,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
        writer.object(
            4,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        );

        for (page_id, content) in page_ids.iter().zip(pages) {
            writer.object(
                *page_id,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    page_id + 1
                )
                .as_bytes(),
            );
            let mut body = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            body.extend(content);
            body.extend_from_slice(b"\nendstream");
            writer.object(page_id + 1, &body);
        }

        let mut info = b"<< /Title (".to_vec();
        info.extend(pdf_escape(&latin1_bytes(&sanitize_latin1(&document_title(
            institution,
        )))));
        info.extend_from_slice(b") /Producer (maturity-diagnostic) >>");
        writer.object(info_id, &info);

        Ok(writer.finish(info_id))
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }
}

/// Sanitized first, so substitutions such as `...` count toward the width.
fn body_lines(profile: &str) -> Vec<String> {
    sanitize_latin1(profile.trim_end())
        .lines()
        .flat_map(|line| wrap_line(line, WRAP_COLUMNS))
        .collect()
}

fn pdf_escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        if matches!(byte, b'\\' | b'(' | b')') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out
}

/// Greedy word wrap; blank lines stay blank and overlong words are split.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut wrapped = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split(' ') {
        let mut word = word.to_string();
        loop {
            let word_len = word.chars().count();
            let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };
            if needed <= width {
                if current_len > 0 {
                    current.push(' ');
                }
                current.push_str(&word);
                current_len = needed;
                break;
            }
            if current_len > 0 {
                wrapped.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            wrapped.push(head);
        }
    }

    wrapped.push(current);
    wrapped
}

struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut out = b"%PDF-1.4\n".to_vec();
        out.extend_from_slice(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n']);
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, id: usize, body: &[u8]) {
        self.offsets.push((id, self.out.len()));
        self.out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn finish(mut self, info_id: usize) -> Vec<u8> {
        self.offsets.sort_by_key(|(id, _)| *id);
        let xref_offset = self.out.len();
        let size = self.offsets.len() + 1;

        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for (_, offset) in &self.offsets {
            let _ = write!(xref, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {size} /Root 1 0 R /Info {info_id} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
        );
        self.out.extend_from_slice(xref.as_bytes());
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn is_restricted(bytes: &[u8]) -> bool {
        bytes
            .iter()
            .all(|&b| b == b'\n' || (0x20..=0x7E).contains(&b) || b >= 0xA1)
    }

    #[test]
    fn typographic_punctuation_becomes_ascii() {
        let sanitized = sanitize_latin1("Governance \u{2014} \u{201C}strong\u{201D} and \u{2018}ok\u{2019}\u{2026}");
        assert_eq!(sanitized, "Governance - \"strong\" and 'ok'...");
    }

    #[test]
    fn keeps_latin1_accents_and_replaces_the_rest() {
        assert_eq!(sanitize_latin1("Gestão Pública"), "Gestão Pública");
        assert_eq!(sanitize_latin1("score \u{2705} 日本"), "score ? ??");
        assert_eq!(sanitize_latin1("a\u{00A0}b\r\n"), "a b\n");
    }

    #[test]
    fn text_export_is_restricted_and_titled() {
        let renderer = TextRenderer::new(issued());
        let bytes = renderer
            .render("Institution: Órgão \u{2013} teste\n\n- Data: 1.00", Some("Órgão"))
            .unwrap();

        assert!(is_restricted(&bytes));
        assert!(!bytes.contains(&0xE2));
        let expected_title: Vec<u8> = b"Maturity Diagnostic - \xD3rg\xE3o\nIssued on 2026-03-09\n\n".to_vec();
        assert!(bytes.starts_with(&expected_title));
        assert!(bytes.windows(3).any(|w| w == b" - "));
        assert!(bytes.windows(2).any(|w| w == b"\n\n"));
    }

    #[test]
    fn title_omits_blank_institution() {
        let bytes = TextRenderer::new(issued()).render("profile", Some("  ")).unwrap();
        assert!(bytes.starts_with(b"Maturity Diagnostic\n"));
    }

    #[test]
    fn empty_profile_is_rejected() {
        assert!(matches!(
            PdfRenderer::new(issued()).render(" \n", None),
            Err(ExportError::EmptyProfile)
        ));
    }

    #[test]
    fn pdf_has_valid_envelope() {
        let bytes = PdfRenderer::new(issued())
            .render("Institution: (test)\n\nDetailed item notes:", Some("Agency"))
            .unwrap();

        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert!(bytes.windows(17).any(|w| w == b"Institution: \\(te"));

        let text = String::from_utf8_lossy(&bytes);
        let startxref = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let offset: usize = text[startxref..].lines().next().unwrap().parse().unwrap();
        assert!(bytes[offset..].starts_with(b"xref\n"));
    }

    #[test]
    fn long_profiles_span_pages() {
        let profile = (0..120)
            .map(|i| format!("- Q{i} | Governance | 'prompt' -> score 1"))
            .collect::<Vec<_>>()
            .join("\n");
        let bytes = PdfRenderer::new(issued()).render(&profile, None).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"));
    }

    #[test]
    fn body_is_wrapped_after_substitution() {
        let profile = format!("{}\u{2026}\n\n- end", "x".repeat(WRAP_COLUMNS - 1));
        let lines = body_lines(&profile);

        assert!(lines.iter().all(|l| l.chars().count() <= WRAP_COLUMNS));
        assert_eq!(lines[0], format!("{}.", "x".repeat(WRAP_COLUMNS - 1)));
        assert_eq!(lines[1], "..");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "- end");
    }

    #[test]
    fn wrap_preserves_blank_lines_and_splits_long_words() {
        assert_eq!(wrap_line("", 10), vec![String::new()]);
        assert_eq!(wrap_line("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }
}
